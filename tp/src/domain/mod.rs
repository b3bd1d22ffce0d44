//! Domain types shared across the planner

mod id;
mod itinerary;
mod offer;
mod quality;
mod request;

pub use id::{SessionId, generate_id};
pub use itinerary::{Activity, DayPlan, Itinerary, TimeBlock};
pub use offer::{FlightOffer, FlightQuery, HotelOffer, HotelQuery, OfferPage, Priced};
pub use quality::{DataFreshness, QualityMetadata, QualityTier};
pub use request::{
    BudgetTier, CityStay, DateRange, DraftError, DraftField, MAX_TRIP_NIGHTS, PlanningRequest, TransportMode, TripAdjustments, TripDraft,
    TripType,
};

/// Structural check applied to data crossing a provider boundary
pub trait Validate {
    /// Returns a description of the first violation found
    fn validate(&self) -> Result<(), String>;
}
