//! Provider traits
//!
//! Two collaborator shapes sit behind the fallback executor: generative
//! itinerary providers and inventory search providers.

use async_trait::async_trait;

use crate::domain::{FlightOffer, FlightQuery, HotelOffer, HotelQuery, Itinerary, OfferPage, PlanningRequest};

use super::ProviderError;

/// Produces a day-by-day itinerary for a request
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    async fn generate_itinerary(&self, request: &PlanningRequest) -> Result<Itinerary, ProviderError>;

    async fn is_available(&self) -> bool;

    /// Baseline confidence in [0, 1]
    fn confidence_estimate(&self) -> f64;
}

/// Searches flight and hotel inventory
#[async_trait]
pub trait InventoryProvider: Send + Sync {
    async fn search_flights(&self, query: &FlightQuery) -> Result<OfferPage<FlightOffer>, ProviderError>;

    async fn search_hotels(&self, query: &HotelQuery) -> Result<OfferPage<HotelOffer>, ProviderError>;

    async fn is_available(&self) -> bool;

    /// Baseline confidence in [0, 1]
    fn confidence_estimate(&self) -> f64;
}
