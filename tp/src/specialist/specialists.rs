//! The specialist table
//!
//! Each specialist is a pure function over the request, the results it
//! depends on and whatever provider data the coordinator fetched for it.

use tracing::{debug, warn};

use crate::budget::{self, BudgetCategory, hotel_guidance};
use crate::categorize::{CategorizeOptions, categorize_flights, categorize_hotels};
use crate::domain::{BudgetTier, FlightOffer, HotelOffer, Itinerary, OfferPage, TransportMode, TripType};
use crate::provider::{FallbackError, FallbackOutcome};

use super::{
    BookingPlan, BudgetPlan, CoordinatorReview, CultureNotes, DestinationBrief, Ledger, LogisticsPlan,
    SpecialistError, SpecialistKind, SpecialistOutput, SpecialistResult, Transfer,
};

/// Confidence assigned to allocation-based estimates
pub const ESTIMATE_CONFIDENCE: f64 = 0.4;

/// Provider data fetched for a specialist before it runs
#[derive(Debug, Clone, Default)]
pub enum Fetched {
    #[default]
    Nothing,
    Itinerary(FallbackOutcome<Itinerary>),
    Flights(Result<FallbackOutcome<OfferPage<FlightOffer>>, FallbackError>),
    Hotels(Result<FallbackOutcome<OfferPage<HotelOffer>>, FallbackError>),
}

/// Everything a specialist may read
pub struct SpecialistInput<'a> {
    pub request: &'a crate::domain::PlanningRequest,
    /// Results already available in this pass, including carried-forward ones
    pub upstream: &'a Ledger,
    pub fetched: &'a Fetched,
    pub currency: &'a str,
    pub categorize: CategorizeOptions,
    /// The change that triggered this pass could not be classified
    pub low_confidence: bool,
}

impl<'a> SpecialistInput<'a> {
    fn upstream<T>(
        &self,
        kind: SpecialistKind,
        needs: SpecialistKind,
        pick: impl Fn(&'a SpecialistOutput) -> Option<&'a T>,
    ) -> Result<&'a T, SpecialistError>
    where
        T: 'a,
    {
        self.upstream
            .get(&needs)
            .and_then(|r| pick(&r.output))
            .ok_or(SpecialistError::MissingUpstream { kind, needs })
    }
}

pub type SpecialistFn = fn(&SpecialistInput<'_>) -> Result<SpecialistResult, SpecialistError>;

/// Look up the function for a specialist
pub fn specialist_fn(kind: SpecialistKind) -> SpecialistFn {
    match kind {
        SpecialistKind::Destination => destination,
        SpecialistKind::Logistics => logistics,
        SpecialistKind::Budget => budget_plan,
        SpecialistKind::Culture => culture,
        SpecialistKind::Booking => booking,
        SpecialistKind::Coordinator => coordinator,
    }
}

fn destination(input: &SpecialistInput<'_>) -> Result<SpecialistResult, SpecialistError> {
    debug!(destination = %input.request.destination, "destination: called");
    let Fetched::Itinerary(outcome) = input.fetched else {
        return Err(SpecialistError::MissingFetch(SpecialistKind::Destination));
    };
    let itinerary = outcome.value.clone();

    let mut highlights: Vec<String> = Vec::new();
    for activity in itinerary.days.iter().flat_map(|d| d.afternoon.iter()) {
        if highlights.len() == 5 {
            break;
        }
        if !highlights.contains(&activity.name) {
            highlights.push(activity.name.clone());
        }
    }

    let reasoning = format!(
        "{} days across {} from {}",
        itinerary.days.len(),
        itinerary.cities().join(", "),
        outcome.provider_id
    );
    let brief = DestinationBrief {
        activity_cost_per_person: budget::round2(itinerary.activity_cost()),
        itinerary,
        highlights,
    };
    let mut result = SpecialistResult::new(
        SpecialistKind::Destination,
        SpecialistOutput::Destination(brief),
        outcome.quality.confidence,
        reasoning,
    );
    result.quality = Some(outcome.quality.clone());
    Ok(result)
}

/// Per-person cost of moving between two cities
fn transfer_cost(mode: TransportMode) -> f64 {
    match mode {
        TransportMode::Bus => 30.0,
        TransportMode::Car => 45.0,
        TransportMode::Ferry => 50.0,
        TransportMode::Train => 60.0,
        TransportMode::Flight => 120.0,
    }
}

fn logistics(input: &SpecialistInput<'_>) -> Result<SpecialistResult, SpecialistError> {
    let request = input.request;
    debug!(origin = %request.origin, destination = %request.destination, "logistics: called");
    let route = request.effective_route();
    let mode = request.transport.unwrap_or(TransportMode::Train);

    let mut transfers = Vec::new();
    let mut day = 1;
    for pair in route.windows(2) {
        day += pair[0].nights;
        transfers.push(Transfer {
            day,
            from: pair[0].city.clone(),
            to: pair[1].city.clone(),
            mode,
            estimated_cost: transfer_cost(mode),
        });
    }

    let mut warnings = Vec::new();
    let mut plan = LogisticsPlan {
        route,
        transfers,
        flights: None,
        selected_flight: None,
        flight_cost: 0.0,
    };
    let mut quality = None;
    let mut confidence = ESTIMATE_CONFIDENCE;

    match input.fetched {
        Fetched::Flights(Ok(outcome)) if !outcome.value.offers.is_empty() => {
            let page = &outcome.value;
            let buckets = categorize_flights(&page.offers, page.total_found, &input.categorize);
            let selected = match request.budget_tier {
                BudgetTier::Economy => buckets.cheapest.first(),
                BudgetTier::Moderate => buckets.pick(),
                BudgetTier::Luxury => buckets.fastest.first(),
            }
            .cloned();
            plan.flight_cost = selected.as_ref().map(|f| f.price).unwrap_or_default();
            plan.selected_flight = selected;
            plan.flights = Some(buckets);
            confidence = outcome.quality.confidence;
            quality = Some(outcome.quality.clone());
        }
        other => {
            let reason = match other {
                Fetched::Flights(Err(e)) => e.to_string(),
                _ => "no flight offers found".to_string(),
            };
            warn!(%reason, "Flight search unavailable, estimating from budget");
            warnings.push(format!("flights: {}; using a budget estimate", reason));
            plan.flight_cost = budget::allocate(request.budget_total, input.currency)?.amount(BudgetCategory::Flights);
        }
    }

    let reasoning = match &plan.selected_flight {
        Some(flight) => format!(
            "{} stop(s), {} transfer(s) by {}; flight {} at {:.2}",
            plan.route.len(),
            plan.transfers.len(),
            mode,
            flight.id,
            flight.price
        ),
        None => format!(
            "{} stop(s), {} transfer(s) by {}; flights estimated at {:.2}",
            plan.route.len(),
            plan.transfers.len(),
            mode,
            plan.flight_cost
        ),
    };
    let mut result = SpecialistResult::new(
        SpecialistKind::Logistics,
        SpecialistOutput::Logistics(plan),
        confidence,
        reasoning,
    );
    result.quality = quality;
    result.warnings = warnings;
    Ok(result)
}

fn budget_plan(input: &SpecialistInput<'_>) -> Result<SpecialistResult, SpecialistError> {
    let request = input.request;
    debug!(total = request.budget_total, tier = %request.budget_tier, "budget_plan: called");
    let brief = input.upstream(SpecialistKind::Budget, SpecialistKind::Destination, SpecialistOutput::as_destination)?;

    let breakdown = budget::allocate(request.budget_total, input.currency)?;
    let guidance = hotel_guidance(
        breakdown.amount(BudgetCategory::Hotels),
        request.dates.nights(),
        request.travelers,
    );
    let planned = budget::round2(brief.activity_cost_per_person * request.travelers as f64);

    let mut warnings = Vec::new();
    let activities = breakdown.amount(BudgetCategory::Activities);
    if planned > activities {
        warnings.push(format!(
            "planned activities cost {:.2}, above the {:.2} activities allocation",
            planned, activities
        ));
    }

    let reasoning = format!(
        "{:.2} {} across {} nights for {} traveler(s); {:.2} per night for lodging",
        breakdown.total_budget,
        breakdown.currency,
        request.dates.nights(),
        request.travelers,
        guidance.per_night
    );
    let confidence = if warnings.is_empty() { 0.9 } else { 0.75 };
    let mut result = SpecialistResult::new(
        SpecialistKind::Budget,
        SpecialistOutput::Budget(BudgetPlan {
            breakdown,
            hotel_guidance: guidance,
            planned_activity_cost: planned,
        }),
        confidence,
        reasoning,
    );
    result.warnings = warnings;
    Ok(result)
}

/// Practical notes keyed by interest keyword
const INTEREST_NOTES: &[(&[&str], &str)] = &[
    (
        &["food", "cuisine", "culinary", "wine"],
        "Popular restaurants in {city} fill up early; book dinner a few days ahead",
    ),
    (
        &["history", "culture", "museums", "art", "architecture"],
        "Many museums in {city} close one weekday; check opening days before you go",
    ),
    (
        &["nature", "outdoors", "hiking", "beach", "adventure"],
        "Start outdoor outings in {city} early to avoid midday heat and crowds",
    ),
    (
        &["nightlife", "music", "bars"],
        "Check the last public transport times in {city} before a late night out",
    ),
    (
        &["shopping", "fashion", "crafts"],
        "Small shops in {city} may close for a midday break",
    ),
];

fn culture(input: &SpecialistInput<'_>) -> Result<SpecialistResult, SpecialistError> {
    let request = input.request;
    debug!(destination = %request.destination, "culture: called");
    let brief = input.upstream(SpecialistKind::Culture, SpecialistKind::Destination, SpecialistOutput::as_destination)?;

    let mut notes = Vec::new();
    for city in brief.itinerary.cities() {
        notes.push(format!("Learn a few local greetings before arriving in {}", city));
        notes.push(format!("Carry some cash for small vendors in {}", city));
        for (keys, note) in INTEREST_NOTES {
            if keys.iter().any(|k| request.interests.contains(*k)) {
                notes.push(note.replace("{city}", &city));
            }
        }
    }
    match request.trip_type {
        TripType::Family => notes.push("Ask about family tickets at major sights".to_string()),
        TripType::Romantic => notes.push("Reserve at least one special dinner in advance".to_string()),
        TripType::Business => notes.push("Confirm local business hours and public holidays".to_string()),
        TripType::Adventure => notes.push("Check that your travel insurance covers outdoor activities".to_string()),
        TripType::Leisure => {}
    }

    let reasoning = format!("{} note(s) for {}", notes.len(), brief.itinerary.cities().join(", "));
    Ok(SpecialistResult::new(
        SpecialistKind::Culture,
        SpecialistOutput::Culture(CultureNotes { notes }),
        0.7,
        reasoning,
    ))
}

fn booking(input: &SpecialistInput<'_>) -> Result<SpecialistResult, SpecialistError> {
    let request = input.request;
    debug!(destination = %request.destination, "booking: called");
    let logistics = input.upstream(SpecialistKind::Booking, SpecialistKind::Logistics, SpecialistOutput::as_logistics)?;
    let plan = input.upstream(SpecialistKind::Booking, SpecialistKind::Budget, SpecialistOutput::as_budget)?;
    let nights = request.dates.nights().max(1);

    let mut warnings = Vec::new();
    let mut quality = None;
    let mut confidence = ESTIMATE_CONFIDENCE;
    let mut booking = BookingPlan {
        hotels: None,
        selected_hotel: None,
        hotel_cost: 0.0,
        flight_cost: logistics.flight_cost,
        flight_is_actual: logistics.selected_flight.is_some(),
        checklist: Vec::new(),
    };

    match input.fetched {
        Fetched::Hotels(Ok(outcome)) if !outcome.value.offers.is_empty() => {
            let page = &outcome.value;
            let buckets = categorize_hotels(&page.offers, page.total_found, &input.categorize);
            let selected = buckets.pick(request.budget_tier).cloned();
            booking.hotel_cost = selected
                .as_ref()
                .map(|h| budget::round2(h.price_per_night * nights as f64))
                .unwrap_or_default();
            if buckets.luxury_degraded && request.budget_tier == BudgetTier::Luxury {
                warnings.push("hotels: no luxury offer met the rating floor".to_string());
            }
            booking.selected_hotel = selected;
            booking.hotels = Some(buckets);
            confidence = outcome.quality.confidence;
            quality = Some(outcome.quality.clone());
        }
        other => {
            let reason = match other {
                Fetched::Hotels(Err(e)) => e.to_string(),
                _ => "no hotel offers found".to_string(),
            };
            warn!(%reason, "Hotel search unavailable, estimating from budget");
            warnings.push(format!("hotels: {}; using a budget estimate", reason));
            booking.hotel_cost = plan.breakdown.amount(BudgetCategory::Hotels);
        }
    }

    if let Some(flight) = &logistics.selected_flight {
        booking
            .checklist
            .push(format!("Book flight {} ({})", flight.id, flight.booking_reference));
    } else {
        booking.checklist.push(format!(
            "Search flights {} to {} (about {:.2} budgeted)",
            request.origin, request.destination, booking.flight_cost
        ));
    }
    if let Some(hotel) = &booking.selected_hotel {
        booking
            .checklist
            .push(format!("Book {} for {} night(s) ({})", hotel.name, nights, hotel.booking_reference));
    } else {
        booking.checklist.push(format!(
            "Find lodging around {:.2} per night",
            plan.hotel_guidance.per_night
        ));
    }
    for transfer in &logistics.transfers {
        booking.checklist.push(format!(
            "Reserve {} from {} to {} on day {}",
            transfer.mode, transfer.from, transfer.to, transfer.day
        ));
    }
    booking.checklist.push("Check passport validity and entry requirements".to_string());
    booking.checklist.push("Arrange travel insurance".to_string());

    let reasoning = format!(
        "hotel {:.2}{}, flights {:.2}{}",
        booking.hotel_cost,
        if booking.selected_hotel.is_some() { "" } else { " (estimated)" },
        booking.flight_cost,
        if booking.flight_is_actual { "" } else { " (estimated)" }
    );
    let mut result = SpecialistResult::new(
        SpecialistKind::Booking,
        SpecialistOutput::Booking(booking),
        confidence,
        reasoning,
    );
    result.quality = quality;
    result.warnings = warnings;
    Ok(result)
}

fn coordinator(input: &SpecialistInput<'_>) -> Result<SpecialistResult, SpecialistError> {
    let request = input.request;
    debug!(low_confidence = input.low_confidence, "coordinator: called");
    let kind = SpecialistKind::Coordinator;
    let brief = input.upstream(kind, SpecialistKind::Destination, SpecialistOutput::as_destination)?;
    let logistics = input.upstream(kind, SpecialistKind::Logistics, SpecialistOutput::as_logistics)?;
    let booking = input.upstream(kind, SpecialistKind::Booking, SpecialistOutput::as_booking)?;
    input.upstream(kind, SpecialistKind::Budget, SpecialistOutput::as_budget)?;
    input.upstream(kind, SpecialistKind::Culture, SpecialistOutput::as_culture)?;

    let mut findings = Vec::new();
    let itinerary = &brief.itinerary;
    if itinerary.days.len() as u32 != request.dates.days() {
        findings.push(format!(
            "itinerary covers {} day(s) but the trip is {} day(s)",
            itinerary.days.len(),
            request.dates.days()
        ));
    }
    for stay in &logistics.route {
        if !itinerary.contains_city(&stay.city) {
            findings.push(format!("{} is on the route but not in the itinerary", stay.city));
        }
    }
    for city in itinerary.cities() {
        if !logistics.route.iter().any(|s| s.city.eq_ignore_ascii_case(&city)) {
            findings.push(format!("{} is in the itinerary but not on the route", city));
        }
    }
    let known = booking.known_costs();
    let known_sum = known.flights.unwrap_or_default() + known.hotels.unwrap_or_default();
    if known_sum > request.budget_total {
        findings.push(format!(
            "booked flights and lodging ({:.2}) exceed the {:.2} budget",
            known_sum, request.budget_total
        ));
    }
    let consistent = findings.is_empty();
    if input.low_confidence
        && let Some(note) = request.notes.last()
    {
        findings.push(format!("Could not map \"{}\" to a specific change; kept the current plan", note));
    }

    let confidence = if input.low_confidence {
        0.5
    } else if consistent {
        0.85
    } else {
        0.6
    };
    let reasoning = if consistent {
        "itinerary, route and bookings agree".to_string()
    } else {
        format!("{} consistency issue(s)", findings.len())
    };
    Ok(SpecialistResult::new(
        kind,
        SpecialistOutput::Coordinator(CoordinatorReview { findings }),
        confidence,
        reasoning,
    ))
}
