//! Plan synthesis
//!
//! Folds the current ledger into one trip plan. Pure: the same ledger always
//! yields the same plan.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::budget::{BudgetBreakdown, HotelGuidance, KnownCosts, allocate_with_actuals};
use crate::categorize::{FlightBuckets, HotelBuckets};
use crate::domain::{Activity, FlightOffer, HotelOffer, Itinerary, PlanningRequest, QualityMetadata};

use super::{Ledger, SpecialistError, SpecialistKind, Transfer};

/// An aspect of the plan that fell back to estimates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectFailure {
    pub specialist: SpecialistKind,
    pub message: String,
}

/// The combined, user-facing plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripPlan {
    pub overview: String,
    pub itinerary: Itinerary,
    pub budget: BudgetBreakdown,
    pub hotel_guidance: HotelGuidance,
    pub flights: Option<FlightBuckets>,
    pub hotels: Option<HotelBuckets>,
    pub selected_flight: Option<FlightOffer>,
    pub selected_hotel: Option<HotelOffer>,
    pub transfers: Vec<Transfer>,
    pub cultural_notes: Vec<String>,
    pub checklist: Vec<String>,
    /// Weakest confidence among the specialists invoked for this plan
    pub confidence: f64,
    pub low_confidence: bool,
    pub warnings: Vec<String>,
    pub aspect_failures: Vec<AspectFailure>,
    pub quality: QualityMetadata,
}

/// Build a plan from the ledger
///
/// `invoked` names the specialists that ran in the pass that produced this
/// ledger; only their confidences feed the combined score.
pub fn synthesize(
    request: &PlanningRequest,
    ledger: &Ledger,
    invoked: &BTreeSet<SpecialistKind>,
    low_confidence: bool,
    currency: &str,
) -> Result<TripPlan, SpecialistError> {
    debug!(?invoked, low_confidence, "synthesize: called");
    let destination = ledger
        .get(&SpecialistKind::Destination)
        .ok_or(SpecialistError::Incomplete(SpecialistKind::Destination))?;
    let brief = destination
        .output
        .as_destination()
        .ok_or(SpecialistError::Incomplete(SpecialistKind::Destination))?;
    let plan = ledger
        .get(&SpecialistKind::Budget)
        .and_then(|r| r.output.as_budget())
        .ok_or(SpecialistError::Incomplete(SpecialistKind::Budget))?;
    let logistics = ledger.get(&SpecialistKind::Logistics).and_then(|r| r.output.as_logistics());
    let booking = ledger.get(&SpecialistKind::Booking).and_then(|r| r.output.as_booking());
    let culture = ledger.get(&SpecialistKind::Culture).and_then(|r| r.output.as_culture());
    let review = ledger
        .get(&SpecialistKind::Coordinator)
        .and_then(|r| r.output.as_coordinator());

    let mut itinerary = brief.itinerary.clone();
    let transfers = logistics.map(|l| l.transfers.clone()).unwrap_or_default();
    for transfer in &transfers {
        if let Some(day) = itinerary.days.iter_mut().find(|d| d.day == transfer.day) {
            let label = format!("Travel from {} to {} by {}", transfer.from, transfer.to, transfer.mode);
            day.morning
                .insert(0, Activity::new(label, transfer.estimated_cost).at(transfer.to.as_str()));
        }
    }
    if let Some(hotel) = booking.and_then(|b| b.selected_hotel.as_ref()) {
        itinerary.notes.push(format!("Stay: {} ({})", hotel.name, hotel.booking_reference));
    }
    if let Some(flight) = logistics.and_then(|l| l.selected_flight.as_ref()) {
        itinerary.notes.push(format!("Flight: {} {} ({})", flight.airline, flight.id, flight.booking_reference));
    }

    let known = booking.map(|b| b.known_costs()).unwrap_or_default();
    let budget = if known == KnownCosts::default() {
        plan.breakdown.clone()
    } else {
        allocate_with_actuals(request.budget_total, known, currency)?
    };

    let mut warnings: Vec<String> = budget.warnings.iter().map(ToString::to_string).collect();
    if let Some(review) = review {
        warnings.extend(review.findings.iter().cloned());
    }
    let mut aspect_failures = Vec::new();
    for kind in [SpecialistKind::Logistics, SpecialistKind::Booking] {
        if let Some(result) = ledger.get(&kind) {
            aspect_failures.extend(result.warnings.iter().map(|w| AspectFailure {
                specialist: kind,
                message: w.clone(),
            }));
        }
    }
    for kind in [SpecialistKind::Budget, SpecialistKind::Destination, SpecialistKind::Culture] {
        if let Some(result) = ledger.get(&kind) {
            warnings.extend(result.warnings.iter().cloned());
        }
    }

    let confidence = ledger
        .iter()
        .filter(|(kind, _)| invoked.is_empty() || invoked.contains(kind))
        .map(|(_, r)| r.confidence)
        .fold(1.0_f64, f64::min);

    let mut quality = destination
        .quality
        .clone()
        .unwrap_or_else(|| QualityMetadata::new("unknown", confidence, crate::domain::DataFreshness::Static))
        .with_confidence(confidence);
    for kind in [SpecialistKind::Logistics, SpecialistKind::Booking] {
        if let Some(q) = ledger.get(&kind).and_then(|r| r.quality.as_ref()) {
            for note in &q.source_notes {
                quality.note(format!("{}: {}", kind, note));
            }
        }
    }

    let overview = format!(
        "{}-day {} trip from {} to {} for {} traveler(s), {} budget of {:.2} {}",
        request.dates.days(),
        request.trip_type,
        request.origin,
        itinerary.cities().join(", "),
        request.travelers,
        request.budget_tier,
        request.budget_total,
        currency
    );
    debug!(confidence, warnings = warnings.len(), "synthesize: complete");

    Ok(TripPlan {
        overview,
        itinerary,
        budget,
        hotel_guidance: plan.hotel_guidance.clone(),
        flights: logistics.and_then(|l| l.flights.clone()),
        hotels: booking.and_then(|b| b.hotels.clone()),
        selected_flight: logistics.and_then(|l| l.selected_flight.clone()),
        selected_hotel: booking.and_then(|b| b.selected_hotel.clone()),
        transfers,
        cultural_notes: culture.map(|c| c.notes.clone()).unwrap_or_default(),
        checklist: booking.map(|b| b.checklist.clone()).unwrap_or_default(),
        confidence,
        low_confidence,
        warnings,
        aspect_failures,
        quality,
    })
}
