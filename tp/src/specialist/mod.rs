//! Specialist task coordination
//!
//! A planning pass is a small DAG of specialists. Each specialist is a pure
//! function over the request, its upstream results and any provider data the
//! coordinator fetched for it. Passes run independent specialists
//! concurrently on a bounded worker pool; refinements re-run a subset and
//! carry the rest forward from the ledger.

mod classify;
mod coordinator;
mod graph;
mod specialists;
mod synthesis;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::budget::{BudgetBreakdown, BudgetError, HotelGuidance, KnownCosts};
use crate::categorize::{FlightBuckets, HotelBuckets};
use crate::domain::{CityStay, FlightOffer, HotelOffer, Itinerary, QualityMetadata, TransportMode};
use crate::provider::FallbackError;
use crate::scheduler::PoolError;

pub use classify::{ChangeClass, Classification, classify};
pub use coordinator::{PassOutcome, SpecialistCoordinator, SpecialistOptions};
pub use graph::{GraphError, TaskGraph, dependencies};
pub use specialists::{ESTIMATE_CONFIDENCE, Fetched, SpecialistFn, SpecialistInput, specialist_fn};
pub use synthesis::{AspectFailure, TripPlan, synthesize};

/// The closed set of specialists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialistKind {
    Destination,
    Logistics,
    Budget,
    Culture,
    Booking,
    Coordinator,
}

impl SpecialistKind {
    pub const ALL: [SpecialistKind; 6] = [
        Self::Destination,
        Self::Logistics,
        Self::Budget,
        Self::Culture,
        Self::Booking,
        Self::Coordinator,
    ];
}

impl std::fmt::Display for SpecialistKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Destination => write!(f, "destination"),
            Self::Logistics => write!(f, "logistics"),
            Self::Budget => write!(f, "budget"),
            Self::Culture => write!(f, "culture"),
            Self::Booking => write!(f, "booking"),
            Self::Coordinator => write!(f, "coordinator"),
        }
    }
}

impl std::str::FromStr for SpecialistKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.to_string() == s.trim().to_lowercase())
            .ok_or_else(|| format!("Unknown specialist: {}", s))
    }
}

/// Lifecycle of one specialist task within a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Done,
    Failed,
}

/// One node of a pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialistTask {
    pub kind: SpecialistKind,
    pub depends_on: Vec<SpecialistKind>,
    pub status: TaskStatus,
}

/// Highlights and cost hints from the generated itinerary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationBrief {
    pub itinerary: Itinerary,
    /// Per-person activity spend across the trip
    pub activity_cost_per_person: f64,
    pub highlights: Vec<String>,
}

/// A move between two cities on the route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    /// 1-based day the transfer happens
    pub day: u32,
    pub from: String,
    pub to: String,
    pub mode: TransportMode,
    /// Per-person estimate
    pub estimated_cost: f64,
}

/// Route, transfers and flight choice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticsPlan {
    pub route: Vec<CityStay>,
    pub transfers: Vec<Transfer>,
    pub flights: Option<FlightBuckets>,
    pub selected_flight: Option<FlightOffer>,
    /// Total for the party, real when `selected_flight` is set
    pub flight_cost: f64,
}

/// Allocation-only budget view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetPlan {
    pub breakdown: BudgetBreakdown,
    pub hotel_guidance: HotelGuidance,
    /// Itinerary activity spend for the whole party
    pub planned_activity_cost: f64,
}

/// Local customs and practical notes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CultureNotes {
    pub notes: Vec<String>,
}

/// Hotel choice and booking checklist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingPlan {
    pub hotels: Option<HotelBuckets>,
    pub selected_hotel: Option<HotelOffer>,
    /// Total stay cost, real when `selected_hotel` is set
    pub hotel_cost: f64,
    /// Flight cost as reported by logistics
    pub flight_cost: f64,
    pub flight_is_actual: bool,
    pub checklist: Vec<String>,
}

impl BookingPlan {
    /// Costs backed by real offers
    pub fn known_costs(&self) -> KnownCosts {
        KnownCosts {
            flights: self.flight_is_actual.then_some(self.flight_cost),
            hotels: self.selected_hotel.as_ref().map(|_| self.hotel_cost),
        }
    }
}

/// Cross-cutting review of the combined plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorReview {
    pub findings: Vec<String>,
}

/// Structured output, one shape per specialist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum SpecialistOutput {
    Destination(DestinationBrief),
    Logistics(LogisticsPlan),
    Budget(BudgetPlan),
    Culture(CultureNotes),
    Booking(BookingPlan),
    Coordinator(CoordinatorReview),
}

impl SpecialistOutput {
    pub fn as_destination(&self) -> Option<&DestinationBrief> {
        match self {
            Self::Destination(brief) => Some(brief),
            _ => None,
        }
    }

    pub fn as_logistics(&self) -> Option<&LogisticsPlan> {
        match self {
            Self::Logistics(plan) => Some(plan),
            _ => None,
        }
    }

    pub fn as_budget(&self) -> Option<&BudgetPlan> {
        match self {
            Self::Budget(plan) => Some(plan),
            _ => None,
        }
    }

    pub fn as_culture(&self) -> Option<&CultureNotes> {
        match self {
            Self::Culture(notes) => Some(notes),
            _ => None,
        }
    }

    pub fn as_booking(&self) -> Option<&BookingPlan> {
        match self {
            Self::Booking(plan) => Some(plan),
            _ => None,
        }
    }

    pub fn as_coordinator(&self) -> Option<&CoordinatorReview> {
        match self {
            Self::Coordinator(review) => Some(review),
            _ => None,
        }
    }
}

/// What a specialist produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialistResult {
    pub kind: SpecialistKind,
    pub output: SpecialistOutput,
    pub confidence: f64,
    pub reasoning: String,
    pub produced_at: DateTime<Utc>,
    /// Provenance when provider data was used
    #[serde(default)]
    pub quality: Option<QualityMetadata>,
    /// Aspects that fell back to estimates
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl SpecialistResult {
    pub fn new(kind: SpecialistKind, output: SpecialistOutput, confidence: f64, reasoning: impl Into<String>) -> Self {
        Self {
            kind,
            output,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: reasoning.into(),
            produced_at: Utc::now(),
            quality: None,
            warnings: Vec::new(),
        }
    }
}

/// Latest result per specialist
pub type Ledger = BTreeMap<SpecialistKind, SpecialistResult>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpecialistError {
    #[error("{kind} needs a {needs} result that is not available")]
    MissingUpstream { kind: SpecialistKind, needs: SpecialistKind },

    #[error("Itinerary generation failed: {0}")]
    Generation(FallbackError),

    #[error("Budget allocation failed: {0}")]
    Budget(#[from] BudgetError),

    #[error("Invalid specialist graph: {0}")]
    Graph(#[from] GraphError),

    #[error("{0} specialist received no provider data")]
    MissingFetch(SpecialistKind),

    #[error("Cannot assemble a plan without a {0} result")]
    Incomplete(SpecialistKind),

    #[error("Planning cancelled")]
    Cancelled,
}

impl From<PoolError> for SpecialistError {
    fn from(_: PoolError) -> Self {
        Self::Cancelled
    }
}
