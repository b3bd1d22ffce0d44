//! Trip Planner - Hybrid Trip Planning Orchestrator
//!
//! Combines generated itineraries with flight and hotel inventory into one
//! budget-aware trip plan, then supports a bounded number of free-text
//! refinements.
//!
//! # Core Concepts
//!
//! - **Provider fallback**: every provider call walks an ordered chain until one
//!   returns schema-valid data, recording which provider answered and why the
//!   others did not
//! - **Specialists**: destination, logistics, budget, culture, booking and
//!   coordinator tasks run as a dependency graph on a bounded worker pool
//! - **Refinement**: a change request re-runs only the specialists it affects,
//!   carrying the rest forward
//! - **Sessions**: a small state machine with a single writer per session
//!
//! # Modules
//!
//! - [`provider`] - Provider traits, registry and fallback executor
//! - [`budget`] - Budget allocation across categories
//! - [`categorize`] - Flight and hotel offer buckets
//! - [`specialist`] - Specialist graph, coordinator and plan synthesis
//! - [`session`] - Session state machine and follow-up prompts
//! - [`state`] - Session store actor
//! - [`orchestrator`] - Public planning operations
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod budget;
pub mod categorize;
pub mod cli;
pub mod config;
pub mod domain;
pub mod llm;
pub mod orchestrator;
pub mod provider;
pub mod scheduler;
pub mod session;
pub mod specialist;
pub mod state;

// Re-export commonly used types
pub use config::Config;
pub use domain::{
    BudgetTier, DateRange, DraftField, PlanningRequest, QualityMetadata, SessionId, TripAdjustments, TripDraft,
    TripType,
};
pub use orchestrator::{Orchestrator, OrchestratorOptions, PlanningError};
pub use provider::{
    Capability, FallbackError, FallbackExecutor, GenerativeProvider, InventoryProvider, ProviderDescriptor,
    ProviderError, ProviderRegistry,
};
pub use session::{FinalPlan, FollowUp, PlanningSession, SessionError, SessionSnapshot, SessionState};
pub use specialist::{ChangeClass, SpecialistKind, TripPlan};
pub use state::{InMemorySessionStore, SessionStore, StateError, StateManager};
