//! Orchestrator error types

use thiserror::Error;

use crate::domain::{DraftError, SessionId};
use crate::provider::FallbackError;
use crate::session::SessionError;
use crate::specialist::SpecialistError;
use crate::state::StateError;

/// Errors surfaced by orchestrator operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanningError {
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Session {session_id}: {source}")]
    AllProvidersFailed {
        session_id: SessionId,
        #[source]
        source: FallbackError,
    },

    #[error("Session {session_id}: refinement limit of {limit} reached")]
    RefinementLimitExceeded { session_id: SessionId, limit: u32 },

    #[error("Session {session_id}: {source}")]
    Session {
        session_id: SessionId,
        #[source]
        source: SessionError,
    },

    #[error("Session {session_id}: {source}")]
    Specialist {
        session_id: SessionId,
        #[source]
        source: SpecialistError,
    },

    #[error("Session {session_id}: planning cancelled")]
    Cancelled { session_id: SessionId },

    #[error("Session store failed: {0}")]
    State(#[from] StateError),
}

impl PlanningError {
    pub(crate) fn from_session(session_id: &SessionId, error: SessionError) -> Self {
        match error {
            SessionError::RefinementLimitExceeded { limit } => Self::RefinementLimitExceeded {
                session_id: session_id.clone(),
                limit,
            },
            source => Self::Session {
                session_id: session_id.clone(),
                source,
            },
        }
    }

    pub(crate) fn from_pass(session_id: &SessionId, error: SpecialistError) -> Self {
        let session_id = session_id.clone();
        match error {
            SpecialistError::Cancelled | SpecialistError::Generation(FallbackError::Cancelled) => {
                Self::Cancelled { session_id }
            }
            SpecialistError::Generation(source) => Self::AllProvidersFailed { session_id, source },
            source => Self::Specialist { session_id, source },
        }
    }

    pub(crate) fn from_state(session_id: &SessionId, error: StateError) -> Self {
        match error {
            StateError::NotFound(_) => Self::SessionNotFound(session_id.clone()),
            other => Self::State(other),
        }
    }

    /// Short machine-readable tag
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionNotFound(_) => "session_not_found",
            Self::AllProvidersFailed { .. } => "all_providers_failed",
            Self::RefinementLimitExceeded { .. } => "refinement_limit_exceeded",
            Self::Session { .. } => "invalid_session_action",
            Self::Specialist { .. } => "planning_failed",
            Self::Cancelled { .. } => "cancelled",
            Self::State(_) => "store_failed",
        }
    }

    /// Text suitable for showing to the traveler
    pub fn user_message(&self) -> String {
        match self {
            Self::SessionNotFound(_) => "That planning session no longer exists. Please start a new trip.".to_string(),
            Self::AllProvidersFailed { .. } => {
                "We couldn't generate an itinerary right now. Please try again in a moment.".to_string()
            }
            Self::RefinementLimitExceeded { limit, .. } => format!(
                "You've reached the limit of {} refinements for this trip. Finalize the plan or start a new one.",
                limit
            ),
            Self::Session { source, .. } => match source {
                SessionError::Finalized => "This trip has already been finalized.".to_string(),
                SessionError::Draft(DraftError::InvalidValue { field, reason }) => {
                    format!("I couldn't use that {}: {}.", field, reason)
                }
                SessionError::Draft(DraftError::Incomplete(fields)) => {
                    let names: Vec<String> = fields.iter().map(ToString::to_string).collect();
                    format!("I still need your {} before I can plan.", names.join(", "))
                }
                SessionError::InvalidTransition { state, .. } => {
                    format!("That isn't possible while the trip is {}.", state.to_string().replace('_', " "))
                }
                other => format!("That isn't possible right now: {}.", other),
            },
            Self::Cancelled { .. } => "Planning was cancelled.".to_string(),
            Self::Specialist { .. } | Self::State(_) => {
                "Something went wrong while planning your trip. Please try again.".to_string()
            }
        }
    }
}
