//! Planning session lifecycle
//!
//! A session moves `collecting_info -> generating -> ready`, then loops
//! through `refining` a bounded number of times before `finalized`.
//! Transitions are plain methods on `PlanningSession`; the orchestrator
//! decides when to call them and holds the per-session lock while it does.

mod followup;
mod record;

pub use followup::{FollowUp, followup_for};
pub use record::{FinalPlan, RefinementRecord, SCHEMA_VERSION, SessionRecord, SessionSnapshot};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{DraftError, DraftField, PlanningRequest, SessionId, TripAdjustments, TripDraft};
use crate::specialist::{Classification, Ledger, TripPlan};

/// Lifecycle state of a planning session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    CollectingInfo,
    Generating,
    Ready,
    Refining,
    /// Initial generation exhausted every provider; answers may be corrected and retried
    GenerationFailed,
    Finalized,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CollectingInfo => write!(f, "collecting_info"),
            Self::Generating => write!(f, "generating"),
            Self::Ready => write!(f, "ready"),
            Self::Refining => write!(f, "refining"),
            Self::GenerationFailed => write!(f, "generation_failed"),
            Self::Finalized => write!(f, "finalized"),
        }
    }
}

/// Errors raised by invalid session transitions
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("Cannot {action} while the session is {state}")]
    InvalidTransition { state: SessionState, action: &'static str },

    #[error("Refinement limit of {limit} reached")]
    RefinementLimitExceeded { limit: u32 },

    #[error("Session is finalized")]
    Finalized,

    #[error("Session has no plan")]
    NoPlan,

    #[error(transparent)]
    Draft(#[from] DraftError),
}

/// One trip-planning conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningSession {
    pub id: SessionId,
    pub state: SessionState,
    pub draft: TripDraft,
    /// Frozen request captured when generation starts
    pub request: Option<PlanningRequest>,
    /// Changes accumulated by successful refinements
    #[serde(default)]
    pub adjustments: TripAdjustments,
    pub plan: Option<TripPlan>,
    #[serde(default)]
    pub ledger: Ledger,
    pub refinement_count: u32,
    pub max_refinements: u32,
    #[serde(default)]
    pub history: Vec<RefinementRecord>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PlanningSession {
    pub fn new(draft: TripDraft, max_refinements: u32) -> Self {
        let label = draft.destination.clone().unwrap_or_default();
        let id = SessionId::new(&label);
        debug!(%id, max_refinements, "PlanningSession::new: called");
        let now = Utc::now();
        Self {
            id,
            state: SessionState::CollectingInfo,
            draft,
            request: None,
            adjustments: TripAdjustments::default(),
            plan: None,
            ledger: Ledger::new(),
            refinement_count: 0,
            max_refinements,
            history: Vec::new(),
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn require(&self, allowed: &[SessionState], action: &'static str) -> Result<(), SessionError> {
        if self.state == SessionState::Finalized {
            return Err(SessionError::Finalized);
        }
        if !allowed.contains(&self.state) {
            debug!(%self.id, %self.state, action, "PlanningSession::require: rejected");
            return Err(SessionError::InvalidTransition {
                state: self.state,
                action,
            });
        }
        Ok(())
    }

    pub fn is_finalized(&self) -> bool {
        self.state == SessionState::Finalized
    }

    pub fn refinements_remaining(&self) -> u32 {
        self.max_refinements.saturating_sub(self.refinement_count)
    }

    /// Fill in one field of the draft
    pub fn answer(&mut self, field: DraftField, value: &str) -> Result<(), SessionError> {
        debug!(%self.id, %field, "PlanningSession::answer: called");
        self.require(
            &[SessionState::CollectingInfo, SessionState::GenerationFailed],
            "answer a follow-up",
        )?;
        self.draft.set_field(field, value)?;
        self.touch();
        Ok(())
    }

    /// Freeze the draft and enter `generating`
    pub fn begin_generation(&mut self) -> Result<PlanningRequest, SessionError> {
        debug!(%self.id, %self.state, "PlanningSession::begin_generation: called");
        self.require(
            &[SessionState::CollectingInfo, SessionState::GenerationFailed],
            "start generation",
        )?;
        let request = self.draft.to_request()?;
        self.request = Some(request.clone());
        self.adjustments = TripAdjustments::default();
        self.last_error = None;
        self.state = SessionState::Generating;
        self.touch();
        Ok(request)
    }

    pub fn complete_generation(&mut self, ledger: Ledger, plan: TripPlan) -> Result<(), SessionError> {
        debug!(%self.id, confidence = plan.confidence, "PlanningSession::complete_generation: called");
        self.require(&[SessionState::Generating], "complete generation")?;
        self.ledger = ledger;
        self.plan = Some(plan);
        self.state = SessionState::Ready;
        self.touch();
        info!(%self.id, "Session ready");
        Ok(())
    }

    pub fn fail_generation(&mut self, error: impl Into<String>) -> Result<(), SessionError> {
        let error = error.into();
        self.require(&[SessionState::Generating], "fail generation")?;
        warn!(%self.id, %error, "Initial generation failed");
        self.last_error = Some(error);
        self.state = SessionState::GenerationFailed;
        self.touch();
        Ok(())
    }

    /// The frozen request with every accepted refinement applied
    pub fn effective_request(&self) -> Option<PlanningRequest> {
        self.request.as_ref().map(|r| r.adjusted(&self.adjustments))
    }

    /// Enter `refining`, enforcing the refinement limit
    pub fn begin_refinement(&mut self) -> Result<(), SessionError> {
        debug!(%self.id, self.refinement_count, "PlanningSession::begin_refinement: called");
        self.require(&[SessionState::Ready], "refine")?;
        if self.refinement_count >= self.max_refinements {
            debug!(%self.id, "PlanningSession::begin_refinement: limit reached");
            return Err(SessionError::RefinementLimitExceeded {
                limit: self.max_refinements,
            });
        }
        self.state = SessionState::Refining;
        self.touch();
        Ok(())
    }

    /// Accept a refined plan and count the refinement
    pub fn complete_refinement(
        &mut self,
        change: &str,
        classification: &Classification,
        ledger: Ledger,
        plan: TripPlan,
    ) -> Result<&RefinementRecord, SessionError> {
        debug!(%self.id, class = %classification.class, "PlanningSession::complete_refinement: called");
        self.require(&[SessionState::Refining], "complete a refinement")?;
        let diff_summary = match &self.plan {
            Some(previous) => plan.itinerary.diff_summary(&previous.itinerary),
            None => "new itinerary".to_string(),
        };
        self.refinement_count += 1;
        self.adjustments.merge(&classification.adjustments);
        self.history.push(RefinementRecord {
            number: self.refinement_count,
            change: change.trim().to_string(),
            class: classification.class,
            specialists: classification.specialists.iter().copied().collect(),
            at: Utc::now(),
            diff_summary,
            confidence: plan.confidence,
            low_confidence: classification.low_confidence,
        });
        self.ledger = ledger;
        self.plan = Some(plan);
        self.last_error = None;
        self.state = SessionState::Ready;
        self.touch();
        info!(%self.id, count = self.refinement_count, "Refinement applied");
        self.history.last().ok_or(SessionError::NoPlan)
    }

    /// Return to `ready` keeping the previous plan; the counter is unchanged
    pub fn abort_refinement(&mut self, error: impl Into<String>) -> Result<(), SessionError> {
        let error = error.into();
        self.require(&[SessionState::Refining], "abort a refinement")?;
        warn!(%self.id, %error, "Refinement failed, keeping previous plan");
        if let Some(plan) = self.plan.as_mut() {
            plan.warnings
                .push(format!("Refinement could not be applied ({}); showing the previous plan", error));
        }
        self.last_error = Some(error);
        self.state = SessionState::Ready;
        self.touch();
        Ok(())
    }

    /// Close the session and return the final plan
    pub fn finalize(&mut self) -> Result<FinalPlan, SessionError> {
        debug!(%self.id, %self.state, "PlanningSession::finalize: called");
        self.require(&[SessionState::Ready], "finalize")?;
        let plan = self.plan.clone().ok_or(SessionError::NoPlan)?;
        let request = self.effective_request().ok_or(SessionError::NoPlan)?;
        self.state = SessionState::Finalized;
        self.touch();
        info!(%self.id, refinements = self.refinement_count, "Session finalized");
        Ok(FinalPlan {
            session_id: self.id.clone(),
            request,
            plan,
            refinements: self.refinement_count,
            history: self.history.clone(),
            finalized_at: self.updated_at,
        })
    }

    /// The next question to ask, while information is still being collected
    pub fn followup(&self) -> Option<FollowUp> {
        match self.state {
            SessionState::CollectingInfo | SessionState::GenerationFailed => Some(followup_for(&self.draft)),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            state: self.state,
            refinement_count: self.refinement_count,
            refinements_remaining: self.refinements_remaining(),
            missing_fields: self.draft.missing_fields(),
            followup: self.followup(),
            request: self.effective_request(),
            quality: self.plan.as_ref().map(|p| p.quality.clone()),
            plan: self.plan.clone(),
            history: self.history.clone(),
            last_error: self.last_error.clone(),
            updated_at: self.updated_at,
        }
    }
}
