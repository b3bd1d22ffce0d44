//! Session views and the persisted record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{DraftField, PlanningRequest, QualityMetadata, SessionId};
use crate::specialist::{ChangeClass, SpecialistKind, TripPlan};

use super::{FollowUp, PlanningSession, SessionState};

/// Current layout of `SessionRecord`
pub const SCHEMA_VERSION: u32 = 1;

/// One accepted refinement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementRecord {
    /// 1-based refinement number
    pub number: u32,
    pub change: String,
    pub class: ChangeClass,
    pub specialists: Vec<SpecialistKind>,
    pub at: DateTime<Utc>,
    pub diff_summary: String,
    pub confidence: f64,
    /// The change text could not be mapped to a known class
    pub low_confidence: bool,
}

/// Read-only view returned by status queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub state: SessionState,
    pub refinement_count: u32,
    pub refinements_remaining: u32,
    pub missing_fields: Vec<DraftField>,
    pub followup: Option<FollowUp>,
    /// Effective request: the frozen request with refinements applied
    pub request: Option<PlanningRequest>,
    pub plan: Option<TripPlan>,
    pub quality: Option<QualityMetadata>,
    pub history: Vec<RefinementRecord>,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Plan handed back when a session is finalized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalPlan {
    pub session_id: SessionId,
    pub request: PlanningRequest,
    pub plan: TripPlan,
    pub refinements: u32,
    pub history: Vec<RefinementRecord>,
    pub finalized_at: DateTime<Utc>,
}

/// Flat, versioned form of a session for storage
///
/// `revision` increases on every successful write; stores reject a write
/// whose revision does not match the stored one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub schema_version: u32,
    pub revision: u64,
    #[serde(flatten)]
    pub session: PlanningSession,
}

impl SessionRecord {
    pub fn new(session: PlanningSession) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            revision: 0,
            session,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.session.id
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
