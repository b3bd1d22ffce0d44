//! State manager messages
//!
//! Commands and responses for the actor pattern.

use thiserror::Error;
use tokio::sync::oneshot;

use crate::domain::SessionId;
use crate::session::SessionRecord;

/// Errors from state operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StateError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session {id} already exists")]
    AlreadyExists { id: String },

    #[error("Stale write for session {id}: expected revision {expected}, found {found}")]
    Conflict { id: String, expected: u64, found: u64 },

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Channel error")]
    ChannelError,
}

/// Response from state operations
pub type StateResponse<T> = Result<T, StateError>;

/// Commands sent to the StateManager actor
#[derive(Debug)]
pub enum StateCommand {
    Create {
        record: SessionRecord,
        reply: oneshot::Sender<StateResponse<SessionRecord>>,
    },
    Get {
        id: SessionId,
        reply: oneshot::Sender<StateResponse<Option<SessionRecord>>>,
    },
    /// Replace a record; its revision must match the stored one
    Update {
        record: SessionRecord,
        reply: oneshot::Sender<StateResponse<SessionRecord>>,
    },
    Delete {
        id: SessionId,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    List {
        reply: oneshot::Sender<StateResponse<Vec<SessionRecord>>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}
