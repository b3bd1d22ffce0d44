//! LLM client errors

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API key not found in ${0}")]
    MissingKey(String),

    #[error("Unknown LLM provider '{0}' (supported: anthropic)")]
    UnknownProvider(String),

    #[error("Rate limited, retry after {0:?}")]
    RateLimited(Duration),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Could not decode reply: {0}")]
    Decode(String),
}

impl LlmError {
    /// True when the service is down or refusing us, as opposed to answering badly
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::MissingKey(_) | Self::UnknownProvider(_) | Self::RateLimited(_) | Self::Transport(_) => true,
            Self::Status { status, .. } => matches!(status, 401 | 403 | 408 | 429) || *status >= 500,
            Self::Decode(_) => false,
        }
    }
}
