//! Provider error types

use std::time::Duration;
use thiserror::Error;

use super::Capability;

/// Errors a single provider call can produce
///
/// These never escape the fallback executor on their own; they are recorded
/// per attempt and surfaced only when a whole chain is exhausted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Provider timed out after {0:?}")]
    Timeout(Duration),

    #[error("Provider returned invalid data: {0}")]
    DataInvalid(String),

    #[error("Provider does not support {0}")]
    Unsupported(Capability),

    #[error("Provider call failed: {0}")]
    Call(String),
}

impl ProviderError {
    /// Short tag used in logs and failure listings
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "provider_unavailable",
            Self::Timeout(_) => "provider_timeout",
            Self::DataInvalid(_) => "provider_data_invalid",
            Self::Unsupported(_) => "provider_unsupported",
            Self::Call(_) => "provider_call_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        assert_eq!(ProviderError::Timeout(Duration::from_millis(5)).kind(), "provider_timeout");
        assert_eq!(ProviderError::DataInvalid("x".into()).kind(), "provider_data_invalid");
    }

    #[test]
    fn test_display() {
        let err = ProviderError::Unsupported(Capability::SearchHotels);
        assert_eq!(err.to_string(), "Provider does not support search_hotels");
    }
}
