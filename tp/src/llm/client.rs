//! LlmClient trait

use async_trait::async_trait;

use super::{Completion, CompletionRequest, LlmError};

/// Stateless completion client; every call is a fresh conversation
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError>;

    /// Model identifier, for logging
    fn model(&self) -> &str;
}
