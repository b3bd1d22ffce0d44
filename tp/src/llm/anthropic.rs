//! Anthropic Messages API client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{Completion, CompletionRequest, LlmClient, LlmError};
use crate::config::LlmConfig;

const API_VERSION: &str = "2023-06-01";

/// Transient failures are retried this many times with doubling backoff
#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    retries: u32,
    first_backoff: Duration,
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        self.first_backoff * 2u32.pow(attempt.saturating_sub(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            first_backoff: Duration::from_millis(500),
        }
    }
}

/// What to do after one HTTP attempt
enum Attempt {
    Done(Completion),
    Retry(LlmError),
    Fail(LlmError),
}

pub struct AnthropicClient {
    http: Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    retry: RetryPolicy,
}

impl AnthropicClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(model = %config.model, base_url = %config.base_url, "AnthropicClient::from_config: called");
        let api_key =
            std::env::var(&config.api_key_env).map_err(|_| LlmError::MissingKey(config.api_key_env.clone()))?;
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/v1/messages", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            retry: RetryPolicy::default(),
        })
    }

    fn body(&self, request: &CompletionRequest) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens.min(self.max_tokens),
            "system": request.system,
            "messages": request.wire_messages(),
        })
    }

    async fn attempt(&self, body: &serde_json::Value, prefill: Option<&str>) -> Attempt {
        let sent = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(body)
            .send()
            .await;
        let response = match sent {
            Ok(response) => response,
            Err(e) if e.is_timeout() || e.is_connect() => return Attempt::Retry(LlmError::Transport(e)),
            Err(e) => return Attempt::Fail(LlmError::Transport(e)),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let wait = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Attempt::Fail(LlmError::RateLimited(Duration::from_secs(wait)));
        }
        if !status.is_success() {
            let error = LlmError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            };
            // 529 is Anthropic's "overloaded"
            let transient = status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT || status.as_u16() == 529;
            return if transient { Attempt::Retry(error) } else { Attempt::Fail(error) };
        }

        match response.json::<MessagesReply>().await {
            Ok(reply) => Attempt::Done(reply.into_completion(prefill)),
            Err(e) => Attempt::Fail(LlmError::Decode(e.to_string())),
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        debug!(model = %self.model, max_tokens = request.max_tokens, "AnthropicClient::complete: called");
        let body = self.body(request);
        let mut attempt = 0;
        loop {
            match self.attempt(&body, request.prefill.as_deref()).await {
                Attempt::Done(completion) => {
                    debug!(
                        input_tokens = completion.input_tokens,
                        output_tokens = completion.output_tokens,
                        truncated = completion.truncated,
                        "AnthropicClient::complete: done"
                    );
                    return Ok(completion);
                }
                Attempt::Retry(error) if attempt < self.retry.retries => {
                    attempt += 1;
                    let wait = self.retry.backoff(attempt);
                    warn!(attempt, ?wait, %error, "Transient LLM failure, retrying");
                    tokio::time::sleep(wait).await;
                }
                Attempt::Retry(error) | Attempt::Fail(error) => return Err(error),
            }
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Deserialize)]
struct MessagesReply {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

impl MessagesReply {
    fn into_completion(self, prefill: Option<&str>) -> Completion {
        let mut text = prefill.unwrap_or_default().to_string();
        for block in self.content {
            if let ContentBlock::Text { text: part } = block {
                text.push_str(&part);
            }
        }
        Completion {
            text,
            truncated: self.stop_reason.as_deref() == Some("max_tokens"),
            input_tokens: self.usage.input_tokens,
            output_tokens: self.usage.output_tokens,
        }
    }
}
