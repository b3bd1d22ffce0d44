//! Completion request and reply shapes
//!
//! Text-only subset of the Anthropic Messages API.

use serde::{Deserialize, Serialize};

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }
}

/// One stateless completion call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    /// Text the reply is forced to start with, e.g. `{` for JSON output
    pub prefill: Option<String>,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            system: system.into(),
            messages: vec![Message::user(prompt)],
            max_tokens,
            prefill: None,
        }
    }

    pub fn with_prefill(mut self, prefill: impl Into<String>) -> Self {
        self.prefill = Some(prefill.into());
        self
    }

    /// Messages as sent on the wire, prefill appended as a trailing assistant turn
    pub fn wire_messages(&self) -> Vec<Message> {
        let mut messages = self.messages.clone();
        if let Some(prefill) = &self.prefill {
            messages.push(Message {
                role: Role::Assistant,
                content: prefill.clone(),
            });
        }
        messages
    }
}

/// Model reply with the prefill already restored
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub text: String,
    /// The model hit `max_tokens` before finishing
    pub truncated: bool,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefill_becomes_assistant_turn() {
        let request = CompletionRequest::new("sys", "Plan Rome", 100).with_prefill("{");
        let wire = request.wire_messages();
        assert_eq!(wire.len(), 2);
        assert_eq!(wire[1].role, Role::Assistant);
        assert_eq!(wire[1].content, "{");
        assert_eq!(request.messages.len(), 1);
    }

    #[test]
    fn test_role_is_lowercase_on_the_wire() {
        let json = serde_json::to_string(&Message::user("hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }
}
