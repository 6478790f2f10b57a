//! Chat-completion provider trait and conversation message types.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Speaker of a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(Error::InvalidArgument(format!(
                "unknown message role '{}': expected system, user, or assistant",
                other
            ))),
        }
    }
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Raw result of a completion call.
///
/// `content` is the assistant text when the provider returned one; `raw` is
/// the provider's message object, kept so that a response without a text
/// field still has a string form.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: Option<String>,
    pub raw: serde_json::Value,
}

impl Completion {
    /// A completion carrying plain text.
    pub fn text(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            raw: serde_json::json!({ "role": "assistant", "content": content }),
            content: Some(content),
        }
    }

    /// The textual content, or the string form of the raw message.
    pub fn into_text(self) -> String {
        match self.content {
            Some(text) => text,
            None => self.raw.to_string(),
        }
    }
}

/// Trait for chat-completion providers.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-4o-mini"`).
    fn model_name(&self) -> &str;

    /// Runs one completion over the ordered message list.
    async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<Completion>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!("system".parse::<Role>().unwrap(), Role::System);
        assert_eq!("assistant".parse::<Role>().unwrap(), Role::Assistant);
        let err = "tool".parse::<Role>().unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(ref m) if m.contains("tool")));
    }

    #[test]
    fn test_message_serializes_lowercase_role() {
        let json = serde_json::to_value(ChatMessage::user("hi")).unwrap();
        assert_eq!(json, serde_json::json!({ "role": "user", "content": "hi" }));
    }

    #[test]
    fn test_completion_falls_back_to_raw() {
        let c = Completion {
            content: None,
            raw: serde_json::json!({ "role": "assistant", "refusal": "no" }),
        };
        let text = c.into_text();
        assert!(text.contains("refusal"));
        assert_eq!(Completion::text("5 Ω").into_text(), "5 Ω");
    }
}
