use std::fmt;

use serde::{Deserialize, Serialize};

pub type Err = anyhow::Error;
pub type Res<T> = Result<T, Err>;
pub type Void = Res<()>;

/// A message as it comes back from the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The author's user ID (empty when the platform omits it).
    pub user: String,
    /// The raw message text, mentions included.
    pub text: String,
}

impl ChatMessage {
    pub fn new(user: impl Into<String>, text: impl Into<String>) -> Self {
        Self { user: user.into(), text: text.into() }
    }
}

/// The role of a single entry in a completion prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for PromptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = match self {
            PromptRole::System => "system",
            PromptRole::User => "user",
            PromptRole::Assistant => "assistant",
        };

        f.write_str(role)
    }
}

/// A role-tagged prompt entry sent to the completion API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: PromptRole, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// Transport-neutral payload of an inbound chat event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// The author's user ID, if the event carries one.
    pub user: Option<String>,
    /// The message text.
    pub text: String,
    /// The channel the event happened in.
    pub channel: String,
    /// The event's own timestamp.
    pub ts: String,
    /// The parent thread timestamp, if the message is part of a thread.
    pub thread_ts: Option<String>,
    /// The channel type (`channel`, `group`, `im`, ...), if present.
    pub channel_type: Option<String>,
}

/// An inbound event the dispatcher knows how to handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// The bot was @-mentioned.
    Mention(InboundMessage),
    /// Any other message the platform delivered.
    Message(InboundMessage),
}

impl InboundEvent {
    pub fn message(&self) -> &InboundMessage {
        match self {
            InboundEvent::Mention(message) | InboundEvent::Message(message) => message,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::Mention(_) => "app_mention",
            InboundEvent::Message(_) => "message",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&PromptRole::Assistant).unwrap(), "\"assistant\"");
        assert_eq!(PromptRole::System.to_string(), "system");
    }

    #[test]
    fn inbound_event_exposes_payload() {
        let message = InboundMessage {
            user: Some("U1".to_string()),
            text: "hi".to_string(),
            channel: "C1".to_string(),
            ts: "1.0".to_string(),
            ..Default::default()
        };

        let event = InboundEvent::Mention(message.clone());

        assert_eq!(event.message(), &message);
        assert_eq!(event.kind(), "app_mention");
    }
}
