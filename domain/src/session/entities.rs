//! Session domain entities

use crate::core::string::derive_title;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a message, unique within its session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a chat session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Lifecycle of a message's content.
///
/// `Streaming` may move to `Complete` or `Errored`; both terminal states
/// never revert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamingState {
    Complete,
    Streaming,
    Errored,
}

impl StreamingState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, StreamingState::Streaming)
    }
}

impl fmt::Display for StreamingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamingState::Complete => write!(f, "complete"),
            StreamingState::Streaming => write!(f, "streaming"),
            StreamingState::Errored => write!(f, "errored"),
        }
    }
}

/// A message in a conversation (Entity)
///
/// Messages are republished as whole values on every change; consumers
/// should key on [`ChatMessage::id`] rather than hold on to instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub role: Role,
    /// Raw plain-text content as typed or streamed.
    pub content: String,
    /// Sanitized markup derived from `content`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendered: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Quick-reply suggestions, used by system messages.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    pub state: StreamingState,
    /// Failure description for `errored` messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatMessage {
    fn new(role: Role, content: impl Into<String>, state: StreamingState) -> Self {
        Self {
            id: MessageId::generate(),
            role,
            content: content.into(),
            rendered: None,
            timestamp: Utc::now(),
            suggestions: Vec::new(),
            state,
            error: None,
        }
    }

    /// A complete user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, StreamingState::Complete)
    }

    /// A complete system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content, StreamingState::Complete)
    }

    /// An empty assistant message opened for an in-flight turn.
    pub fn assistant_streaming() -> Self {
        Self::new(Role::Assistant, String::new(), StreamingState::Streaming)
    }

    /// A complete assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, StreamingState::Complete)
    }

    pub fn with_id(mut self, id: impl Into<MessageId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn is_streaming(&self) -> bool {
        self.state == StreamingState::Streaming
    }
}

/// A conversation (Entity)
///
/// Serializable snapshot of a session: its identity, title and the
/// ordered message timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: SessionId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            id: SessionId::generate(),
            title: None,
            messages: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<SessionId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the title from `first_message` if the session has none yet.
    pub fn ensure_title(&mut self, first_message: &str) {
        if self.title.is_none() {
            self.title = derive_title(first_message);
        }
    }

    pub fn message(&self, id: &MessageId) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| &m.id == id)
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
