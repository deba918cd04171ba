//! Port for structured conversation logging.
//!
//! Defines the [`ConversationLogger`] trait for recording turn lifecycle
//! events (user input, turn open/close, dropped audio) to a transcript log.
//!
//! This is separate from `tracing` diagnostics: tracing carries
//! human-readable operational messages, while this port captures a
//! machine-readable transcript (JSONL in the infrastructure adapter).

use serde_json::Value;

/// A structured conversation event for logging.
#[derive(Debug, Clone)]
pub struct ConversationEvent {
    /// Event type identifier (e.g., "user_message", "turn_completed").
    pub event_type: &'static str,
    /// JSON payload with event-specific data.
    pub payload: Value,
}

impl ConversationEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }
}

/// Port for logging conversation events.
///
/// `log` is synchronous and infallible; adapters swallow their own I/O
/// failures so a broken transcript never interrupts a turn.
pub trait ConversationLogger: Send + Sync {
    fn log(&self, event: ConversationEvent);
}

/// No-op implementation for tests and when logging is disabled.
pub struct NoConversationLogger;

impl ConversationLogger for NoConversationLogger {
    fn log(&self, _event: ConversationEvent) {}
}
