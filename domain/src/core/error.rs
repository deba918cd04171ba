//! Domain error types

use crate::session::entities::{MessageId, StreamingState};
use thiserror::Error;

/// Domain-level errors
///
/// Raised when an operation would break one of the message timeline
/// invariants (unique identifiers, a single in-flight message, terminal
/// states never reverting).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Message {0} already exists in the session")]
    DuplicateMessage(MessageId),

    #[error("Message {0} not found")]
    MessageNotFound(MessageId),

    #[error("Message {id} is {state}, not streaming")]
    NotStreaming { id: MessageId, state: StreamingState },

    #[error("Message {existing} is already streaming")]
    AlreadyStreaming { existing: MessageId },

    #[error("Message content cannot be empty")]
    EmptyInput,

    #[error("Operation cancelled")]
    Cancelled,
}

impl DomainError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DomainError::Cancelled)
    }

    /// Check if this error was caused by writing to a message that has
    /// already reached a terminal state.
    pub fn is_terminal_write(&self) -> bool {
        matches!(
            self,
            DomainError::NotStreaming {
                state: StreamingState::Complete | StreamingState::Errored,
                ..
            }
        )
    }
}
