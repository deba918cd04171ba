//! Receiver lifecycle state machine.
//!
//! ```text
//! Idle ──Connect──▶ Connecting ──Connected──▶ Open ──Frame──▶ Receiving ─┐
//!   │                   │                      │                 ▲ Frame  │
//!   │                   └─────────Close────────┴──────Close──────┴────────┘
//!   └──Close(Cancelled)──▶ Closed(reason)
//! ```
//!
//! Every transition goes through [`ReceiverState::on`]; anything not in the
//! table is an [`InvalidTransition`].

use std::fmt;
use thiserror::Error;

/// Why a receiver closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// `turnComplete` frame or clean end of body.
    Complete,
    /// Transport failure, malformed frame, or server `error` frame.
    Error,
    /// Caller cancelled the turn.
    Cancelled,
}

/// Lifecycle state of a stream receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    Idle,
    Connecting,
    Open,
    Receiving,
    Closed(CloseReason),
}

/// Input to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverInput {
    Connect,
    Connected,
    Frame,
    Close(CloseReason),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid receiver transition from {from} on {input:?}")]
pub struct InvalidTransition {
    pub from: ReceiverState,
    pub input: ReceiverInput,
}

impl ReceiverState {
    /// Apply `input`, returning the next state.
    ///
    /// Closing an already closed receiver keeps the original reason.
    pub fn on(self, input: ReceiverInput) -> Result<ReceiverState, InvalidTransition> {
        use ReceiverInput::*;
        use ReceiverState::*;

        match (self, input) {
            (Idle, Connect) => Ok(Connecting),
            (Connecting, Connected) => Ok(Open),
            (Open | Receiving, Frame) => Ok(Receiving),
            (Connecting | Open | Receiving, Close(reason)) => Ok(Closed(reason)),
            (Idle, Close(CloseReason::Cancelled)) => Ok(Closed(CloseReason::Cancelled)),
            (Closed(reason), Close(_)) => Ok(Closed(reason)),
            (from, input) => Err(InvalidTransition { from, input }),
        }
    }

    pub fn is_closed(self) -> bool {
        matches!(self, ReceiverState::Closed(_))
    }
}

impl fmt::Display for ReceiverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiverState::Idle => write!(f, "idle"),
            ReceiverState::Connecting => write!(f, "connecting"),
            ReceiverState::Open => write!(f, "open"),
            ReceiverState::Receiving => write!(f, "receiving"),
            ReceiverState::Closed(CloseReason::Complete) => write!(f, "closed(complete)"),
            ReceiverState::Closed(CloseReason::Error) => write!(f, "closed(error)"),
            ReceiverState::Closed(CloseReason::Cancelled) => write!(f, "closed(cancelled)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path() {
        let state = ReceiverState::Idle
            .on(ReceiverInput::Connect)
            .and_then(|s| s.on(ReceiverInput::Connected))
            .and_then(|s| s.on(ReceiverInput::Frame))
            .and_then(|s| s.on(ReceiverInput::Frame))
            .and_then(|s| s.on(ReceiverInput::Close(CloseReason::Complete)))
            .unwrap();
        assert_eq!(state, ReceiverState::Closed(CloseReason::Complete));
        assert_eq!(state.to_string(), "closed(complete)");
    }

    #[test]
    fn connect_failure_closes_with_error() {
        let state = ReceiverState::Connecting
            .on(ReceiverInput::Close(CloseReason::Error))
            .unwrap();
        assert_eq!(state, ReceiverState::Closed(CloseReason::Error));
    }

    #[test]
    fn frames_rejected_before_open_and_after_close() {
        assert!(ReceiverState::Connecting.on(ReceiverInput::Frame).is_err());
        let closed = ReceiverState::Closed(CloseReason::Cancelled);
        let err = closed.on(ReceiverInput::Frame).unwrap_err();
        assert_eq!(err.from, closed);
    }

    #[test]
    fn closing_twice_keeps_first_reason() {
        let closed = ReceiverState::Closed(CloseReason::Cancelled);
        assert_eq!(
            closed.on(ReceiverInput::Close(CloseReason::Error)),
            Ok(closed)
        );
    }

    #[test]
    fn idle_can_only_be_cancelled_or_connected() {
        assert!(ReceiverState::Idle.on(ReceiverInput::Close(CloseReason::Error)).is_err());
        assert_eq!(
            ReceiverState::Idle.on(ReceiverInput::Close(CloseReason::Cancelled)),
            Ok(ReceiverState::Closed(CloseReason::Cancelled))
        );
    }

    #[test]
    fn closed_states() {
        assert!(!ReceiverState::Receiving.is_closed());
        assert!(ReceiverState::Closed(CloseReason::Complete).is_closed());
    }
}
