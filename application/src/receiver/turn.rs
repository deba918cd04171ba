//! Shared turn plumbing for both receivers.
//!
//! [`TurnWriter`] applies decoded frames to the store and playback
//! controller for one assistant message, dispatching on its lifecycle
//! state. [`pump`] drives a [`FrameStream`] into the writer, honouring
//! cancellation.

use crate::audio::playback::AudioPlaybackController;
use crate::ports::conversation_logger::{ConversationEvent, ConversationLogger};
use crate::ports::transport::{ByteStream, TransportError};
use crate::receiver::framing::{FrameError, FrameStream, with_idle_timeout};
use crate::receiver::state::{CloseReason, InvalidTransition, ReceiverInput, ReceiverState};
use crate::store::MessageStore;
use futures::StreamExt;
use murmur_domain::{DecodeError, DomainError, MessageId, StreamEvent};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Failure text stored on a message whose turn broke at the transport or
/// framing level. Details go to the logs, not the timeline.
pub const TURN_FAILED_MESSAGE: &str =
    "The connection was interrupted before the reply finished. Please try again.";

/// Why a turn failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TurnError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Store error: {0}")]
    Store(#[from] DomainError),

    #[error("Protocol violation: {0}")]
    ProtocolViolation(#[from] InvalidTransition),

    #[error("Receiver task aborted: {0}")]
    Aborted(String),
}

impl From<FrameError> for TurnError {
    fn from(error: FrameError) -> Self {
        match error {
            FrameError::Transport(e) => TurnError::Transport(e),
            FrameError::Decode(e) => TurnError::Decode(e),
        }
    }
}

impl TurnError {
    /// Text recorded on the failed message.
    pub fn user_message(&self) -> String {
        match self {
            TurnError::Server(message) => message.clone(),
            _ => TURN_FAILED_MESSAGE.to_string(),
        }
    }
}

/// How a turn ended, with the content accumulated up to that point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed { content: String },
    Failed { content: String, error: TurnError },
    Cancelled { content: String },
}

impl TurnOutcome {
    pub fn content(&self) -> &str {
        match self {
            TurnOutcome::Completed { content }
            | TurnOutcome::Failed { content, .. }
            | TurnOutcome::Cancelled { content } => content,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TurnOutcome::Completed { .. })
    }

    fn close_reason(&self) -> CloseReason {
        match self {
            TurnOutcome::Completed { .. } => CloseReason::Complete,
            TurnOutcome::Failed { .. } => CloseReason::Error,
            TurnOutcome::Cancelled { .. } => CloseReason::Cancelled,
        }
    }
}

/// Everything a receiver needs to write one assistant message.
#[derive(Clone)]
pub struct TurnContext {
    pub store: Arc<MessageStore>,
    pub playback: Arc<AudioPlaybackController>,
    pub message_id: MessageId,
    pub cancel: CancellationToken,
    pub idle_timeout: Option<Duration>,
    pub logger: Arc<dyn ConversationLogger>,
}

/// Applies frames of one turn to the store.
///
/// Keeps an accumulator alongside the store; after every accepted patch
/// the stored content equals the accumulator exactly.
pub struct TurnWriter {
    ctx: TurnContext,
    accumulated: String,
    state: watch::Sender<ReceiverState>,
}

impl TurnWriter {
    pub fn new(ctx: TurnContext) -> Self {
        let (state, _) = watch::channel(ReceiverState::Idle);
        Self {
            ctx,
            accumulated: String::new(),
            state,
        }
    }

    pub fn state(&self) -> ReceiverState {
        *self.state.borrow()
    }

    /// Follow lifecycle changes from outside the receiver task.
    pub fn watch_state(&self) -> watch::Receiver<ReceiverState> {
        self.state.subscribe()
    }

    pub fn message_id(&self) -> &MessageId {
        &self.ctx.message_id
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.ctx.cancel
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.ctx.idle_timeout
    }

    pub fn is_cancelled(&self) -> bool {
        self.ctx.cancel.is_cancelled()
    }

    /// Advance the lifecycle state machine. The state is left unchanged
    /// when `input` is not accepted.
    pub fn transition(&mut self, input: ReceiverInput) -> Result<(), InvalidTransition> {
        let current = self.state();
        let next = current.on(input)?;
        if next != current {
            debug!(
                "Receiver for {}: {} -> {}",
                self.ctx.message_id, current, next
            );
            self.state.send_replace(next);
        }
        Ok(())
    }

    /// Apply one frame.
    ///
    /// Frames are only accepted while open or receiving. A frame in any
    /// other state closes the turn as a protocol violation.
    pub async fn apply(&mut self, event: StreamEvent) -> ControlFlow<TurnOutcome> {
        if self.is_cancelled() {
            return ControlFlow::Break(self.cancelled());
        }
        if let Err(violation) = self.transition(ReceiverInput::Frame) {
            return ControlFlow::Break(self.reject(violation));
        }

        match event {
            StreamEvent::Text { content } => {
                if content.is_empty() {
                    return ControlFlow::Continue(());
                }
                match self.ctx.store.patch(&self.ctx.message_id, &content) {
                    Ok(_) => {
                        self.accumulated.push_str(&content);
                        ControlFlow::Continue(())
                    }
                    // Someone else closed the message (cancellation won the race).
                    Err(e) if e.is_terminal_write() => ControlFlow::Break(self.cancelled()),
                    Err(e) => ControlFlow::Break(self.fail(TurnError::Store(e))),
                }
            }
            StreamEvent::Audio { data, mime_type } => {
                self.ctx.playback.play_chunk(&data, &mime_type).await;
                ControlFlow::Continue(())
            }
            StreamEvent::Status { content } => {
                debug!("Status for {}: {}", self.ctx.message_id, content);
                self.ctx.store.publish_status(&self.ctx.message_id, &content);
                ControlFlow::Continue(())
            }
            StreamEvent::TurnComplete => ControlFlow::Break(self.complete()),
            StreamEvent::Error { message } => {
                ControlFlow::Break(self.fail(TurnError::Server(message)))
            }
            StreamEvent::Unknown { event_type } => {
                debug!("Ignoring frame with unknown type {:?}", event_type);
                ControlFlow::Continue(())
            }
        }
    }

    /// Close the turn as complete.
    pub fn complete(&mut self) -> TurnOutcome {
        if let Err(e) = self.ctx.store.complete(&self.ctx.message_id) {
            warn!("Could not complete {}: {}", self.ctx.message_id, e);
        }
        let outcome = TurnOutcome::Completed {
            content: self.accumulated.clone(),
        };
        self.close(&outcome);
        info!(
            "Turn {} completed ({} chars)",
            self.ctx.message_id,
            self.accumulated.chars().count()
        );
        self.ctx.logger.log(ConversationEvent::new(
            "turn_completed",
            serde_json::json!({
                "message_id": self.ctx.message_id.as_str(),
                "content": self.accumulated,
            }),
        ));
        outcome
    }

    /// Close the turn as failed, keeping partial content visible.
    pub fn fail(&mut self, error: TurnError) -> TurnOutcome {
        if let Err(e) = self
            .ctx
            .store
            .fail(&self.ctx.message_id, &error.user_message())
        {
            warn!("Could not fail {}: {}", self.ctx.message_id, e);
        }
        warn!("Turn {} failed: {}", self.ctx.message_id, error);
        self.ctx.logger.log(ConversationEvent::new(
            "turn_failed",
            serde_json::json!({
                "message_id": self.ctx.message_id.as_str(),
                "error": error.to_string(),
                "partial_content": self.accumulated,
            }),
        ));
        let outcome = TurnOutcome::Failed {
            content: self.accumulated.clone(),
            error,
        };
        self.close(&outcome);
        outcome
    }

    /// Close the turn after cancellation; the message keeps its partial
    /// content and is marked complete.
    pub fn cancelled(&mut self) -> TurnOutcome {
        if let Err(e) = self.ctx.store.complete(&self.ctx.message_id) {
            warn!("Could not complete cancelled {}: {}", self.ctx.message_id, e);
        }
        let outcome = TurnOutcome::Cancelled {
            content: self.accumulated.clone(),
        };
        self.close(&outcome);
        debug!("Turn {} cancelled", self.ctx.message_id);
        outcome
    }

    /// Refuse a frame the current state does not accept. A closed turn
    /// has already written its final state, so the store is left alone.
    fn reject(&mut self, violation: InvalidTransition) -> TurnOutcome {
        if violation.from.is_closed() {
            warn!("Receiver for {}: {}", self.ctx.message_id, violation);
            return TurnOutcome::Failed {
                content: self.accumulated.clone(),
                error: TurnError::ProtocolViolation(violation),
            };
        }
        self.fail(TurnError::ProtocolViolation(violation))
    }

    fn close(&mut self, outcome: &TurnOutcome) {
        if let Err(e) = self.transition(ReceiverInput::Close(outcome.close_reason())) {
            warn!("Receiver for {}: {}", self.ctx.message_id, e);
        }
    }
}

/// Read `frames` to the end of the turn.
///
/// The frames (and the body under them) are dropped on return, which
/// closes the connection from the receiver side regardless of how the turn
/// ended.
pub async fn pump(mut frames: FrameStream, writer: &mut TurnWriter) -> TurnOutcome {
    let cancel = writer.cancel_token().clone();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return writer.cancelled(),
            next = frames.next() => next,
        };

        match next {
            Some(Ok(event)) => {
                if let ControlFlow::Break(outcome) = writer.apply(event).await {
                    return outcome;
                }
            }
            Some(Err(e)) => {
                if writer.is_cancelled() {
                    return writer.cancelled();
                }
                return writer.fail(e.into());
            }
            None => {
                debug!(
                    "Body for {} ended without turnComplete",
                    writer.message_id()
                );
                return writer.complete();
            }
        }
    }
}

/// Open the body with `open`, frame it with `framing` and pump it to the
/// end of the turn.
///
/// Cancellation before the connection is established closes the turn
/// without reading anything. The idle timeout bounds the connect and every
/// read.
pub async fn run_turn<F>(
    writer: &mut TurnWriter,
    open: F,
    framing: fn(ByteStream) -> FrameStream,
) -> TurnOutcome
where
    F: std::future::Future<Output = Result<ByteStream, TransportError>>,
{
    let cancel = writer.cancel_token().clone();
    if cancel.is_cancelled() {
        return writer.cancelled();
    }
    if let Err(e) = writer.transition(ReceiverInput::Connect) {
        return writer.fail(e.into());
    }

    let idle_timeout = writer.idle_timeout();
    let connect = async move {
        match idle_timeout {
            Some(limit) => tokio::time::timeout(limit, open)
                .await
                .unwrap_or(Err(TransportError::IdleTimeout(limit))),
            None => open.await,
        }
    };

    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => return writer.cancelled(),
        opened = connect => opened,
    };

    match opened {
        Ok(body) => {
            if let Err(e) = writer.transition(ReceiverInput::Connected) {
                return writer.fail(e.into());
            }
            pump(framing(with_idle_timeout(body, idle_timeout)), writer).await
        }
        Err(e) => writer.fail(TurnError::Transport(e)),
    }
}
