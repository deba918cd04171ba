//! Session Controller
//!
//! Entry point for user actions on a session. Appends the user message and
//! the streaming assistant placeholder, opens the configured transport and
//! runs the receiver on a spawned task. At most one turn is in flight: a
//! new send cancels the previous turn first.

use crate::audio::{AudioCaptureController, AudioPlaybackController};
use crate::config::{SessionConfig, TransportKind};
use crate::ports::conversation_logger::{
    ConversationEvent, ConversationLogger, NoConversationLogger,
};
use crate::ports::media::CaptureError;
use crate::ports::transport::StreamTransport;
use crate::receiver::{
    ChunkedStreamReceiver, ReceiverState, TextStreamReceiver, TurnContext, TurnError,
    TurnOutcome,
};
use crate::store::MessageStore;
use murmur_domain::{
    AudioBlob, ChatMessage, ChatSession, ChunkedRequestBody, ContentRenderer, DomainError,
    EventStreamRequestBody, MessageId,
};
use futures::FutureExt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Content shown for the user side of a voice turn.
pub const VOICE_MESSAGE_PLACEHOLDER: &str = "[Voice message]";

/// Errors returned synchronously by session actions.
///
/// Failures after the turn has started are reported through the message
/// state and [`TurnOutcome`], not here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Capture(#[from] CaptureError),
}

/// Body of the request for one turn.
enum TurnRequest {
    EventStream(EventStreamRequestBody),
    Chunked(ChunkedRequestBody),
}

impl TurnRequest {
    fn transport_name(&self) -> &'static str {
        match self {
            TurnRequest::EventStream(_) => "sse",
            TurnRequest::Chunked(_) => "chunked",
        }
    }
}

struct ActiveTurn {
    message_id: MessageId,
    cancel: CancellationToken,
}

/// A running turn.
pub struct TurnHandle {
    message_id: MessageId,
    store: Arc<MessageStore>,
    state: watch::Receiver<ReceiverState>,
    join: JoinHandle<TurnOutcome>,
}

impl TurnHandle {
    /// The assistant message this turn writes to.
    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    /// Current lifecycle state of the turn's receiver.
    pub fn state(&self) -> ReceiverState {
        *self.state.borrow()
    }

    /// Follow the receiver's lifecycle.
    pub fn watch_state(&self) -> watch::Receiver<ReceiverState> {
        self.state.clone()
    }

    /// Wait for the turn to close.
    pub async fn wait(self) -> TurnOutcome {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(e) => {
                let error = TurnError::Aborted(e.to_string());
                let _ = self.store.fail(&self.message_id, &error.user_message());
                let content = self
                    .store
                    .get(&self.message_id)
                    .map(|m| m.content.clone())
                    .unwrap_or_default();
                TurnOutcome::Failed { content, error }
            }
        }
    }
}

/// Orchestrates turns for one session.
pub struct SessionController {
    store: Arc<MessageStore>,
    transport: Arc<dyn StreamTransport>,
    playback: Arc<AudioPlaybackController>,
    config: SessionConfig,
    logger: Arc<dyn ConversationLogger>,
    active: Arc<Mutex<Option<ActiveTurn>>>,
}

impl SessionController {
    pub fn new(
        store: Arc<MessageStore>,
        transport: Arc<dyn StreamTransport>,
        playback: Arc<AudioPlaybackController>,
        config: SessionConfig,
    ) -> Self {
        Self {
            store,
            transport,
            playback,
            config,
            logger: Arc::new(NoConversationLogger),
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Reload a session from a snapshot.
    ///
    /// Messages the snapshot caught mid-stream are loaded as `errored`;
    /// their turns cannot be resumed.
    pub fn resume(
        snapshot: ChatSession,
        renderer: Arc<dyn ContentRenderer>,
        transport: Arc<dyn StreamTransport>,
        playback: Arc<AudioPlaybackController>,
        config: SessionConfig,
    ) -> Self {
        info!(
            "Resuming session {} ({} messages)",
            snapshot.id,
            snapshot.messages.len()
        );
        let store = Arc::new(MessageStore::from_session(snapshot, renderer));
        Self::new(store, transport, playback, config)
    }

    pub fn with_conversation_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn store(&self) -> &Arc<MessageStore> {
        &self.store
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Serializable copy of the session for persistence.
    pub fn snapshot(&self) -> ChatSession {
        self.store.snapshot()
    }

    /// Whether a turn is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.active_guard().is_some()
    }

    /// Show the configured greeting on an empty session.
    pub fn greet(&self) -> Option<Arc<ChatMessage>> {
        let greeting = self.config.greeting.as_ref()?;
        if !self.store.is_empty() {
            return None;
        }
        let message =
            ChatMessage::system(greeting.clone()).with_suggestions(self.config.suggestions.clone());
        match self.store.append(message) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!("Could not add greeting: {}", e);
                None
            }
        }
    }

    /// Send a typed message.
    pub fn send_text(&self, text: &str) -> Result<TurnHandle, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DomainError::EmptyInput.into());
        }

        let request = match self.config.transport {
            TransportKind::Sse => TurnRequest::EventStream(
                EventStreamRequestBody::new(text)
                    .with_system_instruction(self.config.system_instruction.clone())
                    .with_voice_name(self.config.voice_name.clone()),
            ),
            TransportKind::Chunked => TurnRequest::Chunked(
                ChunkedRequestBody::text(text)
                    .with_system_instruction(self.config.system_instruction.clone()),
            ),
        };

        self.begin_turn(ChatMessage::user(text), request)
    }

    /// Send a recorded voice message over the chunked transport.
    pub fn send_audio(&self, blob: &AudioBlob) -> Result<TurnHandle, SessionError> {
        if blob.is_empty() {
            return Err(DomainError::EmptyInput.into());
        }
        let request = TurnRequest::Chunked(
            ChunkedRequestBody::audio(blob)
                .with_system_instruction(self.config.system_instruction.clone()),
        );
        self.begin_turn(ChatMessage::user(VOICE_MESSAGE_PLACEHOLDER), request)
    }

    /// Stop `capture` and send what it recorded.
    pub async fn send_recording(
        &self,
        capture: &AudioCaptureController,
    ) -> Result<TurnHandle, SessionError> {
        let blob = capture.stop().await?;
        self.send_audio(&blob)
    }

    /// Cancel the in-flight turn, keeping whatever content has arrived.
    ///
    /// Returns `false` when nothing was in flight. Safe to call repeatedly.
    pub fn cancel(&self) -> bool {
        let Some(turn) = self.active_guard().take() else {
            return false;
        };
        // Close the message before signalling, so a receiver already past
        // its cancellation check cannot patch it.
        if let Err(e) = self.store.complete(&turn.message_id) {
            warn!("Could not close cancelled turn {}: {}", turn.message_id, e);
        }
        turn.cancel.cancel();
        self.playback.reset_queue();
        info!("Cancelled turn {}", turn.message_id);
        self.logger.log(ConversationEvent::new(
            "turn_cancelled",
            serde_json::json!({ "message_id": turn.message_id.as_str() }),
        ));
        true
    }

    fn begin_turn(
        &self,
        user_message: ChatMessage,
        request: TurnRequest,
    ) -> Result<TurnHandle, SessionError> {
        // Output creation must happen in the user action that sends.
        self.playback.activate();
        self.cancel();

        let user = self.store.append(user_message)?;
        self.logger.log(ConversationEvent::new(
            "user_message",
            serde_json::json!({
                "message_id": user.id.as_str(),
                "content": user.content,
            }),
        ));

        let assistant = self.store.append(ChatMessage::assistant_streaming())?;
        let message_id = assistant.id.clone();
        let cancel = CancellationToken::new();
        *self.active_guard() = Some(ActiveTurn {
            message_id: message_id.clone(),
            cancel: cancel.clone(),
        });

        info!(
            "Opening {} turn {}",
            request.transport_name(),
            message_id
        );
        self.logger.log(ConversationEvent::new(
            "turn_opened",
            serde_json::json!({
                "message_id": message_id.as_str(),
                "transport": request.transport_name(),
            }),
        ));

        let ctx = TurnContext {
            store: self.store.clone(),
            playback: self.playback.clone(),
            message_id: message_id.clone(),
            cancel,
            idle_timeout: self.config.idle_timeout,
            logger: self.logger.clone(),
        };
        let transport = self.transport.clone();
        let active = self.active.clone();
        let turn_id = message_id.clone();

        let (state, receive) = match request {
            TurnRequest::EventStream(body) => {
                let receiver = TextStreamReceiver::new(ctx);
                let state = receiver.watch_state();
                let receive =
                    async move { receiver.run(transport.as_ref(), &body).await }.boxed();
                (state, receive)
            }
            TurnRequest::Chunked(body) => {
                let receiver = ChunkedStreamReceiver::new(ctx);
                let state = receiver.watch_state();
                let receive =
                    async move { receiver.run(transport.as_ref(), &body).await }.boxed();
                (state, receive)
            }
        };

        let join = tokio::spawn(async move {
            let outcome = receive.await;

            let mut active = active.lock().unwrap_or_else(PoisonError::into_inner);
            if active.as_ref().is_some_and(|turn| turn.message_id == turn_id) {
                *active = None;
            }
            debug!("Turn {} closed", turn_id);
            outcome
        });

        Ok(TurnHandle {
            message_id,
            store: self.store.clone(),
            state,
            join,
        })
    }

    fn active_guard(&self) -> MutexGuard<'_, Option<ActiveTurn>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::PlaybackContext;
    use crate::config::PlaybackPolicy;
    use crate::ports::transport::TransportError;
    use crate::store::StoreChange;
    use crate::testing::{
        FakeOutputFactory, FakeTransport, RecordingLogger, body, channel_body, chunk,
    };
    use murmur_domain::{ChunkedRequestKind, Role, StreamingState};

    struct Fixture {
        controller: SessionController,
        transport: Arc<FakeTransport>,
        factory: Arc<FakeOutputFactory>,
        logger: Arc<RecordingLogger>,
    }

    fn fixture(config: SessionConfig) -> Fixture {
        let transport = Arc::new(FakeTransport::new());
        let factory = Arc::new(FakeOutputFactory::default());
        let logger = Arc::new(RecordingLogger::default());
        let playback = Arc::new(AudioPlaybackController::new(
            Arc::new(PlaybackContext::new(factory.clone())),
            PlaybackPolicy::Immediate,
        ));
        let controller = SessionController::new(
            Arc::new(MessageStore::plain()),
            transport.clone(),
            playback,
            config,
        )
        .with_conversation_logger(logger.clone());
        Fixture {
            controller,
            transport,
            factory,
            logger,
        }
    }

    fn text_frame(content: &str) -> String {
        format!("data: {{\"type\":\"text\",\"content\":\"{}\"}}\n\n", content)
    }

    const TURN_COMPLETE: &str = "data: {\"type\":\"turnComplete\"}\n\n";

    #[tokio::test]
    async fn test_send_text_round_trip() {
        let f = fixture(SessionConfig::default().with_system_instruction("Be brief"));
        let (hi, there, bang) = (text_frame("Hi"), text_frame(" there"), text_frame("!"));
        f.transport.push(Ok(body(&[
            hi.as_str(),
            there.as_str(),
            bang.as_str(),
            TURN_COMPLETE,
        ])));

        let handle = f.controller.send_text("Hello").unwrap();
        let outcome = handle.wait().await;
        assert_eq!(outcome.content(), "Hi there!");

        let messages = f.controller.store().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "Hello");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "Hi there!");
        assert_eq!(messages[1].state, StreamingState::Complete);

        let request = &f.transport.event_stream_requests()[0];
        assert_eq!(request.message, "Hello");
        assert_eq!(request.system_instruction.as_deref(), Some("Be brief"));

        assert_eq!(f.controller.store().title().as_deref(), Some("Hello"));
        assert_eq!(f.factory.created(), 1);
        assert!(!f.controller.is_busy());
        assert_eq!(
            f.logger.event_types(),
            vec!["user_message", "turn_opened", "turn_completed"]
        );
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected() {
        let f = fixture(SessionConfig::default());
        assert_eq!(
            f.controller.send_text("   ").err(),
            Some(SessionError::Domain(DomainError::EmptyInput))
        );
        assert!(f.controller.store().is_empty());
        assert!(f.transport.event_stream_requests().is_empty());
    }

    #[tokio::test]
    async fn test_network_error_marks_message_errored() {
        let f = fixture(SessionConfig::default());
        let (tx, stream) = channel_body();
        f.transport.push(Ok(stream));
        tx.send(chunk(&text_frame("partial"))).unwrap();
        tx.send(Err(TransportError::Read("reset".into()))).unwrap();

        let outcome = f.controller.send_text("Hello").unwrap().wait().await;
        assert!(matches!(outcome, TurnOutcome::Failed { .. }));

        let reply = &f.controller.store().messages()[1];
        assert_eq!(reply.content, "partial");
        assert_eq!(reply.state, StreamingState::Errored);
        assert!(reply.error.is_some());
        assert!(f.logger.event_types().contains(&"turn_failed"));
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent_and_ignores_late_frames() {
        let f = fixture(SessionConfig::default());
        let (tx, stream) = channel_body();
        f.transport.push(Ok(stream));
        tx.send(chunk(&text_frame("Hel"))).unwrap();

        let handle = f.controller.send_text("Hello").unwrap();
        let id = handle.message_id().clone();
        while f.controller.store().get(&id).unwrap().content.is_empty() {
            tokio::task::yield_now().await;
        }

        assert!(f.controller.cancel());
        // The message is closed by the time cancel returns.
        assert_eq!(
            f.controller.store().get(&id).unwrap().state,
            StreamingState::Complete
        );
        assert!(!f.controller.cancel());
        let _ = tx.send(chunk(&text_frame("lo")));

        let mut state = handle.watch_state();
        let outcome = handle.wait().await;
        assert_eq!(
            *state.borrow_and_update(),
            ReceiverState::Closed(crate::receiver::CloseReason::Cancelled)
        );
        assert!(matches!(outcome, TurnOutcome::Cancelled { .. }));
        let reply = f.controller.store().get(&id).unwrap();
        assert_eq!(reply.content, "Hel");
        assert_eq!(reply.state, StreamingState::Complete);
        assert!(tx.is_closed());
        assert!(!f.controller.is_busy());
        assert!(f.logger.event_types().contains(&"turn_cancelled"));
    }

    #[tokio::test]
    async fn test_new_send_cancels_previous_turn() {
        let f = fixture(SessionConfig::default());
        let (first_tx, first_body) = channel_body();
        f.transport.push(Ok(first_body));
        first_tx.send(chunk(&text_frame("one"))).unwrap();
        let second = text_frame("two");
        f.transport.push(Ok(body(&[second.as_str(), TURN_COMPLETE])));

        let first = f.controller.send_text("First").unwrap();
        let first_id = first.message_id().clone();
        while f.controller.store().get(&first_id).unwrap().content.is_empty() {
            tokio::task::yield_now().await;
        }

        let mut changes = f.controller.store().subscribe();
        let second = f.controller.send_text("Second").unwrap();

        // Only one message may be streaming at any point.
        assert_eq!(
            f.controller.store().streaming_id().as_ref(),
            Some(second.message_id())
        );
        assert!(matches!(first.wait().await, TurnOutcome::Cancelled { .. }));
        assert!(second.wait().await.is_completed());

        let messages = f.controller.store().messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].content, "one");
        assert_eq!(messages[1].state, StreamingState::Complete);
        assert_eq!(messages[3].content, "two");

        let mut streaming = 0usize;
        while let Ok(change) = changes.try_recv() {
            if let StoreChange::Appended(m) = change
                && m.is_streaming()
            {
                streaming += 1;
            }
        }
        assert_eq!(streaming, 1);
    }

    #[tokio::test]
    async fn test_send_audio_uses_chunked_transport() {
        let f = fixture(SessionConfig::default());
        let reply = text_frame("heard you").replace("\n\n", "\n");
        f.transport.push(Ok(body(&[reply.as_str(), "data: {\"type\":\"turnComplete\"}\n"])));

        let blob = AudioBlob::new(vec![9, 9, 9], "audio/webm;codecs=opus");
        let outcome = f.controller.send_audio(&blob).unwrap().wait().await;
        assert_eq!(outcome.content(), "heard you");

        let request = &f.transport.chunked_requests()[0];
        assert_eq!(request.kind, ChunkedRequestKind::Audio);
        assert_eq!(request.audio_data.as_deref(), Some(blob.to_base64().as_str()));
        assert_eq!(
            f.controller.store().messages()[0].content,
            VOICE_MESSAGE_PLACEHOLDER
        );
        assert!(f.transport.event_stream_requests().is_empty());
    }

    #[tokio::test]
    async fn test_chunked_transport_for_text() {
        let f = fixture(SessionConfig::default().with_transport(TransportKind::Chunked));
        f.transport.push(Ok(body(&["data: {\"type\":\"text\",\"content\":\"ok\"}\n"])));

        let outcome = f.controller.send_text("ping").unwrap().wait().await;
        assert!(outcome.is_completed());
        let request = &f.transport.chunked_requests()[0];
        assert_eq!(request.kind, ChunkedRequestKind::Text);
        assert_eq!(request.message.as_deref(), Some("ping"));
    }

    #[tokio::test]
    async fn test_greeting_only_on_empty_session() {
        let f = fixture(
            SessionConfig::default()
                .with_greeting("How can I help?", vec!["Tell me a joke".to_string()]),
        );
        let greeting = f.controller.greet().unwrap();
        assert_eq!(greeting.role, Role::System);
        assert_eq!(greeting.suggestions, vec!["Tell me a joke".to_string()]);
        assert!(f.controller.greet().is_none());
        assert_eq!(f.controller.store().len(), 1);
        // A greeting is not a user message and does not set the title.
        assert!(f.controller.store().title().is_none());
    }

    #[tokio::test]
    async fn test_resume_from_snapshot() {
        let f = fixture(SessionConfig::default());
        let (tx, stream) = channel_body();
        f.transport.push(Ok(stream));
        tx.send(chunk(&text_frame("half"))).unwrap();
        let handle = f.controller.send_text("Question").unwrap();
        let id = handle.message_id().clone();
        while f.controller.store().get(&id).unwrap().content.is_empty() {
            tokio::task::yield_now().await;
        }

        let snapshot = f.controller.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: ChatSession = serde_json::from_str(&json).unwrap();

        let resumed = SessionController::resume(
            restored,
            Arc::new(murmur_domain::PlainTextRenderer),
            Arc::new(FakeTransport::new()),
            Arc::new(AudioPlaybackController::new(
                Arc::new(PlaybackContext::new(Arc::new(FakeOutputFactory::default()))),
                PlaybackPolicy::Immediate,
            )),
            SessionConfig::default(),
        );
        let reply = resumed.store().get(&id).unwrap();
        assert_eq!(reply.content, "half");
        assert_eq!(reply.state, StreamingState::Errored);
        assert_eq!(resumed.store().session_id(), f.controller.store().session_id());
        assert_eq!(resumed.store().title().as_deref(), Some("Question"));
        assert!(resumed.store().streaming_id().is_none());

        f.controller.cancel();
        handle.wait().await;
    }

    #[tokio::test]
    async fn test_handle_reports_receiver_state() {
        let f = fixture(SessionConfig::default());
        let (tx, stream) = channel_body();
        f.transport.push(Ok(stream));

        let handle = f.controller.send_text("Hello").unwrap();
        let mut state = handle.watch_state();
        state
            .wait_for(|s| *s == ReceiverState::Open)
            .await
            .unwrap();
        assert_eq!(handle.state(), ReceiverState::Open);

        tx.send(chunk(TURN_COMPLETE)).unwrap();
        state
            .wait_for(|s| s.is_closed())
            .await
            .unwrap();
        assert_eq!(
            handle.state(),
            ReceiverState::Closed(crate::receiver::CloseReason::Complete)
        );
        assert!(handle.wait().await.is_completed());
    }

    #[tokio::test]
    async fn test_cancel_without_turn() {
        let f = fixture(SessionConfig::default());
        assert!(!f.controller.cancel());
        assert!(f.logger.event_types().is_empty());
    }
}
