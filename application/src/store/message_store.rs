//! Ordered, append-only-with-patch message collection for one session.
//!
//! Every mutation replaces the affected message with a fresh
//! `Arc<ChatMessage>` and publishes a [`StoreChange`]. Subscribers must key
//! on [`MessageId`] and never rely on pointer identity.
//!
//! The store enforces the timeline invariants itself:
//!
//! - identifiers are unique (a colliding `append` is rejected)
//! - at most one message is `streaming` at any instant
//! - `complete`/`fail` are terminal, idempotent, and never revert
//! - patches are only accepted while the target is `streaming`, so a late
//!   frame arriving after cancellation can never change content

use murmur_domain::{
    ChatMessage, ChatSession, ContentRenderer, DomainError, MessageId, PlainTextRenderer, Role,
    SessionId, StreamingState,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Capacity of the change channel. Slow subscribers that fall further
/// behind receive `Lagged` and should resync from [`MessageStore::messages`].
const CHANGE_CHANNEL_CAPACITY: usize = 512;

/// Reason recorded on messages found mid-stream in a loaded snapshot.
pub const INTERRUPTED_REASON: &str = "The response was interrupted before it finished.";

/// A change published to store subscribers.
#[derive(Debug, Clone)]
pub enum StoreChange {
    /// A message was added at the end of the timeline.
    Appended(Arc<ChatMessage>),
    /// A message was replaced (content patch or state transition).
    Updated(Arc<ChatMessage>),
    /// Transient server progress for an in-flight message.
    Status { id: MessageId, content: String },
}

impl StoreChange {
    pub fn message(&self) -> Option<&Arc<ChatMessage>> {
        match self {
            StoreChange::Appended(m) | StoreChange::Updated(m) => Some(m),
            StoreChange::Status { .. } => None,
        }
    }
}

struct StoreState {
    session_id: SessionId,
    title: Option<String>,
    messages: Vec<Arc<ChatMessage>>,
    index: HashMap<MessageId, usize>,
    streaming: Option<MessageId>,
}

impl StoreState {
    fn position(&self, id: &MessageId) -> Result<usize, DomainError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| DomainError::MessageNotFound(id.clone()))
    }
}

/// Message timeline for one session.
pub struct MessageStore {
    state: Mutex<StoreState>,
    renderer: Arc<dyn ContentRenderer>,
    changes: broadcast::Sender<StoreChange>,
}

impl MessageStore {
    /// Create an empty store for a new session.
    pub fn new(renderer: Arc<dyn ContentRenderer>) -> Self {
        Self::from_session(ChatSession::new(), renderer)
    }

    /// Load a session snapshot.
    ///
    /// A message still marked `streaming` in the snapshot belonged to a turn
    /// that no longer has a receiver; it is loaded as `errored`. Messages
    /// with duplicate identifiers keep their first occurrence.
    pub fn from_session(session: ChatSession, renderer: Arc<dyn ContentRenderer>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let mut state = StoreState {
            session_id: session.id,
            title: session.title,
            messages: Vec::with_capacity(session.messages.len()),
            index: HashMap::new(),
            streaming: None,
        };

        for mut message in session.messages {
            if state.index.contains_key(&message.id) {
                warn!("Dropping duplicate message {} from snapshot", message.id);
                continue;
            }
            if message.state == StreamingState::Streaming {
                message.state = StreamingState::Errored;
                message.error = Some(INTERRUPTED_REASON.to_string());
            }
            message.rendered = Some(renderer.render(&message.content));
            state.index.insert(message.id.clone(), state.messages.len());
            state.messages.push(Arc::new(message));
        }

        Self {
            state: Mutex::new(state),
            renderer,
            changes,
        }
    }

    /// Create an empty store rendering plain text.
    pub fn plain() -> Self {
        Self::new(Arc::new(PlainTextRenderer))
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, change: StoreChange) {
        // No subscribers is fine; the store stays authoritative.
        let _ = self.changes.send(change);
    }

    /// Subscribe to future changes.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    /// Insert `message` at the end of the timeline.
    pub fn append(&self, mut message: ChatMessage) -> Result<Arc<ChatMessage>, DomainError> {
        let appended = {
            let mut state = self.lock();

            if state.index.contains_key(&message.id) {
                return Err(DomainError::DuplicateMessage(message.id));
            }
            if message.is_streaming()
                && let Some(existing) = &state.streaming
            {
                return Err(DomainError::AlreadyStreaming {
                    existing: existing.clone(),
                });
            }

            if message.role == Role::User && state.title.is_none() {
                state.title = murmur_domain::derive_title(&message.content);
            }

            message.rendered = Some(self.renderer.render(&message.content));
            let message = Arc::new(message);
            if message.is_streaming() {
                state.streaming = Some(message.id.clone());
            }
            let position = state.messages.len();
            state.index.insert(message.id.clone(), position);
            state.messages.push(message.clone());
            message
        };

        debug!(
            "Appended {} message {} ({})",
            appended.role, appended.id, appended.state
        );
        self.publish(StoreChange::Appended(appended.clone()));
        Ok(appended)
    }

    /// Append `delta` to a `streaming` message and re-render it.
    pub fn patch(&self, id: &MessageId, delta: &str) -> Result<Arc<ChatMessage>, DomainError> {
        let updated = {
            let mut state = self.lock();
            let position = state.position(id)?;
            let current = &state.messages[position];
            if !current.is_streaming() {
                return Err(DomainError::NotStreaming {
                    id: id.clone(),
                    state: current.state,
                });
            }

            let mut next = ChatMessage::clone(current);
            next.content.push_str(delta);
            next.rendered = Some(self.renderer.render(&next.content));
            let next = Arc::new(next);
            state.messages[position] = next.clone();
            next
        };

        self.publish(StoreChange::Updated(updated.clone()));
        Ok(updated)
    }

    /// Mark a `streaming` message `complete`. No-op if already terminal.
    pub fn complete(&self, id: &MessageId) -> Result<Arc<ChatMessage>, DomainError> {
        self.finish(id, StreamingState::Complete, None)
    }

    /// Mark a `streaming` message `errored`, keeping its partial content.
    /// No-op if already terminal.
    pub fn fail(&self, id: &MessageId, reason: &str) -> Result<Arc<ChatMessage>, DomainError> {
        self.finish(id, StreamingState::Errored, Some(reason.to_string()))
    }

    fn finish(
        &self,
        id: &MessageId,
        target: StreamingState,
        reason: Option<String>,
    ) -> Result<Arc<ChatMessage>, DomainError> {
        let updated = {
            let mut state = self.lock();
            let position = state.position(id)?;
            let current = &state.messages[position];
            if current.state.is_terminal() {
                return Ok(current.clone());
            }

            let mut next = ChatMessage::clone(current);
            next.state = target;
            next.error = reason;
            let next = Arc::new(next);
            state.messages[position] = next.clone();
            if state.streaming.as_ref() == Some(id) {
                state.streaming = None;
            }
            next
        };

        debug!("Message {} is now {}", updated.id, updated.state);
        self.publish(StoreChange::Updated(updated.clone()));
        Ok(updated)
    }

    /// Publish transient status text for a message without touching it.
    pub fn publish_status(&self, id: &MessageId, content: &str) {
        self.publish(StoreChange::Status {
            id: id.clone(),
            content: content.to_string(),
        });
    }

    pub fn get(&self, id: &MessageId) -> Option<Arc<ChatMessage>> {
        let state = self.lock();
        state
            .index
            .get(id)
            .map(|&position| state.messages[position].clone())
    }

    /// Current timeline in display order.
    pub fn messages(&self) -> Vec<Arc<ChatMessage>> {
        self.lock().messages.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identifier of the in-flight message, if any.
    pub fn streaming_id(&self) -> Option<MessageId> {
        self.lock().streaming.clone()
    }

    pub fn session_id(&self) -> SessionId {
        self.lock().session_id.clone()
    }

    pub fn title(&self) -> Option<String> {
        self.lock().title.clone()
    }

    /// Serializable copy of the session.
    pub fn snapshot(&self) -> ChatSession {
        let state = self.lock();
        ChatSession {
            id: state.session_id.clone(),
            title: state.title.clone(),
            messages: state
                .messages
                .iter()
                .map(|m| ChatMessage::clone(m))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn streaming_count(store: &MessageStore) -> usize {
        store.messages().iter().filter(|m| m.is_streaming()).count()
    }

    #[test]
    fn append_preserves_order() {
        let store = MessageStore::plain();
        let a = store.append(ChatMessage::user("first")).unwrap();
        let b = store.append(ChatMessage::assistant("second")).unwrap();
        let ids: Vec<_> = store.messages().iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids, vec![a.id.clone(), b.id.clone()]);
    }

    #[test]
    fn append_rejects_duplicate_id() {
        let store = MessageStore::plain();
        store.append(ChatMessage::user("a").with_id("m1")).unwrap();
        let err = store
            .append(ChatMessage::user("b").with_id("m1"))
            .unwrap_err();
        assert_eq!(err, DomainError::DuplicateMessage(MessageId::from("m1")));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&MessageId::from("m1")).unwrap().content, "a");
    }

    #[test]
    fn append_rejects_second_streaming_message() {
        let store = MessageStore::plain();
        let first = store.append(ChatMessage::assistant_streaming()).unwrap();
        let err = store.append(ChatMessage::assistant_streaming()).unwrap_err();
        assert_eq!(
            err,
            DomainError::AlreadyStreaming {
                existing: first.id.clone()
            }
        );
        assert_eq!(streaming_count(&store), 1);
    }

    #[test]
    fn streaming_slot_frees_after_completion() {
        let store = MessageStore::plain();
        let first = store.append(ChatMessage::assistant_streaming()).unwrap();
        store.complete(&first.id).unwrap();
        assert!(store.streaming_id().is_none());
        assert!(store.append(ChatMessage::assistant_streaming()).is_ok());
        assert_eq!(streaming_count(&store), 1);
    }

    #[test]
    fn patch_appends_and_renders() {
        let store = MessageStore::plain();
        let msg = store.append(ChatMessage::assistant_streaming()).unwrap();
        store.patch(&msg.id, "Hi").unwrap();
        let updated = store.patch(&msg.id, " <b>").unwrap();
        assert_eq!(updated.content, "Hi <b>");
        assert_eq!(updated.rendered.as_deref(), Some("Hi &lt;b&gt;"));
    }

    #[test]
    fn patch_replaces_message_instance() {
        let store = MessageStore::plain();
        let before = store.append(ChatMessage::assistant_streaming()).unwrap();
        let after = store.patch(&before.id, "x").unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(before.id, after.id);
        assert!(before.content.is_empty());
    }

    #[test]
    fn patch_rejected_after_complete() {
        let store = MessageStore::plain();
        let msg = store.append(ChatMessage::assistant_streaming()).unwrap();
        store.patch(&msg.id, "partial").unwrap();
        store.complete(&msg.id).unwrap();
        let err = store.patch(&msg.id, " late").unwrap_err();
        assert!(err.is_terminal_write());
        assert_eq!(store.get(&msg.id).unwrap().content, "partial");
    }

    #[test]
    fn patch_unknown_id() {
        let store = MessageStore::plain();
        let err = store.patch(&MessageId::from("nope"), "x").unwrap_err();
        assert_eq!(err, DomainError::MessageNotFound(MessageId::from("nope")));
    }

    #[test]
    fn complete_is_idempotent() {
        let store = MessageStore::plain();
        let msg = store.append(ChatMessage::assistant_streaming()).unwrap();
        let first = store.complete(&msg.id).unwrap();
        let second = store.complete(&msg.id).unwrap();
        assert_eq!(first.state, StreamingState::Complete);
        assert_eq!(second.state, StreamingState::Complete);
    }

    #[test]
    fn terminal_states_never_revert() {
        let store = MessageStore::plain();
        let msg = store.append(ChatMessage::assistant_streaming()).unwrap();
        store.fail(&msg.id, "network").unwrap();
        let after = store.complete(&msg.id).unwrap();
        assert_eq!(after.state, StreamingState::Errored);
        assert_eq!(after.error.as_deref(), Some("network"));

        let other = store.append(ChatMessage::assistant_streaming()).unwrap();
        store.complete(&other.id).unwrap();
        let after = store.fail(&other.id, "late").unwrap();
        assert_eq!(after.state, StreamingState::Complete);
        assert!(after.error.is_none());
    }

    #[test]
    fn fail_keeps_partial_content() {
        let store = MessageStore::plain();
        let msg = store.append(ChatMessage::assistant_streaming()).unwrap();
        store.patch(&msg.id, "partial").unwrap();
        let failed = store.fail(&msg.id, "dropped").unwrap();
        assert_eq!(failed.content, "partial");
        assert_eq!(failed.state, StreamingState::Errored);
    }

    #[test]
    fn first_user_message_sets_title() {
        let store = MessageStore::plain();
        store.append(ChatMessage::system("Welcome")).unwrap();
        assert!(store.title().is_none());
        store.append(ChatMessage::user("Plan my week")).unwrap();
        store.append(ChatMessage::user("Something else")).unwrap();
        assert_eq!(store.title().as_deref(), Some("Plan my week"));
    }

    #[tokio::test]
    async fn subscribers_see_changes_in_order() {
        let store = MessageStore::plain();
        let mut rx = store.subscribe();
        let msg = store.append(ChatMessage::assistant_streaming()).unwrap();
        store.patch(&msg.id, "a").unwrap();
        store.publish_status(&msg.id, "thinking");
        store.complete(&msg.id).unwrap();

        assert!(matches!(rx.recv().await.unwrap(), StoreChange::Appended(_)));
        match rx.recv().await.unwrap() {
            StoreChange::Updated(m) => assert_eq!(m.content, "a"),
            other => panic!("unexpected change: {:?}", other),
        }
        match rx.recv().await.unwrap() {
            StoreChange::Status { content, .. } => assert_eq!(content, "thinking"),
            other => panic!("unexpected change: {:?}", other),
        }
        match rx.recv().await.unwrap() {
            StoreChange::Updated(m) => assert_eq!(m.state, StreamingState::Complete),
            other => panic!("unexpected change: {:?}", other),
        }
    }

    #[test]
    fn snapshot_round_trips_through_from_session() {
        let store = MessageStore::plain();
        store.append(ChatMessage::user("Hello")).unwrap();
        let reply = store.append(ChatMessage::assistant_streaming()).unwrap();
        store.patch(&reply.id, "Hi").unwrap();

        let snapshot = store.snapshot();
        let restored = MessageStore::from_session(snapshot.clone(), Arc::new(PlainTextRenderer));
        assert_eq!(restored.session_id(), snapshot.id);
        assert_eq!(restored.len(), 2);

        // The in-flight reply had no receiver left; it loads as errored.
        let loaded = restored.get(&reply.id).unwrap();
        assert_eq!(loaded.state, StreamingState::Errored);
        assert_eq!(loaded.content, "Hi");
        assert!(restored.streaming_id().is_none());
    }
}
