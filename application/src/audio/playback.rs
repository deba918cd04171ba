//! Playback of streamed audio chunks.
//!
//! A [`PlaybackContext`] owns the single audio output for the process. It
//! is created lazily on [`PlaybackContext::activate`], normally from a user
//! action, and reused for every later chunk.
//!
//! [`AudioPlaybackController::play_chunk`] never fails: a chunk that cannot
//! be decoded or started is logged and dropped, and the turn carries on.

use crate::config::PlaybackPolicy;
use crate::ports::audio_output::{AudioError, AudioOutput, AudioOutputFactory};
use crate::ports::conversation_logger::{
    ConversationEvent, ConversationLogger, NoConversationLogger,
};
use murmur_domain::AudioBlob;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Lazily created, process-wide audio output.
pub struct PlaybackContext {
    factory: Arc<dyn AudioOutputFactory>,
    output: OnceLock<Arc<dyn AudioOutput>>,
    creating: Mutex<()>,
}

impl PlaybackContext {
    pub fn new(factory: Arc<dyn AudioOutputFactory>) -> Self {
        Self {
            factory,
            output: OnceLock::new(),
            creating: Mutex::new(()),
        }
    }

    /// Create the output if it does not exist yet. Idempotent.
    pub fn activate(&self) -> Result<Arc<dyn AudioOutput>, AudioError> {
        if let Some(output) = self.output.get() {
            return Ok(output.clone());
        }
        let _guard = self.creating.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(output) = self.output.get() {
            return Ok(output.clone());
        }
        let output = self.factory.create()?;
        debug!("Playback context created");
        Ok(self.output.get_or_init(|| output).clone())
    }

    /// The output, if [`activate`](Self::activate) has succeeded before.
    pub fn get(&self) -> Option<Arc<dyn AudioOutput>> {
        self.output.get().cloned()
    }

    pub fn is_active(&self) -> bool {
        self.output.get().is_some()
    }
}

/// What happened to one chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackOutcome {
    /// No playback context exists yet; the chunk was skipped.
    NoContext,
    /// The chunk could not be decoded or started.
    Dropped { reason: String },
    /// The chunk was handed to the output.
    Scheduled { delay: Duration, duration: Duration },
}

/// Decodes and schedules audio chunks on the shared output.
pub struct AudioPlaybackController {
    context: Arc<PlaybackContext>,
    policy: PlaybackPolicy,
    next_start: Mutex<Option<Instant>>,
    logger: Arc<dyn ConversationLogger>,
}

impl AudioPlaybackController {
    pub fn new(context: Arc<PlaybackContext>, policy: PlaybackPolicy) -> Self {
        Self {
            context,
            policy,
            next_start: Mutex::new(None),
            logger: Arc::new(NoConversationLogger),
        }
    }

    pub fn with_conversation_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn context(&self) -> &Arc<PlaybackContext> {
        &self.context
    }

    pub fn policy(&self) -> PlaybackPolicy {
        self.policy
    }

    /// Activate the playback context. Failures are logged, not returned.
    pub fn activate(&self) -> bool {
        match self.context.activate() {
            Ok(_) => true,
            Err(e) => {
                warn!("Audio playback unavailable: {}", e);
                false
            }
        }
    }

    /// Decode a base64 chunk and start it on the output.
    pub async fn play_chunk(&self, data: &str, mime_type: &str) -> PlaybackOutcome {
        let Some(output) = self.context.get() else {
            warn!("Received audio before a playback context existed; dropping chunk");
            return PlaybackOutcome::NoContext;
        };

        let blob = match AudioBlob::from_base64(data, mime_type) {
            Ok(blob) => blob,
            Err(e) => return self.drop_chunk(mime_type, e.to_string()),
        };

        let buffer = match output.decode(&blob.data, &blob.mime_type).await {
            Ok(buffer) => buffer,
            Err(e) => return self.drop_chunk(mime_type, e.to_string()),
        };

        let duration = buffer.duration();
        let delay = self.schedule(duration);
        match output.start(buffer, delay) {
            Ok(()) => {
                debug!(
                    "Scheduled {:?} of audio after {:?} ({})",
                    duration, delay, mime_type
                );
                PlaybackOutcome::Scheduled { delay, duration }
            }
            Err(e) => self.drop_chunk(mime_type, e.to_string()),
        }
    }

    /// Forget queued timing, e.g. when a turn is cancelled.
    pub fn reset_queue(&self) {
        *self.next_start.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn schedule(&self, duration: Duration) -> Duration {
        match self.policy {
            PlaybackPolicy::Immediate => Duration::ZERO,
            PlaybackPolicy::Sequential => {
                let now = Instant::now();
                let mut next = self.next_start.lock().unwrap_or_else(PoisonError::into_inner);
                let start = match *next {
                    Some(at) if at > now => at,
                    _ => now,
                };
                *next = Some(start + duration);
                start - now
            }
        }
    }

    fn drop_chunk(&self, mime_type: &str, reason: String) -> PlaybackOutcome {
        warn!("Dropping audio chunk ({}): {}", mime_type, reason);
        self.logger.log(ConversationEvent::new(
            "audio_chunk_dropped",
            serde_json::json!({ "mime_type": mime_type, "reason": reason }),
        ));
        PlaybackOutcome::Dropped { reason }
    }
}
