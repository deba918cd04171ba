//! Audio output port
//!
//! The output device decodes encoded chunks into PCM and schedules buffers
//! for playback. It is constructed at most once per process through
//! [`PlaybackContext`](crate::audio::playback::PlaybackContext).

use async_trait::async_trait;
use murmur_domain::{DecodeError, PcmBuffer};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors from the playback pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    #[error("Audio decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("Audio output error: {0}")]
    Output(String),
}

/// An audio output device.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Decode an encoded chunk of the given MIME type into PCM.
    async fn decode(&self, encoded: &[u8], mime_type: &str) -> Result<PcmBuffer, DecodeError>;

    /// Schedule `buffer` to start after `delay`. Must not block on playback.
    fn start(&self, buffer: PcmBuffer, delay: Duration) -> Result<(), AudioError>;
}

/// Constructs the process-wide [`AudioOutput`].
pub trait AudioOutputFactory: Send + Sync {
    fn create(&self) -> Result<Arc<dyn AudioOutput>, AudioError>;
}
