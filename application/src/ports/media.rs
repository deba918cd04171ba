//! Media device ports
//!
//! Abstractions over microphone acquisition and the encoder that turns a
//! live stream into container chunks.

use async_trait::async_trait;
use murmur_domain::CaptureConstraints;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from the capture pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("No audio input device available: {0}")]
    DeviceUnavailable(String),

    #[error("No recording in progress")]
    NotRecording,

    #[error("Encoder error: {0}")]
    Encoder(String),
}

/// Source of microphone streams and recorders.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Acquire an input stream. May suspend on a permission prompt.
    async fn get_user_media(
        &self,
        constraints: CaptureConstraints,
    ) -> Result<Box<dyn MediaStream>, CaptureError>;

    /// Create an encoder bound to `stream`.
    fn create_recorder(&self, stream: &dyn MediaStream)
    -> Result<Box<dyn MediaRecorder>, CaptureError>;
}

/// A live input stream holding one or more hardware tracks.
pub trait MediaStream: Send + Sync {
    fn id(&self) -> &str;

    /// Number of tracks still capturing.
    fn active_track_count(&self) -> usize;

    /// Stop every track and release the device. Idempotent.
    fn stop_tracks(&mut self);
}

/// Encoder producing container chunks from a [`MediaStream`].
#[async_trait]
pub trait MediaRecorder: Send + Sync {
    /// MIME type of the produced container.
    fn mime_type(&self) -> &str;

    /// Begin encoding. Chunks arrive in order on the returned channel.
    fn start(&mut self) -> Result<mpsc::UnboundedReceiver<Vec<u8>>, CaptureError>;

    /// Flush any final chunk and close the chunk channel.
    async fn finish(&mut self) -> Result<(), CaptureError>;
}
