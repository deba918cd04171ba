//! Microphone capture.
//!
//! [`AudioCaptureController`] acquires an input stream, runs an encoder
//! over it and collects the encoded chunks until `stop`, which returns the
//! concatenated [`AudioBlob`]. Hardware tracks are stopped on every exit
//! path: normal stop, cancel, a failed start, or dropping the controller.

use crate::ports::media::{CaptureError, MediaDevices, MediaRecorder, MediaStream};
use chrono::{DateTime, Utc};
use murmur_domain::{AudioBlob, CaptureConstraints, CaptureStatus};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long `stop` waits for the encoder's last chunks.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Details of the current recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingInfo {
    pub stream_id: String,
    pub mime_type: String,
    pub started_at: DateTime<Utc>,
}

type ChunkSink = Arc<Mutex<Vec<Vec<u8>>>>;

struct RecordingSession {
    info: RecordingInfo,
    stream: Box<dyn MediaStream>,
    recorder: Box<dyn MediaRecorder>,
    chunks: ChunkSink,
    collector: Option<JoinHandle<()>>,
}

impl RecordingSession {
    fn release(&mut self) {
        self.stream.stop_tracks();
        if let Some(collector) = self.collector.take() {
            collector.abort();
        }
    }

    fn take_chunks(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.chunks.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        self.release();
    }
}

/// Records one voice message at a time.
pub struct AudioCaptureController {
    devices: Arc<dyn MediaDevices>,
    constraints: CaptureConstraints,
    session: AsyncMutex<Option<RecordingSession>>,
    status: watch::Sender<CaptureStatus>,
}

impl AudioCaptureController {
    pub fn new(devices: Arc<dyn MediaDevices>) -> Self {
        Self::with_constraints(devices, CaptureConstraints::default())
    }

    pub fn with_constraints(devices: Arc<dyn MediaDevices>, constraints: CaptureConstraints) -> Self {
        let (status, _) = watch::channel(CaptureStatus::Idle);
        Self {
            devices,
            constraints,
            session: AsyncMutex::new(None),
            status,
        }
    }

    pub fn status(&self) -> CaptureStatus {
        *self.status.borrow()
    }

    /// Observe status changes.
    pub fn watch_status(&self) -> watch::Receiver<CaptureStatus> {
        self.status.subscribe()
    }

    pub async fn is_recording(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Start recording.
    ///
    /// Calling `start` while a recording is running returns the running
    /// recording's info and acquires nothing new.
    pub async fn start(&self) -> Result<RecordingInfo, CaptureError> {
        let mut slot = self.session.lock().await;
        if let Some(session) = slot.as_ref() {
            debug!("Recording already in progress ({})", session.info.stream_id);
            return Ok(session.info.clone());
        }

        self.set_status(CaptureStatus::RequestingPermission);
        let mut stream = match self.devices.get_user_media(self.constraints).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Could not acquire microphone: {}", e);
                self.set_status(CaptureStatus::Idle);
                return Err(e);
            }
        };

        let mut recorder = match self.devices.create_recorder(stream.as_ref()) {
            Ok(recorder) => recorder,
            Err(e) => {
                warn!("Could not create recorder: {}", e);
                stream.stop_tracks();
                self.set_status(CaptureStatus::Idle);
                return Err(e);
            }
        };

        let mut receiver = match recorder.start() {
            Ok(receiver) => receiver,
            Err(e) => {
                warn!("Could not start recorder: {}", e);
                stream.stop_tracks();
                self.set_status(CaptureStatus::Idle);
                return Err(e);
            }
        };

        let chunks: ChunkSink = Arc::new(Mutex::new(Vec::new()));
        let sink = chunks.clone();
        let collector = tokio::spawn(async move {
            while let Some(chunk) = receiver.recv().await {
                if chunk.is_empty() {
                    continue;
                }
                sink.lock().unwrap_or_else(PoisonError::into_inner).push(chunk);
            }
        });

        let info = RecordingInfo {
            stream_id: stream.id().to_string(),
            mime_type: recorder.mime_type().to_string(),
            started_at: Utc::now(),
        };
        info!("Recording started ({}, {})", info.stream_id, info.mime_type);

        *slot = Some(RecordingSession {
            info: info.clone(),
            stream,
            recorder,
            chunks,
            collector: Some(collector),
        });
        self.set_status(CaptureStatus::Recording);
        Ok(info)
    }

    /// Stop recording and return everything captured, in order.
    pub async fn stop(&self) -> Result<AudioBlob, CaptureError> {
        let Some(mut session) = self.session.lock().await.take() else {
            return Err(CaptureError::NotRecording);
        };
        self.set_status(CaptureStatus::Stopping);

        let finished = session.recorder.finish().await;
        session.stream.stop_tracks();

        if let Some(collector) = session.collector.take() {
            match tokio::time::timeout(DRAIN_TIMEOUT, collector).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Chunk collector ended abnormally: {}", e),
                Err(_) => warn!("Encoder did not close its output within {:?}", DRAIN_TIMEOUT),
            }
        }

        let chunks = session.take_chunks();
        let mime_type = session.info.mime_type.clone();
        drop(session);
        self.set_status(CaptureStatus::Idle);

        finished?;
        let blob = AudioBlob::from_chunks(chunks, mime_type);
        info!("Recording stopped ({} bytes)", blob.len());
        Ok(blob)
    }

    /// Abandon the current recording, discarding captured audio.
    pub async fn cancel_recording(&self) -> bool {
        let Some(mut session) = self.session.lock().await.take() else {
            return false;
        };
        if let Err(e) = session.recorder.finish().await {
            debug!("Recorder finish during cancel failed: {}", e);
        }
        drop(session);
        self.set_status(CaptureStatus::Idle);
        info!("Recording cancelled");
        true
    }

    fn set_status(&self, status: CaptureStatus) {
        self.status.send_replace(status);
    }
}
