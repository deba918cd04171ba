//! Media devices backed by an encoded audio file.
//!
//! Lets a headless client submit a recording through the capture pipeline:
//! the "microphone" is a file, and the recorder replays its bytes as
//! encoder chunks.

use async_trait::async_trait;
use murmur_application::{CaptureError, MediaDevices, MediaRecorder, MediaStream};
use murmur_domain::CaptureConstraints;
use murmur_domain::audio::capture::WEBM_OPUS_MIME;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::mpsc;
use tracing::debug;

/// Size of each replayed chunk.
const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// Guess the container MIME type from a file extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("webm") => WEBM_OPUS_MIME,
        Some("ogg") | Some("opus") => "audio/ogg;codecs=opus",
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("m4a") | Some("mp4") => "audio/mp4",
        Some("pcm") | Some("raw") => "audio/pcm;rate=16000",
        _ => "application/octet-stream",
    }
}

/// [`MediaDevices`] whose single input is a file.
///
/// The file is read once per opened stream. Recorders share the stream's
/// bytes through `opened`, keyed by stream id, for as long as the stream
/// holds them.
pub struct FileMediaDevices {
    path: PathBuf,
    mime_type: String,
    chunk_size: usize,
    opened: Mutex<HashMap<String, Weak<[u8]>>>,
    next_stream: AtomicU64,
}

impl FileMediaDevices {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mime_type = mime_for_path(&path).to_string();
        Self {
            path,
            mime_type,
            chunk_size: DEFAULT_CHUNK_SIZE,
            opened: Mutex::new(HashMap::new()),
            next_stream: AtomicU64::new(0),
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

#[async_trait]
impl MediaDevices for FileMediaDevices {
    async fn get_user_media(
        &self,
        constraints: CaptureConstraints,
    ) -> Result<Box<dyn MediaStream>, CaptureError> {
        debug!(
            "Opening {} as input ({:?})",
            self.path.display(),
            constraints
        );
        let data: Arc<[u8]> = tokio::fs::read(&self.path)
            .await
            .map_err(|e| CaptureError::DeviceUnavailable(format!("{}: {}", self.path.display(), e)))?
            .into();

        let id = format!(
            "{}#{}",
            self.path.display(),
            self.next_stream.fetch_add(1, Ordering::Relaxed)
        );
        {
            let mut opened = self.opened.lock().unwrap_or_else(PoisonError::into_inner);
            opened.retain(|_, bytes| bytes.strong_count() > 0);
            opened.insert(id.clone(), Arc::downgrade(&data));
        }

        Ok(Box::new(FileMediaStream {
            id,
            data: Some(data),
        }))
    }

    fn create_recorder(
        &self,
        stream: &dyn MediaStream,
    ) -> Result<Box<dyn MediaRecorder>, CaptureError> {
        if stream.active_track_count() == 0 {
            return Err(CaptureError::DeviceUnavailable(format!(
                "{} is stopped",
                stream.id()
            )));
        }
        let data = self
            .opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(stream.id())
            .and_then(Weak::upgrade)
            .ok_or_else(|| {
                CaptureError::DeviceUnavailable(format!(
                    "{} was not opened by this device",
                    stream.id()
                ))
            })?;
        Ok(Box::new(FileRecorder {
            data,
            chunk_size: self.chunk_size,
            mime_type: self.mime_type.clone(),
            sender: None,
        }))
    }
}

/// Input stream over file contents. Stopping it releases the bytes.
pub struct FileMediaStream {
    id: String,
    data: Option<Arc<[u8]>>,
}

impl MediaStream for FileMediaStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn active_track_count(&self) -> usize {
        usize::from(self.data.is_some())
    }

    fn stop_tracks(&mut self) {
        if self.data.take().is_some() {
            debug!("Released input {}", self.id);
        }
    }
}

/// Replays file bytes as encoder chunks.
pub struct FileRecorder {
    data: Arc<[u8]>,
    chunk_size: usize,
    mime_type: String,
    sender: Option<mpsc::UnboundedSender<Vec<u8>>>,
}

#[async_trait]
impl MediaRecorder for FileRecorder {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn start(&mut self) -> Result<mpsc::UnboundedReceiver<Vec<u8>>, CaptureError> {
        if self.sender.is_some() {
            return Err(CaptureError::Encoder("recorder already started".to_string()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        for chunk in self.data.chunks(self.chunk_size) {
            tx.send(chunk.to_vec())
                .map_err(|_| CaptureError::Encoder("chunk receiver closed".to_string()))?;
        }
        self.sender = Some(tx);
        Ok(rx)
    }

    async fn finish(&mut self) -> Result<(), CaptureError> {
        self.sender.take();
        Ok(())
    }
}
