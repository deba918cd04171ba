//! Audio output writing each scheduled buffer to its own WAV file.
//!
//! Files are named `<prefix>-<n>.wav` in scheduling order. The scheduled
//! delay is only logged; consumers play the files in name order.

use super::decoder::decode_chunk;
use async_trait::async_trait;
use hound::{SampleFormat, WavSpec, WavWriter};
use murmur_application::{AudioError, AudioOutput, AudioOutputFactory};
use murmur_domain::{DecodeError, PcmBuffer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info};

pub struct WavFileOutput {
    dir: PathBuf,
    prefix: String,
    default_rate: u32,
    written: AtomicUsize,
}

impl WavFileOutput {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, default_rate: u32) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            default_rate,
            written: AtomicUsize::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of files written so far.
    pub fn written(&self) -> usize {
        self.written.load(Ordering::SeqCst)
    }

    fn write(&self, path: &Path, buffer: &PcmBuffer) -> Result<(), hound::Error> {
        let spec = WavSpec {
            channels: buffer.channels.max(1),
            sample_rate: buffer.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec)?;
        for &sample in &buffer.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()
    }
}

#[async_trait]
impl AudioOutput for WavFileOutput {
    async fn decode(&self, encoded: &[u8], mime_type: &str) -> Result<PcmBuffer, DecodeError> {
        decode_chunk(encoded, mime_type, self.default_rate)
    }

    fn start(&self, buffer: PcmBuffer, delay: Duration) -> Result<(), AudioError> {
        let n = self.written.fetch_add(1, Ordering::SeqCst) + 1;
        let path = self.dir.join(format!("{}-{:04}.wav", self.prefix, n));
        self.write(&path, &buffer)
            .map_err(|e| AudioError::Output(format!("{}: {}", path.display(), e)))?;
        debug!(
            "Wrote {:?} of audio to {} (starts after {:?})",
            buffer.duration(),
            path.display(),
            delay
        );
        Ok(())
    }
}

/// Creates a [`WavFileOutput`] in `dir`, creating the directory.
pub struct WavOutputFactory {
    dir: PathBuf,
    prefix: String,
    default_rate: u32,
}

impl WavOutputFactory {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, default_rate: u32) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            default_rate,
        }
    }
}

impl AudioOutputFactory for WavOutputFactory {
    fn create(&self) -> Result<Arc<dyn AudioOutput>, AudioError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| AudioError::Output(format!("{}: {}", self.dir.display(), e)))?;
        info!("Writing received audio to {}", self.dir.display());
        Ok(Arc::new(WavFileOutput::new(
            self.dir.clone(),
            self.prefix.clone(),
            self.default_rate,
        )))
    }
}
