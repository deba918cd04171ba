//! Output that validates chunks and discards them.

use super::decoder::decode_chunk;
use async_trait::async_trait;
use murmur_application::{AudioError, AudioOutput, AudioOutputFactory};
use murmur_domain::{DecodeError, PcmBuffer};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct NullAudioOutput {
    default_rate: u32,
}

impl NullAudioOutput {
    pub fn new(default_rate: u32) -> Self {
        Self { default_rate }
    }
}

#[async_trait]
impl AudioOutput for NullAudioOutput {
    async fn decode(&self, encoded: &[u8], mime_type: &str) -> Result<PcmBuffer, DecodeError> {
        decode_chunk(encoded, mime_type, self.default_rate)
    }

    fn start(&self, buffer: PcmBuffer, delay: Duration) -> Result<(), AudioError> {
        debug!(
            "Discarding {:?} of audio scheduled after {:?}",
            buffer.duration(),
            delay
        );
        Ok(())
    }
}

pub struct NullOutputFactory {
    default_rate: u32,
}

impl NullOutputFactory {
    pub fn new(default_rate: u32) -> Self {
        Self { default_rate }
    }
}

impl AudioOutputFactory for NullOutputFactory {
    fn create(&self) -> Result<Arc<dyn AudioOutput>, AudioError> {
        Ok(Arc::new(NullAudioOutput::new(self.default_rate)))
    }
}
