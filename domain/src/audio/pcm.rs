//! Decoded PCM audio.

use crate::session::stream::DecodeError;
use std::time::Duration;

/// Sample rate assumed for raw PCM payloads that do not declare one.
pub const DEFAULT_PCM_RATE: u32 = 24_000;

/// Interleaved signed 16-bit PCM samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmBuffer {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmBuffer {
    pub fn new(samples: Vec<i16>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Interpret little-endian 16-bit sample bytes.
    pub fn from_le_bytes(bytes: &[u8], sample_rate: u32, channels: u16) -> Result<Self, DecodeError> {
        if bytes.len() % 2 != 0 {
            return Err(DecodeError::MalformedAudio(format!(
                "odd byte count {} for 16-bit PCM",
                bytes.len()
            )));
        }
        if sample_rate == 0 || channels == 0 {
            return Err(DecodeError::MalformedAudio(
                "sample rate and channel count must be non-zero".to_string(),
            ));
        }
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Ok(Self::new(samples, sample_rate, channels))
    }

    /// Playback length of the buffer.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 || self.channels == 0 {
            return Duration::ZERO;
        }
        let frames = self.samples.len() as f64 / self.channels as f64;
        Duration::from_secs_f64(frames / self.sample_rate as f64)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Extract the `rate=` parameter from a MIME type such as
/// `audio/pcm;rate=24000`.
pub fn mime_sample_rate(mime_type: &str) -> Option<u32> {
    mime_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("rate"))
        .and_then(|(_, value)| value.trim().parse().ok())
}

/// The `type/subtype` part of a MIME type, lowercased.
pub fn mime_essence(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_le_bytes_decodes_samples() {
        let pcm = PcmBuffer::from_le_bytes(&[0x01, 0x00, 0xff, 0xff], 16_000, 1).unwrap();
        assert_eq!(pcm.samples, vec![1, -1]);
    }

    #[test]
    fn odd_byte_count_is_malformed() {
        assert!(PcmBuffer::from_le_bytes(&[0x01], 16_000, 1).is_err());
    }

    #[test]
    fn duration_accounts_for_channels() {
        let pcm = PcmBuffer::new(vec![0; 48_000], 24_000, 2);
        assert_eq!(pcm.duration(), Duration::from_secs(1));
    }

    #[test]
    fn parses_rate_parameter() {
        assert_eq!(mime_sample_rate("audio/pcm;rate=24000"), Some(24_000));
        assert_eq!(mime_sample_rate("audio/pcm; codec=x; Rate=16000"), Some(16_000));
        assert_eq!(mime_sample_rate("audio/pcm"), None);
    }

    #[test]
    fn essence_strips_parameters() {
        assert_eq!(mime_essence("Audio/L16; rate=8000"), "audio/l16");
    }
}
