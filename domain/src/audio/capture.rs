//! Microphone capture value types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Container/codec produced by the capture pipeline.
pub const WEBM_OPUS_MIME: &str = "audio/webm;codecs=opus";

/// Target capture sample rate in Hz.
pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;

/// Constraints requested when acquiring the microphone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    pub sample_rate: u32,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
            sample_rate: CAPTURE_SAMPLE_RATE,
        }
    }
}

/// Observable state of the capture controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureStatus {
    #[default]
    Idle,
    RequestingPermission,
    Recording,
    Stopping,
}

impl fmt::Display for CaptureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureStatus::Idle => write!(f, "idle"),
            CaptureStatus::RequestingPermission => write!(f, "requesting permission"),
            CaptureStatus::Recording => write!(f, "recording"),
            CaptureStatus::Stopping => write!(f, "stopping"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_constraints_enable_processing_at_16khz() {
        let c = CaptureConstraints::default();
        assert!(c.echo_cancellation && c.noise_suppression && c.auto_gain_control);
        assert_eq!(c.sample_rate, 16_000);
    }
}
