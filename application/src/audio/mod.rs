//! Audio capture and playback controllers.

pub mod capture;
pub mod playback;

pub use capture::{AudioCaptureController, RecordingInfo};
pub use playback::{AudioPlaybackController, PlaybackContext, PlaybackOutcome};
