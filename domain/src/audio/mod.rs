//! Audio value types shared by the capture and playback pipelines.
//!
//! - [`blob::AudioBlob`] - an encoded recording ready for transport
//! - [`capture`] - microphone constraints and recording status
//! - [`pcm::PcmBuffer`] - decoded PCM ready for scheduling on an output

pub mod blob;
pub mod capture;
pub mod pcm;
