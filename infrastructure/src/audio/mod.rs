//! Audio output adapters.
//!
//! - [`decoder`] turns encoded chunks (raw PCM or WAV) into [`PcmBuffer`](murmur_domain::PcmBuffer)s
//! - [`WavFileOutput`] writes every scheduled buffer to a WAV file
//! - [`NullAudioOutput`] decodes and discards, for when no output is configured

pub mod decoder;
mod null_output;
mod wav_output;

pub use null_output::{NullAudioOutput, NullOutputFactory};
pub use wav_output::{WavFileOutput, WavOutputFactory};
