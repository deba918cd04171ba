//! Media device adapters.

mod file_media;

pub use file_media::{FileMediaDevices, FileMediaStream, FileRecorder};
