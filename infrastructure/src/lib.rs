//! Infrastructure layer for murmur
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, including configuration file loading.

pub mod audio;
pub mod config;
pub mod http;
pub mod logging;
pub mod media;
pub mod render;

// Re-export commonly used types
pub use audio::{NullAudioOutput, NullOutputFactory, WavFileOutput, WavOutputFactory};
pub use config::{
    ConfigLoader, ConfigValidationError, FileAudioConfig, FileConfig, FileEndpointConfig,
    FileLoggingConfig, FileSessionConfig,
};
pub use http::{EnvTokenProvider, HttpStreamTransport};
pub use logging::JsonlConversationLogger;
pub use media::FileMediaDevices;
pub use render::MarkdownRenderer;
