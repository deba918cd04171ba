//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted into application types.

mod audio;
mod endpoint;
mod logging;
mod session;

pub use audio::FileAudioConfig;
pub use endpoint::FileEndpointConfig;
pub use logging::FileLoggingConfig;
pub use session::FileSessionConfig;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("endpoint.base_url cannot be empty")]
    EmptyBaseUrl,

    #[error("endpoint.base_url must start with http:// or https://: {0}")]
    InvalidBaseUrl(String),

    #[error("audio.sample_rate cannot be 0")]
    ZeroSampleRate,
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Server endpoint
    pub endpoint: FileEndpointConfig,
    /// Per-turn session parameters
    pub session: FileSessionConfig,
    /// Audio playback settings
    pub audio: FileAudioConfig,
    /// Transcript and diagnostic logs
    pub logging: FileLoggingConfig,
}

impl FileConfig {
    /// Validate the configuration, returning every problem found.
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        let base_url = self.endpoint.base_url.trim();
        if base_url.is_empty() {
            errors.push(ConfigValidationError::EmptyBaseUrl);
        } else if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            errors.push(ConfigValidationError::InvalidBaseUrl(base_url.to_string()));
        }

        if self.audio.sample_rate == 0 {
            errors.push(ConfigValidationError::ZeroSampleRate);
        }

        errors
    }
}
