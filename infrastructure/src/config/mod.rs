//! Configuration file loading for murmur
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `MURMUR_*` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./murmur.toml` or `./.murmur.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/murmur/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileAudioConfig, FileConfig, FileEndpointConfig, FileLoggingConfig,
    FileSessionConfig,
};
pub use loader::ConfigLoader;
