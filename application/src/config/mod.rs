//! Application-level configuration.
//!
//! - [`SessionConfig`] - transport selection and per-turn request parameters
//! - [`PlaybackPolicy`] - scheduling discipline for inbound audio

pub mod session_config;

pub use session_config::{DEFAULT_IDLE_TIMEOUT, PlaybackPolicy, SessionConfig, TransportKind};
