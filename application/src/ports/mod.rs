//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod audio_output;
pub mod conversation_logger;
pub mod media;
pub mod token_provider;
pub mod transport;
