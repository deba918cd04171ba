//! Domain layer for murmur
//!
//! This crate contains the entities and value objects of the streaming
//! conversational session engine. It has no dependencies on transports,
//! audio devices, or an async runtime.
//!
//! # Core Concepts
//!
//! - **Session**: an ordered timeline of [`ChatMessage`]s for one conversation
//! - **Turn**: one user input and the single assistant reply streamed for it
//! - **Frame**: one [`StreamEvent`] received from a transport
//! - **Patch**: an incremental content append applied to a `streaming` message

pub mod audio;
pub mod core;
pub mod render;
pub mod session;

// Re-export commonly used types
pub use audio::{
    blob::AudioBlob,
    capture::{CaptureConstraints, CaptureStatus},
    pcm::PcmBuffer,
};
pub use core::{error::DomainError, string::derive_title};
pub use render::{ContentRenderer, PlainTextRenderer};
pub use session::{
    entities::{ChatMessage, ChatSession, MessageId, Role, SessionId, StreamingState},
    request::{ChunkedRequestBody, ChunkedRequestKind, EventStreamRequestBody},
    stream::{DecodeError, StreamEvent},
};
