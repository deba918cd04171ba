//! Chat session domain.
//!
//! - [`entities::ChatSession`] - a conversation and its ordered messages
//! - [`entities::ChatMessage`] - a single message within a session
//! - [`stream::StreamEvent`] - wire-level frames of a streamed assistant turn
//! - [`request`] - request bodies for the two streaming endpoints

pub mod entities;
pub mod request;
pub mod stream;
