//! Stream transport port
//!
//! Opens the network request for one turn and hands back the raw response
//! body as a stream of byte chunks. Framing and event decoding happen in the
//! receivers; adapters only move bytes.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use murmur_domain::{ChunkedRequestBody, EventStreamRequestBody};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur on either streaming transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Server responded with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Stream read error: {0}")]
    Read(String),

    #[error("No data received for {0:?}")]
    IdleTimeout(Duration),
}

/// Response body of an open turn, read incrementally.
///
/// Dropping the stream closes the underlying connection.
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Transport for turn requests
///
/// Implementations attach authentication and request identification; the
/// core treats both as opaque.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Open a server-sent-event stream for a text turn.
    async fn open_event_stream(
        &self,
        body: &EventStreamRequestBody,
    ) -> Result<ByteStream, TransportError>;

    /// POST to the chunked endpoint and stream the response body.
    async fn open_chunked(&self, body: &ChunkedRequestBody) -> Result<ByteStream, TransportError>;
}
