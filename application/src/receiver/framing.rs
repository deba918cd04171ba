//! Byte-stream framing for both transports.
//!
//! Reads from the network may split a frame anywhere, including inside a
//! multi-byte UTF-8 sequence, and may carry several frames at once. Both
//! framers turn a [`ByteStream`] into a [`FrameStream`] of decoded events:
//!
//! - [`sse_frames`] parses `text/event-stream` bodies with
//!   `eventsource-stream` (CR, LF and CRLF line endings, multi-line `data`,
//!   comments).
//! - [`chunked_frames`] reads `data: {json}` lines through a buffered
//!   [`StreamReader`].
//!
//! Neither reconnects: the end of the body ends the turn.

use crate::ports::transport::{ByteStream, TransportError};
use eventsource_stream::{EventStreamError, Eventsource};
use futures::StreamExt;
use futures::stream::BoxStream;
use murmur_domain::{DecodeError, StreamEvent};
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tokio_util::io::StreamReader;
use tracing::trace;

/// Marker prefixing every frame line on the chunked transport.
pub const DATA_PREFIX: &str = "data: ";

/// Longest accepted chunked frame line. Audio frames carry base64 payloads,
/// so this is generous.
pub const MAX_FRAME_LINE: usize = 8 * 1024 * 1024;

/// Why a frame could not be produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Decoded frames of one response body, in arrival order.
///
/// Dropping the stream drops the body and closes the connection.
pub type FrameStream = BoxStream<'static, Result<StreamEvent, FrameError>>;

/// Bound every read of `body` by `limit`.
///
/// Expiry yields [`TransportError::IdleTimeout`] once and then ends the
/// stream, releasing the body.
pub fn with_idle_timeout(body: ByteStream, limit: Option<Duration>) -> ByteStream {
    let Some(limit) = limit else {
        return body;
    };
    futures::stream::unfold(Some(body), move |state| async move {
        let mut body = state?;
        match tokio::time::timeout(limit, body.next()).await {
            Ok(Some(item)) => Some((item, Some(body))),
            Ok(None) => None,
            Err(_) => Some((Err(TransportError::IdleTimeout(limit)), None)),
        }
    })
    .boxed()
}

/// Frames of a `text/event-stream` body.
///
/// The frame type lives in the JSON payload, so the `event` and `id`
/// fields are ignored. Events without data (keep-alives) are skipped.
pub fn sse_frames(body: ByteStream) -> FrameStream {
    body.eventsource()
        .filter_map(|item| async move {
            match item {
                Ok(event) if event.data.is_empty() => {
                    trace!("Skipping event-stream event without data");
                    None
                }
                Ok(event) => Some(StreamEvent::parse(&event.data).map_err(FrameError::from)),
                Err(EventStreamError::Transport(e)) => Some(Err(FrameError::Transport(e))),
                Err(EventStreamError::Utf8(_)) => Some(Err(DecodeError::InvalidUtf8.into())),
                Err(e) => Some(Err(DecodeError::MalformedFrame {
                    reason: e.to_string(),
                    raw: String::new(),
                }
                .into())),
            }
        })
        .boxed()
}

/// Frames of a chunked body: one `data: {json}` frame per line.
///
/// Blank lines separate frames and are skipped. Lines without the marker
/// are not frames and are ignored. An unterminated final line is still a
/// frame.
pub fn chunked_frames(body: ByteStream) -> FrameStream {
    chunked_frames_limited(body, MAX_FRAME_LINE)
}

fn chunked_frames_limited(body: ByteStream, max_line: usize) -> FrameStream {
    let reader = StreamReader::new(body.map(|chunk| chunk.map_err(io::Error::other)));

    futures::stream::unfold(Some(reader), move |state| async move {
        let mut reader = state?;
        loop {
            match read_line(&mut reader, max_line).await {
                Ok(Some(line)) => {
                    if let Some(frame) = decode_chunked_line(&line) {
                        return Some((frame, Some(reader)));
                    }
                }
                Ok(None) => return None,
                Err(e) => return Some((Err(e), None)),
            }
        }
    })
    .boxed()
}

/// Read one line without its terminator. `None` at end of body.
async fn read_line<R>(reader: &mut R, max_line: usize) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let read = (&mut *reader)
        .take(max_line as u64 + 1)
        .read_until(b'\n', &mut line)
        .await
        .map_err(transport_error)?;
    if read == 0 {
        return Ok(None);
    }

    if line.last() == Some(&b'\n') {
        line.pop();
    } else if line.len() > max_line {
        return Err(DecodeError::FrameTooLong(max_line).into());
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Ok(Some(line))
}

fn decode_chunked_line(raw: &[u8]) -> Option<Result<StreamEvent, FrameError>> {
    let line = match std::str::from_utf8(raw) {
        Ok(line) => line,
        Err(_) => return Some(Err(DecodeError::InvalidUtf8.into())),
    };
    if line.trim().is_empty() {
        return None;
    }
    match line.strip_prefix(DATA_PREFIX) {
        Some(payload) => Some(StreamEvent::parse(payload).map_err(FrameError::from)),
        None => {
            trace!("Skipping non-data line: {}", line);
            None
        }
    }
}

/// Recover the transport error carried through the reader.
fn transport_error(e: io::Error) -> FrameError {
    let carried = e
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<TransportError>())
        .cloned();
    FrameError::Transport(carried.unwrap_or_else(|| TransportError::Read(e.to_string())))
}
