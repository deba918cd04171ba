//! Streaming events for a conversational turn.
//!
//! [`StreamEvent`] represents one frame of a streamed assistant reply. Both
//! transports (event-stream and chunked HTTP) carry the same JSON vocabulary:
//!
//! ```json
//! {"type":"text","content":"Hi"}
//! {"type":"audio","data":"<base64>","mimeType":"audio/pcm;rate=24000"}
//! {"type":"status","content":"thinking"}
//! {"type":"turnComplete"}
//! {"type":"error","message":"quota exceeded"}
//! ```
//!
//! Frames with an unrecognized `type` parse to [`StreamEvent::Unknown`] so
//! server-side additions never break older clients.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// MIME type assumed for audio frames that omit `mimeType`.
pub const DEFAULT_AUDIO_MIME: &str = "audio/pcm;rate=24000";

/// Errors raised while decoding frames or audio payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed frame: {reason} (raw: {raw})")]
    MalformedFrame { reason: String, raw: String },

    #[error("Frame is not valid UTF-8")]
    InvalidUtf8,

    #[error("Frame line exceeds {0} bytes")]
    FrameTooLong(usize),

    #[error("Malformed base64 payload: {0}")]
    MalformedBase64(String),

    #[error("Unsupported audio codec: {0}")]
    UnsupportedCodec(String),

    #[error("Malformed audio data: {0}")]
    MalformedAudio(String),
}

/// An event in a streamed assistant turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StreamEvent {
    /// A text token chunk, appended to the in-flight message.
    Text { content: String },
    /// A base64-encoded audio chunk for the playback side channel.
    Audio {
        data: String,
        #[serde(rename = "mimeType", default = "default_audio_mime")]
        mime_type: String,
    },
    /// Transient server progress, never part of message content.
    Status { content: String },
    /// The assistant finished its reply.
    TurnComplete,
    /// The server aborted the turn.
    Error { message: String },
    /// A frame whose `type` this client does not know.
    #[serde(skip)]
    Unknown { event_type: String },
}

fn default_audio_mime() -> String {
    DEFAULT_AUDIO_MIME.to_string()
}

const KNOWN_TYPES: &[&str] = &["text", "audio", "status", "turnComplete", "error"];

impl StreamEvent {
    pub fn text(content: impl Into<String>) -> Self {
        StreamEvent::Text {
            content: content.into(),
        }
    }

    pub fn audio(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        StreamEvent::Audio {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Parse one JSON frame.
    ///
    /// Invalid JSON, a missing `type`, or a known `type` with the wrong shape
    /// is a [`DecodeError::MalformedFrame`]. An unknown `type` is not an error.
    pub fn parse(raw: &str) -> Result<Self, DecodeError> {
        let malformed = |reason: String| DecodeError::MalformedFrame {
            reason,
            raw: raw.to_string(),
        };

        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| malformed(e.to_string()))?;

        let Some(event_type) = value.get("type").and_then(|t| t.as_str()) else {
            return Err(malformed("missing \"type\" discriminator".to_string()));
        };

        if !KNOWN_TYPES.contains(&event_type) {
            return Ok(StreamEvent::Unknown {
                event_type: event_type.to_string(),
            });
        }

        serde_json::from_value(value).map_err(|e| malformed(e.to_string()))
    }

    /// Serialize to a single-line JSON frame.
    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }

    /// Returns true if this event ends the turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::TurnComplete | StreamEvent::Error { .. })
    }

    /// The wire discriminator of this event.
    pub fn event_type(&self) -> &str {
        match self {
            StreamEvent::Text { .. } => "text",
            StreamEvent::Audio { .. } => "audio",
            StreamEvent::Status { .. } => "status",
            StreamEvent::TurnComplete => "turnComplete",
            StreamEvent::Error { .. } => "error",
            StreamEvent::Unknown { event_type } => event_type,
        }
    }
}
