//! Encoded audio blobs.

use crate::session::stream::DecodeError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

/// An encoded audio payload and its container/codec MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBlob {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl AudioBlob {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }

    /// Concatenate encoder chunks, in order, into a single blob.
    pub fn from_chunks<I>(chunks: I, mime_type: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let data = chunks.into_iter().flatten().collect();
        Self::new(data, mime_type)
    }

    /// Decode a base64 payload received from the server.
    pub fn from_base64(encoded: &str, mime_type: impl Into<String>) -> Result<Self, DecodeError> {
        let data = BASE64
            .decode(encoded.trim())
            .map_err(|e| DecodeError::MalformedBase64(e.to_string()))?;
        Ok(Self::new(data, mime_type))
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
