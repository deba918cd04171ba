//! Request bodies for the streaming endpoints.

use crate::audio::blob::AudioBlob;
use serde::{Deserialize, Serialize};

/// JSON body opening an event-stream turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStreamRequestBody {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_name: Option<String>,
}

impl EventStreamRequestBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            system_instruction: None,
            voice_name: None,
        }
    }

    pub fn with_system_instruction(mut self, instruction: Option<String>) -> Self {
        self.system_instruction = instruction;
        self
    }

    pub fn with_voice_name(mut self, voice: Option<String>) -> Self {
        self.voice_name = voice;
        self
    }
}

/// Payload kind of a chunked-endpoint request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkedRequestKind {
    Audio,
    Text,
}

/// JSON body POSTed to the chunked endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkedRequestBody {
    #[serde(rename = "type")]
    pub kind: ChunkedRequestKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
}

impl ChunkedRequestBody {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            kind: ChunkedRequestKind::Text,
            audio_data: None,
            mime_type: None,
            message: Some(message.into()),
            system_instruction: None,
        }
    }

    /// Audio submission; the blob is base64-encoded into `audioData`.
    pub fn audio(blob: &AudioBlob) -> Self {
        Self {
            kind: ChunkedRequestKind::Audio,
            audio_data: Some(blob.to_base64()),
            mime_type: Some(blob.mime_type.clone()),
            message: None,
            system_instruction: None,
        }
    }

    pub fn with_system_instruction(mut self, instruction: Option<String>) -> Self {
        self.system_instruction = instruction;
        self
    }
}
