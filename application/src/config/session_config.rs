//! Session configuration - per-session transport and turn parameters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default idle timeout between reads on an open stream.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Which transport carries the assistant reply for text turns.
///
/// Audio turns always use the chunked transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Server-sent events.
    #[default]
    #[serde(alias = "eventstream")]
    Sse,
    /// Newline-delimited `data: ` frames in a streamed HTTP body.
    Chunked,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Sse => write!(f, "sse"),
            TransportKind::Chunked => write!(f, "chunked"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sse" | "eventstream" => Ok(TransportKind::Sse),
            "chunked" => Ok(TransportKind::Chunked),
            other => Err(format!("unknown transport: {}", other)),
        }
    }
}

/// How decoded audio buffers are scheduled on the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackPolicy {
    /// Start every buffer as soon as it is decoded. Buffers may overlap.
    #[default]
    Immediate,
    /// Start each buffer when the previously scheduled one ends.
    Sequential,
}

impl FromStr for PlaybackPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "immediate" => Ok(PlaybackPolicy::Immediate),
            "sequential" | "fifo" => Ok(PlaybackPolicy::Sequential),
            other => Err(format!("unknown playback policy: {}", other)),
        }
    }
}

/// Parameters applied to every turn of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub transport: TransportKind,
    pub system_instruction: Option<String>,
    pub voice_name: Option<String>,
    /// Maximum silence between two reads; `None` waits indefinitely.
    pub idle_timeout: Option<Duration>,
    /// System message shown when a fresh session starts.
    pub greeting: Option<String>,
    pub suggestions: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            system_instruction: None,
            voice_name: None,
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
            greeting: None,
            suggestions: Vec::new(),
        }
    }
}

impl SessionConfig {
    // ==================== Builder Methods ====================

    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_voice_name(mut self, voice: impl Into<String>) -> Self {
        self.voice_name = Some(voice.into());
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_greeting(mut self, greeting: impl Into<String>, suggestions: Vec<String>) -> Self {
        self.greeting = Some(greeting.into());
        self.suggestions = suggestions;
        self
    }
}
