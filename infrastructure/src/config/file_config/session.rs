//! Session configuration from TOML (`[session]` section)

use murmur_application::{SessionConfig, TransportKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw session configuration from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSessionConfig {
    /// Transport for text turns ("sse" or "chunked")
    pub transport: String,
    /// Instruction sent with every turn
    pub system_instruction: Option<String>,
    /// Voice used for spoken replies
    pub voice_name: Option<String>,
    /// Maximum silence between reads in seconds (0 disables)
    pub idle_timeout_secs: u64,
    /// System message shown when a session starts
    pub greeting: Option<String>,
    /// Suggested prompts shown with the greeting
    pub suggestions: Vec<String>,
}

impl Default for FileSessionConfig {
    fn default() -> Self {
        Self {
            transport: "sse".to_string(),
            system_instruction: None,
            voice_name: None,
            idle_timeout_secs: murmur_application::DEFAULT_IDLE_TIMEOUT.as_secs(),
            greeting: None,
            suggestions: Vec::new(),
        }
    }
}

impl FileSessionConfig {
    /// Parse the transport name, falling back to SSE on unknown values.
    pub fn parse_transport(&self) -> TransportKind {
        self.transport.parse().unwrap_or_else(|e| {
            tracing::warn!("{}; using sse", e);
            TransportKind::default()
        })
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    /// Build the application's session parameters.
    pub fn to_session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::default()
            .with_transport(self.parse_transport())
            .with_idle_timeout(self.idle_timeout());
        if let Some(instruction) = &self.system_instruction {
            config = config.with_system_instruction(instruction.clone());
        }
        if let Some(voice) = &self.voice_name {
            config = config.with_voice_name(voice.clone());
        }
        if let Some(greeting) = &self.greeting {
            config = config.with_greeting(greeting.clone(), self.suggestions.clone());
        }
        config
    }
}
