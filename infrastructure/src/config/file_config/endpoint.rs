//! Server endpoint configuration from TOML (`[endpoint]` section)

use serde::{Deserialize, Serialize};

/// Raw endpoint configuration from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileEndpointConfig {
    /// Scheme and authority of the conversation server
    pub base_url: String,
    /// Path of the server-sent-event endpoint for text turns
    pub sse_path: String,
    /// Path of the chunked endpoint for voice (and optionally text) turns
    pub chunked_path: String,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for FileEndpointConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            sse_path: "/api/chat/stream".to_string(),
            chunked_path: "/api/chat/chunked".to_string(),
            connect_timeout_secs: 10,
        }
    }
}

impl FileEndpointConfig {
    /// Full URL of the event-stream endpoint.
    pub fn sse_url(&self) -> String {
        join_url(&self.base_url, &self.sse_path)
    }

    /// Full URL of the chunked endpoint.
    pub fn chunked_url(&self) -> String {
        join_url(&self.base_url, &self.chunked_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
