//! Audio configuration from TOML (`[audio]` section)

use murmur_application::PlaybackPolicy;
use serde::{Deserialize, Serialize};

/// Raw audio configuration from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAudioConfig {
    /// "immediate" or "sequential"
    pub playback_policy: String,
    /// Directory for received audio; playback is disabled when unset
    pub output_dir: Option<String>,
    /// Sample rate of written WAV files
    pub sample_rate: u32,
}

impl Default for FileAudioConfig {
    fn default() -> Self {
        Self {
            playback_policy: "immediate".to_string(),
            output_dir: None,
            sample_rate: murmur_domain::audio::pcm::DEFAULT_PCM_RATE,
        }
    }
}

impl FileAudioConfig {
    pub fn parse_playback_policy(&self) -> PlaybackPolicy {
        self.playback_policy.parse().unwrap_or_else(|e| {
            tracing::warn!("{}; using immediate", e);
            PlaybackPolicy::default()
        })
    }
}
