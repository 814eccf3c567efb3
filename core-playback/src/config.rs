//! # Playback Configuration
//!
//! Engine tunables. User-facing audio settings (crossfade length, EQ bands,
//! normalize) live in `core_runtime::settings` and arrive as
//! [`AudioSettings`](crate::equalizer::AudioSettings).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Playback engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Number of equal volume steps in a fade-out.
    ///
    /// Default: 10.
    #[serde(default = "default_fade_steps")]
    pub fade_steps: u32,

    /// Delay between the swap and restoring the pre-fade volume.
    ///
    /// Default: 50 ms.
    #[serde(default = "default_settle_delay")]
    pub settle_delay: Duration,

    /// Maximum entries kept in the playback history.
    ///
    /// Default: 100.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Volume of a fresh player.
    ///
    /// Default: 0.8.
    #[serde(default = "default_volume")]
    pub default_volume: f32,

    /// Start a crossfaded advance when the playing track has no more than
    /// the crossfade length left.
    ///
    /// Default: true.
    #[serde(default = "default_auto_crossfade")]
    pub auto_crossfade: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            fade_steps: default_fade_steps(),
            settle_delay: default_settle_delay(),
            history_capacity: default_history_capacity(),
            default_volume: default_volume(),
            auto_crossfade: default_auto_crossfade(),
        }
    }
}

impl PlaybackConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.fade_steps == 0 {
            return Err("fade_steps must be > 0".to_string());
        }

        if self.history_capacity == 0 {
            return Err("history_capacity must be > 0".to_string());
        }

        if !(0.0..=1.0).contains(&self.default_volume) {
            return Err("default_volume must be between 0.0 and 1.0".to_string());
        }

        Ok(())
    }
}

fn default_fade_steps() -> u32 {
    10
}

fn default_settle_delay() -> Duration {
    Duration::from_millis(50)
}

fn default_history_capacity() -> usize {
    100
}

fn default_volume() -> f32 {
    0.8
}

fn default_auto_crossfade() -> bool {
    true
}
