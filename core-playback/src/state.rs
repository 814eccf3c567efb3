//! Player state snapshot.

use serde::{Deserialize, Serialize};

/// Repeat behaviour at the end of the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    All,
    One,
}

impl RepeatMode {
    /// off → all → one → off
    pub fn cycle(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }

    /// Whether the context wraps around at its end.
    pub fn wraps(self) -> bool {
        matches!(self, RepeatMode::All)
    }
}

/// The single authoritative playback snapshot.
///
/// Only the engine mutates it; everyone else gets clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub is_playing: bool,
    /// Position in seconds
    pub current_time: f64,
    /// Duration in seconds
    pub duration: f64,
    /// User volume in `0.0..=1.0`
    pub volume: f32,
    pub is_muted: bool,
    pub is_shuffled: bool,
    pub repeat_mode: RepeatMode,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self::with_volume(0.8)
    }
}

impl PlayerState {
    pub fn with_volume(volume: f32) -> Self {
        Self {
            is_playing: false,
            current_time: 0.0,
            duration: 0.0,
            volume: volume.clamp(0.0, 1.0),
            is_muted: false,
            is_shuffled: false,
            repeat_mode: RepeatMode::Off,
        }
    }

    /// Volume that should reach the speakers.
    pub fn effective_volume(&self) -> f32 {
        if self.is_muted {
            0.0
        } else {
            self.volume
        }
    }

    /// Seconds left in the current track, when the duration is known.
    pub fn remaining(&self) -> Option<f64> {
        (self.duration > 0.0).then(|| (self.duration - self.current_time).max(0.0))
    }
}
