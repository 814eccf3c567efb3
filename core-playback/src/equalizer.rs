//! # Equalizer Settings
//!
//! Band layout, presets and the mapping from slider values to decibels.
//!
//! Slider values live in `0..=100` with 50 as neutral. The graph works in
//! decibels: `gain_db = (value - 50) / 50 * 12`, so the full slider range
//! spans -12 dB to +12 dB.

use core_runtime::settings::AppSettings;
use serde::{Deserialize, Serialize};

/// Centre frequencies of the ten peaking bands, in Hz.
pub const EQ_FREQUENCIES: [f32; 10] = [
    32.0, 64.0, 125.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0, 16000.0,
];

/// Q of every band.
pub const EQ_Q: f32 = 1.0;

/// Gain at either end of the slider range.
pub const MAX_BAND_GAIN_DB: f32 = 12.0;

/// Neutral slider value.
pub const NEUTRAL: i32 = 50;

/// Slider value to decibels.
pub fn gain_db(value: i32) -> f32 {
    let value = value.clamp(0, 100);
    (value - NEUTRAL) as f32 / NEUTRAL as f32 * MAX_BAND_GAIN_DB
}

/// A named preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EqPreset {
    pub id: &'static str,
    pub name: &'static str,
    pub values: [i32; 10],
}

pub const PRESETS: [EqPreset; 6] = [
    EqPreset {
        id: "flat",
        name: "Flat",
        values: [50, 50, 50, 50, 50, 50, 50, 50, 50, 50],
    },
    EqPreset {
        id: "bass",
        name: "Bass Boost",
        values: [80, 75, 65, 55, 50, 50, 50, 50, 50, 50],
    },
    EqPreset {
        id: "treble",
        name: "Treble Boost",
        values: [50, 50, 50, 50, 50, 55, 65, 75, 80, 85],
    },
    EqPreset {
        id: "vocal",
        name: "Vocal",
        values: [40, 45, 55, 65, 70, 70, 65, 55, 45, 40],
    },
    EqPreset {
        id: "rock",
        name: "Rock",
        values: [70, 65, 55, 45, 50, 55, 65, 70, 70, 70],
    },
    EqPreset {
        id: "electronic",
        name: "Electronic",
        values: [75, 70, 50, 45, 50, 60, 55, 70, 75, 75],
    },
];

/// Id used when the bands were edited by hand.
pub const CUSTOM_PRESET: &str = "custom";

/// Look up a preset by id. `custom` has no fixed values.
pub fn preset(id: &str) -> Option<&'static EqPreset> {
    PRESETS.iter().find(|preset| preset.id == id)
}

/// Compressor parameters behind the normalize toggle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorPreset {
    pub threshold_db: f32,
    pub ratio: f32,
}

impl CompressorPreset {
    pub const NORMALIZE: Self = Self {
        threshold_db: -24.0,
        ratio: 12.0,
    };

    pub const TRANSPARENT: Self = Self {
        threshold_db: 0.0,
        ratio: 1.0,
    };

    pub fn for_normalize(normalize: bool) -> Self {
        if normalize {
            Self::NORMALIZE
        } else {
            Self::TRANSPARENT
        }
    }
}

/// The audio part of the user settings, as the engine consumes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioSettings {
    pub eq_enabled: bool,
    pub eq_preset: String,
    pub eq_values: [i32; 10],
    /// Crossfade length in seconds; 0 disables fades
    pub crossfade: u32,
    pub normalize: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            eq_enabled: true,
            eq_preset: "flat".to_string(),
            eq_values: [NEUTRAL; 10],
            crossfade: 5,
            normalize: false,
        }
    }
}

impl AudioSettings {
    /// Whether the processing graph is wanted at all.
    pub fn wants_graph(&self) -> bool {
        self.eq_enabled || self.normalize
    }

    /// Band gains to program into the filters. All zero when the EQ is off.
    pub fn band_gains_db(&self) -> [f32; 10] {
        if !self.eq_enabled {
            return [0.0; 10];
        }
        self.eq_values.map(gain_db)
    }

    pub fn compressor(&self) -> CompressorPreset {
        CompressorPreset::for_normalize(self.normalize)
    }

    /// Switch to a named preset, copying its band values.
    pub fn select_preset(&mut self, id: &str) -> bool {
        if id == CUSTOM_PRESET {
            self.eq_preset = CUSTOM_PRESET.to_string();
            return true;
        }
        match preset(id) {
            Some(preset) => {
                self.eq_preset = preset.id.to_string();
                self.eq_values = preset.values;
                true
            }
            None => false,
        }
    }

    /// Set one band by hand, which makes the preset `custom`.
    pub fn set_band(&mut self, band: usize, value: i32) -> bool {
        let Some(slot) = self.eq_values.get_mut(band) else {
            return false;
        };
        *slot = value.clamp(0, 100);
        self.eq_preset = CUSTOM_PRESET.to_string();
        true
    }

    /// Copy these settings into the persisted document.
    pub fn write_to(&self, settings: &mut AppSettings) {
        settings.eq_enabled = self.eq_enabled;
        settings.eq_preset = self.eq_preset.clone();
        settings.eq_values = self.eq_values.to_vec();
        settings.crossfade = self.crossfade;
        settings.normalize = self.normalize;
    }
}

impl From<&AppSettings> for AudioSettings {
    fn from(settings: &AppSettings) -> Self {
        let mut eq_values = [NEUTRAL; 10];
        for (slot, value) in eq_values.iter_mut().zip(&settings.eq_values) {
            *slot = (*value).clamp(0, 100);
        }
        Self {
            eq_enabled: settings.eq_enabled,
            eq_preset: settings.eq_preset.clone(),
            eq_values,
            crossfade: settings.crossfade,
            normalize: settings.normalize,
        }
    }
}
