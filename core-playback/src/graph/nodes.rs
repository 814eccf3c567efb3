//! Processing nodes.
//!
//! Every node processes one interleaved frame at a time so the compressor
//! can link its detector across channels.

use crate::equalizer::CompressorPreset;
use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type};
use tracing::warn;

/// Upper bound for a band's centre frequency, relative to the sample rate.
const MAX_RELATIVE_FREQUENCY: f32 = 0.45;

const PASSTHROUGH: Coefficients<f32> = Coefficients {
    a1: 0.0,
    a2: 0.0,
    b0: 1.0,
    b1: 0.0,
    b2: 0.0,
};

// ============================================================================
// Peaking band
// ============================================================================

/// One peaking EQ band with independent filter state per channel.
pub struct PeakingBand {
    frequency: f32,
    q: f32,
    gain_db: f32,
    sample_rate: f32,
    coefficients: Coefficients<f32>,
    channels: Vec<DirectForm2Transposed<f32>>,
}

impl PeakingBand {
    pub fn new(frequency: f32, q: f32, sample_rate: f32) -> Self {
        let mut band = Self {
            frequency,
            q,
            gain_db: 0.0,
            sample_rate,
            coefficients: PASSTHROUGH,
            channels: Vec::new(),
        };
        band.coefficients = band.compute_coefficients();
        band
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn q(&self) -> f32 {
        self.q
    }

    pub fn gain_db(&self) -> f32 {
        self.gain_db
    }

    pub fn set_gain_db(&mut self, gain_db: f32) {
        if (gain_db - self.gain_db).abs() < f32::EPSILON {
            return;
        }
        self.gain_db = gain_db;
        self.coefficients = self.compute_coefficients();
        for filter in &mut self.channels {
            filter.update_coefficients(self.coefficients);
        }
    }

    fn compute_coefficients(&self) -> Coefficients<f32> {
        let f0 = self
            .frequency
            .min(self.sample_rate * MAX_RELATIVE_FREQUENCY);
        match Coefficients::<f32>::from_params(
            Type::PeakingEQ(self.gain_db),
            self.sample_rate.hz(),
            f0.hz(),
            self.q,
        ) {
            Ok(coefficients) => coefficients,
            Err(e) => {
                warn!(frequency = self.frequency, error = ?e, "Band bypassed");
                PASSTHROUGH
            }
        }
    }

    fn ensure_channels(&mut self, channels: usize) {
        if self.channels.len() != channels {
            self.channels = (0..channels)
                .map(|_| DirectForm2Transposed::<f32>::new(self.coefficients))
                .collect();
        }
    }

    pub fn process_frame(&mut self, frame: &mut [f32]) {
        self.ensure_channels(frame.len());
        for (sample, filter) in frame.iter_mut().zip(self.channels.iter_mut()) {
            *sample = filter.run(*sample);
        }
    }

    pub fn reset(&mut self) {
        self.channels.clear();
    }
}

// ============================================================================
// Compressor
// ============================================================================

pub const COMPRESSOR_ATTACK_SECS: f32 = 0.003;
pub const COMPRESSOR_RELEASE_SECS: f32 = 0.25;

/// Feed-forward peak compressor with a linked detector.
pub struct Compressor {
    preset: CompressorPreset,
    attack_coeff: f32,
    release_coeff: f32,
    /// Smoothed gain reduction in dB (>= 0)
    reduction_db: f32,
}

impl Compressor {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            preset: CompressorPreset::TRANSPARENT,
            attack_coeff: smoothing_coefficient(COMPRESSOR_ATTACK_SECS, sample_rate),
            release_coeff: smoothing_coefficient(COMPRESSOR_RELEASE_SECS, sample_rate),
            reduction_db: 0.0,
        }
    }

    pub fn preset(&self) -> CompressorPreset {
        self.preset
    }

    pub fn set_preset(&mut self, preset: CompressorPreset) {
        self.preset = preset;
    }

    /// Gain reduction currently applied, in dB.
    pub fn reduction_db(&self) -> f32 {
        self.reduction_db
    }

    fn target_reduction(&self, level_db: f32) -> f32 {
        let CompressorPreset {
            threshold_db,
            ratio,
        } = self.preset;
        if ratio <= 1.0 || level_db <= threshold_db {
            return 0.0;
        }
        (level_db - threshold_db) * (1.0 - 1.0 / ratio)
    }

    pub fn process_frame(&mut self, frame: &mut [f32]) {
        let peak = frame.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        let level_db = if peak > 1e-9 {
            20.0 * peak.log10()
        } else {
            -180.0
        };

        let target = self.target_reduction(level_db);
        let coeff = if target > self.reduction_db {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.reduction_db = target + coeff * (self.reduction_db - target);

        if self.reduction_db > 0.0 {
            let gain = db_to_linear(-self.reduction_db);
            for sample in frame.iter_mut() {
                *sample *= gain;
            }
        }
    }

    pub fn reset(&mut self) {
        self.reduction_db = 0.0;
    }
}

fn smoothing_coefficient(time_secs: f32, sample_rate: f32) -> f32 {
    if time_secs <= 0.0 || sample_rate <= 0.0 {
        return 0.0;
    }
    (-1.0 / (time_secs * sample_rate)).exp()
}

pub fn db_to_linear(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

// ============================================================================
// Gain
// ============================================================================

/// Linear gain stage. Changes apply instantly.
pub struct GainStage {
    gain: f32,
}

impl GainStage {
    pub fn new(gain: f32) -> Self {
        Self {
            gain: gain.max(0.0),
        }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain.max(0.0);
    }

    pub fn process_frame(&mut self, frame: &mut [f32]) {
        for sample in frame.iter_mut() {
            *sample *= self.gain;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(frequency: f32, sample_rate: f32, frames: usize, amplitude: f32) -> Vec<f32> {
        (0..frames)
            .map(|n| {
                amplitude * (2.0 * std::f32::consts::PI * frequency * n as f32 / sample_rate).sin()
            })
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn test_flat_band_is_transparent() {
        let mut band = PeakingBand::new(1000.0, 1.0, 48_000.0);
        let input = sine(1000.0, 48_000.0, 4800, 0.5);
        let mut output = input.clone();
        for frame in output.chunks_mut(1) {
            band.process_frame(frame);
        }
        for (a, b) in input.iter().zip(&output) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_boost_raises_level_at_centre() {
        let mut band = PeakingBand::new(1000.0, 1.0, 48_000.0);
        band.set_gain_db(12.0);
        let input = sine(1000.0, 48_000.0, 48_000, 0.1);
        let mut output = input.clone();
        for frame in output.chunks_mut(1) {
            band.process_frame(frame);
        }
        // Skip the settling period.
        let ratio = rms(&output[4800..]) / rms(&input[4800..]);
        assert!(ratio > 3.0 && ratio < 4.5, "ratio was {}", ratio);
    }

    #[test]
    fn test_band_above_nyquist_is_clamped() {
        let mut band = PeakingBand::new(16_000.0, 1.0, 22_050.0);
        band.set_gain_db(6.0);
        assert_eq!(band.frequency(), 16_000.0);

        let mut samples = sine(5000.0, 22_050.0, 2205, 0.5);
        for frame in samples.chunks_mut(2) {
            band.process_frame(frame);
        }
        assert!(samples.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_transparent_compressor_does_nothing() {
        let mut comp = Compressor::new(48_000.0);
        let mut frame = [0.9f32, -0.9];
        comp.process_frame(&mut frame);
        assert_eq!(frame, [0.9, -0.9]);
        assert_eq!(comp.reduction_db(), 0.0);
    }

    #[test]
    fn test_normalize_reduces_loud_signal() {
        let mut comp = Compressor::new(48_000.0);
        comp.set_preset(CompressorPreset::NORMALIZE);

        let mut samples = sine(440.0, 48_000.0, 48_000, 1.0);
        for frame in samples.chunks_mut(1) {
            comp.process_frame(frame);
        }
        assert!(comp.reduction_db() > 6.0);
        assert!(rms(&samples[24_000..]) < 0.5);
    }

    #[test]
    fn test_gain_stage() {
        let mut gain = GainStage::new(0.5);
        let mut frame = [1.0f32, -0.5];
        gain.process_frame(&mut frame);
        assert_eq!(frame, [0.5, -0.25]);

        gain.set_gain(-1.0);
        assert_eq!(gain.gain(), 0.0);
    }
}
