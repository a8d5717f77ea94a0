//! Robot voice filter
//!
//! Ring modulation by `1 + depth * sin(2*pi*f*t)`, a small downward pitch
//! shift and a narrow band-pass for the metallic timbre.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::biquad::SosFilter;
use super::ensure_range;
use super::stretch::pitch_shift;
use crate::engine::SampleBuffer;
use crate::error::Result;

/// Robot voice parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotParams {
    /// Ring modulator frequency
    pub ring_freq_hz: f32,
    /// Ring modulator depth
    pub ring_depth: f32,
    /// Pitch shift in steps of `1/bins_per_octave` octave
    pub pitch_steps: f32,
    /// Pitch resolution
    pub bins_per_octave: u32,
    /// Lower band edge
    pub band_low_hz: f32,
    /// Upper band edge
    pub band_high_hz: f32,
    /// Butterworth order of each band edge
    pub band_order: usize,
}

impl Default for RobotParams {
    fn default() -> Self {
        Self {
            ring_freq_hz: 80.0,
            ring_depth: 0.5,
            pitch_steps: -2.0,
            bins_per_octave: 12,
            band_low_hz: 500.0,
            band_high_hz: 2000.0,
            band_order: 4,
        }
    }
}

impl RobotParams {
    /// Validate parameter ranges
    pub fn validate(&self) -> Result<()> {
        ensure_range("robot.ring_freq_hz", self.ring_freq_hz, 1.0, 2000.0)?;
        ensure_range("robot.ring_depth", self.ring_depth, 0.0, 1.0)?;
        ensure_range("robot.pitch_steps", self.pitch_steps, -24.0, 24.0)?;
        ensure_range("robot.band_low_hz", self.band_low_hz, 20.0, 20000.0)?;
        ensure_range("robot.band_high_hz", self.band_high_hz, 20.0, 20000.0)?;
        Ok(())
    }
}

/// Multiply by the ring modulator carrier, `t` being the sample time
fn ring_modulate(samples: &[f32], sample_rate: u32, freq_hz: f32, depth: f32) -> Vec<f32> {
    let omega = 2.0 * PI * freq_hz as f64 / sample_rate as f64;
    samples
        .iter()
        .enumerate()
        .map(|(i, &x)| x * (1.0 + depth * (omega * i as f64).sin() as f32))
        .collect()
}

/// Apply the robot voice filter
///
/// Output length equals input length.
pub fn robot(input: &SampleBuffer, params: &RobotParams) -> Result<SampleBuffer> {
    input.ensure_valid("robot")?;
    params.validate()?;

    let sample_rate = input.sample_rate();

    let modulated = ring_modulate(
        input.samples(),
        sample_rate,
        params.ring_freq_hz,
        params.ring_depth,
    );
    let shifted = pitch_shift(&modulated, params.pitch_steps, params.bins_per_octave)?;
    let band = SosFilter::bandpass(
        params.band_order,
        params.band_low_hz,
        params.band_high_hz,
        sample_rate,
    )?;

    let output = input.with_samples(band.apply(&shifted));
    output.ensure_valid("robot")?;
    Ok(output)
}
