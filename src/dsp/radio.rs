//! AM radio filter
//!
//! Telephone-band band-pass, a little Gaussian hiss and `tanh` soft
//! saturation. The noise generator is passed in by the caller so runs can be
//! reproduced from a seed.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::biquad::SosFilter;
use super::ensure_range;
use crate::engine::SampleBuffer;
use crate::error::Result;

/// AM radio parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioParams {
    /// Lower band edge
    pub band_low_hz: f32,
    /// Upper band edge
    pub band_high_hz: f32,
    /// Butterworth order of each band edge
    pub band_order: usize,
    /// Gain of the band-passed signal before the noise is added
    pub signal_gain: f32,
    /// Standard deviation of the Gaussian noise
    pub noise_std: f32,
    /// Gain of the noise
    pub noise_mix: f32,
    /// Input gain of the saturator
    pub drive: f32,
    /// Output ceiling of the saturator
    pub ceiling: f32,
}

impl Default for RadioParams {
    fn default() -> Self {
        Self {
            band_low_hz: 300.0,
            band_high_hz: 3000.0,
            band_order: 4,
            signal_gain: 0.9,
            noise_std: 0.01,
            noise_mix: 0.1,
            drive: 2.0,
            ceiling: 0.8,
        }
    }
}

impl RadioParams {
    /// Validate parameter ranges
    pub fn validate(&self) -> Result<()> {
        ensure_range("radio.band_low_hz", self.band_low_hz, 20.0, 20000.0)?;
        ensure_range("radio.band_high_hz", self.band_high_hz, 20.0, 20000.0)?;
        ensure_range("radio.signal_gain", self.signal_gain, 0.0, 2.0)?;
        ensure_range("radio.noise_std", self.noise_std, 0.0, 1.0)?;
        ensure_range("radio.noise_mix", self.noise_mix, 0.0, 1.0)?;
        ensure_range("radio.drive", self.drive, 0.1, 20.0)?;
        ensure_range("radio.ceiling", self.ceiling, 0.0, 1.0)?;
        Ok(())
    }
}

/// Draw one standard normal sample (Box-Muller)
fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // Shift into (0, 1] so ln never sees zero
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Apply the AM radio filter
///
/// Output length equals input length; output peak never exceeds `ceiling`.
pub fn radio<R: Rng + ?Sized>(
    input: &SampleBuffer,
    params: &RadioParams,
    rng: &mut R,
) -> Result<SampleBuffer> {
    input.ensure_valid("radio")?;
    params.validate()?;

    let band = SosFilter::bandpass(
        params.band_order,
        params.band_low_hz,
        params.band_high_hz,
        input.sample_rate(),
    )?;

    let output: Vec<f32> = band
        .apply(input.samples())
        .into_iter()
        .map(|x| {
            let noise = standard_normal(rng) as f32 * params.noise_std;
            let mixed = x * params.signal_gain + noise * params.noise_mix;
            (mixed * params.drive).tanh() * params.ceiling
        })
        .collect();

    let output = input.with_samples(output);
    output.ensure_valid("radio")?;
    Ok(output)
}
