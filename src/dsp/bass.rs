//! Bass boost filter
//!
//! Isolates sub-bass with a low-pass, adds it back boosted, then high-passes
//! the sum to strip the DC and rumble the boost brings up.

use serde::{Deserialize, Serialize};

use super::biquad::SosFilter;
use super::ensure_range;
use crate::engine::SampleBuffer;
use crate::error::Result;

/// Bass boost parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BassParams {
    pub lowpass_hz: f32,
    pub lowpass_order: usize,
    /// Gain of the isolated bass added back
    pub boost: f32,
    pub highpass_hz: f32,
    pub highpass_order: usize,
}

impl Default for BassParams {
    fn default() -> Self {
        Self {
            lowpass_hz: 100.0,
            lowpass_order: 4,
            boost: 1.5,
            highpass_hz: 80.0,
            highpass_order: 2,
        }
    }
}

impl BassParams {
    /// Validate parameter ranges
    pub fn validate(&self) -> Result<()> {
        ensure_range("bass.lowpass_hz", self.lowpass_hz, 20.0, 1000.0)?;
        ensure_range("bass.boost", self.boost, 0.0, 4.0)?;
        ensure_range("bass.highpass_hz", self.highpass_hz, 10.0, 500.0)?;
        Ok(())
    }
}

/// Apply the bass boost filter
///
/// Output length equals input length.
pub fn bass(input: &SampleBuffer, params: &BassParams) -> Result<SampleBuffer> {
    input.ensure_valid("bass")?;
    params.validate()?;

    let sample_rate = input.sample_rate();

    let low = SosFilter::lowpass(params.lowpass_order, params.lowpass_hz, sample_rate)?
        .apply(input.samples());
    let boosted: Vec<f32> = input
        .samples()
        .iter()
        .zip(&low)
        .map(|(&dry, &sub)| dry + sub * params.boost)
        .collect();

    let cleaned = SosFilter::highpass(params.highpass_order, params.highpass_hz, sample_rate)?
        .apply(&boosted);

    let output = input.with_samples(cleaned);
    output.ensure_valid("bass")?;
    Ok(output)
}
