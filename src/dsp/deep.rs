//! Deep voice filter
//!
//! Fine-grained downward pitch shift, a slightly slower tempo, a low-passed
//! bass layer mixed back in and a single-tap room reflection. Peak
//! normalization happens afterwards in the pipeline.

use serde::{Deserialize, Serialize};

use super::biquad::SosFilter;
use super::echo::{delay_samples, mix_delayed};
use super::ensure_range;
use super::stretch::{pitch_shift, time_stretch};
use crate::engine::SampleBuffer;
use crate::error::{Result, VoiceFxError};

/// Deep voice parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepParams {
    /// Pitch shift in steps of `1/bins_per_octave` octave (negative = down)
    pub pitch_steps: f32,
    /// Pitch resolution; 36 gives third-of-a-semitone steps
    pub bins_per_octave: u32,
    /// Playback rate of the time-stretch (below 1.0 = slower)
    pub stretch_rate: f32,
    /// Low-pass cutoff of the bass layer
    pub bass_cutoff_hz: f32,
    /// Low-pass order of the bass layer
    pub bass_order: usize,
    /// Gain of the bass layer mixed onto the signal
    pub bass_gain: f32,
    /// Reflection delay
    pub reverb_delay_ms: f32,
    /// Reflection decay
    pub reverb_decay: f32,
    /// Wet ratio of the reflection
    pub reverb_wet: f32,
}

impl Default for DeepParams {
    fn default() -> Self {
        Self {
            pitch_steps: -4.0,
            bins_per_octave: 36,
            stretch_rate: 0.92,
            bass_cutoff_hz: 150.0,
            bass_order: 4,
            // 10 dB nominal boost / 20
            bass_gain: 0.5,
            reverb_delay_ms: 100.0,
            reverb_decay: 0.5,
            reverb_wet: 0.3,
        }
    }
}

impl DeepParams {
    /// Validate parameter ranges
    pub fn validate(&self) -> Result<()> {
        ensure_range("deep.pitch_steps", self.pitch_steps, -48.0, 48.0)?;
        if self.bins_per_octave < 12 {
            return Err(VoiceFxError::InvalidParameter {
                param: "deep.bins_per_octave".to_string(),
                value: self.bins_per_octave.to_string(),
                expected: "12 or more".to_string(),
            });
        }
        ensure_range("deep.stretch_rate", self.stretch_rate, 0.5, 2.0)?;
        ensure_range("deep.bass_cutoff_hz", self.bass_cutoff_hz, 20.0, 1000.0)?;
        ensure_range("deep.bass_gain", self.bass_gain, 0.0, 4.0)?;
        ensure_range("deep.reverb_delay_ms", self.reverb_delay_ms, 1.0, 1000.0)?;
        ensure_range("deep.reverb_decay", self.reverb_decay, 0.0, 1.0)?;
        ensure_range("deep.reverb_wet", self.reverb_wet, 0.0, 1.0)?;
        Ok(())
    }
}

/// Apply the deep voice filter
///
/// Output length is `round(len / stretch_rate)`.
pub fn deep(input: &SampleBuffer, params: &DeepParams) -> Result<SampleBuffer> {
    input.ensure_valid("deep")?;
    params.validate()?;

    let sample_rate = input.sample_rate();

    let shifted = pitch_shift(input.samples(), params.pitch_steps, params.bins_per_octave)?;
    let stretched = time_stretch(&shifted, params.stretch_rate as f64)?;

    let bass = SosFilter::lowpass(params.bass_order, params.bass_cutoff_hz, sample_rate)?
        .apply(&stretched);
    let boosted: Vec<f32> = stretched
        .iter()
        .zip(&bass)
        .map(|(&dry, &low)| dry + low * params.bass_gain)
        .collect();

    let mut output = boosted.clone();
    mix_delayed(
        &mut output,
        &boosted,
        delay_samples(params.reverb_delay_ms, sample_rate),
        params.reverb_decay * params.reverb_wet,
    );

    let output = input.with_samples(output);
    output.ensure_valid("deep")?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CANONICAL_SAMPLE_RATE;

    #[test]
    fn test_duration_follows_stretch_rate() {
        let input = SampleBuffer::sine(220.0, 0.5, 1.0, CANONICAL_SAMPLE_RATE);
        let params = DeepParams::default();
        let out = deep(&input, &params).unwrap();

        let expected = input.len() as f64 / params.stretch_rate as f64;
        let tolerance = input.len() as f64 / 1000.0 + 1.0;
        assert!((out.len() as f64 - expected).abs() <= tolerance);
        assert_eq!(out.sample_rate(), CANONICAL_SAMPLE_RATE);
        assert!(out.is_finite());
    }

    #[test]
    fn test_deterministic() {
        let input = SampleBuffer::sine(300.0, 0.5, 0.5, CANONICAL_SAMPLE_RATE);
        let params = DeepParams::default();
        assert_eq!(deep(&input, &params).unwrap(), deep(&input, &params).unwrap());
    }

    #[test]
    fn test_invalid_params_rejected() {
        let input = SampleBuffer::sine(300.0, 0.5, 0.2, CANONICAL_SAMPLE_RATE);
        let params = DeepParams {
            stretch_rate: 0.0,
            ..Default::default()
        };
        assert_eq!(
            deep(&input, &params).unwrap_err().error_code(),
            "INVALID_PARAMETER"
        );
    }

    #[test]
    fn test_nan_input_fails() {
        let input = SampleBuffer::from_samples(vec![0.1, f32::NAN, 0.2], CANONICAL_SAMPLE_RATE);
        assert_eq!(
            deep(&input, &DeepParams::default()).unwrap_err().error_code(),
            "DSP_OVERFLOW"
        );
    }
}
