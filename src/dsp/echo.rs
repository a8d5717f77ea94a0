//! Echo filter
//!
//! Sums delayed, decayed copies of the dry signal onto it. The buffer keeps
//! its length: taps that would land past the end are truncated, and samples
//! before a tap's offset get nothing from that tap.

use serde::{Deserialize, Serialize};

use super::ensure_range;
use crate::engine::SampleBuffer;
use crate::error::Result;

/// One delayed copy of the dry signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EchoTap {
    /// Delay in milliseconds
    pub delay_ms: f32,
    /// Gain applied to the delayed copy
    pub decay: f32,
}

/// Echo parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EchoParams {
    /// Taps, each read from the dry signal
    pub taps: Vec<EchoTap>,
}

impl Default for EchoParams {
    fn default() -> Self {
        Self {
            taps: vec![
                EchoTap {
                    delay_ms: 300.0,
                    decay: 0.6,
                },
                EchoTap {
                    delay_ms: 600.0,
                    decay: 0.3,
                },
            ],
        }
    }
}

impl EchoParams {
    /// Validate tap parameters
    pub fn validate(&self) -> Result<()> {
        for tap in &self.taps {
            ensure_range("echo.delay_ms", tap.delay_ms, 1.0, 5000.0)?;
            ensure_range("echo.decay", tap.decay, 0.0, 1.0)?;
        }
        Ok(())
    }
}

/// Delay in whole samples for a time in milliseconds
pub(crate) fn delay_samples(delay_ms: f32, sample_rate: u32) -> usize {
    (delay_ms as f64 / 1000.0 * sample_rate as f64) as usize
}

/// Add `gain * source[i - delay]` onto `target[i]`
pub(crate) fn mix_delayed(target: &mut [f32], source: &[f32], delay: usize, gain: f32) {
    if delay >= target.len() {
        return;
    }
    for (out, &dry) in target[delay..].iter_mut().zip(source) {
        *out += dry * gain;
    }
}

/// Apply the echo filter
pub fn echo(input: &SampleBuffer, params: &EchoParams) -> Result<SampleBuffer> {
    input.ensure_valid("echo")?;
    params.validate()?;

    let dry = input.samples();
    let mut wet = dry.to_vec();

    for tap in &params.taps {
        let delay = delay_samples(tap.delay_ms, input.sample_rate());
        mix_delayed(&mut wet, dry, delay, tap.decay);
    }

    let output = input.with_samples(wet);
    output.ensure_valid("echo")?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CANONICAL_SAMPLE_RATE;

    #[test]
    fn test_impulse_response() {
        let sr = CANONICAL_SAMPLE_RATE;
        let input = SampleBuffer::impulse(sr as usize, sr);
        let out = echo(&input, &EchoParams::default()).unwrap();

        let tap1 = (0.3 * sr as f64) as usize;
        let tap2 = (0.6 * sr as f64) as usize;
        assert_eq!(out.len(), input.len());
        assert!((out.samples()[0] - 1.0).abs() < 1e-6);
        assert!((out.samples()[tap1] - 0.6).abs() < 1e-6);
        assert!((out.samples()[tap2] - 0.3).abs() < 1e-6);

        for (i, &s) in out.samples().iter().enumerate() {
            if i != 0 && i != tap1 && i != tap2 {
                assert!(s.abs() < 1e-9, "unexpected energy {} at sample {}", s, i);
            }
        }
    }

    #[test]
    fn test_taps_beyond_end_are_truncated() {
        let sr = CANONICAL_SAMPLE_RATE;
        // 0.4s clip: first tap fits, second does not
        let input = SampleBuffer::impulse((0.4 * sr as f64) as usize, sr);
        let out = echo(&input, &EchoParams::default()).unwrap();

        assert_eq!(out.len(), input.len());
        let energy: f32 = out.samples().iter().map(|s| s.abs()).sum();
        assert!((energy - 1.6).abs() < 1e-5);
    }

    #[test]
    fn test_mix_delayed() {
        let source = [1.0, 2.0, 3.0];
        let mut target = [0.0; 3];
        mix_delayed(&mut target, &source, 1, 0.5);
        assert_eq!(target, [0.0, 0.5, 1.0]);

        let mut short = [0.0; 2];
        mix_delayed(&mut short, &source, 5, 1.0);
        assert_eq!(short, [0.0, 0.0]);
    }

    #[test]
    fn test_empty_buffer_fails() {
        let empty = SampleBuffer::silence(0, CANONICAL_SAMPLE_RATE);
        assert!(echo(&empty, &EchoParams::default()).is_err());
    }
}
