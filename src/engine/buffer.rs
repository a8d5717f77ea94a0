//! Sample Buffer
//!
//! Mono 32-bit float audio at an explicit sample rate. Every pipeline stage
//! consumes one of these and hands a new one to the next stage.

use crate::error::{Result, VoiceFxError};

// ============================================================================
// Constants
// ============================================================================

/// Canonical sample rate for all processing (44.1kHz)
pub const CANONICAL_SAMPLE_RATE: u32 = 44100;

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels
///
/// Returns -f32::INFINITY for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// Average interleaved frames down to a single channel
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }

    let scale = 1.0 / channels as f32;
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}

// ============================================================================
// SampleBuffer
// ============================================================================

/// Mono audio buffer for voice processing
#[derive(Clone, Debug, PartialEq)]
pub struct SampleBuffer {
    /// Sample data
    samples: Vec<f32>,
    /// Sample rate in Hz
    sample_rate: u32,
}

impl SampleBuffer {
    /// Create a silent buffer with the given length
    pub fn silence(num_samples: usize, sample_rate: u32) -> Self {
        Self {
            samples: vec![0.0; num_samples],
            sample_rate,
        }
    }

    /// Wrap existing samples
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the buffer holds no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Get a reference to the samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Get a mutable reference to the samples
    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    /// Consume the buffer, returning its samples
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Build a new buffer at the same sample rate
    pub fn with_samples(&self, samples: Vec<f32>) -> Self {
        Self {
            samples,
            sample_rate: self.sample_rate,
        }
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max)
    }

    /// RMS level in dBFS
    pub fn rms_db(&self) -> f32 {
        if self.samples.is_empty() {
            return f32::NEG_INFINITY;
        }

        let sum_sq: f64 = self.samples.iter().map(|&s| (s as f64).powi(2)).sum();
        let rms = (sum_sq / self.samples.len() as f64).sqrt() as f32;
        linear_to_db(rms)
    }

    /// Check if buffer contains valid audio (no NaN/Inf)
    pub fn is_finite(&self) -> bool {
        self.samples.iter().all(|s| s.is_finite())
    }

    /// Reject buffers that a filter must not accept or emit
    pub fn ensure_valid(&self, filter: &str) -> Result<()> {
        if self.samples.is_empty() {
            return Err(VoiceFxError::Filter {
                filter: filter.to_string(),
                reason: "buffer is empty".to_string(),
            });
        }
        if self.sample_rate == 0 {
            return Err(VoiceFxError::Filter {
                filter: filter.to_string(),
                reason: "sample rate is zero".to_string(),
            });
        }
        if !self.is_finite() {
            return Err(VoiceFxError::DspOverflow {
                filter: filter.to_string(),
            });
        }
        Ok(())
    }

    /// Generate a sine test tone
    pub fn sine(frequency: f32, amplitude: f32, duration_secs: f32, sample_rate: u32) -> Self {
        let num_samples = (duration_secs * sample_rate as f32) as usize;
        let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;

        let samples = (0..num_samples)
            .map(|i| amplitude * (angular_freq * i as f32).sin())
            .collect();

        Self {
            samples,
            sample_rate,
        }
    }

    /// Generate a unit impulse at sample 0
    pub fn impulse(num_samples: usize, sample_rate: u32) -> Self {
        let mut buffer = Self::silence(num_samples, sample_rate);
        if let Some(first) = buffer.samples.first_mut() {
            *first = 1.0;
        }
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_silence() {
        let buf = SampleBuffer::silence(1000, CANONICAL_SAMPLE_RATE);
        assert_eq!(buf.len(), 1000);
        assert_eq!(buf.sample_rate(), 44100);
        assert_eq!(buf.peak(), 0.0);
        assert_eq!(buf.rms_db(), f32::NEG_INFINITY);
    }

    #[test]
    fn test_sine_rms() {
        let buf = SampleBuffer::sine(440.0, 1.0, 1.0, CANONICAL_SAMPLE_RATE);
        // RMS of a unit sine is 1/sqrt(2) = -3.01 dB
        assert_abs_diff_eq!(buf.rms_db(), -3.01, epsilon = 0.1);
        assert!(buf.peak() <= 1.0);
    }

    #[test]
    fn test_downmix_stereo() {
        let interleaved = vec![1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        assert_eq!(downmix(&interleaved, 2), vec![0.5, 0.5, 0.0]);
        assert_eq!(downmix(&interleaved, 1), interleaved);
    }

    #[test]
    fn test_ensure_valid() {
        let mut buf = SampleBuffer::impulse(100, CANONICAL_SAMPLE_RATE);
        assert!(buf.ensure_valid("test").is_ok());

        buf.samples_mut()[50] = f32::NAN;
        let err = buf.ensure_valid("test").unwrap_err();
        assert_eq!(err.error_code(), "DSP_OVERFLOW");

        let empty = SampleBuffer::silence(0, CANONICAL_SAMPLE_RATE);
        assert_eq!(empty.ensure_valid("test").unwrap_err().error_code(), "FILTER_ERROR");
    }

    #[test]
    fn test_db_conversions() {
        assert_abs_diff_eq!(db_to_linear(0.0), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(linear_to_db(0.5), -6.02, epsilon = 0.01);
    }
}
