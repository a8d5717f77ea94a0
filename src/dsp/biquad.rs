//! Biquad filters and Butterworth cascades
//!
//! Even-order Butterworth low/high-pass filters are built from cascaded
//! cookbook biquads, one per conjugate pole pair. A band-pass is the cascade
//! of a high-pass at the lower edge and a low-pass at the upper edge.

use crate::error::{Result, VoiceFxError};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Response of a single biquad section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    /// Remove above frequency
    LowPass,
    /// Remove below frequency
    HighPass,
}

/// Biquad filter coefficients
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (a0 + a1*z^-1 + a2*z^-2)
/// Normalized: all coefficients divided by a0
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl BiquadCoeffs {
    /// Calculate biquad coefficients using Audio EQ Cookbook formulas
    /// Reference: https://www.w3.org/2011/audio/audio-eq-cookbook.html
    pub fn calculate(filter_type: FilterType, sample_rate: f64, frequency: f64, q: f64) -> Self {
        // Clamp frequency to valid range (below Nyquist)
        let freq = frequency.clamp(1.0, sample_rate / 2.0 - 1.0);
        let q = q.clamp(0.1, 10.0);

        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let (b0, b1, b2, a0, a1, a2) = match filter_type {
            FilterType::LowPass => (
                (1.0 - cos_w0) / 2.0,
                1.0 - cos_w0,
                (1.0 - cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterType::HighPass => (
                (1.0 + cos_w0) / 2.0,
                -(1.0 + cos_w0),
                (1.0 + cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
        };

        BiquadCoeffs {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// Biquad filter state
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    x1: f64, // x[n-1]
    x2: f64, // x[n-2]
    y1: f64, // y[n-1]
    y2: f64, // y[n-2]
}

impl BiquadState {
    /// Process a single sample (Direct Form I)
    #[inline]
    fn process(&mut self, input: f64, coeffs: &BiquadCoeffs) -> f64 {
        let output = coeffs.b0 * input + coeffs.b1 * self.x1 + coeffs.b2 * self.x2
            - coeffs.a1 * self.y1
            - coeffs.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }
}

/// Q of each second-order section of an even-order Butterworth filter
fn butterworth_qs(order: usize) -> Vec<f64> {
    (0..order / 2)
        .map(|k| {
            let theta = (2 * k + 1) as f64 * PI / (2 * order) as f64;
            1.0 / (2.0 * theta.cos())
        })
        .collect()
}

/// Cascade of second-order sections
///
/// Each `apply` starts from zero state, so one instance can be shared
/// between threads and reused freely.
#[derive(Debug, Clone, PartialEq)]
pub struct SosFilter {
    sections: Vec<BiquadCoeffs>,
}

impl SosFilter {
    /// Butterworth low-pass of an even order
    pub fn lowpass(order: usize, cutoff_hz: f32, sample_rate: u32) -> Result<Self> {
        Self::butterworth(FilterType::LowPass, order, cutoff_hz, sample_rate)
    }

    /// Butterworth high-pass of an even order
    pub fn highpass(order: usize, cutoff_hz: f32, sample_rate: u32) -> Result<Self> {
        Self::butterworth(FilterType::HighPass, order, cutoff_hz, sample_rate)
    }

    /// Band-pass from a high-pass at `low_hz` and a low-pass at `high_hz`
    pub fn bandpass(order: usize, low_hz: f32, high_hz: f32, sample_rate: u32) -> Result<Self> {
        if low_hz >= high_hz {
            return Err(VoiceFxError::InvalidParameter {
                param: "band".to_string(),
                value: format!("{}-{} Hz", low_hz, high_hz),
                expected: "low edge below high edge".to_string(),
            });
        }

        let mut sections = Self::highpass(order, low_hz, sample_rate)?.sections;
        sections.extend(Self::lowpass(order, high_hz, sample_rate)?.sections);
        Ok(Self { sections })
    }

    fn butterworth(
        filter_type: FilterType,
        order: usize,
        cutoff_hz: f32,
        sample_rate: u32,
    ) -> Result<Self> {
        if order == 0 || order % 2 != 0 || order > 8 {
            return Err(VoiceFxError::InvalidParameter {
                param: "order".to_string(),
                value: order.to_string(),
                expected: "2, 4, 6 or 8".to_string(),
            });
        }

        let nyquist = sample_rate as f32 / 2.0;
        if !(cutoff_hz > 0.0 && cutoff_hz < nyquist) {
            return Err(VoiceFxError::InvalidParameter {
                param: "cutoff_hz".to_string(),
                value: cutoff_hz.to_string(),
                expected: format!("0-{} Hz", nyquist),
            });
        }

        let sections = butterworth_qs(order)
            .into_iter()
            .map(|q| BiquadCoeffs::calculate(filter_type, sample_rate as f64, cutoff_hz as f64, q))
            .collect();

        Ok(Self { sections })
    }

    /// Number of second-order sections
    pub fn num_sections(&self) -> usize {
        self.sections.len()
    }

    /// Filter a signal, returning a new signal of the same length
    pub fn apply(&self, input: &[f32]) -> Vec<f32> {
        let mut states = vec![BiquadState::default(); self.sections.len()];

        input
            .iter()
            .map(|&x| {
                let mut y = x as f64;
                for (state, coeffs) in states.iter_mut().zip(&self.sections) {
                    y = state.process(y, coeffs);
                }
                y as f32
            })
            .collect()
    }
}
