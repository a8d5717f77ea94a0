//! Time-stretch and pitch-shift
//!
//! STFT phase vocoder: frames are read at fractional positions spaced by the
//! playback rate, magnitudes are interpolated between neighbouring frames and
//! each bin's phase is advanced by its measured instantaneous frequency.
//!
//! Pitch shift = time-stretch by `rate`, then resample by `rate`, which
//! restores the original duration at a shifted pitch.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::f64::consts::PI;

use crate::engine::io::resample_linear;
use crate::error::{Result, VoiceFxError};

/// FFT size of the analysis/synthesis frames
pub const N_FFT: usize = 2048;

/// Distance between frames in samples
pub const HOP_LENGTH: usize = N_FFT / 4;

const N_BINS: usize = N_FFT / 2 + 1;

type Spectrum = Vec<Complex<f64>>;

/// Periodic Hann window
fn hann_window(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / size as f64).cos())
        .collect()
}

/// Wrap a phase into [-pi, pi]
#[inline]
fn principal_angle(phase: f64) -> f64 {
    phase - 2.0 * PI * (phase / (2.0 * PI)).round()
}

/// Centred short-time Fourier transform (zero padded by N_FFT/2 each side)
fn stft(signal: &[f32], planner: &mut FftPlanner<f64>, window: &[f64]) -> Vec<Spectrum> {
    let pad = N_FFT / 2;
    let mut padded = vec![0.0f64; signal.len() + 2 * pad];
    for (dst, &src) in padded[pad..].iter_mut().zip(signal) {
        *dst = src as f64;
    }

    let n_frames = 1 + (padded.len() - N_FFT) / HOP_LENGTH;
    let fft = planner.plan_fft_forward(N_FFT);
    let mut scratch = vec![Complex::new(0.0, 0.0); N_FFT];

    (0..n_frames)
        .map(|frame| {
            let start = frame * HOP_LENGTH;
            for (i, bin) in scratch.iter_mut().enumerate() {
                *bin = Complex::new(padded[start + i] * window[i], 0.0);
            }
            fft.process(&mut scratch);
            scratch[..N_BINS].to_vec()
        })
        .collect()
}

/// Resample a spectrogram in time without changing its frequency content
fn phase_vocoder(frames: &[Spectrum], rate: f64) -> Vec<Spectrum> {
    let n_frames = frames.len();
    let zero = vec![Complex::new(0.0, 0.0); N_BINS];
    let frame_at = |idx: usize| frames.get(idx).unwrap_or(&zero);

    // Expected phase advance per hop for each bin
    let phi_advance: Vec<f64> = (0..N_BINS)
        .map(|k| 2.0 * PI * HOP_LENGTH as f64 * k as f64 / N_FFT as f64)
        .collect();

    let mut phase_acc: Vec<f64> = frame_at(0).iter().map(|c| c.arg()).collect();
    let mut output = Vec::new();

    let mut step_index = 0usize;
    loop {
        let step = step_index as f64 * rate;
        if step >= n_frames as f64 {
            break;
        }

        let idx = step.floor() as usize;
        let alpha = step - idx as f64;
        let left = frame_at(idx);
        let right = frame_at(idx + 1);

        let mut column = Vec::with_capacity(N_BINS);
        for k in 0..N_BINS {
            let magnitude = (1.0 - alpha) * left[k].norm() + alpha * right[k].norm();
            column.push(Complex::from_polar(magnitude, phase_acc[k]));

            let deviation = principal_angle(right[k].arg() - left[k].arg() - phi_advance[k]);
            phase_acc[k] += phi_advance[k] + deviation;
        }
        output.push(column);
        step_index += 1;
    }

    output
}

/// Inverse STFT by windowed overlap-add, trimmed to `length` samples
fn istft(
    frames: &[Spectrum],
    length: usize,
    planner: &mut FftPlanner<f64>,
    window: &[f64],
) -> Vec<f32> {
    if frames.is_empty() {
        return vec![0.0; length];
    }

    let total = N_FFT + HOP_LENGTH * (frames.len() - 1);
    let mut signal = vec![0.0f64; total];
    let mut window_sum = vec![0.0f64; total];

    let ifft = planner.plan_fft_inverse(N_FFT);
    let mut scratch = vec![Complex::new(0.0, 0.0); N_FFT];

    for (frame_index, frame) in frames.iter().enumerate() {
        // Rebuild the Hermitian-symmetric full spectrum
        scratch[..N_BINS].copy_from_slice(frame);
        scratch[0].im = 0.0;
        scratch[N_FFT / 2].im = 0.0;
        for k in 1..N_FFT / 2 {
            scratch[N_FFT - k] = frame[k].conj();
        }

        ifft.process(&mut scratch);

        let start = frame_index * HOP_LENGTH;
        for i in 0..N_FFT {
            signal[start + i] += scratch[i].re / N_FFT as f64 * window[i];
            window_sum[start + i] += window[i] * window[i];
        }
    }

    for (s, &w) in signal.iter_mut().zip(&window_sum) {
        if w > f64::MIN_POSITIVE {
            *s /= w;
        }
    }

    let pad = N_FFT / 2;
    let mut output: Vec<f32> = signal
        .iter()
        .skip(pad)
        .take(length)
        .map(|&s| s as f32)
        .collect();
    output.resize(length, 0.0);
    output
}

/// Change duration without changing pitch
///
/// `rate` is a playback rate: values below 1.0 slow the clip down. The output
/// holds exactly `round(len / rate)` samples.
pub fn time_stretch(samples: &[f32], rate: f64) -> Result<Vec<f32>> {
    if !(rate.is_finite() && rate > 0.0) {
        return Err(VoiceFxError::InvalidParameter {
            param: "rate".to_string(),
            value: rate.to_string(),
            expected: "finite value above 0".to_string(),
        });
    }

    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let length = (samples.len() as f64 / rate).round() as usize;
    let window = hann_window(N_FFT);
    let mut planner = FftPlanner::new();

    let spectrogram = stft(samples, &mut planner, &window);
    let stretched = phase_vocoder(&spectrogram, rate);
    Ok(istft(&stretched, length, &mut planner, &window))
}

/// Shift pitch by `steps` divisions of an octave split into `bins_per_octave`
///
/// The output has exactly the input's length.
pub fn pitch_shift(samples: &[f32], steps: f32, bins_per_octave: u32) -> Result<Vec<f32>> {
    if bins_per_octave == 0 {
        return Err(VoiceFxError::InvalidParameter {
            param: "bins_per_octave".to_string(),
            value: "0".to_string(),
            expected: "at least 1".to_string(),
        });
    }

    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let rate = 2.0_f64.powf(-(steps as f64) / bins_per_octave as f64);
    let stretched = time_stretch(samples, rate)?;

    let mut shifted = resample_linear(&stretched, rate);
    shifted.resize(samples.len(), 0.0);
    Ok(shifted)
}
