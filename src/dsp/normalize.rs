//! Peak normalization
//!
//! Scales a buffer down so its peak is at most 1.0. Buffers already within
//! range are returned untouched; quiet material is never amplified.

use crate::engine::SampleBuffer;
use crate::error::{Result, VoiceFxError};

/// Largest peak the delivery stage accepts
pub const PEAK_CEILING: f32 = 1.0;

/// Scale `buffer` so that `max(|x|) <= 1.0`
///
/// Length and sample rate are preserved.
pub fn normalize(buffer: SampleBuffer) -> Result<SampleBuffer> {
    if !buffer.is_finite() {
        return Err(VoiceFxError::DspOverflow {
            filter: "normalize".to_string(),
        });
    }

    let peak = buffer.peak();
    if peak <= PEAK_CEILING {
        return Ok(buffer);
    }

    let gain = PEAK_CEILING / peak;
    let mut scaled = buffer;
    for sample in scaled.samples_mut() {
        // Rounding can leave a sample just above the ceiling
        *sample = (*sample * gain).clamp(-PEAK_CEILING, PEAK_CEILING);
    }
    Ok(scaled)
}
