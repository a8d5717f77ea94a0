//! Voice Filter Bank
//!
//! Stateless transforms from one `SampleBuffer` to a new one. Every filter is
//! a plain function of its input, its parameter struct and (for Radio) an
//! explicit random generator, so filters can run concurrently without locks.

mod bass;
mod biquad;
mod deep;
mod echo;
mod normalize;
mod radio;
mod robot;
mod spec;
mod stretch;

pub use bass::{bass, BassParams};
pub use biquad::{BiquadCoeffs, FilterType, SosFilter};
pub use deep::{deep, DeepParams};
pub use echo::{echo, EchoParams, EchoTap};
pub use normalize::{normalize, PEAK_CEILING};
pub use radio::{radio, RadioParams};
pub use robot::{robot, RobotParams};
pub use spec::{FilterKind, FilterPresets, FilterSpec, FILTER_NAMES};
pub use stretch::{pitch_shift, time_stretch, HOP_LENGTH, N_FFT};

use crate::error::{Result, VoiceFxError};

/// Reject a parameter outside `[min, max]` (NaN included)
pub(crate) fn ensure_range(param: &str, value: f32, min: f32, max: f32) -> Result<()> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(VoiceFxError::InvalidParameter {
            param: param.to_string(),
            value: value.to_string(),
            expected: format!("{} to {}", min, max),
        })
    }
}
