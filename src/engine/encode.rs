//! Delivery container encoding
//!
//! Voice messages are delivered as mono MP3 (LAME, CBR). WAV delivery exists
//! for collaborators that re-encode on their side.

use std::fs;
use std::path::Path;

use mp3lame_encoder::{Bitrate, Builder, FlushGap, MonoPcm, Quality};
use serde::{Deserialize, Serialize};

use crate::engine::buffer::SampleBuffer;
use crate::engine::io::{write_wav, WavEncoding};
use crate::error::{Result, VoiceFxError};

/// Bitrates LAME accepts for mono voice, in kbps
pub const SUPPORTED_BITRATES: [u32; 10] = [32, 40, 48, 64, 80, 96, 112, 128, 160, 192];

/// Container written for delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryFormat {
    /// Mono MP3
    #[default]
    Mp3,
    /// Mono 16-bit PCM WAV
    Wav,
}

impl DeliveryFormat {
    /// File extension for this container
    pub fn extension(&self) -> &'static str {
        match self {
            DeliveryFormat::Mp3 => "mp3",
            DeliveryFormat::Wav => "wav",
        }
    }
}

/// Encode a buffer into the delivery container
///
/// The buffer is always written as a single channel.
pub fn encode(
    buffer: &SampleBuffer,
    path: &Path,
    format: DeliveryFormat,
    bitrate_kbps: u32,
) -> Result<()> {
    if buffer.is_empty() {
        return Err(VoiceFxError::encode(path, "nothing to encode"));
    }

    match format {
        DeliveryFormat::Mp3 => write_mp3(buffer, path, bitrate_kbps),
        DeliveryFormat::Wav => write_wav(buffer, path, WavEncoding::Int16),
    }
}

/// Map a kbps value onto LAME's bitrate table
fn lame_bitrate(bitrate_kbps: u32) -> Option<Bitrate> {
    let bitrate = match bitrate_kbps {
        32 => Bitrate::Kbps32,
        40 => Bitrate::Kbps40,
        48 => Bitrate::Kbps48,
        64 => Bitrate::Kbps64,
        80 => Bitrate::Kbps80,
        96 => Bitrate::Kbps96,
        112 => Bitrate::Kbps112,
        128 => Bitrate::Kbps128,
        160 => Bitrate::Kbps160,
        192 => Bitrate::Kbps192,
        _ => return None,
    };
    Some(bitrate)
}

/// Write a buffer to a mono MP3 file using the LAME encoder
fn write_mp3(buffer: &SampleBuffer, path: &Path, bitrate_kbps: u32) -> Result<()> {
    let bitrate = lame_bitrate(bitrate_kbps).ok_or_else(|| {
        VoiceFxError::encode(path, format!("unsupported bitrate {} kbps", bitrate_kbps))
    })?;

    let mut builder =
        Builder::new().ok_or_else(|| VoiceFxError::encode(path, "failed to create LAME encoder"))?;

    builder
        .set_sample_rate(buffer.sample_rate())
        .map_err(|e| VoiceFxError::encode(path, format!("invalid sample rate: {:?}", e)))?;
    builder
        .set_num_channels(1)
        .map_err(|e| VoiceFxError::encode(path, format!("invalid channel count: {:?}", e)))?;
    builder
        .set_brate(bitrate)
        .map_err(|e| VoiceFxError::encode(path, format!("failed to set bitrate: {:?}", e)))?;
    builder
        .set_quality(Quality::Good)
        .map_err(|e| VoiceFxError::encode(path, format!("failed to set quality: {:?}", e)))?;

    let mut encoder = builder
        .build()
        .map_err(|e| VoiceFxError::encode(path, format!("failed to build encoder: {:?}", e)))?;

    let pcm: Vec<i16> = buffer
        .samples()
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
        .collect();

    // MP3 worst case: 1.25 * num_samples + 7200
    let mut mp3_bytes: Vec<u8> = Vec::with_capacity((pcm.len() as f64 * 1.25) as usize + 7200);

    encoder
        .encode_to_vec(MonoPcm(&pcm), &mut mp3_bytes)
        .map_err(|e| VoiceFxError::encode(path, format!("MP3 encoding failed: {:?}", e)))?;

    // The final frames need up to 7200 bytes of spare capacity
    mp3_bytes.reserve(7200);
    encoder
        .flush_to_vec::<FlushGap>(&mut mp3_bytes)
        .map_err(|e| VoiceFxError::encode(path, format!("MP3 flush failed: {:?}", e)))?;

    fs::write(path, mp3_bytes).map_err(|e| VoiceFxError::encode(path, e.to_string()))?;

    Ok(())
}
