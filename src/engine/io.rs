//! Audio file I/O for VoiceFX
//!
//! Ingest decodes any supported container to a mono buffer at the canonical
//! sample rate. WAV is the canonical intermediate container: anything else is
//! decoded with symphonia, written to the job's intermediate WAV and read back.
//!
//! Sample rate conversion uses linear interpolation.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::{debug, warn};
use sha2::{Digest, Sha256};
use symphonia::core::audio::SampleBuffer as DecodeBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::engine::buffer::{downmix, SampleBuffer};
use crate::error::{Result, VoiceFxError};

/// Limits and targets applied while ingesting a clip
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Canonical output sample rate
    pub sample_rate: u32,
    /// Largest accepted source file in bytes
    pub max_input_bytes: u64,
    /// Accepted file extensions, lowercase without the dot
    pub supported_extensions: Vec<String>,
}

/// Bit depth used when writing WAV files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WavEncoding {
    /// 16-bit signed integer PCM
    Int16,
    /// 32-bit IEEE float
    Float32,
}

/// Decoded audio before downmixing and resampling
struct DecodedAudio {
    interleaved: Vec<f32>,
    sample_rate: u32,
    channels: usize,
}

/// Decode an input clip into a canonical mono buffer
///
/// # Arguments
/// * `path` - Source clip in any supported container
/// * `intermediate` - Where to write the canonical WAV for non-WAV sources
/// * `options` - Size limit, accepted extensions and target sample rate
///
/// # Errors
/// * `FileNotFound` - If the file does not exist
/// * `EmptyAudio` - If the file is zero bytes or decodes to no samples
/// * `InputTooLarge` - If the file exceeds `max_input_bytes`
/// * `UnsupportedFormat` - If the extension is not accepted
/// * `Decode` - If the container or codec cannot be read
pub fn ingest(path: &Path, intermediate: &Path, options: &IngestOptions) -> Result<SampleBuffer> {
    let metadata = std::fs::metadata(path).map_err(|e| VoiceFxError::FileNotFound {
        path: path.display().to_string(),
        source: Some(e),
    })?;

    if metadata.len() == 0 {
        return Err(VoiceFxError::EmptyAudio);
    }

    if metadata.len() > options.max_input_bytes {
        return Err(VoiceFxError::InputTooLarge {
            size: metadata.len(),
            limit: options.max_input_bytes,
        });
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if !options.supported_extensions.iter().any(|s| *s == extension) {
        return Err(VoiceFxError::UnsupportedFormat {
            format: if extension.is_empty() {
                "file without extension".to_string()
            } else {
                format!(".{}", extension)
            },
        });
    }

    let buffer = if extension == "wav" {
        let decoded = read_wav(path)?;
        to_canonical(decoded, options.sample_rate)
    } else {
        // Re-encode to the canonical container, then decode that
        let decoded = decode_compressed(path, &extension)?;
        debug!(
            "Decoded {} ({} Hz, {} ch), writing intermediate {}",
            path.display(),
            decoded.sample_rate,
            decoded.channels,
            intermediate.display()
        );
        let canonical = to_canonical(decoded, options.sample_rate);
        write_wav(&canonical, intermediate, WavEncoding::Float32)?;
        to_canonical(read_wav(intermediate)?, options.sample_rate)
    };

    if buffer.is_empty() {
        return Err(VoiceFxError::EmptyAudio);
    }

    Ok(buffer)
}

/// Write a buffer to a mono WAV file
pub fn write_wav(buffer: &SampleBuffer, path: &Path, encoding: WavEncoding) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: match encoding {
            WavEncoding::Int16 => 16,
            WavEncoding::Float32 => 32,
        },
        sample_format: match encoding {
            WavEncoding::Int16 => SampleFormat::Int,
            WavEncoding::Float32 => SampleFormat::Float,
        },
    };

    let mut writer =
        WavWriter::create(path, spec).map_err(|e| VoiceFxError::encode(path, e.to_string()))?;

    match encoding {
        WavEncoding::Int16 => {
            for &sample in buffer.samples() {
                let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer
                    .write_sample(scaled)
                    .map_err(|e| VoiceFxError::encode(path, e.to_string()))?;
            }
        }
        WavEncoding::Float32 => {
            for &sample in buffer.samples() {
                writer
                    .write_sample(sample)
                    .map_err(|e| VoiceFxError::encode(path, e.to_string()))?;
            }
        }
    }

    writer
        .finalize()
        .map_err(|e| VoiceFxError::encode(path, e.to_string()))?;

    Ok(())
}

/// Calculate the SHA-256 checksum of a file as lowercase hex
pub fn file_checksum(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut chunk = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut chunk)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&chunk[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Linear interpolation resampling by `ratio` (target rate / source rate)
pub fn resample_linear(samples: &[f32], ratio: f64) -> Vec<f32> {
    if samples.is_empty() || ratio <= 0.0 {
        return Vec::new();
    }

    let source_len = samples.len();
    let target_len = ((source_len as f64) * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(target_len);

    for i in 0..target_len {
        // Map output index to source position
        let src_pos = i as f64 / ratio;
        let src_idx = src_pos.floor() as usize;
        let frac = (src_pos - src_idx as f64) as f32;

        let sample = if src_idx + 1 < source_len {
            samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac
        } else if src_idx < source_len {
            samples[src_idx]
        } else {
            0.0
        };

        output.push(sample);
    }

    output
}

// ============================================================================
// Internal helper functions
// ============================================================================

/// Downmix and resample to the canonical layout
fn to_canonical(decoded: DecodedAudio, target_rate: u32) -> SampleBuffer {
    let mono = downmix(&decoded.interleaved, decoded.channels);

    if decoded.sample_rate == target_rate || mono.is_empty() {
        return SampleBuffer::from_samples(mono, target_rate);
    }

    let ratio = target_rate as f64 / decoded.sample_rate as f64;
    SampleBuffer::from_samples(resample_linear(&mono, ratio), target_rate)
}

/// Read a WAV file into interleaved f32 samples
fn read_wav(path: &Path) -> Result<DecodedAudio> {
    let reader = WavReader::open(path)
        .map_err(|e| VoiceFxError::decode(path, "failed to open WAV file", e))?;

    let spec = reader.spec();
    if spec.channels == 0 || spec.sample_rate == 0 {
        return Err(VoiceFxError::Decode {
            path: path.display().to_string(),
            reason: format!(
                "invalid WAV header ({} channels at {} Hz)",
                spec.channels, spec.sample_rate
            ),
            source: None,
        });
    }

    let interleaved = read_samples_as_f32(path, reader, spec.bits_per_sample, spec.sample_format)?;

    Ok(DecodedAudio {
        interleaved,
        sample_rate: spec.sample_rate,
        channels: spec.channels as usize,
    })
}

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    path: &Path,
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let read_err = |e: hound::Error| VoiceFxError::decode(path, "failed to read WAV samples", e);

    match sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(read_err),
        SampleFormat::Int => {
            let scale = match bits_per_sample {
                8 => 128.0,
                16 => 32768.0,
                24 => 8388608.0,
                32 => 2147483648.0,
                _ => {
                    return Err(VoiceFxError::UnsupportedFormat {
                        format: format!("{}-bit integer WAV", bits_per_sample),
                    })
                }
            };

            // hound widens every integer depth into i32
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(read_err)
        }
    }
}

/// Decode a compressed container with symphonia
fn decode_compressed(path: &Path, extension: &str) -> Result<DecodedAudio> {
    let file = File::open(path).map_err(|e| VoiceFxError::FileNotFound {
        path: path.display().to_string(),
        source: Some(e),
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(extension);

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| VoiceFxError::decode(path, "unrecognised container", e))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| VoiceFxError::Decode {
            path: path.display().to_string(),
            reason: "no audio track found".to_string(),
            source: None,
        })?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| VoiceFxError::decode(path, "no decoder for codec", e))?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut decode_buf: Option<DecodeBuffer<f32>> = None;
    let mut decode_buf_frames = 0u64;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(VoiceFxError::decode(path, "failed to read packet", e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(reason)) => {
                warn!("Skipping corrupt packet in {}: {}", path.display(), reason);
                continue;
            }
            Err(e) => return Err(VoiceFxError::decode(path, "failed to decode packet", e)),
        };

        let spec = *decoded.spec();
        sample_rate = spec.rate;
        channels = spec.channels.count();

        let capacity = decoded.capacity() as u64;
        if decode_buf.is_none() || capacity > decode_buf_frames {
            decode_buf = Some(DecodeBuffer::new(capacity, spec));
            decode_buf_frames = capacity;
        }

        if let Some(ref mut buf) = decode_buf {
            buf.copy_interleaved_ref(decoded);
            interleaved.extend_from_slice(buf.samples());
        }
    }

    if interleaved.is_empty() {
        return Err(VoiceFxError::EmptyAudio);
    }

    if sample_rate == 0 || channels == 0 {
        return Err(VoiceFxError::Decode {
            path: path.display().to_string(),
            reason: "stream has no sample rate or channel layout".to_string(),
            source: None,
        });
    }

    Ok(DecodedAudio {
        interleaved,
        sample_rate,
        channels,
    })
}

// ============================================================================
// Tests
// ============================================================================
