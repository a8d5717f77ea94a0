//! Audio Engine Module
//!
//! Buffer type and file I/O around the filter bank:
//! - Sample buffer and level helpers
//! - Ingest (container decoding to the canonical layout)
//! - Delivery container encoding

pub mod buffer;
pub mod encode;
pub mod io;

pub use buffer::{downmix, SampleBuffer, CANONICAL_SAMPLE_RATE};
pub use encode::{encode, DeliveryFormat, SUPPORTED_BITRATES};
pub use io::{file_checksum, ingest, resample_linear, write_wav, IngestOptions, WavEncoding};
