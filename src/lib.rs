//! VoiceFX - Voice Message Effect Engine
//!
//! Takes a short recorded voice clip, applies one named effect and hands back
//! a path to a playable mono clip.
//!
//! # Architecture
//!
//! Each job moves through a fixed pipeline:
//! - Ingest: decode any supported container to a mono `SampleBuffer` at the
//!   canonical sample rate
//! - Filter: one of deep, robot, radio, echo, bass (anything else passes through)
//! - Normalize: bring the peak back to at most full scale
//! - Encode: write the delivery container
//!
//! A failure at any stage never escapes `VoiceEngine::process`; the caller
//! always receives a readable path, falling back to the original input.

pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod pipeline;

pub use config::{EngineConfig, OutputConfig};
pub use dsp::{FilterKind, FilterPresets, FilterSpec};
pub use engine::{DeliveryFormat, SampleBuffer};
pub use error::{ErrorCategory, Result, VoiceFxError};
pub use pipeline::{JobHandle, JobStage, ProcessingResult, StageFailure, VoiceEngine};
