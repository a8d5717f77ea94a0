//! Engine configuration
//!
//! Every field has a default, so an empty JSON object is a valid config.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dsp::FilterPresets;
use crate::engine::{DeliveryFormat, IngestOptions, CANONICAL_SAMPLE_RATE, SUPPORTED_BITRATES};
use crate::error::{Result, VoiceFxError};

/// Largest accepted input clip (20 MiB)
pub const DEFAULT_MAX_INPUT_BYTES: u64 = 20 * 1024 * 1024;

/// Age after which an orphaned job workspace is reclaimed
pub const DEFAULT_STALE_AFTER_SECS: u64 = 60 * 60;

/// Delivery container settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: DeliveryFormat,
    /// Constant bitrate for MP3 delivery
    pub bitrate_kbps: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: DeliveryFormat::Mp3,
            bitrate_kbps: 64,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Parent directory of per-job workspaces
    pub temp_dir: PathBuf,
    /// Where final artifacts are written (defaults to `temp_dir`)
    pub output_dir: Option<PathBuf>,
    /// Canonical processing sample rate
    pub sample_rate: u32,
    /// Largest accepted input file
    pub max_input_bytes: u64,
    /// Accepted input extensions, lowercase without the dot
    pub supported_extensions: Vec<String>,
    pub output: OutputConfig,
    /// Fixed seed for the radio noise generator
    pub noise_seed: Option<u64>,
    pub filters: FilterPresets,
    /// Workspaces older than this are removed by a sweep
    pub stale_after_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir().join("voicefx"),
            output_dir: None,
            sample_rate: CANONICAL_SAMPLE_RATE,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            supported_extensions: ["wav", "mp3", "ogg", "m4a", "flac"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            output: OutputConfig::default(),
            noise_seed: None,
            filters: FilterPresets::default(),
            stale_after_secs: DEFAULT_STALE_AFTER_SECS,
        }
    }
}

impl EngineConfig {
    /// Config rooted at `temp_dir`, defaults elsewhere
    pub fn with_temp_dir(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            ..Default::default()
        }
    }

    /// Load and validate a JSON config file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(VoiceFxError::FileNotFound {
                path: path.display().to_string(),
                source: None,
            });
        }

        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Directory final artifacts land in
    pub fn output_dir(&self) -> &Path {
        self.output_dir.as_deref().unwrap_or(&self.temp_dir)
    }

    /// Ingest limits derived from this config
    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            sample_rate: self.sample_rate,
            max_input_bytes: self.max_input_bytes,
            supported_extensions: self
                .supported_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    /// Check the configuration for values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate < 8000 || self.sample_rate > 192_000 {
            return Err(VoiceFxError::Config {
                reason: format!("sample_rate {} outside 8000-192000 Hz", self.sample_rate),
            });
        }

        if self.max_input_bytes == 0 {
            return Err(VoiceFxError::Config {
                reason: "max_input_bytes must be above zero".to_string(),
            });
        }

        if self.supported_extensions.is_empty() {
            return Err(VoiceFxError::Config {
                reason: "supported_extensions is empty".to_string(),
            });
        }

        if self.output.format == DeliveryFormat::Mp3
            && !SUPPORTED_BITRATES.contains(&self.output.bitrate_kbps)
        {
            return Err(VoiceFxError::Config {
                reason: format!(
                    "bitrate {} kbps not in {:?}",
                    self.output.bitrate_kbps, SUPPORTED_BITRATES
                ),
            });
        }

        self.filters.validate()
    }
}
