//! Error handling for VoiceFX
//!
//! Every error maps onto one of three processing categories (decode, filter,
//! encode). The orchestrator catches all of them; none escape `process`.

use thiserror::Error;

/// Result type alias for VoiceFX operations
pub type Result<T> = std::result::Result<T, VoiceFxError>;

/// Processing category an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Source unreadable, empty, oversize or in an unsupported container
    Decode,
    /// Numeric or algorithmic failure inside a transform
    Filter,
    /// Write or codec failure while producing the delivery container
    Encode,
    /// Configuration and plumbing errors outside a job
    Other,
}

impl ErrorCategory {
    /// Name used in log lines and CLI output
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Decode => "DecodeError",
            ErrorCategory::Filter => "FilterError",
            ErrorCategory::Encode => "EncodeError",
            ErrorCategory::Other => "Error",
        }
    }
}

/// Main error type for VoiceFX operations
#[derive(Error, Debug)]
pub enum VoiceFxError {
    // Ingest Errors
    #[error("File not found: {path}")]
    FileNotFound {
        path: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Audio contains no samples")]
    EmptyAudio,

    #[error("Input too large: {size} bytes (limit {limit} bytes)")]
    InputTooLarge { size: u64, limit: u64 },

    #[error("Failed to decode {path}: {reason}")]
    Decode {
        path: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Filter Errors
    #[error("Filter '{filter}' failed: {reason}")]
    Filter { filter: String, reason: String },

    #[error("DSP overflow: filter '{filter}' produced invalid audio (NaN/Inf)")]
    DspOverflow { filter: String },

    #[error("Invalid parameter {param}={value} (expected {expected})")]
    InvalidParameter {
        param: String,
        value: String,
        expected: String,
    },

    // Encode Errors
    #[error("Failed to encode {path}: {reason}")]
    Encode { path: String, reason: String },

    // Configuration Errors
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VoiceFxError {
    /// Shorthand for a decode failure with an underlying cause
    pub fn decode(
        path: &std::path::Path,
        reason: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        VoiceFxError::Decode {
            path: path.display().to_string(),
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Shorthand for an encode failure
    pub fn encode(path: &std::path::Path, reason: impl Into<String>) -> Self {
        VoiceFxError::Encode {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            VoiceFxError::FileNotFound { .. } => "FILE_NOT_FOUND",
            VoiceFxError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            VoiceFxError::EmptyAudio => "EMPTY_AUDIO",
            VoiceFxError::InputTooLarge { .. } => "INPUT_TOO_LARGE",
            VoiceFxError::Decode { .. } => "DECODE_ERROR",
            VoiceFxError::Filter { .. } => "FILTER_ERROR",
            VoiceFxError::DspOverflow { .. } => "DSP_OVERFLOW",
            VoiceFxError::InvalidParameter { .. } => "INVALID_PARAMETER",
            VoiceFxError::Encode { .. } => "ENCODE_ERROR",
            VoiceFxError::Config { .. } => "CONFIG_ERROR",
            VoiceFxError::Io(_) => "IO_ERROR",
            VoiceFxError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Map this error onto the decode/filter/encode taxonomy
    pub fn category(&self) -> ErrorCategory {
        match self {
            VoiceFxError::FileNotFound { .. }
            | VoiceFxError::UnsupportedFormat { .. }
            | VoiceFxError::EmptyAudio
            | VoiceFxError::InputTooLarge { .. }
            | VoiceFxError::Decode { .. } => ErrorCategory::Decode,
            VoiceFxError::Filter { .. }
            | VoiceFxError::DspOverflow { .. }
            | VoiceFxError::InvalidParameter { .. } => ErrorCategory::Filter,
            VoiceFxError::Encode { .. } => ErrorCategory::Encode,
            VoiceFxError::Config { .. }
            | VoiceFxError::Io(_)
            | VoiceFxError::Serialization(_) => ErrorCategory::Other,
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            VoiceFxError::FileNotFound { .. } => vec![
                "Check the file path is correct",
                "The clip may have been cleaned up already",
            ],
            VoiceFxError::UnsupportedFormat { .. } => vec![
                "Convert to WAV, MP3, OGG, M4A or FLAC first",
                "Add the extension to supported_extensions if symphonia can decode it",
            ],
            VoiceFxError::EmptyAudio => vec!["The recording is empty - record the clip again"],
            VoiceFxError::InputTooLarge { .. } => vec![
                "Trim the clip before processing",
                "Raise max_input_bytes in the engine configuration",
            ],
            VoiceFxError::DspOverflow { .. } => vec![
                "The filter parameters may be too extreme",
                "The unmodified clip was delivered instead",
            ],
            VoiceFxError::Encode { .. } => vec![
                "Check free disk space in the output directory",
                "Try the wav delivery format",
            ],
            _ => vec![],
        }
    }
}
