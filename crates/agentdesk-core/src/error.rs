//! Error types module
//!
//! Validation failures are data (collected into a `ValidationResult`), so
//! `ValidationError` and `ValidationWarning` are plain values. Failures that end a
//! file's pipeline are unified under `PipelineError`, which self-describes through
//! `ErrorMetadata` so callers can log and retry consistently.

use crate::models::ImageType;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like cancelled uploads
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata describing how an error should be reported and handled
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "UPLOAD_FAILED")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the caller
    fn suggested_action(&self) -> Option<&'static str>;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// A rule the file failed; any one of these rejects the file.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Empty file")]
    EmptyFile,

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Unsupported content type: {content_type} (allowed: {allowed:?})")]
    UnsupportedType {
        content_type: String,
        allowed: Vec<ImageType>,
    },

    #[error("Could not read image: {0}")]
    Undecodable(String),

    #[error("Image too small: {width}x{height} (min: {min_width}x{min_height})")]
    DimensionsTooSmall {
        width: u32,
        height: u32,
        min_width: u32,
        min_height: u32,
    },

    #[error("Image too large: {width}x{height} (max: {max_width}x{max_height})")]
    DimensionsTooLarge {
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },

    #[error("Aspect ratio {ratio:.2} outside allowed range {min:.2}-{max:.2}")]
    AspectRatioOutOfRange { ratio: f64, min: f64, max: f64 },

    #[error("File content does not match declared type {declared} (possible spoofed content)")]
    SignatureMismatch {
        declared: ImageType,
        detected: Option<ImageType>,
    },
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::EmptyFile => "EMPTY_FILE",
            ValidationError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            ValidationError::UnsupportedType { .. } => "UNSUPPORTED_TYPE",
            ValidationError::Undecodable(_) => "UNDECODABLE",
            ValidationError::DimensionsTooSmall { .. } => "DIMENSIONS_TOO_SMALL",
            ValidationError::DimensionsTooLarge { .. } => "DIMENSIONS_TOO_LARGE",
            ValidationError::AspectRatioOutOfRange { .. } => "ASPECT_RATIO_OUT_OF_RANGE",
            ValidationError::SignatureMismatch { .. } => "SIGNATURE_MISMATCH",
        }
    }
}

/// Advisory finding; never rejects a file on its own.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationWarning {
    ExtensionMismatch {
        extension: String,
        content_type: String,
    },
    OversizedForWeb {
        width: u32,
        height: u32,
    },
    UncommonAspectRatio {
        ratio: f64,
    },
    SuspiciouslySmall {
        size: u64,
    },
    SuspiciousContent {
        pattern: String,
    },
}

impl ValidationWarning {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationWarning::ExtensionMismatch { .. } => "EXTENSION_MISMATCH",
            ValidationWarning::OversizedForWeb { .. } => "OVERSIZED_FOR_WEB",
            ValidationWarning::UncommonAspectRatio { .. } => "UNCOMMON_ASPECT_RATIO",
            ValidationWarning::SuspiciouslySmall { .. } => "SUSPICIOUSLY_SMALL",
            ValidationWarning::SuspiciousContent { .. } => "SUSPICIOUS_CONTENT",
        }
    }
}

impl Display for ValidationWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ValidationWarning::ExtensionMismatch {
                extension,
                content_type,
            } => write!(
                f,
                "File extension .{} does not match content type {}",
                extension, content_type
            ),
            ValidationWarning::OversizedForWeb { width, height } => write!(
                f,
                "Image {}x{} is much larger than needed for web display",
                width, height
            ),
            ValidationWarning::UncommonAspectRatio { ratio } => {
                write!(f, "Uncommon aspect ratio {:.2}", ratio)
            }
            ValidationWarning::SuspiciouslySmall { size } => {
                write!(f, "File is suspiciously small ({} bytes)", size)
            }
            ValidationWarning::SuspiciousContent { pattern } => {
                write!(f, "File contains suspicious embedded content ({})", pattern)
            }
        }
    }
}

/// Terminal failure of one file's pipeline
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error("Validation failed: {}", join_messages(.0))]
    Validation(Vec<ValidationError>),

    #[error("Optimization failed: {0}")]
    Optimization(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Upload failed after {attempts} attempts: {message}")]
    UploadExhausted { attempts: u32, message: String },

    #[error("Record write failed for {path} (blob rolled back: {rolled_back}): {message}")]
    Consistency {
        path: String,
        message: String,
        rolled_back: bool,
    },

    #[error("Upload cancelled: {0}")]
    Cancelled(String),
}

fn join_messages(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Static metadata: (error_code, is_recoverable, suggested_action, log_level).
fn pipeline_error_static_metadata(
    err: &PipelineError,
) -> (&'static str, bool, Option<&'static str>, LogLevel) {
    match err {
        PipelineError::Validation(_) => (
            "VALIDATION_FAILED",
            false,
            Some("Choose a different image or adjust validation options"),
            LogLevel::Debug,
        ),
        PipelineError::Optimization(_) => (
            "OPTIMIZATION_FAILED",
            false,
            Some("Upload the image in a common format such as JPEG or PNG"),
            LogLevel::Error,
        ),
        PipelineError::Upload(_) => (
            "UPLOAD_FAILED",
            true,
            Some("Retry after a short delay"),
            LogLevel::Warn,
        ),
        PipelineError::UploadExhausted { .. } => (
            "UPLOAD_RETRIES_EXHAUSTED",
            true,
            Some("Retry the failed files"),
            LogLevel::Error,
        ),
        PipelineError::Consistency { .. } => (
            "CONSISTENCY_ERROR",
            true,
            Some("Retry the upload; no partial data was kept"),
            LogLevel::Error,
        ),
        PipelineError::Cancelled(_) => ("UPLOAD_CANCELLED", false, None, LogLevel::Warn),
    }
}

impl ErrorMetadata for PipelineError {
    fn error_code(&self) -> &'static str {
        pipeline_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        pipeline_error_static_metadata(self).1
    }

    fn suggested_action(&self) -> Option<&'static str> {
        pipeline_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        pipeline_error_static_metadata(self).3
    }
}
