use crate::optimizer::OptimizationResult;
use crate::validator::ValidationResult;
use agentdesk_core::{PipelineError, SourceFile, UploadRecord};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Where a file is in its pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStage {
    Pending,
    Validating,
    Optimizing,
    Uploading,
    Completed,
    Failed,
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessingStage::Pending => "pending",
            ProcessingStage::Validating => "validating",
            ProcessingStage::Optimizing => "optimizing",
            ProcessingStage::Uploading => "uploading",
            ProcessingStage::Completed => "completed",
            ProcessingStage::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Terminal status of a processed file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Success,
    /// Uploaded, with validation warnings.
    Warning,
    Error,
}

/// Everything the pipeline produced for one file.
///
/// `file` is always the caller's original input, even when an optimized
/// rendition was uploaded in its place.
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub file: SourceFile,
    pub status: ProcessingStatus,
    pub validation: ValidationResult,
    pub optimization: Option<OptimizationResult>,
    pub upload: Option<UploadRecord>,
    pub error: Option<PipelineError>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub elapsed: Duration,
}

impl ProcessingResult {
    pub(crate) fn new(file: SourceFile, validation: ValidationResult) -> Self {
        let errors = validation.error_messages();
        let warnings = validation.warning_messages();
        Self {
            file,
            status: ProcessingStatus::Success,
            validation,
            optimization: None,
            upload: None,
            error: None,
            errors,
            warnings,
            elapsed: Duration::ZERO,
        }
    }

    pub(crate) fn fail(mut self, error: PipelineError) -> Self {
        if !matches!(error, PipelineError::Validation(_)) {
            self.errors.push(error.to_string());
        }
        self.error = Some(error);
        self.status = ProcessingStatus::Error;
        self
    }

    pub(crate) fn finish(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        if self.error.is_none() {
            self.status = if self.warnings.is_empty() {
                ProcessingStatus::Success
            } else {
                ProcessingStatus::Warning
            };
        }
        self
    }

    /// Whether the file was uploaded. True for both `Success` and `Warning`.
    pub fn is_success(&self) -> bool {
        self.status != ProcessingStatus::Error
    }

    pub fn has_warnings(&self) -> bool {
        self.status == ProcessingStatus::Warning
    }

    pub fn final_stage(&self) -> ProcessingStage {
        if self.is_success() {
            ProcessingStage::Completed
        } else {
            ProcessingStage::Failed
        }
    }
}
