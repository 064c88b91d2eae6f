//! AgentDesk Core Library
//!
//! This crate provides the domain models, option schema, error taxonomy and
//! configuration shared by the listing image ingestion pipeline.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod options;
pub mod storage_types;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use error::{ErrorMetadata, LogLevel, PipelineError, ValidationError, ValidationWarning};
pub use models::{
    ImageType, OutputFormat, RecordUpdate, SourceFile, ThumbnailRecord, UploadDestination,
    UploadRecord,
};
pub use options::{
    AspectRatioRange, BatchOptions, Dimensions, OptimizationOptions, PipelineOptions,
    ThumbnailSpec, UploadOptions, ValidationOptions,
};
pub use storage_types::StorageBackend;
