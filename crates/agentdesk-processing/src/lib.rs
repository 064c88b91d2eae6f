//! AgentDesk Processing Library
//!
//! The listing image ingestion pipeline: validation, optimization, upload with
//! retry and cancellation, and the batch orchestrator that ties them together.
//!
//! Each stage is an explicitly constructed service so callers (and tests) can
//! swap the codec or the storage collaborators:
//!
//! ```text
//! ImageValidator -> ImageOptimizer -> Uploader -> ImagePipeline
//! ```

pub mod codec;
pub mod compression;
pub mod image;
pub mod metadata;
pub mod optimizer;
pub mod pipeline;
pub mod upload;
pub mod validator;

pub use codec::{CodecError, ImageCodec, ImageInfo, RasterBuffer, StandardCodec};
pub use metadata::{ImageMetadata, Layout};
pub use optimizer::{ImageOptimizer, OptimizationError, OptimizationResult};
pub use pipeline::{
    channel_listener, BatchProgress, CacheStats, ImagePipeline, ProcessingCache,
    ProcessingContext, ProcessingResult, ProcessingStage, ProcessingStatus, ProgressListener,
};
pub use upload::{RetryPolicy, Uploader};
pub use validator::{ImageValidator, ValidationResult};
