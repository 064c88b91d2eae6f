//! Batch orchestration: per-file state machine, bounded concurrency, progress
//! reporting, abort and result memoization.

pub mod cache;
pub mod orchestrator;
pub mod progress;
pub mod result;

pub use cache::{CacheStats, ProcessingCache};
pub use orchestrator::{ImagePipeline, ProcessingContext};
pub use progress::{channel_listener, BatchProgress, ProgressListener};
pub use result::{ProcessingResult, ProcessingStage, ProcessingStatus};
