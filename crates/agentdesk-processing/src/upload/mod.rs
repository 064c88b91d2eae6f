//! Upload stage: blob write, thumbnail fan-out, record insert, retry and cancellation.

pub mod retry;
pub mod uploader;

pub use retry::RetryPolicy;
pub use uploader::Uploader;
