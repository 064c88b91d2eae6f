//! Test helpers: build pipelines over instrumented collaborators.
//!
//! Run from workspace root: `cargo test -p agentdesk-processing --test pipeline_test`.

#![allow(dead_code)]

pub mod fixtures;
pub mod storage;

use agentdesk_core::{PipelineOptions, UploadDestination};
use agentdesk_processing::{
    BatchProgress, ImageCodec, ImagePipeline, ProcessingContext, ProgressListener, StandardCodec,
};
use agentdesk_storage::{BlobStore, InMemoryRecordStore, RecordStore};
use std::sync::{Arc, Mutex};
use storage::InstrumentedBlobStore;

/// Pipeline plus handles on its collaborators.
pub struct TestPipeline {
    pub pipeline: Arc<ImagePipeline>,
    pub blobs: Arc<InstrumentedBlobStore>,
    pub records: InMemoryRecordStore,
}

pub fn build_pipeline(blobs: InstrumentedBlobStore) -> TestPipeline {
    build_pipeline_with(Arc::new(StandardCodec::new()), blobs)
}

pub fn build_pipeline_with(codec: Arc<dyn ImageCodec>, blobs: InstrumentedBlobStore) -> TestPipeline {
    let blobs = Arc::new(blobs);
    let records = InMemoryRecordStore::new();
    let pipeline = ImagePipeline::new(
        codec,
        blobs.clone() as Arc<dyn BlobStore>,
        Arc::new(records.clone()) as Arc<dyn RecordStore>,
    );
    TestPipeline {
        pipeline: Arc::new(pipeline),
        blobs,
        records,
    }
}

pub fn context() -> ProcessingContext {
    ProcessingContext::new(UploadDestination::default().with_listing("listing-7"))
}

/// Options with fast, single-attempt uploads.
pub fn fast_options() -> PipelineOptions {
    let mut options = PipelineOptions::default();
    options.batch.retry_attempts = 1;
    options.upload.retry_delay_ms = 1;
    options
}

/// Listener that records every snapshot it receives.
pub fn recording_listener() -> (ProgressListener, Arc<Mutex<Vec<BatchProgress>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let listener: ProgressListener = Arc::new(move |progress: &BatchProgress| {
        sink.lock().unwrap().push(progress.clone());
    });
    (listener, seen)
}
