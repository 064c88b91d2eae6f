use super::result::ProcessingStage;
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Snapshot of a running batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchProgress {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub in_progress: usize,
    pub current_file: Option<String>,
    pub current_stage: ProcessingStage,
    /// `(completed + failed) / total`
    pub fraction: f64,
    pub elapsed: Duration,
    /// Estimated time remaining, zero until the first file finishes.
    pub eta: Duration,
    /// Finished files per second.
    pub throughput: f64,
}

impl BatchProgress {
    pub fn compute(
        total: usize,
        completed: usize,
        failed: usize,
        in_progress: usize,
        current_file: Option<String>,
        current_stage: ProcessingStage,
        elapsed: Duration,
    ) -> Self {
        let processed = completed + failed;
        let fraction = if total == 0 {
            1.0
        } else {
            processed as f64 / total as f64
        };
        let eta = if processed == 0 {
            Duration::ZERO
        } else {
            let remaining = total.saturating_sub(processed) as f64;
            Duration::from_secs_f64(remaining * elapsed.as_secs_f64() / processed as f64)
        };
        let secs = elapsed.as_secs_f64();
        let throughput = if secs > 0.0 { processed as f64 / secs } else { 0.0 };

        Self {
            total,
            completed,
            failed,
            in_progress,
            current_file,
            current_stage,
            fraction,
            elapsed,
            eta,
            throughput,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.completed + self.failed >= self.total
    }
}

/// Callback invoked with every progress snapshot
pub type ProgressListener = Arc<dyn Fn(&BatchProgress) + Send + Sync>;

/// Listener forwarding snapshots into an unbounded channel. Sends to a closed
/// channel are ignored.
pub fn channel_listener(sender: mpsc::UnboundedSender<BatchProgress>) -> ProgressListener {
    Arc::new(move |progress: &BatchProgress| {
        let _ = sender.send(progress.clone());
    })
}

/// Batch counters and listener dispatch
pub(crate) struct ProgressTracker {
    total: usize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    in_progress: AtomicUsize,
    started: Instant,
    listeners: Vec<ProgressListener>,
}

impl ProgressTracker {
    pub(crate) fn new(total: usize, listeners: Vec<ProgressListener>) -> Self {
        Self {
            total,
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            in_progress: AtomicUsize::new(0),
            started: Instant::now(),
            listeners,
        }
    }

    pub(crate) fn file_started(&self, file: &str) {
        self.in_progress.fetch_add(1, Ordering::SeqCst);
        self.emit(Some(file), ProcessingStage::Validating);
    }

    pub(crate) fn stage_changed(&self, file: &str, stage: ProcessingStage) {
        self.emit(Some(file), stage);
    }

    pub(crate) fn file_finished(&self, file: &str, success: bool) {
        if success {
            self.completed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
        self.in_progress.fetch_sub(1, Ordering::SeqCst);
        let stage = if success {
            ProcessingStage::Completed
        } else {
            ProcessingStage::Failed
        };
        self.emit(Some(file), stage);
    }

    pub(crate) fn snapshot(
        &self,
        current_file: Option<&str>,
        stage: ProcessingStage,
    ) -> BatchProgress {
        BatchProgress::compute(
            self.total,
            self.completed.load(Ordering::SeqCst),
            self.failed.load(Ordering::SeqCst),
            self.in_progress.load(Ordering::SeqCst),
            current_file.map(str::to_string),
            stage,
            self.started.elapsed(),
        )
    }

    pub(crate) fn emit(&self, current_file: Option<&str>, stage: ProcessingStage) {
        if self.listeners.is_empty() {
            return;
        }
        let progress = self.snapshot(current_file, stage);
        for listener in &self.listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(&progress))).is_err() {
                tracing::warn!(
                    file = ?progress.current_file,
                    stage = %progress.current_stage,
                    "Progress listener panicked"
                );
            }
        }
    }
}
