//! Progress reporting and cancellation support.
//!
//! Sampling several frames can take seconds per frame when retries kick in.
//! [`ProgressCallback`] lets front ends observe that work; it never
//! influences it. [`CancellationToken`] tells decode work that nobody is
//! waiting for its result any more.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use swimframe::{ExtractOptions, ProgressCallback, ProgressInfo};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("[{:?}] {}/{}", info.operation, info.current, info.total);
//!     }
//! }
//!
//! let options = ExtractOptions::new().with_progress(Arc::new(PrintProgress));
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

/// The kind of work being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// Sampling frames for a preview or a final capture.
    FrameSampling,
}

/// A snapshot of sampling progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    pub operation: OperationType,
    /// Frames finished so far, successful or not.
    pub current: u64,
    /// Frames in the batch.
    pub total: u64,
    /// Frames that produced an image so far.
    pub succeeded: u64,
    /// Wall-clock time since the batch started.
    pub elapsed: Duration,
    /// Requested timestamp of the frame that just finished.
    pub current_timestamp: Option<Duration>,
}

impl ProgressInfo {
    /// Completion percentage (0.0 – 100.0).
    pub fn percentage(&self) -> f32 {
        if self.total == 0 {
            return 100.0;
        }
        (self.current as f32 / self.total as f32) * 100.0
    }
}

/// Trait for receiving progress updates.
///
/// Implementations must be [`Send`] and [`Sync`]; sampling may run on a
/// spawned task.
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards all notifications. The default.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Tracks timing for one batch and emits callbacks.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    operation: OperationType,
    total: u64,
    current: u64,
    succeeded: u64,
    start_time: Instant,
}

impl ProgressTracker {
    pub(crate) fn new(callback: Arc<dyn ProgressCallback>, operation: OperationType, total: u64) -> Self {
        Self {
            callback,
            operation,
            total,
            current: 0,
            succeeded: 0,
            start_time: Instant::now(),
        }
    }

    /// Record one finished frame and report.
    pub(crate) fn advance(&mut self, timestamp: Duration, succeeded: bool) {
        self.current += 1;
        if succeeded {
            self.succeeded += 1;
        }
        self.callback.on_progress(&ProgressInfo {
            operation: self.operation,
            current: self.current,
            total: self.total,
            succeeded: self.succeeded,
            elapsed: self.start_time.elapsed(),
            current_timestamp: Some(timestamp),
        });
    }
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clones share one flag. Decode loops check
/// [`is_cancelled`](CancellationToken::is_cancelled) between packets.
///
/// # Example
///
/// ```
/// use swimframe::CancellationToken;
///
/// let token = CancellationToken::new();
/// let worker = token.clone();
/// assert!(!worker.is_cancelled());
///
/// token.cancel();
/// assert!(worker.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
