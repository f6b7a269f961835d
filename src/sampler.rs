//! Multi-frame sampling.
//!
//! [`SampleSpec`] derives a set of timestamps from a duration;
//! [`FrameExtractor::sample_frames`] drives the extractor once per timestamp
//! and collects a [`FrameBatch`]. Individual failures stay in the batch as
//! error-tagged slots; only a batch in which every slot failed is an error.

use std::time::Duration;

use crate::error::CaptureError;
use crate::extractor::FrameExtractor;
use crate::frame::{CapturedFrame, FrameFailure, FrameResult};
use crate::handle::MediaBackend;
use crate::progress::{OperationType, ProgressTracker};
use crate::source::MediaSource;
use crate::utilities::interpolate;

/// Which timestamps to sample.
#[derive(Debug, Clone, Copy, PartialEq)]
#[must_use]
pub enum SampleSpec {
    /// `count` timestamps evenly spaced inside the media, excluding both
    /// ends: `duration / (count + 1) * i` for `i` in `1..=count`.
    Even { count: usize },
    /// `count` timestamps across `[start, end]`, including both ends when
    /// `count > 1`. A single timestamp lands on the midpoint.
    Range {
        start: Duration,
        end: Duration,
        count: usize,
    },
}

impl SampleSpec {
    /// Compute the timestamps for a media of length `duration`.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::Validation`] when `count` is zero.
    /// - [`CaptureError::InvalidRange`] when `start > end`.
    pub fn timestamps(&self, duration: Duration) -> Result<Vec<Duration>, CaptureError> {
        match *self {
            SampleSpec::Even { count } => {
                if count == 0 {
                    return Err(CaptureError::Validation(
                        "sample count must be greater than zero".to_string(),
                    ));
                }
                let step = duration.as_secs_f64() / (count + 1) as f64;
                Ok((1..=count)
                    .map(|index| Duration::from_secs_f64(step * index as f64))
                    .collect())
            }
            SampleSpec::Range { start, end, count } => {
                if count == 0 {
                    return Err(CaptureError::Validation(
                        "sample count must be greater than zero".to_string(),
                    ));
                }
                if start > end {
                    return Err(CaptureError::InvalidRange { start, end });
                }
                Ok(interpolate(start, end, count))
            }
        }
    }
}

/// Ordered per-timestamp outcomes of one sampling run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBatch {
    results: Vec<FrameResult>,
}

impl FrameBatch {
    pub fn new(results: Vec<FrameResult>) -> Self {
        Self { results }
    }

    /// All slots, in timestamp order.
    pub fn results(&self) -> &[FrameResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<FrameResult> {
        self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Captured frames, in order, skipping failed slots.
    pub fn frames(&self) -> impl Iterator<Item = &CapturedFrame> {
        self.results.iter().filter_map(FrameResult::frame)
    }

    pub fn failures(&self) -> impl Iterator<Item = &FrameFailure> {
        self.results.iter().filter_map(FrameResult::failure)
    }

    pub fn success_count(&self) -> usize {
        self.frames().count()
    }

    /// Owned captured frames, in order.
    pub fn into_frames(self) -> Vec<CapturedFrame> {
        self.results
            .into_iter()
            .filter_map(|result| match result {
                FrameResult::Captured(frame) => Some(frame),
                FrameResult::Failed(_) => None,
            })
            .collect()
    }
}

impl<B: MediaBackend> FrameExtractor<B> {
    /// Sample several frames from `source`.
    ///
    /// Timestamps are extracted one after another, each with its own budget
    /// of `max_attempts`.
    ///
    /// # Errors
    ///
    /// - Errors from [`SampleSpec::timestamps`].
    /// - [`CaptureError::BatchExhausted`] when no slot produced a frame.
    pub async fn sample_frames(
        &self,
        source: &MediaSource,
        duration: Duration,
        spec: SampleSpec,
        max_attempts: u32,
    ) -> Result<FrameBatch, CaptureError> {
        let timestamps = spec.timestamps(duration)?;
        log::debug!(
            "Sampling {} frames from {} ({:?})",
            timestamps.len(),
            source.name(),
            spec
        );

        let mut tracker = ProgressTracker::new(
            self.options().progress.clone(),
            OperationType::FrameSampling,
            timestamps.len() as u64,
        );

        let mut results = Vec::with_capacity(timestamps.len());
        for timestamp in timestamps {
            let result = self.extract_frame(source, timestamp, max_attempts).await;
            if let Some(failure) = result.failure() {
                log::warn!(
                    "Frame at {:?} failed after {} attempt(s): {}",
                    failure.requested,
                    failure.attempts,
                    failure.kind
                );
            }
            tracker.advance(timestamp, result.is_captured());
            results.push(result);
        }

        let batch = FrameBatch::new(results);
        if batch.success_count() == 0 {
            return Err(CaptureError::BatchExhausted {
                attempted: batch.len(),
            });
        }
        Ok(batch)
    }
}
