//! Single-frame extraction with retries.
//!
//! [`FrameExtractor`] turns a [`MediaSource`] and a timestamp into a
//! [`FrameResult`]. Each attempt is one awaitable task raced against a
//! deadline:
//!
//! 1. open a fresh [`MediaHandle`](crate::MediaHandle),
//! 2. wait for metadata (zero natural size means unsupported format),
//! 3. seek to the clamped timestamp and wait for completion,
//! 4. let the decoder settle, then render at natural size,
//! 5. reject degenerate (black) frames, then JPEG-encode.
//!
//! Attempts run strictly one after another. A timed-out attempt is dropped,
//! which drops its handle and releases its temporary URI, before the next
//! one starts.

use std::time::Duration;

use crate::configuration::ExtractOptions;
use crate::error::CaptureError;
use crate::frame::{CapturedFrame, FrameFailure, FrameResult, encode_jpeg, is_black_frame};
use crate::handle::{HandleMetadata, MediaBackend};
use crate::source::MediaSource;
use crate::utilities::clamp_seek_target;

/// Extracts still frames through a [`MediaBackend`].
///
/// # Example
///
/// ```no_run
/// # #[cfg(feature = "ffmpeg")]
/// # async fn example() -> Result<(), swimframe::CaptureError> {
/// use std::time::Duration;
///
/// use swimframe::{ExtractOptions, FfmpegBackend, FrameExtractor, MediaSource};
///
/// let source = MediaSource::from_path("lap.mp4").await?;
/// let extractor = FrameExtractor::new(FfmpegBackend::new(), ExtractOptions::new());
/// let frame = extractor
///     .extract_frame(&source, Duration::from_secs(4), 3)
///     .await
///     .into_result()?;
/// std::fs::write("lap.jpg", &frame.jpeg)?;
/// # Ok(())
/// # }
/// ```
pub struct FrameExtractor<B> {
    backend: B,
    options: ExtractOptions,
}

impl<B: MediaBackend> FrameExtractor<B> {
    pub fn new(backend: B, options: ExtractOptions) -> Self {
        Self { backend, options }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Load metadata for `source` through a throwaway handle.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::UnsupportedFormat`] when the decoder reports zero
    ///   natural dimensions or no duration.
    /// - [`CaptureError::Timeout`] when metadata does not load in time.
    pub async fn probe(&self, source: &MediaSource) -> Result<HandleMetadata, CaptureError> {
        let deadline = self.options.attempt_timeout;
        let load = async {
            let mut handle = self.backend.open(source).await?;
            let metadata = handle.load_metadata().await?;
            ensure_decodable(&metadata)?;
            Ok(metadata)
        };
        tokio::time::timeout(deadline, load)
            .await
            .map_err(|_| CaptureError::Timeout(deadline))?
    }

    /// Extract one frame at `timestamp`, spending up to `max_attempts`.
    ///
    /// Decode errors, timeouts and black frames are retried after the
    /// configured delay with a fresh handle. Unsupported formats are not
    /// retried. `max_attempts` is clamped to a minimum of 1.
    ///
    /// This never returns an error: exhausted attempts produce
    /// [`FrameResult::Failed`] carrying the last classification.
    pub async fn extract_frame(
        &self,
        source: &MediaSource,
        timestamp: Duration,
        max_attempts: u32,
    ) -> FrameResult {
        let max_attempts = max_attempts.max(1);
        let mut last_error = CaptureError::DecodeError("no attempt was made".to_string());
        let mut attempts = 0;

        while attempts < max_attempts {
            attempts += 1;
            log::debug!(
                "Extracting {} at {:?} (attempt {}/{})",
                source.name(),
                timestamp,
                attempts,
                max_attempts
            );

            let deadline = self.options.attempt_timeout;
            let outcome = tokio::time::timeout(deadline, self.attempt(source, timestamp))
                .await
                .unwrap_or(Err(CaptureError::Timeout(deadline)));

            match outcome {
                Ok(frame) => return FrameResult::Captured(frame),
                Err(error) => {
                    let kind = error.kind();
                    log::warn!(
                        "Attempt {attempts}/{max_attempts} at {timestamp:?} failed ({kind}): {error}"
                    );
                    last_error = error;
                    if !kind.is_retryable() {
                        break;
                    }
                }
            }

            if attempts < max_attempts {
                tokio::time::sleep(self.options.retry_delay).await;
            }
        }

        FrameResult::Failed(FrameFailure {
            requested: timestamp,
            kind: last_error.kind(),
            message: last_error.to_string(),
            attempts,
        })
    }

    /// One attempt. The handle lives only for the duration of this call.
    async fn attempt(
        &self,
        source: &MediaSource,
        timestamp: Duration,
    ) -> Result<CapturedFrame, CaptureError> {
        let mut handle = self.backend.open(source).await?;
        let metadata = handle.load_metadata().await?;
        ensure_decodable(&metadata)?;

        let target = clamp_seek_target(timestamp, metadata.duration, self.options.seek_margin);
        let position = handle.seek(target).await?;

        if !self.options.settle_delay.is_zero() {
            tokio::time::sleep(self.options.settle_delay).await;
        }

        let image = handle.render().await?;
        drop(handle);

        if is_black_frame(&image, &self.options.black_frame) {
            return Err(CaptureError::BlackFrame {
                timestamp: position,
            });
        }

        let jpeg = encode_jpeg(&image, self.options.jpeg_quality)?;
        Ok(CapturedFrame {
            requested: timestamp,
            timestamp: position,
            width: image.width(),
            height: image.height(),
            jpeg,
        })
    }
}

fn ensure_decodable(metadata: &HandleMetadata) -> Result<(), CaptureError> {
    if metadata.is_decodable() {
        return Ok(());
    }
    Err(CaptureError::UnsupportedFormat(format!(
        "decoder reported {}x{} frames over {:?}",
        metadata.natural_width, metadata.natural_height, metadata.duration
    )))
}
