//! Capture configuration.
//!
//! [`ExtractOptions`] tunes a single frame extraction (deadlines, retry
//! pacing, encoding quality, black-frame detection). [`PreviewOptions`] and
//! [`SessionOptions`] tune the interactive layers built on top of it.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use swimframe::{ExtractOptions, SessionOptions};
//!
//! let extract = ExtractOptions::new()
//!     .with_attempt_timeout(Duration::from_secs(3))
//!     .with_jpeg_quality(90);
//! let session = SessionOptions::new().with_final_attempts(4).with_range_frames(6);
//! assert_eq!(extract.jpeg_quality(), 90);
//! assert_eq!(session.range_frames, 6);
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::Duration;

use crate::advice::FallbackAdvice;
use crate::progress::{NoOpProgress, ProgressCallback};

/// Parameters of the degenerate-frame check.
///
/// A fixed `block_size × block_size` block in the top-left corner is sampled.
/// The frame counts as black when at least `dark_ratio` of the sampled colour
/// channels (alpha excluded) fall below `threshold`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlackFrameOptions {
    /// Edge length of the sampled block, in pixels.
    pub block_size: u32,
    /// Channel intensity below which a sample counts as dark.
    pub threshold: u8,
    /// Fraction of dark samples (0.0 – 1.0) that marks the frame as black.
    pub dark_ratio: f32,
}

impl Default for BlackFrameOptions {
    fn default() -> Self {
        Self {
            block_size: 10,
            threshold: 10,
            dark_ratio: 0.98,
        }
    }
}

/// Configuration for frame extraction.
///
/// All fields have working defaults; a default-constructed value matches the
/// behaviour described on [`FrameExtractor`](crate::FrameExtractor).
#[derive(Clone)]
pub struct ExtractOptions {
    /// Hard deadline for one attempt (metadata, seek, settle, render).
    pub(crate) attempt_timeout: Duration,
    /// Pause between two attempts.
    pub(crate) retry_delay: Duration,
    /// Pause between seek completion and rendering.
    pub(crate) settle_delay: Duration,
    /// Distance kept from both ends of the media when seeking.
    pub(crate) seek_margin: Duration,
    /// JPEG quality, 1 – 100.
    pub(crate) jpeg_quality: u8,
    pub(crate) black_frame: BlackFrameOptions,
    /// Per-frame progress during multi-frame sampling.
    pub(crate) progress: Arc<dyn ProgressCallback>,
}

impl Debug for ExtractOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ExtractOptions")
            .field("attempt_timeout", &self.attempt_timeout)
            .field("retry_delay", &self.retry_delay)
            .field("settle_delay", &self.settle_delay)
            .field("seek_margin", &self.seek_margin)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("black_frame", &self.black_frame)
            .finish_non_exhaustive()
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractOptions {
    /// Create options with the default settings.
    ///
    /// Defaults: 5 s per attempt, 500 ms between attempts, 100 ms settle
    /// delay, 0.1 s seek margin, JPEG quality 85.
    pub fn new() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(5),
            retry_delay: Duration::from_millis(500),
            settle_delay: Duration::from_millis(100),
            seek_margin: Duration::from_millis(100),
            jpeg_quality: 85,
            black_frame: BlackFrameOptions::default(),
            progress: Arc::new(NoOpProgress),
        }
    }

    /// Set the per-attempt deadline.
    #[must_use]
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Set the pause between attempts.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the pause between seek completion and rendering.
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Set the distance kept from both ends of the media when seeking.
    #[must_use]
    pub fn with_seek_margin(mut self, margin: Duration) -> Self {
        self.seek_margin = margin;
        self
    }

    /// Set the JPEG quality. Clamped to `1..=100`.
    #[must_use]
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Replace the black-frame detection parameters.
    #[must_use]
    pub fn with_black_frame(mut self, options: BlackFrameOptions) -> Self {
        self.black_frame = options;
        self
    }

    /// Attach a progress callback for multi-frame sampling.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn seek_margin(&self) -> Duration {
        self.seek_margin
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    pub fn black_frame(&self) -> &BlackFrameOptions {
        &self.black_frame
    }
}

/// Settings for the debounced preview coordinator.
#[derive(Debug, Clone)]
#[must_use]
pub struct PreviewOptions {
    /// Quiet period after a single-instant selection change.
    pub instant_debounce: Duration,
    /// Quiet period after a range selection change.
    pub range_debounce: Duration,
    /// Attempts per preview frame.
    pub attempts: u32,
    /// Frames rendered for a range preview.
    pub range_frames: usize,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            instant_debounce: Duration::from_millis(300),
            range_debounce: Duration::from_millis(500),
            attempts: 2,
            range_frames: 3,
        }
    }
}

impl PreviewOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debounce(mut self, instant: Duration, range: Duration) -> Self {
        self.instant_debounce = instant;
        self.range_debounce = range;
        self
    }

    /// Set the attempts per preview frame. Clamped to a minimum of 1.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// Set the number of frames in a range preview. Clamped to a minimum of 1.
    pub fn with_range_frames(mut self, frames: usize) -> Self {
        self.range_frames = frames.max(1);
        self
    }
}

/// Settings for a capture session.
#[derive(Debug, Clone)]
#[must_use]
pub struct SessionOptions {
    /// Attempts per frame for the final capture before submission.
    pub final_attempts: u32,
    /// Frames captured across the range on submission.
    pub range_frames: usize,
    /// Default range window as fractions of the duration.
    pub range_inset: (f64, f64),
    /// Minimum distance between the default range end and the media end.
    pub range_end_margin: Duration,
    pub preview: PreviewOptions,
    /// Substitute advice when the analysis returns too little.
    pub fallback_advice: Option<FallbackAdvice>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            final_attempts: 3,
            range_frames: 5,
            range_inset: (0.3, 0.7),
            range_end_margin: Duration::from_millis(500),
            preview: PreviewOptions::default(),
            fallback_advice: None,
        }
    }
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the attempts per final frame. Clamped to a minimum of 1.
    pub fn with_final_attempts(mut self, attempts: u32) -> Self {
        self.final_attempts = attempts.max(1);
        self
    }

    /// Set the frames captured for range submissions. Clamped to a minimum of 1.
    pub fn with_range_frames(mut self, frames: usize) -> Self {
        self.range_frames = frames.max(1);
        self
    }

    pub fn with_preview(mut self, preview: PreviewOptions) -> Self {
        self.preview = preview;
        self
    }

    pub fn with_fallback_advice(mut self, fallback: FallbackAdvice) -> Self {
        self.fallback_advice = Some(fallback);
        self
    }
}
