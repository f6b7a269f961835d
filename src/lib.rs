//! # swimframe
//!
//! Capture still frames from swimming videos and turn them into coaching
//! advice.
//!
//! `swimframe` takes an uploaded video, lets the user pick a moment (or a
//! time range), renders preview stills while the selection moves, and on
//! submit captures the final frames and hands them to an analysis service.
//! Decoding is powered by FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//!
//! ## Quick Start
//!
//! ### Extract a Frame
//!
//! ```no_run
//! # #[cfg(feature = "ffmpeg")]
//! # async fn example() -> Result<(), swimframe::CaptureError> {
//! use std::time::Duration;
//!
//! use swimframe::{ExtractOptions, FfmpegBackend, FrameExtractor, MediaSource};
//!
//! let source = MediaSource::from_path("lap.mp4").await?;
//! let extractor = FrameExtractor::new(FfmpegBackend::new(), ExtractOptions::new());
//! let frame = extractor
//!     .extract_frame(&source, Duration::from_secs(4), 3)
//!     .await
//!     .into_result()?;
//! println!("{}x{} at {:?}", frame.width, frame.height, frame.timestamp);
//! # Ok(())
//! # }
//! ```
//!
//! ### Sample a Range
//!
//! ```no_run
//! # #[cfg(feature = "ffmpeg")]
//! # async fn example() -> Result<(), swimframe::CaptureError> {
//! use std::time::Duration;
//!
//! use swimframe::{ExtractOptions, FfmpegBackend, FrameExtractor, MediaSource, SampleSpec};
//!
//! let source = MediaSource::from_path("lap.mp4").await?;
//! let extractor = FrameExtractor::new(FfmpegBackend::new(), ExtractOptions::new());
//! let duration = extractor.probe(&source).await?.duration;
//! let spec = SampleSpec::Range {
//!     start: Duration::from_secs(2),
//!     end: Duration::from_secs(10),
//!     count: 5,
//! };
//! let batch = extractor.sample_frames(&source, duration, spec, 3).await?;
//! println!("{} of {} frames captured", batch.success_count(), batch.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Resilient extraction**: per-attempt deadlines, retries with a fresh
//!   decoder, black-frame rejection
//! - **Multi-frame sampling**: even spacing or a range, with per-slot
//!   failure markers
//! - **Debounced previews**: generation-tagged, never overlapping
//! - **Capture sessions**: single-instant and range modes, final capture and
//!   analysis handoff
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ffmpeg` (default) | `FfmpegBackend` and FFmpeg log-level control |
//!
//! Without `ffmpeg`, bring your own [`MediaBackend`].

pub mod advice;
pub mod analysis;
pub mod configuration;
pub mod error;
pub mod extractor;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod frame;
pub mod handle;
pub mod preview;
pub mod progress;
pub mod sampler;
pub mod session;
pub mod source;
mod utilities;

pub use advice::{FORMAT_GUIDE, FallbackAdvice, format_numbered};
pub use analysis::{Analysis, AnalysisPayload, Analyzer, CaptureRequest, HttpAnalyzer};
pub use configuration::{BlackFrameOptions, ExtractOptions, PreviewOptions, SessionOptions};
pub use error::{CaptureError, FailureKind};
pub use extractor::FrameExtractor;
#[cfg(feature = "ffmpeg")]
pub use ffmpeg::{FfmpegBackend, FfmpegLogLevel, set_ffmpeg_log_level};
pub use frame::{CapturedFrame, FrameFailure, FrameResult, encode_jpeg, is_black_frame};
pub use handle::{HandleMetadata, MediaBackend, MediaHandle, TemporaryUri};
pub use preview::{
    PreviewCoordinator, PreviewEvent, PreviewPause, PreviewPhase, PreviewState, Selection,
};
pub use progress::{CancellationToken, OperationType, ProgressCallback, ProgressInfo};
pub use sampler::{FrameBatch, SampleSpec};
pub use session::{
    CaptureMode, CaptureSession, MediaInfo, SessionError, SessionEvent, SessionPhase,
    SessionState,
};
pub use source::MediaSource;
pub use utilities::{clamp_seek_target, human_size, interpolate};
