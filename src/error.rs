//! Error types for the `swimframe` crate.
//!
//! This module defines [`CaptureError`], the unified error type returned by
//! all fallible operations in the crate, and [`FailureKind`], the coarse
//! classification every error maps onto. Retry decisions, per-frame failure
//! markers and user-facing messages are all driven by the classification
//! rather than by matching individual variants.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    io::Error as IoError,
    time::Duration,
};

use image::ImageError;
use serde::Serialize;
use thiserror::Error;

/// Coarse classification of a failure.
///
/// Serializes (and displays) in kebab-case, e.g. `"black-frame"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// The platform decoder cannot handle this media (zero natural size,
    /// missing codec, unreadable container).
    UnsupportedFormat,
    /// Metadata loading, seeking or rendering exceeded the per-attempt
    /// deadline.
    Timeout,
    /// The rendered frame was uniformly near-black.
    BlackFrame,
    /// A generic, retryable decode failure.
    DecodeError,
    /// Every frame of a multi-frame sample failed.
    BatchExhausted,
    /// A request was rejected locally before any work was attempted.
    Validation,
    /// The analysis service answered with an error.
    Upstream,
}

impl FailureKind {
    /// Whether the frame extractor should spend another attempt after a
    /// failure of this kind.
    pub fn is_retryable(self) -> bool {
        !matches!(self, FailureKind::UnsupportedFormat | FailureKind::Validation)
    }

    /// The kebab-case name of this classification.
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::UnsupportedFormat => "unsupported-format",
            FailureKind::Timeout => "timeout",
            FailureKind::BlackFrame => "black-frame",
            FailureKind::DecodeError => "decode-error",
            FailureKind::BatchExhausted => "batch-exhausted",
            FailureKind::Validation => "validation",
            FailureKind::Upstream => "upstream",
        }
    }
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// The unified error type for all `swimframe` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CaptureError {
    /// The uploaded file is not a recognised video type.
    #[error("{name} is not a video file (type: {mime})")]
    InvalidMediaType {
        /// Display name of the rejected file.
        name: String,
        /// MIME type that was declared or detected, or `"unknown"`.
        mime: String,
    },

    /// The media cannot be decoded on this platform.
    #[error("Unsupported video format: {0}")]
    UnsupportedFormat(String),

    /// An attempt did not finish within its deadline.
    #[error("Frame extraction timed out after {0:?}")]
    Timeout(Duration),

    /// The rendered frame was degenerate (near-black).
    #[error("Black frame rendered at {timestamp:?}")]
    BlackFrame {
        /// Position the handle reported after seeking.
        timestamp: Duration,
    },

    /// A frame could not be decoded or rendered.
    #[error("Failed to decode video frame: {0}")]
    DecodeError(String),

    /// A frame was given up on after spending its attempt budget.
    ///
    /// Displays the last attempt's error unchanged.
    #[error("{message}")]
    FrameFailed {
        /// Classification of the last attempt's error.
        kind: FailureKind,
        /// The timestamp that was asked for.
        requested: Duration,
        /// Attempts spent before giving up.
        attempts: u32,
        /// Message of the last attempt's error.
        message: String,
    },

    /// Every frame in a multi-frame sample failed.
    #[error("All {attempted} frames failed to extract")]
    BatchExhausted {
        /// Number of timestamps that were attempted.
        attempted: usize,
    },

    /// A range's start lies after its end.
    #[error("Invalid range: start ({start:?}) must not be after end ({end:?})")]
    InvalidRange {
        /// Start of the rejected range.
        start: Duration,
        /// End of the rejected range.
        end: Duration,
    },

    /// A request was rejected locally.
    #[error("{0}")]
    Validation(String),

    /// The analysis service returned an error or a malformed answer.
    #[error("Analysis failed: {message}")]
    Upstream {
        /// HTTP status, when the failure came from a response.
        status: Option<u16>,
        /// Error text reported by the service.
        message: String,
        /// Optional human-readable hint from the service.
        details: Option<String>,
    },

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while staging media or writing output.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate during rendering or encoding.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// Transport-level failure talking to the analysis service.
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// A JSON payload could not be produced or parsed.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CaptureError {
    /// Map this error onto the failure taxonomy.
    pub fn kind(&self) -> FailureKind {
        match self {
            CaptureError::UnsupportedFormat(_) => FailureKind::UnsupportedFormat,
            CaptureError::Timeout(_) => FailureKind::Timeout,
            CaptureError::BlackFrame { .. } => FailureKind::BlackFrame,
            CaptureError::DecodeError(_)
            | CaptureError::FfmpegError(_)
            | CaptureError::IoError(_)
            | CaptureError::ImageError(_) => FailureKind::DecodeError,
            CaptureError::FrameFailed { kind, .. } => *kind,
            CaptureError::BatchExhausted { .. } => FailureKind::BatchExhausted,
            CaptureError::InvalidMediaType { .. }
            | CaptureError::InvalidRange { .. }
            | CaptureError::Validation(_) => FailureKind::Validation,
            CaptureError::Upstream { .. }
            | CaptureError::HttpError(_)
            | CaptureError::JsonError(_) => FailureKind::Upstream,
        }
    }

    /// Whether this error points at a container or codec problem the user
    /// can fix by re-encoding the video.
    pub fn indicates_format_problem(&self) -> bool {
        if self.kind() == FailureKind::UnsupportedFormat {
            return true;
        }
        let text = self.to_string().to_ascii_lowercase();
        text.contains("format") || text.contains("codec")
    }
}

#[cfg(feature = "ffmpeg")]
impl From<ffmpeg_next::Error> for CaptureError {
    fn from(error: ffmpeg_next::Error) -> Self {
        match error {
            ffmpeg_next::Error::DecoderNotFound
            | ffmpeg_next::Error::DemuxerNotFound
            | ffmpeg_next::Error::StreamNotFound => {
                CaptureError::UnsupportedFormat(error.to_string())
            }
            _ => CaptureError::FfmpegError(error.to_string()),
        }
    }
}
