//! Captured frames and per-frame outcomes.
//!
//! [`FrameResult`] is what the extractor hands back for every requested
//! timestamp: a JPEG-encoded [`CapturedFrame`] or a [`FrameFailure`] marker
//! that keeps the slot's position in a batch.

use std::io::Cursor;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use image::{RgbaImage, codecs::jpeg::JpegEncoder};

use crate::configuration::BlackFrameOptions;
use crate::error::{CaptureError, FailureKind};

/// A successfully captured still.
#[derive(Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    /// Requested timestamp this frame answers.
    pub requested: Duration,
    /// Position the decoder reported after seeking.
    pub timestamp: Duration,
    pub width: u32,
    pub height: u32,
    /// JPEG bytes.
    pub jpeg: Vec<u8>,
}

impl std::fmt::Debug for CapturedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedFrame")
            .field("requested", &self.requested)
            .field("timestamp", &self.timestamp)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("jpeg_len", &self.jpeg.len())
            .finish()
    }
}

impl CapturedFrame {
    /// `data:image/jpeg;base64,...` form, as sent to the analysis service.
    pub fn to_data_uri(&self) -> String {
        format!("data:image/jpeg;base64,{}", BASE64.encode(&self.jpeg))
    }
}

/// A frame that could not be captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameFailure {
    /// The timestamp the caller asked for.
    pub requested: Duration,
    pub kind: FailureKind,
    /// Message of the last error seen.
    pub message: String,
    /// Attempts spent before giving up.
    pub attempts: u32,
}

/// Outcome for one requested timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameResult {
    Captured(CapturedFrame),
    Failed(FrameFailure),
}

impl FrameResult {
    pub fn is_captured(&self) -> bool {
        matches!(self, FrameResult::Captured(_))
    }

    pub fn frame(&self) -> Option<&CapturedFrame> {
        match self {
            FrameResult::Captured(frame) => Some(frame),
            FrameResult::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FrameFailure> {
        match self {
            FrameResult::Captured(_) => None,
            FrameResult::Failed(failure) => Some(failure),
        }
    }

    /// The timestamp that was asked for, whatever the outcome.
    pub fn requested(&self) -> Duration {
        match self {
            FrameResult::Captured(frame) => frame.requested,
            FrameResult::Failed(failure) => failure.requested,
        }
    }

    /// Convert into a `Result`, turning a failure marker back into an error.
    pub fn into_result(self) -> Result<CapturedFrame, CaptureError> {
        match self {
            FrameResult::Captured(frame) => Ok(frame),
            FrameResult::Failed(failure) => Err(failure.into_error()),
        }
    }
}

impl FrameFailure {
    /// Turn this marker into an error with the same classification and the
    /// last attempt's message.
    pub fn into_error(self) -> CaptureError {
        CaptureError::FrameFailed {
            kind: self.kind,
            requested: self.requested,
            attempts: self.attempts,
            message: self.message,
        }
    }
}

/// Whether a rendered frame is degenerate.
///
/// Samples the top-left block and reports `true` when effectively every
/// colour channel (alpha excluded) is below the threshold.
pub fn is_black_frame(image: &RgbaImage, options: &BlackFrameOptions) -> bool {
    let block_width = options.block_size.min(image.width());
    let block_height = options.block_size.min(image.height());
    let total = (block_width * block_height * 3) as usize;
    if total == 0 {
        return true;
    }

    let mut dark = 0_usize;
    for y in 0..block_height {
        for x in 0..block_width {
            let pixel = image.get_pixel(x, y);
            dark += pixel.0[..3]
                .iter()
                .filter(|&&channel| channel < options.threshold)
                .count();
        }
    }

    dark as f32 >= total as f32 * options.dark_ratio
}

/// Encode an RGBA frame as JPEG at `quality` (1 – 100).
///
/// JPEG has no alpha channel, so the frame is flattened to RGB first.
///
/// # Errors
///
/// Returns [`CaptureError::ImageError`] if encoding fails.
pub fn encode_jpeg(image: &RgbaImage, quality: u8) -> Result<Vec<u8>, CaptureError> {
    let rgb = image::DynamicImage::ImageRgba8(image.clone()).into_rgb8();
    let mut cursor = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut cursor, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)?;
    Ok(cursor.into_inner())
}
