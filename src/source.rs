//! Uploaded media.
//!
//! A [`MediaSource`] is the immutable blob a user picked, plus its display
//! name and declared MIME type. It is cheap to clone (the bytes are shared)
//! and is never mutated; picking a new file replaces it wholesale.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::Path;
use std::sync::Arc;

use crate::error::CaptureError;
use crate::utilities::human_size;

/// File extensions accepted as video when no MIME type is declared.
const VIDEO_EXTENSIONS: [&str; 11] = [
    "mp4", "m4v", "mov", "webm", "mkv", "avi", "mpeg", "mpg", "ogv", "3gp", "wmv",
];

/// An uploaded video.
#[derive(Clone)]
pub struct MediaSource {
    name: String,
    mime: Option<String>,
    bytes: Arc<[u8]>,
}

impl Debug for MediaSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("MediaSource")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("size", &self.bytes.len())
            .finish()
    }
}

impl MediaSource {
    /// Wrap in-memory bytes.
    ///
    /// `mime` is the type declared by whoever handed the file over; pass
    /// `None` when it is unknown.
    pub fn new(name: impl Into<String>, mime: Option<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            mime: mime.filter(|value| !value.trim().is_empty()),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, detecting its MIME type from the content.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::IoError`] if the file cannot be read.
    pub async fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime = infer::get(&bytes).map(|kind| kind.mime_type().to_string());
        log::debug!("Read {} ({} bytes, mime {:?})", name, bytes.len(), mime);
        Ok(Self::new(name, mime, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime(&self) -> Option<&str> {
        self.mime.as_deref()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Size formatted for display, e.g. `"12.4 MB"`.
    pub fn human_size(&self) -> String {
        human_size(self.size())
    }

    /// Lower-cased file extension of the display name, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .map(|extension| extension.to_string_lossy().to_ascii_lowercase())
    }

    /// Check that this looks like a video before any decoding is attempted.
    ///
    /// A declared MIME type decides on its own: `video/*` is accepted,
    /// anything else is rejected. Without one, the extension is consulted,
    /// and failing that the leading bytes are sniffed.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::InvalidMediaType`] for non-video input.
    pub fn validate_media_type(&self) -> Result<(), CaptureError> {
        if let Some(mime) = &self.mime {
            if mime.to_ascii_lowercase().starts_with("video/") {
                return Ok(());
            }
            return Err(self.rejected(mime));
        }

        if let Some(extension) = self.extension() {
            if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
                return Ok(());
            }
        }

        match infer::get(&self.bytes) {
            Some(kind) if kind.matcher_type() == infer::MatcherType::Video => Ok(()),
            Some(kind) => Err(self.rejected(kind.mime_type())),
            None => Err(self.rejected("unknown")),
        }
    }

    fn rejected(&self, mime: &str) -> CaptureError {
        CaptureError::InvalidMediaType {
            name: self.name.clone(),
            mime: mime.to_string(),
        }
    }
}
