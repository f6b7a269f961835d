//! Decoder seams.
//!
//! A [`MediaBackend`] turns a [`MediaSource`] into a live [`MediaHandle`]: a
//! disposable decoder used for exactly one extraction attempt. Handles are
//! never reused across attempts; a failed seek can leave decoder state that
//! would poison the next attempt.
//!
//! Backends that need the bytes on a path stage them through a
//! [`TemporaryUri`], which is released when the handle drops and, failing
//! that, by a fallback timer.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::RgbaImage;
use tempfile::{Builder as TempFileBuilder, TempPath};

use crate::error::CaptureError;
use crate::source::MediaSource;

/// What a handle knows once its metadata has loaded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandleMetadata {
    /// Media duration.
    pub duration: Duration,
    /// Width of decoded frames; `0` when the format cannot be decoded.
    pub natural_width: u32,
    /// Height of decoded frames; `0` when the format cannot be decoded.
    pub natural_height: u32,
}

impl HandleMetadata {
    /// Whether frames can be rendered at all.
    ///
    /// Zero natural dimensions after metadata load are the primary signal of
    /// an unsupported format.
    pub fn is_decodable(&self) -> bool {
        self.natural_width > 0 && self.natural_height > 0 && !self.duration.is_zero()
    }
}

/// Produces fresh decoders bound to a source.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Create a new handle for `source`. Nothing is decoded yet.
    async fn open(&self, source: &MediaSource) -> Result<Box<dyn MediaHandle>, CaptureError>;
}

/// A live decoder, used for one extraction attempt.
///
/// Callers must invoke [`load_metadata`](MediaHandle::load_metadata) first;
/// seeking or rendering before that is an error.
#[async_trait]
pub trait MediaHandle: Send {
    /// Wait until duration and natural dimensions are known.
    async fn load_metadata(&mut self) -> Result<HandleMetadata, CaptureError>;

    /// Seek to `position` and wait for the seek to complete.
    ///
    /// Returns the position the decoder actually landed on.
    async fn seek(&mut self, position: Duration) -> Result<Duration, CaptureError>;

    /// Render the current frame at natural size.
    async fn render(&mut self) -> Result<RgbaImage, CaptureError>;
}

#[async_trait]
impl<T: MediaBackend + ?Sized> MediaBackend for Arc<T> {
    async fn open(&self, source: &MediaSource) -> Result<Box<dyn MediaHandle>, CaptureError> {
        (**self).open(source).await
    }
}

/// A scratch file holding a source's bytes, addressable by path.
///
/// Owned by exactly one handle. The file is deleted by
/// [`release`](TemporaryUri::release), on drop, or by the fallback timer,
/// whichever comes first. Release is idempotent.
pub struct TemporaryUri {
    path: PathBuf,
    slot: Arc<Mutex<Option<TempPath>>>,
}

impl Debug for TemporaryUri {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("TemporaryUri")
            .field("path", &self.path)
            .field("released", &self.is_released())
            .finish()
    }
}

impl TemporaryUri {
    /// Stage `source` into a new scratch file.
    ///
    /// When called inside a Tokio runtime, a fallback timer deletes the file
    /// after `fallback` even if the owner never releases it.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::IoError`] if the file cannot be written.
    pub fn create(source: &MediaSource, fallback: Duration) -> Result<Self, CaptureError> {
        let suffix = source
            .extension()
            .map(|extension| format!(".{extension}"))
            .unwrap_or_default();
        let mut file = TempFileBuilder::new()
            .prefix("swimframe-")
            .suffix(&suffix)
            .tempfile()?;
        file.write_all(source.bytes())?;
        file.flush()?;

        let temp_path = file.into_temp_path();
        let path = temp_path.to_path_buf();
        let slot = Arc::new(Mutex::new(Some(temp_path)));
        log::debug!("Staged {} at {}", source.name(), path.display());

        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let timer_slot = Arc::downgrade(&slot);
            runtime.spawn(async move {
                tokio::time::sleep(fallback).await;
                if let Some(slot) = timer_slot.upgrade() {
                    if release_slot(&slot) {
                        log::warn!("Released abandoned temporary media after {fallback:?}");
                    }
                }
            });
        }

        Ok(Self { path, slot })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_released(&self) -> bool {
        self.slot.lock().map(|guard| guard.is_none()).unwrap_or(true)
    }

    /// Delete the scratch file now.
    pub fn release(&self) {
        if release_slot(&self.slot) {
            log::debug!("Released {}", self.path.display());
        }
    }
}

impl Drop for TemporaryUri {
    fn drop(&mut self) {
        self.release();
    }
}

/// Take the path out of the slot and delete it. Returns `true` if this call
/// did the deletion.
fn release_slot(slot: &Mutex<Option<TempPath>>) -> bool {
    let taken = match slot.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    };
    match taken {
        Some(temp_path) => {
            if let Err(error) = temp_path.close() {
                log::warn!("Failed to delete temporary media: {error}");
            }
            true
        }
        None => false,
    }
}
