//! FFmpeg-backed decoding.
//!
//! [`FfmpegBackend`] stages each source into a [`TemporaryUri`] and opens it
//! with `ffmpeg-next`. All demuxing, decoding and scaling runs on Tokio's
//! blocking pool; the handle moves its decoder state into the blocking task
//! and takes it back afterwards.
//!
//! A blocking task cannot be stopped from outside, so a timed-out attempt
//! leaves its task running. Dropping the handle raises a cancel flag that the
//! packet loop checks, and every blocking task holds the backend's decode
//! gate until it returns. The next attempt therefore starts decoding only
//! once the abandoned one has wound down.
//!
//! FFmpeg also prints its own diagnostics to stderr. Those are tuned with
//! [`set_ffmpeg_log_level`]; they are separate from the `log` records this
//! crate emits.
//!
//! ```no_run
//! use swimframe::FfmpegLogLevel;
//!
//! swimframe::set_ffmpeg_log_level(FfmpegLogLevel::Error);
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ffmpeg_next::{
    Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
    util::log::Level,
};
use image::RgbaImage;
use tokio::sync::Mutex;
use tokio::task::JoinError;

use crate::error::CaptureError;
use crate::handle::{HandleMetadata, MediaBackend, MediaHandle, TemporaryUri};
use crate::progress::CancellationToken;
use crate::source::MediaSource;
use crate::utilities::frame_to_rgba_buffer;

/// [`MediaBackend`] built on the FFmpeg libraries.
#[derive(Debug, Clone)]
#[must_use]
pub struct FfmpegBackend {
    release_fallback: Duration,
    decode_gate: Arc<Mutex<()>>,
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegBackend {
    /// Create a backend. Staged files are force-released after 30 s.
    ///
    /// Handles from one backend (and its clones) decode one at a time.
    pub fn new() -> Self {
        Self {
            release_fallback: Duration::from_secs(30),
            decode_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Bound how long a staged file may outlive an abandoned attempt.
    pub fn with_release_fallback(mut self, fallback: Duration) -> Self {
        self.release_fallback = fallback;
        self
    }

    pub fn release_fallback(&self) -> Duration {
        self.release_fallback
    }

    fn handle(&self, uri: TemporaryUri) -> FfmpegHandle {
        FfmpegHandle {
            uri,
            state: None,
            decode_gate: self.decode_gate.clone(),
            cancel: CancellationToken::new(),
            in_flight: false,
        }
    }
}

#[async_trait]
impl MediaBackend for FfmpegBackend {
    async fn open(&self, source: &MediaSource) -> Result<Box<dyn MediaHandle>, CaptureError> {
        let source = source.clone();
        let fallback = self.release_fallback;
        let uri = tokio::task::spawn_blocking(move || TemporaryUri::create(&source, fallback))
            .await
            .map_err(join_error)??;
        Ok(Box::new(self.handle(uri)))
    }
}

/// One decoder bound to one staged file.
struct FfmpegHandle {
    uri: TemporaryUri,
    state: Option<DecoderState>,
    decode_gate: Arc<Mutex<()>>,
    cancel: CancellationToken,
    in_flight: bool,
}

impl FfmpegHandle {
    fn take_state(&mut self) -> Result<DecoderState, CaptureError> {
        self.state.take().ok_or_else(|| {
            CaptureError::DecodeError("metadata must be loaded before decoding".to_string())
        })
    }

    /// Run `work` on the blocking pool while holding the decode gate.
    ///
    /// The gate is released when `work` returns, not when this future is
    /// dropped.
    async fn run_blocking<T, F>(&mut self, work: F) -> Result<T, CaptureError>
    where
        F: FnOnce(&CancellationToken) -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self.decode_gate.clone().lock_owned().await;
        let cancel = self.cancel.clone();
        self.in_flight = true;
        let output = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            work(&cancel)
        })
        .await
        .map_err(join_error);
        self.in_flight = false;
        output
    }
}

#[async_trait]
impl MediaHandle for FfmpegHandle {
    async fn load_metadata(&mut self) -> Result<HandleMetadata, CaptureError> {
        if let Some(state) = &self.state {
            return Ok(state.metadata);
        }
        let path = self.uri.path().to_path_buf();
        let state = self.run_blocking(move |_| DecoderState::open(&path)).await??;
        let metadata = state.metadata;
        self.state = Some(state);
        Ok(metadata)
    }

    async fn seek(&mut self, position: Duration) -> Result<Duration, CaptureError> {
        let mut state = self.take_state()?;
        let (state, landed) = self
            .run_blocking(move |cancel| {
                let landed = state.seek(position, cancel);
                (state, landed)
            })
            .await?;
        self.state = Some(state);
        landed
    }

    async fn render(&mut self) -> Result<RgbaImage, CaptureError> {
        let state = self.take_state()?;
        let (state, image) = self
            .run_blocking(move |_| {
                let image = state.render();
                (state, image)
            })
            .await?;
        self.state = Some(state);
        image
    }
}

impl Drop for FfmpegHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if self.in_flight {
            log::debug!(
                "Abandoning in-flight decode of {}; the next decode waits for it",
                self.uri.path().display()
            );
        }
        self.state = None;
        self.uri.release();
    }
}

struct DecoderState {
    input: Input,
    stream_index: usize,
    time_base: Rational,
    decoder: VideoDecoder,
    current: Option<VideoFrame>,
    metadata: HandleMetadata,
}

impl DecoderState {
    fn open(path: &Path) -> Result<Self, CaptureError> {
        ffmpeg_next::init()?;

        let input = ffmpeg_next::format::input(&path).map_err(|error| match error {
            ffmpeg_next::Error::InvalidData => {
                CaptureError::UnsupportedFormat(format!("unreadable container: {error}"))
            }
            other => CaptureError::from(other),
        })?;

        let stream = input
            .streams()
            .best(Type::Video)
            .ok_or_else(|| CaptureError::UnsupportedFormat("no video stream".to_string()))?;
        let stream_index = stream.index();
        let time_base = stream.time_base();
        let stream_duration = stream.duration();

        let decoder_context = CodecContext::from_parameters(stream.parameters())?;
        let decoder = decoder_context.decoder().video()?;

        // Container duration is in AV_TIME_BASE (microseconds).
        let container_duration = input.duration();
        let duration = if container_duration > 0 {
            Duration::from_micros(container_duration as u64)
        } else if stream_duration > 0 {
            seconds_to_duration(stream_duration as f64 * rational_to_f64(time_base))
        } else {
            Duration::ZERO
        };

        let metadata = HandleMetadata {
            duration,
            natural_width: decoder.width(),
            natural_height: decoder.height(),
        };
        log::debug!(
            "Opened {} ({}x{}, {:?})",
            path.display(),
            metadata.natural_width,
            metadata.natural_height,
            metadata.duration
        );

        Ok(Self {
            input,
            stream_index,
            time_base,
            decoder,
            current: None,
            metadata,
        })
    }

    /// Seek to the keyframe before `position`, then decode forward to the
    /// first frame at or after it. Stops early once `cancel` is raised.
    fn seek(
        &mut self,
        position: Duration,
        cancel: &CancellationToken,
    ) -> Result<Duration, CaptureError> {
        let seek_target = position.as_micros() as i64;
        self.input.seek(seek_target, ..seek_target)?;
        self.decoder.flush();

        let time_base = rational_to_f64(self.time_base);
        let target_pts = if time_base > 0.0 {
            (position.as_secs_f64() / time_base) as i64
        } else {
            0
        };

        let mut found: Option<(VideoFrame, i64)> = None;
        let mut last: Option<(VideoFrame, i64)> = None;

        'packets: for (stream, packet) in self.input.packets() {
            if cancel.is_cancelled() {
                return Err(CaptureError::DecodeError(format!(
                    "seek to {position:?} was abandoned"
                )));
            }
            if stream.index() != self.stream_index {
                continue;
            }
            self.decoder.send_packet(&packet)?;

            let mut frame = VideoFrame::empty();
            while self.decoder.receive_frame(&mut frame).is_ok() {
                let pts = frame.timestamp().or_else(|| frame.pts()).unwrap_or(0);
                if pts >= target_pts {
                    found = Some((frame, pts));
                    break 'packets;
                }
                last = Some((frame, pts));
                frame = VideoFrame::empty();
            }
        }

        if found.is_none() {
            self.decoder.send_eof()?;
            let mut frame = VideoFrame::empty();
            while self.decoder.receive_frame(&mut frame).is_ok() {
                let pts = frame.timestamp().or_else(|| frame.pts()).unwrap_or(0);
                if pts >= target_pts {
                    found = Some((frame, pts));
                    break;
                }
                last = Some((frame, pts));
                frame = VideoFrame::empty();
            }
        }

        // Near the end of the stream the last decoded frame is the closest.
        let (frame, pts) = found.or(last).ok_or_else(|| {
            CaptureError::DecodeError(format!("no frame could be decoded near {position:?}"))
        })?;
        self.current = Some(frame);

        let landed = seconds_to_duration(pts as f64 * time_base);
        log::debug!("Seek to {position:?} landed on {landed:?}");
        Ok(landed)
    }

    fn render(&self) -> Result<RgbaImage, CaptureError> {
        let frame = self.current.as_ref().ok_or_else(|| {
            CaptureError::DecodeError("no decoded frame; seek before rendering".to_string())
        })?;
        let width = self.metadata.natural_width;
        let height = self.metadata.natural_height;

        let mut scaler = ScalingContext::get(
            frame.format(),
            frame.width(),
            frame.height(),
            Pixel::RGBA,
            width,
            height,
            ScalingFlags::BILINEAR,
        )?;
        let mut rgba_frame = VideoFrame::empty();
        scaler.run(frame, &mut rgba_frame)?;

        let buffer = frame_to_rgba_buffer(&rgba_frame, width, height);
        RgbaImage::from_raw(width, height, buffer).ok_or_else(|| {
            CaptureError::DecodeError("decoded frame does not match its dimensions".to_string())
        })
    }
}

fn rational_to_f64(value: Rational) -> f64 {
    if value.denominator() == 0 {
        return 0.0;
    }
    f64::from(value.numerator()) / f64::from(value.denominator())
}

fn seconds_to_duration(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::ZERO)
}

fn join_error(error: JoinError) -> CaptureError {
    CaptureError::DecodeError(format!("decoder task failed: {error}"))
}

/// FFmpeg's own console verbosity.
///
/// Ordered from silent to most verbose; each level also prints everything
/// above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    Quiet,
    Panic,
    Fatal,
    Error,
    /// FFmpeg's default.
    Warning,
    Info,
    Verbose,
    Debug,
    Trace,
}

impl FfmpegLogLevel {
    fn to_ffmpeg_level(self) -> Level {
        match self {
            FfmpegLogLevel::Quiet => Level::Quiet,
            FfmpegLogLevel::Panic => Level::Panic,
            FfmpegLogLevel::Fatal => Level::Fatal,
            FfmpegLogLevel::Error => Level::Error,
            FfmpegLogLevel::Warning => Level::Warning,
            FfmpegLogLevel::Info => Level::Info,
            FfmpegLogLevel::Verbose => Level::Verbose,
            FfmpegLogLevel::Debug => Level::Debug,
            FfmpegLogLevel::Trace => Level::Trace,
        }
    }
}

/// Set FFmpeg's stderr verbosity. Does not affect `log` output.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
}
