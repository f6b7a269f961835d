//! End-to-end capture sessions.
//!
//! A [`CaptureSession`] owns one loaded video at a time. It validates and
//! probes the upload, keeps a [`PreviewCoordinator`] fed with the current
//! selection, and on submit performs a final capture with a larger attempt
//! budget before handing the frames to an [`Analyzer`].
//!
//! All state lives in [`SessionState`]; [`SessionState::apply`] is the only
//! place transitions are checked.
//!
//! ```text
//! Empty ──load──▶ Loaded ──submit──▶ Analyzing ──▶ Delivered
//!                   ▲  (mode / selection)     └──▶ Failed
//!                   └──────────── submit again ◀───────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::advice::FORMAT_GUIDE;
use crate::analysis::{Analysis, Analyzer, CaptureRequest};
use crate::configuration::SessionOptions;
use crate::error::{CaptureError, FailureKind};
use crate::extractor::FrameExtractor;
use crate::handle::{HandleMetadata, MediaBackend};
use crate::preview::{PreviewCoordinator, PreviewState, Selection};
use crate::sampler::SampleSpec;
use crate::source::MediaSource;

/// Single-instant or time-range capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureMode {
    #[default]
    Single,
    Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// No video loaded.
    #[default]
    Empty,
    /// A video is loaded and selections can be changed.
    Loaded,
    /// A submission is in flight.
    Analyzing,
    /// The last submission produced advice.
    Delivered,
    /// The last submission failed.
    Failed,
}

/// Facts about the loaded video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInfo {
    pub name: String,
    pub size: u64,
    pub duration: Duration,
    pub width: u32,
    pub height: u32,
}

impl MediaInfo {
    fn new(source: &MediaSource, metadata: &HandleMetadata) -> Self {
        Self {
            name: source.name().to_string(),
            size: source.size(),
            duration: metadata.duration,
            width: metadata.natural_width,
            height: metadata.natural_height,
        }
    }
}

/// A user-visible failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionError {
    pub kind: FailureKind,
    pub message: String,
}

impl SessionError {
    fn from_error(error: &CaptureError) -> Self {
        let message = match error {
            CaptureError::Upstream {
                message,
                details: Some(details),
                ..
            } => format!("{message}: {details}"),
            other => other.to_string(),
        };
        Self {
            kind: error.kind(),
            message,
        }
    }
}

/// Inputs to [`SessionState::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Loaded {
        media: MediaInfo,
        timestamp: Duration,
        range: (Duration, Duration),
    },
    LoadFailed {
        error: SessionError,
        format_help: bool,
    },
    ModeChanged {
        mode: CaptureMode,
        timestamp: Duration,
        range: (Duration, Duration),
    },
    InstantSelected(Duration),
    RangeSelected {
        start: Duration,
        end: Duration,
    },
    SubmitStarted {
        has_preview: bool,
    },
    Delivered(Vec<String>),
    SubmitFailed {
        error: SessionError,
        format_help: bool,
    },
    FormatHelpDismissed,
}

/// Everything the UI needs to render a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    phase: SessionPhase,
    mode: CaptureMode,
    media: Option<MediaInfo>,
    timestamp: Duration,
    range: (Duration, Duration),
    advice: Vec<String>,
    error: Option<SessionError>,
    show_format_help: bool,
}

impl SessionState {
    /// Apply one event.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Validation`] (or [`CaptureError::InvalidRange`])
    /// when the event is not legal in the current state. The state is left
    /// untouched in that case.
    pub fn apply(&mut self, event: SessionEvent) -> Result<(), CaptureError> {
        match event {
            SessionEvent::Loaded {
                media,
                timestamp,
                range,
            } => {
                self.ensure_idle()?;
                *self = SessionState {
                    phase: SessionPhase::Loaded,
                    mode: self.mode,
                    media: Some(media),
                    timestamp,
                    range,
                    ..SessionState::default()
                };
            }
            SessionEvent::LoadFailed { error, format_help } => {
                self.ensure_idle()?;
                *self = SessionState {
                    mode: self.mode,
                    error: Some(error),
                    show_format_help: format_help,
                    ..SessionState::default()
                };
            }
            SessionEvent::ModeChanged {
                mode,
                timestamp,
                range,
            } => {
                self.ensure_loaded()?;
                self.ensure_idle()?;
                self.mode = mode;
                self.timestamp = timestamp;
                self.range = range;
            }
            SessionEvent::InstantSelected(timestamp) => {
                let duration = self.ensure_loaded()?;
                self.ensure_idle()?;
                self.ensure_mode(CaptureMode::Single)?;
                if timestamp >= duration {
                    return Err(CaptureError::Validation(format!(
                        "timestamp {timestamp:?} is not before the end of the video ({duration:?})"
                    )));
                }
                self.timestamp = timestamp;
            }
            SessionEvent::RangeSelected { start, end } => {
                let duration = self.ensure_loaded()?;
                self.ensure_idle()?;
                self.ensure_mode(CaptureMode::Range)?;
                if start > end {
                    return Err(CaptureError::InvalidRange { start, end });
                }
                if end >= duration {
                    return Err(CaptureError::Validation(format!(
                        "range end {end:?} is not before the end of the video ({duration:?})"
                    )));
                }
                self.range = (start, end);
            }
            SessionEvent::SubmitStarted { has_preview } => {
                self.ensure_loaded()?;
                self.ensure_idle()?;
                if !has_preview {
                    return Err(CaptureError::Validation(
                        "no preview is available yet; wait for the preview before submitting"
                            .to_string(),
                    ));
                }
                self.phase = SessionPhase::Analyzing;
                self.advice.clear();
                self.error = None;
                self.show_format_help = false;
            }
            SessionEvent::Delivered(advice) => {
                self.ensure_analyzing()?;
                self.phase = SessionPhase::Delivered;
                self.advice = advice;
            }
            SessionEvent::SubmitFailed { error, format_help } => {
                self.ensure_analyzing()?;
                self.phase = SessionPhase::Failed;
                self.error = Some(error);
                self.show_format_help = format_help;
            }
            SessionEvent::FormatHelpDismissed => {
                self.show_format_help = false;
            }
        }
        Ok(())
    }

    fn ensure_idle(&self) -> Result<(), CaptureError> {
        if self.phase == SessionPhase::Analyzing {
            return Err(CaptureError::Validation(
                "an analysis is already in progress".to_string(),
            ));
        }
        Ok(())
    }

    fn ensure_loaded(&self) -> Result<Duration, CaptureError> {
        self.media
            .as_ref()
            .map(|media| media.duration)
            .ok_or_else(|| CaptureError::Validation("no video is loaded".to_string()))
    }

    fn ensure_analyzing(&self) -> Result<(), CaptureError> {
        if self.phase != SessionPhase::Analyzing {
            return Err(CaptureError::Validation(
                "no analysis is in progress".to_string(),
            ));
        }
        Ok(())
    }

    fn ensure_mode(&self, mode: CaptureMode) -> Result<(), CaptureError> {
        if self.mode != mode {
            return Err(CaptureError::Validation(format!(
                "selection does not match the current {:?} mode",
                self.mode
            )));
        }
        Ok(())
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn media(&self) -> Option<&MediaInfo> {
        self.media.as_ref()
    }

    /// Selected instant (single mode).
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    /// Selected window (range mode).
    pub fn range(&self) -> (Duration, Duration) {
        self.range
    }

    /// The selection for the current mode, once a video is loaded.
    pub fn selection(&self) -> Option<Selection> {
        self.media.as_ref()?;
        Some(match self.mode {
            CaptureMode::Single => Selection::Instant(self.timestamp),
            CaptureMode::Range => Selection::Range {
                start: self.range.0,
                end: self.range.1,
            },
        })
    }

    pub fn advice(&self) -> &[String] {
        &self.advice
    }

    pub fn error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    pub fn show_format_help(&self) -> bool {
        self.show_format_help
    }

    /// The format guide, while it is being shown.
    pub fn format_help(&self) -> Option<&'static str> {
        self.show_format_help.then_some(FORMAT_GUIDE)
    }
}

/// Single-instant default: the middle of the video.
pub fn default_timestamp(duration: Duration) -> Duration {
    duration / 2
}

/// Range default: an inset window that stays clear of the end of the video.
///
/// `[inset.0 · duration, min(inset.1 · duration, duration − end_margin)]`,
/// with the end never before the start.
pub fn default_range(
    duration: Duration,
    inset: (f64, f64),
    end_margin: Duration,
) -> (Duration, Duration) {
    let start = duration.mul_f64(inset.0.clamp(0.0, 1.0));
    let end = duration
        .mul_f64(inset.1.clamp(0.0, 1.0))
        .min(duration.saturating_sub(end_margin))
        .max(start);
    (start, end)
}

struct ActiveMedia {
    source: MediaSource,
    preview: PreviewCoordinator,
}

/// Drives one video from upload to advice.
///
/// # Example
///
/// ```no_run
/// # #[cfg(feature = "ffmpeg")]
/// # async fn example() -> Result<(), swimframe::CaptureError> {
/// use std::sync::Arc;
///
/// use swimframe::{
///     CaptureSession, ExtractOptions, FfmpegBackend, FrameExtractor, HttpAnalyzer,
///     MediaSource, SessionOptions,
/// };
///
/// let extractor = Arc::new(FrameExtractor::new(FfmpegBackend::new(), ExtractOptions::new()));
/// let analyzer = HttpAnalyzer::new("http://localhost:3000/api/analyze");
/// let mut session = CaptureSession::new(extractor, analyzer, SessionOptions::new());
///
/// session.load(MediaSource::from_path("lap.mp4").await?).await?;
/// session.preview_settled().await;
/// let analysis = session.submit().await?;
/// println!("{}", swimframe::format_numbered(&analysis.advice));
/// # Ok(())
/// # }
/// ```
pub struct CaptureSession<B, A> {
    extractor: Arc<FrameExtractor<B>>,
    analyzer: A,
    options: SessionOptions,
    state: SessionState,
    active: Option<ActiveMedia>,
}

impl<B, A> CaptureSession<B, A>
where
    B: MediaBackend + 'static,
    A: Analyzer,
{
    pub fn new(extractor: Arc<FrameExtractor<B>>, analyzer: A, options: SessionOptions) -> Self {
        Self {
            extractor,
            analyzer,
            options,
            state: SessionState::default(),
            active: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Current preview state, once a video is loaded.
    pub fn preview_state(&self) -> Option<PreviewState> {
        self.active.as_ref().map(|active| active.preview.state())
    }

    /// The preview coordinator of the loaded video.
    pub fn preview(&self) -> Option<&PreviewCoordinator> {
        self.active.as_ref().map(|active| &active.preview)
    }

    /// Wait for the latest preview request to resolve.
    pub async fn preview_settled(&self) -> Option<PreviewState> {
        match &self.active {
            Some(active) => Some(active.preview.settled().await),
            None => None,
        }
    }

    /// Whether [`submit`](Self::submit) would be accepted right now.
    pub fn can_submit(&self) -> bool {
        let has_preview = self
            .preview_state()
            .is_some_and(|preview| preview.has_preview());
        self.state.clone().apply(SessionEvent::SubmitStarted { has_preview }).is_ok()
    }

    /// Load a new video, replacing any previous one.
    ///
    /// The upload is type-checked and probed. On success the selection
    /// defaults are set and a preview is requested for the current mode.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::InvalidMediaType`] if the file is not a video.
    /// - [`CaptureError::UnsupportedFormat`] / [`CaptureError::Timeout`] if
    ///   probing fails; the format help is shown for format problems.
    /// - [`CaptureError::Validation`] while an analysis is in progress.
    pub async fn load(&mut self, source: MediaSource) -> Result<&SessionState, CaptureError> {
        self.state.ensure_idle()?;

        let metadata = match self.validate_and_probe(&source).await {
            Ok(metadata) => metadata,
            Err(error) => {
                log::warn!("Could not load {}: {error}", source.name());
                self.active = None;
                self.state.apply(SessionEvent::LoadFailed {
                    error: SessionError::from_error(&error),
                    format_help: error.indicates_format_problem(),
                })?;
                return Err(error);
            }
        };

        let duration = metadata.duration;
        log::info!(
            "Loaded {} ({}, {}x{}, {:?})",
            source.name(),
            source.human_size(),
            metadata.natural_width,
            metadata.natural_height,
            duration
        );

        self.state.apply(SessionEvent::Loaded {
            media: MediaInfo::new(&source, &metadata),
            timestamp: default_timestamp(duration),
            range: self.default_range(duration),
        })?;

        let preview = PreviewCoordinator::spawn(
            self.extractor.clone(),
            source.clone(),
            duration,
            self.options.preview.clone(),
        );
        self.active = Some(ActiveMedia { source, preview });
        self.request_preview();
        Ok(&self.state)
    }

    async fn validate_and_probe(&self, source: &MediaSource) -> Result<HandleMetadata, CaptureError> {
        source.validate_media_type()?;
        self.extractor.probe(source).await
    }

    fn default_range(&self, duration: Duration) -> (Duration, Duration) {
        default_range(
            duration,
            self.options.range_inset,
            self.options.range_end_margin,
        )
    }

    fn request_preview(&self) {
        if let (Some(active), Some(selection)) = (&self.active, self.state.selection()) {
            active.preview.request(selection);
        }
    }

    /// Switch between single-instant and range capture.
    ///
    /// Resets the selection defaults and regenerates the preview. Switching
    /// to the current mode does nothing.
    pub fn set_mode(&mut self, mode: CaptureMode) -> Result<(), CaptureError> {
        if self.state.mode == mode && self.state.media.is_some() {
            return Ok(());
        }
        let duration = self.state.ensure_loaded()?;
        self.state.apply(SessionEvent::ModeChanged {
            mode,
            timestamp: default_timestamp(duration),
            range: self.default_range(duration),
        })?;
        log::debug!("Switched to {mode:?} mode");
        self.request_preview();
        Ok(())
    }

    /// Move the single-instant selection and schedule a preview.
    pub fn select_instant(&mut self, timestamp: Duration) -> Result<(), CaptureError> {
        self.state.apply(SessionEvent::InstantSelected(timestamp))?;
        self.request_preview();
        Ok(())
    }

    /// Move the range selection and schedule a preview.
    pub fn select_range(&mut self, start: Duration, end: Duration) -> Result<(), CaptureError> {
        self.state.apply(SessionEvent::RangeSelected { start, end })?;
        self.request_preview();
        Ok(())
    }

    pub fn dismiss_format_help(&mut self) {
        // FormatHelpDismissed is legal in every phase.
        let _ = self.state.apply(SessionEvent::FormatHelpDismissed);
    }

    /// Capture the final frame(s) and hand them to the analyzer.
    ///
    /// Rejected locally, without capturing or contacting the analyzer, when
    /// no preview has succeeded yet. Otherwise the session always leaves
    /// `Analyzing`, ending in `Delivered` or `Failed`, even when this future
    /// is dropped early.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::Validation`] when submission is not allowed.
    /// - Any capture or analysis error; the session is then `Failed`.
    pub async fn submit(&mut self) -> Result<Analysis, CaptureError> {
        let has_preview = self
            .preview_state()
            .is_some_and(|preview| preview.has_preview());

        let Self {
            extractor,
            analyzer,
            options,
            state,
            active,
        } = self;
        let Some(active) = active.as_ref() else {
            return Err(CaptureError::Validation("no video is loaded".to_string()));
        };

        let duration = state.ensure_loaded()?;
        let Some(selection) = state.selection() else {
            return Err(CaptureError::Validation("no video is loaded".to_string()));
        };

        state.apply(SessionEvent::SubmitStarted { has_preview })?;
        let guard = AnalyzingGuard { state };
        // The final capture must not decode alongside a preview.
        let _paused = active.preview.pause().await;
        let outcome =
            capture_and_analyze(extractor, analyzer, options, active, duration, selection).await;
        guard.finish(outcome)
    }
}

async fn capture_and_analyze<B: MediaBackend, A: Analyzer>(
    extractor: &FrameExtractor<B>,
    analyzer: &A,
    options: &SessionOptions,
    active: &ActiveMedia,
    duration: Duration,
    selection: Selection,
) -> Result<Analysis, CaptureError> {
    let request = match selection {
        Selection::Instant(timestamp) => {
            let frame = extractor
                .extract_frame(&active.source, timestamp, options.final_attempts)
                .await
                .into_result()?;
            CaptureRequest::single(timestamp, frame)
        }
        Selection::Range { start, end } => {
            let spec = SampleSpec::Range {
                start,
                end,
                count: options.range_frames,
            };
            let batch = extractor
                .sample_frames(&active.source, duration, spec, options.final_attempts)
                .await?;
            if batch.success_count() < batch.len() {
                log::warn!(
                    "Submitting {} of {} range frames",
                    batch.success_count(),
                    batch.len()
                );
            }
            CaptureRequest::range(start, end, batch.into_frames())?
        }
    };

    let mut analysis = analyzer.analyze(&request).await?;
    if let Some(fallback) = &options.fallback_advice {
        analysis.advice = fallback.apply(analysis.advice);
    }
    Ok(analysis)
}

/// Resolves `Analyzing` into `Delivered` or `Failed`, including when the
/// submission future is dropped.
struct AnalyzingGuard<'a> {
    state: &'a mut SessionState,
}

impl AnalyzingGuard<'_> {
    fn finish(self, outcome: Result<Analysis, CaptureError>) -> Result<Analysis, CaptureError> {
        let event = match &outcome {
            Ok(analysis) => SessionEvent::Delivered(analysis.advice.clone()),
            Err(error) => {
                log::warn!("Submission failed: {error}");
                SessionEvent::SubmitFailed {
                    error: SessionError::from_error(error),
                    format_help: error.indicates_format_problem(),
                }
            }
        };
        // Drop runs after this and finds the phase already resolved.
        self.state.apply(event)?;
        outcome
    }
}

impl Drop for AnalyzingGuard<'_> {
    fn drop(&mut self) {
        if self.state.phase == SessionPhase::Analyzing {
            let _ = self.state.apply(SessionEvent::SubmitFailed {
                error: SessionError {
                    kind: FailureKind::Validation,
                    message: "submission was cancelled".to_string(),
                },
                format_help: false,
            });
        }
    }
}
