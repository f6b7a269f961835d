//! Debounced preview generation.
//!
//! While the user drags a timestamp or range control, every change is sent
//! to a [`PreviewCoordinator`]. The coordinator waits for the selection to
//! settle (300 ms for an instant, 500 ms for a range by default), then
//! renders the preview. Only one generation runs at a time: changes that
//! arrive while one is in flight are queued behind it and collapsed into a
//! single follow-up run. [`PreviewCoordinator::pause`] lets another user of
//! the same source, such as a final capture, wait for the running generation
//! and keep new ones from starting.
//!
//! Every request is tagged with a generation number. [`PreviewState::apply`]
//! is the single transition function; it drops results whose generation is
//! no longer the latest request, so a slow, superseded extraction can never
//! overwrite a newer preview.
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "ffmpeg")]
//! # async fn example() -> Result<(), swimframe::CaptureError> {
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use swimframe::{
//!     ExtractOptions, FfmpegBackend, FrameExtractor, MediaSource, PreviewCoordinator,
//!     PreviewOptions, Selection,
//! };
//!
//! let source = MediaSource::from_path("lap.mp4").await?;
//! let extractor = Arc::new(FrameExtractor::new(FfmpegBackend::new(), ExtractOptions::new()));
//! let duration = extractor.probe(&source).await?.duration;
//!
//! let preview = PreviewCoordinator::spawn(extractor, source, duration, PreviewOptions::new());
//! preview.request(Selection::Instant(Duration::from_secs(3)));
//! preview.request(Selection::Instant(Duration::from_secs(4)));
//! let state = preview.settled().await;
//! assert_eq!(state.frames().len(), 1);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::wrappers::WatchStream;

use crate::configuration::PreviewOptions;
use crate::error::FailureKind;
use crate::extractor::FrameExtractor;
use crate::frame::FrameResult;
use crate::handle::MediaBackend;
use crate::sampler::SampleSpec;
use crate::source::MediaSource;

/// What the user currently has selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// A single moment.
    Instant(Duration),
    /// A window of the video.
    Range { start: Duration, end: Duration },
}

impl Selection {
    fn same_kind(&self, other: &Selection) -> bool {
        matches!(
            (self, other),
            (Selection::Instant(_), Selection::Instant(_))
                | (Selection::Range { .. }, Selection::Range { .. })
        )
    }
}

/// Where preview generation stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreviewPhase {
    /// Nothing has been requested yet.
    #[default]
    Idle,
    /// A request is waiting for its debounce or being rendered.
    Generating,
    /// The latest request produced a preview.
    Ready,
    /// The latest request failed.
    Failed,
}

/// Inputs to [`PreviewState::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewEvent {
    Requested {
        generation: u64,
        selection: Selection,
    },
    Settled {
        generation: u64,
        frames: Vec<FrameResult>,
    },
    Failed {
        generation: u64,
        kind: FailureKind,
    },
}

/// UI-facing preview state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewState {
    phase: PreviewPhase,
    requested: u64,
    resolved: u64,
    selection: Option<Selection>,
    frames: Vec<FrameResult>,
    error: Option<FailureKind>,
}

impl PreviewState {
    /// Apply one event. Returns `false` when the event was stale or out of
    /// order and left the state untouched.
    pub fn apply(&mut self, event: PreviewEvent) -> bool {
        match event {
            PreviewEvent::Requested {
                generation,
                selection,
            } => {
                if generation <= self.requested {
                    return false;
                }
                if self
                    .selection
                    .is_some_and(|current| !current.same_kind(&selection))
                {
                    self.frames.clear();
                    self.error = None;
                }
                self.requested = generation;
                self.selection = Some(selection);
                self.phase = PreviewPhase::Generating;
                true
            }
            PreviewEvent::Settled { generation, frames } => {
                if !self.accepts(generation) {
                    return false;
                }
                self.resolved = generation;
                self.frames = frames;
                self.error = None;
                self.phase = PreviewPhase::Ready;
                true
            }
            PreviewEvent::Failed { generation, kind } => {
                if !self.accepts(generation) {
                    return false;
                }
                // Keep the last good preview on screen.
                self.resolved = generation;
                self.error = Some(kind);
                self.phase = PreviewPhase::Failed;
                true
            }
        }
    }

    fn accepts(&self, generation: u64) -> bool {
        generation == self.requested && generation > self.resolved
    }

    pub fn phase(&self) -> PreviewPhase {
        self.phase
    }

    /// Generation of the most recent request.
    pub fn requested_generation(&self) -> u64 {
        self.requested
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    /// The most recent preview slots, including failed range slots.
    pub fn frames(&self) -> &[FrameResult] {
        &self.frames
    }

    /// Whether any preview image is available.
    pub fn has_preview(&self) -> bool {
        self.frames.iter().any(FrameResult::is_captured)
    }

    pub fn is_generating(&self) -> bool {
        self.phase == PreviewPhase::Generating
    }

    /// Whether the latest request has resolved.
    pub fn is_settled(&self) -> bool {
        self.requested == self.resolved
    }

    /// The error to show, if any. A failure is hidden while an earlier
    /// preview is still on screen.
    pub fn visible_error(&self) -> Option<FailureKind> {
        if self.has_preview() { None } else { self.error }
    }
}

struct Command {
    generation: u64,
    selection: Selection,
}

enum Message {
    Request(Command),
    /// Stop starting generations; acknowledged once none is running.
    Pause(oneshot::Sender<()>),
    Resume,
}

/// Runs debounced, non-overlapping preview generations for one source.
///
/// The background task stops when the coordinator is dropped.
pub struct PreviewCoordinator {
    state: Arc<watch::Sender<PreviewState>>,
    commands: mpsc::UnboundedSender<Message>,
    task: JoinHandle<()>,
}

impl PreviewCoordinator {
    /// Start a coordinator for `source`. Must be called inside a Tokio
    /// runtime.
    pub fn spawn<B: MediaBackend + 'static>(
        extractor: Arc<FrameExtractor<B>>,
        source: MediaSource,
        duration: Duration,
        options: PreviewOptions,
    ) -> Self {
        let (sender, _) = watch::channel(PreviewState::default());
        let state = Arc::new(sender);
        let (commands, receiver) = mpsc::unbounded_channel();

        let worker = PreviewWorker {
            extractor,
            source,
            duration,
            options,
            state: state.clone(),
        };
        let task = tokio::spawn(worker.run(receiver));

        Self {
            state,
            commands,
            task,
        }
    }

    /// Request a preview for `selection`, superseding earlier requests.
    ///
    /// Returns the generation assigned to this request.
    pub fn request(&self, selection: Selection) -> u64 {
        let mut generation = 0;
        self.state.send_modify(|state| {
            generation = state.requested_generation() + 1;
            state.apply(PreviewEvent::Requested {
                generation,
                selection,
            });
        });

        if self
            .commands
            .send(Message::Request(Command {
                generation,
                selection,
            }))
            .is_err()
        {
            log::warn!("Preview worker has stopped; request {generation} dropped");
        }
        generation
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> PreviewState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PreviewState> {
        self.state.subscribe()
    }

    /// Stream of state snapshots, starting with the current one.
    pub fn updates(&self) -> WatchStream<PreviewState> {
        WatchStream::new(self.state.subscribe())
    }

    /// Wait until the latest request has resolved.
    pub async fn settled(&self) -> PreviewState {
        let mut receiver = self.state.subscribe();
        let settled = match receiver.wait_for(PreviewState::is_settled).await {
            Ok(state) => Some(state.clone()),
            Err(_) => None,
        };
        settled.unwrap_or_else(|| self.state())
    }

    /// Wait for any running generation to finish and hold back new ones
    /// until the returned guard is dropped.
    ///
    /// Requests made while paused are kept and debounced as usual; the
    /// latest of them runs after the pause ends.
    pub async fn pause(&self) -> PreviewPause<'_> {
        let (ack, acknowledged) = oneshot::channel();
        if self.commands.send(Message::Pause(ack)).is_ok() {
            // An error means the worker has stopped, so nothing is running.
            let _ = acknowledged.await;
        }
        PreviewPause {
            commands: &self.commands,
        }
    }
}

/// Keeps a [`PreviewCoordinator`] paused while alive.
#[must_use = "the coordinator resumes as soon as the guard is dropped"]
pub struct PreviewPause<'a> {
    commands: &'a mpsc::UnboundedSender<Message>,
}

impl Drop for PreviewPause<'_> {
    fn drop(&mut self) {
        let _ = self.commands.send(Message::Resume);
    }
}

impl Drop for PreviewCoordinator {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct PreviewWorker<B> {
    extractor: Arc<FrameExtractor<B>>,
    source: MediaSource,
    duration: Duration,
    options: PreviewOptions,
    state: Arc<watch::Sender<PreviewState>>,
}

impl<B: MediaBackend + 'static> PreviewWorker<B> {
    async fn run(self, mut commands: mpsc::UnboundedReceiver<Message>) {
        let mut pending: Option<Command> = None;
        let mut deadline = Instant::now();
        let mut pauses = 0_u32;

        loop {
            tokio::select! {
                biased;

                message = commands.recv() => match message {
                    Some(Message::Request(command)) => {
                        let debounce = self.debounce_for(&command.selection);
                        log::debug!(
                            "Preview {} scheduled in {:?}",
                            command.generation,
                            debounce
                        );
                        deadline = Instant::now() + debounce;
                        pending = Some(command);
                    }
                    Some(Message::Pause(ack)) => {
                        pauses += 1;
                        let _ = ack.send(());
                    }
                    Some(Message::Resume) => pauses = pauses.saturating_sub(1),
                    None => break,
                },
                _ = tokio::time::sleep_until(deadline), if pending.is_some() && pauses == 0 => {
                    if let Some(command) = pending.take() {
                        self.generate(command).await;
                    }
                }
            }
        }
    }

    fn debounce_for(&self, selection: &Selection) -> Duration {
        match selection {
            Selection::Instant(_) => self.options.instant_debounce,
            Selection::Range { .. } => self.options.range_debounce,
        }
    }

    async fn generate(&self, command: Command) {
        let latest = self.state.borrow().requested_generation();
        if command.generation < latest {
            log::debug!("Skipping preview {} (latest is {latest})", command.generation);
            return;
        }

        let generation = command.generation;
        let attempts = self.options.attempts;
        let event = match command.selection {
            Selection::Instant(timestamp) => {
                match self
                    .extractor
                    .extract_frame(&self.source, timestamp, attempts)
                    .await
                {
                    FrameResult::Failed(failure) => PreviewEvent::Failed {
                        generation,
                        kind: failure.kind,
                    },
                    captured => PreviewEvent::Settled {
                        generation,
                        frames: vec![captured],
                    },
                }
            }
            Selection::Range { start, end } => {
                let spec = SampleSpec::Range {
                    start,
                    end,
                    count: self.options.range_frames,
                };
                match self
                    .extractor
                    .sample_frames(&self.source, self.duration, spec, attempts)
                    .await
                {
                    Ok(batch) => PreviewEvent::Settled {
                        generation,
                        frames: batch.into_results(),
                    },
                    Err(error) => PreviewEvent::Failed {
                        generation,
                        kind: error.kind(),
                    },
                }
            }
        };

        let mut applied = false;
        self.state.send_modify(|state| applied = state.apply(event));
        if !applied {
            log::debug!("Discarded stale preview {generation}");
        }
    }
}
