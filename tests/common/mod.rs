//! Shared test doubles.
//!
//! [`ScriptedBackend`] is an in-memory [`MediaBackend`] whose handles follow
//! a script: each opened handle takes the next [`Outcome`] from the queue,
//! or asks the current rule (keyed by seek position) once the queue is
//! empty. It records opens, seeks, concurrently live handles and the
//! temporary files it staged.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use swimframe::{
    CaptureError, ExtractOptions, HandleMetadata, MediaBackend, MediaHandle, MediaSource,
    TemporaryUri,
};

pub const WIDTH: u32 = 32;
pub const HEIGHT: u32 = 24;

/// What one handle does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Render a uniform frame of this intensity.
    Frame(u8),
    /// Render an all-black frame.
    Black,
    /// Fail rendering with a decode error.
    DecodeError,
    /// Never complete the seek.
    Hang,
    /// Report zero natural dimensions.
    Unsupported,
}

type Rule = Arc<dyn Fn(Duration) -> Outcome + Send + Sync>;

#[derive(Default)]
pub struct Stats {
    opens: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    seeks: Mutex<Vec<Duration>>,
    uris: Mutex<Vec<PathBuf>>,
}

impl Stats {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Highest number of handles alive at the same time.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn seeks(&self) -> Vec<Duration> {
        self.seeks.lock().unwrap().clone()
    }

    pub fn seek_seconds(&self) -> Vec<f64> {
        self.seeks().iter().map(Duration::as_secs_f64).collect()
    }

    pub fn uris(&self) -> Vec<PathBuf> {
        self.uris.lock().unwrap().clone()
    }
}

pub struct ScriptedBackend {
    duration: Duration,
    script: Mutex<VecDeque<Outcome>>,
    rule: Mutex<Rule>,
    seek_delay: Duration,
    release_fallback: Duration,
    stats: Arc<Stats>,
}

impl ScriptedBackend {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            script: Mutex::new(VecDeque::new()),
            rule: Mutex::new(Arc::new(|_| Outcome::Frame(200))),
            seek_delay: Duration::ZERO,
            release_fallback: Duration::from_secs(30),
            stats: Arc::new(Stats::default()),
        }
    }

    pub fn with_script(self, outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        self.script.lock().unwrap().extend(outcomes);
        self
    }

    pub fn with_rule(self, rule: impl Fn(Duration) -> Outcome + Send + Sync + 'static) -> Self {
        self.set_rule(rule);
        self
    }

    /// Make every seek take this long.
    pub fn with_seek_delay(mut self, delay: Duration) -> Self {
        self.seek_delay = delay;
        self
    }

    /// Replace the rule for handles opened from now on.
    pub fn set_rule(&self, rule: impl Fn(Duration) -> Outcome + Send + Sync + 'static) {
        *self.rule.lock().unwrap() = Arc::new(rule);
    }

    pub fn stats(&self) -> Arc<Stats> {
        self.stats.clone()
    }
}

#[async_trait]
impl MediaBackend for ScriptedBackend {
    async fn open(&self, source: &MediaSource) -> Result<Box<dyn MediaHandle>, CaptureError> {
        let uri = TemporaryUri::create(source, self.release_fallback)?;
        self.stats.uris.lock().unwrap().push(uri.path().to_path_buf());

        self.stats.opens.fetch_add(1, Ordering::SeqCst);
        let active = self.stats.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_active.fetch_max(active, Ordering::SeqCst);

        Ok(Box::new(ScriptedHandle {
            outcome: self.script.lock().unwrap().pop_front(),
            rule: self.rule.lock().unwrap().clone(),
            duration: self.duration,
            seek_delay: self.seek_delay,
            stats: self.stats.clone(),
            _uri: uri,
        }))
    }
}

struct ScriptedHandle {
    outcome: Option<Outcome>,
    rule: Rule,
    duration: Duration,
    seek_delay: Duration,
    stats: Arc<Stats>,
    _uri: TemporaryUri,
}

#[async_trait]
impl MediaHandle for ScriptedHandle {
    async fn load_metadata(&mut self) -> Result<HandleMetadata, CaptureError> {
        // Unsupported media has no seek position to key the rule on; a rule
        // declares it by answering Unsupported at the start of the video.
        if self.outcome.is_none() && (self.rule)(Duration::ZERO) == Outcome::Unsupported {
            self.outcome = Some(Outcome::Unsupported);
        }
        let (natural_width, natural_height) = match self.outcome {
            Some(Outcome::Unsupported) => (0, 0),
            _ => (WIDTH, HEIGHT),
        };
        Ok(HandleMetadata {
            duration: self.duration,
            natural_width,
            natural_height,
        })
    }

    async fn seek(&mut self, position: Duration) -> Result<Duration, CaptureError> {
        self.stats.seeks.lock().unwrap().push(position);
        let outcome = match self.outcome {
            Some(outcome) => outcome,
            None => (self.rule)(position),
        };
        self.outcome = Some(outcome);

        if outcome == Outcome::Hang {
            std::future::pending::<()>().await;
        }
        if !self.seek_delay.is_zero() {
            tokio::time::sleep(self.seek_delay).await;
        }
        Ok(position)
    }

    async fn render(&mut self) -> Result<RgbaImage, CaptureError> {
        match self.outcome.unwrap_or(Outcome::Frame(200)) {
            Outcome::Frame(value) => Ok(RgbaImage::from_pixel(
                WIDTH,
                HEIGHT,
                Rgba([value, value, value, 255]),
            )),
            Outcome::Black => Ok(RgbaImage::from_pixel(WIDTH, HEIGHT, Rgba([0, 0, 0, 255]))),
            Outcome::DecodeError | Outcome::Hang | Outcome::Unsupported => Err(
                CaptureError::DecodeError("scripted decode failure".to_string()),
            ),
        }
    }
}

impl Drop for ScriptedHandle {
    fn drop(&mut self) {
        self.stats.active.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn source() -> MediaSource {
    MediaSource::new("lap.mp4", Some("video/mp4".to_string()), vec![0_u8; 64])
}

/// Default options without the settle pause, so timings are easy to reason
/// about.
pub fn options() -> ExtractOptions {
    ExtractOptions::new().with_settle_delay(Duration::ZERO)
}

pub fn secs(value: f64) -> Duration {
    Duration::from_secs_f64(value)
}

pub fn approx(left: f64, right: f64) -> bool {
    (left - right).abs() < 1e-6
}
