//! ExtractOptions, PreviewOptions and SessionOptions tests.

use std::sync::Arc;
use std::time::Duration;

use swimframe::{
    BlackFrameOptions, ExtractOptions, FallbackAdvice, PreviewOptions, ProgressCallback,
    ProgressInfo, SessionOptions,
};

// ── ExtractOptions ─────────────────────────────────────────────────

#[test]
fn extract_defaults() {
    let options = ExtractOptions::new();
    assert_eq!(options.attempt_timeout(), Duration::from_secs(5));
    assert_eq!(options.retry_delay(), Duration::from_millis(500));
    assert_eq!(options.seek_margin(), Duration::from_millis(100));
    assert_eq!(options.jpeg_quality(), 85);
    assert_eq!(*options.black_frame(), BlackFrameOptions::default());
}

#[test]
fn jpeg_quality_is_clamped() {
    assert_eq!(ExtractOptions::new().with_jpeg_quality(0).jpeg_quality(), 1);
    assert_eq!(ExtractOptions::new().with_jpeg_quality(250).jpeg_quality(), 100);
    assert_eq!(ExtractOptions::new().with_jpeg_quality(60).jpeg_quality(), 60);
}

#[test]
fn extract_builders_chain() {
    let options = ExtractOptions::new()
        .with_attempt_timeout(Duration::from_secs(2))
        .with_retry_delay(Duration::from_millis(50))
        .with_seek_margin(Duration::from_millis(250))
        .with_black_frame(BlackFrameOptions {
            block_size: 4,
            threshold: 20,
            dark_ratio: 0.9,
        });
    assert_eq!(options.attempt_timeout(), Duration::from_secs(2));
    assert_eq!(options.retry_delay(), Duration::from_millis(50));
    assert_eq!(options.seek_margin(), Duration::from_millis(250));
    assert_eq!(options.black_frame().threshold, 20);
}

#[test]
fn debug_output_omits_the_callback() {
    struct Silent;
    impl ProgressCallback for Silent {
        fn on_progress(&self, _info: &ProgressInfo) {}
    }

    let options = ExtractOptions::new().with_progress(Arc::new(Silent));
    let debug = format!("{options:?}");
    assert!(debug.contains("ExtractOptions"));
    assert!(debug.contains("jpeg_quality: 85"));
    assert!(!debug.contains("progress"));
}

// ── PreviewOptions ─────────────────────────────────────────────────

#[test]
fn preview_defaults() {
    let options = PreviewOptions::new();
    assert_eq!(options.instant_debounce, Duration::from_millis(300));
    assert_eq!(options.range_debounce, Duration::from_millis(500));
    assert_eq!(options.attempts, 2);
    assert_eq!(options.range_frames, 3);
}

#[test]
fn preview_counts_are_clamped() {
    let options = PreviewOptions::new().with_attempts(0).with_range_frames(0);
    assert_eq!(options.attempts, 1);
    assert_eq!(options.range_frames, 1);

    let options = PreviewOptions::new()
        .with_debounce(Duration::from_millis(100), Duration::from_millis(200));
    assert_eq!(options.instant_debounce, Duration::from_millis(100));
    assert_eq!(options.range_debounce, Duration::from_millis(200));
}

// ── SessionOptions ─────────────────────────────────────────────────

#[test]
fn session_defaults() {
    let options = SessionOptions::new();
    assert_eq!(options.final_attempts, 3);
    assert_eq!(options.range_frames, 5);
    assert_eq!(options.range_inset, (0.3, 0.7));
    assert_eq!(options.range_end_margin, Duration::from_millis(500));
    assert!(options.fallback_advice.is_none());
}

#[test]
fn session_builders_clamp_and_enable_fallback() {
    let options = SessionOptions::new()
        .with_final_attempts(0)
        .with_range_frames(0)
        .with_preview(PreviewOptions::new().with_attempts(4))
        .with_fallback_advice(FallbackAdvice::default().with_min_items(2));

    assert_eq!(options.final_attempts, 1);
    assert_eq!(options.range_frames, 1);
    assert_eq!(options.preview.attempts, 4);
    assert_eq!(options.fallback_advice.unwrap().min_items, 2);
}
