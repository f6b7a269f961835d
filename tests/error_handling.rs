//! Error handling integration tests.
//!
//! These tests verify that meaningful errors are returned for various
//! failure conditions, and that each maps onto the right failure kind.

use std::time::Duration;

use swimframe::{CaptureError, CaptureRequest, FailureKind, MediaSource, SampleSpec};

#[test]
fn non_video_upload_names_the_file() {
    let source = MediaSource::new("splits.csv", Some("text/csv".to_string()), b"1,2".to_vec());
    let error = source.validate_media_type().unwrap_err();

    assert_eq!(error.kind(), FailureKind::Validation);
    let error_message = error.to_string();
    assert!(
        error_message.contains("splits.csv") && error_message.contains("text/csv"),
        "Error message should name the file and its type: {error_message}",
    );
}

#[test]
fn inverted_range_is_rejected() {
    let spec = SampleSpec::Range {
        start: Duration::from_secs(8),
        end: Duration::from_secs(2),
        count: 5,
    };
    let error = spec.timestamps(Duration::from_secs(10)).unwrap_err();

    assert!(matches!(error, CaptureError::InvalidRange { .. }));
    assert_eq!(error.kind(), FailureKind::Validation);
    assert!(
        error.to_string().contains("Invalid range"),
        "Error should mention the invalid range: {error}",
    );
}

#[test]
fn zero_sample_count_is_rejected() {
    let error = SampleSpec::Even { count: 0 }
        .timestamps(Duration::from_secs(10))
        .unwrap_err();
    assert!(matches!(error, CaptureError::Validation(_)));
}

#[test]
fn empty_range_submission_is_rejected() {
    let error = CaptureRequest::range(Duration::from_secs(1), Duration::from_secs(3), Vec::new())
        .unwrap_err();
    assert_eq!(error.kind(), FailureKind::Validation);
}

#[test]
fn batch_exhausted_reports_the_count() {
    let error = CaptureError::BatchExhausted { attempted: 5 };
    assert_eq!(error.to_string(), "All 5 frames failed to extract");
    assert_eq!(error.kind().to_string(), "batch-exhausted");
}

#[test]
fn io_errors_are_decode_errors() {
    let error: CaptureError = std::io::Error::other("disk full").into();
    assert_eq!(error.kind(), FailureKind::DecodeError);
    assert!(error.kind().is_retryable());
}

#[test]
fn format_problems_are_recognised() {
    assert!(CaptureError::UnsupportedFormat("no decoder".to_string()).indicates_format_problem());
    assert!(
        CaptureError::Upstream {
            status: Some(400),
            message: "Unsupported codec".to_string(),
            details: None,
        }
        .indicates_format_problem()
    );
    assert!(!CaptureError::BlackFrame { timestamp: Duration::from_secs(1) }.indicates_format_problem());
    assert!(!CaptureError::BatchExhausted { attempted: 3 }.indicates_format_problem());
}
