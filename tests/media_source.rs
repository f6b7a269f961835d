//! MediaSource and TemporaryUri tests.

use std::time::Duration;

use swimframe::{CaptureError, MediaSource, TemporaryUri, human_size};

fn mp4_header() -> Vec<u8> {
    let mut bytes = vec![0x00, 0x00, 0x00, 0x18];
    bytes.extend_from_slice(b"ftypisom");
    bytes.extend_from_slice(&[0x00, 0x00, 0x02, 0x00]);
    bytes.extend_from_slice(b"isomiso2avc1mp41");
    bytes
}

// ── Reading from disk ──────────────────────────────────────────────

#[tokio::test]
async fn from_path_detects_the_content_type() {
    let directory = tempfile::tempdir().unwrap();
    let path = directory.path().join("upload.bin");
    std::fs::write(&path, mp4_header()).unwrap();

    let source = MediaSource::from_path(&path).await.unwrap();

    assert_eq!(source.name(), "upload.bin");
    assert_eq!(source.mime(), Some("video/mp4"));
    assert_eq!(source.size(), mp4_header().len() as u64);
    assert!(source.validate_media_type().is_ok());
}

#[tokio::test]
async fn from_path_rejects_text() {
    let directory = tempfile::tempdir().unwrap();
    let path = directory.path().join("notes.txt");
    std::fs::write(&path, "four lengths of freestyle").unwrap();

    let source = MediaSource::from_path(&path).await.unwrap();
    assert_eq!(source.mime(), None);

    match source.validate_media_type().unwrap_err() {
        CaptureError::InvalidMediaType { name, mime } => {
            assert_eq!(name, "notes.txt");
            assert_eq!(mime, "unknown");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn from_path_reports_missing_files() {
    let error = MediaSource::from_path("tests/fixtures/does_not_exist.mp4")
        .await
        .unwrap_err();
    assert!(matches!(error, CaptureError::IoError(_)));
}

// ── Descriptive accessors ──────────────────────────────────────────

#[test]
fn extension_is_lower_cased() {
    let source = MediaSource::new("Relay.Final.MP4", None, vec![0_u8; 8]);
    assert_eq!(source.extension().as_deref(), Some("mp4"));
    assert_eq!(MediaSource::new("README", None, vec![0_u8; 1]).extension(), None);
}

#[test]
fn sizes_are_human_readable() {
    let source = MediaSource::new("lap.mp4", None, vec![0_u8; 3 * 1024 * 1024 / 2]);
    assert_eq!(source.human_size(), "1.5 MB");
    assert_eq!(human_size(1), "1 Bytes");
    assert_eq!(human_size(1024), "1 KB");
}

#[test]
fn declared_mime_overrides_the_extension() {
    let audio = MediaSource::new("lap.mp4", Some("audio/mpeg".to_string()), vec![0_u8; 8]);
    assert!(audio.validate_media_type().is_err());

    let video = MediaSource::new("lap.txt", Some("VIDEO/QuickTime".to_string()), vec![0_u8; 8]);
    assert!(video.validate_media_type().is_ok());
}

// ── Temporary URIs ─────────────────────────────────────────────────

#[tokio::test]
async fn temporary_uri_holds_the_source_bytes() {
    let source = MediaSource::new("lap.webm", None, vec![7_u8; 128]);
    let uri = TemporaryUri::create(&source, Duration::from_secs(30)).unwrap();

    assert!(uri.path().exists());
    assert_eq!(uri.path().extension().unwrap(), "webm");
    assert_eq!(std::fs::read(uri.path()).unwrap(), vec![7_u8; 128]);
    assert!(!uri.is_released());
}

#[tokio::test]
async fn release_is_idempotent_and_drop_cleans_up() {
    let source = MediaSource::new("lap.mp4", None, vec![1_u8; 16]);

    let released = TemporaryUri::create(&source, Duration::from_secs(30)).unwrap();
    let path = released.path().to_path_buf();
    released.release();
    released.release();
    assert!(released.is_released());
    assert!(!path.exists());

    let dropped = TemporaryUri::create(&source, Duration::from_secs(30)).unwrap();
    let path = dropped.path().to_path_buf();
    drop(dropped);
    assert!(!path.exists());
}

#[tokio::test(start_paused = true)]
async fn fallback_timer_releases_abandoned_files() {
    let source = MediaSource::new("lap.mp4", None, vec![1_u8; 16]);
    let uri = TemporaryUri::create(&source, Duration::from_secs(2)).unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(uri.path().exists());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(uri.is_released());
    assert!(!uri.path().exists());
}

#[test]
fn temporary_uri_works_outside_a_runtime() {
    let source = MediaSource::new("lap.mp4", None, vec![1_u8; 16]);
    let uri = TemporaryUri::create(&source, Duration::from_millis(1)).unwrap();
    let path = uri.path().to_path_buf();
    assert!(path.exists());
    drop(uri);
    assert!(!path.exists());
}
