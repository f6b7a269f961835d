//! HTTP analyzer tests against a one-shot local server.

use std::time::Duration;

use serde_json::Value;
use swimframe::{Analyzer, CaptureError, CaptureRequest, CapturedFrame, FailureKind, HttpAnalyzer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

fn frame(seconds: f64) -> CapturedFrame {
    CapturedFrame {
        requested: Duration::from_secs_f64(seconds),
        timestamp: Duration::from_secs_f64(seconds),
        width: 2,
        height: 2,
        jpeg: vec![1, 2, 3],
    }
}

/// Accept one connection, answer with `status` and `body`, and hand back
/// the request body that was received.
async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let request = read_body(&mut stream).await;
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        let _ = stream.shutdown().await;
        request
    });

    (format!("http://{address}/api/analyze"), server)
}

async fn read_body(stream: &mut TcpStream) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 4096];
    loop {
        let read = stream.read(&mut chunk).await.unwrap();
        if read == 0 {
            return String::new();
        }
        buffer.extend_from_slice(&chunk[..read]);

        let Some(header_end) = buffer.windows(4).position(|window| window == b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&buffer[..header_end]).to_ascii_lowercase();
        let length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        let body_start = header_end + 4;
        if buffer.len() >= body_start + length {
            return String::from_utf8_lossy(&buffer[body_start..body_start + length]).into_owned();
        }
    }
}

// ── Successful analysis ────────────────────────────────────────────

#[tokio::test]
async fn single_capture_round_trip() {
    let (endpoint, server) = serve_once(
        "200 OK",
        r#"{"advice":["Keep your head down","Kick from the hips"],"status":"success","analysisMode":"single"}"#,
    )
    .await;
    let analyzer = HttpAnalyzer::new(endpoint);

    let request = CaptureRequest::single(Duration::from_millis(4200), frame(4.2));
    let analysis = analyzer.analyze(&request).await.unwrap();

    assert_eq!(analysis.advice, vec!["Keep your head down", "Kick from the hips"]);
    assert_eq!(analysis.status.as_deref(), Some("success"));
    assert_eq!(analysis.analysis_mode.as_deref(), Some("single"));

    let sent: Value = serde_json::from_str(&server.await.unwrap()).unwrap();
    assert_eq!(sent["mode"], "single");
    assert_eq!(sent["image"], "data:image/jpeg;base64,AQID");
    assert!((sent["timestamp"].as_f64().unwrap() - 4.2).abs() < 1e-9);
}

#[tokio::test]
async fn range_capture_sends_ordered_images() {
    let (endpoint, server) = serve_once(
        "200 OK",
        r#"{"advice":["a","b","c"],"status":"success","analysisMode":"range","framesAnalyzed":3}"#,
    )
    .await;
    let analyzer = HttpAnalyzer::new(endpoint);

    let request = CaptureRequest::range(
        Duration::from_secs(3),
        Duration::from_secs(7),
        vec![frame(3.0), frame(5.0), frame(7.0)],
    )
    .unwrap();
    let analysis = analyzer.analyze(&request).await.unwrap();
    assert_eq!(analysis.frames_analyzed, Some(3));

    let sent: Value = serde_json::from_str(&server.await.unwrap()).unwrap();
    assert_eq!(sent["mode"], "range");
    assert_eq!(sent["startTime"], 3.0);
    assert_eq!(sent["endTime"], 7.0);
    assert_eq!(sent["images"].as_array().unwrap().len(), 3);
    assert!(sent.get("image").is_none());
}

// ── Failures ───────────────────────────────────────────────────────

#[tokio::test]
async fn error_body_is_reported_as_upstream() {
    let (endpoint, _server) = serve_once(
        "429 Too Many Requests",
        r#"{"error":"Rate limit exceeded","details":"Try again in a minute"}"#,
    )
    .await;
    let analyzer = HttpAnalyzer::new(endpoint);

    let request = CaptureRequest::single(Duration::from_secs(1), frame(1.0));
    let error = analyzer.analyze(&request).await.unwrap_err();

    match error {
        CaptureError::Upstream {
            status,
            message,
            details,
        } => {
            assert_eq!(status, Some(429));
            assert_eq!(message, "Rate limit exceeded");
            assert_eq!(details.as_deref(), Some("Try again in a minute"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn plain_text_failure_keeps_the_body() {
    let (endpoint, _server) = serve_once("500 Internal Server Error", "upstream exploded").await;
    let analyzer = HttpAnalyzer::new(endpoint);

    let request = CaptureRequest::single(Duration::from_secs(1), frame(1.0));
    let error = analyzer.analyze(&request).await.unwrap_err();

    assert_eq!(error.kind(), FailureKind::Upstream);
    match error {
        CaptureError::Upstream { status, details, .. } => {
            assert_eq!(status, Some(500));
            assert_eq!(details.as_deref(), Some("upstream exploded"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn success_without_advice_is_malformed() {
    let (endpoint, _server) = serve_once("200 OK", r#"{"status":"success"}"#).await;
    let analyzer = HttpAnalyzer::new(endpoint);

    let request = CaptureRequest::single(Duration::from_secs(1), frame(1.0));
    let error = analyzer.analyze(&request).await.unwrap_err();

    assert_eq!(error.kind(), FailureKind::Upstream);
    assert!(error.to_string().contains("malformed"), "{error}");
}

#[tokio::test]
async fn unreachable_service_is_upstream() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let analyzer = HttpAnalyzer::new(format!("http://{address}/api/analyze"));
    let request = CaptureRequest::single(Duration::from_secs(1), frame(1.0));
    let error = analyzer.analyze(&request).await.unwrap_err();

    assert!(matches!(error, CaptureError::HttpError(_)));
    assert_eq!(error.kind(), FailureKind::Upstream);
}
