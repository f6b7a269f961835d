//! Handoff to the analysis service.
//!
//! A [`CaptureRequest`] is what a session submits: one frame, or an ordered
//! set of frames across a range. An [`Analyzer`] turns it into coaching
//! advice. [`HttpAnalyzer`] speaks the JSON protocol of the analysis
//! endpoint:
//!
//! ```text
//! POST {"mode":"single","image":"data:image/jpeg;base64,...","timestamp":4.2}
//! POST {"mode":"range","images":[...],"startTime":3.0,"endTime":7.0}
//!
//! 200  {"advice":["..."],"status":"success"}
//! 4xx/5xx {"error":"...","details":"..."}
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CaptureError;
use crate::frame::CapturedFrame;

/// A validated submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureRequest {
    Single {
        timestamp: Duration,
        frame: CapturedFrame,
    },
    Range {
        start_time: Duration,
        end_time: Duration,
        /// In timestamp order; never empty.
        frames: Vec<CapturedFrame>,
    },
}

impl CaptureRequest {
    pub fn single(timestamp: Duration, frame: CapturedFrame) -> Self {
        CaptureRequest::Single { timestamp, frame }
    }

    /// Build a range submission.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::InvalidRange`] if `start_time > end_time`.
    /// - [`CaptureError::Validation`] if `frames` is empty.
    pub fn range(
        start_time: Duration,
        end_time: Duration,
        frames: Vec<CapturedFrame>,
    ) -> Result<Self, CaptureError> {
        if start_time > end_time {
            return Err(CaptureError::InvalidRange {
                start: start_time,
                end: end_time,
            });
        }
        if frames.is_empty() {
            return Err(CaptureError::Validation(
                "a range submission needs at least one frame".to_string(),
            ));
        }
        Ok(CaptureRequest::Range {
            start_time,
            end_time,
            frames,
        })
    }

    /// `"single"` or `"range"`.
    pub fn mode(&self) -> &'static str {
        match self {
            CaptureRequest::Single { .. } => "single",
            CaptureRequest::Range { .. } => "range",
        }
    }

    pub fn frame_count(&self) -> usize {
        match self {
            CaptureRequest::Single { .. } => 1,
            CaptureRequest::Range { frames, .. } => frames.len(),
        }
    }

    /// The JSON body sent to the analysis endpoint.
    pub fn to_payload(&self) -> AnalysisPayload {
        match self {
            CaptureRequest::Single { timestamp, frame } => AnalysisPayload::Single {
                image: frame.to_data_uri(),
                timestamp: timestamp.as_secs_f64(),
            },
            CaptureRequest::Range {
                start_time,
                end_time,
                frames,
            } => AnalysisPayload::Range {
                images: frames.iter().map(CapturedFrame::to_data_uri).collect(),
                start_time: start_time.as_secs_f64(),
                end_time: end_time.as_secs_f64(),
            },
        }
    }
}

/// Wire form of a [`CaptureRequest`]. Times are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum AnalysisPayload {
    Single {
        image: String,
        timestamp: f64,
    },
    #[serde(rename_all = "camelCase")]
    Range {
        images: Vec<String>,
        start_time: f64,
        end_time: f64,
    },
}

/// A successful analysis.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub advice: Vec<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub analysis_mode: Option<String>,
    #[serde(default)]
    pub frames_analyzed: Option<u32>,
}

impl Analysis {
    pub fn from_advice(advice: Vec<String>) -> Self {
        Self {
            advice,
            status: Some("success".to_string()),
            analysis_mode: None,
            frames_analyzed: None,
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    details: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AnalysisResponse {
    Success(Analysis),
    Failure(ErrorBody),
}

/// Produces coaching advice for captured frames.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, request: &CaptureRequest) -> Result<Analysis, CaptureError>;
}

#[async_trait]
impl<T: Analyzer + ?Sized> Analyzer for Arc<T> {
    async fn analyze(&self, request: &CaptureRequest) -> Result<Analysis, CaptureError> {
        (**self).analyze(request).await
    }
}

/// [`Analyzer`] backed by the HTTP analysis endpoint.
#[derive(Debug, Clone)]
pub struct HttpAnalyzer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAnalyzer {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Analyzer for HttpAnalyzer {
    async fn analyze(&self, request: &CaptureRequest) -> Result<Analysis, CaptureError> {
        log::debug!(
            "Submitting {} frame(s) in {} mode to {}",
            request.frame_count(),
            request.mode(),
            self.endpoint
        );
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request.to_payload())
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        interpret_response(status, &body)
    }
}

fn interpret_response(status: u16, body: &str) -> Result<Analysis, CaptureError> {
    let success = (200..300).contains(&status);
    match serde_json::from_str::<AnalysisResponse>(body) {
        Ok(AnalysisResponse::Success(analysis)) if success => Ok(analysis),
        Ok(AnalysisResponse::Success(_)) => Err(CaptureError::Upstream {
            status: Some(status),
            message: format!("analysis service answered with status {status}"),
            details: None,
        }),
        Ok(AnalysisResponse::Failure(failure)) => Err(CaptureError::Upstream {
            status: Some(status),
            message: failure.error,
            details: failure.details,
        }),
        Err(error) if success => Err(CaptureError::Upstream {
            status: Some(status),
            message: format!("malformed analysis response: {error}"),
            details: None,
        }),
        Err(_) => Err(CaptureError::Upstream {
            status: Some(status),
            message: format!("analysis service answered with status {status}"),
            details: (!body.trim().is_empty()).then(|| body.trim().to_string()),
        }),
    }
}
