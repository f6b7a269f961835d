//! Presentation helpers for analysis results.

/// Advice substituted when the analysis service returns too few items.
///
/// Disabled unless set on [`SessionOptions`](crate::SessionOptions).
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct FallbackAdvice {
    /// Responses with fewer items than this are replaced.
    pub min_items: usize,
    pub items: Vec<String>,
}

impl Default for FallbackAdvice {
    fn default() -> Self {
        Self {
            min_items: 3,
            items: [
                "Keep your body horizontal with your head slightly down.",
                "Take long strokes and keep a high elbow through the catch.",
                "Kick from the hips with a supple, powerful motion without bending the knees too much.",
                "Breathe to the side quickly and rhythmically without lifting your head.",
                "Stay relaxed and focus on swimming efficiently.",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl FallbackAdvice {
    pub fn new(items: Vec<String>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_min_items(mut self, min_items: usize) -> Self {
        self.min_items = min_items;
        self
    }

    /// Return `advice` unchanged, or the fallback items when `advice` has
    /// fewer than `min_items` entries.
    pub fn apply(&self, advice: Vec<String>) -> Vec<String> {
        if advice.len() >= self.min_items {
            return advice;
        }
        log::info!(
            "Analysis returned {} advice item(s); using fallback advice",
            advice.len()
        );
        self.items.clone()
    }
}

/// Shown when a video cannot be decoded.
pub const FORMAT_GUIDE: &str = "\
Supported formats:
  - MP4 (H.264), recommended
  - WebM (VP8 / VP9)
  - MOV (H.264)

Not supported:
  - MPEG-4 Visual (older cameras)
  - DivX / Xvid
  - WMV

To convert, re-encode the video as MP4 with the H.264 codec, for example:
  ffmpeg -i input.avi -c:v libx264 -c:a aac output.mp4";

/// Render advice as a numbered list, one item per line.
///
/// Returns an empty string for an empty list.
pub fn format_numbered(advice: &[String]) -> String {
    advice
        .iter()
        .enumerate()
        .map(|(index, item)| format!("{}. {}", index + 1, item))
        .collect::<Vec<_>>()
        .join("\n")
}
