//! Internal utility functions.
//!
//! Helpers for seek-target clamping, pixel-data copying, and other shared
//! logic that does not belong in any single public module.

use std::time::Duration;

/// Clamp a requested timestamp into `[margin, duration - margin]`.
///
/// Decoders do not guarantee a frame at the exact end of the media, so the
/// upper bound always stays strictly below `duration`. Media shorter than
/// two margins is sampled at its midpoint.
pub fn clamp_seek_target(timestamp: Duration, duration: Duration, margin: Duration) -> Duration {
    if duration <= margin * 2 {
        return duration / 2;
    }
    timestamp.clamp(margin, duration - margin)
}

/// Human-readable byte size using 1024-based units, e.g. `"1.5 MB"`.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let exponent = ((bytes as f64).ln() / 1024_f64.ln()).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024_f64.powi(exponent as i32);
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded} {}", UNITS[exponent])
}

/// Evenly interpolate `count` points across `[start, end]`.
///
/// Both endpoints are included when `count > 1`; a single point lands on the
/// midpoint.
pub fn interpolate(start: Duration, end: Duration, count: usize) -> Vec<Duration> {
    match count {
        0 => Vec::new(),
        1 => vec![start + (end - start) / 2],
        _ => {
            let span = (end - start).as_secs_f64();
            let last = (count - 1) as f64;
            (0..count)
                .map(|index| {
                    if index == count - 1 {
                        end
                    } else {
                        start + Duration::from_secs_f64(span * index as f64 / last)
                    }
                })
                .collect()
        }
    }
}

/// Copy pixel data from an FFmpeg RGBA frame into a tightly-packed buffer.
///
/// FFmpeg frames frequently carry per-row padding (stride > width × 4).
/// This strips that padding so the result can be passed directly to
/// [`image::RgbaImage::from_raw`].
#[cfg(feature = "ffmpeg")]
pub(crate) fn frame_to_rgba_buffer(
    video_frame: &ffmpeg_next::frame::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let row_length = (width as usize) * 4;
    let data = video_frame.data(0);

    if stride == row_length {
        data[..row_length * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(row_length * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + row_length]);
        }
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARGIN: Duration = Duration::from_millis(100);

    #[test]
    fn clamp_keeps_targets_inside_margins() {
        let duration = Duration::from_secs(10);
        for millis in (0..10_000).step_by(50) {
            let target = clamp_seek_target(Duration::from_millis(millis), duration, MARGIN);
            assert!(target >= MARGIN, "{target:?} below margin");
            assert!(target <= duration - MARGIN, "{target:?} above upper bound");
        }
    }

    #[test]
    fn clamp_pulls_end_of_media_back() {
        let duration = Duration::from_secs(4);
        assert_eq!(
            clamp_seek_target(duration, duration, MARGIN),
            Duration::from_millis(3900)
        );
        assert_eq!(clamp_seek_target(Duration::ZERO, duration, MARGIN), MARGIN);
        assert_eq!(
            clamp_seek_target(Duration::from_secs(2), duration, MARGIN),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn clamp_very_short_media_uses_midpoint() {
        let duration = Duration::from_millis(150);
        let target = clamp_seek_target(Duration::from_secs(1), duration, MARGIN);
        assert_eq!(target, Duration::from_millis(75));
        assert!(target < duration);
    }

    #[test]
    fn human_size_units() {
        assert_eq!(human_size(0), "0 Bytes");
        assert_eq!(human_size(512), "512 Bytes");
        assert_eq!(human_size(1536), "1.5 KB");
        assert_eq!(human_size(2 * 1024 * 1024), "2 MB");
        assert_eq!(human_size(5 * 1024 * 1024 * 1024), "5 GB");
    }

    #[test]
    fn interpolate_includes_both_ends() {
        let points = interpolate(Duration::from_secs(2), Duration::from_secs(10), 5);
        let seconds: Vec<f64> = points.iter().map(Duration::as_secs_f64).collect();
        assert_eq!(seconds, vec![2.0, 4.0, 6.0, 8.0, 10.0]);
    }

    #[test]
    fn interpolate_single_point_is_midpoint() {
        let points = interpolate(Duration::from_secs(2), Duration::from_secs(10), 1);
        assert_eq!(points, vec![Duration::from_secs(6)]);
        assert!(interpolate(Duration::ZERO, Duration::from_secs(1), 0).is_empty());
    }
}
