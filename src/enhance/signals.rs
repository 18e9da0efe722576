//! Contextual signals for species enhancement: relative size, habitat and
//! time of day.

use crate::constants::{daylight, habitat, size_thresholds};
use crate::records::BoundingBox;
use chrono::{DateTime, NaiveDateTime, Timelike};
use image::RgbImage;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Bucket of bounding-box area relative to the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeCategory {
    /// At least 15% of the frame.
    Large,
    /// At least 5%.
    Medium,
    /// At least 1%.
    Small,
    /// Below 1%.
    Tiny,
}

/// Habitat inferred from frame colour statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HabitatCategory {
    /// Green and shaded.
    Forest,
    /// Green and bright.
    Meadow,
    /// Some vegetation.
    Mixed,
    /// No usable colour signal (night IR frames, snow, black frames).
    Unknown,
}

/// Activity period of a capture, or of a species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalCategory {
    /// 06:00 - 18:00.
    Diurnal,
    /// 22:00 - 04:00.
    Nocturnal,
    /// Dawn and dusk hours.
    Crepuscular,
    /// Capture time could not be parsed.
    Unknown,
}

macro_rules! lowercase_display {
    ($ty:ty { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $text)),+
                }
            }
        }
    };
}

lowercase_display!(SizeCategory { Large => "large", Medium => "medium", Small => "small", Tiny => "tiny" });
lowercase_display!(HabitatCategory { Forest => "forest", Meadow => "meadow", Mixed => "mixed", Unknown => "unknown" });
lowercase_display!(TemporalCategory {
    Diurnal => "diurnal",
    Nocturnal => "nocturnal",
    Crepuscular => "crepuscular",
    Unknown => "unknown",
});

/// Ratio of box area to frame area; `None` for an empty frame.
#[allow(clippy::cast_precision_loss)]
pub fn area_ratio(bbox: &BoundingBox, width: u32, height: u32) -> Option<f64> {
    let frame = u64::from(width) * u64::from(height);
    (frame > 0).then(|| bbox.area() as f64 / frame as f64)
}

/// Size bucket of a box within a `width` x `height` frame.
///
/// Thresholds are compared in integer arithmetic so boundaries are exact.
/// Returns `None` for an empty frame.
pub fn size_category(bbox: &BoundingBox, width: u32, height: u32) -> Option<SizeCategory> {
    let frame = u64::from(width) * u64::from(height);
    if frame == 0 {
        return None;
    }
    let scaled = bbox.area() * 100;
    let category = if scaled >= frame * size_thresholds::LARGE_PERCENT {
        SizeCategory::Large
    } else if scaled >= frame * size_thresholds::MEDIUM_PERCENT {
        SizeCategory::Medium
    } else if scaled >= frame * size_thresholds::SMALL_PERCENT {
        SizeCategory::Small
    } else {
        SizeCategory::Tiny
    };
    Some(category)
}

/// Infer habitat from the mean colour of the frame.
#[allow(clippy::cast_precision_loss)]
pub fn infer_habitat(image: &RgbImage) -> HabitatCategory {
    let (width, height) = image.dimensions();
    let stride = habitat::SAMPLE_STRIDE.max(1);
    let (mut r, mut g, mut b, mut count) = (0.0_f64, 0.0_f64, 0.0_f64, 0_u64);

    for y in (0..height).step_by(stride as usize) {
        for x in (0..width).step_by(stride as usize) {
            let p = image.get_pixel(x, y);
            r += f64::from(p[0]);
            g += f64::from(p[1]);
            b += f64::from(p[2]);
            count += 1;
        }
    }

    let total = r + g + b;
    if count == 0 || total <= 0.0 {
        return HabitatCategory::Unknown;
    }

    let green_share = g / total;
    let brightness = total / (3.0 * 255.0 * count as f64);

    if green_share >= habitat::GREEN_DOMINANT {
        if brightness < habitat::OPEN_BRIGHTNESS {
            HabitatCategory::Forest
        } else {
            HabitatCategory::Meadow
        }
    } else if green_share >= habitat::GREEN_PRESENT {
        HabitatCategory::Mixed
    } else {
        HabitatCategory::Unknown
    }
}

// `..._YYMMDD_HHMM_...`
#[allow(clippy::expect_used)]
static DATE_TIME_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[_\-\s])\d{6}[_\-](\d{2})(\d{2})(?:[_\-\s.]|$)").expect("valid regex")
});

// A bare `HHMM` token between separators.
#[allow(clippy::expect_used)]
static TIME_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[_\-\s])(\d{2})(\d{2})(?:[_\-\s.]|$)").expect("valid regex"));

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y:%m:%d %H:%M:%S",
];

fn valid_hour_minute(hour: &str, minute: &str) -> Option<u32> {
    let hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.parse().ok()?;
    (hour < 24 && minute < 60).then_some(hour)
}

/// Extract the hour of day from an ISO-8601 timestamp or a filename-style
/// string with an embedded `HHMM` token.
pub fn parse_hour(timestamp: &str) -> Option<u32> {
    let trimmed = timestamp.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.hour());
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt.hour());
        }
    }

    if let Some(hour) = DATE_TIME_TOKEN
        .captures(trimmed)
        .and_then(|c| valid_hour_minute(&c[1], &c[2]))
    {
        return Some(hour);
    }

    TIME_TOKEN
        .captures_iter(trimmed)
        .find_map(|c| valid_hour_minute(&c[1], &c[2]))
}

/// Activity period for an hour of day.
pub fn temporal_category_for_hour(hour: u32) -> TemporalCategory {
    if (daylight::DAY_START..daylight::DAY_END).contains(&hour) {
        TemporalCategory::Diurnal
    } else if hour >= daylight::NIGHT_START || hour < daylight::NIGHT_END {
        TemporalCategory::Nocturnal
    } else {
        TemporalCategory::Crepuscular
    }
}

/// Activity period of a capture timestamp string.
pub fn temporal_category(timestamp: Option<&str>) -> TemporalCategory {
    timestamp
        .and_then(parse_hour)
        .map_or(TemporalCategory::Unknown, temporal_category_for_hour)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use image::Rgb;

    fn bbox(width: i32, height: i32) -> BoundingBox {
        BoundingBox {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    #[test]
    fn test_size_category_boundaries_are_exact() {
        // 1000 x 1000 frame
        assert_eq!(size_category(&bbox(1000, 150), 1000, 1000), Some(SizeCategory::Large));
        assert_eq!(size_category(&bbox(14_999, 10), 1000, 1000), Some(SizeCategory::Medium));
        assert_eq!(size_category(&bbox(1000, 50), 1000, 1000), Some(SizeCategory::Medium));
        assert_eq!(size_category(&bbox(1000, 10), 1000, 1000), Some(SizeCategory::Small));
        assert_eq!(size_category(&bbox(999, 10), 1000, 1000), Some(SizeCategory::Tiny));
    }

    #[test]
    fn test_size_category_is_monotonic() {
        let mut last = SizeCategory::Tiny;
        let rank = |c: SizeCategory| match c {
            SizeCategory::Tiny => 0,
            SizeCategory::Small => 1,
            SizeCategory::Medium => 2,
            SizeCategory::Large => 3,
        };
        for side in (0..=1000).step_by(10) {
            let category = size_category(&bbox(side, side), 1000, 1000).unwrap();
            assert!(rank(category) >= rank(last));
            last = category;
        }
        assert_eq!(last, SizeCategory::Large);
    }

    #[test]
    fn test_size_category_empty_frame() {
        assert_eq!(size_category(&bbox(10, 10), 0, 100), None);
        assert_eq!(area_ratio(&bbox(10, 10), 100, 0), None);
    }

    #[test]
    fn test_area_ratio() {
        let ratio = area_ratio(&bbox(200, 250), 1000, 500).unwrap();
        assert!((ratio - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_infer_habitat() {
        let forest = RgbImage::from_pixel(64, 64, Rgb([40, 90, 30]));
        assert_eq!(infer_habitat(&forest), HabitatCategory::Forest);

        let meadow = RgbImage::from_pixel(64, 64, Rgb([150, 210, 90]));
        assert_eq!(infer_habitat(&meadow), HabitatCategory::Meadow);

        let mixed = RgbImage::from_pixel(64, 64, Rgb([110, 130, 120]));
        assert_eq!(infer_habitat(&mixed), HabitatCategory::Mixed);

        let night_ir = RgbImage::from_pixel(64, 64, Rgb([120, 120, 120]));
        assert_eq!(infer_habitat(&night_ir), HabitatCategory::Unknown);

        let black = RgbImage::new(16, 16);
        assert_eq!(infer_habitat(&black), HabitatCategory::Unknown);
    }

    #[test]
    fn test_parse_hour_formats() {
        assert_eq!(parse_hour("2025-06-10T07:27:00"), Some(7));
        assert_eq!(parse_hour("2025-06-10T23:05:00+02:00"), Some(23));
        assert_eq!(parse_hour("2025-06-10 13:00:00"), Some(13));
        assert_eq!(parse_hour("Aufnahme_250610_0727_BYWP9"), Some(7));
        assert_eq!(parse_hour("IMG_2315.jpg"), Some(23));
        assert_eq!(parse_hour("no time here"), None);
        assert_eq!(parse_hour("IMG_9999"), None);
        assert_eq!(parse_hour(""), None);
    }

    #[test]
    fn test_temporal_buckets() {
        assert_eq!(temporal_category_for_hour(6), TemporalCategory::Diurnal);
        assert_eq!(temporal_category_for_hour(17), TemporalCategory::Diurnal);
        assert_eq!(temporal_category_for_hour(18), TemporalCategory::Crepuscular);
        assert_eq!(temporal_category_for_hour(22), TemporalCategory::Nocturnal);
        assert_eq!(temporal_category_for_hour(3), TemporalCategory::Nocturnal);
        assert_eq!(temporal_category_for_hour(4), TemporalCategory::Crepuscular);
        assert_eq!(temporal_category(None), TemporalCategory::Unknown);
        assert_eq!(temporal_category(Some("garbage")), TemporalCategory::Unknown);
    }

    #[test]
    fn test_display_is_lowercase() {
        assert_eq!(SizeCategory::Large.to_string(), "large");
        assert_eq!(HabitatCategory::Meadow.to_string(), "meadow");
        assert_eq!(TemporalCategory::Crepuscular.to_string(), "crepuscular");
    }
}
