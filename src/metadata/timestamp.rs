//! Capture-time resolution from path tokens, EXIF and file times.

use crate::constants::scan::{MAX_FUTURE_DAYS, MAX_PAST_YEARS, TWO_DIGIT_YEAR_BASE};
use chrono::{DateTime, Local, Months, NaiveDate, NaiveDateTime, TimeDelta};
use regex::Regex;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::LazyLock;

/// `PREFIX_YYMMDD_HHMM_CAMERAREF`
#[allow(clippy::expect_used)]
static FILENAME_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^.+_(\d{2})(\d{2})(\d{2})_(\d{2})(\d{2})_([A-Za-z0-9]+)$").expect("valid regex")
});

#[allow(clippy::expect_used)]
static DIGIT_GROUPS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));

/// Date-time layouts tried on directory and file name tokens, in order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d_%H-%M-%S",
    "%Y-%m-%d %H-%M-%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d_%H-%M",
    "%Y-%m-%d_%H%M",
    "%Y%m%d_%H%M%S",
    "%Y%m%d_%H%M",
    "%Y%m%d%H%M%S",
    "%d.%m.%Y %H:%M",
    "%d.%m.%Y_%H-%M",
];

/// Date-only layouts; the time is midnight.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y_%m_%d", "%Y%m%d", "%d.%m.%Y", "%d-%m-%Y"];

/// Fields of a `PREFIX_YYMMDD_HHMM_CAMERAREF` file stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameToken {
    /// Camera reference after the last underscore.
    pub camera: String,
    /// Capture time; `None` when the digits are not a valid date and time.
    pub timestamp: Option<NaiveDateTime>,
}

/// Parse a `PREFIX_YYMMDD_HHMM_CAMERAREF` file stem.
///
/// The camera reference is kept even when the date digits are out of range.
pub fn parse_filename_token(stem: &str) -> Option<FilenameToken> {
    let caps = FILENAME_TOKEN.captures(stem)?;
    let num = |i: usize| caps[i].parse::<u32>().ok();

    let year = TWO_DIGIT_YEAR_BASE + i32::try_from(num(1)?).ok()?;
    let timestamp = NaiveDate::from_ymd_opt(year, num(2)?, num(3)?)
        .and_then(|date| date.and_hms_opt(num(4)?, num(5)?, 0));
    Some(FilenameToken {
        camera: caps[6].to_string(),
        timestamp,
    })
}

/// Parse a directory or file name token holding a date and optional time.
///
/// Known layouts are tried first, then a lenient parser that reads digit
/// groups regardless of punctuation.
pub fn parse_datetime_token(token: &str) -> Option<NaiveDateTime> {
    let token = token.trim();
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(token, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(token, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    parse_digit_groups(token)
}

fn split_digits(group: &str, widths: &[usize]) -> Option<Vec<u32>> {
    let mut out = Vec::with_capacity(widths.len());
    let mut start = 0;
    for width in widths {
        out.push(group.get(start..start + width)?.parse().ok()?);
        start += width;
    }
    Some(out)
}

/// Lenient parser: `2025.06.10 07h27`, `20250610-0727`, `10_06_2025` ...
fn parse_digit_groups(token: &str) -> Option<NaiveDateTime> {
    let groups: Vec<&str> = DIGIT_GROUPS.find_iter(token).map(|m| m.as_str()).collect();
    let first = *groups.first()?;

    let mut fields: Vec<u32> = Vec::new();
    for (i, group) in groups.iter().enumerate() {
        let expanded = match (i, group.len()) {
            (0, 14) => split_digits(group, &[4, 2, 2, 2, 2, 2])?,
            (0, 12) => split_digits(group, &[4, 2, 2, 2, 2])?,
            (0, 8) => split_digits(group, &[4, 2, 2])?,
            (_, 6) if fields.len() == 3 => split_digits(group, &[2, 2, 2])?,
            (_, 4) if i > 0 && fields.len() == 3 => split_digits(group, &[2, 2])?,
            (_, 1..=4) => vec![group.parse().ok()?],
            _ => return None,
        };
        fields.extend(expanded);
    }
    if fields.len() < 3 {
        return None;
    }

    let (year, month, day) = if first.len() == 4 || first.len() >= 8 {
        (fields[0], fields[1], fields[2])
    } else if groups.get(2).is_some_and(|g| g.len() == 4) {
        (fields[2], fields[1], fields[0])
    } else {
        return None;
    };

    let time = |i: usize| fields.get(3 + i).copied().unwrap_or(0);
    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)?.and_hms_opt(time(0), time(1), time(2))
}

/// Capture time from EXIF `DateTimeOriginal`, else `DateTime`.
pub fn exif_timestamp(path: &Path) -> Option<NaiveDateTime> {
    let mut reader = BufReader::new(File::open(path).ok()?);
    let exif = exif::Reader::new().read_from_container(&mut reader).ok()?;

    [exif::Tag::DateTimeOriginal, exif::Tag::DateTime]
        .into_iter()
        .find_map(|tag| {
            let field = exif.get_field(tag, exif::In::PRIMARY)?;
            let exif::Value::Ascii(ref values) = field.value else {
                return None;
            };
            let text = std::str::from_utf8(values.first()?).ok()?;
            NaiveDateTime::parse_from_str(text.trim(), "%Y:%m:%d %H:%M:%S").ok()
        })
}

/// File modification time in local time.
pub fn modified_timestamp(path: &Path) -> Option<NaiveDateTime> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Local>::from(modified).naive_local())
}

/// Whether `timestamp` lies within the accepted window around `now`.
///
/// At most one day ahead and at most ten years back.
pub fn is_plausible(timestamp: NaiveDateTime, now: NaiveDateTime) -> bool {
    let latest = now + TimeDelta::days(MAX_FUTURE_DAYS);
    let earliest = now.checked_sub_months(Months::new(MAX_PAST_YEARS * 12));
    timestamp <= latest && earliest.is_none_or(|e| timestamp >= e)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_filename_token() {
        let token = parse_filename_token("Aufnahme_250612_0001_BYWP9").unwrap();
        assert_eq!(token.timestamp, Some(dt(2025, 6, 12, 0, 1, 0)));
        assert_eq!(token.camera, "BYWP9");

        let token = parse_filename_token("Aufnahme_250610_0727_BYWP9").unwrap();
        assert_eq!(token.timestamp, Some(dt(2025, 6, 10, 7, 27, 0)));
        assert_eq!(token.camera, "BYWP9");
    }

    #[test]
    fn test_filename_token_rejects_other_stems() {
        assert!(parse_filename_token("IMG_0001").is_none());
        assert!(parse_filename_token("250612_0001_BYWP9").is_none());
        assert!(parse_filename_token("Aufnahme_250612_0001_BY-WP9").is_none());
    }

    #[test]
    fn test_filename_token_keeps_camera_with_bad_date() {
        let token = parse_filename_token("Aufnahme_251312_0001_BYWP9").unwrap();
        assert_eq!(token.camera, "BYWP9");
        assert!(token.timestamp.is_none());

        let token = parse_filename_token("Aufnahme_250612_2561_CAM2").unwrap();
        assert_eq!(token.camera, "CAM2");
        assert!(token.timestamp.is_none());
    }

    #[test]
    fn test_datetime_token_formats() {
        assert_eq!(
            parse_datetime_token("2025-06-10_07-27-00"),
            Some(dt(2025, 6, 10, 7, 27, 0))
        );
        assert_eq!(
            parse_datetime_token("20250610_072700"),
            Some(dt(2025, 6, 10, 7, 27, 0))
        );
        assert_eq!(parse_datetime_token("2025-06-10"), Some(dt(2025, 6, 10, 0, 0, 0)));
        assert_eq!(
            parse_datetime_token("10.06.2025 07:27"),
            Some(dt(2025, 6, 10, 7, 27, 0))
        );
    }

    #[test]
    fn test_datetime_token_lenient() {
        assert_eq!(
            parse_datetime_token("2025.06.10 07h27"),
            Some(dt(2025, 6, 10, 7, 27, 0))
        );
        assert_eq!(
            parse_datetime_token("capture 20250610-0727"),
            Some(dt(2025, 6, 10, 7, 27, 0))
        );
        assert_eq!(
            parse_datetime_token("10_06_2025"),
            Some(dt(2025, 6, 10, 0, 0, 0))
        );
        assert_eq!(parse_datetime_token("BYWP9"), None);
        assert_eq!(parse_datetime_token("IMG_0001"), None);
        assert_eq!(parse_datetime_token("2025-13-40"), None);
    }

    #[test]
    fn test_plausibility_window() {
        let now = dt(2026, 3, 1, 12, 0, 0);
        assert!(is_plausible(now, now));
        assert!(is_plausible(now + TimeDelta::hours(2), now));
        assert!(is_plausible(dt(2016, 3, 2, 0, 0, 0), now));
        assert!(!is_plausible(now + TimeDelta::days(2), now));
        assert!(!is_plausible(dt(2015, 3, 1, 12, 0, 0), now));
    }

    #[test]
    fn test_exif_missing_is_none() {
        assert!(exif_timestamp(Path::new("/nonexistent.jpg")).is_none());
    }
}
