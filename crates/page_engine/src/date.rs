//! Date recognition for explicit `date` values and dates embedded in paths.
use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use regex::Regex;

use crate::value::Timestamp;

static YAML_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d{4})-(\d{1,2})-(\d{1,2})(?:(?:[Tt]|[ \t]+)(\d{1,2}):(\d{2}):(\d{2})(?:\.(\d+))?(?:[ \t]*(Z|[-+]\d{1,2}(?::?\d{2})?))?)?$",
    )
    .unwrap()
});

static EMBEDDED_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:^|\D)(\d{4})[-_/.](\d{2})[-_/.](\d{2})(?:[T _-](\d{2})[:.-]?(\d{2})(?:[:.-]?(\d{2}))?)?",
    )
    .unwrap()
});

/// Parses a YAML 1.1 timestamp scalar. Values without a zone are UTC.
pub fn parse_yaml_timestamp(input: &str) -> Option<Timestamp> {
    let caps = YAML_TIMESTAMP.captures(input.trim())?;
    let date = ymd(&caps[1], &caps[2], &caps[3])?;
    let time = match caps.get(4) {
        Some(hour) => {
            let nanos = caps.get(7).map_or(0, |frac| fraction_nanos(frac.as_str()));
            NaiveTime::from_hms_nano_opt(
                hour.as_str().parse().ok()?,
                caps[5].parse().ok()?,
                caps[6].parse().ok()?,
                nanos,
            )?
        }
        None => NaiveTime::MIN,
    };
    let offset = match caps.get(8) {
        Some(zone) => parse_offset(zone.as_str())?,
        None => FixedOffset::east_opt(0)?,
    };
    offset
        .from_local_datetime(&NaiveDateTime::new(date, time))
        .single()
}

/// Resolves an explicit date string. Timestamps carrying a zone keep it;
/// everything else goes through the embedded-date heuristic in local time,
/// so `"2013-02-01"` is local midnight.
pub fn parse_date_str(input: &str) -> Option<Timestamp> {
    let input = input.trim();
    DateTime::parse_from_rfc3339(input)
        .ok()
        .or_else(|| DateTime::parse_from_rfc2822(input).ok())
        .or_else(|| has_zone(input).then(|| parse_yaml_timestamp(input)).flatten())
        .or_else(|| date_from_str(input))
        .or_else(|| parse_yaml_timestamp(input))
}

fn has_zone(input: &str) -> bool {
    YAML_TIMESTAMP
        .captures(input)
        .is_some_and(|caps| caps.get(8).is_some())
}

/// Finds a `YYYY-MM-DD` date (optionally followed by a time) anywhere in the
/// input, interpreted in local time. The last valid occurrence wins so the
/// file name beats its parent directories.
pub fn date_from_str(input: &str) -> Option<Timestamp> {
    EMBEDDED_DATE
        .captures_iter(input)
        .filter_map(|caps| {
            let end = caps.get(0)?.end();
            if input[end..].starts_with(|c: char| c.is_ascii_digit()) {
                return None;
            }
            let date = ymd(&caps[1], &caps[2], &caps[3])?;
            let time = match caps.get(4) {
                Some(hour) => NaiveTime::from_hms_opt(
                    hour.as_str().parse().ok()?,
                    caps[5].parse().ok()?,
                    caps.get(6).map_or(Some(0), |s| s.as_str().parse().ok())?,
                )?,
                None => NaiveTime::MIN,
            };
            Local
                .from_local_datetime(&NaiveDateTime::new(date, time))
                .earliest()
                .map(|dt| dt.fixed_offset())
        })
        .last()
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

fn fraction_nanos(digits: &str) -> u32 {
    let mut padded: String = digits.chars().take(9).collect();
    while padded.len() < 9 {
        padded.push('0');
    }
    padded.parse().unwrap_or(0)
}

fn parse_offset(zone: &str) -> Option<FixedOffset> {
    if zone == "Z" {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = zone.split_at(1);
    let digits: String = rest.chars().filter(char::is_ascii_digit).collect();
    let (hours, minutes) = if rest.contains(':') {
        let mut parts = rest.split(':');
        (parts.next()?.parse::<i32>().ok()?, parts.next()?.parse::<i32>().ok()?)
    } else if digits.len() > 2 {
        let (h, m) = digits.split_at(digits.len() - 2);
        (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?)
    } else {
        (digits.parse::<i32>().ok()?, 0)
    };
    let seconds = hours * 3600 + minutes * 60;
    if sign == "-" {
        FixedOffset::west_opt(seconds)
    } else {
        FixedOffset::east_opt(seconds)
    }
}
