//! Time grammar, zone lookup and rendering.

use chrono::{Offset, Timelike, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// A parsed time argument: `now`, `9pm`, or `21:30`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeInput {
    Now,
    At { hours: u32, minutes: u32 },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeInputError {
    #[error("invalid time format")]
    Format,
    #[error("more than 24 hours in the day")]
    MoreThan24Hours,
}

/// Parse `now`, `<1-12><am|pm>` or `<H>:<MM>`.
pub fn parse_time(input: &str) -> Result<TimeInput, TimeInputError> {
    let input = input.to_lowercase();
    if input == "now" {
        return Ok(TimeInput::Now);
    }
    let (hours, minutes) = if let Some(hour_str) = input
        .strip_suffix("am")
        .or_else(|| input.strip_suffix("pm"))
    {
        // One digit, or two with a leading 1.
        let valid = !hour_str.is_empty()
            && hour_str.len() <= 2
            && hour_str.chars().all(|c| c.is_ascii_digit())
            && (hour_str.len() == 1 || hour_str.starts_with('1'));
        if !valid {
            return Err(TimeInputError::Format);
        }
        let hour: u32 = hour_str.parse().map_err(|_| TimeInputError::Format)?;
        (twelve_to_24(hour, input.ends_with("pm")), 0)
    } else if let Some((hour_str, min_str)) = input.split_once(':') {
        let valid = (1..=2).contains(&hour_str.len())
            && min_str.len() == 2
            && hour_str.chars().all(|c| c.is_ascii_digit())
            && min_str.chars().all(|c| c.is_ascii_digit());
        if !valid {
            return Err(TimeInputError::Format);
        }
        (
            hour_str.parse().map_err(|_| TimeInputError::Format)?,
            min_str.parse().map_err(|_| TimeInputError::Format)?,
        )
    } else {
        return Err(TimeInputError::Format);
    };
    if hours >= 24 {
        return Err(TimeInputError::MoreThan24Hours);
    }
    Ok(TimeInput::At { hours, minutes })
}

fn twelve_to_24(hours: u32, is_pm: bool) -> u32 {
    match (hours, is_pm) {
        (12, true) => 12,
        (12, false) => 0,
        (h, true) => h + 12,
        (h, false) => h,
    }
}

/// Find the zone whose last `/`-segment matches `part`, case-insensitively.
pub fn find_timezone(part: &str) -> Option<Tz> {
    let part = part.to_lowercase();
    chrono_tz::TZ_VARIANTS
        .iter()
        .find(|tz| zone_display(tz.name()).to_lowercase() == part)
        .copied()
}

/// Display name of a zone: the part after the last slash.
pub fn zone_display(zone_name: &str) -> &str {
    zone_name.rsplit('/').next().unwrap_or(zone_name)
}

/// The zone's current UTC offset in minutes.
pub fn zone_offset_minutes(tz: Tz) -> i32 {
    Utc::now()
        .with_timezone(&tz)
        .offset()
        .fix()
        .local_minus_utc()
        / 60
}

/// Current wall-clock hour and minute in a zone.
pub fn zone_time(tz: Tz) -> (u32, u32) {
    let now = Utc::now().with_timezone(&tz);
    (now.hour(), now.minute())
}

/// Render both clock styles, e.g. `**9:30 PM** (21:30)`. The minutes are
/// dropped from the 12-hour form on the whole hour.
pub fn format_hours_minutes(hours: u32, minutes: u32) -> String {
    let minute_part = format!(":{minutes:02}");
    let twelve = {
        let suffix = if hours < 12 { "AM" } else { "PM" };
        let display = match hours {
            0 => 12,
            h if h > 12 => h - 12,
            h => h,
        };
        let mins = if minutes > 0 { minute_part.as_str() } else { "" };
        format!("{display}{mins} {suffix}")
    };
    format!("**{twelve}** ({hours}{minute_part})")
}

/// Signed offset difference in minutes, positive when `dst` is ahead.
pub fn zone_delta_minutes(src: Tz, dst: Tz) -> i32 {
    zone_offset_minutes(dst) - zone_offset_minutes(src)
}
