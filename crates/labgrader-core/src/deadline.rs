//! Deadline cells.
//!
//! Deadlines are typed by hand into the group sheet as `dd.mm` or
//! `dd.mm.yyyy` and mean "end of that day" in the course timezone.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};

/// Errors produced while interpreting a deadline cell.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeadlineError {
    #[error("unknown timezone {0:?}")]
    UnknownTimezone(String),

    #[error("unparseable deadline {0:?}")]
    Malformed(String),
}

/// Parse a timezone spec into a fixed offset.
///
/// Accepts `UTC`, `GMT`, `Z`, `MSK`, `UTC+3`, `GMT-05:30`, `+03:00`, `+0300`.
pub fn parse_utc_offset(spec: &str) -> Result<FixedOffset, DeadlineError> {
    let unknown = || DeadlineError::UnknownTimezone(spec.to_string());
    let upper = spec.trim().to_ascii_uppercase();

    let rest = match upper.as_str() {
        "UTC" | "GMT" | "Z" => return FixedOffset::east_opt(0).ok_or_else(unknown),
        "MSK" => return FixedOffset::east_opt(3 * 3600).ok_or_else(unknown),
        s => s
            .strip_prefix("UTC")
            .or_else(|| s.strip_prefix("GMT"))
            .unwrap_or(s),
    };

    let (sign, digits) = match rest.chars().next() {
        Some('+') => (1, &rest[1..]),
        Some('-') => (-1, &rest[1..]),
        _ => return Err(unknown()),
    };

    let (hours, minutes) = match digits.split_once(':') {
        Some((h, m)) => (h, m),
        None if digits.len() == 4 && digits.is_ascii() => digits.split_at(2),
        None => (digits, "0"),
    };
    let hours: i32 = hours.parse().map_err(|_| unknown())?;
    let minutes: i32 = minutes.parse().map_err(|_| unknown())?;
    if hours > 14 || minutes >= 60 {
        return Err(unknown());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(unknown)
}

/// Interpret a deadline cell as the last second of that day in `timezone`.
///
/// `dd.mm` takes `current_year`; `dd.mm.yy` is read as 20yy; `/` works as a
/// separator too, and ISO `yyyy-mm-dd` is accepted. An empty cell means the
/// lab has no deadline.
pub fn parse_deadline(
    raw: &str,
    timezone: &str,
    current_year: i32,
) -> Result<Option<DateTime<FixedOffset>>, DeadlineError> {
    let text = raw.trim();
    if text.is_empty() {
        return Ok(None);
    }
    let malformed = || DeadlineError::Malformed(raw.to_string());
    let offset = parse_utc_offset(timezone)?;

    let parts: Vec<&str> = if text.contains('-') {
        let iso: Vec<&str> = text.split('-').collect();
        if iso.len() != 3 {
            return Err(malformed());
        }
        vec![iso[2], iso[1], iso[0]]
    } else {
        text.split(|c: char| c == '.' || c == '/').collect()
    };

    let (day, month, year) = match parts.as_slice() {
        [d, m] => (*d, *m, current_year),
        [d, m, y] => {
            let y: i32 = y.trim().parse().map_err(|_| malformed())?;
            let year = if y < 100 { 2000 + y } else { y };
            (*d, *m, year)
        }
        _ => return Err(malformed()),
    };
    let day: u32 = day.trim().parse().map_err(|_| malformed())?;
    let month: u32 = month.trim().parse().map_err(|_| malformed())?;

    let naive = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .ok_or_else(malformed)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(Some)
        .ok_or_else(malformed)
}
