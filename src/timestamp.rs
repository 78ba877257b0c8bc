use chrono::{Local, LocalResult, NaiveDateTime, TimeZone, Timelike, Utc};

use crate::domain::ArchiveInstant;
use crate::error::CaptureError;

const INPUT_FORMAT: &str = "%m/%d/%Y %H:%M";

/// Parses a show start given in the system's local zone.
pub fn normalize(date: &str, time: &str) -> Result<ArchiveInstant, CaptureError> {
    normalize_in(date, time, &Local)
}

/// Parses `MM/DD/YYYY` + `HH:MM` in `zone` and converts the result to UTC.
///
/// The minute must sit on the 5 minute catalog grid. A local time skipped by a DST
/// transition is rejected; a repeated one resolves to its earlier occurrence.
pub fn normalize_in<Tz: TimeZone>(
    date: &str,
    time: &str,
    zone: &Tz,
) -> Result<ArchiveInstant, CaptureError> {
    let input = format!("{} {}", date.trim(), time.trim());
    let naive = NaiveDateTime::parse_from_str(&input, INPUT_FORMAT)
        .map_err(|err| CaptureError::InvalidTimestamp(format!("{input}: {err}")))?;

    if naive.minute() % 5 != 0 {
        return Err(CaptureError::InvalidAlignment(time.trim().to_string()));
    }

    let local = match zone.from_local_datetime(&naive) {
        LocalResult::Single(value) => value,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            return Err(CaptureError::InvalidTimestamp(format!(
                "{input} does not exist in the local time zone"
            )));
        }
    };

    Ok(ArchiveInstant::from_wall_clock(local.with_timezone(&Utc)))
}
