//! Timestamp helpers for events and run directories.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

/// Format of the per-run artifact directory name.
pub const RUN_DIR_FORMAT: &str = "%m_%d_%Y_%H_%M_%S";

/// Errors that can occur during timestamp parsing.
#[derive(Debug, Error)]
pub enum TimestampError {
    /// The timestamp string is empty.
    #[error("Empty timestamp string")]
    EmptyString,

    /// The timestamp value is invalid.
    #[error("Invalid timestamp: {0}")]
    InvalidFormat(String),
}

/// Returns the current UTC time as an ISO 8601 formatted string.
///
/// # Examples
///
/// ```
/// use trainflow::utils::iso_timestamp;
///
/// let ts = iso_timestamp();
/// assert!(ts.contains('T'));
/// assert!(ts.ends_with("+00:00"));
/// ```
#[must_use]
pub fn iso_timestamp() -> String {
    format_iso8601(&Utc::now())
}

/// Formats a timestamp as ISO 8601 string.
#[must_use]
pub fn format_iso8601(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Formats the local wall-clock time as a run directory name.
///
/// ```
/// use chrono::{Local, TimeZone};
/// use trainflow::utils::run_dir_name;
///
/// let dt = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
/// assert_eq!(run_dir_name(&dt), "03_09_2024_14_05_07");
/// ```
#[must_use]
pub fn run_dir_name(dt: &DateTime<Local>) -> String {
    dt.format(RUN_DIR_FORMAT).to_string()
}

/// Parses a run directory name back into a local timestamp.
pub fn parse_run_dir_name(name: &str) -> Result<DateTime<Local>, TimestampError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(TimestampError::EmptyString);
    }

    let naive = NaiveDateTime::parse_from_str(trimmed, RUN_DIR_FORMAT)
        .map_err(|_| TimestampError::InvalidFormat(trimmed.to_string()))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| TimestampError::InvalidFormat(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_iso_timestamp_format() {
        let ts = iso_timestamp();
        assert!(ts.contains('T'));
        assert!(ts.ends_with("+00:00"));
    }

    #[test]
    fn test_run_dir_name_round_trip() {
        let dt = Local.with_ymd_and_hms(2023, 11, 28, 9, 41, 3).unwrap();
        let name = run_dir_name(&dt);
        assert_eq!(name, "11_28_2023_09_41_03");

        let parsed = parse_run_dir_name(&name).unwrap();
        assert_eq!(parsed.year(), 2023);
        assert_eq!(parsed.month(), 11);
        assert_eq!(parsed.minute(), 41);
    }

    #[test]
    fn test_parse_run_dir_name_rejects_garbage() {
        assert!(matches!(
            parse_run_dir_name(""),
            Err(TimestampError::EmptyString)
        ));
        assert!(matches!(
            parse_run_dir_name("latest"),
            Err(TimestampError::InvalidFormat(_))
        ));
    }
}
