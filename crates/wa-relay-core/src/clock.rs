// wa-relay: Local Timestamps
// Sheet timestamps are written as `dd/mm/yyyy, HH:MM:SS` (24 h) in the
// configured IANA zone.

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;

const SHEET_FORMAT: &str = "%d/%m/%Y, %H:%M:%S";

pub fn format_local(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format(SHEET_FORMAT).to_string()
}

/// Parse a webhook unix-seconds timestamp ("1700000000").
pub fn parse_unix(raw: &str) -> Option<DateTime<Utc>> {
    let secs: i64 = raw.trim().parse().ok()?;
    Utc.timestamp_opt(secs, 0).single()
}

/// Event time when present and valid, otherwise `now`.
pub fn event_time_or(raw: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    raw.and_then(parse_unix).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bogota() {
        // 2024-03-01T15:04:05Z is 10:04:05 in Bogotá (UTC-5, no DST).
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 15, 4, 5).unwrap();
        assert_eq!(format_local(at, chrono_tz::America::Bogota), "01/03/2024, 10:04:05");
    }

    #[test]
    fn test_parse_unix() {
        let at = parse_unix("1700000000").unwrap();
        assert_eq!(at.timestamp(), 1_700_000_000);
        assert!(parse_unix("soon").is_none());
        assert!(parse_unix("").is_none());
    }

    #[test]
    fn test_event_time_falls_back() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(event_time_or(None, now), now);
        assert_eq!(event_time_or(Some("x"), now), now);
        assert_eq!(event_time_or(Some("0"), now).timestamp(), 0);
    }
}
