//! Event timestamp parsing.

use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;
use tracing::debug;

/// Numbers below this are epoch seconds, numbers at or above it epoch milliseconds.
///
/// 1e11 seconds is beyond year 5000; 1e11 milliseconds is March 1973.
const SECONDS_CUTOFF: f64 = 100_000_000_000.0;

/// Parse an event timestamp into epoch milliseconds.
///
/// Accepts epoch seconds, epoch milliseconds (numbers or numeric strings) and
/// ISO-8601 strings. Missing or unparsable values fall back to `now_ms`.
pub fn parse_timestamp(value: Option<&Value>, now_ms: i64) -> i64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64().and_then(from_epoch),
        Some(Value::String(s)) => parse_str(s),
        _ => None,
    };

    parsed.unwrap_or_else(|| {
        if value.is_some() {
            debug!(value = ?value, "Unparsable timestamp, using current time");
        }
        now_ms
    })
}

fn from_epoch(n: f64) -> Option<i64> {
    if !n.is_finite() || n < 0.0 {
        return None;
    }
    let millis = if n < SECONDS_CUTOFF { n * 1000.0 } else { n };
    Some(millis.round() as i64)
}

fn parse_str(raw: &str) -> Option<i64> {
    let s = raw.trim();
    if let Ok(n) = s.parse::<f64>() {
        return from_epoch(n);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    // ISO-8601 without an offset is read as UTC.
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: i64 = 1_700_000_000_000;

    #[test]
    fn test_epoch_seconds_and_millis() {
        assert_eq!(parse_timestamp(Some(&json!(1_700_000_000)), 0), NOW);
        assert_eq!(parse_timestamp(Some(&json!(1_700_000_000_000i64)), 0), NOW);
        assert_eq!(parse_timestamp(Some(&json!(1_700_000_000.5)), 0), NOW + 500);
        assert_eq!(parse_timestamp(Some(&json!("1700000000")), 0), NOW);
    }

    #[test]
    fn test_iso_8601() {
        assert_eq!(
            parse_timestamp(Some(&json!("2023-11-14T22:13:20Z")), 0),
            NOW
        );
        assert_eq!(
            parse_timestamp(Some(&json!("2023-11-14T23:13:20+01:00")), 0),
            NOW
        );
        assert_eq!(
            parse_timestamp(Some(&json!("2023-11-14T22:13:20.250")), 0),
            NOW + 250
        );
    }

    #[test]
    fn test_fallback_to_now() {
        assert_eq!(parse_timestamp(None, NOW), NOW);
        assert_eq!(parse_timestamp(Some(&json!("yesterday")), NOW), NOW);
        assert_eq!(parse_timestamp(Some(&json!(-5)), NOW), NOW);
        assert_eq!(parse_timestamp(Some(&json!({"at": 1})), NOW), NOW);
    }
}
