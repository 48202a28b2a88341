//! Shared helpers for Continuity Core
//!
//! - Timestamps
//! - Decimal rounding for reported scores
//! - Character-safe truncation for display

use chrono::{DateTime, SecondsFormat, Utc};

/// Timestamp type alias
pub type Timestamp = DateTime<Utc>;

/// Canonical textual form used for stored timestamps.
///
/// Fixed precision and a `Z` suffix keep lexicographic order equal to
/// chronological order, which the archive's `ORDER BY timestamp` relies on.
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Round to `places` decimal places
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// First `max_chars` characters of `text`, never splitting a code point
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.33000000000000007, 3), 0.33);
        assert_eq!(round_to(0.66666, 3), 0.667);
        assert_eq!(round_to(42.25, 1), 42.3);
    }

    #[test]
    fn test_truncate_chars_respects_code_points() {
        let text = "🔥".repeat(5);
        assert_eq!(truncate_chars(&text, 3).chars().count(), 3);
        assert_eq!(truncate_chars("short", 200), "short");
        assert_eq!(truncate_chars("", 10), "");
    }

    #[test]
    fn test_timestamp_format_sorts_chronologically() {
        let early = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let late = early + chrono::Duration::milliseconds(1);
        assert!(format_timestamp(&early) < format_timestamp(&late));
        assert!(format_timestamp(&early).ends_with('Z'));
    }
}
