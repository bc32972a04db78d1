//! Human-readable data age.

/// Seconds between `then_millis` and `now_millis`, clamped at zero.
pub fn age_seconds(now_millis: i64, then_millis: i64) -> i64 {
    (now_millis.saturating_sub(then_millis) / 1000).max(0)
}

/// Format how long ago `then_millis` was.
///
/// Under 5s is "just now", then seconds, minutes and hours, rounded down.
/// Future times (clock skew) count as "just now". `None` is "N/A".
pub fn format_staleness(now_millis: i64, then_millis: Option<i64>) -> String {
    let Some(then) = then_millis else {
        return "N/A".to_string();
    };

    let seconds = age_seconds(now_millis, then);
    if seconds < 5 {
        "just now".to_string()
    } else if seconds < 60 {
        format!("{}s ago", seconds)
    } else if seconds < 3600 {
        format!("{}m ago", seconds / 60)
    } else {
        format!("{}h ago", seconds / 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_760_000_000_000;

    #[test]
    fn test_staleness_buckets() {
        assert_eq!(format_staleness(NOW, Some(NOW - 3_000)), "just now");
        assert_eq!(format_staleness(NOW, Some(NOW - 45_000)), "45s ago");
        assert_eq!(format_staleness(NOW, Some(NOW - 125_000)), "2m ago");
        assert_eq!(format_staleness(NOW, Some(NOW - 7_300_000)), "2h ago");
    }

    #[test]
    fn test_staleness_boundaries() {
        assert_eq!(format_staleness(NOW, Some(NOW - 4_999)), "just now");
        assert_eq!(format_staleness(NOW, Some(NOW - 5_000)), "5s ago");
        assert_eq!(format_staleness(NOW, Some(NOW - 59_999)), "59s ago");
        assert_eq!(format_staleness(NOW, Some(NOW - 60_000)), "1m ago");
        assert_eq!(format_staleness(NOW, Some(NOW - 3_600_000)), "1h ago");
    }

    #[test]
    fn test_future_and_missing() {
        assert_eq!(format_staleness(NOW, Some(NOW + 30_000)), "just now");
        assert_eq!(format_staleness(NOW, None), "N/A");
    }
}
