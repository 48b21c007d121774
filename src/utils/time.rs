use chrono::{DateTime, Duration, Utc};

/// Whether more than `timeout_ms` elapsed between `since` and `now`.
pub fn has_elapsed(since: DateTime<Utc>, now: DateTime<Utc>, timeout_ms: u64) -> bool {
    now.signed_duration_since(since) > Duration::milliseconds(timeout_ms as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_elapsed() {
        let now = Utc::now();
        assert!(has_elapsed(now - Duration::seconds(301), now, 300_000));
        assert!(!has_elapsed(now - Duration::seconds(10), now, 300_000));
    }
}
