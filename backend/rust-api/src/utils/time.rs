use chrono::{DateTime, Duration, Utc};

/// Whole seconds from `start` to `now`, zero if the clock went backwards.
pub fn elapsed_seconds(start: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    (now - start).num_seconds().max(0) as u64
}

/// True once strictly more than `limit_seconds` have passed, sub-seconds included.
pub fn exceeds_limit(start: DateTime<Utc>, now: DateTime<Utc>, limit_seconds: u64) -> bool {
    let limit = i64::try_from(limit_seconds)
        .ok()
        .and_then(Duration::try_seconds);
    match limit {
        Some(limit) => now - start > limit,
        None => false,
    }
}
