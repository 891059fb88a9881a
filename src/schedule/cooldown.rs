use chrono::{DateTime, Duration, Utc};

/// Seconds left before `interval` has passed since `last`.
///
/// Returns 0 when there is no previous event or the interval has elapsed.
/// Partial seconds round up, so a positive wait is never reported as 0.
pub fn cooldown(last: Option<DateTime<Utc>>, interval: Duration, now: DateTime<Utc>) -> u64 {
    let Some(last) = last else {
        return 0;
    };
    let remaining = interval - (now - last);
    if remaining <= Duration::zero() {
        return 0;
    }
    let millis = remaining.num_milliseconds();
    ((millis + 999) / 1000) as u64
}
