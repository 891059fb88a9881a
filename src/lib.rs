//! # Stat Tracker
//!
//! Gameplay statistics tracking for players and groups.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (game modes, game status, stat trees, tasks)
//! - **cache**: Typed cache keys, the cache store trait and its Redis/in-memory backends
//! - **schedule**: Update eligibility, cool-downs, admission and the task queue
//! - **calculate**: Stat merging, ratio correction, normalization and log summaries
//! - **analyze**: Co-occurrence ("most play with") analysis over the match store
//! - **storage**: JSONL audit streams
//! - **api**: REST API endpoints
//! - **config**: Configuration loading and validation

pub mod analyze;
pub mod api;
pub mod cache;
pub mod calculate;
pub mod config;
pub mod models;
pub mod schedule;
pub mod storage;

pub use models::*;

use std::time::Duration;

/// Parse a human-friendly duration string (e.g., "6h", "30m", "90s", "2d", "1w").
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix('w') {
        (n, 7 * 86400)
    } else if let Some(n) = s.strip_suffix('d') {
        (n, 86400)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 3600)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1)
    } else {
        // Default to seconds
        (s, 1)
    };

    let num: u64 = num_str.parse().ok()?;
    Some(Duration::from_secs(num.checked_mul(multiplier)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_hours() {
        assert_eq!(parse_duration("6h"), Some(Duration::from_secs(21600)));
    }

    #[test]
    fn test_parse_duration_minutes() {
        assert_eq!(parse_duration("30m"), Some(Duration::from_secs(1800)));
    }

    #[test]
    fn test_parse_duration_seconds() {
        assert_eq!(parse_duration("90s"), Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_parse_duration_days_and_weeks() {
        assert_eq!(parse_duration("2d"), Some(Duration::from_secs(172800)));
        assert_eq!(parse_duration("1w"), Some(Duration::from_secs(604800)));
    }

    #[test]
    fn test_parse_duration_default_seconds() {
        assert_eq!(parse_duration("120"), Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert_eq!(parse_duration("abc"), None);
        assert_eq!(parse_duration("-5m"), None);
    }

    #[test]
    fn test_parse_duration_empty() {
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn test_parse_duration_overflow() {
        assert_eq!(parse_duration("18446744073709551615w"), None);
    }
}
