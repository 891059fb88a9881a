//! Statistics calculation engine.
//!
//! Folds stat trees and game status blocks into derived views:
//! - Per-leaf merge policies and ratio recomputation
//! - Upstream document normalization
//! - Group and all-titles summaries with best holders
//! - Game status log summaries

pub mod games;
pub mod group;
pub mod merge;
pub mod normalize;

use thiserror::Error;

use crate::models::{GameMode, Title};

pub use games::{group_games, record_log, summarize};
pub use group::{group_players, summary_all_titles};
pub use merge::{correct_ratio, correct_ratios, merge_leaf, policy_for, MergePolicy};
pub use normalize::normalize_upstream;

/// Errors from stat calculation.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("Invalid {title} stats document: {reason}")]
    InvalidDocument { title: Title, reason: String },

    #[error("Game mode {0} has no log of its own")]
    NotConcrete(GameMode),
}

/// Divide, returning 0 when the denominator is 0.
pub fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Ratio rounded to 2 decimals, 0 when the denominator is 0.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    round2(safe_div(numerator, denominator))
}

/// Round to 2 decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_ratio() {
        assert_eq!(safe_ratio(30.0, 10.0), 3.0);
        assert_eq!(safe_ratio(10.0, 3.0), 3.33);
        assert_eq!(safe_ratio(5.0, 0.0), 0.0);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.005_1), 1.01);
        assert_eq!(round2(2.0), 2.0);
        assert_eq!(round2(-0.126), -0.13);
    }
}
