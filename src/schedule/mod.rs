//! Update scheduling: eligibility, cool-downs and the task queue.

pub mod admission;
pub mod cooldown;
pub mod eligibility;
pub mod queue;

use chrono::Duration;
use thiserror::Error;

use crate::cache::CacheError;
use crate::config::IntervalsConfig;
use crate::models::{DataKind, GameMode};

pub use admission::{admission_status, AdmissionController};
pub use cooldown::cooldown;
pub use queue::{QueueError, TaskQueue};

/// Cool-down windows.
#[derive(Debug, Clone, Copy)]
pub struct Intervals {
    pub matches: Duration,
    pub stats: Duration,
    /// Window in which a non-matches log head is replaced rather than stacked.
    pub log_merge: Duration,
}

impl From<&IntervalsConfig> for Intervals {
    fn from(config: &IntervalsConfig) -> Self {
        Self {
            matches: config.matches(),
            stats: config.stats(),
            log_merge: config.log_merge(),
        }
    }
}

impl Default for Intervals {
    fn default() -> Self {
        Self::from(&IntervalsConfig::default())
    }
}

fn join_messages(errors: &[UpdateError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Why an update request was refused.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("[{0}] not found")]
    NotFound(String),

    #[error("fetch data {0}")]
    TrackerInactive(String),

    #[error("matches [{label}] already parsed")]
    AlreadyParsed { label: String },

    #[error("[{label}] player not enabled")]
    PlayerNotEnabled { label: String },

    #[error("[{label}] {game_mode} not enabled")]
    ModeNotEnabled { label: String, game_mode: GameMode },

    #[error("[{label}] {game_mode} disabled")]
    ModeDisabled { label: String, game_mode: GameMode },

    #[error("[{label}] {game_mode} {data_kind} please wait {seconds} seconds")]
    CoolDown {
        label: String,
        game_mode: GameMode,
        data_kind: DataKind,
        seconds: u64,
    },

    #[error("{game_mode} has no fullmatches")]
    FullmatchesUnsupported { game_mode: GameMode },

    #[error("players not found for group [{0}]")]
    GroupEmpty(String),

    #[error("{label} {game_mode} {data_kind} already running")]
    AlreadyRunning {
        label: String,
        game_mode: GameMode,
        data_kind: DataKind,
    },

    #[error("{label} {game_mode} {data_kind} in queues")]
    InQueues {
        label: String,
        game_mode: GameMode,
        data_kind: DataKind,
    },

    #[error("{}", join_messages(.0))]
    AllModes(Vec<UpdateError>),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl UpdateError {
    /// Target or its members are missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, UpdateError::NotFound(_) | UpdateError::GroupEmpty(_))
    }

    /// Store connectivity or consistency failure rather than a refusal.
    pub fn is_internal(&self) -> bool {
        matches!(self, UpdateError::Queue(_) | UpdateError::Cache(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_error_messages() {
        let err = UpdateError::CoolDown {
            label: "Ghost".into(),
            game_mode: GameMode::MwMp,
            data_kind: DataKind::Matches,
            seconds: 1200,
        };
        assert_eq!(err.to_string(), "[Ghost] mw_mp matches please wait 1200 seconds");

        let all = UpdateError::AllModes(vec![
            UpdateError::ModeDisabled {
                label: "Ghost".into(),
                game_mode: GameMode::CwMp,
            },
            UpdateError::FullmatchesUnsupported {
                game_mode: GameMode::VgMp,
            },
        ]);
        assert_eq!(
            all.to_string(),
            "[Ghost] cw_mp disabled; vg_mp has no fullmatches"
        );
    }

    #[test]
    fn test_update_error_classes() {
        assert!(UpdateError::NotFound("1".into()).is_not_found());
        assert!(UpdateError::GroupEmpty("squad".into()).is_not_found());
        assert!(!UpdateError::TrackerInactive("break".into()).is_not_found());
        assert!(UpdateError::Cache(CacheError::WrongType("k".into())).is_internal());
    }
}
