//! Per-target game status: enablement, match counters and refresh logs.

use std::ops::AddAssign;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DataKind, GameMode};

/// Enablement of one concrete mode for a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeStatus {
    #[default]
    NotEnabled,
    Enabled,
    Disabled,
}

impl ModeStatus {
    pub fn is_enabled(&self) -> bool {
        matches!(self, ModeStatus::Enabled)
    }
}

/// How far a target's history has been backfilled. Lives on the `all` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsedState {
    #[default]
    None,
    Matches,
    Fullmatches,
    AllAndDisabled,
}

/// Match counters kept per mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MatchesCounter {
    pub matches: u64,
    pub fullmatches: u64,
    pub played: u64,
}

impl AddAssign for MatchesCounter {
    fn add_assign(&mut self, rhs: Self) {
        self.matches += rhs.matches;
        self.fullmatches += rhs.fullmatches;
        self.played += rhs.played;
    }
}

/// One refresh event in a mode's log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusLog {
    pub uno: String,
    pub game_mode: GameMode,
    pub source: DataKind,
    pub records: u64,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchesBlock {
    pub stats: MatchesCounter,
    /// Newest first.
    pub logs: Vec<StatusLog>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsBlock {
    /// Newest first.
    pub logs: Vec<StatusLog>,
}

/// State of a single mode entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameState<S> {
    pub status: S,
    pub matches: MatchesBlock,
    pub stats: StatsBlock,
}

impl<S> GameState<S> {
    pub fn logs(&self, kind: DataKind) -> &[StatusLog] {
        if kind == DataKind::Stats {
            &self.stats.logs
        } else {
            &self.matches.logs
        }
    }

    pub fn logs_mut(&mut self, kind: DataKind) -> &mut Vec<StatusLog> {
        if kind == DataKind::Stats {
            &mut self.stats.logs
        } else {
            &mut self.matches.logs
        }
    }

    /// Time of the newest log entry of the given kind.
    pub fn last_log_time(&self, kind: DataKind) -> Option<DateTime<Utc>> {
        self.logs(kind).first().map(|log| log.time)
    }
}

/// Game status for every mode of a target.
///
/// The `all` entry is derived; rebuild it with
/// [`summarize`](crate::calculate::games::summarize) after any mutation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GamesStatus {
    pub all: GameState<ParsedState>,
    pub mw_mp: GameState<ModeStatus>,
    pub mw_wz: GameState<ModeStatus>,
    pub cw_mp: GameState<ModeStatus>,
    pub vg_mp: GameState<ModeStatus>,
}

impl GamesStatus {
    /// Concrete mode entry. `None` for [`GameMode::All`].
    pub fn mode(&self, game_mode: GameMode) -> Option<&GameState<ModeStatus>> {
        match game_mode {
            GameMode::All => None,
            GameMode::MwMp => Some(&self.mw_mp),
            GameMode::MwWz => Some(&self.mw_wz),
            GameMode::CwMp => Some(&self.cw_mp),
            GameMode::VgMp => Some(&self.vg_mp),
        }
    }

    pub fn mode_mut(&mut self, game_mode: GameMode) -> Option<&mut GameState<ModeStatus>> {
        match game_mode {
            GameMode::All => None,
            GameMode::MwMp => Some(&mut self.mw_mp),
            GameMode::MwWz => Some(&mut self.mw_wz),
            GameMode::CwMp => Some(&mut self.cw_mp),
            GameMode::VgMp => Some(&mut self.vg_mp),
        }
    }

    /// Iterate concrete modes with their entries.
    pub fn concrete(&self) -> impl Iterator<Item = (GameMode, &GameState<ModeStatus>)> {
        [
            (GameMode::MwMp, &self.mw_mp),
            (GameMode::MwWz, &self.mw_wz),
            (GameMode::CwMp, &self.cw_mp),
            (GameMode::VgMp, &self.vg_mp),
        ]
        .into_iter()
    }

    pub fn parsed(&self) -> ParsedState {
        self.all.status
    }

    /// Concrete modes currently enabled.
    pub fn enabled_modes(&self) -> Vec<GameMode> {
        self.concrete()
            .filter(|(_, state)| state.status.is_enabled())
            .map(|(gm, _)| gm)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_counter_add_assign() {
        let mut total = MatchesCounter {
            matches: 1,
            fullmatches: 2,
            played: 3,
        };
        total += MatchesCounter {
            matches: 10,
            fullmatches: 20,
            played: 30,
        };
        assert_eq!(
            total,
            MatchesCounter {
                matches: 11,
                fullmatches: 22,
                played: 33
            }
        );
    }

    #[test]
    fn test_mode_accessors() {
        let mut games = GamesStatus::default();
        games.mode_mut(GameMode::CwMp).unwrap().status = ModeStatus::Enabled;
        assert!(games.mode(GameMode::All).is_none());
        assert_eq!(games.enabled_modes(), vec![GameMode::CwMp]);
    }

    #[test]
    fn test_last_log_time_is_head() {
        let now = Utc::now();
        let mut state = GameState::<ModeStatus>::default();
        state.matches.logs = vec![
            StatusLog {
                uno: "1".into(),
                game_mode: GameMode::MwMp,
                source: DataKind::Matches,
                records: 3,
                time: now,
            },
            StatusLog {
                uno: "1".into(),
                game_mode: GameMode::MwMp,
                source: DataKind::Matches,
                records: 1,
                time: now - chrono::Duration::hours(1),
            },
        ];
        assert_eq!(state.last_log_time(DataKind::Matches), Some(now));
        assert_eq!(state.last_log_time(DataKind::Stats), None);
    }

    #[test]
    fn test_games_status_serde_shape() {
        let games = GamesStatus::default();
        let value = serde_json::to_value(&games).unwrap();
        assert_eq!(value["all"]["status"], "none");
        assert_eq!(value["mw_mp"]["status"], "not_enabled");
        assert_eq!(value["mw_mp"]["matches"]["stats"]["played"], 0);
    }
}
