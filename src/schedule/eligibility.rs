//! Per-target eligibility checks run before a task is queued.

use chrono::{DateTime, Duration, Utc};

use super::{cooldown, Intervals, UpdateError};
use crate::cache::GroupRecord;
use crate::models::{DataKind, GameMode, GamesStatus, ModeStatus, ParsedState};

fn last_log(games: &GamesStatus, game_mode: GameMode, kind: DataKind) -> Option<DateTime<Utc>> {
    match games.mode(game_mode) {
        Some(state) => state.last_log_time(kind),
        None => games.all.last_log_time(kind),
    }
}

fn check_cooldown(
    label: &str,
    games: &GamesStatus,
    game_mode: GameMode,
    data_kind: DataKind,
    interval: Duration,
    now: DateTime<Utc>,
) -> Result<(), UpdateError> {
    let seconds = cooldown(last_log(games, game_mode, data_kind), interval, now);
    if seconds > 0 {
        return Err(UpdateError::CoolDown {
            label: label.to_string(),
            game_mode,
            data_kind,
            seconds,
        });
    }
    Ok(())
}

fn check_fullmatches(game_mode: GameMode) -> Result<(), UpdateError> {
    if game_mode.is_all() || game_mode.supports_fullmatches() {
        Ok(())
    } else {
        Err(UpdateError::FullmatchesUnsupported { game_mode })
    }
}

fn check_player_mode(
    label: &str,
    games: &GamesStatus,
    game_mode: GameMode,
    data_kind: DataKind,
    intervals: &Intervals,
    now: DateTime<Utc>,
) -> Result<(), UpdateError> {
    if data_kind == DataKind::Matches && games.parsed() == ParsedState::None {
        return Err(UpdateError::PlayerNotEnabled {
            label: label.to_string(),
        });
    }

    let status = games
        .mode(game_mode)
        .map(|state| state.status)
        .unwrap_or_default();
    match status {
        ModeStatus::NotEnabled => {
            return Err(UpdateError::ModeNotEnabled {
                label: label.to_string(),
                game_mode,
            })
        }
        ModeStatus::Disabled => {
            return Err(UpdateError::ModeDisabled {
                label: label.to_string(),
                game_mode,
            })
        }
        ModeStatus::Enabled => {}
    }

    match data_kind {
        DataKind::Matches => {
            check_cooldown(label, games, game_mode, data_kind, intervals.matches, now)
        }
        DataKind::Stats => check_cooldown(label, games, game_mode, data_kind, intervals.stats, now),
        _ => Ok(()),
    }
}

/// Check whether a player may refresh `data_kind` for `game_mode`.
///
/// For [`GameMode::All`] matches and stats checks run on every enabled mode
/// and pass if any mode passes.
pub fn check_player(
    label: &str,
    games: &GamesStatus,
    game_mode: GameMode,
    data_kind: DataKind,
    intervals: &Intervals,
    now: DateTime<Utc>,
) -> Result<(), UpdateError> {
    if data_kind == DataKind::MatchesHistory && games.parsed() != ParsedState::None {
        return Err(UpdateError::AlreadyParsed {
            label: label.to_string(),
        });
    }
    if data_kind == DataKind::FullmatchesPars {
        return check_fullmatches(game_mode);
    }
    if !game_mode.is_all() {
        return check_player_mode(label, games, game_mode, data_kind, intervals, now);
    }
    // A history backfill for every mode is gated by the parsed state alone.
    if data_kind == DataKind::MatchesHistory {
        return Ok(());
    }

    let modes = games.enabled_modes();
    if modes.is_empty() {
        return Err(UpdateError::ModeNotEnabled {
            label: label.to_string(),
            game_mode,
        });
    }
    let mut errors = Vec::new();
    for mode in modes {
        match check_player_mode(label, games, mode, data_kind, intervals, now) {
            Ok(()) => return Ok(()),
            Err(e) => errors.push(e),
        }
    }
    Err(UpdateError::AllModes(errors))
}

/// Check whether a group may refresh `data_kind` for `game_mode`.
pub fn check_group(
    group: &GroupRecord,
    game_mode: GameMode,
    data_kind: DataKind,
    intervals: &Intervals,
    now: DateTime<Utc>,
) -> Result<(), UpdateError> {
    if group.players.is_empty() {
        return Err(UpdateError::GroupEmpty(group.uno.clone()));
    }
    match data_kind {
        DataKind::FullmatchesPars => check_fullmatches(game_mode),
        DataKind::Matches => check_cooldown(
            &group.uno,
            &group.games,
            game_mode,
            data_kind,
            intervals.matches,
            now,
        ),
        DataKind::Stats => check_cooldown(
            &group.uno,
            &group.games,
            game_mode,
            data_kind,
            intervals.stats,
            now,
        ),
        DataKind::MatchesHistory | DataKind::All => Ok(()),
    }
}
