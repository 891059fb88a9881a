//! Game status summaries: derived `all` entry, log recording, group synthesis.

use chrono::{DateTime, Duration, Utc};

use super::StatsError;
use crate::models::{
    DataKind, GameMode, GamesStatus, MatchesCounter, ModeStatus, ParsedState, StatusLog,
};

/// Sort newest first and cap.
fn sort_capped(logs: &mut Vec<StatusLog>, cap: usize) {
    logs.sort_by(|a, b| b.time.cmp(&a.time));
    logs.truncate(cap);
}

/// Rebuild the derived `all` entry and cap every log.
///
/// The `all` counters are the field-wise sum of the concrete modes. Its
/// matches log keeps only entries that recorded something.
pub fn summarize(games: &mut GamesStatus, cap: usize) {
    let mut counter = MatchesCounter::default();
    let mut matches_logs = Vec::new();
    let mut stats_logs = Vec::new();

    for (_, state) in games.concrete() {
        counter += state.matches.stats;
        matches_logs.extend(
            state
                .matches
                .logs
                .iter()
                .filter(|log| log.records > 0)
                .cloned(),
        );
        stats_logs.extend(state.stats.logs.iter().cloned());
    }

    games.all.matches.stats = counter;
    games.all.matches.logs = matches_logs;
    games.all.stats.logs = stats_logs;

    sort_capped(&mut games.all.matches.logs, cap);
    sort_capped(&mut games.all.stats.logs, cap);
    for game_mode in GameMode::CONCRETE {
        if let Some(state) = games.mode_mut(game_mode) {
            sort_capped(&mut state.matches.logs, cap);
            sort_capped(&mut state.stats.logs, cap);
        }
    }
}

/// Record a refresh outcome at the head of a mode's log.
///
/// A recent head entry not sourced from `matches` is replaced rather than
/// stacked. A stats refresh with records also sets the mode's `played`.
#[allow(clippy::too_many_arguments)]
pub fn record_log(
    games: &mut GamesStatus,
    uno: &str,
    game_mode: GameMode,
    data_kind: DataKind,
    records: u64,
    now: DateTime<Utc>,
    merge_window: Duration,
    cap: usize,
) -> Result<(), StatsError> {
    let state = games
        .mode_mut(game_mode)
        .ok_or(StatsError::NotConcrete(game_mode))?;

    if data_kind == DataKind::Stats && records > 0 {
        state.matches.stats.played = records;
    }

    let logs = state.logs_mut(data_kind);
    let replace_head = logs
        .first()
        .is_some_and(|head| head.source != DataKind::Matches && now - head.time < merge_window);
    if replace_head {
        logs.remove(0);
    }
    logs.insert(
        0,
        StatusLog {
            uno: uno.to_string(),
            game_mode,
            source: data_kind,
            records,
            time: now,
        },
    );

    summarize(games, cap);
    Ok(())
}

/// Synthesize a group's game status from its members.
///
/// A concrete mode is enabled for the group when any member has it not
/// disabled.
pub fn group_games<'a>(
    members: impl IntoIterator<Item = &'a GamesStatus>,
    cap: usize,
) -> GamesStatus {
    let mut group = GamesStatus::default();
    group.all.status = ParsedState::Matches;

    for member in members {
        for (game_mode, state) in member.concrete() {
            let Some(target) = group.mode_mut(game_mode) else {
                continue;
            };
            if state.status != ModeStatus::Disabled {
                target.status = ModeStatus::Enabled;
            }
            target.matches.stats += state.matches.stats;
            target.matches.logs.extend(state.matches.logs.iter().cloned());
            target.stats.logs.extend(state.stats.logs.iter().cloned());
        }
    }

    summarize(&mut group, cap);
    group
}
