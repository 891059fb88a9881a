//! Admission of refresh requests into the task queue.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::eligibility::{check_group, check_player};
use super::{Intervals, QueueError, TaskQueue, UpdateError};
use crate::cache::{push_activity, ActivityEntry, TargetRepository, TrackerStatus};
use crate::calculate::record_log;
use crate::config::LimitsConfig;
use crate::models::{
    task_name, AdmissionStatus, DataKind, GameMode, GamesStatus, TargetKind, Task, TaskStatus,
};

/// Decide where a task named `name` would land in `queue`.
///
/// `queue` is head first; the head is the task the worker is on.
pub fn admission_status(queue: &[Task], name: &str) -> AdmissionStatus {
    let Some(head) = queue.first() else {
        return AdmissionStatus::Started;
    };
    if head.name == name && head.status == TaskStatus::Running {
        AdmissionStatus::AlreadyRunning
    } else if queue.iter().any(|task| task.name == name) {
        AdmissionStatus::InQueues
    } else {
        AdmissionStatus::Added
    }
}

/// Eligible target resolved from the cache, ready to be queued.
struct Candidate {
    label: String,
    payload: BTreeMap<String, Value>,
}

fn games_snapshot(games: &GamesStatus) -> Value {
    let modes: BTreeMap<String, Value> = games
        .concrete()
        .map(|(mode, state)| (mode.to_string(), json!(state.status)))
        .collect();
    json!({ "parsed": games.parsed(), "modes": modes })
}

/// Runs eligibility checks and single-flight admission for refresh requests.
///
/// Reading the queue and pushing to it are two cache round trips. Two
/// concurrent requests for the same task can both be admitted; the worker
/// drops the duplicate.
#[derive(Clone)]
pub struct AdmissionController {
    repo: TargetRepository,
    queue: TaskQueue,
    intervals: Intervals,
    activity_limit: usize,
    logs_cap: usize,
}

impl AdmissionController {
    pub fn new(
        repo: TargetRepository,
        queue: TaskQueue,
        intervals: Intervals,
        activity_limit: usize,
    ) -> Self {
        Self {
            repo,
            queue,
            intervals,
            activity_limit,
            logs_cap: LimitsConfig::default().logs_games_limit,
        }
    }

    /// Cap applied to game status logs when a finished task is recorded.
    pub fn with_logs_cap(mut self, logs_cap: usize) -> Self {
        self.logs_cap = logs_cap;
        self
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn repo(&self) -> &TargetRepository {
        &self.repo
    }

    pub async fn request_update(
        &self,
        uno: &str,
        game_mode: GameMode,
        data_kind: DataKind,
    ) -> Result<String, UpdateError> {
        self.request_update_at(uno, game_mode, data_kind, Utc::now())
            .await
    }

    /// Check and queue a refresh of `data_kind` for `uno`.
    ///
    /// Returns `"<label> | <game_mode> | <data_kind> | <status>"`.
    /// [`DataKind::All`] queues stats then matches and joins both outcomes;
    /// it fails only when neither is admitted.
    pub async fn request_update_at(
        &self,
        uno: &str,
        game_mode: GameMode,
        data_kind: DataKind,
        now: DateTime<Utc>,
    ) -> Result<String, UpdateError> {
        if data_kind != DataKind::All {
            return self.request_one(uno, game_mode, data_kind, now).await;
        }

        let mut messages = Vec::new();
        let mut errors = Vec::new();
        for kind in [DataKind::Stats, DataKind::Matches] {
            match self.request_one(uno, game_mode, kind, now).await {
                Ok(message) => messages.push(message),
                Err(e) if e.is_internal() => return Err(e),
                Err(e) => {
                    messages.push(e.to_string());
                    errors.push(e);
                }
            }
        }
        if errors.len() == messages.len() {
            return Err(UpdateError::AllModes(errors));
        }
        Ok(messages.join("; "))
    }

    /// Worker side: complete the head task. A successful refresh of a
    /// concrete mode is recorded at the head of the target's log, merging
    /// with a recent non-matches head.
    pub async fn finish_task(
        &self,
        ok: bool,
        records: u64,
        now: DateTime<Utc>,
    ) -> Result<Task, QueueError> {
        let task = self.queue.finish(ok, now).await?;
        if !ok || task.game_mode.is_all() {
            return Ok(task);
        }

        let Some(mut games) = self.repo.games(&task.target).await? else {
            warn!(task = %task.name, "Finished task target is not cached");
            return Ok(task);
        };
        if let Err(e) = record_log(
            &mut games,
            &task.target,
            task.game_mode,
            task.data_kind,
            records,
            now,
            self.intervals.log_merge,
            self.logs_cap,
        ) {
            warn!(task = %task.name, error = %e, "Refresh not recorded");
            return Ok(task);
        }
        self.repo.set_games(&task.target, &games).await?;
        debug!(task = %task.name, records, "Refresh recorded");
        Ok(task)
    }

    async fn candidate(
        &self,
        uno: &str,
        game_mode: GameMode,
        data_kind: DataKind,
        now: DateTime<Utc>,
    ) -> Result<Candidate, UpdateError> {
        match TargetKind::of(uno) {
            TargetKind::Player => {
                let player = self
                    .repo
                    .player(uno)
                    .await?
                    .ok_or_else(|| UpdateError::NotFound(uno.to_string()))?;
                let label = player.label().to_string();
                check_player(&label, &player.games, game_mode, data_kind, &self.intervals, now)?;

                let mut payload = BTreeMap::new();
                payload.insert("kind".to_string(), json!(TargetKind::Player));
                payload.insert("username".to_string(), json!(player.username));
                payload.insert("group".to_string(), json!(player.group));
                payload.insert("games".to_string(), games_snapshot(&player.games));
                Ok(Candidate { label, payload })
            }
            TargetKind::Group => {
                let group = self
                    .repo
                    .group(uno)
                    .await?
                    .ok_or_else(|| UpdateError::NotFound(uno.to_string()))?;
                check_group(&group, game_mode, data_kind, &self.intervals, now)?;

                let mut payload = BTreeMap::new();
                payload.insert("kind".to_string(), json!(TargetKind::Group));
                payload.insert("players".to_string(), json!(group.players.len()));
                payload.insert("games".to_string(), games_snapshot(&group.games));
                Ok(Candidate {
                    label: group.uno,
                    payload,
                })
            }
        }
    }

    async fn request_one(
        &self,
        uno: &str,
        game_mode: GameMode,
        data_kind: DataKind,
        now: DateTime<Utc>,
    ) -> Result<String, UpdateError> {
        let name = task_name(uno, game_mode, data_kind);
        let candidate = match self.candidate(uno, game_mode, data_kind, now).await {
            Ok(candidate) => candidate,
            Err(e) => {
                debug!(task = %name, error = %e, "Update rejected");
                return Err(e);
            }
        };

        let tracker = self.repo.tracker_status().await?;
        if tracker != TrackerStatus::Active {
            return Err(UpdateError::TrackerInactive(tracker.to_string()));
        }

        let tasks = self.queue.all().await?;
        let status = admission_status(&tasks, &name);
        let label = candidate.label;
        match status {
            AdmissionStatus::AlreadyRunning => {
                return Err(UpdateError::AlreadyRunning {
                    label,
                    game_mode,
                    data_kind,
                })
            }
            AdmissionStatus::InQueues => {
                return Err(UpdateError::InQueues {
                    label,
                    game_mode,
                    data_kind,
                })
            }
            AdmissionStatus::Started | AdmissionStatus::Added => {}
        }

        let task = Task::new(uno, game_mode, data_kind, now).with_payload(candidate.payload);
        let len = self.queue.enqueue(&task).await?;

        let message = format!("{} | {} | {} | {}", label, game_mode, data_kind, status);
        let entry = ActivityEntry::new(uno, game_mode, message.clone());
        if let Err(e) = push_activity(self.repo.cache().as_ref(), &entry, self.activity_limit).await
        {
            warn!(task = %name, error = %e, "Failed to record activity");
        }
        info!(task = %name, status = %status, queue_len = len, "Task queued");
        Ok(message)
    }
}
