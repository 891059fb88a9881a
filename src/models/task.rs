//! Refresh tasks and their lifecycle.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::GameMode;

/// Kind of data a refresh task fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Matches,
    MatchesHistory,
    Stats,
    FullmatchesPars,
    /// Stats followed by matches.
    All,
}

impl DataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Matches => "matches",
            DataKind::MatchesHistory => "matches_history",
            DataKind::Stats => "stats",
            DataKind::FullmatchesPars => "fullmatches_pars",
            DataKind::All => "all",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "matches" => Ok(DataKind::Matches),
            "matches_history" => Ok(DataKind::MatchesHistory),
            "stats" => Ok(DataKind::Stats),
            "fullmatches_pars" => Ok(DataKind::FullmatchesPars),
            "all" => Ok(DataKind::All),
            other => Err(format!("unknown data kind: {}", other)),
        }
    }
}

/// Task lifecycle: PENDING -> RUNNING -> DONE | ERROR.
///
/// `Deleted` marks tasks dropped by an administrative reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Running,
    Done,
    Error,
    Deleted,
}

impl TaskStatus {
    pub fn can_transition(&self, to: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, to),
            (Pending, Running)
                | (Running, Done)
                | (Running, Error)
                | (Pending, Deleted)
                | (Done, Deleted)
                | (Error, Deleted)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Done => "DONE",
            TaskStatus::Error => "ERROR",
            TaskStatus::Deleted => "DELETED",
        };
        f.write_str(s)
    }
}

/// Outcome of an admission decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionStatus {
    Started,
    Added,
    AlreadyRunning,
    InQueues,
}

impl fmt::Display for AdmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AdmissionStatus::Started => "started",
            AdmissionStatus::Added => "added",
            AdmissionStatus::AlreadyRunning => "already running",
            AdmissionStatus::InQueues => "in queues",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TaskError {
    #[error("task {name}: cannot move from {from} to {to}")]
    InvalidTransition {
        name: String,
        from: TaskStatus,
        to: TaskStatus,
    },
}

/// Deterministic task name for a (target, mode, kind) triple.
pub fn task_name(target: &str, game_mode: GameMode, data_kind: DataKind) -> String {
    format!("{} {} {}", target, game_mode, data_kind)
}

/// A queued refresh job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    pub target: String,
    pub game_mode: GameMode,
    pub data_kind: DataKind,
    pub status: TaskStatus,
    /// Denormalized snapshot of the target for operators.
    #[serde(default)]
    pub payload: BTreeMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(
        target: impl Into<String>,
        game_mode: GameMode,
        data_kind: DataKind,
        now: DateTime<Utc>,
    ) -> Self {
        let target = target.into();
        Self {
            id: Uuid::new_v4(),
            name: task_name(&target, game_mode, data_kind),
            target,
            game_mode,
            data_kind,
            status: TaskStatus::Pending,
            payload: BTreeMap::new(),
            created_at: now,
            started_at: None,
            ended_at: None,
        }
    }

    pub fn with_payload(mut self, payload: BTreeMap<String, serde_json::Value>) -> Self {
        self.payload = payload;
        self
    }

    fn transition(&mut self, to: TaskStatus) -> Result<(), TaskError> {
        if !self.status.can_transition(to) {
            return Err(TaskError::InvalidTransition {
                name: self.name.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), TaskError> {
        self.transition(TaskStatus::Running)?;
        self.started_at = Some(now);
        Ok(())
    }

    pub fn finish(&mut self, ok: bool, now: DateTime<Utc>) -> Result<(), TaskError> {
        let to = if ok { TaskStatus::Done } else { TaskStatus::Error };
        self.transition(to)?;
        self.ended_at = Some(now);
        Ok(())
    }

    pub fn delete(&mut self, now: DateTime<Utc>) -> Result<(), TaskError> {
        self.transition(TaskStatus::Deleted)?;
        self.ended_at = Some(now);
        Ok(())
    }
}
