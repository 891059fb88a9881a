//! The global refresh task queue, a cache list with the oldest task at the head.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::cache::{codec, CacheError, CacheKey, CacheStore};
use crate::models::{Task, TaskError, TaskStatus};
use crate::storage::{AuditLog, AuditStream, StorageError};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Task queue is empty")]
    Empty,

    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Task is running: {0}")]
    TaskRunning(String),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Queue of refresh tasks.
///
/// Reads and writes are separate cache round trips; callers that check
/// then enqueue can race.
#[derive(Clone)]
pub struct TaskQueue {
    cache: Arc<dyn CacheStore>,
    archive: Option<AuditLog>,
}

impl TaskQueue {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self {
            cache,
            archive: None,
        }
    }

    /// Archive removed tasks to the audit log.
    pub fn with_archive(mut self, archive: AuditLog) -> Self {
        self.archive = Some(archive);
        self
    }

    async fn raw(&self) -> Result<Vec<(String, Task)>, QueueError> {
        let raw = self.cache.lrange(&CacheKey::TaskQueues, 0, -1).await?;
        let mut tasks = Vec::with_capacity(raw.len());
        for entry in raw {
            let task = codec::decode(&entry)?;
            tasks.push((entry, task));
        }
        Ok(tasks)
    }

    fn archive(&self, tasks: &[Task]) -> Result<(), QueueError> {
        if let Some(archive) = &self.archive {
            archive.append_batch(AuditStream::TaskArchive, tasks)?;
        }
        Ok(())
    }

    /// Every queued task, head first.
    pub async fn all(&self) -> Result<Vec<Task>, QueueError> {
        Ok(self.raw().await?.into_iter().map(|(_, task)| task).collect())
    }

    pub async fn peek(&self) -> Result<Option<Task>, QueueError> {
        let head = self.cache.lrange(&CacheKey::TaskQueues, 0, 0).await?;
        match head.first() {
            Some(raw) => Ok(Some(codec::decode(raw)?)),
            None => Ok(None),
        }
    }

    pub async fn len(&self) -> Result<u64, QueueError> {
        Ok(self.cache.llen(&CacheKey::TaskQueues).await?)
    }

    /// Push a task to the tail. Returns the new queue length.
    pub async fn enqueue(&self, task: &Task) -> Result<u64, QueueError> {
        Ok(self
            .cache
            .rpush(&CacheKey::TaskQueues, codec::encode(task)?)
            .await?)
    }

    /// Worker side: claim the head task.
    pub async fn mark_running(&self, now: DateTime<Utc>) -> Result<Task, QueueError> {
        let mut task = self.peek().await?.ok_or(QueueError::Empty)?;
        task.start(now)?;
        self.cache
            .lset(&CacheKey::TaskQueues, 0, codec::encode(&task)?)
            .await?;
        info!(task = %task.name, "Task started");
        Ok(task)
    }

    /// Worker side: complete the head task and archive it.
    pub async fn finish(&self, ok: bool, now: DateTime<Utc>) -> Result<Task, QueueError> {
        let mut task = self.peek().await?.ok_or(QueueError::Empty)?;
        task.finish(ok, now)?;
        self.cache.lpop(&CacheKey::TaskQueues).await?;
        self.archive(std::slice::from_ref(&task))?;
        info!(task = %task.name, status = %task.status, "Task finished");
        Ok(task)
    }

    /// Remove one task by name. Running tasks are left alone.
    pub async fn remove(&self, name: &str, now: DateTime<Utc>) -> Result<Task, QueueError> {
        let (raw, mut task) = self
            .raw()
            .await?
            .into_iter()
            .find(|(_, task)| task.name == name)
            .ok_or_else(|| QueueError::NotFound(name.to_string()))?;
        if task.status == TaskStatus::Running {
            return Err(QueueError::TaskRunning(name.to_string()));
        }

        self.cache.lrem(&CacheKey::TaskQueues, 1, &raw).await?;
        task.delete(now)?;
        self.archive(std::slice::from_ref(&task))?;
        info!(task = %name, "Task deleted");
        Ok(task)
    }

    /// Administrative reset: drop every task that is not running.
    ///
    /// Returns the archived tasks.
    pub async fn clear(&self, now: DateTime<Utc>) -> Result<Vec<Task>, QueueError> {
        let tasks = self.raw().await?;
        let (kept, dropped): (Vec<_>, Vec<_>) = tasks
            .into_iter()
            .partition(|(_, task)| task.status == TaskStatus::Running);

        let mut deleted = Vec::with_capacity(dropped.len());
        for (_, mut task) in dropped {
            if task.status.can_transition(TaskStatus::Deleted) {
                task.delete(now)?;
            } else {
                warn!(task = %task.name, status = %task.status, "Dropping task in unexpected state");
                task.status = TaskStatus::Deleted;
                task.ended_at = Some(now);
            }
            deleted.push(task);
        }

        self.cache.delete(&CacheKey::TaskQueues).await?;
        for (raw, _) in kept {
            self.cache.rpush(&CacheKey::TaskQueues, raw).await?;
        }

        self.archive(&deleted)?;
        info!(count = deleted.len(), "Task queue cleared");
        Ok(deleted)
    }
}
