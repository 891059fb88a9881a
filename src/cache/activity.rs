//! Bounded operator activity log kept as a cache list, newest first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::codec;
use super::{CacheError, CacheKey, CacheStore};
use crate::models::{GameMode, TargetKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// Player unos are shown bracketed, group names as-is.
    pub target: String,
    pub game_mode: GameMode,
    pub message: String,
    pub time: DateTime<Utc>,
}

impl ActivityEntry {
    pub fn new(target: &str, game_mode: GameMode, message: impl Into<String>) -> Self {
        let target = match TargetKind::of(target) {
            TargetKind::Player => format!("[{}]", target),
            TargetKind::Group => target.to_string(),
        };
        Self {
            target,
            game_mode,
            message: message.into(),
            time: Utc::now(),
        }
    }
}

/// Push an entry at the head of the activity log.
///
/// The list may grow to `limit + limit / 4` before it is trimmed back to
/// exactly `limit` entries.
pub async fn push_activity(
    cache: &dyn CacheStore,
    entry: &ActivityEntry,
    limit: usize,
) -> Result<(), CacheError> {
    let len = cache
        .lpush(&CacheKey::ActivityLog, codec::encode(entry)?)
        .await?;
    if len as usize > limit + limit / 4 {
        cache
            .ltrim(&CacheKey::ActivityLog, 0, limit as isize - 1)
            .await?;
    }
    Ok(())
}

/// Read the activity log, newest first.
pub async fn recent_activity(
    cache: &dyn CacheStore,
    count: usize,
) -> Result<Vec<ActivityEntry>, CacheError> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let raw = cache
        .lrange(&CacheKey::ActivityLog, 0, count as isize - 1)
        .await?;
    raw.iter().map(|r| codec::decode(r)).collect()
}
