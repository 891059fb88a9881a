//! Cache store adapter.
//!
//! Keys are typed ([`CacheKey`]) and rendered to their delimited wire form
//! only at the store boundary. Values are JSON text (see [`codec`]).

pub mod activity;
pub mod codec;
pub mod memory;
pub mod redis_store;
pub mod repository;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::TargetKind;

pub use activity::{push_activity, recent_activity, ActivityEntry};
pub use codec::CacheValue;
pub use memory::MemoryCache;
pub use redis_store::RedisCache;
pub use repository::{GroupRecord, PlayerRecord, TargetRepository, TrackerStatus};

/// Errors from the cache store.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Cache codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Wrong value type at key {0}")]
    WrongType(String),

    #[error("Index {index} out of range at key {key}")]
    OutOfRange { key: String, index: isize },

    #[error("Invalid cache key: {0}")]
    InvalidKey(String),
}

/// Id field addressed by a target key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyField {
    Uno,
    Username,
}

impl KeyField {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyField::Uno => "uno",
            KeyField::Username => "username",
        }
    }
}

/// Typed cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// A target record hash, `{kind}:{field}_{id}`.
    Target {
        kind: TargetKind,
        field: KeyField,
        id: String,
    },
    /// The global refresh task queue.
    TaskQueues,
    /// Bounded operator activity log.
    ActivityLog,
    /// Global tracker switch.
    TrackerStatus,
}

impl CacheKey {
    pub fn target(uno: &str) -> Self {
        CacheKey::Target {
            kind: TargetKind::of(uno),
            field: KeyField::Uno,
            id: uno.to_string(),
        }
    }

    pub fn player(uno: &str) -> Self {
        CacheKey::Target {
            kind: TargetKind::Player,
            field: KeyField::Uno,
            id: uno.to_string(),
        }
    }

    pub fn group(uno: &str) -> Self {
        CacheKey::Target {
            kind: TargetKind::Group,
            field: KeyField::Uno,
            id: uno.to_string(),
        }
    }

    pub fn username(name: &str) -> Self {
        CacheKey::Target {
            kind: TargetKind::Player,
            field: KeyField::Username,
            id: name.to_string(),
        }
    }

    /// Id of a target key.
    pub fn id(&self) -> Option<&str> {
        match self {
            CacheKey::Target { id, .. } => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Target { kind, field, id } => {
                write!(f, "{}:{}_{}", kind, field.as_str(), id)
            }
            CacheKey::TaskQueues => f.write_str("task_queues"),
            CacheKey::ActivityLog => f.write_str("cod_logs_cache"),
            CacheKey::TrackerStatus => f.write_str("status"),
        }
    }
}

impl FromStr for CacheKey {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task_queues" => return Ok(CacheKey::TaskQueues),
            "cod_logs_cache" => return Ok(CacheKey::ActivityLog),
            "status" => return Ok(CacheKey::TrackerStatus),
            _ => {}
        }

        let invalid = || CacheError::InvalidKey(s.to_string());
        let (kind, rest) = s.split_once(':').ok_or_else(invalid)?;
        let kind = match kind {
            "player" => TargetKind::Player,
            "group" => TargetKind::Group,
            _ => return Err(invalid()),
        };
        let (field, id) = rest.split_once('_').ok_or_else(invalid)?;
        let field = match field {
            "uno" => KeyField::Uno,
            "username" => KeyField::Username,
            _ => return Err(invalid()),
        };
        if id.is_empty() {
            return Err(invalid());
        }

        Ok(CacheKey::Target {
            kind,
            field,
            id: id.to_string(),
        })
    }
}

/// Prefix pattern over target keys, `{kind}:{field}_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPattern {
    pub kind: TargetKind,
    pub field: KeyField,
}

impl KeyPattern {
    pub fn targets(kind: TargetKind) -> Self {
        Self {
            kind,
            field: KeyField::Uno,
        }
    }

    pub fn prefix(&self) -> String {
        format!("{}:{}_", self.kind, self.field.as_str())
    }

    pub fn matches(&self, wire: &str) -> bool {
        wire.starts_with(&self.prefix())
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}*", self.prefix())
    }
}

/// Key-value store with scalar, hash and list operations.
///
/// Each call is independent; nothing spans more than one round trip
/// atomically. List indices follow Redis conventions (negative counts from
/// the tail, ranges inclusive).
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &CacheKey, value: String) -> Result<(), CacheError>;
    async fn delete(&self, key: &CacheKey) -> Result<bool, CacheError>;

    async fn hget(&self, key: &CacheKey, field: &str) -> Result<Option<String>, CacheError>;
    async fn hset(&self, key: &CacheKey, fields: Vec<(String, String)>) -> Result<(), CacheError>;
    async fn hgetall(&self, key: &CacheKey) -> Result<BTreeMap<String, String>, CacheError>;
    async fn hdel(&self, key: &CacheKey, fields: &[String]) -> Result<u64, CacheError>;
    async fn hkeys(&self, key: &CacheKey) -> Result<Vec<String>, CacheError>;

    /// Push to the head. Returns the new length.
    async fn lpush(&self, key: &CacheKey, value: String) -> Result<u64, CacheError>;
    /// Push to the tail. Returns the new length.
    async fn rpush(&self, key: &CacheKey, value: String) -> Result<u64, CacheError>;
    async fn lpop(&self, key: &CacheKey) -> Result<Option<String>, CacheError>;
    async fn lrange(
        &self,
        key: &CacheKey,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, CacheError>;
    async fn lset(&self, key: &CacheKey, index: isize, value: String) -> Result<(), CacheError>;
    async fn ltrim(&self, key: &CacheKey, start: isize, stop: isize) -> Result<(), CacheError>;
    /// Remove up to `count` occurrences of `value` (0 = all, negative = from the tail).
    async fn lrem(&self, key: &CacheKey, count: isize, value: &str) -> Result<u64, CacheError>;
    async fn llen(&self, key: &CacheKey) -> Result<u64, CacheError>;

    /// Enumerate target keys matching a prefix pattern.
    async fn keys(&self, pattern: &KeyPattern) -> Result<Vec<CacheKey>, CacheError>;
    /// Delete every key matching a prefix pattern. Returns the number deleted.
    async fn delete_pattern(&self, pattern: &KeyPattern) -> Result<u64, CacheError>;
}
