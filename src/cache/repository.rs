//! Typed access to player and group records held as cache hashes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::codec::{self, CacheValue};
use super::{CacheError, CacheKey, CacheStore, KeyPattern};
use crate::models::{BestHolders, GamesStats, GamesStatus, MostPlayWith, TargetKind};

pub const FIELD_GAMES: &str = "games";
pub const FIELD_MOST_PLAY_WITH: &str = "most_play_with";
pub const FIELD_GROUP: &str = "group";

/// Cached player record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub uno: String,
    /// Known display names, most recent first.
    #[serde(default)]
    pub username: Vec<String>,
    #[serde(default)]
    pub clantag: Vec<String>,
    #[serde(default)]
    pub games: GamesStatus,
    #[serde(default)]
    pub games_stats: GamesStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub most_play_with: Option<MostPlayWith>,
    /// Uno of the group this player belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl PlayerRecord {
    pub fn new(uno: impl Into<String>) -> Self {
        Self {
            uno: uno.into(),
            ..Default::default()
        }
    }

    /// Display label: newest username, falling back to the uno.
    pub fn label(&self) -> &str {
        self.username.first().map(String::as_str).unwrap_or(&self.uno)
    }
}

/// Cached group record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub uno: String,
    #[serde(default)]
    pub username: Vec<String>,
    #[serde(default)]
    pub clantag: Vec<String>,
    #[serde(default)]
    pub games: GamesStatus,
    #[serde(default)]
    pub games_stats: GamesStats,
    #[serde(default)]
    pub games_stats_best: BestHolders,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub most_play_with: Option<MostPlayWith>,
    #[serde(default)]
    pub players: BTreeMap<String, PlayerRecord>,
}

impl GroupRecord {
    pub fn new(uno: impl Into<String>) -> Self {
        Self {
            uno: uno.into(),
            ..Default::default()
        }
    }
}

/// Global switch gating every refresh request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerStatus {
    Active,
    Inactive,
    Break,
}

impl fmt::Display for TrackerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrackerStatus::Active => "active",
            TrackerStatus::Inactive => "inactive",
            TrackerStatus::Break => "break",
        };
        f.write_str(s)
    }
}

impl FromStr for TrackerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(TrackerStatus::Active),
            "inactive" => Ok(TrackerStatus::Inactive),
            "break" => Ok(TrackerStatus::Break),
            other => Err(format!("unknown tracker status: {}", other)),
        }
    }
}

/// Encode each top-level field of a record as a hash field.
fn to_fields<T: Serialize>(record: &T) -> Result<Vec<(String, String)>, CacheError> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(field, value)| (field, CacheValue::from(value).encode()))
            .collect()),
        _ => Err(CacheError::WrongType("record".to_string())),
    }
}

fn from_fields<T: DeserializeOwned>(
    fields: BTreeMap<String, String>,
) -> Result<Option<T>, CacheError> {
    if fields.is_empty() {
        return Ok(None);
    }
    let map: Map<String, Value> = fields
        .into_iter()
        .map(|(field, raw)| (field, CacheValue::decode(&raw).into_json()))
        .collect();
    Ok(Some(serde_json::from_value(Value::Object(map))?))
}

/// Optional record fields. Serialization skips them when unset, so a save
/// must remove them explicitly.
const PLAYER_OPTIONAL: [&str; 2] = [FIELD_MOST_PLAY_WITH, FIELD_GROUP];
const GROUP_OPTIONAL: [&str; 1] = [FIELD_MOST_PLAY_WITH];

/// Typed repository over a [`CacheStore`].
#[derive(Clone)]
pub struct TargetRepository {
    cache: Arc<dyn CacheStore>,
}

impl TargetRepository {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    async fn write_record<T: Serialize>(
        &self,
        key: &CacheKey,
        record: &T,
        optional: &[&str],
    ) -> Result<(), CacheError> {
        let fields = to_fields(record)?;
        let stale: Vec<String> = optional
            .iter()
            .filter(|name| !fields.iter().any(|(field, _)| field == *name))
            .map(|name| name.to_string())
            .collect();
        self.cache.hset(key, fields).await?;
        if !stale.is_empty() {
            self.cache.hdel(key, &stale).await?;
        }
        Ok(())
    }

    pub async fn player(&self, uno: &str) -> Result<Option<PlayerRecord>, CacheError> {
        from_fields(self.cache.hgetall(&CacheKey::player(uno)).await?)
    }

    /// Write a player record and its username aliases.
    pub async fn save_player(&self, player: &PlayerRecord) -> Result<(), CacheError> {
        self.write_record(&CacheKey::player(&player.uno), player, &PLAYER_OPTIONAL)
            .await?;
        for name in &player.username {
            self.cache
                .set(&CacheKey::username(name), codec::encode(&player.uno)?)
                .await?;
        }
        Ok(())
    }

    /// Resolve a username alias to a player uno.
    pub async fn uno_by_username(&self, name: &str) -> Result<Option<String>, CacheError> {
        match self.cache.get(&CacheKey::username(name)).await? {
            Some(raw) => Ok(Some(codec::decode(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn group(&self, uno: &str) -> Result<Option<GroupRecord>, CacheError> {
        from_fields(self.cache.hgetall(&CacheKey::group(uno)).await?)
    }

    pub async fn save_group(&self, group: &GroupRecord) -> Result<(), CacheError> {
        self.write_record(&CacheKey::group(&group.uno), group, &GROUP_OPTIONAL)
            .await
    }

    pub async fn field<T: DeserializeOwned>(
        &self,
        key: &CacheKey,
        field: &str,
    ) -> Result<Option<T>, CacheError> {
        match self.cache.hget(key, field).await? {
            Some(raw) => Ok(Some(codec::decode(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn set_field<T: Serialize + ?Sized>(
        &self,
        key: &CacheKey,
        field: &str,
        value: &T,
    ) -> Result<(), CacheError> {
        self.cache
            .hset(key, vec![(field.to_string(), codec::encode(value)?)])
            .await
    }

    /// Game status of any target, addressed by uno.
    pub async fn games(&self, uno: &str) -> Result<Option<GamesStatus>, CacheError> {
        self.field(&CacheKey::target(uno), FIELD_GAMES).await
    }

    /// Store a target's game status. A player's copy inside its group's
    /// member table is refreshed too.
    pub async fn set_games(&self, uno: &str, games: &GamesStatus) -> Result<(), CacheError> {
        let key = CacheKey::target(uno);
        self.set_field(&key, FIELD_GAMES, games).await?;

        if TargetKind::of(uno) != TargetKind::Player {
            return Ok(());
        }
        let Some(group_uno) = self.field::<String>(&key, FIELD_GROUP).await? else {
            return Ok(());
        };
        let Some(mut group) = self.group(&group_uno).await? else {
            return Ok(());
        };
        if let Some(member) = group.players.get_mut(uno) {
            member.games = games.clone();
            self.save_group(&group).await?;
        }
        Ok(())
    }

    /// Ids of every cached target of a kind.
    pub async fn target_ids(&self, kind: TargetKind) -> Result<Vec<String>, CacheError> {
        let keys = self.cache.keys(&KeyPattern::targets(kind)).await?;
        Ok(keys
            .into_iter()
            .filter_map(|key| key.id().map(str::to_string))
            .collect())
    }

    /// Current tracker switch. Unset means inactive.
    pub async fn tracker_status(&self) -> Result<TrackerStatus, CacheError> {
        match self.cache.get(&CacheKey::TrackerStatus).await? {
            Some(raw) => codec::decode(&raw),
            None => Ok(TrackerStatus::Inactive),
        }
    }

    pub async fn set_tracker_status(&self, status: TrackerStatus) -> Result<(), CacheError> {
        self.cache
            .set(&CacheKey::TrackerStatus, codec::encode(&status)?)
            .await
    }
}
