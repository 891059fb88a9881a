//! Co-occurrence ("most play with") analysis over the match store.
//!
//! The analyzer scans match membership for the most frequent players and
//! ranks, for each of them, the co-players they shared the most matches
//! with. Participant lists that repeat a player are repaired on the fly.

pub mod cooccurrence;
pub mod memory;
pub mod postgres;
pub mod repair;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::CacheError;
use crate::models::{GameMode, GamesStatus, MostPlayWith, PlayerTags};
use crate::storage::StorageError;

pub use cooccurrence::{count_cooccurrences, merge_modes, top_k, Analyzer, AnalyzerSettings, RunSummary};
pub use memory::MemoryMatchStore;
pub use postgres::PgMatchStore;
pub use repair::{dedupe_participants, Deduped, RepairRecord};

/// Errors from the relational match store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid table name: {0}")]
    InvalidTable(String),

    #[error("No match tables configured for {0}")]
    NoTables(GameMode),
}

/// Errors from an analyzer run.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("Match store error: {0}")]
    Store(#[from] StoreError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Physical location of one match-membership row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowRef {
    pub table: String,
    pub id: i64,
}

/// One membership row of a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub row: RowRef,
    pub uno: String,
}

/// Player record as held by the relational store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerRow {
    pub uno: String,
    pub username: Vec<String>,
    pub clantag: Vec<String>,
    pub games: GamesStatus,
    pub most_play_with: Option<MostPlayWith>,
}

/// Read and repair access to match membership, plus the derived views the
/// analyzer writes back.
///
/// Every mode's membership is the union of its configured tables.
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Players with more than `min_matches` rows across every mode, most
    /// frequent first, at most `limit`.
    async fn frequent_players(
        &self,
        min_matches: u64,
        limit: usize,
    ) -> Result<Vec<(String, u64)>, StoreError>;

    /// Distinct match ids `uno` played in `game_mode`.
    async fn match_ids(&self, game_mode: GameMode, uno: &str) -> Result<Vec<String>, StoreError>;

    /// Every membership row of one match, duplicates included.
    async fn participants(
        &self,
        game_mode: GameMode,
        match_id: &str,
    ) -> Result<Vec<Participant>, StoreError>;

    /// Delete membership rows. Returns the number removed.
    async fn delete_rows(&self, rows: &[RowRef]) -> Result<u64, StoreError>;

    /// First known username and clan tag of `uno`, scanning at most
    /// `limit` rows per table.
    async fn player_tags(&self, uno: &str, limit: usize)
        -> Result<Option<PlayerTags>, StoreError>;

    async fn load_player(&self, uno: &str) -> Result<Option<PlayerRow>, StoreError>;

    async fn save_player(&self, player: &PlayerRow) -> Result<(), StoreError>;

    /// Store the global ranking, independent of any single target.
    async fn save_global_ranking(&self, ranking: &MostPlayWith) -> Result<(), StoreError>;
}
