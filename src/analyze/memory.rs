//! In-memory [`MatchStore`] used by tests and local runs.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{MatchStore, Participant, PlayerRow, RowRef, StoreError};
use crate::models::{GameMode, MostPlayWith, PlayerTags};

#[derive(Debug, Clone)]
struct MembershipRow {
    row: RowRef,
    game_mode: GameMode,
    match_id: String,
    uno: String,
    tags: Option<PlayerTags>,
}

#[derive(Default)]
struct Inner {
    rows: Vec<MembershipRow>,
    next_id: i64,
    players: BTreeMap<String, PlayerRow>,
    ranking: Option<MostPlayWith>,
}

#[derive(Default)]
pub struct MemoryMatchStore {
    inner: Mutex<Inner>,
}

impl MemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one membership row per uno, duplicates kept as given.
    pub async fn insert_match(&self, game_mode: GameMode, match_id: &str, unos: &[&str]) {
        let mut inner = self.inner.lock().await;
        for uno in unos {
            inner.next_id += 1;
            let row = MembershipRow {
                row: RowRef {
                    table: format!("{}_matches", game_mode),
                    id: inner.next_id,
                },
                game_mode,
                match_id: match_id.to_string(),
                uno: uno.to_string(),
                tags: None,
            };
            inner.rows.push(row);
        }
    }

    /// Attach display tags to every row of `uno`.
    pub async fn set_tags(&self, uno: &str, username: &str, clantag: &str) {
        let mut inner = self.inner.lock().await;
        for row in inner.rows.iter_mut().filter(|r| r.uno == uno) {
            row.tags = Some(PlayerTags {
                username: username.to_string(),
                clantag: clantag.to_string(),
            });
        }
    }

    pub async fn row_count(&self) -> usize {
        self.inner.lock().await.rows.len()
    }

    pub async fn ranking(&self) -> Option<MostPlayWith> {
        self.inner.lock().await.ranking.clone()
    }

    pub async fn insert_player(&self, player: PlayerRow) {
        self.inner
            .lock()
            .await
            .players
            .insert(player.uno.clone(), player);
    }
}

#[async_trait]
impl MatchStore for MemoryMatchStore {
    async fn frequent_players(
        &self,
        min_matches: u64,
        limit: usize,
    ) -> Result<Vec<(String, u64)>, StoreError> {
        let inner = self.inner.lock().await;
        let mut counts: HashMap<&str, u64> = HashMap::new();
        for row in &inner.rows {
            *counts.entry(row.uno.as_str()).or_default() += 1;
        }
        let mut frequent: Vec<(String, u64)> = counts
            .into_iter()
            .filter(|(_, count)| *count > min_matches)
            .map(|(uno, count)| (uno.to_string(), count))
            .collect();
        frequent.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        frequent.truncate(limit);
        Ok(frequent)
    }

    async fn match_ids(&self, game_mode: GameMode, uno: &str) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock().await;
        let mut ids: Vec<String> = Vec::new();
        for row in inner
            .rows
            .iter()
            .filter(|r| r.game_mode == game_mode && r.uno == uno)
        {
            if !ids.contains(&row.match_id) {
                ids.push(row.match_id.clone());
            }
        }
        Ok(ids)
    }

    async fn participants(
        &self,
        game_mode: GameMode,
        match_id: &str,
    ) -> Result<Vec<Participant>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .rows
            .iter()
            .filter(|r| r.game_mode == game_mode && r.match_id == match_id)
            .map(|r| Participant {
                row: r.row.clone(),
                uno: r.uno.clone(),
            })
            .collect())
    }

    async fn delete_rows(&self, rows: &[RowRef]) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let before = inner.rows.len();
        inner.rows.retain(|r| !rows.contains(&r.row));
        Ok((before - inner.rows.len()) as u64)
    }

    async fn player_tags(
        &self,
        uno: &str,
        limit: usize,
    ) -> Result<Option<PlayerTags>, StoreError> {
        let inner = self.inner.lock().await;
        let mut scanned: HashMap<&str, usize> = HashMap::new();
        for row in inner.rows.iter().filter(|r| r.uno == uno) {
            let seen = scanned.entry(row.row.table.as_str()).or_default();
            if *seen >= limit {
                continue;
            }
            *seen += 1;
            if let Some(tags) = row.tags.as_ref().filter(|t| !t.username.is_empty()) {
                return Ok(Some(tags.clone()));
            }
        }
        Ok(None)
    }

    async fn load_player(&self, uno: &str) -> Result<Option<PlayerRow>, StoreError> {
        Ok(self.inner.lock().await.players.get(uno).cloned())
    }

    async fn save_player(&self, player: &PlayerRow) -> Result<(), StoreError> {
        self.insert_player(player.clone()).await;
        Ok(())
    }

    async fn save_global_ranking(&self, ranking: &MostPlayWith) -> Result<(), StoreError> {
        self.inner.lock().await.ranking = Some(ranking.clone());
        Ok(())
    }
}
