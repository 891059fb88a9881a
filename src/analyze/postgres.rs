//! PostgreSQL [`MatchStore`].
//!
//! Each mode's membership is spread over yearly tables that share the
//! columns `id`, `uno`, `match_id`, `username`, `clantag`. Table names come
//! from configuration and are validated before they are spliced into SQL.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use tracing::debug;

use super::{MatchStore, Participant, PlayerRow, RowRef, StoreError};
use crate::models::{GameMode, GamesStatus, MostPlayWith, PlayerTags};

const PLAYERS_TABLE: &str = "tracker_players";
const STATS_TABLE: &str = "tracker_stats";
const RANKING_NAME: &str = "most_play_with";

fn is_valid_table(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

#[derive(sqlx::FromRow)]
struct PlayerRowSql {
    uno: String,
    username: Json<Vec<String>>,
    clantag: Json<Vec<String>>,
    games: Json<GamesStatus>,
    most_play_with: Option<Json<MostPlayWith>>,
}

impl From<PlayerRowSql> for PlayerRow {
    fn from(row: PlayerRowSql) -> Self {
        Self {
            uno: row.uno,
            username: row.username.0,
            clantag: row.clantag.0,
            games: row.games.0,
            most_play_with: row.most_play_with.map(|j| j.0),
        }
    }
}

pub struct PgMatchStore {
    pool: PgPool,
    tables: BTreeMap<GameMode, Vec<String>>,
}

impl PgMatchStore {
    /// Build a lazily connecting pool. No connection is made until the
    /// first query.
    pub fn connect_lazy(
        url: &str,
        max_connections: u32,
        tables: BTreeMap<GameMode, Vec<String>>,
    ) -> Result<Self, StoreError> {
        for name in tables.values().flatten() {
            if !is_valid_table(name) {
                return Err(StoreError::InvalidTable(name.clone()));
            }
        }
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(url)?;
        Ok(Self { pool, tables })
    }

    fn mode_tables(&self, game_mode: GameMode) -> Result<&[String], StoreError> {
        match self.tables.get(&game_mode) {
            Some(tables) if !tables.is_empty() => Ok(tables.as_slice()),
            _ => Err(StoreError::NoTables(game_mode)),
        }
    }

    fn all_tables(&self) -> Vec<&str> {
        let mut tables: Vec<&str> = self.tables.values().flatten().map(String::as_str).collect();
        tables.sort_unstable();
        tables.dedup();
        tables
    }

    /// `UNION ALL` of one select per table, each with the same `tail`.
    fn union<'a>(tables: impl IntoIterator<Item = &'a str>, columns: &str, tail: &str) -> String {
        tables
            .into_iter()
            .map(|t| format!("SELECT {} FROM {} {}", columns.replace("{table}", t), t, tail))
            .collect::<Vec<_>>()
            .join(" UNION ALL ")
    }
}

#[async_trait]
impl MatchStore for PgMatchStore {
    async fn frequent_players(
        &self,
        min_matches: u64,
        limit: usize,
    ) -> Result<Vec<(String, u64)>, StoreError> {
        let tables = self.all_tables();
        if tables.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT uno, COUNT(*) AS count FROM ({}) AS all_entries \
             GROUP BY uno HAVING COUNT(*) > $1 ORDER BY count DESC LIMIT $2",
            Self::union(tables, "uno", "")
        );
        let rows: Vec<(String, i64)> = sqlx::query_as(&sql)
            .bind(min_matches as i64)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(uno, count)| (uno, count.max(0) as u64))
            .collect())
    }

    async fn match_ids(&self, game_mode: GameMode, uno: &str) -> Result<Vec<String>, StoreError> {
        let tables = self.mode_tables(game_mode)?;
        let sql = format!(
            "SELECT DISTINCT match_id FROM ({}) AS all_entries",
            Self::union(tables.iter().map(String::as_str), "match_id", "WHERE uno = $1")
        );
        let rows: Vec<(String,)> = sqlx::query_as(&sql)
            .bind(uno)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn participants(
        &self,
        game_mode: GameMode,
        match_id: &str,
    ) -> Result<Vec<Participant>, StoreError> {
        let tables = self.mode_tables(game_mode)?;
        let sql = format!(
            "{} ORDER BY id",
            Self::union(
                tables.iter().map(String::as_str),
                "'{table}' AS table_name, id, uno",
                "WHERE match_id = $1"
            )
        );
        let rows: Vec<(String, i64, String)> = sqlx::query_as(&sql)
            .bind(match_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(table, id, uno)| Participant {
                row: RowRef { table, id },
                uno,
            })
            .collect())
    }

    async fn delete_rows(&self, rows: &[RowRef]) -> Result<u64, StoreError> {
        let mut by_table: BTreeMap<&str, Vec<i64>> = BTreeMap::new();
        for row in rows {
            by_table.entry(row.table.as_str()).or_default().push(row.id);
        }

        let known = self.all_tables();
        let mut deleted = 0;
        for (table, ids) in by_table {
            if !known.contains(&table) {
                return Err(StoreError::InvalidTable(table.to_string()));
            }
            let sql = format!("DELETE FROM {} WHERE id = ANY($1)", table);
            let result = sqlx::query(&sql).bind(&ids).execute(&self.pool).await?;
            debug!(table, rows = result.rows_affected(), "Deleted membership rows");
            deleted += result.rows_affected();
        }
        Ok(deleted)
    }

    async fn player_tags(
        &self,
        uno: &str,
        limit: usize,
    ) -> Result<Option<PlayerTags>, StoreError> {
        for table in self.all_tables() {
            let sql = format!(
                "SELECT username, clantag FROM {} WHERE uno = $1 AND username IS NOT NULL LIMIT $2",
                table
            );
            let rows: Vec<(String, Option<String>)> = sqlx::query_as(&sql)
                .bind(uno)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?;
            if let Some((username, clantag)) = rows.into_iter().find(|(u, _)| !u.is_empty()) {
                return Ok(Some(PlayerTags {
                    username,
                    clantag: clantag.unwrap_or_default(),
                }));
            }
        }
        Ok(None)
    }

    async fn load_player(&self, uno: &str) -> Result<Option<PlayerRow>, StoreError> {
        let sql = format!(
            "SELECT uno, username, clantag, games, most_play_with FROM {} WHERE uno = $1",
            PLAYERS_TABLE
        );
        let row: Option<PlayerRowSql> = sqlx::query_as(&sql)
            .bind(uno)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(PlayerRow::from))
    }

    async fn save_player(&self, player: &PlayerRow) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO {} (uno, username, clantag, games, most_play_with) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (uno) DO UPDATE SET username = EXCLUDED.username, \
             clantag = EXCLUDED.clantag, games = EXCLUDED.games, \
             most_play_with = EXCLUDED.most_play_with",
            PLAYERS_TABLE
        );
        sqlx::query(&sql)
            .bind(&player.uno)
            .bind(Json(&player.username))
            .bind(Json(&player.clantag))
            .bind(Json(&player.games))
            .bind(player.most_play_with.as_ref().map(Json))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn save_global_ranking(&self, ranking: &MostPlayWith) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO {} (name, value) VALUES ($1, $2) \
             ON CONFLICT (name) DO UPDATE SET value = EXCLUDED.value",
            STATS_TABLE
        );
        sqlx::query(&sql)
            .bind(RANKING_NAME)
            .bind(Json(ranking))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
