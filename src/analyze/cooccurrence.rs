//! The "most play with" batch job.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::repair::{dedupe_participants, RepairRecord};
use super::{AnalyzeError, MatchStore, PlayerRow};
use crate::cache::repository::FIELD_MOST_PLAY_WITH;
use crate::cache::{CacheKey, TargetRepository};
use crate::calculate::summarize;
use crate::config::{AnalyzerConfig, LimitsConfig};
use crate::models::{GameMode, GamesStatus, ModeStatus, MostPlayWith, MostPlayWithEntry, PlayerTags};
use crate::storage::{AuditLog, AuditStream};

/// Count, for `target`, how many of `matches` each other player shared.
pub fn count_cooccurrences<'a>(
    target: &str,
    matches: impl IntoIterator<Item = &'a [String]>,
) -> HashMap<String, u64> {
    let mut counter = HashMap::new();
    for participants in matches {
        for uno in participants.iter().filter(|uno| uno.as_str() != target) {
            *counter.entry(uno.clone()).or_insert(0) += 1;
        }
    }
    counter
}

fn sort_desc<T>(items: &mut [T], key: impl Fn(&T) -> (u64, &str)) {
    items.sort_by(|a, b| {
        let (ca, ua) = key(a);
        let (cb, ub) = key(b);
        cb.cmp(&ca).then_with(|| ua.cmp(ub))
    });
}

/// Keep co-players seen more than `min_together` times, most frequent
/// first, at most `k`. Ties are ordered by uno.
pub fn top_k(counter: HashMap<String, u64>, min_together: u64, k: usize) -> Vec<(String, u64)> {
    let mut top: Vec<(String, u64)> = counter
        .into_iter()
        .filter(|(_, count)| *count > min_together)
        .collect();
    sort_desc(&mut top, |(uno, count)| (*count, uno.as_str()));
    top.truncate(k);
    top
}

/// Sum per-mode lists by co-player and re-rank.
pub fn merge_modes(
    modes: &BTreeMap<GameMode, Vec<MostPlayWithEntry>>,
    k: usize,
) -> Vec<MostPlayWithEntry> {
    let mut merged: HashMap<&str, MostPlayWithEntry> = HashMap::new();
    for entry in modes.values().flatten() {
        merged
            .entry(entry.uno.as_str())
            .and_modify(|e| e.count += entry.count)
            .or_insert_with(|| entry.clone());
    }
    let mut all: Vec<MostPlayWithEntry> = merged.into_values().collect();
    sort_desc(&mut all, |e| (e.count, e.uno.as_str()));
    all.truncate(k);
    all
}

fn ranked(mut counts: Vec<(String, u64)>, k: usize) -> Vec<(String, u64)> {
    sort_desc(&mut counts, |(uno, count)| (*count, uno.as_str()));
    counts.truncate(k);
    counts
}

/// Analyzer thresholds.
#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
    /// A player is frequent above this many membership rows.
    pub min_matches: u64,
    /// Number of frequent players analyzed.
    pub population: usize,
    pub top_k: usize,
    /// A co-player is kept above this many shared matches.
    pub min_together: u64,
    pub tag_lookup_limit: usize,
    pub logs_cap: usize,
}

impl AnalyzerSettings {
    pub fn new(analyzer: &AnalyzerConfig, limits: &LimitsConfig) -> Self {
        Self {
            min_matches: analyzer.min_matches,
            population: analyzer.population,
            top_k: analyzer.top_k,
            min_together: analyzer.min_together,
            tag_lookup_limit: analyzer.tag_lookup_limit,
            logs_cap: limits.logs_games_limit,
        }
    }
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self::new(&AnalyzerConfig::default(), &LimitsConfig::default())
    }
}

/// Summary appended to the analyzer audit stream after each run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub targets: usize,
    pub matches_resolved: usize,
    pub repairs: usize,
    pub duration_ms: u64,
}

/// Per-run memo of resolved display tags.
#[derive(Default)]
struct TagCache(HashMap<String, PlayerTags>);

impl TagCache {
    fn get(&self, uno: &str) -> PlayerTags {
        self.0.get(uno).cloned().unwrap_or_default()
    }

    fn entry(&self, uno: &str, count: u64) -> MostPlayWithEntry {
        let tags = self.get(uno);
        MostPlayWithEntry {
            uno: uno.to_string(),
            count,
            username: tags.username,
            clantag: tags.clantag,
        }
    }
}

/// Sequential co-occurrence analyzer. A run recomputes every frequent
/// player from scratch, so an interrupted run can simply be repeated.
/// Match participants are resolved once per mode and shared across targets.
pub struct Analyzer {
    store: Arc<dyn MatchStore>,
    repo: Option<TargetRepository>,
    audit: Option<AuditLog>,
    settings: AnalyzerSettings,
}

impl Analyzer {
    pub fn new(store: Arc<dyn MatchStore>, settings: AnalyzerSettings) -> Self {
        Self {
            store,
            repo: None,
            audit: None,
            settings,
        }
    }

    /// Refresh cached players after each target is persisted.
    pub fn with_cache(mut self, repo: TargetRepository) -> Self {
        self.repo = Some(repo);
        self
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    async fn resolve_tags(&self, tags: &mut TagCache, uno: &str) -> Result<(), AnalyzeError> {
        if tags.0.contains_key(uno) {
            return Ok(());
        }
        let found = self
            .store
            .player_tags(uno, self.settings.tag_lookup_limit)
            .await?
            .unwrap_or_default();
        tags.0.insert(uno.to_string(), found);
        Ok(())
    }

    /// Fetch a match's players, deleting repeated rows. Returns the players
    /// and the number of rows repaired.
    async fn resolve_match(
        &self,
        game_mode: GameMode,
        match_id: &str,
    ) -> Result<(Vec<String>, usize), AnalyzeError> {
        let participants = self.store.participants(game_mode, match_id).await?;
        let deduped = dedupe_participants(participants);
        if deduped.duplicates.is_empty() {
            return Ok((deduped.unos, 0));
        }

        let rows: Vec<_> = deduped.duplicates.iter().map(|p| p.row.clone()).collect();
        let deleted = self.store.delete_rows(&rows).await?;
        let records =
            RepairRecord::for_duplicates(game_mode, match_id, &deduped.duplicates, Utc::now());
        warn!(
            %game_mode,
            match_id,
            rows = rows.len(),
            deleted,
            "Repaired duplicate match participants"
        );
        if let Some(audit) = &self.audit {
            audit.append_batch(AuditStream::Repairs, &records)?;
        }
        Ok((deduped.unos, records.len()))
    }

    /// Tag each `(uno, count)` pair, resolving unknown tags on the way.
    async fn tagged(
        &self,
        tags: &mut TagCache,
        counts: Vec<(String, u64)>,
    ) -> Result<Vec<MostPlayWithEntry>, AnalyzeError> {
        let mut entries = Vec::with_capacity(counts.len());
        for (uno, count) in counts {
            self.resolve_tags(tags, &uno).await?;
            entries.push(tags.entry(&uno, count));
        }
        Ok(entries)
    }

    /// Run the full analysis.
    ///
    /// Each target is persisted as soon as all its modes are counted, so a
    /// failed run leaves earlier targets updated and later ones untouched.
    /// The global ranking is saved last.
    pub async fn run(&self) -> Result<RunSummary, AnalyzeError> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let settings = &self.settings;
        let ranking_size = settings.top_k * 2;

        let frequent = self
            .store
            .frequent_players(settings.min_matches, settings.population)
            .await?;
        info!(targets = frequent.len(), "Most play with started");

        let mut tags = TagCache::default();
        let mut memos: HashMap<GameMode, HashMap<String, Vec<String>>> = HashMap::new();
        let mut mode_counts: BTreeMap<GameMode, Vec<(String, u64)>> = BTreeMap::new();
        let mut matches_resolved = 0;
        let mut repairs = 0;

        for (index, (uno, _)) in frequent.iter().enumerate() {
            let mut fullmatches = BTreeMap::new();
            let mut modes = BTreeMap::new();

            for game_mode in GameMode::FULLMATCHES {
                let ids = self.store.match_ids(game_mode, uno).await?;
                mode_counts
                    .entry(game_mode)
                    .or_default()
                    .push((uno.clone(), ids.len() as u64));

                let memo = memos.entry(game_mode).or_default();
                for id in &ids {
                    if memo.contains_key(id) {
                        continue;
                    }
                    let (unos, repaired) = self.resolve_match(game_mode, id).await?;
                    matches_resolved += 1;
                    repairs += repaired;
                    memo.insert(id.clone(), unos);
                }

                let counter = count_cooccurrences(
                    uno,
                    ids.iter().filter_map(|id| memo.get(id)).map(Vec::as_slice),
                );
                let top = top_k(counter, settings.min_together, settings.top_k);
                fullmatches.insert(game_mode, ids.len() as u64);
                modes.insert(game_mode, self.tagged(&mut tags, top).await?);
            }

            let most_play_with = MostPlayWith {
                all: merge_modes(&modes, settings.top_k),
                modes,
                time: Some(started_at),
            };
            self.resolve_tags(&mut tags, uno).await?;
            let player_tags = tags.get(uno);
            self.persist(uno, &player_tags, &fullmatches, most_play_with)
                .await?;

            if index % 10 == 0 {
                let percent = index * 100 / frequent.len();
                info!(percent, "Most play with progress");
            }
        }

        let mut ranking = MostPlayWith {
            all: self
                .tagged(&mut tags, ranked(frequent.clone(), ranking_size))
                .await?,
            modes: BTreeMap::new(),
            time: Some(started_at),
        };
        for (game_mode, counts) in mode_counts {
            let entries = self.tagged(&mut tags, ranked(counts, ranking_size)).await?;
            ranking.modes.insert(game_mode, entries);
        }
        self.store.save_global_ranking(&ranking).await?;

        let summary = RunSummary {
            started_at,
            finished_at: Utc::now(),
            targets: frequent.len(),
            matches_resolved,
            repairs,
            duration_ms: clock.elapsed().as_millis() as u64,
        };
        if let Some(audit) = &self.audit {
            audit.append(AuditStream::AnalyzerRuns, &summary)?;
        }
        info!(
            targets = summary.targets,
            matches = summary.matches_resolved,
            repairs = summary.repairs,
            duration_ms = summary.duration_ms,
            "Most play with finished"
        );
        Ok(summary)
    }

    fn apply_fullmatches(&self, games: &mut GamesStatus, fullmatches: &BTreeMap<GameMode, u64>) {
        for (game_mode, count) in fullmatches {
            if let Some(state) = games.mode_mut(*game_mode) {
                state.matches.stats.fullmatches = *count;
            }
        }
        summarize(games, self.settings.logs_cap);
    }

    async fn persist(
        &self,
        uno: &str,
        tags: &PlayerTags,
        fullmatches: &BTreeMap<GameMode, u64>,
        most_play_with: MostPlayWith,
    ) -> Result<(), AnalyzeError> {
        let mut player = match self.store.load_player(uno).await? {
            Some(player) => player,
            None => {
                let mut player = PlayerRow {
                    uno: uno.to_string(),
                    ..Default::default()
                };
                for (game_mode, count) in fullmatches {
                    if let Some(state) = player.games.mode_mut(*game_mode) {
                        state.status = if *count > 0 {
                            ModeStatus::Enabled
                        } else {
                            ModeStatus::NotEnabled
                        };
                    }
                }
                player
            }
        };

        self.apply_fullmatches(&mut player.games, fullmatches);
        if !tags.username.is_empty() && !player.username.contains(&tags.username) {
            player.username.insert(0, tags.username.clone());
        }
        if !tags.clantag.is_empty() && !player.clantag.contains(&tags.clantag) {
            player.clantag.insert(0, tags.clantag.clone());
        }
        player.most_play_with = Some(most_play_with);
        self.store.save_player(&player).await?;

        let Some(repo) = &self.repo else {
            return Ok(());
        };
        if let Some(mut games) = repo.games(uno).await? {
            self.apply_fullmatches(&mut games, fullmatches);
            repo.set_games(uno, &games).await?;
            repo.set_field(
                &CacheKey::player(uno),
                FIELD_MOST_PLAY_WITH,
                &player.most_play_with,
            )
            .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::{MemoryMatchStore, Participant, RowRef, StoreError};
    use crate::cache::{MemoryCache, PlayerRecord};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use tokio::sync::Mutex;

    /// Memory store that records calls and can fail match lookups for one player.
    struct RecordingStore {
        inner: MemoryMatchStore,
        fail_for: Option<String>,
        calls: Mutex<Vec<String>>,
    }

    impl RecordingStore {
        fn new(inner: MemoryMatchStore, fail_for: Option<&str>) -> Self {
            Self {
                inner,
                fail_for: fail_for.map(str::to_string),
                calls: Mutex::new(Vec::new()),
            }
        }

        async fn position(&self, call: &str) -> Option<usize> {
            self.calls.lock().await.iter().position(|c| c == call)
        }
    }

    #[async_trait]
    impl MatchStore for RecordingStore {
        async fn frequent_players(
            &self,
            min_matches: u64,
            limit: usize,
        ) -> Result<Vec<(String, u64)>, StoreError> {
            self.inner.frequent_players(min_matches, limit).await
        }

        async fn match_ids(
            &self,
            game_mode: GameMode,
            uno: &str,
        ) -> Result<Vec<String>, StoreError> {
            if self.fail_for.as_deref() == Some(uno) {
                return Err(StoreError::NoTables(game_mode));
            }
            self.inner.match_ids(game_mode, uno).await
        }

        async fn participants(
            &self,
            game_mode: GameMode,
            match_id: &str,
        ) -> Result<Vec<Participant>, StoreError> {
            self.inner.participants(game_mode, match_id).await
        }

        async fn delete_rows(&self, rows: &[RowRef]) -> Result<u64, StoreError> {
            self.inner.delete_rows(rows).await
        }

        async fn player_tags(
            &self,
            uno: &str,
            limit: usize,
        ) -> Result<Option<PlayerTags>, StoreError> {
            self.calls.lock().await.push(format!("tags:{}", uno));
            self.inner.player_tags(uno, limit).await
        }

        async fn load_player(&self, uno: &str) -> Result<Option<PlayerRow>, StoreError> {
            self.inner.load_player(uno).await
        }

        async fn save_player(&self, player: &PlayerRow) -> Result<(), StoreError> {
            self.calls.lock().await.push(format!("save:{}", player.uno));
            self.inner.save_player(player).await
        }

        async fn save_global_ranking(&self, ranking: &MostPlayWith) -> Result<(), StoreError> {
            self.inner.save_global_ranking(ranking).await
        }
    }

    fn s(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn settings() -> AnalyzerSettings {
        AnalyzerSettings {
            min_matches: 0,
            population: 100,
            top_k: 2,
            min_together: 0,
            tag_lookup_limit: 1,
            logs_cap: 20,
        }
    }

    #[test]
    fn test_count_cooccurrences() {
        let m1 = s(&["a", "b", "c"]);
        let m2 = s(&["a", "b"]);
        let counter = count_cooccurrences("a", [m1.as_slice(), m2.as_slice()]);
        assert_eq!(counter.get("b"), Some(&2));
        assert_eq!(counter.get("c"), Some(&1));
        assert_eq!(counter.get("a"), None);
    }

    #[test]
    fn test_top_k_threshold_and_cap() {
        let counter: HashMap<String, u64> = [("b", 5), ("c", 2), ("d", 9), ("e", 3), ("f", 5)]
            .into_iter()
            .map(|(uno, count)| (uno.to_string(), count))
            .collect();
        let top = top_k(counter, 2, 3);
        assert_eq!(
            top,
            vec![("d".to_string(), 9), ("b".to_string(), 5), ("f".to_string(), 5)]
        );
    }

    #[test]
    fn test_merge_modes_sums_and_recaps() {
        let entry = |uno: &str, count| MostPlayWithEntry {
            uno: uno.into(),
            count,
            username: uno.to_uppercase(),
            clantag: String::new(),
        };
        let mut modes = BTreeMap::new();
        modes.insert(GameMode::MwMp, vec![entry("b", 4), entry("c", 3)]);
        modes.insert(GameMode::MwWz, vec![entry("c", 2), entry("d", 1)]);

        let all = merge_modes(&modes, 2);
        assert_eq!(all, vec![entry("c", 5), entry("b", 4)]);
    }

    #[tokio::test]
    async fn test_run_counts_and_persists() {
        let store = Arc::new(MemoryMatchStore::new());
        store.insert_match(GameMode::MwMp, "m1", &["a", "b", "c"]).await;
        store.insert_match(GameMode::MwMp, "m2", &["a", "b"]).await;
        store.insert_match(GameMode::MwWz, "w1", &["a", "c"]).await;
        store.set_tags("b", "Bravo", "B1").await;

        let analyzer = Analyzer::new(store.clone(), settings());
        let summary = analyzer.run().await.unwrap();
        assert_eq!(summary.targets, 3);
        assert_eq!(summary.matches_resolved, 3);
        assert_eq!(summary.repairs, 0);

        let a = store.load_player("a").await.unwrap().unwrap();
        let most = a.most_play_with.unwrap();
        let mw_mp = &most.modes[&GameMode::MwMp];
        assert_eq!(mw_mp[0].uno, "b");
        assert_eq!(mw_mp[0].count, 2);
        assert_eq!(mw_mp[0].username, "Bravo");
        assert_eq!(mw_mp[1].uno, "c");
        assert_eq!(mw_mp[1].count, 1);

        let all: Vec<_> = most.all.iter().map(|e| (e.uno.as_str(), e.count)).collect();
        assert_eq!(all, vec![("b", 2), ("c", 2)]);

        assert_eq!(a.games.mw_mp.status, ModeStatus::Enabled);
        assert_eq!(a.games.mw_mp.matches.stats.fullmatches, 2);
        assert_eq!(a.games.all.matches.stats.fullmatches, 3);

        let b = store.load_player("b").await.unwrap().unwrap();
        assert_eq!(b.games.mw_wz.status, ModeStatus::NotEnabled);
        assert_eq!(b.username, vec!["Bravo".to_string()]);

        let ranking = store.ranking().await.unwrap();
        assert_eq!(ranking.all[0].uno, "a");
        assert_eq!(ranking.all[0].count, 3);
        assert_eq!(ranking.modes[&GameMode::MwMp][0].count, 2);
    }

    #[tokio::test]
    async fn test_run_repairs_duplicates_once() {
        let temp_dir = TempDir::new().unwrap();
        let audit = AuditLog::new(temp_dir.path().to_path_buf());
        let store = Arc::new(MemoryMatchStore::new());
        store.insert_match(GameMode::MwMp, "m1", &["a", "a", "b"]).await;

        let analyzer = Analyzer::new(store.clone(), settings()).with_audit(audit.clone());
        let summary = analyzer.run().await.unwrap();
        assert_eq!(summary.repairs, 1);
        assert_eq!(summary.matches_resolved, 1);
        assert_eq!(store.row_count().await, 2);

        let repairs: Vec<RepairRecord> = audit.read(AuditStream::Repairs).unwrap();
        assert_eq!(repairs.len(), 1);
        assert_eq!(repairs[0].uno, "a");
        assert_eq!(repairs[0].match_id, "m1");

        let a = store.load_player("a").await.unwrap().unwrap();
        let mw_mp = &a.most_play_with.unwrap().modes[&GameMode::MwMp];
        assert_eq!(mw_mp.len(), 1);
        assert_eq!(mw_mp[0].uno, "b");
        assert_eq!(mw_mp[0].count, 1);

        let runs: Vec<RunSummary> = audit.read(AuditStream::AnalyzerRuns).unwrap();
        assert_eq!(runs.len(), 1);
    }

    #[tokio::test]
    async fn test_run_refreshes_cached_players() {
        let cache = Arc::new(MemoryCache::new());
        let repo = TargetRepository::new(cache);
        repo.save_player(&PlayerRecord::new("1")).await.unwrap();

        let store = Arc::new(MemoryMatchStore::new());
        store.insert_match(GameMode::MwWz, "w1", &["1", "2"]).await;

        Analyzer::new(store, settings())
            .with_cache(repo.clone())
            .run()
            .await
            .unwrap();

        let cached = repo.player("1").await.unwrap().unwrap();
        assert_eq!(cached.games.mw_wz.matches.stats.fullmatches, 1);
        let most = cached.most_play_with.unwrap();
        assert_eq!(most.modes[&GameMode::MwWz][0].uno, "2");
        assert!(repo.player("2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_run_keeps_finished_targets() {
        let inner = MemoryMatchStore::new();
        inner.insert_match(GameMode::MwMp, "m1", &["a", "b", "c"]).await;
        inner.insert_match(GameMode::MwMp, "m2", &["a", "b"]).await;
        inner.insert_match(GameMode::MwWz, "w1", &["a", "c"]).await;
        let store = Arc::new(RecordingStore::new(inner, Some("c")));

        let result = Analyzer::new(store.clone(), settings()).run().await;
        assert!(matches!(
            result,
            Err(AnalyzeError::Store(StoreError::NoTables(_)))
        ));

        let a = store.load_player("a").await.unwrap().unwrap();
        assert_eq!(a.games.mw_mp.matches.stats.fullmatches, 2);
        assert_eq!(a.most_play_with.unwrap().modes[&GameMode::MwMp][0].uno, "b");
        assert!(store.load_player("b").await.unwrap().is_some());
        assert!(store.load_player("c").await.unwrap().is_none());
        assert!(store.inner.ranking().await.is_none());
    }

    #[tokio::test]
    async fn test_tags_resolved_when_needed() {
        let inner = MemoryMatchStore::new();
        inner.insert_match(GameMode::MwMp, "m1", &["a", "b"]).await;
        inner.insert_match(GameMode::MwMp, "m2", &["a", "b"]).await;
        inner.insert_match(GameMode::MwMp, "m3", &["d", "e"]).await;
        let store = Arc::new(RecordingStore::new(inner, None));

        Analyzer::new(store.clone(), settings()).run().await.unwrap();

        let saved_a = store.position("save:a").await.unwrap();
        let tags_d = store.position("tags:d").await.unwrap();
        assert!(saved_a < tags_d);

        let calls = store.calls.lock().await;
        let lookups = calls.iter().filter(|c| c.starts_with("tags:")).count();
        assert_eq!(lookups, 4);
    }
}
