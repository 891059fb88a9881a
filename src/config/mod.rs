//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::models::GameMode;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Cache store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1/".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
        }
    }
}

/// Relational store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Match membership tables per concrete game mode, e.g. `mw_mp`.
    #[serde(default = "default_tables")]
    pub tables: BTreeMap<String, Vec<String>>,
}

fn default_database_url() -> String {
    "postgres://localhost/tracker".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_tables() -> BTreeMap<String, Vec<String>> {
    let mut tables = BTreeMap::new();
    tables.insert(
        GameMode::MwMp.to_string(),
        (2020..=2022).map(|y| format!("mw_mp_fullmatches_{}", y)).collect(),
    );
    tables.insert(
        GameMode::MwWz.to_string(),
        (2020..=2023).map(|y| format!("mw_wz_fullmatches_{}", y)).collect(),
    );
    tables
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            tables: default_tables(),
        }
    }
}

impl DatabaseConfig {
    /// Tables keyed by parsed game mode.
    pub fn mode_tables(&self) -> Result<BTreeMap<GameMode, Vec<String>>, ConfigError> {
        self.tables
            .iter()
            .map(|(mode, tables)| {
                let game_mode: GameMode = mode
                    .parse()
                    .map_err(|e: String| ConfigError::ValidationError(e))?;
                if game_mode.is_all() {
                    return Err(ConfigError::ValidationError(
                        "Tables must be keyed by a concrete game mode".to_string(),
                    ));
                }
                Ok((game_mode, tables.clone()))
            })
            .collect()
    }
}

/// Size caps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Cap of every game status log.
    #[serde(default = "default_logs_games_limit")]
    pub logs_games_limit: usize,

    /// Cap of the operator activity log.
    #[serde(default = "default_logs_cache_limit")]
    pub logs_cache_limit: usize,
}

fn default_logs_games_limit() -> usize {
    20
}

fn default_logs_cache_limit() -> usize {
    100
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            logs_games_limit: default_logs_games_limit(),
            logs_cache_limit: default_logs_cache_limit(),
        }
    }
}

/// Cool-down windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalsConfig {
    #[serde(default = "default_matches_minutes")]
    pub matches_minutes: i64,

    #[serde(default = "default_stats_weeks")]
    pub stats_weeks: i64,

    #[serde(default = "default_log_merge_seconds")]
    pub log_merge_seconds: i64,
}

fn default_matches_minutes() -> i64 {
    30
}

fn default_stats_weeks() -> i64 {
    2
}

fn default_log_merge_seconds() -> i64 {
    60
}

impl Default for IntervalsConfig {
    fn default() -> Self {
        Self {
            matches_minutes: default_matches_minutes(),
            stats_weeks: default_stats_weeks(),
            log_merge_seconds: default_log_merge_seconds(),
        }
    }
}

impl IntervalsConfig {
    pub fn matches(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.matches_minutes)
    }

    pub fn stats(&self) -> chrono::Duration {
        chrono::Duration::weeks(self.stats_weeks)
    }

    pub fn log_merge(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.log_merge_seconds)
    }
}

/// Co-occurrence analyzer thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default = "default_min_matches")]
    pub min_matches: u64,

    #[serde(default = "default_population")]
    pub population: usize,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_min_together")]
    pub min_together: u64,

    #[serde(default = "default_tag_lookup_limit")]
    pub tag_lookup_limit: usize,
}

fn default_min_matches() -> u64 {
    100
}

fn default_population() -> usize {
    1000
}

fn default_top_k() -> usize {
    50
}

fn default_min_together() -> u64 {
    2
}

fn default_tag_lookup_limit() -> usize {
    1
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            min_matches: default_min_matches(),
            population: default_population(),
            top_k: default_top_k(),
            min_together: default_min_together(),
            tag_lookup_limit: default_tag_lookup_limit(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "*".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub intervals: IntervalsConfig,

    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            cache: CacheConfig::default(),
            database: DatabaseConfig::default(),
            limits: LimitsConfig::default(),
            intervals: IntervalsConfig::default(),
            analyzer: AnalyzerConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file. A missing file yields defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.logs_games_limit == 0 || self.limits.logs_cache_limit == 0 {
            return Err(ConfigError::ValidationError(
                "Log limits must be greater than 0".to_string(),
            ));
        }

        if self.analyzer.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "Analyzer top_k must be greater than 0".to_string(),
            ));
        }

        if self.intervals.matches_minutes < 0
            || self.intervals.stats_weeks < 0
            || self.intervals.log_merge_seconds < 0
        {
            return Err(ConfigError::ValidationError(
                "Intervals must not be negative".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        self.database.mode_tables()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.cache.redis_url, "redis://127.0.0.1/");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.limits.logs_games_limit, 20);
        assert_eq!(config.limits.logs_cache_limit, 100);
        assert_eq!(config.analyzer.top_k, 50);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_intervals_durations() {
        let intervals = IntervalsConfig::default();
        assert_eq!(intervals.matches(), chrono::Duration::minutes(30));
        assert_eq!(intervals.stats(), chrono::Duration::days(14));
        assert_eq!(intervals.log_merge(), chrono::Duration::seconds(60));
    }

    #[test]
    fn test_config_validation_ok() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_bad_limits() {
        let mut config = AppConfig::default();
        config.limits.logs_games_limit = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.analyzer.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bad_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bad_table_mode() {
        let mut config = AppConfig::default();
        config
            .database
            .tables
            .insert("all".to_string(), vec!["t".to_string()]);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config
            .database
            .tables
            .insert("bo_mp".to_string(), vec!["t".to_string()]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mode_tables() {
        let tables = DatabaseConfig::default().mode_tables().unwrap();
        assert_eq!(tables[&GameMode::MwMp].len(), 3);
        assert_eq!(tables[&GameMode::MwWz][0], "mw_wz_fullmatches_2020");
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.toml");
        assert_eq!(AppConfig::from_file(&missing).unwrap().server.port, 8080);

        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[intervals]\nmatches_minutes = 5\n\n[analyzer]\ntop_k = 10\n",
        )
        .unwrap();
        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.intervals.matches_minutes, 5);
        assert_eq!(config.intervals.stats_weeks, 2);
        assert_eq!(config.analyzer.top_k, 10);
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();

        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.data_dir, parsed.data_dir);
        assert_eq!(config.database.tables, parsed.database.tables);
    }
}
