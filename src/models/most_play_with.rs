//! Ranked teammate lists produced by the co-occurrence analyzer.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::GameMode;

/// One co-player with the number of shared matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MostPlayWithEntry {
    pub uno: String,
    pub count: u64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub clantag: String,
}

/// Per-mode lists plus the merged all-modes list. Each is count-descending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MostPlayWith {
    pub all: Vec<MostPlayWithEntry>,
    #[serde(default)]
    pub modes: BTreeMap<GameMode, Vec<MostPlayWithEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
}

impl MostPlayWith {
    pub fn is_empty(&self) -> bool {
        self.all.is_empty() && self.modes.values().all(Vec::is_empty)
    }
}
