//! Titles and the game modes tracked per target.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Game title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Title {
    Mw,
    Cw,
    Vg,
}

impl Title {
    pub const ALL: [Title; 3] = [Title::Mw, Title::Cw, Title::Vg];

    pub fn as_str(&self) -> &'static str {
        match self {
            Title::Mw => "mw",
            Title::Cw => "cw",
            Title::Vg => "vg",
        }
    }
}

impl fmt::Display for Title {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked (title, mode) pair, or `All` for the cross-mode aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    All,
    MwMp,
    MwWz,
    CwMp,
    VgMp,
}

impl GameMode {
    /// Every concrete mode, in storage order.
    pub const CONCRETE: [GameMode; 4] = [
        GameMode::MwMp,
        GameMode::MwWz,
        GameMode::CwMp,
        GameMode::VgMp,
    ];

    /// Modes that have full-match data in the relational store.
    pub const FULLMATCHES: [GameMode; 2] = [GameMode::MwMp, GameMode::MwWz];

    pub fn as_str(&self) -> &'static str {
        match self {
            GameMode::All => "all",
            GameMode::MwMp => "mw_mp",
            GameMode::MwWz => "mw_wz",
            GameMode::CwMp => "cw_mp",
            GameMode::VgMp => "vg_mp",
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, GameMode::All)
    }

    pub fn supports_fullmatches(&self) -> bool {
        Self::FULLMATCHES.contains(self)
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(GameMode::All),
            "mw_mp" => Ok(GameMode::MwMp),
            "mw_wz" => Ok(GameMode::MwWz),
            "cw_mp" => Ok(GameMode::CwMp),
            "vg_mp" => Ok(GameMode::VgMp),
            other => Err(format!("unknown game mode: {}", other)),
        }
    }
}
