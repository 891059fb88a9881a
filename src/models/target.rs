//! Refresh targets: players and groups, both addressed by an opaque uno.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of target behind an uno.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Player,
    Group,
}

impl TargetKind {
    /// Player unos are numeric; anything else names a group.
    pub fn of(uno: &str) -> Self {
        if !uno.is_empty() && uno.chars().all(|c| c.is_ascii_digit()) {
            TargetKind::Player
        } else {
            TargetKind::Group
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Player => "player",
            TargetKind::Group => "group",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display tags resolved for a player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerTags {
    pub username: String,
    pub clantag: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_kind_of() {
        assert_eq!(TargetKind::of("123456"), TargetKind::Player);
        assert_eq!(TargetKind::of("squad"), TargetKind::Group);
        assert_eq!(TargetKind::of("all"), TargetKind::Group);
        assert_eq!(TargetKind::of(""), TargetKind::Group);
    }

    #[test]
    fn test_target_kind_display() {
        assert_eq!(TargetKind::Player.to_string(), "player");
        assert_eq!(TargetKind::Group.to_string(), "group");
    }
}
