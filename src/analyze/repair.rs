//! Duplicate participant detection.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Participant, RowRef};
use crate::models::GameMode;

/// Participants of a match with repeated players split out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deduped {
    /// Each player once, in first-seen order.
    pub unos: Vec<String>,
    /// Rows that repeat an earlier player.
    pub duplicates: Vec<Participant>,
}

/// Keep the first row of each player; later rows are duplicates.
pub fn dedupe_participants(participants: Vec<Participant>) -> Deduped {
    let mut seen = HashSet::new();
    let mut deduped = Deduped::default();
    for participant in participants {
        if seen.insert(participant.uno.clone()) {
            deduped.unos.push(participant.uno);
        } else {
            deduped.duplicates.push(participant);
        }
    }
    deduped
}

/// Audit entry for one deleted membership row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairRecord {
    pub game_mode: GameMode,
    pub match_id: String,
    pub uno: String,
    pub row: RowRef,
    pub time: DateTime<Utc>,
}

impl RepairRecord {
    pub fn for_duplicates(
        game_mode: GameMode,
        match_id: &str,
        duplicates: &[Participant],
        now: DateTime<Utc>,
    ) -> Vec<Self> {
        duplicates
            .iter()
            .map(|p| RepairRecord {
                game_mode,
                match_id: match_id.to_string(),
                uno: p.uno.clone(),
                row: p.row.clone(),
                time: now,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn participant(id: i64, uno: &str) -> Participant {
        Participant {
            row: RowRef {
                table: "mw_mp_2022".into(),
                id,
            },
            uno: uno.into(),
        }
    }

    #[test]
    fn test_dedupe_keeps_first_row() {
        let deduped = dedupe_participants(vec![
            participant(1, "a"),
            participant(2, "a"),
            participant(3, "b"),
        ]);
        assert_eq!(deduped.unos, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(deduped.duplicates, vec![participant(2, "a")]);

        let records = RepairRecord::for_duplicates(GameMode::MwMp, "m1", &deduped.duplicates, Utc::now());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].row.id, 2);
        assert_eq!(records[0].uno, "a");
    }

    #[test]
    fn test_dedupe_clean_match() {
        let deduped = dedupe_participants(vec![participant(1, "a"), participant(2, "b")]);
        assert_eq!(deduped.unos.len(), 2);
        assert!(deduped.duplicates.is_empty());
    }
}
