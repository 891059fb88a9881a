//! Per-leaf merge policies and the shared stat tree fold.

use std::collections::BTreeSet;

use super::{round2, safe_div, safe_ratio};
use crate::models::{BestNode, BestRecord, BestTree, StatTree};

/// Fields always recomputed from their inputs, never merged.
const DERIVED: [&str; 5] = [
    "kdRatio",
    "wlRatio",
    "accuracy",
    "scorePerGame",
    "scorePerMinute",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Maximum across sources.
    BestRecord,
    /// Sum across sources.
    Cumulative,
}

/// Streaks and records keep the best value; everything else accumulates.
pub fn is_best_record(name: &str) -> bool {
    matches!(name, "accuracy" | "longestStreak" | "currentWinStreak")
        || name.contains("best")
        || name.contains("record")
        || name.contains("most")
}

pub fn is_derived(name: &str) -> bool {
    DERIVED.contains(&name)
}

/// Merge policy of a leaf, or `None` for derived fields.
pub fn policy_for(name: &str) -> Option<MergePolicy> {
    if is_derived(name) {
        None
    } else if is_best_record(name) {
        Some(MergePolicy::BestRecord)
    } else {
        Some(MergePolicy::Cumulative)
    }
}

pub fn merge_leaf(values: &[f64], policy: MergePolicy) -> f64 {
    match policy {
        MergePolicy::BestRecord => values.iter().copied().fold(0.0, f64::max),
        MergePolicy::Cumulative => values.iter().sum(),
    }
}

/// Recompute derived ratios from the leaves directly under `tree`.
pub fn correct_ratio(tree: &mut StatTree) {
    if let (Some(kills), Some(deaths)) = (tree.value("kills"), tree.value("deaths")) {
        tree.set_value("kdRatio", safe_ratio(kills, deaths));
    }
    if let (Some(hits), Some(shots)) = (tree.value("hits"), tree.value("shots")) {
        tree.set_value("accuracy", round2(safe_div(hits, shots) * 100.0));
    }
    if let (Some(wins), Some(losses)) = (tree.value("wins"), tree.value("losses")) {
        tree.set_value("wlRatio", safe_ratio(wins, losses));
    }

    let score = tree.value("score");
    match (score, tree.value("totalGamesPlayed")) {
        (Some(score), Some(games)) if games > 0.0 => {
            tree.set_value("scorePerGame", safe_ratio(score, games));
        }
        _ => {
            if let Some(v) = tree.value("scorePerGame") {
                tree.set_value("scorePerGame", round2(v));
            }
        }
    }
    match (score, tree.value("timePlayedTotal")) {
        (Some(score), Some(seconds)) if seconds > 0.0 => {
            tree.set_value("scorePerMinute", safe_ratio(score, seconds / 60.0));
        }
        _ => {
            if let Some(v) = tree.value("scorePerMinute") {
                tree.set_value("scorePerMinute", round2(v));
            }
        }
    }
}

/// [`correct_ratio`] on every group of the tree.
pub fn correct_ratios(tree: &mut StatTree) {
    correct_ratio(tree);
    for (_, group) in tree.groups_mut() {
        correct_ratios(group);
    }
}

/// First source with the strictly greatest positive value.
fn best_holder(values: &[(&str, f64)]) -> Option<BestRecord> {
    let mut best: Option<BestRecord> = None;
    for &(uno, value) in values {
        let current = best.as_ref().map_or(0.0, |b| b.value);
        if value > current {
            best = Some(BestRecord {
                uno: uno.to_string(),
                value,
            });
        }
    }
    best
}

/// Fold labelled trees leaf by leaf.
///
/// Leaves merge by [`policy_for`]; derived fields are dropped and then
/// recomputed on every group of the result. Returns the merged tree and the
/// best holder of every leaf. A name that is a group in any source is
/// treated as a group.
pub fn fold_with_holders(sources: &[(&str, &StatTree)]) -> (StatTree, BestTree) {
    let mut merged = StatTree::new();
    let mut best = BestTree::default();

    let names: BTreeSet<&String> = sources.iter().flat_map(|(_, tree)| tree.0.keys()).collect();
    for name in names {
        let children: Vec<(&str, &StatTree)> = sources
            .iter()
            .filter_map(|(uno, tree)| tree.group(name).map(|group| (*uno, group)))
            .collect();
        if !children.is_empty() {
            let (child, child_best) = fold_with_holders(&children);
            if !child.is_empty() {
                merged.set_group(name.clone(), child);
            }
            if !child_best.is_empty() {
                best.0.insert(name.clone(), BestNode::Group(child_best));
            }
            continue;
        }

        let values: Vec<(&str, f64)> = sources
            .iter()
            .filter_map(|(uno, tree)| tree.value(name).map(|v| (*uno, v)))
            .collect();
        if let Some(record) = best_holder(&values) {
            best.0.insert(name.clone(), BestNode::Record(record));
        }
        if let Some(policy) = policy_for(name) {
            let leaves: Vec<f64> = values.iter().map(|(_, v)| *v).collect();
            merged.set_value(name.clone(), merge_leaf(&leaves, policy));
        }
    }

    correct_ratio(&mut merged);
    (merged, best)
}

/// Fold unlabelled trees, discarding best holders.
pub fn fold_trees<'a>(trees: impl IntoIterator<Item = &'a StatTree>) -> StatTree {
    let sources: Vec<(&str, &StatTree)> = trees.into_iter().map(|tree| ("", tree)).collect();
    fold_with_holders(&sources).0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ALL;
    use pretty_assertions::assert_eq;

    fn leaves(pairs: &[(&str, f64)]) -> StatTree {
        let mut tree = StatTree::new();
        for (name, value) in pairs {
            tree.set_value(*name, *value);
        }
        tree
    }

    #[test]
    fn test_merge_leaf_policies() {
        assert_eq!(merge_leaf(&[5.0, 9.0, 3.0], MergePolicy::BestRecord), 9.0);
        assert_eq!(merge_leaf(&[5.0, 9.0, 3.0], MergePolicy::Cumulative), 17.0);
        assert_eq!(merge_leaf(&[], MergePolicy::Cumulative), 0.0);
    }

    #[test]
    fn test_policy_for() {
        assert_eq!(policy_for("kills"), Some(MergePolicy::Cumulative));
        assert_eq!(policy_for("longestStreak"), Some(MergePolicy::BestRecord));
        assert_eq!(policy_for("bestScore"), Some(MergePolicy::BestRecord));
        assert_eq!(policy_for("recordXpInAMatch"), Some(MergePolicy::BestRecord));
        assert_eq!(policy_for("mostKills"), Some(MergePolicy::BestRecord));
        assert_eq!(policy_for("kdRatio"), None);
        assert_eq!(policy_for("accuracy"), None);
    }

    #[test]
    fn test_kd_ratio_recomputed_after_merge() {
        let a = leaves(&[("kills", 10.0), ("deaths", 5.0), ("kdRatio", 9.9)]);
        let b = leaves(&[("kills", 20.0), ("deaths", 5.0), ("kdRatio", 0.1)]);
        let merged = fold_trees([&a, &b]);
        assert_eq!(merged.value("kills"), Some(30.0));
        assert_eq!(merged.value("deaths"), Some(10.0));
        assert_eq!(merged.value("kdRatio"), Some(3.0));
    }

    #[test]
    fn test_derived_without_inputs_is_dropped() {
        let a = leaves(&[("scorePerMinute", 100.0), ("kdRatio", 1.2)]);
        let merged = fold_trees([&a]);
        assert_eq!(merged.value("scorePerMinute"), None);
        assert_eq!(merged.value("kdRatio"), None);
    }

    #[test]
    fn test_correct_ratio_safe_division_and_rounding() {
        let mut tree = leaves(&[
            ("kills", 7.0),
            ("deaths", 0.0),
            ("hits", 1.0),
            ("shots", 3.0),
            ("wins", 2.0),
            ("losses", 3.0),
            ("scorePerGame", 12.3456),
        ]);
        correct_ratio(&mut tree);
        assert_eq!(tree.value("kdRatio"), Some(0.0));
        assert_eq!(tree.value("accuracy"), Some(33.33));
        assert_eq!(tree.value("wlRatio"), Some(0.67));
        assert_eq!(tree.value("scorePerGame"), Some(12.35));
    }

    #[test]
    fn test_score_rates_recomputed_from_totals() {
        let mut tree = leaves(&[
            ("score", 6000.0),
            ("totalGamesPlayed", 4.0),
            ("timePlayedTotal", 3600.0),
        ]);
        correct_ratio(&mut tree);
        assert_eq!(tree.value("scorePerGame"), Some(1500.0));
        assert_eq!(tree.value("scorePerMinute"), Some(100.0));
    }

    #[test]
    fn test_fold_with_holders_tracks_best_member() {
        let mut a = StatTree::new();
        a.set_group(ALL, leaves(&[("kills", 10.0), ("longestStreak", 4.0)]));
        let mut b = StatTree::new();
        b.set_group(ALL, leaves(&[("kills", 25.0), ("longestStreak", 4.0)]));
        let mut c = StatTree::new();
        c.set_group(ALL, leaves(&[("kills", 0.0), ("longestStreak", 7.0)]));

        let (merged, best) = fold_with_holders(&[("a", &a), ("b", &b), ("c", &c)]);
        let all = merged.group(ALL).unwrap();
        assert_eq!(all.value("kills"), Some(35.0));
        assert_eq!(all.value("longestStreak"), Some(7.0));

        let best_all = best.group(ALL).unwrap();
        assert_eq!(best_all.record("kills").unwrap().uno, "b");
        let streak = best_all.record("longestStreak").unwrap();
        assert_eq!((streak.uno.as_str(), streak.value), ("c", 7.0));
    }

    #[test]
    fn test_tied_best_keeps_first_holder() {
        let a = leaves(&[("longestStreak", 4.0)]);
        let b = leaves(&[("longestStreak", 4.0)]);
        let (_, best) = fold_with_holders(&[("a", &a), ("b", &b)]);
        assert_eq!(best.record("longestStreak").unwrap().uno, "a");
    }

    #[test]
    fn test_zero_values_have_no_holder() {
        let a = leaves(&[("kills", 0.0)]);
        let (_, best) = fold_with_holders(&[("a", &a)]);
        assert!(best.record("kills").is_none());
    }

    #[test]
    fn test_correct_ratios_recurses() {
        let mut tree = StatTree::new();
        let mut weapons = StatTree::new();
        weapons.set_group("ar", leaves(&[("kills", 9.0), ("deaths", 3.0)]));
        tree.set_group("weapon_assault_rifle", weapons);
        correct_ratios(&mut tree);
        let ar = tree
            .group("weapon_assault_rifle")
            .and_then(|g| g.group("ar"))
            .unwrap();
        assert_eq!(ar.value("kdRatio"), Some(3.0));
    }
}
