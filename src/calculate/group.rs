//! Group and all-titles stat summaries.

use crate::models::{BestHolders, GamesStats, StatTree, Title};

use super::merge::{fold_trees, fold_with_holders};

/// Fold members' stats into a group view and its best-holder table.
///
/// `members` pairs each member's uno with its normalized stats.
pub fn group_players(members: &[(&str, &GamesStats)]) -> (GamesStats, BestHolders) {
    let mut stats = GamesStats::default();
    let mut best = BestHolders::default();

    for title in Title::ALL {
        let sources: Vec<(&str, &StatTree)> = members
            .iter()
            .filter_map(|(uno, member)| member.titles.get(&title).map(|tree| (*uno, tree)))
            .filter(|(_, tree)| !tree.is_empty())
            .collect();
        if sources.is_empty() {
            continue;
        }

        let (merged, holders) = fold_with_holders(&sources);
        if !merged.is_empty() {
            stats.titles.insert(title, merged);
        }
        if !holders.is_empty() {
            best.titles.insert(title, holders);
        }
    }

    let all_sources: Vec<(&str, &StatTree)> = members
        .iter()
        .filter_map(|(uno, member)| member.all.as_ref().map(|tree| (*uno, tree)))
        .collect();
    if !all_sources.is_empty() {
        let (_, holders) = fold_with_holders(&all_sources);
        best.all = Some(holders).filter(|h| !h.is_empty());
    }

    summary_all_titles(&mut stats);
    (stats, best)
}

/// Rebuild the cross-title summary from scratch.
pub fn summary_all_titles(stats: &mut GamesStats) {
    let merged = fold_trees(stats.titles.values());
    stats.all = if merged.is_empty() { None } else { Some(merged) };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ALL;
    use pretty_assertions::assert_eq;

    fn stats(title: Title, kills: f64, deaths: f64, streak: f64) -> GamesStats {
        let mut all = StatTree::new();
        all.set_value("kills", kills);
        all.set_value("deaths", deaths);
        all.set_value("longestStreak", streak);
        let mut tree = StatTree::new();
        tree.set_group(ALL, all);
        let mut stats = GamesStats::default();
        stats.titles.insert(title, tree);
        summary_all_titles(&mut stats);
        stats
    }

    #[test]
    fn test_summary_all_titles_rebuilds() {
        let mut s = stats(Title::Mw, 10.0, 5.0, 3.0);
        let mut cw = StatTree::new();
        let mut all = StatTree::new();
        all.set_value("kills", 20.0);
        all.set_value("deaths", 5.0);
        all.set_value("longestStreak", 8.0);
        cw.set_group(ALL, all);
        s.titles.insert(Title::Cw, cw);

        summary_all_titles(&mut s);
        summary_all_titles(&mut s);
        let all = s.all.as_ref().unwrap().group(ALL).unwrap();
        assert_eq!(all.value("kills"), Some(30.0));
        assert_eq!(all.value("longestStreak"), Some(8.0));
        assert_eq!(all.value("kdRatio"), Some(3.0));
    }

    #[test]
    fn test_group_players() {
        let a = stats(Title::Mw, 10.0, 10.0, 5.0);
        let b = stats(Title::Mw, 20.0, 0.0, 9.0);
        let c = stats(Title::Cw, 30.0, 10.0, 2.0);
        let (group, best) = group_players(&[("a", &a), ("b", &b), ("c", &c)]);

        let mw = group.titles[&Title::Mw].group(ALL).unwrap();
        assert_eq!(mw.value("kills"), Some(30.0));
        assert_eq!(mw.value("deaths"), Some(10.0));
        assert_eq!(mw.value("kdRatio"), Some(3.0));
        assert_eq!(mw.value("longestStreak"), Some(9.0));

        let mw_best = best.titles[&Title::Mw].group(ALL).unwrap();
        assert_eq!(mw_best.record("kills").unwrap().uno, "b");
        assert_eq!(mw_best.record("deaths").unwrap().uno, "a");

        let all = group.all.as_ref().unwrap().group(ALL).unwrap();
        assert_eq!(all.value("kills"), Some(60.0));
        let all_best = best.all.as_ref().unwrap().group(ALL).unwrap();
        assert_eq!(all_best.record("kills").unwrap().uno, "c");
    }

    #[test]
    fn test_group_players_empty() {
        let (group, best) = group_players(&[]);
        assert_eq!(group, GamesStats::default());
        assert_eq!(best, BestHolders::default());
    }
}
