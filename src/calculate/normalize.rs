//! Normalize upstream lifetime stat documents into [`StatTree`]s.
//!
//! The provider emits two document shapes: one for Cold War and one shared
//! by the other titles. Both are validated into typed structs before any
//! leaf is touched.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use super::merge::{correct_ratios, fold_trees};
use super::{round2, StatsError};
use crate::models::{StatNode, StatTree, Title, ALL};

const ALL_ADDITIONAL: &str = "all_additional";
const SCORESTREAK: &str = "scorestreak";
const ATTACHMENT: &str = "attachment";

/// Keys duplicated under another name in the summary group.
const DUPLICATED: [&str; 3] = ["gamesPlayed", "winLossRatio", "recordKillStreak"];

/// Cold War summary names and their canonical replacements.
const COLD_WAR_RENAMES: [(&str, &str); 5] = [
    ("kdratio", "kdRatio"),
    ("wlratio", "wlRatio"),
    ("totalShots", "shots"),
    ("longestKillstreak", "longestStreak"),
    ("curWinStreak", "currentWinStreak"),
];

#[derive(Debug, Deserialize)]
struct Properties {
    #[serde(default)]
    properties: BTreeMap<String, Option<f64>>,
}

type Items = BTreeMap<String, Properties>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModernScorestreaks {
    #[serde(default)]
    lethal_scorestreak_data: Items,
    #[serde(default)]
    support_scorestreak_data: Items,
}

/// Lifetime document for Modern Warfare and Vanguard.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModernLifetime {
    all: Properties,
    #[serde(default)]
    item_data: BTreeMap<String, Items>,
    scorestreak_data: ModernScorestreaks,
    accolade_data: Properties,
    #[serde(default)]
    attachment_data: Option<Items>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ColdWarScorestreaks {
    #[serde(default)]
    scorestreak_data: Items,
}

/// Lifetime document for Cold War.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ColdWarLifetime {
    all: Properties,
    #[serde(default)]
    item_data: BTreeMap<String, Items>,
    scorestreak_data: ColdWarScorestreaks,
    #[serde(default)]
    attachment_data: Option<Items>,
}

fn leaves(props: &Properties) -> StatTree {
    props
        .properties
        .iter()
        .filter_map(|(name, value)| value.map(|v| (name.clone(), StatNode::Value(v))))
        .collect()
}

fn items<'a>(items: impl IntoIterator<Item = (&'a String, &'a Properties)>) -> StatTree {
    items
        .into_iter()
        .map(|(name, props)| (name.clone(), StatNode::Group(leaves(props))))
        .collect()
}

fn item_classes(item_data: &BTreeMap<String, Items>, tree: &mut StatTree) {
    for (class, entries) in item_data {
        if class == SCORESTREAK {
            continue;
        }
        tree.set_group(class.clone(), items(entries));
    }
}

fn attachments(attachment_data: &Option<Items>, tree: &mut StatTree) {
    let Some(data) = attachment_data else {
        return;
    };
    let mut group = items(data);
    for (_, attachment) in group.groups_mut() {
        attachment.rename("headShots", "headshots");
    }
    tree.set_group(ATTACHMENT, group);
}

fn modern_tree(doc: &ModernLifetime) -> StatTree {
    let mut tree = StatTree::new();
    let mut all = leaves(&doc.all);
    for key in DUPLICATED {
        all.remove(key);
    }
    all.rename("bestKillStreak", "longestStreak");
    tree.set_group(ALL, all);
    tree.set_group(ALL_ADDITIONAL, leaves(&doc.accolade_data));

    item_classes(&doc.item_data, &mut tree);
    let streaks = &doc.scorestreak_data;
    tree.set_group(
        SCORESTREAK,
        items(
            streaks
                .lethal_scorestreak_data
                .iter()
                .chain(streaks.support_scorestreak_data.iter()),
        ),
    );
    attachments(&doc.attachment_data, &mut tree);
    tree
}

fn cold_war_tree(doc: &ColdWarLifetime) -> StatTree {
    let mut tree = StatTree::new();
    let mut all = leaves(&doc.all);
    for key in DUPLICATED {
        all.remove(key);
    }
    for (from, to) in COLD_WAR_RENAMES {
        all.rename(from, to);
    }
    tree.set_group(ALL, all);

    item_classes(&doc.item_data, &mut tree);
    tree.set_group(SCORESTREAK, items(&doc.scorestreak_data.scorestreak_data));
    attachments(&doc.attachment_data, &mut tree);
    tree
}

/// Upstream reports accuracy as a fraction.
fn accuracy_to_percent(tree: &mut StatTree) {
    if let Some(v) = tree.value("accuracy") {
        tree.set_value("accuracy", v * 100.0);
    }
    for (_, group) in tree.groups_mut() {
        accuracy_to_percent(group);
    }
}

/// Drop zero leaves and empty groups; round what remains.
fn strip_and_round(tree: &mut StatTree) {
    tree.0.retain(|_, node| match node {
        StatNode::Value(v) => {
            *v = round2(*v);
            *v != 0.0 && v.is_finite()
        }
        StatNode::Group(group) => {
            strip_and_round(group);
            !group.is_empty()
        }
    });
}

/// Give every item group a summary `all` entry folded from its items.
fn add_group_summaries(tree: &mut StatTree) {
    for (name, group) in tree.groups_mut() {
        if name == ALL || name == ALL_ADDITIONAL {
            continue;
        }
        let summary = fold_trees(group.groups().map(|(_, item)| item));
        if !summary.is_empty() {
            group.set_group(ALL, summary);
        }
    }
}

/// Validate and normalize an upstream lifetime document for `title`.
pub fn normalize_upstream(document: &Value, title: Title) -> Result<StatTree, StatsError> {
    let invalid = |e: serde_json::Error| StatsError::InvalidDocument {
        title,
        reason: e.to_string(),
    };
    let mut tree = match title {
        Title::Cw => cold_war_tree(&ColdWarLifetime::deserialize(document).map_err(invalid)?),
        Title::Mw | Title::Vg => {
            modern_tree(&ModernLifetime::deserialize(document).map_err(invalid)?)
        }
    };

    accuracy_to_percent(&mut tree);
    strip_and_round(&mut tree);
    add_group_summaries(&mut tree);
    correct_ratios(&mut tree);
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn modern_doc() -> Value {
        json!({
            "all": {"properties": {
                "kills": 300.0, "deaths": 100.0, "kdRatio": 2.9,
                "gamesPlayed": 10.0, "totalGamesPlayed": 10.0,
                "bestKillStreak": 12.0, "accuracy": 0.25,
                "wins": 6.0, "losses": 4.0, "winLossRatio": 1.5,
                "score": 5000.0, "scorePerGame": 500.0,
                "suicides": 0.0, "recordKillStreak": 12.0
            }},
            "itemData": {
                "weapon_assault_rifle": {
                    "iw8_ar_kilo433": {"properties": {"kills": 40.0, "deaths": 20.0, "hits": 100.0, "shots": 400.0, "accuracy": 0.25}},
                    "iw8_ar_falima": {"properties": {"kills": 10.0, "deaths": 10.0, "hits": 0.0, "shots": 0.0}}
                },
                "scorestreak": {"ignored": {"properties": {"uses": 3.0}}}
            },
            "scorestreakData": {
                "lethalScorestreakData": {"cruise_predator": {"properties": {"uses": 4.0, "awardedCount": 0.0}}},
                "supportScorestreakData": {"radar_drone_overwatch": {"properties": {"uses": 2.0}}}
            },
            "accoladeData": {"properties": {"mostKillsLeastDeaths": 3.0, "noKillsWithDeath": 0.0}},
            "attachmentData": {
                "mz_mike4": {"properties": {"headShots": 5.0, "kills": 20.0}}
            }
        })
    }

    #[test]
    fn test_normalize_modern_document() {
        let tree = normalize_upstream(&modern_doc(), Title::Mw).unwrap();
        let all = tree.group(ALL).unwrap();

        assert_eq!(all.value("gamesPlayed"), None);
        assert_eq!(all.value("winLossRatio"), None);
        assert_eq!(all.value("recordKillStreak"), None);
        assert_eq!(all.value("longestStreak"), Some(12.0));
        assert_eq!(all.value("bestKillStreak"), None);
        assert_eq!(all.value("suicides"), None);
        assert_eq!(all.value("kdRatio"), Some(3.0));
        assert_eq!(all.value("wlRatio"), Some(1.5));
        assert_eq!(all.value("accuracy"), Some(25.0));

        let additional = tree.group(ALL_ADDITIONAL).unwrap();
        assert_eq!(additional.value("mostKillsLeastDeaths"), Some(3.0));
        assert_eq!(additional.value("noKillsWithDeath"), None);

        let streaks = tree.group(SCORESTREAK).unwrap();
        assert!(streaks.group("cruise_predator").is_some());
        assert!(streaks.group("radar_drone_overwatch").is_some());
        assert!(streaks.group("ignored").is_none());
        assert_eq!(streaks.group(ALL).unwrap().value("uses"), Some(6.0));

        let attachment = tree.group(ATTACHMENT).unwrap().group("mz_mike4").unwrap();
        assert_eq!(attachment.value("headshots"), Some(5.0));
        assert_eq!(attachment.value("headShots"), None);
    }

    #[test]
    fn test_item_group_summary() {
        let tree = normalize_upstream(&modern_doc(), Title::Mw).unwrap();
        let rifles = tree.group("weapon_assault_rifle").unwrap();
        let summary = rifles.group(ALL).unwrap();
        assert_eq!(summary.value("kills"), Some(50.0));
        assert_eq!(summary.value("deaths"), Some(30.0));
        assert_eq!(summary.value("kdRatio"), Some(1.67));
        assert_eq!(summary.value("accuracy"), Some(25.0));

        let falima = rifles.group("iw8_ar_falima").unwrap();
        assert_eq!(falima.value("hits"), None);
        assert_eq!(falima.value("kdRatio"), Some(1.0));
    }

    #[test]
    fn test_normalize_cold_war_document() {
        let doc = json!({
            "all": {"properties": {
                "kills": 50.0, "deaths": 25.0, "kdratio": 1.9,
                "wins": 3.0, "losses": 1.0, "wlratio": 3.0,
                "totalShots": 1000.0, "hits": 250.0,
                "longestKillstreak": 9.0, "curWinStreak": 2.0
            }},
            "itemData": {},
            "scorestreakData": {"scorestreakData": {
                "hover_jet": {"properties": {"uses": 1.0}}
            }}
        });
        let tree = normalize_upstream(&doc, Title::Cw).unwrap();
        let all = tree.group(ALL).unwrap();
        assert_eq!(all.value("kdRatio"), Some(2.0));
        assert_eq!(all.value("kdratio"), None);
        assert_eq!(all.value("wlRatio"), Some(3.0));
        assert_eq!(all.value("shots"), Some(1000.0));
        assert_eq!(all.value("accuracy"), Some(25.0));
        assert_eq!(all.value("longestStreak"), Some(9.0));
        assert_eq!(all.value("currentWinStreak"), Some(2.0));
        assert!(tree.group(SCORESTREAK).unwrap().group("hover_jet").is_some());
        assert!(tree.group(ALL_ADDITIONAL).is_none());
    }

    #[test]
    fn test_rejects_wrong_shape() {
        let doc = json!({"all": {"properties": {"kills": 1.0}}});
        let err = normalize_upstream(&doc, Title::Mw).unwrap_err();
        assert!(matches!(err, StatsError::InvalidDocument { title: Title::Mw, .. }));

        let doc = json!({"all": {"properties": {"kills": "many"}}, "scorestreakData": {}});
        assert!(normalize_upstream(&doc, Title::Cw).is_err());
    }

    #[test]
    fn test_rounds_non_integers() {
        let mut doc = modern_doc();
        doc["all"]["properties"]["timePlayedTotal"] = json!(123.456);
        let tree = normalize_upstream(&doc, Title::Vg).unwrap();
        assert_eq!(tree.group(ALL).unwrap().value("timePlayedTotal"), Some(123.46));
    }
}
