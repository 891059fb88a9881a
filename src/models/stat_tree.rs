//! Nested numeric stat trees and their best-holder side tables.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Title;

/// Name of the summary leaf group present in every stat group.
pub const ALL: &str = "all";

/// A nested mapping of stat-group names to groups or numeric leaves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatTree(pub BTreeMap<String, StatNode>);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatNode {
    Value(f64),
    Group(StatTree),
}

impl StatTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Numeric leaf by name.
    pub fn value(&self, name: &str) -> Option<f64> {
        match self.0.get(name) {
            Some(StatNode::Value(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn group(&self, name: &str) -> Option<&StatTree> {
        match self.0.get(name) {
            Some(StatNode::Group(tree)) => Some(tree),
            _ => None,
        }
    }

    pub fn set_value(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), StatNode::Value(value));
    }

    pub fn set_group(&mut self, name: impl Into<String>, tree: StatTree) {
        self.0.insert(name.into(), StatNode::Group(tree));
    }

    pub fn remove(&mut self, name: &str) -> Option<StatNode> {
        self.0.remove(name)
    }

    /// Move a node to a new name, replacing anything already there.
    pub fn rename(&mut self, from: &str, to: &str) {
        if let Some(node) = self.0.remove(from) {
            self.0.insert(to.to_string(), node);
        }
    }

    /// Iterate numeric leaves directly under this node.
    pub fn values(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().filter_map(|(name, node)| match node {
            StatNode::Value(v) => Some((name.as_str(), *v)),
            StatNode::Group(_) => None,
        })
    }

    /// Iterate child groups directly under this node.
    pub fn groups(&self) -> impl Iterator<Item = (&str, &StatTree)> {
        self.0.iter().filter_map(|(name, node)| match node {
            StatNode::Group(tree) => Some((name.as_str(), tree)),
            StatNode::Value(_) => None,
        })
    }

    pub fn groups_mut(&mut self) -> impl Iterator<Item = (&String, &mut StatTree)> {
        self.0.iter_mut().filter_map(|(name, node)| match node {
            StatNode::Group(tree) => Some((name, tree)),
            StatNode::Value(_) => None,
        })
    }
}

impl FromIterator<(String, StatNode)> for StatTree {
    fn from_iter<I: IntoIterator<Item = (String, StatNode)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Normalized stats of a target, one tree per title plus the cross-title summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GamesStats {
    #[serde(default)]
    pub titles: BTreeMap<Title, StatTree>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all: Option<StatTree>,
}

/// Member holding the best value of a leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestRecord {
    pub uno: String,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BestTree(pub BTreeMap<String, BestNode>);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BestNode {
    Record(BestRecord),
    Group(BestTree),
}

impl BestTree {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn record(&self, name: &str) -> Option<&BestRecord> {
        match self.0.get(name) {
            Some(BestNode::Record(record)) => Some(record),
            _ => None,
        }
    }

    pub fn group(&self, name: &str) -> Option<&BestTree> {
        match self.0.get(name) {
            Some(BestNode::Group(tree)) => Some(tree),
            _ => None,
        }
    }
}

/// Best holders per title, mirroring [`GamesStats`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BestHolders {
    #[serde(default)]
    pub titles: BTreeMap<Title, BestTree>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all: Option<BestTree>,
}
