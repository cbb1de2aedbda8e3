//! # DiffEngine
//!
//! Structural diff of two normalized snapshots of the same student.
//!
//! - Nodes are matched by `uuid`, never by position.
//! - Edges are matched by `(from-uuid, type, to-uuid)`: they carry no
//!   durable id across independently generated snapshots.
//!
//! The diff is directional, "target vs. base": whatever exists only in
//! `target` is *added*. Callers pick which snapshot plays which role.

pub mod summary;

use std::fmt;

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::model::{EdgeKey, MasteryVector, Node, Snapshot};

pub use summary::{DiffSummary, GradeGroup, StatusEntry, TierChange};

/// Node fields compared between snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeField {
    Name,
    Description,
    Grade,
    Subject,
    Publisher,
    Status,
}

impl NodeField {
    pub const ALL: [NodeField; 6] = [
        NodeField::Name,
        NodeField::Description,
        NodeField::Grade,
        NodeField::Subject,
        NodeField::Publisher,
        NodeField::Status,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeField::Name => "name",
            NodeField::Description => "description",
            NodeField::Grade => "grade",
            NodeField::Subject => "subject",
            NodeField::Publisher => "publisher",
            NodeField::Status => "status",
        }
    }

    fn read(self, node: &Node) -> FieldValue {
        let text = |s: &String| FieldValue::Text(s.clone());
        match self {
            NodeField::Name => text(&node.name),
            NodeField::Description => text(&node.description),
            NodeField::Grade => text(&node.grade),
            NodeField::Subject => text(&node.subject),
            NodeField::Publisher => text(&node.publisher),
            NodeField::Status => FieldValue::Status(node.status),
        }
    }
}

impl fmt::Display for NodeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Status(MasteryVector),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Status(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: NodeField,
    pub from: FieldValue,
    pub to: FieldValue,
}

/// A node present in both snapshots with at least one differing field.
/// `node` is the target-side copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedNode {
    pub node: Node,
    pub changes: SmallVec<[FieldChange; 2]>,
}

impl ChangedNode {
    pub fn change(&self, field: NodeField) -> Option<&FieldChange> {
        self.changes.iter().find(|c| c.field == field)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    pub added_nodes: Vec<Node>,
    pub removed_nodes: Vec<Node>,
    pub changed_nodes: Vec<ChangedNode>,
    pub added_edges: Vec<EdgeKey>,
    pub removed_edges: Vec<EdgeKey>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.added_nodes.is_empty()
            && self.removed_nodes.is_empty()
            && self.changed_nodes.is_empty()
            && self.added_edges.is_empty()
            && self.removed_edges.is_empty()
    }

    /// Changed nodes whose mastery vector moved.
    pub fn status_changes(&self) -> impl Iterator<Item = (&ChangedNode, &FieldChange)> {
        self.changed_nodes
            .iter()
            .filter_map(|c| c.change(NodeField::Status).map(|ch| (c, ch)))
    }
}

/// Compute "target vs. base". Neither input is modified.
pub fn diff(base: &Snapshot, target: &Snapshot) -> DiffResult {
    let base_nodes = index_by_uuid(base.nodes());
    let target_nodes = index_by_uuid(target.nodes());

    let mut result = DiffResult::default();

    for (uuid, tn) in unique_in_order(target.nodes()) {
        match base_nodes.get(uuid) {
            None => result.added_nodes.push(tn.clone()),
            Some(bn) => {
                let changes: SmallVec<[FieldChange; 2]> = NodeField::ALL
                    .iter()
                    .filter_map(|&field| {
                        let (from, to) = (field.read(bn), field.read(tn));
                        (from != to).then_some(FieldChange { field, from, to })
                    })
                    .collect();
                if !changes.is_empty() {
                    result.changed_nodes.push(ChangedNode { node: tn.clone(), changes });
                }
            }
        }
    }
    for (uuid, bn) in unique_in_order(base.nodes()) {
        if !target_nodes.contains_key(uuid) {
            result.removed_nodes.push(bn.clone());
        }
    }

    let base_edges = edge_keys(base);
    let target_edges = edge_keys(target);
    let base_set: HashSet<&EdgeKey> = base_edges.iter().collect();
    let target_set: HashSet<&EdgeKey> = target_edges.iter().collect();
    result.added_edges = target_edges.iter().filter(|k| !base_set.contains(k)).cloned().collect();
    result.removed_edges = base_edges.iter().filter(|k| !target_set.contains(k)).cloned().collect();

    tracing::info!(
        student = target.student(),
        base = base.stage(),
        target = target.stage(),
        added = result.added_nodes.len(),
        removed = result.removed_nodes.len(),
        changed = result.changed_nodes.len(),
        added_edges = result.added_edges.len(),
        removed_edges = result.removed_edges.len(),
        "diffed snapshots"
    );
    result
}

/// uuid → node, first occurrence wins.
fn index_by_uuid(nodes: &[Node]) -> HashMap<&str, &Node> {
    let mut map = HashMap::with_capacity(nodes.len());
    for n in nodes {
        map.entry(n.uuid.as_str()).or_insert(n);
    }
    map
}

fn unique_in_order(nodes: &[Node]) -> impl Iterator<Item = (&str, &Node)> {
    let mut seen = HashSet::new();
    nodes
        .iter()
        .filter(move |n| seen.insert(n.uuid.as_str()))
        .map(|n| (n.uuid.as_str(), n))
}

/// Distinct edge identity tuples, in snapshot order. Endpoints are mapped
/// from display id to uuid.
fn edge_keys(snapshot: &Snapshot) -> Vec<EdgeKey> {
    let uuid_of: HashMap<&str, &str> = snapshot
        .nodes()
        .iter()
        .map(|n| (n.id.as_str(), n.uuid.as_str()))
        .collect();
    let resolve = |id: &str| uuid_of.get(id).copied().unwrap_or(id).to_string();

    let mut seen = HashSet::new();
    snapshot
        .edges()
        .iter()
        .map(|e| {
            let mut key = e.key();
            key.from = resolve(&key.from);
            key.to = resolve(&key.to);
            key
        })
        .filter(|k| seen.insert(k.clone()))
        .collect()
}
