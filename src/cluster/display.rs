//! What the renderer sees: display nodes, display edges and cluster records.

use serde::{Deserialize, Serialize};

use crate::model::{Edge, Node};

/// Discriminant of anything drawn on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayEntity {
    /// One grade.
    TopCluster,
    /// One mastery bucket inside an expanded grade.
    LeafCluster,
    /// A real knowledge point.
    RawNode,
}

/// The second-level bucketing predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mastery {
    Mastered,
    NotMastered,
}

impl Mastery {
    pub fn of(node: &Node) -> Self {
        if node.is_mastered() { Mastery::Mastered } else { Mastery::NotMastered }
    }

    pub fn label(self) -> &'static str {
        match self {
            Mastery::Mastered => "mastered",
            Mastery::NotMastered => "not mastered",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "level", content = "mastery", rename_all = "snake_case")]
pub enum ClusterLevel {
    Top,
    Leaf(Mastery),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MasteryCounts {
    pub mastered: usize,
    pub not_mastered: usize,
}

impl MasteryCounts {
    pub fn tally<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Self {
        let mut counts = Self::default();
        for node in nodes {
            counts.add(Mastery::of(node));
        }
        counts
    }

    pub fn add(&mut self, m: Mastery) {
        match m {
            Mastery::Mastered => self.mastered += 1,
            Mastery::NotMastered => self.not_mastered += 1,
        }
    }

    pub fn remove(&mut self, m: Mastery) {
        match m {
            Mastery::Mastered => self.mastered = self.mastered.saturating_sub(1),
            Mastery::NotMastered => self.not_mastered = self.not_mastered.saturating_sub(1),
        }
    }

    pub fn total(&self) -> usize {
        self.mastered + self.not_mastered
    }
}

/// Metadata kept per live cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub level: ClusterLevel,
    /// Group key: the trimmed grade, or the unclassified label.
    pub grade: String,
    pub counts: MasteryCounts,
}

/// A synthetic node standing in for a set of real nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterNode {
    pub id: String,
    pub label: String,
    pub member_node_ids: Vec<String>,
    pub info: ClusterInfo,
}

impl ClusterNode {
    pub(crate) fn new(id: String, member_node_ids: Vec<String>, info: ClusterInfo) -> Self {
        let mut cluster = Self { id, label: String::new(), member_node_ids, info };
        cluster.relabel();
        cluster
    }

    pub fn size(&self) -> usize {
        self.member_node_ids.len()
    }

    pub fn entity(&self) -> DisplayEntity {
        match self.info.level {
            ClusterLevel::Top => DisplayEntity::TopCluster,
            ClusterLevel::Leaf(_) => DisplayEntity::LeafCluster,
        }
    }

    pub(crate) fn relabel(&mut self) {
        self.label = match self.info.level {
            ClusterLevel::Top => format!("{} ({})", self.info.grade, self.size()),
            ClusterLevel::Leaf(m) => format!("{} / {} ({})", self.info.grade, m.label(), self.size()),
        };
    }
}

/// A node as handed to the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayNode {
    pub id: String,
    pub label: String,
    pub entity: DisplayEntity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_count: Option<usize>,
    /// Colour hint for raw nodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mastered: Option<bool>,
}

impl DisplayNode {
    pub(crate) fn cluster(c: &ClusterNode) -> Self {
        Self {
            id: c.id.clone(),
            label: c.label.clone(),
            entity: c.entity(),
            member_count: Some(c.size()),
            mastered: None,
        }
    }

    pub(crate) fn raw(n: &Node) -> Self {
        Self {
            id: n.id.clone(),
            label: n.label().to_string(),
            entity: DisplayEntity::RawNode,
            member_count: None,
            mastered: Some(n.is_mastered()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisplayEdgeKind {
    /// A real edge; `index` points into the engine's edge list.
    Raw { index: usize },
    /// Stands in for `count` underlying edges between two clusters.
    Aggregate { count: usize },
}

/// An edge as handed to the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayEdge {
    pub id: String,
    pub from: String,
    pub to: String,
    pub label: String,
    pub weight: usize,
    #[serde(flatten)]
    pub kind: DisplayEdgeKind,
}

impl DisplayEdge {
    pub(crate) fn raw(id: String, edge: &Edge, index: usize) -> Self {
        Self {
            id,
            from: edge.from.clone(),
            to: edge.to.clone(),
            label: edge.kind.as_str().to_string(),
            weight: 1,
            kind: DisplayEdgeKind::Raw { index },
        }
    }

    pub(crate) fn aggregate(id: String, from: String, to: String, count: usize, max_weight: usize) -> Self {
        Self {
            id,
            from,
            to,
            label: if count > 1 { count.to_string() } else { String::new() },
            weight: count.min(max_weight.max(1)),
            kind: DisplayEdgeKind::Aggregate { count },
        }
    }

    /// Underlying edge count this display edge represents.
    pub fn count(&self) -> usize {
        match self.kind {
            DisplayEdgeKind::Raw { .. } => 1,
            DisplayEdgeKind::Aggregate { count } => count,
        }
    }
}

/// The currently rendered graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayState {
    pub nodes: Vec<DisplayNode>,
    pub edges: Vec<DisplayEdge>,
}

impl DisplayState {
    pub fn node(&self, id: &str) -> Option<&DisplayNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&DisplayEdge> {
        self.edges.iter().find(|e| e.id == id)
    }

    /// Every edge endpoint is a displayed node.
    pub fn is_closed(&self) -> bool {
        let ids: hashbrown::HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        self.edges
            .iter()
            .all(|e| ids.contains(e.from.as_str()) && ids.contains(e.to.as_str()))
    }
}

/// Coarse view of how far the hierarchy has been opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewState {
    /// Nothing loaded.
    Empty,
    /// Only top-level clusters shown.
    Clustered,
    /// A mix of clusters and raw nodes, or second-level clusters.
    PartiallyExpanded,
    /// No clusters left.
    Expanded,
}

/// Displayed vs. original sizes, for status lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayCounts {
    pub shown_nodes: usize,
    pub shown_edges: usize,
    pub total_nodes: usize,
    pub total_edges: usize,
}
