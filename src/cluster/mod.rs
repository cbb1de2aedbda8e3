//! # ClusterEngine
//!
//! Keeps a large curriculum graph drawable by folding nodes into a
//! two-level hierarchy and unfolding it on demand:
//!
//! ```text
//!   TopCluster (grade) ──expand_top_level──► LeafCluster (grade × mastery)
//!        │                                         │
//!        └───────────────expand_leaf───────────────┴──► RawNode
//!
//!   expand_all  ──► every node raw
//!   collapse_all ──► back to top-level clusters
//! ```
//!
//! Every node has exactly one owner at all times: either the live cluster
//! that contains it, or itself as a displayed raw node. Display edges are
//! re-derived from ownership after every transition, so an edge can never
//! outlive one of its endpoints.
//!
//! Unknown or stale ids are no-ops: the renderer may race ahead of state.

pub mod display;

use hashbrown::{HashMap, HashSet};

use crate::config::EngineConfig;
use crate::ident::{encode_key, IdAllocator};
use crate::model::{Edge, Node, Snapshot};
use crate::{Error, Result};

pub use display::{
    ClusterInfo, ClusterLevel, ClusterNode, DisplayCounts, DisplayEdge, DisplayEdgeKind,
    DisplayEntity, DisplayNode, DisplayState, Mastery, MasteryCounts, ViewState,
};

// ============================================================================
// Diagnostics
// ============================================================================

/// Invariant violations noticed while clustering. Rendering continues in
/// best-effort form; callers decide how loudly to report these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Clustered node total differs from the node set.
    NodeCountMismatch { expected: usize, clustered: usize, distinct: usize },
    /// The input repeated a node id (input was not normalized).
    DuplicateNodeId(String),
    /// No free cluster id within the configured attempts.
    DuplicateClusterId { base: String, attempts: usize },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::NodeCountMismatch { expected, clustered, distinct } => write!(
                f,
                "clustered {clustered} node slots ({distinct} distinct) for {expected} nodes"
            ),
            Diagnostic::DuplicateNodeId(id) => write!(f, "duplicate node id {id}"),
            Diagnostic::DuplicateClusterId { base, attempts } => {
                write!(f, "no unique cluster id for {base} after {attempts} attempts")
            }
        }
    }
}

// ============================================================================
// Transition results
// ============================================================================

/// Outcome of a double-click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation<'a> {
    /// A grade was split into mastery buckets.
    Drilled,
    /// A cluster was replaced by its members.
    Expanded,
    /// A raw node was hit; hand it to the detail view.
    Inspect(&'a Node),
    /// Not on screen.
    Ignored,
}

/// Result of a click on a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selected<'a> {
    Node(&'a Node),
    Cluster(&'a ClusterNode),
}

/// Result of a click on an edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectedEdge<'a> {
    Raw { shown: &'a DisplayEdge, edge: &'a Edge },
    Aggregate(&'a DisplayEdge),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Owner {
    Raw,
    Cluster(String),
}

// ============================================================================
// ClusterEngine
// ============================================================================

/// Owns one graph's display hierarchy. Independent instances never share
/// state, so several graphs can be browsed side by side.
#[derive(Debug, Clone, Default)]
pub struct ClusterEngine {
    config: EngineConfig,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    /// node id → position in `nodes` (first occurrence)
    node_index: HashMap<String, usize>,
    /// cluster id → cluster (members + info)
    clusters: HashMap<String, ClusterNode>,
    /// node id → where it is currently shown
    owner: HashMap<String, Owner>,
    /// displayed entity ids, in draw order
    order: Vec<String>,
    display: DisplayState,
    /// display node ids handed out since the last rebuild
    ids: IdAllocator,
    diagnostics: Vec<Diagnostic>,
}

impl ClusterEngine {
    /// Take ownership of a normalized graph and build the top level.
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>, config: EngineConfig) -> Self {
        let mut engine = Self { config, ..Self::default() };
        engine.reset(nodes, edges);
        engine
    }

    pub fn from_snapshot(snapshot: &Snapshot, config: EngineConfig) -> Self {
        Self::new(snapshot.nodes().to_vec(), snapshot.edges().to_vec(), config)
    }

    /// Replace the whole graph and rebuild the top level.
    pub fn reset(&mut self, nodes: Vec<Node>, edges: Vec<Edge>) {
        self.node_index.clear();
        for (i, node) in nodes.iter().enumerate() {
            self.node_index.entry(node.id.clone()).or_insert(i);
        }
        self.nodes = nodes;
        self.edges = edges;
        self.build_top_level();
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &EngineConfig { &self.config }
    pub fn all_nodes(&self) -> &[Node] { &self.nodes }
    pub fn all_edges(&self) -> &[Edge] { &self.edges }
    pub fn display(&self) -> &DisplayState { &self.display }
    pub fn diagnostics(&self) -> &[Diagnostic] { &self.diagnostics }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.node_index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn cluster(&self, id: &str) -> Option<&ClusterNode> {
        self.clusters.get(id)
    }

    /// Member node ids of a live cluster.
    pub fn cluster_members(&self, id: &str) -> Option<&[String]> {
        self.clusters.get(id).map(|c| c.member_node_ids.as_slice())
    }

    /// Level, grade and mastery counts of a live cluster.
    pub fn cluster_info(&self, id: &str) -> Option<&ClusterInfo> {
        self.clusters.get(id).map(|c| &c.info)
    }

    /// Live cluster ids in draw order.
    pub fn cluster_ids(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter(|id| self.clusters.contains_key(id.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// What kind of thing is drawn under `id`, if anything.
    pub fn entity(&self, id: &str) -> Option<DisplayEntity> {
        if let Some(c) = self.clusters.get(id) {
            return Some(c.entity());
        }
        match self.owner.get(id) {
            Some(Owner::Raw) => Some(DisplayEntity::RawNode),
            _ => None,
        }
    }

    pub fn view_state(&self) -> ViewState {
        if self.order.is_empty() {
            return ViewState::Empty;
        }
        let mut tops = 0;
        let mut others = 0;
        for id in &self.order {
            match self.entity(id) {
                Some(DisplayEntity::TopCluster) => tops += 1,
                Some(_) => others += 1,
                None => {}
            }
        }
        if self.clusters.is_empty() {
            ViewState::Expanded
        } else if others == 0 && tops > 0 {
            ViewState::Clustered
        } else {
            ViewState::PartiallyExpanded
        }
    }

    pub fn counts(&self) -> DisplayCounts {
        DisplayCounts {
            shown_nodes: self.display.nodes.len(),
            shown_edges: self.display.edges.len(),
            total_nodes: self.nodes.len(),
            total_edges: self.edges.len(),
        }
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Group every node by grade into top-level clusters and aggregate the
    /// edges between them. Discards any expansion state.
    pub fn build_top_level(&mut self) {
        self.clusters.clear();
        self.owner.clear();
        self.order.clear();
        self.diagnostics.clear();
        self.ids = IdAllocator::reserving(self.nodes.iter().map(|n| n.id.clone()));

        let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
        let mut slot: HashMap<String, usize> = HashMap::new();
        for (i, node) in self.nodes.iter().enumerate() {
            let key = node
                .grade_key()
                .unwrap_or(self.config.unclassified_label.as_str())
                .to_string();
            let g = *slot.entry(key.clone()).or_insert_with(|| {
                groups.push((key, Vec::new()));
                groups.len() - 1
            });
            groups[g].1.push(i);
        }

        for (grade, members) in groups {
            let base = format!("{}{}", self.config.top_prefix, encode_key(&grade));
            let id = self.allocate_cluster_id(&base);
            let counts = MasteryCounts::tally(members.iter().map(|&i| &self.nodes[i]));
            let member_ids: Vec<String> = members.iter().map(|&i| self.nodes[i].id.clone()).collect();
            for m in &member_ids {
                self.owner.insert(m.clone(), Owner::Cluster(id.clone()));
            }
            let info = ClusterInfo { level: ClusterLevel::Top, grade, counts };
            self.order.push(id.clone());
            self.clusters.insert(id.clone(), ClusterNode::new(id, member_ids, info));
        }

        if let Err(e) = self.check_conservation() {
            tracing::warn!(error = %e, "node conservation violated after clustering");
        }
        self.refresh();
        tracing::debug!(
            clusters = self.clusters.len(),
            nodes = self.nodes.len(),
            edges = self.display.edges.len(),
            "built top-level clusters"
        );
    }

    /// Split one grade into its mastered / not-mastered buckets. Only valid
    /// on a top-level cluster; anything else is a no-op returning `false`.
    ///
    /// Other clusters keep their edges; the new buckets are linked only by
    /// edges running inside this grade.
    pub fn expand_top_level(&mut self, cluster_id: &str) -> bool {
        let Some(cluster) = self.clusters.get(cluster_id) else {
            return false;
        };
        if cluster.info.level != ClusterLevel::Top {
            return false;
        }
        let Some(cluster) = self.clusters.remove(cluster_id) else {
            return false;
        };

        let mut buckets: [(Mastery, Vec<String>); 2] = [
            (Mastery::Mastered, Vec::new()),
            (Mastery::NotMastered, Vec::new()),
        ];
        for member in &cluster.member_node_ids {
            let m = self.node(member).map(Mastery::of).unwrap_or(Mastery::NotMastered);
            let b = if m == Mastery::Mastered { 0 } else { 1 };
            buckets[b].1.push(member.clone());
        }

        let pos = self.order.iter().position(|id| id == cluster_id).unwrap_or(self.order.len());
        self.order.retain(|id| id != cluster_id);
        let mut insert_at = pos.min(self.order.len());

        for (mastery, members) in buckets {
            // An empty predicate bucket is not drawn.
            if members.is_empty() {
                continue;
            }
            let tag = match mastery {
                Mastery::Mastered => &self.config.mastered_tag,
                Mastery::NotMastered => &self.config.not_mastered_tag,
            };
            let base = format!("{cluster_id}_{tag}");
            let id = self.allocate_cluster_id(&base);
            let counts = MasteryCounts::tally(members.iter().filter_map(|m| self.node(m)));
            for m in &members {
                self.owner.insert(m.clone(), Owner::Cluster(id.clone()));
            }
            let info = ClusterInfo {
                level: ClusterLevel::Leaf(mastery),
                grade: cluster.info.grade.clone(),
                counts,
            };
            self.order.insert(insert_at, id.clone());
            insert_at += 1;
            self.clusters.insert(id.clone(), ClusterNode::new(id, members, info));
        }

        self.refresh();
        tracing::debug!(cluster = cluster_id, grade = %cluster.info.grade, "expanded grade cluster");
        true
    }

    /// Replace any cluster with its raw members. Nodes on the far side of
    /// the members' edges are drawn too, pulled out of whichever cluster
    /// held them, so every revealed edge has both endpoints on screen.
    pub fn expand_leaf(&mut self, cluster_id: &str) -> bool {
        let Some(cluster) = self.clusters.remove(cluster_id) else {
            return false;
        };
        let members: HashSet<&str> = cluster.member_node_ids.iter().map(String::as_str).collect();

        let mut outside: Vec<String> = Vec::new();
        let mut queued: HashSet<&str> = HashSet::new();
        for edge in &self.edges {
            let (from_in, to_in) = (members.contains(edge.from.as_str()), members.contains(edge.to.as_str()));
            if from_in == to_in {
                continue;
            }
            let near = if from_in { &edge.from } else { &edge.to };
            let Some(other) = edge.other_end(near) else {
                continue;
            };
            if matches!(self.owner.get(other), Some(Owner::Cluster(_))) && queued.insert(other) {
                outside.push(other.to_string());
            }
        }
        drop(queued);
        drop(members);

        let pos = self.order.iter().position(|id| id == cluster_id).unwrap_or(self.order.len());
        self.order.retain(|id| id != cluster_id);
        for m in &cluster.member_node_ids {
            self.owner.insert(m.clone(), Owner::Raw);
        }
        let tail = self.order.split_off(pos.min(self.order.len()));
        self.order.extend(cluster.member_node_ids.iter().cloned());
        self.order.extend(tail);

        self.detach_all(&outside);
        for id in outside {
            self.owner.insert(id.clone(), Owner::Raw);
            self.order.push(id);
        }

        self.refresh();
        tracing::debug!(cluster = cluster_id, members = cluster.size(), "expanded cluster to raw nodes");
        true
    }

    /// Drop the hierarchy and show every node and every edge whose
    /// endpoints exist.
    pub fn expand_all(&mut self) {
        self.clusters.clear();
        self.owner.clear();
        self.order.clear();
        for node in &self.nodes {
            if self.owner.insert(node.id.clone(), Owner::Raw).is_none() {
                self.order.push(node.id.clone());
            }
        }
        self.refresh();
        tracing::debug!(nodes = self.order.len(), "expanded all clusters");
    }

    /// Back to the grade view, discarding deeper expansion state.
    pub fn collapse_all(&mut self) {
        self.build_top_level();
    }

    /// Go back one level. The hierarchy is shallow, so this is the grade view.
    pub fn back_to_top_level(&mut self) {
        self.collapse_all();
    }

    /// Double-click: dispatch on what is drawn under `id`.
    pub fn activate(&mut self, id: &str) -> Activation<'_> {
        match self.entity(id) {
            Some(DisplayEntity::TopCluster) => {
                self.expand_top_level(id);
                Activation::Drilled
            }
            Some(DisplayEntity::LeafCluster) => {
                self.expand_leaf(id);
                Activation::Expanded
            }
            Some(DisplayEntity::RawNode) => match self.node(id) {
                Some(node) => Activation::Inspect(node),
                None => Activation::Ignored,
            },
            None => Activation::Ignored,
        }
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    /// Click on a node: detail lookup among what is displayed.
    pub fn select(&self, id: &str) -> Option<Selected<'_>> {
        match self.entity(id)? {
            DisplayEntity::RawNode => self.node(id).map(Selected::Node),
            _ => self.clusters.get(id).map(Selected::Cluster),
        }
    }

    /// Click on an edge: detail lookup among what is displayed.
    pub fn select_edge(&self, id: &str) -> Option<SelectedEdge<'_>> {
        let shown = self.display.edge(id)?;
        Some(match shown.kind {
            DisplayEdgeKind::Raw { index } => SelectedEdge::Raw { shown, edge: self.edges.get(index)? },
            DisplayEdgeKind::Aggregate { .. } => SelectedEdge::Aggregate(shown),
        })
    }

    // ========================================================================
    // Invariants
    // ========================================================================

    /// Every node is owned exactly once: inside one live cluster or drawn
    /// raw. Holds after every transition.
    pub fn check_conservation(&mut self) -> Result<()> {
        let (slots, distinct) = self.ownership_tally();
        let duplicate_ids = self.duplicate_node_ids();
        let expected = self.nodes.len();

        for id in duplicate_ids {
            self.push_diagnostic(Diagnostic::DuplicateNodeId(id));
        }
        if slots == expected && distinct == expected {
            return Ok(());
        }
        let diag = Diagnostic::NodeCountMismatch { expected, clustered: slots, distinct };
        let message = diag.to_string();
        self.push_diagnostic(diag);
        Err(Error::InvariantViolation(message))
    }

    /// (owner slots, distinct owned node ids) over live clusters and raw nodes.
    fn ownership_tally(&self) -> (usize, usize) {
        let mut seen: HashSet<&str> = HashSet::with_capacity(self.nodes.len());
        let mut slots = 0usize;
        for cluster in self.clusters.values() {
            for m in &cluster.member_node_ids {
                slots += 1;
                seen.insert(m.as_str());
            }
        }
        for id in &self.order {
            if !self.clusters.contains_key(id.as_str()) && self.node_index.contains_key(id.as_str()) {
                slots += 1;
                seen.insert(id.as_str());
            }
        }
        (slots, seen.len())
    }

    fn duplicate_node_ids(&self) -> Vec<String> {
        if self.node_index.len() == self.nodes.len() {
            return Vec::new();
        }
        let mut firsts: HashSet<&str> = HashSet::new();
        self.nodes
            .iter()
            .filter(|n| !firsts.insert(n.id.as_str()))
            .map(|n| n.id.clone())
            .collect()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn push_diagnostic(&mut self, diag: Diagnostic) {
        if !self.diagnostics.contains(&diag) {
            tracing::warn!(diagnostic = %diag, "cluster invariant violated");
            self.diagnostics.push(diag);
        }
    }

    fn allocate_cluster_id(&mut self, base: &str) -> String {
        let attempts = self.config.max_id_attempts;
        match self.ids.try_allocate(base, attempts) {
            Ok(id) => id,
            Err(_) => {
                self.push_diagnostic(Diagnostic::DuplicateClusterId { base: base.to_string(), attempts });
                self.ids.allocate(base)
            }
        }
    }

    /// Take nodes out of their clusters, one pass per touched cluster.
    /// Clusters left empty disappear.
    fn detach_all(&mut self, node_ids: &[String]) {
        let mut by_cluster: HashMap<String, HashSet<&str>> = HashMap::new();
        for id in node_ids {
            if let Some(Owner::Cluster(cid)) = self.owner.get(id) {
                by_cluster.entry(cid.clone()).or_default().insert(id.as_str());
            }
        }

        let mut emptied: HashSet<String> = HashSet::new();
        for (cid, leaving) in &by_cluster {
            let Some(cluster) = self.clusters.get_mut(cid) else {
                continue;
            };
            cluster.member_node_ids.retain(|m| !leaving.contains(m.as_str()));
            cluster.info.counts = MasteryCounts::tally(
                cluster.member_node_ids.iter().filter_map(|m| {
                    self.node_index.get(m).map(|&i| &self.nodes[i])
                }),
            );
            cluster.relabel();
            if cluster.member_node_ids.is_empty() {
                emptied.insert(cid.clone());
            }
        }
        if !emptied.is_empty() {
            self.clusters.retain(|cid, _| !emptied.contains(cid));
            self.order.retain(|id| !emptied.contains(id));
        }
        for id in node_ids {
            self.owner.remove(id);
        }
    }

    /// Two clusters get an aggregate edge when both are grades, or both are
    /// buckets of the same grade.
    fn linkable(&self, a: &str, b: &str) -> bool {
        match (self.clusters.get(a), self.clusters.get(b)) {
            (Some(x), Some(y)) => match (x.info.level, y.info.level) {
                (ClusterLevel::Top, ClusterLevel::Top) => true,
                (ClusterLevel::Leaf(_), ClusterLevel::Leaf(_)) => x.info.grade == y.info.grade,
                _ => false,
            },
            _ => false,
        }
    }

    /// Re-derive display nodes and edges from ownership.
    fn refresh(&mut self) {
        let nodes: Vec<DisplayNode> = self
            .order
            .iter()
            .filter_map(|id| match self.clusters.get(id) {
                Some(c) => Some(DisplayNode::cluster(c)),
                None => self.node(id).map(DisplayNode::raw),
            })
            .collect();

        let mut edge_ids = IdAllocator::new();
        let mut edges = Vec::new();
        let mut aggregates: Vec<(String, String, usize)> = Vec::new();
        let mut slot: HashMap<(&str, &str), usize> = HashMap::new();

        for (index, edge) in self.edges.iter().enumerate() {
            let (Some(a), Some(b)) = (self.owner.get(&edge.from), self.owner.get(&edge.to)) else {
                continue;
            };
            match (a, b) {
                (Owner::Raw, Owner::Raw) => {
                    edges.push(DisplayEdge::raw(edge_ids.allocate(&edge.id), edge, index));
                }
                (Owner::Cluster(x), Owner::Cluster(y)) if x != y && self.linkable(x, y) => {
                    let key = if x <= y { (x.as_str(), y.as_str()) } else { (y.as_str(), x.as_str()) };
                    match slot.get(&key) {
                        Some(&i) => aggregates[i].2 += 1,
                        None => {
                            slot.insert(key, aggregates.len());
                            aggregates.push((x.clone(), y.clone(), 1));
                        }
                    }
                }
                _ => {}
            }
        }
        for (from, to, count) in aggregates {
            let base = format!("{}{from}-{to}", self.config.aggregate_edge_prefix);
            let id = edge_ids.allocate(&base);
            edges.push(DisplayEdge::aggregate(id, from, to, count, self.config.max_edge_weight));
        }

        self.display = DisplayState { nodes, edges };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RelationKind;

    fn node(id: &str, grade: &str, status: [u8; 3]) -> Node {
        Node::new(id).with_name(id).with_grade(grade).with_status(status)
    }

    fn edge(id: &str, from: &str, to: &str) -> Edge {
        Edge::new(id, from, to, RelationKind::Prerequisite)
    }

    fn engine() -> ClusterEngine {
        ClusterEngine::new(
            vec![
                node("a", "G1", [1, 0, 0]),
                node("b", "G1", [0, 0, 0]),
                node("c", "G2", [0, 1, 0]),
                node("d", "", [0, 0, 0]),
            ],
            vec![edge("e1", "a", "b"), edge("e2", "b", "c"), edge("e3", "c", "d"), edge("e4", "a", "ghost")],
            EngineConfig::default(),
        )
    }

    fn top_id(engine: &ClusterEngine, grade: &str) -> String {
        engine
            .cluster_ids()
            .into_iter()
            .find(|id| engine.cluster_info(id).is_some_and(|i| i.grade == grade && i.level == ClusterLevel::Top))
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_top_level_groups() {
        let e = engine();
        assert_eq!(e.cluster_ids().len(), 3);
        assert_eq!(e.view_state(), ViewState::Clustered);
        let g1 = top_id(&e, "G1");
        assert_eq!(e.cluster_members(&g1).unwrap(), ["a", "b"]);
        let info = e.cluster_info(&g1).unwrap();
        assert_eq!(info.counts, MasteryCounts { mastered: 1, not_mastered: 1 });
        assert!(e.cluster_info(&top_id(&e, "Unclassified")).is_some());
        assert!(e.diagnostics().is_empty());
    }

    #[test]
    fn test_aggregate_edges_skip_self_loops_and_dangling() {
        let e = engine();
        // a-b is inside G1, a-ghost dangles; b-c and c-d cross clusters.
        assert_eq!(e.display().edges.len(), 2);
        assert!(e.display().edges.iter().all(|x| x.count() == 1));
        assert!(e.display().is_closed());
    }

    #[test]
    fn test_expand_top_level_keeps_other_clusters() {
        let mut e = engine();
        let g1 = top_id(&e, "G1");
        let g2 = top_id(&e, "G2");
        let un = top_id(&e, "Unclassified");
        assert!(e.expand_top_level(&g1));
        assert!(e.cluster(&g1).is_none());
        let mastered = format!("{g1}_mastered");
        let not_mastered = format!("{g1}_not_mastered");
        assert_eq!(e.entity(&mastered), Some(DisplayEntity::LeafCluster));
        assert_eq!(e.cluster_members(&not_mastered).unwrap(), ["b"]);
        // Leaf buckets link to each other only; G2-Unclassified survives.
        let pairs: Vec<(&str, &str)> = e.display().edges.iter().map(|x| (x.from.as_str(), x.to.as_str())).collect();
        assert!(pairs.contains(&(mastered.as_str(), not_mastered.as_str())));
        assert!(pairs.contains(&(g2.as_str(), un.as_str())));
        assert_eq!(pairs.len(), 2);
        assert_eq!(e.view_state(), ViewState::PartiallyExpanded);
    }

    #[test]
    fn test_expand_top_level_rejects_leaf() {
        let mut e = engine();
        let g1 = top_id(&e, "G1");
        e.expand_top_level(&g1);
        let leaf = format!("{g1}_mastered");
        let before = e.display().clone();
        assert!(!e.expand_top_level(&leaf));
        assert_eq!(e.display(), &before);
    }

    #[test]
    fn test_expand_leaf_pulls_neighbours_out() {
        let mut e = engine();
        let g2 = top_id(&e, "G2");
        assert!(e.expand_leaf(&g2));
        // c is raw; its neighbours b (from G1) and d (from Unclassified) too.
        for id in ["b", "c", "d"] {
            assert_eq!(e.entity(id), Some(DisplayEntity::RawNode), "{id}");
        }
        let g1 = top_id(&e, "G1");
        assert_eq!(e.cluster_members(&g1).unwrap(), ["a"]);
        // Unclassified lost its only member.
        assert_eq!(e.cluster_ids().len(), 1);
        assert!(e.display().is_closed());
        e.check_conservation().unwrap();
    }

    #[test]
    fn test_expand_leaf_twice_is_noop() {
        let mut e = engine();
        let g1 = top_id(&e, "G1");
        assert!(e.expand_leaf(&g1));
        let once = e.display().clone();
        assert!(!e.expand_leaf(&g1));
        assert_eq!(e.display(), &once);
    }

    #[test]
    fn test_expand_all_and_collapse() {
        let mut e = engine();
        e.expand_all();
        assert_eq!(e.view_state(), ViewState::Expanded);
        assert_eq!(e.display().nodes.len(), 4);
        // e4 points at a node that does not exist.
        assert_eq!(e.display().edges.len(), 3);
        e.collapse_all();
        assert_eq!(e.view_state(), ViewState::Clustered);
        assert_eq!(e.cluster_ids().len(), 3);
    }

    #[test]
    fn test_activate_state_machine() {
        let mut e = engine();
        let g1 = top_id(&e, "G1");
        assert_eq!(e.activate(&g1), Activation::Drilled);
        let leaf = format!("{g1}_mastered");
        assert_eq!(e.activate(&leaf), Activation::Expanded);
        match e.activate("a") {
            Activation::Inspect(n) => assert_eq!(n.id, "a"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(e.activate("nope"), Activation::Ignored);
    }

    #[test]
    fn test_select_only_displayed() {
        let mut e = engine();
        assert!(e.select("a").is_none());
        let g1 = top_id(&e, "G1");
        assert!(matches!(e.select(&g1), Some(Selected::Cluster(c)) if c.size() == 2));
        e.expand_all();
        assert!(matches!(e.select("a"), Some(Selected::Node(n)) if n.id == "a"));
        assert!(matches!(e.select_edge("e1"), Some(SelectedEdge::Raw { edge, .. }) if edge.id == "e1"));
        assert!(e.select_edge("e4").is_none());
    }

    #[test]
    fn test_duplicate_node_ids_surface_diagnostic() {
        let e = ClusterEngine::new(
            vec![node("a", "G1", [0, 0, 0]), node("a", "G1", [1, 0, 0])],
            vec![],
            EngineConfig::default(),
        );
        assert!(e.diagnostics().contains(&Diagnostic::DuplicateNodeId("a".into())));
        assert!(e.diagnostics().iter().any(|d| matches!(d, Diagnostic::NodeCountMismatch { .. })));
    }

    #[test]
    fn test_expand_leaf_detaches_many_neighbours_at_once() {
        // "A" holds 3000 nodes, each linked to its own partner in "B" (3000
        // of 4000), so B is cut down but not emptied.
        let mut nodes: Vec<Node> = (0..3000).map(|i| node(&format!("a{i}"), "A", [0, 0, 0])).collect();
        nodes.extend((0..4000).map(|i| node(&format!("b{i}"), "B", [u8::from(i % 2 == 0), 0, 0])));
        let edges = (0..3000).map(|i| edge(&format!("e{i}"), &format!("a{i}"), &format!("b{i}"))).collect();
        let mut e = ClusterEngine::new(nodes, edges, EngineConfig::default());

        let a = top_id(&e, "A");
        let b = top_id(&e, "B");
        assert!(e.expand_leaf(&a));

        let rest = e.cluster(&b).unwrap();
        assert_eq!(rest.size(), 1000);
        assert_eq!(rest.info.counts, MasteryCounts { mastered: 500, not_mastered: 500 });
        assert_eq!(rest.label, "B (1000)");
        assert_eq!(e.display().nodes.len(), 6001);
        assert_eq!(e.display().edges.len(), 3000);
        e.check_conservation().unwrap();
    }

    #[test]
    fn test_cluster_id_avoids_node_ids() {
        let taken = format!("cluster_grade_{}", encode_key("G1"));
        let e = ClusterEngine::new(
            vec![node(&taken, "G1", [0, 0, 0])],
            vec![],
            EngineConfig::default(),
        );
        assert_eq!(e.cluster_ids(), vec![format!("{taken}_1")]);
    }
}
