//! Snapshots: immutable, stage-tagged copies of one student's graph.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use super::{Edge, Node};
use crate::normalize;

/// Graph document exactly as the backend stores it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawGraph {
    #[serde(default)]
    pub nodes: Vec<Json>,
    #[serde(default)]
    pub edges: Vec<Json>,
}

/// A fetched, not yet normalized snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSnapshot {
    pub student: String,
    pub stage: String,
    pub graph: RawGraph,
}

impl RawSnapshot {
    pub fn new(student: impl Into<String>, stage: impl Into<String>, graph: RawGraph) -> Self {
        Self { student: student.into(), stage: stage.into(), graph }
    }

    /// Run the normalizer and freeze the result.
    pub fn normalize(&self) -> Snapshot {
        let (nodes, edges) = normalize::normalize(&self.graph.nodes, &self.graph.edges);
        Snapshot::new(self.student.clone(), self.stage.clone(), nodes, edges)
    }
}

/// Normalized snapshot. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    student: String,
    stage: String,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl Snapshot {
    pub fn new(
        student: impl Into<String>,
        stage: impl Into<String>,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
    ) -> Self {
        Self { student: student.into(), stage: stage.into(), nodes, edges }
    }

    pub fn student(&self) -> &str { &self.student }
    pub fn stage(&self) -> &str { &self.stage }
    pub fn nodes(&self) -> &[Node] { &self.nodes }
    pub fn edges(&self) -> &[Edge] { &self.edges }

    /// Stage label read as a timestamp, when it is one.
    pub fn stage_time(&self) -> Option<NaiveDateTime> {
        parse_stage_time(&self.stage)
    }
}

/// Per-student stage index: stage label → document path, plus the
/// backend's "current" pointer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentStages {
    #[serde(default)]
    pub stages: BTreeMap<String, String>,
    #[serde(default)]
    pub current_stage: Option<String>,
}

impl StudentStages {
    /// Stage labels oldest first. Timestamp labels sort chronologically and
    /// come before anything unparseable, which sorts lexically.
    pub fn sorted_stages(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.stages.keys().map(String::as_str).collect();
        labels.sort_by(|a, b| match (parse_stage_time(a), parse_stage_time(b)) {
            (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.cmp(b),
        });
        labels
    }

    /// The stage a viewer opens by default: the current pointer, else the
    /// newest stage.
    pub fn default_stage(&self) -> Option<&str> {
        self.current_stage
            .as_deref()
            .filter(|s| self.stages.contains_key(*s))
            .or_else(|| self.sorted_stages().last().copied())
    }
}

/// Student name → stage index.
pub type GraphIndex = BTreeMap<String, StudentStages>;

const STAGE_FORMATS: &[&str] = &["%Y%m%d_%H%M%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

fn parse_stage_time(label: &str) -> Option<NaiveDateTime> {
    let label = label.trim();
    STAGE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(label, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(label).ok().map(|dt| dt.naive_utc()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_stages_chronological() {
        let mut stages = StudentStages::default();
        for label in ["20250301_090000", "baseline", "20250115_120000", "2025-02-01 08:00:00"] {
            stages.stages.insert(label.into(), format!("{label}.json"));
        }
        assert_eq!(
            stages.sorted_stages(),
            vec!["20250115_120000", "2025-02-01 08:00:00", "20250301_090000", "baseline"]
        );
    }

    #[test]
    fn test_default_stage_prefers_current() {
        let mut stages = StudentStages::default();
        stages.stages.insert("20250101_000000".into(), "a.json".into());
        stages.stages.insert("20250201_000000".into(), "b.json".into());
        assert_eq!(stages.default_stage(), Some("20250201_000000"));
        stages.current_stage = Some("20250101_000000".into());
        assert_eq!(stages.default_stage(), Some("20250101_000000"));
        stages.current_stage = Some("gone".into());
        assert_eq!(stages.default_stage(), Some("20250201_000000"));
    }

    #[test]
    fn test_stage_time() {
        let s = Snapshot::new("stu", "20250102_030405", vec![], vec![]);
        assert_eq!(s.stage_time().unwrap().to_string(), "2025-01-02 03:04:05");
        assert!(Snapshot::new("stu", "v1", vec![], vec![]).stage_time().is_none());
    }
}
