//! Engine and source configuration.

use serde::{Deserialize, Serialize};

use crate::source::{MemorySource, SnapshotSource};
use crate::Result;

/// Default group key for nodes with no grade.
pub const UNCLASSIFIED: &str = "Unclassified";

/// Tunables for the cluster engine. Every field has a default, so an empty
/// document `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Group key for nodes with no grade.
    pub unclassified_label: String,
    /// Id tag of the "any tier mastered" second-level cluster.
    pub mastered_tag: String,
    /// Id tag of the "nothing mastered" second-level cluster.
    pub not_mastered_tag: String,
    /// Prefix of top-level cluster ids.
    pub top_prefix: String,
    /// Prefix of aggregate edge ids.
    pub aggregate_edge_prefix: String,
    /// Rendered weight cap for aggregate edges.
    pub max_edge_weight: usize,
    /// Suffix attempts before a duplicate cluster id is reported.
    pub max_id_attempts: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unclassified_label: UNCLASSIFIED.into(),
            mastered_tag: "mastered".into(),
            not_mastered_tag: "not_mastered".into(),
            top_prefix: "cluster_grade_".into(),
            aggregate_edge_prefix: "cluster_edge_".into(),
            max_edge_weight: 5,
            max_id_attempts: 10_000,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Where snapshots come from.
#[derive(Debug, Clone)]
pub enum SourceConfig {
    /// In-memory (tests, embedding)
    Memory,

    /// `index.json` plus per-stage documents under `root`
    #[cfg(feature = "fs")]
    Directory { root: std::path::PathBuf },
}

impl SourceConfig {
    pub fn open(&self) -> Box<dyn SnapshotSource> {
        match self {
            SourceConfig::Memory => Box::new(MemorySource::new()),
            #[cfg(feature = "fs")]
            SourceConfig::Directory { root } => {
                Box::new(crate::source::DirectorySource::new(root.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(EngineConfig::from_json_str("{}").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let cfg = EngineConfig::from_json_str(r#"{"unclassified_label": "未分类", "max_edge_weight": 3}"#)
            .unwrap();
        assert_eq!(cfg.unclassified_label, "未分类");
        assert_eq!(cfg.max_edge_weight, 3);
        assert_eq!(cfg.mastered_tag, "mastered");
    }

    #[tokio::test]
    async fn test_memory_source_config_opens_empty_source() {
        let source = SourceConfig::Memory.open();
        assert!(source.index().await.unwrap().is_empty());
        assert!(matches!(source.fetch("小明", "1").await, Err(crate::Error::NotFound(_))));
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(EngineConfig::from_json_str(r#"{"colour": "red"}"#).is_err());
    }
}
