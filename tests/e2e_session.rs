//! End-to-end tests for loading stages through a `SnapshotSource` and
//! comparing them.

use std::time::Duration;

use async_trait::async_trait;
use kg_lens::{
    compare_stages, EngineConfig, Error, GraphIndex, MemorySource, RawGraph, RawSnapshot, Session,
    SnapshotSource, ViewState,
};
use pretty_assertions::assert_eq;
use serde_json::json;

// ============================================================================
// Helpers
// ============================================================================

fn graph(statuses: &[(&str, &str, [u8; 3])]) -> RawGraph {
    RawGraph {
        nodes: statuses
            .iter()
            .map(|(uuid, grade, status)| json!({"properties": {"uuid": uuid, "node_name": uuid, "grade": grade, "status": status}}))
            .collect(),
        edges: vec![],
    }
}

fn populated() -> MemorySource {
    let source = MemorySource::new();
    source.insert("小明", "20250115_120000", graph(&[("n1", "三年级", [0, 0, 0]), ("n2", "三年级", [0, 0, 0])]));
    source.insert("小明", "20250301_090000", graph(&[("n1", "三年级", [1, 0, 0]), ("n3", "四年级", [0, 0, 0])]));
    source
}

/// Delays one stage so a later request can overtake it.
struct SlowStage {
    inner: MemorySource,
    slow_stage: &'static str,
}

#[async_trait]
impl SnapshotSource for SlowStage {
    async fn index(&self) -> kg_lens::Result<GraphIndex> {
        self.inner.index().await
    }

    async fn fetch(&self, student: &str, stage: &str) -> kg_lens::Result<RawSnapshot> {
        if stage == self.slow_stage {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        self.inner.fetch(student, stage).await
    }

    async fn set_current(&self, student: &str, stage: &str) -> kg_lens::Result<()> {
        self.inner.set_current(student, stage).await
    }
}

// ============================================================================
// 1. Loading
// ============================================================================

#[tokio::test]
async fn test_load_builds_top_level() {
    let source = populated();
    let session = Session::default();
    session.load(&source, "小明", "20250301_090000").await.unwrap();

    assert_eq!(session.loaded(), Some(("小明".to_string(), "20250301_090000".to_string())));
    let state = session.with_engine(|e| e.view_state()).unwrap();
    assert_eq!(state, ViewState::Clustered);
    assert_eq!(session.display().unwrap().nodes.len(), 2);
}

#[tokio::test]
async fn test_load_default_prefers_current_then_newest() {
    let source = populated();
    let session = Session::default();
    let stage = session.load_default(&source, "小明").await.unwrap();
    assert_eq!(stage, "20250301_090000");

    source.set_current("小明", "20250115_120000").await.unwrap();
    let stage = session.load_default(&source, "小明").await.unwrap();
    assert_eq!(stage, "20250115_120000");
}

#[tokio::test]
async fn test_slow_load_does_not_overwrite_newer() {
    let source = SlowStage { inner: populated(), slow_stage: "20250115_120000" };
    let session = Session::default();

    let slow = session.load(&source, "小明", "20250115_120000");
    let fast = async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        session.load(&source, "小明", "20250301_090000").await
    };
    let (slow, fast) = tokio::join!(slow, fast);

    fast.unwrap();
    assert!(matches!(slow, Err(Error::Stale { .. })));
    assert_eq!(session.loaded().map(|(_, stage)| stage), Some("20250301_090000".to_string()));
}

#[tokio::test]
async fn test_failed_load_keeps_previous_graph() {
    let source = populated();
    let session = Session::default();
    session.load(&source, "小明", "20250301_090000").await.unwrap();

    let err = session.load(&source, "小明", "20990101_000000").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(session.loaded().map(|(_, stage)| stage), Some("20250301_090000".to_string()));
}

// ============================================================================
// 2. Comparison
// ============================================================================

#[tokio::test]
async fn test_compare_stages() {
    let source = populated();
    let cmp = compare_stages(&source, &EngineConfig::default(), "小明", "20250301_090000", "20250115_120000")
        .await
        .unwrap();

    assert_eq!(cmp.target.stage(), "20250301_090000");
    assert_eq!(cmp.base.stage(), "20250115_120000");
    let added: Vec<&str> = cmp.diff.added_nodes.iter().map(|n| n.uuid.as_str()).collect();
    let removed: Vec<&str> = cmp.diff.removed_nodes.iter().map(|n| n.uuid.as_str()).collect();
    assert_eq!(added, vec!["n3"]);
    assert_eq!(removed, vec!["n2"]);
    assert_eq!(cmp.summary.grades.len(), 1);
    assert_eq!(cmp.summary.grades[0].grade, "三年级");
    assert_eq!(cmp.summary.grades[0].entries[0].uuid, "n1");
}

#[tokio::test]
async fn test_compare_aborts_when_one_side_fails() {
    let source = populated();
    source.mark_unavailable("小明", "20250115_120000");
    let err = compare_stages(&source, &EngineConfig::default(), "小明", "20250301_090000", "20250115_120000")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Source(_)));
}

#[tokio::test]
async fn test_session_compare_uses_configured_label() {
    let source = MemorySource::new();
    source.insert("小明", "1", graph(&[("n1", "", [0, 0, 0])]));
    source.insert("小明", "2", graph(&[("n1", "", [0, 0, 1])]));
    let config = EngineConfig { unclassified_label: "未分类".into(), ..EngineConfig::default() };
    let session = Session::new(config);

    session.load(&source, "小明", "2").await.unwrap();
    let cluster_label = session
        .with_engine(|e| e.cluster_ids().iter().filter_map(|id| e.cluster_info(id)).map(|i| i.grade.clone()).collect::<Vec<_>>())
        .unwrap();
    assert_eq!(cluster_label, vec!["未分类".to_string()]);

    let cmp = session.compare(&source, "小明", "2", "1").await.unwrap();
    assert_eq!(cmp.summary.grades[0].grade, "未分类");
}

#[tokio::test]
async fn test_compare_same_stage_rejected() {
    let source = populated();
    let err = compare_stages(&source, &EngineConfig::default(), "小明", "20250301_090000", "20250301_090000")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

// ============================================================================
// 3. Directory source
// ============================================================================

#[cfg(feature = "fs")]
mod directory {
    use super::*;
    use kg_lens::{DirectorySource, SourceConfig};
    use pretty_assertions::assert_eq;

    fn write_tree(root: &std::path::Path) {
        std::fs::create_dir_all(root.join("stages")).unwrap();
        let index = json!({
            "小红": {
                "stages": {
                    "20250101_080000": "stages/a.json",
                    "20250201_080000": "stages/b.json"
                },
                "current_stage": "20250101_080000"
            }
        });
        std::fs::write(root.join("index.json"), index.to_string()).unwrap();
        std::fs::write(root.join("stages/a.json"), serde_json::to_string(&graph(&[("n1", "一年级", [0, 0, 0])])).unwrap()).unwrap();
        std::fs::write(root.join("stages/b.json"), serde_json::to_string(&graph(&[("n1", "一年级", [0, 1, 0])])).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_directory_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path());
        let source = DirectorySource::new(dir.path());

        let stages = source.stages("小红").await.unwrap();
        assert_eq!(stages.sorted_stages(), vec!["20250101_080000", "20250201_080000"]);
        assert_eq!(stages.default_stage(), Some("20250101_080000"));

        source.set_current("小红", "20250201_080000").await.unwrap();
        let stages = source.stages("小红").await.unwrap();
        assert_eq!(stages.current_stage.as_deref(), Some("20250201_080000"));

        let cmp = compare_stages(&source, &EngineConfig::default(), "小红", "20250201_080000", "20250101_080000")
            .await
            .unwrap();
        assert_eq!(cmp.diff.changed_nodes.len(), 1);
    }

    #[tokio::test]
    async fn test_source_config_opens_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path());
        let source = SourceConfig::Directory { root: dir.path().to_path_buf() }.open();

        let index = source.index().await.unwrap();
        assert_eq!(index.keys().collect::<Vec<_>>(), vec!["小红"]);
        let raw = source.fetch("小红", "20250101_080000").await.unwrap();
        assert_eq!(raw.normalize().nodes()[0].uuid, "n1");
    }

    #[tokio::test]
    async fn test_directory_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectorySource::new(dir.path());
        assert!(matches!(source.index().await, Err(Error::NotFound(_))));

        write_tree(dir.path());
        std::fs::remove_file(dir.path().join("stages/b.json")).unwrap();
        assert!(matches!(source.fetch("小红", "20250201_080000").await, Err(Error::NotFound(_))));
    }
}
