//! Directory-backed snapshot source.
//!
//! Layout, relative to `root`:
//!
//! ```text
//! index.json                 { "<student>": { "stages": { "<stage>": "<path>" }, "current_stage": "<stage>" } }
//! <path>                     { "nodes": [...], "edges": [...] }
//! ```
//!
//! Stage paths may be absolute or relative to `root`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::model::{GraphIndex, RawGraph, RawSnapshot};
use crate::{Error, Result};
use super::SnapshotSource;

pub const INDEX_FILE: &str = "index.json";

pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    async fn read_index(&self) -> Result<GraphIndex> {
        let path = self.index_path();
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("{}", path.display())))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }
}

#[async_trait]
impl SnapshotSource for DirectorySource {
    async fn index(&self) -> Result<GraphIndex> {
        self.read_index().await
    }

    async fn fetch(&self, student: &str, stage: &str) -> Result<RawSnapshot> {
        let index = self.read_index().await?;
        let rel = index
            .get(student)
            .and_then(|s| s.stages.get(stage))
            .ok_or_else(|| Error::NotFound(format!("stage {stage} of {student}")))?;
        let path = self.root.join(rel);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!("{}", path.display())));
            }
            Err(e) => return Err(Error::Io(e)),
        };
        let graph: RawGraph = serde_json::from_str(&text)
            .map_err(|e| Error::Parse(format!("{}: {e}", path.display())))?;
        tracing::info!(student, stage, nodes = graph.nodes.len(), edges = graph.edges.len(), "fetched stage");
        Ok(RawSnapshot::new(student, stage, graph))
    }

    async fn set_current(&self, student: &str, stage: &str) -> Result<()> {
        let mut index = self.read_index().await?;
        let entry = index
            .get_mut(student)
            .ok_or_else(|| Error::NotFound(format!("student {student}")))?;
        if !entry.stages.contains_key(stage) {
            return Err(Error::NotFound(format!("stage {stage} of {student}")));
        }
        entry.current_stage = Some(stage.to_string());
        let text = serde_json::to_string_pretty(&index)?;
        tokio::fs::write(self.index_path(), text).await?;
        Ok(())
    }
}
