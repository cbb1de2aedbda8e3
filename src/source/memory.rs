//! In-memory snapshot source.
//!
//! Reference implementation of `SnapshotSource`, used by tests and by
//! embedders that already hold the documents.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::model::{GraphIndex, RawGraph, RawSnapshot};
use crate::{Error, Result};
use super::SnapshotSource;

#[derive(Default)]
pub struct MemorySource {
    index: RwLock<GraphIndex>,
    /// (student, stage) → document
    graphs: RwLock<HashMap<(String, String), RawGraph>>,
    /// (student, stage) pairs that fail to fetch
    unavailable: RwLock<Vec<(String, String)>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a stage document and list it in the index.
    pub fn insert(&self, student: &str, stage: &str, graph: RawGraph) {
        self.index
            .write()
            .entry(student.to_string())
            .or_default()
            .stages
            .insert(stage.to_string(), format!("memory://{student}/{stage}"));
        self.graphs
            .write()
            .insert((student.to_string(), stage.to_string()), graph);
    }

    /// Make a listed stage fail to fetch, as an unreachable backend would.
    pub fn mark_unavailable(&self, student: &str, stage: &str) {
        self.unavailable
            .write()
            .push((student.to_string(), stage.to_string()));
    }
}

#[async_trait]
impl SnapshotSource for MemorySource {
    async fn index(&self) -> Result<GraphIndex> {
        Ok(self.index.read().clone())
    }

    async fn fetch(&self, student: &str, stage: &str) -> Result<RawSnapshot> {
        let key = (student.to_string(), stage.to_string());
        if self.unavailable.read().contains(&key) {
            return Err(Error::Source(format!("{student}/{stage} unavailable")));
        }
        let graph = self
            .graphs
            .read()
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("stage {stage} of {student}")))?;
        Ok(RawSnapshot::new(student, stage, graph))
    }

    async fn set_current(&self, student: &str, stage: &str) -> Result<()> {
        let mut index = self.index.write();
        let entry = index
            .get_mut(student)
            .ok_or_else(|| Error::NotFound(format!("student {student}")))?;
        if !entry.stages.contains_key(stage) {
            return Err(Error::NotFound(format!("stage {stage} of {student}")));
        }
        entry.current_stage = Some(stage.to_string());
        Ok(())
    }
}
