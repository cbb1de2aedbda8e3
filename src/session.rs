//! # Session
//!
//! One browsing session: the graph currently on screen plus the bookkeeping
//! that keeps slow loads from clobbering newer ones.
//!
//! ```text
//!   begin_load() ──► token #n ──► fetch … normalize … ──► finish_load(#n)
//!                                                          │
//!                        newer begin_load() happened? ─────┴──► Error::Stale
//! ```
//!
//! Comparison of two stages lives here too: both fetches run concurrently
//! and the diff is only computed once both have succeeded.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::cluster::{ClusterEngine, DisplayState};
use crate::config::EngineConfig;
use crate::diff::{diff, DiffResult, DiffSummary};
use crate::model::Snapshot;
use crate::source::SnapshotSource;
use crate::{Error, Result};

/// Handed out by [`Session::begin_load`]; only the newest token may commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadToken(u64);

impl LoadToken {
    pub fn generation(self) -> u64 {
        self.0
    }
}

/// The graph committed by the newest finished load.
#[derive(Debug, Clone)]
pub struct LoadedGraph {
    pub student: String,
    pub stage: String,
    pub engine: ClusterEngine,
}

#[derive(Debug, Default)]
struct SessionState {
    generation: u64,
    loaded: Option<LoadedGraph>,
}

#[derive(Debug, Default)]
pub struct Session {
    config: EngineConfig,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new(config: EngineConfig) -> Self {
        Self { config, state: Mutex::new(SessionState::default()) }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start a load. Any load started earlier becomes stale.
    pub fn begin_load(&self) -> LoadToken {
        let mut state = self.state.lock();
        state.generation += 1;
        LoadToken(state.generation)
    }

    pub fn is_current(&self, token: LoadToken) -> bool {
        self.state.lock().generation == token.0
    }

    /// Commit a fetched snapshot. The previous graph stays in place until
    /// this succeeds; a stale token leaves everything untouched.
    pub fn finish_load(&self, token: LoadToken, snapshot: Snapshot) -> Result<()> {
        if !self.is_current(token) {
            return Err(self.stale(token));
        }
        let engine = ClusterEngine::from_snapshot(&snapshot, self.config.clone());

        let mut state = self.state.lock();
        if state.generation != token.0 {
            let latest = state.generation;
            drop(state);
            tracing::debug!(requested = token.0, latest, "discarding stale load");
            return Err(Error::Stale { requested: token.0, latest });
        }
        tracing::info!(
            student = snapshot.student(),
            stage = snapshot.stage(),
            nodes = snapshot.nodes().len(),
            edges = snapshot.edges().len(),
            generation = token.0,
            "loaded stage"
        );
        state.loaded = Some(LoadedGraph {
            student: snapshot.student().to_string(),
            stage: snapshot.stage().to_string(),
            engine,
        });
        Ok(())
    }

    /// Fetch, normalize and commit one stage.
    pub async fn load(&self, source: &dyn SnapshotSource, student: &str, stage: &str) -> Result<()> {
        let token = self.begin_load();
        let raw = source.fetch(student, stage).await?;
        self.finish_load(token, raw.normalize())
    }

    /// Load the student's current stage, falling back to the newest one.
    pub async fn load_default(&self, source: &dyn SnapshotSource, student: &str) -> Result<String> {
        let stages = source.stages(student).await?;
        let stage = stages
            .default_stage()
            .ok_or_else(|| Error::NotFound(format!("stages of {student}")))?
            .to_string();
        self.load(source, student, &stage).await?;
        Ok(stage)
    }

    /// (student, stage) of the committed graph.
    pub fn loaded(&self) -> Option<(String, String)> {
        let state = self.state.lock();
        state.loaded.as_ref().map(|g| (g.student.clone(), g.stage.clone()))
    }

    pub fn display(&self) -> Option<DisplayState> {
        self.state.lock().loaded.as_ref().map(|g| g.engine.display().clone())
    }

    /// Run a transition or lookup against the committed graph.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut ClusterEngine) -> R) -> Option<R> {
        let mut state = self.state.lock();
        state.loaded.as_mut().map(|g| f(&mut g.engine))
    }

    /// [`compare_stages`] with this session's configuration.
    pub async fn compare(
        &self,
        source: &dyn SnapshotSource,
        student: &str,
        target_stage: &str,
        base_stage: &str,
    ) -> Result<Comparison> {
        compare_stages(source, &self.config, student, target_stage, base_stage).await
    }

    fn stale(&self, token: LoadToken) -> Error {
        let latest = self.state.lock().generation;
        tracing::debug!(requested = token.0, latest, "discarding stale load");
        Error::Stale { requested: token.0, latest }
    }
}

// ============================================================================
// Stage comparison
// ============================================================================

/// Both sides of a comparison and what changed between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub target: Snapshot,
    pub base: Snapshot,
    pub diff: DiffResult,
    pub summary: DiffSummary,
}

/// Fetch two stages of one student concurrently and diff target vs. base.
/// If either fetch fails nothing is diffed.
pub async fn compare_stages(
    source: &dyn SnapshotSource,
    config: &EngineConfig,
    student: &str,
    target_stage: &str,
    base_stage: &str,
) -> Result<Comparison> {
    if target_stage == base_stage {
        return Err(Error::InvalidArgument(format!(
            "cannot compare stage {target_stage} with itself"
        )));
    }
    let (target_raw, base_raw) = futures::try_join!(
        source.fetch(student, target_stage),
        source.fetch(student, base_stage),
    )?;
    let target = target_raw.normalize();
    let base = base_raw.normalize();

    let result = diff(&base, &target);
    let summary = DiffSummary::from_diff(student, target_stage, base_stage, &result, &config.unclassified_label);
    Ok(Comparison { target, base, diff: result, summary })
}
