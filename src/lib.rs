//! # kg-lens — Progressive Disclosure for Curriculum Knowledge Graphs
//!
//! Browses per-student knowledge graph snapshots that are too large to draw
//! flat, and compares two stages of the same student.
//!
//! ## Design Principles
//!
//! 1. **Normalize at the boundary**: raw documents become `Node`/`Edge` once, in `normalize`
//! 2. **Ownership, not bookkeeping**: every node is shown exactly once, inside a cluster or raw
//! 3. **Trait-first storage**: `SnapshotSource` is the contract between engine and backend
//! 4. **Diff by identity**: nodes by `uuid`, edges by `(from, type, to)`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kg_lens::{ClusterEngine, EngineConfig, MemorySource, SnapshotSource};
//!
//! # async fn example() -> kg_lens::Result<()> {
//! let source = MemorySource::new();
//! let raw = source.fetch("小明", "20250301_090000").await?;
//! let mut engine = ClusterEngine::from_snapshot(&raw.normalize(), EngineConfig::default());
//!
//! for node in &engine.display().nodes {
//!     println!("{} {}", node.id, node.label);
//! }
//! let first = engine.cluster_ids().first().map(|s| s.to_string());
//! if let Some(id) = first {
//!     engine.expand_top_level(&id);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Snapshot Sources
//!
//! | Source | Feature | Description |
//! |--------|---------|-------------|
//! | Memory | (default) | In-memory documents for testing/embedding |
//! | Directory | `fs` | `index.json` plus one JSON document per stage |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod normalize;
pub mod ident;
pub mod cluster;
pub mod diff;
pub mod export;
pub mod config;
pub mod source;
pub mod session;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    Node, Edge, EdgeKey, RelationKind, MasteryVector, QaPair,
    RawGraph, RawSnapshot, Snapshot, StudentStages, GraphIndex,
};

// ============================================================================
// Re-exports: Engines
// ============================================================================

pub use cluster::{
    ClusterEngine, Activation, Diagnostic, DisplayState, DisplayNode, DisplayEdge,
    DisplayEntity, ViewState,
};
pub use diff::{diff, DiffResult, DiffSummary};
pub use normalize::normalize;

// ============================================================================
// Re-exports: Sources & Session
// ============================================================================

pub use config::{EngineConfig, SourceConfig};
pub use source::{SnapshotSource, MemorySource};
#[cfg(feature = "fs")]
pub use source::DirectorySource;
pub use session::{compare_stages, Comparison, LoadToken, Session};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Source error: {0}")]
    Source(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Stale load #{requested}: load #{latest} started since")]
    Stale { requested: u64, latest: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
