//! # Snapshot Sources
//!
//! The contract between the engine and wherever stage snapshots live.
//!
//! | Source | Module | Description |
//! |--------|--------|-------------|
//! | `MemorySource` | `memory` | In-memory for testing/embedding |
//! | `DirectorySource` | `directory` | `index.json` + stage files (feature `fs`) |

pub mod memory;
#[cfg(feature = "fs")]
pub mod directory;

use async_trait::async_trait;

use crate::model::{GraphIndex, RawSnapshot, StudentStages};
use crate::{Error, Result};

pub use memory::MemorySource;
#[cfg(feature = "fs")]
pub use directory::DirectorySource;

/// Read access to stored snapshots, plus the backend's "current stage"
/// pointer. Fetch failures are hard errors; the engine never works from a
/// partial fetch.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Every student and their stages.
    async fn index(&self) -> Result<GraphIndex>;

    /// Fetch one stage of one student, not yet normalized.
    async fn fetch(&self, student: &str, stage: &str) -> Result<RawSnapshot>;

    /// Move the student's "current" pointer to `stage`.
    async fn set_current(&self, student: &str, stage: &str) -> Result<()>;

    /// Stages of one student.
    async fn stages(&self, student: &str) -> Result<StudentStages> {
        self.index()
            .await?
            .remove(student)
            .ok_or_else(|| Error::NotFound(format!("student {student}")))
    }
}
