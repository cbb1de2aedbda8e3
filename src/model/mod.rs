//! # Curriculum Graph Model
//!
//! Plain DTOs shared by the normalizer, the cluster engine and the diff
//! engine. No I/O, no state, no async.

pub mod mastery;
pub mod node;
pub mod relationship;
pub mod snapshot;

pub use mastery::{MasteryVector, TIER_COUNT, TIER_NAMES};
pub use node::{Node, QaPair};
pub use relationship::{Edge, EdgeKey, RelationKind};
pub use snapshot::{GraphIndex, RawGraph, RawSnapshot, Snapshot, StudentStages};
