//! Repository modules for graph storage.
//!
//! Each module adds methods to `GraphService` via `impl GraphService` blocks.

pub mod entity;
pub mod relationship;
pub mod stats;

pub use entity::EntityFilter;
pub use relationship::{LinkOutcome, RelationshipCursor};
