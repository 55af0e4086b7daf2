//! Cross-cutting error types for the knowledge graph.
//!
//! Storage errors (`DatabaseError`) and sync errors (`SyncError`) live in
//! their own crates and wrap `CoreError` where a core type fails to parse.

use thiserror::Error;

/// Errors that can be raised by any `kg-*` crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Entity type outside the closed enumeration.
    #[error("Invalid entity type: {0}")]
    InvalidEntityType(String),

    /// Relationship type outside the closed enumeration.
    #[error("Invalid relationship type: {0}")]
    InvalidRelationshipType(String),

    /// Traversal direction other than outgoing, incoming, or both.
    #[error("Invalid direction: {0} (expected outgoing, incoming, or both)")]
    InvalidDirection(String),

    /// Data failed validation (format, constraints).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
