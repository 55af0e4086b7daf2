//! Database error types for kg-db.

use kg_core::enums::{EntityType, RelationshipType};
use kg_core::errors::CoreError;
use thiserror::Error;

/// Errors from graph storage operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A SQL query failed or returned malformed data.
    #[error("Query failed: {0}")]
    Query(String),

    /// Schema migration failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Expected a result row but none was returned.
    #[error("No result returned")]
    NoResult,

    /// Invalid state encountered (e.g., bad data in DB).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Operation on an entity key that does not exist.
    #[error("Entity not found: {entity_key}")]
    NotFound { entity_key: String },

    /// Relationship endpoint is missing or inactive; re-sync the entity first.
    #[error("Dangling entity: {entity_key} is missing or inactive")]
    DanglingEntity { entity_key: String },

    /// Relationship from an entity to itself.
    #[error("Self-referencing relationship on {entity_key}")]
    SelfLink { entity_key: String },

    /// Relationship type does not allow these endpoint entity types.
    #[error("{relationship_type} cannot link {source_type} to {target_type}")]
    IncompatibleEndpoints {
        relationship_type: RelationshipType,
        source_type: EntityType,
        target_type: EntityType,
    },

    /// Create/re-read cycles kept conflicting; the store is contended or corrupt.
    #[error("Gave up creating {entity_key} after {attempts} conflicting attempts")]
    ConflictRetryExhausted { entity_key: String, attempts: u32 },

    /// Core type parsing or validation failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DatabaseError {
    /// Whether a caller may reasonably retry the whole operation later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConflictRetryExhausted { .. })
    }
}
