//! Query error types for kg-query.

use kg_db::error::DatabaseError;

/// Errors from traversal, path, and analysis queries.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// Error from the graph store, including `NotFound` for unknown keys.
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// Request parameters that cannot be satisfied.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl QueryError {
    /// Whether the error is an unknown entity key.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Database(DatabaseError::NotFound { .. }))
    }
}
