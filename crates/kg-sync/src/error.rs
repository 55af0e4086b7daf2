//! Error types for kg-sync.

use std::path::PathBuf;

use kg_db::error::DatabaseError;
use thiserror::Error;

/// Errors that abort a sync operation.
///
/// Per-record derivation failures during a rebuild are not errors; they are
/// reported in the response's `skipped` list.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// The business-record store failed to answer.
    #[error("Record source failed: {0}")]
    Source(#[source] anyhow::Error),

    /// A record export could not be read or written.
    #[error("Failed to access records at {}: {source}", path.display())]
    Records {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
