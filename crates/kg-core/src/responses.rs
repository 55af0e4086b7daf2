//! Response types returned by the sync engine and printed as JSON by `kg`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::SourceRef;

/// A source record (or one of its links) that could not be derived.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct SkippedRecord {
    /// `name` is empty when a whole doctype could not be listed.
    pub source: SourceRef,
    /// Link field that failed, when the record itself was derived.
    pub field: Option<String>,
    pub reason: String,
}

/// Response from a full rebuild.
///
/// A rebuild with skipped records still succeeds; `skipped` lists what needs attention.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct RebuildResponse {
    pub entities_created: u64,
    pub relationships_created: u64,
    pub records_processed: u64,
    pub skipped: Vec<SkippedRecord>,
    /// Set when the rebuild stopped early at a record boundary.
    pub cancelled: bool,
    pub duration_ms: u64,
}

/// Response from an incremental sync of one record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct SyncReport {
    pub entity_key: Option<String>,
    pub entities_created: u64,
    pub relationships_created: u64,
    pub relationships_removed: u64,
    pub deactivated: bool,
    pub skipped: Vec<SkippedRecord>,
}

/// Result of deactivating an entity.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Deactivation {
    pub entity_key: String,
    pub relationships_removed: u64,
    /// False when the entity was already inactive.
    pub changed: bool,
}
