use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate counts over active graph rows.
///
/// Map keys are the storage spellings of the entity and relationship types
/// (e.g. `"mitigates"`). Types with no rows are omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct GraphStatistics {
    pub total_entities: u64,
    pub total_relationships: u64,
    pub total_cached_paths: u64,
    pub entities_by_type: BTreeMap<String, u64>,
    pub relationships_by_type: BTreeMap<String, u64>,
}
