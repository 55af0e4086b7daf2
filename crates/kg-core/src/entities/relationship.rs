use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{EdgeDirection, RelationshipType};

/// A directed, typed edge between two active entities.
///
/// Identity is `(source_key, target_key, relationship_type)`; `seq` records
/// creation order.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Relationship {
    pub seq: i64,
    pub source_key: String,
    pub target_key: String,
    pub relationship_type: RelationshipType,
    pub weight: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// One relationship seen from a given entity.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct RelationshipEdge {
    pub seq: i64,
    pub neighbor_key: String,
    pub relationship_type: RelationshipType,
    pub direction: EdgeDirection,
}

/// Relationship counts for a single entity.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct RelationshipCounts {
    pub outgoing: u64,
    pub incoming: u64,
    pub total: u64,
}
