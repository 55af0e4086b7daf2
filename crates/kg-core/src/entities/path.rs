use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::Entity;
use crate::enums::{EdgeDirection, RelationshipType};

/// One step of a path. `direction` is relative to `from_key`: `Incoming`
/// means the stored edge runs `to_key -> from_key`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct PathHop {
    pub from_key: String,
    pub to_key: String,
    pub relationship_type: RelationshipType,
    pub direction: EdgeDirection,
    pub relationship_seq: i64,
}

/// A shortest path between two entities, as stored in the path cache.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct GraphPath {
    pub start_key: String,
    pub end_key: String,
    pub max_depth: u32,
    pub hops: Vec<PathHop>,
    pub length: u32,
    pub computed_at: DateTime<Utc>,
}

impl GraphPath {
    /// Entity keys visited by this path, in order, including both endpoints.
    #[must_use]
    pub fn entity_keys(&self) -> Vec<&str> {
        let mut keys = Vec::with_capacity(self.hops.len() + 1);
        keys.push(self.start_key.as_str());
        keys.extend(self.hops.iter().map(|h| h.to_key.as_str()));
        keys
    }

    /// Whether `key` is an endpoint or an intermediate node of this path.
    #[must_use]
    pub fn touches(&self, key: &str) -> bool {
        self.start_key == key || self.hops.iter().any(|h| h.to_key == key)
    }

    /// Whether this path traverses the stored edge `(source, target, type)`.
    #[must_use]
    pub fn uses_edge(&self, source: &str, target: &str, relationship_type: RelationshipType) -> bool {
        self.hops.iter().any(|h| {
            h.relationship_type == relationship_type
                && match h.direction {
                    EdgeDirection::Outgoing => h.from_key == source && h.to_key == target,
                    EdgeDirection::Incoming => h.to_key == source && h.from_key == target,
                }
        })
    }
}

/// An entity reached by neighbor traversal.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Neighbor {
    pub entity: Entity,
    /// Entity the traversal came from when this one was discovered.
    pub via_key: String,
    pub relationship_type: RelationshipType,
    pub direction: EdgeDirection,
    pub hop_distance: u32,
}
