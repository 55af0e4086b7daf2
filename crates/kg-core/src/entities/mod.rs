//! Entity structs for the knowledge graph.
//!
//! `Entity` and `Relationship` map to the `graph_entities` and
//! `graph_relationships` tables. All structs derive `Serialize`, `Deserialize`,
//! and `JsonSchema` for JSON output and schema validation.

mod entity;
mod path;
mod relationship;
mod stats;

pub use entity::{Entity, SourceRef};
pub use path::{GraphPath, Neighbor, PathHop};
pub use relationship::{Relationship, RelationshipCounts, RelationshipEdge};
pub use stats::GraphStatistics;
