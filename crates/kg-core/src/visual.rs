//! Visualization payload types and per-type visual defaults.
//!
//! The payload is flat and serializable: nodes are identified by entity key
//! only, and every edge references two nodes present in the same payload.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::Entity;
use crate::enums::{EntityType, RelationshipType};

/// Node color (hex) for an entity type.
#[must_use]
pub const fn entity_color(entity_type: EntityType) -> &'static str {
    match entity_type {
        EntityType::Control => "#3498db",
        EntityType::Risk => "#e74c3c",
        EntityType::Person => "#9b59b6",
        EntityType::Process => "#2ecc71",
        EntityType::Evidence => "#f39c12",
        EntityType::Requirement => "#1abc9c",
        EntityType::Objective => "#34495e",
        EntityType::System => "#95a5a6",
        EntityType::Department => "#e67e22",
        EntityType::Company => "#27ae60",
        EntityType::Document => "#8e44ad",
        EntityType::Period => "#16a085",
    }
}

/// Node size for an entity type.
#[must_use]
pub const fn entity_size(entity_type: EntityType) -> u32 {
    match entity_type {
        EntityType::Company => 40,
        EntityType::Risk => 35,
        EntityType::Control => 30,
        EntityType::Person | EntityType::Evidence | EntityType::Document | EntityType::Period => {
            20
        }
        EntityType::Process
        | EntityType::Requirement
        | EntityType::Objective
        | EntityType::System
        | EntityType::Department => 25,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct VisNode {
    pub id: String,
    pub label: String,
    /// Hover text: `"<Type>: <label>"`.
    pub title: String,
    pub group: String,
    pub color: String,
    pub size: u32,
    pub entity_type: EntityType,
    pub source_doctype: String,
    pub source_name: String,
}

impl From<&Entity> for VisNode {
    fn from(entity: &Entity) -> Self {
        let t = entity.entity_type;
        Self {
            id: entity.entity_key.clone(),
            label: entity.label.clone(),
            title: format!("{}: {}", t.display_name(), entity.label),
            group: t.display_name().to_string(),
            color: entity_color(t).to_string(),
            size: entity_size(t),
            entity_type: t,
            source_doctype: entity.source.doctype.clone(),
            source_name: entity.source.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct VisEdge {
    pub from: String,
    pub to: String,
    pub label: String,
    pub relationship_type: RelationshipType,
    pub arrows: String,
    pub width: f64,
}

impl VisEdge {
    #[must_use]
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        relationship_type: RelationshipType,
        weight: Option<f64>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            label: relationship_type.label().to_string(),
            relationship_type,
            arrows: "to".to_string(),
            width: weight.unwrap_or(1.0),
        }
    }
}

/// Bounded node/edge payload for the visualization client.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct VisualizationGraph {
    pub nodes: Vec<VisNode>,
    pub edges: Vec<VisEdge>,
    pub node_count: usize,
    pub edge_count: usize,
}

impl VisualizationGraph {
    /// Build a payload, filling the counts from the vectors.
    #[must_use]
    pub fn new(nodes: Vec<VisNode>, edges: Vec<VisEdge>) -> Self {
        Self {
            node_count: nodes.len(),
            edge_count: edges.len(),
            nodes,
            edges,
        }
    }

    /// Whether every edge references a node in the payload.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        let ids: std::collections::HashSet<&str> =
            self.nodes.iter().map(|n| n.id.as_str()).collect();
        self.edges
            .iter()
            .all(|e| ids.contains(e.from.as_str()) && ids.contains(e.to.as_str()))
    }
}
