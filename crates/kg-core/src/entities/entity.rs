use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::enums::EntityType;

/// Pointer from an entity back to the business record it represents.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceRef {
    pub doctype: String,
    pub name: String,
}

impl SourceRef {
    #[must_use]
    pub fn new(doctype: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            doctype: doctype.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.doctype, self.name)
    }
}

/// A graph node representing one business record.
///
/// `activation_seq` increases every time an entity is created or reactivated
/// and gives listings a stable, reproducible order.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Entity {
    pub entity_key: String,
    pub entity_type: EntityType,
    pub label: String,
    pub source: SourceRef,
    pub properties: Option<serde_json::Value>,
    pub is_active: bool,
    pub activation_seq: i64,
    pub created_at: DateTime<Utc>,
    pub last_synced: DateTime<Utc>,
}
