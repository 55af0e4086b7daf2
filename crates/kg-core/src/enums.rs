//! Entity types, relationship types, and traversal directions.
//!
//! All enums use `snake_case` serialization via `#[serde(rename_all = "snake_case")]`,
//! and `as_str()` returns the same spelling that is stored in SQL.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::CoreError;

// ---------------------------------------------------------------------------
// EntityType
// ---------------------------------------------------------------------------

/// Kind of business object a graph entity represents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Control,
    Risk,
    Person,
    Process,
    Evidence,
    Requirement,
    Objective,
    System,
    Department,
    Company,
    Document,
    Period,
}

impl EntityType {
    /// Every entity type, in declaration order.
    pub const ALL: [Self; 12] = [
        Self::Control,
        Self::Risk,
        Self::Person,
        Self::Process,
        Self::Evidence,
        Self::Requirement,
        Self::Objective,
        Self::System,
        Self::Department,
        Self::Company,
        Self::Document,
        Self::Period,
    ];

    /// Return the string representation used in SQL storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Control => "control",
            Self::Risk => "risk",
            Self::Person => "person",
            Self::Process => "process",
            Self::Evidence => "evidence",
            Self::Requirement => "requirement",
            Self::Objective => "objective",
            Self::System => "system",
            Self::Department => "department",
            Self::Company => "company",
            Self::Document => "document",
            Self::Period => "period",
        }
    }

    /// Three-letter prefix used in entity keys (e.g. `ctl-…`).
    #[must_use]
    pub const fn key_prefix(self) -> &'static str {
        match self {
            Self::Control => "ctl",
            Self::Risk => "rsk",
            Self::Person => "per",
            Self::Process => "prc",
            Self::Evidence => "evd",
            Self::Requirement => "req",
            Self::Objective => "obj",
            Self::System => "sys",
            Self::Department => "dep",
            Self::Company => "cmp",
            Self::Document => "doc",
            Self::Period => "prd",
        }
    }

    /// Human-readable name, used as the visualization group.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Control => "Control",
            Self::Risk => "Risk",
            Self::Person => "Person",
            Self::Process => "Process",
            Self::Evidence => "Evidence",
            Self::Requirement => "Requirement",
            Self::Objective => "Objective",
            Self::System => "System",
            Self::Department => "Department",
            Self::Company => "Company",
            Self::Document => "Document",
            Self::Period => "Period",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = CoreError;

    /// Accepts the storage spelling (`"control"`) or the display name (`"Control"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s || t.display_name() == s)
            .ok_or_else(|| CoreError::InvalidEntityType(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// RelationshipType
// ---------------------------------------------------------------------------

/// Typed, directed edge semantics between two entities.
///
/// Each variant carries a fixed set of permitted source and target entity
/// types (see [`RelationshipType::permits`]).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    Mitigates,
    Owns,
    Performs,
    Tests,
    Evidences,
    Executes,
    Supports,
    DependsOn,
    Addresses,
    Requires,
    Mandates,
    Manages,
    Operates,
    BelongsTo,
    Uses,
    PrecededBy,
    OccurredIn,
    EffectiveFrom,
    Supersedes,
    Affects,
    Impacts,
}

impl RelationshipType {
    pub const ALL: [Self; 21] = [
        Self::Mitigates,
        Self::Owns,
        Self::Performs,
        Self::Tests,
        Self::Evidences,
        Self::Executes,
        Self::Supports,
        Self::DependsOn,
        Self::Addresses,
        Self::Requires,
        Self::Mandates,
        Self::Manages,
        Self::Operates,
        Self::BelongsTo,
        Self::Uses,
        Self::PrecededBy,
        Self::OccurredIn,
        Self::EffectiveFrom,
        Self::Supersedes,
        Self::Affects,
        Self::Impacts,
    ];

    /// Return the string representation used in SQL storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mitigates => "mitigates",
            Self::Owns => "owns",
            Self::Performs => "performs",
            Self::Tests => "tests",
            Self::Evidences => "evidences",
            Self::Executes => "executes",
            Self::Supports => "supports",
            Self::DependsOn => "depends_on",
            Self::Addresses => "addresses",
            Self::Requires => "requires",
            Self::Mandates => "mandates",
            Self::Manages => "manages",
            Self::Operates => "operates",
            Self::BelongsTo => "belongs_to",
            Self::Uses => "uses",
            Self::PrecededBy => "preceded_by",
            Self::OccurredIn => "occurred_in",
            Self::EffectiveFrom => "effective_from",
            Self::Supersedes => "supersedes",
            Self::Affects => "affects",
            Self::Impacts => "impacts",
        }
    }

    /// Edge caption shown by the visualization client.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Mitigates => "Mitigates",
            Self::Owns => "Owns",
            Self::Performs => "Performs",
            Self::Tests => "Tests",
            Self::Evidences => "Evidences",
            Self::Executes => "Executes",
            Self::Supports => "Supports",
            Self::DependsOn => "Depends On",
            Self::Addresses => "Addresses",
            Self::Requires => "Requires",
            Self::Mandates => "Mandates",
            Self::Manages => "Manages",
            Self::Operates => "Operates",
            Self::BelongsTo => "Belongs To",
            Self::Uses => "Uses",
            Self::PrecededBy => "Preceded By",
            Self::OccurredIn => "Occurred In",
            Self::EffectiveFrom => "Effective From",
            Self::Supersedes => "Supersedes",
            Self::Affects => "Affects",
            Self::Impacts => "Impacts",
        }
    }

    /// Permitted `(sources, targets)` entity types for this relationship.
    #[must_use]
    pub const fn endpoints(self) -> (&'static [EntityType], &'static [EntityType]) {
        use EntityType as E;
        match self {
            Self::Mitigates => (&[E::Control], &[E::Risk]),
            Self::Owns => (&[E::Person], &[E::Control, E::Risk, E::Process]),
            Self::Performs => (&[E::Person], &[E::Control]),
            Self::Tests => (&[E::Evidence], &[E::Control]),
            Self::Evidences => (&[E::Evidence, E::Document], &[E::Control, E::Requirement]),
            Self::Executes => (&[E::Person], &[E::Evidence]),
            Self::Supports => (&[E::Control], &[E::Process]),
            Self::DependsOn | Self::PrecededBy => (&[E::Control], &[E::Control]),
            Self::Addresses => (&[E::Control], &[E::Objective]),
            Self::Requires => (&[E::Requirement], &[E::Objective, E::Control]),
            Self::Mandates => (&[E::Requirement], &[E::Objective]),
            Self::Manages => (&[E::Person], &[E::Process]),
            Self::Operates => (&[E::Department], &[E::System]),
            Self::BelongsTo => (
                &[E::Person, E::Control, E::Risk, E::Evidence, E::Department],
                &[E::Department, E::Company],
            ),
            Self::Uses => (&[E::Process], &[E::System]),
            Self::OccurredIn => (&[E::Evidence], &[E::Period]),
            Self::EffectiveFrom => (&[E::Control], &[E::Period]),
            Self::Supersedes => (&[E::Requirement], &[E::Requirement]),
            Self::Affects => (&[E::Risk], &[E::Process]),
            Self::Impacts => (&[E::Evidence, E::Risk], &[E::Control]),
        }
    }

    /// Whether an edge of this type may run from `source` to `target`.
    #[must_use]
    pub fn permits(self, source: EntityType, target: EntityType) -> bool {
        let (sources, targets) = self.endpoints();
        sources.contains(&source) && targets.contains(&target)
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipType {
    type Err = CoreError;

    /// Accepts `"belongs_to"` as well as the legacy `"BELONGS_TO"` spelling.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| CoreError::InvalidRelationshipType(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Which edges to follow from an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Outgoing,
    Incoming,
    #[default]
    Both,
}

impl Direction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Outgoing => "outgoing",
            Self::Incoming => "incoming",
            Self::Both => "both",
        }
    }

    #[must_use]
    pub const fn includes_outgoing(self) -> bool {
        matches!(self, Self::Outgoing | Self::Both)
    }

    #[must_use]
    pub const fn includes_incoming(self) -> bool {
        matches!(self, Self::Incoming | Self::Both)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "outgoing" => Ok(Self::Outgoing),
            "incoming" => Ok(Self::Incoming),
            "both" => Ok(Self::Both),
            other => Err(CoreError::InvalidDirection(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// EdgeDirection
// ---------------------------------------------------------------------------

/// Orientation of a single traversed edge relative to the entity it was reached from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EdgeDirection {
    Outgoing,
    Incoming,
}

impl EdgeDirection {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Outgoing => "outgoing",
            Self::Incoming => "incoming",
        }
    }
}

impl fmt::Display for EdgeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
