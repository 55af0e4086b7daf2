//! Static mapping from business records to graph shapes.
//!
//! Which doctypes become entities, which link fields become relationships,
//! and which record fields are copied into entity properties. The tables are
//! closed: a doctype or field role not listed here is never derived.

use kg_core::enums::{EdgeDirection, EntityType, RelationshipType};

pub mod doctypes {
    pub const COMPANY: &str = "Company";
    pub const DEPARTMENT: &str = "Department";
    pub const USER: &str = "User";
    pub const CONTROL_ACTIVITY: &str = "Control Activity";
    pub const RISK_REGISTER_ENTRY: &str = "Risk Register Entry";
    pub const CONTROL_EVIDENCE: &str = "Control Evidence";
    pub const TEST_EXECUTION: &str = "Test Execution";
}

use doctypes::{
    COMPANY, CONTROL_ACTIVITY, CONTROL_EVIDENCE, DEPARTMENT, RISK_REGISTER_ENTRY, TEST_EXECUTION,
    USER,
};

/// Doctype -> entity type.
pub const DOCTYPE_ENTITY_TYPES: [(&str, EntityType); 7] = [
    (CONTROL_ACTIVITY, EntityType::Control),
    (RISK_REGISTER_ENTRY, EntityType::Risk),
    (USER, EntityType::Person),
    (CONTROL_EVIDENCE, EntityType::Evidence),
    (TEST_EXECUTION, EntityType::Evidence),
    (DEPARTMENT, EntityType::Department),
    (COMPANY, EntityType::Company),
];

/// Doctypes walked by a full rebuild, referenced types first. `User` records
/// are only derived as link targets.
pub const REBUILD_ORDER: [&str; 6] = [
    COMPANY,
    DEPARTMENT,
    CONTROL_ACTIVITY,
    RISK_REGISTER_ENTRY,
    CONTROL_EVIDENCE,
    TEST_EXECUTION,
];

/// How one link field on a record becomes a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMapping {
    pub doctype: &'static str,
    pub role: &'static str,
    pub relationship_type: RelationshipType,
    pub target_doctype: &'static str,
    /// `Outgoing`: record -> target. `Incoming`: target -> record.
    pub direction: EdgeDirection,
}

const fn field(
    doctype: &'static str,
    role: &'static str,
    relationship_type: RelationshipType,
    target_doctype: &'static str,
    direction: EdgeDirection,
) -> FieldMapping {
    FieldMapping {
        doctype,
        role,
        relationship_type,
        target_doctype,
        direction,
    }
}

pub const FIELD_MAPPINGS: [FieldMapping; 11] = [
    field(CONTROL_ACTIVITY, "control_owner", RelationshipType::Owns, USER, EdgeDirection::Incoming),
    field(CONTROL_ACTIVITY, "control_performer", RelationshipType::Performs, USER, EdgeDirection::Incoming),
    field(CONTROL_ACTIVITY, "risks_addressed", RelationshipType::Mitigates, RISK_REGISTER_ENTRY, EdgeDirection::Outgoing),
    field(CONTROL_ACTIVITY, "company", RelationshipType::BelongsTo, COMPANY, EdgeDirection::Outgoing),
    field(CONTROL_ACTIVITY, "department", RelationshipType::BelongsTo, DEPARTMENT, EdgeDirection::Outgoing),
    field(RISK_REGISTER_ENTRY, "risk_owner", RelationshipType::Owns, USER, EdgeDirection::Incoming),
    field(RISK_REGISTER_ENTRY, "company", RelationshipType::BelongsTo, COMPANY, EdgeDirection::Outgoing),
    field(RISK_REGISTER_ENTRY, "department", RelationshipType::BelongsTo, DEPARTMENT, EdgeDirection::Outgoing),
    field(CONTROL_EVIDENCE, "control_activity", RelationshipType::Tests, CONTROL_ACTIVITY, EdgeDirection::Outgoing),
    field(TEST_EXECUTION, "control", RelationshipType::Tests, CONTROL_ACTIVITY, EdgeDirection::Outgoing),
    field(TEST_EXECUTION, "tester", RelationshipType::Executes, USER, EdgeDirection::Incoming),
];

const COMMON_PROPERTIES: [&str; 3] = ["status", "company", "department"];
const CONTROL_PROPERTIES: [&str; 4] =
    ["control_type", "automation_level", "frequency", "is_key_control"];
const RISK_PROPERTIES: [&str; 4] = ["risk_category", "likelihood", "impact", "inherent_risk_score"];

impl FieldMapping {
    #[must_use]
    pub fn target_entity_type(&self) -> EntityType {
        entity_type_for(self.target_doctype).unwrap_or(EntityType::Document)
    }

    /// `(source, target)` of the edge between the record's entity and the link target's.
    #[must_use]
    pub fn orient<'k>(&self, record_key: &'k str, target_key: &'k str) -> (&'k str, &'k str) {
        match self.direction {
            EdgeDirection::Outgoing => (record_key, target_key),
            EdgeDirection::Incoming => (target_key, record_key),
        }
    }

    /// Whether an existing edge of the record's entity was produced by this mapping.
    #[must_use]
    pub fn owns_edge(
        &self,
        relationship_type: RelationshipType,
        direction: EdgeDirection,
        peer_type: EntityType,
    ) -> bool {
        self.relationship_type == relationship_type
            && self.direction == direction
            && self.target_entity_type() == peer_type
    }
}

#[must_use]
pub fn entity_type_for(doctype: &str) -> Option<EntityType> {
    DOCTYPE_ENTITY_TYPES
        .iter()
        .find(|(d, _)| *d == doctype)
        .map(|(_, t)| *t)
}

#[must_use]
pub fn field_mapping(doctype: &str, role: &str) -> Option<&'static FieldMapping> {
    FIELD_MAPPINGS
        .iter()
        .find(|m| m.doctype == doctype && m.role == role)
}

pub fn mappings_for(doctype: &str) -> impl Iterator<Item = &'static FieldMapping> + '_ {
    FIELD_MAPPINGS.iter().filter(move |m| m.doctype == doctype)
}

/// Record fields copied into entity properties for `doctype`.
#[must_use]
pub fn property_fields(doctype: &str) -> Vec<&'static str> {
    let mut fields = COMMON_PROPERTIES.to_vec();
    match doctype {
        CONTROL_ACTIVITY => fields.extend(CONTROL_PROPERTIES),
        RISK_REGISTER_ENTRY => fields.extend(RISK_PROPERTIES),
        _ => {}
    }
    fields
}
