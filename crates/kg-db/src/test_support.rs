//! Shared test utilities for kg-db unit tests.

#[cfg(test)]
pub(crate) mod helpers {
    use kg_core::entities::{Entity, Relationship, SourceRef};
    use kg_core::enums::{EntityType, RelationshipType};

    use crate::service::GraphService;

    /// Create an in-memory GraphService.
    pub async fn test_service() -> GraphService {
        GraphService::new_local(":memory:").await.unwrap()
    }

    /// Doctype conventionally used for each entity type in tests.
    pub const fn doctype_for(entity_type: EntityType) -> &'static str {
        match entity_type {
            EntityType::Control => "Control Activity",
            EntityType::Risk => "Risk Register Entry",
            EntityType::Person => "User",
            EntityType::Evidence => "Control Evidence",
            _ => "Test Record",
        }
    }

    /// Get-or-create an entity whose label equals its record name.
    pub async fn seed(svc: &GraphService, entity_type: EntityType, name: &str) -> Entity {
        svc.get_or_create(
            entity_type,
            &SourceRef::new(doctype_for(entity_type), name),
            name,
        )
        .await
        .unwrap()
    }

    /// Link two seeded entities, panicking on any error.
    pub async fn link_ok(
        svc: &GraphService,
        source: &Entity,
        target: &Entity,
        relationship_type: RelationshipType,
    ) -> Relationship {
        svc.link(&source.entity_key, &target.entity_key, relationship_type)
            .await
            .unwrap()
            .relationship
    }
}
