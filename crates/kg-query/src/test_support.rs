//! Shared fixtures for kg-query unit tests.

#[cfg(test)]
pub(crate) mod helpers {
    use kg_core::entities::{Entity, SourceRef};
    use kg_core::enums::{EntityType, RelationshipType};
    use kg_db::service::GraphService;

    pub async fn test_service() -> GraphService {
        GraphService::new_local(":memory:").await.unwrap()
    }

    pub async fn seed(svc: &GraphService, entity_type: EntityType, name: &str) -> Entity {
        svc.get_or_create(entity_type, &SourceRef::new(entity_type.display_name(), name), name)
            .await
            .unwrap()
    }

    pub async fn link(svc: &GraphService, source: &Entity, target: &Entity, t: RelationshipType) {
        svc.link(&source.entity_key, &target.entity_key, t)
            .await
            .unwrap();
    }
}
