//! Bounded breadth-first traversal.
//!
//! Expansion is level by level. Within a level, candidate edges from every
//! frontier entity are ordered by relationship creation (`seq`), and the first
//! edge to reach an entity claims it. Identical graphs therefore always yield
//! identical discovery order.

use std::collections::HashSet;

use kg_core::entities::{Entity, Neighbor, RelationshipEdge};
use kg_core::enums::{Direction, RelationshipType};
use kg_db::service::GraphService;
use tracing::debug;

use crate::QueryEngine;
use crate::error::QueryError;

/// Whether an edge of `relationship_type` may be followed under `filter`.
/// `None` and an empty slice both mean any type.
pub(crate) fn follows(
    filter: Option<&[RelationshipType]>,
    relationship_type: RelationshipType,
) -> bool {
    filter.is_none_or(|types| types.is_empty() || types.contains(&relationship_type))
}

/// Expand from `start` up to `depth` hops along edges permitted by
/// `relationship_types`.
///
/// Every reachable entity is traversed, but only those passing `accept` are
/// returned. Stops as soon as `limit` accepted entities have been found.
pub(crate) async fn breadth_first<F>(
    svc: &GraphService,
    start: &str,
    direction: Direction,
    depth: u32,
    relationship_types: Option<&[RelationshipType]>,
    limit: Option<usize>,
    accept: F,
) -> Result<Vec<Neighbor>, QueryError>
where
    F: Fn(&Entity) -> bool,
{
    let mut visited: HashSet<String> = HashSet::from([start.to_string()]);
    let mut frontier = vec![start.to_string()];
    let mut found = Vec::new();

    if limit == Some(0) {
        return Ok(found);
    }

    for hop in 1..=depth {
        if frontier.is_empty() {
            break;
        }

        let mut candidates: Vec<(String, RelationshipEdge)> = Vec::new();
        for key in &frontier {
            for edge in svc.list_relationships(key, direction).await? {
                if follows(relationship_types, edge.relationship_type) {
                    candidates.push((key.clone(), edge));
                }
            }
        }
        candidates.sort_by_key(|(_, edge)| edge.seq);

        let mut next = Vec::new();
        for (via_key, edge) in candidates {
            if !visited.insert(edge.neighbor_key.clone()) {
                continue;
            }
            let entity = svc.get_entity(&edge.neighbor_key).await?;
            next.push(edge.neighbor_key);
            if accept(&entity) {
                found.push(Neighbor {
                    entity,
                    via_key,
                    relationship_type: edge.relationship_type,
                    direction: edge.direction,
                    hop_distance: hop,
                });
                if limit.is_some_and(|n| found.len() >= n) {
                    return Ok(found);
                }
            }
        }
        frontier = next;
    }

    Ok(found)
}

impl QueryEngine<'_> {
    /// Entities within `max_depth` hops of `entity_key`.
    ///
    /// Depth defaults to `query.default_depth` and is clamped to
    /// `query.max_depth`. Depth 1 returns only direct neighbors. With
    /// `relationship_types`, only edges of those types are followed.
    ///
    /// # Errors
    ///
    /// `NotFound` (via `QueryError::Database`) for an unknown key.
    pub async fn get_entity_neighbors(
        &self,
        entity_key: &str,
        direction: Direction,
        max_depth: Option<u32>,
        relationship_types: Option<&[RelationshipType]>,
    ) -> Result<Vec<Neighbor>, QueryError> {
        self.service().get_entity(entity_key).await?;
        let depth = self.limits().clamp_depth(max_depth);
        let neighbors = breadth_first(
            self.service(),
            entity_key,
            direction,
            depth,
            relationship_types,
            None,
            |_| true,
        )
        .await?;
        debug!(entity_key, %direction, depth, found = neighbors.len(), "neighbor traversal");
        Ok(neighbors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::helpers::{link, seed, test_service};
    use kg_core::enums::{EdgeDirection, EntityType};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn depth_one_returns_direct_neighbors_only() {
        let svc = test_service().await;
        let person = seed(&svc, EntityType::Person, "owner").await;
        let control = seed(&svc, EntityType::Control, "CA-1").await;
        let risk = seed(&svc, EntityType::Risk, "RR-1").await;
        link(&svc, &person, &control, RelationshipType::Owns).await;
        link(&svc, &control, &risk, RelationshipType::Mitigates).await;

        let engine = QueryEngine::with_defaults(&svc);
        let direct = engine
            .get_entity_neighbors(&person.entity_key, Direction::Both, Some(1), None)
            .await
            .unwrap();
        assert_eq!(direct.len(), 1);
        assert_eq!(direct[0].entity.entity_key, control.entity_key);
        assert_eq!(direct[0].hop_distance, 1);
        assert_eq!(direct[0].direction, EdgeDirection::Outgoing);

        let two = engine
            .get_entity_neighbors(&person.entity_key, Direction::Both, Some(2), None)
            .await
            .unwrap();
        let hops: Vec<(String, u32)> = two
            .iter()
            .map(|n| (n.entity.entity_key.clone(), n.hop_distance))
            .collect();
        assert_eq!(
            hops,
            vec![(control.entity_key.clone(), 1), (risk.entity_key.clone(), 2)]
        );
        assert_eq!(two[1].via_key, control.entity_key);
    }

    #[tokio::test]
    async fn direction_limits_expansion() {
        let svc = test_service().await;
        let person = seed(&svc, EntityType::Person, "owner").await;
        let control = seed(&svc, EntityType::Control, "CA-1").await;
        let risk = seed(&svc, EntityType::Risk, "RR-1").await;
        link(&svc, &person, &control, RelationshipType::Owns).await;
        link(&svc, &control, &risk, RelationshipType::Mitigates).await;

        let engine = QueryEngine::with_defaults(&svc);
        let outgoing = engine
            .get_entity_neighbors(&control.entity_key, Direction::Outgoing, Some(3), None)
            .await
            .unwrap();
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].entity.entity_key, risk.entity_key);

        let incoming = engine
            .get_entity_neighbors(&control.entity_key, Direction::Incoming, Some(3), None)
            .await
            .unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].direction, EdgeDirection::Incoming);
    }

    #[tokio::test]
    async fn same_depth_ties_follow_creation_order() {
        let svc = test_service().await;
        let control = seed(&svc, EntityType::Control, "CA-1").await;
        let r1 = seed(&svc, EntityType::Risk, "RR-1").await;
        let r2 = seed(&svc, EntityType::Risk, "RR-2").await;
        let r3 = seed(&svc, EntityType::Risk, "RR-3").await;
        link(&svc, &control, &r3, RelationshipType::Mitigates).await;
        link(&svc, &control, &r1, RelationshipType::Mitigates).await;
        link(&svc, &control, &r2, RelationshipType::Mitigates).await;

        let found = QueryEngine::with_defaults(&svc)
            .get_entity_neighbors(&control.entity_key, Direction::Both, Some(1), None)
            .await
            .unwrap();
        let names: Vec<&str> = found.iter().map(|n| n.entity.source.name.as_str()).collect();
        assert_eq!(names, vec!["RR-3", "RR-1", "RR-2"]);
    }

    #[tokio::test]
    async fn depth_is_clamped_to_ceiling() {
        let svc = test_service().await;
        let mut chain = Vec::new();
        for i in 0..10 {
            chain.push(seed(&svc, EntityType::Control, &format!("CA-{i}")).await);
        }
        for pair in chain.windows(2) {
            link(&svc, &pair[0], &pair[1], RelationshipType::DependsOn).await;
        }

        let engine = QueryEngine::with_defaults(&svc);
        let found = engine
            .get_entity_neighbors(&chain[0].entity_key, Direction::Outgoing, Some(100), None)
            .await
            .unwrap();
        assert_eq!(found.len(), engine.limits().max_depth as usize);
    }

    #[tokio::test]
    async fn unknown_start_is_not_found() {
        let svc = test_service().await;
        let err = QueryEngine::with_defaults(&svc)
            .get_entity_neighbors("ctl-0000000000000000", Direction::Both, None, None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn relationship_filter_prunes_expansion() {
        let svc = test_service().await;
        let person = seed(&svc, EntityType::Person, "owner").await;
        let control = seed(&svc, EntityType::Control, "CA-1").await;
        let risk = seed(&svc, EntityType::Risk, "RR-1").await;
        let evidence = seed(&svc, EntityType::Evidence, "EV-1").await;
        link(&svc, &person, &control, RelationshipType::Owns).await;
        link(&svc, &control, &risk, RelationshipType::Mitigates).await;
        link(&svc, &evidence, &control, RelationshipType::Tests).await;

        let engine = QueryEngine::with_defaults(&svc);
        let owned = engine
            .get_entity_neighbors(
                &control.entity_key,
                Direction::Both,
                Some(3),
                Some(&[RelationshipType::Owns]),
            )
            .await
            .unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].entity.entity_key, person.entity_key);
        assert_eq!(owned[0].relationship_type, RelationshipType::Owns);

        // The filter also applies past the first hop: risk is behind a Mitigates edge.
        let from_person = engine
            .get_entity_neighbors(
                &person.entity_key,
                Direction::Both,
                Some(3),
                Some(&[RelationshipType::Owns, RelationshipType::Tests]),
            )
            .await
            .unwrap();
        let names: Vec<&str> = from_person
            .iter()
            .map(|n| n.entity.source.name.as_str())
            .collect();
        assert_eq!(names, vec!["CA-1", "EV-1"]);

        let unfiltered = engine
            .get_entity_neighbors(&control.entity_key, Direction::Both, Some(1), Some(&[]))
            .await
            .unwrap();
        assert_eq!(unfiltered.len(), 3);
    }
}
