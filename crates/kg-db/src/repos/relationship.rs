//! Relationship store: typed, directed edges between active entities.
//!
//! The schema rejects duplicates (unique triple), self-links (CHECK), and
//! edges to missing or inactive entities (`trg_graph_relationships_active_endpoints`).
//! The methods here check the same conditions up front to return precise errors,
//! then rely on the schema for the racy cases.

use std::collections::VecDeque;

use chrono::Utc;
use tracing::debug;

use kg_core::entities::{Entity, Relationship, RelationshipCounts, RelationshipEdge};
use kg_core::enums::{Direction, RelationshipType};

use crate::error::DatabaseError;
use crate::helpers::{get_count, is_dangling_violation, parse_datetime, parse_enum};
use crate::service::GraphService;

const RELATIONSHIP_COLUMNS: &str =
    "seq, source_key, target_key, relationship_type, weight, created_at";

/// Default number of edges a cursor fetches per round trip.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

fn row_to_relationship(row: &libsql::Row) -> Result<Relationship, DatabaseError> {
    Ok(Relationship {
        seq: row.get::<i64>(0)?,
        source_key: row.get::<String>(1)?,
        target_key: row.get::<String>(2)?,
        relationship_type: parse_enum(&row.get::<String>(3)?)?,
        weight: row.get::<Option<f64>>(4)?,
        created_at: parse_datetime(&row.get::<String>(5)?)?,
    })
}

fn row_to_edge(row: &libsql::Row) -> Result<RelationshipEdge, DatabaseError> {
    Ok(RelationshipEdge {
        seq: row.get::<i64>(0)?,
        neighbor_key: row.get::<String>(1)?,
        relationship_type: parse_enum(&row.get::<String>(2)?)?,
        direction: parse_enum(&row.get::<String>(3)?)?,
    })
}

/// Result of [`GraphService::link`].
#[derive(Debug, Clone, PartialEq)]
pub struct LinkOutcome {
    pub relationship: Relationship,
    /// False when the identical edge already existed.
    pub created: bool,
}

impl GraphService {
    /// Create a directed edge; a no-op if the identical edge exists.
    ///
    /// # Errors
    ///
    /// `SelfLink`, `DanglingEntity` (missing or inactive endpoint),
    /// `IncompatibleEndpoints`, or a storage error.
    pub async fn link(
        &self,
        source_key: &str,
        target_key: &str,
        relationship_type: RelationshipType,
    ) -> Result<LinkOutcome, DatabaseError> {
        self.link_with_weight(source_key, target_key, relationship_type, None)
            .await
    }

    /// [`GraphService::link`] with an optional edge weight. An existing edge keeps its weight.
    ///
    /// # Errors
    ///
    /// Same as [`GraphService::link`].
    pub async fn link_with_weight(
        &self,
        source_key: &str,
        target_key: &str,
        relationship_type: RelationshipType,
        weight: Option<f64>,
    ) -> Result<LinkOutcome, DatabaseError> {
        if source_key == target_key {
            return Err(DatabaseError::SelfLink {
                entity_key: source_key.to_string(),
            });
        }
        let source = self.require_active(source_key).await?;
        let target = self.require_active(target_key).await?;
        if !relationship_type.permits(source.entity_type, target.entity_type) {
            return Err(DatabaseError::IncompatibleEndpoints {
                relationship_type,
                source_type: source.entity_type,
                target_type: target.entity_type,
            });
        }

        let inserted = self
            .db()
            .execute_with(
                "INSERT INTO graph_relationships
                    (source_key, target_key, relationship_type, weight, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (source_key, target_key, relationship_type) DO NOTHING",
                || {
                    libsql::params![
                        source_key,
                        target_key,
                        relationship_type.as_str(),
                        weight,
                        Utc::now().to_rfc3339()
                    ]
                },
            )
            .await;

        let created = match inserted {
            Ok(n) => n > 0,
            Err(DatabaseError::LibSql(e)) if is_dangling_violation(&e) => {
                // An endpoint was deactivated after the check above.
                let gone = if self.require_active(source_key).await.is_err() {
                    source_key
                } else {
                    target_key
                };
                return Err(DatabaseError::DanglingEntity {
                    entity_key: gone.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        if created {
            self.path_cache()
                .invalidate_edge(source_key, target_key, relationship_type);
            debug!(source_key, target_key, %relationship_type, "linked");
        }

        let relationship = self
            .get_relationship(source_key, target_key, relationship_type)
            .await?
            .ok_or(DatabaseError::NoResult)?;
        Ok(LinkOutcome {
            relationship,
            created,
        })
    }

    /// Remove an edge. Returns whether anything was removed; absent edges are not an error.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the delete fails.
    pub async fn unlink(
        &self,
        source_key: &str,
        target_key: &str,
        relationship_type: RelationshipType,
    ) -> Result<bool, DatabaseError> {
        let removed = self
            .db()
            .execute_with(
                "DELETE FROM graph_relationships
                 WHERE source_key = ?1 AND target_key = ?2 AND relationship_type = ?3",
                || libsql::params![source_key, target_key, relationship_type.as_str()],
            )
            .await?
            > 0;
        if removed {
            self.path_cache()
                .invalidate_edge(source_key, target_key, relationship_type);
            debug!(source_key, target_key, %relationship_type, "unlinked");
        }
        Ok(removed)
    }

    /// Fetch one edge by its identity triple.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn get_relationship(
        &self,
        source_key: &str,
        target_key: &str,
        relationship_type: RelationshipType,
    ) -> Result<Option<Relationship>, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                &format!(
                    "SELECT {RELATIONSHIP_COLUMNS} FROM graph_relationships
                     WHERE source_key = ?1 AND target_key = ?2 AND relationship_type = ?3"
                ),
                || libsql::params![source_key, target_key, relationship_type.as_str()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_relationship(&row)?)),
            None => Ok(None),
        }
    }

    /// All edges touching an entity, in creation order.
    ///
    /// Drains a [`RelationshipCursor`]; use the cursor directly to page.
    ///
    /// # Errors
    ///
    /// `NotFound` if the key never existed.
    pub async fn list_relationships(
        &self,
        entity_key: &str,
        direction: Direction,
    ) -> Result<Vec<RelationshipEdge>, DatabaseError> {
        self.get_entity(entity_key).await?;
        let mut cursor = RelationshipCursor::new(entity_key, direction);
        let mut edges = Vec::new();
        loop {
            let page = cursor.next_page(self).await?;
            if page.is_empty() {
                return Ok(edges);
            }
            edges.extend(page);
        }
    }

    /// Every edge of one type, in creation order.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_relationships_by_type(
        &self,
        relationship_type: RelationshipType,
    ) -> Result<Vec<Relationship>, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                &format!(
                    "SELECT {RELATIONSHIP_COLUMNS} FROM graph_relationships
                     WHERE relationship_type = ?1 ORDER BY seq ASC"
                ),
                || [relationship_type.as_str()],
            )
            .await?;
        let mut relationships = Vec::new();
        while let Some(row) = rows.next().await? {
            relationships.push(row_to_relationship(&row)?);
        }
        Ok(relationships)
    }

    /// Edges whose endpoints are both in `keys`, in creation order.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn relationships_among(
        &self,
        keys: &[String],
    ) -> Result<Vec<Relationship>, DatabaseError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let params: Vec<libsql::Value> = keys
            .iter()
            .map(|k| libsql::Value::Text(k.clone()))
            .collect();
        let placeholders = (1..=keys.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {RELATIONSHIP_COLUMNS} FROM graph_relationships
             WHERE source_key IN ({placeholders}) AND target_key IN ({placeholders})
             ORDER BY seq ASC"
        );
        let mut rows = self.db().query_with(&sql, || params.clone()).await?;
        let mut relationships = Vec::new();
        while let Some(row) = rows.next().await? {
            relationships.push(row_to_relationship(&row)?);
        }
        Ok(relationships)
    }

    /// Outgoing, incoming, and total edge counts for an entity.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn relationship_counts(
        &self,
        entity_key: &str,
    ) -> Result<RelationshipCounts, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                "SELECT
                    (SELECT COUNT(*) FROM graph_relationships WHERE source_key = ?1),
                    (SELECT COUNT(*) FROM graph_relationships WHERE target_key = ?1)",
                || [entity_key],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        let outgoing = get_count(&row, 0)?;
        let incoming = get_count(&row, 1)?;
        Ok(RelationshipCounts {
            outgoing,
            incoming,
            total: outgoing + incoming,
        })
    }

    async fn require_active(&self, key: &str) -> Result<Entity, DatabaseError> {
        match self.get_entity(key).await {
            Ok(entity) if entity.is_active => Ok(entity),
            Ok(_) | Err(DatabaseError::NotFound { .. }) => Err(DatabaseError::DanglingEntity {
                entity_key: key.to_string(),
            }),
            Err(e) => Err(e),
        }
    }
}

/// Lazy, finite, restartable walk over the edges touching one entity.
///
/// Pages are fetched by keyset on `seq`, so a cursor observes edges created
/// after it started and survives deletions of already-returned edges.
/// [`RelationshipCursor::position`] can be persisted and fed to
/// [`RelationshipCursor::resume`].
#[derive(Debug, Clone)]
pub struct RelationshipCursor {
    entity_key: String,
    direction: Direction,
    after_seq: i64,
    page_size: u32,
    buffer: VecDeque<RelationshipEdge>,
    exhausted: bool,
}

impl RelationshipCursor {
    #[must_use]
    pub fn new(entity_key: &str, direction: Direction) -> Self {
        Self::resume(entity_key, direction, 0)
    }

    /// Continue after the edge with sequence number `position`.
    #[must_use]
    pub fn resume(entity_key: &str, direction: Direction, position: i64) -> Self {
        Self {
            entity_key: entity_key.to_string(),
            direction,
            after_seq: position,
            page_size: DEFAULT_PAGE_SIZE,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Sequence number of the last edge handed out (0 before the first).
    #[must_use]
    pub const fn position(&self) -> i64 {
        self.after_seq
    }

    /// Start over from the first edge.
    pub fn reset(&mut self) {
        self.after_seq = 0;
        self.buffer.clear();
        self.exhausted = false;
    }

    /// Next page of edges; empty once the walk is finished.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn next_page(
        &mut self,
        svc: &GraphService,
    ) -> Result<Vec<RelationshipEdge>, DatabaseError> {
        if !self.buffer.is_empty() {
            let page: Vec<_> = self.buffer.drain(..).collect();
            if let Some(last) = page.last() {
                self.after_seq = last.seq;
            }
            return Ok(page);
        }
        if self.exhausted {
            return Ok(Vec::new());
        }
        let page = self.fetch(svc).await?;
        if let Some(last) = page.last() {
            self.after_seq = last.seq;
        }
        if page.len() < self.page_size as usize {
            self.exhausted = true;
        }
        Ok(page)
    }

    /// Next single edge, or `None` once the walk is finished.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn next(
        &mut self,
        svc: &GraphService,
    ) -> Result<Option<RelationshipEdge>, DatabaseError> {
        if self.buffer.is_empty() && !self.exhausted {
            let page = self.fetch(svc).await?;
            if page.len() < self.page_size as usize {
                self.exhausted = true;
            }
            self.buffer.extend(page);
        }
        let edge = self.buffer.pop_front();
        if let Some(ref e) = edge {
            self.after_seq = e.seq;
        }
        Ok(edge)
    }

    async fn fetch(&self, svc: &GraphService) -> Result<Vec<RelationshipEdge>, DatabaseError> {
        let outgoing = "SELECT seq, target_key, relationship_type, 'outgoing'
             FROM graph_relationships WHERE source_key = ?1 AND seq > ?2";
        let incoming = "SELECT seq, source_key, relationship_type, 'incoming'
             FROM graph_relationships WHERE target_key = ?1 AND seq > ?2";
        let body = match self.direction {
            Direction::Outgoing => outgoing.to_string(),
            Direction::Incoming => incoming.to_string(),
            Direction::Both => format!("{outgoing} UNION ALL {incoming}"),
        };
        let sql = format!("{body} ORDER BY seq ASC LIMIT ?3");

        let mut rows = svc
            .db()
            .query_with(&sql, || {
                libsql::params![
                    self.entity_key.as_str(),
                    self.after_seq,
                    i64::from(self.page_size)
                ]
            })
            .await?;
        let mut edges = Vec::new();
        while let Some(row) = rows.next().await? {
            edges.push(row_to_edge(&row)?);
        }
        Ok(edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::helpers::{link_ok, seed, test_service};
    use kg_core::enums::{EdgeDirection, EntityType};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn link_is_idempotent() {
        let svc = test_service().await;
        let c = seed(&svc, EntityType::Control, "CA-1").await;
        let r = seed(&svc, EntityType::Risk, "RR-1").await;

        let first = svc
            .link(&c.entity_key, &r.entity_key, RelationshipType::Mitigates)
            .await
            .unwrap();
        let second = svc
            .link(&c.entity_key, &r.entity_key, RelationshipType::Mitigates)
            .await
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.relationship.seq, second.relationship.seq);
        assert_eq!(svc.relationship_counts(&c.entity_key).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn unlink_twice_is_a_noop() {
        let svc = test_service().await;
        let c = seed(&svc, EntityType::Control, "CA-1").await;
        let r = seed(&svc, EntityType::Risk, "RR-1").await;
        link_ok(&svc, &c, &r, RelationshipType::Mitigates).await;

        assert!(svc
            .unlink(&c.entity_key, &r.entity_key, RelationshipType::Mitigates)
            .await
            .unwrap());
        assert!(!svc
            .unlink(&c.entity_key, &r.entity_key, RelationshipType::Mitigates)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn link_to_missing_entity_is_dangling() {
        let svc = test_service().await;
        let c = seed(&svc, EntityType::Control, "CA-1").await;
        let err = svc
            .link(&c.entity_key, "rsk-ffffffffffffffff", RelationshipType::Mitigates)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::DanglingEntity { ref entity_key } if entity_key == "rsk-ffffffffffffffff"));
    }

    #[tokio::test]
    async fn link_to_inactive_entity_is_dangling() {
        let svc = test_service().await;
        let c = seed(&svc, EntityType::Control, "CA-1").await;
        let r = seed(&svc, EntityType::Risk, "RR-1").await;
        svc.deactivate(&r.entity_key).await.unwrap();
        let err = svc
            .link(&c.entity_key, &r.entity_key, RelationshipType::Mitigates)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::DanglingEntity { .. }));
    }

    #[tokio::test]
    async fn trigger_rejects_inactive_endpoint_on_raw_insert() {
        let svc = test_service().await;
        let c = seed(&svc, EntityType::Control, "CA-1").await;
        let r = seed(&svc, EntityType::Risk, "RR-1").await;
        svc.deactivate(&r.entity_key).await.unwrap();
        let err = svc
            .db()
            .conn()
            .execute(
                "INSERT INTO graph_relationships (source_key, target_key, relationship_type, created_at)
                 VALUES (?1, ?2, 'mitigates', '2026-01-01 00:00:00')",
                [c.entity_key.as_str(), r.entity_key.as_str()],
            )
            .await
            .unwrap_err();
        assert!(is_dangling_violation(&err), "{err}");
    }

    #[tokio::test]
    async fn self_link_rejected() {
        let svc = test_service().await;
        let c = seed(&svc, EntityType::Control, "CA-1").await;
        let err = svc
            .link(&c.entity_key, &c.entity_key, RelationshipType::DependsOn)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::SelfLink { .. }));
    }

    #[tokio::test]
    async fn incompatible_endpoints_rejected() {
        let svc = test_service().await;
        let c = seed(&svc, EntityType::Control, "CA-1").await;
        let r = seed(&svc, EntityType::Risk, "RR-1").await;
        let err = svc
            .link(&r.entity_key, &c.entity_key, RelationshipType::Mitigates)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::IncompatibleEndpoints {
                source_type: EntityType::Risk,
                target_type: EntityType::Control,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn list_relationships_in_creation_order() {
        let svc = test_service().await;
        let c = seed(&svc, EntityType::Control, "CA-1").await;
        let r1 = seed(&svc, EntityType::Risk, "RR-1").await;
        let r2 = seed(&svc, EntityType::Risk, "RR-2").await;
        let p = seed(&svc, EntityType::Person, "owner@example.com").await;

        link_ok(&svc, &c, &r2, RelationshipType::Mitigates).await;
        link_ok(&svc, &p, &c, RelationshipType::Owns).await;
        link_ok(&svc, &c, &r1, RelationshipType::Mitigates).await;

        let both = svc
            .list_relationships(&c.entity_key, Direction::Both)
            .await
            .unwrap();
        let summary: Vec<(&str, EdgeDirection)> = both
            .iter()
            .map(|e| (e.neighbor_key.as_str(), e.direction))
            .collect();
        assert_eq!(
            summary,
            vec![
                (r2.entity_key.as_str(), EdgeDirection::Outgoing),
                (p.entity_key.as_str(), EdgeDirection::Incoming),
                (r1.entity_key.as_str(), EdgeDirection::Outgoing),
            ]
        );

        let incoming = svc
            .list_relationships(&c.entity_key, Direction::Incoming)
            .await
            .unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].relationship_type, RelationshipType::Owns);
    }

    #[tokio::test]
    async fn list_relationships_unknown_key_is_not_found() {
        let svc = test_service().await;
        let err = svc
            .list_relationships("ctl-0000000000000000", Direction::Both)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[tokio::test]
    async fn cursor_pages_and_resumes() {
        let svc = test_service().await;
        let c = seed(&svc, EntityType::Control, "CA-1").await;
        let mut risks = Vec::new();
        for i in 0..5 {
            let r = seed(&svc, EntityType::Risk, &format!("RR-{i}")).await;
            link_ok(&svc, &c, &r, RelationshipType::Mitigates).await;
            risks.push(r.entity_key);
        }

        let mut cursor = RelationshipCursor::new(&c.entity_key, Direction::Outgoing).with_page_size(2);
        let first = cursor.next_page(&svc).await.unwrap();
        assert_eq!(first.len(), 2);
        let saved = cursor.position();

        let mut resumed = RelationshipCursor::resume(&c.entity_key, Direction::Outgoing, saved)
            .with_page_size(2);
        let mut rest = Vec::new();
        while let Some(edge) = resumed.next(&svc).await.unwrap() {
            rest.push(edge.neighbor_key);
        }
        assert_eq!(rest, risks[2..].to_vec());

        cursor.reset();
        assert_eq!(cursor.position(), 0);
        assert_eq!(cursor.next_page(&svc).await.unwrap()[0].neighbor_key, risks[0]);
    }

    #[tokio::test]
    async fn cursor_mixing_single_steps_and_pages_yields_each_edge_once() {
        let svc = test_service().await;
        let c = seed(&svc, EntityType::Control, "CA-1").await;
        for i in 0..5 {
            let r = seed(&svc, EntityType::Risk, &format!("RR-{i}")).await;
            link_ok(&svc, &c, &r, RelationshipType::Mitigates).await;
        }

        let mut cursor = RelationshipCursor::new(&c.entity_key, Direction::Outgoing).with_page_size(2);
        let mut seqs = vec![cursor.next(&svc).await.unwrap().unwrap().seq];
        loop {
            let page = cursor.next_page(&svc).await.unwrap();
            if page.is_empty() {
                break;
            }
            seqs.extend(page.iter().map(|e| e.seq));
        }

        let all: Vec<i64> = svc
            .list_relationships(&c.entity_key, Direction::Outgoing)
            .await
            .unwrap()
            .iter()
            .map(|e| e.seq)
            .collect();
        assert_eq!(all.len(), 5);
        assert_eq!(seqs, all);
        assert_eq!(cursor.position(), all[4]);
    }

    #[tokio::test]
    async fn relationships_among_excludes_outside_endpoints() {
        let svc = test_service().await;
        let c = seed(&svc, EntityType::Control, "CA-1").await;
        let r1 = seed(&svc, EntityType::Risk, "RR-1").await;
        let r2 = seed(&svc, EntityType::Risk, "RR-2").await;
        link_ok(&svc, &c, &r1, RelationshipType::Mitigates).await;
        link_ok(&svc, &c, &r2, RelationshipType::Mitigates).await;

        let among = svc
            .relationships_among(&[c.entity_key.clone(), r1.entity_key.clone()])
            .await
            .unwrap();
        assert_eq!(among.len(), 1);
        assert_eq!(among[0].target_key, r1.entity_key);
    }

    #[tokio::test]
    async fn weight_is_kept_on_first_link() {
        let svc = test_service().await;
        let c = seed(&svc, EntityType::Control, "CA-1").await;
        let r = seed(&svc, EntityType::Risk, "RR-1").await;
        svc.link_with_weight(&c.entity_key, &r.entity_key, RelationshipType::Mitigates, Some(0.8))
            .await
            .unwrap();
        let again = svc
            .link_with_weight(&c.entity_key, &r.entity_key, RelationshipType::Mitigates, Some(0.1))
            .await
            .unwrap();
        assert_eq!(again.relationship.weight, Some(0.8));
    }
}
