//! Full rebuild: counts, determinism, skips, and cancellation.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kg_core::entities::SourceRef;
use kg_core::enums::{EntityType, RelationshipType};
use kg_query::QueryEngine;
use kg_sync::{CancelToken, MemoryRecordSource, RecordLink, RecordSource, SourceRecord, SyncEngine};
use pretty_assertions::assert_eq;

use common::{compliance_records, graph};

/// Wraps a store, cancelling a token or failing when a given record's links are read,
/// and optionally failing to list one doctype.
struct Interfering {
    inner: MemoryRecordSource,
    trigger: &'static str,
    cancel: Option<CancelToken>,
    unlistable: Option<&'static str>,
    link_reads: AtomicUsize,
}

impl Interfering {
    fn new(trigger: &'static str) -> Self {
        Self {
            inner: compliance_records(),
            trigger,
            cancel: None,
            unlistable: None,
            link_reads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RecordSource for Interfering {
    async fn list_records(
        &self,
        doctype: &str,
        since: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<SourceRecord>> {
        if self.unlistable == Some(doctype) {
            anyhow::bail!("timeout listing {doctype}");
        }
        self.inner.list_records(doctype, since).await
    }

    async fn get_record(&self, source: &SourceRef) -> anyhow::Result<Option<SourceRecord>> {
        self.inner.get_record(source).await
    }

    async fn get_record_links(&self, record: &SourceRecord) -> anyhow::Result<Vec<RecordLink>> {
        self.link_reads.fetch_add(1, Ordering::SeqCst);
        if record.name == self.trigger {
            match &self.cancel {
                Some(token) => token.cancel(),
                None => anyhow::bail!("links for {} are unreadable", record.name),
            }
        }
        self.inner.get_record_links(record).await
    }
}

#[tokio::test]
async fn rebuild_derives_entities_and_relationships() {
    let svc = graph().await;
    let records = compliance_records();
    let response = SyncEngine::new(&svc, &records)
        .rebuild(&CancelToken::new())
        .await
        .unwrap();

    assert_eq!(response.entities_created, 10);
    assert_eq!(response.relationships_created, 15);
    assert_eq!(response.records_processed, 8);
    assert!(!response.cancelled);
    assert_eq!(response.skipped.len(), 1);
    assert_eq!(response.skipped[0].source, SourceRef::new("Risk Register Entry", "RR-2"));
    assert_eq!(response.skipped[0].field.as_deref(), Some("department"));

    let stats = svc.get_statistics().await.unwrap();
    assert_eq!(stats.total_entities, 10);
    assert_eq!(stats.total_relationships, 15);
    assert_eq!(stats.relationships_by_type["mitigates"], 3);
    assert_eq!(stats.relationships_by_type["tests"], 2);
    assert_eq!(stats.entities_by_type["person"], 2);

    let retired = svc
        .find_entity(EntityType::Control, &SourceRef::new("Control Activity", "CA-3"))
        .await
        .unwrap();
    assert!(retired.is_none());
}

#[tokio::test]
async fn record_properties_land_on_entities() {
    let svc = graph().await;
    let records = compliance_records();
    SyncEngine::new(&svc, &records)
        .rebuild(&CancelToken::new())
        .await
        .unwrap();

    let control = svc
        .find_entity(EntityType::Control, &SourceRef::new("Control Activity", "CA-1"))
        .await
        .unwrap()
        .unwrap();
    let props = control.properties.unwrap();
    assert_eq!(props["is_key_control"], 1);
    assert_eq!(props["company"], "Acme");

    let owner = svc
        .find_entity(EntityType::Person, &SourceRef::new("User", "alice@acme.test"))
        .await
        .unwrap()
        .unwrap();
    let owned = svc
        .list_relationships(&owner.entity_key, kg_core::enums::Direction::Outgoing)
        .await
        .unwrap();
    assert_eq!(owned.len(), 2);
    assert!(owned.iter().all(|e| e.relationship_type == RelationshipType::Owns));
}

#[tokio::test]
async fn consecutive_rebuilds_are_identical() {
    let svc = graph().await;
    let records = compliance_records();
    let engine = SyncEngine::new(&svc, &records);
    let query = QueryEngine::with_defaults(&svc);

    let first = engine.rebuild(&CancelToken::new()).await.unwrap();
    let first_view = query
        .get_visualization_data(Some(EntityType::Control), None, None, None)
        .await
        .unwrap();
    let first_all = query.get_visualization_data(None, None, None, None).await.unwrap();

    let second = engine.rebuild(&CancelToken::new()).await.unwrap();
    let second_view = query
        .get_visualization_data(Some(EntityType::Control), None, None, None)
        .await
        .unwrap();
    let second_all = query.get_visualization_data(None, None, None, None).await.unwrap();

    assert_eq!(first.entities_created, second.entities_created);
    assert_eq!(first.relationships_created, second.relationships_created);
    assert_eq!(first.skipped, second.skipped);
    assert_eq!(first_view.nodes, second_view.nodes);
    let ids = |g: &kg_core::visual::VisualizationGraph| -> Vec<String> {
        g.nodes.iter().map(|n| n.id.clone()).collect()
    };
    assert_eq!(ids(&first_all), ids(&second_all));
    assert_eq!(first_all.edge_count, second_all.edge_count);
}

#[tokio::test]
async fn failing_record_is_skipped_and_rebuild_continues() {
    let svc = graph().await;
    let source = Interfering::new("CA-2");
    let response = SyncEngine::new(&svc, &source)
        .rebuild(&CancelToken::new())
        .await
        .unwrap();

    let failed: Vec<&SourceRef> = response
        .skipped
        .iter()
        .filter(|s| s.field.is_none())
        .map(|s| &s.source)
        .collect();
    assert_eq!(failed, vec![&SourceRef::new("Control Activity", "CA-2")]);
    assert!(response.skipped.iter().any(|s| s.reason.contains("unreadable")));
    assert_eq!(response.records_processed, 8);

    // Everything after CA-2 was still derived.
    let test_run = svc
        .find_entity(EntityType::Evidence, &SourceRef::new("Test Execution", "TE-1"))
        .await
        .unwrap();
    assert!(test_run.is_some());
}

#[tokio::test]
async fn unlistable_doctype_is_reported_and_rebuild_continues() {
    let svc = graph().await;
    let source = Interfering {
        unlistable: Some("Control Evidence"),
        ..Interfering::new("none")
    };
    let response = SyncEngine::new(&svc, &source)
        .rebuild(&CancelToken::new())
        .await
        .unwrap();

    let doctype_skip = response
        .skipped
        .iter()
        .find(|s| s.source == SourceRef::new("Control Evidence", ""))
        .expect("doctype-level skip");
    assert_eq!(doctype_skip.field, None);
    assert!(doctype_skip.reason.contains("timeout listing Control Evidence"));
    assert!(!response.cancelled);

    // EV-1 and its tests edge are missing; Test Execution still ran.
    assert_eq!(response.records_processed, 7);
    assert_eq!(response.entities_created, 9);
    assert_eq!(response.relationships_created, 14);
    let test_run = svc
        .find_entity(EntityType::Evidence, &SourceRef::new("Test Execution", "TE-1"))
        .await
        .unwrap();
    assert!(test_run.is_some());
}

#[tokio::test]
async fn cancellation_stops_between_records() {
    let svc = graph().await;
    let token = CancelToken::new();
    let source = Interfering {
        cancel: Some(token.clone()),
        ..Interfering::new("CA-1")
    };
    let response = SyncEngine::new(&svc, &source).rebuild(&token).await.unwrap();

    assert!(response.cancelled);
    // Acme, Finance, and CA-1 (finished before the check).
    assert_eq!(response.records_processed, 3);
    assert_eq!(source.link_reads.load(Ordering::SeqCst), 3);

    let stats = svc.get_statistics().await.unwrap();
    assert_eq!(stats.total_entities, 7);
    assert_eq!(stats.total_relationships, 6);
}

#[tokio::test]
async fn cancelled_before_start_leaves_an_empty_graph() {
    let svc = graph().await;
    let records = compliance_records();
    let engine = SyncEngine::new(&svc, &records);
    engine.rebuild(&CancelToken::new()).await.unwrap();

    let token = CancelToken::new();
    token.cancel();
    let response = engine.rebuild(&token).await.unwrap();
    assert!(response.cancelled);
    assert_eq!(response.records_processed, 0);
    assert_eq!(svc.count_active_entities().await.unwrap(), 0);
}
