//! Incremental sync hooks: save, relink, deactivate, delete.

mod common;

use kg_core::entities::SourceRef;
use kg_core::enums::{Direction, EdgeDirection, EntityType, RelationshipType};
use kg_db::service::GraphService;
use kg_sync::{CancelToken, MemoryRecordSource, SyncEngine};
use pretty_assertions::assert_eq;
use serde_json::json;

use common::{at, compliance_records, graph, link, record};

async fn rebuilt() -> (GraphService, MemoryRecordSource) {
    let svc = graph().await;
    let records = compliance_records();
    SyncEngine::new(&svc, &records)
        .rebuild(&CancelToken::new())
        .await
        .unwrap();
    (svc, records)
}

async fn key_of(svc: &GraphService, entity_type: EntityType, doctype: &str, name: &str) -> String {
    svc.find_entity(entity_type, &SourceRef::new(doctype, name))
        .await
        .unwrap()
        .unwrap_or_else(|| panic!("{doctype}/{name} has no active entity"))
        .entity_key
}

#[tokio::test]
async fn saving_a_new_record_derives_entity_then_links() {
    let svc = graph().await;
    let records = MemoryRecordSource::new();
    records.upsert(record("Company", "Acme", 0, json!({})), vec![]);
    records.upsert(record("User", "carol@acme.test", 0, json!({})), vec![]);
    let control = record("Control Activity", "CA-9", 1, json!({"frequency": "Monthly"}));
    records.upsert(
        control.clone(),
        vec![
            link("control_owner", "User", "carol@acme.test"),
            link("company", "Company", "Acme"),
        ],
    );

    let report = SyncEngine::new(&svc, &records)
        .on_record_saved(&control)
        .await
        .unwrap();
    assert_eq!(report.entities_created, 3);
    assert_eq!(report.relationships_created, 2);
    assert_eq!(report.relationships_removed, 0);
    assert!(report.skipped.is_empty());

    let key = report.entity_key.unwrap();
    let edges = svc.list_relationships(&key, Direction::Both).await.unwrap();
    assert_eq!(
        edges
            .iter()
            .map(|e| (e.relationship_type, e.direction))
            .collect::<Vec<_>>(),
        vec![
            (RelationshipType::Owns, EdgeDirection::Incoming),
            (RelationshipType::BelongsTo, EdgeDirection::Outgoing),
        ]
    );
}

#[tokio::test]
async fn resaving_unchanged_record_is_a_no_op() {
    let (svc, records) = rebuilt().await;
    let control = records.get(&SourceRef::new("Control Activity", "CA-1")).unwrap();
    let report = SyncEngine::new(&svc, &records)
        .on_record_saved(&control)
        .await
        .unwrap();
    assert_eq!(report.entities_created, 0);
    assert_eq!(report.relationships_created, 0);
    assert_eq!(report.relationships_removed, 0);
}

#[tokio::test]
async fn relinking_prunes_only_owned_edges() {
    let (svc, records) = rebuilt().await;
    let ca1 = key_of(&svc, EntityType::Control, "Control Activity", "CA-1").await;
    let before = svc.relationship_counts(&ca1).await.unwrap();
    // owns, performs, evidence tests (incoming); 2x mitigates, 2x belongs_to (outgoing)
    assert_eq!(before.total, 7);

    let mut control = records.get(&SourceRef::new("Control Activity", "CA-1")).unwrap();
    control.modified_at = at(20);
    records.upsert(
        control.clone(),
        vec![
            link("control_owner", "User", "bob@acme.test"),
            link("risks_addressed", "Risk Register Entry", "RR-2"),
            link("company", "Company", "Acme"),
        ],
    );

    let report = SyncEngine::new(&svc, &records)
        .on_record_saved(&control)
        .await
        .unwrap();
    // owns(bob) added; owns(alice), performs(bob), mitigates(RR-1), belongs_to(Finance) removed
    assert_eq!(report.relationships_created, 1);
    assert_eq!(report.relationships_removed, 4);

    let after = svc.list_relationships(&ca1, Direction::Both).await.unwrap();
    let incoming: Vec<RelationshipType> = after
        .iter()
        .filter(|e| e.direction == EdgeDirection::Incoming)
        .map(|e| e.relationship_type)
        .collect();
    // The evidence link belongs to EV-1 and survives.
    assert!(incoming.contains(&RelationshipType::Tests));
    assert!(incoming.contains(&RelationshipType::Owns));
    assert_eq!(after.len(), 4);

    let rr1 = key_of(&svc, EntityType::Risk, "Risk Register Entry", "RR-1").await;
    let rr1_mitigators = svc.list_relationships(&rr1, Direction::Incoming).await.unwrap();
    assert_eq!(rr1_mitigators.len(), 2); // CA-2 mitigates, bob owns
}

#[tokio::test]
async fn saving_an_inactive_record_deactivates_its_entity() {
    let (svc, records) = rebuilt().await;
    let rr1 = key_of(&svc, EntityType::Risk, "Risk Register Entry", "RR-1").await;

    let mut risk = records.get(&SourceRef::new("Risk Register Entry", "RR-1")).unwrap();
    risk.active = false;
    records.upsert(risk.clone(), vec![]);

    let report = SyncEngine::new(&svc, &records)
        .on_record_saved(&risk)
        .await
        .unwrap();
    assert!(report.deactivated);
    assert_eq!(report.entity_key.as_deref(), Some(rr1.as_str()));
    // mitigated by CA-1 and CA-2, owned by bob, belongs to Acme
    assert_eq!(report.relationships_removed, 4);
    assert!(!svc.get_entity(&rr1).await.unwrap().is_active);
}

#[tokio::test]
async fn deleting_a_record_cascades_and_is_idempotent() {
    let (svc, records) = rebuilt().await;
    let ca2 = key_of(&svc, EntityType::Control, "Control Activity", "CA-2").await;
    let source = SourceRef::new("Control Activity", "CA-2");
    records.remove(&source);

    let engine = SyncEngine::new(&svc, &records);
    let report = engine.on_record_deleted(&source).await.unwrap();
    assert!(report.deactivated);
    // owns(alice), mitigates(RR-1), belongs_to(Acme), tests(TE-1)
    assert_eq!(report.relationships_removed, 4);

    let te1 = key_of(&svc, EntityType::Evidence, "Test Execution", "TE-1").await;
    let remaining = svc.list_relationships(&te1, Direction::Both).await.unwrap();
    assert!(remaining.iter().all(|e| e.neighbor_key != ca2));

    let again = engine.on_record_deleted(&source).await.unwrap();
    assert!(!again.deactivated);
    assert_eq!(again.entity_key, None);
}

#[tokio::test]
async fn unmapped_doctype_is_ignored() {
    let svc = graph().await;
    let records = MemoryRecordSource::new();
    let invoice = record("Sales Invoice", "SINV-1", 0, json!({}));
    records.upsert(invoice.clone(), vec![]);

    let report = SyncEngine::new(&svc, &records)
        .on_record_saved(&invoice)
        .await
        .unwrap();
    assert_eq!(report.entity_key, None);
    assert_eq!(svc.count_active_entities().await.unwrap(), 0);
}

#[tokio::test]
async fn bad_links_are_reported_per_field() {
    let svc = graph().await;
    let records = MemoryRecordSource::new();
    let control = record("Control Activity", "CA-5", 0, json!({}));
    records.upsert(
        control.clone(),
        vec![
            link("control_owner", "Company", "Acme"),
            link("reviewer", "User", "dave@acme.test"),
            link("risks_addressed", "Risk Register Entry", "RR-404"),
        ],
    );

    let report = SyncEngine::new(&svc, &records)
        .on_record_saved(&control)
        .await
        .unwrap();
    let fields: Vec<Option<&str>> = report.skipped.iter().map(|s| s.field.as_deref()).collect();
    assert_eq!(
        fields,
        vec![Some("control_owner"), Some("reviewer"), Some("risks_addressed")]
    );
    assert_eq!(report.entities_created, 1);
    assert_eq!(report.relationships_created, 0);
}

#[tokio::test]
async fn catch_up_syncs_recently_modified_records() {
    let (svc, records) = rebuilt().await;
    let mut risk = records.get(&SourceRef::new("Risk Register Entry", "RR-2")).unwrap();
    risk.modified_at = at(30);
    risk.properties.insert("likelihood".into(), json!(2));
    records.upsert(risk, vec![link("company", "Company", "Acme")]);

    let reports = SyncEngine::new(&svc, &records)
        .sync_modified_since(at(25), &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(reports.len(), 1);

    let rr2 = svc
        .find_entity(EntityType::Risk, &SourceRef::new("Risk Register Entry", "RR-2"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rr2.properties.unwrap()["likelihood"], 2);
}
