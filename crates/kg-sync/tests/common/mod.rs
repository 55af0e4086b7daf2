//! Shared record fixtures for kg-sync integration tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use kg_db::service::GraphService;
use kg_sync::{MemoryRecordSource, RecordLink, SourceRecord};
use serde_json::{Value, json};

pub fn at(step: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + step * 60, 0).unwrap()
}

pub async fn graph() -> GraphService {
    GraphService::new_local(":memory:").await.unwrap()
}

pub fn record(doctype: &str, name: &str, step: i64, properties: Value) -> SourceRecord {
    let mut r = SourceRecord::new(doctype, name, at(step));
    if let Value::Object(map) = properties {
        r.properties = map;
    }
    r
}

pub fn link(role: &str, doctype: &str, name: &str) -> RecordLink {
    RecordLink::new(role, doctype, name)
}

/// A small compliance dataset:
///
/// - Acme (company), Finance (department), users alice and bob
/// - CA-1: owned by alice, performed by bob, mitigates RR-1 and RR-2
/// - CA-2: owned by alice, mitigates RR-1
/// - RR-1: owned by bob; RR-2 links a department that does not exist
/// - EV-1 tests CA-1; TE-1 tests CA-2, executed by bob
/// - CA-3 is inactive
///
/// Deriving it yields 10 entities, 15 relationships, and one skipped link.
pub fn compliance_records() -> MemoryRecordSource {
    let store = MemoryRecordSource::new();
    store.upsert(record("Company", "Acme", 0, json!({})), vec![]);
    store.upsert(
        record("Department", "Finance", 1, json!({"company": "Acme"})),
        vec![],
    );
    store.upsert(record("User", "alice@acme.test", 0, json!({})), vec![]);
    store.upsert(record("User", "bob@acme.test", 0, json!({})), vec![]);

    store.upsert(
        record(
            "Control Activity",
            "CA-1",
            2,
            json!({"company": "Acme", "is_key_control": 1, "control_type": "Preventive"}),
        ),
        vec![
            link("control_owner", "User", "alice@acme.test"),
            link("control_performer", "User", "bob@acme.test"),
            link("risks_addressed", "Risk Register Entry", "RR-1"),
            link("risks_addressed", "Risk Register Entry", "RR-2"),
            link("company", "Company", "Acme"),
            link("department", "Department", "Finance"),
        ],
    );
    store.upsert(
        record("Control Activity", "CA-2", 3, json!({"company": "Acme"})),
        vec![
            link("control_owner", "User", "alice@acme.test"),
            link("risks_addressed", "Risk Register Entry", "RR-1"),
            link("company", "Company", "Acme"),
        ],
    );
    let mut retired = record("Control Activity", "CA-3", 8, json!({}));
    retired.active = false;
    store.upsert(retired, vec![link("control_owner", "User", "alice@acme.test")]);

    store.upsert(
        record(
            "Risk Register Entry",
            "RR-1",
            4,
            json!({"company": "Acme", "likelihood": 4, "impact": 5}),
        ),
        vec![
            link("risk_owner", "User", "bob@acme.test"),
            link("company", "Company", "Acme"),
        ],
    );
    store.upsert(
        record("Risk Register Entry", "RR-2", 5, json!({"company": "Acme"})),
        vec![
            link("company", "Company", "Acme"),
            link("department", "Department", "Treasury"),
        ],
    );

    store.upsert(
        record("Control Evidence", "EV-1", 6, json!({})),
        vec![link("control_activity", "Control Activity", "CA-1")],
    );
    store.upsert(
        record("Test Execution", "TE-1", 7, json!({"status": "Passed"})),
        vec![
            link("control", "Control Activity", "CA-2"),
            link("tester", "User", "bob@acme.test"),
        ],
    );
    store
}
