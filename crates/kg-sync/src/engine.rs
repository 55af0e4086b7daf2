//! Derivation of graph entities and relationships from business records.
//!
//! A record becomes one entity; each of its mapped link fields becomes one
//! relationship to the entity of the linked record. Entity creation always
//! happens before any link for the same record.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use chrono::{DateTime, Utc};
use kg_core::entities::SourceRef;
use kg_core::enums::{Direction, EdgeDirection, EntityType, RelationshipType};
use kg_core::keys::entity_type_of_key;
use kg_core::responses::{RebuildResponse, SkippedRecord, SyncReport};
use kg_db::service::GraphService;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::error::SyncError;
use crate::mapping::{
    FieldMapping, REBUILD_ORDER, entity_type_for, field_mapping, mappings_for, property_fields,
};
use crate::source::{RecordLink, RecordSource, SourceRecord};

type EdgeId = (String, String, RelationshipType);

/// What deriving one record produced.
#[derive(Debug, Default)]
struct Derivation {
    entity_key: String,
    entities_created: u64,
    relationships_created: u64,
    /// Edges the record currently implies.
    implied: HashSet<EdgeId>,
    /// Roles whose link failed for a reason other than a missing target;
    /// their existing edges are left alone.
    unsettled: HashSet<&'static str>,
    skipped: Vec<SkippedRecord>,
}

enum LinkFailure {
    /// Definitive: the record no longer implies this edge.
    Unresolved(String),
    /// Transient or unexpected: the edge may still be implied.
    Failed(String),
}

/// Keeps a graph store in step with a record source.
pub struct SyncEngine<'a, S: RecordSource + ?Sized> {
    svc: &'a GraphService,
    source: &'a S,
}

impl<'a, S: RecordSource + ?Sized> SyncEngine<'a, S> {
    #[must_use]
    pub const fn new(svc: &'a GraphService, source: &'a S) -> Self {
        Self { svc, source }
    }

    /// Clear the graph and derive it again from every active record.
    ///
    /// Doctypes are walked in [`REBUILD_ORDER`], records within a doctype by
    /// `(created_at, name)`, so identical source data yields an identical graph.
    /// A record that fails to derive is skipped and reported, as is a doctype
    /// whose records cannot be listed. Cancellation is checked between records
    /// and leaves the records derived so far in place.
    ///
    /// # Errors
    ///
    /// Storage failures while clearing the graph.
    pub async fn rebuild(&self, cancel: &CancelToken) -> Result<RebuildResponse, SyncError> {
        let start = Instant::now();
        let cleared = self.svc.clear_graph().await?;
        info!(cleared, "rebuild started");

        let mut response = RebuildResponse::default();
        let mut resolved: HashMap<SourceRef, String> = HashMap::new();

        'doctypes: for doctype in REBUILD_ORDER {
            let Some(entity_type) = entity_type_for(doctype) else {
                continue;
            };
            let mut records = match self.source.list_records(doctype, None).await {
                Ok(records) => records,
                Err(e) => {
                    let reason = SyncError::Source(e).to_string();
                    warn!(doctype, %reason, "skipping doctype");
                    response.skipped.push(SkippedRecord {
                        source: SourceRef::new(doctype, ""),
                        field: None,
                        reason,
                    });
                    continue;
                }
            };
            records.sort_by(|a, b| (a.created_at, &a.name).cmp(&(b.created_at, &b.name)));
            debug!(doctype, records = records.len(), "deriving doctype");

            for record in &records {
                if cancel.is_cancelled() {
                    response.cancelled = true;
                    break 'doctypes;
                }
                if !record.active {
                    debug!(source = %record.source_ref(), "inactive record, not derived");
                    continue;
                }
                response.records_processed += 1;

                match self.derive(record, entity_type, &mut resolved).await {
                    Ok(derived) => {
                        response.entities_created += derived.entities_created;
                        response.relationships_created += derived.relationships_created;
                        response.skipped.extend(derived.skipped);
                    }
                    Err(e) => {
                        warn!(source = %record.source_ref(), error = %e, "skipping record");
                        response.skipped.push(SkippedRecord {
                            source: record.source_ref(),
                            field: None,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        response.duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            entities = response.entities_created,
            relationships = response.relationships_created,
            records = response.records_processed,
            skipped = response.skipped.len(),
            cancelled = response.cancelled,
            duration_ms = response.duration_ms,
            "rebuild finished"
        );
        Ok(response)
    }

    /// Incremental sync after a record was created, updated, or relinked.
    ///
    /// Derives the record's entity and links, then removes the relationships
    /// the record owned but no longer implies. An inactive record deactivates
    /// its entity. Records of unmapped doctypes are ignored.
    ///
    /// # Errors
    ///
    /// Storage or record-source failures on the record itself. Failures on
    /// individual links are reported in `skipped`.
    pub async fn on_record_saved(&self, record: &SourceRecord) -> Result<SyncReport, SyncError> {
        let Some(entity_type) = entity_type_for(&record.doctype) else {
            debug!(doctype = %record.doctype, "unmapped doctype, nothing to sync");
            return Ok(SyncReport::default());
        };
        if !record.active {
            return self.deactivate(entity_type, &record.source_ref()).await;
        }

        let derived = self.derive(record, entity_type, &mut HashMap::new()).await?;
        let removed = self.prune(record, &derived).await?;
        debug!(
            entity_key = %derived.entity_key,
            created = derived.relationships_created,
            removed,
            "record synced"
        );
        Ok(SyncReport {
            entity_key: Some(derived.entity_key),
            entities_created: derived.entities_created,
            relationships_created: derived.relationships_created,
            relationships_removed: removed,
            deactivated: false,
            skipped: derived.skipped,
        })
    }

    /// Incremental sync after a record was deleted. A no-op when the record
    /// has no active entity.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub async fn on_record_deleted(&self, source: &SourceRef) -> Result<SyncReport, SyncError> {
        match entity_type_for(&source.doctype) {
            Some(entity_type) => self.deactivate(entity_type, source).await,
            None => Ok(SyncReport::default()),
        }
    }

    /// Incrementally sync every record modified at or after `since`, in rebuild order.
    ///
    /// # Errors
    ///
    /// Same as [`SyncEngine::on_record_saved`]; stops at the first failing record.
    pub async fn sync_modified_since(
        &self,
        since: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> Result<Vec<SyncReport>, SyncError> {
        let mut reports = Vec::new();
        for doctype in REBUILD_ORDER {
            let mut records = self
                .source
                .list_records(doctype, Some(since))
                .await
                .map_err(SyncError::Source)?;
            records.sort_by(|a, b| (a.created_at, &a.name).cmp(&(b.created_at, &b.name)));
            for record in &records {
                if cancel.is_cancelled() {
                    return Ok(reports);
                }
                reports.push(self.on_record_saved(record).await?);
            }
        }
        Ok(reports)
    }

    async fn deactivate(
        &self,
        entity_type: EntityType,
        source: &SourceRef,
    ) -> Result<SyncReport, SyncError> {
        let Some(done) = self.svc.deactivate_source(entity_type, source).await? else {
            debug!(%source, "no active entity to deactivate");
            return Ok(SyncReport::default());
        };
        Ok(SyncReport {
            entity_key: Some(done.entity_key),
            relationships_removed: done.relationships_removed,
            deactivated: done.changed,
            ..SyncReport::default()
        })
    }

    /// Entity first, then one link per mapped link field.
    async fn derive(
        &self,
        record: &SourceRecord,
        entity_type: EntityType,
        resolved: &mut HashMap<SourceRef, String>,
    ) -> Result<Derivation, SyncError> {
        let source = record.source_ref();
        let (entity, created) = self
            .svc
            .ensure_entity(entity_type, &source, record.label())
            .await?;
        self.svc
            .update_entity_properties(&entity.entity_key, &extract_properties(record))
            .await?;
        resolved.insert(source.clone(), entity.entity_key.clone());

        let mut derived = Derivation {
            entities_created: u64::from(created),
            entity_key: entity.entity_key,
            ..Derivation::default()
        };

        let links = self
            .source
            .get_record_links(record)
            .await
            .map_err(SyncError::Source)?;
        for link in &links {
            let Some(mapping) = field_mapping(&record.doctype, &link.role) else {
                derived.skip(&source, &link.role, format!("no mapping for field '{}'", link.role));
                continue;
            };
            match self.link_one(&derived.entity_key, mapping, link, resolved).await {
                Ok((edge, entity_created, edge_created)) => {
                    derived.entities_created += u64::from(entity_created);
                    derived.relationships_created += u64::from(edge_created);
                    derived.implied.insert(edge);
                }
                Err(LinkFailure::Unresolved(reason)) => {
                    derived.skip(&source, mapping.role, reason);
                }
                Err(LinkFailure::Failed(reason)) => {
                    derived.unsettled.insert(mapping.role);
                    derived.skip(&source, mapping.role, reason);
                }
            }
        }
        Ok(derived)
    }

    /// Resolve a link target and create the edge. Returns the edge and
    /// whether the target entity and the edge were newly created.
    async fn link_one(
        &self,
        entity_key: &str,
        mapping: &FieldMapping,
        link: &RecordLink,
        resolved: &mut HashMap<SourceRef, String>,
    ) -> Result<(EdgeId, bool, bool), LinkFailure> {
        if link.target.doctype != mapping.target_doctype {
            return Err(LinkFailure::Unresolved(format!(
                "field '{}' must link a {}, got {}",
                mapping.role, mapping.target_doctype, link.target.doctype
            )));
        }

        let (target_key, target_created) = match resolved.get(&link.target) {
            Some(key) => (key.clone(), false),
            None => {
                let record = self
                    .source
                    .get_record(&link.target)
                    .await
                    .map_err(|e| LinkFailure::Failed(format!("{e:#}")))?;
                let Some(record) = record.filter(|r| r.active) else {
                    return Err(LinkFailure::Unresolved(format!(
                        "linked record {} not found or inactive",
                        link.target
                    )));
                };
                let (target, created) = self
                    .svc
                    .ensure_entity(mapping.target_entity_type(), &link.target, record.label())
                    .await
                    .map_err(|e| LinkFailure::Failed(e.to_string()))?;
                resolved.insert(link.target.clone(), target.entity_key.clone());
                (target.entity_key, created)
            }
        };

        let (src, tgt) = mapping.orient(entity_key, &target_key);
        let outcome = self
            .svc
            .link(src, tgt, mapping.relationship_type)
            .await
            .map_err(|e| LinkFailure::Failed(e.to_string()))?;
        Ok((
            (src.to_string(), tgt.to_string(), mapping.relationship_type),
            target_created,
            outcome.created,
        ))
    }

    /// Remove owned edges the record no longer implies.
    async fn prune(&self, record: &SourceRecord, derived: &Derivation) -> Result<u64, SyncError> {
        let key = derived.entity_key.as_str();
        let mut removed = 0;
        for edge in self.svc.list_relationships(key, Direction::Both).await? {
            let Some(peer_type) = entity_type_of_key(&edge.neighbor_key) else {
                continue;
            };
            let owner = mappings_for(&record.doctype)
                .find(|m| m.owns_edge(edge.relationship_type, edge.direction, peer_type));
            let Some(owner) = owner else {
                continue;
            };
            if derived.unsettled.contains(owner.role) {
                continue;
            }
            let (src, tgt) = match edge.direction {
                EdgeDirection::Outgoing => (key, edge.neighbor_key.as_str()),
                EdgeDirection::Incoming => (edge.neighbor_key.as_str(), key),
            };
            let id = (src.to_string(), tgt.to_string(), edge.relationship_type);
            if derived.implied.contains(&id) {
                continue;
            }
            if self.svc.unlink(src, tgt, edge.relationship_type).await? {
                debug!(source_key = src, target_key = tgt, relationship = %edge.relationship_type, "pruned stale relationship");
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl Derivation {
    fn skip(&mut self, source: &SourceRef, field: &str, reason: String) {
        warn!(%source, field, %reason, "skipping link");
        self.skipped.push(SkippedRecord {
            source: source.clone(),
            field: Some(field.to_string()),
            reason,
        });
    }
}

/// Copy the mapped fields that hold a value into an entity property object.
#[must_use]
pub fn extract_properties(record: &SourceRecord) -> Value {
    let mut properties = Map::new();
    for field in property_fields(&record.doctype) {
        if let Some(value) = record.properties.get(field) {
            if is_set(value) {
                properties.insert(field.to_string(), value.clone());
            }
        }
    }
    Value::Object(properties)
}

/// Empty strings, zeros, `false`, and nulls count as unset.
fn is_set(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
