//! The business-record store the graph is derived from.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kg_core::entities::SourceRef;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SyncError;

/// One business record as the host application stores it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceRecord {
    pub doctype: String,
    pub name: String,
    /// Display title; the record name is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// Cancelled or disabled records are not derived.
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

const fn default_active() -> bool {
    true
}

impl SourceRecord {
    #[must_use]
    pub fn new(doctype: impl Into<String>, name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            doctype: doctype.into(),
            name: name.into(),
            label: None,
            created_at,
            modified_at: created_at,
            active: true,
            properties: Map::new(),
        }
    }

    #[must_use]
    pub fn source_ref(&self) -> SourceRef {
        SourceRef::new(self.doctype.clone(), self.name.clone())
    }

    #[must_use]
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

/// A link field value: the field role and the record it points at.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordLink {
    pub role: String,
    pub target: SourceRef,
}

impl RecordLink {
    #[must_use]
    pub fn new(role: impl Into<String>, doctype: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            target: SourceRef::new(doctype, name),
        }
    }
}

/// Read access to the business-record store.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Records of one doctype, optionally only those modified at or after `since`.
    async fn list_records(
        &self,
        doctype: &str,
        since: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<SourceRecord>>;

    /// A single record, or `None` if it does not exist.
    async fn get_record(&self, source: &SourceRef) -> anyhow::Result<Option<SourceRecord>>;

    /// The link fields set on a record, in field order.
    async fn get_record_links(&self, record: &SourceRecord) -> anyhow::Result<Vec<RecordLink>>;
}

/// One line of a JSONL record export.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecordLine {
    #[serde(flatten)]
    record: SourceRecord,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    links: Vec<RecordLink>,
}

#[derive(Debug, Default)]
struct Records {
    records: BTreeMap<SourceRef, SourceRecord>,
    links: HashMap<SourceRef, Vec<RecordLink>>,
}

/// In-process record store, loadable from a JSONL export.
///
/// Interior mutability lets a host keep saving records while an engine borrows the store.
#[derive(Debug, Default)]
pub struct MemoryRecordSource {
    inner: RwLock<Records>,
}

impl MemoryRecordSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load records from a JSONL file, one record per line with an optional `links` array.
    ///
    /// # Errors
    ///
    /// `SyncError::Records` if the file cannot be read or a line does not parse.
    pub fn from_jsonl(path: &Path) -> Result<Self, SyncError> {
        let lines: Vec<RecordLine> = serde_jsonlines::json_lines(path)
            .and_then(|lines| lines.collect::<std::io::Result<Vec<RecordLine>>>())
            .map_err(|source| SyncError::Records {
                path: path.to_path_buf(),
                source,
            })?;
        let store = Self::new();
        for line in lines {
            store.upsert(line.record, line.links);
        }
        Ok(store)
    }

    /// Write every record to a JSONL file in `(doctype, name)` order.
    ///
    /// # Errors
    ///
    /// `SyncError::Records` if the file cannot be written.
    pub fn write_jsonl(&self, path: &Path) -> Result<(), SyncError> {
        let inner = self.read();
        let lines: Vec<RecordLine> = inner
            .records
            .iter()
            .map(|(source, record)| RecordLine {
                record: record.clone(),
                links: inner.links.get(source).cloned().unwrap_or_default(),
            })
            .collect();
        serde_jsonlines::write_json_lines(path, &lines).map_err(|source| SyncError::Records {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Insert or replace a record and its links.
    pub fn upsert(&self, record: SourceRecord, links: Vec<RecordLink>) {
        let source = record.source_ref();
        let mut inner = self.write();
        inner.links.insert(source.clone(), links);
        inner.records.insert(source, record);
    }

    pub fn remove(&self, source: &SourceRef) -> Option<SourceRecord> {
        let mut inner = self.write();
        inner.links.remove(source);
        inner.records.remove(source)
    }

    #[must_use]
    pub fn get(&self, source: &SourceRef) -> Option<SourceRecord> {
        self.read().records.get(source).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().records.is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Records> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Records> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RecordSource for MemoryRecordSource {
    async fn list_records(
        &self,
        doctype: &str,
        since: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<SourceRecord>> {
        let mut records: Vec<SourceRecord> = self
            .read()
            .records
            .values()
            .filter(|r| r.doctype == doctype)
            .filter(|r| since.is_none_or(|t| r.modified_at >= t))
            .cloned()
            .collect();
        records.sort_by(|a, b| (a.created_at, &a.name).cmp(&(b.created_at, &b.name)));
        Ok(records)
    }

    async fn get_record(&self, source: &SourceRef) -> anyhow::Result<Option<SourceRecord>> {
        Ok(self.get(source))
    }

    async fn get_record_links(&self, record: &SourceRecord) -> anyhow::Result<Vec<RecordLink>> {
        Ok(self
            .read()
            .links
            .get(&record.source_ref())
            .cloned()
            .unwrap_or_default())
    }
}
