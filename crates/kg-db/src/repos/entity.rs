//! Entity registry: identity, get-or-create, deactivation.
//!
//! Uniqueness of active entities is enforced by the schema (primary key on
//! the derived key, plus a partial unique index over the source reference).
//! `ensure_entity` never checks-then-inserts on its own authority: it inserts,
//! and on a uniqueness violation re-reads the row the winning writer created.

use chrono::Utc;
use tracing::{debug, info, warn};

use kg_core::entities::{Entity, SourceRef};
use kg_core::enums::EntityType;
use kg_core::errors::CoreError;
use kg_core::keys::entity_key;
use kg_core::responses::Deactivation;

use crate::error::DatabaseError;
use crate::helpers::{
    get_count, get_opt_string, is_unique_violation, parse_datetime, parse_enum,
    parse_optional_json,
};
use crate::retry::is_busy_error;
use crate::service::GraphService;

pub(crate) const ENTITY_COLUMNS: &str = "entity_key, entity_type, source_doctype, source_name, \
     label, properties, is_active, activation_seq, created_at, last_synced";

pub(crate) fn row_to_entity(row: &libsql::Row) -> Result<Entity, DatabaseError> {
    Ok(Entity {
        entity_key: row.get::<String>(0)?,
        entity_type: parse_enum(&row.get::<String>(1)?)?,
        source: SourceRef {
            doctype: row.get::<String>(2)?,
            name: row.get::<String>(3)?,
        },
        label: row.get::<String>(4)?,
        properties: parse_optional_json(get_opt_string(row, 5)?.as_deref())?,
        is_active: row.get::<i64>(6)? != 0,
        activation_seq: row.get::<i64>(7)?,
        created_at: parse_datetime(&row.get::<String>(8)?)?,
        last_synced: parse_datetime(&row.get::<String>(9)?)?,
    })
}

/// Filter criteria for entity listings.
#[derive(Debug, Clone, Default)]
pub struct EntityFilter {
    pub entity_type: Option<EntityType>,
    /// Include deactivated entities as well.
    pub include_inactive: bool,
    pub limit: Option<u32>,
}

/// Result of one insert attempt.
#[derive(Debug)]
pub(crate) enum InsertOutcome {
    Inserted(Entity),
    /// Another writer holds the key; the caller must re-read.
    Conflict,
}

impl GraphService {
    /// Return the active entity for `(entity_type, source)`, creating it if needed.
    ///
    /// Refreshes the label and `last_synced` on an existing entity. Safe under
    /// concurrent callers in any number of processes.
    ///
    /// # Errors
    ///
    /// `CoreError::Validation` for an empty source reference,
    /// `ConflictRetryExhausted` when every attempt conflicted, or a storage error.
    pub async fn get_or_create(
        &self,
        entity_type: EntityType,
        source: &SourceRef,
        label: &str,
    ) -> Result<Entity, DatabaseError> {
        Ok(self.ensure_entity(entity_type, source, label).await?.0)
    }

    /// Like [`GraphService::get_or_create`], also reporting whether this call
    /// created (or reactivated) the entity.
    ///
    /// # Errors
    ///
    /// Same as [`GraphService::get_or_create`].
    pub async fn ensure_entity(
        &self,
        entity_type: EntityType,
        source: &SourceRef,
        label: &str,
    ) -> Result<(Entity, bool), DatabaseError> {
        if source.doctype.is_empty() || source.name.is_empty() {
            return Err(CoreError::Validation(format!(
                "source reference '{source}' must name a doctype and a record"
            ))
            .into());
        }
        let key = entity_key(entity_type, source);
        let max_attempts = self.db().retry().max_attempts;

        for attempt in 1..=max_attempts {
            match self.try_ensure(&key, entity_type, source, label).await {
                Ok(Some(found)) => return Ok(found),
                Ok(None) => {
                    debug!(entity_key = %key, attempt, "lost create race, re-reading");
                }
                Err(DatabaseError::LibSql(e)) if is_busy_error(&e) => {
                    let delay = self.db().retry().delay_for(attempt);
                    warn!(entity_key = %key, attempt, ?delay, "database busy during get_or_create");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(DatabaseError::ConflictRetryExhausted {
            entity_key: key,
            attempts: max_attempts,
        })
    }

    /// One read / reactivate / insert cycle. `Ok(None)` means a concurrent writer won.
    async fn try_ensure(
        &self,
        key: &str,
        entity_type: EntityType,
        source: &SourceRef,
        label: &str,
    ) -> Result<Option<(Entity, bool)>, DatabaseError> {
        let now = Utc::now().to_rfc3339();

        if let Some(existing) = self.find_entity(entity_type, source).await? {
            self.db()
                .conn()
                .execute(
                    "UPDATE graph_entities SET label = ?2, last_synced = ?3 WHERE entity_key = ?1",
                    libsql::params![existing.entity_key.as_str(), label, now.as_str()],
                )
                .await?;
            let entity = Entity {
                label: label.to_string(),
                last_synced: parse_datetime(&now)?,
                ..existing
            };
            return Ok(Some((entity, false)));
        }

        let reactivated = self
            .db()
            .conn()
            .execute(
                "UPDATE graph_entities
                 SET is_active = 1, label = ?2, last_synced = ?3,
                     activation_seq = (SELECT COALESCE(MAX(activation_seq), 0) + 1 FROM graph_entities)
                 WHERE entity_key = ?1 AND is_active = 0",
                libsql::params![key, label, now.as_str()],
            )
            .await;
        match reactivated {
            Ok(n) if n > 0 => {
                debug!(entity_key = %key, "reactivated entity");
                return Ok(Some((self.get_entity(key).await?, true)));
            }
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        match self
            .insert_entity(key, entity_type, source, label, &now)
            .await?
        {
            InsertOutcome::Inserted(entity) => Ok(Some((entity, true))),
            InsertOutcome::Conflict => Ok(None),
        }
    }

    /// Insert a fresh entity row, mapping a uniqueness violation to `Conflict`.
    pub(crate) async fn insert_entity(
        &self,
        key: &str,
        entity_type: EntityType,
        source: &SourceRef,
        label: &str,
        now: &str,
    ) -> Result<InsertOutcome, DatabaseError> {
        let inserted = self
            .db()
            .conn()
            .execute(
                "INSERT INTO graph_entities
                    (entity_key, entity_type, source_doctype, source_name, label,
                     is_active, activation_seq, created_at, last_synced)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1,
                     (SELECT COALESCE(MAX(activation_seq), 0) + 1 FROM graph_entities), ?6, ?6)",
                libsql::params![
                    key,
                    entity_type.as_str(),
                    source.doctype.as_str(),
                    source.name.as_str(),
                    label,
                    now
                ],
            )
            .await;
        match inserted {
            Ok(_) => {
                debug!(entity_key = %key, %entity_type, "created entity");
                Ok(InsertOutcome::Inserted(self.get_entity(key).await?))
            }
            Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::Conflict),
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch an entity by key, active or not.
    ///
    /// # Errors
    ///
    /// `NotFound` if no entity ever had this key.
    pub async fn get_entity(&self, key: &str) -> Result<Entity, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                &format!("SELECT {ENTITY_COLUMNS} FROM graph_entities WHERE entity_key = ?1"),
                || [key],
            )
            .await?;
        let row = rows.next().await?.ok_or_else(|| DatabaseError::NotFound {
            entity_key: key.to_string(),
        })?;
        row_to_entity(&row)
    }

    /// The active entity for a source reference, if any.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn find_entity(
        &self,
        entity_type: EntityType,
        source: &SourceRef,
    ) -> Result<Option<Entity>, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                &format!(
                    "SELECT {ENTITY_COLUMNS} FROM graph_entities
                     WHERE entity_type = ?1 AND source_doctype = ?2 AND source_name = ?3
                       AND is_active = 1"
                ),
                || {
                    libsql::params![
                        entity_type.as_str(),
                        source.doctype.as_str(),
                        source.name.as_str()
                    ]
                },
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_entity(&row)?)),
            None => Ok(None),
        }
    }

    /// List entities in activation order.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_entities(&self, filter: &EntityFilter) -> Result<Vec<Entity>, DatabaseError> {
        let mut conditions = Vec::new();
        let mut params: Vec<libsql::Value> = Vec::new();

        if !filter.include_inactive {
            conditions.push("is_active = 1".to_string());
        }
        if let Some(t) = filter.entity_type {
            params.push(libsql::Value::Text(t.as_str().to_string()));
            conditions.push(format!("entity_type = ?{}", params.len()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let limit_clause = filter
            .limit
            .map(|n| format!(" LIMIT {n}"))
            .unwrap_or_default();

        let sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM graph_entities {where_clause}
             ORDER BY activation_seq ASC{limit_clause}"
        );
        let mut rows = self.db().query_with(&sql, || params.clone()).await?;

        let mut entities = Vec::new();
        while let Some(row) = rows.next().await? {
            entities.push(row_to_entity(&row)?);
        }
        Ok(entities)
    }

    /// Replace an entity's free-form metadata.
    ///
    /// # Errors
    ///
    /// `NotFound` if the key does not exist.
    pub async fn update_entity_properties(
        &self,
        key: &str,
        properties: &serde_json::Value,
    ) -> Result<(), DatabaseError> {
        let json = serde_json::to_string(properties).map_err(|e| DatabaseError::Other(e.into()))?;
        let changed = self
            .db()
            .execute_with(
                "UPDATE graph_entities SET properties = ?2 WHERE entity_key = ?1",
                || libsql::params![key, json.as_str()],
            )
            .await?;
        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity_key: key.to_string(),
            });
        }
        Ok(())
    }

    /// Deactivate an entity, removing every relationship that touches it first.
    ///
    /// Idempotent for an already-inactive entity (`changed == false`).
    ///
    /// # Errors
    ///
    /// `NotFound` if the key does not exist.
    pub async fn deactivate(&self, key: &str) -> Result<Deactivation, DatabaseError> {
        let entity = self.get_entity(key).await?;
        if !entity.is_active {
            return Ok(Deactivation {
                entity_key: key.to_string(),
                relationships_removed: 0,
                changed: false,
            });
        }

        let touching = self.relationship_counts(key).await?.total;
        // trg_graph_entities_deactivate deletes the relationships within this statement
        let changed = self
            .db()
            .execute_with(
                "UPDATE graph_entities SET is_active = 0, last_synced = ?2
                 WHERE entity_key = ?1 AND is_active = 1",
                || libsql::params![key, Utc::now().to_rfc3339()],
            )
            .await?
            > 0;

        let invalidated = self.path_cache().invalidate_entity(key);
        info!(entity_key = %key, relationships_removed = touching, invalidated, changed, "deactivated entity");

        Ok(Deactivation {
            entity_key: key.to_string(),
            relationships_removed: if changed { touching } else { 0 },
            changed,
        })
    }

    /// Deactivate the active entity for a source reference, if there is one.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the lookup or update fails.
    pub async fn deactivate_source(
        &self,
        entity_type: EntityType,
        source: &SourceRef,
    ) -> Result<Option<Deactivation>, DatabaseError> {
        match self.find_entity(entity_type, source).await? {
            Some(entity) => Ok(Some(self.deactivate(&entity.entity_key).await?)),
            None => Ok(None),
        }
    }

    /// Remove every relationship and deactivate every entity. First step of a rebuild.
    ///
    /// Returns the number of entities deactivated.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if either statement fails.
    pub async fn clear_graph(&self) -> Result<u64, DatabaseError> {
        self.db()
            .execute_with("DELETE FROM graph_relationships", || ())
            .await?;
        let deactivated = self
            .db()
            .execute_with(
                "UPDATE graph_entities SET is_active = 0 WHERE is_active = 1",
                || (),
            )
            .await?;
        let flushed = self.path_cache().clear();
        info!(deactivated, flushed, "cleared graph");
        Ok(deactivated)
    }

    /// Active entities with no relationships at all, in activation order.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_orphaned_entities(&self) -> Result<Vec<Entity>, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                &format!(
                    "SELECT {ENTITY_COLUMNS} FROM graph_entities e
                     WHERE e.is_active = 1
                       AND NOT EXISTS (SELECT 1 FROM graph_relationships r
                                       WHERE r.source_key = e.entity_key
                                          OR r.target_key = e.entity_key)
                     ORDER BY e.activation_seq ASC"
                ),
                || (),
            )
            .await?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next().await? {
            entities.push(row_to_entity(&row)?);
        }
        Ok(entities)
    }

    /// Number of active entities.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn count_active_entities(&self) -> Result<u64, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                "SELECT COUNT(*) FROM graph_entities WHERE is_active = 1",
                || (),
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        get_count(&row, 0)
    }
}
