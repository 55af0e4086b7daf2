//! # kg-db
//!
//! libSQL storage for the compliance knowledge graph.
//!
//! Owns the entity registry (deterministic keys, get-or-create with a
//! storage-level uniqueness guarantee), the relationship store (typed,
//! directed, deduplicated edges between active entities), the in-process
//! path cache, and aggregate statistics. All operations hang off
//! [`service::GraphService`], which is passed explicitly to every consumer.

pub mod cache;
pub mod error;
pub mod helpers;
mod migrations;
pub mod repos;
pub mod retry;
pub mod service;

#[cfg(test)]
mod test_support;

use std::time::Duration;

use error::DatabaseError;
use kg_config::StoreConfig;
use libsql::Builder;
use libsql::params::IntoParams;
use retry::{RetryConfig, is_busy_error};

/// Default busy timeout for [`GraphDb::open_local`].
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Central database handle for graph storage.
///
/// Wraps a libSQL database and a single connection. Each `GraphDb` is an
/// independent writer; several may point at the same file.
pub struct GraphDb {
    #[allow(dead_code)]
    db: libsql::Database,
    conn: libsql::Connection,
    retry: RetryConfig,
}

impl GraphDb {
    /// Open a local database at the given path with default timeouts.
    ///
    /// Runs migrations automatically on first open.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, DatabaseError> {
        Self::open_with(path, DEFAULT_BUSY_TIMEOUT, RetryConfig::default()).await
    }

    /// Open the database described by a `[store]` config section.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open(store: &StoreConfig) -> Result<Self, DatabaseError> {
        Self::open_with(&store.path, store.busy_timeout(), RetryConfig::from(store)).await
    }

    /// Open with an explicit busy timeout and retry policy.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_with(
        path: &str,
        busy_timeout: Duration,
        retry: RetryConfig,
    ) -> Result<Self, DatabaseError> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;

        // Per-connection in SQLite
        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| DatabaseError::Migration(format!("PRAGMA foreign_keys: {e}")))?;
        Self::pragma(
            &conn,
            &format!("PRAGMA busy_timeout = {}", busy_timeout.as_millis()),
        )
        .await?;
        if path != ":memory:" {
            Self::pragma(&conn, "PRAGMA journal_mode = WAL").await?;
        }

        let graph_db = Self { db, conn, retry };
        graph_db.run_migrations().await?;
        Ok(graph_db)
    }

    /// Run a PRAGMA that reports its new value as a row, discarding the row.
    async fn pragma(conn: &libsql::Connection, sql: &str) -> Result<(), DatabaseError> {
        let mut rows = conn
            .query(sql, ())
            .await
            .map_err(|e| DatabaseError::Migration(format!("{sql}: {e}")))?;
        while rows.next().await?.is_some() {}
        Ok(())
    }

    /// Access the underlying libSQL connection for direct queries.
    #[must_use]
    pub const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }

    #[must_use]
    pub const fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// Execute a statement, retrying with backoff while the database is locked.
    ///
    /// `params` is called once per attempt because libSQL consumes them.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::LibSql` for non-busy failures, or the last
    /// busy error once `max_attempts` is reached.
    pub async fn execute_with<F, P>(&self, sql: &str, params: F) -> Result<u64, DatabaseError>
    where
        F: Fn() -> P,
        P: IntoParams,
    {
        let mut attempt = 1;
        loop {
            match self.conn.execute(sql, params()).await {
                Ok(n) => return Ok(n),
                Err(e) if is_busy_error(&e) && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(attempt, ?delay, "database busy, retrying write");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Run a query, retrying with backoff while the database is locked.
    ///
    /// # Errors
    ///
    /// Same as [`GraphDb::execute_with`].
    pub async fn query_with<F, P>(&self, sql: &str, params: F) -> Result<libsql::Rows, DatabaseError>
    where
        F: Fn() -> P,
        P: IntoParams,
    {
        let mut attempt = 1;
        loop {
            match self.conn.query(sql, params()).await {
                Ok(rows) => return Ok(rows),
                Err(e) if is_busy_error(&e) && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(attempt, ?delay, "database busy, retrying read");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
