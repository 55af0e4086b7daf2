//! Service layer: the explicit graph store handle.
//!
//! `GraphService` wraps `GraphDb` (persistence) and `PathCache` (memoized
//! paths). All repo methods are implemented as `impl GraphService` blocks in
//! `repos/`. A service is safe to share between tasks; separate services may
//! point at the same database file.

use kg_config::StoreConfig;

use crate::GraphDb;
use crate::cache::PathCache;
use crate::error::DatabaseError;

pub struct GraphService {
    db: GraphDb,
    cache: PathCache,
}

impl GraphService {
    /// Open a service over a local database file, or `":memory:"` for tests.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn new_local(db_path: &str) -> Result<Self, DatabaseError> {
        Ok(Self::from_db(GraphDb::open_local(db_path).await?))
    }

    /// Open a service from the `[store]` config section.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn open(store: &StoreConfig) -> Result<Self, DatabaseError> {
        Ok(Self::from_db(GraphDb::open(store).await?))
    }

    #[must_use]
    pub fn from_db(db: GraphDb) -> Self {
        Self {
            db,
            cache: PathCache::new(),
        }
    }

    #[must_use]
    pub const fn db(&self) -> &GraphDb {
        &self.db
    }

    #[must_use]
    pub const fn path_cache(&self) -> &PathCache {
        &self.cache
    }
}
