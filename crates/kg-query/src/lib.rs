//! # kg-query
//!
//! Read-side queries over the knowledge graph:
//! - bounded breadth-first neighbor traversal
//! - visualization subgraphs with a node cap and no dangling edges
//! - cached shortest paths
//! - coverage analysis (risk mitigation, control testing, ownership,
//!   orphans, control dependency chains, weighted compliance score)
//!
//! Everything goes through [`QueryEngine`], which borrows a
//! [`kg_db::service::GraphService`] and carries the configured limits.

pub mod coverage;
pub mod dependencies;
pub mod error;
pub mod path;
pub mod subgraph;
pub mod traversal;

#[cfg(test)]
mod test_support;

use kg_config::QueryConfig;
use kg_core::entities::GraphStatistics;
use kg_db::service::GraphService;

pub use error::QueryError;
pub use subgraph::SubgraphRequest;

/// Query handle over a graph store.
pub struct QueryEngine<'a> {
    svc: &'a GraphService,
    limits: QueryConfig,
}

impl<'a> QueryEngine<'a> {
    #[must_use]
    pub const fn new(svc: &'a GraphService, limits: QueryConfig) -> Self {
        Self { svc, limits }
    }

    /// Engine with default limits.
    #[must_use]
    pub fn with_defaults(svc: &'a GraphService) -> Self {
        Self::new(svc, QueryConfig::default())
    }

    #[must_use]
    pub const fn service(&self) -> &'a GraphService {
        self.svc
    }

    #[must_use]
    pub const fn limits(&self) -> &QueryConfig {
        &self.limits
    }

    /// Entity and relationship counts, recomputed on every call.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Database` if the aggregation fails.
    pub async fn get_statistics(&self) -> Result<GraphStatistics, QueryError> {
        Ok(self.svc.get_statistics().await?)
    }
}
