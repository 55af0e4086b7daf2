//! Aggregate graph statistics. Computed per call; never cached.

use std::collections::BTreeMap;

use kg_core::entities::GraphStatistics;

use crate::error::DatabaseError;
use crate::helpers::get_count;
use crate::service::GraphService;

impl GraphService {
    /// Count active entities and relationships, overall and per type.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if either aggregation fails.
    pub async fn get_statistics(&self) -> Result<GraphStatistics, DatabaseError> {
        let entities_by_type = self
            .count_grouped(
                "SELECT entity_type, COUNT(*) FROM graph_entities
                 WHERE is_active = 1 GROUP BY entity_type",
            )
            .await?;
        let relationships_by_type = self
            .count_grouped(
                "SELECT relationship_type, COUNT(*) FROM graph_relationships
                 GROUP BY relationship_type",
            )
            .await?;

        Ok(GraphStatistics {
            total_entities: entities_by_type.values().sum(),
            total_relationships: relationships_by_type.values().sum(),
            total_cached_paths: u64::try_from(self.path_cache().len()).unwrap_or(u64::MAX),
            entities_by_type,
            relationships_by_type,
        })
    }

    async fn count_grouped(&self, sql: &str) -> Result<BTreeMap<String, u64>, DatabaseError> {
        let mut rows = self.db().query_with(sql, || ()).await?;
        let mut counts = BTreeMap::new();
        while let Some(row) = rows.next().await? {
            counts.insert(row.get::<String>(0)?, get_count(&row, 1)?);
        }
        Ok(counts)
    }
}
