//! Visualization subgraph extraction.
//!
//! Nodes are chosen first (BFS discovery order from a center, or activation
//! order without one) and truncated at the node cap. Edges are then read only
//! among the chosen nodes, so the payload never carries a dangling edge.

use kg_core::entities::Entity;
use kg_core::enums::{Direction, EntityType};
use kg_core::visual::{VisEdge, VisNode, VisualizationGraph};
use kg_db::repos::EntityFilter;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::QueryEngine;
use crate::error::QueryError;
use crate::traversal::breadth_first;

/// Parameters for [`QueryEngine::get_visualization_subgraph`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubgraphRequest {
    /// Only emit entities of this type. With a center, the center itself is
    /// always emitted and traversal still passes through other types.
    pub entity_type: Option<EntityType>,
    pub center_entity: Option<String>,
    /// Hops from the center; defaults to `query.default_depth`.
    pub depth: Option<u32>,
    /// Node cap; defaults to `query.default_max_nodes`.
    pub max_nodes: Option<usize>,
}

impl QueryEngine<'_> {
    /// Bounded node/edge payload for the visualization client.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown center key, or a storage error.
    pub async fn get_visualization_subgraph(
        &self,
        request: &SubgraphRequest,
    ) -> Result<VisualizationGraph, QueryError> {
        let max_nodes = self.limits().clamp_nodes(request.max_nodes);
        if max_nodes == 0 {
            return Ok(VisualizationGraph::default());
        }

        let entities = match request.center_entity.as_deref() {
            Some(center) => self.centered_nodes(center, request, max_nodes).await?,
            None => {
                self.service()
                    .list_entities(&EntityFilter {
                        entity_type: request.entity_type,
                        include_inactive: false,
                        limit: Some(u32::try_from(max_nodes).unwrap_or(u32::MAX)),
                    })
                    .await?
            }
        };

        let keys: Vec<String> = entities.iter().map(|e| e.entity_key.clone()).collect();
        let edges = self
            .service()
            .relationships_among(&keys)
            .await?
            .into_iter()
            .map(|r| VisEdge::new(r.source_key, r.target_key, r.relationship_type, r.weight))
            .collect();
        let nodes = entities.iter().map(VisNode::from).collect();

        let graph = VisualizationGraph::new(nodes, edges);
        debug!(
            center = request.center_entity.as_deref().unwrap_or("-"),
            nodes = graph.node_count,
            edges = graph.edge_count,
            "extracted subgraph"
        );
        Ok(graph)
    }

    /// Same payload as [`QueryEngine::get_visualization_subgraph`], taking the
    /// parameters individually.
    ///
    /// # Errors
    ///
    /// Same as [`QueryEngine::get_visualization_subgraph`].
    pub async fn get_visualization_data(
        &self,
        entity_type: Option<EntityType>,
        center_entity: Option<&str>,
        depth: Option<u32>,
        max_nodes: Option<usize>,
    ) -> Result<VisualizationGraph, QueryError> {
        self.get_visualization_subgraph(&SubgraphRequest {
            entity_type,
            center_entity: center_entity.map(str::to_string),
            depth,
            max_nodes,
        })
        .await
    }

    async fn centered_nodes(
        &self,
        center: &str,
        request: &SubgraphRequest,
        max_nodes: usize,
    ) -> Result<Vec<Entity>, QueryError> {
        let center_entity = self.service().get_entity(center).await?;
        if !center_entity.is_active {
            return Ok(Vec::new());
        }
        let depth = self.limits().clamp_depth(request.depth);
        let wanted = request.entity_type;

        let discovered = breadth_first(
            self.service(),
            center,
            Direction::Both,
            depth,
            None,
            Some(max_nodes - 1),
            |e| wanted.is_none_or(|t| e.entity_type == t),
        )
        .await?;

        let mut nodes = Vec::with_capacity(discovered.len() + 1);
        nodes.push(center_entity);
        nodes.extend(discovered.into_iter().map(|n| n.entity));
        Ok(nodes)
    }
}
