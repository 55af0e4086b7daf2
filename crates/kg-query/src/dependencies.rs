//! Control dependency analytics over `depends_on` and `preceded_by` edges.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use kg_core::enums::RelationshipType;
use kg_db::service::GraphService;
use rustworkx_core::petgraph::algo::{condensation, toposort};
use rustworkx_core::petgraph::graph::{DiGraph, NodeIndex};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::QueryEngine;
use crate::error::QueryError;

const CRITICAL_LIMIT: usize = 10;

/// A control other controls depend on.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct CriticalControl {
    pub entity_key: String,
    pub dependent_count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct DependencyReport {
    pub total_dependencies: usize,
    /// Distinct controls with at least one outgoing dependency.
    pub controls_with_dependencies: usize,
    /// Most depended-on controls, at most ten, busiest first.
    pub critical_controls: Vec<CriticalControl>,
    /// Edges on the longest dependency chain. A chain entering a cycle walks
    /// it once, so `A <-> B` alone has length 2.
    pub max_chain_length: usize,
    pub has_cycles: bool,
}

/// Directed graph of control dependencies, keyed by entity key.
pub struct DependencyGraph {
    graph: DiGraph<String, RelationshipType>,
    index: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Build from the active dependency edges, in creation order.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Database` if reading relationships fails.
    pub async fn from_service(svc: &GraphService) -> Result<Self, QueryError> {
        let mut edges = svc
            .list_relationships_by_type(RelationshipType::DependsOn)
            .await?;
        edges.extend(
            svc.list_relationships_by_type(RelationshipType::PrecededBy)
                .await?,
        );
        edges.sort_by_key(|r| r.seq);

        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        for rel in edges {
            let src = *index
                .entry(rel.source_key.clone())
                .or_insert_with(|| graph.add_node(rel.source_key.clone()));
            let dst = *index
                .entry(rel.target_key.clone())
                .or_insert_with(|| graph.add_node(rel.target_key.clone()));
            graph.add_edge(src, dst, rel.relationship_type);
        }
        Ok(Self { graph, index })
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Whether the dependency graph contains a cycle.
    #[must_use]
    pub fn has_cycles(&self) -> bool {
        toposort(&self.graph, None).is_err()
    }

    /// Number of direct dependents of `entity_key`.
    #[must_use]
    pub fn dependent_count(&self, entity_key: &str) -> usize {
        self.index.get(entity_key).map_or(0, |idx| {
            self.graph
                .neighbors_directed(*idx, rustworkx_core::petgraph::Direction::Incoming)
                .count()
        })
    }

    /// Longest chain in edges, computed over strongly connected components.
    ///
    /// A component of `n > 1` controls contributes `n - 1` edges to visit
    /// every member, then one more either to close the cycle or to leave it.
    /// This is exact for simple cycles and an upper bound for denser ones.
    #[must_use]
    pub fn max_chain_length(&self) -> usize {
        let dag = condensation(self.graph.clone(), true);
        let Ok(order) = toposort(&dag, None) else {
            return 0;
        };
        let mut longest = vec![0usize; dag.node_count()];
        for idx in order.into_iter().rev() {
            let members = dag[idx].len();
            let closing = usize::from(members > 1);
            let onward = dag
                .neighbors(idx)
                .map(|next| longest[next.index()] + 1)
                .max()
                .unwrap_or(0);
            longest[idx.index()] = members.saturating_sub(1) + onward.max(closing);
        }
        longest.into_iter().max().unwrap_or(0)
    }

    #[must_use]
    pub fn report(&self) -> DependencyReport {
        let sources: BTreeSet<&str> = self
            .graph
            .node_indices()
            .filter(|idx| self.graph.neighbors(*idx).next().is_some())
            .map(|idx| self.graph[idx].as_str())
            .collect();

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for edge in self.graph.raw_edges() {
            *counts.entry(self.graph[edge.target()].as_str()).or_default() += 1;
        }
        let mut critical: Vec<CriticalControl> = counts
            .into_iter()
            .map(|(key, dependent_count)| CriticalControl {
                entity_key: key.to_string(),
                dependent_count,
            })
            .collect();
        critical.sort_by(|a, b| b.dependent_count.cmp(&a.dependent_count));
        critical.truncate(CRITICAL_LIMIT);

        DependencyReport {
            total_dependencies: self.edge_count(),
            controls_with_dependencies: sources.len(),
            critical_controls: critical,
            max_chain_length: self.max_chain_length(),
            has_cycles: self.has_cycles(),
        }
    }
}

impl QueryEngine<'_> {
    /// # Errors
    ///
    /// Returns `QueryError::Database` if reading relationships fails.
    pub async fn analyze_control_dependencies(&self) -> Result<DependencyReport, QueryError> {
        Ok(DependencyGraph::from_service(self.service()).await?.report())
    }
}
