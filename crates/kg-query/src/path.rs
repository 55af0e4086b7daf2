//! Cached shortest-path search and bounded path enumeration.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use kg_core::entities::{GraphPath, PathHop, RelationshipEdge};
use kg_core::enums::{Direction, RelationshipType};
use kg_db::cache::PathFingerprint;
use tracing::{debug, trace};

use crate::QueryEngine;
use crate::error::QueryError;
use crate::traversal::follows;

impl QueryEngine<'_> {
    /// Shortest path by hop count between two entities, edges followed in
    /// either direction.
    ///
    /// Ties are broken by the earliest-created relationship at each level.
    /// With `relationship_types`, only edges of those types are followed.
    /// Found paths are cached under `(start, end, depth, types)`; "no path"
    /// answers are not cached.
    ///
    /// # Errors
    ///
    /// `NotFound` if either endpoint key is unknown.
    pub async fn find_path(
        &self,
        start_key: &str,
        end_key: &str,
        max_depth: Option<u32>,
        relationship_types: Option<&[RelationshipType]>,
    ) -> Result<Option<GraphPath>, QueryError> {
        let start = self.service().get_entity(start_key).await?;
        let end = self.service().get_entity(end_key).await?;
        let depth = self.path_depth(max_depth);

        let fingerprint = PathFingerprint::new(start_key, end_key, depth)
            .with_relationship_types(relationship_types.unwrap_or_default());
        if let Some(path) = self.service().path_cache().get(&fingerprint) {
            trace!(start_key, end_key, depth, "path cache hit");
            return Ok(Some(path));
        }

        if !start.is_active || !end.is_active {
            return Ok(None);
        }

        let Some(hops) = self
            .shortest_hops(start_key, end_key, depth, relationship_types)
            .await?
        else {
            debug!(start_key, end_key, depth, "no path");
            return Ok(None);
        };

        let path = graph_path(start_key, end_key, depth, hops);
        debug!(start_key, end_key, length = path.length, "path computed");
        self.service().path_cache().insert(fingerprint, path.clone());
        Ok(Some(path))
    }

    /// Every simple path from `start_key` to `end_key` of at most `max_depth`
    /// hops, edges followed in either direction.
    ///
    /// Paths come back in depth-first discovery order, expanding each entity's
    /// relationships by creation order, and stop at `max_paths` (default
    /// `query.default_max_paths`). Results are not cached.
    ///
    /// # Errors
    ///
    /// `NotFound` if either endpoint key is unknown.
    pub async fn find_all_paths(
        &self,
        start_key: &str,
        end_key: &str,
        max_depth: Option<u32>,
        max_paths: Option<usize>,
        relationship_types: Option<&[RelationshipType]>,
    ) -> Result<Vec<GraphPath>, QueryError> {
        let start = self.service().get_entity(start_key).await?;
        let end = self.service().get_entity(end_key).await?;
        let depth = self.path_depth(max_depth);
        let max_paths = max_paths.unwrap_or(self.limits().default_max_paths);

        let mut paths = Vec::new();
        if max_paths == 0 || !start.is_active || !end.is_active {
            return Ok(paths);
        }
        if start_key == end_key {
            paths.push(graph_path(start_key, end_key, depth, Vec::new()));
            return Ok(paths);
        }
        if depth == 0 {
            return Ok(paths);
        }

        let mut on_path: HashSet<String> = HashSet::from([start_key.to_string()]);
        let mut hops: Vec<PathHop> = Vec::new();
        let mut stack = vec![self.expansion(start_key, relationship_types).await?];

        while let Some(frame) = stack.last_mut() {
            let Some(edge) = frame.edges.get(frame.next).cloned() else {
                let done = stack.pop();
                // the start entity has no incoming hop
                if let (Some(done), false) = (done, stack.is_empty()) {
                    on_path.remove(&done.key);
                    hops.pop();
                }
                continue;
            };
            frame.next += 1;
            if on_path.contains(&edge.neighbor_key) {
                continue;
            }

            let hop = PathHop {
                from_key: frame.key.clone(),
                to_key: edge.neighbor_key.clone(),
                relationship_type: edge.relationship_type,
                direction: edge.direction,
                relationship_seq: edge.seq,
            };
            if edge.neighbor_key == end_key {
                let mut found = hops.clone();
                found.push(hop);
                paths.push(graph_path(start_key, end_key, depth, found));
                if paths.len() >= max_paths {
                    break;
                }
                continue;
            }
            // Reaching the neighbor uses hops.len() + 1; going on needs one more.
            if hops.len() + 1 >= usize::try_from(depth).unwrap_or(usize::MAX) {
                continue;
            }
            hops.push(hop);
            on_path.insert(edge.neighbor_key.clone());
            stack.push(self.expansion(&edge.neighbor_key, relationship_types).await?);
        }

        debug!(start_key, end_key, depth, found = paths.len(), "paths enumerated");
        Ok(paths)
    }

    fn path_depth(&self, requested: Option<u32>) -> u32 {
        let limits = self.limits();
        requested
            .unwrap_or(limits.default_path_depth)
            .min(limits.max_depth)
    }

    async fn expansion(
        &self,
        key: &str,
        relationship_types: Option<&[RelationshipType]>,
    ) -> Result<Expansion, QueryError> {
        let mut edges: Vec<RelationshipEdge> = self
            .service()
            .list_relationships(key, Direction::Both)
            .await?
            .into_iter()
            .filter(|edge| follows(relationship_types, edge.relationship_type))
            .collect();
        edges.sort_by_key(|edge| edge.seq);
        Ok(Expansion {
            key: key.to_string(),
            edges,
            next: 0,
        })
    }

    async fn shortest_hops(
        &self,
        start_key: &str,
        end_key: &str,
        depth: u32,
        relationship_types: Option<&[RelationshipType]>,
    ) -> Result<Option<Vec<PathHop>>, QueryError> {
        if start_key == end_key {
            return Ok(Some(Vec::new()));
        }

        // entity -> hop that first reached it
        let mut parents: HashMap<String, PathHop> = HashMap::new();
        let mut visited: HashSet<String> = HashSet::from([start_key.to_string()]);
        let mut frontier = vec![start_key.to_string()];

        for _ in 0..depth {
            if frontier.is_empty() {
                break;
            }
            let mut candidates: Vec<(String, RelationshipEdge)> = Vec::new();
            for key in &frontier {
                for edge in self.service().list_relationships(key, Direction::Both).await? {
                    if follows(relationship_types, edge.relationship_type) {
                        candidates.push((key.clone(), edge));
                    }
                }
            }
            candidates.sort_by_key(|(_, edge)| edge.seq);

            let mut next = Vec::new();
            for (from_key, edge) in candidates {
                if !visited.insert(edge.neighbor_key.clone()) {
                    continue;
                }
                let hop = PathHop {
                    from_key,
                    to_key: edge.neighbor_key.clone(),
                    relationship_type: edge.relationship_type,
                    direction: edge.direction,
                    relationship_seq: edge.seq,
                };
                parents.insert(edge.neighbor_key.clone(), hop);
                if edge.neighbor_key == end_key {
                    return Ok(Some(unwind(&parents, start_key, end_key)));
                }
                next.push(edge.neighbor_key);
            }
            frontier = next;
        }
        Ok(None)
    }
}

/// One entity on the depth-first stack and the edges still to try from it.
struct Expansion {
    key: String,
    edges: Vec<RelationshipEdge>,
    next: usize,
}

fn graph_path(start_key: &str, end_key: &str, max_depth: u32, hops: Vec<PathHop>) -> GraphPath {
    GraphPath {
        start_key: start_key.to_string(),
        end_key: end_key.to_string(),
        max_depth,
        length: u32::try_from(hops.len()).unwrap_or(u32::MAX),
        hops,
        computed_at: Utc::now(),
    }
}

fn unwind(parents: &HashMap<String, PathHop>, start_key: &str, end_key: &str) -> Vec<PathHop> {
    let mut hops = Vec::new();
    let mut cursor = end_key;
    while cursor != start_key {
        let Some(hop) = parents.get(cursor) else {
            break;
        };
        hops.push(hop.clone());
        cursor = &hop.from_key;
    }
    hops.reverse();
    hops
}
