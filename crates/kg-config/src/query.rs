//! Traversal and visualization limits.

use serde::{Deserialize, Serialize};

use crate::ConfigError;

const fn default_depth() -> u32 {
    2
}

const fn default_max_depth() -> u32 {
    6
}

const fn default_max_nodes() -> usize {
    100
}

const fn default_max_nodes_ceiling() -> usize {
    1_000
}

const fn default_path_depth() -> u32 {
    5
}

const fn default_max_paths() -> usize {
    10
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryConfig {
    /// Depth used when a caller does not pass one.
    #[serde(default = "default_depth")]
    pub default_depth: u32,

    /// Hard ceiling on traversal depth; larger requests are clamped.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    #[serde(default = "default_max_nodes")]
    pub default_max_nodes: usize,

    /// Hard ceiling on visualization node count; larger requests are clamped.
    #[serde(default = "default_max_nodes_ceiling")]
    pub max_nodes_ceiling: usize,

    /// `max_depth` for `find_path` when the caller does not pass one.
    #[serde(default = "default_path_depth")]
    pub default_path_depth: u32,

    /// Cap on paths returned by `find_all_paths` when the caller does not pass one.
    #[serde(default = "default_max_paths")]
    pub default_max_paths: usize,
}

impl QueryConfig {
    /// Clamp a requested depth to `max_depth`.
    #[must_use]
    pub fn clamp_depth(&self, requested: Option<u32>) -> u32 {
        requested.unwrap_or(self.default_depth).min(self.max_depth)
    }

    /// Clamp a requested node cap to `max_nodes_ceiling`.
    #[must_use]
    pub fn clamp_nodes(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_max_nodes)
            .min(self.max_nodes_ceiling)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.default_max_paths == 0 {
            return Err(ConfigError::InvalidValue {
                field: "query.default_max_paths".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_nodes_ceiling == 0 || self.default_max_nodes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "query.max_nodes_ceiling".to_string(),
                reason: "node caps must be at least 1".to_string(),
            });
        }
        if self.default_depth > self.max_depth {
            return Err(ConfigError::InvalidValue {
                field: "query.default_depth".to_string(),
                reason: format!("{} exceeds max_depth ({})", self.default_depth, self.max_depth),
            });
        }
        Ok(())
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_depth: default_depth(),
            max_depth: default_max_depth(),
            default_max_nodes: default_max_nodes(),
            max_nodes_ceiling: default_max_nodes_ceiling(),
            default_path_depth: default_path_depth(),
            default_max_paths: default_max_paths(),
        }
    }
}
