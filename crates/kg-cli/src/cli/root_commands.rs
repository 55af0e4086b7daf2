use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};
use kg_core::enums::{Direction, EntityType, RelationshipType};

/// Top-level command tree.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Clear the graph and derive it again from a record export.
    Rebuild(RebuildArgs),
    /// Apply one saved record to the graph.
    Sync(SyncArgs),
    /// Apply one deleted record to the graph.
    Delete(DeleteArgs),
    /// Entities reachable from an entity within a depth.
    Neighbors(NeighborsArgs),
    /// Shortest path between two entities.
    Path(PathArgs),
    /// Bounded subgraph for the visualization client.
    Viz(VizArgs),
    /// Entity and relationship counts.
    Stats,
    /// Coverage analysis and compliance score.
    Coverage(CoverageArgs),
    /// Dump the JSON Schema of a response payload.
    Schema(SchemaArgs),
}

/// Arguments for `kg rebuild`.
#[derive(Clone, Debug, Args)]
pub struct RebuildArgs {
    /// JSONL record export, one record per line.
    #[arg(long)]
    pub records: PathBuf,
}

/// Arguments for `kg sync`.
#[derive(Clone, Debug, Args)]
pub struct SyncArgs {
    /// JSONL record export holding the saved record and its link targets.
    #[arg(long)]
    pub records: PathBuf,
    #[arg(long)]
    pub doctype: String,
    #[arg(long)]
    pub name: String,
}

/// Arguments for `kg delete`.
#[derive(Clone, Debug, Args)]
pub struct DeleteArgs {
    #[arg(long)]
    pub doctype: String,
    #[arg(long)]
    pub name: String,
}

/// Arguments for `kg neighbors`.
#[derive(Clone, Debug, Args)]
pub struct NeighborsArgs {
    pub entity_key: String,
    #[arg(long, default_value = "both", value_parser = parse_direction)]
    pub direction: Direction,
    #[arg(long)]
    pub depth: Option<u32>,
    /// Only follow edges of this type (repeatable, e.g. `owns`).
    #[arg(long = "relationship-type", value_parser = parse_relationship_type)]
    pub relationship_types: Vec<RelationshipType>,
}

/// Arguments for `kg path`.
#[derive(Clone, Debug, Args)]
pub struct PathArgs {
    pub start: String,
    pub end: String,
    #[arg(long)]
    pub max_depth: Option<u32>,
    /// Only follow edges of this type (repeatable, e.g. `depends_on`).
    #[arg(long = "relationship-type", value_parser = parse_relationship_type)]
    pub relationship_types: Vec<RelationshipType>,
    /// List every simple path instead of the shortest one.
    #[arg(long)]
    pub all: bool,
    /// Cap on listed paths with `--all`.
    #[arg(long, requires = "all")]
    pub max_paths: Option<usize>,
}

/// Arguments for `kg viz`.
#[derive(Clone, Debug, Args)]
pub struct VizArgs {
    /// Restrict nodes to one entity type (`control` or `Control`).
    #[arg(long, value_parser = parse_entity_type)]
    pub entity_type: Option<EntityType>,
    /// Entity key to expand from.
    #[arg(long)]
    pub center: Option<String>,
    #[arg(long)]
    pub depth: Option<u32>,
    #[arg(long)]
    pub max_nodes: Option<usize>,
}

/// Arguments for `kg coverage`.
#[derive(Clone, Debug, Args)]
pub struct CoverageArgs {
    /// Only count entities whose `company` property matches.
    #[arg(long)]
    pub company: Option<String>,
}

/// Arguments for `kg schema`.
#[derive(Clone, Debug, Args)]
pub struct SchemaArgs {
    #[arg(value_enum, default_value = "visualization")]
    pub payload: SchemaPayload,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum SchemaPayload {
    Visualization,
    Coverage,
    Statistics,
    Rebuild,
    Path,
}

fn parse_direction(value: &str) -> Result<Direction, String> {
    value.parse().map_err(|e: kg_core::errors::CoreError| e.to_string())
}

fn parse_entity_type(value: &str) -> Result<EntityType, String> {
    value.parse().map_err(|e: kg_core::errors::CoreError| e.to_string())
}

fn parse_relationship_type(value: &str) -> Result<RelationshipType, String> {
    value.parse().map_err(|e: kg_core::errors::CoreError| e.to_string())
}
