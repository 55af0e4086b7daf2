use anyhow::Context;
use kg_query::SubgraphRequest;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::VizArgs;
use crate::context::AppContext;
use crate::output::output;

/// Handle `kg viz`.
pub async fn handle(args: &VizArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let request = SubgraphRequest {
        entity_type: args.entity_type,
        center_entity: args.center.clone(),
        depth: args.depth,
        max_nodes: args.max_nodes,
    };
    let graph = ctx
        .query()
        .get_visualization_subgraph(&request)
        .await
        .context("viz: failed to extract subgraph")?;
    output(&graph, flags.format)
}
