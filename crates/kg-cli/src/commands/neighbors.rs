use anyhow::Context;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::NeighborsArgs;
use crate::context::AppContext;
use crate::output::output;

/// Handle `kg neighbors`.
pub async fn handle(args: &NeighborsArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let neighbors = ctx
        .query()
        .get_entity_neighbors(
            &args.entity_key,
            args.direction,
            args.depth,
            Some(args.relationship_types.as_slice()),
        )
        .await
        .with_context(|| format!("neighbors: failed to traverse from {}", args.entity_key))?;
    output(&neighbors, flags.format)
}
