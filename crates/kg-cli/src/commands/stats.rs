use anyhow::Context;

use crate::cli::GlobalFlags;
use crate::context::AppContext;
use crate::output::output;

/// Handle `kg stats`.
pub async fn handle(ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let stats = ctx
        .query()
        .get_statistics()
        .await
        .context("stats: failed to read graph statistics")?;
    output(&stats, flags.format)
}
