use anyhow::Context;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::CoverageArgs;
use crate::context::AppContext;
use crate::output::output;

/// Handle `kg coverage`.
pub async fn handle(args: &CoverageArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let report = ctx
        .query()
        .get_full_analysis(args.company.as_deref())
        .await
        .context("coverage: analysis failed")?;
    output(&report, flags.format)
}
