use anyhow::Context;
use kg_core::entities::GraphPath;
use serde::Serialize;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::PathArgs;
use crate::context::AppContext;
use crate::output::output;

#[derive(Debug, Serialize)]
struct PathResponse {
    start_key: String,
    end_key: String,
    found: bool,
    path: Option<GraphPath>,
}

#[derive(Debug, Serialize)]
struct AllPathsResponse {
    start_key: String,
    end_key: String,
    count: usize,
    paths: Vec<GraphPath>,
}

/// Handle `kg path`.
pub async fn handle(args: &PathArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let query = ctx.query();
    let types = Some(args.relationship_types.as_slice());

    if args.all {
        let paths = query
            .find_all_paths(&args.start, &args.end, args.max_depth, args.max_paths, types)
            .await
            .with_context(|| format!("path: failed to list {} -> {}", args.start, args.end))?;
        return output(
            &AllPathsResponse {
                start_key: args.start.clone(),
                end_key: args.end.clone(),
                count: paths.len(),
                paths,
            },
            flags.format,
        );
    }

    let path = query
        .find_path(&args.start, &args.end, args.max_depth, types)
        .await
        .with_context(|| format!("path: failed to search {} -> {}", args.start, args.end))?;
    output(
        &PathResponse {
            start_key: args.start.clone(),
            end_key: args.end.clone(),
            found: path.is_some(),
            path,
        },
        flags.format,
    )
}
