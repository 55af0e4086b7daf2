use anyhow::Context;
use kg_sync::{CancelToken, MemoryRecordSource, SyncEngine};

use crate::cli::GlobalFlags;
use crate::cli::root_commands::RebuildArgs;
use crate::context::AppContext;
use crate::output::output;
use crate::progress::Progress;

/// Handle `kg rebuild`. Ctrl-C stops the rebuild after the record in flight.
pub async fn handle(args: &RebuildArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let records = MemoryRecordSource::from_jsonl(&args.records)
        .context("rebuild: failed to load record export")?;

    let cancel = CancelToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, stopping rebuild after the current record");
                cancel.cancel();
            }
        })
    };

    let progress = Progress::spinner(
        &format!("rebuilding graph from {} records", records.len()),
        flags.quiet,
    );
    let result = SyncEngine::new(&ctx.service, &records).rebuild(&cancel).await;
    watcher.abort();

    let response = match result {
        Ok(response) => response,
        Err(error) => {
            progress.finish_clear();
            return Err(error).context("rebuild: failed to derive graph");
        }
    };

    if response.cancelled {
        progress.finish_ok("rebuild cancelled");
    } else {
        progress.finish_ok(&format!(
            "rebuilt {} entities, {} relationships",
            response.entities_created, response.relationships_created
        ));
    }
    output(&response, flags.format)
}
