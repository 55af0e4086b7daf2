use anyhow::Context;
use kg_core::entities::SourceRef;
use kg_sync::{MemoryRecordSource, SyncEngine};

use crate::cli::GlobalFlags;
use crate::cli::root_commands::{DeleteArgs, SyncArgs};
use crate::context::AppContext;
use crate::output::output;

/// Handle `kg sync`: apply one saved record from an export.
pub async fn handle_saved(args: &SyncArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let records = MemoryRecordSource::from_jsonl(&args.records)
        .context("sync: failed to load record export")?;
    let source = SourceRef::new(args.doctype.as_str(), args.name.as_str());
    let record = records
        .get(&source)
        .with_context(|| format!("sync: record {source} is not in {}", args.records.display()))?;

    let report = SyncEngine::new(&ctx.service, &records)
        .on_record_saved(&record)
        .await
        .with_context(|| format!("sync: failed to apply {source}"))?;
    output(&report, flags.format)
}

/// Handle `kg delete`.
pub async fn handle_deleted(args: &DeleteArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let source = SourceRef::new(args.doctype.as_str(), args.name.as_str());
    // Deletion never reads records.
    let records = MemoryRecordSource::new();
    let report = SyncEngine::new(&ctx.service, &records)
        .on_record_deleted(&source)
        .await
        .with_context(|| format!("delete: failed to apply {source}"))?;
    output(&report, flags.format)
}
