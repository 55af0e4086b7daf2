use kg_core::entities::{GraphPath, GraphStatistics};
use kg_core::responses::RebuildResponse;
use kg_core::visual::VisualizationGraph;
use kg_query::coverage::CoverageReport;
use schemars::{Schema, schema_for};

use crate::cli::GlobalFlags;
use crate::cli::root_commands::{SchemaArgs, SchemaPayload};
use crate::output::output;

/// Handle `kg schema`.
pub fn handle(args: &SchemaArgs, flags: &GlobalFlags) -> anyhow::Result<()> {
    output(&schema(args.payload), flags.format)
}

fn schema(payload: SchemaPayload) -> Schema {
    match payload {
        SchemaPayload::Visualization => schema_for!(VisualizationGraph),
        SchemaPayload::Coverage => schema_for!(CoverageReport),
        SchemaPayload::Statistics => schema_for!(GraphStatistics),
        SchemaPayload::Rebuild => schema_for!(RebuildResponse),
        SchemaPayload::Path => schema_for!(GraphPath),
    }
}
