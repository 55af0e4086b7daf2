use crate::cli::GlobalFlags;
use crate::cli::root_commands::Commands;
use crate::commands;
use crate::context::AppContext;

/// Dispatch a parsed command to the corresponding handler module.
pub async fn dispatch(command: Commands, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    match command {
        Commands::Rebuild(args) => commands::rebuild::handle(&args, ctx, flags).await,
        Commands::Sync(args) => commands::sync::handle_saved(&args, ctx, flags).await,
        Commands::Delete(args) => commands::sync::handle_deleted(&args, ctx, flags).await,
        Commands::Neighbors(args) => commands::neighbors::handle(&args, ctx, flags).await,
        Commands::Path(args) => commands::path::handle(&args, ctx, flags).await,
        Commands::Viz(args) => commands::viz::handle(&args, ctx, flags).await,
        Commands::Stats => commands::stats::handle(ctx, flags).await,
        Commands::Coverage(args) => commands::coverage::handle(&args, ctx, flags).await,
        Commands::Schema(args) => commands::schema::handle(&args, flags),
    }
}
