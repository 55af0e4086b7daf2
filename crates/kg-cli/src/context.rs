use std::path::Path;

use anyhow::Context;
use kg_config::KgConfig;
use kg_db::service::GraphService;
use kg_query::QueryEngine;

use crate::cli::GlobalFlags;

/// Shared application resources initialized once at startup.
pub struct AppContext {
    pub config: KgConfig,
    pub service: GraphService,
}

impl AppContext {
    /// Load configuration (`.env`, TOML files, `KG_*`), apply `--db`, and open the store.
    pub async fn init(flags: &GlobalFlags) -> anyhow::Result<Self> {
        let mut config = KgConfig::load_with_dotenv().context("failed to load kg configuration")?;
        if let Some(db) = &flags.db {
            config.store.path.clone_from(db);
        }

        if !config.store.is_in_memory() {
            if let Some(parent) = Path::new(&config.store.path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("failed to create store directory {}", parent.display())
                    })?;
                }
            }
        }

        let service = GraphService::open(&config.store)
            .await
            .with_context(|| format!("failed to open graph store at {}", config.store.path))?;
        tracing::debug!(path = %config.store.path, "graph store opened");

        Ok(Self { config, service })
    }

    /// A query engine carrying the configured limits.
    #[must_use]
    pub fn query(&self) -> QueryEngine<'_> {
        QueryEngine::new(&self.service, self.config.query.clone())
    }
}
