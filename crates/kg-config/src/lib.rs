//! # kg-config
//!
//! Layered configuration loading for the knowledge graph using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`KG_*` prefix, `__` as separator)
//! 2. Project-level `.kg/config.toml`
//! 3. User-level `~/.config/kg/config.toml`
//! 4. Built-in defaults
//!
//! Figment maps `KG_STORE__PATH` -> `store.path`, `KG_QUERY__MAX_DEPTH` -> `query.max_depth`.
//!
//! ```no_run
//! use kg_config::KgConfig;
//!
//! let config = KgConfig::load_with_dotenv().expect("config");
//! println!("graph store: {}", config.store.path);
//! ```

mod error;
mod query;
mod store;

pub use error::ConfigError;
pub use query::QueryConfig;
pub use store::StoreConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable prefix for every setting.
pub const ENV_PREFIX: &str = "KG_";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct KgConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

impl KgConfig {
    /// Load configuration from TOML files and environment variables, then validate.
    ///
    /// Does not read `.env`; see [`KgConfig::load_with_dotenv`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if extraction fails or a value is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(&Self::figment())
    }

    /// Load `.env` from the current directory (if any) before [`KgConfig::load`].
    ///
    /// # Errors
    ///
    /// Same as [`KgConfig::load`].
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::load()
    }

    /// Extract and validate from an arbitrary figment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if extraction fails or a value is out of range.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Build the figment provider chain.
    ///
    /// Public so tests and the CLI can layer extra providers on top.
    #[must_use]
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        let local_path = PathBuf::from(".kg/config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Check cross-field constraints figment cannot express.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        self.query.validate()
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("kg").join("config.toml"))
    }
}
