//! Integration tests for TOML + environment layering.
//!
//! Uses figment::Jail for sandboxed env var and file manipulation.

use figment::{
    Figment, Jail,
    providers::{Env, Format, Serialized, Toml},
};
use kg_config::{ConfigError, KgConfig};
use pretty_assertions::assert_eq;

fn layered() -> Figment {
    Figment::from(Serialized::defaults(KgConfig::default()))
        .merge(Toml::file("config.toml"))
        .merge(Env::prefixed("KG_").split("__"))
}

#[test]
fn loads_store_and_query_from_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
[store]
path = "/var/lib/kg/graph.db"
busy_timeout_ms = 250
max_conflict_retries = 8

[query]
default_depth = 3
max_nodes_ceiling = 400
"#,
        )?;

        let config: KgConfig = layered().extract()?;

        assert_eq!(config.store.path, "/var/lib/kg/graph.db");
        assert_eq!(config.store.busy_timeout_ms, 250);
        assert_eq!(config.store.max_conflict_retries, 8);
        assert_eq!(config.store.retry_base_delay_ms, 10);
        assert_eq!(config.query.default_depth, 3);
        assert_eq!(config.query.max_nodes_ceiling, 400);
        assert_eq!(config.query.default_max_nodes, 100);
        Ok(())
    });
}

#[test]
fn env_var_overrides_toml() {
    Jail::expect_with(|jail| {
        jail.set_env("KG_STORE__PATH", ":memory:");
        jail.create_file(
            "config.toml",
            r#"
[store]
path = "from-toml.db"
busy_timeout_ms = 900
"#,
        )?;

        let config: KgConfig = layered().extract()?;

        assert_eq!(config.store.path, ":memory:");
        assert!(config.store.is_in_memory());
        assert_eq!(config.store.busy_timeout_ms, 900);
        Ok(())
    });
}

#[test]
fn project_config_file_is_picked_up() {
    Jail::expect_with(|jail| {
        jail.create_dir(".kg")?;
        jail.create_file(
            ".kg/config.toml",
            r"
[query]
max_depth = 4
default_depth = 1
",
        )?;

        let config = KgConfig::load().map_err(|e| e.to_string())?;
        assert_eq!(config.query.max_depth, 4);
        assert_eq!(config.query.default_depth, 1);
        Ok(())
    });
}

#[test]
fn invalid_values_fail_validation() {
    Jail::expect_with(|jail| {
        jail.set_env("KG_STORE__MAX_CONFLICT_RETRIES", "0");

        let result = KgConfig::from_figment(&layered());
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "store.max_conflict_retries"
        ));
        Ok(())
    });
}

#[test]
fn malformed_number_is_a_figment_error() {
    Jail::expect_with(|jail| {
        jail.set_env("KG_QUERY__MAX_DEPTH", "deep");

        let result = KgConfig::from_figment(&layered());
        assert!(matches!(result, Err(ConfigError::Figment(_))));
        Ok(())
    });
}
