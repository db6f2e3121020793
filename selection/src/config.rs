//! Configuration management for the stone lot selector
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with STONE_ prefix

use std::collections::BTreeMap;
use std::time::Duration;

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Quiet period bounds for the filter debouncer
const MIN_DEBOUNCE_MS: u64 = 350;
const MAX_DEBOUNCE_MS: u64 = 500;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Remote data service connection
    pub odoo: OdooConfig,

    /// Selection behaviour
    pub selection: SelectionConfig,

    /// Host record the `stone-grid` binary attaches to
    #[serde(default)]
    pub host: Option<HostConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OdooConfig {
    /// Server base URL
    pub url: String,

    /// Database name
    pub database: String,

    /// Login used to authenticate
    pub login: String,

    /// Password or API key
    pub password: String,

    /// User id; authenticated at startup when absent
    pub uid: Option<i64>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl OdooConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SelectionConfig {
    /// Candidates per page
    pub page_size: u32,

    /// Filter debounce quiet period in milliseconds
    pub debounce_ms: u64,

    /// Model hosting the paginated inventory method
    pub query_model: String,

    /// Paginated inventory method name
    pub query_method: String,
}

impl SelectionConfig {
    /// Quiet period, clamped to a sensible typing window
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.clamp(MIN_DEBOUNCE_MS, MAX_DEBOUNCE_MS))
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            page_size: shared::DEFAULT_PAGE_SIZE,
            debounce_ms: 400,
            query_model: "stock.quant".to_string(),
            query_method: "search_stone_inventory_for_so".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HostConfig {
    /// `sale.order.line` or `stock.move`
    pub model: String,

    /// Record id to attach to
    pub record_id: i64,

    /// Initial filter values keyed by wire name
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("STONE_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("odoo.url", "http://localhost:8069")?
            .set_default("odoo.database", "odoo")?
            .set_default("odoo.login", "admin")?
            .set_default("odoo.password", "admin")?
            .set_default("odoo.timeout_secs", 30)?
            .set_default("selection.page_size", i64::from(shared::DEFAULT_PAGE_SIZE))?
            .set_default("selection.debounce_ms", 400)?
            .set_default("selection.query_model", "stock.quant")?
            .set_default("selection.query_method", "search_stone_inventory_for_so")?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (STONE_ prefix)
            .add_source(
                Environment::with_prefix("STONE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
