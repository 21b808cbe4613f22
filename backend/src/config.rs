//! Configuration management for the Production Lot Engine
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with LOT_ENGINE_ prefix

use std::time::Duration;

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Bearer token verification
    pub jwt: JwtConfig,

    /// Stock lookups against the inventory collaborator
    pub inventory: InventoryConfig,

    /// Background alert evaluation
    pub alerts: AlertsConfig,

    pub rollup: RollupConfig,

    pub catalog: CatalogConfig,

    pub procurement: ProcurementConfig,

    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key used to verify JWT signatures
    pub secret: String,
}

/// Where on-hand quantities come from
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StockSource {
    Database,
    Http,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InventoryConfig {
    pub stock_source: StockSource,

    /// Base URL of the inventory service when `stock_source = "http"`
    pub stock_endpoint: Option<String>,

    pub request_timeout_ms: u64,

    /// Total attempts per lookup, including the first
    pub retry_attempts: u32,

    pub retry_initial_delay_ms: u64,
}

impl InventoryConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlertsConfig {
    pub scheduler_enabled: bool,
    pub scheduler_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RollupConfig {
    /// Multiply requested quantity by subprocess yield multipliers
    pub apply_yield_multipliers: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProcurementConfig {
    pub default_lead_time_days: u32,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("LOT_ENGINE_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("inventory.stock_source", "database")?
            .set_default("inventory.request_timeout_ms", 2000)?
            .set_default("inventory.retry_attempts", 3)?
            .set_default("inventory.retry_initial_delay_ms", 100)?
            .set_default("alerts.scheduler_enabled", true)?
            .set_default("alerts.scheduler_interval_secs", 300)?
            .set_default("rollup.apply_yield_multipliers", false)?
            .set_default("catalog.cache_ttl_secs", 300)?
            .set_default("procurement.default_lead_time_days", 7)?
            .set_default("logging.format", "pretty")?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (LOT_ENGINE_ prefix)
            .add_source(
                Environment::with_prefix("LOT_ENGINE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

#[cfg(test)]
impl Config {
    /// Configuration for router tests; nothing here reaches a real database
    pub fn for_tests() -> Self {
        Self {
            environment: "test".to_string(),
            server: ServerConfig::default(),
            database: DatabaseConfig {
                url: "postgres://localhost/lot_engine_test".to_string(),
                max_connections: 1,
                min_connections: 0,
            },
            jwt: JwtConfig {
                secret: "test-secret".to_string(),
            },
            inventory: InventoryConfig {
                stock_source: StockSource::Database,
                stock_endpoint: None,
                request_timeout_ms: 100,
                retry_attempts: 1,
                retry_initial_delay_ms: 0,
            },
            alerts: AlertsConfig {
                scheduler_enabled: false,
                scheduler_interval_secs: 300,
            },
            rollup: RollupConfig {
                apply_yield_multipliers: false,
            },
            catalog: CatalogConfig { cache_ttl_secs: 300 },
            procurement: ProcurementConfig {
                default_lead_time_days: 7,
            },
            logging: LoggingConfig {
                format: LogFormat::Pretty,
            },
        }
    }
}
