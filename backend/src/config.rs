//! Configuration management for the stock approval server
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with STOCK__ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    pub server: ServerConfig,

    pub database: DatabaseConfig,

    pub jwt: JwtConfig,

    /// Document number prefixes and fallback scope codes
    pub numbering: NumberingConfig,

    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL; empty selects the in-memory store
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Shared secret of the identity provider's HS256 tokens
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NumberingConfig {
    pub intake_prefix: String,
    pub issuance_prefix: String,
    /// Used when a ministry has no abbreviation
    pub default_ministry_code: String,
    /// Used when a structure has no abbreviation
    pub default_structure_code: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LogConfig {
    /// Emit JSON lines instead of the human-readable format
    pub json: bool,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("STOCK_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.url", "")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("jwt.secret", "development-secret-key")?
            .set_default("numbering.intake_prefix", "INT")?
            .set_default("numbering.issuance_prefix", "ISS")?
            .set_default("numbering.default_ministry_code", "MIN")?
            .set_default("numbering.default_structure_code", "STR")?
            .set_default("log.json", false)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (STOCK__ prefix)
            .add_source(
                Environment::with_prefix("STOCK")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn uses_database(&self) -> bool {
        !self.database.url.trim().is_empty()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            jwt: JwtConfig::default(),
            numbering: NumberingConfig::default(),
            log: LogConfig::default(),
        }
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

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 2,
            acquire_timeout_secs: 30,
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: "development-secret-key".to_string(),
        }
    }
}

impl Default for NumberingConfig {
    fn default() -> Self {
        Self {
            intake_prefix: "INT".to_string(),
            issuance_prefix: "ISS".to_string(),
            default_ministry_code: "MIN".to_string(),
            default_structure_code: "STR".to_string(),
        }
    }
}
