//! Configuration system for subkeeper.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority)
//! 2. `config.toml` file
//! 3. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `SUBKEEPER_DATABASE_TYPE` - Database type (`sqlite` or `postgres`)
//! - `SUBKEEPER_DATABASE_URL` - Database connection URL
//! - `SUBKEEPER_LOG_LEVEL` - Log level (trace, debug, info, warn, error)
//! - `SUBKEEPER_LOG_FORMAT` - Log output format (`pretty` or `json`)
//! - `SUBKEEPER_LIFECYCLE_CRON` - Cron expression for the lifecycle tick
//! - `SUBKEEPER_RUN_ON_STARTUP` - Run one tick immediately when the scheduler starts
//! - `SUBKEEPER_SEED_COUNT` - Number of sample subscriptions inserted by `seed`

use config::Config;
use serde::Deserialize;
use std::env;
use std::sync::OnceLock;

use crate::errors::{KeeperError, KeeperResult};

/// Global configuration singleton.
static CONFIG: OnceLock<KeeperConfig> = OnceLock::new();

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KeeperConfig {
    /// Database configuration
    pub database: DatabaseConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Scheduled job configuration
    pub jobs: JobsConfig,
    /// Sample data configuration
    pub seed: SeedConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database type: "sqlite" or "postgres"
    pub db_type: String,
    /// SQLite connection URL
    pub sqlite_url: String,
    /// PostgreSQL connection URL
    pub postgres_url: String,
    /// Maximum pool connections
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: "sqlite".to_string(),
            sqlite_url: "sqlite://subkeeper.db?mode=rwc".to_string(),
            postgres_url: "postgres://localhost/subkeeper".to_string(),
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    /// Connection URL for the configured database type.
    pub fn url(&self) -> &str {
        match self.db_type.as_str() {
            "postgres" => &self.postgres_url,
            _ => &self.sqlite_url,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Output format: pretty or json
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Scheduled job configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Six-field cron expression (with seconds) for the lifecycle tick
    pub lifecycle_cron: String,
    /// Run a tick as soon as the scheduler starts
    pub run_on_startup: bool,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            // Daily at midnight UTC
            lifecycle_cron: "0 0 0 * * *".to_string(),
            run_on_startup: false,
        }
    }
}

/// Sample data configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Number of sample subscriptions inserted by `seed`
    pub subscription_count: u32,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            subscription_count: 10,
        }
    }
}

fn config_err(e: config::ConfigError) -> KeeperError {
    KeeperError::ConfigError(e.to_string())
}

impl KeeperConfig {
    /// Load configuration from file and environment.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. `config.toml` file (optional)
    /// 3. Environment variables
    ///
    /// This bypasses the global cache; most callers want [`get_config`].
    pub fn load() -> KeeperResult<Self> {
        let defaults = KeeperConfig::default();

        let builder = Config::builder()
            .set_default("database.db_type", defaults.database.db_type)
            .map_err(config_err)?
            .set_default("database.sqlite_url", defaults.database.sqlite_url)
            .map_err(config_err)?
            .set_default("database.postgres_url", defaults.database.postgres_url)
            .map_err(config_err)?
            .set_default(
                "database.max_connections",
                i64::from(defaults.database.max_connections),
            )
            .map_err(config_err)?
            .set_default("logging.level", defaults.logging.level)
            .map_err(config_err)?
            .set_default("logging.format", defaults.logging.format)
            .map_err(config_err)?
            .set_default("jobs.lifecycle_cron", defaults.jobs.lifecycle_cron)
            .map_err(config_err)?
            .set_default("jobs.run_on_startup", defaults.jobs.run_on_startup)
            .map_err(config_err)?
            .set_default(
                "seed.subscription_count",
                i64::from(defaults.seed.subscription_count),
            )
            .map_err(config_err)?
            // Load from config.toml (optional)
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables
            .set_override_option("database.db_type", env::var("SUBKEEPER_DATABASE_TYPE").ok())
            .map_err(config_err)?
            .set_override_option(
                "database.sqlite_url",
                env::var("SUBKEEPER_DATABASE_URL")
                    .ok()
                    .filter(|url| url.starts_with("sqlite")),
            )
            .map_err(config_err)?
            .set_override_option(
                "database.postgres_url",
                env::var("SUBKEEPER_DATABASE_URL")
                    .ok()
                    .filter(|url| url.starts_with("postgres")),
            )
            .map_err(config_err)?
            .set_override_option("logging.level", env::var("SUBKEEPER_LOG_LEVEL").ok())
            .map_err(config_err)?
            .set_override_option("logging.format", env::var("SUBKEEPER_LOG_FORMAT").ok())
            .map_err(config_err)?
            .set_override_option(
                "jobs.lifecycle_cron",
                env::var("SUBKEEPER_LIFECYCLE_CRON").ok(),
            )
            .map_err(config_err)?
            .set_override_option(
                "jobs.run_on_startup",
                env::var("SUBKEEPER_RUN_ON_STARTUP")
                    .ok()
                    .and_then(|v| v.parse::<bool>().ok()),
            )
            .map_err(config_err)?
            .set_override_option(
                "seed.subscription_count",
                env::var("SUBKEEPER_SEED_COUNT")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok()),
            )
            .map_err(config_err)?;

        let settings = builder
            .build()
            .map_err(|e| KeeperError::ConfigError(format!("failed to build config: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| KeeperError::ConfigError(format!("failed to deserialize config: {e}")))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> KeeperResult<()> {
        match self.database.db_type.as_str() {
            "sqlite" | "postgres" => {}
            other => {
                return Err(KeeperError::ConfigError(format!(
                    "database.db_type must be 'sqlite' or 'postgres', got '{other}'"
                )));
            }
        }

        if self.database.max_connections == 0 {
            return Err(KeeperError::ConfigError(
                "database.max_connections must be greater than 0".to_string(),
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(KeeperError::ConfigError(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            other => {
                return Err(KeeperError::ConfigError(format!(
                    "logging.format must be 'pretty' or 'json', got '{other}'"
                )));
            }
        }

        // tokio-cron-scheduler expects sec min hour day-of-month month day-of-week [year]
        let fields = self.jobs.lifecycle_cron.split_whitespace().count();
        if !(6..=7).contains(&fields) {
            return Err(KeeperError::ConfigError(format!(
                "jobs.lifecycle_cron must have 6 or 7 fields, got {fields}"
            )));
        }

        Ok(())
    }
}

/// Get the global configuration.
///
/// This loads the configuration on first access and caches it.
/// Returns an error if configuration loading or validation fails.
pub fn get_config() -> KeeperResult<&'static KeeperConfig> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }

    let config = KeeperConfig::load()?;
    config.validate()?;

    // Another thread may have won the race; either value is fine.
    let _ = CONFIG.set(config);

    CONFIG
        .get()
        .ok_or_else(|| KeeperError::ConfigError("configuration was not initialised".to_string()))
}
