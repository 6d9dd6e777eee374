//! Worker configuration
//!
//! Read from `BILLING_`-prefixed environment variables. Nested keys use a
//! double underscore, e.g. `BILLING_ACCRUAL__ACTIVITY__RETRY__MAX_ATTEMPTS=3`.

use std::collections::HashMap;
use std::time::Duration;

use domain_accrual::AccrualConfig;
use infra_db::DatabaseConfig;
use serde::Deserialize;
use thiserror::Error;

const ENV_PREFIX: &str = "BILLING";

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Connection pool settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            connect_timeout_secs: 30,
        }
    }
}

/// Worker configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// PostgreSQL connection string
    pub database_url: String,
    /// Default log filter, overridden by `RUST_LOG`
    pub log_level: String,
    /// Emit JSON log lines instead of the human-readable format
    pub log_json: bool,
    pub database: DatabaseSettings,
    pub accrual: AccrualConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/billing".to_string(),
            log_level: "info".to_string(),
            log_json: false,
            database: DatabaseSettings::default(),
            accrual: AccrualConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Loads configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Loads configuration from an explicit variable map instead of the
    /// process environment
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::load(Some(vars))
    }

    fn load(vars: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        let environment = config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(vars);

        let config: WorkerConfig = config::Config::builder()
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the worker cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::Invalid("database_url must be set".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be positive".to_string(),
            ));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid(format!(
                "database.min_connections ({}) exceeds max_connections ({})",
                self.database.min_connections, self.database.max_connections
            )));
        }
        if self.accrual.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "accrual.channel_capacity must be positive".to_string(),
            ));
        }
        if self.accrual.activity.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "accrual.activity.retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.accrual.audit_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "accrual.audit_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Pool configuration for `infra_db::create_pool`
    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.database_url.clone())
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .connect_timeout(Duration::from_secs(self.database.connect_timeout_secs))
    }
}
