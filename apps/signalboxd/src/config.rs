//! Process-level configuration: everything `main` needs before it can build
//! a `PostgresStoreGateway`, a `RuleEngine` and an `InterlockingService`.
//!
//! Loaded from the environment (via `dotenvy`), hydrating `.env` into
//! `std::env` before reading typed fields out of it.

use signalbox_distributor::DistributorConfig;
use signalbox_service::ServiceConfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub rules_document_path: PathBuf,
    pub distributor: DistributorConfig,
    pub service: ServiceConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    Missing(&'static str),
    #[error("environment variable {name} could not be parsed as {expected}: {value}")]
    Invalid { name: &'static str, expected: &'static str, value: String },
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = require("DATABASE_URL")?;
        let database_max_connections = parse_or("DATABASE_MAX_CONNECTIONS", 10u32)?;
        let rules_document_path = PathBuf::from(require("RULES_DOCUMENT_PATH")?);

        let poll_fast_ms = parse_or("POLLING_INTERVAL_FAST_MS", 2_000u64)?;
        let poll_slow_ms = parse_or("POLLING_INTERVAL_SLOW_MS", 15_000u64)?;
        let health_threshold_s = parse_or("NOTIFICATION_HEALTH_THRESHOLD_S", 300u64)?;
        let health_check_interval_s = parse_or("HEALTH_CHECK_INTERVAL_S", 100u64)?;
        let target_response_ms = parse_or("TARGET_RESPONSE_TIME_MS", 50u64)?;
        let hard_ceiling_ms = parse_or("HARD_CEILING_MS", 500u64)?;

        Ok(Self {
            database_url,
            database_max_connections,
            rules_document_path,
            distributor: DistributorConfig {
                poll_fast: Duration::from_millis(poll_fast_ms),
                poll_slow: Duration::from_millis(poll_slow_ms),
                health_check_interval: Duration::from_secs(health_check_interval_s),
                health_threshold: Duration::from_secs(health_threshold_s),
            },
            service: ServiceConfig {
                target_response: Duration::from_millis(target_response_ms),
                hard_ceiling: Duration::from_millis(hard_ceiling_ms),
            },
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value.parse().map_err(|_| ConfigError::Invalid { name, expected: std::any::type_name::<T>(), value }),
        Err(_) => Ok(default),
    }
}
