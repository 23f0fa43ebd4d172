//! Application settings from the environment. Call `dotenvy::dotenv()` before loading to pick up `.env`.

use crate::error::ConfigError;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_DATABASE_URL: &str = "sqlite::memory:";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Connection settings for one data source.
#[derive(Clone, Debug)]
pub struct DataSourceConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl DataSourceConfig {
    pub fn new(url: impl Into<String>) -> Self {
        DataSourceConfig {
            url: url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppSettings {
    pub app_name: String,
    /// Free-form environment label (`APP_SETTINGS`), e.g. production or development.
    pub environment: String,
    pub bind_addr: String,
    pub database: DataSourceConfig,
    pub max_body_bytes: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            app_name: env!("CARGO_PKG_NAME").to_string(),
            environment: "production".into(),
            bind_addr: DEFAULT_BIND_ADDR.into(),
            database: DataSourceConfig::new(DEFAULT_DATABASE_URL),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl AppSettings {
    /// Read settings from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup; unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AppSettings::default();
        let max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        if max_connections == 0 {
            return Err(ConfigError::Load("DB_MAX_CONNECTIONS must be at least 1".into()));
        }
        let acquire_timeout_secs = parse_or(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", DEFAULT_ACQUIRE_TIMEOUT_SECS)?;
        Ok(AppSettings {
            app_name: lookup("APP_NAME").unwrap_or(defaults.app_name),
            environment: lookup("APP_SETTINGS").unwrap_or(defaults.environment),
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            database: DataSourceConfig {
                url: lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
                max_connections,
                acquire_timeout: Duration::from_secs(acquire_timeout_secs),
            },
            max_body_bytes: parse_or(&lookup, "MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Load(format!("{} must be a number, got '{}'", key, raw))),
    }
}
