//! Environment-driven store configuration.

use std::str::FromStr;
use std::time::Duration;

use clue_core::{defaults, Error, QueryConfig, Result};

use crate::pool::PoolConfig;

/// Used when `DATABASE_URL` is unset.
pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/clue";

/// Store settings.
///
/// | Variable | Default |
/// |----------|---------|
/// | `DATABASE_URL` | [`DEFAULT_DATABASE_URL`] |
/// | `DB_MAX_CONNECTIONS` | `defaults::DB_MAX_CONNECTIONS` |
/// | `DB_CONNECT_TIMEOUT_SECS` | `defaults::DB_CONNECT_TIMEOUT_SECS` |
/// | `DB_STATEMENT_TIMEOUT_MS` | `defaults::STORE_TIMEOUT_MS` |
/// | `MAX_PAGE_SIZE` | `defaults::MAX_PAGE_SIZE` |
#[derive(Debug, Clone, PartialEq)]
pub struct DbConfig {
    pub database_url: String,
    pub pool: PoolConfig,
    /// Deadline for each store call.
    pub statement_timeout: Duration,
    pub max_page_size: i64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            pool: PoolConfig::default(),
            statement_timeout: Duration::from_millis(defaults::STORE_TIMEOUT_MS),
            max_page_size: defaults::MAX_PAGE_SIZE,
        }
    }
}

impl DbConfig {
    /// Read from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read through `lookup`. Set-but-invalid values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("DATABASE_URL").filter(|u| !u.trim().is_empty()) {
            config.database_url = url;
        }
        if let Some(n) = parse_var::<u32, _>(&lookup, "DB_MAX_CONNECTIONS")? {
            if n == 0 {
                return Err(Error::Config("DB_MAX_CONNECTIONS must be at least 1".to_string()));
            }
            config.pool = config.pool.max_connections(n);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "DB_CONNECT_TIMEOUT_SECS")? {
            config.pool = config.pool.connect_timeout(Duration::from_secs(secs));
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "DB_STATEMENT_TIMEOUT_MS")? {
            if ms == 0 {
                return Err(Error::Config(
                    "DB_STATEMENT_TIMEOUT_MS must be positive".to_string(),
                ));
            }
            config.statement_timeout = Duration::from_millis(ms);
        }
        if let Some(max) = parse_var::<i64, _>(&lookup, "MAX_PAGE_SIZE")? {
            if max < 1 {
                return Err(Error::Config("MAX_PAGE_SIZE must be at least 1".to_string()));
            }
            config.max_page_size = max;
        }
        Ok(config)
    }

    /// Composition policy derived from this configuration.
    pub fn query_config(&self) -> QueryConfig {
        QueryConfig::default().with_max_page_size(self.max_page_size)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{}='{}': {}", key, raw, e))),
    }
}
