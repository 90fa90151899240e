//! Configuration and dependency initialization for the movies indexer.

mod dependencies;

pub use dependencies::Dependencies;

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use movies_indexer_repository::config::DEFAULT_CONNECT_TIMEOUT;
use movies_indexer_repository::{OpenSearchConfig, PostgresConfig};

use crate::orchestrator::DEFAULT_SYNC_INTERVAL;
use crate::IndexingError;

/// Default PostgreSQL host.
const DEFAULT_DB_HOST: &str = "localhost";

/// Default PostgreSQL port.
const DEFAULT_DB_PORT: u16 = 5432;

/// Default search index scheme, host and port.
const DEFAULT_ES_SCHEMA: &str = "http";
const DEFAULT_ES_HOST: &str = "localhost";
const DEFAULT_ES_PORT: u16 = 9200;

/// Default checkpoint file.
const DEFAULT_STATE_FILE: &str = "state.json";

/// Everything the indexer needs to know at startup.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub postgres: PostgresConfig,
    pub opensearch: OpenSearchConfig,
    pub state_file: PathBuf,
    pub interval: Duration,
    /// Rows per page when extracting; `None` reads each query in one batch.
    pub page_size: Option<u32>,
}

impl SyncConfig {
    /// Read the configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DB_HOST`: PostgreSQL host (default: localhost)
    /// - `DB_PORT`: PostgreSQL port (default: 5432)
    /// - `DB_NAME`, `DB_USER`, `DB_PASSWORD`: required
    /// - `ES_SCHEMA`: search index scheme (default: http)
    /// - `ES_HOST`: search index host (default: localhost)
    /// - `ES_PORT`: search index port (default: 9200)
    /// - `STATE_FILE`: checkpoint file (default: state.json)
    /// - `SYNC_INTERVAL_SECS`: seconds between passes (default: 5)
    /// - `EXTRACT_PAGE_SIZE`: rows per extraction page (default: unset, one batch)
    pub fn from_env() -> Result<Self, IndexingError> {
        let postgres = PostgresConfig {
            host: var_or("DB_HOST", DEFAULT_DB_HOST),
            port: parse_or("DB_PORT", DEFAULT_DB_PORT)?,
            dbname: required("DB_NAME")?,
            user: required("DB_USER")?,
            password: required("DB_PASSWORD")?,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        };

        let opensearch = OpenSearchConfig::from_parts(
            &var_or("ES_SCHEMA", DEFAULT_ES_SCHEMA),
            &var_or("ES_HOST", DEFAULT_ES_HOST),
            parse_or("ES_PORT", DEFAULT_ES_PORT)?,
        );

        let interval_secs: u64 = parse_or("SYNC_INTERVAL_SECS", DEFAULT_SYNC_INTERVAL.as_secs())?;

        let page_size = match optional("EXTRACT_PAGE_SIZE") {
            Some(raw) => match raw.parse::<u32>() {
                Ok(0) | Err(_) => {
                    return Err(IndexingError::config(format!(
                        "EXTRACT_PAGE_SIZE must be a positive integer, got '{}'",
                        raw
                    )))
                }
                Ok(size) => Some(size),
            },
            None => None,
        };

        Ok(Self {
            postgres,
            opensearch,
            state_file: PathBuf::from(var_or("STATE_FILE", DEFAULT_STATE_FILE)),
            interval: Duration::from_secs(interval_secs),
            page_size,
        })
    }
}

/// Non-empty value of `key`, if set.
fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn var_or(key: &str, default: &str) -> String {
    optional(key).unwrap_or_else(|| default.to_string())
}

fn required(key: &str) -> Result<String, IndexingError> {
    optional(key).ok_or_else(|| IndexingError::config(format!("{} must be set", key)))
}

fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T, IndexingError> {
    match optional(key) {
        Some(raw) => raw.trim().parse::<T>().map_err(|_| {
            IndexingError::config(format!("{} has an invalid value '{}'", key, raw))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: [&str; 11] = [
        "DB_HOST",
        "DB_PORT",
        "DB_NAME",
        "DB_USER",
        "DB_PASSWORD",
        "ES_SCHEMA",
        "ES_HOST",
        "ES_PORT",
        "STATE_FILE",
        "SYNC_INTERVAL_SECS",
        "EXTRACT_PAGE_SIZE",
    ];

    fn reset_env(vars: &[(&str, &str)]) {
        for key in KEYS {
            env::remove_var(key);
        }
        for (key, value) in vars {
            env::set_var(key, value);
        }
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("DB_NAME", "movies_database"),
        ("DB_USER", "app"),
        ("DB_PASSWORD", "secret"),
    ];

    #[test]
    #[serial]
    fn test_defaults() {
        reset_env(&REQUIRED);

        let config = SyncConfig::from_env().unwrap();

        assert_eq!(config.postgres.host, "localhost");
        assert_eq!(config.postgres.port, 5432);
        assert_eq!(config.postgres.dbname, "movies_database");
        assert_eq!(config.opensearch.url, "http://localhost:9200");
        assert_eq!(config.state_file, PathBuf::from("state.json"));
        assert_eq!(config.interval, Duration::from_secs(5));
        assert_eq!(config.page_size, None);
    }

    #[test]
    #[serial]
    fn test_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("DB_HOST", "db"),
            ("DB_PORT", "6432"),
            ("ES_SCHEMA", "https://"),
            ("ES_HOST", "search"),
            ("ES_PORT", "9201"),
            ("STATE_FILE", "/var/lib/indexer/state.json"),
            ("SYNC_INTERVAL_SECS", "30"),
            ("EXTRACT_PAGE_SIZE", "500"),
        ]);
        reset_env(&vars);

        let config = SyncConfig::from_env().unwrap();

        assert_eq!(config.postgres.host, "db");
        assert_eq!(config.postgres.port, 6432);
        assert_eq!(config.opensearch.url, "https://search:9201");
        assert_eq!(
            config.state_file,
            PathBuf::from("/var/lib/indexer/state.json")
        );
        assert_eq!(config.interval, Duration::from_secs(30));
        assert_eq!(config.page_size, Some(500));
    }

    #[test]
    #[serial]
    fn test_missing_required_value() {
        reset_env(&[("DB_NAME", "movies_database"), ("DB_USER", "app")]);

        let err = SyncConfig::from_env().unwrap_err();

        assert!(err.to_string().contains("DB_PASSWORD"));
    }

    #[test]
    #[serial]
    fn test_invalid_numbers() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("DB_PORT", "postgres"));
        reset_env(&vars);
        assert!(SyncConfig::from_env().is_err());

        let mut vars = REQUIRED.to_vec();
        vars.push(("EXTRACT_PAGE_SIZE", "0"));
        reset_env(&vars);
        assert!(SyncConfig::from_env().is_err());

        let mut vars = REQUIRED.to_vec();
        vars.push(("SYNC_INTERVAL_SECS", "-1"));
        reset_env(&vars);
        assert!(SyncConfig::from_env().is_err());
    }
}
