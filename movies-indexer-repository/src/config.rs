//! Connection settings for the external systems.

use std::fmt;
use std::time::Duration;

use sqlx::postgres::PgConnectOptions;

/// Default connect timeout for both the database and the search index.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for the PostgreSQL source.
#[derive(Clone)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    /// Upper bound for establishing a single connection.
    pub connect_timeout: Duration,
}

impl PostgresConfig {
    /// Build sqlx connect options from these settings.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.dbname)
            .username(&self.user)
            .password(&self.password)
            .application_name("movies-indexer")
    }
}

// Hand-written so the password never ends up in logs.
impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"***")
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Connection settings for the OpenSearch/Elasticsearch target.
#[derive(Debug, Clone)]
pub struct OpenSearchConfig {
    /// Base URL, e.g. `http://localhost:9200`.
    pub url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl OpenSearchConfig {
    /// Build the base URL from scheme, host and port.
    ///
    /// The scheme may be given with or without the `://` suffix.
    pub fn from_parts(scheme: &str, host: &str, port: u16) -> Self {
        let scheme = scheme.trim_end_matches("://");
        Self {
            url: format!("{}://{}:{}", scheme, host, port),
            timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}
