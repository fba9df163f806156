use std::env;
use std::time::Duration;

/// Database configuration.
///
/// Reads `NUTRICOACH_DATABASE_URL` (falling back to
/// `postgresql://localhost:5432/nutricoach`) and the optional pool sizing
/// variables `NUTRICOACH_DB_MAX_CONNECTIONS` / `NUTRICOACH_DB_ACQUIRE_TIMEOUT_SECS`.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Full PostgreSQL connection URL.
    pub database_url: String,
    /// Upper bound on pooled connections.
    pub max_connections: u32,
    /// How long to wait for a free connection before failing.
    pub acquire_timeout: Duration,
}

impl DbConfig {
    /// The default connection URL used when no environment variable is set.
    pub const DEFAULT_URL: &str = "postgresql://localhost:5432/nutricoach";

    const DEFAULT_MAX_CONNECTIONS: u32 = 5;
    const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

    /// Build a config from the environment.
    pub fn from_env() -> Self {
        let database_url = env::var("NUTRICOACH_DATABASE_URL")
            .unwrap_or_else(|_| Self::DEFAULT_URL.to_owned());
        let mut cfg = Self::new(database_url);
        if let Some(n) = env_parse::<u32>("NUTRICOACH_DB_MAX_CONNECTIONS") {
            cfg.max_connections = n.max(1);
        }
        if let Some(secs) = env_parse::<u64>("NUTRICOACH_DB_ACQUIRE_TIMEOUT_SECS") {
            cfg.acquire_timeout = Duration::from_secs(secs);
        }
        cfg
    }

    /// Build a config from an explicit URL with default pool sizing.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: Self::DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: Duration::from_secs(Self::DEFAULT_ACQUIRE_TIMEOUT_SECS),
        }
    }

    /// The database name: the last path segment of the URL, without any
    /// query string.
    pub fn database_name(&self) -> Option<&str> {
        self.database_url
            .rsplit('/')
            .next()
            .map(|s| s.split('?').next().unwrap_or(s))
            .filter(|s| !s.is_empty() && !s.contains(':') && !s.contains('@'))
    }

    /// URL of the `postgres` maintenance database on the same server, used
    /// to issue `CREATE DATABASE`.
    pub fn maintenance_url(&self) -> String {
        match self.database_url.rfind('/') {
            Some(pos) if self.database_name().is_some() => {
                format!("{}/postgres", &self.database_url[..pos])
            }
            _ => self.database_url.clone(),
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
