//! Runtime configuration read from `TICKETDESK_*` environment variables.
//!
//! CLI flags take precedence; see `main.rs`.

use std::path::PathBuf;

use anyhow::Result;

use crate::api::SecurityConfig;
use crate::db::Database;

pub const DEFAULT_RATE_LIMIT: u32 = 100;

#[derive(Clone, Debug)]
pub struct Config {
    /// Database file (`TICKETDESK_DB`). Falls back to the platform data directory.
    pub database_path: Option<PathBuf>,
    /// Bearer token required on ticket routes (`TICKETDESK_API_KEY`).
    pub api_key: Option<String>,
    /// Allowed CORS origins (`TICKETDESK_CORS_ORIGINS`, comma-separated).
    pub cors_origins: Option<Vec<String>>,
    /// Requests per minute per client IP (`TICKETDESK_RATE_LIMIT`).
    /// Only enforced when an API key is configured.
    pub rate_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            api_key: None,
            cors_origins: None,
            rate_limit: DEFAULT_RATE_LIMIT,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let rate_limit = match non_empty("TICKETDESK_RATE_LIMIT") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(
                    "Ignoring invalid TICKETDESK_RATE_LIMIT {:?}, using {}",
                    raw,
                    DEFAULT_RATE_LIMIT
                );
                DEFAULT_RATE_LIMIT
            }),
            None => DEFAULT_RATE_LIMIT,
        };

        Self {
            database_path: non_empty("TICKETDESK_DB").map(PathBuf::from),
            api_key: non_empty("TICKETDESK_API_KEY"),
            cors_origins: non_empty("TICKETDESK_CORS_ORIGINS").map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            }),
            rate_limit,
        }
    }

    /// Opens and migrates the configured database.
    pub fn open_database(&self) -> Result<Database> {
        let db = match &self.database_path {
            Some(path) => Database::open(path.clone())?,
            None => Database::open_default()?,
        };
        db.migrate()?;
        Ok(db)
    }

    pub fn security(&self) -> SecurityConfig {
        let mut security = SecurityConfig::disabled();
        if let Some(key) = &self.api_key {
            security = SecurityConfig::with_api_key(key.clone()).rate_limited(self.rate_limit);
        }
        security.cors_origins = self.cors_origins.clone();
        security
    }
}
