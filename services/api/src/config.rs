//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use connection_hub_core::AdminStatusConfig;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// `None` runs against the in-memory store.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub allowed_origin: String,
    pub functions_url: Option<String>,
    pub functions_key: Option<String>,
    pub admin: AdminStatusConfig,
    pub session_ttl: chrono::Duration,
    /// Account (email, password) created at startup when running in memory.
    pub seed_admin: Option<(String, String)>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server and Database Settings ---
        let bind_address: SocketAddr = parse_or(&lookup, "BIND_ADDRESS", "0.0.0.0:3000")?;
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let allowed_origin =
            lookup("ALLOWED_ORIGIN").unwrap_or_else(|| "http://localhost:5173".to_string());

        // --- Hosted functions (optional) ---
        let functions_url =
            lookup("FUNCTIONS_URL").map(|url| url.trim_end_matches('/').to_string());
        let functions_key = lookup("FUNCTIONS_KEY");

        // --- Admin status resolution ---
        let defaults = AdminStatusConfig::default();
        let admin = AdminStatusConfig {
            cache_ttl: Duration::from_secs(parse_or(
                &lookup,
                "ADMIN_CACHE_TTL_SECS",
                &defaults.cache_ttl.as_secs().to_string(),
            )?),
            lookup_timeout: Duration::from_secs(parse_or(
                &lookup,
                "ADMIN_LOOKUP_TIMEOUT_SECS",
                &defaults.lookup_timeout.as_secs().to_string(),
            )?),
            debounce: Duration::from_millis(parse_or(
                &lookup,
                "AUTH_DEBOUNCE_MS",
                &defaults.debounce.as_millis().to_string(),
            )?),
        };

        let session_ttl_days: i64 = parse_or(&lookup, "SESSION_TTL_DAYS", "30")?;
        if session_ttl_days <= 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_TTL_DAYS".to_string(),
                "must be positive".to_string(),
            ));
        }

        let seed_admin = match (lookup("SEED_ADMIN_EMAIL"), lookup("SEED_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some((email.trim().to_string(), password)),
            (None, None) => None,
            _ => {
                return Err(ConfigError::InvalidValue(
                    "SEED_ADMIN_EMAIL".to_string(),
                    "SEED_ADMIN_EMAIL and SEED_ADMIN_PASSWORD must be set together".to_string(),
                ))
            }
        };

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            allowed_origin,
            functions_url,
            functions_key,
            admin,
            session_ttl: chrono::Duration::days(session_ttl_days),
            seed_admin,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}
