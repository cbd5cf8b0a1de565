//! Configuration management for the server.

use std::env;
use std::time::Duration;

use crate::guard::GuardPolicy;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// PostgreSQL connection URL; the in-memory store is used without one
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// Bearer token required on import routes
    pub auth_secret: Option<String>,
    /// Pause after every mutating store call
    pub throttle: Duration,
    /// Page size used when draining store listings
    pub page_size: u32,
    pub usage_guard: GuardPolicy,
    /// Household assigned to created foods and tools that name none
    pub household: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_url: None,
            max_connections: 10,
            auth_secret: None,
            throttle: Duration::ZERO,
            page_size: 100,
            usage_guard: GuardPolicy::default(),
            household: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let var = |name: &str| var(name).filter(|value| !value.trim().is_empty());

        let host = var("HOST").unwrap_or(defaults.host);

        let port = match var("PORT") {
            Some(port) => port.trim().parse::<u16>().map_err(|_| ConfigError::InvalidPort)?,
            None => defaults.port,
        };

        let max_connections = match var("DATABASE_MAX_CONNECTIONS") {
            Some(n) => n
                .trim()
                .parse()
                .ok()
                .filter(|n: &u32| *n > 0)
                .ok_or(ConfigError::InvalidMaxConnections)?,
            None => defaults.max_connections,
        };

        let throttle = match var("THROTTLE_MS") {
            Some(ms) => Duration::from_millis(
                ms.trim().parse::<u64>().map_err(|_| ConfigError::InvalidThrottle)?,
            ),
            None => defaults.throttle,
        };

        let page_size = match var("PAGE_SIZE") {
            Some(size) => size
                .trim()
                .parse()
                .ok()
                .filter(|size: &u32| *size > 0)
                .ok_or(ConfigError::InvalidPageSize)?,
            None => defaults.page_size,
        };

        let usage_guard = match var("USAGE_GUARD") {
            Some(policy) => policy
                .parse::<GuardPolicy>()
                .map_err(ConfigError::InvalidUsageGuard)?,
            None => defaults.usage_guard,
        };

        Ok(Self {
            host,
            port,
            database_url: var("DATABASE_URL"),
            max_connections,
            auth_secret: var("AUTH_SECRET"),
            throttle,
            page_size,
            usage_guard,
            household: var("HOUSEHOLD"),
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("DATABASE_MAX_CONNECTIONS must be a positive integer")]
    InvalidMaxConnections,

    #[error("THROTTLE_MS must be a whole number of milliseconds")]
    InvalidThrottle,

    #[error("PAGE_SIZE must be a positive integer")]
    InvalidPageSize,

    #[error("Invalid USAGE_GUARD value '{0}', expected fail-open or fail-closed")]
    InvalidUsageGuard(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_without_variables() {
        let config = load(&[]).unwrap();
        assert_eq!(config.port, 3000);
        assert!(config.database_url.is_none());
        assert_eq!(config.throttle, Duration::ZERO);
        assert_eq!(config.page_size, 100);
        assert_eq!(config.usage_guard, GuardPolicy::FailOpen);
    }

    #[test]
    fn reads_every_variable() {
        let config = load(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/larder"),
            ("AUTH_SECRET", "s3cret"),
            ("THROTTLE_MS", "250"),
            ("PAGE_SIZE", "50"),
            ("USAGE_GUARD", "fail-closed"),
            ("HOUSEHOLD", "home"),
        ])
        .unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.auth_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.throttle, Duration::from_millis(250));
        assert_eq!(config.page_size, 50);
        assert_eq!(config.usage_guard, GuardPolicy::FailClosed);
        assert_eq!(config.household.as_deref(), Some("home"));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = load(&[("DATABASE_URL", ""), ("AUTH_SECRET", "  ")]).unwrap();
        assert!(config.database_url.is_none());
        assert!(config.auth_secret.is_none());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(load(&[("PORT", "http")]), Err(ConfigError::InvalidPort)));
        assert!(matches!(
            load(&[("PAGE_SIZE", "0")]),
            Err(ConfigError::InvalidPageSize)
        ));
        assert!(matches!(
            load(&[("THROTTLE_MS", "-5")]),
            Err(ConfigError::InvalidThrottle)
        ));
        assert!(matches!(
            load(&[("USAGE_GUARD", "maybe")]),
            Err(ConfigError::InvalidUsageGuard(_))
        ));
    }
}
