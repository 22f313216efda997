//! Process configuration read from environment variables.

use std::net::SocketAddr;

use thiserror::Error;

use identra_auth::AdminSeed;
use identra_infra::{BcryptHasher, PasswordHashError};
use identra_observability::{LogFormat, UnknownLogFormat};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BIND_ADDR '{value}' is not a socket address: {source}")]
    BindAddr {
        value: String,
        source: std::net::AddrParseError,
    },

    #[error("BCRYPT_COST '{0}' is not a number")]
    BcryptCostNotNumeric(String),

    #[error("BCRYPT_COST: {0}")]
    BcryptCost(#[from] PasswordHashError),

    #[error("LOG_FORMAT: {0}")]
    LogFormat(#[from] UnknownLogFormat),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub admin: AdminSeed,
    pub hasher: BcryptHasher,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_value = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_value
            .trim()
            .parse()
            .map_err(|source| ConfigError::BindAddr {
                value: bind_value.clone(),
                source,
            })?;

        let hasher = match get("BCRYPT_COST") {
            None => BcryptHasher::default(),
            Some(raw) => {
                let cost = raw
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| ConfigError::BcryptCostNotNumeric(raw.clone()))?;
                BcryptHasher::new(cost)?
            }
        };

        let log_format = match get("LOG_FORMAT") {
            None => LogFormat::default(),
            Some(raw) => raw.parse()?,
        };

        let defaults = AdminSeed::default();
        let admin = AdminSeed {
            email: get("ADMIN_EMAIL").unwrap_or(defaults.email),
            password: get("ADMIN_PASSWORD").unwrap_or(defaults.password),
            name: get("ADMIN_NAME").unwrap_or(defaults.name),
        };

        Ok(Self {
            bind_addr,
            database_url: get("DATABASE_URL"),
            admin,
            hasher,
            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR.parse().unwrap());
        assert_eq!(config.database_url, None);
        assert_eq!(config.admin, AdminSeed::default());
        assert_eq!(config.hasher, BcryptHasher::default());
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn overrides_are_read() {
        let config = config_from(&[
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("DATABASE_URL", "postgres://localhost/identra"),
            ("ADMIN_EMAIL", "root@corp.test"),
            ("BCRYPT_COST", "6"),
            ("LOG_FORMAT", "pretty"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/identra"));
        assert_eq!(config.admin.email, "root@corp.test");
        assert_eq!(config.admin.name, "Administrator");
        assert_eq!(config.hasher.cost(), 6);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn empty_database_url_means_in_memory() {
        let config = config_from(&[("DATABASE_URL", "  ")]).unwrap();
        assert_eq!(config.database_url, None);
    }

    #[test]
    fn invalid_values_are_errors() {
        assert!(matches!(
            config_from(&[("BIND_ADDR", "nowhere")]),
            Err(ConfigError::BindAddr { .. })
        ));
        assert!(matches!(
            config_from(&[("BCRYPT_COST", "high")]),
            Err(ConfigError::BcryptCostNotNumeric(_))
        ));
        assert!(matches!(
            config_from(&[("BCRYPT_COST", "40")]),
            Err(ConfigError::BcryptCost(PasswordHashError::InvalidCost(40)))
        ));
        assert!(matches!(
            config_from(&[("LOG_FORMAT", "xml")]),
            Err(ConfigError::LogFormat(_))
        ));
    }
}
