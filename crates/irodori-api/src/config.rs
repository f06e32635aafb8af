use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

pub const BIND_ADDR_ENV: &str = "IRODORI_API_BIND_ADDR";
pub const DB_PATH_ENV: &str = "IRODORI_API_DB_PATH";

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3456";
const DEFAULT_DB_PATH: &str = "./data/irodori-canonical.db";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// SQLite file holding the canonical rows
    pub db_path: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_bind_addr = value_or_default(&lookup, BIND_ADDR_ENV, DEFAULT_BIND_ADDR);
        let bind_addr = raw_bind_addr.parse::<SocketAddr>().map_err(|_| {
            ConfigError::Invalid(format!(
                "{BIND_ADDR_ENV} must be a socket address such as {DEFAULT_BIND_ADDR}, got '{raw_bind_addr}'"
            ))
        })?;
        let db_path = PathBuf::from(value_or_default(&lookup, DB_PATH_ENV, DEFAULT_DB_PATH));

        Ok(Self { bind_addr, db_path })
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn config_defaults_when_unset() {
        let map: HashMap<&str, &str> = HashMap::new();
        let config =
            AppConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string())).unwrap();
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:3456");
        assert_eq!(config.db_path, PathBuf::from("./data/irodori-canonical.db"));
    }

    #[test]
    fn config_rejects_malformed_bind_addr() {
        let mut map = HashMap::new();
        map.insert(BIND_ADDR_ENV, "localhost");
        let err = AppConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(BIND_ADDR_ENV));
    }

    #[test]
    fn config_reads_overrides() {
        let mut map = HashMap::new();
        map.insert(BIND_ADDR_ENV, " 0.0.0.0:8080 ");
        map.insert(DB_PATH_ENV, "/srv/irodori.db");
        let config =
            AppConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string())).unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.db_path, PathBuf::from("/srv/irodori.db"));
    }
}
