//! Sync engine configuration.
//!
//! `SyncSettings` tunes the scheduler, `RemoteConfig` picks the transport to
//! the canonical store. Both are built from an environment-style lookup so
//! tests can pass a map instead of touching the process environment.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::DEFAULT_MAX_RETRIES;
use crate::util::{is_http_url, normalize_text_option};

pub const SYNC_INTERVAL_ENV: &str = "IRODORI_SYNC_INTERVAL_SECS";
pub const SYNC_TIMEOUT_ENV: &str = "IRODORI_SYNC_TIMEOUT_SECS";
pub const SYNC_MAX_RETRIES_ENV: &str = "IRODORI_SYNC_MAX_RETRIES";
pub const TOMBSTONE_POLICY_ENV: &str = "IRODORI_TOMBSTONE_POLICY";
pub const REMOTE_URL_ENV: &str = "IRODORI_REMOTE_URL";
pub const REMOTE_TOKEN_ENV: &str = "IRODORI_REMOTE_TOKEN";

const DEFAULT_INTERVAL_SECS: u64 = 30;
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    Missing(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// What a pulled remote row does to a local tombstone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TombstonePolicy {
    /// A remote row that still exists clears the tombstone
    #[default]
    Revive,
    /// A tombstone at least as new as the remote row survives and its delete
    /// is queued again
    KeepNewer,
}

impl TombstonePolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Revive => "revive",
            Self::KeepNewer => "keep_newer",
        }
    }
}

impl FromStr for TombstonePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "revive" => Ok(Self::Revive),
            "keep_newer" => Ok(Self::KeepNewer),
            other => Err(ConfigError::Invalid(format!(
                "{TOMBSTONE_POLICY_ENV} must be 'revive' or 'keep_newer', got '{other}'"
            ))),
        }
    }
}

/// Scheduler tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Time between periodic cycles
    pub interval: Duration,
    /// Bound on each individual remote call
    pub call_timeout: Duration,
    /// Retry ceiling; entries at this count are dormant
    pub max_retries: u32,
    pub tombstone_policy: TombstonePolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            call_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            tombstone_policy: TombstonePolicy::default(),
        }
    }
}

impl SyncSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut settings = Self::default();

        if let Some(secs) = parse_secs(&lookup, SYNC_INTERVAL_ENV, 1, 86_400)? {
            settings.interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_secs(&lookup, SYNC_TIMEOUT_ENV, 1, 600)? {
            settings.call_timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = optional_trimmed(&lookup, SYNC_MAX_RETRIES_ENV) {
            settings.max_retries = raw
                .parse::<u32>()
                .ok()
                .filter(|value| (1..=100).contains(value))
                .ok_or_else(|| {
                    ConfigError::Invalid(format!(
                        "{SYNC_MAX_RETRIES_ENV} must be an integer between 1 and 100"
                    ))
                })?;
        }
        if let Some(raw) = optional_trimmed(&lookup, TOMBSTONE_POLICY_ENV) {
            settings.tombstone_policy = raw.parse()?;
        }

        Ok(settings)
    }
}

/// Transport to the canonical store
#[derive(Clone, PartialEq, Eq)]
pub enum RemoteConfig {
    /// Direct SQL connection to a hosted libSQL database
    Sql { url: String, auth_token: String },
    /// The REST façade
    Rest { base_url: String },
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sql { url, .. } => formatter
                .debug_struct("Sql")
                .field("url", url)
                .field("auth_token", &"[REDACTED]")
                .finish(),
            Self::Rest { base_url } => formatter
                .debug_struct("Rest")
                .field("base_url", base_url)
                .finish(),
        }
    }
}

impl RemoteConfig {
    /// Pick a transport from the endpoint's scheme
    pub fn from_url(url: &str, auth_token: Option<String>) -> Result<Self, ConfigError> {
        let url = url.trim();
        if is_http_url(url) {
            return Ok(Self::Rest {
                base_url: url.trim_end_matches('/').to_string(),
            });
        }
        if url.starts_with("libsql://") || url.starts_with("wss://") {
            let auth_token = normalize_text_option(auth_token)
                .ok_or(ConfigError::Missing(REMOTE_TOKEN_ENV))?;
            return Ok(Self::Sql {
                url: url.to_string(),
                auth_token,
            });
        }
        Err(ConfigError::Invalid(format!(
            "remote URL must start with http://, https://, libsql:// or wss://, got '{url}'"
        )))
    }

    /// Resolve the remote from the URL stored in the local settings table,
    /// falling back to `IRODORI_REMOTE_URL`. `Ok(None)` means sync is not
    /// configured.
    pub fn resolve(
        stored_url: Option<String>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<Self>, ConfigError> {
        let Some(url) = normalize_text_option(stored_url)
            .or_else(|| optional_trimmed(&lookup, REMOTE_URL_ENV))
        else {
            return Ok(None);
        };
        Self::from_url(&url, optional_trimmed(&lookup, REMOTE_TOKEN_ENV)).map(Some)
    }

    /// Endpoint URL, safe to print
    pub fn url(&self) -> &str {
        match self {
            Self::Sql { url, .. } => url,
            Self::Rest { base_url } => base_url,
        }
    }

    pub const fn transport_name(&self) -> &'static str {
        match self {
            Self::Sql { .. } => "sql",
            Self::Rest { .. } => "rest",
        }
    }
}

fn parse_secs(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
    min: u64,
    max: u64,
) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = optional_trimmed(lookup, name) else {
        return Ok(None);
    };
    raw.parse::<u64>()
        .ok()
        .filter(|secs| (min..=max).contains(secs))
        .map(Some)
        .ok_or_else(|| {
            ConfigError::Invalid(format!("{name} must be an integer between {min} and {max}"))
        })
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    normalize_text_option(lookup(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn settings_default_when_unset() {
        let settings = SyncSettings::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(settings, SyncSettings::default());
        assert_eq!(settings.interval, Duration::from_secs(30));
        assert_eq!(settings.max_retries, 5);
    }

    #[test]
    fn settings_read_overrides() {
        let settings = SyncSettings::from_lookup(lookup_from(&[
            (SYNC_INTERVAL_ENV, "5"),
            (SYNC_TIMEOUT_ENV, " 2 "),
            (SYNC_MAX_RETRIES_ENV, "3"),
            (TOMBSTONE_POLICY_ENV, "keep-newer"),
        ]))
        .unwrap();
        assert_eq!(settings.interval, Duration::from_secs(5));
        assert_eq!(settings.call_timeout, Duration::from_secs(2));
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.tombstone_policy, TombstonePolicy::KeepNewer);
    }

    #[test]
    fn settings_reject_out_of_range_values() {
        assert!(SyncSettings::from_lookup(lookup_from(&[(SYNC_INTERVAL_ENV, "0")])).is_err());
        assert!(SyncSettings::from_lookup(lookup_from(&[(SYNC_TIMEOUT_ENV, "abc")])).is_err());
        assert!(SyncSettings::from_lookup(lookup_from(&[(SYNC_MAX_RETRIES_ENV, "0")])).is_err());
        assert!(SyncSettings::from_lookup(lookup_from(&[(TOMBSTONE_POLICY_ENV, "purge")])).is_err());
    }

    #[test]
    fn remote_config_picks_transport_by_scheme() {
        assert_eq!(
            RemoteConfig::from_url("https://sync.example.com/", None).unwrap(),
            RemoteConfig::Rest {
                base_url: "https://sync.example.com".to_string()
            }
        );
        assert_eq!(
            RemoteConfig::from_url("libsql://db.turso.io", Some("tok".to_string())).unwrap(),
            RemoteConfig::Sql {
                url: "libsql://db.turso.io".to_string(),
                auth_token: "tok".to_string()
            }
        );
        assert_eq!(
            RemoteConfig::from_url("libsql://db.turso.io", None).unwrap_err(),
            ConfigError::Missing(REMOTE_TOKEN_ENV)
        );
        assert!(RemoteConfig::from_url("ftp://nope", None).is_err());
    }

    #[test]
    fn stored_url_wins_over_environment() {
        let lookup = lookup_from(&[(REMOTE_URL_ENV, "http://env.example")]);
        let remote = RemoteConfig::resolve(Some("http://stored.example".to_string()), &lookup)
            .unwrap()
            .unwrap();
        assert_eq!(remote.url(), "http://stored.example");

        let remote = RemoteConfig::resolve(None, &lookup).unwrap().unwrap();
        assert_eq!(remote.url(), "http://env.example");

        assert_eq!(RemoteConfig::resolve(None, lookup_from(&[])).unwrap(), None);
    }

    #[test]
    fn remote_config_redacts_token() {
        let remote = RemoteConfig::from_url("wss://db.example", Some("secret-token".to_string())).unwrap();
        let debug = format!("{remote:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("secret-token"));
    }
}
