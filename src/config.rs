use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::api::DEFAULT_BASE_URL;
use crate::error::ConfigError;
use crate::stream::ReconnectPolicy;

pub mod keys {
    pub const BASE_URL: &str = "ADWATCH_BASE_URL";
    pub const REQUEST_TIMEOUT_MS: &str = "ADWATCH_REQUEST_TIMEOUT_MS";
    pub const RECONNECT_ENABLED: &str = "ADWATCH_RECONNECT_ENABLED";
    pub const RECONNECT_INITIAL_MS: &str = "ADWATCH_RECONNECT_INITIAL_MS";
    pub const RECONNECT_MAX_MS: &str = "ADWATCH_RECONNECT_MAX_MS";
    pub const RECONNECT_MAX_ATTEMPTS: &str = "ADWATCH_RECONNECT_MAX_ATTEMPTS";
    pub const CAMPAIGN_ID: &str = "ADWATCH_CAMPAIGN_ID";
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    pub base_url: String,
    /// Applies to snapshot requests and to opening the stream.
    pub request_timeout: Duration,
    pub reconnect: ReconnectPolicy,
    /// Campaign whose live insights `run()` follows.
    pub campaign_id: Option<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            reconnect: ReconnectPolicy::default(),
            campaign_id: None,
        }
    }
}

impl DashboardConfig {
    /// Read from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read a `.env`-style file without touching the process environment.
    /// Keys missing from the file fall back to the environment.
    pub fn from_env_file(path: &Path) -> Result<Self, ConfigError> {
        let mut vars = HashMap::new();
        for item in dotenvy::from_path_iter(path)? {
            let (key, value) = item?;
            vars.insert(key, value);
        }
        Self::from_lookup(|key| vars.get(key).cloned().or_else(|| std::env::var(key).ok()))
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let reconnect = ReconnectPolicy {
            enabled: match get(keys::RECONNECT_ENABLED) {
                Some(v) => parse_bool(keys::RECONNECT_ENABLED, &v)?,
                None => defaults.reconnect.enabled,
            },
            initial_delay: match get(keys::RECONNECT_INITIAL_MS) {
                Some(v) => parse_millis(keys::RECONNECT_INITIAL_MS, &v)?,
                None => defaults.reconnect.initial_delay,
            },
            max_delay: match get(keys::RECONNECT_MAX_MS) {
                Some(v) => parse_millis(keys::RECONNECT_MAX_MS, &v)?,
                None => defaults.reconnect.max_delay,
            },
            max_attempts: match get(keys::RECONNECT_MAX_ATTEMPTS) {
                Some(v) => parse_number(keys::RECONNECT_MAX_ATTEMPTS, &v)?,
                None => defaults.reconnect.max_attempts,
            },
        };
        if reconnect.max_delay < reconnect.initial_delay {
            return Err(ConfigError::Invalid {
                key: keys::RECONNECT_MAX_MS.to_string(),
                value: reconnect.max_delay.as_millis().to_string(),
            });
        }

        let base_url = match get(keys::BASE_URL) {
            Some(v) => {
                let v = v.trim().to_string();
                if !(v.starts_with("http://") || v.starts_with("https://")) {
                    return Err(ConfigError::Invalid {
                        key: keys::BASE_URL.to_string(),
                        value: v,
                    });
                }
                v
            }
            None => defaults.base_url,
        };

        Ok(Self {
            base_url,
            request_timeout: match get(keys::REQUEST_TIMEOUT_MS) {
                Some(v) => parse_millis(keys::REQUEST_TIMEOUT_MS, &v)?,
                None => defaults.request_timeout,
            },
            reconnect,
            campaign_id: get(keys::CAMPAIGN_ID).map(|v| v.trim().to_string()),
        })
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_number(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

fn parse_millis(key: &str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| invalid(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}
