use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use chrono::TimeDelta;

use crate::error::{AppError, Result};
use crate::services::StoreSettings;
use crate::upstream::UpstreamConfig;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub upstream: UpstreamConfig,
    pub store: StoreSettings,
    pub purge_interval: Duration,
    pub api_tokens: Vec<String>,
    pub admin_tokens: Vec<String>,
    pub bind_addr: SocketAddr,
}

impl AppConfig {
    pub fn new_from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `new_from_env` passes the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base_url = lookup("VPLAN_BASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| AppError::config("VPLAN_BASE_URL is not set"))?;

        let upstream = UpstreamConfig {
            base_url,
            username: lookup("VPLAN_USERNAME").unwrap_or_default(),
            password: lookup("VPLAN_PASSWORD").unwrap_or_default(),
            feed_prefix: lookup("VPLAN_FEED_PREFIX").unwrap_or_else(|| "PlanKl".to_string()),
            timeout: Duration::from_secs(seconds(&lookup, "REQUEST_TIMEOUT_SECS", 10)?),
        };

        let store = StoreSettings {
            freshness: delta(seconds(&lookup, "DATA_EXPIRATION_SECS", 600)?, "DATA_EXPIRATION_SECS")?,
            retention: delta(seconds(&lookup, "CACHE_EXPIRATION_SECS", 3600)?, "CACHE_EXPIRATION_SECS")?,
            negative_ttl: delta(seconds(&lookup, "NEGATIVE_CACHE_SECS", 0)?, "NEGATIVE_CACHE_SECS")?,
        };

        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|e| AppError::config(format!("BIND_ADDR is not a socket address: {}", e)))?;

        Ok(Self {
            upstream,
            store,
            purge_interval: Duration::from_secs(seconds(&lookup, "CACHE_PURGE_INTERVAL_SECS", 7200)?),
            api_tokens: token_list(lookup("API_TOKENS")),
            admin_tokens: token_list(lookup("ADMIN_TOKENS")),
            bind_addr,
        })
    }
}

fn seconds(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<u64> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| AppError::config(format!("{} must be a number of seconds, got {:?}", key, value))),
        None => Ok(default),
    }
}

fn delta(secs: u64, key: &str) -> Result<TimeDelta> {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .ok_or_else(|| AppError::config(format!("{} is out of range", key)))
}

fn token_list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}
