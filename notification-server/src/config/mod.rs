//! Environment configuration.
//!
//! `.env` files are honoured through `dotenvy` in `main`. Parsing goes through
//! a lookup function so it can be exercised without touching the process
//! environment.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Result};

const DEFAULT_BROKERS: &str = "localhost:9092";
const DEFAULT_CONSUMER_GROUP: &str = "notification-server";
const DEFAULT_TOPIC: &str = "notifications";
const DEFAULT_DATABASE_URL: &str = "sqlite:notifications.db?mode=rwc";
const DEFAULT_CACHE_TTL_SECS: u64 = 25;
const DEFAULT_API_BIND_ADDRESS: &str = "0.0.0.0";
const DEFAULT_API_PORT: u16 = 8080;
const DEFAULT_HEALTH_CHECK_INTERVAL_SECS: u64 = 5;

/// What to do with records that fail ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicyKind {
    #[default]
    Drop,
    DeadLetter,
}

impl FromStr for FailurePolicyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "dead-letter" | "dead_letter" | "deadletter" => Ok(Self::DeadLetter),
            other => Err(Error::config(format!(
                "FAILURE_POLICY must be 'drop' or 'dead-letter', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for FailurePolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drop => write!(f, "drop"),
            Self::DeadLetter => write!(f, "dead-letter"),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Development mode: console logs and local defaults.
    pub development: bool,
    /// Explicit log filter directive, if any.
    pub log_filter: Option<String>,
    pub brokers: Vec<String>,
    pub consumer_group: String,
    pub topic: String,
    pub database_url: String,
    pub use_cache: bool,
    pub cache_ttl: Duration,
    pub failure_policy: FailurePolicyKind,
    pub api_bind_address: String,
    pub api_port: u16,
    pub health_check_interval: Duration,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`.
    ///
    /// In production (`APP_DEVELOPMENT=false`) the broker list, consumer
    /// group, topic and database URL must be set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let development = match get("APP_DEVELOPMENT") {
            Some(v) => parse_bool("APP_DEVELOPMENT", &v)?,
            None => true,
        };

        let required = |key: &str, default: &str| -> Result<String> {
            match get(key) {
                Some(v) => Ok(v),
                None if development => Ok(default.to_string()),
                None => Err(Error::config(format!("{key} must be set in production"))),
            }
        };

        let brokers: Vec<String> = required("REDPANDA_BROKERS", DEFAULT_BROKERS)?
            .split(',')
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(String::from)
            .collect();
        if brokers.is_empty() {
            return Err(Error::config("REDPANDA_BROKERS must list at least one broker"));
        }

        let use_cache = match get("USE_CACHE") {
            Some(v) => parse_bool("USE_CACHE", &v)?,
            None => true,
        };

        let failure_policy = match get("FAILURE_POLICY") {
            Some(v) => v.parse()?,
            None => FailurePolicyKind::default(),
        };

        Ok(Self {
            development,
            log_filter: get("LOG_FILTER").or_else(|| get("RUST_LOG")),
            brokers,
            consumer_group: required("KAFKA_CONSUMER_GROUP", DEFAULT_CONSUMER_GROUP)?,
            topic: required("NOTIFICATION_TOPIC", DEFAULT_TOPIC)?,
            database_url: required("DATABASE_URL", DEFAULT_DATABASE_URL)?,
            use_cache,
            cache_ttl: Duration::from_secs(parse_or(
                "DEFAULT_CACHE_TTL_SECS",
                get("DEFAULT_CACHE_TTL_SECS"),
                DEFAULT_CACHE_TTL_SECS,
            )?),
            failure_policy,
            api_bind_address: get("API_BIND_ADDRESS")
                .unwrap_or_else(|| DEFAULT_API_BIND_ADDRESS.to_string()),
            api_port: parse_or("API_PORT", get("API_PORT"), DEFAULT_API_PORT)?,
            health_check_interval: Duration::from_secs(
                parse_or(
                    "HEALTH_CHECK_INTERVAL_SECS",
                    get("HEALTH_CHECK_INTERVAL_SECS"),
                    DEFAULT_HEALTH_CHECK_INTERVAL_SECS,
                )?
                .max(1),
            ),
        })
    }

    /// `host:port` the API listens on.
    pub fn api_address(&self) -> String {
        format!("{}:{}", self.api_bind_address, self.api_port)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::config(format!("{key} must be a boolean, got '{value}'"))),
    }
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T> {
    match value {
        Some(v) => v
            .parse()
            .map_err(|_| Error::config(format!("{key} has an invalid value '{v}'"))),
        None => Ok(default),
    }
}
