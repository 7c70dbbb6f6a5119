//! Process configuration read from the environment.
//!
//! | variable | default |
//! |---|---|
//! | `FORECOURT_BIND` | `0.0.0.0:3000` |
//! | `FORECOURT_STORE_TIMEOUT_MS` | `2000` |
//! | `FORECOURT_SEED_PATH` | unset (empty inventory) |
//! | `FORECOURT_REDIS_URL` | unset (in-memory counters) |
//! | `FORECOURT_RATE_LIMIT_FAIL_CLOSED` | `false` |
//! | `FORECOURT_GENERAL_FORMS` | `finance,part-exchange,test-drive,valuation` |

use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::inventory::DEFAULT_STORE_TIMEOUT;
use crate::rate_limit::{FailurePolicy, DEFAULT_GENERAL_FORMS};

pub const BIND: &str = "FORECOURT_BIND";
pub const STORE_TIMEOUT_MS: &str = "FORECOURT_STORE_TIMEOUT_MS";
pub const SEED_PATH: &str = "FORECOURT_SEED_PATH";
pub const REDIS_URL: &str = "FORECOURT_REDIS_URL";
pub const RATE_LIMIT_FAIL_CLOSED: &str = "FORECOURT_RATE_LIMIT_FAIL_CLOSED";
pub const GENERAL_FORMS: &str = "FORECOURT_GENERAL_FORMS";

const DEFAULT_BIND: &str = "0.0.0.0:3000";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {key}={value:?}: {reason}")]
    Invalid { key: &'static str, value: String, reason: String },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("{0} must name at least one form")]
    NoForms(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub store_timeout: Duration,
    pub seed_path: Option<PathBuf>,
    pub redis_url: Option<String>,
    pub rate_limit_failure: FailurePolicy,
    /// Names accepted on `/forms/{form}`.
    pub general_forms: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 3000)),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            seed_path: None,
            redis_url: None,
            rate_limit_failure: FailurePolicy::FailOpen,
            general_forms: DEFAULT_GENERAL_FORMS.iter().map(|name| name.to_string()).collect(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind: SocketAddr = parse(BIND, lookup(BIND), DEFAULT_BIND)?;

        let timeout_ms: u64 =
            parse(STORE_TIMEOUT_MS, lookup(STORE_TIMEOUT_MS), &millis(DEFAULT_STORE_TIMEOUT))?;
        if timeout_ms == 0 {
            return Err(ConfigError::Zero(STORE_TIMEOUT_MS));
        }

        let fail_closed: bool = parse(RATE_LIMIT_FAIL_CLOSED, lookup(RATE_LIMIT_FAIL_CLOSED), "false")?;
        let rate_limit_failure =
            if fail_closed { FailurePolicy::FailClosed } else { FailurePolicy::FailOpen };

        let general_forms = match non_empty(lookup(GENERAL_FORMS)) {
            Some(list) => {
                let names = form_list(&list);
                if names.is_empty() {
                    return Err(ConfigError::NoForms(GENERAL_FORMS));
                }
                names
            }
            None => Self::default().general_forms,
        };

        let config = Self {
            bind,
            store_timeout: Duration::from_millis(timeout_ms),
            seed_path: non_empty(lookup(SEED_PATH)).map(PathBuf::from),
            redis_url: non_empty(lookup(REDIS_URL)),
            rate_limit_failure,
            general_forms,
        };
        if config.redis_url.is_none() {
            warn!(target: "forecourt::config", "{REDIS_URL} not set, rate limit counters are per-process");
        }
        Ok(config)
    }
}

fn millis(d: Duration) -> String {
    d.as_millis().to_string()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Comma separated names, trimmed, blanks and duplicates dropped, order kept.
fn form_list(list: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        if !names.iter().any(|seen| seen == name) {
            names.push(name.to_string());
        }
    }
    names
}

fn parse<T>(key: &'static str, value: Option<String>, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let value = non_empty(value).unwrap_or_else(|| {
        info!(target: "forecourt::config", "{key} not set, using default: {default}");
        default.to_string()
    });
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}
