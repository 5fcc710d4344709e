//! Client configuration.
//!
//! Loaded from `LINGOFLOW_*` environment variables; a `.env` file is honoured
//! outside of tests. Every value has a default matching the backend contract.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Tunables for the job poller and the debounced translator.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: String,
    /// Hard abort for the upload call.
    pub upload_timeout: Duration,
    /// Per-request timeout for status/result/text calls.
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    /// How long `Completed` stays visible before resetting to `Idle`.
    pub reset_delay: Duration,
    /// Quiet window for the debounced translator.
    pub debounce: Duration,
    pub cache_capacity: usize,
    pub max_upload_bytes: u64,
    pub session_db: PathBuf,
    pub download_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            upload_timeout: Duration::from_secs(180),
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(2000),
            max_poll_attempts: 30,
            reset_delay: Duration::from_millis(2000),
            debounce: Duration::from_millis(500),
            cache_capacity: 50,
            max_upload_bytes: 30 * 1024 * 1024,
            session_db: PathBuf::from("lingoflow-session.db"),
            download_dir: PathBuf::from("."),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let base_url = lookup("LINGOFLOW_BASE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or(defaults.base_url);
        if base_url.is_empty() {
            return Err(ConfigError::InvalidValue(
                "LINGOFLOW_BASE_URL".to_string(),
                "must not be empty".to_string(),
            ));
        }

        let secs = |key: &str, default: Duration| -> Result<Duration, ConfigError> {
            parse_num::<u64>(&lookup, key).map(|v| v.map(Duration::from_secs).unwrap_or(default))
        };
        let millis = |key: &str, default: Duration| -> Result<Duration, ConfigError> {
            parse_num::<u64>(&lookup, key)
                .map(|v| v.map(Duration::from_millis).unwrap_or(default))
        };

        let max_poll_attempts = parse_num::<u32>(&lookup, "LINGOFLOW_MAX_POLL_ATTEMPTS")?
            .unwrap_or(defaults.max_poll_attempts);
        if max_poll_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "LINGOFLOW_MAX_POLL_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let cache_capacity = parse_num::<usize>(&lookup, "LINGOFLOW_CACHE_CAPACITY")?
            .unwrap_or(defaults.cache_capacity);
        if cache_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "LINGOFLOW_CACHE_CAPACITY".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            base_url,
            upload_timeout: secs("LINGOFLOW_UPLOAD_TIMEOUT_SECS", defaults.upload_timeout)?,
            request_timeout: secs("LINGOFLOW_REQUEST_TIMEOUT_SECS", defaults.request_timeout)?,
            poll_interval: millis("LINGOFLOW_POLL_INTERVAL_MS", defaults.poll_interval)?,
            max_poll_attempts,
            reset_delay: millis("LINGOFLOW_RESET_DELAY_MS", defaults.reset_delay)?,
            debounce: millis("LINGOFLOW_DEBOUNCE_MS", defaults.debounce)?,
            cache_capacity,
            max_upload_bytes: parse_num::<u64>(&lookup, "LINGOFLOW_MAX_UPLOAD_BYTES")?
                .unwrap_or(defaults.max_upload_bytes),
            session_db: lookup("LINGOFLOW_SESSION_DB")
                .map(PathBuf::from)
                .unwrap_or(defaults.session_db),
            download_dir: lookup("LINGOFLOW_DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.download_dir),
        })
    }
}

fn parse_num<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
    }
}
