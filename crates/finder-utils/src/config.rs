//! Configuration management utilities
//!
//! [`Config`] is the process-wide configuration: it is read from the
//! environment once in `main`, validated, and then handed to the runtime
//! builder. Components never read the environment themselves.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the Gemini API key
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";
/// Environment variable overriding the model
pub const MODEL_ENV: &str = "PAPER_FINDER_MODEL";
/// Environment variable overriding the API base URL
pub const API_BASE_ENV: &str = "GEMINI_API_BASE";

/// Default model for both agents
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";
/// Default Gemini REST endpoint
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A field holds a value outside its allowed range
    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// Name of the offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// HTTP retry options for model calls
///
/// Delay before retry `n` (1-based) is `initial_delay * exp_base^(n-1)`,
/// optionally capped at `max_delay`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryOptions {
    /// Total number of attempts, including the first one
    pub attempts: u32,
    /// Exponential backoff base
    pub exp_base: f64,
    /// Delay before the first retry, in seconds
    pub initial_delay_secs: f64,
    /// Upper bound for a single delay, in seconds (uncapped when `None`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_secs: Option<f64>,
    /// HTTP status codes that are worth retrying
    pub http_status_codes: Vec<u16>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            attempts: 5,
            exp_base: 7.0,
            initial_delay_secs: 1.0,
            max_delay_secs: None,
            http_status_codes: vec![429, 500, 503, 504],
        }
    }
}

impl RetryOptions {
    /// Initial delay as a [`Duration`]
    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs_f64(self.initial_delay_secs)
    }

    /// Delay cap as a [`Duration`]
    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay_secs.map(Duration::from_secs_f64)
    }

    /// Validate the options
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.exp_base.is_finite() || self.exp_base < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.exp_base",
                reason: format!("must be a finite number >= 1, got {}", self.exp_base),
            });
        }
        check_delay("retry.initial_delay_secs", self.initial_delay_secs)?;
        if let Some(max) = self.max_delay_secs {
            check_delay("retry.max_delay_secs", max)?;
        }
        Ok(())
    }
}

fn check_delay(field: &'static str, secs: f64) -> Result<(), ConfigError> {
    if secs.is_finite() && secs >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: format!("must be a finite, non-negative number of seconds, got {secs}"),
        })
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Gemini API key; `None` when `GOOGLE_API_KEY` is unset
    #[serde(skip_serializing)]
    pub google_api_key: Option<String>,
    /// Model used by the search agent and the root agent
    pub model: String,
    /// Base URL of the Gemini REST API
    pub api_base: String,
    /// Per-request HTTP timeout in seconds
    pub request_timeout_secs: u64,
    /// Retry options shared by every model call
    pub retry: RetryOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            google_api_key: None,
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry: RetryOptions::default(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// Empty values are treated as unset.
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            google_api_key: get(API_KEY_ENV),
            model: get(MODEL_ENV).unwrap_or(defaults.model),
            api_base: get(API_BASE_ENV).unwrap_or(defaults.api_base),
            ..defaults
        }
    }

    /// Override the model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the retry options
    pub fn with_retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    /// Whether an API key was provided
    pub fn has_api_key(&self) -> bool {
        self.google_api_key.is_some()
    }

    /// The API key to hand to the transport (empty when unset)
    pub fn api_key_or_empty(&self) -> &str {
        self.google_api_key.as_deref().unwrap_or_default()
    }

    /// Request timeout as a [`Duration`]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "model",
                reason: "must not be empty".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_secs",
                reason: "must be greater than 0".to_string(),
            });
        }
        self.retry.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_retry_options() {
        let retry = RetryOptions::default();
        assert_eq!(retry.attempts, 5);
        assert_eq!(retry.exp_base, 7.0);
        assert_eq!(retry.initial_delay(), Duration::from_secs(1));
        assert_eq!(retry.max_delay(), None);
        assert_eq!(retry.http_status_codes, vec![429, 500, 503, 504]);
    }

    #[test]
    fn test_from_vars_reads_key_and_overrides() {
        let config = Config::from_vars(vars(&[
            (API_KEY_ENV, "secret"),
            (MODEL_ENV, "gemini-2.5-pro"),
        ]));
        assert_eq!(config.google_api_key.as_deref(), Some("secret"));
        assert_eq!(config.model, "gemini-2.5-pro");
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert!(config.has_api_key());
    }

    #[test]
    fn test_missing_key_yields_empty_credential() {
        let config = Config::from_vars(vars(&[(API_KEY_ENV, "  ")]));
        assert!(!config.has_api_key());
        assert_eq!(config.api_key_or_empty(), "");
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_validate_rejects_bad_retry() {
        let config = Config::default().with_retry(RetryOptions {
            attempts: 0,
            ..RetryOptions::default()
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "retry.attempts", .. })
        ));

        let config = Config::default().with_retry(RetryOptions {
            initial_delay_secs: f64::NAN,
            ..RetryOptions::default()
        });
        assert!(config.validate().is_err());

        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_api_key_is_not_serialized() {
        let config = Config::from_vars(vars(&[(API_KEY_ENV, "secret")]));
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
