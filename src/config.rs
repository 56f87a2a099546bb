use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::events::LearningMode;

pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API key for the Gemini API
    pub google_api_key: Option<String>,

    /// Model to start with; first listed model when unset
    pub default_model: Option<String>,

    /// Base URL of the generative language API
    pub base_url: String,

    /// HTTP request timeout
    pub request_timeout_secs: u64,

    /// Learning mode used when a session starts
    pub default_mode: LearningMode,

    /// Replaces the built-in system prompt when set
    pub system_prompt: Option<String>,

    /// Where `/export` writes markdown files
    pub export_dir: Option<PathBuf>,

    /// Request pacing and retry policy
    pub rate_limit: RateLimitConfig,

    /// learnr home directory
    #[serde(skip)]
    pub learnr_home: PathBuf,
}

/// Pacing/backoff knobs for the dispatcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Minimum spacing between successful requests, in seconds
    pub min_interval_secs: f64,
    /// Total attempts per message (first try included)
    pub max_retries: u32,
    /// Base backoff in seconds, doubled on every retry
    pub retry_delay_secs: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: 2.0,
            max_retries: 3,
            retry_delay_secs: 5.0,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("rate_limit.max_retries must be at least 1")]
    NoAttempts,

    #[error("rate_limit.{field} must be a non-negative number of seconds that fits in a duration (got {value})")]
    InvalidDelay { field: &'static str, value: f64 },
}

impl RateLimitConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::NoAttempts);
        }
        for (field, value) in [
            ("min_interval_secs", self.min_interval_secs),
            ("retry_delay_secs", self.retry_delay_secs),
        ] {
            if value < 0.0 || Duration::try_from_secs_f64(value).is_err() {
                return Err(ConfigError::InvalidDelay { field, value });
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));

        Config {
            google_api_key: None,
            default_model: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            request_timeout_secs: 60,
            default_mode: LearningMode::General,
            system_prompt: None,
            export_dir: None,
            rate_limit: RateLimitConfig::default(),
            learnr_home: home.join(".learnr"),
        }
    }
}

impl Config {
    /// Load configuration from `~/.learnr/config.toml`, falling back to defaults
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        let learnr_home = home.join(".learnr");

        fs::create_dir_all(&learnr_home)
            .context("Failed to create .learnr directory")?;

        let mut config = Self::load_from(&learnr_home.join("config.toml"))?;
        config.learnr_home = learnr_home;
        Ok(config)
    }

    /// Load a config file; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        let config: Config = if path.exists() {
            let content = fs::read_to_string(path)
                .context("Failed to read config file")?;
            toml::from_str(&content)
                .context("Failed to parse config file")?
        } else {
            Config::default()
        };

        config.rate_limit.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = self.learnr_home.join("config.toml");
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .context("Failed to write config file")?;
        Ok(())
    }

    /// Get API key from config or environment
    pub fn get_api_key(&self) -> Option<String> {
        pick_api_key(self.google_api_key.clone(), std::env::var(API_KEY_ENV).ok())
    }

    /// Update API key
    pub fn set_api_key(&mut self, key: String) {
        self.google_api_key = Some(key);
    }

    /// Export directory, defaulting to the working directory
    pub fn export_dir(&self) -> PathBuf {
        self.export_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }
}

/// Blank keys count as unset, so a blank config entry falls through to the environment.
fn pick_api_key(configured: Option<String>, from_env: Option<String>) -> Option<String> {
    let usable = |key: &String| !key.trim().is_empty();
    configured.filter(usable).or_else(|| from_env.filter(usable))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let config = Config::default();
        assert_eq!(config.rate_limit.min_interval_secs, 2.0);
        assert_eq!(config.rate_limit.max_retries, 3);
        assert_eq!(config.rate_limit.retry_delay_secs, 5.0);
        assert_eq!(config.request_timeout_secs, 60);
        assert_eq!(config.default_mode, LearningMode::General);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.rate_limit, RateLimitConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "default_model = \"gemini-1.5-flash\"\ndefault_mode = \"Math\"\n\n[rate_limit]\nmax_retries = 5\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.default_model.as_deref(), Some("gemini-1.5-flash"));
        assert_eq!(config.default_mode, LearningMode::Math);
        assert_eq!(config.rate_limit.max_retries, 5);
        assert_eq!(config.rate_limit.min_interval_secs, 2.0);
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[rate_limit]\nmax_retries = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert_eq!(err.downcast_ref::<ConfigError>(), Some(&ConfigError::NoAttempts));
    }

    #[test]
    fn negative_delay_is_rejected() {
        let rate_limit = RateLimitConfig {
            retry_delay_secs: -1.0,
            ..RateLimitConfig::default()
        };
        assert!(matches!(
            rate_limit.validate(),
            Err(ConfigError::InvalidDelay { field: "retry_delay_secs", .. })
        ));
    }

    #[test]
    fn configured_key_wins_over_environment() {
        let mut config = Config::default();
        config.set_api_key("from-config".to_string());
        assert_eq!(config.get_api_key().as_deref(), Some("from-config"));
    }

    #[test]
    fn blank_configured_key_falls_back_to_environment() {
        let key = pick_api_key(Some("   ".to_string()), Some("env-key".to_string()));
        assert_eq!(key.as_deref(), Some("env-key"));

        assert_eq!(pick_api_key(Some(String::new()), None), None);
        assert_eq!(pick_api_key(None, Some(" ".to_string())), None);
        assert_eq!(
            pick_api_key(Some("cfg".to_string()), Some("env".to_string())).as_deref(),
            Some("cfg")
        );
    }

    #[test]
    fn delay_too_large_for_a_duration_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[rate_limit]\nretry_delay_secs = 1e30\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::InvalidDelay { field: "retry_delay_secs", .. })
        ));
    }

    #[test]
    fn validated_config_converts_to_a_retry_policy() {
        let rate_limit = RateLimitConfig {
            min_interval_secs: 1e9,
            ..RateLimitConfig::default()
        };
        rate_limit.validate().unwrap();
        let policy = crate::dispatcher::RetryPolicy::from(&rate_limit);
        assert_eq!(policy.min_interval, Duration::from_secs(1_000_000_000));
    }
}
