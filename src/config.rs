//! Configuration loading for the AdLaunch client.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `ADLAUNCH_`, producing a typed [`AppConfig`]. Every timing constant the
//! client uses (poll cadence, popup close-detection cadence, connect
//! timeout, session TTL, search debounce) lives here so call sites never
//! carry inline magic numbers.

use std::{collections::BTreeMap, env, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Application configuration derived from `ADLAUNCH_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    /// Base URL of the AdLaunch backend. Falls back to the local
    /// development server when nothing is configured.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Directory holding the persisted session file.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// Command used to open the Facebook login popup. `None` selects the
    /// platform browser opener.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popup_command: Option<String>,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub facebook: FacebookConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// Job poller cadence parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct PollerConfig {
    /// Fixed delay between status checks in milliseconds (default: 2000)
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,

    /// Maximum number of status checks before giving up (default: 90,
    /// a three minute ceiling at the default interval)
    #[serde(default = "default_poll_max_attempts")]
    pub max_attempts: u32,
}

/// Facebook connect flow parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct FacebookConfig {
    /// Cadence of the popup close-detection check in milliseconds
    /// (default: 500)
    #[serde(default = "default_fb_close_poll_ms")]
    pub close_poll_ms: u64,

    /// Upper bound on a whole connect attempt in seconds (default: 300)
    #[serde(default = "default_fb_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

/// Local session cache parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SessionConfig {
    /// Time-to-live for campaign-scoped cache entries in seconds
    /// (default: 14400, one four-hour working session)
    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: u64,
}

/// Location search parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SearchConfig {
    /// Debounce delay applied to interactive queries in milliseconds
    /// (default: 300)
    #[serde(default = "default_search_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_url: default_api_url(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            state_dir: default_state_dir(),
            popup_command: None,
            poller: PollerConfig::default(),
            facebook: FacebookConfig::default(),
            session: SessionConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
            max_attempts: default_poll_max_attempts(),
        }
    }
}

impl Default for FacebookConfig {
    fn default() -> Self {
        Self {
            close_poll_ms: default_fb_close_poll_ms(),
            connect_timeout_secs: default_fb_connect_timeout_secs(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl_secs(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_search_debounce_ms(),
        }
    }
}

impl AppConfig {
    /// Returns the configured backend base URL, parsed and with any
    /// trailing slash removed.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let trimmed = self.api_url.trim_end_matches('/');
        Url::parse(trimmed).map_err(|source| ConfigError::InvalidApiUrl {
            value: self.api_url.clone(),
            source,
        })
    }

    /// Validates the configuration, returning an error if any bound is
    /// violated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.base_url()?;
        self.poller.validate()?;
        self.facebook.validate()?;
        self.session.validate()?;
        self.search.validate()?;
        Ok(())
    }
}

impl PollerConfig {
    /// Validate poller configuration bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ms < 100 || self.interval_ms > 60_000 {
            return Err(ConfigError::InvalidPollInterval {
                value: self.interval_ms,
            });
        }
        if self.max_attempts == 0 || self.max_attempts > 10_000 {
            return Err(ConfigError::InvalidPollMaxAttempts {
                value: self.max_attempts,
            });
        }
        Ok(())
    }
}

impl FacebookConfig {
    /// Validate connect flow configuration bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.close_poll_ms < 100 || self.close_poll_ms > 10_000 {
            return Err(ConfigError::InvalidClosePollInterval {
                value: self.close_poll_ms,
            });
        }
        if self.connect_timeout_secs < 10 || self.connect_timeout_secs > 3_600 {
            return Err(ConfigError::InvalidConnectTimeout {
                value: self.connect_timeout_secs,
            });
        }
        Ok(())
    }
}

impl SessionConfig {
    /// Validate session cache configuration bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl_secs < 60 {
            return Err(ConfigError::InvalidSessionTtl {
                value: self.ttl_secs,
            });
        }
        Ok(())
    }
}

impl SearchConfig {
    /// Validate search configuration bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.debounce_ms < 50 || self.debounce_ms > 5_000 {
            return Err(ConfigError::InvalidSearchDebounce {
                value: self.debounce_ms,
            });
        }
        Ok(())
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_url() -> String {
    // Local development fallback; deployments override via ADLAUNCH_API_URL.
    "http://localhost:8000".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_state_dir() -> PathBuf {
    match env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".adlaunch"),
        None => PathBuf::from(".adlaunch"),
    }
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_poll_max_attempts() -> u32 {
    90 // 3 minutes at the default interval
}

fn default_fb_close_poll_ms() -> u64 {
    500
}

fn default_fb_connect_timeout_secs() -> u64 {
    300 // 5 minutes
}

fn default_session_ttl_secs() -> u64 {
    14_400 // 4 hours
}

fn default_search_debounce_ms() -> u64 {
    300
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid api url '{value}': {source}")]
    InvalidApiUrl {
        value: String,
        source: url::ParseError,
    },
    #[error("poll interval must be between 100 and 60000 milliseconds, got {value}")]
    InvalidPollInterval { value: u64 },
    #[error("poll max attempts must be between 1 and 10000, got {value}")]
    InvalidPollMaxAttempts { value: u32 },
    #[error("popup close poll interval must be between 100 and 10000 milliseconds, got {value}")]
    InvalidClosePollInterval { value: u64 },
    #[error("connect timeout must be between 10 and 3600 seconds, got {value}")]
    InvalidConnectTimeout { value: u64 },
    #[error("session TTL must be at least 60 seconds, got {value}")]
    InvalidSessionTtl { value: u64 },
    #[error("search debounce must be between 50 and 5000 milliseconds, got {value}")]
    InvalidSearchDebounce { value: u64 },
}

/// Loads configuration using layered `.env` files and `ADLAUNCH_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads configuration: defaults, then layered `.env` files, then
    /// process environment, each layer overriding the previous one.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix("ADLAUNCH_") {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = layered
            .remove("PROFILE")
            .filter(|v| !v.is_empty())
            .unwrap_or(profile_hint);
        let api_url = layered
            .remove("API_URL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_api_url);
        let log_level = layered
            .remove("LOG_LEVEL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_level);
        let log_format = layered
            .remove("LOG_FORMAT")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_format);
        let state_dir = layered
            .remove("STATE_DIR")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_state_dir);
        let popup_command = layered.remove("POPUP_COMMAND").filter(|v| !v.is_empty());

        let poller = PollerConfig {
            interval_ms: layered
                .remove("POLL_INTERVAL_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_poll_interval_ms),
            max_attempts: layered
                .remove("POLL_MAX_ATTEMPTS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_poll_max_attempts),
        };

        let facebook = FacebookConfig {
            close_poll_ms: layered
                .remove("FB_CLOSE_POLL_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_fb_close_poll_ms),
            connect_timeout_secs: layered
                .remove("FB_CONNECT_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_fb_connect_timeout_secs),
        };

        let session = SessionConfig {
            ttl_secs: layered
                .remove("SESSION_TTL_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_session_ttl_secs),
        };

        let search = SearchConfig {
            debounce_ms: layered
                .remove("SEARCH_DEBOUNCE_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_search_debounce_ms),
        };

        let config = AppConfig {
            profile,
            api_url,
            log_level,
            log_format,
            state_dir,
            popup_command,
            poller,
            facebook,
            session,
            search,
        };

        config.validate()?;
        Ok(config)
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var("ADLAUNCH_PROFILE")
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix("ADLAUNCH_") {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.poller.interval_ms, 2_000);
        assert_eq!(config.poller.max_attempts, 90);
        assert_eq!(config.facebook.close_poll_ms, 500);
        assert_eq!(config.facebook.connect_timeout_secs, 300);
        assert_eq!(config.session.ttl_secs, 14_400);
    }

    #[test]
    fn base_url_strips_trailing_slash() {
        let config = AppConfig {
            api_url: "https://api.adlaunch.dev/".to_string(),
            ..AppConfig::default()
        };
        let url = config.base_url().unwrap();
        assert_eq!(url.as_str(), "https://api.adlaunch.dev/");
        assert_eq!(url.path(), "/");
    }

    #[test]
    fn poller_bounds_are_enforced() {
        let too_fast = PollerConfig {
            interval_ms: 10,
            max_attempts: 90,
        };
        assert!(too_fast.validate().is_err());

        let zero_attempts = PollerConfig {
            interval_ms: 2_000,
            max_attempts: 0,
        };
        assert!(zero_attempts.validate().is_err());
    }

    #[test]
    fn facebook_bounds_are_enforced() {
        let bad_close_poll = FacebookConfig {
            close_poll_ms: 50,
            connect_timeout_secs: 300,
        };
        assert!(bad_close_poll.validate().is_err());

        let bad_timeout = FacebookConfig {
            close_poll_ms: 500,
            connect_timeout_secs: 5,
        };
        assert!(bad_timeout.validate().is_err());
    }

    #[test]
    fn invalid_api_url_is_rejected() {
        let config = AppConfig {
            api_url: "not a url".to_string(),
            ..AppConfig::default()
        };
        let err = config.validate().expect_err("url should fail validation");
        assert!(err.to_string().contains("invalid api url"));
    }
}
