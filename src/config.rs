use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::EnricherError;

pub const DEFAULT_CONFIG_FILE: &str = "podcast-enricher.json";
pub const DEFAULT_BASE_URL: &str = "https://api.podcastindex.org/api/1.0/";
pub const DEFAULT_DATABASE: &str = "podcasts.db";

pub const API_KEY_VAR: &str = "PODCASTINDEX_API_KEY";
pub const API_SECRET_VAR: &str = "PODCASTINDEX_API_SECRET";

/// On-disk configuration; every field is optional and falls back to [`Settings::default`].
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub score_threshold: Option<f64>,
    #[serde(default)]
    pub search_max: Option<u32>,
    #[serde(default)]
    pub episode_max: Option<u32>,
    #[serde(default)]
    pub title_delay_ms: Option<u64>,
    #[serde(default)]
    pub search_failure_delay_ms: Option<u64>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub base_url: String,
    pub database_path: Utf8PathBuf,
    pub user_agent: String,
    pub score_threshold: f64,
    pub search_max: u32,
    pub episode_max: u32,
    pub title_delay: Duration,
    pub search_failure_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            database_path: Utf8PathBuf::from(DEFAULT_DATABASE),
            user_agent: format!("podcast-enricher/{}", env!("CARGO_PKG_VERSION")),
            score_threshold: 0.4,
            search_max: 10,
            episode_max: 10,
            title_delay: Duration::from_millis(1500),
            search_failure_delay: Duration::from_millis(1000),
            request_timeout: Duration::from_secs(30),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `podcast-enricher.json` from the working directory when present.
    pub fn resolve(path: Option<&str>) -> Result<Settings, EnricherError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| EnricherError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| EnricherError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<Settings, EnricherError> {
        let defaults = Settings::default();

        let score_threshold = config.score_threshold.unwrap_or(defaults.score_threshold);
        if !(0.0..=1.0).contains(&score_threshold) {
            return Err(EnricherError::InvalidSetting(format!(
                "score_threshold must be within [0, 1], got {score_threshold}"
            )));
        }

        let search_max = config.search_max.unwrap_or(defaults.search_max);
        let episode_max = config.episode_max.unwrap_or(defaults.episode_max);
        if search_max == 0 || episode_max == 0 {
            return Err(EnricherError::InvalidSetting(
                "search_max and episode_max must be positive".to_string(),
            ));
        }

        Ok(Settings {
            base_url: config
                .base_url
                .map(|url| normalize_base_url(&url))
                .unwrap_or(defaults.base_url),
            database_path: config
                .database_path
                .map(Utf8PathBuf::from)
                .unwrap_or(defaults.database_path),
            user_agent: config.user_agent.unwrap_or(defaults.user_agent),
            score_threshold,
            search_max,
            episode_max,
            title_delay: config
                .title_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.title_delay),
            search_failure_delay: config
                .search_failure_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.search_failure_delay),
            request_timeout: config
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        })
    }
}

/// Endpoint paths are joined onto the base, so it always ends with a slash.
pub fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    }
}

/// Directory API credentials. Both halves are required.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> Result<Self, EnricherError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, EnricherError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| EnricherError::MissingCredentials(name.to_string()))
        };
        Ok(Self {
            api_key: read(API_KEY_VAR)?,
            api_secret: read(API_SECRET_VAR)?,
        })
    }
}
