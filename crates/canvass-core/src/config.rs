//! Configuration management for Canvass.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration.
///
/// This is loaded from `~/.config/canvass/config.toml` (or platform
/// equivalent). If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP fetching and rate limiting
    pub fetch: FetchConfig,
    /// Contact resolution behavior
    pub resolution: ResolutionConfig,
    /// Resolution cache location
    pub cache: CacheConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML or fail validation
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, using defaults if absent.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let config: Self = if path.exists() {
            tracing::debug!("Loading config from {}", path.display());
            let contents = fs::read_to_string(path)?;
            toml::from_str(&contents)?
        } else {
            tracing::debug!("Config file not found, using defaults");
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `CANVASS_CACHE_PATH`: Override the resolution cache file
    /// - `CANVASS_USER_AGENT`: Override the HTTP user agent
    /// - `CANVASS_FORCE_REFRESH`: Bypass cached resolutions (true/false)
    /// - `CANVASS_ELECTION_YEAR`: Override the year used in search queries
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CANVASS_CACHE_PATH") {
            tracing::debug!("Override cache.path from env: {}", val);
            self.cache.path = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("CANVASS_USER_AGENT") {
            if !val.trim().is_empty() {
                self.fetch.user_agent = val;
            }
        }

        if let Ok(val) = std::env::var("CANVASS_FORCE_REFRESH") {
            if let Ok(force) = val.parse() {
                self.resolution.force_refresh = force;
                tracing::debug!("Override resolution.force_refresh from env: {}", force);
            }
        }

        if let Ok(val) = std::env::var("CANVASS_ELECTION_YEAR") {
            if let Ok(year) = val.parse() {
                self.resolution.election_year = year;
                tracing::debug!("Override resolution.election_year from env: {}", year);
            }
        }
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.resolution.flush_interval == 0 {
            return Err(ConfigError::InvalidValue {
                field: "resolution.flush_interval".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let accept = self.resolution.accept_confidence;
        let early = self.resolution.early_stop_confidence;
        if !(0.0..=1.0).contains(&accept) || !(0.0..=1.0).contains(&early) || accept > early {
            return Err(ConfigError::InvalidValue {
                field: "resolution.accept_confidence".to_string(),
                reason: format!(
                    "thresholds must satisfy 0 <= accept ({accept}) <= early_stop ({early}) <= 1"
                ),
            });
        }

        if self.fetch.backoff_schedule_secs.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "fetch.backoff_schedule_secs".to_string(),
                reason: "at least one backoff step is required".to_string(),
            });
        }
        Ok(())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/canvass/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = project_dirs()?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/canvass`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs = project_dirs()?;
        Ok(dirs.data_dir().to_path_buf())
    }

    /// Resolution cache file, honoring an explicit `cache.path`.
    pub fn cache_path(&self) -> ConfigResult<PathBuf> {
        match &self.cache.path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join(CacheConfig::DEFAULT_FILE_NAME)),
        }
    }
}

fn project_dirs() -> ConfigResult<ProjectDirs> {
    ProjectDirs::from("org", "canvass", "canvass").ok_or(ConfigError::NoConfigDir)
}

/// HTTP fetching and per-host-class rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// User agent string
    pub user_agent: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Minimum delay between requests to the wiki source
    pub wiki_delay_ms: u64,
    /// Minimum delay between requests to the profile source
    pub profile_delay_ms: u64,
    /// Minimum delay between requests to the search source
    pub search_delay_ms: u64,
    /// Waits applied after consecutive rate-limit signals from the search source
    pub backoff_schedule_secs: Vec<u64>,
    /// Rate-limit retries before giving up with `RateLimited`
    pub max_rate_limit_retries: u32,
}

impl FetchConfig {
    /// Request timeout as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Backoff schedule as `Duration`s.
    #[must_use]
    pub fn backoff_schedule(&self) -> Vec<Duration> {
        self.backoff_schedule_secs
            .iter()
            .copied()
            .map(Duration::from_secs)
            .collect()
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (compatible; Canvass/0.1; election research)".to_string(),
            timeout_secs: 30,
            wiki_delay_ms: 500,
            profile_delay_ms: 1500,
            search_delay_ms: 3000,
            backoff_schedule_secs: vec![30, 60, 120],
            max_rate_limit_retries: 3,
        }
    }
}

/// Contact resolution behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Flush the cache after this many fresh resolutions
    pub flush_interval: usize,
    /// Stop searching as soon as a URL scores at least this much
    pub early_stop_confidence: f64,
    /// Minimum score for the best URL to be accepted after all queries
    pub accept_confidence: f64,
    /// Results requested from the scoped profile search
    pub profile_max_results: usize,
    /// Results requested per general web search query
    pub web_max_results: usize,
    /// Ignore cached results and re-resolve
    pub force_refresh: bool,
    /// Year used in search query templates
    pub election_year: i32,
    /// Candidates resolved concurrently in a batch
    pub concurrency: usize,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            flush_interval: 25,
            early_stop_confidence: 0.5,
            accept_confidence: 0.3,
            profile_max_results: 5,
            web_max_results: 8,
            force_refresh: false,
            election_year: 2024,
            concurrency: 1,
        }
    }
}

/// Resolution cache location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Explicit cache file; defaults to the data directory
    pub path: Option<PathBuf>,
}

impl CacheConfig {
    /// File name used inside the data directory.
    pub const DEFAULT_FILE_NAME: &'static str = "resolution_cache.json";
}
