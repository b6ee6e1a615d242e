use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::provider::SourceKind;

pub const DEFAULT_BASE_URL: &str =
    "https://weather.visualcrossing.com/VisualCrossingWebServices/rest/services/timeline";

/// Environment variable that overrides `api_key` from the config file.
pub const API_KEY_ENV: &str = "VISUAL_CROSSING_API_KEY";

/// One week.
pub const MAX_CACHE_TTL_MINUTES: u64 = 7 * 24 * 60;
pub const MAX_TIMEOUT_SECS: u64 = 300;

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Visual Crossing API key.
    pub api_key: Option<String>,

    pub base_url: String,

    /// How long a fetched payload is served from the cache.
    pub cache_ttl_minutes: u64,

    /// Upper bound for a single upstream call.
    pub timeout_secs: u64,

    /// "live" or "fixture".
    pub source: Option<String>,

    pub fixture_dir: PathBuf,

    /// Snapshot live responses into `fixture_dir` when no fixture exists yet.
    pub record_fixtures: bool,

    /// Where location records are kept; defaults to the platform data dir.
    pub store_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            cache_ttl_minutes: 30,
            timeout_secs: 10,
            source: None,
            fixture_dir: PathBuf::from("fixtures/visual_crossing"),
            record_fixtures: false,
            store_path: None,
        }
    }
}

impl Config {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_minutes.saturating_mul(60))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Configured source; live when unset.
    pub fn source_kind(&self) -> Result<SourceKind> {
        match self.source.as_deref() {
            None => Ok(SourceKind::Live),
            Some(s) => SourceKind::try_from(s),
        }
    }

    pub fn set_source(&mut self, kind: SourceKind) {
        self.source = Some(kind.as_str().to_string());
    }

    /// API key from the environment, falling back to the config file.
    pub fn resolved_api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| self.api_key.clone())
    }

    pub fn require_api_key(&self) -> Result<String> {
        self.resolved_api_key().ok_or_else(|| {
            anyhow!(
                "No Visual Crossing API key configured.\n\
                 Hint: run `locweather configure` or set {API_KEY_ENV}."
            )
        })
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(contents)?;
        if !(1..=MAX_CACHE_TTL_MINUTES).contains(&cfg.cache_ttl_minutes) {
            return Err(anyhow!(
                "cache_ttl_minutes must be between 1 and {MAX_CACHE_TTL_MINUTES}"
            ));
        }
        if !(1..=MAX_TIMEOUT_SECS).contains(&cfg.timeout_secs) {
            return Err(anyhow!("timeout_secs must be between 1 and {MAX_TIMEOUT_SECS}"));
        }
        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "location-weather", "locweather")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Path to the location store, honouring `store_path`.
    pub fn store_file_path(&self) -> Result<PathBuf> {
        match &self.store_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::project_dirs()?.data_dir().join("locations.json")),
        }
    }
}
