//! Grid configuration: defaults, JSON file loading, validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::manifest::ManifestSource;

const DEFAULT_ASSET_BASE: &str = "photos";

/// What advances the eligibility frontier after the eager first batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerPolicy {
    Timer,
    Proximity,
}

impl std::str::FromStr for TriggerPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "timer" => Ok(TriggerPolicy::Timer),
            "proximity" => Ok(TriggerPolicy::Proximity),
            other => Err(format!("unknown trigger policy '{}'", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub column_count: usize,
    pub batch_size: usize,
    pub trigger_policy: TriggerPolicy,
    pub proximity_margin_px: u32,
    pub timer_interval_ms: u64,
    /// Length of the synthesized manifest used when the real one is unavailable.
    pub fallback_count: usize,
    pub asset_base_url: String,
    /// `None` means there are no pre-generated placeholders; tiles use a uniform blur.
    pub placeholder_base_url: Option<String>,
    pub manifest: Option<String>,
    pub fetch_timeout_ms: u64,
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            column_count: 3,
            batch_size: 6,
            trigger_policy: TriggerPolicy::Proximity,
            proximity_margin_px: 100,
            timer_interval_ms: 1000,
            fallback_count: 24,
            asset_base_url: DEFAULT_ASSET_BASE.into(),
            placeholder_base_url: Some("thumbnails".into()),
            manifest: None,
            fetch_timeout_ms: 15_000,
        }
    }
}

impl GridConfig {
    /// Read a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = match std::fs::read_to_string(path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("config: {} not found, using defaults", path.display());
                return Ok(GridConfig::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        let config: GridConfig =
            serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.column_count == 0 {
            return Err(ConfigError::Invalid("column_count must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1"));
        }
        if self.timer_interval_ms == 0 {
            return Err(ConfigError::Invalid("timer_interval_ms must be positive"));
        }
        if self.fallback_count == 0 {
            return Err(ConfigError::Invalid("fallback_count must be at least 1"));
        }
        Ok(())
    }

    pub fn timer_interval(&self) -> Duration {
        Duration::from_millis(self.timer_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Resolve assets next to the manifest when the source implies a base
    /// and `asset_base_url` was left at its default. Returns true if changed.
    pub fn adopt_source_base(&mut self, source: &ManifestSource) -> bool {
        match source.asset_base() {
            Some(base) if self.asset_base_url == DEFAULT_ASSET_BASE => {
                tracing::debug!("config: assets resolve against {}", base);
                self.asset_base_url = base;
                true
            }
            _ => false,
        }
    }
}

pub fn default_config_path() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("dev", "lv", "lv-grid") {
        dirs.config_dir().join("config.json")
    } else {
        PathBuf::from("lv-grid.json")
    }
}
