//! Viewer configuration loaded from TOML.
//!
//! ```toml
//! source = "public"
//! region = "korea"
//!
//! [playback]
//! interval_ms = 1500
//! end = "wrap"
//!
//! [display]
//! show_grid = false
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::region::{Region, RegionCatalog};
use crate::timeline::EndPolicy;

pub const DEFAULT_PATH: &str = "fire-timeline.toml";
pub const PATH_ENV: &str = "FIRE_TIMELINE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

fn default_source() -> String {
    "public".to_string()
}

fn default_land_path() -> String {
    "data/land.geojson".to_string()
}

fn default_region() -> String {
    "la".to_string()
}

fn default_interval_ms() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PlaybackConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default)]
    pub end: EndPolicy,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            end: EndPolicy::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DisplayConfig {
    #[serde(default = "default_true")]
    pub show_observations: bool,
    #[serde(default = "default_true")]
    pub show_predictions: bool,
    #[serde(default = "default_true")]
    pub show_grid: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_observations: true,
            show_predictions: true,
            show_grid: true,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory or http(s) base URL holding the data documents
    #[serde(default = "default_source")]
    pub source: String,
    /// Land boundary GeoJSON, relative to `source`
    #[serde(default = "default_land_path")]
    pub land_path: String,
    /// Base URL of the air-quality/weather proxy; lookups are off without it
    #[serde(default)]
    pub conditions_url: Option<String>,
    /// Region shown at startup
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    /// Added regions, or replacements for built-in ones with the same name
    #[serde(default)]
    pub regions: Vec<Region>,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: default_source(),
            land_path: default_land_path(),
            conditions_url: None,
            region: default_region(),
            playback: PlaybackConfig::default(),
            display: DisplayConfig::default(),
            regions: Vec::new(),
            log_file: None,
        }
    }
}

impl Config {
    /// Read `path`; a missing file means built-in defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.playback.interval_ms == 0 {
            return Err(ConfigError::Invalid("playback.interval_ms must be positive".into()));
        }
        for region in &self.regions {
            if !region.prediction_path.contains("{date}") {
                return Err(ConfigError::Invalid(format!(
                    "region {}: prediction_path has no {{date}} placeholder",
                    region.name
                )));
            }
            if region.cell_size.is_nan() || region.cell_size <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "region {}: cell_size must be positive",
                    region.name
                )));
            }
            if !region.imagery_layers.is_empty() && region.imagery_layers.len() != region.dates.len() {
                return Err(ConfigError::Invalid(format!(
                    "region {}: {} imagery layers for {} dates",
                    region.name,
                    region.imagery_layers.len(),
                    region.dates.len()
                )));
            }
        }
        self.catalog()
            .get(&self.region)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }

    pub fn catalog(&self) -> RegionCatalog {
        RegionCatalog::builtin().with_overrides(self.regions.clone())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.playback.interval_ms)
    }
}

/// Config path from `--config <file>`, then the environment, then the default
pub fn resolve_path(args: &[String], env: Option<String>) -> PathBuf {
    args.iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
        .or_else(|| env.map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.region, "la");
        assert_eq!(config.interval(), Duration::from_millis(2000));
        assert_eq!(config.playback.end, EndPolicy::Stop);
        assert!(config.display.show_grid);
    }

    #[test]
    fn test_partial_file() {
        let config = Config::from_toml(
            r#"
            region = "korea"
            conditions_url = "http://localhost:3000"

            [playback]
            end = "wrap"

            [display]
            show_grid = false
            "#,
        )
        .unwrap();
        assert_eq!(config.region, "korea");
        assert_eq!(config.playback.end, EndPolicy::Wrap);
        assert_eq!(config.playback.interval_ms, 2000);
        assert!(!config.display.show_grid);
        assert!(config.display.show_observations);
        assert_eq!(config.source, "public");
    }

    #[test]
    fn test_region_override() {
        let config = Config::from_toml(
            r#"
            region = "maui"

            [[regions]]
            name = "maui"
            origin_lat = 20.5
            origin_lon = -157.0
            prediction_path = "predicted/maui/points_{date}.json"
            observation_path = "maui.json"
            observation_kind = "satellite"
            dates = ["2023-08-08", "2023-08-09"]

            [regions.bounds]
            min_lat = 20.5
            min_lon = -157.0
            max_lat = 21.1
            max_lon = -155.9
            "#,
        )
        .unwrap();
        let catalog = config.catalog();
        let maui = catalog.get("maui").unwrap();
        assert_eq!(maui.dates.len(), 2);
        assert_eq!(maui.cell_size, crate::region::CELL_SIZE);
        assert!(catalog.get("la").is_ok());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            Config::from_toml("region = \"atlantis\""),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_toml("[playback]\ninterval_ms = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_toml("[playback]\nend = \"bounce\""),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(Config::from_toml("sourc = 1"), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_unreadable_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be read as a file
        assert!(matches!(Config::load(dir.path()), Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_resolve_path_precedence() {
        let args: Vec<String> = vec!["fire-timeline".into(), "--config".into(), "a.toml".into()];
        assert_eq!(resolve_path(&args, Some("b.toml".into())), PathBuf::from("a.toml"));
        assert_eq!(resolve_path(&args[..1], Some("b.toml".into())), PathBuf::from("b.toml"));
        assert_eq!(resolve_path(&args[..1], None), PathBuf::from(DEFAULT_PATH));
    }
}
