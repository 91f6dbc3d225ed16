//! INI configuration file.
//!
//! Default location is `<config dir>/geovisit/config.ini` (for example
//! `~/.config/geovisit/config.ini` on Linux). Every key is optional; missing
//! keys take their defaults and malformed values are rejected with the
//! section and key that failed.
//!
//! ```ini
//! [queue]
//! name = location_events
//! workers = 1
//!
//! [catalog]
//! refresh_secs = 0
//!
//! [events]
//! max_clock_skew_secs = 300
//!
//! [filter]
//! cluster_radius_m = 100
//! max_gap_secs = 3600
//! min_points = 3
//! min_dwell_secs = 900
//! min_move_distance_m = 500
//! min_move_gap_secs = 600
//! max_points = 10
//! tail_min_distance_m = 100
//!
//! [cache]
//! ttl_secs = 300
//!
//! [logging]
//! level = info
//! directory = /var/log/geovisit
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};
use thiserror::Error;
use tracing::debug;

use crate::cache::CacheConfig;
use crate::ingest::IngestConfig;
use crate::logging::LoggingConfig;
use crate::processor::ProcessorConfig;
use crate::significance::SignificanceConfig;
use crate::transport::DEFAULT_QUEUE_NAME;
use crate::zone::ZoneCatalogConfig;

/// Application directory name under the platform config directory.
pub const APP_DIR: &str = "geovisit";
/// Config file name.
pub const CONFIG_FILE: &str = "config.ini";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse config file: {0}")]
    Parse(String),

    #[error("cannot write config file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid value '{value}' for [{section}] {key}")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
    },

    #[error("no platform config directory available")]
    NoConfigDir,
}

/// Queue consumer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    pub name: String,
    pub workers: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_QUEUE_NAME.to_string(),
            workers: IngestConfig::default().workers,
        }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub queue: QueueSettings,
    pub catalog_refresh: Duration,
    pub max_clock_skew: Duration,
    pub filter: SignificanceConfig,
    pub cache_ttl: Duration,
    pub logging: LoggingConfig,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            queue: QueueSettings::default(),
            catalog_refresh: ZoneCatalogConfig::default().refresh,
            max_clock_skew: ProcessorConfig::default().max_clock_skew,
            filter: SignificanceConfig::default(),
            cache_ttl: CacheConfig::default().ttl,
            logging: LoggingConfig::default(),
        }
    }
}

impl ConfigFile {
    /// `<config dir>/geovisit/config.ini`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Loads a config file from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loading configuration");
        Self::from_ini_str(&contents)
    }

    /// Loads `path` if given, otherwise the default location if it exists,
    /// otherwise the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Parses INI text.
    pub fn from_ini_str(contents: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let empty = Properties::new();
        let section = |name: &str| ini.section(Some(name)).unwrap_or(&empty);

        let queue = section("queue");
        let catalog = section("catalog");
        let events = section("events");
        let filter = section("filter");
        let cache = section("cache");
        let logging = section("logging");

        let workers: usize = value(queue, "queue", "workers", defaults.queue.workers)?;
        if workers == 0 {
            return Err(invalid("queue", "workers", "0"));
        }

        let significance = SignificanceConfig {
            cluster_radius_m: meters(filter, "cluster_radius_m", defaults.filter.cluster_radius_m)?,
            max_gap: seconds(filter, "filter", "max_gap_secs", defaults.filter.max_gap)?,
            min_points: value(filter, "filter", "min_points", defaults.filter.min_points)?,
            min_dwell: seconds(filter, "filter", "min_dwell_secs", defaults.filter.min_dwell)?,
            min_move_distance_m: meters(
                filter,
                "min_move_distance_m",
                defaults.filter.min_move_distance_m,
            )?,
            min_move_gap: seconds(filter, "filter", "min_move_gap_secs", defaults.filter.min_move_gap)?,
            max_points: value(filter, "filter", "max_points", defaults.filter.max_points)?,
            tail_min_distance_m: meters(
                filter,
                "tail_min_distance_m",
                defaults.filter.tail_min_distance_m,
            )?,
        };
        if significance.max_points == 0 {
            return Err(invalid("filter", "max_points", "0"));
        }

        let level = logging
            .get("level")
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map_or(defaults.logging.level, str::to_string);
        let directory = logging
            .get("directory")
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            queue: QueueSettings {
                name: queue
                    .get("name")
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map_or(defaults.queue.name, str::to_string),
                workers,
            },
            catalog_refresh: seconds(catalog, "catalog", "refresh_secs", defaults.catalog_refresh)?,
            max_clock_skew: seconds(
                events,
                "events",
                "max_clock_skew_secs",
                defaults.max_clock_skew,
            )?,
            filter: significance,
            cache_ttl: seconds(cache, "cache", "ttl_secs", defaults.cache_ttl)?,
            logging: LoggingConfig { level, directory },
        })
    }

    /// Renders every setting, defaults included.
    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        ini.with_section(Some("queue"))
            .set("name", self.queue.name.as_str())
            .set("workers", self.queue.workers.to_string());
        ini.with_section(Some("catalog"))
            .set("refresh_secs", self.catalog_refresh.as_secs().to_string());
        ini.with_section(Some("events"))
            .set("max_clock_skew_secs", self.max_clock_skew.as_secs().to_string());
        ini.with_section(Some("filter"))
            .set("cluster_radius_m", self.filter.cluster_radius_m.to_string())
            .set("max_gap_secs", self.filter.max_gap.as_secs().to_string())
            .set("min_points", self.filter.min_points.to_string())
            .set("min_dwell_secs", self.filter.min_dwell.as_secs().to_string())
            .set("min_move_distance_m", self.filter.min_move_distance_m.to_string())
            .set("min_move_gap_secs", self.filter.min_move_gap.as_secs().to_string())
            .set("max_points", self.filter.max_points.to_string())
            .set("tail_min_distance_m", self.filter.tail_min_distance_m.to_string());
        ini.with_section(Some("cache"))
            .set("ttl_secs", self.cache_ttl.as_secs().to_string());

        {
            let mut logging = ini.with_section(Some("logging"));
            logging.set("level", self.logging.level.as_str());
            if let Some(dir) = &self.logging.directory {
                logging.set("directory", dir.display().to_string());
            }
        }
        ini
    }

    /// Writes the full config to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        self.to_ini().write_to_file(path).map_err(write_err)
    }

    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig::default().with_workers(self.queue.workers)
    }

    pub fn catalog_config(&self) -> ZoneCatalogConfig {
        ZoneCatalogConfig::default().with_refresh(self.catalog_refresh)
    }

    pub fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig::default().with_max_clock_skew(self.max_clock_skew)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::default().with_ttl(self.cache_ttl)
    }
}

fn invalid(section: &'static str, key: &'static str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section,
        key,
        value: value.to_string(),
    }
}

fn value<T: FromStr>(
    props: &Properties,
    section: &'static str,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match props.get(key).map(str::trim) {
        None | Some("") => Ok(default),
        Some(raw) => raw.parse().map_err(|_| invalid(section, key, raw)),
    }
}

fn seconds(
    props: &Properties,
    section: &'static str,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    value(props, section, key, default.as_secs()).map(Duration::from_secs)
}

/// A finite, positive distance from the `[filter]` section.
fn meters(props: &Properties, key: &'static str, default: f64) -> Result<f64, ConfigError> {
    let meters: f64 = value(props, "filter", key, default)?;
    if !(meters.is_finite() && meters > 0.0) {
        return Err(invalid("filter", key, &meters.to_string()));
    }
    Ok(meters)
}
