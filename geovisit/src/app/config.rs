//! Application configuration for `GeoVisitApp`.
//!
//! `AppConfig` gathers the per-component settings needed to bootstrap the
//! pipeline and the query service. Build it from a [`ConfigFile`] or start
//! from the defaults and override with the `with_*` methods.

use crate::cache::CacheConfig;
use crate::config::ConfigFile;
use crate::ingest::IngestConfig;
use crate::processor::ProcessorConfig;
use crate::significance::SignificanceConfig;
use crate::zone::ZoneCatalogConfig;

/// Application configuration combining all component configs.
#[derive(Clone, Debug, Default)]
pub struct AppConfig {
    /// Zone snapshot refresh for the event pipeline.
    pub catalog: ZoneCatalogConfig,

    /// Event processing (clock skew allowance).
    pub processor: ProcessorConfig,

    /// Number of ingestion workers.
    pub ingest: IngestConfig,

    /// Significant-position query cache.
    pub cache: CacheConfig,

    /// Significance filter thresholds.
    pub significance: SignificanceConfig,
}

impl AppConfig {
    /// Derives the component configs from a parsed configuration file.
    pub fn from_config_file(config: &ConfigFile) -> Self {
        Self {
            catalog: config.catalog_config(),
            processor: config.processor_config(),
            ingest: config.ingest_config(),
            cache: config.cache_config(),
            significance: config.filter.clone(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.ingest = self.ingest.with_workers(workers);
        self
    }

    pub fn with_catalog(mut self, catalog: ZoneCatalogConfig) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_processor(mut self, processor: ProcessorConfig) -> Self {
        self.processor = processor;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_significance(mut self, significance: SignificanceConfig) -> Self {
        self.significance = significance;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_from_config_file() {
        let file = ConfigFile::from_ini_str(
            "[queue]\nworkers = 4\n\n[catalog]\nrefresh_secs = 0\n",
        )
        .unwrap();
        let config = AppConfig::from_config_file(&file);
        assert_eq!(config.ingest.workers, 4);
        assert_eq!(config.catalog.refresh, Duration::ZERO);
    }

    #[test]
    fn test_with_workers_never_zero() {
        let config = AppConfig::default().with_workers(0);
        assert_eq!(config.ingest.workers, 1);
    }
}
