//! Engine-wide configuration.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schema::{IndexSettings, RefreshInterval};

/// Configuration for an [`Engine`](crate::engine::Engine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Refresh interval of indices that do not set their own.
    pub default_refresh_interval: RefreshInterval,

    /// Shard count recorded for new indices without explicit settings.
    pub default_number_of_shards: u32,

    /// Replica count recorded for new indices without explicit settings.
    pub default_number_of_replicas: u32,

    /// How often the background scheduler looks for due refreshes.
    pub scheduler_tick: Duration,

    /// Whether to run the background refresh scheduler at all. Searches
    /// still apply due writes before reading when it is off.
    pub background_refresh: bool,

    /// Page size of searches that do not set one.
    pub default_search_size: usize,

    /// Bucket count of terms aggregations that do not set one.
    pub default_terms_size: usize,

    /// Upper bound of `from + size`.
    pub max_result_window: usize,

    /// Create missing indices on document writes.
    pub auto_create_index: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            default_refresh_interval: RefreshInterval::Every(Duration::from_secs(1)),
            default_number_of_shards: 1,
            default_number_of_replicas: 1,
            scheduler_tick: Duration::from_millis(100),
            background_refresh: true,
            default_search_size: 10,
            default_terms_size: 10,
            max_result_window: 10_000,
            auto_create_index: false,
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Load a configuration from a JSON file. Missing keys keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let config = serde_json::from_reader(BufReader::new(file))?;
        Ok(config)
    }

    /// Settings applied to a new index before its own body is parsed.
    pub fn index_defaults(&self) -> IndexSettings {
        IndexSettings::new()
            .with_shards(self.default_number_of_shards)
            .with_replicas(self.default_number_of_replicas)
    }
}

/// Fluent builder for [`EngineConfig`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn default_refresh_interval(mut self, interval: RefreshInterval) -> Self {
        self.config.default_refresh_interval = interval;
        self
    }

    pub fn default_number_of_shards(mut self, shards: u32) -> Self {
        self.config.default_number_of_shards = shards.max(1);
        self
    }

    pub fn default_number_of_replicas(mut self, replicas: u32) -> Self {
        self.config.default_number_of_replicas = replicas;
        self
    }

    pub fn scheduler_tick(mut self, tick: Duration) -> Self {
        self.config.scheduler_tick = tick;
        self
    }

    pub fn background_refresh(mut self, enabled: bool) -> Self {
        self.config.background_refresh = enabled;
        self
    }

    pub fn default_search_size(mut self, size: usize) -> Self {
        self.config.default_search_size = size;
        self
    }

    pub fn default_terms_size(mut self, size: usize) -> Self {
        self.config.default_terms_size = size;
        self
    }

    pub fn max_result_window(mut self, window: usize) -> Self {
        self.config.max_result_window = window;
        self
    }

    pub fn auto_create_index(mut self, enabled: bool) -> Self {
        self.config.auto_create_index = enabled;
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}
