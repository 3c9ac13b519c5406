//! Store builder for flexible configuration
//!
//! Collects configuration and seed inputs, then validates and ingests them
//! in one step.

use crate::config::Config;
use crate::error::{MapError, Result};
use crate::ingest::GeoInput;
use crate::render::RenderConfig;
use crate::store::MapStore;
use mapplz_types::geo::DistanceMetric;
use std::path::PathBuf;

/// Builder for a [`MapStore`] with custom settings and initial data.
#[derive(Debug, Default)]
pub struct StoreBuilder {
    config: Config,
    seeds: Vec<GeoInput>,
}

impl StoreBuilder {
    /// Create a new builder with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Read bare coordinate arrays as `[lng, lat]`.
    pub fn lonlat(mut self, lonlat: bool) -> Self {
        self.config.lonlat = lonlat;
        self
    }

    pub fn distance_metric(mut self, metric: DistanceMetric) -> Self {
        self.config.distance_metric = metric;
        self
    }

    /// Field delimiter for tabular text. Checked in [`build`](Self::build).
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.config.tabular.delimiter = delimiter;
        self
    }

    pub fn render(mut self, render: RenderConfig) -> Self {
        self.config.render = render;
        self
    }

    /// Ingest `input` when the store is built.
    pub fn input(mut self, input: impl Into<GeoInput>) -> Self {
        self.seeds.push(input.into());
        self
    }

    /// Ingest a file when the store is built.
    pub fn file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.seeds.push(GeoInput::File(path.into()));
        self
    }

    /// Build the store. Fails on an invalid configuration or on the first
    /// seed input that cannot be ingested.
    pub fn build(self) -> Result<MapStore> {
        let mut store = MapStore::with_config(self.config)?;

        for seed in self.seeds {
            store.add(seed)?;
        }
        log::debug!("Built store with {} record(s)", store.len());

        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_default() {
        let store = StoreBuilder::new().build().unwrap();
        assert!(store.is_empty());
        assert!(!store.config().lonlat);
    }

    #[test]
    fn test_builder_with_seeds() {
        let store = StoreBuilder::new()
            .lonlat(true)
            .input(json!([-70, 40]))
            .input("POINT(-71 41)")
            .build()
            .unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(0).unwrap().lat(), Some(40.0));
        assert_eq!(store.get(1).unwrap().lat(), Some(41.0));
    }

    #[test]
    fn test_builder_rejects_bad_delimiter() {
        let result = StoreBuilder::new().delimiter('"').build();
        assert!(matches!(result, Err(MapError::InvalidConfig(_))));
    }

    #[test]
    fn test_builder_with_config() {
        let config = Config::default().with_distance_metric(DistanceMetric::Euclidean);
        let store = StoreBuilder::new().config(config).build().unwrap();
        assert_eq!(store.config().distance_metric, DistanceMetric::Euclidean);
    }

    #[test]
    fn test_builder_missing_file() {
        let result = StoreBuilder::new().file("/nonexistent/places.csv").build();
        assert!(matches!(result, Err(MapError::Io(_))));
    }
}
