//! Interface to the rendering collaborator.
//!
//! The core never emits HTML or script. A renderer receives the store's
//! GeoJSON export (always `[lng, lat]` ordered) together with an explicit
//! [`RenderConfig`] and is responsible for everything it draws.

use crate::error::Result;
use mapplz_types::geo::LatLng;
use serde::{Deserialize, Serialize};

/// Map view settings handed to a renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenderConfig {
    /// Tile URL template, e.g. `https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png`.
    #[serde(default = "RenderConfig::default_tile_layer")]
    pub tile_layer: String,

    #[serde(default = "RenderConfig::default_attribution")]
    pub attribution: String,

    #[serde(default = "RenderConfig::default_max_zoom")]
    pub max_zoom: u8,

    /// Initial view; renderers fit the data when absent.
    #[serde(default)]
    pub center: Option<MapCenter>,
}

/// Initial map view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapCenter {
    pub latlng: LatLng,
    pub zoom: u8,
}

impl RenderConfig {
    fn default_tile_layer() -> String {
        "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string()
    }

    fn default_attribution() -> String {
        "Map data &copy; OpenStreetMap contributors".to_string()
    }

    const fn default_max_zoom() -> u8 {
        18
    }

    pub fn with_center(mut self, latlng: LatLng, zoom: u8) -> Self {
        self.center = Some(MapCenter { latlng, zoom });
        self
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.tile_layer.trim().is_empty() {
            return Err("Tile layer URL must not be empty".to_string());
        }
        if let Some(center) = &self.center {
            if center.zoom > self.max_zoom {
                return Err(format!(
                    "Center zoom {} exceeds max zoom {}",
                    center.zoom, self.max_zoom
                ));
            }
            if !center.latlng.is_finite() {
                return Err("Center coordinate must be finite".to_string());
            }
        }
        Ok(())
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            tile_layer: Self::default_tile_layer(),
            attribution: Self::default_attribution(),
            max_zoom: Self::default_max_zoom(),
            center: None,
        }
    }
}

/// Turns a GeoJSON FeatureCollection into a rendered map view.
pub trait MapRenderer {
    fn render(&self, geojson: &str, config: &RenderConfig) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_zoom_is_bounded() {
        let config = RenderConfig::default().with_center(LatLng::new(51.52, -0.08), 20);
        assert!(config.validate().is_err());

        let config = RenderConfig::default().with_center(LatLng::new(51.52, -0.08), 18);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config: RenderConfig = serde_json::from_str(r#"{ "max_zoom": 12 }"#).unwrap();
        assert_eq!(config.max_zoom, 12);
        assert!(config.tile_layer.contains("{z}"));
    }
}
