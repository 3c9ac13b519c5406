//! Configuration for MapPLZ stores.
//!
//! Every field has a serde default, so partial JSON or TOML documents load
//! cleanly:
//!
//! ```rust
//! use mapplz::{Config, DistanceMetric};
//!
//! let config = Config::from_json(r#"{ "lonlat": true, "distance_metric": "euclidean" }"#).unwrap();
//! assert!(config.lonlat);
//! assert_eq!(config.distance_metric, DistanceMetric::Euclidean);
//! assert_eq!(config.tabular.delimiter, ',');
//! ```
use crate::render::RenderConfig;
use mapplz_types::geo::DistanceMetric;
use serde::de::Error;

/// Store configuration.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Read bare coordinate arrays as `[lng, lat]` instead of `[lat, lng]`.
    #[serde(default)]
    pub lonlat: bool,

    /// Metric used by nearest-neighbor ranking.
    #[serde(default)]
    pub distance_metric: DistanceMetric,

    #[serde(default)]
    pub tabular: TabularConfig,

    /// Passed to the rendering collaborator.
    #[serde(default)]
    pub render: RenderConfig,
}

/// How text and files are recognized as tabular rows.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TabularConfig {
    /// Field delimiter for delimited rows.
    #[serde(default = "TabularConfig::default_delimiter")]
    pub delimiter: char,

    /// File extensions read as text. Anything else needs an external
    /// converter.
    #[serde(default = "TabularConfig::default_extensions")]
    pub extensions: Vec<String>,
}

impl TabularConfig {
    const fn default_delimiter() -> char {
        ','
    }

    fn default_extensions() -> Vec<String> {
        ["csv", "tsv", "txt", "json", "geojson", "plz"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    /// Delimiter as the single byte the CSV reader expects.
    pub fn delimiter_byte(&self) -> Option<u8> {
        u8::try_from(self.delimiter).ok().filter(u8::is_ascii)
    }

    /// True if `extension` is read as text (case-insensitive).
    pub fn accepts_extension(&self, extension: &str) -> bool {
        self.extensions
            .iter()
            .any(|known| known.eq_ignore_ascii_case(extension))
    }
}

impl Default for TabularConfig {
    fn default() -> Self {
        Self {
            delimiter: Self::default_delimiter(),
            extensions: Self::default_extensions(),
        }
    }
}

impl Config {
    pub fn with_lonlat(mut self, lonlat: bool) -> Self {
        self.lonlat = lonlat;
        self
    }

    pub fn with_distance_metric(mut self, metric: DistanceMetric) -> Self {
        self.distance_metric = metric;
        self
    }

    /// Non-ASCII delimiters are rejected by [`validate`](Self::validate).
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.tabular.delimiter = delimiter;
        self
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tabular.extensions = extensions.into_iter().map(Into::into).collect();
        if self.tabular.extensions.is_empty() {
            log::warn!("No tabular extensions configured; every file input will be rejected");
        }
        self
    }

    pub fn with_render(mut self, render: RenderConfig) -> Self {
        self.render = render;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.tabular.delimiter_byte().is_none() {
            return Err(format!(
                "Delimiter must be a single ASCII character, got {:?}",
                self.tabular.delimiter
            ));
        }

        if self.tabular.delimiter == '"' {
            return Err("Delimiter cannot be the quote character".to_string());
        }

        self.render.validate()?;

        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: Config = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(serde_json::Error::custom(e));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let config: Config = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lonlat: false,
            distance_metric: DistanceMetric::default(),
            tabular: TabularConfig::default(),
            render: RenderConfig::default(),
        }
    }
}
