//! Normalization of heterogeneous geographic input into [`GeoItem`] records.
//!
//! Input is classified once into a [`GeoInput`] variant and then matched
//! exhaustively. Nested values are re-classified as the pipeline descends,
//! so every recursive step starts from the same tagged union.
//!
//! Dispatch, first match wins:
//!
//! 1. **File**: known text extensions are read and handled as text.
//! 2. **Text**: JSON, then WKT, then delimited rows with a header, then the
//!    map mini-language; otherwise [`MapError::UnrecognizedFormat`].
//! 3. **Path**: a list of coordinate paths; closed rings become polygons.
//! 4. **Batch**: a list of maps or lists, each standardized on its own.
//! 5. **Coordinates**: `[lat, lng, ...properties]`.
//! 6. **Map**: lat/lng keys, a `path`, a geometry column, or GeoJSON.
//!
//! ```rust
//! use mapplz::ingest::standardize;
//! use serde_json::json;
//!
//! let items = standardize(json!([40, -70, {"label": "hello world"}]), false).unwrap();
//! assert_eq!(items[0].lat(), Some(40.0));
//! assert_eq!(items[0].get("label"), Some(&json!("hello world")));
//! ```

use crate::codec::{self, geojson::is_geojson};
use crate::compute::validation::{
    coordinate_from_array, coordinate_pair, is_coordinate_like, path_from_values,
};
use crate::config::TabularConfig;
use crate::error::{MapError, Result};
use crate::item::{GeoItem, Geometry, Properties, PropertyMap, is_closed};
use crate::minilang;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Keys read as latitude, in lookup order.
pub const LAT_KEYS: [&str; 2] = ["lat", "latitude"];

/// Keys read as longitude, in lookup order.
pub const LNG_KEYS: [&str; 4] = ["lng", "lon", "long", "longitude"];

/// Columns that may carry WKT or GeoJSON geometry.
pub const GEOMETRY_KEYS: [&str; 4] = ["geo", "geom", "geojson", "wkt"];

/// Keys never copied as properties next to a geometry column.
const GEOMETRY_SIBLING_EXCLUDES: [&str; 6] = ["lat", "lng", "geo", "geom", "geojson", "wkt"];

/// Nested key whose map entries are merged into the top-level properties.
const NESTED_PROPERTIES_KEY: &str = "properties";

/// Input shape, decided once at the entry boundary.
#[derive(Debug, Clone)]
pub enum GeoInput {
    /// Raw text of unknown format.
    Text(String),
    /// A file on disk, recognized by extension.
    File(PathBuf),
    /// List of coordinate paths (`[[[lat, lng], ...], ...]`).
    Path(Vec<Value>),
    /// List of independent inputs (maps or lists).
    Batch(Vec<Value>),
    /// `[lat, lng, ...properties]`.
    Coordinates(Vec<Value>),
    /// Key-value map.
    Map(PropertyMap),
    /// Already canonical record, passed through.
    Record(GeoItem),
    /// Scalars (numbers, booleans, null) that carry no geometry.
    Scalar(Value),
}

/// True for `[a, b, ...]` where `a` and `b` can be coordinates.
fn is_coordinate_shaped(value: &Value) -> bool {
    match value.as_array() {
        Some(items) => items.len() >= 2 && items[..2].iter().all(is_coordinate_like),
        None => false,
    }
}

/// True for `[[a, b], ...]`.
fn is_path_shaped(value: &Value) -> bool {
    value
        .as_array()
        .and_then(|items| items.first())
        .is_some_and(is_coordinate_shaped)
}

impl GeoInput {
    /// Classifies a JSON value.
    pub fn classify(value: Value) -> Self {
        match value {
            Value::String(text) => GeoInput::Text(text),
            Value::Object(map) => GeoInput::Map(map),
            Value::Array(items) => {
                let first = items.first();
                if first.is_some_and(is_path_shaped) {
                    GeoInput::Path(items)
                } else if first.is_some_and(|v| v.is_array() || v.is_object()) || items.is_empty()
                {
                    GeoInput::Batch(items)
                } else {
                    GeoInput::Coordinates(items)
                }
            }
            scalar => GeoInput::Scalar(scalar),
        }
    }
}

impl From<Value> for GeoInput {
    fn from(value: Value) -> Self {
        GeoInput::classify(value)
    }
}

impl From<&str> for GeoInput {
    fn from(text: &str) -> Self {
        GeoInput::Text(text.to_string())
    }
}

impl From<String> for GeoInput {
    fn from(text: String) -> Self {
        GeoInput::Text(text)
    }
}

impl From<PathBuf> for GeoInput {
    fn from(path: PathBuf) -> Self {
        GeoInput::File(path)
    }
}

impl From<&Path> for GeoInput {
    fn from(path: &Path) -> Self {
        GeoInput::File(path.to_path_buf())
    }
}

impl From<GeoItem> for GeoInput {
    fn from(item: GeoItem) -> Self {
        GeoInput::Record(item)
    }
}

impl From<[f64; 2]> for GeoInput {
    fn from(pair: [f64; 2]) -> Self {
        GeoInput::Coordinates(pair.iter().map(|n| Value::from(*n)).collect())
    }
}

/// Standardizes input with the default tabular settings.
pub fn standardize(input: impl Into<GeoInput>, lonlat: bool) -> Result<Vec<GeoItem>> {
    Ingestor::default().standardize(input, lonlat)
}

/// Converts raw input into records.
#[derive(Debug, Clone, Default)]
pub struct Ingestor {
    tabular: TabularConfig,
}

impl Ingestor {
    pub fn new(tabular: TabularConfig) -> Self {
        Self { tabular }
    }

    /// Produces zero or more records from one input.
    ///
    /// `lonlat` switches bare coordinate arrays to `[lng, lat]` order. An
    /// error aborts this input only; nothing is returned for it.
    pub fn standardize(&self, input: impl Into<GeoInput>, lonlat: bool) -> Result<Vec<GeoItem>> {
        match input.into() {
            GeoInput::File(path) => self.from_file(&path, lonlat),
            GeoInput::Text(text) => self.from_text(&text, lonlat),
            GeoInput::Path(paths) => from_paths(&paths, lonlat),
            GeoInput::Batch(values) => {
                let mut items = Vec::new();
                for value in values {
                    items.extend(self.standardize(value, lonlat)?);
                }
                Ok(items)
            }
            GeoInput::Coordinates(values) => from_coordinates(values, lonlat).map(|item| vec![item]),
            GeoInput::Map(map) => self.from_map(map, lonlat),
            GeoInput::Record(item) => Ok(vec![item]),
            GeoInput::Scalar(value) => Err(MapError::UnrecognizedFormat(format!(
                "scalar value carries no geometry: {}",
                value
            ))),
        }
    }

    fn from_file(&self, path: &Path, lonlat: bool) -> Result<Vec<GeoItem>> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();

        if !self.tabular.accepts_extension(extension) {
            return Err(MapError::UnrecognizedFormat(format!(
                "{} needs an external converter (extension '{}')",
                path.display(),
                extension
            )));
        }

        log::debug!("Reading {} as text", path.display());
        let text = std::fs::read_to_string(path)?;
        self.from_text(&text, lonlat)
    }

    fn from_text(&self, text: &str, lonlat: bool) -> Result<Vec<GeoItem>> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(MapError::UnrecognizedFormat("empty text".to_string()));
        }

        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            log::debug!("Text parsed as JSON");
            return self.standardize(value, lonlat);
        }

        if codec::is_wkt(trimmed) {
            log::debug!("Text parsed as WKT");
            return Ok(vec![codec::decode_wkt(trimmed)?]);
        }

        if let Some(rows) = self.parse_rows(trimmed)? {
            log::debug!("Text parsed as {} tabular row(s)", rows.len());
            let mut items = Vec::new();
            for row in rows {
                items.extend(self.from_map(row, lonlat)?);
            }
            return Ok(items);
        }

        match minilang::parse_with(trimmed, lonlat) {
            Ok(document) => {
                log::debug!("Text parsed as map mini-language");
                Ok(document.into_items())
            }
            Err(_) => Err(MapError::UnrecognizedFormat(format!(
                "text is not JSON, WKT, tabular rows or map mini-language: {}",
                preview(trimmed)
            ))),
        }
    }

    /// Delimited rows with a header. Needs at least two columns, one data
    /// row and consistent row lengths; anything else is not tabular.
    ///
    /// Once the header names a coordinate pair or a geometry column the text
    /// is taken as tabular, and a bad row is a [`MapError::Csv`] error.
    fn parse_rows(&self, text: &str) -> Result<Option<Vec<PropertyMap>>> {
        let Some(delimiter) = self.tabular.delimiter_byte() else {
            return Ok(None);
        };
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let headers = match reader.headers() {
            Ok(headers) if headers.len() >= 2 => headers.clone(),
            _ => return Ok(None),
        };
        let geographic = has_geographic_header(&headers);

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = match record {
                Ok(record) => record,
                Err(e) if geographic => return Err(e.into()),
                Err(e) => {
                    log::debug!("Not tabular: {}", e);
                    return Ok(None);
                }
            };
            let row: PropertyMap = headers
                .iter()
                .zip(record.iter())
                .map(|(key, cell)| (key.to_string(), Value::String(cell.to_string())))
                .collect();
            rows.push(row);
        }

        Ok(if rows.is_empty() { None } else { Some(rows) })
    }

    fn from_map(&self, mut map: PropertyMap, lonlat: bool) -> Result<Vec<GeoItem>> {
        let lat_key = LAT_KEYS.iter().find(|k| map.contains_key(**k));
        let lng_key = LNG_KEYS.iter().find(|k| map.contains_key(**k));

        if let (Some(lat_key), Some(lng_key)) = (lat_key, lng_key) {
            let lat = map.shift_remove(*lat_key).unwrap_or(Value::Null);
            let lng = map.shift_remove(*lng_key).unwrap_or(Value::Null);
            let coord = coordinate_pair(&lat, &lng, false)?;
            let mut item = GeoItem::new(Geometry::Point(coord))?;
            item.merge_properties(flatten_properties(map));
            return Ok(vec![item]);
        }

        if let Some(path) = map.shift_remove("path") {
            let geometries = geometries_from_path_value(&path, lonlat)?;
            let properties = flatten_properties(map);
            return geometries
                .into_iter()
                .map(|geometry| {
                    let mut item = GeoItem::new(geometry)?;
                    item.merge_properties(properties.clone());
                    Ok(item)
                })
                .collect();
        }

        if let Some(key) = GEOMETRY_KEYS.iter().find(|k| map.contains_key(**k)) {
            let source = map.get(*key).cloned().unwrap_or(Value::Null);
            let mut items = self.from_geometry_column(source, lonlat)?;
            let siblings: PropertyMap = map
                .into_iter()
                .filter(|(k, _)| !GEOMETRY_SIBLING_EXCLUDES.contains(&k.as_str()))
                .collect();
            let siblings = flatten_properties(siblings);
            for item in &mut items {
                item.merge_properties(siblings.clone());
            }
            return Ok(items);
        }

        let value = Value::Object(map);
        if is_geojson(&value) {
            return codec::decode_geojson_value(&value);
        }

        log::debug!("Map has no recognizable geometry, ignoring it");
        Ok(Vec::new())
    }

    fn from_geometry_column(&self, source: Value, lonlat: bool) -> Result<Vec<GeoItem>> {
        match source {
            Value::String(text) if codec::is_wkt(&text) => Ok(vec![codec::decode_wkt(&text)?]),
            Value::String(text) => {
                let value: Value = serde_json::from_str(text.trim()).map_err(|e| {
                    MapError::MalformedGeometry(format!(
                        "geometry column is neither WKT nor GeoJSON: {}",
                        e
                    ))
                })?;
                self.standardize(value, lonlat)
            }
            Value::Null => Err(MapError::MalformedGeometry(
                "geometry column is empty".to_string(),
            )),
            other => self.standardize(other, lonlat),
        }
    }
}

/// True when a header row names a lat/lng pair or a geometry column.
fn has_geographic_header(headers: &csv::StringRecord) -> bool {
    let has = |keys: &[&str]| headers.iter().any(|header| keys.contains(&header));
    (has(&LAT_KEYS[..]) && has(&LNG_KEYS[..])) || has(&GEOMETRY_KEYS[..])
}

/// Turns a `path` value into geometries.
///
/// A single path (`[[lat, lng], ...]`) is classified by the closed-ring
/// rule. A list of paths is a polygon with holes when the first path is
/// closed, otherwise one polyline per path.
pub fn geometries_from_path_value(value: &Value, lonlat: bool) -> Result<Vec<Geometry>> {
    let Some(items) = value.as_array() else {
        return Err(MapError::MalformedGeometry(format!(
            "path must be a list of coordinates, got {}",
            value
        )));
    };

    if is_path_shaped(value) || items.is_empty() {
        let path = path_from_values(items, lonlat)?;
        return Ok(vec![Geometry::from_path(path)?]);
    }

    let paths = items
        .iter()
        .map(|item| match item.as_array() {
            Some(points) => path_from_values(points, lonlat),
            None => Err(MapError::MalformedGeometry(format!(
                "expected a coordinate path, got {}",
                item
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    if paths.first().is_some_and(|first| is_closed(first)) {
        Ok(vec![Geometry::from_rings(paths)?])
    } else {
        paths.into_iter().map(Geometry::from_path).collect()
    }
}

fn from_paths(paths: &[Value], lonlat: bool) -> Result<Vec<GeoItem>> {
    geometries_from_path_value(&Value::Array(paths.to_vec()), lonlat)?
        .into_iter()
        .map(GeoItem::new)
        .collect()
}

fn from_coordinates(mut values: Vec<Value>, lonlat: bool) -> Result<GeoItem> {
    let coord = coordinate_from_array(&values, lonlat)?;
    let trailing: Vec<Value> = values.drain(..).skip(2).collect();

    let properties = match <[Value; 1]>::try_from(trailing) {
        Ok([Value::Object(map)]) => Properties::Map(map),
        Ok([single]) => Properties::List(vec![single]),
        Err(trailing) if trailing.is_empty() => Properties::default(),
        Err(trailing) => Properties::List(trailing),
    };

    Ok(GeoItem::new(Geometry::Point(coord))?.with_properties(properties))
}

/// Copies a map's entries, lifting a nested `properties` map to the top.
fn flatten_properties(mut map: PropertyMap) -> PropertyMap {
    match map.shift_remove(NESTED_PROPERTIES_KEY) {
        Some(Value::Object(nested)) => {
            map.extend(nested);
            map
        }
        Some(other) => {
            map.insert(NESTED_PROPERTIES_KEY.to_string(), other);
            map
        }
        None => map,
    }
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 40;
    match text.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
