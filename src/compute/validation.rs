//! Coercion and validation for free-form coordinates.
//!
//! Free-form input carries coordinates as JSON numbers or as text (tabular
//! cells, hand-written arrays). A value "validates" as a coordinate when its
//! numeric coercion is non-zero, or when it is literally zero: a JSON zero or
//! the exact text `"0"`. Non-numeric text coerces to zero and is rejected.

use crate::error::{MapError, Result};
use mapplz_types::geo::LatLng;
use serde_json::Value;

/// Numeric coercion: JSON numbers as-is, text parsed after trimming, anything
/// else (or unparseable text) becomes `0.0`. Non-finite results count as zero.
///
/// # Examples
///
/// ```
/// use mapplz::compute::validation::coerce_number;
/// use serde_json::json;
///
/// assert_eq!(coerce_number(&json!(40)), 40.0);
/// assert_eq!(coerce_number(&json!(" -70.5 ")), -70.5);
/// assert_eq!(coerce_number(&json!("north")), 0.0);
/// ```
pub fn coerce_number(value: &Value) -> f64 {
    let number = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if number.is_finite() { number } else { 0.0 }
}

/// True for values that can stand in a coordinate slot (numbers and text).
pub fn is_coordinate_like(value: &Value) -> bool {
    matches!(value, Value::Number(_) | Value::String(_))
}

/// Coerces and validates one coordinate component.
///
/// # Examples
///
/// ```
/// use mapplz::compute::validation::validate_coordinate;
/// use serde_json::json;
///
/// assert_eq!(validate_coordinate(&json!(0)), Some(0.0));
/// assert_eq!(validate_coordinate(&json!("0")), Some(0.0));
/// assert_eq!(validate_coordinate(&json!("12.5")), Some(12.5));
/// assert_eq!(validate_coordinate(&json!("abc")), None);
/// assert_eq!(validate_coordinate(&json!(null)), None);
/// ```
pub fn validate_coordinate(value: &Value) -> Option<f64> {
    let number = coerce_number(value);
    if number != 0.0 {
        return Some(number);
    }
    match value {
        Value::Number(n) if n.as_f64().is_some_and(|f| f == 0.0) => Some(0.0),
        Value::String(s) if s == "0" => Some(0.0),
        _ => None,
    }
}

/// Builds a coordinate from two components. `lonlat` swaps the reading
/// order from `[lat, lng]` to `[lng, lat]`.
pub fn coordinate_pair(first: &Value, second: &Value, lonlat: bool) -> Result<LatLng> {
    let (lat_value, lng_value) = if lonlat {
        (second, first)
    } else {
        (first, second)
    };

    let lat = validate_coordinate(lat_value).ok_or_else(|| {
        MapError::MissingCoordinate(format!("invalid latitude: {}", lat_value))
    })?;
    let lng = validate_coordinate(lng_value).ok_or_else(|| {
        MapError::MissingCoordinate(format!("invalid longitude: {}", lng_value))
    })?;

    Ok(LatLng::new(lat, lng))
}

/// Reads a coordinate-shaped array (`[a, b, ...]`); extra elements are
/// ignored.
pub fn coordinate_from_array(values: &[Value], lonlat: bool) -> Result<LatLng> {
    match values {
        [first, second, ..] => coordinate_pair(first, second, lonlat),
        _ => Err(MapError::MissingCoordinate(format!(
            "coordinate needs two components, got {}",
            values.len()
        ))),
    }
}

/// Validates every point of a path, reporting the failing index.
pub fn path_from_values(values: &[Value], lonlat: bool) -> Result<Vec<LatLng>> {
    values
        .iter()
        .enumerate()
        .map(|(idx, value)| match value {
            Value::Array(pair) => coordinate_from_array(pair, lonlat).map_err(|e| {
                MapError::MissingCoordinate(format!("path point at index {}: {}", idx, e))
            }),
            other => Err(MapError::MissingCoordinate(format!(
                "path point at index {} is not a coordinate pair: {}",
                idx, other
            ))),
        })
        .collect()
}
