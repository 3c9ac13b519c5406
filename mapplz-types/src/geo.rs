//! Coordinate, geometry-kind and distance-metric primitives.
//!
//! Every coordinate in the engine is stored latitude first. Conversions to and
//! from `geo` types (which are x/y, i.e. longitude first) happen only through
//! the `From` impls in this module.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A geographic coordinate, latitude first.
///
/// # Examples
///
/// ```
/// use mapplz_types::geo::LatLng;
///
/// let nyc = LatLng::new(40.7128, -74.0060);
/// assert_eq!(nyc.lat, 40.7128);
/// assert_eq!(nyc.to_pair(), [40.7128, -74.0060]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    #[inline]
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Builds a coordinate from a `[lng, lat]` pair (GeoJSON and WKT order).
    #[inline]
    pub fn from_lng_lat(lng: f64, lat: f64) -> Self {
        Self { lat, lng }
    }

    /// Returns `[lat, lng]`.
    #[inline]
    pub fn to_pair(self) -> [f64; 2] {
        [self.lat, self.lng]
    }

    /// Returns `[lng, lat]`, the axis order used by GeoJSON and WKT.
    #[inline]
    pub fn to_lng_lat(self) -> [f64; 2] {
        [self.lng, self.lat]
    }

    /// True when both components are finite.
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }

    /// Component-wise comparison within `epsilon`.
    pub fn approx_eq(&self, other: &LatLng, epsilon: f64) -> bool {
        (self.lat - other.lat).abs() <= epsilon && (self.lng - other.lng).abs() <= epsilon
    }
}

impl From<LatLng> for geo::Point<f64> {
    fn from(value: LatLng) -> Self {
        geo::Point::new(value.lng, value.lat)
    }
}

impl From<geo::Point<f64>> for LatLng {
    fn from(value: geo::Point<f64>) -> Self {
        LatLng::new(value.y(), value.x())
    }
}

impl From<LatLng> for geo::Coord<f64> {
    fn from(value: LatLng) -> Self {
        geo::coord! { x: value.lng, y: value.lat }
    }
}

impl From<geo::Coord<f64>> for LatLng {
    fn from(value: geo::Coord<f64>) -> Self {
        LatLng::new(value.y, value.x)
    }
}

impl From<[f64; 2]> for LatLng {
    /// Interprets the pair as `[lat, lng]`.
    fn from(value: [f64; 2]) -> Self {
        LatLng::new(value[0], value[1])
    }
}

impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lat, self.lng)
    }
}

/// The three shapes a record can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryKind {
    Point,
    Polyline,
    Polygon,
}

impl GeometryKind {
    /// WKT keyword for the kind.
    pub fn wkt_keyword(&self) -> &'static str {
        match self {
            GeometryKind::Point => "POINT",
            GeometryKind::Polyline => "LINESTRING",
            GeometryKind::Polygon => "POLYGON",
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GeometryKind::Point => "point",
            GeometryKind::Polyline => "polyline",
            GeometryKind::Polygon => "polygon",
        };
        f.write_str(name)
    }
}

/// Distance metric for nearest-neighbor ranking.
///
/// Haversine, Geodesic and Rhumb return meters; Euclidean returns planar
/// degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    #[default]
    Haversine,
    Geodesic,
    Rhumb,
    Euclidean,
}
