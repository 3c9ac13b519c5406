//! Well-Known Text for points, line strings and polygons.
//!
//! Text is parsed with the `wkt` crate and converted through `geo` types.
//! Polygons keep their outer ring only in both directions; interior rings
//! are dropped with a warning.

use crate::error::{MapError, Result};
use crate::item::{GeoItem, Geometry};
use mapplz_types::geo::{GeometryKind, LatLng};
use std::str::FromStr;
use wkt::Wkt;

const KINDS: [GeometryKind; 3] = [
    GeometryKind::Point,
    GeometryKind::Polyline,
    GeometryKind::Polygon,
];

/// Drops an EWKT `SRID=...;` prefix.
fn strip_srid(text: &str) -> &str {
    let trimmed = text.trim();
    if trimmed
        .get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("SRID="))
        && let Some(idx) = trimmed.find(';')
    {
        return trimmed[idx + 1..].trim_start();
    }
    trimmed
}

fn keyword_kind(keyword: &str) -> Option<GeometryKind> {
    KINDS
        .into_iter()
        .find(|kind| keyword.eq_ignore_ascii_case(kind.wkt_keyword()))
}

/// True if the text starts with `POINT(`, `LINESTRING(` or `POLYGON(`,
/// ignoring case and whitespace before the parenthesis.
///
/// # Examples
///
/// ```
/// use mapplz::codec::is_wkt;
///
/// assert!(is_wkt("point(-70 40)"));
/// assert!(is_wkt("POLYGON ((0 0, 1 0, 1 1, 0 0))"));
/// assert!(!is_wkt("MULTIPOINT((0 0))"));
/// assert!(!is_wkt(r#"{"type":"Point"}"#));
/// ```
pub fn is_wkt(text: &str) -> bool {
    let body = strip_srid(text);
    match body.find('(') {
        Some(open) => keyword_kind(body[..open].trim()).is_some(),
        None => false,
    }
}

fn line_coords(line: &geo::LineString<f64>) -> Vec<LatLng> {
    line.coords().copied().map(LatLng::from).collect()
}

/// Parses WKT into a geometry.
pub fn decode_geometry(text: &str) -> Result<Geometry> {
    let body = strip_srid(text);
    let parsed = Wkt::<f64>::from_str(body)
        .map_err(|e| MapError::MalformedGeometry(format!("invalid WKT '{}': {}", body, e)))?;
    let converted: geo::Geometry<f64> = parsed
        .try_into()
        .map_err(|e| MapError::MalformedGeometry(format!("invalid WKT '{}': {:?}", body, e)))?;

    match converted {
        geo::Geometry::Point(point) => {
            let geometry = Geometry::Point(LatLng::from(point));
            geometry.validate().map_err(|_| {
                MapError::MalformedGeometry(format!("WKT POINT is not finite: {}", body))
            })?;
            Ok(geometry)
        }
        geo::Geometry::LineString(line) => {
            let geometry = Geometry::Polyline(line_coords(&line));
            geometry.validate()?;
            Ok(geometry)
        }
        geo::Geometry::Polygon(polygon) => {
            if !polygon.interiors().is_empty() {
                log::warn!(
                    "Dropping {} interior ring(s) when reading WKT polygon",
                    polygon.interiors().len()
                );
            }
            Geometry::polygon(vec![line_coords(polygon.exterior())])
        }
        other => Err(MapError::MalformedGeometry(format!(
            "unsupported WKT geometry: {:?}",
            other
        ))),
    }
}

/// Parses WKT into a record with no properties.
///
/// # Examples
///
/// ```
/// use mapplz::codec::decode_wkt;
///
/// let item = decode_wkt("POINT(-70 40)").unwrap();
/// assert_eq!(item.lat(), Some(40.0));
/// assert_eq!(item.lng(), Some(-70.0));
/// ```
pub fn decode_wkt(text: &str) -> Result<GeoItem> {
    GeoItem::new(decode_geometry(text)?)
}

fn join_positions(path: &[LatLng]) -> String {
    path.iter()
        .map(|c| format!("{} {}", c.lng, c.lat))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Writes a geometry as WKT, `lng lat` ordered.
pub fn encode_geometry(geometry: &Geometry) -> String {
    match geometry {
        Geometry::Point(c) => format!("{}({} {})", geometry.kind().wkt_keyword(), c.lng, c.lat),
        Geometry::Polyline(path) => {
            format!("{}({})", geometry.kind().wkt_keyword(), join_positions(path))
        }
        Geometry::Polygon(rings) => {
            if rings.len() > 1 {
                log::warn!(
                    "Dropping {} interior ring(s) when writing polygon as WKT",
                    rings.len() - 1
                );
            }
            let outer = rings.first().map(|r| join_positions(r)).unwrap_or_default();
            format!("{}(({}))", geometry.kind().wkt_keyword(), outer)
        }
    }
}

/// Writes a record's geometry as WKT.
pub fn encode_wkt(item: &GeoItem) -> String {
    encode_geometry(item.geometry())
}
