//! The canonical geometry record.
//!
//! A [`GeoItem`] is one point, polyline or polygon plus its property bag.
//! Records are plain data: they hold no handle to any backend, and the only
//! derived state they carry is the lazily computed centroid, which is keyed by
//! a fingerprint of the coordinates so that any mutation of the path or rings
//! is detected structurally.
//!
//! # Thread Safety
//!
//! `GeoItem` is `Send` but not `Sync`: the centroid cache lives in a
//! [`Cell`]. Sharing one record between threads requires the caller to wrap
//! it in its own lock.

use crate::codec;
use crate::compute::spatial::{self, DistanceMetric};
use crate::error::{MapError, Result};
use mapplz_types::geo::{GeometryKind, LatLng};
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::Cell;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Ordered string-keyed property map.
pub type PropertyMap = serde_json::Map<String, Value>;

/// Keys that describe geometry and therefore never appear in a property bag.
pub const RESERVED_KEYS: [&str; 6] = ["lat", "lng", "path", "rings", "type", "centroid"];

/// Returns true if `key` is reserved for geometry.
pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Identifier assigned by an external store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExternalId {
    Int(i64),
    Text(String),
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalId::Int(id) => write!(f, "{}", id),
            ExternalId::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for ExternalId {
    fn from(value: i64) -> Self {
        ExternalId::Int(value)
    }
}

impl From<&str> for ExternalId {
    fn from(value: &str) -> Self {
        ExternalId::Text(value.to_string())
    }
}

impl From<String> for ExternalId {
    fn from(value: String) -> Self {
        ExternalId::Text(value)
    }
}

/// Positional part of a record. Coordinates are stored latitude first.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(LatLng),
    Polyline(Vec<LatLng>),
    Polygon(Vec<Vec<LatLng>>),
}

/// True when the path has at least three points and ends where it starts.
pub fn is_closed(path: &[LatLng]) -> bool {
    path.len() >= 3 && path.first() == path.last()
}

impl Geometry {
    pub fn kind(&self) -> GeometryKind {
        match self {
            Geometry::Point(_) => GeometryKind::Point,
            Geometry::Polyline(_) => GeometryKind::Polyline,
            Geometry::Polygon(_) => GeometryKind::Polygon,
        }
    }

    /// Classifies a free-form path: closed rings become polygons, anything
    /// else a polyline.
    pub fn from_path(path: Vec<LatLng>) -> Result<Self> {
        let geometry = if is_closed(&path) {
            Geometry::Polygon(vec![path])
        } else {
            Geometry::Polyline(path)
        };
        geometry.validate()?;
        Ok(geometry)
    }

    /// Builds an explicitly tagged polygon, closing any open ring.
    ///
    /// Every ring needs at least four points once closed, so two points
    /// never become an `[a, b, a]` polygon.
    pub fn polygon(rings: Vec<Vec<LatLng>>) -> Result<Self> {
        let rings = close_rings(rings);
        if let Some((idx, ring)) = rings
            .iter()
            .enumerate()
            .find(|(_, ring)| ring.len() < MIN_POLYGON_RING)
        {
            return Err(MapError::MalformedGeometry(format!(
                "polygon ring {} needs at least {} points when closed, got {}",
                idx,
                MIN_POLYGON_RING,
                ring.len()
            )));
        }
        let geometry = Geometry::Polygon(rings);
        geometry.validate()?;
        Ok(geometry)
    }

    /// Ring list classified from free-form input: the first ring was found
    /// closed, so the three-point rule of [`from_path`](Self::from_path)
    /// applies. Later rings are closed if open.
    pub(crate) fn from_rings(rings: Vec<Vec<LatLng>>) -> Result<Self> {
        let geometry = Geometry::Polygon(close_rings(rings));
        geometry.validate()?;
        Ok(geometry)
    }

    /// Checks the structural invariants of the variant.
    pub fn validate(&self) -> Result<()> {
        match self {
            Geometry::Point(coord) => {
                if !coord.is_finite() {
                    return Err(MapError::MissingCoordinate(format!(
                        "point coordinates must be finite, got {}",
                        coord
                    )));
                }
            }
            Geometry::Polyline(path) => {
                if path.len() < 2 {
                    return Err(MapError::MalformedGeometry(format!(
                        "polyline needs at least 2 points, got {}",
                        path.len()
                    )));
                }
                check_finite(path)?;
            }
            Geometry::Polygon(rings) => {
                if rings.is_empty() {
                    return Err(MapError::MalformedGeometry(
                        "polygon needs at least one ring".to_string(),
                    ));
                }
                for (idx, ring) in rings.iter().enumerate() {
                    if !is_closed(ring) {
                        return Err(MapError::MalformedGeometry(format!(
                            "polygon ring {} must be closed with at least 3 points",
                            idx
                        )));
                    }
                    check_finite(ring)?;
                }
            }
        }
        Ok(())
    }

    /// Content hash of the coordinate sequence.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.kind().hash(&mut hasher);
        match self {
            Geometry::Point(coord) => hash_coord(coord, &mut hasher),
            Geometry::Polyline(path) => hash_path(path, &mut hasher),
            Geometry::Polygon(rings) => {
                rings.len().hash(&mut hasher);
                for ring in rings {
                    hash_path(ring, &mut hasher);
                }
            }
        }
        hasher.finish()
    }
}

/// Smallest ring an explicit polygon accepts: three corners plus the
/// closing point.
const MIN_POLYGON_RING: usize = 4;

fn close_rings(rings: Vec<Vec<LatLng>>) -> Vec<Vec<LatLng>> {
    rings
        .into_iter()
        .map(|mut ring| {
            if let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied())
                && first != last
            {
                ring.push(first);
            }
            ring
        })
        .collect()
}

fn check_finite(path: &[LatLng]) -> Result<()> {
    for (idx, coord) in path.iter().enumerate() {
        if !coord.is_finite() {
            return Err(MapError::MalformedGeometry(format!(
                "coordinate at index {} is not finite: {}",
                idx, coord
            )));
        }
    }
    Ok(())
}

fn hash_coord(coord: &LatLng, hasher: &mut FxHasher) {
    coord.lat.to_bits().hash(hasher);
    coord.lng.to_bits().hash(hasher);
}

fn hash_path(path: &[LatLng], hasher: &mut FxHasher) {
    path.len().hash(hasher);
    for coord in path {
        hash_coord(coord, hasher);
    }
}

/// Property bag: usually a map, or an ordered list when a coordinate array
/// carried trailing values that were not a single map.
#[derive(Debug, Clone, PartialEq)]
pub enum Properties {
    Map(PropertyMap),
    List(Vec<Value>),
}

impl Default for Properties {
    fn default() -> Self {
        Properties::Map(PropertyMap::new())
    }
}

impl Properties {
    pub fn is_empty(&self) -> bool {
        match self {
            Properties::Map(map) => map.is_empty(),
            Properties::List(list) => list.is_empty(),
        }
    }

    pub fn as_map(&self) -> Option<&PropertyMap> {
        match self {
            Properties::Map(map) => Some(map),
            Properties::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Properties::Map(_) => None,
            Properties::List(list) => Some(list),
        }
    }

    /// JSON form: an object for maps, an array for lists.
    pub fn to_value(&self) -> Value {
        match self {
            Properties::Map(map) => Value::Object(map.clone()),
            Properties::List(list) => Value::Array(list.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CentroidCache {
    fingerprint: u64,
    value: LatLng,
}

/// A single normalized geometry record.
#[derive(Debug, Clone)]
pub struct GeoItem {
    geometry: Geometry,
    properties: Properties,
    external_id: Option<ExternalId>,
    centroid_cache: Cell<Option<CentroidCache>>,
}

impl PartialEq for GeoItem {
    fn eq(&self, other: &Self) -> bool {
        self.geometry == other.geometry
            && self.properties == other.properties
            && self.external_id == other.external_id
    }
}

impl GeoItem {
    /// Creates a record after checking the geometry invariants.
    pub fn new(geometry: Geometry) -> Result<Self> {
        geometry.validate()?;
        Ok(Self {
            geometry,
            properties: Properties::default(),
            external_id: None,
            centroid_cache: Cell::new(None),
        })
    }

    /// Creates a point record.
    pub fn point(lat: f64, lng: f64) -> Result<Self> {
        Self::new(Geometry::Point(LatLng::new(lat, lng)))
    }

    /// Attaches a property bag, dropping reserved keys.
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = match properties {
            Properties::Map(map) => Properties::Map(strip_reserved(map)),
            list => list,
        };
        self
    }

    pub fn kind(&self) -> GeometryKind {
        self.geometry.kind()
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Replaces the geometry after validating it.
    pub fn set_geometry(&mut self, geometry: Geometry) -> Result<()> {
        geometry.validate()?;
        self.geometry = geometry;
        Ok(())
    }

    /// Applies `edit` to a copy of the geometry and keeps the result only if
    /// it still validates. On error the record is unchanged.
    pub fn edit_geometry<F>(&mut self, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Geometry),
    {
        let mut geometry = self.geometry.clone();
        edit(&mut geometry);
        self.set_geometry(geometry)
    }

    pub fn lat(&self) -> Option<f64> {
        match &self.geometry {
            Geometry::Point(coord) => Some(coord.lat),
            _ => None,
        }
    }

    pub fn lng(&self) -> Option<f64> {
        match &self.geometry {
            Geometry::Point(coord) => Some(coord.lng),
            _ => None,
        }
    }

    pub fn coordinate(&self) -> Option<LatLng> {
        match &self.geometry {
            Geometry::Point(coord) => Some(*coord),
            _ => None,
        }
    }

    pub fn path(&self) -> Option<&[LatLng]> {
        match &self.geometry {
            Geometry::Polyline(path) => Some(path),
            _ => None,
        }
    }

    /// Mutable access to a polyline's path. Edits are picked up by the
    /// centroid cache through the fingerprint but are not validated; keeping
    /// at least two points is up to the caller. Use
    /// [`edit_geometry`](Self::edit_geometry) for a checked edit.
    pub fn path_mut(&mut self) -> Option<&mut Vec<LatLng>> {
        match &mut self.geometry {
            Geometry::Polyline(path) => Some(path),
            _ => None,
        }
    }

    pub fn rings(&self) -> Option<&[Vec<LatLng>]> {
        match &self.geometry {
            Geometry::Polygon(rings) => Some(rings),
            _ => None,
        }
    }

    /// Mutable access to a polygon's rings. Like
    /// [`path_mut`](Self::path_mut), edits are not validated and rings must
    /// stay closed.
    pub fn rings_mut(&mut self) -> Option<&mut Vec<Vec<LatLng>>> {
        match &mut self.geometry {
            Geometry::Polygon(rings) => Some(rings),
            _ => None,
        }
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Property lookup. Lists have no keys and always return `None`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.as_map()?.get(key)
    }

    /// Assigns a property and returns the previous value.
    ///
    /// `lat` and `lng` move a point; the other reserved keys are rejected.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<Option<Value>> {
        let value = value.into();
        if key == "lat" || key == "lng" {
            return self.set_coordinate(key, value);
        }
        if is_reserved_key(key) {
            return Err(MapError::InvalidInput(format!(
                "'{}' is reserved for geometry and cannot be set as a property",
                key
            )));
        }
        match &mut self.properties {
            Properties::Map(map) => Ok(map.insert(key.to_string(), value)),
            Properties::List(_) => Err(MapError::InvalidInput(format!(
                "cannot set '{}' on a record whose properties are a list",
                key
            ))),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        match &mut self.properties {
            Properties::Map(map) => map.shift_remove(key),
            Properties::List(_) => None,
        }
    }

    /// Merges entries into the property map, skipping reserved keys. A list
    /// bag is replaced by the map.
    pub fn merge_properties(&mut self, entries: PropertyMap) {
        let entries = strip_reserved(entries);
        match &mut self.properties {
            Properties::Map(map) => map.extend(entries),
            Properties::List(_) if entries.is_empty() => {}
            Properties::List(_) => self.properties = Properties::Map(entries),
        }
    }

    fn set_coordinate(&mut self, key: &str, value: Value) -> Result<Option<Value>> {
        let kind = self.geometry.kind();
        let Geometry::Point(coord) = &mut self.geometry else {
            return Err(MapError::InvalidInput(format!(
                "'{}' can only be assigned on a point, this record is a {}",
                key, kind
            )));
        };
        let number = value
            .as_f64()
            .filter(|n| n.is_finite())
            .ok_or_else(|| MapError::MissingCoordinate(format!("{} must be numeric", key)))?;
        let previous = if key == "lat" {
            std::mem::replace(&mut coord.lat, number)
        } else {
            std::mem::replace(&mut coord.lng, number)
        };
        Ok(Some(Value::from(previous)))
    }

    /// Value used by condition evaluation: `lat`/`lng` come from a point's
    /// geometry, everything else from the property map.
    pub fn field(&self, name: &str) -> Option<Value> {
        match (name, &self.geometry) {
            ("lat", Geometry::Point(coord)) => Some(Value::from(coord.lat)),
            ("lng", Geometry::Point(coord)) => Some(Value::from(coord.lng)),
            _ => self.get(name).cloned(),
        }
    }

    pub fn external_id(&self) -> Option<&ExternalId> {
        self.external_id.as_ref()
    }

    pub fn set_external_id(&mut self, id: impl Into<ExternalId>) {
        self.external_id = Some(id.into());
    }

    pub fn clear_external_id(&mut self) -> Option<ExternalId> {
        self.external_id.take()
    }

    /// Area-weighted centroid, cached against the coordinate fingerprint.
    ///
    /// Points return their own coordinate. Zero-area paths fail with
    /// [`MapError::DegenerateGeometry`].
    pub fn centroid(&self) -> Result<LatLng> {
        let fingerprint = self.geometry.fingerprint();
        if let Some(cache) = self.centroid_cache.get()
            && cache.fingerprint == fingerprint
        {
            return Ok(cache.value);
        }

        let value = match &self.geometry {
            Geometry::Point(coord) => *coord,
            Geometry::Polyline(path) => spatial::centroid(path)?,
            Geometry::Polygon(rings) => {
                let outer = rings.first().ok_or_else(|| {
                    MapError::MalformedGeometry("polygon has no rings".to_string())
                })?;
                spatial::centroid(outer)?
            }
        };
        self.centroid_cache
            .set(Some(CentroidCache { fingerprint, value }));
        Ok(value)
    }

    /// True if the cache holds a centroid for the current coordinates.
    pub fn has_cached_centroid(&self) -> bool {
        self.centroid_cache
            .get()
            .is_some_and(|cache| cache.fingerprint == self.geometry.fingerprint())
    }

    /// Tests this record against a ring (outer boundary only).
    pub fn inside(&self, ring: &[LatLng]) -> Result<bool> {
        let point = spatial::reference_point(self)?;
        Ok(spatial::point_in_ring(&point, ring))
    }

    /// Distance from `origin` to this record's reference point.
    pub fn distance_to(&self, origin: &LatLng, metric: DistanceMetric) -> Result<f64> {
        let point = spatial::reference_point(self)?;
        Ok(spatial::distance_between(origin, &point, metric))
    }

    /// Single GeoJSON Feature for this record.
    pub fn to_geojson(&self) -> Result<String> {
        codec::geojson::encode_feature(self)
    }

    pub fn to_wkt(&self) -> String {
        codec::wkt::encode_wkt(self)
    }
}

fn strip_reserved(mut map: PropertyMap) -> PropertyMap {
    map.retain(|key, _| {
        let keep = !is_reserved_key(key);
        if !keep {
            log::debug!("Dropping reserved key '{}' from properties", key);
        }
        keep
    });
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn square() -> Vec<LatLng> {
        [[0.0, 0.0], [0.0, 2.0], [2.0, 2.0], [2.0, 0.0], [0.0, 0.0]]
            .into_iter()
            .map(LatLng::from)
            .collect()
    }

    #[test]
    fn test_closed_path_becomes_polygon() {
        let geometry = Geometry::from_path(square()).unwrap();
        assert_eq!(geometry.kind(), GeometryKind::Polygon);

        let open = vec![LatLng::new(1.0, 2.0), LatLng::new(3.0, 4.0)];
        assert_eq!(
            Geometry::from_path(open).unwrap().kind(),
            GeometryKind::Polyline
        );
    }

    #[test]
    fn test_polyline_needs_two_points() {
        let result = Geometry::from_path(vec![LatLng::new(1.0, 2.0)]);
        assert!(matches!(result, Err(MapError::MalformedGeometry(_))));
    }

    #[test]
    fn test_polygon_closes_open_ring() {
        let ring = vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(0.0, 1.0),
            LatLng::new(1.0, 1.0),
        ];
        let Geometry::Polygon(rings) = Geometry::polygon(vec![ring]).unwrap() else {
            panic!("expected polygon");
        };
        assert_eq!(rings[0].len(), 4);
        assert_eq!(rings[0][0], rings[0][3]);
    }

    #[test]
    fn test_explicit_polygon_needs_four_points() {
        let two = vec![LatLng::new(0.0, 0.0), LatLng::new(1.0, 1.0)];
        assert!(matches!(
            Geometry::polygon(vec![two]),
            Err(MapError::MalformedGeometry(_))
        ));

        let collapsed = vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(1.0, 1.0),
            LatLng::new(0.0, 0.0),
        ];
        assert!(Geometry::polygon(vec![collapsed.clone()]).is_err());
        // Free-form classification still accepts the short closed ring.
        assert_eq!(
            Geometry::from_path(collapsed).unwrap().kind(),
            GeometryKind::Polygon
        );
    }

    #[test]
    fn test_edit_geometry_rejects_broken_path() {
        let path = vec![LatLng::new(0.0, 0.0), LatLng::new(1.0, 1.0)];
        let mut item = GeoItem::new(Geometry::Polyline(path.clone())).unwrap();

        let result = item.edit_geometry(|geometry| {
            if let Geometry::Polyline(points) = geometry {
                points.pop();
            }
        });
        assert!(matches!(result, Err(MapError::MalformedGeometry(_))));
        assert_eq!(item.path().unwrap(), &path[..]);

        item.edit_geometry(|geometry| {
            if let Geometry::Polyline(points) = geometry {
                points.push(LatLng::new(2.0, 0.0));
            }
        })
        .unwrap();
        assert_eq!(item.path().unwrap().len(), 3);
    }

    #[test]
    fn test_edit_geometry_keeps_rings_closed() {
        let mut item = GeoItem::new(Geometry::from_path(square()).unwrap()).unwrap();
        let result = item.edit_geometry(|geometry| {
            if let Geometry::Polygon(rings) = geometry {
                rings[0].pop();
            }
        });
        assert!(result.is_err());
        assert_eq!(item.rings().unwrap()[0], square());
    }

    #[test]
    fn test_reserved_keys_are_rejected() {
        let mut item = GeoItem::point(1.0, 2.0).unwrap();
        assert!(item.set("path", json!([])).is_err());
        assert!(item.set("label", "hello").unwrap().is_none());
        assert_eq!(item.get("label"), Some(&json!("hello")));
    }

    #[test]
    fn test_setting_lat_moves_point() {
        let mut item = GeoItem::point(10.0, 5.0).unwrap();
        item.set("lat", 7).unwrap();
        assert_eq!(item.lat(), Some(7.0));
        assert_eq!(item.field("lat"), Some(json!(7.0)));
        assert!(item.get("lat").is_none());
    }

    #[test]
    fn test_with_properties_strips_reserved() {
        let mut map = PropertyMap::new();
        map.insert("type".to_string(), json!("Feature"));
        map.insert("label".to_string(), json!("x"));
        let item = GeoItem::point(0.0, 0.0)
            .unwrap()
            .with_properties(Properties::Map(map));
        assert!(item.get("type").is_none());
        assert_eq!(item.get("label"), Some(&json!("x")));
    }

    #[test]
    fn test_centroid_cache_follows_mutation() {
        let mut item = GeoItem::new(Geometry::Polygon(vec![square()])).unwrap();
        assert!(!item.has_cached_centroid());

        let centroid = item.centroid().unwrap();
        assert!(centroid.approx_eq(&LatLng::new(1.0, 1.0), 1e-9));
        assert!(item.has_cached_centroid());

        // Scale the square; the stale cache must be detected.
        for coord in item.rings_mut().unwrap()[0].iter_mut() {
            coord.lat *= 2.0;
            coord.lng *= 2.0;
        }
        assert!(!item.has_cached_centroid());
        let moved = item.centroid().unwrap();
        assert!(moved.approx_eq(&LatLng::new(2.0, 2.0), 1e-9));
    }

    #[test]
    fn test_equality_ignores_cache() {
        let a = GeoItem::new(Geometry::Polygon(vec![square()])).unwrap();
        let b = a.clone();
        a.centroid().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_differs_by_kind() {
        let path = vec![LatLng::new(1.0, 2.0), LatLng::new(3.0, 4.0)];
        let line = Geometry::Polyline(path.clone());
        let poly = Geometry::Polygon(vec![path]);
        assert_ne!(line.fingerprint(), poly.fingerprint());
    }
}
