//! Centroid, point-in-polygon and nearest-neighbor ranking.
//!
//! All functions work on latitude-first [`LatLng`] coordinates. Distances go
//! through the `geo` crate metrics; the centroid and ring test are computed
//! directly so their edge-case behavior stays fixed.

use crate::error::{MapError, Result};
use crate::item::{GeoItem, Geometry};
use geo::{Distance, Euclidean, Geodesic, Haversine, Rhumb};
use mapplz_types::geo::LatLng;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Distance metric for spatial calculations.
pub use mapplz_types::geo::DistanceMetric;

/// Area-weighted centroid of a vertex sequence, treated as closed.
///
/// Uses the signed-area (shoelace) formula; the closing edge from the last
/// vertex back to the first is added when the path is open. Returns
/// [`MapError::DegenerateGeometry`] when the enclosed area is zero.
///
/// Cross products are taken relative to the first vertex and the zero test
/// scales with the path's extent, so outlines a few centimetres across still
/// have a centroid.
///
/// # Examples
///
/// ```
/// use mapplz::compute::spatial::centroid;
/// use mapplz::LatLng;
///
/// let square: Vec<LatLng> = [[0.0, 0.0], [0.0, 2.0], [2.0, 2.0], [2.0, 0.0], [0.0, 0.0]]
///     .into_iter()
///     .map(LatLng::from)
///     .collect();
/// let c = centroid(&square).unwrap();
/// assert!((c.lat - 1.0).abs() < 1e-9 && (c.lng - 1.0).abs() < 1e-9);
/// ```
pub fn centroid(path: &[LatLng]) -> Result<LatLng> {
    if path.len() < 3 {
        return Err(MapError::DegenerateGeometry(format!(
            "centroid needs at least 3 vertices, got {}",
            path.len()
        )));
    }

    let origin = path[0];
    let mut twice_area = 0.0;
    let mut lat_sum = 0.0;
    let mut lng_sum = 0.0;
    let (mut extent, mut magnitude) = (0.0_f64, 0.0_f64);

    for (idx, current) in path.iter().enumerate() {
        let next = &path[(idx + 1) % path.len()];
        let (y0, x0) = (current.lat - origin.lat, current.lng - origin.lng);
        let (y1, x1) = (next.lat - origin.lat, next.lng - origin.lng);
        let cross = y0 * x1 - y1 * x0;
        twice_area += cross;
        lat_sum += (y0 + y1) * cross;
        lng_sum += (x0 + x1) * cross;
        extent = extent.max(y0.abs()).max(x0.abs());
        magnitude = magnitude.max(current.lat.abs()).max(current.lng.abs());
    }

    // Rounding in the stored coordinates bounds how far a collinear path
    // can stray from zero area.
    let tolerance = extent * (extent + magnitude) * f64::EPSILON * path.len() as f64;
    if !twice_area.is_finite() || twice_area.abs() <= tolerance {
        return Err(MapError::DegenerateGeometry(
            "path encloses zero area".to_string(),
        ));
    }

    let factor = 3.0 * twice_area;
    Ok(LatLng::new(
        origin.lat + lat_sum / factor,
        origin.lng + lng_sum / factor,
    ))
}

/// Even-odd ray casting against a single ring.
///
/// The test uses half-open edge intervals, so a point lying exactly on a
/// horizontal edge or a shared vertex may land on either side. Holes are not
/// considered; pass the outer ring only.
pub fn point_in_ring(point: &LatLng, ring: &[LatLng]) -> bool {
    if ring.len() < 3 {
        return false;
    }

    let (x, y) = (point.lng, point.lat);
    let mut inside = false;
    let mut prev = ring.len() - 1;

    for (idx, current) in ring.iter().enumerate() {
        let (xi, yi) = (current.lng, current.lat);
        let (xj, yj) = (ring[prev].lng, ring[prev].lat);

        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        prev = idx;
    }

    inside
}

/// Distance between two coordinates under `metric`.
pub fn distance_between(a: &LatLng, b: &LatLng, metric: DistanceMetric) -> f64 {
    let p1: geo::Point<f64> = (*a).into();
    let p2: geo::Point<f64> = (*b).into();
    match metric {
        DistanceMetric::Haversine => Haversine.distance(p1, p2),
        DistanceMetric::Geodesic => Geodesic.distance(p1, p2),
        DistanceMetric::Rhumb => Rhumb.distance(p1, p2),
        DistanceMetric::Euclidean => Euclidean.distance(p1, p2),
    }
}

/// Coordinate that stands in for a record in distance and containment tests.
///
/// Points use their own coordinate and polygons the centroid of their outer
/// ring. A polyline uses its centroid, or the mean of its vertices when the
/// line encloses no area (a straight segment, for instance).
pub fn reference_point(item: &GeoItem) -> Result<LatLng> {
    match item.geometry() {
        Geometry::Point(coord) => Ok(*coord),
        Geometry::Polygon(_) => item.centroid(),
        Geometry::Polyline(path) => match item.centroid() {
            Ok(coord) => Ok(coord),
            Err(MapError::DegenerateGeometry(_)) => {
                log::debug!("Polyline encloses no area, using vertex mean");
                vertex_mean(path)
            }
            Err(e) => Err(e),
        },
    }
}

fn vertex_mean(path: &[LatLng]) -> Result<LatLng> {
    if path.is_empty() {
        return Err(MapError::DegenerateGeometry("empty path".to_string()));
    }
    let n = path.len() as f64;
    let (lat, lng) = path
        .iter()
        .fold((0.0, 0.0), |(lat, lng), c| (lat + c.lat, lng + c.lng));
    Ok(LatLng::new(lat / n, lng / n))
}

/// Heap entry for nearest-neighbor ranking (max-heap by distance, so the
/// farthest candidate is popped first).
struct NearEntry<'a> {
    distance: f64,
    index: usize,
    item: &'a GeoItem,
}

impl PartialEq for NearEntry<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for NearEntry<'_> {}

impl PartialOrd for NearEntry<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NearEntry<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Ties keep input order: the later index ranks as "farther".
        self.distance
            .total_cmp(&other.distance)
            .then(self.index.cmp(&other.index))
    }
}

/// The `limit` records closest to `origin`, ascending by distance.
///
/// Uses a bounded max-heap, so ranking n records costs O(n log limit).
/// Records at equal distance keep their input order. Non-finite distances
/// are skipped.
pub fn nearest<'a, I>(
    origin: &LatLng,
    items: I,
    limit: usize,
    metric: DistanceMetric,
) -> Result<Vec<(&'a GeoItem, f64)>>
where
    I: IntoIterator<Item = &'a GeoItem>,
{
    if limit == 0 {
        return Ok(Vec::new());
    }

    let mut heap: BinaryHeap<NearEntry<'a>> = BinaryHeap::new();

    for (index, item) in items.into_iter().enumerate() {
        let point = reference_point(item)?;
        let distance = distance_between(origin, &point, metric);
        if !distance.is_finite() {
            continue;
        }

        let entry = NearEntry {
            distance,
            index,
            item,
        };
        if heap.len() < limit {
            heap.push(entry);
        } else if let Some(worst) = heap.peek()
            && entry < *worst
        {
            heap.pop();
            heap.push(entry);
        }
    }

    Ok(heap
        .into_sorted_vec()
        .into_iter()
        .map(|entry| (entry.item, entry.distance))
        .collect())
}
