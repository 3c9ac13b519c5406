//! The caller-facing record collection.

use crate::codec;
use crate::compute::spatial;
use crate::config::Config;
use crate::error::{MapError, Result};
use crate::ingest::{GeoInput, Ingestor};
use crate::item::GeoItem;
use crate::query;
use crate::render::{MapRenderer, RenderConfig};
use mapplz_types::geo::LatLng;
use serde_json::Value;

/// Records produced by one [`MapStore::add`] call, borrowed from the store.
#[derive(Debug)]
pub enum Added<'a> {
    /// Exactly one record was produced.
    One(&'a mut GeoItem),
    /// Zero or several records, in input order.
    Many(&'a mut [GeoItem]),
}

impl<'a> Added<'a> {
    pub fn len(&self) -> usize {
        match self {
            Added::One(_) => 1,
            Added::Many(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The single record, if exactly one was produced.
    pub fn one(self) -> Option<&'a mut GeoItem> {
        match self {
            Added::One(item) => Some(item),
            Added::Many(_) => None,
        }
    }

    /// All produced records as a slice.
    pub fn into_slice(self) -> &'a mut [GeoItem] {
        match self {
            Added::One(item) => std::slice::from_mut(item),
            Added::Many(items) => items,
        }
    }
}

/// In-memory collection of normalized geometry records.
///
/// ```rust
/// use mapplz::MapStore;
/// use serde_json::json;
///
/// let mut store = MapStore::new();
/// store.add(json!([40, -70, {"label": "hello world"}])).unwrap();
/// store.add(json!({"lat": 41, "lng": -71})).unwrap();
///
/// assert_eq!(store.count(Some("lat > 40.5"), None).unwrap(), 1);
/// let nearest = store.near([40.1, -70.1], 1).unwrap();
/// assert_eq!(nearest[0].0.get("label"), Some(&json!("hello world")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MapStore {
    items: Vec<GeoItem>,
    config: Config,
    ingestor: Ingestor,
}

impl MapStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store after validating `config`.
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate().map_err(MapError::InvalidConfig)?;
        Ok(Self {
            ingestor: Ingestor::new(config.tabular.clone()),
            items: Vec::new(),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Normalizes `input` and appends the records, using the configured axis
    /// order.
    pub fn add(&mut self, input: impl Into<GeoInput>) -> Result<Added<'_>> {
        self.add_with(input, self.config.lonlat)
    }

    /// Like [`add`](Self::add) with an explicit axis order. On error nothing
    /// is appended.
    pub fn add_with(&mut self, input: impl Into<GeoInput>, lonlat: bool) -> Result<Added<'_>> {
        let produced = self.ingestor.standardize(input, lonlat)?;
        let start = self.items.len();
        let count = produced.len();
        self.items.extend(produced);
        log::debug!("Added {} record(s), store now holds {}", count, self.items.len());

        let added = &mut self.items[start..];
        Ok(match added {
            [item] => Added::One(item),
            items => Added::Many(items),
        })
    }

    /// Records matching `expression`, in insertion order. `None` selects
    /// every record.
    pub fn query(&self, expression: Option<&str>, param: Option<&Value>) -> Result<Vec<&GeoItem>> {
        query::select(&self.items, expression, param)
    }

    pub fn count(&self, expression: Option<&str>, param: Option<&Value>) -> Result<usize> {
        self.query(expression, param).map(|found| found.len())
    }

    pub fn size(&self, expression: Option<&str>, param: Option<&Value>) -> Result<usize> {
        self.count(expression, param)
    }

    pub fn length(&self, expression: Option<&str>, param: Option<&Value>) -> Result<usize> {
        self.count(expression, param)
    }

    /// The `limit` records closest to `origin` with their distances, using
    /// the configured metric.
    pub fn near(&self, origin: impl Into<LatLng>, limit: usize) -> Result<Vec<(&GeoItem, f64)>> {
        let origin = origin.into();
        spatial::nearest(&origin, &self.items, limit, self.config.distance_metric)
    }

    /// Records whose point or reference point lies in `ring`. Zero-area
    /// polygons are skipped.
    pub fn inside(&self, ring: &[LatLng]) -> Result<Vec<&GeoItem>> {
        let mut found = Vec::new();
        for item in &self.items {
            match item.inside(ring) {
                Ok(true) => found.push(item),
                Ok(false) => {}
                Err(MapError::DegenerateGeometry(reason)) => {
                    log::warn!("Skipping record in containment test: {}", reason);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(found)
    }

    /// Records inside the outer ring of a polygon record.
    pub fn inside_item(&self, area: &GeoItem) -> Result<Vec<&GeoItem>> {
        let ring = area.rings().and_then(|rings| rings.first()).ok_or_else(|| {
            MapError::InvalidInput(format!("containment needs a polygon, got a {}", area.kind()))
        })?;
        self.inside(ring)
    }

    pub fn get(&self, index: usize) -> Option<&GeoItem> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut GeoItem> {
        self.items.get_mut(index)
    }

    /// Removes and returns the record at `index`.
    pub fn remove(&mut self, index: usize) -> Option<GeoItem> {
        if index < self.items.len() {
            Some(self.items.remove(index))
        } else {
            None
        }
    }

    /// Removes every record matching `predicate`, returning how many went.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&GeoItem) -> bool,
    {
        let before = self.items.len();
        self.items.retain(|item| !predicate(item));
        before - self.items.len()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GeoItem> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, GeoItem> {
        self.items.iter_mut()
    }

    pub fn items(&self) -> &[GeoItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Every record as a GeoJSON FeatureCollection.
    pub fn to_geojson(&self) -> Result<String> {
        codec::encode_geojson(&self.items)
    }

    /// Hands the GeoJSON export to a renderer with the configured view.
    pub fn render<R: MapRenderer + ?Sized>(&self, renderer: &R) -> Result<String> {
        self.render_with(renderer, &self.config.render)
    }

    pub fn render_with<R: MapRenderer + ?Sized>(
        &self,
        renderer: &R,
        config: &RenderConfig,
    ) -> Result<String> {
        config.validate().map_err(MapError::InvalidConfig)?;
        renderer.render(&self.to_geojson()?, config)
    }
}

impl<'a> IntoIterator for &'a MapStore {
    type Item = &'a GeoItem;
    type IntoIter = std::slice::Iter<'a, GeoItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl Extend<GeoItem> for MapStore {
    fn extend<T: IntoIterator<Item = GeoItem>>(&mut self, iter: T) {
        self.items.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapplz_types::geo::GeometryKind;
    use serde_json::json;

    #[test]
    fn test_add_unwraps_single_record() {
        let mut store = MapStore::new();
        let added = store.add(json!([1, 2])).unwrap();
        let item = added.one().unwrap();
        item.set("label", "first").unwrap();
        assert_eq!(store.get(0).unwrap().get("label"), Some(&json!("first")));
    }

    #[test]
    fn test_add_returns_list_for_many() {
        let mut store = MapStore::new();
        let added = store.add(json!([[1, 2], [3, 4]])).unwrap();
        assert!(matches!(added, Added::Many(ref items) if items.len() == 2));

        let added = store.add(json!({"generator": "x"})).unwrap();
        assert!(added.is_empty());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_failed_add_leaves_store_untouched() {
        let mut store = MapStore::new();
        store.add(json!([1, 2])).unwrap();
        assert!(store.add(json!([[3, 4], ["x", "y"]])).is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_configured_axis_order() {
        let mut store = MapStore::with_config(Config::default().with_lonlat(true)).unwrap();
        store.add(json!([-70, 40])).unwrap();
        assert_eq!(store.get(0).unwrap().lat(), Some(40.0));

        store.add_with(json!([-70, 40]), false).unwrap();
        assert_eq!(store.get(1).unwrap().lat(), Some(-70.0));
    }

    #[test]
    fn test_count_aliases() {
        let mut store = MapStore::new();
        store.add(json!([[1, 0], [3, 0]])).unwrap();
        assert_eq!(store.count(None, None).unwrap(), 2);
        assert_eq!(store.size(Some("lat < 2"), None).unwrap(), 1);
        assert_eq!(store.length(Some("lat < ?"), Some(&json!(4))).unwrap(), 2);
    }

    #[test]
    fn test_unsupported_operator_aborts_query() {
        let mut store = MapStore::new();
        store.add(json!([1, 0])).unwrap();
        assert!(matches!(
            store.query(Some("lat != 1"), None),
            Err(MapError::UnsupportedOperator(_))
        ));
    }

    #[test]
    fn test_inside_item() {
        let mut store = MapStore::new();
        store.add(json!([[1, 1], [10, 10]])).unwrap();
        let area = GeoItem::new(crate::item::Geometry::polygon(vec![vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(0.0, 2.0),
            LatLng::new(2.0, 2.0),
            LatLng::new(2.0, 0.0),
        ]])
        .unwrap())
        .unwrap();
        let found = store.inside_item(&area).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].lat(), Some(1.0));

        let point = GeoItem::point(0.0, 0.0).unwrap();
        assert!(store.inside_item(&point).is_err());
    }

    #[test]
    fn test_remove() {
        let mut store = MapStore::new();
        store.add(json!([[1, 0], [2, 0], [3, 0]])).unwrap();
        assert_eq!(store.remove(1).unwrap().lat(), Some(2.0));
        assert!(store.remove(5).is_none());
        assert_eq!(store.remove_where(|item| item.lat() == Some(3.0)), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_to_geojson_collection() {
        let mut store = MapStore::new();
        store.add(json!([[[1, 2], [3, 4], [5, 6]]])).unwrap();
        let value: Value = serde_json::from_str(&store.to_geojson().unwrap()).unwrap();
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["features"][0]["geometry"]["type"], "LineString");
        assert_eq!(store.get(0).unwrap().kind(), GeometryKind::Polyline);
    }

    struct Echo;

    impl MapRenderer for Echo {
        fn render(&self, geojson: &str, config: &RenderConfig) -> Result<String> {
            Ok(format!("{}|{}", config.max_zoom, geojson.len()))
        }
    }

    #[test]
    fn test_render_uses_configured_view() {
        let mut store = MapStore::new();
        store.add(json!([1, 2])).unwrap();
        let output = store.render(&Echo).unwrap();
        assert!(output.starts_with("18|"));

        let bad = RenderConfig::default().with_center(LatLng::new(0.0, 0.0), 30);
        assert!(matches!(
            store.render_with(&Echo, &bad),
            Err(MapError::InvalidConfig(_))
        ));
    }
}
