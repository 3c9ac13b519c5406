//! GeoJSON conversion for records.

use crate::error::{MapError, Result};
use crate::item::{ExternalId, GeoItem, Geometry, Properties, PropertyMap};
use geojson::feature::Id;
use geojson::{Feature, FeatureCollection, GeoJson};
use mapplz_types::geo::LatLng;
use serde_json::Value;

/// Feature property key used to carry a list-shaped property bag.
pub const LIST_PROPERTIES_KEY: &str = "properties";

const GEOJSON_TYPES: [&str; 9] = [
    "Feature",
    "FeatureCollection",
    "Point",
    "MultiPoint",
    "LineString",
    "MultiLineString",
    "Polygon",
    "MultiPolygon",
    "GeometryCollection",
];

/// True if `value` is an object whose `type` names a GeoJSON object.
pub fn is_geojson(value: &Value) -> bool {
    value
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|kind| GEOJSON_TYPES.contains(&kind))
}

/// Parses GeoJSON text into records.
pub fn decode_geojson(text: &str) -> Result<Vec<GeoItem>> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| MapError::InvalidInput(format!("Failed to parse GeoJSON: {}", e)))?;
    decode_geojson_value(&value)
}

/// Converts an already parsed GeoJSON value into records.
///
/// Multi-geometries and geometry collections expand into one record per
/// member, all sharing the Feature's properties and id. Feature collections
/// are flattened in order.
pub fn decode_geojson_value(value: &Value) -> Result<Vec<GeoItem>> {
    let geojson = GeoJson::from_json_value(value.clone())
        .map_err(|e| MapError::MalformedGeometry(format!("invalid GeoJSON: {}", e)))?;

    match geojson {
        GeoJson::Geometry(geometry) => {
            records_from(geometries_from_value(&geometry.value)?, Properties::default(), None)
        }
        GeoJson::Feature(feature) => items_from_feature(feature),
        GeoJson::FeatureCollection(collection) => {
            let mut items = Vec::new();
            for feature in collection.features {
                items.extend(items_from_feature(feature)?);
            }
            Ok(items)
        }
    }
}

/// Parses a bare GeoJSON geometry object.
pub fn decode_geometry_value(value: &Value) -> Result<Vec<Geometry>> {
    match GeoJson::from_json_value(value.clone()) {
        Ok(GeoJson::Geometry(geometry)) => geometries_from_value(&geometry.value),
        Ok(_) => Err(MapError::MalformedGeometry(
            "expected a GeoJSON geometry object".to_string(),
        )),
        Err(e) => Err(MapError::MalformedGeometry(format!(
            "invalid GeoJSON geometry: {}",
            e
        ))),
    }
}

/// A Feature with a null geometry is metadata only and yields no records.
fn items_from_feature(feature: Feature) -> Result<Vec<GeoItem>> {
    let Some(geometry) = feature.geometry else {
        log::debug!("Skipping Feature without geometry");
        return Ok(Vec::new());
    };
    let properties = properties_from_json(feature.properties);
    let id = feature.id.map(external_id_from_geojson);
    records_from(geometries_from_value(&geometry.value)?, properties, id)
}

fn records_from(
    geometries: Vec<Geometry>,
    properties: Properties,
    id: Option<ExternalId>,
) -> Result<Vec<GeoItem>> {
    geometries
        .into_iter()
        .map(|geometry| {
            let mut item = GeoItem::new(geometry)?.with_properties(properties.clone());
            if let Some(id) = &id {
                item.set_external_id(id.clone());
            }
            Ok(item)
        })
        .collect()
}

/// Converts a GeoJSON geometry value, expanding multi-geometries.
pub fn geometries_from_value(value: &geojson::Value) -> Result<Vec<Geometry>> {
    match value {
        geojson::Value::Point(position) => Ok(vec![Geometry::Point(coord(position)?)]),
        geojson::Value::MultiPoint(positions) => positions
            .iter()
            .map(|p| coord(p).map(Geometry::Point))
            .collect(),
        geojson::Value::LineString(line) => Ok(vec![polyline(line)?]),
        geojson::Value::MultiLineString(lines) => lines.iter().map(|l| polyline(l)).collect(),
        geojson::Value::Polygon(rings) => Ok(vec![polygon(rings)?]),
        geojson::Value::MultiPolygon(polygons) => polygons.iter().map(|p| polygon(p)).collect(),
        geojson::Value::GeometryCollection(members) => {
            let mut geometries = Vec::new();
            for member in members {
                geometries.extend(geometries_from_value(&member.value)?);
            }
            Ok(geometries)
        }
    }
}

fn coord(position: &[f64]) -> Result<LatLng> {
    match position {
        [lng, lat, ..] => Ok(LatLng::from_lng_lat(*lng, *lat)),
        _ => Err(MapError::MalformedGeometry(format!(
            "position must have at least 2 values, got {}",
            position.len()
        ))),
    }
}

fn path(positions: &[Vec<f64>]) -> Result<Vec<LatLng>> {
    positions.iter().map(|p| coord(p)).collect()
}

fn polyline(positions: &[Vec<f64>]) -> Result<Geometry> {
    let geometry = Geometry::Polyline(path(positions)?);
    geometry.validate()?;
    Ok(geometry)
}

fn polygon(rings: &[Vec<Vec<f64>>]) -> Result<Geometry> {
    let rings = rings
        .iter()
        .map(|ring| path(ring))
        .collect::<Result<Vec<_>>>()?;
    Geometry::polygon(rings)
}

fn properties_from_json(properties: Option<PropertyMap>) -> Properties {
    match properties {
        None => Properties::default(),
        Some(mut map) => {
            if map.len() == 1
                && let Some(Value::Array(list)) = map.get_mut(LIST_PROPERTIES_KEY)
            {
                return Properties::List(std::mem::take(list));
            }
            Properties::Map(map)
        }
    }
}

fn properties_to_json(properties: &Properties) -> PropertyMap {
    match properties {
        Properties::Map(map) => map.clone(),
        Properties::List(list) => {
            let mut map = PropertyMap::new();
            map.insert(LIST_PROPERTIES_KEY.to_string(), Value::Array(list.clone()));
            map
        }
    }
}

fn external_id_from_geojson(id: Id) -> ExternalId {
    match id {
        Id::String(text) => ExternalId::Text(text),
        Id::Number(number) => match number.as_i64() {
            Some(int) => ExternalId::Int(int),
            None => ExternalId::Text(number.to_string()),
        },
    }
}

fn external_id_to_geojson(id: &ExternalId) -> Id {
    match id {
        ExternalId::Int(int) => Id::Number((*int).into()),
        ExternalId::Text(text) => Id::String(text.clone()),
    }
}

fn positions(path: &[LatLng]) -> Vec<Vec<f64>> {
    path.iter().map(|c| c.to_lng_lat().to_vec()).collect()
}

/// GeoJSON geometry for a record's geometry, `[lng, lat]` ordered.
pub fn geometry_to_geojson(geometry: &Geometry) -> geojson::Geometry {
    let value = match geometry {
        Geometry::Point(c) => geojson::Value::Point(c.to_lng_lat().to_vec()),
        Geometry::Polyline(path) => geojson::Value::LineString(positions(path)),
        Geometry::Polygon(rings) => {
            geojson::Value::Polygon(rings.iter().map(|ring| positions(ring)).collect())
        }
    };
    geojson::Geometry::new(value)
}

/// GeoJSON geometry as a JSON value, for document stores.
pub fn geometry_to_value(geometry: &Geometry) -> Result<Value> {
    serde_json::to_value(geometry_to_geojson(geometry)).map_err(|e| {
        MapError::Serialization(format!("Failed to serialize geometry: {}", e))
    })
}

/// GeoJSON geometry text, for relational stores that accept GeoJSON.
pub fn encode_geometry(geometry: &Geometry) -> Result<String> {
    serde_json::to_string(&geometry_to_geojson(geometry)).map_err(|e| {
        MapError::Serialization(format!("Failed to serialize geometry: {}", e))
    })
}

pub fn feature_from_item(item: &GeoItem) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(geometry_to_geojson(item.geometry())),
        id: item.external_id().map(external_id_to_geojson),
        properties: Some(properties_to_json(item.properties())),
        foreign_members: None,
    }
}

/// Serializes one record as a GeoJSON Feature.
pub fn encode_feature(item: &GeoItem) -> Result<String> {
    serde_json::to_string(&feature_from_item(item)).map_err(|e| {
        MapError::Serialization(format!("Failed to serialize feature: {}", e))
    })
}

/// Serializes records as a GeoJSON FeatureCollection.
pub fn encode_geojson<'a, I>(items: I) -> Result<String>
where
    I: IntoIterator<Item = &'a GeoItem>,
{
    let collection = FeatureCollection {
        bbox: None,
        features: items.into_iter().map(feature_from_item).collect(),
        foreign_members: None,
    };

    serde_json::to_string(&collection).map_err(|e| {
        MapError::Serialization(format!(
            "Failed to serialize feature collection: {}",
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapplz_types::geo::GeometryKind;
    use serde_json::json;

    fn labeled(geometry: Geometry) -> GeoItem {
        let mut item = GeoItem::new(geometry).unwrap();
        item.set("label", "hello world").unwrap();
        item
    }

    #[test]
    fn test_point_axis_order() {
        let item = GeoItem::point(1.0, 2.0).unwrap();
        let json: Value = serde_json::from_str(&encode_feature(&item).unwrap()).unwrap();
        assert_eq!(json["geometry"]["coordinates"], json!([2.0, 1.0]));
    }

    #[test]
    fn test_roundtrip_each_kind() {
        let line = vec![LatLng::new(0.0, 1.0), LatLng::new(2.0, 3.0)];
        let ring = vec![
            LatLng::new(0.0, 1.0),
            LatLng::new(2.0, 3.0),
            LatLng::new(4.0, 5.0),
            LatLng::new(0.0, 1.0),
        ];
        let originals = vec![
            labeled(Geometry::Point(LatLng::new(40.7128, -74.006))),
            labeled(Geometry::Polyline(line)),
            labeled(Geometry::Polygon(vec![ring])),
        ];

        let text = encode_geojson(&originals).unwrap();
        let decoded = decode_geojson(&text).unwrap();
        assert_eq!(decoded, originals);
    }

    #[test]
    fn test_list_properties_roundtrip() {
        let item = GeoItem::point(1.0, 2.0)
            .unwrap()
            .with_properties(Properties::List(vec![json!(3), json!(4)]));
        let decoded = decode_geojson(&encode_feature(&item).unwrap()).unwrap();
        assert_eq!(decoded[0].properties().as_list(), Some(&[json!(3), json!(4)][..]));
    }

    #[test]
    fn test_feature_id_becomes_external_id() {
        let text = r#"{"type":"Feature","id":7,"geometry":{"type":"Point","coordinates":[-70,40]},"properties":{"label":"hello world"}}"#;
        let items = decode_geojson(text).unwrap();
        assert_eq!(items[0].external_id(), Some(&ExternalId::Int(7)));

        let encoded: Value = serde_json::from_str(&items[0].to_geojson().unwrap()).unwrap();
        assert_eq!(encoded["id"], json!(7));
    }

    #[test]
    fn test_multi_geometries_share_properties() {
        let text = r#"{
            "type": "Feature",
            "geometry": {"type": "MultiPoint", "coordinates": [[-70, 40], [-71, 41]]},
            "properties": {"label": "pair"}
        }"#;
        let items = decode_geojson(text).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].lat(), Some(41.0));
        assert!(items.iter().all(|i| i.get("label") == Some(&json!("pair"))));
    }

    #[test]
    fn test_polygon_keeps_holes() {
        let text = r#"{"type":"Polygon","coordinates":[
            [[0,0],[10,0],[10,10],[0,10],[0,0]],
            [[2,2],[4,2],[4,4],[2,4],[2,2]]
        ]}"#;
        let items = decode_geojson(text).unwrap();
        assert_eq!(items[0].kind(), GeometryKind::Polygon);
        assert_eq!(items[0].rings().unwrap().len(), 2);
    }

    #[test]
    fn test_feature_collection_flattens() {
        let text = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":{"type":"Point","coordinates":[1,2]},"properties":{}},
            {"type":"Feature","geometry":{"type":"LineString","coordinates":[[1,2],[3,4]]},"properties":null}
        ]}"#;
        let items = decode_geojson(text).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].lat(), Some(2.0));
        assert_eq!(items[1].kind(), GeometryKind::Polyline);
    }

    #[test]
    fn test_null_geometry_feature_is_skipped() {
        let text = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":null,"properties":{"source":"survey"}},
            {"type":"Feature","geometry":{"type":"Point","coordinates":[-70,40]},"properties":{"label":"kept"}},
            {"type":"Feature","geometry":null,"properties":null}
        ]}"#;
        let items = decode_geojson(text).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].get("label"), Some(&json!("kept")));

        let lone = r#"{"type":"Feature","geometry":null,"properties":{}}"#;
        assert!(decode_geojson(lone).unwrap().is_empty());
    }

    #[test]
    fn test_short_linestring_is_malformed() {
        let text = r#"{"type":"LineString","coordinates":[[1,2]]}"#;
        assert!(matches!(
            decode_geojson(text),
            Err(MapError::MalformedGeometry(_))
        ));
    }

    #[test]
    fn test_is_geojson() {
        assert!(is_geojson(&json!({"type": "Feature"})));
        assert!(!is_geojson(&json!({"type": "station"})));
        assert!(!is_geojson(&json!([1, 2])));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            decode_geojson("not json"),
            Err(MapError::InvalidInput(_))
        ));
    }
}
