//! Adapter for document stores.
//!
//! Records are stored flattened: the GeoJSON geometry under `geo`, the
//! properties as top-level fields next to it and the store identifier under
//! `_id`:
//!
//! ```json
//! { "_id": "...", "geo": { "type": "Point", "coordinates": [-70, 40] }, "label": "hello world" }
//! ```
//!
//! A list property bag is kept whole under `properties`.

use crate::codec::geojson::{self, LIST_PROPERTIES_KEY};
use crate::error::{MapError, Result};
use crate::item::{ExternalId, GeoItem, Properties, PropertyMap};
use serde_json::Value;

pub const ID_KEY: &str = "_id";
pub const GEO_KEY: &str = "geo";

/// Collection of documents, implemented by the caller.
pub trait DocumentHandle {
    /// Stores a new document and returns its identifier.
    fn insert(&mut self, document: &PropertyMap) -> Result<ExternalId>;

    fn replace(&mut self, id: &ExternalId, document: &PropertyMap) -> Result<()>;

    fn remove(&mut self, id: &ExternalId) -> Result<()>;

    fn find_all(&self) -> Result<Vec<PropertyMap>>;
}

/// Flattens a record into a document. The identifier is included when the
/// record has one.
pub fn to_document(item: &GeoItem) -> Result<PropertyMap> {
    let mut document = PropertyMap::new();
    if let Some(id) = item.external_id() {
        document.insert(ID_KEY.to_string(), serde_json::to_value(id)?);
    }
    document.insert(
        GEO_KEY.to_string(),
        geojson::geometry_to_value(item.geometry())?,
    );

    match item.properties() {
        Properties::Map(map) => {
            for (key, value) in map {
                if key == ID_KEY || key == GEO_KEY {
                    log::warn!("Property '{}' collides with a document field, dropping it", key);
                    continue;
                }
                document.insert(key.clone(), value.clone());
            }
        }
        Properties::List(list) => {
            document.insert(LIST_PROPERTIES_KEY.to_string(), Value::Array(list.clone()));
        }
    }

    Ok(document)
}

fn parse_id(value: &Value) -> ExternalId {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(id) => ExternalId::Int(id),
            None => ExternalId::Text(n.to_string()),
        },
        Value::String(s) => ExternalId::Text(s.clone()),
        // Extended JSON wraps ids as {"$oid": "..."}.
        Value::Object(map) => match map.get("$oid").and_then(Value::as_str) {
            Some(oid) => ExternalId::Text(oid.to_string()),
            None => ExternalId::Text(value.to_string()),
        },
        other => ExternalId::Text(other.to_string()),
    }
}

/// Rebuilds a record from a stored document.
pub fn from_document(document: &PropertyMap) -> Result<GeoItem> {
    let geo = document.get(GEO_KEY).ok_or_else(|| {
        MapError::MalformedGeometry(format!("document has no '{}' field", GEO_KEY))
    })?;
    let mut geometries = geojson::decode_geometry_value(geo)?;
    if geometries.len() != 1 {
        return Err(MapError::MalformedGeometry(format!(
            "document holds {} geometries, expected one",
            geometries.len()
        )));
    }
    let mut item = GeoItem::new(geometries.remove(0))?;

    let mut rest: PropertyMap = document
        .iter()
        .filter(|(key, _)| *key != ID_KEY && *key != GEO_KEY)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let properties = match rest.get(LIST_PROPERTIES_KEY) {
        Some(Value::Array(list)) if rest.len() == 1 => Properties::List(list.clone()),
        _ => {
            // A nested properties object is lifted like in free-form input.
            if let Some(Value::Object(nested)) = rest.shift_remove(LIST_PROPERTIES_KEY) {
                rest.extend(nested);
            }
            Properties::Map(rest)
        }
    };
    item = item.with_properties(properties);

    if let Some(id) = document.get(ID_KEY) {
        item.set_external_id(parse_id(id));
    }
    Ok(item)
}

/// Inserts a new record or replaces a saved one.
pub fn save<H>(item: &mut GeoItem, handle: &mut H) -> Result<()>
where
    H: DocumentHandle + ?Sized,
{
    let mut document = to_document(item)?;
    match item.external_id() {
        Some(id) => handle.replace(id, &document),
        None => {
            document.shift_remove(ID_KEY);
            let id = handle.insert(&document)?;
            log::debug!("Inserted document {}", id);
            item.set_external_id(id);
            Ok(())
        }
    }
}

/// Removes a saved record's document and clears its identifier.
pub fn delete<H>(item: &mut GeoItem, handle: &mut H) -> Result<()>
where
    H: DocumentHandle + ?Sized,
{
    let id = item.external_id().cloned().ok_or_else(|| {
        MapError::InvalidInput("record was never saved; nothing to delete".to_string())
    })?;
    handle.remove(&id)?;
    item.clear_external_id();
    Ok(())
}

/// Reads every document as a record.
pub fn load_all<H>(handle: &H) -> Result<Vec<GeoItem>>
where
    H: DocumentHandle + ?Sized,
{
    handle.find_all()?.iter().map(from_document).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryCollection;
    use mapplz_types::geo::GeometryKind;
    use serde_json::json;

    fn as_map(value: Value) -> PropertyMap {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {}", other),
        }
    }

    #[test]
    fn test_document_shape() {
        let mut item = GeoItem::point(40.0, -70.0).unwrap();
        item.set("label", "hello world").unwrap();
        item.set_external_id("abc");

        let document = to_document(&item).unwrap();
        assert_eq!(
            Value::Object(document),
            json!({
                "_id": "abc",
                "geo": {"type": "Point", "coordinates": [-70.0, 40.0]},
                "label": "hello world"
            })
        );
    }

    #[test]
    fn test_from_document_with_oid() {
        let document = as_map(json!({
            "_id": {"$oid": "5f1d7a"},
            "geo": {"type": "Polygon", "coordinates": [[[0, 0], [2, 0], [2, 2], [0, 0]]]},
            "name": "triangle"
        }));
        let item = from_document(&document).unwrap();
        assert_eq!(item.kind(), GeometryKind::Polygon);
        assert_eq!(item.get("name"), Some(&json!("triangle")));
        assert_eq!(item.external_id(), Some(&ExternalId::from("5f1d7a")));
    }

    #[test]
    fn test_list_properties_survive() {
        let item = GeoItem::point(1.0, 2.0)
            .unwrap()
            .with_properties(Properties::List(vec![json!(3), json!(4)]));
        let back = from_document(&to_document(&item).unwrap()).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_missing_geo_fails() {
        let document = as_map(json!({"label": "nowhere"}));
        assert!(matches!(
            from_document(&document),
            Err(MapError::MalformedGeometry(_))
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let mut collection = MemoryCollection::new();
        let mut item = GeoItem::point(40.0, -70.0).unwrap();
        item.set("label", "first").unwrap();

        save(&mut item, &mut collection).unwrap();
        assert!(item.external_id().is_some());

        item.set("label", "second").unwrap();
        save(&mut item, &mut collection).unwrap();

        let loaded = load_all(&collection).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].get("label"), Some(&json!("second")));
        assert_eq!(loaded[0].external_id(), item.external_id());

        delete(&mut item, &mut collection).unwrap();
        assert!(load_all(&collection).unwrap().is_empty());
    }
}
