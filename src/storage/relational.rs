//! Adapter for relational geo databases.
//!
//! The caller owns the connection and the SQL. This module only converts
//! between records and the `(id, geometry text, property JSON)` shape such a
//! table exchanges, and sets or clears [`GeoItem::external_id`] around the
//! calls it makes on a [`RelationalHandle`].

use crate::codec::{geojson, wkt};
use crate::error::{MapError, Result};
use crate::item::{ExternalId, GeoItem, Properties};
use serde_json::Value;

/// One row read back from the table.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlRow {
    pub id: ExternalId,
    /// WKT, or GeoJSON geometry text when it starts with `{`.
    pub geometry: String,
    /// JSON object (or array) of properties; `None` for a NULL column.
    pub properties: Option<String>,
}

/// Values bound into an insert or update.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlParams {
    pub wkt: String,
    pub properties: String,
}

/// Connection to a table of geometries, implemented by the caller.
pub trait RelationalHandle {
    /// Inserts a row and returns its new identifier.
    fn insert(&mut self, params: &SqlParams) -> Result<ExternalId>;

    fn update(&mut self, id: &ExternalId, params: &SqlParams) -> Result<()>;

    fn delete(&mut self, id: &ExternalId) -> Result<()>;

    /// Every row, in table order.
    fn select_all(&self) -> Result<Vec<SqlRow>>;
}

/// Converts a record into insert/update parameters.
pub fn to_params(item: &GeoItem) -> Result<SqlParams> {
    Ok(SqlParams {
        wkt: wkt::encode_wkt(item),
        properties: serde_json::to_string(&item.properties().to_value())?,
    })
}

/// Rebuilds a record from a row, keeping the row id.
pub fn from_row(row: &SqlRow) -> Result<GeoItem> {
    let text = row.geometry.trim();
    let geometry = if text.starts_with('{') {
        let value: Value = serde_json::from_str(text)?;
        let mut geometries = geojson::decode_geometry_value(&value)?;
        match geometries.len() {
            1 => geometries.remove(0),
            n => {
                return Err(MapError::MalformedGeometry(format!(
                    "row {} holds {} geometries, expected one",
                    row.id, n
                )));
            }
        }
    } else {
        wkt::decode_geometry(text)?
    };

    let properties = match row.properties.as_deref().map(str::trim) {
        None | Some("") => Properties::default(),
        Some(json) => match serde_json::from_str::<Value>(json)? {
            Value::Object(map) => Properties::Map(map),
            Value::Array(list) => Properties::List(list),
            Value::Null => Properties::default(),
            other => {
                return Err(MapError::Serialization(format!(
                    "row {} properties must be an object or array, got {}",
                    row.id, other
                )));
            }
        },
    };

    let mut item = GeoItem::new(geometry)?.with_properties(properties);
    item.set_external_id(row.id.clone());
    Ok(item)
}

/// Inserts a new record or updates a saved one.
pub fn save<H>(item: &mut GeoItem, handle: &mut H) -> Result<()>
where
    H: RelationalHandle + ?Sized,
{
    let params = to_params(item)?;
    match item.external_id() {
        Some(id) => handle.update(id, &params),
        None => {
            let id = handle.insert(&params)?;
            log::debug!("Inserted row {}", id);
            item.set_external_id(id);
            Ok(())
        }
    }
}

/// Deletes a saved record's row and clears its identifier.
pub fn delete<H>(item: &mut GeoItem, handle: &mut H) -> Result<()>
where
    H: RelationalHandle + ?Sized,
{
    let id = item.external_id().cloned().ok_or_else(|| {
        MapError::InvalidInput("record was never saved; nothing to delete".to_string())
    })?;
    handle.delete(&id)?;
    item.clear_external_id();
    Ok(())
}

/// Reads every row as a record.
pub fn load_all<H>(handle: &H) -> Result<Vec<GeoItem>>
where
    H: RelationalHandle + ?Sized,
{
    handle.select_all()?.iter().map(from_row).collect()
}
