//! Conversion between [`GeoItem`] records and GeoJSON / WKT text.
//!
//! GeoJSON and WKT store coordinates longitude first; records store them
//! latitude first. The axes are flipped exactly once, inside this module.

pub mod geojson;
pub mod wkt;

use crate::error::Result;
use crate::item::GeoItem;

pub use self::geojson::{decode_geojson, decode_geojson_value, encode_feature, encode_geojson};
pub use self::wkt::{decode_wkt, encode_wkt, is_wkt};

/// Decodes geometry text of either flavor: WKT when it starts with a
/// geometry keyword, GeoJSON otherwise.
///
/// # Examples
///
/// ```
/// use mapplz::codec::decode_text;
///
/// let from_wkt = decode_text("POINT(-70 40)").unwrap();
/// let from_json = decode_text(r#"{"type":"Point","coordinates":[-70,40]}"#).unwrap();
/// assert_eq!(from_wkt, from_json);
/// assert_eq!(from_wkt[0].lat(), Some(40.0));
/// ```
pub fn decode_text(text: &str) -> Result<Vec<GeoItem>> {
    if is_wkt(text) {
        Ok(vec![decode_wkt(text)?])
    } else {
        decode_geojson(text)
    }
}
