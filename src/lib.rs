//! Geometry normalization and in-memory spatial queries.
//!
//! Points, paths, GeoJSON, WKT, tabular rows and a small map description
//! language all normalize into one record type, [`GeoItem`], which a
//! [`MapStore`] can filter by attribute, rank by distance and test for
//! containment.
//!
//! ```rust
//! use mapplz::{LatLng, MapStore};
//! use serde_json::json;
//!
//! let mut store = MapStore::new();
//! store.add(json!([40, -70, {"label": "hello world"}]))?;
//! store.add("LINESTRING(-70 40, -71 41)")?;
//! store.add("lat,lng,label\n41,-72,from a spreadsheet")?;
//!
//! assert_eq!(store.count(Some("lat > 40.5"), None)?, 1);
//!
//! let square = [[39.0, -73.0], [39.0, -69.0], [42.0, -69.0], [42.0, -73.0], [39.0, -73.0]]
//!     .map(LatLng::from);
//! assert_eq!(store.inside(&square)?.len(), 3);
//!
//! let geojson = store.to_geojson()?;
//! assert!(geojson.contains("FeatureCollection"));
//! # Ok::<(), mapplz::MapError>(())
//! ```

pub mod builder;
pub mod codec;
pub mod compute;
pub mod config;
pub mod error;
pub mod ingest;
pub mod item;
pub mod minilang;
pub mod query;
pub mod render;
pub mod storage;
pub mod store;

pub use builder::StoreBuilder;
pub use config::{Config, TabularConfig};
pub use error::{MapError, Result};
pub use ingest::{GeoInput, Ingestor, standardize};
pub use item::{ExternalId, GeoItem, Geometry, Properties, PropertyMap};
pub use minilang::MapDocument;
pub use query::{Condition, Operand, Operator};
pub use render::{MapCenter, MapRenderer, RenderConfig};
pub use store::{Added, MapStore};

pub use mapplz_types::geo::{DistanceMetric, GeometryKind, LatLng};

pub use compute::spatial::{centroid, distance_between, nearest, point_in_ring};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{MapError, MapStore, Result, StoreBuilder};

    pub use crate::{GeoItem, Geometry, GeometryKind, LatLng, Properties};

    pub use crate::{Config, DistanceMetric};

    pub use crate::{MapRenderer, RenderConfig};

    pub use crate::storage::{DocumentHandle, RelationalHandle};
}
