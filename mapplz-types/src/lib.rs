//! # mapplz-types
//!
//! Plain value types shared by every layer of the MapPLZ geometry engine:
//!
//! - **Coordinates**: [`LatLng`], always stored latitude first
//! - **Geometry kinds**: [`GeometryKind`] (point, polyline, polygon)
//! - **Distance metrics**: [`DistanceMetric`] used for nearest-neighbor ranking
//!
//! ```rust
//! use mapplz_types::geo::LatLng;
//!
//! let statue = LatLng::new(40.6892, -74.0445);
//! let point: geo::Point<f64> = statue.into();
//! assert_eq!(point.x(), -74.0445);
//! assert_eq!(point.y(), 40.6892);
//! ```

pub mod geo;

pub use self::geo::{DistanceMetric, GeometryKind, LatLng};
