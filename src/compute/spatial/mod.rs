//! Spatial algorithms over in-memory records.

pub mod algorithms;
pub use algorithms::{
    DistanceMetric, centroid, distance_between, nearest, point_in_ring, reference_point,
};
