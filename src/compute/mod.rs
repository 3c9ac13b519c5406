//! Compute layer for geometric algorithms.
//!
//! This module keeps the numeric work apart from ingestion and storage:
//! - Spatial algorithms: centroid, point-in-polygon, distance ranking
//! - Coordinate coercion and validation for free-form input

pub mod spatial;
pub mod validation;
