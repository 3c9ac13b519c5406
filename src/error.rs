//! Error types for MapPLZ.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MapError>;

/// Errors raised by ingestion, codecs, queries and spatial computations.
#[derive(Debug, Error)]
pub enum MapError {
    /// Point-shaped input without a usable latitude and longitude.
    #[error("missing coordinate: {0}")]
    MissingCoordinate(String),

    /// Text that is neither JSON, tabular rows, nor the map mini-language.
    #[error("unrecognized format: {0}")]
    UnrecognizedFormat(String),

    /// Condition operator outside `<`, `<=`, `>`, `>=`, `=`.
    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),

    /// WKT or GeoJSON that is present but structurally incomplete.
    #[error("malformed geometry: {0}")]
    MalformedGeometry(String),

    /// Zero-area input to a centroid computation.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// Failure reported by an external storage collaborator.
    #[error("backend error: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<serde_json::Error> for MapError {
    fn from(err: serde_json::Error) -> Self {
        MapError::Serialization(err.to_string())
    }
}
