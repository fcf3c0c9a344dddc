//! Error types for the soils pipeline.

use hydroprep_acquire::AcquireError;
use hydroprep_geo::GeoError;
use thiserror::Error;

/// Errors that can occur while acquiring or classifying soils.
#[derive(Debug, Error)]
pub enum SoilsError {
    /// Remote acquisition failed.
    #[error(transparent)]
    Acquire(#[from] AcquireError),

    /// Geometry or file-format error.
    #[error(transparent)]
    Geo(#[from] GeoError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV output error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The soils layer lacks the map-unit key field.
    #[error("Soils layer has no '{0}' field")]
    MissingField(String),

    /// A component row from the tabular service could not be interpreted.
    #[error("Invalid component row {index}: {reason}")]
    InvalidRow {
        /// Zero-based row position.
        index: usize,
        /// What was wrong.
        reason: String,
    },
}
