//! Error types for the land-cover pipeline.

use hydroprep_acquire::AcquireError;
use hydroprep_geo::GeoError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building roughness rasters.
#[derive(Debug, Error)]
pub enum LandcoverError {
    /// Remote acquisition or reassembly failed.
    #[error(transparent)]
    Acquire(#[from] AcquireError),

    /// Geometry, raster or file-format error.
    #[error(transparent)]
    Geo(#[from] GeoError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed lookup CSV.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The lookup CSV lacks a required column.
    #[error("Required field '{column}' not found in {}", .path.display())]
    MissingColumn {
        /// Lookup file.
        path: PathBuf,
        /// Missing column name.
        column: String,
    },

    /// A CSV output path without the `.csv` extension.
    #[error("Output path must end with .csv: {}", .0.display())]
    InvalidCsvExtension(PathBuf),
}
