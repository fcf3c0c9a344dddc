//! Error types for the geometry and I/O crate.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when working with geometries, rasters and files.
#[derive(Debug, Error)]
pub enum GeoError {
    /// I/O error reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TIFF decoding or encoding error.
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// Invalid GeoTIFF - missing or malformed georeferencing tags.
    #[error("Invalid GeoTIFF: {0}")]
    InvalidGeoTiff(String),

    /// SQLite error while reading or writing a GeoPackage.
    #[error("GeoPackage database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Structurally invalid GeoPackage content.
    #[error("Invalid GeoPackage {}: {reason}", .path.display())]
    InvalidGeoPackage {
        /// Path of the offending file.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// GeoJSON parsing error.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// Shapefile reading error.
    #[error("Shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),

    /// Geometry encoding or decoding error.
    #[error("Geometry encoding error: {0}")]
    Geozero(#[from] geozero::error::GeozeroError),

    /// Malformed well-known binary geometry.
    #[error("Invalid WKB geometry: {0}")]
    InvalidWkb(String),

    /// The file extension does not map to a supported vector format.
    #[error("Unsupported vector format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// The EPSG code is not in the CRS registry.
    #[error("Unsupported CRS: EPSG:{0}")]
    UnsupportedCrs(u32),

    /// The registry definition for a code could not be turned into a projection.
    #[error("Cannot build projection for EPSG:{epsg}: {reason}")]
    InvalidProjection {
        /// EPSG code.
        epsg: u32,
        /// Parser message.
        reason: String,
    },

    /// A CRS name that could not be resolved to an EPSG code.
    #[error("Unrecognised CRS name '{0}'")]
    UnknownCrsName(String),

    /// A coordinate could not be projected (outside the projection's domain).
    #[error("Cannot project ({x}, {y}) from EPSG:{from} to EPSG:{to}")]
    ProjectionFailed {
        /// Input x coordinate.
        x: f64,
        /// Input y coordinate.
        y: f64,
        /// Source EPSG code.
        from: u32,
        /// Target EPSG code.
        to: u32,
    },

    /// Geometry is empty so no bounding box can be derived.
    #[error("Geometry is empty: {0}")]
    EmptyGeometry(String),

    /// An extent whose max does not exceed its min on some axis.
    #[error("Invalid extent ({min_x}, {max_x}, {min_y}, {max_y}): max must exceed min on both axes")]
    InvalidExtent {
        /// Minimum x.
        min_x: f64,
        /// Maximum x.
        max_x: f64,
        /// Minimum y.
        min_y: f64,
        /// Maximum y.
        max_y: f64,
    },

    /// Invalid raster dimensions.
    #[error("Invalid raster dimensions: {rows}x{cols} for {len} cells")]
    InvalidDimensions {
        /// Row count.
        rows: usize,
        /// Column count.
        cols: usize,
        /// Number of cells supplied.
        len: usize,
    },

    /// Two datasets that must share a CRS do not.
    #[error("CRS mismatch: EPSG:{0} vs EPSG:{1}")]
    CrsMismatch(u32, u32),

    /// A dataset carries no CRS where one is required.
    #[error("Dataset has no CRS")]
    MissingCrs,

    /// The clip geometry does not overlap the dataset.
    #[error("Clip geometry does not overlap the dataset")]
    NoOverlap,
}
