//! Error types for the acquisition crate.

use hydroprep_geo::GeoError;
use thiserror::Error;

/// Errors that can occur while acquiring and reassembling remote data.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// Geometry, raster or file-format error.
    #[error(transparent)]
    Geo(#[from] GeoError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error (connection, timeout, TLS).
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed XML in a service response.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Structurally invalid GML.
    #[error("Invalid GML: {0}")]
    InvalidGml(String),

    /// An OGC service returned an exception report instead of data.
    #[error("Service exception: {0}")]
    ServiceException(String),

    /// A tile request succeeded but carried no data.
    #[error("Empty response from {0}")]
    EmptyResponse(String),

    /// A coverage response was not a GeoTIFF.
    #[error("Response from {url} is not a GeoTIFF ({detail})")]
    NotGeoTiff {
        /// Request URL.
        url: String,
        /// Leading bytes of the payload, for diagnosis.
        detail: String,
    },

    /// Every tile request failed, even after the retry pass.
    #[error("No data retrieved: all {requested} tile request(s) failed")]
    NoDataRetrieved {
        /// Number of tiles that were requested.
        requested: usize,
    },

    /// Tiling parameters are unusable.
    #[error("Invalid tiling policy: {0}")]
    InvalidTiling(String),

    /// The fetch worker pool could not be created.
    #[error("Worker pool error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
