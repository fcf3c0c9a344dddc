//! # hydroprep-acquire
//!
//! Tiled retrieval of remote soil and land-cover data and its reassembly
//! into a single dataset clipped to an area of interest.
//!
//! The flow shared by both pipelines:
//! 1. [`tiler::plan_tiles`] splits the AOI extent into overlapping requests
//! 2. [`fetch::acquire`] runs them against a [`fetch::TileSource`] with retry
//! 3. [`merge::merge_features`] or [`mosaic::mosaic`] reassembles the tiles
//! 4. [`clip::clip_features`] or [`clip::clip_raster`] cuts to the AOI
//!
//! Remote services sit behind [`http::HttpClient`] and
//! [`tabular::TabularService`] so everything above can run against canned
//! responses.

pub mod clip;
mod error;
pub mod fetch;
pub mod gml;
pub mod http;
pub mod merge;
pub mod mosaic;
pub mod tabular;
pub mod tiler;
pub mod wcs;
pub mod wfs;

pub use error::AcquireError;
pub use fetch::{acquire, FetchFailure, FetchReport, FetchResult, RetryPolicy, Schedule, TileSource};
pub use http::{FetchStats, HttpClient, HttpConfig, ReqwestClient};
pub use tiler::{plan_tiles, Tile, TilingPolicy};

/// Result type for acquisition operations.
pub type Result<T> = std::result::Result<T, AcquireError>;
