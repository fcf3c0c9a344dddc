//! # hydroprep-geo
//!
//! Geometry, raster and file-format support for the hydroprep acquisition
//! pipelines.
//!
//! This crate provides:
//! - [`Extent`]: axis-aligned rectangles in some CRS
//! - [`Crs`] and [`reproject`]: EPSG systems from the `crs-definitions`
//!   registry, projected with `proj4rs`
//! - [`AreaOfInterest`]: the user's study-area polygons, read from GeoJSON,
//!   GeoPackage or Shapefile
//! - [`FeatureCollection`]: polygon features with typed attributes
//! - [`Raster`]: single-band georeferenced grids over `ndarray`
//! - GeoTIFF ([`geotiff`]) and GeoPackage ([`gpkg`]) readers and writers,
//!   with geometry blobs encoded through `geozero` ([`wkb`])
//!
//! ## Example
//!
//! ```no_run
//! use hydroprep_geo::{AreaOfInterest, Crs};
//!
//! let aoi = AreaOfInterest::from_file("watershed.geojson")?;
//! let albers = aoi.reprojected(Crs::CONUS_ALBERS)?;
//! println!("AOI extent in EPSG:5070: {}", albers.extent()?);
//! # Ok::<(), hydroprep_geo::GeoError>(())
//! ```

mod aoi;
pub mod crs;
mod error;
mod extent;
pub mod feature;
pub mod geotiff;
pub mod gpkg;
pub mod raster;
pub mod rasterize;
pub mod wkb;

pub use aoi::AreaOfInterest;
pub use crs::{reproject, Crs};
pub use error::GeoError;
pub use extent::Extent;
pub use feature::{union_all, AttributeValue, Feature, FeatureCollection};
pub use raster::{GeoTransform, Pixel, Raster};

/// Result type for geometry and file operations.
pub type Result<T> = std::result::Result<T, GeoError>;
