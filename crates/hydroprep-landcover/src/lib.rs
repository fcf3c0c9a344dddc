//! # hydroprep-landcover
//!
//! Spatially varied Manning's n from the National Land Cover Database.
//!
//! [`get_nlcd_and_convert`] downloads NLCD land cover for an area of
//! interest, converts every class to a roughness coefficient through a
//! [`RoughnessLookup`] and writes both rasters clipped to the AOI.

mod error;
pub mod lookup;
pub mod pipeline;
pub mod remap;

pub use error::LandcoverError;
pub use lookup::{export_default_csv, RoughnessLookup};
pub use pipeline::{get_nlcd_and_convert, get_nlcd_and_convert_with, LandcoverConfig, LandcoverOutcome};
pub use remap::{remap_to_roughness, UnmappedCodes};

/// Result type for the land-cover workflow.
pub type Result<T> = std::result::Result<T, LandcoverError>;
