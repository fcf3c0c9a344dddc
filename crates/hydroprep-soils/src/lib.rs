//! # hydroprep-soils
//!
//! Soil inputs for curve-number runoff modelling.
//!
//! [`acquire_ssurgo_data`] downloads SSURGO map-unit polygons covering an
//! area of interest and writes them, clipped, to `ssurgo_data.gpkg`.
//! [`get_soils_hydro_group`] looks up the components of every map unit,
//! assigns each unit its dominant hydrologic soil group and writes the
//! dissolved groups to `ssurgo_soil_classes.gpkg`. [`generate_soils_classes`]
//! runs both.
//!
//! ```no_run
//! use hydroprep_soils::{generate_soils_classes, SoilsConfig};
//!
//! let outcome = generate_soils_classes("watershed.geojson", "out", &SoilsConfig::default())?;
//! println!("{} soil classes", outcome.class_count);
//! # Ok::<(), hydroprep_soils::SoilsError>(())
//! ```

mod error;
pub mod hydrogroup;
pub mod pipeline;

pub use error::SoilsError;
pub use pipeline::{
    acquire_ssurgo_data, acquire_ssurgo_data_from, generate_soils_classes,
    generate_soils_classes_with, get_soils_hydro_group, get_soils_hydro_group_with,
    AcquireOutcome, ClassifyOutcome, SoilsConfig,
};

/// Result type for the soils workflow.
pub type Result<T> = std::result::Result<T, SoilsError>;
