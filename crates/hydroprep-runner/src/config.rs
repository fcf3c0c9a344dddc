//! YAML run configuration.

use crate::{Result, RunnerError};
use hydroprep_landcover::LandcoverConfig;
use hydroprep_soils::SoilsConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Settings for both pipelines. Every field falls back to its default.
///
/// ```yaml
/// soils:
///   worker_fraction: 0.5
///   http:
///     timeout_secs: 60
/// landcover:
///   tiling:
///     tile_size: 50000
///     margin: 120
///     small_area_threshold: 9
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Soils pipeline.
    pub soils: SoilsConfig,
    /// Land-cover pipeline.
    pub landcover: LandcoverConfig,
}

impl RunnerConfig {
    /// Parse YAML text.
    pub fn from_yaml_str(text: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Load from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&text).map_err(|source| RunnerError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Turn off TLS certificate verification for every service.
    pub fn allow_invalid_certs(&mut self) {
        self.soils.http.accept_invalid_certs = true;
        self.landcover.http.accept_invalid_certs = true;
    }
}
