//! Library side of the `hydroprep` binary: configuration loading and
//! command dispatch.

pub mod cli;
pub mod config;

use std::path::PathBuf;
use thiserror::Error;

pub use cli::{run, Cli, Command};
pub use config::RunnerConfig;

/// Anything that ends a run with a non-zero exit status.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The configuration file could not be parsed.
    #[error("Invalid configuration in {}: {source}", .path.display())]
    Config {
        /// Configuration file.
        path: PathBuf,
        /// Parser error.
        source: serde_yaml::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Soils pipeline failure.
    #[error(transparent)]
    Soils(#[from] hydroprep_soils::SoilsError),

    /// Land-cover pipeline failure.
    #[error(transparent)]
    Landcover(#[from] hydroprep_landcover::LandcoverError),
}

/// Result type for the runner.
pub type Result<T> = std::result::Result<T, RunnerError>;
