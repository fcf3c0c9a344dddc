//! Command-line interface.

use crate::config::RunnerConfig;
use crate::Result;
use clap::{Parser, Subcommand};
use hydroprep_landcover::{export_default_csv, get_nlcd_and_convert};
use hydroprep_soils::{acquire_ssurgo_data, generate_soils_classes, get_soils_hydro_group};
use std::path::PathBuf;
use tracing::{info, warn};

/// Prepare spatially varied soil and roughness inputs for hydrologic models.
#[derive(Parser, Debug)]
#[command(name = "hydroprep", version, about, long_about = None)]
pub struct Cli {
    /// Log at debug level.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// YAML configuration file with `soils:` and `landcover:` sections.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Skip TLS certificate verification.
    #[arg(long, global = true)]
    pub insecure: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download SSURGO soils for an AOI and classify hydrologic groups.
    Soils {
        /// AOI file (.geojson, .json or .gpkg).
        #[arg(long)]
        aoi: PathBuf,
        /// Output directory.
        #[arg(short, long)]
        output: PathBuf,
        /// Stop after writing ssurgo_data.gpkg.
        #[arg(long)]
        acquire_only: bool,
    },
    /// Classify an existing ssurgo_data.gpkg into hydrologic groups.
    HydroGroups {
        /// Soils GeoPackage.
        #[arg(long)]
        soils: PathBuf,
        /// Output directory.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Download NLCD land cover and convert it to Manning's n.
    Mannings {
        /// AOI file (.geojson, .json or .gpkg).
        #[arg(long)]
        aoi: PathBuf,
        /// Output directory.
        #[arg(short, long)]
        output: PathBuf,
        /// Lookup CSV with columns value, nlcd_name, mannings_n.
        #[arg(long)]
        lookup: Option<PathBuf>,
    },
    /// Write the default NLCD to Manning's n lookup table.
    ExportLookup {
        /// Destination .csv file.
        path: PathBuf,
    },
}

/// Execute the parsed command line.
pub fn run(cli: &Cli) -> Result<()> {
    let mut config = RunnerConfig::load(cli.config.as_deref())?;
    if cli.insecure {
        warn!("TLS certificate verification is disabled");
        config.allow_invalid_certs();
    }

    match &cli.command {
        Command::Soils {
            aoi,
            output,
            acquire_only: true,
        } => {
            let outcome = acquire_ssurgo_data(aoi, output, &config.soils)?;
            info!("{} soil polygon(s) written to {}", outcome.features, outcome.output.display());
        }
        Command::Soils { aoi, output, .. } => {
            let outcome = generate_soils_classes(aoi, output, &config.soils)?;
            info!(
                "{} soil class(es) written to {}",
                outcome.class_count,
                outcome.classes.display()
            );
        }
        Command::HydroGroups { soils, output } => {
            let outcome = get_soils_hydro_group(soils, output, &config.soils)?;
            info!(
                "{} soil class(es) written to {}",
                outcome.class_count,
                outcome.classes.display()
            );
        }
        Command::Mannings { aoi, output, lookup } => {
            let outcome = get_nlcd_and_convert(aoi, output, lookup.as_deref(), &config.landcover)?;
            if !outcome.failed_requests.is_empty() {
                warn!(
                    "{} tile(s) could not be retrieved; the output has gaps",
                    outcome.failed_requests.len()
                );
            }
        }
        Command::ExportLookup { path } => export_default_csv(path)?,
    }
    Ok(())
}
