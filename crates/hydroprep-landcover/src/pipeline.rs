//! End-to-end land-cover workflow: fetch NLCD for an AOI, convert it to
//! Manning's n and write both rasters clipped to the AOI.

use crate::lookup::RoughnessLookup;
use crate::remap::{remap_to_roughness, UnmappedCodes};
use crate::Result;
use hydroprep_acquire::clip::clip_raster;
use hydroprep_acquire::mosaic::mosaic;
use hydroprep_acquire::wcs::{NlcdWcs, WcsEndpoint};
use hydroprep_acquire::{
    acquire, plan_tiles, HttpConfig, ReqwestClient, RetryPolicy, Schedule, TileSource,
    TilingPolicy,
};
use hydroprep_geo::geotiff::write_geotiff;
use hydroprep_geo::{AreaOfInterest, Crs, Raster};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Clipped land-cover codes.
pub const NLCD_FILE: &str = "nlcd_clip.tif";
/// Clipped roughness.
pub const MANNINGS_N_FILE: &str = "mannings_n_clip.tif";
/// No-data value of the land-cover output.
pub const LANDCOVER_NODATA: u8 = 0;
/// Coverage requests are large; they get a longer timeout than the soils services.
pub const LANDCOVER_TIMEOUT_SECS: u64 = 300;

/// Settings for the land-cover workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandcoverConfig {
    /// HTTP client settings. Absent fields fall back to the land-cover defaults.
    #[serde(deserialize_with = "landcover_http")]
    pub http: HttpConfig,
    /// Tile size and overlap (metres) and single-request threshold
    /// (square degrees of the geographic bounding box).
    pub tiling: TilingPolicy,
    /// Attempts per tile and retry pass.
    pub retry: RetryPolicy,
    /// Coverage service.
    pub wcs: WcsEndpoint,
}

impl Default for LandcoverConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::with_timeout(LANDCOVER_TIMEOUT_SECS),
            tiling: TilingPolicy::LANDCOVER,
            retry: RetryPolicy::LANDCOVER,
            wcs: WcsEndpoint::default(),
        }
    }
}

fn landcover_http<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<HttpConfig, D::Error> {
    HttpConfig::deserialize_over(deserializer, HttpConfig::with_timeout(LANDCOVER_TIMEOUT_SECS))
}

/// Result of [`get_nlcd_and_convert`].
#[derive(Debug, Clone)]
pub struct LandcoverOutcome {
    /// Written land-cover raster.
    pub nlcd: PathBuf,
    /// Written roughness raster.
    pub mannings_n: PathBuf,
    /// Requests that failed even after retry.
    pub failed_requests: Vec<String>,
    /// Land-cover codes the lookup did not cover.
    pub unmapped: UnmappedCodes,
}

/// Load the lookup table, or the built-in one when `path` is `None`.
pub fn load_lookup(path: Option<&Path>) -> Result<RoughnessLookup> {
    match path {
        Some(path) => RoughnessLookup::from_csv(path),
        None => {
            info!(
                "No Manning's n CSV provided; using the default NLCD lookup. \
                 Review the output and supply a CSV with columns value, nlcd_name, mannings_n if needed"
            );
            Ok(RoughnessLookup::default_nlcd())
        }
    }
}

/// Fetch NLCD for the AOI in `aoi_path` and write [`NLCD_FILE`] and
/// [`MANNINGS_N_FILE`] into `output_dir`.
///
/// A user lookup table is validated before any request is made.
pub fn get_nlcd_and_convert(
    aoi_path: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    lookup_csv: Option<&Path>,
    config: &LandcoverConfig,
) -> Result<LandcoverOutcome> {
    let lookup = load_lookup(lookup_csv)?;
    let aoi = AreaOfInterest::from_file(aoi_path)?;
    let client = ReqwestClient::new(&config.http)?;
    let wcs = NlcdWcs::with_endpoint(client, config.wcs.clone());
    let outcome = convert_with_lookup(&wcs, &aoi, output_dir, &lookup, config)?;

    let stats = wcs.client().stats();
    info!(
        "HTTP: {} ok, {} failed, {} bytes received",
        stats.requests_ok, stats.requests_failed, stats.bytes_received
    );
    Ok(outcome)
}

/// [`get_nlcd_and_convert`] against any coverage source.
pub fn get_nlcd_and_convert_with<S>(
    source: &S,
    aoi: &AreaOfInterest,
    output_dir: impl AsRef<Path>,
    lookup_csv: Option<&Path>,
    config: &LandcoverConfig,
) -> Result<LandcoverOutcome>
where
    S: TileSource<Output = Raster<u8>> + ?Sized,
{
    let lookup = load_lookup(lookup_csv)?;
    convert_with_lookup(source, aoi, output_dir, &lookup, config)
}

fn convert_with_lookup<S>(
    source: &S,
    aoi: &AreaOfInterest,
    output_dir: impl AsRef<Path>,
    lookup: &RoughnessLookup,
    config: &LandcoverConfig,
) -> Result<LandcoverOutcome>
where
    S: TileSource<Output = Raster<u8>> + ?Sized,
{
    let aoi = aoi.dissolved();
    let area = aoi.reprojected(Crs::WGS84)?.extent()?.area();
    info!("Study area: {:.6} sq. deg.", area);

    let aoi_albers = aoi.reprojected(Crs::CONUS_ALBERS)?;
    let extent = aoi_albers.extent()?;
    let tiles = plan_tiles(&extent, aoi_albers.geometry(), &config.tiling, area)?;
    info!("Acquiring NLCD data for {} tile(s)", tiles.len());

    let report = acquire(source, &tiles, &config.retry, Schedule::Serial)?;
    let failed_requests: Vec<String> = report
        .failed_requests()
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut unmapped = UnmappedCodes::default();
    let mut land_cover = Vec::with_capacity(report.retrieved.len());
    let mut roughness = Vec::with_capacity(report.retrieved.len());
    for (_, tile) in report.retrieved {
        let (n, missing) = remap_to_roughness(&tile, lookup);
        unmapped.merge(&missing);
        roughness.push(n);
        land_cover.push(tile);
    }

    let land_cover = mosaic(&land_cover, LANDCOVER_NODATA)?;
    let roughness = mosaic(&roughness, f32::NAN)?;
    let land_cover = clip_raster(&land_cover, &aoi_albers, LANDCOVER_NODATA)?;
    let roughness = clip_raster(&roughness, &aoi_albers, f32::NAN)?;

    let output_dir = output_dir.as_ref();
    std::fs::create_dir_all(output_dir)?;
    let nlcd = output_dir.join(NLCD_FILE);
    let mannings_n = output_dir.join(MANNINGS_N_FILE);
    write_geotiff(&land_cover, &nlcd)?;
    write_geotiff(&roughness, &mannings_n)?;
    info!("NLCD image saved to {}", nlcd.display());
    info!("Manning's n raster saved to {}", mannings_n.display());

    Ok(LandcoverOutcome {
        nlcd,
        mannings_n,
        failed_requests,
        unmapped,
    })
}
