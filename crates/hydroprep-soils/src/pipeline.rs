//! End-to-end soils workflow: acquire SSURGO polygons for an AOI, then
//! classify them into hydrologic soil groups.

use crate::hydrogroup::{
    assign_hydro_groups, classify_soils, component_query, parse_component_rows, unique_mukeys,
    write_component_csv, write_hydrogroup_csv, MUKEY_FIELD,
};
use crate::Result;
use hydroprep_acquire::clip::clip_features;
use hydroprep_acquire::fetch::worker_count;
use hydroprep_acquire::merge::merge_features;
use hydroprep_acquire::tabular::{SdaTabularClient, TabularEndpoint, TabularService};
use hydroprep_acquire::wfs::{SsurgoWfs, WfsEndpoint};
use hydroprep_acquire::{
    acquire, plan_tiles, HttpConfig, ReqwestClient, RetryPolicy, Schedule, TileSource,
    TilingPolicy,
};
use hydroprep_geo::gpkg::{read_features, write_features};
use hydroprep_geo::{AreaOfInterest, Crs, FeatureCollection};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Merged, clipped soil polygons.
pub const SSURGO_DATA_FILE: &str = "ssurgo_data.gpkg";
/// Dissolved hydrologic groups.
pub const SOIL_CLASSES_FILE: &str = "ssurgo_soil_classes.gpkg";
/// Raw component rows.
pub const COMPONENT_CSV_FILE: &str = "component_source_data.csv";
/// Chosen group per map unit.
pub const HYDROGROUP_CSV_FILE: &str = "hydrogroup_data.csv";

/// Request timeout of the soils services.
pub const SOILS_TIMEOUT_SECS: u64 = 120;

/// Settings for the soils workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoilsConfig {
    /// HTTP client settings shared by the feature and tabular services.
    /// Absent fields fall back to the soils defaults.
    #[serde(deserialize_with = "soils_http")]
    pub http: HttpConfig,
    /// Tile size, overlap and single-request threshold (degrees).
    pub tiling: TilingPolicy,
    /// Attempts per tile and retry pass.
    pub retry: RetryPolicy,
    /// Share of available cores used as fetch workers.
    pub worker_fraction: f64,
    /// Bounding box growth per side, as a fraction of its span.
    pub bbox_buffer_fraction: f64,
    /// Feature service.
    pub wfs: WfsEndpoint,
    /// Tabular service.
    pub tabular: TabularEndpoint,
}

impl Default for SoilsConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::with_timeout(SOILS_TIMEOUT_SECS),
            tiling: TilingPolicy::SOILS,
            retry: RetryPolicy::SOILS,
            worker_fraction: 0.25,
            bbox_buffer_fraction: 0.05,
            wfs: WfsEndpoint::default(),
            tabular: TabularEndpoint::default(),
        }
    }
}

fn soils_http<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<HttpConfig, D::Error> {
    HttpConfig::deserialize_over(deserializer, HttpConfig::with_timeout(SOILS_TIMEOUT_SECS))
}

/// Result of [`acquire_ssurgo_data`].
#[derive(Debug, Clone)]
pub struct AcquireOutcome {
    /// Written GeoPackage.
    pub output: PathBuf,
    /// Number of polygons written.
    pub features: usize,
    /// Requests that failed even after retry.
    pub failed_requests: Vec<String>,
}

/// Result of [`get_soils_hydro_group`].
#[derive(Debug, Clone)]
pub struct ClassifyOutcome {
    /// Written soil-class GeoPackage.
    pub classes: PathBuf,
    /// Written component CSV.
    pub component_csv: PathBuf,
    /// Written group CSV.
    pub hydrogroup_csv: PathBuf,
    /// Number of distinct classes.
    pub class_count: usize,
}

/// Download soil polygons for the AOI in `aoi_path` and write
/// [`SSURGO_DATA_FILE`] (EPSG:4326) into `output_dir`.
pub fn acquire_ssurgo_data(
    aoi_path: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &SoilsConfig,
) -> Result<AcquireOutcome> {
    let aoi = AreaOfInterest::from_file(aoi_path)?;
    let client = ReqwestClient::new(&config.http)?;
    let wfs = SsurgoWfs::with_endpoint(client, config.wfs.clone());
    let outcome = acquire_ssurgo_data_from(&wfs, &aoi, output_dir, config)?;
    log_stats(wfs.client());
    Ok(outcome)
}

/// [`acquire_ssurgo_data`] against any feature source.
pub fn acquire_ssurgo_data_from<S>(
    source: &S,
    aoi: &AreaOfInterest,
    output_dir: impl AsRef<Path>,
    config: &SoilsConfig,
) -> Result<AcquireOutcome>
where
    S: TileSource<Output = FeatureCollection> + ?Sized,
{
    let aoi_wgs84 = aoi.reprojected(Crs::WGS84)?;
    let extent = aoi_wgs84.extent()?.buffered(config.bbox_buffer_fraction);
    let area = extent.area();
    info!("Study area with buffer: {:.6} sq. deg.", area);

    let tiles = plan_tiles(&extent, aoi_wgs84.geometry(), &config.tiling, area)?;
    info!("Acquiring SSURGO data for {} tile(s)", tiles.len());
    let workers = worker_count(config.worker_fraction);
    let report = acquire(source, &tiles, &config.retry, Schedule::Parallel { workers })?;
    let failed_requests: Vec<String> = report
        .failed_requests()
        .into_iter()
        .map(str::to_string)
        .collect();

    let merged = merge_features(report.into_data(), Crs::WGS84, MUKEY_FIELD)?;

    // Clip in the AOI's own CRS, then store geographic coordinates.
    let merged = merged.reprojected(aoi.crs())?;
    let soils = clip_features(&merged, aoi)?.reprojected(Crs::WGS84)?;

    let output_dir = output_dir.as_ref();
    std::fs::create_dir_all(output_dir)?;
    let output = output_dir.join(SSURGO_DATA_FILE);
    info!("Exporting {} soil polygon(s) to {}", soils.len(), output.display());
    write_features(&output, &soils)?;

    Ok(AcquireOutcome {
        output,
        features: soils.len(),
        failed_requests,
    })
}

/// Classify the polygons in `soils_path` (normally [`SSURGO_DATA_FILE`])
/// into hydrologic groups, writing the two CSVs and [`SOIL_CLASSES_FILE`].
pub fn get_soils_hydro_group(
    soils_path: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &SoilsConfig,
) -> Result<ClassifyOutcome> {
    let client = ReqwestClient::new(&config.http)?;
    let service = SdaTabularClient::with_endpoint(client, config.tabular.clone());
    get_soils_hydro_group_with(&service, soils_path, output_dir)
}

/// [`get_soils_hydro_group`] against any tabular service.
pub fn get_soils_hydro_group_with<T: TabularService + ?Sized>(
    service: &T,
    soils_path: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
) -> Result<ClassifyOutcome> {
    let soils = read_features(soils_path)?;
    let mukeys = unique_mukeys(&soils)?;
    info!(
        "Getting component soil data for {} map unit key(s)",
        mukeys.len()
    );

    let rows = match component_query(&mukeys) {
        Some(query) => service.query(&query)?,
        None => Vec::new(),
    };
    let components = parse_component_rows(rows)?;

    let output_dir = output_dir.as_ref();
    std::fs::create_dir_all(output_dir)?;
    let component_csv = output_dir.join(COMPONENT_CSV_FILE);
    write_component_csv(&component_csv, &components)?;

    let groups = assign_hydro_groups(&components);
    let hydrogroup_csv = output_dir.join(HYDROGROUP_CSV_FILE);
    write_hydrogroup_csv(&hydrogroup_csv, &groups)?;

    info!("Creating hydrologic group layer");
    let classified = classify_soils(&soils, &groups)?;
    let classes = output_dir.join(SOIL_CLASSES_FILE);
    write_features(&classes, &classified)?;

    Ok(ClassifyOutcome {
        classes,
        component_csv,
        hydrogroup_csv,
        class_count: classified.len(),
    })
}

/// Acquire soils for the AOI in `aoi_path` and classify them.
pub fn generate_soils_classes(
    aoi_path: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &SoilsConfig,
) -> Result<ClassifyOutcome> {
    let aoi = AreaOfInterest::from_file(aoi_path)?;
    let client = Arc::new(ReqwestClient::new(&config.http)?);
    let wfs = SsurgoWfs::with_endpoint(Arc::clone(&client), config.wfs.clone());
    let tabular = SdaTabularClient::with_endpoint(Arc::clone(&client), config.tabular.clone());
    let outcome = generate_soils_classes_with(&wfs, &tabular, &aoi, output_dir, config)?;
    log_stats(&client);
    Ok(outcome)
}

/// [`generate_soils_classes`] against any feature and tabular services.
pub fn generate_soils_classes_with<S, T>(
    source: &S,
    service: &T,
    aoi: &AreaOfInterest,
    output_dir: impl AsRef<Path>,
    config: &SoilsConfig,
) -> Result<ClassifyOutcome>
where
    S: TileSource<Output = FeatureCollection> + ?Sized,
    T: TabularService + ?Sized,
{
    let output_dir = output_dir.as_ref();
    let acquired = acquire_ssurgo_data_from(source, aoi, output_dir, config)?;
    get_soils_hydro_group_with(service, &acquired.output, output_dir)
}

fn log_stats(client: &ReqwestClient) {
    let stats = client.stats();
    info!(
        "HTTP: {} ok, {} failed, {} bytes received",
        stats.requests_ok, stats.requests_failed, stats.bytes_received
    );
}
