//! Land-cover coverage tiles from the MRLC Web Coverage Service.

use crate::fetch::TileSource;
use crate::http::HttpClient;
use crate::tiler::Tile;
use crate::{AcquireError, Result};
use hydroprep_geo::geotiff::{is_tiff, read_geotiff_from_bytes};
use hydroprep_geo::{Crs, Extent, Raster};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// WCS endpoint serving the NLCD 2021 CONUS land-cover layer.
pub const NLCD_WCS_URL: &str = "https://www.mrlc.gov/geoserver/mrlc_download/NLCD_2021_Land_Cover_L48/wcs";

/// Coverage id of the NLCD 2021 CONUS land-cover layer.
pub const NLCD_COVERAGE_ID: &str = "NLCD_2021_Land_Cover_L48";

/// CRS of the subsetting coordinates (CONUS Albers).
pub const SUBSETTING_CRS: &str = "http://www.opengis.net/def/crs/EPSG/0/5070";

/// Endpoint settings for the land-cover coverage service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WcsEndpoint {
    /// Service base URL, without query string.
    pub base_url: String,
    /// Coverage to request.
    pub coverage_id: String,
}

impl Default for WcsEndpoint {
    fn default() -> Self {
        Self {
            base_url: NLCD_WCS_URL.to_string(),
            coverage_id: NLCD_COVERAGE_ID.to_string(),
        }
    }
}

/// [`TileSource`] issuing one GetCoverage request per tile.
///
/// Tile bounds are EPSG:5070 metres. Responses must be GeoTIFF; a tile
/// without georeferencing is assumed to be in the subsetting CRS.
#[derive(Debug)]
pub struct NlcdWcs<C> {
    client: C,
    endpoint: WcsEndpoint,
}

impl<C: HttpClient> NlcdWcs<C> {
    /// Use the public endpoint.
    pub fn new(client: C) -> Self {
        Self::with_endpoint(client, WcsEndpoint::default())
    }

    /// Use a custom endpoint.
    pub fn with_endpoint(client: C, endpoint: WcsEndpoint) -> Self {
        Self { client, endpoint }
    }

    /// The underlying HTTP client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// GetCoverage URL for an Albers bounding box.
    pub fn request_url(&self, bounds: &Extent) -> String {
        format!(
            "{}?service=WCS&version=2.0.1&request=getcoverage&coverageid={}&subset=Y({},{})&subset=X({},{})&SubsettingCRS={}",
            self.endpoint.base_url,
            self.endpoint.coverage_id,
            bounds.min_y,
            bounds.max_y,
            bounds.min_x,
            bounds.max_x,
            SUBSETTING_CRS
        )
    }
}

impl<C: HttpClient> TileSource for NlcdWcs<C> {
    type Output = Raster<u8>;

    fn describe(&self, tile: &Tile) -> String {
        self.request_url(&tile.bounds)
    }

    fn fetch(&self, tile: &Tile) -> Result<Raster<u8>> {
        let url = self.request_url(&tile.bounds);
        let body = self.client.get(&url)?;
        if body.is_empty() {
            return Err(AcquireError::EmptyResponse(url));
        }
        if !is_tiff(&body) {
            return Err(non_tiff_error(url, &body));
        }

        let mut raster = read_geotiff_from_bytes::<u8>(&body)?;
        if raster.crs().is_none() {
            warn!("Coverage tile {} carries no CRS; assuming EPSG:5070", tile.index);
            raster.set_crs(Some(Crs::CONUS_ALBERS));
        }
        debug!(
            "Coverage tile {}: {}x{} pixels",
            tile.index,
            raster.cols(),
            raster.rows()
        );
        Ok(raster)
    }
}

fn non_tiff_error(url: String, body: &[u8]) -> AcquireError {
    let text = String::from_utf8_lossy(&body[..body.len().min(512)]).into_owned();
    if text.trim_start().starts_with('<') && text.contains("Exception") {
        AcquireError::ServiceException(text)
    } else {
        AcquireError::NotGeoTiff { url, detail: text }
    }
}
