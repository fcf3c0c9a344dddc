//! Soil map-unit polygons from the SSURGO Web Feature Service.

use crate::fetch::TileSource;
use crate::gml::parse_feature_collection;
use crate::http::HttpClient;
use crate::tiler::Tile;
use crate::{AcquireError, Result};
use hydroprep_geo::{Extent, FeatureCollection};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Public Soil Data Mart WFS (geographic coordinates).
pub const SSURGO_WFS_URL: &str = "https://sdmdataaccess.nrcs.usda.gov/Spatial/SDMWGS84Geographic.wfs";

/// Feature type holding map-unit polygons.
pub const MAPUNIT_TYPE_NAME: &str = "MapunitPoly";

/// Endpoint settings for the soils feature service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WfsEndpoint {
    /// Service base URL, without query string.
    pub base_url: String,
    /// Feature type to request.
    pub type_name: String,
}

impl Default for WfsEndpoint {
    fn default() -> Self {
        Self {
            base_url: SSURGO_WFS_URL.to_string(),
            type_name: MAPUNIT_TYPE_NAME.to_string(),
        }
    }
}

/// [`TileSource`] issuing one GetFeature request per tile.
///
/// Tile bounds are longitude/latitude degrees.
#[derive(Debug)]
pub struct SsurgoWfs<C> {
    client: C,
    endpoint: WfsEndpoint,
}

impl<C: HttpClient> SsurgoWfs<C> {
    /// Use the public endpoint.
    pub fn new(client: C) -> Self {
        Self::with_endpoint(client, WfsEndpoint::default())
    }

    /// Use a custom endpoint.
    pub fn with_endpoint(client: C, endpoint: WfsEndpoint) -> Self {
        Self { client, endpoint }
    }

    /// The underlying HTTP client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// GetFeature URL for a lon/lat bounding box.
    pub fn request_url(&self, bounds: &Extent) -> String {
        format!(
            "{}?SERVICE=WFS&VERSION=1.0.0&REQUEST=GetFeature&TYPENAME={}&BBOX={},{},{},{}&SRSNAME=EPSG:4326&OUTPUTFORMAT=GML3",
            self.endpoint.base_url,
            self.endpoint.type_name,
            bounds.min_x,
            bounds.min_y,
            bounds.max_x,
            bounds.max_y
        )
    }
}

impl<C: HttpClient> TileSource for SsurgoWfs<C> {
    type Output = FeatureCollection;

    fn describe(&self, tile: &Tile) -> String {
        self.request_url(&tile.bounds)
    }

    fn fetch(&self, tile: &Tile) -> Result<FeatureCollection> {
        let url = self.request_url(&tile.bounds);
        let body = self.client.get(&url)?;
        let features = parse_feature_collection(&body)?;
        if features.is_empty() {
            return Err(AcquireError::EmptyResponse(url));
        }
        debug!("{} feature(s) for {}", features.len(), tile);
        Ok(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Canned {
        body: &'static str,
        urls: Mutex<Vec<String>>,
    }

    impl HttpClient for Canned {
        fn get(&self, url: &str) -> Result<Vec<u8>> {
            self.urls.lock().unwrap().push(url.to_string());
            Ok(self.body.as_bytes().to_vec())
        }

        fn post_json(&self, _url: &str, _body: &serde_json::Value) -> Result<Vec<u8>> {
            unreachable!("feature service only issues GET requests")
        }
    }

    fn tile(bounds: Extent) -> Tile {
        Tile {
            index: 0,
            row: 0,
            col: 0,
            cell: bounds,
            bounds,
        }
    }

    #[test]
    fn test_request_url() {
        let wfs = SsurgoWfs::new(Canned {
            body: "",
            urls: Mutex::new(Vec::new()),
        });
        let url = wfs.request_url(&Extent::new(-80.0, -79.9, 35.0, 35.1).unwrap());
        assert_eq!(
            url,
            "https://sdmdataaccess.nrcs.usda.gov/Spatial/SDMWGS84Geographic.wfs?SERVICE=WFS&VERSION=1.0.0&REQUEST=GetFeature&TYPENAME=MapunitPoly&BBOX=-80,35,-79.9,35.1&SRSNAME=EPSG:4326&OUTPUTFORMAT=GML3"
        );
    }

    #[test]
    fn test_fetch_parses_features() {
        let body = r#"<wfs:FeatureCollection xmlns:wfs="w" xmlns:gml="g" xmlns:ms="m">
          <gml:featureMember><ms:mapunitpoly>
            <ms:msGeometry><gml:Polygon srsName="EPSG:4326"><gml:exterior><gml:LinearRing>
              <gml:posList>-80 35 -79.9 35 -79.9 35.1 -80 35</gml:posList>
            </gml:LinearRing></gml:exterior></gml:Polygon></ms:msGeometry>
            <ms:mukey>545801</ms:mukey>
          </ms:mapunitpoly></gml:featureMember>
        </wfs:FeatureCollection>"#;
        let wfs = SsurgoWfs::new(Canned {
            body,
            urls: Mutex::new(Vec::new()),
        });
        let t = tile(Extent::new(-80.0, -79.9, 35.0, 35.1).unwrap());
        let fc = wfs.fetch(&t).unwrap();
        assert_eq!(fc.len(), 1);
        assert_eq!(wfs.client().urls.lock().unwrap()[0], wfs.describe(&t));
    }

    #[test]
    fn test_empty_response_is_an_error() {
        let wfs = SsurgoWfs::new(Canned {
            body: r#"<wfs:FeatureCollection xmlns:wfs="w"/>"#,
            urls: Mutex::new(Vec::new()),
        });
        let t = tile(Extent::new(0.0, 1.0, 0.0, 1.0).unwrap());
        assert!(matches!(wfs.fetch(&t), Err(AcquireError::EmptyResponse(_))));
    }
}
