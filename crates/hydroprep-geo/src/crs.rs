//! Coordinate reference systems and reprojection.
//!
//! A [`Crs`] is an EPSG code. Definitions come from the `crs-definitions`
//! registry and coordinates are transformed with `proj4rs`, so any code in
//! the registry (state plane, NAD83(2011) UTM, national grids) can be read
//! and reprojected. Geographic systems take and return degrees.

use crate::{GeoError, Result};
use geo::{Coord, MapCoords};
use proj4rs::proj::Proj;
use proj4rs::transform::transform as proj_transform;
use serde::{Deserialize, Serialize};
use std::fmt;

/// EPSG code for WGS84 geographic coordinates.
pub const EPSG_WGS84: u32 = 4326;
/// EPSG code for NAD83 geographic coordinates.
pub const EPSG_NAD83: u32 = 4269;
/// EPSG code for NAD83 / CONUS Albers Equal Area.
pub const EPSG_CONUS_ALBERS: u32 = 5070;
/// EPSG code for WGS84 / Pseudo-Mercator.
pub const EPSG_WEB_MERCATOR: u32 = 3857;

/// A coordinate reference system identified by its EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Crs {
    epsg: u32,
}

impl Crs {
    /// WGS84 geographic (longitude, latitude in degrees).
    pub const WGS84: Crs = Crs { epsg: EPSG_WGS84 };
    /// NAD83 geographic.
    pub const NAD83: Crs = Crs { epsg: EPSG_NAD83 };
    /// NAD83 / CONUS Albers, the grid NLCD is published on.
    pub const CONUS_ALBERS: Crs = Crs {
        epsg: EPSG_CONUS_ALBERS,
    };
    /// Web Mercator.
    pub const WEB_MERCATOR: Crs = Crs {
        epsg: EPSG_WEB_MERCATOR,
    };

    /// Look up a CRS by EPSG code.
    ///
    /// Fails with [`GeoError::UnsupportedCrs`] when the registry has no
    /// definition for the code, or the definition cannot be projected.
    pub fn from_epsg(epsg: u32) -> Result<Self> {
        let crs = Crs { epsg };
        crs.proj()?;
        Ok(crs)
    }

    /// Parse the CRS names used by OGC services and GeoJSON, e.g.
    /// `EPSG:4326`, `urn:ogc:def:crs:EPSG::5070`,
    /// `http://www.opengis.net/def/crs/EPSG/0/5070` or `urn:ogc:def:crs:OGC:1.3:CRS84`.
    pub fn parse(name: &str) -> Result<Self> {
        let name = name.trim();
        if name.ends_with("CRS84") {
            return Ok(Self::WGS84);
        }
        let code = name
            .rsplit(|c| c == ':' || c == '/' || c == '#')
            .find(|part| !part.is_empty())
            .and_then(|part| part.parse::<u32>().ok())
            .ok_or_else(|| GeoError::UnknownCrsName(name.to_string()))?;
        Self::from_epsg(code)
    }

    /// Resolve an OGC or ESRI WKT definition, as found in a shapefile `.prj`.
    ///
    /// The outermost EPSG authority wins. ESRI WKT usually carries none, in
    /// which case plain WGS84 and NAD83 geographic systems are recognised
    /// by datum name.
    pub fn from_wkt(wkt: &str) -> Result<Self> {
        if let Some(code) = epsg_authority(wkt) {
            return Self::from_epsg(code);
        }
        let upper = wkt.trim_start().to_ascii_uppercase();
        if upper.starts_with("GEOGCS") || upper.starts_with("GEOGCRS") {
            if ["WGS_1984", "WGS 84", "WGS84"].iter().any(|d| upper.contains(d)) {
                return Ok(Self::WGS84);
            }
            if ["NORTH_AMERICAN_1983", "NORTH AMERICAN DATUM 1983", "NAD83"]
                .iter()
                .any(|d| upper.contains(d))
            {
                return Ok(Self::NAD83);
            }
        }
        let name = wkt.split('"').nth(1).unwrap_or(wkt.trim());
        Err(GeoError::UnknownCrsName(name.to_string()))
    }

    /// Whether an OGC CRS name implies latitude-first axis order.
    ///
    /// The URN and URL forms of geographic codes follow the EPSG axis
    /// order (lat, lon); the legacy `EPSG:4326` form is lon, lat.
    pub fn name_is_lat_lon(name: &str) -> bool {
        let urn_like = name.starts_with("urn:") || name.starts_with("http");
        urn_like
            && !name.ends_with("CRS84")
            && Self::parse(name).map(|crs| crs.is_geographic()).unwrap_or(false)
    }

    /// The EPSG code.
    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    /// Whether coordinates are in degrees of longitude/latitude.
    pub fn is_geographic(&self) -> bool {
        proj4_definition(self.epsg).is_some_and(is_longlat)
    }

    fn proj(&self) -> Result<Proj> {
        let definition =
            proj4_definition(self.epsg).ok_or(GeoError::UnsupportedCrs(self.epsg))?;
        Proj::from_proj_string(definition).map_err(|e| GeoError::InvalidProjection {
            epsg: self.epsg,
            reason: format!("{e:?}"),
        })
    }

    /// Convert a coordinate in this CRS to (longitude, latitude) degrees.
    pub fn to_geographic(&self, c: Coord<f64>) -> Result<Coord<f64>> {
        self.transform(Crs::WGS84, c)
    }

    /// Convert (longitude, latitude) degrees to this CRS.
    pub fn from_geographic(&self, c: Coord<f64>) -> Result<Coord<f64>> {
        Crs::WGS84.transform(*self, c)
    }

    /// Transform a single coordinate into `target`.
    ///
    /// Builds the projections on every call; use [`reproject`] for geometries.
    pub fn transform(&self, target: Crs, c: Coord<f64>) -> Result<Coord<f64>> {
        if self.same_as(&target) {
            return Ok(c);
        }
        Transformer::new(*self, target)?.apply(c)
    }

    /// Whether two CRSs describe the same coordinate space.
    ///
    /// Geographic systems are treated as interchangeable; the NAD83/WGS84
    /// datum shift is below the resolution of either dataset.
    pub fn same_as(&self, other: &Crs) -> bool {
        self.epsg == other.epsg || (self.is_geographic() && other.is_geographic())
    }

    /// OGC WKT definition from the registry.
    pub fn wkt(&self) -> Option<&'static str> {
        u16::try_from(self.epsg)
            .ok()
            .and_then(crs_definitions::from_code)
            .map(|def| def.wkt)
    }

    /// Human-readable name, taken from the WKT definition.
    pub fn name(&self) -> String {
        self.wkt()
            .and_then(|wkt| wkt.split('"').nth(1))
            .map(str::to_string)
            .unwrap_or_else(|| self.to_string())
    }
}

impl TryFrom<u32> for Crs {
    type Error = GeoError;

    fn try_from(epsg: u32) -> Result<Self> {
        Crs::from_epsg(epsg)
    }
}

impl From<Crs> for u32 {
    fn from(crs: Crs) -> u32 {
        crs.epsg
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

/// Reproject every coordinate of a geometry. Returns a new geometry.
pub fn reproject<G>(geometry: &G, from: Crs, to: Crs) -> Result<G::Output>
where
    G: MapCoords<f64, f64>,
{
    if from.same_as(&to) {
        return Ok(geometry.map_coords(|c| c));
    }
    let transformer = Transformer::new(from, to)?;
    geometry.try_map_coords(|c| transformer.apply(c))
}

/// A source/target projection pair, built once per reprojection.
struct Transformer {
    from: Crs,
    to: Crs,
    source: Proj,
    target: Proj,
    source_geographic: bool,
    target_geographic: bool,
}

impl Transformer {
    fn new(from: Crs, to: Crs) -> Result<Self> {
        Ok(Self {
            from,
            to,
            source: from.proj()?,
            target: to.proj()?,
            source_geographic: from.is_geographic(),
            target_geographic: to.is_geographic(),
        })
    }

    fn apply(&self, c: Coord<f64>) -> Result<Coord<f64>> {
        let failed = || GeoError::ProjectionFailed {
            x: c.x,
            y: c.y,
            from: self.from.epsg,
            to: self.to.epsg,
        };

        // proj4rs works in radians for geographic systems
        let mut point = if self.source_geographic {
            (c.x.to_radians(), c.y.to_radians(), 0.0)
        } else {
            (c.x, c.y, 0.0)
        };
        proj_transform(&self.source, &self.target, &mut point).map_err(|_| failed())?;

        let out = if self.target_geographic {
            Coord {
                x: point.0.to_degrees(),
                y: point.1.to_degrees(),
            }
        } else {
            Coord {
                x: point.0,
                y: point.1,
            }
        };
        if out.x.is_finite() && out.y.is_finite() {
            Ok(out)
        } else {
            Err(failed())
        }
    }
}

fn proj4_definition(epsg: u32) -> Option<&'static str> {
    u16::try_from(epsg)
        .ok()
        .and_then(crs_definitions::from_code)
        .map(|def| def.proj4)
}

fn is_longlat(proj4: &str) -> bool {
    proj4.split_whitespace().any(|p| p == "+proj=longlat" || p == "+proj=latlong")
}

/// Code of the last `AUTHORITY["EPSG","…"]` (WKT1) or `ID["EPSG",…]` (WKT2).
fn epsg_authority(wkt: &str) -> Option<u32> {
    let upper = wkt.to_ascii_uppercase();
    let start = ["AUTHORITY[\"EPSG\",", "ID[\"EPSG\","]
        .iter()
        .filter_map(|tag| upper.rfind(tag).map(|i| i + tag.len()))
        .max()?;
    upper[start..]
        .trim_start_matches(|c: char| c == '"' || c.is_whitespace())
        .split(|c: char| !c.is_ascii_digit())
        .next()?
        .parse()
        .ok()
}
