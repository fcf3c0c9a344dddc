//! Area-of-interest loading.

use crate::crs::{reproject, Crs};
use crate::feature::union_all;
use crate::{gpkg, Extent, GeoError, Result};
use geo::{Geometry, Intersects, MultiPolygon};
use geojson::GeoJson;
use std::path::Path;
use tracing::{debug, info, warn};

/// The user's study-area polygons and their CRS.
///
/// Never mutated in place; reprojection and dissolving return new values.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaOfInterest {
    geometry: MultiPolygon<f64>,
    crs: Crs,
}

impl AreaOfInterest {
    /// Wrap a geometry. Fails if it has no coordinates.
    pub fn new(geometry: MultiPolygon<f64>, crs: Crs) -> Result<Self> {
        Extent::of_geometry(&geometry)?;
        Ok(Self { geometry, crs })
    }

    /// Read an AOI from a GeoJSON (`.geojson`, `.json`), GeoPackage or
    /// Shapefile (`.shp`) file.
    ///
    /// Polygon and MultiPolygon geometries are kept, everything else is ignored.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let aoi = match extension.as_deref() {
            Some("geojson") | Some("json") => {
                let text = std::fs::read_to_string(path)?;
                Self::from_geojson_str(&text)?
            }
            Some("gpkg") => {
                let collection = gpkg::read_features(path)?;
                let crs = collection.crs();
                let polygons = collection
                    .into_iter()
                    .flat_map(|f| f.geometry.0)
                    .collect::<Vec<_>>();
                Self::new(MultiPolygon::new(polygons), crs)?
            }
            Some("shp") => Self::from_shapefile(path)?,
            _ => return Err(GeoError::UnsupportedFormat(path.to_path_buf())),
        };

        info!(
            "Read AOI from {} ({} polygon(s), {})",
            path.display(),
            aoi.geometry.0.len(),
            aoi.crs
        );
        Ok(aoi)
    }

    /// Parse GeoJSON text. A legacy `crs` member is honoured; WGS84 otherwise.
    pub fn from_geojson_str(text: &str) -> Result<Self> {
        let geojson: GeoJson = text.parse()?;
        let crs = match &geojson {
            GeoJson::FeatureCollection(fc) => fc
                .foreign_members
                .as_ref()
                .and_then(|members| members.get("crs"))
                .and_then(|crs| crs.pointer("/properties/name"))
                .and_then(|name| name.as_str())
                .map(Crs::parse)
                .transpose()?
                .unwrap_or(Crs::WGS84),
            _ => Crs::WGS84,
        };

        let geometries: Vec<geojson::Geometry> = match geojson {
            GeoJson::FeatureCollection(fc) => {
                fc.features.into_iter().filter_map(|f| f.geometry).collect()
            }
            GeoJson::Feature(f) => f.geometry.into_iter().collect(),
            GeoJson::Geometry(g) => vec![g],
        };

        let mut polygons = Vec::new();
        for geometry in geometries {
            match Geometry::<f64>::try_from(geometry.value)? {
                Geometry::Polygon(p) => polygons.push(p),
                Geometry::MultiPolygon(mp) => polygons.extend(mp.0),
                other => debug!("Ignoring non-polygonal AOI geometry ({})", geometry_kind(&other)),
            }
        }
        Self::new(MultiPolygon::new(polygons), crs)
    }

    /// Read polygon shapes from a `.shp`, with the CRS from the sidecar `.prj`.
    ///
    /// A shapefile without a `.prj` is taken to be WGS84.
    fn from_shapefile(path: &Path) -> Result<Self> {
        let prj = path.with_extension("prj");
        let crs = if prj.is_file() {
            Crs::from_wkt(&std::fs::read_to_string(&prj)?)?
        } else {
            warn!("{} has no .prj, assuming {}", path.display(), Crs::WGS84);
            Crs::WGS84
        };

        let mut polygons = Vec::new();
        for shape in shapefile::ShapeReader::from_path(path)?.read()? {
            let parts = match shape {
                shapefile::Shape::Polygon(p) => MultiPolygon::<f64>::from(p),
                shapefile::Shape::PolygonM(p) => MultiPolygon::<f64>::from(p),
                shapefile::Shape::PolygonZ(p) => MultiPolygon::<f64>::from(p),
                other => {
                    debug!("Ignoring non-polygonal AOI shape ({:?})", other.shapetype());
                    continue;
                }
            };
            polygons.extend(parts.0);
        }
        Self::new(MultiPolygon::new(polygons), crs)
    }

    /// The polygons.
    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    /// The CRS.
    pub fn crs(&self) -> Crs {
        self.crs
    }

    /// Bounding extent in the AOI's CRS.
    pub fn extent(&self) -> Result<Extent> {
        Extent::of_geometry(&self.geometry)
    }

    /// A copy in another CRS.
    pub fn reprojected(&self, to: Crs) -> Result<Self> {
        Ok(Self {
            geometry: reproject(&self.geometry, self.crs, to)?,
            crs: to,
        })
    }

    /// A copy with all parts unioned together.
    pub fn dissolved(&self) -> Self {
        let parts = self
            .geometry
            .0
            .iter()
            .cloned()
            .map(|p| MultiPolygon::new(vec![p]))
            .collect();
        Self {
            geometry: union_all(parts),
            crs: self.crs,
        }
    }

    /// Whether a rectangle touches the AOI.
    pub fn intersects_extent(&self, extent: &Extent) -> bool {
        self.geometry.intersects(&extent.to_polygon())
    }
}

fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::Area;

    const TWO_SQUARES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"name": "a"},
             "geometry": {"type": "Polygon", "coordinates": [[[-80.0, 35.0], [-79.95, 35.0], [-79.95, 35.1], [-80.0, 35.1], [-80.0, 35.0]]]}},
            {"type": "Feature", "properties": {"name": "b"},
             "geometry": {"type": "Polygon", "coordinates": [[[-79.95, 35.0], [-79.9, 35.0], [-79.9, 35.1], [-79.95, 35.1], [-79.95, 35.0]]]}},
            {"type": "Feature", "properties": {},
             "geometry": {"type": "Point", "coordinates": [-79.0, 36.0]}}
        ]
    }"#;

    #[test]
    fn test_from_geojson_keeps_polygons() {
        let aoi = AreaOfInterest::from_geojson_str(TWO_SQUARES).unwrap();
        assert_eq!(aoi.crs(), Crs::WGS84);
        assert_eq!(aoi.geometry().0.len(), 2);
        let extent = aoi.extent().unwrap();
        assert_relative_eq!(extent.min_x, -80.0);
        assert_relative_eq!(extent.max_x, -79.9);
    }

    #[test]
    fn test_dissolved_merges_adjacent_parts() {
        let aoi = AreaOfInterest::from_geojson_str(TWO_SQUARES).unwrap();
        let dissolved = aoi.dissolved();
        assert_eq!(dissolved.geometry().0.len(), 1);
        assert_relative_eq!(
            dissolved.geometry().unsigned_area(),
            aoi.geometry().unsigned_area(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_legacy_crs_member() {
        let text = r#"{
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::5070"}},
            "features": [{"type": "Feature", "properties": {},
                "geometry": {"type": "Polygon", "coordinates": [[[80000, 1155000], [80100, 1155000], [80100, 1155100], [80000, 1155000]]]}}]
        }"#;
        let aoi = AreaOfInterest::from_geojson_str(text).unwrap();
        assert_eq!(aoi.crs(), Crs::CONUS_ALBERS);
    }

    #[test]
    fn test_no_polygons_is_empty_geometry() {
        let text = r#"{"type": "Point", "coordinates": [1.0, 2.0]}"#;
        assert!(matches!(
            AreaOfInterest::from_geojson_str(text),
            Err(GeoError::EmptyGeometry(_))
        ));
    }

    #[test]
    fn test_reprojected_and_intersects() {
        let aoi = AreaOfInterest::from_geojson_str(TWO_SQUARES).unwrap();
        let albers = aoi.reprojected(Crs::CONUS_ALBERS).unwrap();
        assert_eq!(albers.crs(), Crs::CONUS_ALBERS);
        let extent = albers.extent().unwrap();
        assert!(extent.width() > 8_000.0 && extent.width() < 10_000.0);

        let inside = Extent::new(-79.99, -79.98, 35.01, 35.02).unwrap();
        let outside = Extent::new(-70.0, -69.0, 35.0, 36.0).unwrap();
        assert!(aoi.intersects_extent(&inside));
        assert!(!aoi.intersects_extent(&outside));
    }

    #[test]
    fn test_gpkg_aoi() {
        use crate::feature::{Feature, FeatureCollection};
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aoi.gpkg");
        let aoi = AreaOfInterest::from_geojson_str(TWO_SQUARES).unwrap();
        let mut fc = FeatureCollection::new(Crs::WGS84);
        fc.push(Feature::new(aoi.geometry().clone()));
        gpkg::write_features(&path, &fc).unwrap();

        let back = AreaOfInterest::from_file(&path).unwrap();
        assert_eq!(back.geometry(), aoi.geometry());
        assert!(matches!(
            AreaOfInterest::from_file(dir.path().join("aoi.kml")),
            Err(GeoError::UnsupportedFormat(_))
        ));
    }

    fn write_square_shapefile(path: &Path, x0: f64, y0: f64, size: f64) {
        use shapefile::{Point, Polygon, PolygonRing, ShapeWriter};
        let ring = PolygonRing::Outer(vec![
            Point::new(x0, y0),
            Point::new(x0, y0 + size),
            Point::new(x0 + size, y0 + size),
            Point::new(x0 + size, y0),
            Point::new(x0, y0),
        ]);
        let writer = ShapeWriter::from_path(path).unwrap();
        writer.write_shapes(&vec![Polygon::new(ring)]).unwrap();
    }

    #[test]
    fn test_shapefile_without_prj_is_wgs84() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watershed.shp");
        write_square_shapefile(&path, -80.0, 35.0, 0.1);

        let aoi = AreaOfInterest::from_file(&path).unwrap();
        assert_eq!(aoi.crs(), Crs::WGS84);
        assert_eq!(aoi.geometry().0.len(), 1);
        let extent = aoi.extent().unwrap();
        assert_relative_eq!(extent.min_x, -80.0);
        assert_relative_eq!(extent.max_y, 35.1, epsilon = 1e-12);
        assert_relative_eq!(aoi.geometry().unsigned_area(), 0.01, epsilon = 1e-9);
    }

    #[test]
    fn test_shapefile_crs_from_prj() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huc.shp");
        write_square_shapefile(&path, 3_110_000.0, 13_830_000.0, 20_000.0);
        std::fs::write(
            dir.path().join("huc.prj"),
            r#"PROJCS["NAD83 / Texas South Central (ftUS)",GEOGCS["NAD83",DATUM["North_American_Datum_1983",SPHEROID["GRS 1980",6378137,298.257222101]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433]],PROJECTION["Lambert_Conformal_Conic_2SP"],UNIT["US survey foot",0.304800609601219],AUTHORITY["EPSG","2278"]]"#,
        )
        .unwrap();

        let aoi = AreaOfInterest::from_file(&path).unwrap();
        assert_eq!(aoi.crs().epsg(), 2278);
        let extent = aoi.reprojected(Crs::WGS84).unwrap().extent().unwrap();
        assert!(extent.min_x > -96.0 && extent.max_x < -94.5, "{extent}");
        assert!(extent.min_y > 29.0 && extent.max_y < 30.5, "{extent}");
    }

    #[test]
    fn test_shapefile_unrecognised_prj() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.shp");
        write_square_shapefile(&path, 0.0, 0.0, 10.0);
        std::fs::write(dir.path().join("local.prj"), r#"PROJCS["Site_Grid",LOCAL_DATUM["x"]]"#)
            .unwrap();
        assert!(matches!(
            AreaOfInterest::from_file(&path),
            Err(GeoError::UnknownCrsName(_))
        ));
    }

    #[test]
    fn test_state_plane_geojson_is_readable() {
        let text = r#"{
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::2278"}},
            "features": [{"type": "Feature", "properties": {},
                "geometry": {"type": "Polygon", "coordinates": [[[3110000, 13830000], [3130000, 13830000], [3130000, 13850000], [3110000, 13850000], [3110000, 13830000]]]}}]
        }"#;
        let aoi = AreaOfInterest::from_geojson_str(text).unwrap();
        assert_eq!(aoi.crs(), Crs::from_epsg(2278).unwrap());

        let albers = aoi.reprojected(Crs::CONUS_ALBERS).unwrap();
        let extent = albers.extent().unwrap();
        // 20,000 US feet is a little over 6 km
        assert!(extent.width() > 5_500.0 && extent.width() < 7_000.0, "{extent}");
    }
}
