//! Binary geometry encoding for polygonal features.
//!
//! Plain WKB and GeoPackage geometry blobs both go through `geozero`.
//! Decoding promotes polygons to one-part multipolygons and yields `None`
//! for empty or non-polygonal geometries.

use crate::Result;
use geo::{BoundingRect, Geometry, MultiPolygon};
use geozero::wkb::{GpkgWkb, Wkb};
use geozero::{CoordDimensions, ToGeo, ToWkb};

/// Encode a multipolygon as XY WKB.
pub fn write_multipolygon(geometry: &MultiPolygon<f64>) -> Result<Vec<u8>> {
    Ok(Geometry::MultiPolygon(geometry.clone()).to_wkb(CoordDimensions::xy())?)
}

/// Decode WKB into a multipolygon.
pub fn read_multipolygon(bytes: &[u8]) -> Result<Option<MultiPolygon<f64>>> {
    Ok(polygonal(Wkb(bytes.to_vec()).to_geo()?))
}

/// Encode a multipolygon as a GeoPackage blob with an XY envelope.
pub fn write_gpkg_geometry(geometry: &MultiPolygon<f64>, srs_id: i32) -> Result<Vec<u8>> {
    let envelope = geometry
        .bounding_rect()
        .map(|r| vec![r.min().x, r.max().x, r.min().y, r.max().y])
        .unwrap_or_default();
    Ok(Geometry::MultiPolygon(geometry.clone()).to_gpkg_wkb(
        CoordDimensions::xy(),
        Some(srs_id),
        envelope,
    )?)
}

/// Decode a GeoPackage geometry blob.
pub fn read_gpkg_geometry(blob: &[u8]) -> Result<Option<MultiPolygon<f64>>> {
    Ok(polygonal(GpkgWkb(blob.to_vec()).to_geo()?))
}

fn polygonal(geometry: Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p])),
        Geometry::MultiPolygon(mp) if !mp.0.is_empty() => Some(mp),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GeoError;
    use geo::polygon;

    fn triangle() -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: 1.0, y: 2.0),
            (x: 3.0, y: 2.0),
            (x: 3.0, y: 4.0),
        ]])
    }

    #[test]
    fn test_multipolygon_with_hole() {
        let poly = polygon!(
            exterior: [
                (x: 0.0, y: 0.0),
                (x: 10.0, y: 0.0),
                (x: 10.0, y: 10.0),
                (x: 0.0, y: 10.0),
            ],
            interiors: [
                [
                    (x: 2.0, y: 2.0),
                    (x: 4.0, y: 2.0),
                    (x: 4.0, y: 4.0),
                ],
            ],
        );
        let mp = MultiPolygon::new(vec![poly]);
        let bytes = write_multipolygon(&mp).unwrap();
        assert_eq!(u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]), 6);
        assert_eq!(read_multipolygon(&bytes).unwrap(), Some(mp));
    }

    #[test]
    fn test_big_endian_polygon() {
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(&3u32.to_be_bytes());
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.extend_from_slice(&4u32.to_be_bytes());
        for (x, y) in [(0.0f64, 0.0f64), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)] {
            bytes.extend_from_slice(&x.to_be_bytes());
            bytes.extend_from_slice(&y.to_be_bytes());
        }
        let mp = read_multipolygon(&bytes).unwrap().unwrap();
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.0[0].exterior().0.len(), 4);
    }

    #[test]
    fn test_point_is_not_polygonal() {
        let mut bytes = vec![1u8];
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&1.0f64.to_le_bytes());
        bytes.extend_from_slice(&2.0f64.to_le_bytes());
        assert_eq!(read_multipolygon(&bytes).unwrap(), None);
    }

    #[test]
    fn test_truncated_input() {
        let bytes = write_multipolygon(&triangle()).unwrap();
        assert!(matches!(
            read_multipolygon(&bytes[..bytes.len() - 3]),
            Err(GeoError::Geozero(_))
        ));
    }

    #[test]
    fn test_gpkg_blob_header() {
        let mp = triangle();
        let blob = write_gpkg_geometry(&mp, 4326).unwrap();
        assert_eq!(&blob[0..2], b"GP");
        // XY envelope indicator
        assert_eq!((blob[3] >> 1) & 0b111, 1);
        assert_eq!(i32::from_le_bytes([blob[4], blob[5], blob[6], blob[7]]), 4326);
        assert_eq!(f64::from_le_bytes(blob[8..16].try_into().unwrap()), 1.0);
        assert_eq!(f64::from_le_bytes(blob[16..24].try_into().unwrap()), 3.0);
        assert_eq!(read_gpkg_geometry(&blob).unwrap(), Some(mp));
    }

    #[test]
    fn test_equal_geometries_encode_equal() {
        assert_eq!(
            write_multipolygon(&triangle()).unwrap(),
            write_multipolygon(&triangle()).unwrap()
        );
    }
}
