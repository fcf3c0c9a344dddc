//! Combining per-tile feature collections.

use crate::Result;
use hydroprep_geo::wkb::write_multipolygon;
use hydroprep_geo::{Crs, FeatureCollection};
use std::collections::HashSet;
use tracing::info;

/// Concatenate `collections` into one collection in `crs`, dropping exact
/// duplicates.
///
/// Two features are duplicates when their geometries are coordinate-for-
/// coordinate identical and their `key_field` values are equal. Adjacent
/// tiles overlap by the tiling margin, so the same map unit polygon is
/// usually returned by more than one request. The first occurrence is kept.
pub fn merge_features(
    collections: Vec<FeatureCollection>,
    crs: Crs,
    key_field: &str,
) -> Result<FeatureCollection> {
    let mut merged = FeatureCollection::new(crs);
    for collection in collections {
        let collection = if collection.crs().same_as(&crs) {
            collection
        } else {
            collection.reprojected(crs)?
        };
        merged.extend(collection)?;
    }

    let total = merged.len();
    let identities = merged
        .features()
        .iter()
        .map(|feature| {
            Ok((
                write_multipolygon(&feature.geometry)?,
                feature.property(key_field).to_string(),
            ))
        })
        .collect::<Result<Vec<_>>>()?;
    let mut seen = HashSet::new();
    let mut first = identities.into_iter().map(|identity| seen.insert(identity));
    merged.retain(|_| first.next().unwrap_or(true));

    info!(
        "Merged {} feature(s), removed {} duplicate(s)",
        merged.len(),
        total - merged.len()
    );
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};
    use hydroprep_geo::Feature;

    fn square(x: f64, y: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x, y: y),
            (x: x + 0.01, y: y),
            (x: x + 0.01, y: y + 0.01),
            (x: x, y: y + 0.01),
        ]])
    }

    fn collection(features: Vec<Feature>) -> FeatureCollection {
        let mut fc = FeatureCollection::new(Crs::WGS84);
        for f in features {
            fc.push(f);
        }
        fc
    }

    #[test]
    fn test_overlap_duplicates_removed() {
        let a = collection(vec![
            Feature::new(square(-80.0, 35.0)).with_property("mukey", "1"),
            Feature::new(square(-79.99, 35.0)).with_property("mukey", "2"),
        ]);
        let b = collection(vec![
            Feature::new(square(-79.99, 35.0)).with_property("mukey", "2"),
            Feature::new(square(-79.98, 35.0)).with_property("mukey", "3"),
        ]);
        let merged = merge_features(vec![a, b], Crs::WGS84, "mukey").unwrap();
        assert_eq!(merged.len(), 3);
        let keys: Vec<String> = merged
            .iter()
            .filter_map(|f| f.property("mukey").as_text())
            .collect();
        assert_eq!(keys, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_same_geometry_different_key_kept() {
        let a = collection(vec![Feature::new(square(-80.0, 35.0)).with_property("mukey", "1")]);
        let b = collection(vec![Feature::new(square(-80.0, 35.0)).with_property("mukey", "9")]);
        let merged = merge_features(vec![a, b], Crs::WGS84, "mukey").unwrap();
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_empty_input() {
        let merged = merge_features(Vec::new(), Crs::WGS84, "mukey").unwrap();
        assert!(merged.is_empty());
        assert_eq!(merged.crs(), Crs::WGS84);
    }
}
