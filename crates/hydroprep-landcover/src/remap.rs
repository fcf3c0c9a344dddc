//! Land-cover codes to roughness values.

use crate::lookup::RoughnessLookup;
use hydroprep_geo::{Pixel, Raster};
use std::collections::BTreeMap;
use tracing::warn;

/// Codes that had no lookup entry, with their pixel counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnmappedCodes(pub BTreeMap<i64, usize>);

impl UnmappedCodes {
    /// Whether every code was mapped.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total unmapped pixels.
    pub fn pixel_count(&self) -> usize {
        self.0.values().sum()
    }

    /// Fold another tally into this one.
    pub fn merge(&mut self, other: &UnmappedCodes) {
        for (code, count) in &other.0 {
            *self.0.entry(*code).or_insert(0) += count;
        }
    }
}

/// Replace every code with its roughness.
///
/// No-data cells and codes missing from `lookup` become NaN, which is also
/// the output's no-data marker. Shape, transform and CRS are preserved.
pub fn remap_to_roughness(codes: &Raster<u8>, lookup: &RoughnessLookup) -> (Raster<f32>, UnmappedCodes) {
    let nodata = codes.nodata();
    let mut unmapped = UnmappedCodes::default();
    let mut roughness = codes.map(|_| f32::NAN, Some(f32::NAN));

    for (value, out) in codes.data().iter().zip(roughness.data_mut().iter_mut()) {
        if value.is_nodata(nodata) {
            continue;
        }
        let code = i64::from(*value);
        match lookup.get(code) {
            Some(n) => *out = n as f32,
            None => *unmapped.0.entry(code).or_insert(0) += 1,
        }
    }

    if !unmapped.is_empty() {
        warn!(
            "{} pixel(s) have land-cover codes missing from the lookup and were set to no-data: {:?}",
            unmapped.pixel_count(),
            unmapped.0
        );
    }
    (roughness, unmapped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydroprep_geo::{Crs, GeoTransform};

    fn codes(values: Vec<u8>) -> Raster<u8> {
        Raster::from_vec(
            values,
            2,
            3,
            GeoTransform::new(1_000_000.0, 2_000_000.0, 30.0, -30.0),
            Some(Crs::CONUS_ALBERS),
        )
        .unwrap()
        .with_nodata(Some(0))
    }

    #[test]
    fn test_maps_every_known_code() {
        let input = codes(vec![11, 21, 41, 82, 90, 95]);
        let (out, unmapped) = remap_to_roughness(&input, &RoughnessLookup::default_nlcd());
        assert!(unmapped.is_empty());
        assert_eq!(out.shape(), input.shape());
        assert_eq!(out.transform(), input.transform());
        assert_eq!(out.crs(), input.crs());
        let expected = [0.03f32, 0.045, 0.114, 0.04, 0.08, 0.079];
        for (got, want) in out.data().iter().zip(expected) {
            assert_eq!(*got, want);
        }
    }

    #[test]
    fn test_unmapped_codes_become_nodata() {
        let input = codes(vec![11, 250, 250, 0, 99, 95]);
        let (out, unmapped) = remap_to_roughness(&input, &RoughnessLookup::default_nlcd());
        assert!(out.get(0, 1).unwrap().is_nan());
        assert!(out.get(1, 0).unwrap().is_nan());
        assert_eq!(out.valid_count(), 2);
        assert_eq!(unmapped.0.get(&250), Some(&2));
        assert_eq!(unmapped.0.get(&99), Some(&1));
        // Source no-data is not an unmapped code.
        assert_eq!(unmapped.0.get(&0), None);
        assert_eq!(unmapped.pixel_count(), 3);
    }

    #[test]
    fn test_remap_is_bit_identical_when_repeated() {
        let input = codes(vec![11, 12, 250, 52, 71, 0]);
        let lookup = RoughnessLookup::default_nlcd();
        let (a, _) = remap_to_roughness(&input, &lookup);
        let (b, _) = remap_to_roughness(&input, &lookup);
        let bits = |r: &Raster<f32>| r.data().iter().map(|v| v.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&a), bits(&b));
    }

    #[test]
    fn test_custom_lookup() {
        let mut lookup = RoughnessLookup::default();
        lookup.insert(11, "Open Water", 0.025);
        let (out, unmapped) = remap_to_roughness(&codes(vec![11, 11, 11, 11, 11, 21]), &lookup);
        assert_eq!(out.get(0, 0), Some(0.025));
        assert_eq!(unmapped.0.get(&21), Some(&1));
    }
}
