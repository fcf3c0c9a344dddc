//! Clipping merged datasets to the area of interest.

use crate::Result;
use geo::{Area, BooleanOps};
use hydroprep_geo::rasterize::polygon_mask;
use hydroprep_geo::{AreaOfInterest, Extent, Feature, FeatureCollection, GeoError, Pixel, Raster};
use ndarray::{s, Array2};
use tracing::{debug, info};

fn aoi_in(aoi: &AreaOfInterest, crs: hydroprep_geo::Crs) -> Result<AreaOfInterest> {
    if aoi.crs().same_as(&crs) {
        Ok(aoi.clone())
    } else {
        debug!("Reprojecting AOI from {} to {} for clipping", aoi.crs(), crs);
        Ok(aoi.reprojected(crs)?)
    }
}

/// Intersect every feature with the AOI.
///
/// Features entirely outside are dropped; the rest keep their attributes
/// with the clipped geometry. The input is not modified.
pub fn clip_features(collection: &FeatureCollection, aoi: &AreaOfInterest) -> Result<FeatureCollection> {
    let aoi = aoi_in(aoi, collection.crs())?;
    let mask = aoi.geometry();
    let mask_extent = aoi.extent()?;

    let mut clipped = FeatureCollection::new(collection.crs());
    for name in collection.fields() {
        clipped.add_field(name);
    }
    for feature in collection {
        let overlaps = Extent::of_geometry(&feature.geometry)
            .ok()
            .and_then(|e| e.intersection(&mask_extent))
            .is_some();
        if !overlaps {
            continue;
        }
        let geometry = feature.geometry.intersection(mask);
        if geometry.0.is_empty() || geometry.unsigned_area() <= 0.0 {
            continue;
        }
        clipped.push(Feature {
            geometry,
            properties: feature.properties.clone(),
        });
    }

    info!(
        "Clipped {} feature(s) to AOI, {} remain",
        collection.len(),
        clipped.len()
    );
    Ok(clipped)
}

/// Crop a raster to the AOI and blank pixels outside it.
///
/// The window is the AOI bounding box snapped outward to the pixel grid and
/// limited to the raster. Pixels whose centre is outside the AOI, or that
/// held no-data in the source, become `nodata`. Fails with
/// [`GeoError::NoOverlap`] when the AOI misses the raster.
pub fn clip_raster<T: Pixel>(raster: &Raster<T>, aoi: &AreaOfInterest, nodata: T) -> Result<Raster<T>> {
    let crs = raster.crs().ok_or(GeoError::MissingCrs)?;
    let aoi = aoi_in(aoi, crs)?;
    let window = aoi
        .extent()?
        .intersection(&raster.extent()?)
        .ok_or(GeoError::NoOverlap)?;

    let transform = raster.transform();
    let (c0, r0) = transform.to_pixel(window.min_x, window.max_y);
    let (c1, r1) = transform.to_pixel(window.max_x, window.min_y);
    let col0 = c0.min(c1).floor().max(0.0) as usize;
    let col1 = (c0.max(c1).ceil() as usize).min(raster.cols());
    let row0 = r0.min(r1).floor().max(0.0) as usize;
    let row1 = (r0.max(r1).ceil() as usize).min(raster.rows());
    if col0 >= col1 || row0 >= row1 {
        return Err(GeoError::NoOverlap.into());
    }

    let (rows, cols) = (row1 - row0, col1 - col0);
    let cropped = transform.offset(row0, col0);
    let inside = polygon_mask(aoi.geometry(), &cropped, rows, cols);
    let source = raster.data().slice(s![row0..row1, col0..col1]);
    let source_nodata = raster.nodata();
    let data = Array2::from_shape_fn((rows, cols), |(r, c)| {
        let value = source[[r, c]];
        if inside[[r, c]] && !value.is_nodata(source_nodata) {
            value
        } else {
            nodata
        }
    });

    info!(
        "Clipped raster to {}x{} window at row {}, col {}",
        cols, rows, row0, col0
    );
    Ok(Raster::new(data, cropped, Some(crs)).with_nodata(Some(nodata)))
}
