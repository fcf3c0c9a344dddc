//! Reassembling coverage tiles into one grid.

use crate::{AcquireError, Result};
use hydroprep_geo::{GeoError, GeoTransform, Pixel, Raster};
use ndarray::Array2;
use tracing::{debug, info};

/// Mosaic `tiles` onto the union of their footprints.
///
/// The output grid uses the first tile's pixel size and is sampled at pixel
/// centres with nearest-neighbour lookup, so categorical codes pass through
/// unchanged. Tiles are painted in slice order: where they overlap the last
/// one wins, except that a tile's no-data pixels never overwrite. Cells no
/// tile covers hold `nodata`.
pub fn mosaic<T: Pixel>(tiles: &[Raster<T>], nodata: T) -> Result<Raster<T>> {
    let first = tiles
        .first()
        .ok_or(AcquireError::NoDataRetrieved { requested: 0 })?;
    let crs = first.crs();
    for tile in &tiles[1..] {
        match (crs, tile.crs()) {
            (Some(a), Some(b)) if !a.same_as(&b) => {
                return Err(GeoError::CrsMismatch(a.epsg(), b.epsg()).into())
            }
            (Some(_), None) | (None, Some(_)) => return Err(GeoError::MissingCrs.into()),
            _ => {}
        }
    }

    let pixel_width = first.transform().pixel_width.abs();
    let pixel_height = first.transform().pixel_height.abs();
    let mut extent = first.extent()?;
    for tile in &tiles[1..] {
        extent = extent.union(&tile.extent()?);
    }
    let rows = cell_count(extent.height(), pixel_height);
    let cols = cell_count(extent.width(), pixel_width);
    let transform = GeoTransform::new(extent.min_x, extent.max_y, pixel_width, -pixel_height);

    let mut data = Array2::from_elem((rows, cols), nodata);
    for (i, tile) in tiles.iter().enumerate() {
        let footprint = tile.extent()?;
        let row0 = ((extent.max_y - footprint.max_y) / pixel_height).floor().max(0.0) as usize;
        let row1 = (((extent.max_y - footprint.min_y) / pixel_height).ceil() as usize).min(rows);
        let col0 = ((footprint.min_x - extent.min_x) / pixel_width).floor().max(0.0) as usize;
        let col1 = (((footprint.max_x - extent.min_x) / pixel_width).ceil() as usize).min(cols);

        let mut painted = 0usize;
        for row in row0..row1 {
            for col in col0..col1 {
                let (x, y) = transform.pixel_center(row, col);
                if let Some((r, c)) = tile.cell_at(x, y) {
                    if tile.is_valid(r, c) {
                        data[[row, col]] = tile.data()[[r, c]];
                        painted += 1;
                    }
                }
            }
        }
        debug!("Tile {} painted {} pixel(s)", i, painted);
    }

    info!(
        "Mosaicked {} tile(s) into a {}x{} grid",
        tiles.len(),
        cols,
        rows
    );
    Ok(Raster::new(data, transform, crs).with_nodata(Some(nodata)))
}

fn cell_count(span: f64, size: f64) -> usize {
    ((span / size - 1e-6).ceil() as usize).max(1)
}
