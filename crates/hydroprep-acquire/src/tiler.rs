//! Splitting a query extent into service-sized tiles.
//!
//! Remote services cap the size of a single request, so a large AOI
//! bounding box is partitioned into a grid of tiles. Each tile is grown by a
//! small margin so neighbouring responses overlap and leave no seams, then
//! dropped if it does not touch the AOI at all.

use crate::{AcquireError, Result};
use geo::{Intersects, MultiPolygon};
use hydroprep_geo::Extent;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Decimal places tile bounds are rounded to before building requests.
pub const BOUNDS_DECIMALS: i32 = 8;

/// Tiling parameters, in the query extent's linear units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TilingPolicy {
    /// Target tile edge length.
    pub tile_size: f64,
    /// Overlap added on every side of each tile.
    pub margin: f64,
    /// At or below this AOI area a single request covers everything.
    pub small_area_threshold: f64,
}

impl TilingPolicy {
    /// Soil survey queries: quarter-degree tiles in WGS84.
    pub const SOILS: TilingPolicy = TilingPolicy {
        tile_size: 0.25,
        margin: 0.0015,
        small_area_threshold: 9.0,
    };

    /// Land-cover queries: 100 km tiles in CONUS Albers.
    pub const LANDCOVER: TilingPolicy = TilingPolicy {
        tile_size: 100_000.0,
        margin: 120.0,
        small_area_threshold: 9.0,
    };

    fn validate(&self) -> Result<()> {
        if !(self.tile_size.is_finite() && self.tile_size > 0.0) {
            return Err(AcquireError::InvalidTiling(format!(
                "tile size must be positive, got {}",
                self.tile_size
            )));
        }
        if !(self.margin.is_finite() && self.margin >= 0.0) {
            return Err(AcquireError::InvalidTiling(format!(
                "margin must be non-negative, got {}",
                self.margin
            )));
        }
        Ok(())
    }
}

impl Default for TilingPolicy {
    fn default() -> Self {
        Self::SOILS
    }
}

/// One request-sized piece of the query extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    /// Position in enumeration order (row-major, south to north).
    pub index: usize,
    /// Grid row, 0 at the southern edge.
    pub row: usize,
    /// Grid column, 0 at the western edge.
    pub col: usize,
    /// Exact partition cell, without margin.
    pub cell: Extent,
    /// Request bounds: the cell grown by the margin and rounded.
    pub bounds: Extent,
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tile {} (row {}, col {}) {}", self.index, self.row, self.col, self.bounds)
    }
}

/// Plan the requests for an AOI.
///
/// `area` is the AOI bounding-box area used for the small-area decision;
/// callers measure it in whatever units their threshold is defined in.
pub fn plan_tiles(
    extent: &Extent,
    reference: &MultiPolygon<f64>,
    policy: &TilingPolicy,
    area: f64,
) -> Result<Vec<Tile>> {
    policy.validate()?;
    if area <= policy.small_area_threshold {
        info!(
            "AOI area {:.4} is within the single-request threshold ({}); fetching whole extent",
            area, policy.small_area_threshold
        );
        return Ok(vec![Tile {
            index: 0,
            row: 0,
            col: 0,
            cell: *extent,
            bounds: *extent,
        }]);
    }
    split_extent(extent, reference, policy.tile_size, policy.margin)
}

/// Partition `extent` into a grid and keep the tiles touching `reference`.
///
/// Row and column counts are `ceil(span / tile_size)`; the step is the exact
/// span divided by that count, and the last row and column end exactly on
/// the extent's edges. Tiles are returned in row-major order.
pub fn split_extent(
    extent: &Extent,
    reference: &MultiPolygon<f64>,
    tile_size: f64,
    margin: f64,
) -> Result<Vec<Tile>> {
    TilingPolicy {
        tile_size,
        margin,
        small_area_threshold: 0.0,
    }
    .validate()?;

    let rows = ((extent.height() / tile_size).ceil() as usize).max(1);
    let cols = ((extent.width() / tile_size).ceil() as usize).max(1);
    let step_x = extent.width() / cols as f64;
    let step_y = extent.height() / rows as f64;

    let edge = |start: f64, end: f64, step: f64, n: usize, i: usize| -> f64 {
        if i == n {
            end
        } else {
            start + i as f64 * step
        }
    };

    let mut tiles = Vec::new();
    let mut pruned = 0usize;
    for row in 0..rows {
        for col in 0..cols {
            let cell = Extent::new(
                edge(extent.min_x, extent.max_x, step_x, cols, col),
                edge(extent.min_x, extent.max_x, step_x, cols, col + 1),
                edge(extent.min_y, extent.max_y, step_y, rows, row),
                edge(extent.min_y, extent.max_y, step_y, rows, row + 1),
            )?;
            let bounds = cell.expanded(margin).rounded(BOUNDS_DECIMALS);

            if reference.intersects(&bounds.to_polygon()) {
                tiles.push(Tile {
                    index: tiles.len(),
                    row,
                    col,
                    cell,
                    bounds,
                });
            } else {
                pruned += 1;
            }
        }
    }

    info!(
        "Split extent into {}x{} grid: {} tile(s) intersect the AOI, {} pruned",
        rows,
        cols,
        tiles.len(),
        pruned
    );
    for tile in &tiles {
        debug!("{}", tile);
    }
    Ok(tiles)
}
