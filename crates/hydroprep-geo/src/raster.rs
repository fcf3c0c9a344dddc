//! In-memory raster grids.

use crate::crs::Crs;
use crate::{Extent, GeoError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Affine transform of a north-up grid.
///
/// ```text
/// x = origin_x + col * pixel_width
/// y = origin_y + row * pixel_height
/// ```
///
/// `pixel_height` is negative: row 0 is the northern edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner.
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner.
    pub origin_y: f64,
    /// Cell size along x.
    pub pixel_width: f64,
    /// Cell size along y (negative for north-up).
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Create a transform.
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// A north-up transform whose upper-left corner is that of `extent`.
    pub fn north_up(extent: &Extent, pixel_size: f64) -> Self {
        Self::new(extent.min_x, extent.max_y, pixel_size, -pixel_size)
    }

    /// Coordinates of a pixel centre.
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            self.origin_y + (row as f64 + 0.5) * self.pixel_height,
        )
    }

    /// Fractional (col, row) position of a coordinate.
    pub fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.pixel_width,
            (y - self.origin_y) / self.pixel_height,
        )
    }

    /// Footprint of a grid with the given shape.
    pub fn extent(&self, rows: usize, cols: usize) -> Result<Extent> {
        let x1 = self.origin_x + cols as f64 * self.pixel_width;
        let y1 = self.origin_y + rows as f64 * self.pixel_height;
        Extent::new(
            self.origin_x.min(x1),
            self.origin_x.max(x1),
            self.origin_y.min(y1),
            self.origin_y.max(y1),
        )
    }

    /// The same transform shifted to start at (`row`, `col`).
    pub fn offset(&self, row: usize, col: usize) -> Self {
        Self {
            origin_x: self.origin_x + col as f64 * self.pixel_width,
            origin_y: self.origin_y + row as f64 * self.pixel_height,
            ..*self
        }
    }
}

/// A cell value type.
pub trait Pixel: Copy + PartialEq + Debug + Send + Sync + 'static {
    /// Widen to `f64`.
    fn to_f64(self) -> f64;

    /// Narrow from `f64`, saturating for integer types.
    fn from_f64(value: f64) -> Self;

    /// Whether this value is the no-data marker (NaN always is for floats).
    fn is_nodata(self, nodata: Option<Self>) -> bool;
}

macro_rules! impl_pixel_int {
    ($($t:ty),*) => {$(
        impl Pixel for $t {
            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(value: f64) -> Self {
                value as $t
            }

            fn is_nodata(self, nodata: Option<Self>) -> bool {
                nodata == Some(self)
            }
        }
    )*};
}

macro_rules! impl_pixel_float {
    ($($t:ty),*) => {$(
        impl Pixel for $t {
            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(value: f64) -> Self {
                value as $t
            }

            fn is_nodata(self, nodata: Option<Self>) -> bool {
                self.is_nan() || nodata == Some(self)
            }
        }
    )*};
}

impl_pixel_int!(u8, u16, i16, u32, i32);
impl_pixel_float!(f32, f64);

/// A georeferenced single-band grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster<T: Pixel> {
    data: Array2<T>,
    transform: GeoTransform,
    crs: Option<Crs>,
    nodata: Option<T>,
}

impl<T: Pixel> Raster<T> {
    /// Wrap an array.
    pub fn new(data: Array2<T>, transform: GeoTransform, crs: Option<Crs>) -> Self {
        Self {
            data,
            transform,
            crs,
            nodata: None,
        }
    }

    /// Build from row-major values.
    pub fn from_vec(
        values: Vec<T>,
        rows: usize,
        cols: usize,
        transform: GeoTransform,
        crs: Option<Crs>,
    ) -> Result<Self> {
        let len = values.len();
        let data = Array2::from_shape_vec((rows, cols), values)
            .map_err(|_| GeoError::InvalidDimensions { rows, cols, len })?;
        Ok(Self::new(data, transform, crs))
    }

    /// A grid with every cell set to `value`.
    pub fn filled(
        rows: usize,
        cols: usize,
        value: T,
        transform: GeoTransform,
        crs: Option<Crs>,
    ) -> Self {
        Self::new(Array2::from_elem((rows, cols), value), transform, crs)
    }

    /// Set the no-data marker.
    pub fn with_nodata(mut self, nodata: Option<T>) -> Self {
        self.nodata = nodata;
        self
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Cell values.
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Mutable cell values.
    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    /// Affine transform.
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// CRS, if known.
    pub fn crs(&self) -> Option<Crs> {
        self.crs
    }

    /// Set the CRS.
    pub fn set_crs(&mut self, crs: Option<Crs>) {
        self.crs = crs;
    }

    /// No-data marker, if any.
    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    /// Value at (`row`, `col`), `None` out of bounds.
    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        self.data.get((row, col)).copied()
    }

    /// Whether a cell holds data.
    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        self.get(row, col)
            .map(|v| !v.is_nodata(self.nodata))
            .unwrap_or(false)
    }

    /// Cell containing a coordinate.
    pub fn cell_at(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let (col, row) = self.transform.to_pixel(x, y);
        if !(col >= 0.0 && row >= 0.0) {
            return None;
        }
        let (row, col) = (row.floor() as usize, col.floor() as usize);
        (row < self.rows() && col < self.cols()).then_some((row, col))
    }

    /// Footprint of the grid.
    pub fn extent(&self) -> Result<Extent> {
        self.transform.extent(self.rows(), self.cols())
    }

    /// Number of cells holding data.
    pub fn valid_count(&self) -> usize {
        self.data
            .iter()
            .filter(|v| !v.is_nodata(self.nodata))
            .count()
    }

    /// Apply `f` to every cell, keeping shape, transform and CRS.
    pub fn map<U: Pixel, F: Fn(T) -> U>(&self, f: F, nodata: Option<U>) -> Raster<U> {
        Raster {
            data: self.data.mapv(f),
            transform: self.transform,
            crs: self.crs,
            nodata,
        }
    }
}
