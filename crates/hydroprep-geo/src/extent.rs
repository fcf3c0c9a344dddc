//! Axis-aligned extents.

use crate::{GeoError, Result};
use geo::{BoundingRect, Coord, MultiPolygon, Polygon, Rect};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An axis-aligned rectangle `(min_x, max_x, min_y, max_y)` in some CRS.
///
/// Construction through [`Extent::new`] guarantees `max > min` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    /// West edge.
    pub min_x: f64,
    /// East edge.
    pub max_x: f64,
    /// South edge.
    pub min_y: f64,
    /// North edge.
    pub max_y: f64,
}

impl Extent {
    /// Create an extent, rejecting empty or inverted rectangles.
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Result<Self> {
        let finite = [min_x, max_x, min_y, max_y].iter().all(|v| v.is_finite());
        if !finite || max_x <= min_x || max_y <= min_y {
            return Err(GeoError::InvalidExtent {
                min_x,
                max_x,
                min_y,
                max_y,
            });
        }
        Ok(Self {
            min_x,
            max_x,
            min_y,
            max_y,
        })
    }

    /// Bounding extent of a multipolygon.
    pub fn of_geometry(geometry: &MultiPolygon<f64>) -> Result<Self> {
        let rect = geometry
            .bounding_rect()
            .ok_or_else(|| GeoError::EmptyGeometry("no coordinates".to_string()))?;
        Self::from_rect(rect)
    }

    /// Convert a `geo::Rect`.
    pub fn from_rect(rect: Rect<f64>) -> Result<Self> {
        Self::new(rect.min().x, rect.max().x, rect.min().y, rect.max().y)
    }

    /// Span along x.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Span along y.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Area in square CRS units.
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Check if a coordinate is within the extent (edges inclusive).
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Grow each side by `fraction` of the span along that axis.
    pub fn buffered(&self, fraction: f64) -> Self {
        let dx = self.width() * fraction.max(0.0);
        let dy = self.height() * fraction.max(0.0);
        self.expanded_xy(dx, dy)
    }

    /// Grow each side by a fixed margin in CRS units.
    pub fn expanded(&self, margin: f64) -> Self {
        let margin = margin.max(0.0);
        self.expanded_xy(margin, margin)
    }

    fn expanded_xy(&self, dx: f64, dy: f64) -> Self {
        Self {
            min_x: self.min_x - dx,
            max_x: self.max_x + dx,
            min_y: self.min_y - dy,
            max_y: self.max_y + dy,
        }
    }

    /// Round every edge to `decimals` decimal places.
    pub fn rounded(&self, decimals: i32) -> Self {
        let scale = 10f64.powi(decimals);
        let round = |v: f64| (v * scale).round() / scale;
        Self {
            min_x: round(self.min_x),
            max_x: round(self.max_x),
            min_y: round(self.min_y),
            max_y: round(self.max_y),
        }
    }

    /// Overlap of two extents, if they share a non-empty area.
    pub fn intersection(&self, other: &Extent) -> Option<Extent> {
        Extent::new(
            self.min_x.max(other.min_x),
            self.max_x.min(other.max_x),
            self.min_y.max(other.min_y),
            self.max_y.min(other.max_y),
        )
        .ok()
    }

    /// Smallest extent covering both.
    pub fn union(&self, other: &Extent) -> Extent {
        Extent {
            min_x: self.min_x.min(other.min_x),
            max_x: self.max_x.max(other.max_x),
            min_y: self.min_y.min(other.min_y),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// As a `geo::Rect`.
    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            Coord {
                x: self.min_x,
                y: self.min_y,
            },
            Coord {
                x: self.max_x,
                y: self.max_y,
            },
        )
    }

    /// As a closed polygon ring.
    pub fn to_polygon(&self) -> Polygon<f64> {
        self.to_rect().to_polygon()
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.min_x, self.max_x, self.min_y, self.max_y
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::polygon;

    #[test]
    fn test_new_rejects_inverted() {
        assert!(Extent::new(1.0, 0.0, 0.0, 1.0).is_err());
        assert!(Extent::new(0.0, 1.0, 1.0, 1.0).is_err());
        assert!(Extent::new(0.0, f64::NAN, 0.0, 1.0).is_err());
        assert!(Extent::new(0.0, 1.0, 0.0, 1.0).is_ok());
    }

    #[test]
    fn test_of_geometry() {
        let mp = MultiPolygon::new(vec![polygon![
            (x: -80.0, y: 35.0),
            (x: -79.9, y: 35.0),
            (x: -79.9, y: 35.1),
            (x: -80.0, y: 35.1),
        ]]);
        let extent = Extent::of_geometry(&mp).unwrap();
        assert_relative_eq!(extent.min_x, -80.0);
        assert_relative_eq!(extent.max_y, 35.1);

        let empty: MultiPolygon<f64> = MultiPolygon::new(vec![]);
        assert!(matches!(
            Extent::of_geometry(&empty),
            Err(GeoError::EmptyGeometry(_))
        ));
    }

    #[test]
    fn test_buffered_and_expanded() {
        let extent = Extent::new(0.0, 10.0, 0.0, 20.0).unwrap();
        let buffered = extent.buffered(0.05);
        assert_relative_eq!(buffered.min_x, -0.5);
        assert_relative_eq!(buffered.max_x, 10.5);
        assert_relative_eq!(buffered.min_y, -1.0);
        assert_relative_eq!(buffered.max_y, 21.0);

        let expanded = extent.expanded(2.0);
        assert_relative_eq!(expanded.area(), 14.0 * 24.0);
    }

    #[test]
    fn test_intersection_and_union() {
        let a = Extent::new(0.0, 2.0, 0.0, 2.0).unwrap();
        let b = Extent::new(1.0, 3.0, 1.0, 3.0).unwrap();
        let c = Extent::new(5.0, 6.0, 5.0, 6.0).unwrap();

        assert_eq!(a.intersection(&b), Extent::new(1.0, 2.0, 1.0, 2.0).ok());
        assert!(a.intersection(&c).is_none());
        assert_eq!(a.union(&c), Extent::new(0.0, 6.0, 0.0, 6.0).unwrap());
    }

    #[test]
    fn test_rounded() {
        let extent = Extent::new(0.123456789, 1.0, 0.0, 1.987654321).unwrap();
        let rounded = extent.rounded(4);
        assert_relative_eq!(rounded.min_x, 0.1235);
        assert_relative_eq!(rounded.max_y, 1.9877);
    }
}
