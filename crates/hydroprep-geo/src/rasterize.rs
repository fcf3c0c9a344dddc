//! Polygon-to-grid rasterization.

use crate::raster::GeoTransform;
use geo::{LineString, MultiPolygon};
use ndarray::Array2;

/// Mark the cells whose centre lies inside `geometry`.
///
/// Uses an even-odd scanline fill over every ring, so holes are excluded.
/// A centre exactly on a left or bottom edge counts as inside.
pub fn polygon_mask(
    geometry: &MultiPolygon<f64>,
    transform: &GeoTransform,
    rows: usize,
    cols: usize,
) -> Array2<bool> {
    let mut mask = Array2::from_elem((rows, cols), false);
    let rings: Vec<&LineString<f64>> = geometry
        .0
        .iter()
        .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors().iter()))
        .collect();

    let mut crossings: Vec<f64> = Vec::new();
    for row in 0..rows {
        let (_, y) = transform.pixel_center(row, 0);
        crossings.clear();
        for ring in &rings {
            for line in ring.lines() {
                let (a, b) = (line.start, line.end);
                if (a.y <= y) != (b.y <= y) {
                    let t = (y - a.y) / (b.y - a.y);
                    crossings.push(a.x + t * (b.x - a.x));
                }
            }
        }
        crossings.sort_by(|a, b| a.total_cmp(b));

        for span in crossings.chunks_exact(2) {
            let (start, end) = column_span(transform, span[0], span[1], cols);
            for col in start..end {
                mask[(row, col)] = true;
            }
        }
    }
    mask
}

/// Columns whose centre x falls in `[x0, x1)`.
fn column_span(transform: &GeoTransform, x0: f64, x1: f64, cols: usize) -> (usize, usize) {
    let to_col = |x: f64| ((x - transform.origin_x) / transform.pixel_width - 0.5).ceil();
    let clamp = |c: f64| c.max(0.0).min(cols as f64) as usize;
    let (a, b) = (to_col(x0), to_col(x1));
    (clamp(a.min(b)), clamp(a.max(b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn test_square_mask() {
        // 10x10 grid of unit cells, square covering cells 2..5 in both axes
        let transform = GeoTransform::new(0.0, 10.0, 1.0, -1.0);
        let mp = MultiPolygon::new(vec![polygon![
            (x: 2.0, y: 5.0),
            (x: 5.0, y: 5.0),
            (x: 5.0, y: 8.0),
            (x: 2.0, y: 8.0),
        ]]);
        let mask = polygon_mask(&mp, &transform, 10, 10);
        assert_eq!(mask.iter().filter(|v| **v).count(), 9);
        assert!(mask[(2, 2)]);
        assert!(mask[(4, 4)]);
        assert!(!mask[(5, 4)]);
        assert!(!mask[(2, 5)]);
    }

    #[test]
    fn test_hole_excluded() {
        let transform = GeoTransform::new(0.0, 4.0, 1.0, -1.0);
        let mp = MultiPolygon::new(vec![polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 4.0)],
            interiors: [[(x: 1.0, y: 1.0), (x: 3.0, y: 1.0), (x: 3.0, y: 3.0), (x: 1.0, y: 3.0)]]
        )]);
        let mask = polygon_mask(&mp, &transform, 4, 4);
        assert_eq!(mask.iter().filter(|v| **v).count(), 12);
        assert!(!mask[(1, 1)]);
        assert!(!mask[(2, 2)]);
        assert!(mask[(0, 0)]);
    }

    #[test]
    fn test_triangle_centres_inside() {
        use geo::{Contains, Point};
        let transform = GeoTransform::new(0.0, 20.0, 1.0, -1.0);
        let tri = polygon![(x: 0.3, y: 0.2), (x: 19.6, y: 1.1), (x: 9.7, y: 19.4)];
        let mp = MultiPolygon::new(vec![tri.clone()]);
        let mask = polygon_mask(&mp, &transform, 20, 20);
        for ((row, col), inside) in mask.indexed_iter() {
            let (x, y) = transform.pixel_center(row, col);
            assert_eq!(*inside, tri.contains(&Point::new(x, y)), "cell ({}, {})", row, col);
        }
    }
}
