//! Grid resampling when the number of columns or rows changes
//!
//! Every row (when columns change) or column (when rows change) is treated
//! as a curve through its control points. The curve is either a polyline or
//! a piecewise Catmull-Rom spline, and the new control points are placed at
//! even fractions of its arc length so the warp keeps its shape.

use crate::error::{Result, WarpError};
use crate::geometry::Point;
use crate::grid::{ControlGrid, MAX_CONTROL_POINTS};

/// Number of line segments used to flatten one spline segment
const CURVE_RESOLUTION: usize = 20;

/// Grid direction being resized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Change the number of columns (`num_controls_x`)
    Columns,
    /// Change the number of rows (`num_controls_y`)
    Rows,
}

/// Result of a resize: new dimensions and their points
#[derive(Debug, Clone)]
pub struct Resampled {
    pub columns: usize,
    pub rows: usize,
    pub points: Vec<Point>,
}

/// Resample `grid` so that `axis` holds `count` control points
///
/// `count` is raised to at least 2. Fails with `CapacityExceeded` if the new
/// grid would hold more than `MAX_CONTROL_POINTS`; the grid is never touched.
pub fn resize(grid: &ControlGrid, axis: Axis, count: usize, linear: bool) -> Result<Resampled> {
    let count = count.max(2);
    let (columns, rows) = match axis {
        Axis::Columns => (count, grid.num_controls_y()),
        Axis::Rows => (grid.num_controls_x(), count),
    };

    if columns.checked_mul(rows).map_or(true, |n| n > MAX_CONTROL_POINTS) {
        return Err(WarpError::CapacityExceeded {
            columns,
            rows,
            max: MAX_CONTROL_POINTS,
        });
    }

    let mut points = vec![Point::ZERO; columns * rows];
    let step = 1.0 / (count - 1) as f64;

    match axis {
        Axis::Columns => {
            for row in 0..rows {
                let curve = build_curve(grid.num_controls_x(), linear, |col| grid.point_at(col, row as isize));
                for col in 0..count {
                    points[col * rows + row] = curve.point_at_percent(col as f64 * step);
                }
            }
        }
        Axis::Rows => {
            for col in 0..columns {
                let curve = build_curve(grid.num_controls_y(), linear, |row| grid.point_at(col as isize, row));
                for row in 0..count {
                    points[col * rows + row] = curve.point_at_percent(row as f64 * step);
                }
            }
        }
    }

    Ok(Resampled {
        columns,
        rows,
        points,
    })
}

/// Build the curve through `len` knots fetched with `knot`
///
/// `knot` must accept indices from -1 to `len`, the grid extrapolates those.
fn build_curve(len: usize, linear: bool, knot: impl Fn(isize) -> Point) -> Polyline {
    let mut polyline = Polyline::default();

    if linear {
        for i in 0..len as isize {
            polyline.line_to(knot(i));
        }
        return polyline;
    }

    polyline.line_to(knot(0));
    for i in 0..(len as isize - 1) {
        let p0 = knot(i - 1);
        let p1 = knot(i);
        let p2 = knot(i + 1);
        let p3 = knot(i + 2);

        // Bezier handles of the Catmull-Rom segment between p1 and p2
        let b1 = p1 + (p2 - p0) / 6.0;
        let b2 = p2 - (p3 - p1) / 6.0;

        for step in 1..=CURVE_RESOLUTION {
            let t = step as f64 / CURVE_RESOLUTION as f64;
            polyline.line_to(cubic_bezier(p1, b1, b2, p2, t));
        }
    }

    polyline
}

fn cubic_bezier(p0: Point, p1: Point, p2: Point, p3: Point, t: f64) -> Point {
    let u = 1.0 - t;
    p0 * (u * u * u) + p1 * (3.0 * u * u * t) + p2 * (3.0 * u * t * t) + p3 * (t * t * t)
}

/// Polyline with cumulative arc lengths for sampling by percentage
#[derive(Debug, Default)]
struct Polyline {
    points: Vec<Point>,
    lengths: Vec<f64>,
}

impl Polyline {
    fn line_to(&mut self, p: Point) {
        let length = match self.points.last() {
            Some(last) => self.lengths[self.lengths.len() - 1] + last.distance(p),
            None => 0.0,
        };
        self.points.push(p);
        self.lengths.push(length);
    }

    fn total_length(&self) -> f64 {
        self.lengths.last().copied().unwrap_or(0.0)
    }

    /// Point at `percent` of the arc length, endpoints are exact
    fn point_at_percent(&self, percent: f64) -> Point {
        let (Some(first), Some(last)) = (self.points.first(), self.points.last()) else {
            return Point::ZERO;
        };

        let total = self.total_length();
        if percent <= 0.0 || total <= 0.0 {
            return *first;
        }
        if percent >= 1.0 {
            return *last;
        }

        let target = percent * total;
        // First vertex at or past the target length
        let i = self.lengths.partition_point(|&l| l < target).max(1);
        let (l0, l1) = (self.lengths[i - 1], self.lengths[i]);
        let t = if l1 > l0 { (target - l0) / (l1 - l0) } else { 0.0 };

        self.points[i - 1].lerp(self.points[i], t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_points_close(a: &[Point], b: &[Point], eps: f64) {
        assert_eq!(a.len(), b.len());
        for (p, q) in a.iter().zip(b) {
            assert!((p.x - q.x).abs() < eps && (p.y - q.y).abs() < eps, "{:?} != {:?}", p, q);
        }
    }

    fn apply(grid: &mut ControlGrid, resampled: Resampled) {
        grid.replace_points(resampled.columns, resampled.rows, resampled.points);
    }

    #[test]
    fn test_linear_resize_spacing() {
        let grid = ControlGrid::new(2, 2);
        let out = resize(&grid, Axis::Columns, 5, true).unwrap();

        assert_eq!(out.columns, 5);
        assert_eq!(out.rows, 2);
        for col in 0..5 {
            let p = out.points[col * 2];
            assert!((p.x - col as f64 * 0.25).abs() < 1e-9);
            assert!(p.y.abs() < 1e-9);
        }
    }

    #[test]
    fn test_linear_round_trip() {
        let mut grid = ControlGrid::new(4, 3);
        let original = grid.control_points().to_vec();

        let out = resize(&grid, Axis::Rows, 7, true).unwrap();
        apply(&mut grid, out);
        let out = resize(&grid, Axis::Rows, 3, true).unwrap();
        apply(&mut grid, out);

        assert_points_close(grid.control_points(), &original, 1e-9);
    }

    #[test]
    fn test_grow_then_shrink_restores_endpoints() {
        let mut grid = ControlGrid::new(2, 2);
        grid.set_control_point(2, Point::new(0.9, 0.1));
        grid.set_control_point(3, Point::new(0.8, 0.95));
        let original = grid.control_points().to_vec();

        let out = resize(&grid, Axis::Columns, 5, true).unwrap();
        apply(&mut grid, out);
        let out = resize(&grid, Axis::Columns, 2, true).unwrap();
        apply(&mut grid, out);

        assert_points_close(grid.control_points(), &original, 1e-12);
    }

    #[test]
    fn test_curved_resize_keeps_straight_grid() {
        // Catmull-Rom through collinear, evenly spaced knots stays on the line
        let grid = ControlGrid::new(3, 2);
        let out = resize(&grid, Axis::Columns, 5, false).unwrap();

        for col in 0..5 {
            let top = out.points[col * 2];
            let bottom = out.points[col * 2 + 1];
            assert!((top.x - col as f64 * 0.25).abs() < 1e-6);
            assert!(top.y.abs() < 1e-9);
            assert!((bottom.y - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_curved_resize_passes_through_knots() {
        let mut grid = ControlGrid::new(3, 2);
        grid.set_control_point(2, Point::new(0.5, 0.2));
        let bent = grid.control_points().to_vec();

        let out = resize(&grid, Axis::Columns, 3, false).unwrap();
        // Endpoints are exact, the middle lands near the bent knot
        assert_eq!(out.points[0], bent[0]);
        assert_eq!(out.points[4], bent[4]);
        assert!(out.points[2].distance(bent[2]) < 0.05);
    }

    #[test]
    fn test_minimum_count() {
        let grid = ControlGrid::new(3, 3);
        let out = resize(&grid, Axis::Rows, 0, true).unwrap();
        assert_eq!(out.rows, 2);
        assert_eq!(out.points.len(), 6);
    }

    #[test]
    fn test_capacity_exceeded() {
        let grid = ControlGrid::new(2, 32);
        let err = resize(&grid, Axis::Columns, 33, true).unwrap_err();
        assert_eq!(
            err,
            WarpError::CapacityExceeded {
                columns: 33,
                rows: 32,
                max: MAX_CONTROL_POINTS
            }
        );
        assert!(resize(&grid, Axis::Columns, 32, true).is_ok());

        // Sizes whose point count overflows are rejected the same way
        assert!(matches!(
            resize(&grid, Axis::Columns, usize::MAX, true),
            Err(WarpError::CapacityExceeded { columns: usize::MAX, rows: 32, .. })
        ));
        let mut warp = crate::bilinear::BilinearWarp::new(2, 2);
        assert!(warp.set_num_controls_x(usize::MAX).is_err());
        assert_eq!(warp.grid().num_control_points(), 4);
    }
}
