//! Four-corner perspective warp
//!
//! This module implements the perspective (homography) transformation that
//! maps the rectangular content onto an arbitrary quadrilateral given by four
//! control points. The 3x3 homography is embedded in a 4x4 matrix that leaves
//! the Z axis alone so it can be pushed onto a regular 3D transform stack.

use nalgebra::{Matrix4, Vector4};
use tracing::{debug, warn};

use crate::geometry::{Point, Size};
use crate::grid::ControlGrid;

/// Perspective warp driven by four corner points
///
/// Control point order is top-left, top-right, bottom-right, bottom-left.
#[derive(Debug, Clone)]
pub struct PerspectiveWarp {
    grid: ControlGrid,
    /// Corners of the content rectangle in pixels
    src_points: [Point; 4],
    /// Control points converted to window pixels
    dst_points: [Point; 4],
    transform: Matrix4<f64>,
    transform_inverted: Matrix4<f64>,
}

impl Default for PerspectiveWarp {
    fn default() -> Self {
        Self::new()
    }
}

impl PerspectiveWarp {
    pub fn new() -> Self {
        let mut warp = Self {
            grid: ControlGrid::new(2, 2),
            src_points: [Point::ZERO; 4],
            dst_points: [Point::ZERO; 4],
            transform: Matrix4::identity(),
            transform_inverted: Matrix4::identity(),
        };
        warp.reset();
        warp
    }

    pub fn grid(&self) -> &ControlGrid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut ControlGrid {
        &mut self.grid
    }

    /// Reset the corners to the undistorted content
    pub fn reset(&mut self) {
        self.grid.replace_points(
            2,
            2,
            vec![
                Point::new(0.0, 0.0), // Top-left
                Point::new(1.0, 0.0), // Top-right
                Point::new(1.0, 1.0), // Bottom-right
                Point::new(0.0, 1.0), // Bottom-left
            ],
        );
    }

    /// Return the forward transform, recomputing it if stale
    pub fn transform(&mut self) -> Matrix4<f64> {
        self.update();
        self.transform
    }

    /// Return the inverse transform, recomputing it if stale
    pub fn transform_inverted(&mut self) -> Matrix4<f64> {
        self.update();
        self.transform_inverted
    }

    /// Forward and inverse transform without touching the cache
    ///
    /// Returns the cached pair when it is fresh, otherwise solves from the
    /// current control points.
    pub fn current_transforms(&self) -> (Matrix4<f64>, Matrix4<f64>) {
        if !self.grid.is_dirty() {
            return (self.transform, self.transform_inverted);
        }

        let (src, dst) = self.corner_pairs();
        let transform = compute_homography(src, dst);
        (transform, invert(&transform))
    }

    /// Corners of the content rectangle in pixels as of the last update
    pub fn src_points(&self) -> [Point; 4] {
        self.src_points
    }

    /// Corners of the quad in window pixels as of the last update
    pub fn dst_points(&self) -> [Point; 4] {
        self.dst_points
    }

    /// Recompute the cached transforms if any input changed
    pub fn update(&mut self) {
        if !self.grid.is_dirty() {
            return;
        }

        let (src, dst) = self.corner_pairs();
        self.src_points = src;
        self.dst_points = dst;

        self.transform = compute_homography(src, dst);
        self.transform_inverted = invert(&self.transform);
        self.grid.clear_dirty();

        debug!("Recomputed perspective transform for {:?}", dst);
    }

    fn corner_pairs(&self) -> ([Point; 4], [Point; 4]) {
        let Size { width, height } = self.grid.size();
        let src = [
            Point::new(0.0, 0.0),
            Point::new(width, 0.0),
            Point::new(width, height),
            Point::new(0.0, height),
        ];

        let window = self.grid.window_size();
        let points = self.grid.control_points();
        let dst = [
            points[0].to_pixels(window),
            points[1].to_pixels(window),
            points[2].to_pixels(window),
            points[3].to_pixels(window),
        ];

        (src, dst)
    }

    /// Rotate the corners one step clockwise, keeping the selection on the same point
    pub fn rotate_clockwise(&mut self) {
        self.grid_points_mut().rotate_left(1);
        self.shift_selection(3);
    }

    /// Rotate the corners one step counterclockwise
    pub fn rotate_counterclockwise(&mut self) {
        self.grid_points_mut().rotate_right(1);
        self.shift_selection(1);
    }

    /// Mirror left and right: swaps 0 with 1 and 2 with 3
    pub fn flip_horizontal(&mut self) {
        let points = self.grid_points_mut();
        points.swap(0, 1);
        points.swap(2, 3);

        let selected = self.grid.selected_control_point().map(|i| i ^ 1);
        self.grid.set_selected(selected);
    }

    /// Mirror top and bottom: swaps 0 with 3 and 1 with 2
    pub fn flip_vertical(&mut self) {
        let points = self.grid_points_mut();
        points.swap(0, 3);
        points.swap(1, 2);

        let n = self.grid.num_control_points();
        let selected = self.grid.selected_control_point().map(|i| (n - 1) - i);
        self.grid.set_selected(selected);
    }

    fn grid_points_mut(&mut self) -> &mut [Point] {
        self.grid.mark_dirty();
        self.grid.control_points_mut()
    }

    fn shift_selection(&mut self, offset: usize) {
        let selected = self.grid.selected_control_point().map(|i| (i + offset) % 4);
        self.grid.set_selected(selected);
    }
}

/// Compute the projective transform taking the `src` quad onto the `dst` quad
///
/// Sets up the 8x8 system of the Direct Linear Transform with the homogeneous
/// scale fixed to 1 and embeds the result in a 4x4 matrix with identity Z.
/// Three or more collinear points make the system singular; the result is
/// then meaningless but finite operations never panic.
pub fn compute_homography(src: [Point; 4], dst: [Point; 4]) -> Matrix4<f64> {
    // For each correspondence (x,y) -> (x',y') two rows:
    // -x*h0 - y*h1 - h2 + x*x'*h6 + y*x'*h7 = -x'
    // -x*h3 - y*h4 - h5 + x*y'*h6 + y*y'*h7 = -y'
    let mut a = [[0.0f64; 9]; 8];

    for i in 0..4 {
        let Point { x, y } = src[i];
        let Point { x: xp, y: yp } = dst[i];

        a[i * 2] = [-x, -y, -1.0, 0.0, 0.0, 0.0, x * xp, y * xp, -xp];
        a[i * 2 + 1] = [0.0, 0.0, 0.0, -x, -y, -1.0, x * yp, y * yp, -yp];
    }

    let h = solve_linear_system(&mut a);

    #[rustfmt::skip]
    let m = Matrix4::new(
        h[0], h[1], 0.0, h[2],
        h[3], h[4], 0.0, h[5],
        0.0,  0.0,  1.0, 0.0,
        h[6], h[7], 0.0, 1.0,
    );
    m
}

/// Solve an 8x8 system given as an augmented 8x9 matrix
///
/// Gaussian elimination with partial pivoting: the pivot is the largest
/// absolute value in the current column among the rows not yet processed.
/// Columns whose pivot is exactly zero are skipped. Solution ends up in the
/// last column and is returned.
fn solve_linear_system(a: &mut [[f64; 9]; 8]) -> [f64; 8] {
    let rows = 8;
    let cols = 9;

    // Forward elimination
    let mut row = 0;
    let mut col = 0;
    while row < rows && col < cols {
        let mut max_row = row;
        for k in (row + 1)..rows {
            if a[k][col].abs() > a[max_row][col].abs() {
                max_row = k;
            }
        }

        if a[max_row][col] != 0.0 {
            if max_row != row {
                a.swap(row, max_row);
            }

            let pivot = a[row][col];
            for k in 0..cols {
                a[row][k] /= pivot;
            }

            for u in (row + 1)..rows {
                let factor = a[u][col];
                for k in 0..cols {
                    a[u][k] -= factor * a[row][k];
                }
            }

            row += 1;
        }
        col += 1;
    }

    // Back substitution, the last row is already solved
    for i in (0..rows - 1).rev() {
        for j in (i + 1)..rows {
            a[i][rows] -= a[i][j] * a[j][rows];
        }
    }

    let mut x = [0.0f64; 8];
    for (i, value) in x.iter_mut().enumerate() {
        *value = a[i][rows];
    }
    x
}

/// Invert a transform, falling back to identity when it is singular
pub fn invert(m: &Matrix4<f64>) -> Matrix4<f64> {
    m.try_inverse().unwrap_or_else(|| {
        warn!("Perspective transform is singular, using identity inverse");
        Matrix4::identity()
    })
}

/// Apply a homography matrix to a point, including the homogeneous divide
#[inline]
pub fn apply_homography(m: &Matrix4<f64>, p: Point) -> Point {
    let v = m * Vector4::new(p.x, p.y, 0.0, 1.0);
    let w = if v.w != 0.0 { 1.0 / v.w } else { 1.0 };
    Point::new(v.x * w, v.y * w)
}
