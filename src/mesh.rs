//! Adaptive triangle mesh for bilinear warps
//!
//! The mesh density follows the on-screen size of the warp: every quad is
//! roughly `resolution` pixels wide. Vertex counts are snapped so that each
//! control grid cell holds a whole number of quads, then vertex positions are
//! interpolated from the control points either bilinearly or with a 2D
//! Catmull-Rom spline.

use serde::Serialize;

use crate::geometry::{Point, Size};
use crate::grid::ControlGrid;

/// Ready to draw indexed triangle mesh, positions in window pixels
#[derive(Debug, Clone, Default, Serialize)]
pub struct Mesh {
    /// Number of vertex columns
    pub resolution_x: usize,
    /// Number of vertex rows
    pub resolution_y: usize,
    pub positions: Vec<[f32; 3]>,
    pub tex_coords: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Vertex counts for a mesh whose quads measure about `resolution` pixels
///
/// `extent` is either the pixel bounds of the control points (adaptive) or
/// the content size.
pub fn compute_resolution(extent: Size, resolution: u32, num_controls_x: usize, num_controls_y: usize) -> (usize, usize) {
    let resolution = resolution.max(1) as f64;
    let quads_x = (extent.width / resolution) as i64;
    let quads_y = (extent.height / resolution) as i64;

    (
        snap_resolution(quads_x, num_controls_x),
        snap_resolution(quads_y, num_controls_y),
    )
}

/// Convert a quad count into a vertex count compatible with the control grid
///
/// The vertex count minus one is moved to the nearest multiple of
/// `num_controls - 1`; remainders of at least half the control count round
/// up. Never returns fewer vertices than there are control points.
pub fn snap_resolution(quads: i64, num_controls: usize) -> usize {
    let controls = num_controls as i64;
    let mut vertices = quads.max(0) + 1;

    if controls < vertices {
        let mut d = (vertices - 1) % (controls - 1);
        if d >= controls / 2 {
            d -= controls - 1;
        }
        vertices -= d;
    } else {
        vertices = controls;
    }

    vertices as usize
}

/// Triangle indices and texture coordinates for a grid of vertices
///
/// Vertices are laid out column by column (`x * resolution_y + y`). Texture
/// coordinates span `tex_corners` given as (left, top, right, bottom).
pub fn build_topology(resolution_x: usize, resolution_y: usize, tex_corners: [f64; 4]) -> (Vec<u32>, Vec<[f32; 2]>) {
    let num_indices = 6 * resolution_x.saturating_sub(1) * resolution_y.saturating_sub(1);
    let mut indices = Vec::with_capacity(num_indices);
    let mut tex_coords = Vec::with_capacity(resolution_x * resolution_y);

    let [left, top, right, bottom] = tex_corners;
    let vertex = |x: usize, y: usize| (x * resolution_y + y) as u32;

    for x in 0..resolution_x {
        for y in 0..resolution_y {
            if x + 1 < resolution_x && y + 1 < resolution_y {
                indices.extend_from_slice(&[vertex(x, y), vertex(x + 1, y), vertex(x + 1, y + 1)]);
                indices.extend_from_slice(&[vertex(x, y), vertex(x + 1, y + 1), vertex(x, y + 1)]);
            }

            let tx = lerp(left, right, x as f64 / (resolution_x - 1) as f64);
            let ty = lerp(top, bottom, y as f64 / (resolution_y - 1) as f64);
            tex_coords.push([tx as f32, ty as f32]);
        }
    }

    (indices, tex_coords)
}

/// Interpolate every vertex position from the control grid
///
/// Positions come out in window pixels with z = 0.
pub fn update_positions(grid: &ControlGrid, resolution_x: usize, resolution_y: usize, linear: bool) -> Vec<[f32; 3]> {
    let spans_x = (grid.num_controls_x() - 1) as f64;
    let spans_y = (grid.num_controls_y() - 1) as f64;
    let window = grid.window_size();

    let mut positions = Vec::with_capacity(resolution_x * resolution_y);

    for x in 0..resolution_x {
        for y in 0..resolution_y {
            // Map into control grid space [0, num_controls - 1]
            let u = x as f64 * spans_x / (resolution_x - 1) as f64;
            let v = y as f64 * spans_y / (resolution_y - 1) as f64;

            let col = u as isize;
            let row = v as isize;
            let u = u - col as f64;
            let v = v - row as f64;

            let pt = if linear {
                let p1 = grid.point_at(col, row).lerp(grid.point_at(col + 1, row), u);
                let p2 = grid.point_at(col, row + 1).lerp(grid.point_at(col + 1, row + 1), u);
                p1.lerp(p2, v)
            } else {
                let mut columns = [Point::ZERO; 4];
                for (i, dc) in (-1..3).enumerate() {
                    let knots = [
                        grid.point_at(col + dc, row - 1),
                        grid.point_at(col + dc, row),
                        grid.point_at(col + dc, row + 1),
                        grid.point_at(col + dc, row + 2),
                    ];
                    columns[i] = cubic_interpolate(&knots, v);
                }
                cubic_interpolate(&columns, u)
            };

            let pt = pt.to_pixels(window);
            positions.push([pt.x as f32, pt.y as f32, 0.0]);
        }
    }

    positions
}

/// Catmull-Rom interpolation between `knots[1]` and `knots[2]`
#[inline]
pub fn cubic_interpolate(knots: &[Point; 4], t: f64) -> Point {
    let [k0, k1, k2, k3] = *knots;
    k1 + (k2 - k0 + (k0 * 2.0 - k1 * 5.0 + k2 * 4.0 - k3 + ((k1 - k2) * 3.0 + k3 - k0) * t) * t) * (0.5 * t)
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snap_exact_multiple() {
        // 640 / 16 = 40 quads, 41 vertices; divisible by 1 and 2 spans
        assert_eq!(snap_resolution(40, 2), 41);
        assert_eq!(snap_resolution(40, 3), 41);
        assert_eq!(snap_resolution(30, 3), 31);
    }

    #[test]
    fn test_snap_rounds_down_small_remainder() {
        // 40 % 3 = 1, below 4 / 2
        assert_eq!(snap_resolution(40, 4), 40);
    }

    #[test]
    fn test_snap_rounds_up_large_remainder() {
        // 41 % 3 = 2, at least 4 / 2, so grow to 43 vertices
        assert_eq!(snap_resolution(41, 4), 43);
    }

    #[test]
    fn test_snap_never_below_controls() {
        assert_eq!(snap_resolution(0, 5), 5);
        assert_eq!(snap_resolution(3, 5), 5);
        assert_eq!(snap_resolution(-2, 2), 2);
    }

    #[test]
    fn test_compute_resolution() {
        assert_eq!(compute_resolution(Size::new(640.0, 480.0), 16, 2, 2), (41, 31));
        assert_eq!(compute_resolution(Size::new(656.0, 480.0), 16, 4, 4), (43, 31));
        assert_eq!(compute_resolution(Size::new(20.0, 20.0), 64, 3, 3), (3, 3));
    }

    #[test]
    fn test_topology_counts_and_winding() {
        let (indices, tex_coords) = build_topology(3, 2, [0.0, 0.0, 1.0, 1.0]);
        assert_eq!(tex_coords.len(), 6);
        assert_eq!(indices.len(), 2 * 2 * 3);

        // First quad: (0,0) (1,0) (1,1) and (0,0) (1,1) (0,1)
        assert_eq!(&indices[..6], &[0, 2, 3, 0, 3, 1]);

        assert_eq!(tex_coords[0], [0.0, 0.0]);
        assert_eq!(tex_coords[3], [0.5, 1.0]);
        assert_eq!(tex_coords[5], [1.0, 1.0]);
    }

    #[test]
    fn test_topology_uses_corners() {
        let (_, tex_coords) = build_topology(2, 2, [0.25, 0.5, 0.75, 1.0]);
        assert_eq!(tex_coords, vec![[0.25, 0.5], [0.25, 1.0], [0.75, 0.5], [0.75, 1.0]]);
    }

    #[test]
    fn test_linear_positions_identity() {
        let mut grid = ControlGrid::new(2, 2);
        grid.set_window_size(Size::new(100.0, 50.0));

        let positions = update_positions(&grid, 3, 3, true);
        assert_eq!(positions.len(), 9);
        assert_eq!(positions[0], [0.0, 0.0, 0.0]);
        assert_eq!(positions[4], [50.0, 25.0, 0.0]);
        assert_eq!(positions[8], [100.0, 50.0, 0.0]);
    }

    #[test]
    fn test_curved_positions_identity() {
        // Reflection keeps an even grid linear, so the spline reproduces it
        let mut grid = ControlGrid::new(3, 3);
        grid.set_window_size(Size::new(100.0, 100.0));

        let positions = update_positions(&grid, 5, 5, false);
        for x in 0..5 {
            for y in 0..5 {
                let p = positions[x * 5 + y];
                assert!((p[0] - x as f32 * 25.0).abs() < 1e-3);
                assert!((p[1] - y as f32 * 25.0).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn test_curved_positions_hit_control_points() {
        let mut grid = ControlGrid::new(3, 3);
        grid.set_window_size(Size::new(100.0, 100.0));
        grid.set_control_point(4, Point::new(0.6, 0.4));

        let positions = update_positions(&grid, 5, 5, false);
        // Vertex (2, 2) sits exactly on control point (1, 1)
        let center = positions[2 * 5 + 2];
        assert!((center[0] - 60.0).abs() < 1e-3);
        assert!((center[1] - 40.0).abs() < 1e-3);
    }

    #[test]
    fn test_cubic_interpolate_endpoints() {
        let knots = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 2.0),
            Point::new(3.0, 1.0),
            Point::new(4.0, 4.0),
        ];
        assert_eq!(cubic_interpolate(&knots, 0.0), knots[1]);
        let end = cubic_interpolate(&knots, 1.0);
        assert!((end.x - 3.0).abs() < 1e-12 && (end.y - 1.0).abs() < 1e-12);
    }
}
