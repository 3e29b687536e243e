//! Bilinear (mesh) warp
//!
//! Maps the content through a triangle mesh interpolated from an arbitrary
//! grid of control points. The mesh is rebuilt lazily: mutations only mark
//! the grid dirty, the next call to [`BilinearWarp::mesh`] recomputes it.

use tracing::{debug, warn};

use crate::error::Result;
use crate::geometry::{Point, Rect, Size};
use crate::grid::ControlGrid;
use crate::mesh::{self, Mesh};
use crate::resample::{self, Axis};

pub const DEFAULT_RESOLUTION: u32 = 16;
pub const MIN_RESOLUTION: u32 = 4;
pub const MAX_RESOLUTION: u32 = 64;
const RESOLUTION_STEP: u32 = 4;

/// Full texture, left/top/right/bottom
pub const FULL_TEXTURE: [f64; 4] = [0.0, 0.0, 1.0, 1.0];

#[derive(Debug, Clone)]
pub struct BilinearWarp {
    grid: ControlGrid,

    /// Straight lines between control points instead of a spline
    linear: bool,
    /// Derive mesh density from the on-screen size of the warp
    adaptive: bool,
    /// Approximate quad size in pixels
    resolution: u32,
    /// Texture coordinates of the content corners
    tex_corners: [f64; 4],

    mesh: Mesh,
    /// Indices and texture coordinates need rebuilding
    topology_stale: bool,
}

impl Default for BilinearWarp {
    fn default() -> Self {
        Self::new(2, 2)
    }
}

impl BilinearWarp {
    pub fn new(num_controls_x: usize, num_controls_y: usize) -> Self {
        Self {
            grid: ControlGrid::new(num_controls_x, num_controls_y),
            linear: false,
            adaptive: true,
            resolution: DEFAULT_RESOLUTION,
            tex_corners: FULL_TEXTURE,
            mesh: Mesh::default(),
            topology_stale: true,
        }
    }

    pub fn grid(&self) -> &ControlGrid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut ControlGrid {
        &mut self.grid
    }

    /// Evenly space the current grid again
    pub fn reset(&mut self) {
        self.grid.reset_even();
    }

    // -- mesh options -------------------------------------------------------

    pub fn is_linear(&self) -> bool {
        self.linear
    }

    pub fn set_linear(&mut self, linear: bool) {
        self.linear = linear;
        self.grid.mark_dirty();
    }

    pub fn is_adaptive(&self) -> bool {
        self.adaptive
    }

    pub fn set_adaptive(&mut self, adaptive: bool) {
        self.adaptive = adaptive;
        self.grid.mark_dirty();
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Set the approximate quad size, clamped to the supported range
    pub fn set_resolution(&mut self, resolution: u32) {
        self.resolution = resolution.clamp(MIN_RESOLUTION, MAX_RESOLUTION);
        self.grid.mark_dirty();
    }

    pub fn increase_resolution(&mut self) {
        self.set_resolution(self.resolution + RESOLUTION_STEP);
    }

    pub fn decrease_resolution(&mut self) {
        self.set_resolution(self.resolution.saturating_sub(RESOLUTION_STEP));
    }

    pub fn texture_corners(&self) -> [f64; 4] {
        self.tex_corners
    }

    /// Set the texture coordinates of the content corners
    ///
    /// Only marks the mesh dirty when a coordinate actually changed.
    pub fn set_texture_corners(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) {
        let corners = [x1, y1, x2, y2];
        if corners != self.tex_corners {
            self.tex_corners = corners;
            self.topology_stale = true;
            self.grid.mark_dirty();
        }
    }

    /// Bounding box of the control points in window pixels
    pub fn mesh_bounds(&self) -> Rect {
        self.grid.mesh_bounds()
    }

    /// Vertex counts the mesh would use with the current state
    pub fn mesh_resolution(&self) -> (usize, usize) {
        let extent = if self.adaptive {
            let bounds = self.grid.mesh_bounds();
            Size::new(bounds.width, bounds.height)
        } else {
            self.grid.size()
        };

        mesh::compute_resolution(
            extent,
            self.resolution,
            self.grid.num_controls_x(),
            self.grid.num_controls_y(),
        )
    }

    // -- grid dimensions ----------------------------------------------------

    pub fn set_num_controls_x(&mut self, num_controls_x: usize) -> Result<()> {
        self.resize_grid(Axis::Columns, num_controls_x)
    }

    pub fn set_num_controls_y(&mut self, num_controls_y: usize) -> Result<()> {
        self.resize_grid(Axis::Rows, num_controls_y)
    }

    fn resize_grid(&mut self, axis: Axis, count: usize) -> Result<()> {
        let resampled = resample::resize(&self.grid, axis, count, self.linear).map_err(|e| {
            warn!("Grid resize rejected: {}", e);
            e
        })?;

        debug!(
            "Resampled grid from {}x{} to {}x{}",
            self.grid.num_controls_x(),
            self.grid.num_controls_y(),
            resampled.columns,
            resampled.rows
        );

        self.grid
            .replace_points(resampled.columns, resampled.rows, resampled.points);
        self.grid.reselect_near_cursor();
        Ok(())
    }

    // -- flips and rotations ------------------------------------------------

    /// Mirror the grid left to right
    pub fn flip_horizontal(&mut self) {
        let (nx, ny) = self.dims();
        self.reindex(nx, ny, |col, row| (nx - 1 - col, row));
    }

    /// Mirror the grid top to bottom
    pub fn flip_vertical(&mut self) {
        let (nx, ny) = self.dims();
        self.reindex(nx, ny, |col, row| (col, ny - 1 - row));
    }

    /// Rotate the grid a quarter turn; the top-left slot takes the old
    /// top-right point
    pub fn rotate_clockwise(&mut self) {
        let (nx, ny) = self.dims();
        self.reindex(ny, nx, |col, row| (nx - 1 - row, col));
    }

    /// Rotate the grid a quarter turn; the top-left slot takes the old
    /// bottom-left point
    pub fn rotate_counterclockwise(&mut self) {
        let (nx, ny) = self.dims();
        self.reindex(ny, nx, |col, row| (row, ny - 1 - col));
    }

    fn dims(&self) -> (usize, usize) {
        (self.grid.num_controls_x(), self.grid.num_controls_y())
    }

    /// Rebuild the grid as `columns` x `rows`, taking each new slot's point
    /// from the old (col, row) returned by `source`
    fn reindex(&mut self, columns: usize, rows: usize, source: impl Fn(usize, usize) -> (usize, usize)) {
        let old = self.grid.control_points();
        let old_rows = self.grid.num_controls_y();

        let points: Vec<Point> = (0..columns)
            .flat_map(|col| (0..rows).map(move |row| (col, row)))
            .map(|(col, row)| {
                let (c, r) = source(col, row);
                old[c * old_rows + r]
            })
            .collect();

        self.grid.replace_points(columns, rows, points);
        self.grid.reselect_near_cursor();
    }

    // -- geometry -----------------------------------------------------------

    /// Recompute the mesh if anything changed since the last call
    pub fn update(&mut self) {
        if !self.grid.is_dirty() && !self.mesh.positions.is_empty() {
            return;
        }

        let (resolution_x, resolution_y) = self.mesh_resolution();
        if self.topology_stale || resolution_x != self.mesh.resolution_x || resolution_y != self.mesh.resolution_y {
            let (indices, tex_coords) = mesh::build_topology(resolution_x, resolution_y, self.tex_corners);
            self.mesh.indices = indices;
            self.mesh.tex_coords = tex_coords;
            self.mesh.resolution_x = resolution_x;
            self.mesh.resolution_y = resolution_y;
            self.topology_stale = false;

            debug!("Rebuilt mesh topology at {}x{} vertices", resolution_x, resolution_y);
        }

        self.mesh.positions = mesh::update_positions(&self.grid, resolution_x, resolution_y, self.linear);
        self.grid.clear_dirty();
    }

    /// Return the mesh, rebuilding it first if stale
    pub fn mesh(&mut self) -> &Mesh {
        self.update();
        &self.mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warp_on_window(nx: usize, ny: usize, width: f64, height: f64) -> BilinearWarp {
        let mut warp = BilinearWarp::new(nx, ny);
        warp.grid_mut().set_window_size(Size::new(width, height));
        warp
    }

    #[test]
    fn test_defaults() {
        let warp = BilinearWarp::default();
        assert!(!warp.is_linear());
        assert!(warp.is_adaptive());
        assert_eq!(warp.resolution(), DEFAULT_RESOLUTION);
        assert_eq!(warp.texture_corners(), FULL_TEXTURE);
    }

    #[test]
    fn test_adaptive_resolution_follows_window() {
        let warp = warp_on_window(4, 4, 640.0, 480.0);
        assert_eq!(warp.mesh_resolution(), (40, 31));
    }

    #[test]
    fn test_fixed_resolution_follows_content() {
        let mut warp = warp_on_window(4, 4, 1920.0, 1080.0);
        warp.set_adaptive(false);
        warp.grid_mut().set_size(Size::new(656.0, 480.0));
        assert_eq!(warp.mesh_resolution(), (43, 31));
    }

    #[test]
    fn test_resolution_steps_and_clamps() {
        let mut warp = BilinearWarp::default();
        warp.increase_resolution();
        assert_eq!(warp.resolution(), 20);

        for _ in 0..20 {
            warp.increase_resolution();
        }
        assert_eq!(warp.resolution(), MAX_RESOLUTION);

        for _ in 0..20 {
            warp.decrease_resolution();
        }
        assert_eq!(warp.resolution(), MIN_RESOLUTION);
    }

    #[test]
    fn test_mesh_is_lazy() {
        let mut warp = warp_on_window(2, 2, 640.0, 480.0);
        assert!(warp.grid().is_dirty());

        let mesh = warp.mesh();
        assert_eq!(mesh.resolution_x, 41);
        assert_eq!(mesh.resolution_y, 31);
        assert_eq!(mesh.num_vertices(), 41 * 31);
        assert_eq!(mesh.num_triangles(), 40 * 30 * 2);
        assert!(!warp.grid().is_dirty());

        warp.grid_mut().move_control_point(3, Point::new(-0.5, -0.5));
        assert!(warp.grid().is_dirty());
        let mesh = warp.mesh();
        let last = mesh.positions[mesh.num_vertices() - 1];
        assert!((last[0] - 320.0).abs() < 1e-3);
        assert!((last[1] - 240.0).abs() < 1e-3);
    }

    #[test]
    fn test_texture_corners_only_dirty_on_change() {
        let mut warp = warp_on_window(2, 2, 100.0, 100.0);
        warp.update();

        warp.set_texture_corners(0.0, 0.0, 1.0, 1.0);
        assert!(!warp.grid().is_dirty());

        warp.set_texture_corners(0.0, 0.0, 0.5, 0.5);
        assert!(warp.grid().is_dirty());
        let mesh = warp.mesh();
        assert_eq!(mesh.tex_coords[mesh.tex_coords.len() - 1], [0.5, 0.5]);
    }

    #[test]
    fn test_resize_restores_endpoints() {
        let mut warp = BilinearWarp::new(2, 2);
        warp.set_linear(true);
        warp.grid_mut().set_control_point(2, Point::new(0.9, 0.1));
        let original = warp.grid().control_points().to_vec();

        warp.set_num_controls_x(5).unwrap();
        assert_eq!(warp.grid().num_control_points(), 10);
        warp.set_num_controls_x(2).unwrap();

        for (p, q) in warp.grid().control_points().iter().zip(&original) {
            assert!(p.distance(*q) < 1e-12);
        }
    }

    #[test]
    fn test_rejected_resize_leaves_grid() {
        let mut warp = BilinearWarp::new(2, 32);
        assert!(warp.set_num_controls_x(40).is_err());
        assert_eq!(warp.grid().num_controls_x(), 2);
        assert_eq!(warp.grid().num_control_points(), 64);
    }

    #[test]
    fn test_resize_reselects_near_cursor() {
        let mut warp = warp_on_window(2, 2, 100.0, 100.0);
        warp.grid_mut().select_control_point(0);
        warp.grid_mut().set_cursor(Some(Point::new(52.0, 98.0)));

        warp.set_num_controls_x(3).unwrap();
        // Middle column, bottom row
        assert_eq!(warp.grid().selected_control_point(), Some(3));

        warp.grid_mut().set_cursor(None);
        warp.set_num_controls_y(3).unwrap();
        assert_eq!(warp.grid().selected_control_point(), None);
    }

    #[test]
    fn test_flips() {
        let mut warp = BilinearWarp::new(3, 2);
        let tl = warp.grid().control_point(0).unwrap();
        let tr = warp.grid().control_point(4).unwrap();
        let bl = warp.grid().control_point(1).unwrap();

        warp.flip_horizontal();
        assert_eq!(warp.grid().control_point(0).unwrap(), tr);
        assert_eq!(warp.grid().control_point(4).unwrap(), tl);

        warp.flip_horizontal();
        warp.flip_vertical();
        assert_eq!(warp.grid().control_point(0).unwrap(), bl);
        assert_eq!(warp.grid().control_point(1).unwrap(), tl);
    }

    #[test]
    fn test_rotations_match_perspective_corner_order() {
        let mut warp = BilinearWarp::new(3, 2);
        let grid = warp.grid();
        let n = grid.num_control_points();
        let ny = grid.num_controls_y();
        let corners = |g: &ControlGrid| {
            let n = g.num_control_points();
            let ny = g.num_controls_y();
            [0, n - ny, n - 1, ny - 1].map(|i| g.control_point(i).unwrap())
        };
        let before = [0, n - ny, n - 1, ny - 1].map(|i| grid.control_point(i).unwrap());

        warp.rotate_clockwise();
        assert_eq!(warp.grid().num_controls_x(), 2);
        assert_eq!(warp.grid().num_controls_y(), 3);
        let mut expected = before;
        expected.rotate_left(1);
        assert_eq!(corners(warp.grid()), expected);

        warp.rotate_counterclockwise();
        assert_eq!(warp.grid().num_controls_x(), 3);
        assert_eq!(corners(warp.grid()), before);

        warp.rotate_counterclockwise();
        let mut expected = before;
        expected.rotate_right(1);
        assert_eq!(corners(warp.grid()), expected);
    }
}
