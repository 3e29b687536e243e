//! Perspective warp layered over a bilinear mesh
//!
//! The bilinear grid lives in pre-perspective space: its mesh is drawn inside
//! the perspective transform. The four grid corners are not stored in the
//! bilinear grid at all but handed to the perspective warp, every interior
//! point is converted through the transform on the way in and out.

use nalgebra::Matrix4;

use crate::bilinear::BilinearWarp;
use crate::error::Result;
use crate::geometry::{Point, Size};
use crate::grid::{find_closest, ControlGrid};
use crate::mesh::Mesh;
use crate::perspective::{apply_homography, PerspectiveWarp};

#[derive(Debug, Clone, Default)]
pub struct PerspectiveBilinearWarp {
    bilinear: BilinearWarp,
    perspective: PerspectiveWarp,
}

impl PerspectiveBilinearWarp {
    pub fn new(num_controls_x: usize, num_controls_y: usize) -> Self {
        Self {
            bilinear: BilinearWarp::new(num_controls_x, num_controls_y),
            perspective: PerspectiveWarp::new(),
        }
    }

    pub fn bilinear(&self) -> &BilinearWarp {
        &self.bilinear
    }

    pub fn bilinear_mut(&mut self) -> &mut BilinearWarp {
        &mut self.bilinear
    }

    pub fn perspective(&self) -> &PerspectiveWarp {
        &self.perspective
    }

    pub fn perspective_mut(&mut self) -> &mut PerspectiveWarp {
        &mut self.perspective
    }

    /// The bilinear grid, which holds the canonical selection
    pub fn grid(&self) -> &ControlGrid {
        self.bilinear.grid()
    }

    pub fn grid_mut(&mut self) -> &mut ControlGrid {
        self.bilinear.grid_mut()
    }

    pub fn reset(&mut self) {
        self.bilinear.reset();
        self.perspective.reset();
    }

    // -- corner mapping -----------------------------------------------------

    /// Bilinear indices of the top-left, top-right, bottom-right and
    /// bottom-left corners
    fn corner_indices(&self) -> [usize; 4] {
        let n = self.bilinear.grid().num_control_points();
        let ny = self.bilinear.grid().num_controls_y();
        [0, n - ny, n - 1, ny - 1]
    }

    /// Whether `index` is one of the four grid corners
    pub fn is_corner(&self, index: usize) -> bool {
        self.corner_indices().contains(&index)
    }

    /// Perspective index (TL 0, TR 1, BR 2, BL 3) of a corner grid index
    pub fn corner_to_perspective_index(&self, index: usize) -> Option<usize> {
        self.corner_indices().iter().position(|&i| i == index)
    }

    fn perspective_to_corner_index(&self, index: usize) -> Option<usize> {
        self.corner_indices().get(index).copied()
    }

    // -- control points -----------------------------------------------------

    /// Return a control point in normalized window coordinates
    pub fn control_point(&self, index: usize) -> Result<Point> {
        if let Some(corner) = self.corner_to_perspective_index(index) {
            return self.perspective.grid().control_point(corner);
        }

        let raw = self.bilinear.grid().control_point(index)?;
        let (transform, _) = self.perspective.current_transforms();
        Ok(self.map_interior(&transform, raw))
    }

    /// Map a raw bilinear point through `transform` into normalized window
    /// coordinates
    fn map_interior(&self, transform: &Matrix4<f64>, raw: Point) -> Point {
        let content = self.perspective.grid().size();
        let mapped = apply_homography(transform, raw.to_pixels(content));
        Point::from_pixels(mapped, self.bilinear.grid().window_size())
    }

    /// Set a control point given in normalized window coordinates
    pub fn set_control_point(&mut self, index: usize, pos: Point) {
        if let Some(corner) = self.corner_to_perspective_index(index) {
            self.perspective.grid_mut().set_control_point(corner, pos);
            return;
        }

        let content = self.perspective.grid().size();
        let inverse = self.perspective.transform_inverted();

        let window = self.bilinear.grid().window_size();
        let unmapped = apply_homography(&inverse, pos.to_pixels(window));
        self.bilinear
            .grid_mut()
            .set_control_point(index, Point::from_pixels(unmapped, content));
    }

    /// Move a control point by `shift`, given in normalized window coordinates
    pub fn move_control_point(&mut self, index: usize, shift: Point) {
        if let Some(corner) = self.corner_to_perspective_index(index) {
            self.perspective.grid_mut().move_control_point(corner, shift);
            return;
        }

        if let Ok(current) = self.control_point(index) {
            self.set_control_point(index, current + shift);
        }
    }

    pub fn select_control_point(&mut self, index: usize) {
        match self.corner_to_perspective_index(index) {
            Some(corner) => self.perspective.grid_mut().select_control_point(corner),
            None => self.perspective.grid_mut().deselect_control_point(),
        }
        self.bilinear.grid_mut().select_control_point(index);
    }

    pub fn deselect_control_point(&mut self) {
        self.perspective.grid_mut().deselect_control_point();
        self.bilinear.grid_mut().deselect_control_point();
    }

    /// Find the control point closest to `pos` (window pixels) as it
    /// appears on screen
    pub fn find_closest_control_point(&self, pos: Point) -> (usize, f64) {
        let (transform, _) = self.perspective.current_transforms();
        let corners = self.perspective.grid().control_points();
        let raw = self.bilinear.grid().control_points();

        let points = raw.iter().enumerate().map(|(i, &p)| {
            match self.corner_to_perspective_index(i) {
                Some(corner) => corners[corner],
                None => self.map_interior(&transform, p),
            }
        });
        find_closest(points, pos, self.bilinear.grid().window_size())
    }

    fn reselect_near_cursor(&mut self) {
        let selected = self
            .grid()
            .cursor()
            .map(|cursor| self.find_closest_control_point(cursor).0);

        match selected {
            Some(index) => {
                self.deselect_control_point();
                self.select_control_point(index);
            }
            None => self.deselect_control_point(),
        }
    }

    // -- sizes --------------------------------------------------------------

    /// Set the content size; the perspective stage keeps working in window
    /// pixels
    pub fn set_size(&mut self, size: Size) {
        let window = self.bilinear.grid().window_size();
        self.perspective.grid_mut().set_size(window);
        self.bilinear.grid_mut().set_size(size);
    }

    pub fn handle_window_resize(&mut self, window: Size) {
        let perspective = self.perspective.grid_mut();
        perspective.set_size(window);
        perspective.set_window_size(window);
        self.bilinear.grid_mut().set_window_size(window);
    }

    // -- mesh density -------------------------------------------------------

    pub fn set_num_controls_x(&mut self, num_controls_x: usize) -> Result<()> {
        self.bilinear.set_num_controls_x(num_controls_x)?;
        self.reselect_near_cursor();
        Ok(())
    }

    pub fn set_num_controls_y(&mut self, num_controls_y: usize) -> Result<()> {
        self.bilinear.set_num_controls_y(num_controls_y)?;
        self.reselect_near_cursor();
        Ok(())
    }

    // -- flips and rotations ------------------------------------------------

    /// Rotate the perspective corners clockwise; the bilinear grid is left as is
    pub fn rotate_clockwise(&mut self) {
        self.perspective.rotate_clockwise();
        self.sync_corner_selection();
    }

    /// Rotate the perspective corners counterclockwise; the bilinear grid is left as is
    pub fn rotate_counterclockwise(&mut self) {
        self.perspective.rotate_counterclockwise();
        self.sync_corner_selection();
    }

    /// Mirror the perspective corners left to right; the bilinear grid is left as is
    pub fn flip_horizontal(&mut self) {
        self.perspective.flip_horizontal();
        self.sync_corner_selection();
    }

    /// Mirror the perspective corners top to bottom; the bilinear grid is left as is
    pub fn flip_vertical(&mut self) {
        self.perspective.flip_vertical();
        self.sync_corner_selection();
    }

    /// Follow the perspective corner selection after it was re-indexed
    fn sync_corner_selection(&mut self) {
        if let Some(corner) = self.perspective.grid().selected_control_point() {
            let index = self.perspective_to_corner_index(corner);
            self.bilinear.grid_mut().set_selected(index);
        }
    }

    // -- geometry -----------------------------------------------------------

    pub fn transform(&mut self) -> Matrix4<f64> {
        self.perspective.transform()
    }

    pub fn transform_inverted(&mut self) -> Matrix4<f64> {
        self.perspective.transform_inverted()
    }

    /// Mesh to draw inside the perspective transform
    pub fn mesh(&mut self) -> &Mesh {
        self.bilinear.mesh()
    }

    /// Bring both stages up to date and return the mesh with its transform
    pub fn geometry(&mut self) -> (&Mesh, Matrix4<f64>) {
        let transform = self.perspective.transform();
        (self.bilinear.mesh(), transform)
    }

    pub fn is_dirty(&self) -> bool {
        self.bilinear.grid().is_dirty() || self.perspective.grid().is_dirty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Point, b: Point, eps: f64) {
        assert!(
            (a.x - b.x).abs() < eps && (a.y - b.y).abs() < eps,
            "{:?} != {:?}",
            a,
            b
        );
    }

    fn warp(nx: usize, ny: usize) -> PerspectiveBilinearWarp {
        let mut warp = PerspectiveBilinearWarp::new(nx, ny);
        warp.handle_window_resize(Size::new(800.0, 600.0));
        warp.set_size(Size::new(640.0, 480.0));
        warp
    }

    #[test]
    fn test_corner_classification() {
        let warp = warp(3, 4);
        // 12 points, 4 per column
        assert!(warp.is_corner(0));
        assert!(warp.is_corner(8));
        assert!(warp.is_corner(11));
        assert!(warp.is_corner(3));
        assert!(!warp.is_corner(5));

        assert_eq!(warp.corner_to_perspective_index(0), Some(0));
        assert_eq!(warp.corner_to_perspective_index(8), Some(1));
        assert_eq!(warp.corner_to_perspective_index(11), Some(2));
        assert_eq!(warp.corner_to_perspective_index(3), Some(3));
        assert_eq!(warp.corner_to_perspective_index(4), None);
    }

    #[test]
    fn test_identity_interior_round_trip() {
        let mut warp = warp(3, 3);
        warp.set_control_point(4, Point::new(0.5, 0.5));
        assert_close(warp.control_point(4).unwrap(), Point::new(0.5, 0.5), 1e-9);
    }

    #[test]
    fn test_interior_follows_perspective() {
        let mut warp = warp(3, 3);
        warp.set_control_point(8, Point::new(0.75, 0.75));
        assert_eq!(warp.perspective().grid().control_point(2).unwrap(), Point::new(0.75, 0.75));

        // x' = 1.5x / (0.5x + 0.5y + 1) along the top edge
        let top = warp.control_point(3).unwrap();
        assert_close(top, Point::new(0.6, 0.0), 1e-6);

        // Setting through the transform and reading back is stable
        warp.set_control_point(4, Point::new(0.3, 0.35));
        assert_close(warp.control_point(4).unwrap(), Point::new(0.3, 0.35), 1e-6);
    }

    #[test]
    fn test_move_interior_point() {
        let mut warp = warp(3, 3);
        warp.move_control_point(4, Point::new(0.1, -0.1));
        assert_close(warp.control_point(4).unwrap(), Point::new(0.6, 0.4), 1e-9);
    }

    #[test]
    fn test_out_of_range() {
        let mut warp = warp(3, 3);
        assert!(warp.control_point(9).is_err());
        warp.set_control_point(9, Point::new(0.2, 0.2));
        warp.move_control_point(9, Point::new(0.2, 0.2));
        assert!(warp.control_point(9).is_err());
    }

    #[test]
    fn test_selection_split() {
        let mut warp = warp(3, 3);
        warp.select_control_point(6);
        assert_eq!(warp.grid().selected_control_point(), Some(6));
        assert_eq!(warp.perspective().grid().selected_control_point(), Some(1));

        warp.select_control_point(4);
        assert_eq!(warp.grid().selected_control_point(), Some(4));
        assert_eq!(warp.perspective().grid().selected_control_point(), None);

        warp.deselect_control_point();
        assert_eq!(warp.grid().selected_control_point(), None);
    }

    #[test]
    fn test_find_closest_uses_screen_positions() {
        let mut warp = warp(3, 3);
        warp.set_control_point(8, Point::new(0.75, 0.75));

        // Raw bottom-middle (0.5, 1.0) shows up at (3/7, 6/7)
        let (index, distance) = warp.find_closest_control_point(Point::new(342.857, 514.286));
        assert_eq!(index, 5);
        assert!(distance < 0.01);
    }

    #[test]
    fn test_rotation_moves_corner_selection() {
        let mut warp = warp(3, 3);
        warp.select_control_point(0);
        warp.rotate_clockwise();
        // Old top-left now sits in the bottom-left slot
        assert_eq!(warp.perspective().grid().selected_control_point(), Some(3));
        assert_eq!(warp.grid().selected_control_point(), Some(2));
    }

    #[test]
    fn test_find_closest_matches_mapped_points() {
        let mut warp = warp(4, 3);
        warp.set_control_point(11, Point::new(0.8, 0.9));
        warp.set_control_point(0, Point::new(0.05, 0.1));
        // Leave the perspective stage dirty
        assert!(warp.perspective().grid().is_dirty());

        let window = Size::new(800.0, 600.0);
        for index in 0..warp.grid().num_control_points() {
            let target = warp.control_point(index).unwrap().to_pixels(window);
            let (found, distance) = warp.find_closest_control_point(target);
            assert_eq!(found, index);
            assert!(distance < 1e-6);
        }
    }

    #[test]
    fn test_flip_mirrors_perspective_only() {
        let mut warp = warp(3, 3);
        let interior = warp.bilinear().grid().control_point(4).unwrap();
        warp.flip_horizontal();

        assert_eq!(warp.perspective().grid().control_point(0).unwrap(), Point::new(1.0, 0.0));
        assert_eq!(warp.bilinear().grid().control_point(4).unwrap(), interior);
    }

    #[test]
    fn test_geometry() {
        let mut warp = warp(2, 2);
        let (mesh, transform) = warp.geometry();
        assert!(mesh.num_vertices() > 0);
        assert!((transform - Matrix4::identity()).amax() < 1e-9);
        assert!(!warp.is_dirty());
    }
}
