//! Control point grid shared by every warp kind
//!
//! Holds the normalized control points together with the state that every
//! warp carries regardless of how it maps them: content and window size,
//! selection, blend parameters and the dirty flag that gates recomputation
//! of derived geometry.

use std::time::Instant;

use crate::blend::BlendSettings;
use crate::error::{Result, WarpError};
use crate::geometry::{Point, Rect, Size};

/// Upper bound on control points per warp, keeps meshes bounded
pub const MAX_CONTROL_POINTS: usize = 1024;

/// Grid of normalized control points, stored column by column
#[derive(Debug, Clone)]
pub struct ControlGrid {
    editing: bool,
    dirty: bool,

    /// Content size in pixels
    size: Size,
    /// Output window size in pixels, control points are normalized against it
    window_size: Size,

    brightness: f64,
    blend: BlendSettings,

    num_controls_x: usize,
    num_controls_y: usize,
    control_points: Vec<Point>,

    selected: Option<usize>,
    selected_time: Option<Instant>,
    /// Last pointer position reported by the input layer, in window pixels
    cursor: Option<Point>,
}

impl ControlGrid {
    /// Create an evenly spaced grid covering the unit square
    pub fn new(num_controls_x: usize, num_controls_y: usize) -> Self {
        let mut grid = Self {
            editing: false,
            dirty: true,
            size: Size::default(),
            window_size: Size::default(),
            brightness: 1.0,
            blend: BlendSettings::default(),
            num_controls_x: num_controls_x.max(2),
            num_controls_y: num_controls_y.max(2),
            control_points: Vec::new(),
            selected: None,
            selected_time: None,
            cursor: None,
        };
        grid.reset_even();
        grid
    }

    /// Replace the points with an evenly spaced grid of the current dimensions
    pub fn reset_even(&mut self) {
        let nx = self.num_controls_x;
        let ny = self.num_controls_y;

        self.control_points = (0..nx)
            .flat_map(|x| {
                (0..ny).map(move |y| Point::new(x as f64 / (nx - 1) as f64, y as f64 / (ny - 1) as f64))
            })
            .collect();
        self.dirty = true;
    }

    /// Replace dimensions and points together
    ///
    /// Used by resizing and by loading settings. The caller guarantees the
    /// point count matches the dimensions.
    pub(crate) fn replace_points(&mut self, num_controls_x: usize, num_controls_y: usize, points: Vec<Point>) {
        debug_assert_eq!(points.len(), num_controls_x * num_controls_y);
        self.num_controls_x = num_controls_x;
        self.num_controls_y = num_controls_y;
        self.control_points = points;
        self.dirty = true;
    }

    // -- control points -----------------------------------------------------

    /// Return the control point at `index`
    pub fn control_point(&self, index: usize) -> Result<Point> {
        self.control_points
            .get(index)
            .copied()
            .ok_or(WarpError::IndexOutOfRange {
                index,
                len: self.control_points.len(),
            })
    }

    /// Set a control point; out of range indices are ignored
    pub fn set_control_point(&mut self, index: usize, pos: Point) {
        if let Some(point) = self.control_points.get_mut(index) {
            *point = pos;
            self.dirty = true;
        }
    }

    /// Move a control point by `shift`; out of range indices are ignored
    pub fn move_control_point(&mut self, index: usize, shift: Point) {
        if let Some(point) = self.control_points.get_mut(index) {
            *point += shift;
            self.dirty = true;
        }
    }

    pub fn control_points(&self) -> &[Point] {
        &self.control_points
    }

    /// Direct access for reordering; callers mark the grid dirty
    pub(crate) fn control_points_mut(&mut self) -> &mut [Point] {
        &mut self.control_points
    }

    pub fn num_control_points(&self) -> usize {
        self.control_points.len()
    }

    pub fn num_controls_x(&self) -> usize {
        self.num_controls_x
    }

    pub fn num_controls_y(&self) -> usize {
        self.num_controls_y
    }

    /// Flat index of the point at `col`, `row`
    #[inline]
    pub fn index(&self, col: usize, row: usize) -> usize {
        col * self.num_controls_y + row
    }

    /// Return the point at `col`, `row`, extrapolating beyond the edges
    ///
    /// Points outside the grid are reflected through the nearest edge point:
    /// `2 * edge - mirrored`. Points more than one step out recurse.
    pub fn point_at(&self, col: isize, row: isize) -> Point {
        let max_col = self.num_controls_x as isize - 1;
        let max_row = self.num_controls_y as isize - 1;

        if col < 0 {
            return self.point_at(0, row) * 2.0 - self.point_at(-col, row);
        }
        if row < 0 {
            return self.point_at(col, 0) * 2.0 - self.point_at(col, -row);
        }
        if col > max_col {
            return self.point_at(max_col, row) * 2.0 - self.point_at(2 * max_col - col, row);
        }
        if row > max_row {
            return self.point_at(col, max_row) * 2.0 - self.point_at(col, 2 * max_row - row);
        }

        self.control_points[self.index(col as usize, row as usize)]
    }

    // -- sizes --------------------------------------------------------------

    pub fn size(&self) -> Size {
        self.size
    }

    /// Set the content size; the grid itself is left alone
    pub fn set_size(&mut self, size: Size) {
        self.size = size;
        self.dirty = true;
    }

    pub fn width(&self) -> f64 {
        self.size.width
    }

    pub fn height(&self) -> f64 {
        self.size.height
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.size)
    }

    pub fn window_size(&self) -> Size {
        self.window_size
    }

    pub fn set_window_size(&mut self, window_size: Size) {
        self.window_size = window_size;
        self.dirty = true;
    }

    /// Bounding box of all control points in window pixels
    pub fn mesh_bounds(&self) -> Rect {
        let (min, max) = self.control_points.iter().fold(
            (Point::new(f64::INFINITY, f64::INFINITY), Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY)),
            |(min, max), p| {
                (
                    Point::new(min.x.min(p.x), min.y.min(p.y)),
                    Point::new(max.x.max(p.x), max.y.max(p.y)),
                )
            },
        );

        Rect::from_corners(min.to_pixels(self.window_size), max.to_pixels(self.window_size))
    }

    // -- blending -----------------------------------------------------------

    pub fn brightness(&self) -> f64 {
        self.brightness
    }

    /// Set the brightness of the warped content (0 to 1)
    pub fn set_brightness(&mut self, brightness: f64) {
        self.brightness = brightness.clamp(0.0, 1.0);
    }

    pub fn blend(&self) -> &BlendSettings {
        &self.blend
    }

    pub fn blend_mut(&mut self) -> &mut BlendSettings {
        &mut self.blend
    }

    // -- selection ----------------------------------------------------------

    pub fn selected_control_point(&self) -> Option<usize> {
        self.selected
    }

    /// When the current selection was made
    pub fn selected_time(&self) -> Option<Instant> {
        self.selected_time
    }

    /// Select a control point; ignored when out of range or already selected
    pub fn select_control_point(&mut self, index: usize) {
        if index >= self.control_points.len() || self.selected == Some(index) {
            return;
        }

        self.selected = Some(index);
        self.selected_time = Some(Instant::now());
    }

    pub fn deselect_control_point(&mut self) {
        self.selected = None;
    }

    /// Overwrite the selection without the range and repeat checks
    pub(crate) fn set_selected(&mut self, selected: Option<usize>) {
        self.selected = selected;
    }

    pub fn cursor(&self) -> Option<Point> {
        self.cursor
    }

    /// Record the pointer position (window pixels) used to re-resolve the
    /// selection after the grid is rebuilt
    pub fn set_cursor(&mut self, cursor: Option<Point>) {
        self.cursor = cursor;
    }

    /// Find the raw control point closest to `pos` (window pixels)
    pub fn find_closest_control_point(&self, pos: Point) -> (usize, f64) {
        find_closest(self.control_points.iter().copied(), pos, self.window_size)
    }

    /// Select the point nearest to the last cursor position, or clear the
    /// selection when no cursor was reported
    pub(crate) fn reselect_near_cursor(&mut self) {
        self.selected = self
            .cursor
            .map(|cursor| self.find_closest_control_point(cursor).0);
    }

    // -- editing and dirty state --------------------------------------------

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn set_editing(&mut self, editing: bool) {
        self.editing = editing;
    }

    pub fn toggle_editing(&mut self) {
        self.editing = !self.editing;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}

/// Index and pixel distance of the point closest to `pos`
///
/// Points are normalized and scaled by `window`. On equal distances the
/// highest index wins.
pub fn find_closest(points: impl Iterator<Item = Point>, pos: Point, window: Size) -> (usize, f64) {
    let mut index = 0;
    let mut min_distance = f64::MAX;

    for (i, point) in points.enumerate() {
        let candidate = pos.distance(point.to_pixels(window));
        if candidate <= min_distance {
            min_distance = candidate;
            index = i;
        }
    }

    (index, min_distance)
}
