//! The closed set of warp kinds and what they have in common
//!
//! [`WarpControl`] is the capability every kind provides (editing control
//! points, sizes, flips). [`MeshControls`] is the extra surface of the mesh
//! based kinds. [`Warp`] is the enum the controller stores; it dereferences
//! to the capability trait.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::str::FromStr;

use nalgebra::Matrix4;

use crate::bilinear::BilinearWarp;
use crate::blend::BlendSettings;
use crate::composite::PerspectiveBilinearWarp;
use crate::error::{Result, WarpError};
use crate::geometry::{clip, Point, Rect, Size};
use crate::grid::{ControlGrid, MAX_CONTROL_POINTS};
use crate::mesh::Mesh;
use crate::perspective::PerspectiveWarp;
use crate::settings::{GridRecord, MeshRecord, WarpRecord};

/// Warp kind tag, fixed for the lifetime of a warp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarpKind {
    Bilinear,
    Perspective,
    PerspectiveBilinear,
}

impl WarpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarpKind::Bilinear => "bilinear",
            WarpKind::Perspective => "perspective",
            WarpKind::PerspectiveBilinear => "perspective_bilinear",
        }
    }
}

impl fmt::Display for WarpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WarpKind {
    type Err = WarpError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bilinear" => Ok(WarpKind::Bilinear),
            "perspective" => Ok(WarpKind::Perspective),
            "perspective_bilinear" => Ok(WarpKind::PerspectiveBilinear),
            other => Err(WarpError::UnknownWarpKind(other.to_string())),
        }
    }
}

/// Geometry the renderer needs to draw a warp
#[derive(Debug, Clone)]
pub enum WarpGeometry<'a> {
    /// Draw the mesh directly
    Mesh(&'a Mesh),
    /// Draw a quad under this transform
    Transform(Matrix4<f64>),
    /// Draw the mesh under the transform
    Composite {
        mesh: &'a Mesh,
        transform: Matrix4<f64>,
    },
}

/// Capabilities shared by every warp kind
///
/// Control point coordinates are normalized against the window size.
pub trait WarpControl {
    fn kind(&self) -> WarpKind;

    /// Grid holding the editing state, selection and blend settings
    fn grid(&self) -> &ControlGrid;
    fn grid_mut(&mut self) -> &mut ControlGrid;

    /// Restore the undistorted control points
    fn reset(&mut self);

    fn control_point(&self, index: usize) -> Result<Point> {
        self.grid().control_point(index)
    }

    fn set_control_point(&mut self, index: usize, pos: Point) {
        self.grid_mut().set_control_point(index, pos);
    }

    fn move_control_point(&mut self, index: usize, shift: Point) {
        self.grid_mut().move_control_point(index, shift);
    }

    fn select_control_point(&mut self, index: usize) {
        self.grid_mut().select_control_point(index);
    }

    fn deselect_control_point(&mut self) {
        self.grid_mut().deselect_control_point();
    }

    /// Closest control point to `pos` in window pixels, with its distance
    fn find_closest_control_point(&self, pos: Point) -> (usize, f64) {
        self.grid().find_closest_control_point(pos)
    }

    /// Set the content size
    fn set_size(&mut self, size: Size) {
        self.grid_mut().set_size(size);
    }

    fn handle_window_resize(&mut self, window: Size) {
        self.grid_mut().set_window_size(window);
    }

    fn set_editing(&mut self, editing: bool) {
        self.grid_mut().set_editing(editing);
    }

    fn rotate_clockwise(&mut self);
    fn rotate_counterclockwise(&mut self);
    fn flip_horizontal(&mut self);
    fn flip_vertical(&mut self);

    /// Bring derived geometry up to date and return it
    fn geometry(&mut self) -> WarpGeometry<'_>;

    fn mesh_controls(&self) -> Option<&dyn MeshControls> {
        None
    }

    fn mesh_controls_mut(&mut self) -> Option<&mut dyn MeshControls> {
        None
    }
}

/// Mesh density controls of the bilinear family
pub trait MeshControls {
    fn bilinear(&self) -> &BilinearWarp;
    fn bilinear_mut(&mut self) -> &mut BilinearWarp;

    fn set_num_controls_x(&mut self, num_controls_x: usize) -> Result<()>;
    fn set_num_controls_y(&mut self, num_controls_y: usize) -> Result<()>;
}

// -- bilinear -----------------------------------------------------------------

impl WarpControl for BilinearWarp {
    fn kind(&self) -> WarpKind {
        WarpKind::Bilinear
    }

    fn grid(&self) -> &ControlGrid {
        BilinearWarp::grid(self)
    }

    fn grid_mut(&mut self) -> &mut ControlGrid {
        BilinearWarp::grid_mut(self)
    }

    fn reset(&mut self) {
        BilinearWarp::reset(self);
    }

    fn rotate_clockwise(&mut self) {
        BilinearWarp::rotate_clockwise(self);
    }

    fn rotate_counterclockwise(&mut self) {
        BilinearWarp::rotate_counterclockwise(self);
    }

    fn flip_horizontal(&mut self) {
        BilinearWarp::flip_horizontal(self);
    }

    fn flip_vertical(&mut self) {
        BilinearWarp::flip_vertical(self);
    }

    fn geometry(&mut self) -> WarpGeometry<'_> {
        WarpGeometry::Mesh(self.mesh())
    }

    fn mesh_controls(&self) -> Option<&dyn MeshControls> {
        Some(self)
    }

    fn mesh_controls_mut(&mut self) -> Option<&mut dyn MeshControls> {
        Some(self)
    }
}

impl MeshControls for BilinearWarp {
    fn bilinear(&self) -> &BilinearWarp {
        self
    }

    fn bilinear_mut(&mut self) -> &mut BilinearWarp {
        self
    }

    fn set_num_controls_x(&mut self, num_controls_x: usize) -> Result<()> {
        BilinearWarp::set_num_controls_x(self, num_controls_x)
    }

    fn set_num_controls_y(&mut self, num_controls_y: usize) -> Result<()> {
        BilinearWarp::set_num_controls_y(self, num_controls_y)
    }
}

// -- perspective --------------------------------------------------------------

impl WarpControl for PerspectiveWarp {
    fn kind(&self) -> WarpKind {
        WarpKind::Perspective
    }

    fn grid(&self) -> &ControlGrid {
        PerspectiveWarp::grid(self)
    }

    fn grid_mut(&mut self) -> &mut ControlGrid {
        PerspectiveWarp::grid_mut(self)
    }

    fn reset(&mut self) {
        PerspectiveWarp::reset(self);
    }

    fn rotate_clockwise(&mut self) {
        PerspectiveWarp::rotate_clockwise(self);
    }

    fn rotate_counterclockwise(&mut self) {
        PerspectiveWarp::rotate_counterclockwise(self);
    }

    fn flip_horizontal(&mut self) {
        PerspectiveWarp::flip_horizontal(self);
    }

    fn flip_vertical(&mut self) {
        PerspectiveWarp::flip_vertical(self);
    }

    fn geometry(&mut self) -> WarpGeometry<'_> {
        WarpGeometry::Transform(self.transform())
    }
}

// -- perspective bilinear -----------------------------------------------------

impl WarpControl for PerspectiveBilinearWarp {
    fn kind(&self) -> WarpKind {
        WarpKind::PerspectiveBilinear
    }

    fn grid(&self) -> &ControlGrid {
        PerspectiveBilinearWarp::grid(self)
    }

    fn grid_mut(&mut self) -> &mut ControlGrid {
        PerspectiveBilinearWarp::grid_mut(self)
    }

    fn reset(&mut self) {
        PerspectiveBilinearWarp::reset(self);
    }

    fn control_point(&self, index: usize) -> Result<Point> {
        PerspectiveBilinearWarp::control_point(self, index)
    }

    fn set_control_point(&mut self, index: usize, pos: Point) {
        PerspectiveBilinearWarp::set_control_point(self, index, pos);
    }

    fn move_control_point(&mut self, index: usize, shift: Point) {
        PerspectiveBilinearWarp::move_control_point(self, index, shift);
    }

    fn select_control_point(&mut self, index: usize) {
        PerspectiveBilinearWarp::select_control_point(self, index);
    }

    fn deselect_control_point(&mut self) {
        PerspectiveBilinearWarp::deselect_control_point(self);
    }

    fn find_closest_control_point(&self, pos: Point) -> (usize, f64) {
        PerspectiveBilinearWarp::find_closest_control_point(self, pos)
    }

    fn set_size(&mut self, size: Size) {
        PerspectiveBilinearWarp::set_size(self, size);
    }

    fn handle_window_resize(&mut self, window: Size) {
        PerspectiveBilinearWarp::handle_window_resize(self, window);
    }

    fn set_editing(&mut self, editing: bool) {
        self.bilinear_mut().grid_mut().set_editing(editing);
        self.perspective_mut().grid_mut().set_editing(editing);
    }

    fn rotate_clockwise(&mut self) {
        PerspectiveBilinearWarp::rotate_clockwise(self);
    }

    fn rotate_counterclockwise(&mut self) {
        PerspectiveBilinearWarp::rotate_counterclockwise(self);
    }

    fn flip_horizontal(&mut self) {
        PerspectiveBilinearWarp::flip_horizontal(self);
    }

    fn flip_vertical(&mut self) {
        PerspectiveBilinearWarp::flip_vertical(self);
    }

    fn geometry(&mut self) -> WarpGeometry<'_> {
        let (mesh, transform) = PerspectiveBilinearWarp::geometry(self);
        WarpGeometry::Composite { mesh, transform }
    }

    fn mesh_controls(&self) -> Option<&dyn MeshControls> {
        Some(self)
    }

    fn mesh_controls_mut(&mut self) -> Option<&mut dyn MeshControls> {
        Some(self)
    }
}

impl MeshControls for PerspectiveBilinearWarp {
    fn bilinear(&self) -> &BilinearWarp {
        PerspectiveBilinearWarp::bilinear(self)
    }

    fn bilinear_mut(&mut self) -> &mut BilinearWarp {
        PerspectiveBilinearWarp::bilinear_mut(self)
    }

    fn set_num_controls_x(&mut self, num_controls_x: usize) -> Result<()> {
        PerspectiveBilinearWarp::set_num_controls_x(self, num_controls_x)
    }

    fn set_num_controls_y(&mut self, num_controls_y: usize) -> Result<()> {
        PerspectiveBilinearWarp::set_num_controls_y(self, num_controls_y)
    }
}

// -- draw preparation ---------------------------------------------------------

/// Texture being drawn through a warp
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureRegion {
    pub width: f64,
    pub height: f64,
    /// Texture coordinates run 0..1 rather than 0..width
    pub normalized: bool,
    /// Rows are stored bottom up
    pub flipped: bool,
}

impl TextureRegion {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            normalized: true,
            flipped: false,
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }

    /// Texture coordinates (left, top, right, bottom) of `src`
    fn corners(&self, src: Rect, honor_flip: bool) -> [f64; 4] {
        let (sx, sy) = if self.normalized {
            (self.width, self.height)
        } else {
            (1.0, 1.0)
        };

        let (top, bottom) = if honor_flip && self.flipped {
            (src.max_y(), src.min_y())
        } else {
            (src.min_y(), src.max_y())
        };

        [src.min_x() / sx, top / sy, src.max_x() / sx, bottom / sy]
    }
}

/// Everything a renderer needs for one draw call
#[derive(Debug, Clone)]
pub struct DrawParams<'a> {
    pub src: Rect,
    pub dst: Rect,
    pub clipped: bool,
    /// Texture coordinates of the drawn region (left, top, right, bottom)
    pub tex_corners: [f64; 4],
    pub brightness: f64,
    pub blend: BlendSettings,
    pub geometry: WarpGeometry<'a>,
}

// -- closed variant set -------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Warp {
    Bilinear(BilinearWarp),
    Perspective(PerspectiveWarp),
    PerspectiveBilinear(PerspectiveBilinearWarp),
}

impl Deref for Warp {
    type Target = dyn WarpControl;

    fn deref(&self) -> &Self::Target {
        match self {
            Warp::Bilinear(w) => w,
            Warp::Perspective(w) => w,
            Warp::PerspectiveBilinear(w) => w,
        }
    }
}

impl DerefMut for Warp {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            Warp::Bilinear(w) => w,
            Warp::Perspective(w) => w,
            Warp::PerspectiveBilinear(w) => w,
        }
    }
}

impl Warp {
    /// Create an undistorted warp of `kind`
    pub fn new(kind: WarpKind) -> Self {
        match kind {
            WarpKind::Bilinear => Warp::Bilinear(BilinearWarp::default()),
            WarpKind::Perspective => Warp::Perspective(PerspectiveWarp::new()),
            WarpKind::PerspectiveBilinear => Warp::PerspectiveBilinear(PerspectiveBilinearWarp::default()),
        }
    }

    /// Create a warp sized for `window` showing content of `content` size
    pub fn with_sizes(kind: WarpKind, window: Size, content: Size) -> Self {
        let mut warp = Self::new(kind);
        warp.handle_window_resize(window);
        warp.set_size(content);
        warp
    }

    /// Clip the draw rectangles and collect the geometry for drawing
    /// `texture`
    ///
    /// Updates the texture corners of mesh based warps, which marks the mesh
    /// dirty when the drawn region changed.
    pub fn prepare_draw(&mut self, texture: TextureRegion, src: Rect, dst: Rect) -> DrawParams<'_> {
        let (src, dst, clipped) = clip(self.grid().size(), src, dst);

        let honor_flip = matches!(self, Warp::Perspective(_));
        let tex_corners = texture.corners(src, honor_flip);

        if let Some(mesh) = self.mesh_controls_mut() {
            let [x1, y1, x2, y2] = tex_corners;
            mesh.bilinear_mut().set_texture_corners(x1, y1, x2, y2);
        }

        let brightness = self.grid().brightness();
        let blend = self.grid().blend().clone();

        DrawParams {
            src,
            dst,
            clipped,
            tex_corners,
            brightness,
            blend,
            geometry: self.geometry(),
        }
    }

    /// Draw the whole `texture` over the whole content
    pub fn prepare_draw_texture(&mut self, texture: TextureRegion) -> DrawParams<'_> {
        let dst = self.grid().bounds();
        self.prepare_draw(texture, texture.bounds(), dst)
    }

    pub fn to_record(&self) -> WarpRecord {
        let grid = self.grid();

        let mesh = self.mesh_controls().map(|m| {
            let bilinear = m.bilinear();
            MeshRecord {
                resolution: bilinear.resolution(),
                linear: bilinear.is_linear(),
                adaptive: bilinear.is_adaptive(),
            }
        });

        let corners = match self {
            Warp::PerspectiveBilinear(w) => {
                let points = w.perspective().grid().control_points();
                Some([points[0], points[1], points[2], points[3]])
            }
            _ => None,
        };

        WarpRecord {
            kind: self.kind().to_string(),
            brightness: grid.brightness(),
            grid: GridRecord {
                columns: grid.num_controls_x(),
                rows: grid.num_controls_y(),
                control_points: grid.control_points().to_vec(),
            },
            blend: grid.blend().clone(),
            mesh,
            corners,
        }
    }

    /// Rebuild a warp from its record
    ///
    /// Fails on unknown kinds and on grids whose point count does not match
    /// the declared dimensions.
    pub fn from_record(record: &WarpRecord) -> Result<Self> {
        let kind: WarpKind = record.kind.parse()?;
        let columns = record.grid.columns;
        let rows = record.grid.rows;
        let points = &record.grid.control_points;

        // Dimensions come from the file, the product may overflow
        let total = columns.checked_mul(rows);
        let (expected, dims_ok) = match kind {
            WarpKind::Perspective => (4, columns == 2 && rows == 2),
            _ => (
                total.unwrap_or(usize::MAX),
                columns >= 2 && rows >= 2 && total.map_or(false, |n| n <= MAX_CONTROL_POINTS),
            ),
        };
        if !dims_ok || points.len() != expected {
            return Err(WarpError::GridMismatch {
                kind,
                expected,
                found: points.len(),
            });
        }

        let mut warp = Self::new(kind);
        warp.grid_mut().replace_points(columns, rows, points.clone());
        warp.grid_mut().set_brightness(record.brightness);
        *warp.grid_mut().blend_mut() = record.blend.clone();

        if let (Some(mesh), Some(options)) = (warp.mesh_controls_mut(), &record.mesh) {
            let bilinear = mesh.bilinear_mut();
            bilinear.set_resolution(options.resolution);
            bilinear.set_linear(options.linear);
            bilinear.set_adaptive(options.adaptive);
        }

        if let (Warp::PerspectiveBilinear(w), Some(corners)) = (&mut warp, &record.corners) {
            for (i, corner) in corners.iter().enumerate() {
                w.perspective_mut().grid_mut().set_control_point(i, *corner);
            }
        }

        Ok(warp)
    }
}
