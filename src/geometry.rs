//! Small 2D value types shared by every warp

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul, Sub};

/// A 2D point, usually in normalized coordinates (0.0 to 1.0)
///
/// Serialized as a `[x, y]` pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Convert from normalized to pixel coordinates
    pub fn to_pixels(&self, size: Size) -> Point {
        Point::new(self.x * size.width, self.y * size.height)
    }

    /// Convert from pixel to normalized coordinates
    pub fn from_pixels(px: Point, size: Size) -> Self {
        Self {
            x: px.x / size.width,
            y: px.y / size.height,
        }
    }

    pub fn distance(&self, other: Point) -> f64 {
        (*self - other).length()
    }

    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn lerp(&self, other: Point, t: f64) -> Point {
        *self * (1.0 - t) + other * t
    }
}

impl From<[f64; 2]> for Point {
    fn from(v: [f64; 2]) -> Self {
        Self::new(v[0], v[1])
    }
}

impl From<Point> for [f64; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Point {
    fn add_assign(&mut self, rhs: Point) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;
    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

impl Mul<Point> for f64 {
    type Output = Point;
    fn mul(self, rhs: Point) -> Point {
        rhs * self
    }
}

impl Div<f64> for Point {
    type Output = Point;
    fn div(self, rhs: f64) -> Point {
        Point::new(self.x / rhs, self.y / rhs)
    }
}

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl Default for Size {
    fn default() -> Self {
        Self::new(640.0, 480.0)
    }
}

/// Axis-aligned rectangle in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn from_size(size: Size) -> Self {
        Self::new(0.0, 0.0, size.width, size.height)
    }

    /// Build from the min and max corners
    pub fn from_corners(min: Point, max: Point) -> Self {
        Self::new(min.x, min.y, max.x - min.x, max.y - min.y)
    }

    pub fn min_x(&self) -> f64 {
        self.x.min(self.x + self.width)
    }

    pub fn max_x(&self) -> f64 {
        self.x.max(self.x + self.width)
    }

    pub fn min_y(&self) -> f64 {
        self.y.min(self.y + self.height)
    }

    pub fn max_y(&self) -> f64 {
        self.y.max(self.y + self.height)
    }

    /// Edges as (left, top, right, bottom)
    pub fn edges(&self) -> [f64; 4] {
        [self.min_x(), self.min_y(), self.max_x(), self.max_y()]
    }

    fn from_edges(e: [f64; 4]) -> Self {
        Self::new(e[0], e[1], e[2] - e[0], e[3] - e[1])
    }
}

/// Clip a source/destination rectangle pair against `[0, width] x [0, height]`
///
/// Every destination edge pushed back inside the content moves the matching
/// source edge by the same normalized amount, scaled by the source extent.
/// Returns the adjusted pair and whether anything was clipped.
pub fn clip(content: Size, src: Rect, dst: Rect) -> (Rect, Rect, bool) {
    let src_extent = [src.width.abs(), src.height.abs()];
    let bounds = [content.width, content.height];

    let mut src_edges = src.edges();
    let mut dst_edges = dst.edges();
    let mut clipped = false;

    // left, top, right, bottom
    for edge in 0..4 {
        let axis = edge % 2;
        let normalized = dst_edges[edge] / bounds[axis];
        let clamped = normalized.clamp(0.0, 1.0);
        if clamped != normalized {
            dst_edges[edge] = clamped * bounds[axis];
            src_edges[edge] += (clamped - normalized) * src_extent[axis];
            clipped = true;
        }
    }

    if !clipped {
        return (src, dst, false);
    }

    (Rect::from_edges(src_edges), Rect::from_edges(dst_edges), true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_conversion() {
        let p = Point::new(0.5, 0.5);
        let px = p.to_pixels(Size::new(640.0, 480.0));
        assert_eq!(px, Point::new(320.0, 240.0));

        let p2 = Point::from_pixels(px, Size::new(640.0, 480.0));
        assert_eq!(p2, p);
    }

    #[test]
    fn test_point_serializes_as_pair() {
        let json = serde_json::to_string(&Point::new(0.25, 1.0)).unwrap();
        assert_eq!(json, "[0.25,1.0]");

        let back: Point = serde_json::from_str("[0.5, 0.75]").unwrap();
        assert_eq!(back, Point::new(0.5, 0.75));
    }

    #[test]
    fn test_clip_contained_is_noop() {
        let content = Size::new(640.0, 480.0);
        let src = Rect::new(0.0, 0.0, 320.0, 240.0);
        let dst = Rect::new(10.0, 20.0, 600.0, 400.0);

        let (src2, dst2, clipped) = clip(content, src, dst);
        assert!(!clipped);
        assert_eq!(src2, src);
        assert_eq!(dst2, dst);

        // Clipping again changes nothing
        let (src3, dst3, clipped) = clip(content, src2, dst2);
        assert!(!clipped);
        assert_eq!(src3, src);
        assert_eq!(dst3, dst);
    }

    #[test]
    fn test_clip_left_edge() {
        let content = Size::new(100.0, 100.0);
        let src = Rect::new(0.0, 0.0, 200.0, 100.0);
        let dst = Rect::new(-10.0, 0.0, 110.0, 100.0);

        let (src2, dst2, clipped) = clip(content, src, dst);
        assert!(clipped);
        assert_eq!(dst2.x, 0.0);
        assert!((dst2.width - 100.0).abs() < 1e-9);
        // x1 = -0.1, so the source left edge moves in by 0.1 * 200
        assert!((src2.x - 20.0).abs() < 1e-9);
        assert!((src2.width - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_clip_bottom_edge() {
        let content = Size::new(100.0, 100.0);
        let src = Rect::new(0.0, 0.0, 100.0, 50.0);
        let dst = Rect::new(0.0, 50.0, 100.0, 100.0);

        let (src2, dst2, clipped) = clip(content, src, dst);
        assert!(clipped);
        assert!((dst2.max_y() - 100.0).abs() < 1e-9);
        // y2 = 1.5, source bottom edge moves up by 0.5 * 50
        assert!((src2.max_y() - 25.0).abs() < 1e-9);
    }
}
