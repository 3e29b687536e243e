//! meshwarp - warping for projection mapping
//!
//! A warp maps rectangular content onto an output window through a
//! perspective (keystone) transform, a curved bilinear mesh, or a mesh placed
//! inside a perspective quad. Warps are edited through their control points
//! and persisted as JSON.

pub mod bilinear;
pub mod blend;
pub mod composite;
pub mod config;
pub mod controller;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod mesh;
pub mod perspective;
pub mod resample;
pub mod settings;
pub mod warp;

pub use controller::{Controller, WarpCommand};
pub use error::{Result, WarpError};
pub use geometry::{Point, Rect, Size};
pub use warp::{Warp, WarpControl, WarpKind};
