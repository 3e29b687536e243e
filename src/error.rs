//! Error types for warp operations

use thiserror::Error;

use crate::warp::WarpKind;

/// Errors raised by the warp core
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WarpError {
    /// A control point index beyond the grid was read
    #[error("control point index {index} out of range (grid has {len} points)")]
    IndexOutOfRange { index: usize, len: usize },

    /// A grid resize would exceed the control point budget
    #[error("grid of {columns}x{rows} exceeds the maximum of {max} control points")]
    CapacityExceeded {
        columns: usize,
        rows: usize,
        max: usize,
    },

    /// A settings entry carried a kind tag we do not know
    #[error("unknown warp kind '{0}'")]
    UnknownWarpKind(String),

    /// A settings entry whose point list does not match its dimensions
    #[error("{kind} grid declares {expected} control points but stores {found}")]
    GridMismatch {
        kind: WarpKind,
        expected: usize,
        found: usize,
    },
}

pub type Result<T> = std::result::Result<T, WarpError>;
