//! Edge blending parameters
//!
//! These values are carried with every warp and persisted with it, but they
//! are only consumed by the renderer: the blend shader fades each edge over
//! the configured width, shaping the falloff with `exponent`, and corrects
//! the overlap with per-channel `luminance` and `gamma`.

use serde::{Deserialize, Serialize};

/// Blend settings for one warp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlendSettings {
    /// Edge blending curve exponent (1.0 = linear, 2.0 = quadratic)
    #[serde(default = "default_exponent")]
    pub exponent: f64,

    /// Blend area for the left, top, right and bottom edges.
    /// Stored halved, the public accessors work in full widths.
    #[serde(default)]
    pub edges: [f64; 4],

    /// Gamma curve for the red, green and blue channels
    #[serde(default = "default_gamma")]
    pub gamma: [f64; 3],

    /// Luminance for the red, green and blue channels (0.5 = linear)
    #[serde(default = "default_luminance")]
    pub luminance: [f64; 3],
}

fn default_exponent() -> f64 { 2.0 }
fn default_gamma() -> [f64; 3] { [1.0; 3] }
fn default_luminance() -> [f64; 3] { [0.5; 3] }

impl Default for BlendSettings {
    fn default() -> Self {
        Self {
            exponent: default_exponent(),
            edges: [0.0; 4],
            gamma: default_gamma(),
            luminance: default_luminance(),
        }
    }
}

impl BlendSettings {
    /// Set the blend area for the left, top, right and bottom edges (0 to 1)
    pub fn set_edges(&mut self, edges: [f64; 4]) {
        self.edges = edges.map(|e| (e * 0.5).clamp(0.0, 1.0));
    }

    /// Blend area for the left, top, right and bottom edges
    pub fn get_edges(&self) -> [f64; 4] {
        self.edges.map(|e| e * 2.0)
    }

    /// Set one luminance value for all channels
    pub fn set_luminance(&mut self, luminance: f64) {
        self.luminance = [luminance; 3];
    }

    pub fn set_luminance_rgb(&mut self, rgb: [f64; 3]) {
        self.luminance = rgb;
    }

    /// Set one gamma value for all channels
    pub fn set_gamma(&mut self, gamma: f64) {
        self.gamma = [gamma; 3];
    }

    pub fn set_gamma_rgb(&mut self, rgb: [f64; 3]) {
        self.gamma = rgb;
    }

    pub fn set_exponent(&mut self, exponent: f64) {
        self.exponent = exponent;
    }

    /// Whether any edge actually fades
    pub fn has_blending(&self) -> bool {
        self.edges.iter().any(|e| *e > 0.0)
    }
}
