//! Configuration management for meshwarp

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::bilinear::{DEFAULT_RESOLUTION, MAX_RESOLUTION, MIN_RESOLUTION};
use crate::geometry::Size;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub mesh: MeshConfig,
}

/// Output surface the warps are projected onto
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Content size given to new warps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Warp settings JSON file
    pub path: PathBuf,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("warp_settings.json"),
        }
    }
}

/// Mesh defaults for new bilinear warps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshConfig {
    /// Approximate quad size in pixels (4 to 64)
    #[serde(default = "default_resolution")]
    pub resolution: u32,
    /// Derive mesh density from the on-screen size of the warp
    #[serde(default = "default_adaptive")]
    pub adaptive: bool,
    /// Straight lines between control points instead of a spline
    #[serde(default)]
    pub linear: bool,
}

fn default_resolution() -> u32 { DEFAULT_RESOLUTION }
fn default_adaptive() -> bool { true }

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            resolution: default_resolution(),
            adaptive: default_adaptive(),
            linear: false,
        }
    }
}

impl Config {
    /// Load configuration from a file, or create default if it doesn't exist
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {:?}", path))?;
            let mut config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config from {:?}", path))?;
            config.mesh.resolution = config.mesh.resolution.clamp(MIN_RESOLUTION, MAX_RESOLUTION);
            tracing::info!("Loaded configuration from {:?}", path);
            Ok(config)
        } else {
            let config = Config::default();
            config.save(path)?;
            tracing::info!("Created default configuration at {:?}", path);
            Ok(config)
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {:?}", path))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    pub fn window_size(&self) -> Size {
        Size::new(self.window.width as f64, self.window.height as f64)
    }

    pub fn content_size(&self) -> Size {
        Size::new(self.content.width as f64, self.content.height as f64)
    }
}
