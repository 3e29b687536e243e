//! Ordered collection of warps and the editing actions that drive them
//!
//! The controller owns every warp, tracks which one has focus, and turns
//! device-free [`WarpCommand`]s into warp mutations. It also frames the
//! whole collection as a JSON settings file.

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::WarpError;
use crate::geometry::{Point, Size};
use crate::settings::{SettingsFile, WarpRecord};
use crate::warp::Warp;

/// Brightness change per step
const BRIGHTNESS_STEP: f64 = 0.01;

/// An editing action, independent of the input device that triggered it
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WarpCommand {
    /// Toggle editing on every warp
    ToggleEditing,
    IncreaseBrightness,
    DecreaseBrightness,
    Reset,
    SelectNext,
    SelectPrevious,
    /// Move the selected control point by window pixels
    Nudge { dx: f64, dy: f64 },
    RotateClockwise,
    RotateCounterclockwise,
    FlipHorizontal,
    FlipVertical,
    HalveColumns,
    DoubleColumns,
    AddColumn,
    RemoveColumn,
    HalveRows,
    DoubleRows,
    AddRow,
    RemoveRow,
    IncreaseResolution,
    DecreaseResolution,
    ToggleAdaptive,
    ToggleLinear,
}

impl FromStr for WarpCommand {
    type Err = anyhow::Error;

    /// Parse a kebab-case command name; nudges are written `nudge:<dx>,<dy>`
    fn from_str(s: &str) -> Result<Self> {
        if let Some(args) = s.strip_prefix("nudge:") {
            let (dx, dy) = args
                .split_once(',')
                .with_context(|| format!("Expected nudge:<dx>,<dy>, got {:?}", s))?;
            return Ok(WarpCommand::Nudge {
                dx: dx.trim().parse().with_context(|| format!("Invalid nudge dx {:?}", dx))?,
                dy: dy.trim().parse().with_context(|| format!("Invalid nudge dy {:?}", dy))?,
            });
        }

        let command = match s {
            "toggle-editing" => WarpCommand::ToggleEditing,
            "brighter" => WarpCommand::IncreaseBrightness,
            "darker" => WarpCommand::DecreaseBrightness,
            "reset" => WarpCommand::Reset,
            "select-next" => WarpCommand::SelectNext,
            "select-previous" => WarpCommand::SelectPrevious,
            "rotate-cw" => WarpCommand::RotateClockwise,
            "rotate-ccw" => WarpCommand::RotateCounterclockwise,
            "flip-h" => WarpCommand::FlipHorizontal,
            "flip-v" => WarpCommand::FlipVertical,
            "halve-columns" => WarpCommand::HalveColumns,
            "double-columns" => WarpCommand::DoubleColumns,
            "add-column" => WarpCommand::AddColumn,
            "remove-column" => WarpCommand::RemoveColumn,
            "halve-rows" => WarpCommand::HalveRows,
            "double-rows" => WarpCommand::DoubleRows,
            "add-row" => WarpCommand::AddRow,
            "remove-row" => WarpCommand::RemoveRow,
            "finer" => WarpCommand::IncreaseResolution,
            "coarser" => WarpCommand::DecreaseResolution,
            "toggle-adaptive" => WarpCommand::ToggleAdaptive,
            "toggle-linear" => WarpCommand::ToggleLinear,
            other => anyhow::bail!("Unknown command {:?}", other),
        };
        Ok(command)
    }
}

pub struct Controller {
    warps: Vec<Warp>,
    focused: Option<usize>,
    window: Size,
    content: Size,
    /// Offset between the grabbed control point and the cursor, normalized
    drag_offset: Point,
}

impl Controller {
    pub fn new(window: Size, content: Size) -> Self {
        Self {
            warps: Vec::new(),
            focused: None,
            window,
            content,
            drag_offset: Point::ZERO,
        }
    }

    // -- collection ---------------------------------------------------------

    /// Append a warp, sized to the controller's window and content
    pub fn add_warp(&mut self, mut warp: Warp) -> usize {
        warp.handle_window_resize(self.window);
        warp.set_size(self.content);
        self.warps.push(warp);
        self.warps.len() - 1
    }

    pub fn remove_warp(&mut self, index: usize) -> Option<Warp> {
        if index >= self.warps.len() {
            return None;
        }

        self.focused = match self.focused {
            Some(f) if f == index => None,
            Some(f) if f > index => Some(f - 1),
            other => other,
        };
        Some(self.warps.remove(index))
    }

    pub fn warp(&self, index: usize) -> Option<&Warp> {
        self.warps.get(index)
    }

    pub fn warp_mut(&mut self, index: usize) -> Option<&mut Warp> {
        self.warps.get_mut(index)
    }

    pub fn warps(&self) -> &[Warp] {
        &self.warps
    }

    pub fn warps_mut(&mut self) -> &mut [Warp] {
        &mut self.warps
    }

    pub fn len(&self) -> usize {
        self.warps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warps.is_empty()
    }

    pub fn window_size(&self) -> Size {
        self.window
    }

    pub fn focused_index(&self) -> Option<usize> {
        self.focused
    }

    /// Give focus to a warp directly, as if its point had been picked
    pub fn focus(&mut self, index: usize) {
        if index < self.warps.len() {
            self.focused = Some(index);
        }
    }

    // -- picking ------------------------------------------------------------

    /// Select the control point closest to `pos` (window pixels) among the
    /// warps being edited
    ///
    /// Later warps are drawn on top, so they are searched first and win
    /// ties. The focused warp selects the point, all others deselect.
    pub fn select_closest_control_point(&mut self, pos: Point) {
        let mut best: Option<(usize, usize)> = None;
        let mut distance = f64::MAX;

        for (i, warp) in self.warps.iter().enumerate().rev() {
            let (index, candidate) = warp.find_closest_control_point(pos);
            if candidate < distance && warp.grid().is_editing() {
                distance = candidate;
                best = Some((i, index));
            }
        }

        self.focused = best.map(|(i, _)| i);

        for (i, warp) in self.warps.iter_mut().enumerate() {
            warp.grid_mut().set_cursor(Some(pos));
            match best {
                Some((focused, index)) if focused == i => warp.select_control_point(index),
                _ => warp.deselect_control_point(),
            }
        }
    }

    /// Pick the closest point and remember where it was grabbed
    pub fn handle_cursor_down(&mut self, pos: Point) {
        self.select_closest_control_point(pos);

        self.drag_offset = Point::ZERO;
        if let Some(warp) = self.focused.and_then(|i| self.warps.get(i)) {
            if let Some(selected) = warp.grid().selected_control_point() {
                if let Ok(point) = warp.control_point(selected) {
                    self.drag_offset = point - Point::from_pixels(pos, self.window);
                }
            }
        }
    }

    /// Drag the selected point of the focused warp to `pos` (window pixels)
    pub fn handle_cursor_drag(&mut self, pos: Point) {
        let target = Point::from_pixels(pos, self.window) + self.drag_offset;

        if let Some(warp) = self.focused.and_then(|i| self.warps.get_mut(i)) {
            if !warp.grid().is_editing() {
                return;
            }
            warp.grid_mut().set_cursor(Some(pos));
            if let Some(selected) = warp.grid().selected_control_point() {
                warp.set_control_point(selected, target);
            }
        }
    }

    pub fn handle_window_resize(&mut self, window: Size) {
        self.window = window;
        for warp in &mut self.warps {
            warp.handle_window_resize(window);
        }
        debug!("Resized {} warps to {}x{}", self.warps.len(), window.width, window.height);
    }

    // -- commands -----------------------------------------------------------

    /// Apply a command to the focused warp (or all warps for
    /// [`WarpCommand::ToggleEditing`])
    ///
    /// Commands without a focused warp, and mesh commands on perspective
    /// warps, do nothing. Grid resizes over budget return the error and
    /// leave the warp unchanged.
    pub fn apply(&mut self, command: WarpCommand) -> std::result::Result<(), WarpError> {
        if command == WarpCommand::ToggleEditing {
            for warp in &mut self.warps {
                let editing = !warp.grid().is_editing();
                warp.set_editing(editing);
            }
            return Ok(());
        }

        let window = self.window;
        let Some(warp) = self.focused.and_then(|i| self.warps.get_mut(i)) else {
            debug!("Ignoring {:?}, no warp has focus", command);
            return Ok(());
        };

        match command {
            WarpCommand::ToggleEditing => {}
            WarpCommand::IncreaseBrightness => {
                let brightness = warp.grid().brightness() + BRIGHTNESS_STEP;
                warp.grid_mut().set_brightness(brightness);
            }
            WarpCommand::DecreaseBrightness => {
                let brightness = warp.grid().brightness() - BRIGHTNESS_STEP;
                warp.grid_mut().set_brightness(brightness);
            }
            WarpCommand::Reset => warp.reset(),
            WarpCommand::SelectNext | WarpCommand::SelectPrevious => {
                let n = warp.grid().num_control_points();
                let current = warp.grid().selected_control_point();
                let next = match (command, current) {
                    (WarpCommand::SelectNext, Some(i)) => (i + 1) % n,
                    (WarpCommand::SelectNext, None) => 0,
                    (_, Some(0)) | (_, None) => n - 1,
                    (_, Some(i)) => i - 1,
                };
                warp.select_control_point(next);
            }
            WarpCommand::Nudge { dx, dy } => {
                if let Some(selected) = warp.grid().selected_control_point() {
                    let shift = Point::new(dx / window.width, dy / window.height);
                    warp.move_control_point(selected, shift);
                }
            }
            WarpCommand::RotateClockwise => warp.rotate_clockwise(),
            WarpCommand::RotateCounterclockwise => warp.rotate_counterclockwise(),
            WarpCommand::FlipHorizontal => warp.flip_horizontal(),
            WarpCommand::FlipVertical => warp.flip_vertical(),
            _ => {
                let kind = warp.kind();
                let Some(mesh) = warp.mesh_controls_mut() else {
                    debug!("Ignoring {:?} on a {} warp", command, kind);
                    return Ok(());
                };

                let columns = mesh.bilinear().grid().num_controls_x();
                let rows = mesh.bilinear().grid().num_controls_y();

                match command {
                    WarpCommand::HalveColumns => mesh.set_num_controls_x((columns + 1) / 2)?,
                    WarpCommand::DoubleColumns => mesh.set_num_controls_x(columns * 2 - 1)?,
                    WarpCommand::AddColumn => mesh.set_num_controls_x(columns + 1)?,
                    WarpCommand::RemoveColumn => mesh.set_num_controls_x(columns - 1)?,
                    WarpCommand::HalveRows => mesh.set_num_controls_y((rows + 1) / 2)?,
                    WarpCommand::DoubleRows => mesh.set_num_controls_y(rows * 2 - 1)?,
                    WarpCommand::AddRow => mesh.set_num_controls_y(rows + 1)?,
                    WarpCommand::RemoveRow => mesh.set_num_controls_y(rows - 1)?,
                    WarpCommand::IncreaseResolution => mesh.bilinear_mut().increase_resolution(),
                    WarpCommand::DecreaseResolution => mesh.bilinear_mut().decrease_resolution(),
                    WarpCommand::ToggleAdaptive => {
                        let bilinear = mesh.bilinear_mut();
                        bilinear.set_adaptive(!bilinear.is_adaptive());
                    }
                    WarpCommand::ToggleLinear => {
                        let bilinear = mesh.bilinear_mut();
                        bilinear.set_linear(!bilinear.is_linear());
                    }
                    _ => {}
                }
            }
        }

        Ok(())
    }

    // -- geometry -----------------------------------------------------------

    /// Recompute the geometry of every dirty warp, in parallel
    pub fn refresh_all(&mut self) {
        self.warps.par_iter_mut().for_each(|warp| {
            warp.geometry();
        });
    }

    // -- persistence --------------------------------------------------------

    pub fn serialize(&self) -> Result<SettingsFile> {
        let warps = self
            .warps
            .iter()
            .map(|warp| serde_json::to_value(warp.to_record()).context("Failed to serialize warp"))
            .collect::<Result<Vec<_>>>()?;

        Ok(SettingsFile { warps })
    }

    /// Replace all warps with the ones in `settings`
    ///
    /// Entries that cannot be decoded or carry an unknown kind are skipped
    /// with a warning. Returns the number of warps loaded.
    pub fn deserialize(&mut self, settings: &SettingsFile) -> usize {
        self.warps.clear();
        self.focused = None;

        for (i, value) in settings.warps.iter().enumerate() {
            let record: WarpRecord = match serde_json::from_value(value.clone()) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping warp {}: {}", i, e);
                    continue;
                }
            };

            match Warp::from_record(&record) {
                Ok(warp) => {
                    self.add_warp(warp);
                }
                Err(e) => warn!("Skipping warp {}: {}", i, e),
            }
        }

        self.warps.len()
    }

    /// Write all warps to a pretty printed JSON file
    pub fn save_settings(&self, path: &Path) -> Result<()> {
        let settings = self.serialize()?;
        let content = serde_json::to_string_pretty(&settings)
            .context("Failed to serialize warp settings")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create settings directory {:?}", parent))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write warp settings to {:?}", path))?;

        info!("Saved {} warps to {:?}", self.warps.len(), path);
        Ok(())
    }

    /// Load warps from a JSON file
    ///
    /// Returns `false` and leaves the warps alone when the file is missing.
    pub fn load_settings(&mut self, path: &Path) -> Result<bool> {
        if !path.exists() {
            warn!("Warp settings not found at {:?}", path);
            return Ok(false);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read warp settings from {:?}", path))?;
        let settings: SettingsFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse warp settings from {:?}", path))?;

        let loaded = self.deserialize(&settings);
        info!("Loaded {} of {} warps from {:?}", loaded, settings.warps.len(), path);
        Ok(true)
    }
}
