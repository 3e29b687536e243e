//! meshwarp - projection warping from the command line
//!
//! Creates, inspects and edits warp settings files. Each warp maps the
//! rectangular content onto a keystoned quad, a curved mesh or both; the
//! `mesh` subcommand prints the geometry a renderer would draw.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use meshwarp::config::Config;
use meshwarp::controller::{Controller, WarpCommand};
use meshwarp::warp::{TextureRegion, Warp, WarpGeometry, WarpKind};

/// meshwarp - perspective and mesh warping for projection mapping
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Warp settings file (overrides the config file)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Output window width (overrides the config file)
    #[arg(long)]
    width: Option<u32>,

    /// Output window height (overrides the config file)
    #[arg(long)]
    height: Option<u32>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default layout of four warps
    Init {
        /// Replace an existing settings file
        #[arg(long)]
        force: bool,
    },
    /// Summarize every warp in the settings file
    Inspect,
    /// Print the geometry of one warp as JSON
    Mesh {
        /// Warp index
        index: usize,
    },
    /// Apply editing commands to one warp and save
    Apply {
        /// Warp index
        index: usize,
        /// Commands, e.g. select-next, nudge:10,0, double-columns, flip-h
        #[arg(required = true)]
        commands: Vec<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging, RUST_LOG wins over --verbose
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("meshwarp v{}", env!("CARGO_PKG_VERSION"));

    // Load or create configuration, CLI args override it
    let mut config = Config::load_or_create(&args.config)?;
    if let Some(width) = args.width {
        config.window.width = width;
    }
    if let Some(height) = args.height {
        config.window.height = height;
    }
    let settings_path = args.settings.clone().unwrap_or_else(|| config.settings.path.clone());

    let mut controller = Controller::new(config.window_size(), config.content_size());

    match args.command {
        Command::Init { force } => {
            if settings_path.exists() && !force {
                anyhow::bail!("{:?} already exists, use --force to replace it", settings_path);
            }
            build_default_layout(&mut controller, &config);
            controller.save_settings(&settings_path)?;
        }
        Command::Inspect => {
            load(&mut controller, &settings_path)?;
            for (i, warp) in controller.warps().iter().enumerate() {
                let grid = warp.grid();
                info!(
                    "Warp {}: {} {}x{} controls, brightness {:.2}, edges {:?}",
                    i,
                    warp.kind(),
                    grid.num_controls_x(),
                    grid.num_controls_y(),
                    grid.brightness(),
                    grid.blend().get_edges()
                );
                if let Some(mesh) = warp.mesh_controls() {
                    let bilinear = mesh.bilinear();
                    let (rx, ry) = bilinear.mesh_resolution();
                    info!(
                        "  mesh {}x{} vertices, resolution {}, {}, {}",
                        rx,
                        ry,
                        bilinear.resolution(),
                        if bilinear.is_linear() { "linear" } else { "curved" },
                        if bilinear.is_adaptive() { "adaptive" } else { "fixed" }
                    );
                }
            }
        }
        Command::Mesh { index } => {
            load(&mut controller, &settings_path)?;
            let texture = TextureRegion::new(config.content.width as f64, config.content.height as f64);
            let warp = controller
                .warp_mut(index)
                .with_context(|| format!("No warp at index {}", index))?;

            let params = warp.prepare_draw_texture(texture);
            let geometry = geometry_json(&params.geometry);
            let output = serde_json::json!({
                "src": params.src,
                "dst": params.dst,
                "clipped": params.clipped,
                "tex_corners": params.tex_corners,
                "brightness": params.brightness,
                "blend": params.blend,
                "geometry": geometry,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Apply { index, commands } => {
            load(&mut controller, &settings_path)?;
            if controller.warp(index).is_none() {
                anyhow::bail!("No warp at index {}", index);
            }
            controller.focus(index);

            for command in &commands {
                let parsed: WarpCommand = command.parse()?;
                if let Err(e) = controller.apply(parsed) {
                    warn!("{} failed: {}", command, e);
                }
            }

            controller.refresh_all();
            controller.save_settings(&settings_path)?;
        }
    }

    Ok(())
}

fn load(controller: &mut Controller, path: &std::path::Path) -> Result<()> {
    if !controller.load_settings(path)? {
        anyhow::bail!("No warp settings at {:?}, run `meshwarp init` first", path);
    }
    Ok(())
}

/// One warp of each kind, blended towards each other along the shared edges
fn build_default_layout(controller: &mut Controller, config: &Config) {
    let layout = [
        (WarpKind::Perspective, [0.0, 0.0, 1.0, 0.0]),
        (WarpKind::Bilinear, [1.0, 0.0, 0.0, 1.0]),
        (WarpKind::PerspectiveBilinear, [0.0, 1.0, 0.0, 0.0]),
        (WarpKind::PerspectiveBilinear, [0.0, 1.0, 1.0, 0.0]),
    ];

    for (kind, edges) in layout {
        let mut warp = Warp::new(kind);
        warp.grid_mut().blend_mut().set_edges(edges);

        if let Some(mesh) = warp.mesh_controls_mut() {
            let bilinear = mesh.bilinear_mut();
            bilinear.set_resolution(config.mesh.resolution);
            bilinear.set_adaptive(config.mesh.adaptive);
            bilinear.set_linear(config.mesh.linear);
        }

        controller.add_warp(warp);
    }

    info!("Created default layout with {} warps", controller.len());
}

fn geometry_json(geometry: &WarpGeometry<'_>) -> serde_json::Value {
    let matrix = |m: &nalgebra::Matrix4<f64>| -> Vec<Vec<f64>> {
        m.row_iter().map(|row| row.iter().copied().collect()).collect()
    };

    match geometry {
        WarpGeometry::Mesh(mesh) => serde_json::json!({ "mesh": mesh }),
        WarpGeometry::Transform(transform) => serde_json::json!({ "transform": matrix(transform) }),
        WarpGeometry::Composite { mesh, transform } => serde_json::json!({
            "mesh": mesh,
            "transform": matrix(transform),
        }),
    }
}
