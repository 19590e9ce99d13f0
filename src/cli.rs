use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;

use crate::config::SceneConfig;
use crate::gpu::context::GpuContext;
use crate::lifecycle::{MountOutcome, SceneVisual};
use crate::offscreen::{pump_frame, OffscreenHost, OffscreenTarget};
use crate::presets;
use crate::viewport::Viewport;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in section visuals
    Sections,

    /// Print a built-in section visual as JSON
    Show {
        #[arg(long)]
        section: String,
    },

    /// Render frames to disk
    Render {
        /// Built-in section to render
        #[arg(long, conflicts_with = "config", required_unless_present = "config")]
        section: Option<String>,

        /// JSON scene config to render instead of a built-in section
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output directory for frames
        #[arg(long)]
        out: PathBuf,

        /// Frames per second
        #[arg(long, default_value_t = 60.0)]
        fps: f64,

        /// Number of frames after the initial one
        #[arg(long, default_value_t = 120)]
        frames: u32,

        /// Output width
        #[arg(long, default_value_t = 800)]
        width: u32,

        /// Output height
        #[arg(long, default_value_t = 600)]
        height: u32,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Sections => {
            for config in presets::all() {
                println!("{:<16} {:>4} elements", config.name, config.element_count());
            }
        }
        Commands::Show { section } => {
            let config = preset(&section)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Render {
            section,
            config,
            out,
            fps,
            frames,
            width,
            height,
        } => {
            let config = match (section, config) {
                (Some(name), _) => preset(&name)?,
                (None, Some(path)) => load_config(&path)?,
                (None, None) => bail!("either --section or --config is required"),
            };
            pollster::block_on(render_offline(config, out, fps, frames, width, height))?;
        }
    }
    Ok(())
}

fn preset(name: &str) -> Result<SceneConfig> {
    presets::section(name)
        .with_context(|| format!("unknown section '{}' (known: {})", name, presets::SECTIONS.join(", ")))
}

fn load_config(path: &PathBuf) -> Result<SceneConfig> {
    let contents = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config = SceneConfig::from_json(&contents).with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}

async fn render_offline(
    config: SceneConfig,
    out_dir: PathBuf,
    fps: f64,
    frames: u32,
    width: u32,
    height: u32,
) -> Result<()> {
    if !(fps.is_finite() && fps > 0.0) {
        bail!("--fps must be positive, got {}", fps);
    }
    fs::create_dir_all(&out_dir)?;

    let context = GpuContext::headless().await?;
    let target = OffscreenTarget {
        context,
        capture_dir: Some(out_dir.clone()),
    };

    let name = config.name.clone();
    let mut visual = SceneVisual::new(config, OffscreenHost::new(Viewport::new(width, height)));
    match visual.mount(Some(target))? {
        MountOutcome::Mounted => {}
        outcome => bail!("{}: not mounted ({:?})", name, outcome),
    }

    println!("Rendering {} frames of '{}' at {} fps...", frames + 1, name, fps);
    let dt = 1.0 / fps;
    for frame in 0..frames {
        if !pump_frame(&mut visual, dt) {
            log::warn!("{}: animation stopped after {} frames", name, frame);
            break;
        }
        if frame % 60 == 0 {
            println!("Frame {}/{}", frame + 1, frames);
        }
    }

    let captured = visual.surface().map(|s| s.captured()).unwrap_or(0);
    visual.unmount();

    let counts = visual.ledger().counts();
    println!("Wrote {} frames to {}", captured, out_dir.display());
    println!(
        "Geometries {}/{} released, materials {}/{} released",
        counts.geometries_released, counts.geometries_allocated, counts.materials_released, counts.materials_allocated
    );
    if !counts.is_balanced() {
        bail!("{} resources outstanding after unmount", counts.outstanding());
    }
    Ok(())
}
