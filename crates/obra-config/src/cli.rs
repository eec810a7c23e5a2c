//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;
use obra_render::InjectionPoint;

use crate::Config;

/// Command-line arguments of the demo.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug)]
#[command(name = "obra-demo", about = "Obra Dinn style dither/threshold post-process")]
pub struct CliArgs {
    /// Output width.
    #[arg(long)]
    pub width: Option<u32>,

    /// Output height.
    #[arg(long)]
    pub height: Option<u32>,

    /// Where the pass runs (e.g. after-opaque, before-post-processing).
    #[arg(long)]
    pub injection_point: Option<InjectionPoint>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Number of frames to render.
    #[arg(long)]
    pub frames: Option<u32>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Render on the GPU through wgpu instead of the CPU reference backend.
    #[arg(long)]
    pub gpu: bool,

    /// PNG file the final frame is written to.
    #[arg(long, default_value = "obra-dinn.png")]
    pub output: PathBuf,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(w) = args.width {
            self.output.width = w;
        }
        if let Some(h) = args.height {
            self.output.height = h;
        }
        if let Some(point) = args.injection_point {
            self.pass.injection_point = point;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
        if let Some(frames) = args.frames {
            self.debug.frames = frames;
        }
    }
}
