//! Demo binary that renders a synthetic scene through the Obra Dinn pass.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p obra-demo` for the CPU reference backend, or
//! `cargo run -p obra-demo -- --gpu --frames 8` for headless wgpu.

mod programs;
mod scene;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use glam::Quat;
use image::RgbaImage;
use obra_config::{CliArgs, Config};
use obra_render::{
    Camera, CpuBackend, CpuProgram, FilterMode, ObraDinnFeature, PassError, PassSettings,
    ProgramSource, RenderBackend, Renderer, WgpuBackend, WgslProgram,
};
use tracing::{error, info, warn};

use crate::programs::{PaletteThreshold, WorldSpaceDither};

const BUILTIN_DITHER: &str = include_str!("../shaders/dither.wgsl");
const BUILTIN_THRESHOLD: &str = include_str!("../shaders/threshold.wgsl");

/// Total yaw swept over the rendered frames, in radians.
const ORBIT_SWEEP: f32 = std::f32::consts::FRAC_PI_2;

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let config_dir = args
        .config
        .clone()
        .or_else(Config::default_dir)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    obra_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    let scene = scene::build(config.output.width, config.output.height);
    info!(
        "Rendering {} frame(s) at {}x{} ({}, injection point {})",
        config.debug.frames,
        config.output.width,
        config.output.height,
        if args.gpu { "wgpu" } else { "cpu" },
        config.pass.injection_point
    );

    let image = if args.gpu {
        render_gpu(&config, &scene)?
    } else {
        render_cpu(&config, &scene)?
    };

    image
        .save(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!("Wrote {}", args.output.display());
    Ok(())
}

fn render_cpu(config: &Config, scene: &RgbaImage) -> anyhow::Result<RgbaImage> {
    let mut backend = match config.pass.temporary_budget_bytes {
        Some(bytes) => CpuBackend::with_budget(bytes),
        None => CpuBackend::new(),
    };
    let output = backend.create_target(scene.clone(), FilterMode::Bilinear);

    let mut renderer = Renderer::new();
    renderer.add_feature(ObraDinnFeature::<CpuBackend>::new(PassSettings {
        dither: Some(CpuProgram::new(WorldSpaceDither::default())),
        threshold: Some(CpuProgram::new(PaletteThreshold::default())),
        injection_point: config.pass.injection_point,
    }));

    render_frames(&mut renderer, &mut backend, &output, scene, config);
    backend
        .take_target(output)
        .context("camera target disappeared from the CPU backend")
}

fn render_gpu(config: &Config, scene: &RgbaImage) -> anyhow::Result<RgbaImage> {
    let ctx = obra_render::init_headless_blocking().context("initializing wgpu")?;
    let mut backend = match config.pass.temporary_budget_bytes {
        Some(bytes) => WgpuBackend::with_budget(ctx.device, ctx.queue, bytes),
        None => WgpuBackend::new(ctx.device, ctx.queue),
    };
    let output = backend.create_target_from_image(scene, FilterMode::Bilinear);

    let dither = load_program(
        &mut backend,
        config.pass.dither_shader.as_deref(),
        "dither",
        BUILTIN_DITHER,
    );
    let threshold = load_program(
        &mut backend,
        config.pass.threshold_shader.as_deref(),
        "threshold",
        BUILTIN_THRESHOLD,
    );

    let mut renderer = Renderer::new();
    renderer.add_feature(ObraDinnFeature::<WgpuBackend>::new(PassSettings {
        dither,
        threshold,
        injection_point: config.pass.injection_point,
    }));

    render_frames(&mut renderer, &mut backend, &output, scene, config);
    backend.submit();
    backend
        .read_target(&output)
        .context("reading the camera target back from the GPU")
}

/// Compile a WGSL program from `path`, or the built-in body when unset.
///
/// A program that fails to load is left out; the feature then reports the
/// missing program and the frame renders without the effect.
fn load_program(
    backend: &mut WgpuBackend,
    path: Option<&Path>,
    name: &str,
    builtin: &str,
) -> Option<WgslProgram> {
    let program = match path {
        Some(path) => backend.load_program(path),
        None => ProgramSource::new(name, builtin)
            .map(|source| backend.create_program(&source))
            .map_err(PassError::from),
    };
    program
        .inspect_err(|e| error!("Failed to load {name} program: {e}"))
        .ok()
}

/// A backend the demo can re-upload the scene into before each frame.
trait SceneUpload: RenderBackend {
    fn upload_scene(&mut self, target: &Self::Texture, scene: &RgbaImage) -> bool;
}

impl SceneUpload for CpuBackend {
    fn upload_scene(&mut self, target: &Self::Texture, scene: &RgbaImage) -> bool {
        self.write_target(target, scene.clone())
    }
}

impl SceneUpload for WgpuBackend {
    fn upload_scene(&mut self, target: &Self::Texture, scene: &RgbaImage) -> bool {
        self.write_target(target, scene)
    }
}

fn render_frames<B: SceneUpload>(
    renderer: &mut Renderer<B>,
    backend: &mut B,
    output: &B::Texture,
    scene: &RgbaImage,
    config: &Config,
) {
    let frames = config.debug.frames.max(1);
    let mut camera = Camera::default();
    camera.set_aspect_ratio(config.output.width as f32, config.output.height as f32);

    for frame in 0..frames {
        if frame > 0 && !backend.upload_scene(output, scene) {
            warn!("Frame {frame}: could not refresh the camera target");
        }
        let t = frame as f32 / frames as f32;
        camera.rotation = Quat::from_rotation_y(-ORBIT_SWEEP * t);

        renderer.begin_frame();
        let report = renderer.render_camera(backend, &camera, output);
        for (label, reason) in &report.failed {
            warn!("Frame {frame}: {label} failed: {reason}");
        }
        if report.executed.is_empty() && report.failed.is_empty() {
            info!("Frame {frame}: no passes scheduled");
        }
    }
}
