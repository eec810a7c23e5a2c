//! End-to-end tests: feature → renderer → backend.

use glam::{Quat, Vec3, Vec4};
use image::{Rgba, RgbaImage};

use crate::camera::Camera;
use crate::cpu::{CommandRecord, CpuBackend, CpuProgram, Fragment, Passthrough, PixelShader};
use crate::frustum::FrustumCorners;
use crate::obra_dinn::{ObraDinnFeature, PROFILING_LABEL, PassSettings};
use crate::params::ShaderParameters;
use crate::pass::InjectionPoint;
use crate::renderer::Renderer;
use crate::target::{FilterMode, LARGE_BUFFER, MAIN_BUFFER};

fn passthrough_feature() -> ObraDinnFeature<CpuBackend> {
    ObraDinnFeature::new(PassSettings {
        dither: Some(CpuProgram::new(Passthrough)),
        threshold: Some(CpuProgram::new(Passthrough)),
        injection_point: InjectionPoint::default(),
    })
}

/// Binary threshold on luminance.
struct Threshold;

impl PixelShader for Threshold {
    fn name(&self) -> &str {
        "threshold"
    }

    fn shade(&self, fragment: &Fragment<'_>, _params: &ShaderParameters) -> Vec4 {
        let c = fragment.sample(fragment.uv);
        let luma = c.truncate().dot(Vec3::new(0.2126, 0.7152, 0.0722));
        if luma >= 0.5 { Vec4::ONE } else { Vec4::W }
    }
}

/// Writes the interpolated view direction's vertical component.
struct SkyMask;

impl PixelShader for SkyMask {
    fn name(&self) -> &str {
        "sky-mask"
    }

    fn shade(&self, fragment: &Fragment<'_>, params: &ShaderParameters) -> Vec4 {
        let dir = FrustumCorners::read_from(params).direction_at(fragment.uv);
        if dir.y > 0.0 { Vec4::ONE } else { Vec4::W }
    }
}

#[test]
fn test_solid_color_survives_passthrough_pipeline() {
    let color = [40, 120, 200, 255];
    let mut backend = CpuBackend::new();
    let output = backend.create_target(
        RgbaImage::from_pixel(64, 36, Rgba(color)),
        FilterMode::Bilinear,
    );

    let mut renderer = Renderer::new();
    renderer.add_feature(passthrough_feature());
    let report = renderer.render_camera(&mut backend, &Camera::default(), &output);

    assert_eq!(report.executed, [PROFILING_LABEL]);
    assert!(report.failed.is_empty());
    let image = backend.take_target(output).unwrap();
    assert!(image.pixels().all(|p| p.0 == color));
}

#[test]
fn test_missing_program_leaves_output_untouched() {
    let mut backend = CpuBackend::new();
    let source = RgbaImage::from_fn(16, 16, |x, y| Rgba([x as u8 * 16, y as u8 * 16, 7, 255]));
    let output = backend.create_target(source.clone(), FilterMode::Bilinear);

    let mut renderer = Renderer::new();
    renderer.add_feature(ObraDinnFeature::<CpuBackend>::new(PassSettings {
        dither: None,
        threshold: Some(CpuProgram::new(Passthrough)),
        injection_point: InjectionPoint::default(),
    }));

    for _ in 0..4 {
        renderer.begin_frame();
        let report = renderer.render_camera(&mut backend, &Camera::default(), &output);
        assert!(report.executed.is_empty());
        assert!(report.failed.is_empty());
    }

    assert!(backend.commands().is_empty());
    assert_eq!(backend.image(&output), Some(&source));
    assert_eq!(renderer.frame_index(), 4);
}

#[test]
fn test_buffer_sizes_do_not_depend_on_output_resolution() {
    for (w, h) in [(320, 180), (1920, 1080), (7, 3)] {
        let mut backend = CpuBackend::new();
        let output = backend.create_target(RgbaImage::new(w, h), FilterMode::Bilinear);
        let mut renderer = Renderer::new();
        renderer.add_feature(passthrough_feature());
        renderer.render_camera(&mut backend, &Camera::default(), &output);

        let pool = backend.pool();
        assert_eq!(
            pool.memory_allocated(),
            LARGE_BUFFER.byte_size() + MAIN_BUFFER.byte_size(),
            "output {w}x{h}"
        );
        assert_eq!(pool.memory_in_use(), 0);
        assert_eq!(backend.outstanding_temporaries(), 0);
        assert_eq!(backend.open_scopes(), 0);
    }
}

#[test]
fn test_temporaries_are_reused_across_frames() {
    let mut backend = CpuBackend::new();
    let output = backend.create_target(RgbaImage::new(32, 32), FilterMode::Bilinear);
    let mut renderer = Renderer::new();
    renderer.add_feature(passthrough_feature());

    for _ in 0..3 {
        renderer.render_camera(&mut backend, &Camera::default(), &output);
    }

    let allocated = LARGE_BUFFER.byte_size() + MAIN_BUFFER.byte_size();
    assert_eq!(backend.pool().memory_allocated(), allocated);
    let allocations = backend
        .commands()
        .iter()
        .filter(|c| matches!(c, CommandRecord::Allocate(_)))
        .count();
    assert_eq!(allocations, 6);
}

#[test]
fn test_pipeline_is_deterministic() {
    let render = || {
        let mut backend = CpuBackend::new();
        let source = RgbaImage::from_fn(48, 27, |x, y| {
            Rgba([(x * 5) as u8, (y * 9) as u8, ((x + y) * 3) as u8, 255])
        });
        let output = backend.create_target(source, FilterMode::Bilinear);
        let mut renderer = Renderer::new();
        renderer.add_feature(ObraDinnFeature::<CpuBackend>::new(PassSettings {
            dither: Some(CpuProgram::new(Passthrough)),
            threshold: Some(CpuProgram::new(Threshold)),
            injection_point: InjectionPoint::default(),
        }));
        renderer.render_camera(&mut backend, &Camera::default(), &output);
        backend.take_target(output).unwrap()
    };

    assert_eq!(render(), render());
}

#[test]
fn test_threshold_output_is_two_tone() {
    let mut backend = CpuBackend::new();
    let source = RgbaImage::from_fn(40, 20, |x, _| {
        let v = (x * 6) as u8;
        Rgba([v, v, v, 255])
    });
    let output = backend.create_target(source, FilterMode::Bilinear);
    let mut renderer = Renderer::new();
    renderer.add_feature(ObraDinnFeature::<CpuBackend>::new(PassSettings {
        dither: Some(CpuProgram::new(Passthrough)),
        threshold: Some(CpuProgram::new(Threshold)),
        injection_point: InjectionPoint::default(),
    }));
    renderer.render_camera(&mut backend, &Camera::default(), &output);

    let image = backend.take_target(output).unwrap();
    let black = image.pixels().filter(|p| p.0 == [0, 0, 0, 255]).count();
    let white = image.pixels().filter(|p| p.0 == [255, 255, 255, 255]).count();
    assert!(black > 0 && white > 0);
    // Bilinear upsampling of main back to output only blends at tone edges.
    assert!(black + white >= image.pixels().count() * 3 / 4);
}

#[test]
fn test_corners_drive_dither_program() {
    // Camera looking straight ahead: upper half sees +Y directions.
    let mut backend = CpuBackend::new();
    let output = backend.create_target(RgbaImage::new(16, 16), FilterMode::Bilinear);
    let mut renderer = Renderer::new();
    renderer.add_feature(ObraDinnFeature::<CpuBackend>::new(PassSettings {
        dither: Some(CpuProgram::new(SkyMask)),
        threshold: Some(CpuProgram::new(Passthrough)),
        injection_point: InjectionPoint::default(),
    }));

    let camera = Camera {
        rotation: Quat::IDENTITY,
        ..Camera::default()
    };
    renderer.render_camera(&mut backend, &camera, &output);

    let image = backend.take_target(output).unwrap();
    assert_eq!(image.get_pixel(8, 0).0, [255, 255, 255, 255]);
    assert_eq!(image.get_pixel(8, 15).0, [0, 0, 0, 255]);
}

#[test]
fn test_denied_allocation_still_presents_frame() {
    // Room for the large buffer only; the main buffer request is refused.
    let mut backend = CpuBackend::with_budget(LARGE_BUFFER.byte_size());
    let source = RgbaImage::from_fn(24, 12, |x, y| Rgba([x as u8 * 10, y as u8 * 20, 90, 255]));
    let output = backend.create_target(source.clone(), FilterMode::Bilinear);

    let mut renderer = Renderer::new();
    renderer.add_feature(passthrough_feature());

    for _ in 0..2 {
        renderer.begin_frame();
        let report = renderer.render_camera(&mut backend, &Camera::default(), &output);

        assert!(report.executed.is_empty());
        assert_eq!(report.failed.len(), 1);
        let (label, reason) = &report.failed[0];
        assert_eq!(label, PROFILING_LABEL);
        assert!(reason.contains("820x470"), "{reason}");
        assert_eq!(backend.outstanding_temporaries(), 0);
        assert_eq!(backend.pool().memory_in_use(), 0);
    }

    assert!(
        !backend
            .commands()
            .iter()
            .any(|c| matches!(c, CommandRecord::Blit { .. }))
    );
    assert_eq!(backend.take_target(output), Some(source));
}
