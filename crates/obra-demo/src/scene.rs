//! Synthetic camera color buffer: sky gradient, horizon, and a few lit discs.

use glam::{Vec2, Vec3};
use image::{Rgba, RgbaImage};

struct Disc {
    center: Vec2,
    radius: f32,
    albedo: Vec3,
}

const LIGHT_DIR: Vec3 = Vec3::new(-0.5, 0.6, 0.62);

const DISCS: [Disc; 3] = [
    Disc {
        center: Vec2::new(0.3, 0.62),
        radius: 0.16,
        albedo: Vec3::new(0.85, 0.55, 0.35),
    },
    Disc {
        center: Vec2::new(0.62, 0.55),
        radius: 0.1,
        albedo: Vec3::new(0.4, 0.7, 0.9),
    },
    Disc {
        center: Vec2::new(0.8, 0.7),
        radius: 0.07,
        albedo: Vec3::new(0.95, 0.95, 0.9),
    },
];

/// Render the scene at `width`×`height`.
pub fn build(width: u32, height: u32) -> RgbaImage {
    let size = Vec2::new(width.max(1) as f32, height.max(1) as f32);
    let aspect = size.x / size.y;
    let light = LIGHT_DIR.normalize();

    RgbaImage::from_fn(width, height, |x, y| {
        let uv = (Vec2::new(x as f32, y as f32) + 0.5) / size;
        let color = shade(uv, aspect, light);
        let c = (color.clamp(Vec3::ZERO, Vec3::ONE) * 255.0).round();
        Rgba([c.x as u8, c.y as u8, c.z as u8, 255])
    })
}

fn shade(uv: Vec2, aspect: f32, light: Vec3) -> Vec3 {
    for disc in &DISCS {
        let offset = (uv - disc.center) * Vec2::new(aspect, 1.0) / disc.radius;
        let d2 = offset.length_squared();
        if d2 <= 1.0 {
            // Shade as a sphere seen head-on.
            let normal = Vec3::new(offset.x, -offset.y, (1.0 - d2).sqrt());
            let lambert = normal.dot(light).max(0.0);
            return disc.albedo * (0.08 + 0.92 * lambert);
        }
    }

    const HORIZON: f32 = 0.58;
    if uv.y < HORIZON {
        let t = uv.y / HORIZON;
        Vec3::new(0.55, 0.7, 0.95).lerp(Vec3::new(0.9, 0.92, 0.95), t)
    } else {
        let t = (uv.y - HORIZON) / (1.0 - HORIZON);
        Vec3::new(0.35, 0.3, 0.22).lerp(Vec3::new(0.12, 0.1, 0.08), t)
    }
}
