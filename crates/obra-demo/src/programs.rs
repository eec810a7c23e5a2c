//! CPU counterparts of `shaders/dither.wgsl` and `shaders/threshold.wgsl`.

use std::f32::consts::PI;

use glam::{Vec3, Vec4};
use obra_render::{Fragment, FrustumCorners, PixelShader, ShaderParameters};

const LUMA: Vec3 = Vec3::new(0.2126, 0.7152, 0.0722);

const BAYER_4X4: [f32; 16] = [
    0.0, 8.0, 2.0, 10.0, //
    12.0, 4.0, 14.0, 6.0, //
    3.0, 11.0, 1.0, 9.0, //
    15.0, 7.0, 13.0, 5.0,
];

fn luminance(color: Vec4) -> f32 {
    color.truncate().dot(LUMA)
}

/// Ordered dither whose Bayer cells are anchored to world-space view angles.
#[derive(Clone, Copy, Debug)]
pub struct WorldSpaceDither {
    pub cells_per_radian: f32,
}

impl Default for WorldSpaceDither {
    fn default() -> Self {
        Self {
            cells_per_radian: 300.0,
        }
    }
}

impl WorldSpaceDither {
    /// Bayer threshold in (0, 1) for a view direction.
    pub fn threshold(&self, dir: Vec3) -> f32 {
        let yaw = dir.x.atan2(-dir.z) + PI;
        let pitch = dir.y.clamp(-1.0, 1.0).asin() + 0.5 * PI;
        let x = (yaw * self.cells_per_radian).floor() as u32 % 4;
        let y = (pitch * self.cells_per_radian).floor() as u32 % 4;
        (BAYER_4X4[(y * 4 + x) as usize] + 0.5) / 16.0
    }
}

impl PixelShader for WorldSpaceDither {
    fn name(&self) -> &str {
        "dither"
    }

    fn shade(&self, fragment: &Fragment<'_>, params: &ShaderParameters) -> Vec4 {
        let luma = luminance(fragment.sample(fragment.uv));
        let dir = FrustumCorners::read_from(params).direction_at(fragment.uv);
        if luma > self.threshold(dir) {
            Vec4::ONE
        } else {
            Vec4::W
        }
    }
}

/// Maps luminance to one of two palette colors.
#[derive(Clone, Copy, Debug)]
pub struct PaletteThreshold {
    pub dark: Vec4,
    pub light: Vec4,
}

impl Default for PaletteThreshold {
    fn default() -> Self {
        Self {
            dark: Vec4::new(0.2, 0.2, 0.1, 1.0),
            light: Vec4::new(0.9, 0.9, 0.75, 1.0),
        }
    }
}

impl PixelShader for PaletteThreshold {
    fn name(&self) -> &str {
        "threshold"
    }

    fn shade(&self, fragment: &Fragment<'_>, _params: &ShaderParameters) -> Vec4 {
        if luminance(fragment.sample(fragment.uv)) >= 0.5 {
            self.light
        } else {
            self.dark
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bayer_thresholds_cover_unit_interval() {
        let mut sorted = BAYER_4X4;
        sorted.sort_by(f32::total_cmp);
        let expected: Vec<f32> = (0..16).map(|i| i as f32).collect();
        assert_eq!(sorted.to_vec(), expected);
    }

    #[test]
    fn test_threshold_is_stable_for_same_direction() {
        let dither = WorldSpaceDither::default();
        let dir = Vec3::new(0.3, 0.2, -1.0).normalize();
        let t = dither.threshold(dir);
        assert!(t > 0.0 && t < 1.0);
        assert_eq!(t, dither.threshold(dir));
    }

    #[test]
    fn test_neighbouring_directions_use_different_cells() {
        let dither = WorldSpaceDither {
            cells_per_radian: 1.0,
        };
        // One radian of yaw apart lands in adjacent columns.
        let a = dither.threshold(Vec3::NEG_Z);
        let b = dither.threshold(Vec3::new(1.0_f32.sin(), 0.0, -1.0_f32.cos()));
        assert!((a - b).abs() > 1e-6);
    }
}
