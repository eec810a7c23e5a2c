//! World-space view directions through the corners of the camera's far plane.
//!
//! The dither program reconstructs a per-pixel view ray by interpolating
//! these four directions across the screen, which keeps its pattern pinned
//! to the world instead of the screen as the camera turns.

use glam::{Vec2, Vec3, Vec4};

use crate::camera::Camera;
use crate::params::ShaderParameters;

/// Parameter names the corners are bound under, in corner order.
pub const CORNER_PARAMETER_NAMES: [&str; 4] = ["_BL", "_TL", "_TR", "_BR"];

/// Four unit direction vectors through the far-plane corners, in world
/// orientation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrustumCorners {
    pub bottom_left: Vec3,
    pub top_left: Vec3,
    pub top_right: Vec3,
    pub bottom_right: Vec3,
}

impl FrustumCorners {
    /// Project the viewport onto the far clip plane, rotate the corners into
    /// world orientation (translation is ignored) and normalize them.
    pub fn compute(camera: &Camera) -> Self {
        let extents = camera.far_plane_half_extents();
        let far = camera.far;

        let local = [
            Vec3::new(-extents.x, -extents.y, -far),
            Vec3::new(-extents.x, extents.y, -far),
            Vec3::new(extents.x, extents.y, -far),
            Vec3::new(extents.x, -extents.y, -far),
        ];
        let [bl, tl, tr, br] = local.map(|corner| (camera.rotation * corner).normalize_or_zero());

        Self {
            bottom_left: bl,
            top_left: tl,
            top_right: tr,
            bottom_right: br,
        }
    }

    /// The corners in bottom-left, top-left, top-right, bottom-right order.
    pub fn as_array(&self) -> [Vec3; 4] {
        [
            self.bottom_left,
            self.top_left,
            self.top_right,
            self.bottom_right,
        ]
    }

    /// View direction through a screen position. `uv` has its origin at the
    /// top-left corner, matching texture coordinates.
    pub fn direction_at(&self, uv: Vec2) -> Vec3 {
        let top = self.top_left.lerp(self.top_right, uv.x);
        let bottom = self.bottom_left.lerp(self.bottom_right, uv.x);
        top.lerp(bottom, uv.y).normalize_or_zero()
    }

    /// Bind the corners under `_BL`, `_TL`, `_TR`, `_BR` (w = 0).
    pub fn write_to(&self, params: &mut ShaderParameters) {
        for (name, corner) in CORNER_PARAMETER_NAMES.iter().zip(self.as_array()) {
            params.set_vector(name, corner.extend(0.0));
        }
    }

    /// Read corners back from a parameter set. Missing names read as zero.
    pub fn read_from(params: &ShaderParameters) -> Self {
        let [bl, tl, tr, br] =
            CORNER_PARAMETER_NAMES.map(|name| params.vector(name).unwrap_or(Vec4::ZERO).truncate());
        Self {
            bottom_left: bl,
            top_left: tl,
            top_right: tr,
            bottom_right: br,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Projection;
    use glam::{EulerRot, Quat, Vec4Swizzles};
    use std::f32::consts::FRAC_PI_3;

    const EPS: f32 = 1e-5;

    fn orientations() -> Vec<Quat> {
        let mut out = vec![Quat::IDENTITY];
        for i in 0..12 {
            let t = i as f32 * 0.61;
            out.push(Quat::from_euler(EulerRot::YXZ, t, (t * 1.7).sin(), t * 0.3));
        }
        out
    }

    #[test]
    fn test_corners_are_unit_length_for_any_orientation() {
        for rotation in orientations() {
            let camera = Camera {
                rotation,
                ..Camera::default()
            };
            for corner in FrustumCorners::compute(&camera).as_array() {
                assert!(
                    (corner.length() - 1.0).abs() < EPS,
                    "corner {corner:?} not unit length for {rotation:?}"
                );
            }
        }
    }

    #[test]
    fn test_identity_corner_order() {
        let corners = FrustumCorners::compute(&Camera::default());
        assert!(corners.bottom_left.x < 0.0 && corners.bottom_left.y < 0.0);
        assert!(corners.top_left.x < 0.0 && corners.top_left.y > 0.0);
        assert!(corners.top_right.x > 0.0 && corners.top_right.y > 0.0);
        assert!(corners.bottom_right.x > 0.0 && corners.bottom_right.y < 0.0);
        for corner in corners.as_array() {
            assert!(corner.z < 0.0, "corners must point forward (-Z)");
        }
    }

    #[test]
    fn test_identity_corners_match_analytic_values() {
        let camera = Camera::perspective(FRAC_PI_3, 16.0 / 9.0, 0.3, 1000.0);
        let corners = FrustumCorners::compute(&camera);

        let ty = (FRAC_PI_3 * 0.5).tan();
        let tx = ty * 16.0 / 9.0;
        let expected = Vec3::new(tx, ty, -1.0).normalize();

        assert!((corners.top_right - expected).length() < EPS);
        assert!((corners.bottom_left - expected * Vec3::new(-1.0, -1.0, 1.0)).length() < EPS);
        assert!((corners.top_left - expected * Vec3::new(-1.0, 1.0, 1.0)).length() < EPS);
        assert!((corners.bottom_right - expected * Vec3::new(1.0, -1.0, 1.0)).length() < EPS);
    }

    #[test]
    fn test_horizontal_spread_matches_horizontal_fov() {
        let camera = Camera::perspective(FRAC_PI_3, 16.0 / 9.0, 0.3, 1000.0);
        let corners = FrustumCorners::compute(&camera);

        // Project onto the horizontal plane and measure the left/right angle.
        let left = Vec3::new(corners.top_left.x, 0.0, corners.top_left.z).normalize();
        let right = Vec3::new(corners.top_right.x, 0.0, corners.top_right.z).normalize();
        let spread = left.angle_between(right);

        let expected = 2.0 * ((FRAC_PI_3 * 0.5).tan() * 16.0 / 9.0).atan();
        assert!(
            (spread - expected).abs() < 1e-4,
            "spread {spread} != horizontal fov {expected}"
        );
    }

    #[test]
    fn test_corners_agree_with_inverse_view_projection() {
        let camera = Camera {
            position: Vec3::new(4.0, -2.0, 9.0),
            rotation: Quat::from_euler(EulerRot::YXZ, 0.8, 0.25, 0.0),
            ..Camera::default()
        };
        let inv = camera.view_projection_matrix().inverse();
        let corners = FrustumCorners::compute(&camera);

        // Reverse-Z: the far plane sits at NDC z = 0.
        let ndc = [(-1.0, -1.0), (-1.0, 1.0), (1.0, 1.0), (1.0, -1.0)];
        for ((x, y), corner) in ndc.into_iter().zip(corners.as_array()) {
            let world = inv * Vec4::new(x, y, 0.0, 1.0);
            let point = world.xyz() / world.w;
            let direction = (point - camera.position).normalize();
            assert!(
                (direction - corner).length() < 1e-3,
                "ndc ({x}, {y}): {direction:?} vs {corner:?}"
            );
        }
    }

    #[test]
    fn test_translation_does_not_change_directions() {
        let a = Camera::default();
        let b = Camera {
            position: Vec3::new(100.0, -50.0, 3.0),
            ..Camera::default()
        };
        assert_eq!(FrustumCorners::compute(&a), FrustumCorners::compute(&b));
    }

    #[test]
    fn test_same_camera_twice_is_deterministic() {
        let camera = Camera {
            rotation: Quat::from_rotation_x(0.3),
            ..Camera::default()
        };
        assert_eq!(
            FrustumCorners::compute(&camera),
            FrustumCorners::compute(&camera)
        );
    }

    #[test]
    fn test_orthographic_corners() {
        let camera = Camera {
            projection: Projection::Orthographic {
                half_width: 3.0,
                half_height: 4.0,
            },
            far: 12.0,
            ..Camera::default()
        };
        let corners = FrustumCorners::compute(&camera);
        let expected = Vec3::new(3.0, 4.0, -12.0).normalize();
        assert!((corners.top_right - expected).length() < EPS);
    }

    #[test]
    fn test_direction_at_center_is_forward() {
        let camera = Camera {
            rotation: Quat::from_rotation_y(1.1),
            ..Camera::default()
        };
        let corners = FrustumCorners::compute(&camera);
        let center = corners.direction_at(Vec2::splat(0.5));
        assert!((center - camera.forward()).length() < 1e-4);
        assert!((corners.direction_at(Vec2::ZERO) - corners.top_left).length() < EPS);
        assert!((corners.direction_at(Vec2::ONE) - corners.bottom_right).length() < EPS);
    }

    #[test]
    fn test_parameter_round_trip_uses_fixed_names() {
        let corners = FrustumCorners::compute(&Camera::default());
        let mut params = ShaderParameters::new();
        corners.write_to(&mut params);

        assert_eq!(params.len(), 4);
        assert_eq!(params.vector("_TR"), Some(corners.top_right.extend(0.0)));
        assert_eq!(FrustumCorners::read_from(&params), corners);
    }
}
