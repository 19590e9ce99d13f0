//! Scene lights: one uniform ambient term and one point light placed
//! off-axis so meshes get relief.
//!
//! "Lighting is a depth cue, not a physical simulation." There is no
//! attenuation and no shadowing.

use bytemuck::{Pod, Zeroable};

use crate::config::LightingSettings;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    /// Linear RGB.
    pub color: [f32; 3],
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    /// Linear RGB.
    pub color: [f32; 3],
    pub intensity: f32,
    pub position: glam::Vec3,
}

/// The two lights every scene carries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightRig {
    pub ambient: AmbientLight,
    pub point: PointLight,
}

impl LightRig {
    pub fn from_settings(settings: &LightingSettings) -> Self {
        Self {
            ambient: AmbientLight {
                color: settings.ambient_color.to_linear(),
                intensity: settings.ambient_intensity,
            },
            point: PointLight {
                color: settings.point_color.to_linear(),
                intensity: settings.point_intensity,
                position: glam::Vec3::from_array(settings.point_position),
            },
        }
    }

    /// Pre-multiply intensities into GPU-ready uniforms.
    pub fn to_uniforms(&self) -> LightingUniforms {
        let scaled = |color: [f32; 3], intensity: f32| {
            [color[0] * intensity, color[1] * intensity, color[2] * intensity, 0.0]
        };
        let p = self.point.position;
        LightingUniforms {
            ambient: scaled(self.ambient.color, self.ambient.intensity),
            point_position: [p.x, p.y, p.z, 1.0],
            point_color: scaled(self.point.color, self.point.intensity),
        }
    }
}

impl Default for LightRig {
    fn default() -> Self {
        Self::from_settings(&LightingSettings::default())
    }
}

/// GPU-ready lighting uniforms. 48 bytes, 16-byte aligned.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct LightingUniforms {
    /// Ambient colour * intensity (rgb), w unused.
    pub ambient: [f32; 4],
    /// Point light position (xyz), w = 1.
    pub point_position: [f32; 4],
    /// Point light colour * intensity (rgb), w unused.
    pub point_color: [f32; 4],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Color;

    #[test]
    fn test_default_rig() {
        let uniforms = LightRig::default().to_uniforms();
        // White ambient at 0.5
        assert!((uniforms.ambient[0] - 0.5).abs() < 1e-6);
        assert!((uniforms.ambient[2] - 0.5).abs() < 1e-6);
        assert_eq!(uniforms.point_position, [2.0, 3.0, 4.0, 1.0]);
    }

    #[test]
    fn test_intensity_scales_color() {
        let settings = LightingSettings {
            point_color: Color::WHITE,
            point_intensity: 2.0,
            ..LightingSettings::default()
        };
        let uniforms = LightRig::from_settings(&settings).to_uniforms();
        assert!((uniforms.point_color[1] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_uniforms_size() {
        assert_eq!(std::mem::size_of::<LightingUniforms>(), 48);
    }
}
