//! Perspective camera bound to each scene.
//!
//! The camera sits at a fixed distance on +Z looking at the origin. Only
//! the aspect ratio changes after assembly (see [`crate::viewport`]).

use crate::config::CameraSettings;

#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    /// Vertical field of view in degrees.
    pub fov: f32,
    aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: glam::Vec3,
    pub target: glam::Vec3,
    pub up: glam::Vec3,
}

impl PerspectiveCamera {
    pub fn new(settings: &CameraSettings, aspect: f32) -> Self {
        Self {
            fov: settings.fov,
            aspect,
            near: settings.near,
            far: settings.far,
            position: glam::Vec3::new(0.0, 0.0, settings.distance),
            target: glam::Vec3::ZERO,
            up: glam::Vec3::Y,
        }
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Update the aspect ratio. Non-finite or non-positive ratios (a
    /// zero-height viewport) keep the previous value.
    pub fn set_aspect(&mut self, aspect: f32) -> bool {
        if !aspect.is_finite() || aspect <= 0.0 {
            return false;
        }
        self.aspect = aspect;
        true
    }

    pub fn view_matrix(&self) -> glam::Mat4 {
        glam::Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> glam::Mat4 {
        glam::Mat4::perspective_rh(self.fov.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection_matrix(&self) -> glam::Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Whether a world-space point lies between the near and far planes.
    pub fn within_clip_range(&self, point: glam::Vec3) -> bool {
        let forward = (self.target - self.position).normalize_or_zero();
        let depth = (point - self.position).dot(forward);
        depth >= self.near && depth <= self.far
    }
}
