//! The drawing surface contract shared by the browser canvas, the
//! offscreen renderer and test doubles.

use crate::camera::PerspectiveCamera;
use crate::error::VisualError;
use crate::scene_graph::Scene;
use crate::viewport::Viewport;

/// Creation options for a drawing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceOptions {
    /// Clear to transparent so the visual composites over page content.
    pub transparent: bool,
    pub antialias: bool,
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self {
            transparent: true,
            antialias: true,
        }
    }
}

/// A rendering target bound to one container.
///
/// `attach` and `detach` are idempotent: they return whether anything
/// changed, and a redundant call is a no-op.
pub trait DrawingSurface {
    /// Insert the surface's output into its container.
    fn attach(&mut self) -> bool;

    /// Remove the surface's output from its container.
    fn detach(&mut self) -> bool;

    fn is_attached(&self) -> bool;

    fn resize(&mut self, viewport: Viewport);

    /// Current size in physical pixels.
    fn size(&self) -> Viewport;

    /// Issue one synchronous draw of the scene.
    fn render_frame(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> Result<(), VisualError>;

    /// Free GPU and DOM resources. The surface draws nothing afterwards.
    fn release(&mut self);
}
