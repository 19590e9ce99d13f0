//! Viewport dimensions and the resize side-channel.

use crate::camera::PerspectiveCamera;
use crate::surface::DrawingSurface;

/// Viewport size in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height. Infinite or NaN for a zero height; the camera
    /// ignores such values.
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether both sides are at most `max_dimension`, the device's
    /// largest texture edge.
    pub fn fits_within(&self, max_dimension: u32) -> bool {
        self.width <= max_dimension && self.height <= max_dimension
    }

    /// Each side capped at `max_dimension`.
    pub fn clamped(&self, max_dimension: u32) -> Viewport {
        Viewport::new(self.width.min(max_dimension), self.height.min(max_dimension))
    }
}

/// Token for one resize subscription with the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResizeSubscription(pub u64);

/// Keeps camera and surface in step with the viewport. The only state is
/// the host subscription.
#[derive(Debug, Default)]
pub struct ViewportAdapter {
    subscription: Option<ResizeSubscription>,
}

impl ViewportAdapter {
    pub fn new(subscription: ResizeSubscription) -> Self {
        Self {
            subscription: Some(subscription),
        }
    }

    pub fn subscription(&self) -> Option<ResizeSubscription> {
        self.subscription
    }

    /// Forget the subscription, handing it back for the host to drop.
    pub fn take_subscription(&mut self) -> Option<ResizeSubscription> {
        self.subscription.take()
    }

    /// Recompute the camera aspect and resize the surface.
    pub fn apply(&self, viewport: Viewport, camera: &mut PerspectiveCamera, surface: &mut dyn DrawingSurface) {
        if !camera.set_aspect(viewport.aspect()) {
            log::debug!("ignoring aspect of degenerate viewport {}x{}", viewport.width, viewport.height);
        }
        surface.resize(viewport);
        log::debug!("viewport resized to {}x{}", viewport.width, viewport.height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect() {
        assert_eq!(Viewport::new(500, 500).aspect(), 1.0);
        assert!((Viewport::new(1024, 768).aspect() - 4.0 / 3.0).abs() < 1e-6);
        assert!(Viewport::new(800, 0).is_empty());
        assert!(!Viewport::new(800, 0).aspect().is_finite());
    }

    #[test]
    fn test_device_limit() {
        let viewport = Viewport::new(20000, 600);
        assert!(!viewport.fits_within(8192));
        assert!(Viewport::new(8192, 8192).fits_within(8192));
        assert_eq!(viewport.clamped(8192), Viewport::new(8192, 600));
        assert_eq!(Viewport::new(800, 600).clamped(8192), Viewport::new(800, 600));
    }

    #[test]
    fn test_take_subscription_once() {
        let mut adapter = ViewportAdapter::new(ResizeSubscription(3));
        assert_eq!(adapter.subscription(), Some(ResizeSubscription(3)));
        assert_eq!(adapter.take_subscription(), Some(ResizeSubscription(3)));
        assert_eq!(adapter.take_subscription(), None);
    }
}
