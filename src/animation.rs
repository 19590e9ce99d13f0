//! Frame clock and the per-visual animation handle.
//!
//! Frames are never driven by a loop inside the visual. The host calls
//! back once per display refresh with the handle it issued; the visual
//! accepts the callback only if that handle is still the one it holds.

use std::cell::Cell;
use std::rc::Rc;

use crate::error::VisualError;
use crate::lifecycle::Host;

/// Token for one pending frame callback registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnimationHandle(pub u64);

/// Monotonic elapsed-time source, in seconds.
pub trait FrameClock {
    fn elapsed(&self) -> f64;
}

/// Clock advanced explicitly. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, seconds: f64) {
        debug_assert!(seconds >= self.now.get(), "clock must be monotonic");
        self.now.set(seconds.max(self.now.get()));
    }

    pub fn advance(&self, seconds: f64) {
        self.set(self.now.get() + seconds.max(0.0));
    }
}

impl FrameClock for ManualClock {
    fn elapsed(&self) -> f64 {
        self.now.get()
    }
}

/// Tracks the single outstanding frame registration of one visual.
#[derive(Debug, Default)]
pub struct FrameLoop {
    active: Option<AnimationHandle>,
    frames: u64,
}

impl FrameLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<AnimationHandle> {
        self.active
    }

    /// Frames accepted since the loop was created.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Ask the host for the next frame. Any registration still held is
    /// cancelled first so at most one is ever outstanding.
    pub fn schedule<H: Host>(&mut self, host: &mut H) -> Result<AnimationHandle, VisualError> {
        self.cancel(host);
        let handle = host.request_frame()?;
        self.active = Some(handle);
        log::trace!("frame requested: {:?}", handle);
        Ok(handle)
    }

    /// Consume a callback. Returns false for a handle that is not the
    /// outstanding one (cancelled or superseded).
    pub fn accept(&mut self, handle: AnimationHandle) -> bool {
        if self.active != Some(handle) {
            return false;
        }
        self.active = None;
        self.frames += 1;
        true
    }

    /// Cancel the outstanding registration, if any.
    pub fn cancel<H: Host>(&mut self, host: &mut H) -> Option<AnimationHandle> {
        let handle = self.active.take()?;
        host.cancel_frame(handle);
        log::trace!("frame cancelled: {:?}", handle);
        Some(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_is_shared_and_monotonic() {
        let clock = ManualClock::new();
        let other = clock.clone();
        clock.advance(0.5);
        other.advance(0.25);
        assert!((clock.elapsed() - 0.75).abs() < 1e-12);

        clock.advance(-1.0);
        assert!((clock.elapsed() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_accept_only_current_handle() {
        let mut frames = FrameLoop::new();
        assert!(!frames.accept(AnimationHandle(1)));

        frames.active = Some(AnimationHandle(2));
        assert!(!frames.accept(AnimationHandle(1)));
        assert!(frames.accept(AnimationHandle(2)));
        assert!(!frames.accept(AnimationHandle(2)));
        assert_eq!(frames.frames(), 1);
        assert_eq!(frames.active(), None);
    }
}
