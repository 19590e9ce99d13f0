//! Mount/unmount state machine for one section visual.
//!
//! ```text
//! Unmounted -> Initializing -> Running -> TearingDown -> Unmounted
//! ```
//!
//! A [`SceneVisual`] owns its host bindings, and while running its scene,
//! camera, surface, frame registration and resize subscription. Teardown
//! is synchronous: when [`SceneVisual::unmount`] returns, no frame or
//! resize callback can reach the released resources.

use std::fmt;

use crate::animation::{AnimationHandle, FrameClock, FrameLoop};
use crate::camera::PerspectiveCamera;
use crate::config::SceneConfig;
use crate::error::VisualError;
use crate::factory;
use crate::resource::ResourceLedger;
use crate::scene_graph::{assemble, Scene};
use crate::surface::{DrawingSurface, SurfaceOptions};
use crate::viewport::{ResizeSubscription, Viewport, ViewportAdapter};

/// The environment a visual runs in: container, display refresh and
/// viewport signals.
pub trait Host {
    /// What the page hands over at mount time.
    type Container;
    type Surface: DrawingSurface;
    type Clock: FrameClock;

    fn viewport(&self) -> Viewport;

    fn clock(&self) -> &Self::Clock;

    fn create_surface(
        &mut self,
        container: Self::Container,
        viewport: Viewport,
        options: SurfaceOptions,
    ) -> Result<Self::Surface, VisualError>;

    /// Register a callback for the next display refresh.
    fn request_frame(&mut self) -> Result<AnimationHandle, VisualError>;

    fn cancel_frame(&mut self, handle: AnimationHandle);

    fn subscribe_resize(&mut self) -> Result<ResizeSubscription, VisualError>;

    fn unsubscribe_resize(&mut self, subscription: ResizeSubscription);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unmounted,
    Initializing,
    Running,
    TearingDown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Unmounted => "unmounted",
            Phase::Initializing => "initializing",
            Phase::Running => "running",
            Phase::TearingDown => "tearing-down",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountOutcome {
    Mounted,
    /// No container was available; nothing was allocated.
    InitializationSkipped,
    /// The visual is already running; nothing changed.
    AlreadyMounted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    Applied,
    /// The callback arrived for a visual that is no longer running, or for
    /// a registration that was cancelled. Nothing was touched.
    StaleCallbackIgnored,
}

/// Everything a running visual owns.
struct Mounted<S> {
    scene: Scene,
    camera: PerspectiveCamera,
    surface: S,
    frames: FrameLoop,
    viewport: ViewportAdapter,
}

pub struct SceneVisual<H: Host> {
    config: SceneConfig,
    host: H,
    ledger: ResourceLedger,
    phase: Phase,
    mounted: Option<Mounted<H::Surface>>,
    frames_rendered: u64,
}

impl<H: Host> SceneVisual<H> {
    pub fn new(config: SceneConfig, host: H) -> Self {
        Self {
            config,
            host,
            ledger: ResourceLedger::new(),
            phase: Phase::Unmounted,
            mounted: None,
            frames_rendered: 0,
        }
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Allocation totals across every mount of this visual.
    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    pub fn active_frame(&self) -> Option<AnimationHandle> {
        self.mounted.as_ref().and_then(|m| m.frames.active())
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.mounted.as_ref().map(|m| &m.scene)
    }

    pub fn camera(&self) -> Option<&PerspectiveCamera> {
        self.mounted.as_ref().map(|m| &m.camera)
    }

    pub fn surface(&self) -> Option<&H::Surface> {
        self.mounted.as_ref().map(|m| &m.surface)
    }

    /// Frames drawn across every mount, including initial frames.
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    fn set_phase(&mut self, phase: Phase) {
        log::debug!("{}: {} -> {}", self.config.name, self.phase, phase);
        self.phase = phase;
    }

    /// Build, attach and start the visual in `container`.
    ///
    /// A missing container is not an error: the visual stays unmounted and
    /// allocates nothing. On failure every resource allocated so far is
    /// released, the visual is left unmounted and the error is returned.
    pub fn mount(&mut self, container: Option<H::Container>) -> Result<MountOutcome, VisualError> {
        if self.phase != Phase::Unmounted {
            return Ok(MountOutcome::AlreadyMounted);
        }
        let Some(container) = container else {
            log::info!("{}: no container, skipping initialization", self.config.name);
            return Ok(MountOutcome::InitializationSkipped);
        };

        self.set_phase(Phase::Initializing);
        match self.initialize(container) {
            Ok(mounted) => {
                self.mounted = Some(mounted);
                self.set_phase(Phase::Running);
                log::info!(
                    "{}: mounted ({} resources allocated)",
                    self.config.name,
                    self.ledger.counts().outstanding()
                );
                Ok(MountOutcome::Mounted)
            }
            Err(err) => {
                log::warn!("{}: mount failed: {}", self.config.name, err);
                self.set_phase(Phase::Unmounted);
                Err(err)
            }
        }
    }

    fn initialize(&mut self, container: H::Container) -> Result<Mounted<H::Surface>, VisualError> {
        let elements = factory::build_elements(&self.config, &self.ledger, &mut rand::rng())?;
        let viewport = self.host.viewport();
        let (mut scene, camera) = assemble(elements, &self.config, viewport);

        let surface = match self.host.create_surface(container, viewport, SurfaceOptions::default()) {
            Ok(surface) => surface,
            Err(err) => {
                scene.release_all();
                return Err(err);
            }
        };

        let mut mounted = Mounted {
            scene,
            camera,
            surface,
            frames: FrameLoop::new(),
            viewport: ViewportAdapter::default(),
        };
        if let Err(err) = self.start(&mut mounted) {
            self.dismantle(mounted);
            return Err(err);
        }
        Ok(mounted)
    }

    /// Attach, draw the initial frame, subscribe to resizes and register
    /// the first frame callback.
    fn start(&mut self, mounted: &mut Mounted<H::Surface>) -> Result<(), VisualError> {
        mounted.surface.attach();

        mounted.scene.advance_to(self.host.clock().elapsed());
        mounted.surface.render_frame(&mounted.scene, &mounted.camera)?;
        self.frames_rendered += 1;

        mounted.viewport = ViewportAdapter::new(self.host.subscribe_resize()?);
        mounted.frames.schedule(&mut self.host)?;
        Ok(())
    }

    /// Display-refresh callback for the registration `handle`.
    pub fn on_frame(&mut self, handle: AnimationHandle) -> CallbackOutcome {
        if self.phase != Phase::Running {
            log::debug!("{}: frame {:?} after teardown ignored", self.config.name, handle);
            return CallbackOutcome::StaleCallbackIgnored;
        }
        let Some(mounted) = self.mounted.as_mut() else {
            return CallbackOutcome::StaleCallbackIgnored;
        };
        if !mounted.frames.accept(handle) {
            log::debug!("{}: superseded frame {:?} ignored", self.config.name, handle);
            return CallbackOutcome::StaleCallbackIgnored;
        }

        let t = self.host.clock().elapsed();
        mounted.scene.advance_to(t);
        match mounted.surface.render_frame(&mounted.scene, &mounted.camera) {
            Ok(()) => self.frames_rendered += 1,
            Err(err) => log::warn!("{}: frame at t={:.3}s not drawn: {}", self.config.name, t, err),
        }
        log::trace!("{}: frame at t={:.3}s", self.config.name, t);

        if let Err(err) = mounted.frames.schedule(&mut self.host) {
            log::warn!("{}: animation stopped: {}", self.config.name, err);
        }
        CallbackOutcome::Applied
    }

    /// Viewport-resize callback.
    pub fn on_resize(&mut self, viewport: Viewport) -> CallbackOutcome {
        if self.phase != Phase::Running {
            log::debug!("{}: resize after teardown ignored", self.config.name);
            return CallbackOutcome::StaleCallbackIgnored;
        }
        let Some(mounted) = self.mounted.as_mut() else {
            return CallbackOutcome::StaleCallbackIgnored;
        };
        mounted.viewport.apply(viewport, &mut mounted.camera, &mut mounted.surface);
        CallbackOutcome::Applied
    }

    /// Tear down a running visual. Returns false if it was not running.
    pub fn unmount(&mut self) -> bool {
        if self.phase != Phase::Running {
            return false;
        }
        self.set_phase(Phase::TearingDown);
        if let Some(mounted) = self.mounted.take() {
            self.dismantle(mounted);
        }
        self.set_phase(Phase::Unmounted);

        let counts = self.ledger.counts();
        if counts.is_balanced() {
            log::info!("{}: unmounted, all resources released", self.config.name);
        } else {
            log::warn!("{}: unmounted with {} resources outstanding", self.config.name, counts.outstanding());
        }
        true
    }

    /// Teardown sequence, tolerant of partially started visuals.
    fn dismantle(&mut self, mut mounted: Mounted<H::Surface>) {
        mounted.frames.cancel(&mut self.host);
        if let Some(subscription) = mounted.viewport.take_subscription() {
            self.host.unsubscribe_resize(subscription);
        }
        mounted.surface.detach();
        mounted.surface.release();
        let released = mounted.scene.release_all();
        log::debug!("{}: released {} resources", self.config.name, released);
    }
}

impl<H: Host> Drop for SceneVisual<H> {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl<H: Host> fmt::Debug for SceneVisual<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneVisual")
            .field("name", &self.config.name)
            .field("phase", &self.phase)
            .field("active_frame", &self.active_frame())
            .field("resources", &self.ledger.counts())
            .finish()
    }
}
