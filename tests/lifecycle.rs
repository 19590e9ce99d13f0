//! Drive `SceneVisual` through mount, frames, resizes and teardown against a
//! host that records every call.
//!
//! Run with: cargo test --test lifecycle

use std::cell::RefCell;
use std::rc::Rc;

use section_visuals::animation::{AnimationHandle, FrameClock, ManualClock};
use section_visuals::camera::PerspectiveCamera;
use section_visuals::presets;
use section_visuals::scene_graph::Scene;
use section_visuals::surface::{DrawingSurface, SurfaceOptions};
use section_visuals::viewport::{ResizeSubscription, Viewport};
use section_visuals::{CallbackOutcome, Host, MountOutcome, Phase, SceneConfig, SceneVisual, VisualError};

#[derive(Debug, Clone, PartialEq)]
enum Event {
    SurfaceCreated(&'static str),
    Attached,
    Detached,
    Resized(Viewport),
    Drew,
    Released,
    FrameRequested(AnimationHandle),
    FrameCancelled(AnimationHandle),
    Subscribed(ResizeSubscription),
    Unsubscribed(ResizeSubscription),
}

type Log = Rc<RefCell<Vec<Event>>>;

struct RecordingSurface {
    log: Log,
    attached: bool,
    released: bool,
    size: Viewport,
    fail_render: bool,
}

impl DrawingSurface for RecordingSurface {
    fn attach(&mut self) -> bool {
        if self.attached {
            return false;
        }
        self.attached = true;
        self.log.borrow_mut().push(Event::Attached);
        true
    }

    fn detach(&mut self) -> bool {
        if !self.attached {
            return false;
        }
        self.attached = false;
        self.log.borrow_mut().push(Event::Detached);
        true
    }

    fn is_attached(&self) -> bool {
        self.attached
    }

    fn resize(&mut self, viewport: Viewport) {
        self.size = viewport;
        self.log.borrow_mut().push(Event::Resized(viewport));
    }

    fn size(&self) -> Viewport {
        self.size
    }

    fn render_frame(&mut self, scene: &Scene, _camera: &PerspectiveCamera) -> Result<(), VisualError> {
        assert!(!self.released, "drew on a released surface");
        assert!(!scene.is_released(), "drew a released scene");
        if self.fail_render {
            return Err(VisualError::render("context lost"));
        }
        self.log.borrow_mut().push(Event::Drew);
        Ok(())
    }

    fn release(&mut self) {
        assert!(!self.released, "surface released twice");
        self.released = true;
        self.log.borrow_mut().push(Event::Released);
    }
}

struct RecordingHost {
    log: Log,
    viewport: Viewport,
    clock: ManualClock,
    next_token: u64,
    pending: Option<AnimationHandle>,
    fail_surface: bool,
    fail_render: bool,
}

impl RecordingHost {
    fn new(viewport: Viewport) -> Self {
        Self {
            log: Rc::new(RefCell::new(Vec::new())),
            viewport,
            clock: ManualClock::new(),
            next_token: 0,
            pending: None,
            fail_surface: false,
            fail_render: false,
        }
    }

    fn token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }
}

impl Host for RecordingHost {
    type Container = &'static str;
    type Surface = RecordingSurface;
    type Clock = ManualClock;

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn clock(&self) -> &ManualClock {
        &self.clock
    }

    fn create_surface(
        &mut self,
        container: &'static str,
        viewport: Viewport,
        _options: SurfaceOptions,
    ) -> Result<RecordingSurface, VisualError> {
        if self.fail_surface {
            return Err(VisualError::resource("no drawing context"));
        }
        self.log.borrow_mut().push(Event::SurfaceCreated(container));
        Ok(RecordingSurface {
            log: self.log.clone(),
            attached: false,
            released: false,
            size: viewport,
            fail_render: self.fail_render,
        })
    }

    fn request_frame(&mut self) -> Result<AnimationHandle, VisualError> {
        let handle = AnimationHandle(self.token());
        self.pending = Some(handle);
        self.log.borrow_mut().push(Event::FrameRequested(handle));
        Ok(handle)
    }

    fn cancel_frame(&mut self, handle: AnimationHandle) {
        if self.pending == Some(handle) {
            self.pending = None;
        }
        self.log.borrow_mut().push(Event::FrameCancelled(handle));
    }

    fn subscribe_resize(&mut self) -> Result<ResizeSubscription, VisualError> {
        let subscription = ResizeSubscription(self.token());
        self.log.borrow_mut().push(Event::Subscribed(subscription));
        Ok(subscription)
    }

    fn unsubscribe_resize(&mut self, subscription: ResizeSubscription) {
        self.log.borrow_mut().push(Event::Unsubscribed(subscription));
    }
}

fn scatter_config() -> SceneConfig {
    SceneConfig::from_json(
        r##"{
            "name": "scatter",
            "groups": [{
                "shape": { "type": "box", "size": 0.3 },
                "count": 20,
                "layout": { "type": "sphere_surface", "radius": 4.0 },
                "palette": ["#8b5cf6"],
                "motion": { "spin": [0.0, 1.0, 0.0] }
            }]
        }"##,
    )
    .unwrap()
}

fn visual(config: SceneConfig) -> (SceneVisual<RecordingHost>, Log) {
    let host = RecordingHost::new(Viewport::new(1024, 768));
    let log = host.log.clone();
    (SceneVisual::new(config, host), log)
}

/// Advance the clock and deliver the pending frame callback.
fn pump(visual: &mut SceneVisual<RecordingHost>, dt: f64) -> CallbackOutcome {
    let handle = visual.host_mut().pending.take().expect("no frame pending");
    visual.host().clock.advance(dt);
    visual.on_frame(handle)
}

fn count(log: &Log, event: &Event) -> usize {
    log.borrow().iter().filter(|e| *e == event).count()
}

fn draws(log: &Log) -> usize {
    count(log, &Event::Drew)
}

#[test]
fn test_mount_draws_and_schedules() {
    let (mut visual, log) = visual(scatter_config());
    assert_eq!(visual.mount(Some("#about")).unwrap(), MountOutcome::Mounted);
    assert_eq!(visual.phase(), Phase::Running);

    let events = log.borrow().clone();
    assert_eq!(events[0], Event::SurfaceCreated("#about"));
    assert_eq!(events[1], Event::Attached);
    assert_eq!(events[2], Event::Drew);
    assert!(matches!(events[3], Event::Subscribed(_)));
    assert!(matches!(events[4], Event::FrameRequested(_)));
    assert_eq!(visual.frames_rendered(), 1);
    assert_eq!(visual.active_frame(), visual.host().pending);
}

#[test]
fn test_twenty_elements_on_sphere_then_release() {
    let (mut visual, log) = visual(scatter_config());
    visual.mount(Some("#skills")).unwrap();

    let scene = visual.scene().unwrap();
    assert_eq!(scene.primary_elements().count(), 20);
    for element in scene.primary_elements() {
        assert!((element.rest.position.length() - 4.0).abs() < 1e-4);
    }
    let counts = visual.ledger().counts();
    assert_eq!(counts.geometries_allocated, 20);
    assert_eq!(counts.materials_allocated, 20);

    assert_eq!(pump(&mut visual, 1.0 / 60.0), CallbackOutcome::Applied);
    let active = visual.active_frame().unwrap();
    assert!(visual.unmount());

    assert!(visual.ledger().counts().is_balanced());
    assert_eq!(visual.ledger().counts().geometries_released, 20);
    assert_eq!(count(&log, &Event::FrameCancelled(active)), 1);
    assert_eq!(count(&log, &Event::Detached), 1);
    assert_eq!(visual.host().pending, None);
    assert!(visual.scene().is_none());
}

#[test]
fn test_teardown_order() {
    let (mut visual, log) = visual(scatter_config());
    visual.mount(Some("#contact")).unwrap();
    let mounted_events = log.borrow().len();
    let active = visual.active_frame().unwrap();

    assert!(visual.unmount());
    assert_eq!(visual.phase(), Phase::Unmounted);

    let teardown: Vec<Event> = log.borrow()[mounted_events..].to_vec();
    assert_eq!(teardown.len(), 4);
    assert_eq!(teardown[0], Event::FrameCancelled(active));
    assert!(matches!(teardown[1], Event::Unsubscribed(_)));
    assert_eq!(teardown[2], Event::Detached);
    assert_eq!(teardown[3], Event::Released);
}

#[test]
fn test_callbacks_after_teardown_are_ignored() {
    let (mut visual, log) = visual(scatter_config());
    visual.mount(Some("#about")).unwrap();
    let handle = visual.active_frame().unwrap();
    visual.unmount();

    let before = log.borrow().len();
    assert_eq!(visual.on_frame(handle), CallbackOutcome::StaleCallbackIgnored);
    assert_eq!(visual.on_resize(Viewport::new(500, 500)), CallbackOutcome::StaleCallbackIgnored);
    assert_eq!(log.borrow().len(), before);
    assert!(visual.ledger().counts().is_balanced());
}

#[test]
fn test_superseded_frame_is_ignored() {
    let (mut visual, log) = visual(scatter_config());
    visual.mount(Some("#about")).unwrap();
    let first = visual.active_frame().unwrap();

    assert_eq!(pump(&mut visual, 0.1), CallbackOutcome::Applied);
    let second = visual.active_frame().unwrap();
    assert_ne!(first, second);

    let drawn = draws(&log);
    assert_eq!(visual.on_frame(first), CallbackOutcome::StaleCallbackIgnored);
    assert_eq!(draws(&log), drawn);
    assert_eq!(visual.active_frame(), Some(second));
}

#[test]
fn test_single_outstanding_frame() {
    let (mut visual, log) = visual(scatter_config());
    visual.mount(Some("#about")).unwrap();
    for _ in 0..10 {
        pump(&mut visual, 1.0 / 60.0);
    }
    let requested = log
        .borrow()
        .iter()
        .filter(|e| matches!(e, Event::FrameRequested(_)))
        .count();
    assert_eq!(requested, 11);
    assert_eq!(visual.frames_rendered(), 11);
    assert!(visual.active_frame().is_some());
}

#[test]
fn test_frames_follow_the_clock() {
    let (mut visual, _log) = visual(scatter_config());
    visual.mount(Some("#about")).unwrap();
    let before = visual.scene().unwrap().primary_elements().next().unwrap().transform;

    pump(&mut visual, 0.5);
    let element = visual.scene().unwrap().primary_elements().next().unwrap();
    assert!((element.transform.rotation.y - before.rotation.y - 0.5).abs() < 1e-5);
    assert_eq!(element.transform.position, element.rest.position);
    assert!((visual.host().clock().elapsed() - 0.5).abs() < 1e-12);
}

#[test]
fn test_resize_updates_camera_and_surface() {
    let (mut visual, log) = visual(scatter_config());
    visual.mount(Some("#about")).unwrap();
    assert!((visual.camera().unwrap().aspect() - 1024.0 / 768.0).abs() < 1e-6);

    assert_eq!(visual.on_resize(Viewport::new(500, 500)), CallbackOutcome::Applied);
    assert_eq!(visual.camera().unwrap().aspect(), 1.0);
    assert_eq!(visual.surface().unwrap().size(), Viewport::new(500, 500));

    visual.on_resize(Viewport::new(1920, 1080));
    assert_eq!(visual.camera().unwrap().aspect(), 1920.0 / 1080.0);
    assert_eq!(visual.surface().unwrap().size(), Viewport::new(1920, 1080));
    assert_eq!(count(&log, &Event::Resized(Viewport::new(1920, 1080))), 1);
}

#[test]
fn test_degenerate_resize_keeps_aspect() {
    let (mut visual, _log) = visual(scatter_config());
    visual.mount(Some("#about")).unwrap();
    let aspect = visual.camera().unwrap().aspect();

    assert_eq!(visual.on_resize(Viewport::new(800, 0)), CallbackOutcome::Applied);
    assert_eq!(visual.camera().unwrap().aspect(), aspect);
}

#[test]
fn test_missing_container_skips_initialization() {
    let (mut visual, log) = visual(scatter_config());
    assert_eq!(visual.mount(None).unwrap(), MountOutcome::InitializationSkipped);
    assert_eq!(visual.phase(), Phase::Unmounted);
    assert_eq!(visual.ledger().counts().outstanding(), 0);
    assert_eq!(visual.ledger().counts().geometries_allocated, 0);
    assert!(log.borrow().is_empty());
    assert!(!visual.unmount());
}

#[test]
fn test_surface_failure_releases_scene() {
    let (mut visual, log) = visual(scatter_config());
    visual.host_mut().fail_surface = true;

    let err = visual.mount(Some("#about")).unwrap_err();
    assert!(matches!(err, VisualError::ResourceCreation(_)));
    assert_eq!(visual.phase(), Phase::Unmounted);

    let counts = visual.ledger().counts();
    assert_eq!(counts.geometries_allocated, 20);
    assert!(counts.is_balanced());
    assert!(log.borrow().is_empty());

    // The page can try again once a context is available.
    visual.host_mut().fail_surface = false;
    assert_eq!(visual.mount(Some("#about")).unwrap(), MountOutcome::Mounted);
}

#[test]
fn test_initial_render_failure_tears_down() {
    let (mut visual, log) = visual(scatter_config());
    visual.host_mut().fail_render = true;

    let err = visual.mount(Some("#about")).unwrap_err();
    assert!(matches!(err, VisualError::Render(_)));
    assert_eq!(visual.phase(), Phase::Unmounted);
    assert!(visual.ledger().counts().is_balanced());
    assert_eq!(count(&log, &Event::Attached), 1);
    assert_eq!(count(&log, &Event::Detached), 1);
    assert_eq!(count(&log, &Event::Released), 1);
    assert_eq!(visual.host().pending, None);
}

#[test]
fn test_invalid_config_is_rejected_before_allocation() {
    let mut config = scatter_config();
    config.groups[0].palette.clear();
    let (mut visual, log) = visual(config);

    assert!(matches!(visual.mount(Some("#about")), Err(VisualError::InvalidConfig(_))));
    assert_eq!(visual.ledger().counts().geometries_allocated, 0);
    assert!(log.borrow().is_empty());
}

#[test]
fn test_mount_twice_is_noop() {
    let (mut visual, log) = visual(scatter_config());
    visual.mount(Some("#about")).unwrap();
    assert_eq!(visual.mount(Some("#other")).unwrap(), MountOutcome::AlreadyMounted);
    assert_eq!(count(&log, &Event::SurfaceCreated("#other")), 0);
    assert_eq!(visual.ledger().counts().geometries_allocated, 20);
}

#[test]
fn test_unmount_twice_detaches_once() {
    let (mut visual, log) = visual(scatter_config());
    visual.mount(Some("#about")).unwrap();
    assert!(visual.unmount());
    assert!(!visual.unmount());
    assert_eq!(count(&log, &Event::Detached), 1);
    assert_eq!(count(&log, &Event::Released), 1);
}

#[test]
fn test_remount_cycles_stay_balanced() {
    let (mut visual, log) = visual(scatter_config());
    for cycle in 1..=3 {
        assert_eq!(visual.mount(Some("#projects")).unwrap(), MountOutcome::Mounted);
        pump(&mut visual, 1.0 / 30.0);
        assert!(visual.unmount());

        let counts = visual.ledger().counts();
        assert!(counts.is_balanced());
        assert_eq!(counts.geometries_allocated, 20 * cycle);
    }
    assert_eq!(count(&log, &Event::Attached), 3);
    assert_eq!(count(&log, &Event::Detached), 3);
}

#[test]
fn test_drop_unmounts() {
    let (mut visual, log) = visual(scatter_config());
    visual.mount(Some("#about")).unwrap();
    let ledger = visual.ledger().clone();
    assert!(ledger.counts().outstanding() > 0);

    drop(visual);
    assert!(ledger.counts().is_balanced());
    assert_eq!(count(&log, &Event::Released), 1);
}

#[test]
fn test_every_preset_mounts_and_releases() {
    for config in presets::all() {
        let name = config.name.clone();
        let (mut visual, _log) = visual(config);
        assert_eq!(visual.mount(Some("#section")).unwrap(), MountOutcome::Mounted, "{name}");
        for _ in 0..3 {
            assert_eq!(pump(&mut visual, 1.0 / 60.0), CallbackOutcome::Applied, "{name}");
        }
        visual.unmount();
        let counts = visual.ledger().counts();
        assert!(counts.geometries_allocated > 0, "{name}");
        assert!(counts.is_balanced(), "{name}: {counts:?}");
    }
}
