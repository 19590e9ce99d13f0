//! Browser binding: a canvas host driven by `requestAnimationFrame` and the
//! window `resize` event.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{HtmlCanvasElement, HtmlElement};

use crate::animation::{AnimationHandle, FrameClock};
use crate::camera::PerspectiveCamera;
use crate::config::SceneConfig;
use crate::error::VisualError;
use crate::gpu::context::{self, GpuContext};
use crate::gpu::renderer::SceneRenderer;
use crate::lifecycle::{Host, MountOutcome, Phase, SceneVisual};
use crate::presets;
use crate::scene_graph::Scene;
use crate::surface::{DrawingSurface, SurfaceOptions};
use crate::viewport::{ResizeSubscription, Viewport};

type SharedVisual = Rc<RefCell<SceneVisual<WebHost>>>;

#[wasm_bindgen]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);
}

fn js_error(e: JsValue) -> String {
    e.as_string().unwrap_or_else(|| format!("{:?}", e))
}

fn window() -> Result<web_sys::Window, VisualError> {
    web_sys::window().ok_or_else(|| VisualError::resource("no window"))
}

/// Seconds since the host was created, from `performance.now()`.
pub struct PerformanceClock {
    performance: Option<web_sys::Performance>,
    origin_ms: f64,
}

impl PerformanceClock {
    fn new(window: &web_sys::Window) -> Self {
        let performance = window.performance();
        let origin_ms = performance.as_ref().map(|p| p.now()).unwrap_or(0.0);
        Self { performance, origin_ms }
    }
}

impl FrameClock for PerformanceClock {
    fn elapsed(&self) -> f64 {
        self.performance
            .as_ref()
            .map(|p| (p.now() - self.origin_ms) / 1000.0)
            .unwrap_or(0.0)
    }
}

/// The page: window refresh, window size and DOM containers.
///
/// The frame and resize closures live as long as the host and reach the
/// visual through a weak reference, so a visual that has been freed is
/// never called back.
pub struct WebHost {
    window: web_sys::Window,
    clock: PerformanceClock,
    frame_callback: Closure<dyn FnMut(f64)>,
    resize_callback: Closure<dyn FnMut()>,
    next_token: u64,
    pending_frame: Option<(AnimationHandle, i32)>,
    resize_subscription: Option<ResizeSubscription>,
}

impl WebHost {
    fn new(window: web_sys::Window, visual: Weak<RefCell<SceneVisual<WebHost>>>) -> Self {
        let frame_visual = visual.clone();
        let frame_callback = Closure::wrap(Box::new(move |_timestamp: f64| {
            let Some(visual) = frame_visual.upgrade() else {
                return;
            };
            let Ok(mut visual) = visual.try_borrow_mut() else {
                log::warn!("frame callback re-entered; dropped");
                return;
            };
            if let Some((handle, _)) = visual.host_mut().pending_frame.take() {
                visual.on_frame(handle);
            }
        }) as Box<dyn FnMut(f64)>);

        let resize_window = window.clone();
        let resize_callback = Closure::wrap(Box::new(move || {
            let Some(visual) = visual.upgrade() else {
                return;
            };
            let Ok(mut visual) = visual.try_borrow_mut() else {
                return;
            };
            visual.on_resize(window_viewport(&resize_window));
        }) as Box<dyn FnMut()>);

        Self {
            clock: PerformanceClock::new(&window),
            window,
            frame_callback,
            resize_callback,
            next_token: 0,
            pending_frame: None,
            resize_subscription: None,
        }
    }

    fn token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }
}

fn window_viewport(window: &web_sys::Window) -> Viewport {
    let dimension = |value: Result<JsValue, JsValue>| value.ok().and_then(|v| v.as_f64()).unwrap_or(0.0) as u32;
    Viewport::new(dimension(window.inner_width()), dimension(window.inner_height()))
}

impl Host for WebHost {
    type Container = PreparedCanvas;
    type Surface = CanvasSurface;
    type Clock = PerformanceClock;

    fn viewport(&self) -> Viewport {
        window_viewport(&self.window)
    }

    fn clock(&self) -> &PerformanceClock {
        &self.clock
    }

    fn create_surface(
        &mut self,
        container: PreparedCanvas,
        viewport: Viewport,
        options: SurfaceOptions,
    ) -> Result<CanvasSurface, VisualError> {
        CanvasSurface::new(container, viewport, options)
    }

    fn request_frame(&mut self) -> Result<AnimationHandle, VisualError> {
        let id = self
            .window
            .request_animation_frame(self.frame_callback.as_ref().unchecked_ref())
            .map_err(|e| VisualError::Host(js_error(e)))?;
        let handle = AnimationHandle(self.token());
        self.pending_frame = Some((handle, id));
        Ok(handle)
    }

    fn cancel_frame(&mut self, handle: AnimationHandle) {
        match self.pending_frame {
            Some((pending, id)) if pending == handle => {
                self.pending_frame = None;
                if let Err(e) = self.window.cancel_animation_frame(id) {
                    log::warn!("cancelAnimationFrame failed: {}", js_error(e));
                }
            }
            _ => {}
        }
    }

    fn subscribe_resize(&mut self) -> Result<ResizeSubscription, VisualError> {
        self.window
            .add_event_listener_with_callback("resize", self.resize_callback.as_ref().unchecked_ref())
            .map_err(|e| VisualError::Host(js_error(e)))?;
        let subscription = ResizeSubscription(self.token());
        self.resize_subscription = Some(subscription);
        Ok(subscription)
    }

    fn unsubscribe_resize(&mut self, subscription: ResizeSubscription) {
        if self.resize_subscription != Some(subscription) {
            return;
        }
        self.resize_subscription = None;
        if let Err(e) = self
            .window
            .remove_event_listener_with_callback("resize", self.resize_callback.as_ref().unchecked_ref())
        {
            log::warn!("removing resize listener failed: {}", js_error(e));
        }
    }
}

/// A container element with a detached canvas and a device ready to draw
/// into it. Acquiring the device is asynchronous, so this is prepared
/// before the synchronous mount.
pub struct PreparedCanvas {
    container: HtmlElement,
    canvas: HtmlCanvasElement,
    surface: wgpu::Surface<'static>,
    adapter: wgpu::Adapter,
    context: GpuContext,
}

impl PreparedCanvas {
    pub async fn acquire(container: HtmlElement) -> Result<Self, VisualError> {
        let document = window()?
            .document()
            .ok_or_else(|| VisualError::resource("no document"))?;
        let canvas: HtmlCanvasElement = document
            .create_element("canvas")
            .map_err(|e| VisualError::resource(js_error(e)))?
            .dyn_into()
            .map_err(|_| VisualError::resource("created element is not a canvas"))?;
        let style = canvas.style();
        let _ = style.set_property("display", "block");
        let _ = style.set_property("width", "100%");
        let _ = style.set_property("height", "100%");

        let instance = context::instance();
        let surface = instance
            .create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone()))
            .map_err(|e| VisualError::resource(format!("failed to create surface: {}", e)))?;
        let (context, adapter) = GpuContext::request(&instance, Some(&surface)).await?;

        Ok(Self {
            container,
            canvas,
            surface,
            adapter,
            context,
        })
    }
}

/// A canvas inside the section's container element.
pub struct CanvasSurface {
    container: HtmlElement,
    canvas: HtmlCanvasElement,
    surface: Option<wgpu::Surface<'static>>,
    config: wgpu::SurfaceConfiguration,
    renderer: Option<SceneRenderer>,
    attached: bool,
}

impl CanvasSurface {
    fn new(prepared: PreparedCanvas, viewport: Viewport, options: SurfaceOptions) -> Result<Self, VisualError> {
        let PreparedCanvas {
            container,
            canvas,
            surface,
            adapter,
            context,
        } = prepared;

        let surface_caps = surface.get_capabilities(&adapter);
        let Some(&fallback_format) = surface_caps.formats.first() else {
            return Err(VisualError::resource("surface reports no formats"));
        };
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f: &wgpu::TextureFormat| f.is_srgb())
            .unwrap_or(fallback_format);
        let alpha_mode = if options.transparent
            && surface_caps.alpha_modes.contains(&wgpu::CompositeAlphaMode::PreMultiplied)
        {
            wgpu::CompositeAlphaMode::PreMultiplied
        } else {
            surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto)
        };

        let max_dimension = context.device.limits().max_texture_dimension_2d;
        if !viewport.fits_within(max_dimension) {
            return Err(VisualError::resource(format!(
                "{}x{} canvas exceeds the device limit of {}",
                viewport.width, viewport.height, max_dimension
            )));
        }
        let width = viewport.width.max(1);
        let height = viewport.height.max(1);
        canvas.set_width(width);
        canvas.set_height(height);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&context.device, &config);

        let renderer = SceneRenderer::new(context, config.format, width, height, options);

        Ok(Self {
            container,
            canvas,
            surface: Some(surface),
            config,
            renderer: Some(renderer),
            attached: false,
        })
    }
}

impl DrawingSurface for CanvasSurface {
    fn attach(&mut self) -> bool {
        if self.attached {
            return false;
        }
        if let Err(e) = self.container.append_child(&self.canvas) {
            log::warn!("appending canvas failed: {}", js_error(e));
            return false;
        }
        self.attached = true;
        true
    }

    fn detach(&mut self) -> bool {
        if !self.attached {
            return false;
        }
        // The container may already have been removed from the page.
        self.canvas.remove();
        self.attached = false;
        true
    }

    fn is_attached(&self) -> bool {
        self.attached
    }

    fn resize(&mut self, viewport: Viewport) {
        if viewport.is_empty() {
            return;
        }
        let (Some(surface), Some(renderer)) = (&self.surface, &mut self.renderer) else {
            return;
        };
        let max_dimension = renderer.device().limits().max_texture_dimension_2d;
        if !viewport.fits_within(max_dimension) {
            log::warn!(
                "clamping {}x{} canvas to the device limit of {}",
                viewport.width, viewport.height, max_dimension
            );
        }
        let viewport = viewport.clamped(max_dimension);
        self.canvas.set_width(viewport.width);
        self.canvas.set_height(viewport.height);
        self.config.width = viewport.width;
        self.config.height = viewport.height;
        surface.configure(renderer.device(), &self.config);
        renderer.resize(viewport.width, viewport.height);
    }

    fn size(&self) -> Viewport {
        Viewport::new(self.config.width, self.config.height)
    }

    fn render_frame(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> Result<(), VisualError> {
        let (Some(surface), Some(renderer)) = (&self.surface, &mut self.renderer) else {
            return Err(VisualError::render("surface already released"));
        };
        match surface.get_current_texture() {
            Ok(output) => {
                let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
                renderer.render(&view, scene, camera);
                output.present();
                Ok(())
            }
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                surface.configure(renderer.device(), &self.config);
                Err(VisualError::render("surface lost; reconfigured"))
            }
            Err(e) => Err(VisualError::render(format!("{:?}", e))),
        }
    }

    fn release(&mut self) {
        if let Some(mut renderer) = self.renderer.take() {
            renderer.release();
        }
        self.surface = None;
    }
}

/// One section's background visual, mounted into a container element.
#[wasm_bindgen]
pub struct SectionVisual {
    inner: SharedVisual,
    /// Bumped by every mount and unmount; a mount whose GPU acquisition
    /// finishes under a newer epoch is discarded.
    epoch: Rc<Cell<u64>>,
    last_error: Rc<RefCell<Option<String>>>,
}

#[wasm_bindgen]
impl SectionVisual {
    /// Visual for a built-in section (see `sectionNames()`).
    #[wasm_bindgen(constructor)]
    pub fn new(section: &str) -> Result<SectionVisual, JsValue> {
        let config = presets::section(section)
            .ok_or_else(|| JsValue::from_str(&format!("unknown section '{}'", section)))?;
        Self::with_config(config)
    }

    #[wasm_bindgen(js_name = fromConfigJson)]
    pub fn from_config_json(json: &str) -> Result<SectionVisual, JsValue> {
        let config = SceneConfig::from_json(json).map_err(|e| JsValue::from_str(&e.to_string()))?;
        Self::with_config(config)
    }

    /// Mount into `container`. Resolves to whether the visual is now
    /// running. A missing container skips initialisation.
    pub fn mount(&self, container: Option<HtmlElement>) -> js_sys::Promise {
        let epoch = self.epoch.get() + 1;
        self.epoch.set(epoch);

        let Some(container) = container else {
            if let Ok(mut visual) = self.inner.try_borrow_mut() {
                let _ = visual.mount(None);
            }
            return js_sys::Promise::resolve(&JsValue::FALSE);
        };
        if self.inner.borrow().phase() != Phase::Unmounted {
            return js_sys::Promise::resolve(&JsValue::FALSE);
        }

        let visual = Rc::downgrade(&self.inner);
        let current_epoch = self.epoch.clone();
        let last_error = self.last_error.clone();
        wasm_bindgen_futures::future_to_promise(async move {
            let record = |err: VisualError| -> Result<JsValue, JsValue> {
                log::warn!("mount failed: {}", err);
                *last_error.borrow_mut() = Some(err.to_string());
                Ok(JsValue::FALSE)
            };
            let prepared = match PreparedCanvas::acquire(container).await {
                Ok(prepared) => prepared,
                Err(err) => return record(err),
            };
            if current_epoch.get() != epoch {
                log::info!("mount superseded before the GPU was ready; discarded");
                return Ok(JsValue::FALSE);
            }
            let Some(visual) = visual.upgrade() else {
                return Ok(JsValue::FALSE);
            };
            let outcome = visual.borrow_mut().mount(Some(prepared));
            match outcome {
                Ok(MountOutcome::Mounted) => {
                    *last_error.borrow_mut() = None;
                    Ok(JsValue::TRUE)
                }
                Ok(_) => Ok(JsValue::FALSE),
                Err(err) => record(err),
            }
        })
    }

    /// Tear the visual down. Returns false if it was not running.
    pub fn unmount(&self) -> bool {
        self.epoch.set(self.epoch.get() + 1);
        match self.inner.try_borrow_mut() {
            Ok(mut visual) => visual.unmount(),
            Err(_) => {
                log::warn!("unmount during a callback ignored");
                false
            }
        }
    }

    pub fn phase(&self) -> String {
        self.inner.borrow().phase().to_string()
    }

    #[wasm_bindgen(js_name = lastError)]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }

    #[wasm_bindgen(js_name = sectionNames)]
    pub fn section_names() -> js_sys::Array {
        presets::SECTIONS.iter().map(|name| JsValue::from_str(name)).collect()
    }
}

impl SectionVisual {
    fn with_config(config: SceneConfig) -> Result<SectionVisual, JsValue> {
        init_panic_hook();
        let window = window().map_err(|e| JsValue::from_str(&e.to_string()))?;
        let inner = Rc::new_cyclic(|weak| RefCell::new(SceneVisual::new(config, WebHost::new(window, weak.clone()))));
        Ok(SectionVisual {
            inner,
            epoch: Rc::new(Cell::new(0)),
            last_error: Rc::new(RefCell::new(None)),
        })
    }
}

impl Drop for SectionVisual {
    fn drop(&mut self) {
        self.epoch.set(self.epoch.get() + 1);
    }
}
