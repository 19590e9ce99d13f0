//! Native headless host: renders into an offscreen texture with a manual
//! clock, optionally writing each frame as a PNG.

use std::path::PathBuf;

use crate::animation::{AnimationHandle, ManualClock};
use crate::camera::PerspectiveCamera;
use crate::error::VisualError;
use crate::gpu::context::GpuContext;
use crate::gpu::renderer::SceneRenderer;
use crate::lifecycle::{CallbackOutcome, Host, SceneVisual};
use crate::scene_graph::Scene;
use crate::surface::{DrawingSurface, SurfaceOptions};
use crate::viewport::{ResizeSubscription, Viewport};

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// What the CLI mounts into: a device plus an optional output directory.
pub struct OffscreenTarget {
    pub context: GpuContext,
    pub capture_dir: Option<PathBuf>,
}

/// Host with a fixed-size virtual viewport and frames pumped by the caller.
#[derive(Debug)]
pub struct OffscreenHost {
    viewport: Viewport,
    clock: ManualClock,
    next_token: u64,
    pending_frame: Option<AnimationHandle>,
    resize_subscription: Option<ResizeSubscription>,
}

impl OffscreenHost {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            clock: ManualClock::new(),
            next_token: 0,
            pending_frame: None,
            resize_subscription: None,
        }
    }

    fn token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    pub fn pending_frame(&self) -> Option<AnimationHandle> {
        self.pending_frame
    }
}

impl Host for OffscreenHost {
    type Container = OffscreenTarget;
    type Surface = OffscreenSurface;
    type Clock = ManualClock;

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn clock(&self) -> &ManualClock {
        &self.clock
    }

    fn create_surface(
        &mut self,
        container: OffscreenTarget,
        viewport: Viewport,
        options: SurfaceOptions,
    ) -> Result<OffscreenSurface, VisualError> {
        check_target_size(viewport, container.context.device.limits().max_texture_dimension_2d)?;
        Ok(OffscreenSurface::new(container, viewport, options))
    }

    fn request_frame(&mut self) -> Result<AnimationHandle, VisualError> {
        let handle = AnimationHandle(self.token());
        self.pending_frame = Some(handle);
        Ok(handle)
    }

    fn cancel_frame(&mut self, handle: AnimationHandle) {
        if self.pending_frame == Some(handle) {
            self.pending_frame = None;
        }
    }

    fn subscribe_resize(&mut self) -> Result<ResizeSubscription, VisualError> {
        let subscription = ResizeSubscription(self.token());
        self.resize_subscription = Some(subscription);
        Ok(subscription)
    }

    fn unsubscribe_resize(&mut self, subscription: ResizeSubscription) {
        if self.resize_subscription == Some(subscription) {
            self.resize_subscription = None;
        }
    }
}

fn check_target_size(viewport: Viewport, max_dimension: u32) -> Result<(), VisualError> {
    if viewport.is_empty() {
        return Err(VisualError::resource(format!(
            "cannot render into a {}x{} target",
            viewport.width, viewport.height
        )));
    }
    if !viewport.fits_within(max_dimension) {
        return Err(VisualError::resource(format!(
            "{}x{} target exceeds the device limit of {}",
            viewport.width, viewport.height, max_dimension
        )));
    }
    Ok(())
}

/// Advance the clock by `dt` and deliver the pending frame callback, if
/// any. Returns false once the visual has stopped requesting frames.
pub fn pump_frame(visual: &mut SceneVisual<OffscreenHost>, dt: f64) -> bool {
    let Some(handle) = visual.host_mut().pending_frame.take() else {
        return false;
    };
    visual.host().clock().advance(dt);
    visual.on_frame(handle) == CallbackOutcome::Applied
}

/// Offscreen render target with CPU readback.
pub struct OffscreenSurface {
    renderer: Option<SceneRenderer>,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: Viewport,
    attached: bool,
    capture_dir: Option<PathBuf>,
    captured: usize,
}

impl OffscreenSurface {
    fn new(target: OffscreenTarget, viewport: Viewport, options: SurfaceOptions) -> Self {
        let renderer = SceneRenderer::new(target.context, TARGET_FORMAT, viewport.width, viewport.height, options);
        let (texture, view) = create_target(renderer.device(), viewport);
        Self {
            renderer: Some(renderer),
            texture,
            view,
            size: viewport,
            attached: false,
            capture_dir: target.capture_dir,
            captured: 0,
        }
    }

    /// Frames written to the capture directory so far.
    pub fn captured(&self) -> usize {
        self.captured
    }

    fn capture(&mut self, renderer: &SceneRenderer) -> Result<(), VisualError> {
        let Some(dir) = &self.capture_dir else {
            return Ok(());
        };
        let Viewport { width, height } = self.size;

        // Buffer for reading back data
        let u32_size = std::mem::size_of::<u32>() as u32;
        let unpadded_bytes_per_row = u32_size * width;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row_padding = (align - unpadded_bytes_per_row % align) % align;
        let padded_bytes_per_row = unpadded_bytes_per_row + padded_bytes_per_row_padding;

        let output_buffer = renderer.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: (padded_bytes_per_row * height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = renderer
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &output_buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        renderer.queue().submit(Some(encoder.finish()));

        let buffer_slice = output_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        renderer.device().poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| VisualError::render(format!("readback abandoned: {e}")))?
            .map_err(|e| VisualError::render(format!("readback failed: {e}")))?;

        let data = buffer_slice.get_mapped_range();
        let mut unpadded_data = Vec::with_capacity((width * height * 4) as usize);
        for row in 0..height {
            let start = (row * padded_bytes_per_row) as usize;
            let end = start + (width * 4) as usize;
            unpadded_data.extend_from_slice(&data[start..end]);
        }
        drop(data);
        output_buffer.unmap();

        let frame_path = dir.join(format!("frame_{:05}.png", self.captured));
        image::save_buffer(&frame_path, &unpadded_data, width, height, image::ColorType::Rgba8)
            .map_err(|e| VisualError::render(format!("{}: {e}", frame_path.display())))?;
        self.captured += 1;
        Ok(())
    }
}

impl DrawingSurface for OffscreenSurface {
    fn attach(&mut self) -> bool {
        !std::mem::replace(&mut self.attached, true)
    }

    fn detach(&mut self) -> bool {
        std::mem::replace(&mut self.attached, false)
    }

    fn is_attached(&self) -> bool {
        self.attached
    }

    fn resize(&mut self, viewport: Viewport) {
        let Some(renderer) = &mut self.renderer else {
            return;
        };
        let max_dimension = renderer.device().limits().max_texture_dimension_2d;
        if !viewport.fits_within(max_dimension) {
            log::warn!(
                "clamping {}x{} target to the device limit of {}",
                viewport.width, viewport.height, max_dimension
            );
        }
        let viewport = viewport.clamped(max_dimension);
        if viewport.is_empty() || viewport == self.size {
            return;
        }
        self.size = viewport;
        renderer.resize(viewport.width, viewport.height);
        let (texture, view) = create_target(renderer.device(), viewport);
        self.texture.destroy();
        self.texture = texture;
        self.view = view;
    }

    fn size(&self) -> Viewport {
        self.size
    }

    fn render_frame(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> Result<(), VisualError> {
        let Some(mut renderer) = self.renderer.take() else {
            return Err(VisualError::render("surface already released"));
        };
        renderer.render(&self.view, scene, camera);
        let captured = self.capture(&renderer);
        self.renderer = Some(renderer);
        captured
    }

    fn release(&mut self) {
        if let Some(mut renderer) = self.renderer.take() {
            renderer.release();
            self.texture.destroy();
        }
    }
}

fn create_target(device: &wgpu::Device, viewport: Viewport) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Target Texture"),
        size: wgpu::Extent3d {
            width: viewport.width,
            height: viewport.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TARGET_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}
