//! Device acquisition.

use crate::error::VisualError;

/// A device and its queue. Each drawing surface owns one.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

pub fn instance() -> wgpu::Instance {
    wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    })
}

impl GpuContext {
    /// Request an adapter (compatible with `surface` when given) and a
    /// device with WebGL2-level limits.
    pub async fn request(
        instance: &wgpu::Instance,
        surface: Option<&wgpu::Surface<'_>>,
    ) -> Result<(Self, wgpu::Adapter), VisualError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: surface,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| VisualError::resource("no suitable GPU adapter"))?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("section visual"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits()),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| VisualError::resource(format!("device request failed: {e}")))?;

        log::debug!("using adapter {:?}", adapter.get_info().name);
        Ok((Self { device, queue }, adapter))
    }

    /// Device without a presentation surface, for offscreen rendering.
    pub async fn headless() -> Result<Self, VisualError> {
        let (context, _) = Self::request(&instance(), None).await?;
        Ok(context)
    }
}
