//! GPU renderer for one section scene.
//!
//! Geometry is uploaded lazily on first draw and cached by resource ID.
//! Per-draw data lives in one dynamic uniform buffer with a 256-byte slot
//! per draw.

use std::collections::HashMap;
use std::iter;

use bytemuck::{Pod, Zeroable};

use crate::camera::PerspectiveCamera;
use crate::gpu::context::GpuContext;
use crate::gpu::mesh::GpuGeometry;
use crate::gpu::pipeline::{self, PipelineKey, DEPTH_FORMAT};
use crate::lighting::LightingUniforms;
use crate::material::Material;
use crate::primitives::Geometry;
use crate::resource::ResourceId;
use crate::scene_graph::Scene;
use crate::surface::SurfaceOptions;

/// Initial number of draw slots. Each draw needs its own uniform slot in the
/// dynamic uniform buffer, which grows when a frame needs more.
const INITIAL_DRAW_SLOTS: usize = 256;

/// Uniform buffer alignment (WebGPU minUniformBufferOffsetAlignment is typically 256 bytes)
const UNIFORM_ALIGNMENT: usize = 256;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct GlobalUniforms {
    view_proj: [[f32; 4]; 4],
    camera_position: [f32; 4],
    lighting: LightingUniforms,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct DrawUniforms {
    model: [[f32; 4]; 4],
    color: [f32; 4],
    emissive: [f32; 4],
    params: [f32; 4],
    // Padding to reach 256-byte alignment (112 bytes of data + 144 bytes padding)
    _padding: [[f32; 4]; 9],
}

impl DrawUniforms {
    fn new(model: glam::Mat4, material: &Material) -> Self {
        let [r, g, b] = material.color;
        let [er, eg, eb] = material.emissive;
        Self {
            model: model.to_cols_array_2d(),
            color: [r, g, b, material.opacity],
            emissive: [er, eg, eb, 0.0],
            params: [if material.is_lit() { 1.0 } else { 0.0 }, material.shininess().max(1.0), 0.0, 0.0],
            _padding: [[0.0; 4]; 9],
        }
    }
}

/// One draw collected from the scene.
struct DrawItem<'a> {
    geometry: &'a Geometry,
    key: PipelineKey,
    uniforms: DrawUniforms,
    /// View-space depth, for back-to-front sorting of transparent draws.
    depth: f32,
}

pub struct SceneRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    format: wgpu::TextureFormat,
    size: wgpu::Extent3d,
    sample_count: u32,
    clear_color: wgpu::Color,

    shader: wgpu::ShaderModule,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,

    bind_group_layout: wgpu::BindGroupLayout,
    global_buffer: wgpu::Buffer,
    draw_buffer: wgpu::Buffer,
    draw_slots: usize,
    bind_group: wgpu::BindGroup,

    geometries: HashMap<ResourceId, GpuGeometry>,

    depth_view: wgpu::TextureView,
    msaa_view: Option<wgpu::TextureView>,
}

impl SceneRenderer {
    pub fn new(context: GpuContext, format: wgpu::TextureFormat, width: u32, height: u32, options: SurfaceOptions) -> Self {
        let GpuContext { device, queue } = context;
        let size = wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        };
        let sample_count = if options.antialias { 4 } else { 1 };
        let clear_color = if options.transparent {
            wgpu::Color::TRANSPARENT
        } else {
            wgpu::Color::BLACK
        };

        let global_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Global Uniform Buffer"),
            size: std::mem::size_of::<GlobalUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let draw_buffer = create_draw_buffer(&device, INITIAL_DRAW_SLOTS);

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<GlobalUniforms>() as u64),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<DrawUniforms>() as u64),
                    },
                    count: None,
                },
            ],
            label: Some("scene_bind_group_layout"),
        });

        let bind_group = create_bind_group(&device, &bind_group_layout, &global_buffer, &draw_buffer);

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let shader = device.create_shader_module(wgpu::include_wgsl!("shader.wgsl"));

        let (depth_view, msaa_view) = create_targets(&device, format, size, sample_count);

        Self {
            device,
            queue,
            format,
            size,
            sample_count,
            clear_color,
            shader,
            pipeline_layout,
            pipelines: HashMap::new(),
            bind_group_layout,
            global_buffer,
            draw_buffer,
            draw_slots: INITIAL_DRAW_SLOTS,
            bind_group,
            geometries: HashMap::new(),
            depth_view,
            msaa_view,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn size(&self) -> (u32, u32) {
        (self.size.width, self.size.height)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if width == self.size.width && height == self.size.height {
            return;
        }
        self.size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let (depth_view, msaa_view) = create_targets(&self.device, self.format, self.size, self.sample_count);
        self.depth_view = depth_view;
        self.msaa_view = msaa_view;
    }

    /// Make room for `draws` uniform slots, replacing the draw buffer and
    /// its bind group when the current one is too small.
    fn reserve_draw_slots(&mut self, draws: usize) {
        let Some(slots) = grown_slot_count(self.draw_slots, draws) else {
            return;
        };
        log::debug!("growing draw uniform buffer from {} to {} slots", self.draw_slots, slots);
        let draw_buffer = create_draw_buffer(&self.device, slots);
        self.bind_group = create_bind_group(&self.device, &self.bind_group_layout, &self.global_buffer, &draw_buffer);
        self.draw_buffer = draw_buffer;
        self.draw_slots = slots;
    }

    /// Draw the scene into `target`.
    pub fn render(&mut self, target: &wgpu::TextureView, scene: &Scene, camera: &PerspectiveCamera) {
        let view = camera.view_matrix();
        let globals = GlobalUniforms {
            view_proj: camera.view_projection_matrix().to_cols_array_2d(),
            camera_position: camera.position.extend(1.0).to_array(),
            lighting: scene.lights().to_uniforms(),
        };
        self.queue.write_buffer(&self.global_buffer, 0, bytemuck::cast_slice(&[globals]));

        let draws = collect_draws(scene, view);
        self.reserve_draw_slots(draws.len());

        // Upload new geometry and build missing pipelines before the pass.
        for draw in &draws {
            let id = draw.geometry.id();
            if !self.geometries.contains_key(&id) {
                if let Some(uploaded) = GpuGeometry::upload(&self.device, draw.geometry) {
                    self.geometries.insert(id, uploaded);
                }
            }
            if !self.pipelines.contains_key(&draw.key) {
                let created = pipeline::create_scene_pipeline(
                    &self.device,
                    &self.pipeline_layout,
                    &self.shader,
                    self.format,
                    self.sample_count,
                    draw.key,
                );
                self.pipelines.insert(draw.key, created);
            }
        }

        // Pre-write all draw uniform data to the buffer BEFORE the render pass.
        // queue.write_buffer() is immediate, not recorded in the command stream.
        for (slot, draw) in draws.iter().enumerate() {
            let offset = (slot * UNIFORM_ALIGNMENT) as u64;
            self.queue.write_buffer(&self.draw_buffer, offset, bytemuck::cast_slice(&[draw.uniforms]));
        }

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Scene Encoder"),
        });
        {
            let (view, resolve_target) = match &self.msaa_view {
                Some(msaa) => (msaa, Some(target)),
                None => (target, None),
            };
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for (slot, draw) in draws.iter().enumerate() {
                let (Some(buffers), Some(pipeline)) =
                    (self.geometries.get(&draw.geometry.id()), self.pipelines.get(&draw.key))
                else {
                    continue;
                };
                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(0, &self.bind_group, &[(slot * UNIFORM_ALIGNMENT) as u32]);
                render_pass.set_vertex_buffer(0, buffers.vertex_buffer.slice(..));
                render_pass.set_index_buffer(buffers.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..buffers.num_indices, 0, 0..1);
            }
        }

        self.queue.submit(iter::once(encoder.finish()));
    }

    /// Destroy all GPU buffers. The renderer can still draw afterwards, but
    /// would re-upload everything.
    pub fn release(&mut self) {
        for buffers in self.geometries.values() {
            buffers.destroy();
        }
        self.geometries.clear();
        self.pipelines.clear();
        self.global_buffer.destroy();
        self.draw_buffer.destroy();
    }
}

fn collect_draws<'a>(scene: &'a Scene, view: glam::Mat4) -> Vec<DrawItem<'a>> {
    let mut draws = Vec::new();
    for (_, element) in scene.elements() {
        if !element.visible || element.geometry.is_empty() {
            continue;
        }
        let model = element.transform.model_matrix();
        let depth = -view.transform_point3(element.transform.position).z;

        let mut push = |geometry: &'a Geometry, material: &'a Material| {
            draws.push(DrawItem {
                geometry,
                key: PipelineKey::for_draw(geometry.topology(), material),
                uniforms: DrawUniforms::new(model, material),
                depth,
            });
        };
        push(&element.geometry, &element.material);
        if let Some(outline) = &element.outline {
            push(&outline.geometry, &outline.material);
        }
    }

    // Opaque first, then transparent back to front.
    draws.sort_by(|a, b| {
        b.key
            .depth_write
            .cmp(&a.key.depth_write)
            .then_with(|| b.depth.total_cmp(&a.depth))
    });
    draws
}

/// Slot count to grow to, or `None` when `current` already holds `needed`.
fn grown_slot_count(current: usize, needed: usize) -> Option<usize> {
    (needed > current).then(|| needed.next_power_of_two())
}

fn create_draw_buffer(device: &wgpu::Device, slots: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Draw Uniform Buffer (Dynamic)"),
        size: (UNIFORM_ALIGNMENT * slots) as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    global_buffer: &wgpu::Buffer,
    draw_buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: global_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: draw_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<DrawUniforms>() as u64),
                }),
            },
        ],
        label: Some("scene_bind_group"),
    })
}

fn create_targets(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    size: wgpu::Extent3d,
    sample_count: u32,
) -> (wgpu::TextureView, Option<wgpu::TextureView>) {
    let depth = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size,
        mip_level_count: 1,
        sample_count,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });

    let msaa = (sample_count > 1).then(|| {
        device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("MSAA Color Texture"),
                size,
                mip_level_count: 1,
                sample_count,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default())
    });

    (depth.create_view(&wgpu::TextureViewDescriptor::default()), msaa)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::SceneConfig;
    use crate::factory::build_elements;
    use crate::resource::ResourceLedger;
    use crate::scene_graph::assemble;
    use crate::viewport::Viewport;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn draw_count(json: &str) -> usize {
        let config = SceneConfig::from_json(json).unwrap();
        let ledger = ResourceLedger::new();
        let elements = build_elements(&config, &ledger, &mut StdRng::seed_from_u64(5)).unwrap();
        let (mut scene, camera) = assemble(elements, &config, Viewport::new(800, 600));

        let count = collect_draws(&scene, camera.view_matrix()).len();
        scene.release_all();
        assert!(ledger.counts().is_balanced());
        count
    }

    #[test]
    fn test_uniform_sizes() {
        assert_eq!(std::mem::size_of::<GlobalUniforms>(), 128);
        assert_eq!(std::mem::size_of::<DrawUniforms>(), UNIFORM_ALIGNMENT);
    }

    #[test]
    fn test_every_mesh_is_drawn_past_initial_slots() {
        let count = draw_count(
            r##"{
                "name": "crowd",
                "groups": [{
                    "shape": { "type": "box", "size": 0.3 },
                    "count": 300,
                    "layout": { "type": "sphere_surface", "radius": 4.0 },
                    "palette": ["#8b5cf6"]
                }]
            }"##,
        );
        assert_eq!(count, 300);
    }

    #[test]
    fn test_outlines_are_drawn_separately() {
        let count = draw_count(
            r##"{
                "name": "panels",
                "groups": [{
                    "shape": { "type": "plane", "width": 1.5, "height": 1.0 },
                    "count": 160,
                    "layout": { "type": "ring", "radius": 3.0 },
                    "palette": ["#8b5cf6"],
                    "outline": "#ffffff"
                }]
            }"##,
        );
        assert_eq!(count, 320);
    }

    #[test]
    fn test_draw_slots_grow_to_power_of_two() {
        assert_eq!(grown_slot_count(INITIAL_DRAW_SLOTS, 0), None);
        assert_eq!(grown_slot_count(INITIAL_DRAW_SLOTS, 256), None);
        assert_eq!(grown_slot_count(INITIAL_DRAW_SLOTS, 257), Some(512));
        assert_eq!(grown_slot_count(512, 1500), Some(2048));
    }
}
