use crate::gpu::mesh::{primitive_topology, Vertex};
use crate::material::{Blending, Material};
use crate::primitives::Topology;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

/// Fixed-function state that varies between draws. One pipeline is
/// created per distinct key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub topology: Topology,
    pub blending: Blending,
    pub depth_write: bool,
    pub cull_back: bool,
}

impl PipelineKey {
    pub fn for_draw(topology: Topology, material: &Material) -> Self {
        Self {
            topology,
            blending: material.blending,
            // Transparent draws are sorted back to front and don't occlude.
            depth_write: !material.is_transparent(),
            cull_back: topology == Topology::Triangles && !material.double_sided,
        }
    }
}

fn blend_state(blending: Blending) -> wgpu::BlendState {
    match blending {
        // Shader outputs premultiplied colour.
        Blending::Normal => wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING,
        Blending::Additive => wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
        },
    }
}

pub fn create_scene_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    color_format: wgpu::TextureFormat,
    sample_count: u32,
    key: PipelineKey,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Scene Pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[Vertex::desc()],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: Some(blend_state(key.blending)),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: primitive_topology(key.topology),
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: key.cull_back.then_some(wgpu::Face::Back),
            // Setting this to anything other than Fill requires Features::NON_FILL_POLYGON_MODE
            polygon_mode: wgpu::PolygonMode::Fill,
            // Requires Features::DEPTH_CLIP_CONTROL
            unclipped_depth: false,
            // Requires Features::CONSERVATIVE_RASTERIZATION
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: key.depth_write,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: sample_count,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{Color, MaterialStyle};
    use crate::resource::{Releasable, ResourceLedger};

    #[test]
    fn test_pipeline_key() {
        let ledger = ResourceLedger::new();
        let mut solid = Material::new(&ledger, Color::WHITE, 1.0, &MaterialStyle::default());
        let key = PipelineKey::for_draw(Topology::Triangles, &solid);
        assert!(key.depth_write);
        assert!(key.cull_back);

        let mut card = Material::new(
            &ledger,
            Color::WHITE,
            0.5,
            &MaterialStyle {
                double_sided: true,
                ..MaterialStyle::default()
            },
        );
        let key = PipelineKey::for_draw(Topology::Triangles, &card);
        assert!(!key.depth_write);
        assert!(!key.cull_back);

        // Lines never cull
        assert!(!PipelineKey::for_draw(Topology::Lines, &solid).cull_back);

        solid.release();
        card.release();
    }
}
