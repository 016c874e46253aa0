use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::RenderContext;

/// Per-draw inputs of the quad stage. The view-projection matrix comes
/// from scene management; `seed` keys the id color hash and
/// `quads_interleaving` scales the seam-hiding inflation.
pub struct DrawParams {
    pub view_proj: Mat4,
    pub camera_position: Vec3,
    pub seed: f32,
    pub quads_interleaving: f32,
}

/// GPU layout of [`DrawParams`]; matches `DrawParams` in `terrain.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct DrawParamsUniform {
    view_proj: [[f32; 4]; 4],
    camera_position: [f32; 4],
    seed: f32,
    quads_interleaving: f32,
    _pad: [f32; 2],
}

/// Render pipeline that expands packed faces into quads in the vertex
/// stage: vertex `i` addresses face `i / 4`, corner `i % 4`, with the
/// shared monotone index buffer supplying the two triangles per quad.
pub struct QuadPipeline {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    params_buffer: wgpu::Buffer,
}

impl QuadPipeline {
    pub fn new(
        ctx: &RenderContext,
        color_format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
    ) -> Self {
        let device = ctx.device();
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Terrain Quad Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("terrain.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Quad Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Quad Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Quad Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(color_format.into())],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: depth_format.map(|format| wgpu::DepthStencilState {
                format,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Quad Draw Params"),
            size: std::mem::size_of::<DrawParamsUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            pipeline,
            bind_group_layout,
            params_buffer,
        }
    }

    pub(crate) fn create_bind_group(
        &self,
        ctx: &RenderContext,
        face_buffer: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        ctx.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Quad Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: face_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.params_buffer.as_entire_binding(),
                },
            ],
        })
    }

    pub(crate) fn prepare(
        &self,
        ctx: &RenderContext,
        params: &DrawParams,
        bind_group: &wgpu::BindGroup,
        pass: &mut wgpu::RenderPass<'_>,
    ) {
        let uniform = DrawParamsUniform {
            view_proj: params.view_proj.to_cols_array_2d(),
            camera_position: [
                params.camera_position.x,
                params.camera_position.y,
                params.camera_position.z,
                0.0,
            ],
            seed: params.seed,
            quads_interleaving: params.quads_interleaving,
            _pad: [0.0; 2],
        };
        ctx.queue()
            .write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&uniform));
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
    }
}
