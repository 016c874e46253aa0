use wgpu::util::DeviceExt;

use basalt_core::MAX_FACES_PER_MESH;

use crate::RenderError;

/// Process-wide GPU state for the terrain pipeline: device and queue, the
/// shared quad index buffer, the visible-mesh counter, and the compiled
/// culling pipeline.
///
/// Created once at startup and passed by reference into every renderer;
/// dropping it releases everything (idempotent through ownership). One
/// context per process is the intended shape.
pub struct RenderContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    index_buffer: wgpu::Buffer,
    counter_buffer: wgpu::Buffer,
    counter_staging: wgpu::Buffer,
    cull_pipeline: wgpu::ComputePipeline,
    cull_bind_group_layout: wgpu::BindGroupLayout,
    multi_draw: bool,
    multi_draw_count: bool,
}

impl RenderContext {
    /// Initializes wgpu and compiles the culling kernel.
    pub fn new() -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            compatible_surface: None,
        }))
        .map_err(|_| RenderError::NoAdapter)?;

        // Multi-draw support decides whether the draw covers all commands
        // in one call; without it the commands are replayed one by one.
        let wanted = wgpu::Features::MULTI_DRAW_INDIRECT_COUNT;
        let features = adapter.features() & wanted;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Terrain Render Context"),
            required_features: features,
            required_limits: wgpu::Limits::downlevel_defaults(),
            memory_hints: wgpu::MemoryHints::Performance,
            ..Default::default()
        }))
        .map_err(|e| RenderError::Resource(e.to_string()))?;

        // The monotone quad pattern (0,1,2, 2,1,3, 4,5,6, 6,5,7, ...):
        // two triangles per quad, shared by every mesh. 16-bit indices
        // bound the face cap: 4 * 16384 vertices is exactly the u16 range.
        let mut indices = Vec::with_capacity(6 * MAX_FACES_PER_MESH as usize);
        for quad in 0..MAX_FACES_PER_MESH as u16 {
            let base = quad * 4;
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 1, base + 3]);
        }
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Index Buffer"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let counter_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Visible Counter Buffer"),
            size: 4,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let counter_staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Visible Counter Staging"),
            size: 4,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Culling Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("cull.wgsl").into()),
        });

        let cull_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Culling Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: true },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: false },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 3,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: false },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Culling Pipeline Layout"),
            bind_group_layouts: &[&cull_bind_group_layout],
            push_constant_ranges: &[],
        });

        let cull_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Culling Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("cull"),
            compilation_options: Default::default(),
            cache: None,
        });

        Ok(Self {
            device,
            queue,
            index_buffer,
            counter_buffer,
            counter_staging,
            cull_pipeline,
            cull_bind_group_layout,
            multi_draw: true,
            multi_draw_count: features.contains(wgpu::Features::MULTI_DRAW_INDIRECT_COUNT),
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn index_buffer(&self) -> &wgpu::Buffer {
        &self.index_buffer
    }

    pub(crate) fn counter_buffer(&self) -> &wgpu::Buffer {
        &self.counter_buffer
    }

    pub(crate) fn counter_staging(&self) -> &wgpu::Buffer {
        &self.counter_staging
    }

    pub(crate) fn cull_pipeline(&self) -> &wgpu::ComputePipeline {
        &self.cull_pipeline
    }

    pub(crate) fn cull_bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.cull_bind_group_layout
    }

    pub(crate) fn multi_draw(&self) -> bool {
        self.multi_draw
    }

    /// Whether the device can source the draw count from the counter
    /// buffer, skipping the CPU readback entirely.
    pub fn supports_indirect_count(&self) -> bool {
        self.multi_draw_count
    }
}
