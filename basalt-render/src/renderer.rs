use bytemuck::{Pod, Zeroable};
use log::{debug, error, info};
use wgpu::util::DeviceExt;

use basalt_config::MesherConfig;
use basalt_core::{CULLING_GROUP_SIZE, PackedMesh};
use basalt_meshing::{IdentityMerger, mesh_terrain};
use basalt_world::{Bounds, ColumnStore};

use crate::culling::{CameraData, CameraUniform};
use crate::quad_pipeline::{DrawParams, QuadPipeline};
use crate::{RenderContext, RenderError};

/// Indirect draw command layout, one per visible mesh, written by the
/// culling kernel (matches `DrawCommand` in `cull.wgsl` and wgpu's
/// indexed indirect layout).
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct DrawIndexedIndirect {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub first_instance: u32,
}

pub struct PublishStats {
    pub face_count: usize,
    pub mesh_count: usize,
    /// Mesh table length after padding to the culling workgroup size.
    pub padded_mesh_count: u32,
}

struct Published {
    bounds: Bounds,
    meshes: Vec<PackedMesh>,
    mesh_count: u32,
    face_buffer: wgpu::Buffer,
    mesh_buffer: wgpu::Buffer,
    command_buffer: wgpu::Buffer,
    camera_buffer: wgpu::Buffer,
    cull_bind_group: wgpu::BindGroup,
}

/// Owns one published mesh set and the per-frame culling path.
///
/// `publish` runs the meshing pipeline and uploads the face and mesh
/// tables once; they are immutable afterwards. Each frame,
/// [`dispatch_cull`](TerrainRenderer::dispatch_cull) rebuilds the
/// indirect command list on the GPU and the draw methods replay the
/// visible commands with the shared index buffer.
pub struct TerrainRenderer {
    published: Option<Published>,
}

impl TerrainRenderer {
    pub fn new() -> Self {
        Self { published: None }
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.published.as_ref().map(|p| p.bounds)
    }

    /// The published mesh table, padding included.
    pub fn meshes(&self) -> Option<&[PackedMesh]> {
        self.published.as_ref().map(|p| p.meshes.as_slice())
    }

    /// Meshes the store and uploads the face, mesh and command buffers.
    /// Fails without touching renderer state on invalid data; publishing
    /// twice on the same renderer is rejected.
    pub fn publish(
        &mut self,
        ctx: &RenderContext,
        bounds: Bounds,
        store: &ColumnStore,
        config: &MesherConfig,
    ) -> Result<PublishStats, RenderError> {
        if self.published.is_some() {
            return Err(RenderError::AlreadyPublished);
        }

        let terrain = mesh_terrain(store, config, &IdentityMerger)?;
        let stats = PublishStats {
            face_count: terrain.face_count(),
            mesh_count: terrain.mesh_count(),
            padded_mesh_count: (terrain.mesh_count() as u32)
                .div_ceil(CULLING_GROUP_SIZE)
                .max(1)
                * CULLING_GROUP_SIZE,
        };

        // Pad the mesh table to a whole number of workgroups; the kernel
        // drops the "none" entries.
        let mut meshes = terrain.meshes;
        meshes.resize(stats.padded_mesh_count as usize, PackedMesh::none());

        // A storage binding cannot be empty, so a terrain with no faces
        // still uploads one zeroed record.
        let mut faces = terrain.faces;
        if faces.is_empty() {
            faces.push(bytemuck::Zeroable::zeroed());
        }

        let device = ctx.device();
        let face_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Terrain Face Buffer"),
            contents: bytemuck::cast_slice(&faces),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let mesh_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Terrain Mesh Buffer"),
            contents: bytemuck::cast_slice(&meshes),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let command_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Terrain Command Buffer"),
            size: meshes.len() as u64 * std::mem::size_of::<DrawIndexedIndirect>() as u64,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::INDIRECT
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Camera Data Buffer"),
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let cull_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Culling Bind Group"),
            layout: ctx.cull_bind_group_layout(),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: mesh_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: command_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: ctx.counter_buffer().as_entire_binding(),
                },
            ],
        });

        info!(
            "published terrain: {} faces, {} meshes ({} padded)",
            stats.face_count, stats.mesh_count, stats.padded_mesh_count
        );
        self.published = Some(Published {
            bounds,
            meshes,
            mesh_count: stats.padded_mesh_count,
            face_buffer,
            mesh_buffer,
            command_buffer,
            camera_buffer,
            cull_bind_group,
        });
        Ok(stats)
    }

    /// Runs the culling dispatch for this frame. Per-frame errors never
    /// surface: on failure the frame draws nothing and the error is
    /// logged.
    ///
    /// On devices with indirect-count support the count stays on the GPU
    /// and `None` comes back without any blocking: draw through
    /// [`draw_with_count`](TerrainRenderer::draw_with_count). Otherwise
    /// the counter is read back (the only blocking point of the frame)
    /// and the returned count feeds [`draw`](TerrainRenderer::draw).
    pub fn dispatch_cull(&self, ctx: &RenderContext, camera: &CameraData) -> Option<u32> {
        let Some(published) = &self.published else {
            return Some(0);
        };

        ctx.queue().write_buffer(
            &published.camera_buffer,
            0,
            bytemuck::bytes_of(&camera.to_uniform()),
        );
        ctx.queue()
            .write_buffer(ctx.counter_buffer(), 0, &0u32.to_le_bytes());

        let mut encoder = ctx
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Culling Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Culling Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(ctx.cull_pipeline());
            pass.set_bind_group(0, &published.cull_bind_group, &[]);
            pass.dispatch_workgroups(published.mesh_count / CULLING_GROUP_SIZE, 1, 1);
        }
        if ctx.supports_indirect_count() {
            ctx.queue().submit(Some(encoder.finish()));
            return None;
        }
        encoder.copy_buffer_to_buffer(ctx.counter_buffer(), 0, ctx.counter_staging(), 0, 4);
        ctx.queue().submit(Some(encoder.finish()));

        let Some(visible) = self.read_counter(ctx) else {
            return Some(0);
        };
        let visible = visible.min(published.mesh_count);
        debug!("culling: {visible} of {} meshes visible", published.mesh_count);
        Some(visible)
    }

    /// Blocking readback of the visible counter. The per-frame path only
    /// goes through this on the fallback; stats overlays (and the GPU
    /// tests) can call it after any dispatch to observe the count.
    pub fn read_visible_count(&self, ctx: &RenderContext) -> u32 {
        let Some(published) = &self.published else {
            return 0;
        };

        let mut encoder = ctx
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Counter Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(ctx.counter_buffer(), 0, ctx.counter_staging(), 0, 4);
        ctx.queue().submit(Some(encoder.finish()));

        self.read_counter(ctx)
            .map_or(0, |visible| visible.min(published.mesh_count))
    }

    fn read_counter(&self, ctx: &RenderContext) -> Option<u32> {
        let slice = ctx.counter_staging().slice(..);
        slice.map_async(wgpu::MapMode::Read, |_| {});
        if let Err(e) = ctx.device().poll(wgpu::PollType::wait_indefinitely()) {
            error!("culling readback failed: {e:?}");
            return None;
        }
        let data = slice.get_mapped_range();
        let visible = bytemuck::cast_slice::<u8, u32>(&data)[0];
        drop(data);
        ctx.counter_staging().unmap();
        Some(visible)
    }

    /// Creates the quad pipeline's bind group over this renderer's face
    /// buffer; cache it next to the pipeline and reuse it every frame.
    pub fn create_draw_bind_group(
        &self,
        ctx: &RenderContext,
        pipeline: &QuadPipeline,
    ) -> Option<wgpu::BindGroup> {
        let published = self.published.as_ref()?;
        Some(pipeline.create_bind_group(ctx, &published.face_buffer))
    }

    /// Issues the indirect-indexed draw covering the first `visible`
    /// commands from this frame's cull.
    pub fn draw(
        &self,
        ctx: &RenderContext,
        pipeline: &QuadPipeline,
        bind_group: &wgpu::BindGroup,
        pass: &mut wgpu::RenderPass<'_>,
        params: &DrawParams,
        visible: u32,
    ) {
        let Some(published) = &self.published else {
            return;
        };
        if visible == 0 {
            return;
        }
        pipeline.prepare(ctx, params, bind_group, pass);
        pass.set_index_buffer(ctx.index_buffer().slice(..), wgpu::IndexFormat::Uint16);
        if ctx.multi_draw() {
            pass.multi_draw_indexed_indirect(&published.command_buffer, 0, visible);
        } else {
            let stride = std::mem::size_of::<DrawIndexedIndirect>() as u64;
            for i in 0..visible as u64 {
                pass.draw_indexed_indirect(&published.command_buffer, i * stride);
            }
        }
    }

    /// Indirect-count draw: the command count comes straight from the
    /// counter buffer, with no CPU readback between cull and draw. Only
    /// valid when [`RenderContext::supports_indirect_count`] is true.
    pub fn draw_with_count(
        &self,
        ctx: &RenderContext,
        pipeline: &QuadPipeline,
        bind_group: &wgpu::BindGroup,
        pass: &mut wgpu::RenderPass<'_>,
        params: &DrawParams,
    ) {
        let Some(published) = &self.published else {
            return;
        };
        pipeline.prepare(ctx, params, bind_group, pass);
        pass.set_index_buffer(ctx.index_buffer().slice(..), wgpu::IndexFormat::Uint16);
        pass.multi_draw_indexed_indirect_count(
            &published.command_buffer,
            0,
            ctx.counter_buffer(),
            0,
            published.mesh_count,
        );
    }
}

impl Default for TerrainRenderer {
    fn default() -> Self {
        Self::new()
    }
}
