//! GPU side of the terrain pipeline.
//!
//! A [`RenderContext`] owns the device, the shared quad index buffer and
//! the culling pipeline. A [`TerrainRenderer`] takes one published mesh
//! set and, per frame, runs the culling kernel over the packed mesh table
//! to build an indirect draw command list, then issues a single
//! indirect-indexed draw over the visible commands.
//!
//! The published face/mesh buffers are written once and never modified;
//! the only per-frame GPU state is the command list and its atomic
//! counter.

use basalt_meshing::MeshingError;
use thiserror::Error;

mod context;
mod culling;
mod quad_pipeline;
mod renderer;

pub use context::RenderContext;
pub use culling::{CameraData, Plane, cull_mesh};
pub use quad_pipeline::{DrawParams, QuadPipeline};
pub use renderer::{DrawIndexedIndirect, PublishStats, TerrainRenderer};

#[derive(Error, Debug)]
pub enum RenderError {
    /// No usable GPU adapter; the renderer stays idle.
    #[error("no suitable GPU adapter")]
    NoAdapter,

    /// Device or buffer acquisition failed; retried on the next attempt.
    #[error("GPU resource acquisition failed: {0}")]
    Resource(String),

    /// The mesh set is immutable once published.
    #[error("terrain already published to this renderer")]
    AlreadyPublished,

    #[error(transparent)]
    Meshing(#[from] MeshingError),
}
