//! CPU meshing pipeline: turns a [`ColumnStore`] into packed face and mesh
//! tables ready for GPU upload.
//!
//! The world is processed in 64x64x64 chunks. Each chunk's solid cells are
//! encoded as 64-bit rows per axis, visible faces fall out of two shifts
//! per row, and a greedy pass merges them into maximal rectangles. Faces
//! are then grouped per (mesh tile, normal) under a hard per-mesh face cap,
//! with small tiles collapsing their six directional meshes into one.
//!
//! Jobs fan out over rayon; all shared state is the read-only store.

use basalt_config::ConfigError;
use basalt_world::{ColumnVoxel, DataError};
use thiserror::Error;

mod assemble;
mod bitset;
mod driver;
mod greedy;

pub use driver::{TerrainMeshes, mesh_terrain};

/// Decides what makes two adjacent voxels mergeable.
///
/// Faces merge only between voxels with equal non-zero merge identifiers;
/// 0 means "never a merge target" and such faces are emitted as unit
/// quads. Statically dispatched so the identity case compiles down to a
/// byte copy.
pub trait MergeStrategy: Sync {
    fn merge_id(&self, voxel: ColumnVoxel) -> u8;
}

/// Terrain voxels merge on their raw id byte.
pub struct IdentityMerger;

impl MergeStrategy for IdentityMerger {
    #[inline]
    fn merge_id(&self, voxel: ColumnVoxel) -> u8 {
        voxel.id
    }
}

#[derive(Error, Debug)]
pub enum MeshingError {
    /// A tile's face counters overflowed before cap splitting kicked in.
    /// Treated as a bug: the publish fails and the previous mesh set stays.
    #[error("tile face count overflowed the assembler's counters")]
    CapacityExceeded,

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
