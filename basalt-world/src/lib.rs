//! Sparse column-oriented voxel storage and the persisted voxel asset
//! format.
//!
//! The terrain generator hands the renderer a [`ColumnStore`]: for every
//! (x, z) column an ascending list of (y, id) pairs, pre-trimmed so only
//! cells that are the surface or neighbor a lower surface are present.
//! The store is immutable after construction and shared read-only across
//! meshing jobs.

use glam::Vec3;
use thiserror::Error;

mod asset;
mod column_store;

pub use asset::{read_asset, read_asset_file, write_asset, write_asset_file, VoxelAsset};
pub use column_store::{ColumnStore, ColumnVoxel};

/// Axis-aligned world box handed to scene management at publish.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub center: Vec3,
    pub size: Vec3,
}

impl Bounds {
    pub fn new(center: Vec3, size: Vec3) -> Self {
        Self { center, size }
    }
}

/// Invalid voxel data. Fatal at publish: meshing does not start.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("I/O error on voxel asset: {0}")]
    IoError(#[from] std::io::Error),

    #[error("voxel asset is truncated or malformed: {0}")]
    MalformedAsset(String),

    #[error("start index prefix is malformed: {0}")]
    BadPrefix(String),

    #[error("column ({x}, {z}) is not sorted by strictly ascending y")]
    UnsortedColumn { x: u32, z: u32 },

    #[error("voxel id 0 stored in column ({x}, {z}) at y = {y}")]
    ZeroId { x: u32, z: u32, y: i32 },

    #[error("coordinate out of packed-field range: ({x}, {y}, {z})")]
    CoordinateOutOfRange { x: u32, z: u32, y: i32 },
}
