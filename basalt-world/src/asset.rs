//! Persisted voxel asset: the little-endian sequential layout the terrain
//! pipeline bakes its stores into.
//!
//! Layout: 6 f32 bounds (center, size), i32 size_x, i32 size_z, i32
//! n_voxels, then n_voxels 8-byte records (i32 y, u8 id, 3 pad bytes, the
//! size of the C-layout pair), then the `size_x * size_z + 1` i32 start
//! index prefix.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use glam::Vec3;

use crate::{Bounds, ColumnStore, ColumnVoxel, DataError};

#[derive(Debug)]
pub struct VoxelAsset {
    pub bounds: Bounds,
    pub store: ColumnStore,
}

fn read_exact(r: &mut impl Read, buf: &mut [u8]) -> Result<(), DataError> {
    r.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            DataError::MalformedAsset("unexpected end of input".to_string())
        } else {
            DataError::IoError(e)
        }
    })
}

fn read_i32(r: &mut impl Read) -> Result<i32, DataError> {
    let mut buf = [0u8; 4];
    read_exact(r, &mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_f32(r: &mut impl Read) -> Result<f32, DataError> {
    let mut buf = [0u8; 4];
    read_exact(r, &mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

fn read_vec3(r: &mut impl Read) -> Result<Vec3, DataError> {
    Ok(Vec3::new(read_f32(r)?, read_f32(r)?, read_f32(r)?))
}

pub fn read_asset<R: Read>(mut r: R) -> Result<VoxelAsset, DataError> {
    let center = read_vec3(&mut r)?;
    let size = read_vec3(&mut r)?;

    let size_x = read_i32(&mut r)?;
    let size_z = read_i32(&mut r)?;
    let n_voxels = read_i32(&mut r)?;
    if size_x < 0 || size_z < 0 || n_voxels < 0 {
        return Err(DataError::MalformedAsset(format!(
            "negative dimension: size_x = {size_x}, size_z = {size_z}, n_voxels = {n_voxels}"
        )));
    }

    let mut voxels = Vec::with_capacity(n_voxels as usize);
    let mut record = [0u8; std::mem::size_of::<ColumnVoxel>()];
    for _ in 0..n_voxels {
        read_exact(&mut r, &mut record)?;
        let y = i32::from_le_bytes([record[0], record[1], record[2], record[3]]);
        voxels.push(ColumnVoxel::new(y, record[4]));
    }

    let columns = size_x as usize * size_z as usize;
    let mut start_index = Vec::with_capacity(columns + 1);
    for _ in 0..columns + 1 {
        let entry = read_i32(&mut r)?;
        if entry < 0 {
            return Err(DataError::MalformedAsset(format!(
                "negative start index entry {entry}"
            )));
        }
        start_index.push(entry as u32);
    }

    let store = ColumnStore::new(size_x as u32, size_z as u32, voxels, start_index)?;
    Ok(VoxelAsset {
        bounds: Bounds::new(center, size),
        store,
    })
}

pub fn write_asset<W: Write>(
    mut w: W,
    bounds: &Bounds,
    store: &ColumnStore,
) -> Result<(), DataError> {
    for f in [
        bounds.center.x,
        bounds.center.y,
        bounds.center.z,
        bounds.size.x,
        bounds.size.y,
        bounds.size.z,
    ] {
        w.write_all(&f.to_le_bytes())?;
    }

    w.write_all(&(store.size_x() as i32).to_le_bytes())?;
    w.write_all(&(store.size_z() as i32).to_le_bytes())?;
    w.write_all(&(store.len() as i32).to_le_bytes())?;

    for voxel in store.voxels() {
        w.write_all(&voxel.y.to_le_bytes())?;
        w.write_all(&[voxel.id, 0, 0, 0])?;
    }

    for &entry in store.start_index() {
        w.write_all(&(entry as i32).to_le_bytes())?;
    }

    Ok(())
}

pub fn read_asset_file<P: AsRef<Path>>(path: P) -> Result<VoxelAsset, DataError> {
    read_asset(BufReader::new(File::open(path)?))
}

pub fn write_asset_file<P: AsRef<Path>>(
    path: P,
    bounds: &Bounds,
    store: &ColumnStore,
) -> Result<(), DataError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_asset(&mut writer, bounds, store)?;
    writer.flush()?;
    Ok(())
}
