//! Two-level tiling and the parallel meshing entry point.
//!
//! Mesh tiles (`max_horizontal_size` wide) are the unit that becomes one
//! directional-mesh family; job tiles (`job_horizontal_size`) batch mesh
//! tiles into rayon work items. Each job owns its scratch bitsets, planes
//! and id table; the only shared state is the read-only store. Results are
//! flattened single-threaded after the join, so either the whole publish
//! succeeds or nothing is produced.

use std::collections::BTreeMap;

use log::{debug, info};
use rayon::prelude::*;

use basalt_config::MesherConfig;
use basalt_core::{CHUNK_SIZE, Normal, PackedFace, PackedMesh};
use basalt_world::ColumnStore;

use crate::assemble::{MeshAssembler, TileMeshes};
use crate::bitset::{ChunkBitset, ChunkRegion, IdTable, PlaneSet, extract_planes, face_from_rect};
use crate::greedy::pack_plane;
use crate::{MergeStrategy, MeshingError};

/// The flattened output of one publish: the global face table and the mesh
/// table referencing it. Immutable once built.
pub struct TerrainMeshes {
    pub faces: Vec<PackedFace>,
    pub meshes: Vec<PackedMesh>,
}

impl TerrainMeshes {
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }
}

/// Meshes the whole store: validates inputs, fans job tiles out over
/// rayon, and flattens the per-tile results in deterministic tile order.
pub fn mesh_terrain<M: MergeStrategy>(
    store: &ColumnStore,
    config: &MesherConfig,
    merger: &M,
) -> Result<TerrainMeshes, MeshingError> {
    config.validate()?;
    store.validate()?;

    let tile = config.max_horizontal_size;
    let tiles_x = store.size_x().div_ceil(tile);
    let tiles_z = store.size_z().div_ceil(tile);
    let job = config.job_horizontal_size.unwrap_or(u32::MAX);

    // Mesh tiles grouped by the job tile containing their origin, in
    // deterministic job order.
    let mut jobs: BTreeMap<(u32, u32), Vec<(u32, u32)>> = BTreeMap::new();
    for tx in 0..tiles_x {
        for tz in 0..tiles_z {
            let key = (tx * tile / job, tz * tile / job);
            jobs.entry(key).or_default().push((tx, tz));
        }
    }
    let jobs: Vec<Vec<(u32, u32)>> = jobs.into_values().collect();
    debug!(
        "meshing {} columns as {} mesh tiles in {} jobs",
        store.size_x() as u64 * store.size_z() as u64,
        tiles_x as u64 * tiles_z as u64,
        jobs.len()
    );

    let results: Vec<Result<Vec<TileMeshes>, MeshingError>> = jobs
        .par_iter()
        .map(|tiles| mesh_job(store, config, merger, tiles))
        .collect();

    let mut faces = Vec::new();
    let mut meshes = Vec::new();
    for job_tiles in results {
        for tile in job_tiles? {
            if faces.len() + tile.faces.len() > u32::MAX as usize {
                return Err(MeshingError::CapacityExceeded);
            }
            let offset = faces.len() as u32;
            for mut mesh in tile.meshes {
                mesh.data2 += offset;
                meshes.push(mesh);
            }
            faces.extend(tile.faces);
        }
    }

    info!(
        "meshed terrain: {} faces in {} meshes",
        faces.len(),
        meshes.len()
    );
    Ok(TerrainMeshes { faces, meshes })
}

fn mesh_job<M: MergeStrategy>(
    store: &ColumnStore,
    config: &MesherConfig,
    merger: &M,
    tiles: &[(u32, u32)],
) -> Result<Vec<TileMeshes>, MeshingError> {
    let tile_size = config.max_horizontal_size;

    // Dense merge-id table over the whole job, keying the face planes.
    let mut ids = IdTable::new();
    for &(tx, tz) in tiles {
        let (ox, oz, ext_x, ext_z) = tile_extent(store, tile_size, tx, tz);
        for x in ox..ox + ext_x {
            for z in oz..oz + ext_z {
                for voxel in store.column(x, z) {
                    ids.insert(merger.merge_id(*voxel));
                }
            }
        }
    }

    // Scratch shared by every chunk of the job; the planes clean themselves
    // as the greedy pass consumes them.
    let mut bits = ChunkBitset::new();
    let mut planes = PlaneSet::new(ids.count());
    let mut unit_faces: [Vec<PackedFace>; 6] = Default::default();

    tiles
        .iter()
        .map(|&(tx, tz)| {
            mesh_tile(
                store,
                config,
                merger,
                &ids,
                &mut bits,
                &mut planes,
                &mut unit_faces,
                tx,
                tz,
            )
        })
        .collect()
}

fn tile_extent(store: &ColumnStore, tile_size: u32, tx: u32, tz: u32) -> (u32, u32, u32, u32) {
    let ox = tx * tile_size;
    let oz = tz * tile_size;
    let ext_x = tile_size.min(store.size_x() - ox);
    let ext_z = tile_size.min(store.size_z() - oz);
    (ox, oz, ext_x, ext_z)
}

#[allow(clippy::too_many_arguments)]
fn mesh_tile<M: MergeStrategy>(
    store: &ColumnStore,
    config: &MesherConfig,
    merger: &M,
    ids: &IdTable,
    bits: &mut ChunkBitset,
    planes: &mut PlaneSet,
    unit_faces: &mut [Vec<PackedFace>; 6],
    tx: u32,
    tz: u32,
) -> Result<TileMeshes, MeshingError> {
    let (ox, oz, ext_x, ext_z) = tile_extent(store, config.max_horizontal_size, tx, tz);
    let mut assembler = MeshAssembler::new(config.merge_normals_threshold);

    for cbx in (0..ext_x).step_by(CHUNK_SIZE) {
        for cbz in (0..ext_z).step_by(CHUNK_SIZE) {
            let len_x = (CHUNK_SIZE as u32).min(ext_x - cbx);
            let len_z = (CHUNK_SIZE as u32).min(ext_z - cbz);

            // Inclusive y range over the chunk's columns; empty ranges are
            // skipped entirely.
            let mut y_min = i32::MAX;
            let mut y_max = i32::MIN;
            for x in ox + cbx..ox + cbx + len_x {
                for z in oz + cbz..oz + cbz + len_z {
                    y_min = y_min.min(store.min_y(x, z));
                    y_max = y_max.max(store.max_y(x, z));
                }
            }
            if y_min > y_max {
                continue;
            }

            let span_y = y_max - y_min + 1;
            let chunks_y = (span_y + CHUNK_SIZE as i32 - 1) / CHUNK_SIZE as i32;
            for cy in 0..chunks_y {
                let base_y = y_min + cy * CHUNK_SIZE as i32;
                let len_y = (CHUNK_SIZE as i32).min(y_max + 1 - base_y) as u32;
                let region = ChunkRegion {
                    base: [(ox + cbx) as i32, base_y, (oz + cbz) as i32],
                    len: [len_x, len_y, len_z],
                };

                bits.fill(store, &region);
                extract_planes(
                    bits,
                    planes,
                    unit_faces,
                    store,
                    ids,
                    merger,
                    &region,
                    config.seen_from_above,
                );

                for n in 0..6 {
                    let normal = Normal::DIRECTIONAL[n];
                    let start = assembler.mark();
                    for face in unit_faces[n].drain(..) {
                        assembler.push_face(face);
                    }
                    let (len_d, _, _) = region.axis_lens(normal.axis());
                    for id_idx in 0..ids.count() {
                        for depth in 0..len_d {
                            let color = ids.id_at(id_idx);
                            let rows = planes.rows_mut(n, id_idx, depth as usize);
                            pack_plane(rows, |x, y, w, h| {
                                assembler.push_face(face_from_rect(
                                    normal, &region, depth, x, y, w, h, color,
                                ));
                            });
                        }
                    }
                    assembler.close_part(normal, start)?;
                }
            }
        }
    }

    assembler.finish()
}
