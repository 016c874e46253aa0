//! Per-chunk solid bitsets and binary face extraction.
//!
//! For each of the three sweep axes the chunk's solid cells are packed
//! into 64-bit rows, one bit per cell along the axis. Visible faces are
//! then two bitwise expressions per row: a cell has a face in the
//! positive direction when it is solid and the next cell along the axis
//! is not, and symmetrically for the negative direction. Boundary
//! neighbors come from the column store via the side masks.

use basalt_core::{CHUNK_SIZE, Normal, PackedFace};
use basalt_world::ColumnStore;

use crate::MergeStrategy;

pub(crate) const CS: usize = CHUNK_SIZE;
const CS2: usize = CS * CS;

/// Neighbor solidity at the two ends of one bit row: position -1 and 64.
#[derive(Clone, Copy, Default)]
pub(crate) struct SideMask {
    pub neg: bool,
    pub pos: bool,
}

/// The world region one chunk pass covers: a 64-cube clipped by the mesh
/// tile, the world footprint and the chunk column's y range.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ChunkRegion {
    /// World coordinate of local (0, 0, 0), as [x, y, z].
    pub base: [i32; 3],
    /// Extents along x, y, z, each in 1..=64.
    pub len: [u32; 3],
}

impl ChunkRegion {
    /// (depth, width, height) extents for a sweep axis (0 = x, 1 = z,
    /// 2 = y). Width runs along z for the x axis and along x otherwise;
    /// height runs along z for the y axis and along y otherwise.
    pub fn axis_lens(&self, axis: usize) -> (u32, u32, u32) {
        match axis {
            0 => (self.len[0], self.len[2], self.len[1]),
            1 => (self.len[2], self.len[0], self.len[1]),
            _ => (self.len[1], self.len[0], self.len[2]),
        }
    }

    /// World position of the cell at (depth, width, height) on a sweep
    /// axis.
    pub fn cell(&self, axis: usize, depth: i32, width: i32, height: i32) -> (i32, i32, i32) {
        let (lx, ly, lz) = match axis {
            0 => (depth, height, width),
            1 => (width, height, depth),
            _ => (width, depth, height),
        };
        (self.base[0] + lx, self.base[1] + ly, self.base[2] + lz)
    }
}

/// Per-chunk scratch: one u64 row per (height, width) pair per axis plus
/// the boundary side masks. Allocated once per job and cleared between
/// chunks.
pub(crate) struct ChunkBitset {
    /// rows[axis][height * 64 + width], bits run along the sweep axis.
    rows: [Box<[u64; CS2]>; 3],
    sides: [Box<[SideMask; CS2]>; 3],
}

fn solid_at(store: &ColumnStore, x: i32, y: i32, z: i32) -> bool {
    if x < 0 || z < 0 || x >= store.size_x() as i32 || z >= store.size_z() as i32 {
        return false;
    }
    store.get(x as u32, y, z as u32) != 0
}

impl ChunkBitset {
    pub fn new() -> Self {
        Self {
            rows: [
                Box::new([0; CS2]),
                Box::new([0; CS2]),
                Box::new([0; CS2]),
            ],
            sides: [
                Box::new([SideMask::default(); CS2]),
                Box::new([SideMask::default(); CS2]),
                Box::new([SideMask::default(); CS2]),
            ],
        }
    }

    /// Encodes the region's solid cells and boundary neighbors. Rows
    /// clipped short of 64 fold the clip-boundary neighbor's solidity
    /// into the bit just past the clip; extraction masks faces back to
    /// the region.
    pub fn fill(&mut self, store: &ColumnStore, region: &ChunkRegion) {
        for axis in 0..3 {
            self.rows[axis].fill(0);
        }

        let y_end = region.base[1] + region.len[1] as i32;
        for lx in 0..region.len[0] as i32 {
            for lz in 0..region.len[2] as i32 {
                let wx = (region.base[0] + lx) as u32;
                let wz = (region.base[2] + lz) as u32;
                let column = store.column(wx, wz);
                let from = column.partition_point(|v| v.y < region.base[1]);
                for voxel in &column[from..] {
                    if voxel.y >= y_end {
                        break;
                    }
                    let ly = voxel.y - region.base[1];
                    self.rows[0][(ly as usize) * CS + lz as usize] |= 1 << lx;
                    self.rows[1][(ly as usize) * CS + lx as usize] |= 1 << lz;
                    self.rows[2][(lz as usize) * CS + lx as usize] |= 1 << ly;
                }
            }
        }

        for axis in 0..3 {
            let (len_d, len_w, len_h) = region.axis_lens(axis);
            for h in 0..len_h as i32 {
                for w in 0..len_w as i32 {
                    let i = (h as usize) * CS + w as usize;
                    let (nx, ny, nz) = region.cell(axis, -1, w, h);
                    let neg = solid_at(store, nx, ny, nz);
                    let (px, py, pz) = region.cell(axis, len_d as i32, w, h);
                    let mut pos = false;
                    if solid_at(store, px, py, pz) {
                        if len_d == CS as u32 {
                            pos = true;
                        } else {
                            self.rows[axis][i] |= 1 << len_d;
                        }
                    }
                    self.sides[axis][i] = SideMask { neg, pos };
                }
            }
        }
    }
}

/// Dense merge-id indexing for one job: at most 255 distinct non-zero
/// identifiers key the per-id face planes.
pub(crate) struct IdTable {
    /// index[id] = dense index + 1, 0 = absent.
    index: [u8; 256],
    ids: Vec<u8>,
}

impl IdTable {
    pub fn new() -> Self {
        Self {
            index: [0; 256],
            ids: Vec::new(),
        }
    }

    pub fn insert(&mut self, id: u8) {
        if id != 0 && self.index[id as usize] == 0 {
            self.ids.push(id);
            self.index[id as usize] = self.ids.len() as u8;
        }
    }

    pub fn index_of(&self, id: u8) -> Option<usize> {
        let slot = self.index[id as usize];
        (slot != 0).then(|| slot as usize - 1)
    }

    pub fn id_at(&self, index: usize) -> u8 {
        self.ids[index]
    }

    pub fn count(&self) -> usize {
        self.ids.len()
    }
}

/// One 64x64 bit plane per (normal, merge id, depth): the faces waiting
/// for the greedy pass. A single contiguous allocation, normal group
/// outermost; words are indexed by the height coordinate, bits by width.
pub(crate) struct PlaneSet {
    words: Vec<u64>,
    id_count: usize,
}

impl PlaneSet {
    pub fn new(id_count: usize) -> Self {
        Self {
            words: vec![0; 6 * id_count.max(1) * CS2],
            id_count: id_count.max(1),
        }
    }

    #[inline]
    fn offset(&self, normal: usize, id_idx: usize, depth: usize) -> usize {
        ((normal * self.id_count + id_idx) * CS + depth) * CS
    }

    #[inline]
    pub fn set(&mut self, normal: usize, id_idx: usize, depth: usize, height: usize, width: usize) {
        let base = self.offset(normal, id_idx, depth);
        self.words[base + height] |= 1 << width;
    }

    /// The 64 height rows of one plane.
    pub fn rows_mut(&mut self, normal: usize, id_idx: usize, depth: usize) -> &mut [u64] {
        let base = self.offset(normal, id_idx, depth);
        &mut self.words[base..base + CS]
    }
}

fn normal_of(axis: usize, positive: bool) -> Normal {
    let bits = if positive { axis } else { axis + 3 };
    Normal::from_bits(bits as u32)
}

fn step(normal: Normal) -> (i32, i32, i32) {
    match normal {
        Normal::PosX => (1, 0, 0),
        Normal::PosZ => (0, 0, 1),
        Normal::PosY => (0, 1, 0),
        Normal::NegX => (-1, 0, 0),
        Normal::NegZ => (0, 0, -1),
        _ => (0, -1, 0),
    }
}

/// Builds the packed face for a greedy rectangle of a plane: plane-local
/// (x, y) are the width and height coordinates of the rectangle's corner
/// cell. Positive normals shift the stored position +1 along the axis so
/// the quad sits on the boundary it faces across.
pub(crate) fn face_from_rect(
    normal: Normal,
    region: &ChunkRegion,
    depth: u32,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    color: u8,
) -> PackedFace {
    let (mut vx, mut vy, mut vz) = region.cell(normal.axis(), depth as i32, x as i32, y as i32);
    if normal.is_positive() {
        match normal.axis() {
            0 => vx += 1,
            1 => vz += 1,
            _ => vy += 1,
        }
    }
    PackedFace::new(vx as u32, vy as u32, vz as u32, width, height, normal, color)
}

/// Derives the visible-face planes of a filled bitset.
///
/// When `seen_from_above` is set, top faces are always kept while bottom
/// and side faces are dropped whenever their neighbor cell sits below the
/// lowest stored cell of the neighbor's column (the camera cannot observe
/// them). Faces of voxels whose merge id is 0 bypass the planes and come
/// out as unit quads.
#[allow(clippy::too_many_arguments)]
pub(crate) fn extract_planes<M: MergeStrategy>(
    bits: &ChunkBitset,
    planes: &mut PlaneSet,
    unit_faces: &mut [Vec<PackedFace>; 6],
    store: &ColumnStore,
    ids: &IdTable,
    merger: &M,
    region: &ChunkRegion,
    seen_from_above: bool,
) {
    for axis in 0..3 {
        let (len_d, len_w, len_h) = region.axis_lens(axis);
        let depth_mask = if len_d == CS as u32 {
            u64::MAX
        } else {
            (1u64 << len_d) - 1
        };

        for h in 0..len_h as i32 {
            for w in 0..len_w as i32 {
                let i = (h as usize) * CS + w as usize;
                let row = bits.rows[axis][i];
                if row == 0 {
                    continue;
                }
                let side = bits.sides[axis][i];

                let shifted = (row >> 1) | ((side.pos as u64) << 63);
                let mut faces = row & !shifted & depth_mask;
                while faces != 0 {
                    let d = faces.trailing_zeros();
                    faces &= faces - 1;
                    visit_face(
                        planes,
                        unit_faces,
                        store,
                        ids,
                        merger,
                        region,
                        seen_from_above,
                        normal_of(axis, true),
                        d,
                        w,
                        h,
                    );
                }

                let shifted = (row << 1) | side.neg as u64;
                let mut faces = row & !shifted & depth_mask;
                while faces != 0 {
                    let d = faces.trailing_zeros();
                    faces &= faces - 1;
                    visit_face(
                        planes,
                        unit_faces,
                        store,
                        ids,
                        merger,
                        region,
                        seen_from_above,
                        normal_of(axis, false),
                        d,
                        w,
                        h,
                    );
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn visit_face<M: MergeStrategy>(
    planes: &mut PlaneSet,
    unit_faces: &mut [Vec<PackedFace>; 6],
    store: &ColumnStore,
    ids: &IdTable,
    merger: &M,
    region: &ChunkRegion,
    seen_from_above: bool,
    normal: Normal,
    depth: u32,
    w: i32,
    h: i32,
) {
    let (vx, vy, vz) = region.cell(normal.axis(), depth as i32, w, h);

    if seen_from_above && normal != Normal::PosY {
        let (dx, dy, dz) = step(normal);
        let (nx, ny, nz) = (vx + dx, vy + dy, vz + dz);
        if nx >= 0
            && nz >= 0
            && nx < store.size_x() as i32
            && nz < store.size_z() as i32
            && ny < store.min_y(nx as u32, nz as u32)
        {
            return;
        }
    }

    let Some(voxel) = store.find(vx as u32, vy, vz as u32) else {
        return;
    };
    let merge_id = merger.merge_id(voxel);
    if merge_id == 0 {
        let face = face_from_rect(normal, region, depth, w as u32, h as u32, 1, 1, 0);
        unit_faces[normal.bits() as usize].push(face);
        return;
    }
    let Some(id_idx) = ids.index_of(merge_id) else {
        return;
    };
    planes.set(
        normal.bits() as usize,
        id_idx,
        depth as usize,
        h as usize,
        w as usize,
    );
}
