//! Face-to-mesh grouping for one mesh tile.
//!
//! Faces arrive per chunk, grouped by normal. Each normal keeps a linked
//! list of parts (ranges into the tile's face list) in a flat index arena,
//! so a mesh grows without moving faces. Closing the tile flattens the
//! lists into the published order.

use basalt_core::{MAX_FACES_PER_MESH, Normal, PackedFace, PackedMesh};
use glam::Vec3;

use crate::MeshingError;

const NO_PART: u32 = u32::MAX;

struct MeshPart {
    start: u32,
    end: u32,
    next: u32,
}

struct NormalHead {
    head: u32,
    face_count: u32,
    min: [i32; 3],
    max: [i32; 3],
}

impl NormalHead {
    fn new() -> Self {
        Self {
            head: NO_PART,
            face_count: 0,
            min: [i32::MAX; 3],
            max: [i32::MIN; 3],
        }
    }
}

struct FinishedMesh {
    normal: Normal,
    ranges: Vec<(u32, u32)>,
    face_count: u32,
    min: [i32; 3],
    max: [i32; 3],
}

/// Faces and meshes of one finished tile. Mesh `start_face` values are
/// tile-local; the driver rebases them into the global face table.
pub(crate) struct TileMeshes {
    pub faces: Vec<PackedFace>,
    pub meshes: Vec<PackedMesh>,
}

pub(crate) struct MeshAssembler {
    faces: Vec<PackedFace>,
    parts: Vec<MeshPart>,
    heads: [NormalHead; 6],
    finished: Vec<FinishedMesh>,
    merge_threshold: u32,
}

impl MeshAssembler {
    pub fn new(merge_threshold: u32) -> Self {
        Self {
            faces: Vec::new(),
            parts: Vec::new(),
            heads: [
                NormalHead::new(),
                NormalHead::new(),
                NormalHead::new(),
                NormalHead::new(),
                NormalHead::new(),
                NormalHead::new(),
            ],
            finished: Vec::new(),
            merge_threshold: merge_threshold.min(MAX_FACES_PER_MESH),
        }
    }

    /// Current end of the tile face list; pass back to [`close_part`].
    pub fn mark(&self) -> u32 {
        self.faces.len() as u32
    }

    pub fn push_face(&mut self, face: PackedFace) {
        self.faces.push(face);
    }

    /// Closes the faces emitted since `start` as one part of `normal`'s
    /// current mesh. A part that would push the mesh past the face cap is
    /// split at the cap: the filled mesh is finalized and the overflow
    /// seeds its successor. Bounds accumulate across the split, so sibling
    /// meshes publish the union.
    pub fn close_part(&mut self, normal: Normal, start: u32) -> Result<(), MeshingError> {
        let end = self.faces.len();
        if end > u32::MAX as usize {
            return Err(MeshingError::CapacityExceeded);
        }
        let end = end as u32;
        if end == start {
            return Ok(());
        }

        let n = normal.bits() as usize;
        for face in &self.faces[start as usize..end as usize] {
            let (lo, hi) = face.voxel_bounds();
            for axis in 0..3 {
                self.heads[n].min[axis] = self.heads[n].min[axis].min(lo[axis]);
                self.heads[n].max[axis] = self.heads[n].max[axis].max(hi[axis]);
            }
        }

        let mut start = start;
        loop {
            let room = MAX_FACES_PER_MESH - self.heads[n].face_count;
            let len = end - start;
            if len <= room {
                if len > 0 {
                    self.push_part(n, start, end);
                }
                return Ok(());
            }
            if room > 0 {
                self.push_part(n, start, start + room);
                start += room;
            }
            self.finalize_head(n);
        }
    }

    fn push_part(&mut self, n: usize, start: u32, end: u32) {
        let next = self.heads[n].head;
        self.parts.push(MeshPart { start, end, next });
        self.heads[n].head = (self.parts.len() - 1) as u32;
        self.heads[n].face_count += end - start;
    }

    /// Flattened part ranges of a head, newest part first.
    fn ranges_of(&self, n: usize) -> Vec<(u32, u32)> {
        let mut ranges = Vec::new();
        let mut i = self.heads[n].head;
        while i != NO_PART {
            let part = &self.parts[i as usize];
            ranges.push((part.start, part.end));
            i = part.next;
        }
        ranges
    }

    fn finalize_head(&mut self, n: usize) {
        if self.heads[n].face_count == 0 {
            return;
        }
        let ranges = self.ranges_of(n);
        let head = &mut self.heads[n];
        self.finished.push(FinishedMesh {
            normal: Normal::DIRECTIONAL[n],
            ranges,
            face_count: head.face_count,
            min: head.min,
            max: head.max,
        });
        head.head = NO_PART;
        head.face_count = 0;
        // min/max intentionally kept: a mesh split by the cap shares its
        // bounds with its successor.
    }

    /// Closes the tile: merges the six heads into one any-normal mesh when
    /// the tile stayed below the merge threshold, otherwise finalizes each
    /// head on its own, then flattens everything into publish order.
    pub fn finish(mut self) -> Result<TileMeshes, MeshingError> {
        let total: u32 = self.heads.iter().map(|h| h.face_count).sum();
        if total > 0 && total < self.merge_threshold {
            let mut ranges = Vec::new();
            let mut min = [i32::MAX; 3];
            let mut max = [i32::MIN; 3];
            for n in 0..6 {
                if self.heads[n].face_count == 0 {
                    continue;
                }
                ranges.extend(self.ranges_of(n));
                for axis in 0..3 {
                    min[axis] = min[axis].min(self.heads[n].min[axis]);
                    max[axis] = max[axis].max(self.heads[n].max[axis]);
                }
            }
            self.finished.push(FinishedMesh {
                normal: Normal::Any,
                ranges,
                face_count: total,
                min,
                max,
            });
        } else {
            for n in 0..6 {
                self.finalize_head(n);
            }
        }

        let mut faces = Vec::with_capacity(self.faces.len());
        let mut meshes = Vec::with_capacity(self.finished.len());
        for mesh in &self.finished {
            let start_face = faces.len() as u32;
            for &(start, end) in &mesh.ranges {
                faces.extend_from_slice(&self.faces[start as usize..end as usize]);
            }
            let min = Vec3::new(mesh.min[0] as f32, mesh.min[1] as f32, mesh.min[2] as f32);
            let max = Vec3::new(mesh.max[0] as f32, mesh.max[1] as f32, mesh.max[2] as f32);
            meshes.push(PackedMesh::new(
                (min + max) * 0.5,
                (max - min) * 0.5,
                mesh.normal,
                mesh.face_count,
                start_face,
            ));
        }
        Ok(TileMeshes { faces, meshes })
    }
}
