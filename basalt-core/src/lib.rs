//! Packed data records shared between the CPU meshing pipeline and the GPU
//! culling kernel.
//!
//! Faces and meshes cross the CPU/GPU boundary as raw bytes, so both types
//! are `Pod` with an explicit bit layout that the WGSL side mirrors.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Chunk edge length in voxels. One chunk row of solid bits is one `u64`.
pub const CHUNK_SIZE: usize = 64;

/// Hard per-mesh face cap, dictated by the shared 16-bit index buffer:
/// `6 * 16384` indices address `4 * 16384 = 65536` vertices.
pub const MAX_FACES_PER_MESH: u32 = 16384;

/// Thread count per culling workgroup; the published mesh table is padded to
/// a multiple of this.
pub const CULLING_GROUP_SIZE: u32 = 64;

/// Largest x/z coordinate a packed face can carry (13 bits).
pub const MAX_HORIZONTAL_COORD: u32 = (1 << 13) - 1;

/// Largest y coordinate a packed face can carry (9 bits).
pub const MAX_VERTICAL_COORD: u32 = (1 << 9) - 1;

/// One of the six axis-aligned face directions, plus the two grouping
/// sentinels used by the mesh table.
///
/// The numeric encoding is shared with the culling kernel: the positive
/// directions first (+x, +z, +y), then their negatives in the same axis
/// order, then `Any` (a merged multi-normal mesh) and `None` (table
/// padding, never rendered).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Normal {
    PosX = 0,
    PosZ = 1,
    PosY = 2,
    NegX = 3,
    NegZ = 4,
    NegY = 5,
    Any = 6,
    None = 7,
}

impl Normal {
    /// The six renderable directions, in encoding order.
    pub const DIRECTIONAL: [Normal; 6] = [
        Normal::PosX,
        Normal::PosZ,
        Normal::PosY,
        Normal::NegX,
        Normal::NegZ,
        Normal::NegY,
    ];

    pub fn from_bits(bits: u32) -> Normal {
        match bits & 7 {
            0 => Normal::PosX,
            1 => Normal::PosZ,
            2 => Normal::PosY,
            3 => Normal::NegX,
            4 => Normal::NegZ,
            5 => Normal::NegY,
            6 => Normal::Any,
            _ => Normal::None,
        }
    }

    pub fn bits(self) -> u32 {
        self as u32
    }

    /// Sweep axis of a directional normal: 0 = x, 1 = z, 2 = y.
    pub fn axis(self) -> usize {
        debug_assert!((self as u8) < 6, "axis() on a non-directional normal");
        (self as usize) % 3
    }

    pub fn is_positive(self) -> bool {
        (self as u8) < 3
    }

    /// Unit vector of a directional normal.
    pub fn vector(self) -> Vec3 {
        match self {
            Normal::PosX => Vec3::X,
            Normal::PosZ => Vec3::Z,
            Normal::PosY => Vec3::Y,
            Normal::NegX => Vec3::NEG_X,
            Normal::NegZ => Vec3::NEG_Z,
            Normal::NegY => Vec3::NEG_Y,
            Normal::Any | Normal::None => Vec3::ZERO,
        }
    }
}

/// A single visible quad, packed to 8 bytes.
///
/// Bit layout (two little-endian words):
/// `word0`: x(13) | z(13); `word1`: y(9) | width-1(6) | height-1(6) |
/// normal(3) | color(8).
///
/// The stored position is the corner of the face's minimum voxel, with the
/// coordinate along the normal axis shifted +1 for positive normals so the
/// quad sits on the voxel boundary it faces across. Width runs along z for
/// x-faces and along x otherwise; height runs along z for y-faces and along
/// y otherwise. `color` carries the merge identifier of the voxels behind
/// the face.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct PackedFace {
    pub word0: u32,
    pub word1: u32,
}

impl PackedFace {
    pub fn new(x: u32, y: u32, z: u32, width: u32, height: u32, normal: Normal, color: u8) -> Self {
        debug_assert!(x <= MAX_HORIZONTAL_COORD && z <= MAX_HORIZONTAL_COORD);
        debug_assert!(y <= MAX_VERTICAL_COORD);
        debug_assert!((1..=64).contains(&width) && (1..=64).contains(&height));
        Self {
            word0: x | (z << 13),
            word1: y
                | ((width - 1) << 9)
                | ((height - 1) << 15)
                | (normal.bits() << 21)
                | ((color as u32) << 24),
        }
    }

    pub fn x(&self) -> u32 {
        self.word0 & 0x1FFF
    }

    pub fn z(&self) -> u32 {
        (self.word0 >> 13) & 0x1FFF
    }

    pub fn y(&self) -> u32 {
        self.word1 & 0x1FF
    }

    pub fn width(&self) -> u32 {
        ((self.word1 >> 9) & 0x3F) + 1
    }

    pub fn height(&self) -> u32 {
        ((self.word1 >> 15) & 0x3F) + 1
    }

    pub fn normal(&self) -> Normal {
        Normal::from_bits(self.word1 >> 21)
    }

    pub fn color(&self) -> u8 {
        (self.word1 >> 24) as u8
    }

    /// Bounds of the solid voxels this face lies on: inclusive minimum
    /// corner and exclusive maximum corner, in voxel units (one voxel spans
    /// one world unit).
    pub fn voxel_bounds(&self) -> ([i32; 3], [i32; 3]) {
        let n = self.normal();
        let (w, h) = (self.width() as i32, self.height() as i32);
        let mut min = [self.x() as i32, self.y() as i32, self.z() as i32];
        let mut extent = [1i32; 3];
        match n.axis() {
            0 => {
                // x-face: width along z, height along y
                if n.is_positive() {
                    min[0] -= 1;
                }
                extent[2] = w;
                extent[1] = h;
            }
            1 => {
                // z-face: width along x, height along y
                if n.is_positive() {
                    min[2] -= 1;
                }
                extent[0] = w;
                extent[1] = h;
            }
            _ => {
                // y-face: width along x, height along z
                if n.is_positive() {
                    min[1] -= 1;
                }
                extent[0] = w;
                extent[2] = h;
            }
        }
        let max = [min[0] + extent[0], min[1] + extent[1], min[2] + extent[2]];
        (min, max)
    }
}

/// One entry of the GPU mesh table, 32 bytes, mirrored by the culling
/// kernel's `MeshData` struct.
///
/// `center ± size` bounds every voxel covered by the mesh's faces; the
/// faces themselves occupy `[start_face, start_face + face_count)` of the
/// global face table.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct PackedMesh {
    pub center: [f32; 3],
    /// normal(3, low bits) | face_count(29)
    pub data1: u32,
    pub size: [f32; 3],
    /// start_face(32)
    pub data2: u32,
}

impl PackedMesh {
    pub fn new(center: Vec3, size: Vec3, normal: Normal, face_count: u32, start_face: u32) -> Self {
        debug_assert!(face_count < (1 << 29));
        Self {
            center: center.to_array(),
            data1: normal.bits() | (face_count << 3),
            size: size.to_array(),
            data2: start_face,
        }
    }

    /// Table padding entry: `Normal::None`, zero faces, zero size. The
    /// culling kernel drops these before any test.
    pub fn none() -> Self {
        Self::new(Vec3::ZERO, Vec3::ZERO, Normal::None, 0, 0)
    }

    pub fn center(&self) -> Vec3 {
        Vec3::from_array(self.center)
    }

    pub fn size(&self) -> Vec3 {
        Vec3::from_array(self.size)
    }

    pub fn normal(&self) -> Normal {
        Normal::from_bits(self.data1)
    }

    pub fn face_count(&self) -> u32 {
        self.data1 >> 3
    }

    pub fn start_face(&self) -> u32 {
        self.data2
    }

    pub fn is_none(&self) -> bool {
        self.normal() == Normal::None || self.face_count() == 0
    }
}
