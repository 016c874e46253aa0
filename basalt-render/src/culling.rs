//! Camera inputs and the CPU mirror of the culling kernel.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use basalt_core::{Normal, PackedMesh};

/// One frustum plane as `(n, d)`: a point `p` is inside the half-space
/// when `n . p + d >= 0`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    pub fn new(normal: Vec3, d: f32) -> Self {
        Self { normal, d }
    }

    /// Plane through `point` with the given inward normal.
    pub fn through(normal: Vec3, point: Vec3) -> Self {
        Self {
            normal,
            d: -normal.dot(point),
        }
    }

    fn to_vec4(self) -> [f32; 4] {
        [self.normal.x, self.normal.y, self.normal.z, self.d]
    }
}

/// Per-frame camera inputs: the world position and exactly five frustum
/// planes (far, left, right, down, up, matching the order frustum
/// extractors present them). The near plane is not tested.
#[derive(Clone, Copy, Debug)]
pub struct CameraData {
    pub position: Vec3,
    pub far: Plane,
    pub left: Plane,
    pub right: Plane,
    pub down: Plane,
    pub up: Plane,
}

impl CameraData {
    pub(crate) fn to_uniform(self) -> CameraUniform {
        CameraUniform {
            camera_position: [self.position.x, self.position.y, self.position.z, 0.0],
            camera_far_plane: self.far.to_vec4(),
            camera_left_plane: self.left.to_vec4(),
            camera_right_plane: self.right.to_vec4(),
            camera_down_plane: self.down.to_vec4(),
            camera_up_plane: self.up.to_vec4(),
        }
    }
}

/// GPU layout of [`CameraData`]; matches the `CameraData` uniform struct
/// in `cull.wgsl` (vec4-aligned fields).
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct CameraUniform {
    camera_position: [f32; 4],
    camera_far_plane: [f32; 4],
    camera_left_plane: [f32; 4],
    camera_right_plane: [f32; 4],
    camera_down_plane: [f32; 4],
    camera_up_plane: [f32; 4],
}

/// CPU mirror of the culling kernel, one mesh at a time: returns whether
/// the mesh survives the orientation and frustum tests. The property
/// tests run this against randomized inputs; the GPU tests compare the
/// kernel's output against it.
pub fn cull_mesh(mesh: &PackedMesh, camera: &CameraData) -> bool {
    if mesh.is_none() {
        return false;
    }
    let center = mesh.center();
    let size = mesh.size();

    // Orientation: the mesh's back face lies at center - n * size; when
    // that point is in front of the camera along n, every face points
    // away. Merged meshes span all normals and skip the test.
    let normal = mesh.normal();
    if normal != Normal::Any {
        let n = normal.vector();
        if (center - n * size - camera.position).dot(n) > 0.0 {
            return false;
        }
    }

    for plane in [camera.far, camera.left, camera.right, camera.down, camera.up] {
        let closest = center + size * plane.normal.signum();
        if plane.normal.dot(closest) + plane.d < 0.0 {
            return false;
        }
    }
    true
}
