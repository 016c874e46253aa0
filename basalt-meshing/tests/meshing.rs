use std::collections::HashSet;

use basalt_config::MesherConfig;
use basalt_core::{MAX_FACES_PER_MESH, Normal, PackedFace, PackedMesh};
use basalt_meshing::{IdentityMerger, mesh_terrain};
use basalt_world::{ColumnStore, ColumnVoxel};

fn store_from_cells(size_x: u32, size_z: u32, cells: &[(u32, i32, u32, u8)]) -> ColumnStore {
    let mut columns: Vec<Vec<(i32, u8)>> =
        vec![Vec::new(); size_x as usize * size_z as usize];
    for &(x, y, z, id) in cells {
        columns[x as usize * size_z as usize + z as usize].push((y, id));
    }
    let mut voxels = Vec::new();
    let mut start_index = vec![0u32];
    for column in &mut columns {
        column.sort();
        for &(y, id) in column.iter() {
            voxels.push(ColumnVoxel::new(y, id));
        }
        start_index.push(voxels.len() as u32);
    }
    ColumnStore::new(size_x, size_z, voxels, start_index).unwrap()
}

fn config(max_horizontal_size: u32, merge_threshold: u32, seen_from_above: bool) -> MesherConfig {
    MesherConfig {
        max_horizontal_size,
        merge_normals_threshold: merge_threshold,
        seen_from_above,
        ..MesherConfig::default()
    }
}

/// Expands a packed face back into its unit (voxel, normal) cells.
fn unit_cells(face: &PackedFace) -> Vec<(i32, i32, i32, u32)> {
    let n = face.normal();
    let (mut x, mut y, mut z) = (face.x() as i32, face.y() as i32, face.z() as i32);
    let (w, h) = (face.width() as i32, face.height() as i32);
    match n.axis() {
        0 => {
            if n.is_positive() {
                x -= 1;
            }
            (0..w)
                .flat_map(|i| (0..h).map(move |j| (x, y + j, z + i, n.bits())))
                .collect()
        }
        1 => {
            if n.is_positive() {
                z -= 1;
            }
            (0..w)
                .flat_map(|i| (0..h).map(move |j| (x + i, y + j, z, n.bits())))
                .collect()
        }
        _ => {
            if n.is_positive() {
                y -= 1;
            }
            (0..w)
                .flat_map(|i| (0..h).map(move |j| (x + i, y, z + j, n.bits())))
                .collect()
        }
    }
}

fn all_unit_cells(meshes: &basalt_meshing::TerrainMeshes) -> HashSet<(i32, i32, i32, u32)> {
    let mut cells = HashSet::new();
    for face in &meshes.faces {
        for cell in unit_cells(face) {
            assert!(cells.insert(cell), "face cell {cell:?} emitted twice");
        }
    }
    cells
}

/// Brute-force face set: every solid cell with an empty neighbor across a
/// side contributes that (cell, side).
fn expected_cells(store: &ColumnStore) -> HashSet<(i32, i32, i32, u32)> {
    let solid = |x: i32, y: i32, z: i32| {
        x >= 0
            && z >= 0
            && x < store.size_x() as i32
            && z < store.size_z() as i32
            && store.get(x as u32, y, z as u32) != 0
    };
    let mut cells = HashSet::new();
    for x in 0..store.size_x() {
        for z in 0..store.size_z() {
            for voxel in store.column(x, z) {
                let (x, y, z) = (x as i32, voxel.y, z as i32);
                for normal in Normal::DIRECTIONAL {
                    let (dx, dy, dz) = match normal {
                        Normal::PosX => (1, 0, 0),
                        Normal::PosZ => (0, 0, 1),
                        Normal::PosY => (0, 1, 0),
                        Normal::NegX => (-1, 0, 0),
                        Normal::NegZ => (0, 0, -1),
                        _ => (0, -1, 0),
                    };
                    if !solid(x + dx, y + dy, z + dz) {
                        cells.insert((x, y, z, normal.bits()));
                    }
                }
            }
        }
    }
    cells
}

fn assert_global_invariants(meshes: &basalt_meshing::TerrainMeshes) {
    let total: u64 = meshes.meshes.iter().map(|m| m.face_count() as u64).sum();
    assert_eq!(total as usize, meshes.faces.len());

    for mesh in &meshes.meshes {
        assert!(mesh.face_count() >= 1);
        assert!(mesh.face_count() <= MAX_FACES_PER_MESH);
        let start = mesh.start_face() as usize;
        let end = start + mesh.face_count() as usize;
        assert!(end <= meshes.faces.len());
        for face in &meshes.faces[start..end] {
            assert!(
                mesh.normal() == Normal::Any || face.normal() == mesh.normal(),
                "face normal {:?} inside {:?} mesh",
                face.normal(),
                mesh.normal()
            );
            // The mesh bounds contain every voxel the face lies on.
            let (lo, hi) = face.voxel_bounds();
            let center = mesh.center();
            let size = mesh.size();
            for axis in 0..3 {
                let (c, s) = (center[axis], size[axis]);
                assert!(lo[axis] as f32 >= c - s - 1e-3);
                assert!(hi[axis] as f32 <= c + s + 1e-3);
            }
        }
    }
}

fn covered_ranges_are_disjoint(meshes: &[PackedMesh], face_len: usize) {
    let mut covered = vec![false; face_len];
    for mesh in meshes {
        let start = mesh.start_face() as usize;
        for slot in &mut covered[start..start + mesh.face_count() as usize] {
            assert!(!*slot, "face referenced by two meshes");
            *slot = true;
        }
    }
    assert!(covered.iter().all(|&c| c), "orphaned face in the table");
}

#[test]
fn single_voxel_produces_six_directional_meshes() {
    let store = store_from_cells(1, 1, &[(0, 0, 0, 1)]);
    let meshes = mesh_terrain(&store, &config(64, 0, false), &IdentityMerger).unwrap();

    assert_eq!(meshes.face_count(), 6);
    assert_eq!(meshes.mesh_count(), 6);
    let normals: HashSet<Normal> = meshes.meshes.iter().map(|m| m.normal()).collect();
    assert_eq!(normals.len(), 6);
    for mesh in &meshes.meshes {
        assert_eq!(mesh.face_count(), 1);
    }

    // The +x face sits on the boundary plane at x = 1.
    let pos_x = meshes
        .faces
        .iter()
        .find(|f| f.normal() == Normal::PosX)
        .unwrap();
    assert_eq!(
        (pos_x.x(), pos_x.y(), pos_x.z(), pos_x.width(), pos_x.height()),
        (1, 0, 0, 1, 1)
    );
    assert_eq!(pos_x.color(), 1);

    assert_global_invariants(&meshes);
}

#[test]
fn flat_slab_merges_into_one_any_mesh() {
    let cells: Vec<(u32, i32, u32, u8)> = (0..4)
        .flat_map(|x| (0..4).map(move |z| (x, 0, z, 2)))
        .collect();
    let store = store_from_cells(4, 4, &cells);
    let meshes = mesh_terrain(&store, &config(64, 256, false), &IdentityMerger).unwrap();

    // Greedy merging collapses the slab to six rectangles: a 4x4 top, a
    // 4x4 bottom and four 4x1 side strips.
    assert_eq!(meshes.face_count(), 6);
    assert_eq!(meshes.mesh_count(), 1);
    assert_eq!(meshes.meshes[0].normal(), Normal::Any);
    assert_eq!(meshes.meshes[0].face_count(), 6);

    let top = meshes
        .faces
        .iter()
        .find(|f| f.normal() == Normal::PosY)
        .unwrap();
    assert_eq!((top.width(), top.height()), (4, 4));

    assert_eq!(all_unit_cells(&meshes), expected_cells(&store));
    assert_global_invariants(&meshes);
}

#[test]
fn seen_from_above_drops_slab_bottom_but_keeps_rim_sides() {
    let cells: Vec<(u32, i32, u32, u8)> = (0..4)
        .flat_map(|x| (0..4).map(move |z| (x, 0, z, 2)))
        .collect();
    let store = store_from_cells(4, 4, &cells);
    let meshes = mesh_terrain(&store, &config(64, 256, true), &IdentityMerger).unwrap();

    // The bottom face sits below the slab's own minimum and goes; the rim
    // sides look out of bounds and stay.
    assert_eq!(meshes.face_count(), 5);
    assert!(meshes.faces.iter().all(|f| f.normal() != Normal::NegY));
    assert_global_invariants(&meshes);
}

#[test]
fn different_ids_do_not_merge() {
    let store = store_from_cells(2, 1, &[(0, 0, 0, 1), (1, 0, 0, 2)]);
    let meshes = mesh_terrain(&store, &config(64, 256, false), &IdentityMerger).unwrap();

    // The shared boundary is hidden; the remaining 5 + 5 faces cannot
    // merge across the id difference.
    assert_eq!(meshes.face_count(), 10);
    let by_color = |c: u8| meshes.faces.iter().filter(|f| f.color() == c).count();
    assert_eq!(by_color(1), 5);
    assert_eq!(by_color(2), 5);
    assert!(meshes.faces.iter().all(|f| f.width() == 1 && f.height() == 1));

    assert_eq!(all_unit_cells(&meshes), expected_cells(&store));
    assert_global_invariants(&meshes);
}

#[test]
fn voxel_column_meshes_as_strips() {
    let store = store_from_cells(1, 1, &[(0, 0, 0, 3), (0, 1, 0, 3), (0, 2, 0, 3)]);
    let meshes = mesh_terrain(&store, &config(64, 256, true), &IdentityMerger).unwrap();

    // Seen from above: the top face plus four 1x3 side strips; the bottom
    // is unobservable.
    assert_eq!(meshes.face_count(), 5);
    let top = meshes
        .faces
        .iter()
        .find(|f| f.normal() == Normal::PosY)
        .unwrap();
    assert_eq!(
        (top.x(), top.y(), top.z(), top.width(), top.height()),
        (0, 3, 0, 1, 1)
    );
    for face in meshes.faces.iter().filter(|f| f.normal() != Normal::PosY) {
        assert_eq!((face.width(), face.height()), (1, 3));
    }
    assert_global_invariants(&meshes);
}

#[test]
fn face_cap_splits_oversized_directional_mesh() {
    // A 128x128 checkerboard of two ids defeats merging: 16384 unit top
    // faces, plus one extra from a gap column holding a second voxel.
    let mut cells = Vec::new();
    for x in 0..128u32 {
        for z in 0..128u32 {
            if (x, z) == (0, 0) {
                continue;
            }
            cells.push((x, 0, z, 1 + ((x + z) % 2) as u8));
        }
    }
    cells.push((0, 0, 0, 1));
    cells.push((0, 2, 0, 1));
    let store = store_from_cells(128, 128, &cells);

    let meshes = mesh_terrain(&store, &config(128, 0, false), &IdentityMerger).unwrap();

    let top_meshes: Vec<&PackedMesh> = meshes
        .meshes
        .iter()
        .filter(|m| m.normal() == Normal::PosY)
        .collect();
    assert_eq!(top_meshes.len(), 2);
    assert_eq!(top_meshes[0].face_count(), MAX_FACES_PER_MESH);
    assert_eq!(top_meshes[1].face_count(), 1);

    // Split siblings publish the union bounds.
    assert_eq!(top_meshes[0].center(), top_meshes[1].center());
    assert_eq!(top_meshes[0].size(), top_meshes[1].size());

    assert_eq!(all_unit_cells(&meshes), expected_cells(&store));
    assert_global_invariants(&meshes);
    covered_ranges_are_disjoint(&meshes.meshes, meshes.faces.len());
}

#[test]
fn coverage_matches_brute_force_on_rough_terrain() {
    // Deterministic rough height field with a few ids, spanning multiple
    // chunks vertically and horizontally.
    let mut heights = Vec::new();
    let mut ids = Vec::new();
    let mut state = 0x9E3779B97F4A7C15u64;
    for _ in 0..96 * 96 {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        heights.push((state % 90) as i32);
        ids.push((state % 5) as u8 + 1);
    }
    let store = ColumnStore::from_height_map(96, 96, &heights, &ids);

    let meshes = mesh_terrain(&store, &config(64, 256, false), &IdentityMerger).unwrap();
    assert_eq!(all_unit_cells(&meshes), expected_cells(&store));
    assert_global_invariants(&meshes);
    covered_ranges_are_disjoint(&meshes.meshes, meshes.faces.len());
}

#[test]
fn tiling_choices_do_not_change_the_face_set() {
    let mut heights = Vec::new();
    let mut ids = Vec::new();
    let mut state = 0xDEADBEEFCAFEu64;
    for _ in 0..80 * 80 {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        heights.push((state % 40) as i32);
        ids.push((state % 3) as u8 + 1);
    }
    let store = ColumnStore::from_height_map(80, 80, &heights, &ids);

    // Tile and job sizes change grouping and parallelism, never coverage.
    // 48 exercises tiles that are not a multiple of the chunk size.
    let baseline = mesh_terrain(&store, &config(64, 256, false), &IdentityMerger).unwrap();
    let expected = all_unit_cells(&baseline);
    for (tile, job) in [(32, None), (48, Some(48)), (128, Some(64)), (80, Some(32))] {
        let cfg = MesherConfig {
            max_horizontal_size: tile,
            job_horizontal_size: job,
            ..config(64, 256, false)
        };
        let meshes = mesh_terrain(&store, &cfg, &IdentityMerger).unwrap();
        assert_eq!(all_unit_cells(&meshes), expected, "tile {tile}, job {job:?}");
        assert_global_invariants(&meshes);
    }
}

#[test]
fn invalid_store_fails_before_meshing() {
    let store = store_from_cells(1, 1, &[(0, 0, 0, 0)]);
    let result = mesh_terrain(&store, &config(64, 256, false), &IdentityMerger);
    assert!(matches!(
        result,
        Err(basalt_meshing::MeshingError::Data(_))
    ));
}

#[test]
fn invalid_config_fails_before_meshing() {
    let store = store_from_cells(1, 1, &[(0, 0, 0, 1)]);
    let result = mesh_terrain(&store, &config(0, 256, false), &IdentityMerger);
    assert!(matches!(
        result,
        Err(basalt_meshing::MeshingError::Config(_))
    ));
}

#[test]
fn empty_store_produces_no_meshes() {
    let store = ColumnStore::new(8, 8, Vec::new(), vec![0; 65]).unwrap();
    let meshes = mesh_terrain(&store, &config(64, 256, false), &IdentityMerger).unwrap();
    assert_eq!(meshes.face_count(), 0);
    assert_eq!(meshes.mesh_count(), 0);
}

#[test]
fn never_merge_strategy_emits_unit_faces() {
    struct NeverMerge;
    impl basalt_meshing::MergeStrategy for NeverMerge {
        fn merge_id(&self, _voxel: ColumnVoxel) -> u8 {
            0
        }
    }

    let cells: Vec<(u32, i32, u32, u8)> = (0..4)
        .flat_map(|x| (0..4).map(move |z| (x, 0, z, 2)))
        .collect();
    let store = store_from_cells(4, 4, &cells);
    let meshes = mesh_terrain(&store, &config(64, 0, false), &NeverMerge).unwrap();

    // No merging at all: 16 tops, 16 bottoms, 16 side cells.
    assert_eq!(meshes.face_count(), 48);
    assert!(meshes.faces.iter().all(|f| f.width() == 1 && f.height() == 1));
    assert_eq!(all_unit_cells(&meshes), expected_cells(&store));
}
