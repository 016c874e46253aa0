use basalt_world::{
    read_asset, read_asset_file, write_asset, write_asset_file, Bounds, ColumnStore, DataError,
};
use glam::Vec3;
use tempfile::TempDir;

fn terrain_store() -> ColumnStore {
    let heights: Vec<i32> = (0..256).map(|i| ((i * 7) % 13) as i32).collect();
    let ids: Vec<u8> = (0..256).map(|i| (i % 5) as u8 + 1).collect();
    ColumnStore::from_height_map(16, 16, &heights, &ids)
}

fn terrain_bounds() -> Bounds {
    Bounds::new(Vec3::new(8.0, 6.5, 8.0), Vec3::new(8.0, 6.5, 8.0))
}

#[test]
fn roundtrip_through_memory() {
    let store = terrain_store();
    let bounds = terrain_bounds();

    let mut bytes = Vec::new();
    write_asset(&mut bytes, &bounds, &store).unwrap();

    // Header (24 + 12 bytes) + 8 bytes per voxel + 4 bytes per prefix entry.
    let expected_len = 36 + store.len() * 8 + (16 * 16 + 1) * 4;
    assert_eq!(bytes.len(), expected_len);

    let asset = read_asset(bytes.as_slice()).unwrap();
    assert_eq!(asset.bounds, bounds);
    assert_eq!(asset.store.size_x(), 16);
    assert_eq!(asset.store.size_z(), 16);
    assert_eq!(asset.store.voxels(), store.voxels());
    assert_eq!(asset.store.start_index(), store.start_index());
}

#[test]
fn roundtrip_through_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("terrain.voxels");

    let store = terrain_store();
    write_asset_file(&path, &terrain_bounds(), &store).unwrap();

    let asset = read_asset_file(&path).unwrap();
    assert_eq!(asset.store.len(), store.len());
    for x in 0..16 {
        for z in 0..16 {
            assert_eq!(asset.store.column(x, z), store.column(x, z));
        }
    }
}

#[test]
fn voxel_records_use_eight_byte_stride() {
    let store = ColumnStore::new(
        1,
        1,
        vec![basalt_world::ColumnVoxel::new(7, 42)],
        vec![0, 1],
    )
    .unwrap();

    let mut bytes = Vec::new();
    write_asset(&mut bytes, &terrain_bounds(), &store).unwrap();

    // The single voxel record sits right after the 36-byte header.
    assert_eq!(&bytes[36..40], &7i32.to_le_bytes());
    assert_eq!(bytes[40], 42);
    assert_eq!(&bytes[41..44], &[0, 0, 0]);
}

#[test]
fn truncated_input_is_malformed() {
    let store = terrain_store();
    let mut bytes = Vec::new();
    write_asset(&mut bytes, &terrain_bounds(), &store).unwrap();
    bytes.truncate(bytes.len() - 3);

    let err = read_asset(bytes.as_slice()).unwrap_err();
    assert!(matches!(err, DataError::MalformedAsset(_)));
}

#[test]
fn negative_voxel_count_is_malformed() {
    let mut bytes = Vec::new();
    write_asset(&mut bytes, &terrain_bounds(), &terrain_store()).unwrap();
    bytes[32..36].copy_from_slice(&(-1i32).to_le_bytes());

    let err = read_asset(bytes.as_slice()).unwrap_err();
    assert!(matches!(err, DataError::MalformedAsset(_)));
}

#[test]
fn missing_file_is_io_error() {
    let temp_dir = TempDir::new().unwrap();
    let err = read_asset_file(temp_dir.path().join("absent.voxels")).unwrap_err();
    assert!(matches!(err, DataError::IoError(_)));
}
