use criterion::{Criterion, black_box, criterion_group, criterion_main};
use glam::Vec3;

use basalt_config::MesherConfig;
use basalt_render::{CameraData, Plane, RenderContext, TerrainRenderer};
use basalt_world::{Bounds, ColumnStore};

fn rolling_terrain(size: u32) -> ColumnStore {
    let mut heights = Vec::new();
    let mut ids = Vec::new();
    for x in 0..size {
        for z in 0..size {
            let fx = x as f32 * 0.045;
            let fz = z as f32 * 0.03;
            heights.push((40.0 + 24.0 * (fx.sin() + fz.cos())) as i32);
            ids.push(((x / 4 + z / 4) % 6) as u8 + 1);
        }
    }
    ColumnStore::from_height_map(size, size, &heights, &ids)
}

fn camera_over(position: Vec3) -> CameraData {
    CameraData {
        position,
        far: Plane::new(Vec3::NEG_X, 1.0e4),
        left: Plane::new(Vec3::X, 1.0e4),
        right: Plane::new(Vec3::NEG_Z, 1.0e4),
        down: Plane::new(Vec3::Y, 1.0e4),
        up: Plane::new(Vec3::NEG_Y, 1.0e4),
    }
}

fn bench_cull_dispatch(c: &mut Criterion) {
    let ctx = RenderContext::new().expect("Failed to create GPU context - is a GPU available?");
    let mut renderer = TerrainRenderer::new();
    let size = 512;
    let store = rolling_terrain(size);
    let half = size as f32 / 2.0;
    let config = MesherConfig {
        merge_normals_threshold: 0,
        ..MesherConfig::default()
    };
    renderer
        .publish(
            &ctx,
            Bounds::new(Vec3::new(half, 32.0, half), Vec3::new(half, 32.0, half)),
            &store,
            &config,
        )
        .unwrap();

    let camera = camera_over(Vec3::new(half, 200.0, half));
    c.bench_function("cull_dispatch_512", |b| {
        // Force the counter readback either way so each iteration
        // measures a completed dispatch, not just the submit.
        b.iter(|| match renderer.dispatch_cull(&ctx, black_box(&camera)) {
            Some(visible) => visible,
            None => renderer.read_visible_count(&ctx),
        })
    });
}

criterion_group!(benches, bench_cull_dispatch);
criterion_main!(benches);
