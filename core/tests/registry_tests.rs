//! Registration tests: name resolution, format preference, LOD backfill
//! and caching of failed loads.

use std::sync::Arc;

use tagmesh_core::test_utils::{CountingAssets, TestIo};
use tagmesh_core::{
    Collaborators, DirectoryAssetSource, LoaderConfig, ModelHandle, ModelKind, ModelStore,
};
use tagmesh_formats::test_utils::{
    FixtureSurface, MdmFixture, MdrFixture, MdsFixture, MeshFixture, RecordingGpu,
    RecordingShaders, SkeletonFixture, write_md3, write_mdc, write_mdm, write_mdr, write_mds,
    write_mdx, write_tan,
};

fn mesh(num_frames: usize) -> MeshFixture {
    MeshFixture::new("models/box", num_frames)
        .with_tag("tag_lid")
        .with_surface(FixtureSurface::quad("box", num_frames))
}

fn md3(num_frames: usize) -> Vec<u8> {
    write_md3(&mesh(num_frames))
}

fn store() -> ModelStore {
    ModelStore::new(LoaderConfig::default())
}

// ============================================================================
// Caching
// ============================================================================

#[test]
fn test_same_name_returns_same_handle() {
    let mut io = TestIo::new(CountingAssets::default().with_file("models/box.md3", md3(1)));
    let mut store = store();

    let first = io.register(&mut store, "models/box.md3");
    let second = io.register(&mut store, "models/box.md3");

    assert_eq!(first, ModelHandle(1));
    assert_eq!(first, second);
    assert_eq!(store.len(), 1);
    assert_eq!(io.assets.reads_of("models/box.md3"), 1);
    // one surface, one shader lookup
    assert_eq!(io.shaders.requests.len(), 1);
}

#[test]
fn test_failed_model_is_cached() {
    let mut io = TestIo::default();
    let mut store = store();

    assert_eq!(io.register(&mut store, "models/ghost.md3"), ModelHandle::NONE);
    let reads = io.assets.requests.len();
    assert!(reads > 0);

    assert_eq!(io.register(&mut store, "models/ghost.md3"), ModelHandle::NONE);
    assert_eq!(io.assets.requests.len(), reads);

    let cached = store.find("models/ghost.md3").unwrap();
    assert!(cached.is_bad());
    assert_eq!(cached.handle, ModelHandle(1));
}

#[test]
fn test_invalid_names_allocate_nothing() {
    let mut io = TestIo::default();
    let mut store = store();

    assert_eq!(io.register(&mut store, ""), ModelHandle::NONE);
    let long_name = format!("models/{}.md3", "x".repeat(60));
    assert_eq!(io.register(&mut store, &long_name), ModelHandle::NONE);

    assert!(store.is_empty());
    assert!(io.assets.requests.is_empty());
}

#[test]
fn test_full_store_rejects_new_names() {
    let assets = CountingAssets::default()
        .with_file("models/a.md3", md3(1))
        .with_file("models/b.md3", md3(1));
    let mut io = TestIo::new(assets);
    let mut store = ModelStore::new(LoaderConfig {
        max_models: 2,
        ..LoaderConfig::default()
    });

    assert_eq!(io.register(&mut store, "models/a.md3"), ModelHandle(1));
    assert_eq!(io.register(&mut store, "models/b.md3"), ModelHandle::NONE);
    assert_eq!(io.assets.reads_of("models/b.md3"), 0);
    // already registered names still resolve
    assert_eq!(io.register(&mut store, "models/a.md3"), ModelHandle(1));
}

#[test]
fn test_failure_leaves_other_models_intact() {
    let mut broken = md3(1);
    broken[4..8].copy_from_slice(&14i32.to_le_bytes());
    let assets = CountingAssets::default()
        .with_file("models/box.md3", md3(2))
        .with_file("models/broken.md3", broken);
    let mut io = TestIo::new(assets);
    let mut store = store();

    let good = io.register(&mut store, "models/box.md3");
    assert_eq!(io.register(&mut store, "models/broken.md3"), ModelHandle::NONE);

    let model = store.get(good);
    assert_eq!(model.kind(), ModelKind::Mesh);
    assert_eq!(model.lods().unwrap()[0].num_frames(), 2);
    assert_eq!(store.len(), 2);
}

// ============================================================================
// Format preference
// ============================================================================

#[test]
fn test_no_extension_uses_preference_order() {
    let assets = CountingAssets::default()
        .with_file("models/thing.mds", write_mds(&MdsFixture::new("thing", 1, 2)))
        .with_file("models/thing.md3", md3(1));
    let mut io = TestIo::new(assets);
    let mut store = store();

    let handle = io.register(&mut store, "models/thing");
    assert_eq!(store.get(handle).kind(), ModelKind::Mesh);
    assert_eq!(io.assets.reads_of("models/thing.mds"), 0);
}

#[test]
fn test_mdr_is_preferred_over_md3() {
    let assets = CountingAssets::default()
        .with_file("models/thing.md3", md3(1))
        .with_file("models/thing.mdr", write_mdr(&MdrFixture::new("thing", 1, 1)));
    let mut io = TestIo::new(assets);
    let mut store = store();

    let handle = io.register(&mut store, "models/thing");
    assert_eq!(store.get(handle).kind(), ModelKind::Mdr);
}

#[test]
fn test_explicit_extension_is_tried_first() {
    let assets = CountingAssets::default()
        .with_file("models/thing.md3", md3(1))
        .with_file("models/thing.mdr", write_mdr(&MdrFixture::new("thing", 1, 1)));
    let mut io = TestIo::new(assets);
    let mut store = store();

    let handle = io.register(&mut store, "models/thing.md3");
    assert_eq!(store.get(handle).kind(), ModelKind::Mesh);
    assert_eq!(io.assets.reads_of("models/thing.mdr"), 0);
}

#[test]
fn test_missing_extension_falls_back() {
    let assets = CountingAssets::default()
        .with_file("models/thing.mdx", write_mdx("thing", &SkeletonFixture::chain(2, 2)));
    let mut io = TestIo::new(assets);
    let mut store = store();

    let handle = io.register(&mut store, "models/thing.md3");
    assert_ne!(handle, ModelHandle::NONE);
    assert_eq!(store.get(handle).kind(), ModelKind::Mdx);
    assert_eq!(store.get(handle).name, "models/thing.md3");
    // the md3 loader is not retried during the fallback
    assert_eq!(io.assets.reads_of("models/thing.md3"), 1);
}

#[test]
fn test_unknown_extension_appends_every_format() {
    let assets = CountingAssets::default().with_file("models/thing.v2.md3", md3(1));
    let mut io = TestIo::new(assets);
    let mut store = store();

    let handle = io.register(&mut store, "models/thing.v2");
    assert_eq!(store.get(handle).kind(), ModelKind::Mesh);
    assert_eq!(io.assets.reads_of("models/thing.v2.mdr"), 1);
}

#[test]
fn test_extension_is_case_insensitive() {
    let assets = CountingAssets::default().with_file("models/box.MD3", md3(1));
    let mut io = TestIo::new(assets);
    let mut store = store();

    let handle = io.register(&mut store, "models/box.MD3");
    assert_eq!(store.get(handle).kind(), ModelKind::Mesh);
}

#[test]
fn test_mdc_loads_through_lod_path() {
    let assets = CountingAssets::default().with_file("models/box.mdc", write_mdc(&mesh(2)));
    let mut io = TestIo::new(assets);
    let mut store = store();

    let handle = io.register(&mut store, "models/box.mdc");
    let model = store.get(handle);
    assert_eq!(model.kind(), ModelKind::Mesh);
    assert_eq!(model.lods().unwrap()[0].num_frames(), 2);
    assert_eq!(io.assets.reads_of("models/box_2.mdc"), 1);
    assert_eq!(io.assets.reads_of("models/box_1.mdc"), 1);
}

#[test]
fn test_skeletal_files_dispatch_by_ident() {
    let assets = CountingAssets::default()
        .with_file("models/body.mds", write_mds(&MdsFixture::new("body", 2, 3)))
        .with_file("models/head.mdm", write_mdm(&MdmFixture::new("head")))
        .with_file("models/anim.mdx", write_mdx("anim", &SkeletonFixture::chain(2, 2)))
        // MDX contents under an MDM name still load by ident
        .with_file("models/swap.mdm", write_mdx("swap", &SkeletonFixture::chain(1, 1)));
    let mut io = TestIo::new(assets);
    let mut store = store();

    let kinds: Vec<ModelKind> = ["models/body.mds", "models/head.mdm", "models/anim.mdx", "models/swap.mdm"]
        .iter()
        .map(|name| {
            let handle = io.register(&mut store, name);
            store.get(handle).kind()
        })
        .collect();
    assert_eq!(kinds, [ModelKind::Mds, ModelKind::Mdm, ModelKind::Mdx, ModelKind::Mdx]);
}

// ============================================================================
// LODs
// ============================================================================

#[test]
fn test_lods_load_coarsest_first() {
    let assets = CountingAssets::default()
        .with_file("models/box_2.md3", md3(1))
        .with_file("models/box_1.md3", md3(2))
        .with_file("models/box.md3", md3(3));
    let mut io = TestIo::new(assets);
    let mut store = store();

    let handle = io.register(&mut store, "models/box.md3");
    let model = store.get(handle);
    let lods = model.lods().unwrap();
    let frames: Vec<usize> = lods.iter().map(|l| l.num_frames()).collect();
    assert_eq!(frames, [3, 2, 1]);
    assert_eq!(model.num_lods(), 3);
    assert_eq!(
        model.data_size(),
        lods.iter().map(|l| l.data_size).sum::<usize>()
    );
    assert_eq!(
        io.assets.requests,
        ["models/box_2.md3", "models/box_1.md3", "models/box.md3"]
    );
}

#[test]
fn test_missing_coarse_lod_is_backfilled() {
    let assets = CountingAssets::default()
        .with_file("models/box_1.md3", md3(2))
        .with_file("models/box.md3", md3(3));
    let mut io = TestIo::new(assets);
    let mut store = store();

    let handle = io.register(&mut store, "models/box.md3");
    let model = store.get(handle);
    let lods = model.lods().unwrap();
    assert!(Arc::ptr_eq(&lods[2], &lods[1]));
    assert!(!Arc::ptr_eq(&lods[1], &lods[0]));
    assert_eq!(model.num_lods(), 2);
}

#[test]
fn test_missing_middle_lod_uses_coarser() {
    let assets = CountingAssets::default()
        .with_file("models/box_2.md3", md3(1))
        .with_file("models/box.md3", md3(3));
    let mut io = TestIo::new(assets);
    let mut store = store();

    let handle = io.register(&mut store, "models/box.md3");
    let lods = store.get(handle).lods().unwrap();
    assert!(Arc::ptr_eq(&lods[1], &lods[2]));
    assert_eq!(lods[0].num_frames(), 3);
}

#[test]
fn test_broken_lod_stops_loading() {
    let mut broken = md3(1);
    broken[0..4].copy_from_slice(b"NOPE");
    let assets = CountingAssets::default()
        .with_file("models/box_2.md3", md3(1))
        .with_file("models/box_1.md3", broken)
        .with_file("models/box.md3", md3(3));
    let mut io = TestIo::new(assets);
    let mut store = store();

    let handle = io.register(&mut store, "models/box.md3");
    let model = store.get(handle);
    let lods = model.lods().unwrap();
    assert_eq!(io.assets.reads_of("models/box.md3"), 0);
    assert!(Arc::ptr_eq(&lods[0], &lods[2]));
    assert!(Arc::ptr_eq(&lods[1], &lods[2]));
    assert_eq!(lods[0].num_frames(), 1);
    assert_eq!(model.num_lods(), 1);
}

#[test]
fn test_tan_shares_one_mesh() {
    let assets = CountingAssets::default().with_file("models/rock.tan", write_tan(&mesh(2)));
    let mut io = TestIo::new(assets);
    let mut store = store();

    let handle = io.register(&mut store, "models/rock.tan");
    let model = store.get(handle);
    let lods = model.lods().unwrap();
    assert!(Arc::ptr_eq(&lods[0], &lods[1]) && Arc::ptr_eq(&lods[1], &lods[2]));
    assert_eq!(model.num_lods(), 1);
}

// ============================================================================
// Listing and lifecycle
// ============================================================================

#[test]
fn test_model_list() {
    let assets = CountingAssets::default()
        .with_file("models/box_1.md3", md3(1))
        .with_file("models/box.md3", md3(2))
        .with_file("models/anim.mdx", write_mdx("anim", &SkeletonFixture::chain(2, 2)));
    let mut io = TestIo::new(assets);
    let mut store = store();

    let box_handle = io.register(&mut store, "models/box.md3");
    let anim_handle = io.register(&mut store, "models/anim.mdx");
    io.register(&mut store, "models/ghost.md3");

    let list = store.model_list();
    assert_eq!(list.entries.len(), 3);
    assert_eq!(list.entries[0].handle, box_handle);
    assert_eq!(list.entries[0].lods, 2);
    assert_eq!(list.entries[0].data_size, store.get(box_handle).data_size());
    assert_eq!(list.entries[1].name, "models/anim.mdx");
    assert_eq!(list.entries[1].data_size, store.get(anim_handle).data_size());
    assert_eq!(list.entries[2].data_size, 0);
    assert_eq!(
        list.total_size,
        list.entries.iter().map(|e| e.data_size).sum::<usize>()
    );
}

#[test]
fn test_reset_drops_models() {
    let mut io = TestIo::new(CountingAssets::default().with_file("models/box.md3", md3(1)));
    let mut store = store();

    io.register(&mut store, "models/box.md3");
    store.reset();
    assert!(store.is_empty());
    assert!(store.get(ModelHandle(1)).is_bad());

    // registering again reads the file again
    assert_eq!(io.register(&mut store, "models/box.md3"), ModelHandle(1));
    assert_eq!(io.assets.reads_of("models/box.md3"), 2);
}

#[test]
fn test_cpu_animation_config_skips_gpu_buffers() {
    let assets = CountingAssets::default()
        .with_file("models/still.md3", md3(1))
        .with_file("models/anim.md3", md3(3));
    let mut io = TestIo::new(assets);
    let mut store = ModelStore::new(LoaderConfig {
        gpu_vertex_animation: false,
        ..LoaderConfig::default()
    });

    io.register(&mut store, "models/still.md3");
    assert_eq!(io.gpu.buffers.len(), 1);
    io.register(&mut store, "models/anim.md3");
    assert_eq!(io.gpu.buffers.len(), 1);
}

#[test]
fn test_directory_source() {
    let dir = tempfile::tempdir().unwrap();
    let models = dir.path().join("models");
    std::fs::create_dir_all(&models).unwrap();
    std::fs::write(models.join("box.md3"), md3(2)).unwrap();

    let mut assets = DirectoryAssetSource::new(dir.path());
    let mut shaders = RecordingShaders::default();
    let mut gpu = RecordingGpu::default();
    let mut io = Collaborators::new(&mut assets, &mut shaders, &mut gpu);
    let mut store = store();

    let handle = store.register("models/box", &mut io);
    assert_eq!(store.get(handle).kind(), ModelKind::Mesh);
    assert_eq!(store.register("models/crate", &mut io), ModelHandle::NONE);
}
