//! Parser tests for the vertex-animated mesh formats (MD3, MDC, TAN).
//!
//! Files are laid out by `tagmesh_formats::test_utils` and loaded through
//! recording shader and GPU collaborators.

use tagmesh_formats::packing::{ANIMATED_VERTEX_STRIDE, SIZE_TEXCOORD, STATIC_VERTEX_STRIDE};
use tagmesh_formats::test_utils::{
    FixtureSurface, MeshFixture, TestServices, write_md3, write_mdc, write_tan,
};
use tagmesh_formats::{
    AttributeSlot, BoundsOverride, BufferUsage, LoadError, LoadOptions, SurfaceLimits, load_md3,
    load_mdc, load_tan,
};

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}

fn approx3(a: [f32; 3], b: [f32; 3]) -> bool {
    a.iter().zip(b).all(|(x, y)| approx(*x, y))
}

fn tagged_mesh(num_frames: usize) -> MeshFixture {
    MeshFixture::new("models/test/box", num_frames)
        .with_tag("tag_weapon")
        .with_tag("tag_head")
        .with_surface(FixtureSurface::quad("Body_1", num_frames))
}

fn set_i32(data: &mut [u8], at: usize, value: i32) {
    data[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

// ============================================================================
// MD3
// ============================================================================

#[test]
fn test_md3_loads_frames_tags_and_surfaces() {
    let data = write_md3(&tagged_mesh(3));
    let mut services = TestServices::default();
    let model = load_md3(&data, "models/test/box.md3", &mut services.ctx()).unwrap();

    assert_eq!(model.num_frames(), 3);
    assert_eq!(model.tag_names, vec!["tag_weapon", "tag_head"]);
    assert_eq!(model.tags.len(), 6);
    assert_eq!(model.data_size, data.len());

    assert_eq!(model.frames[2].radius, 4.0);
    assert_eq!(model.frames[2].bounds.maxs, [3.0; 3]);
    assert_eq!(model.frames[1].local_origin, [0.0, 0.0, 1.0]);

    // frame-major: frame 2, tag 1
    assert_eq!(model.tag(2, 1).unwrap().origin, [2.0, 1.0, 0.0]);
    assert_eq!(model.find_tag("tag_head", 0), Some(1));

    let surf = &model.surfaces[0];
    assert_eq!(surf.name, "body");
    assert_eq!(surf.num_verts, 4);
    assert_eq!(surf.verts.len(), 12);
    assert_eq!(surf.indexes, vec![0, 1, 2, 0, 2, 3]);
    assert_eq!(surf.frame_verts(2)[2].xyz, [1.0, 1.0, 2.0]);
    assert_eq!(surf.st[1], [1.0, 0.0]);
    assert_eq!(surf.shader_indexes.as_slice(), &[1]);
    assert_eq!(services.shaders.requests, vec!["textures/Body_1"]);
}

#[test]
fn test_md3_normals_decode_up() {
    let data = write_md3(&tagged_mesh(1));
    let mut services = TestServices::default();
    let model = load_md3(&data, "box", &mut services.ctx()).unwrap();

    for v in &model.surfaces[0].verts {
        assert_eq!(v.normal[0], 0);
        assert_eq!(v.normal[1], 0);
        assert!(v.normal[2] > 32000);
        // tangents are filled in after parsing
        assert_ne!(v.tangent, [0; 4]);
    }
}

#[test]
fn test_md3_wrong_ident() {
    let mut data = write_md3(&tagged_mesh(1));
    data[0..4].copy_from_slice(b"IDP2");
    let mut services = TestServices::default();
    assert!(matches!(
        load_md3(&data, "box", &mut services.ctx()),
        Err(LoadError::UnknownIdent { .. })
    ));
    assert!(services.gpu.buffers.is_empty());
}

#[test]
fn test_md3_wrong_version() {
    let mut data = write_md3(&tagged_mesh(1));
    set_i32(&mut data, 4, 14);
    let mut services = TestServices::default();
    assert_eq!(
        load_md3(&data, "box", &mut services.ctx()),
        Err(LoadError::WrongVersion {
            found: 14,
            expected: 15
        })
    );
}

#[test]
fn test_md3_zero_frames() {
    let mut data = write_md3(&tagged_mesh(1));
    // ident, version, name[64], flags, then num_frames
    set_i32(&mut data, 76, 0);
    let mut services = TestServices::default();
    assert_eq!(load_md3(&data, "box", &mut services.ctx()), Err(LoadError::NoFrames));
}

#[test]
fn test_md3_vertex_limit() {
    let mut services = TestServices::default();

    let ok = MeshFixture::new("strip", 1).with_surface(FixtureSurface::strip("strip", 1, 999));
    let model = load_md3(&write_md3(&ok), "strip", &mut services.ctx()).unwrap();
    assert_eq!(model.surfaces[0].num_verts, 999);

    let too_many = MeshFixture::new("strip", 1).with_surface(FixtureSurface::strip("strip", 1, 1000));
    assert!(matches!(
        load_md3(&write_md3(&too_many), "strip", &mut services.ctx()),
        Err(LoadError::TooManyVertices { count: 1000, max: 1000, .. })
    ));
}

#[test]
fn test_md3_limits_follow_options() {
    let options = LoadOptions {
        limits: SurfaceLimits {
            max_vertexes: 4,
            max_indexes: 6000,
        },
        ..LoadOptions::default()
    };
    let mut services = TestServices::with_options(options);
    assert!(matches!(
        load_md3(&write_md3(&tagged_mesh(1)), "box", &mut services.ctx()),
        Err(LoadError::TooManyVertices { count: 4, .. })
    ));
}

#[test]
fn test_md3_triangle_index_out_of_range() {
    let mut surface = FixtureSurface::quad("body", 1);
    surface.triangles[1] = [0, 2, 4];
    let mesh = MeshFixture::new("box", 1).with_surface(surface);

    let mut services = TestServices::default();
    assert!(matches!(
        load_md3(&write_md3(&mesh), "box", &mut services.ctx()),
        Err(LoadError::TriangleIndexOutOfRange {
            index: 4,
            num_verts: 4,
            ..
        })
    ));
    assert!(services.gpu.buffers.is_empty());
}

#[test]
fn test_md3_truncated_file() {
    let data = write_md3(&tagged_mesh(2));
    let mut services = TestServices::default();
    assert!(matches!(
        load_md3(&data[..data.len() - 10], "box", &mut services.ctx()),
        Err(LoadError::Truncated(_))
    ));
    assert!(matches!(
        load_md3(&data[..50], "box", &mut services.ctx()),
        Err(LoadError::Truncated(_))
    ));
}

#[test]
fn test_md3_huge_surface_count_fails_cleanly() {
    let mut data = write_md3(&tagged_mesh(1));
    // num_surfaces
    set_i32(&mut data, 84, i32::MAX);
    let mut services = TestServices::default();
    // the one real surface parses, the next header runs off the end
    assert!(matches!(
        load_md3(&data, "box", &mut services.ctx()),
        Err(LoadError::Truncated(_))
    ));
    assert!(services.gpu.buffers.is_empty());
}

#[test]
fn test_md3_huge_header_counts() {
    // num_frames, num_tags, num_surfaces
    for at in [76, 80, 84] {
        let mut data = write_md3(&tagged_mesh(2));
        set_i32(&mut data, at, i32::MAX);
        let mut services = TestServices::default();
        assert!(
            load_md3(&data, "box", &mut services.ctx()).is_err(),
            "count at {at} was accepted"
        );
    }
}

#[test]
fn test_md3_huge_surface_counts() {
    let base = write_md3(&tagged_mesh(1));
    let surf_start = i32::from_le_bytes(base[100..104].try_into().unwrap()) as usize;

    // num_shaders, num_verts, num_triangles
    for field in [76, 80, 84] {
        let mut data = base.clone();
        set_i32(&mut data, surf_start + field, i32::MAX);
        let mut services = TestServices::default();
        assert!(
            load_md3(&data, "box", &mut services.ctx()).is_err(),
            "surface count at {field} was accepted"
        );
    }
}

#[test]
fn test_md3_default_shader_maps_to_zero() {
    let mut surface = FixtureSurface::quad("body", 1);
    surface.shaders = vec!["missing/texture".into(), "textures/skin".into()];
    let mesh = MeshFixture::new("box", 1).with_surface(surface);

    let mut services = TestServices::default();
    let model = load_md3(&write_md3(&mesh), "box", &mut services.ctx()).unwrap();
    assert_eq!(model.surfaces[0].shader_indexes.as_slice(), &[0, 1]);
}

// ============================================================================
// GPU buffers
// ============================================================================

#[test]
fn test_single_frame_builds_static_stream() {
    let mut services = TestServices::default();
    let model = load_md3(&write_md3(&tagged_mesh(1)), "box", &mut services.ctx()).unwrap();

    assert_eq!(model.vao_surfaces.len(), 1);
    assert_eq!(services.gpu.buffers.len(), 1);

    let buffer = &services.gpu.buffers[0];
    assert_eq!(buffer.label, "staticMesh_VAO 'body'");
    assert_eq!(buffer.usage, BufferUsage::Static);
    assert_eq!(buffer.vertices.len(), 4 * STATIC_VERTEX_STRIDE as usize);
    assert_eq!(buffer.indices.len(), 6 * 4);

    let layout = buffer.layout.as_ref().unwrap();
    assert!(!layout.is_animated());
    assert_eq!(layout.frame_size, 0);
    assert_eq!(model.vao_surfaces[0].layout, *layout);
    assert_eq!(model.vao_surfaces[0].num_indexes, 6);
}

#[test]
fn test_multi_frame_builds_animated_stream() {
    let mut services = TestServices::default();
    let model = load_md3(&write_md3(&tagged_mesh(3)), "box", &mut services.ctx()).unwrap();

    let buffer = &services.gpu.buffers[0];
    let expected = 4 * SIZE_TEXCOORD + 3 * 4 * ANIMATED_VERTEX_STRIDE;
    assert_eq!(buffer.vertices.len(), expected as usize);

    let layout = &model.vao_surfaces[0].layout;
    assert!(layout.is_animated());
    assert_eq!(layout.frame_size, 4 * ANIMATED_VERTEX_STRIDE);
    let position = layout.attribute(AttributeSlot::Position).unwrap();
    let position2 = layout.attribute(AttributeSlot::Position2).unwrap();
    assert_eq!(position.offset, 4 * SIZE_TEXCOORD);
    assert_eq!(position.offset, position2.offset);
}

#[test]
fn test_cpu_vertex_animation_skips_buffers() {
    let options = LoadOptions {
        gpu_vertex_animation: false,
        ..LoadOptions::default()
    };
    let mut services = TestServices::with_options(options);

    let animated = load_md3(&write_md3(&tagged_mesh(2)), "box", &mut services.ctx()).unwrap();
    assert!(animated.vao_surfaces.is_empty());
    assert!(services.gpu.buffers.is_empty());

    // single-frame meshes still get a static buffer
    let still = load_md3(&write_md3(&tagged_mesh(1)), "box", &mut services.ctx()).unwrap();
    assert_eq!(still.vao_surfaces.len(), 1);
    assert_eq!(services.gpu.buffers.len(), 1);
}

// ============================================================================
// MDC
// ============================================================================

#[test]
fn test_mdc_expands_compressed_frames() {
    let data = write_mdc(&tagged_mesh(3));
    let mut services = TestServices::default();
    let model = load_mdc(&data, "models/test/box.mdc", &mut services.ctx()).unwrap();

    assert_eq!(model.num_frames(), 3);
    let surf = &model.surfaces[0];
    assert_eq!(surf.verts.len(), 12);
    assert_eq!(surf.frame_verts(0)[2].xyz, [1.0, 1.0, 0.0]);
    assert!(approx3(surf.frame_verts(1)[2].xyz, [1.0, 1.0, 1.0]));
    assert!(approx3(surf.frame_verts(2)[3].xyz, [0.0, 1.0, 2.0]));
    // compressed frames keep the base frame normal
    assert_eq!(surf.frame_verts(2)[0].normal, surf.frame_verts(0)[0].normal);
}

#[test]
fn test_mdc_tags() {
    let data = write_mdc(&tagged_mesh(2));
    let mut services = TestServices::default();
    let model = load_mdc(&data, "box", &mut services.ctx()).unwrap();

    assert_eq!(model.tag_names, vec!["tag_weapon", "tag_head"]);
    let tag = model.tag(1, 1).unwrap();
    assert_eq!(tag.origin, [1.0, 1.0, 0.0]);
    for (i, row) in tag.axis.iter().enumerate() {
        for (j, v) in row.iter().enumerate() {
            assert!(approx(*v, if i == j { 1.0 } else { 0.0 }));
        }
    }
}

#[test]
fn test_mdc_bounds_override() {
    let options = LoadOptions {
        bounds_overrides: vec![BoundsOverride {
            name_contains: "mg42".into(),
            radius: 256.0,
            mins: [128.0; 3],
            maxs: [-128.0; 3],
        }],
        ..LoadOptions::default()
    };
    let mut services = TestServices::with_options(options);
    let data = write_mdc(&tagged_mesh(2));

    let forced = load_mdc(&data, "models/mapobjects/mg42/mg42.mdc", &mut services.ctx()).unwrap();
    for frame in &forced.frames {
        assert_eq!(frame.radius, 256.0);
        assert_eq!(frame.bounds.mins, [128.0; 3]);
        assert_eq!(frame.bounds.maxs, [-128.0; 3]);
    }
    assert_eq!(forced.frames[1].local_origin, [0.0, 0.0, 1.0]);

    let plain = load_mdc(&data, "models/test/box.mdc", &mut services.ctx()).unwrap();
    assert_eq!(plain.frames[1].radius, 3.0);
}

#[test]
fn test_mdc_huge_header_counts() {
    // num_frames, num_tags, num_surfaces
    for at in [76, 80, 84] {
        let mut data = write_mdc(&tagged_mesh(2));
        set_i32(&mut data, at, i32::MAX);
        let mut services = TestServices::default();
        assert!(
            load_mdc(&data, "box", &mut services.ctx()).is_err(),
            "count at {at} was accepted"
        );
        assert!(services.gpu.buffers.is_empty());
    }
}

#[test]
fn test_mdc_rejects_md3_data() {
    let data = write_md3(&tagged_mesh(1));
    let mut services = TestServices::default();
    assert!(matches!(
        load_mdc(&data, "box", &mut services.ctx()),
        Err(LoadError::UnknownIdent { .. })
    ));
}

// ============================================================================
// TAN
// ============================================================================

#[test]
fn test_tan_loads_quantized_positions() {
    let data = write_tan(&tagged_mesh(2));
    let mut services = TestServices::default();
    let model = load_tan(&data, "models/test/box.tan", &mut services.ctx()).unwrap();

    assert_eq!(model.num_frames(), 2);
    let surf = &model.surfaces[0];
    assert_eq!(surf.name, "body");
    assert!(approx3(surf.frame_verts(1)[2].xyz, [1.0, 1.0, 1.0]));
    assert!(approx3(surf.frame_verts(0)[3].xyz, [0.0, 1.0, 0.0]));
    assert_eq!(surf.shader_indexes.as_slice(), &[0]);
    assert!(services.shaders.requests.is_empty());
}

#[test]
fn test_tan_tags_are_frame_major() {
    let data = write_tan(&tagged_mesh(3));
    let mut services = TestServices::default();
    let model = load_tan(&data, "box", &mut services.ctx()).unwrap();

    assert_eq!(model.tag_names, vec!["tag_weapon", "tag_head"]);
    assert_eq!(model.tags[1].origin, [0.0, 1.0, 0.0]);
    assert_eq!(model.tags[2].origin, [1.0, 0.0, 0.0]);
    assert_eq!(model.tag(2, 1).unwrap().origin, [2.0, 1.0, 0.0]);
}

#[test]
fn test_tan_clamps_tag_count() {
    let mut mesh = MeshFixture::new("box", 1).with_surface(FixtureSurface::quad("body", 1));
    for i in 0..17 {
        mesh = mesh.with_tag(&format!("tag_{i}"));
    }
    let data = write_tan(&mesh);
    let mut services = TestServices::default();
    let model = load_tan(&data, "box", &mut services.ctx()).unwrap();

    assert_eq!(model.num_tags(), 16);
    assert_eq!(model.tag_names[15], "tag_15");
    assert_eq!(model.find_tag("tag_16", 0), None);
}

#[test]
fn test_tan_wrong_version() {
    let mut data = write_tan(&tagged_mesh(1));
    set_i32(&mut data, 4, 3);
    let mut services = TestServices::default();
    assert!(matches!(
        load_tan(&data, "box", &mut services.ctx()),
        Err(LoadError::WrongVersion { found: 3, expected: 2 })
    ));
}

#[test]
fn test_tan_huge_header_counts() {
    // num_frames, num_surfaces
    for at in [72, 80] {
        let mut data = write_tan(&tagged_mesh(2));
        set_i32(&mut data, at, i32::MAX);
        let mut services = TestServices::default();
        assert!(
            load_tan(&data, "box", &mut services.ctx()).is_err(),
            "count at {at} was accepted"
        );
        assert!(services.gpu.buffers.is_empty());
    }
}
