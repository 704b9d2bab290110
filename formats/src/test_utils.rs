//! Synthetic model files for tests
//!
//! Each `write_*` function lays out a complete, well-formed file from a small
//! description, so tests can state what a model contains and then corrupt
//! individual fields of the result.

use tagmesh_shared::{
    Bounds, MD3_FORMAT, MDC_FORMAT, MDM_FORMAT, MDR_FORMAT, MDS_FORMAT, MDX_FORMAT, Orientation,
    TAN_FORMAT,
};

use crate::codec::{BONE_FRAME_SIZE, CompressedBoneFrame, compress_bone_matrix};
use crate::formats::common::{NAME_SIZE, ST_SIZE, TRIANGLE_SIZE, WEIGHT_SIZE};
use crate::formats::{
    BoneWeight, MD3_FRAME_SIZE, MD3_SHADER_SIZE, MD3_TAG_SIZE, MD3_XYZ_NORMAL_SIZE, MD3_XYZ_SCALE,
    MDC_TAG_SIZE, MDC_XYZ_COMPRESSED_SIZE, MDM_TAG_SIZE, MDR_BONE_SIZE, MDR_COMP_FRAME_SIZE,
    MDR_FRAME_NAME_SIZE, MDR_FRAME_SIZE, MDR_LOD_SIZE, MDR_TAG_NAME_SIZE, MDR_TAG_SIZE,
    MDR_VERTEX_SIZE, MDS_TAG_SIZE, Md3Header, Md3SurfaceHeader, MdcHeader, MdcSurfaceHeader,
    MdmHeader, MdmTag, MdrFrame, MdrHeader, MdrSurfaceHeader, MdsHeader, MdxHeader,
    SkeletalFrame, SkeletalSurfaceHeader, TAN_FRAME_SIZE, TAN_MAX_TAGS, TAN_TAG_DATA_SIZE,
    TAN_XYZ_NORMAL_SIZE, TanHeader, TanSurfaceHeader, encode_xyz_compressed,
};
use crate::formats::skeletal::{BONE_INFO_SIZE, SKELETAL_FRAME_SIZE};
use crate::packing::{StreamLayout, encode_latlong_normal};
use crate::reader::FieldWriter;
use crate::services::{
    BufferUsage, GpuBufferFactory, GpuBufferHandle, ImageMode, LightmapMode, LoadContext,
    LoadOptions, ShaderRef, ShaderResolver,
};

const UP: [f32; 3] = [0.0, 0.0, 1.0];

// ============================================================================
// Recording collaborators
// ============================================================================

/// Hands out shader indices from 1 in request order.
///
/// Names starting with `missing` resolve to the default shader.
#[derive(Debug, Default)]
pub struct RecordingShaders {
    pub requests: Vec<String>,
    known: Vec<String>,
}

impl ShaderResolver for RecordingShaders {
    fn find_shader(&mut self, name: &str, _lightmap: LightmapMode, _image: ImageMode) -> ShaderRef {
        self.requests.push(name.to_string());
        if name.starts_with("missing") {
            return ShaderRef {
                index: 0,
                is_default: true,
            };
        }
        let index = match self.known.iter().position(|n| n == name) {
            Some(i) => i,
            None => {
                self.known.push(name.to_string());
                self.known.len() - 1
            }
        };
        ShaderRef {
            index: index as u32 + 1,
            is_default: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedBuffer {
    pub label: String,
    pub vertices: Vec<u8>,
    pub indices: Vec<u8>,
    pub usage: BufferUsage,
    pub layout: Option<StreamLayout>,
}

/// Keeps every buffer it is asked to create
#[derive(Debug, Default)]
pub struct RecordingGpu {
    pub buffers: Vec<RecordedBuffer>,
}

impl GpuBufferFactory for RecordingGpu {
    fn create_vertex_buffer(
        &mut self,
        label: &str,
        vertices: &[u8],
        indices: &[u8],
        usage: BufferUsage,
    ) -> GpuBufferHandle {
        self.buffers.push(RecordedBuffer {
            label: label.to_string(),
            vertices: vertices.to_vec(),
            indices: indices.to_vec(),
            usage,
            layout: None,
        });
        GpuBufferHandle(self.buffers.len() as u32)
    }

    fn configure_attributes(&mut self, buffer: GpuBufferHandle, layout: &StreamLayout) {
        if let Some(b) = (buffer.0 as usize).checked_sub(1).and_then(|i| self.buffers.get_mut(i)) {
            b.layout = Some(layout.clone());
        }
    }
}

/// Recording collaborators plus options, lending out a [`LoadContext`]
#[derive(Debug, Default)]
pub struct TestServices {
    pub shaders: RecordingShaders,
    pub gpu: RecordingGpu,
    pub options: LoadOptions,
}

impl TestServices {
    pub fn with_options(options: LoadOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    pub fn ctx(&mut self) -> LoadContext<'_> {
        LoadContext::new(&mut self.shaders, &mut self.gpu, &self.options)
    }
}

fn to_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

fn write_triangles(w: &mut FieldWriter, triangles: &[[i32; 3]]) {
    for tri in triangles {
        w.i32(tri[0]).i32(tri[1]).i32(tri[2]);
    }
}

fn write_orientation(w: &mut FieldWriter, o: &Orientation) {
    w.vec3(o.origin).vec3(o.axis[0]).vec3(o.axis[1]).vec3(o.axis[2]);
}

fn fixed(v: f32) -> i16 {
    (v / MD3_XYZ_SCALE).round() as i16
}

// ============================================================================
// Static meshes (MD3, MDC, TAN)
// ============================================================================

/// One surface of a vertex-animated mesh
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureSurface {
    pub name: String,
    pub shaders: Vec<String>,
    /// `num_frames × num_verts`, frame-major
    pub positions: Vec<[f32; 3]>,
    pub st: Vec<[f32; 2]>,
    pub triangles: Vec<[i32; 3]>,
}

impl FixtureSurface {
    /// Unit quad in the xy plane, raised by one unit per frame
    pub fn quad(name: &str, num_frames: usize) -> Self {
        let corners = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        let positions = (0..num_frames)
            .flat_map(|f| corners.iter().map(move |c: &[f32; 2]| [c[0], c[1], f as f32]))
            .collect();
        Self {
            name: name.to_string(),
            shaders: vec![format!("textures/{name}")],
            positions,
            st: corners.to_vec(),
            triangles: vec![[0, 1, 2], [0, 2, 3]],
        }
    }

    /// `num_verts` vertices along the x axis with one triangle
    pub fn strip(name: &str, num_frames: usize, num_verts: usize) -> Self {
        let positions = (0..num_frames)
            .flat_map(|_| (0..num_verts).map(|i| [i as f32, (i % 2) as f32, 0.0]))
            .collect();
        Self {
            name: name.to_string(),
            shaders: vec![format!("textures/{name}")],
            positions,
            st: (0..num_verts).map(|i| [i as f32, (i % 2) as f32]).collect(),
            triangles: vec![[0, 1, 2]],
        }
    }

    #[inline]
    pub fn num_verts(&self) -> usize {
        self.st.len()
    }

    fn frame_positions(&self, frame: usize) -> &[[f32; 3]] {
        let n = self.num_verts();
        &self.positions[frame * n..(frame + 1) * n]
    }
}

/// Description of a vertex-animated mesh
#[derive(Debug, Clone, PartialEq)]
pub struct MeshFixture {
    pub name: String,
    pub frames: Vec<(Bounds, [f32; 3], f32)>,
    pub tag_names: Vec<String>,
    /// `num_frames × num_tags`, frame-major
    pub tags: Vec<Orientation>,
    pub surfaces: Vec<FixtureSurface>,
}

impl MeshFixture {
    /// `num_frames` frames with growing bounds, no tags, no surfaces
    pub fn new(name: &str, num_frames: usize) -> Self {
        let frames = (0..num_frames)
            .map(|f| {
                let f = f as f32;
                (Bounds::new([-1.0 - f; 3], [1.0 + f; 3]), [0.0, 0.0, f], 2.0 + f)
            })
            .collect();
        Self {
            name: name.to_string(),
            frames,
            tag_names: Vec::new(),
            tags: Vec::new(),
            surfaces: Vec::new(),
        }
    }

    #[inline]
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Add a tag with identity axes whose origin is `(frame, tag index, 0)`
    pub fn with_tag(mut self, name: &str) -> Self {
        let num_tags = self.tag_names.len();
        let mut tags = Vec::with_capacity(self.num_frames() * (num_tags + 1));
        for frame in 0..self.num_frames() {
            tags.extend_from_slice(&self.tags[frame * num_tags..(frame + 1) * num_tags]);
            tags.push(Orientation {
                origin: [frame as f32, num_tags as f32, 0.0],
                ..Orientation::IDENTITY
            });
        }
        self.tag_names.push(name.to_string());
        self.tags = tags;
        self
    }

    pub fn with_surface(mut self, surface: FixtureSurface) -> Self {
        self.surfaces.push(surface);
        self
    }

    fn write_frames(&self, w: &mut FieldWriter) {
        for (i, (bounds, local_origin, radius)) in self.frames.iter().enumerate() {
            w.vec3(bounds.mins)
                .vec3(bounds.maxs)
                .vec3(*local_origin)
                .f32(*radius)
                .name(&format!("frame{i}"), 16);
        }
    }
}

fn md3_surface(s: &FixtureSurface, num_frames: usize) -> Vec<u8> {
    let nv = s.num_verts();
    let ofs_shaders = Md3SurfaceHeader::SIZE;
    let ofs_triangles = ofs_shaders + s.shaders.len() * MD3_SHADER_SIZE;
    let ofs_st = ofs_triangles + s.triangles.len() * TRIANGLE_SIZE;
    let ofs_xyz = ofs_st + nv * ST_SIZE;
    let ofs_end = ofs_xyz + num_frames * nv * MD3_XYZ_NORMAL_SIZE;

    let mut w = FieldWriter::with_capacity(ofs_end);
    Md3SurfaceHeader {
        ident: MD3_FORMAT.ident_le(),
        name: s.name.clone(),
        flags: 0,
        num_frames: to_i32(num_frames),
        num_shaders: to_i32(s.shaders.len()),
        num_verts: to_i32(nv),
        num_triangles: to_i32(s.triangles.len()),
        ofs_triangles: to_i32(ofs_triangles),
        ofs_shaders: to_i32(ofs_shaders),
        ofs_st: to_i32(ofs_st),
        ofs_xyz_normals: to_i32(ofs_xyz),
        ofs_end: to_i32(ofs_end),
    }
    .write(&mut w);
    for (i, shader) in s.shaders.iter().enumerate() {
        w.name(shader, NAME_SIZE).i32(to_i32(i));
    }
    write_triangles(&mut w, &s.triangles);
    for st in &s.st {
        w.vec2(*st);
    }
    let normal = encode_latlong_normal(UP);
    for p in &s.positions[..num_frames * nv] {
        w.i16(fixed(p[0])).i16(fixed(p[1])).i16(fixed(p[2])).u16(normal);
    }
    w.into_bytes()
}

/// Lay out an MD3 file
pub fn write_md3(m: &MeshFixture) -> Vec<u8> {
    let nf = m.num_frames();
    let surfaces: Vec<u8> = m.surfaces.iter().flat_map(|s| md3_surface(s, nf)).collect();

    let ofs_frames = Md3Header::SIZE;
    let ofs_tags = ofs_frames + nf * MD3_FRAME_SIZE;
    let ofs_surfaces = ofs_tags + m.tags.len() * MD3_TAG_SIZE;
    let ofs_end = ofs_surfaces + surfaces.len();

    let mut w = FieldWriter::with_capacity(ofs_end);
    Md3Header {
        ident: MD3_FORMAT.ident_le(),
        version: MD3_FORMAT.version,
        name: m.name.clone(),
        flags: 0,
        num_frames: to_i32(nf),
        num_tags: to_i32(m.tag_names.len()),
        num_surfaces: to_i32(m.surfaces.len()),
        num_skins: 0,
        ofs_frames: to_i32(ofs_frames),
        ofs_tags: to_i32(ofs_tags),
        ofs_surfaces: to_i32(ofs_surfaces),
        ofs_end: to_i32(ofs_end),
    }
    .write(&mut w);
    m.write_frames(&mut w);
    for (i, tag) in m.tags.iter().enumerate() {
        w.name(&m.tag_names[i % m.tag_names.len()], NAME_SIZE);
        write_orientation(&mut w, tag);
    }
    w.raw(&surfaces);
    w.into_bytes()
}

/// Frame 0 is the only base frame; later frames are deltas against it
fn mdc_surface(s: &FixtureSurface, num_frames: usize) -> Vec<u8> {
    let nv = s.num_verts();
    let num_comp = num_frames.saturating_sub(1);
    let ofs_shaders = MdcSurfaceHeader::SIZE;
    let ofs_triangles = ofs_shaders + s.shaders.len() * MD3_SHADER_SIZE;
    let ofs_st = ofs_triangles + s.triangles.len() * TRIANGLE_SIZE;
    let ofs_xyz = ofs_st + nv * ST_SIZE;
    let ofs_comp = ofs_xyz + nv * MD3_XYZ_NORMAL_SIZE;
    let ofs_base_frames = ofs_comp + num_comp * nv * MDC_XYZ_COMPRESSED_SIZE;
    let ofs_comp_frames = ofs_base_frames + num_frames * 2;
    let ofs_end = ofs_comp_frames + num_frames * 2;

    let mut w = FieldWriter::with_capacity(ofs_end);
    MdcSurfaceHeader {
        ident: MDC_FORMAT.ident_le(),
        name: s.name.clone(),
        flags: 0,
        num_comp_frames: to_i32(num_comp),
        num_base_frames: 1,
        num_shaders: to_i32(s.shaders.len()),
        num_verts: to_i32(nv),
        num_triangles: to_i32(s.triangles.len()),
        ofs_triangles: to_i32(ofs_triangles),
        ofs_shaders: to_i32(ofs_shaders),
        ofs_st: to_i32(ofs_st),
        ofs_xyz_normals: to_i32(ofs_xyz),
        ofs_xyz_compressed: to_i32(ofs_comp),
        ofs_frame_base_frames: to_i32(ofs_base_frames),
        ofs_frame_comp_frames: to_i32(ofs_comp_frames),
        ofs_end: to_i32(ofs_end),
    }
    .write(&mut w);
    for (i, shader) in s.shaders.iter().enumerate() {
        w.name(shader, NAME_SIZE).i32(to_i32(i));
    }
    write_triangles(&mut w, &s.triangles);
    for st in &s.st {
        w.vec2(*st);
    }
    let normal = encode_latlong_normal(UP);
    let base = s.frame_positions(0);
    for p in base {
        w.i16(fixed(p[0])).i16(fixed(p[1])).i16(fixed(p[2])).u16(normal);
    }
    for frame in 1..num_frames {
        for (p, b) in s.frame_positions(frame).iter().zip(base) {
            w.u32(encode_xyz_compressed([p[0] - b[0], p[1] - b[1], p[2] - b[2]], 0));
        }
    }
    for _ in 0..num_frames {
        w.i16(0);
    }
    for frame in 0..num_frames {
        w.i16(frame as i16 - 1);
    }
    w.into_bytes()
}

/// Lay out an MDC file; deltas must stay within ±6.35 units of frame 0
pub fn write_mdc(m: &MeshFixture) -> Vec<u8> {
    let nf = m.num_frames();
    let surfaces: Vec<u8> = m.surfaces.iter().flat_map(|s| mdc_surface(s, nf)).collect();

    let ofs_frames = MdcHeader::SIZE;
    let ofs_tag_names = ofs_frames + nf * MD3_FRAME_SIZE;
    let ofs_tags = ofs_tag_names + m.tag_names.len() * NAME_SIZE;
    let ofs_surfaces = ofs_tags + m.tags.len() * MDC_TAG_SIZE;
    let ofs_end = ofs_surfaces + surfaces.len();

    let mut w = FieldWriter::with_capacity(ofs_end);
    MdcHeader {
        ident: MDC_FORMAT.ident_le(),
        version: MDC_FORMAT.version,
        name: m.name.clone(),
        flags: 0,
        num_frames: to_i32(nf),
        num_tags: to_i32(m.tag_names.len()),
        num_surfaces: to_i32(m.surfaces.len()),
        num_skins: 0,
        ofs_frames: to_i32(ofs_frames),
        ofs_tag_names: to_i32(ofs_tag_names),
        ofs_tags: to_i32(ofs_tags),
        ofs_surfaces: to_i32(ofs_surfaces),
        ofs_end: to_i32(ofs_end),
    }
    .write(&mut w);
    m.write_frames(&mut w);
    for name in &m.tag_names {
        w.name(name, NAME_SIZE);
    }
    // origins only, angles are written as zero
    for tag in &m.tags {
        w.i16(fixed(tag.origin[0]))
            .i16(fixed(tag.origin[1]))
            .i16(fixed(tag.origin[2]))
            .i16(0)
            .i16(0)
            .i16(0);
    }
    w.raw(&surfaces);
    w.into_bytes()
}

/// Per-frame quantization origin shared by every TAN surface
fn tan_frame_offset(m: &MeshFixture, frame: usize) -> [f32; 3] {
    let mut min = [0.0f32; 3];
    for s in &m.surfaces {
        for p in s.frame_positions(frame) {
            for axis in 0..3 {
                min[axis] = min[axis].min(p[axis]);
            }
        }
    }
    min
}

fn tan_surface(s: &FixtureSurface, offsets: &[[f32; 3]]) -> Vec<u8> {
    let nv = s.num_verts();
    let nf = offsets.len();
    let ofs_triangles = TanSurfaceHeader::SIZE;
    let ofs_st = ofs_triangles + s.triangles.len() * TRIANGLE_SIZE;
    let ofs_xyz = ofs_st + nv * ST_SIZE;
    let ofs_end = ofs_xyz + nf * nv * TAN_XYZ_NORMAL_SIZE;

    let mut w = FieldWriter::with_capacity(ofs_end);
    TanSurfaceHeader {
        ident: TAN_FORMAT.ident_le(),
        name: s.name.clone(),
        num_frames: to_i32(nf),
        num_verts: to_i32(nv),
        min_lod: 0,
        num_triangles: to_i32(s.triangles.len()),
        ofs_triangles: to_i32(ofs_triangles),
        ofs_collapse_map: to_i32(ofs_end),
        ofs_st: to_i32(ofs_st),
        ofs_xyz_normals: to_i32(ofs_xyz),
        ofs_end: to_i32(ofs_end),
    }
    .write(&mut w);
    write_triangles(&mut w, &s.triangles);
    for st in &s.st {
        w.vec2(*st);
    }
    let normal = encode_latlong_normal(UP);
    for (frame, offset) in offsets.iter().enumerate() {
        for p in s.frame_positions(frame) {
            for axis in 0..3 {
                w.u16(((p[axis] - offset[axis]) / MD3_XYZ_SCALE).round() as u16);
            }
            w.u16(normal);
        }
    }
    w.into_bytes()
}

/// Lay out a TAN file quantized at 1/64 unit per step
pub fn write_tan(m: &MeshFixture) -> Vec<u8> {
    let nf = m.num_frames();
    let num_tags = m.tag_names.len().min(TAN_MAX_TAGS);
    let offsets: Vec<[f32; 3]> = (0..nf).map(|f| tan_frame_offset(m, f)).collect();
    let surfaces: Vec<u8> = m.surfaces.iter().flat_map(|s| tan_surface(s, &offsets)).collect();

    let ofs_frames = TanHeader::SIZE;
    let ofs_first_tag = ofs_frames + nf * TAN_FRAME_SIZE;
    let tag_block = NAME_SIZE + nf * TAN_TAG_DATA_SIZE;
    let ofs_surfaces = ofs_first_tag + num_tags * tag_block;
    let ofs_end = ofs_surfaces + surfaces.len();

    let mut header = TanHeader {
        ident: TAN_FORMAT.ident_le(),
        version: TAN_FORMAT.version,
        name: m.name.clone(),
        num_frames: to_i32(nf),
        num_tags: to_i32(m.tag_names.len()),
        num_surfaces: to_i32(m.surfaces.len()),
        total_time: nf as f32 * 0.05,
        total_delta: [0.0; 3],
        ofs_frames: to_i32(ofs_frames),
        ofs_surfaces: to_i32(ofs_surfaces),
        ofs_tags: [0; TAN_MAX_TAGS],
        ofs_end: to_i32(ofs_end),
    };
    for (i, ofs) in header.ofs_tags.iter_mut().take(num_tags).enumerate() {
        *ofs = to_i32(ofs_first_tag + i * tag_block);
    }

    let mut w = FieldWriter::with_capacity(ofs_end);
    header.write(&mut w);
    for ((bounds, _, radius), offset) in m.frames.iter().zip(&offsets) {
        w.vec3(bounds.mins)
            .vec3(bounds.maxs)
            .vec3([MD3_XYZ_SCALE; 3])
            .vec3(*offset)
            .vec3([0.0; 3])
            .f32(*radius)
            .f32(0.05);
    }
    let total_tags = m.tag_names.len();
    for tag in 0..num_tags {
        w.name(&m.tag_names[tag], NAME_SIZE);
        for frame in 0..nf {
            write_orientation(&mut w, &m.tags[frame * total_tags + tag]);
        }
    }
    w.raw(&surfaces);
    w.into_bytes()
}

// ============================================================================
// Skinned surfaces (MDR, MDS, MDM)
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SkinnedVertex {
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
    pub weights: Vec<BoneWeight>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkinnedSurface {
    pub name: String,
    pub shader: String,
    pub vertices: Vec<SkinnedVertex>,
    pub triangles: Vec<[i32; 3]>,
    pub bone_refs: Vec<i32>,
}

impl SkinnedSurface {
    /// One triangle fully weighted to `bone`
    pub fn triangle(name: &str, shader: &str, bone: i32) -> Self {
        let vertices = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
            .into_iter()
            .map(|offset| SkinnedVertex {
                normal: UP,
                tex_coords: [offset[0], offset[1]],
                weights: vec![BoneWeight {
                    bone_index: bone,
                    weight: 1.0,
                    offset,
                }],
            })
            .collect();
        Self {
            name: name.to_string(),
            shader: shader.to_string(),
            vertices,
            triangles: vec![[0, 1, 2]],
            bone_refs: vec![bone],
        }
    }

    fn vertices_size(&self, extra: usize) -> usize {
        self.vertices
            .iter()
            .map(|v| MDR_VERTEX_SIZE + extra + v.weights.len() * WEIGHT_SIZE)
            .sum()
    }

    fn write_vertices(&self, w: &mut FieldWriter, fixed_parent_fields: bool) {
        for v in &self.vertices {
            w.vec3(v.normal).vec2(v.tex_coords).i32(to_i32(v.weights.len()));
            if fixed_parent_fields {
                w.i32(-1).f32(0.0);
            }
            for weight in &v.weights {
                w.i32(weight.bone_index).f32(weight.weight).vec3(weight.offset);
            }
        }
    }
}

// ============================================================================
// MDR
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct MdrFixture {
    pub name: String,
    pub num_bones: usize,
    /// `bones` of each frame must hold `num_bones` matrices
    pub frames: Vec<MdrFrame>,
    pub compressed: bool,
    pub lods: Vec<Vec<SkinnedSurface>>,
    /// Tag name and bone index
    pub tags: Vec<(String, i32)>,
}

impl MdrFixture {
    /// One LOD with one triangle, identity bones translated by the frame index
    pub fn new(name: &str, num_frames: usize, num_bones: usize) -> Self {
        let frames = (0..num_frames)
            .map(|f| {
                let mut bone = tagmesh_shared::BoneMatrix3x4::IDENTITY;
                bone.row0[3] = f as f32;
                MdrFrame {
                    bounds: Bounds::new([-(f as f32); 3], [f as f32 + 1.0; 3]),
                    local_origin: [0.0; 3],
                    radius: 1.0 + f as f32,
                    name: format!("f{f}"),
                    bones: vec![bone; num_bones],
                }
            })
            .collect();
        Self {
            name: name.to_string(),
            num_bones,
            frames,
            compressed: false,
            lods: vec![vec![SkinnedSurface::triangle("body", "textures/body", 0)]],
            tags: Vec::new(),
        }
    }
}

fn mdr_surface(s: &SkinnedSurface) -> Vec<u8> {
    let ofs_verts = MdrSurfaceHeader::SIZE;
    let ofs_triangles = ofs_verts + s.vertices_size(0);
    let ofs_refs = ofs_triangles + s.triangles.len() * TRIANGLE_SIZE;
    let ofs_end = ofs_refs + s.bone_refs.len() * 4;

    let mut w = FieldWriter::with_capacity(ofs_end);
    MdrSurfaceHeader {
        ident: MDR_FORMAT.ident_le(),
        name: s.name.clone(),
        shader: s.shader.clone(),
        shader_index: 0,
        ofs_header: 0,
        num_verts: to_i32(s.vertices.len()),
        ofs_verts: to_i32(ofs_verts),
        num_triangles: to_i32(s.triangles.len()),
        ofs_triangles: to_i32(ofs_triangles),
        num_bone_references: to_i32(s.bone_refs.len()),
        ofs_bone_references: to_i32(ofs_refs),
        ofs_end: to_i32(ofs_end),
    }
    .write(&mut w);
    s.write_vertices(&mut w, false);
    write_triangles(&mut w, &s.triangles);
    for r in &s.bone_refs {
        w.i32(*r);
    }
    w.into_bytes()
}

fn mdr_lod(surfaces: &[SkinnedSurface]) -> Vec<u8> {
    let body: Vec<u8> = surfaces.iter().flat_map(mdr_surface).collect();
    let mut w = FieldWriter::with_capacity(MDR_LOD_SIZE + body.len());
    w.i32(to_i32(surfaces.len()))
        .i32(to_i32(MDR_LOD_SIZE))
        .i32(to_i32(MDR_LOD_SIZE + body.len()))
        .raw(&body);
    w.into_bytes()
}

/// Lay out an MDR file, compressing bones when `m.compressed` is set
pub fn write_mdr(m: &MdrFixture) -> Vec<u8> {
    let nf = m.frames.len();
    let frame_size = if m.compressed {
        MDR_COMP_FRAME_SIZE + m.num_bones * crate::codec::COMPRESSED_BONE_SIZE
    } else {
        MDR_FRAME_SIZE + m.num_bones * MDR_BONE_SIZE
    };
    let lods: Vec<u8> = m.lods.iter().flat_map(|l| mdr_lod(l)).collect();

    let ofs_frames = MdrHeader::SIZE;
    let ofs_lods = ofs_frames + nf * frame_size;
    let ofs_tags = ofs_lods + lods.len();
    let ofs_end = ofs_tags + m.tags.len() * MDR_TAG_SIZE;

    let mut w = FieldWriter::with_capacity(ofs_end);
    MdrHeader {
        ident: MDR_FORMAT.ident_le(),
        version: MDR_FORMAT.version,
        name: m.name.clone(),
        num_frames: to_i32(nf),
        num_bones: to_i32(m.num_bones),
        ofs_frames: if m.compressed {
            -to_i32(ofs_frames)
        } else {
            to_i32(ofs_frames)
        },
        num_lods: to_i32(m.lods.len()),
        ofs_lods: to_i32(ofs_lods),
        num_tags: to_i32(m.tags.len()),
        ofs_tags: to_i32(ofs_tags),
        ofs_end: to_i32(ofs_end),
    }
    .write(&mut w);
    for frame in &m.frames {
        w.vec3(frame.bounds.mins)
            .vec3(frame.bounds.maxs)
            .vec3(frame.local_origin)
            .f32(frame.radius);
        if m.compressed {
            for bone in &frame.bones {
                w.raw(&compress_bone_matrix(bone));
            }
        } else {
            w.name(&frame.name, MDR_FRAME_NAME_SIZE);
            for bone in &frame.bones {
                for v in bone.to_array() {
                    w.f32(v);
                }
            }
        }
    }
    w.raw(&lods);
    for (name, bone) in &m.tags {
        w.i32(*bone).name(name, MDR_TAG_NAME_SIZE);
    }
    w.into_bytes()
}

// ============================================================================
// Skeletal (MDS, MDM, MDX)
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct FixtureBone {
    pub name: String,
    /// -1 for a root bone
    pub parent: i32,
    pub torso_weight: f32,
    pub parent_dist: f32,
}

/// Bone hierarchy and frames shared by MDS and MDX
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonFixture {
    pub bones: Vec<FixtureBone>,
    /// `bones` of each frame must hold one record per bone
    pub frames: Vec<SkeletalFrame>,
    pub torso_parent: i32,
}

impl SkeletonFixture {
    /// A chain of `num_bones` bones, each `parent_dist` 1 from its parent,
    /// with every pose at zero angles
    pub fn chain(num_frames: usize, num_bones: usize) -> Self {
        let bones = (0..num_bones)
            .map(|i| FixtureBone {
                name: format!("bone{i}"),
                parent: i as i32 - 1,
                torso_weight: 0.0,
                parent_dist: if i == 0 { 0.0 } else { 1.0 },
            })
            .collect();
        let frames = (0..num_frames)
            .map(|f| SkeletalFrame {
                bounds: Bounds::new([-1.0 - f as f32; 3], [1.0 + f as f32; 3]),
                local_origin: [0.0; 3],
                radius: 1.0 + f as f32,
                parent_offset: [0.0, 0.0, f as f32],
                bones: vec![CompressedBoneFrame::default(); num_bones],
            })
            .collect();
        Self {
            bones,
            frames,
            torso_parent: -1,
        }
    }

    fn frame_size(&self) -> usize {
        SKELETAL_FRAME_SIZE + self.bones.len() * BONE_FRAME_SIZE
    }

    fn write_frames(&self, w: &mut FieldWriter) {
        for frame in &self.frames {
            w.vec3(frame.bounds.mins)
                .vec3(frame.bounds.maxs)
                .vec3(frame.local_origin)
                .f32(frame.radius)
                .vec3(frame.parent_offset);
            for bone in &frame.bones {
                for a in bone.angles {
                    w.i16(a);
                }
                w.i16(bone.ofs_angles[0]).i16(bone.ofs_angles[1]);
            }
        }
    }

    fn write_bones(&self, w: &mut FieldWriter) {
        for bone in &self.bones {
            w.name(&bone.name, NAME_SIZE)
                .i32(bone.parent)
                .f32(bone.torso_weight)
                .f32(bone.parent_dist)
                .i32(0);
        }
    }
}

fn skeletal_surface(s: &SkinnedSurface, ident: u32, fixed_parent_fields: bool) -> Vec<u8> {
    let nv = s.vertices.len();
    let extra = if fixed_parent_fields { 8 } else { 0 };
    let ofs_verts = SkeletalSurfaceHeader::SIZE;
    let ofs_triangles = ofs_verts + s.vertices_size(extra);
    let ofs_collapse = ofs_triangles + s.triangles.len() * TRIANGLE_SIZE;
    let ofs_refs = ofs_collapse + nv * 4;
    let ofs_end = ofs_refs + s.bone_refs.len() * 4;

    let mut w = FieldWriter::with_capacity(ofs_end);
    SkeletalSurfaceHeader {
        ident,
        name: s.name.clone(),
        shader: s.shader.clone(),
        shader_index: 0,
        min_lod: 0,
        ofs_header: 0,
        num_verts: to_i32(nv),
        ofs_verts: to_i32(ofs_verts),
        num_triangles: to_i32(s.triangles.len()),
        ofs_triangles: to_i32(ofs_triangles),
        ofs_collapse_map: to_i32(ofs_collapse),
        num_bone_references: to_i32(s.bone_refs.len()),
        ofs_bone_references: to_i32(ofs_refs),
        ofs_end: to_i32(ofs_end),
    }
    .write(&mut w);
    s.write_vertices(&mut w, fixed_parent_fields);
    write_triangles(&mut w, &s.triangles);
    for i in 0..nv {
        w.i32(to_i32(i));
    }
    for r in &s.bone_refs {
        w.i32(*r);
    }
    w.into_bytes()
}

/// Tag following one bone of an MDS skeleton
#[derive(Debug, Clone, PartialEq)]
pub struct BoneTag {
    pub name: String,
    pub torso_weight: f32,
    pub bone_index: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MdsFixture {
    pub name: String,
    pub skeleton: SkeletonFixture,
    pub surfaces: Vec<SkinnedSurface>,
    pub tags: Vec<BoneTag>,
}

impl MdsFixture {
    pub fn new(name: &str, num_frames: usize, num_bones: usize) -> Self {
        Self {
            name: name.to_string(),
            skeleton: SkeletonFixture::chain(num_frames, num_bones),
            surfaces: vec![SkinnedSurface::triangle("body", "textures/body", 0)],
            tags: Vec::new(),
        }
    }
}

/// Lay out an MDS file
pub fn write_mds(m: &MdsFixture) -> Vec<u8> {
    let sk = &m.skeleton;
    let surfaces: Vec<u8> = m
        .surfaces
        .iter()
        .flat_map(|s| skeletal_surface(s, MDS_FORMAT.ident_le(), true))
        .collect();

    let ofs_frames = MdsHeader::SIZE;
    let ofs_bones = ofs_frames + sk.frames.len() * sk.frame_size();
    let ofs_surfaces = ofs_bones + sk.bones.len() * BONE_INFO_SIZE;
    let ofs_tags = ofs_surfaces + surfaces.len();
    let ofs_end = ofs_tags + m.tags.len() * MDS_TAG_SIZE;

    let mut w = FieldWriter::with_capacity(ofs_end);
    MdsHeader {
        ident: MDS_FORMAT.ident_le(),
        version: MDS_FORMAT.version,
        name: m.name.clone(),
        lod_scale: 1.0,
        lod_bias: 0.0,
        num_frames: to_i32(sk.frames.len()),
        num_bones: to_i32(sk.bones.len()),
        ofs_frames: to_i32(ofs_frames),
        ofs_bones: to_i32(ofs_bones),
        torso_parent: sk.torso_parent,
        num_surfaces: to_i32(m.surfaces.len()),
        ofs_surfaces: to_i32(ofs_surfaces),
        num_tags: to_i32(m.tags.len()),
        ofs_tags: to_i32(ofs_tags),
        ofs_end: to_i32(ofs_end),
    }
    .write(&mut w);
    sk.write_frames(&mut w);
    sk.write_bones(&mut w);
    w.raw(&surfaces);
    for tag in &m.tags {
        w.name(&tag.name, NAME_SIZE).f32(tag.torso_weight).i32(tag.bone_index);
    }
    w.into_bytes()
}

/// Lay out an MDX file
pub fn write_mdx(name: &str, sk: &SkeletonFixture) -> Vec<u8> {
    let ofs_frames = MdxHeader::SIZE;
    let ofs_bones = ofs_frames + sk.frames.len() * sk.frame_size();
    let ofs_end = ofs_bones + sk.bones.len() * BONE_INFO_SIZE;

    let mut w = FieldWriter::with_capacity(ofs_end);
    MdxHeader {
        ident: MDX_FORMAT.ident_le(),
        version: MDX_FORMAT.version,
        name: name.to_string(),
        num_frames: to_i32(sk.frames.len()),
        num_bones: to_i32(sk.bones.len()),
        ofs_frames: to_i32(ofs_frames),
        ofs_bones: to_i32(ofs_bones),
        torso_parent: sk.torso_parent,
        ofs_end: to_i32(ofs_end),
    }
    .write(&mut w);
    sk.write_frames(&mut w);
    sk.write_bones(&mut w);
    w.into_bytes()
}

#[derive(Debug, Clone, PartialEq)]
pub struct MdmFixture {
    pub name: String,
    pub surfaces: Vec<SkinnedSurface>,
    pub tags: Vec<MdmTag>,
}

impl MdmFixture {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            surfaces: vec![SkinnedSurface::triangle("body", "textures/body", 0)],
            tags: Vec::new(),
        }
    }

    /// Add a tag on `bone` with identity axes
    pub fn with_tag(mut self, name: &str, bone: i32, offset: [f32; 3]) -> Self {
        self.tags.push(MdmTag {
            name: name.to_string(),
            axis: Orientation::IDENTITY.axis,
            bone_index: bone,
            offset,
            bone_refs: vec![bone],
        });
        self
    }
}

/// Lay out an MDM file
pub fn write_mdm(m: &MdmFixture) -> Vec<u8> {
    let surfaces: Vec<u8> = m
        .surfaces
        .iter()
        .flat_map(|s| skeletal_surface(s, MDM_FORMAT.ident_le(), false))
        .collect();
    let tags_size: usize = m.tags.iter().map(|t| MDM_TAG_SIZE + t.bone_refs.len() * 4).sum();

    let ofs_surfaces = MdmHeader::SIZE;
    let ofs_tags = ofs_surfaces + surfaces.len();
    let ofs_end = ofs_tags + tags_size;

    let mut w = FieldWriter::with_capacity(ofs_end);
    MdmHeader {
        ident: MDM_FORMAT.ident_le(),
        version: MDM_FORMAT.version,
        name: m.name.clone(),
        lod_scale: 1.0,
        lod_bias: 0.0,
        num_surfaces: to_i32(m.surfaces.len()),
        ofs_surfaces: to_i32(ofs_surfaces),
        num_tags: to_i32(m.tags.len()),
        ofs_tags: to_i32(ofs_tags),
        ofs_end: to_i32(ofs_end),
    }
    .write(&mut w);
    w.raw(&surfaces);
    for tag in &m.tags {
        let refs_size = tag.bone_refs.len() * 4;
        w.name(&tag.name, NAME_SIZE)
            .vec3(tag.axis[0])
            .vec3(tag.axis[1])
            .vec3(tag.axis[2])
            .i32(tag.bone_index)
            .vec3(tag.offset)
            .i32(to_i32(tag.bone_refs.len()))
            .i32(to_i32(MDM_TAG_SIZE))
            .i32(to_i32(MDM_TAG_SIZE + refs_size));
        for r in &tag.bone_refs {
            w.i32(*r);
        }
    }
    w.into_bytes()
}
