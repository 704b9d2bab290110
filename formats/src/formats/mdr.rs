//! MDR bone-animated mesh (`RDM5`, version 2)
//!
//! Every frame stores one 3×4 matrix per bone, either as plain floats or,
//! when `ofs_frames` is negative, through the compressed bone codec. Both
//! forms decode to [`BoneMatrix3x4`] here, so nothing downstream has to
//! decompress per rendered frame.
//!
//! # Layout
//! ```text
//! header    104 bytes (see MdrHeader)
//! frames    at ofs_frames:  num_frames × (56 + num_bones × 48)
//!           or at -ofs_frames: num_frames × (40 + num_bones × 24)
//! lods      chained by ofs_end, each
//!           num_surfaces, ofs_surfaces, ofs_end (offsets relative to the LOD)
//!           surfaces chained by ofs_end, each 172-byte header followed by
//!             vertices    normal, tex_coords, num_weights, weights
//!             triangles   num_triangles × 3 × i32
//!             bone refs   num_bone_references × i32
//! tags      num_tags × 36    bone_index, name[32]
//! ```

use smallvec::SmallVec;
use tagmesh_shared::{BoneMatrix3x4, Bounds, MDR_FORMAT};
use tracing::debug;

use super::common::{
    BoneWeight, NAME_SIZE, capacity_hint, chain_next, check_ident_version, check_surface_limits, count, frame_count,
    normalize_surface_name, offset, read_frame_prefix, read_i32_array, read_triangles, read_weights,
    table_size,
};
use crate::codec::{COMPRESSED_BONE_SIZE, decompress_bone_matrix};
use crate::error::LoadError;
use crate::reader::{ByteReader, FieldWriter, ReadError};
use crate::services::LoadContext;

pub const MDR_FRAME_NAME_SIZE: usize = 16;
pub const MDR_TAG_NAME_SIZE: usize = 32;

/// Bounds, local origin, radius
pub const MDR_COMP_FRAME_SIZE: usize = 40;
/// Compressed frame prefix plus the frame name
pub const MDR_FRAME_SIZE: usize = MDR_COMP_FRAME_SIZE + MDR_FRAME_NAME_SIZE;
/// 3×4 floats
pub const MDR_BONE_SIZE: usize = 48;
pub const MDR_LOD_SIZE: usize = 12;
pub const MDR_TAG_SIZE: usize = 4 + MDR_TAG_NAME_SIZE;
/// Normal, tex coords, weight count
pub const MDR_VERTEX_SIZE: usize = 24;

/// MDR file header (104 bytes)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MdrHeader {
    pub ident: u32,
    pub version: i32,
    pub name: String,
    pub num_frames: i32,
    pub num_bones: i32,
    /// Negative: compressed frames at `-ofs_frames`
    pub ofs_frames: i32,
    pub num_lods: i32,
    pub ofs_lods: i32,
    pub num_tags: i32,
    pub ofs_tags: i32,
    pub ofs_end: i32,
}

impl MdrHeader {
    pub const SIZE: usize = 104;

    pub fn read(reader: &ByteReader<'_>) -> Result<Self, ReadError> {
        let mut c = reader.cursor(0);
        Ok(Self {
            ident: c.u32()?,
            version: c.i32()?,
            name: c.name(NAME_SIZE)?,
            num_frames: c.i32()?,
            num_bones: c.i32()?,
            ofs_frames: c.i32()?,
            num_lods: c.i32()?,
            ofs_lods: c.i32()?,
            num_tags: c.i32()?,
            ofs_tags: c.i32()?,
            ofs_end: c.i32()?,
        })
    }

    pub fn write(&self, w: &mut FieldWriter) {
        w.u32(self.ident)
            .i32(self.version)
            .name(&self.name, NAME_SIZE)
            .i32(self.num_frames)
            .i32(self.num_bones)
            .i32(self.ofs_frames)
            .i32(self.num_lods)
            .i32(self.ofs_lods)
            .i32(self.num_tags)
            .i32(self.ofs_tags)
            .i32(self.ofs_end);
    }

    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.ofs_frames < 0
    }
}

/// MDR surface header (172 bytes), offsets relative to the surface start
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MdrSurfaceHeader {
    pub ident: u32,
    pub name: String,
    pub shader: String,
    pub shader_index: i32,
    pub ofs_header: i32,
    pub num_verts: i32,
    pub ofs_verts: i32,
    pub num_triangles: i32,
    pub ofs_triangles: i32,
    pub num_bone_references: i32,
    pub ofs_bone_references: i32,
    pub ofs_end: i32,
}

impl MdrSurfaceHeader {
    pub const SIZE: usize = 172;

    pub fn read(reader: &ByteReader<'_>, at: usize) -> Result<Self, ReadError> {
        let mut c = reader.cursor(at);
        Ok(Self {
            ident: c.u32()?,
            name: c.name(NAME_SIZE)?,
            shader: c.name(NAME_SIZE)?,
            shader_index: c.i32()?,
            ofs_header: c.i32()?,
            num_verts: c.i32()?,
            ofs_verts: c.i32()?,
            num_triangles: c.i32()?,
            ofs_triangles: c.i32()?,
            num_bone_references: c.i32()?,
            ofs_bone_references: c.i32()?,
            ofs_end: c.i32()?,
        })
    }

    pub fn write(&self, w: &mut FieldWriter) {
        w.u32(self.ident)
            .name(&self.name, NAME_SIZE)
            .name(&self.shader, NAME_SIZE)
            .i32(self.shader_index)
            .i32(self.ofs_header)
            .i32(self.num_verts)
            .i32(self.ofs_verts)
            .i32(self.num_triangles)
            .i32(self.ofs_triangles)
            .i32(self.num_bone_references)
            .i32(self.ofs_bone_references)
            .i32(self.ofs_end);
    }
}

/// One animation frame with a decoded matrix per bone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MdrFrame {
    pub bounds: Bounds,
    pub local_origin: [f32; 3],
    pub radius: f32,
    /// Empty for compressed frames
    pub name: String,
    pub bones: Vec<BoneMatrix3x4>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MdrVertex {
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
    pub weights: SmallVec<[BoneWeight; 4]>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MdrSurface {
    /// Lowercased
    pub name: String,
    pub shader: String,
    pub shader_index: u32,
    pub vertices: Vec<MdrVertex>,
    pub indexes: Vec<u32>,
    pub bone_refs: Vec<i32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MdrLod {
    pub surfaces: Vec<MdrSurface>,
}

/// A named attachment point following one bone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MdrTag {
    pub bone_index: usize,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MdrModel {
    pub name: String,
    pub num_bones: usize,
    pub frames: Vec<MdrFrame>,
    pub lods: Vec<MdrLod>,
    pub tags: Vec<MdrTag>,
    /// Bytes the decoded model occupies, counting expanded compressed frames
    pub data_size: usize,
}

impl MdrModel {
    #[inline]
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// First tag named `name` at or after `start`
    pub fn find_tag(&self, name: &str, start: usize) -> Option<usize> {
        self.tags
            .iter()
            .enumerate()
            .skip(start)
            .find_map(|(i, t)| (t.name == name).then_some(i))
    }

    /// Frame clamped into `0..num_frames`
    pub fn frame_clamped(&self, frame: i32) -> Option<&MdrFrame> {
        let last = self.frames.len().checked_sub(1)?;
        self.frames.get((frame.max(0) as usize).min(last))
    }

    /// Frame with the frame number wrapped into range
    pub fn frame_wrapped(&self, frame: i32) -> Option<&MdrFrame> {
        let n = i32::try_from(self.frames.len()).ok().filter(|&n| n > 0)?;
        self.frames.get(frame.rem_euclid(n) as usize)
    }
}

fn read_frames(
    reader: &ByteReader<'_>,
    header: &MdrHeader,
    num_frames: usize,
    num_bones: usize,
) -> Result<Vec<MdrFrame>, LoadError> {
    let compressed = header.is_compressed();
    let (at, frame_size, bone_size) = if compressed {
        let at = usize::try_from(header.ofs_frames.unsigned_abs())
            .map_err(|_| LoadError::broken("invalid frame offset"))?;
        (at, MDR_COMP_FRAME_SIZE, COMPRESSED_BONE_SIZE)
    } else {
        (offset(0, header.ofs_frames, "frame")?, MDR_FRAME_SIZE, MDR_BONE_SIZE)
    };
    let stride = table_size(&[num_bones, bone_size], "bone")?
        .checked_add(frame_size)
        .ok_or_else(|| LoadError::broken("frame stride overflows"))?;
    reader.require(at, table_size(&[num_frames, stride], "frame")?)?;

    let mut frames = Vec::with_capacity(num_frames);
    for i in 0..num_frames {
        let mut c = reader.cursor(at + i * stride);
        let (bounds, local_origin, radius) = read_frame_prefix(&mut c)?;
        let name = if compressed {
            String::new()
        } else {
            c.name(MDR_FRAME_NAME_SIZE)?
        };

        let mut bones = Vec::with_capacity(num_bones);
        for _ in 0..num_bones {
            if compressed {
                bones.push(decompress_bone_matrix(&c.bytes::<COMPRESSED_BONE_SIZE>()?));
            } else {
                let mut m = [0.0; 12];
                for v in &mut m {
                    *v = c.f32()?;
                }
                bones.push(BoneMatrix3x4::from_array(m));
            }
        }

        frames.push(MdrFrame {
            bounds,
            local_origin,
            radius,
            name,
            bones,
        });
    }
    Ok(frames)
}

fn read_surface(
    reader: &ByteReader<'_>,
    at: usize,
    ctx: &mut LoadContext<'_>,
) -> Result<(MdrSurface, usize), LoadError> {
    let sh = MdrSurfaceHeader::read(reader, at)?;
    let num_verts = count(sh.num_verts, "vertex")?;
    let num_triangles = count(sh.num_triangles, "triangle")?;
    check_surface_limits(&sh.name, num_verts, num_triangles, &ctx.options.limits)?;

    let name = normalize_surface_name(&sh.name);
    let shader_index = ctx.resolve_shader(&sh.shader);

    let mut c = reader.cursor(offset(at, sh.ofs_verts, "vertex")?);
    let mut vertices = Vec::with_capacity(capacity_hint(reader, num_verts, MDR_VERTEX_SIZE));
    for _ in 0..num_verts {
        let normal = c.vec3()?;
        let tex_coords = c.vec2()?;
        let num_weights = c.i32()?;
        let weights = read_weights(&mut c, reader, num_weights)?;
        vertices.push(MdrVertex {
            normal,
            tex_coords,
            weights,
        });
    }

    let indexes = read_triangles(
        reader,
        offset(at, sh.ofs_triangles, "triangle")?,
        num_triangles,
        num_verts,
        &name,
    )?;
    let bone_refs = read_i32_array(
        reader,
        offset(at, sh.ofs_bone_references, "bone reference")?,
        count(sh.num_bone_references, "bone reference")?,
    )?;

    let next = chain_next(at, sh.ofs_end, MdrSurfaceHeader::SIZE, "surface")?;
    Ok((
        MdrSurface {
            name,
            shader: sh.shader,
            shader_index,
            vertices,
            indexes,
            bone_refs,
        },
        next,
    ))
}

fn read_lods(
    reader: &ByteReader<'_>,
    header: &MdrHeader,
    ctx: &mut LoadContext<'_>,
) -> Result<Vec<MdrLod>, LoadError> {
    let num_lods = count(header.num_lods, "lod")?;
    let mut lod_start = offset(0, header.ofs_lods, "lod")?;
    let mut lods = Vec::with_capacity(capacity_hint(reader, num_lods, MDR_LOD_SIZE));

    for _ in 0..num_lods {
        let mut c = reader.cursor(lod_start);
        let num_surfaces = count(c.i32()?, "surface")?;
        let ofs_surfaces = c.i32()?;
        let ofs_end = c.i32()?;

        let mut surf_start = offset(lod_start, ofs_surfaces, "surface")?;
        let mut surfaces = Vec::with_capacity(capacity_hint(reader, num_surfaces, MdrSurfaceHeader::SIZE));
        for _ in 0..num_surfaces {
            let (surface, next) = read_surface(reader, surf_start, ctx)?;
            surfaces.push(surface);
            surf_start = next;
        }
        lods.push(MdrLod { surfaces });

        lod_start = chain_next(lod_start, ofs_end, MDR_LOD_SIZE, "lod")?;
    }
    Ok(lods)
}

fn read_tags(reader: &ByteReader<'_>, header: &MdrHeader, num_bones: usize) -> Result<Vec<MdrTag>, LoadError> {
    let num_tags = count(header.num_tags, "tag")?;
    let at = offset(0, header.ofs_tags, "tag")?;
    reader.require(at, table_size(&[num_tags, MDR_TAG_SIZE], "tag")?)?;

    let mut c = reader.cursor(at);
    (0..num_tags)
        .map(|_| {
            let bone = c.i32()?;
            let name = c.name(MDR_TAG_NAME_SIZE)?;
            let bone_index = usize::try_from(bone)
                .ok()
                .filter(|&b| b < num_bones)
                .ok_or_else(|| LoadError::broken(format!("tag {name} uses bone {bone} of {num_bones}")))?;
            Ok(MdrTag { bone_index, name })
        })
        .collect()
}

/// Parse an MDR buffer, decompressing compressed bone frames
pub fn load_mdr(data: &[u8], mod_name: &str, ctx: &mut LoadContext<'_>) -> Result<MdrModel, LoadError> {
    let reader = ByteReader::new(data);
    let header = MdrHeader::read(&reader)?;
    check_ident_version(header.ident, header.version, &MDR_FORMAT)?;

    let declared = header.ofs_end.max(0) as usize;
    if declared > data.len() {
        return Err(LoadError::DeclaredSizeMismatch {
            declared,
            actual: data.len(),
        });
    }
    let num_bones = count(header.num_bones, "bone")?;
    let num_frames = frame_count(header.num_frames)?;

    let data_size = if header.is_compressed() {
        // frames are stored expanded, with names and full matrices
        let names = table_size(&[num_frames, MDR_FRAME_NAME_SIZE], "frame name")?;
        let matrices = table_size(
            &[num_frames, num_bones, MDR_BONE_SIZE - COMPRESSED_BONE_SIZE],
            "bone matrix",
        )?;
        declared
            .checked_add(names)
            .and_then(|size| size.checked_add(matrices))
            .ok_or_else(|| LoadError::broken("expanded frame size overflows"))?
    } else {
        declared
    };

    let frames = read_frames(&reader, &header, num_frames, num_bones)?;
    let lods = read_lods(&reader, &header, ctx)?;
    let tags = read_tags(&reader, &header, num_bones)?;

    debug!(
        model = mod_name,
        frames = num_frames,
        bones = num_bones,
        lods = lods.len(),
        compressed = header.is_compressed(),
        "loaded mdr"
    );

    Ok(MdrModel {
        name: header.name,
        num_bones,
        frames,
        lods,
        tags,
        data_size,
    })
}
