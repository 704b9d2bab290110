//! MDC compressed-frame mesh (`IDPC`, version 2)
//!
//! MDC stores a few full-precision base frames (MD3 xyz/normal records) and
//! expresses the remaining frames as small per-vertex deltas. Every frame
//! names its base frame; frames with a non-negative compressed-frame index
//! add that frame's deltas on top.
//!
//! # Layout
//! ```text
//! header     112 bytes (see MdcHeader)
//! frames     num_frames × 56 (MD3 frame record)
//! tag names  num_tags × 64
//! tags       num_frames × num_tags × (3 × i16 origin, 3 × i16 angles)
//! surfaces   chained by ofs_end, each 124-byte header followed by
//!            shaders, triangles, st       as MD3
//!            xyz_normal      num_base_frames × num_verts × 8
//!            xyz_compressed  num_comp_frames × num_verts × u32
//!            base_frames     num_frames × i16
//!            comp_frames     num_frames × i16 (negative: no delta)
//! ```

use tagmesh_shared::{MDC_FORMAT, Orientation, angles_to_axis};
use tracing::debug;

use super::common::{
    NAME_SIZE, capacity_hint, chain_next, check_ident_version, check_surface_limits, count, frame_count,
    normalize_surface_name, offset, read_st, read_triangles, table_size,
};
use super::md3::{MD3_XYZ_NORMAL_SIZE, MD3_XYZ_SCALE, read_md3_frames, read_shaders, read_xyz_normal};
use super::mdv::{MdvFrame, MdvModel, MdvSurface, MdvVertex, finish_mesh};
use crate::error::LoadError;
use crate::reader::{ByteReader, FieldWriter, ReadError};
use crate::services::{BoundsOverride, LoadContext};

pub const MDC_TAG_SIZE: usize = 12;
pub const MDC_XYZ_COMPRESSED_SIZE: usize = 4;

/// Degrees per stored tag angle step
pub const MDC_TAG_ANGLE_SCALE: f32 = 360.0 / 32700.0;
/// Model units per compressed delta step
pub const MDC_DIST_SCALE: f32 = 0.05;
/// Stored value of a zero delta
pub const MDC_MAX_OFS: f32 = 127.0;

/// MDC file header (112 bytes)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MdcHeader {
    pub ident: u32,
    pub version: i32,
    pub name: String,
    pub flags: i32,
    pub num_frames: i32,
    pub num_tags: i32,
    pub num_surfaces: i32,
    pub num_skins: i32,
    pub ofs_frames: i32,
    pub ofs_tag_names: i32,
    pub ofs_tags: i32,
    pub ofs_surfaces: i32,
    pub ofs_end: i32,
}

impl MdcHeader {
    pub const SIZE: usize = 112;

    pub fn read(reader: &ByteReader<'_>) -> Result<Self, ReadError> {
        let mut c = reader.cursor(0);
        Ok(Self {
            ident: c.u32()?,
            version: c.i32()?,
            name: c.name(NAME_SIZE)?,
            flags: c.i32()?,
            num_frames: c.i32()?,
            num_tags: c.i32()?,
            num_surfaces: c.i32()?,
            num_skins: c.i32()?,
            ofs_frames: c.i32()?,
            ofs_tag_names: c.i32()?,
            ofs_tags: c.i32()?,
            ofs_surfaces: c.i32()?,
            ofs_end: c.i32()?,
        })
    }

    pub fn write(&self, w: &mut FieldWriter) {
        w.u32(self.ident)
            .i32(self.version)
            .name(&self.name, NAME_SIZE)
            .i32(self.flags)
            .i32(self.num_frames)
            .i32(self.num_tags)
            .i32(self.num_surfaces)
            .i32(self.num_skins)
            .i32(self.ofs_frames)
            .i32(self.ofs_tag_names)
            .i32(self.ofs_tags)
            .i32(self.ofs_surfaces)
            .i32(self.ofs_end);
    }
}

/// MDC surface header (124 bytes), offsets relative to the surface start
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MdcSurfaceHeader {
    pub ident: u32,
    pub name: String,
    pub flags: i32,
    pub num_comp_frames: i32,
    pub num_base_frames: i32,
    pub num_shaders: i32,
    pub num_verts: i32,
    pub num_triangles: i32,
    pub ofs_triangles: i32,
    pub ofs_shaders: i32,
    pub ofs_st: i32,
    pub ofs_xyz_normals: i32,
    pub ofs_xyz_compressed: i32,
    pub ofs_frame_base_frames: i32,
    pub ofs_frame_comp_frames: i32,
    pub ofs_end: i32,
}

impl MdcSurfaceHeader {
    pub const SIZE: usize = 124;

    pub fn read(reader: &ByteReader<'_>, at: usize) -> Result<Self, ReadError> {
        let mut c = reader.cursor(at);
        Ok(Self {
            ident: c.u32()?,
            name: c.name(NAME_SIZE)?,
            flags: c.i32()?,
            num_comp_frames: c.i32()?,
            num_base_frames: c.i32()?,
            num_shaders: c.i32()?,
            num_verts: c.i32()?,
            num_triangles: c.i32()?,
            ofs_triangles: c.i32()?,
            ofs_shaders: c.i32()?,
            ofs_st: c.i32()?,
            ofs_xyz_normals: c.i32()?,
            ofs_xyz_compressed: c.i32()?,
            ofs_frame_base_frames: c.i32()?,
            ofs_frame_comp_frames: c.i32()?,
            ofs_end: c.i32()?,
        })
    }

    pub fn write(&self, w: &mut FieldWriter) {
        w.u32(self.ident)
            .name(&self.name, NAME_SIZE)
            .i32(self.flags)
            .i32(self.num_comp_frames)
            .i32(self.num_base_frames)
            .i32(self.num_shaders)
            .i32(self.num_verts)
            .i32(self.num_triangles)
            .i32(self.ofs_triangles)
            .i32(self.ofs_shaders)
            .i32(self.ofs_st)
            .i32(self.ofs_xyz_normals)
            .i32(self.ofs_xyz_compressed)
            .i32(self.ofs_frame_base_frames)
            .i32(self.ofs_frame_comp_frames)
            .i32(self.ofs_end);
    }
}

/// Split a compressed vertex into its position delta and normal index
#[inline]
pub fn decode_xyz_compressed(packed: u32) -> ([f32; 3], u8) {
    let axis = |shift: u32| (((packed >> shift) & 0xFF) as f32 - MDC_MAX_OFS) * MDC_DIST_SCALE;
    ([axis(0), axis(8), axis(16)], (packed >> 24) as u8)
}

/// Quantize a position delta (each axis within ±6.35 units) and normal index
pub fn encode_xyz_compressed(delta: [f32; 3], normal_index: u8) -> u32 {
    let axis = |v: f32| ((v / MDC_DIST_SCALE).round() + MDC_MAX_OFS).clamp(0.0, 255.0) as u32;
    axis(delta[0]) | axis(delta[1]) << 8 | axis(delta[2]) << 16 | (normal_index as u32) << 24
}

fn read_tags(
    reader: &ByteReader<'_>,
    header: &MdcHeader,
    num_frames: usize,
    num_tags: usize,
) -> Result<(Vec<String>, Vec<Orientation>), LoadError> {
    let names_at = offset(0, header.ofs_tag_names, "tag name")?;
    reader.require(names_at, table_size(&[num_tags, NAME_SIZE], "tag name")?)?;
    let names = (0..num_tags)
        .map(|i| reader.name(names_at + i * NAME_SIZE, NAME_SIZE))
        .collect::<Result<Vec<_>, _>>()?;

    let tags_at = offset(0, header.ofs_tags, "tag")?;
    let total = table_size(&[num_frames, num_tags], "tag")?;
    reader.require(tags_at, table_size(&[total, MDC_TAG_SIZE], "tag")?)?;
    let mut c = reader.cursor(tags_at);
    let mut tags = Vec::with_capacity(total);
    for _ in 0..total {
        let mut origin = [0.0; 3];
        let mut angles = [0.0; 3];
        for v in &mut origin {
            *v = c.i16()? as f32 * MD3_XYZ_SCALE;
        }
        for v in &mut angles {
            *v = c.i16()? as f32 * MDC_TAG_ANGLE_SCALE;
        }
        tags.push(Orientation {
            origin,
            axis: angles_to_axis(angles),
        });
    }
    Ok((names, tags))
}

fn frame_index(reader: &ByteReader<'_>, at: usize, frame: usize) -> Result<i16, ReadError> {
    reader.i16(at + frame * 2)
}

fn expand_vertices(
    reader: &ByteReader<'_>,
    surf_start: usize,
    sh: &MdcSurfaceHeader,
    num_frames: usize,
    num_verts: usize,
) -> Result<Vec<MdvVertex>, LoadError> {
    let num_base_frames = count(sh.num_base_frames, "base frame")?;
    let num_comp_frames = count(sh.num_comp_frames, "compressed frame")?;
    let xyz_at = offset(surf_start, sh.ofs_xyz_normals, "xyz")?;
    let comp_at = offset(surf_start, sh.ofs_xyz_compressed, "compressed xyz")?;
    let base_frames_at = offset(surf_start, sh.ofs_frame_base_frames, "base frame")?;
    let comp_frames_at = offset(surf_start, sh.ofs_frame_comp_frames, "compressed frame")?;

    reader.require(base_frames_at, table_size(&[num_frames, 2], "base frame")?)?;
    let frame_len = table_size(&[num_verts, MD3_XYZ_NORMAL_SIZE], "xyz")?;
    let mut verts = Vec::with_capacity(table_size(&[num_frames, num_verts], "xyz")?);
    for frame in 0..num_frames {
        let base = frame_index(reader, base_frames_at, frame)?;
        if base < 0 || base as usize >= num_base_frames {
            return Err(LoadError::broken(format!(
                "frame {frame} of {} uses base frame {base} of {num_base_frames}",
                sh.name
            )));
        }
        let at = table_size(&[base as usize, frame_len], "xyz")?
            .checked_add(xyz_at)
            .ok_or_else(|| LoadError::broken("xyz offset overflows"))?;
        reader.require(at, frame_len)?;
        for k in 0..num_verts {
            verts.push(read_xyz_normal(reader, at + k * MD3_XYZ_NORMAL_SIZE)?);
        }
    }

    if num_comp_frames == 0 {
        return Ok(verts);
    }

    reader.require(comp_frames_at, table_size(&[num_frames, 2], "compressed frame")?)?;
    let comp_len = table_size(&[num_verts, MDC_XYZ_COMPRESSED_SIZE], "compressed xyz")?;
    for frame in 0..num_frames {
        let comp = frame_index(reader, comp_frames_at, frame)?;
        if comp < 0 {
            continue;
        }
        if comp as usize >= num_comp_frames {
            return Err(LoadError::broken(format!(
                "frame {frame} of {} uses compressed frame {comp} of {num_comp_frames}",
                sh.name
            )));
        }
        let at = table_size(&[comp as usize, comp_len], "compressed xyz")?
            .checked_add(comp_at)
            .ok_or_else(|| LoadError::broken("compressed xyz offset overflows"))?;
        reader.require(at, comp_len)?;
        let frame_verts = &mut verts[frame * num_verts..(frame + 1) * num_verts];
        for (k, v) in frame_verts.iter_mut().enumerate() {
            // the delta's normal index is ignored, base frame normals are kept
            let (delta, _normal) = decode_xyz_compressed(reader.u32(at + k * MDC_XYZ_COMPRESSED_SIZE)?);
            for axis in 0..3 {
                v.xyz[axis] += delta[axis];
            }
        }
    }
    Ok(verts)
}

/// Parse an MDC buffer into one mesh LOD
pub fn load_mdc(data: &[u8], mod_name: &str, ctx: &mut LoadContext<'_>) -> Result<MdvModel, LoadError> {
    let reader = ByteReader::new(data);
    let header = MdcHeader::read(&reader)?;
    check_ident_version(header.ident, header.version, &MDC_FORMAT)?;

    let num_frames = frame_count(header.num_frames)?;
    let num_tags = count(header.num_tags, "tag")?;
    let num_surfaces = count(header.num_surfaces, "surface")?;

    let mut frames = read_md3_frames(&reader, offset(0, header.ofs_frames, "frame")?, num_frames)?;
    if let Some(o) = BoundsOverride::find(&ctx.options.bounds_overrides, mod_name) {
        debug!(model = mod_name, rule = %o.name_contains, "applying bounds override");
        for frame in &mut frames {
            *frame = MdvFrame {
                bounds: tagmesh_shared::Bounds::new(o.mins, o.maxs),
                radius: o.radius,
                ..*frame
            };
        }
    }

    let (tag_names, tags) = read_tags(&reader, &header, num_frames, num_tags)?;

    let limits = ctx.options.limits;
    let mut surfaces = Vec::with_capacity(capacity_hint(&reader, num_surfaces, MdcSurfaceHeader::SIZE));
    let mut surf_start = offset(0, header.ofs_surfaces, "surface")?;

    for _ in 0..num_surfaces {
        let sh = MdcSurfaceHeader::read(&reader, surf_start)?;
        let num_verts = count(sh.num_verts, "vertex")?;
        let num_triangles = count(sh.num_triangles, "triangle")?;
        check_surface_limits(&sh.name, num_verts, num_triangles, &limits)?;

        let name = normalize_surface_name(&sh.name);
        let shader_indexes = read_shaders(
            &reader,
            offset(surf_start, sh.ofs_shaders, "shader")?,
            count(sh.num_shaders, "shader")?,
            ctx,
        )?;
        let indexes = read_triangles(
            &reader,
            offset(surf_start, sh.ofs_triangles, "triangle")?,
            num_triangles,
            num_verts,
            &name,
        )?;
        let st = read_st(&reader, offset(surf_start, sh.ofs_st, "st")?, num_verts)?;
        let verts = expand_vertices(&reader, surf_start, &sh, num_frames, num_verts)?;

        surfaces.push(MdvSurface {
            name,
            num_verts,
            verts,
            st,
            indexes,
            shader_indexes,
        });

        surf_start = chain_next(surf_start, sh.ofs_end, MdcSurfaceHeader::SIZE, "surface")?;
    }

    let mut model = MdvModel {
        frames,
        tag_names,
        tags,
        surfaces,
        vao_surfaces: Vec::new(),
        data_size: header.ofs_end.max(0) as usize,
    };
    finish_mesh(&mut model, mod_name, ctx);

    debug!(
        model = mod_name,
        frames = num_frames,
        tags = num_tags,
        surfaces = num_surfaces,
        "loaded mdc"
    );
    Ok(model)
}
