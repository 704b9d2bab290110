//! TAN animated mesh (`TKAN`, version 2)
//!
//! Positions are stored as unsigned 16-bit values scaled and offset by their
//! frame, so every frame carries its own quantization box. Tags live in up
//! to sixteen separate blocks, one per tag, each holding all frames.
//!
//! # Layout
//! ```text
//! header    176 bytes (see TanHeader)
//! frames    num_frames × 68    mins, maxs, scale, offset, delta, radius, frame_time
//! tag i     at ofs_tags[i]: name[64], then num_frames × (origin, axis[3])
//! surfaces  chained by ofs_end, each 104-byte header followed by
//!           triangles  num_triangles × 3 × i32
//!           st         num_verts × 2 × f32
//!           xyz_normal num_frames × num_verts × (3 × u16, u16 lat/long normal)
//! ```

use smallvec::smallvec;
use tagmesh_shared::{Bounds, Orientation, TAN_FORMAT};
use tracing::{debug, warn};

use super::common::{
    NAME_SIZE, capacity_hint, chain_next, check_ident_version, check_surface_limits, count, frame_count,
    normalize_surface_name, offset, read_st, read_triangles, table_size,
};
use super::mdv::{MdvFrame, MdvModel, MdvSurface, MdvVertex, finish_mesh};
use crate::error::LoadError;
use crate::packing::{decode_latlong_normal, pack_normal};
use crate::reader::{ByteReader, FieldWriter, ReadError};
use crate::services::LoadContext;

/// Tag blocks addressable from the header
pub const TAN_MAX_TAGS: usize = 16;

pub const TAN_FRAME_SIZE: usize = 68;
pub const TAN_TAG_DATA_SIZE: usize = 48;
pub const TAN_XYZ_NORMAL_SIZE: usize = 8;

/// TAN file header (176 bytes)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TanHeader {
    pub ident: u32,
    pub version: i32,
    pub name: String,
    pub num_frames: i32,
    pub num_tags: i32,
    pub num_surfaces: i32,
    pub total_time: f32,
    pub total_delta: [f32; 3],
    pub ofs_frames: i32,
    pub ofs_surfaces: i32,
    pub ofs_tags: [i32; TAN_MAX_TAGS],
    pub ofs_end: i32,
}

impl TanHeader {
    pub const SIZE: usize = 176;

    pub fn read(reader: &ByteReader<'_>) -> Result<Self, ReadError> {
        let mut c = reader.cursor(0);
        let mut header = Self {
            ident: c.u32()?,
            version: c.i32()?,
            name: c.name(NAME_SIZE)?,
            num_frames: c.i32()?,
            num_tags: c.i32()?,
            num_surfaces: c.i32()?,
            total_time: c.f32()?,
            total_delta: c.vec3()?,
            ofs_frames: c.i32()?,
            ofs_surfaces: c.i32()?,
            ..Default::default()
        };
        for ofs in &mut header.ofs_tags {
            *ofs = c.i32()?;
        }
        header.ofs_end = c.i32()?;
        Ok(header)
    }

    pub fn write(&self, w: &mut FieldWriter) {
        w.u32(self.ident)
            .i32(self.version)
            .name(&self.name, NAME_SIZE)
            .i32(self.num_frames)
            .i32(self.num_tags)
            .i32(self.num_surfaces)
            .f32(self.total_time)
            .vec3(self.total_delta)
            .i32(self.ofs_frames)
            .i32(self.ofs_surfaces);
        for &ofs in &self.ofs_tags {
            w.i32(ofs);
        }
        w.i32(self.ofs_end);
    }
}

/// TAN surface header (104 bytes), offsets relative to the surface start
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TanSurfaceHeader {
    pub ident: u32,
    pub name: String,
    pub num_frames: i32,
    pub num_verts: i32,
    pub min_lod: i32,
    pub num_triangles: i32,
    pub ofs_triangles: i32,
    pub ofs_collapse_map: i32,
    pub ofs_st: i32,
    pub ofs_xyz_normals: i32,
    pub ofs_end: i32,
}

impl TanSurfaceHeader {
    pub const SIZE: usize = 104;

    pub fn read(reader: &ByteReader<'_>, at: usize) -> Result<Self, ReadError> {
        let mut c = reader.cursor(at);
        Ok(Self {
            ident: c.u32()?,
            name: c.name(NAME_SIZE)?,
            num_frames: c.i32()?,
            num_verts: c.i32()?,
            min_lod: c.i32()?,
            num_triangles: c.i32()?,
            ofs_triangles: c.i32()?,
            ofs_collapse_map: c.i32()?,
            ofs_st: c.i32()?,
            ofs_xyz_normals: c.i32()?,
            ofs_end: c.i32()?,
        })
    }

    pub fn write(&self, w: &mut FieldWriter) {
        w.u32(self.ident)
            .name(&self.name, NAME_SIZE)
            .i32(self.num_frames)
            .i32(self.num_verts)
            .i32(self.min_lod)
            .i32(self.num_triangles)
            .i32(self.ofs_triangles)
            .i32(self.ofs_collapse_map)
            .i32(self.ofs_st)
            .i32(self.ofs_xyz_normals)
            .i32(self.ofs_end);
    }
}

/// Per-frame quantization box
#[derive(Debug, Clone, Copy, PartialEq)]
struct TanFrame {
    bounds: Bounds,
    scale: [f32; 3],
    offset: [f32; 3],
    radius: f32,
}

fn read_frames(reader: &ByteReader<'_>, at: usize, num_frames: usize) -> Result<Vec<TanFrame>, LoadError> {
    reader.require(at, table_size(&[num_frames, TAN_FRAME_SIZE], "frame")?)?;
    (0..num_frames)
        .map(|i| {
            let mut c = reader.cursor(at + i * TAN_FRAME_SIZE);
            let mins = c.vec3()?;
            let maxs = c.vec3()?;
            let scale = c.vec3()?;
            let offset = c.vec3()?;
            let _delta = c.vec3()?;
            let radius = c.f32()?;
            Ok(TanFrame {
                bounds: Bounds::new(mins, maxs),
                scale,
                offset,
                radius,
            })
        })
        .collect()
}

fn read_tags(
    reader: &ByteReader<'_>,
    header: &TanHeader,
    num_frames: usize,
    num_tags: usize,
) -> Result<(Vec<String>, Vec<Orientation>), LoadError> {
    let mut names = Vec::with_capacity(num_tags);
    let mut tags = vec![Orientation::IDENTITY; table_size(&[num_frames, num_tags], "tag")?];
    let block_len = table_size(&[num_frames, TAN_TAG_DATA_SIZE], "tag")?
        .checked_add(NAME_SIZE)
        .ok_or_else(|| LoadError::broken("tag block size overflows"))?;

    for (tag, &ofs) in header.ofs_tags.iter().take(num_tags).enumerate() {
        let at = offset(0, ofs, "tag")?;
        reader.require(at, block_len)?;
        names.push(reader.name(at, NAME_SIZE)?);

        let mut c = reader.cursor(at + NAME_SIZE);
        for frame in 0..num_frames {
            tags[frame * num_tags + tag] = Orientation {
                origin: c.vec3()?,
                axis: [c.vec3()?, c.vec3()?, c.vec3()?],
            };
        }
    }
    Ok((names, tags))
}

fn read_vertices(
    reader: &ByteReader<'_>,
    at: usize,
    frames: &[TanFrame],
    num_verts: usize,
) -> Result<Vec<MdvVertex>, LoadError> {
    let num_xyz = table_size(&[frames.len(), num_verts], "xyz")?;
    reader.require(at, table_size(&[num_xyz, TAN_XYZ_NORMAL_SIZE], "xyz")?)?;
    let mut c = reader.cursor(at);
    let mut verts = Vec::with_capacity(num_xyz);
    for frame in frames {
        for _ in 0..num_verts {
            let mut xyz = [0.0; 3];
            for (axis, v) in xyz.iter_mut().enumerate() {
                *v = c.u16()? as f32 * frame.scale[axis] + frame.offset[axis];
            }
            let normal = c.u16()?;
            verts.push(MdvVertex {
                xyz,
                normal: pack_normal(decode_latlong_normal(normal)),
                tangent: [0; 4],
            });
        }
    }
    Ok(verts)
}

/// Parse a TAN buffer into a single-LOD mesh
pub fn load_tan(data: &[u8], mod_name: &str, ctx: &mut LoadContext<'_>) -> Result<MdvModel, LoadError> {
    let reader = ByteReader::new(data);
    let header = TanHeader::read(&reader)?;
    check_ident_version(header.ident, header.version, &TAN_FORMAT)?;

    let mut num_tags = count(header.num_tags, "tag")?;
    if num_tags > TAN_MAX_TAGS {
        warn!(
            model = mod_name,
            tags = num_tags,
            "tan format is limited to {TAN_MAX_TAGS} tags"
        );
        num_tags = TAN_MAX_TAGS;
    }
    let num_frames = frame_count(header.num_frames)?;
    let num_surfaces = count(header.num_surfaces, "surface")?;

    let tan_frames = read_frames(&reader, offset(0, header.ofs_frames, "frame")?, num_frames)?;
    let frames = tan_frames
        .iter()
        .map(|f| MdvFrame {
            bounds: f.bounds,
            local_origin: f.offset,
            radius: f.radius,
        })
        .collect();

    let (tag_names, tags) = read_tags(&reader, &header, num_frames, num_tags)?;

    let limits = ctx.options.limits;
    let mut surfaces = Vec::with_capacity(capacity_hint(&reader, num_surfaces, TanSurfaceHeader::SIZE));
    let mut surf_start = offset(0, header.ofs_surfaces, "surface")?;

    for _ in 0..num_surfaces {
        let sh = TanSurfaceHeader::read(&reader, surf_start)?;
        let num_verts = count(sh.num_verts, "vertex")?;
        let num_triangles = count(sh.num_triangles, "triangle")?;
        check_surface_limits(&sh.name, num_verts, num_triangles, &limits)?;

        if sh.num_frames != header.num_frames {
            return Err(LoadError::broken(format!(
                "surface {} has {} frames, the model has {}",
                sh.name, sh.num_frames, header.num_frames
            )));
        }

        let name = normalize_surface_name(&sh.name);
        let indexes = read_triangles(
            &reader,
            offset(surf_start, sh.ofs_triangles, "triangle")?,
            num_triangles,
            num_verts,
            &name,
        )?;
        let verts = read_vertices(
            &reader,
            offset(surf_start, sh.ofs_xyz_normals, "xyz")?,
            &tan_frames,
            num_verts,
        )?;
        let st = read_st(&reader, offset(surf_start, sh.ofs_st, "st")?, num_verts)?;

        surfaces.push(MdvSurface {
            name,
            num_verts,
            verts,
            st,
            indexes,
            shader_indexes: smallvec![0],
        });

        surf_start = chain_next(surf_start, sh.ofs_end, TanSurfaceHeader::SIZE, "surface")?;
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
        "loaded tan"
    );
    Ok(model)
}
