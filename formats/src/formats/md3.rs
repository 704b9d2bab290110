//! MD3 static mesh (`IDP3`, version 15)
//!
//! # Layout
//! ```text
//! header   108 bytes (see Md3Header)
//! frames   num_frames × 56    mins, maxs, local_origin, radius, name[16]
//! tags     num_frames × num_tags × 112    name[64], origin, axis[3]
//! surfaces chained by ofs_end, each 108-byte header followed by
//!          shaders    num_shaders × 68    name[64], index
//!          triangles  num_triangles × 3 × i32
//!          st         num_verts × 2 × f32
//!          xyz_normal num_frames × num_verts × (3 × i16, u16 lat/long normal)
//! ```

use smallvec::SmallVec;
use tagmesh_shared::{MD3_FORMAT, Orientation};
use tracing::debug;

use super::common::{
    NAME_SIZE, capacity_hint, chain_next, check_ident_version, check_surface_limits, count, frame_count,
    normalize_surface_name, offset, read_frame_prefix, read_st, read_triangles, table_size,
};
use super::mdv::{MdvFrame, MdvModel, MdvSurface, MdvVertex, finish_mesh};
use crate::error::LoadError;
use crate::packing::{decode_latlong_normal, pack_normal};
use crate::reader::{ByteReader, FieldWriter, ReadError};
use crate::services::LoadContext;

/// Scale from stored i16 positions to model units
pub const MD3_XYZ_SCALE: f32 = 1.0 / 64.0;

pub const MD3_FRAME_SIZE: usize = 56;
pub const MD3_TAG_SIZE: usize = 112;
pub const MD3_SHADER_SIZE: usize = 68;
pub const MD3_XYZ_NORMAL_SIZE: usize = 8;

/// MD3 file header (108 bytes)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Md3Header {
    pub ident: u32,
    pub version: i32,
    pub name: String,
    pub flags: i32,
    pub num_frames: i32,
    pub num_tags: i32,
    pub num_surfaces: i32,
    pub num_skins: i32,
    pub ofs_frames: i32,
    pub ofs_tags: i32,
    pub ofs_surfaces: i32,
    pub ofs_end: i32,
}

impl Md3Header {
    pub const SIZE: usize = 108;

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
            .i32(self.ofs_tags)
            .i32(self.ofs_surfaces)
            .i32(self.ofs_end);
    }
}

/// MD3 surface header (108 bytes), offsets relative to the surface start
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Md3SurfaceHeader {
    pub ident: u32,
    pub name: String,
    pub flags: i32,
    pub num_frames: i32,
    pub num_shaders: i32,
    pub num_verts: i32,
    pub num_triangles: i32,
    pub ofs_triangles: i32,
    pub ofs_shaders: i32,
    pub ofs_st: i32,
    pub ofs_xyz_normals: i32,
    pub ofs_end: i32,
}

impl Md3SurfaceHeader {
    pub const SIZE: usize = 108;

    pub fn read(reader: &ByteReader<'_>, at: usize) -> Result<Self, ReadError> {
        let mut c = reader.cursor(at);
        Ok(Self {
            ident: c.u32()?,
            name: c.name(NAME_SIZE)?,
            flags: c.i32()?,
            num_frames: c.i32()?,
            num_shaders: c.i32()?,
            num_verts: c.i32()?,
            num_triangles: c.i32()?,
            ofs_triangles: c.i32()?,
            ofs_shaders: c.i32()?,
            ofs_st: c.i32()?,
            ofs_xyz_normals: c.i32()?,
            ofs_end: c.i32()?,
        })
    }

    pub fn write(&self, w: &mut FieldWriter) {
        w.u32(self.ident)
            .name(&self.name, NAME_SIZE)
            .i32(self.flags)
            .i32(self.num_frames)
            .i32(self.num_shaders)
            .i32(self.num_verts)
            .i32(self.num_triangles)
            .i32(self.ofs_triangles)
            .i32(self.ofs_shaders)
            .i32(self.ofs_st)
            .i32(self.ofs_xyz_normals)
            .i32(self.ofs_end);
    }
}

/// Decode one xyz/normal record (shared with MDC base frames)
pub(crate) fn read_xyz_normal(reader: &ByteReader<'_>, at: usize) -> Result<MdvVertex, ReadError> {
    let mut c = reader.cursor(at);
    let x = c.i16()?;
    let y = c.i16()?;
    let z = c.i16()?;
    let normal = c.u16()?;
    Ok(MdvVertex {
        xyz: [
            x as f32 * MD3_XYZ_SCALE,
            y as f32 * MD3_XYZ_SCALE,
            z as f32 * MD3_XYZ_SCALE,
        ],
        normal: pack_normal(decode_latlong_normal(normal)),
        tangent: [0; 4],
    })
}

/// Read `num_frames` MD3-style frame records
pub(crate) fn read_md3_frames(
    reader: &ByteReader<'_>,
    at: usize,
    num_frames: usize,
) -> Result<Vec<MdvFrame>, LoadError> {
    reader.require(at, table_size(&[num_frames, MD3_FRAME_SIZE], "frame")?)?;
    (0..num_frames)
        .map(|i| {
            let mut c = reader.cursor(at + i * MD3_FRAME_SIZE);
            let (bounds, local_origin, radius) = read_frame_prefix(&mut c)?;
            Ok(MdvFrame {
                bounds,
                local_origin,
                radius,
            })
        })
        .collect()
}

/// Resolve `num_shaders` shader records starting at `at`
pub(crate) fn read_shaders(
    reader: &ByteReader<'_>,
    at: usize,
    num_shaders: usize,
    ctx: &mut LoadContext<'_>,
) -> Result<SmallVec<[u32; 2]>, LoadError> {
    reader.require(at, table_size(&[num_shaders, MD3_SHADER_SIZE], "shader")?)?;
    (0..num_shaders)
        .map(|i| {
            let name = reader.name(at + i * MD3_SHADER_SIZE, NAME_SIZE)?;
            Ok(ctx.resolve_shader(&name))
        })
        .collect()
}

fn read_tags(
    reader: &ByteReader<'_>,
    at: usize,
    num_frames: usize,
    num_tags: usize,
) -> Result<(Vec<String>, Vec<Orientation>), LoadError> {
    let total = table_size(&[num_frames, num_tags], "tag")?;
    reader.require(at, table_size(&[total, MD3_TAG_SIZE], "tag")?)?;

    let mut names = Vec::with_capacity(num_tags);
    let mut tags = Vec::with_capacity(total);
    for i in 0..total {
        let mut c = reader.cursor(at + i * MD3_TAG_SIZE);
        let name = c.name(NAME_SIZE)?;
        if i < num_tags {
            names.push(name);
        }
        tags.push(Orientation {
            origin: c.vec3()?,
            axis: [c.vec3()?, c.vec3()?, c.vec3()?],
        });
    }
    Ok((names, tags))
}

/// Parse an MD3 buffer into one mesh LOD
pub fn load_md3(data: &[u8], mod_name: &str, ctx: &mut LoadContext<'_>) -> Result<MdvModel, LoadError> {
    let reader = ByteReader::new(data);
    let header = Md3Header::read(&reader)?;
    check_ident_version(header.ident, header.version, &MD3_FORMAT)?;

    let num_frames = frame_count(header.num_frames)?;
    let num_tags = count(header.num_tags, "tag")?;
    let num_surfaces = count(header.num_surfaces, "surface")?;

    let frames = read_md3_frames(&reader, offset(0, header.ofs_frames, "frame")?, num_frames)?;
    let (tag_names, tags) = read_tags(&reader, offset(0, header.ofs_tags, "tag")?, num_frames, num_tags)?;

    let limits = ctx.options.limits;
    let mut surfaces = Vec::with_capacity(capacity_hint(&reader, num_surfaces, Md3SurfaceHeader::SIZE));
    let mut surf_start = offset(0, header.ofs_surfaces, "surface")?;

    for _ in 0..num_surfaces {
        let sh = Md3SurfaceHeader::read(&reader, surf_start)?;
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

        let xyz_at = offset(surf_start, sh.ofs_xyz_normals, "xyz")?;
        let num_xyz = table_size(&[num_frames, num_verts], "xyz")?;
        reader.require(xyz_at, table_size(&[num_xyz, MD3_XYZ_NORMAL_SIZE], "xyz")?)?;
        let verts = (0..num_xyz)
            .map(|i| read_xyz_normal(&reader, xyz_at + i * MD3_XYZ_NORMAL_SIZE))
            .collect::<Result<Vec<_>, _>>()?;

        let st = read_st(&reader, offset(surf_start, sh.ofs_st, "st")?, num_verts)?;

        surfaces.push(MdvSurface {
            name,
            num_verts,
            verts,
            st,
            indexes,
            shader_indexes,
        });

        surf_start = chain_next(surf_start, sh.ofs_end, Md3SurfaceHeader::SIZE, "surface")?;
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
        "loaded md3"
    );
    Ok(model)
}
