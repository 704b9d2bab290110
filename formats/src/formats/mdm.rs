//! MDM skeletal mesh (`MDMW`, version 3)
//!
//! Surfaces and tags without frames. Tags are expressed relative to a bone
//! of the MDX skeleton the mesh is animated by.
//!
//! # Layout
//! ```text
//! header    100 bytes (see MdmHeader)
//! surfaces  chained by ofs_end (see skeletal, no fixed-parent fields)
//! tags      chained by ofs_end, each
//!           name[64], axis[3], bone_index, offset,
//!           num_bone_references, ofs_bone_references, ofs_end
//!           (offsets relative to the tag)
//! ```

use tagmesh_shared::MDM_FORMAT;
use tracing::debug;

use super::common::{
    NAME_SIZE, capacity_hint, chain_next, check_ident_version, count, offset, read_i32_array,
};
use super::skeletal::{SkeletalSurface, VertexLayout, read_surfaces};
use crate::error::LoadError;
use crate::reader::{ByteReader, FieldWriter, ReadError};
use crate::services::LoadContext;

/// Fixed part of a tag record
pub const MDM_TAG_SIZE: usize = 128;

/// MDM file header (100 bytes)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MdmHeader {
    pub ident: u32,
    pub version: i32,
    pub name: String,
    pub lod_scale: f32,
    pub lod_bias: f32,
    pub num_surfaces: i32,
    pub ofs_surfaces: i32,
    pub num_tags: i32,
    pub ofs_tags: i32,
    pub ofs_end: i32,
}

impl MdmHeader {
    pub const SIZE: usize = 100;

    pub fn read(reader: &ByteReader<'_>) -> Result<Self, ReadError> {
        let mut c = reader.cursor(0);
        Ok(Self {
            ident: c.u32()?,
            version: c.i32()?,
            name: c.name(NAME_SIZE)?,
            lod_scale: c.f32()?,
            lod_bias: c.f32()?,
            num_surfaces: c.i32()?,
            ofs_surfaces: c.i32()?,
            num_tags: c.i32()?,
            ofs_tags: c.i32()?,
            ofs_end: c.i32()?,
        })
    }

    pub fn write(&self, w: &mut FieldWriter) {
        w.u32(self.ident)
            .i32(self.version)
            .name(&self.name, NAME_SIZE)
            .f32(self.lod_scale)
            .f32(self.lod_bias)
            .i32(self.num_surfaces)
            .i32(self.ofs_surfaces)
            .i32(self.num_tags)
            .i32(self.ofs_tags)
            .i32(self.ofs_end);
    }
}

/// Attachment point at a fixed offset from a skeleton bone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MdmTag {
    pub name: String,
    /// Rotation relative to the bone
    pub axis: [[f32; 3]; 3],
    /// Bone of the animating MDX skeleton, checked when the tag is resolved
    pub bone_index: i32,
    /// Translation along the bone's axes
    pub offset: [f32; 3],
    pub bone_refs: Vec<i32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MdmModel {
    pub name: String,
    pub lod_scale: f32,
    pub lod_bias: f32,
    pub surfaces: Vec<SkeletalSurface>,
    pub tags: Vec<MdmTag>,
    pub data_size: usize,
}

impl MdmModel {
    /// First tag named `name` at or after `start`
    pub fn find_tag(&self, name: &str, start: usize) -> Option<usize> {
        self.tags
            .iter()
            .enumerate()
            .skip(start)
            .find_map(|(i, t)| (t.name == name).then_some(i))
    }
}

fn read_tags(reader: &ByteReader<'_>, at: usize, num_tags: usize) -> Result<Vec<MdmTag>, LoadError> {
    let mut tag_start = at;
    let mut tags = Vec::with_capacity(capacity_hint(reader, num_tags, MDM_TAG_SIZE));
    for _ in 0..num_tags {
        reader.require(tag_start, MDM_TAG_SIZE)?;
        let mut c = reader.cursor(tag_start);
        let name = c.name(NAME_SIZE)?;
        let axis = [c.vec3()?, c.vec3()?, c.vec3()?];
        let bone_index = c.i32()?;
        let tag_offset = c.vec3()?;
        let num_refs = count(c.i32()?, "tag bone reference")?;
        let ofs_refs = c.i32()?;
        let ofs_end = c.i32()?;

        let bone_refs = read_i32_array(reader, offset(tag_start, ofs_refs, "tag bone reference")?, num_refs)?;
        tags.push(MdmTag {
            name,
            axis,
            bone_index,
            offset: tag_offset,
            bone_refs,
        });
        tag_start = chain_next(tag_start, ofs_end, MDM_TAG_SIZE, "tag")?;
    }
    Ok(tags)
}

/// Parse an MDM buffer
pub fn load_mdm(data: &[u8], mod_name: &str, ctx: &mut LoadContext<'_>) -> Result<MdmModel, LoadError> {
    let reader = ByteReader::new(data);
    let header = MdmHeader::read(&reader)?;
    check_ident_version(header.ident, header.version, &MDM_FORMAT)?;

    let num_surfaces = count(header.num_surfaces, "surface")?;
    let num_tags = count(header.num_tags, "tag")?;

    let tags = read_tags(&reader, offset(0, header.ofs_tags, "tag")?, num_tags)?;
    let surfaces = read_surfaces(
        &reader,
        offset(0, header.ofs_surfaces, "surface")?,
        num_surfaces,
        VertexLayout::Plain,
        ctx,
    )?;

    debug!(model = mod_name, surfaces = num_surfaces, tags = num_tags, "loaded mdm");

    Ok(MdmModel {
        name: header.name,
        lod_scale: header.lod_scale,
        lod_bias: header.lod_bias,
        surfaces,
        tags,
        data_size: header.ofs_end.max(0) as usize,
    })
}
