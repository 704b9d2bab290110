//! MDS skeletal model (`MDSW`, version 4)
//!
//! # Layout
//! ```text
//! header    120 bytes (see MdsHeader)
//! frames    num_frames × (52 + num_bones × 12)
//! bones     num_bones × 80
//! surfaces  chained by ofs_end (see skeletal)
//! tags      num_tags × 72    name[64], torso_weight, bone_index
//! ```

use tagmesh_shared::MDS_FORMAT;
use tracing::debug;

use super::common::{NAME_SIZE, check_ident_version, count, frame_count, offset, table_size};
use super::skeletal::{SkeletalSurface, Skeleton, SkeletonLayout, VertexLayout, bone_index, read_skeleton, read_surfaces};
use crate::error::LoadError;
use crate::reader::{ByteReader, FieldWriter, ReadError};
use crate::services::LoadContext;

pub const MDS_TAG_SIZE: usize = 72;

/// MDS file header (120 bytes)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MdsHeader {
    pub ident: u32,
    pub version: i32,
    pub name: String,
    pub lod_scale: f32,
    pub lod_bias: f32,
    pub num_frames: i32,
    pub num_bones: i32,
    pub ofs_frames: i32,
    pub ofs_bones: i32,
    pub torso_parent: i32,
    pub num_surfaces: i32,
    pub ofs_surfaces: i32,
    pub num_tags: i32,
    pub ofs_tags: i32,
    pub ofs_end: i32,
}

impl MdsHeader {
    pub const SIZE: usize = 120;

    pub fn read(reader: &ByteReader<'_>) -> Result<Self, ReadError> {
        let mut c = reader.cursor(0);
        Ok(Self {
            ident: c.u32()?,
            version: c.i32()?,
            name: c.name(NAME_SIZE)?,
            lod_scale: c.f32()?,
            lod_bias: c.f32()?,
            num_frames: c.i32()?,
            num_bones: c.i32()?,
            ofs_frames: c.i32()?,
            ofs_bones: c.i32()?,
            torso_parent: c.i32()?,
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
            .i32(self.num_frames)
            .i32(self.num_bones)
            .i32(self.ofs_frames)
            .i32(self.ofs_bones)
            .i32(self.torso_parent)
            .i32(self.num_surfaces)
            .i32(self.ofs_surfaces)
            .i32(self.num_tags)
            .i32(self.ofs_tags)
            .i32(self.ofs_end);
    }
}

/// Attachment point following one bone of the model's own skeleton
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MdsTag {
    pub name: String,
    pub torso_weight: f32,
    pub bone_index: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MdsModel {
    pub name: String,
    pub lod_scale: f32,
    pub lod_bias: f32,
    pub skeleton: Skeleton,
    pub surfaces: Vec<SkeletalSurface>,
    pub tags: Vec<MdsTag>,
    pub data_size: usize,
}

impl MdsModel {
    /// First tag named `name` at or after `start`
    pub fn find_tag(&self, name: &str, start: usize) -> Option<usize> {
        self.tags
            .iter()
            .enumerate()
            .skip(start)
            .find_map(|(i, t)| (t.name == name).then_some(i))
    }
}

fn read_tags(reader: &ByteReader<'_>, at: usize, num_tags: usize, num_bones: usize) -> Result<Vec<MdsTag>, LoadError> {
    reader.require(at, table_size(&[num_tags, MDS_TAG_SIZE], "tag")?)?;
    let mut c = reader.cursor(at);
    (0..num_tags)
        .map(|_| {
            let name = c.name(NAME_SIZE)?;
            let torso_weight = c.f32()?;
            let bone_index = bone_index(c.i32()?, num_bones, &format!("tag {name}"))?;
            Ok(MdsTag {
                name,
                torso_weight,
                bone_index,
            })
        })
        .collect()
}

/// Parse an MDS buffer
pub fn load_mds(data: &[u8], mod_name: &str, ctx: &mut LoadContext<'_>) -> Result<MdsModel, LoadError> {
    let reader = ByteReader::new(data);
    let header = MdsHeader::read(&reader)?;
    check_ident_version(header.ident, header.version, &MDS_FORMAT)?;

    let num_frames = frame_count(header.num_frames)?;
    let num_bones = count(header.num_bones, "bone")?;
    let num_surfaces = count(header.num_surfaces, "surface")?;
    let num_tags = count(header.num_tags, "tag")?;

    let skeleton = read_skeleton(
        &reader,
        &SkeletonLayout {
            num_frames,
            num_bones,
            ofs_frames: header.ofs_frames,
            ofs_bones: header.ofs_bones,
            torso_parent: header.torso_parent,
        },
    )?;
    let tags = read_tags(&reader, offset(0, header.ofs_tags, "tag")?, num_tags, num_bones)?;
    let surfaces = read_surfaces(
        &reader,
        offset(0, header.ofs_surfaces, "surface")?,
        num_surfaces,
        VertexLayout::WithFixedParent,
        ctx,
    )?;

    debug!(
        model = mod_name,
        frames = num_frames,
        bones = num_bones,
        surfaces = num_surfaces,
        "loaded mds"
    );

    Ok(MdsModel {
        name: header.name,
        lod_scale: header.lod_scale,
        lod_bias: header.lod_bias,
        skeleton,
        surfaces,
        tags,
        data_size: header.ofs_end.max(0) as usize,
    })
}
