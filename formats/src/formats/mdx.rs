//! MDX bone animation (`MDXW`, version 2)
//!
//! Frames and bone hierarchy only. MDM meshes are animated by an MDX passed
//! alongside them as the frame model.
//!
//! # Layout
//! ```text
//! header  96 bytes (see MdxHeader)
//! frames  num_frames × (52 + num_bones × 12)
//! bones   num_bones × 80
//! ```

use tagmesh_shared::MDX_FORMAT;
use tracing::debug;

use super::common::{NAME_SIZE, check_ident_version, count, frame_count};
use super::skeletal::{Skeleton, SkeletonLayout, read_skeleton};
use crate::error::LoadError;
use crate::reader::{ByteReader, FieldWriter, ReadError};

/// MDX file header (96 bytes)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MdxHeader {
    pub ident: u32,
    pub version: i32,
    pub name: String,
    pub num_frames: i32,
    pub num_bones: i32,
    pub ofs_frames: i32,
    pub ofs_bones: i32,
    pub torso_parent: i32,
    pub ofs_end: i32,
}

impl MdxHeader {
    pub const SIZE: usize = 96;

    pub fn read(reader: &ByteReader<'_>) -> Result<Self, ReadError> {
        let mut c = reader.cursor(0);
        Ok(Self {
            ident: c.u32()?,
            version: c.i32()?,
            name: c.name(NAME_SIZE)?,
            num_frames: c.i32()?,
            num_bones: c.i32()?,
            ofs_frames: c.i32()?,
            ofs_bones: c.i32()?,
            torso_parent: c.i32()?,
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
            .i32(self.ofs_bones)
            .i32(self.torso_parent)
            .i32(self.ofs_end);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MdxModel {
    pub name: String,
    pub skeleton: Skeleton,
    pub data_size: usize,
}

/// Parse an MDX buffer
pub fn load_mdx(data: &[u8], mod_name: &str) -> Result<MdxModel, LoadError> {
    let reader = ByteReader::new(data);
    let header = MdxHeader::read(&reader)?;
    check_ident_version(header.ident, header.version, &MDX_FORMAT)?;

    let num_frames = frame_count(header.num_frames)?;
    let num_bones = count(header.num_bones, "bone")?;
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

    debug!(model = mod_name, frames = num_frames, bones = num_bones, "loaded mdx");

    Ok(MdxModel {
        name: header.name,
        skeleton,
        data_size: header.ofs_end.max(0) as usize,
    })
}
