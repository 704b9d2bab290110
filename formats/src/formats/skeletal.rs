//! Skeleton and surface records shared by MDS, MDM and MDX
//!
//! MDS carries its skeleton and its surfaces in one file. MDM and MDX split
//! them: MDM holds surfaces and bone-relative tags, MDX holds the frames and
//! bone hierarchy those surfaces are animated by.
//!
//! # Layout
//! ```text
//! frame       52 bytes   mins, maxs, local_origin, radius, parent_offset
//!             then num_bones × 12   angles[4] (i16), ofs_angles[2] (i16)
//! bone info   80 bytes   name[64], parent, torso_weight, parent_dist, flags
//! surface     176-byte header (see SkeletalSurfaceHeader), then
//!             vertices    normal, tex_coords, num_weights,
//!                         [fixed_parent, fixed_dist (MDS only)], weights
//!             triangles   num_triangles × 3 × i32
//!             collapse    num_verts × i32
//!             bone refs   num_bone_references × i32
//! ```

use smallvec::SmallVec;
use tagmesh_shared::Bounds;

use super::common::{
    BoneWeight, NAME_SIZE, capacity_hint, chain_next, check_surface_limits, count, length3, normalize_surface_name,
    offset, read_frame_prefix, read_i32_array, read_triangles, read_weights, table_size,
};
use crate::codec::{BONE_FRAME_SIZE, CompressedBoneFrame};
use crate::error::LoadError;
use crate::reader::{ByteReader, FieldWriter, ReadError};
use crate::services::LoadContext;

/// Frame prefix before the per-bone records
pub const SKELETAL_FRAME_SIZE: usize = 52;
pub const BONE_INFO_SIZE: usize = 80;
/// Normal, tex coords and weight count, the smallest vertex record
const MIN_VERTEX_SIZE: usize = 24;

// ============================================================================
// Skeleton
// ============================================================================

/// Static description of one bone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoneInfo {
    pub name: String,
    /// `None` for a root bone
    pub parent: Option<usize>,
    pub torso_weight: f32,
    pub parent_dist: f32,
    pub flags: i32,
}

/// One animation frame: bounds plus an angle-encoded pose per bone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkeletalFrame {
    pub bounds: Bounds,
    pub local_origin: [f32; 3],
    pub radius: f32,
    /// Translation of root bones
    pub parent_offset: [f32; 3],
    pub bones: Vec<CompressedBoneFrame>,
}

/// Frames and bone hierarchy of an MDS or MDX file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Skeleton {
    pub bones: Vec<BoneInfo>,
    pub frames: Vec<SkeletalFrame>,
    /// Bone whose pose the torso channel rotates around
    pub torso_parent: Option<usize>,
}

impl Skeleton {
    #[inline]
    pub fn num_bones(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Frame clamped into `0..num_frames`
    pub fn frame_clamped(&self, frame: i32) -> Option<&SkeletalFrame> {
        let last = self.frames.len().checked_sub(1)?;
        self.frames.get((frame.max(0) as usize).min(last))
    }

    /// Frame with the frame number wrapped into range
    pub fn frame_wrapped(&self, frame: i32) -> Option<&SkeletalFrame> {
        let n = i32::try_from(self.frames.len()).ok().filter(|&n| n > 0)?;
        self.frames.get(frame.rem_euclid(n) as usize)
    }
}

/// Map a stored bone index to `None` (-1) or a valid index other than `this`
fn parent_index(parent: i32, this: usize, num_bones: usize) -> Result<Option<usize>, LoadError> {
    if parent == -1 {
        return Ok(None);
    }
    usize::try_from(parent)
        .ok()
        .filter(|&p| p < num_bones && p != this)
        .map(Some)
        .ok_or_else(|| LoadError::broken(format!("bone {this} has parent {parent} of {num_bones}")))
}

/// Validate a bone index read from a tag or header
pub(crate) fn bone_index(index: i32, num_bones: usize, what: &str) -> Result<usize, LoadError> {
    usize::try_from(index)
        .ok()
        .filter(|&b| b < num_bones)
        .ok_or_else(|| LoadError::broken(format!("{what} uses bone {index} of {num_bones}")))
}

/// Torso parent: -1 for none, otherwise a valid bone index
pub(crate) fn torso_parent(index: i32, num_bones: usize) -> Result<Option<usize>, LoadError> {
    if index == -1 {
        return Ok(None);
    }
    bone_index(index, num_bones, "torso parent").map(Some)
}

fn read_frames(
    reader: &ByteReader<'_>,
    at: usize,
    num_frames: usize,
    num_bones: usize,
) -> Result<Vec<SkeletalFrame>, LoadError> {
    let stride = table_size(&[num_bones, BONE_FRAME_SIZE], "bone frame")?
        .checked_add(SKELETAL_FRAME_SIZE)
        .ok_or_else(|| LoadError::broken("frame stride overflows"))?;
    reader.require(at, table_size(&[num_frames, stride], "frame")?)?;

    (0..num_frames)
        .map(|i| {
            let mut c = reader.cursor(at + i * stride);
            let (bounds, local_origin, radius) = read_frame_prefix(&mut c)?;
            let parent_offset = c.vec3()?;
            let mut bones = Vec::with_capacity(num_bones);
            for _ in 0..num_bones {
                bones.push(CompressedBoneFrame {
                    angles: [c.i16()?, c.i16()?, c.i16()?, c.i16()?],
                    ofs_angles: [c.i16()?, c.i16()?],
                });
            }
            Ok(SkeletalFrame {
                bounds,
                local_origin,
                radius,
                parent_offset,
                bones,
            })
        })
        .collect()
}

fn read_bone_infos(reader: &ByteReader<'_>, at: usize, num_bones: usize) -> Result<Vec<BoneInfo>, LoadError> {
    reader.require(at, table_size(&[num_bones, BONE_INFO_SIZE], "bone info")?)?;
    (0..num_bones)
        .map(|i| {
            let mut c = reader.cursor(at + i * BONE_INFO_SIZE);
            let name = c.name(NAME_SIZE)?;
            let parent = parent_index(c.i32()?, i, num_bones)?;
            Ok(BoneInfo {
                name,
                parent,
                torso_weight: c.f32()?,
                parent_dist: c.f32()?,
                flags: c.i32()?,
            })
        })
        .collect()
}

/// Where a skeleton lives inside its file
pub(crate) struct SkeletonLayout {
    pub num_frames: usize,
    pub num_bones: usize,
    pub ofs_frames: i32,
    pub ofs_bones: i32,
    pub torso_parent: i32,
}

pub(crate) fn read_skeleton(reader: &ByteReader<'_>, layout: &SkeletonLayout) -> Result<Skeleton, LoadError> {
    let frames = read_frames(
        reader,
        offset(0, layout.ofs_frames, "frame")?,
        layout.num_frames,
        layout.num_bones,
    )?;
    let bones = read_bone_infos(reader, offset(0, layout.ofs_bones, "bone")?, layout.num_bones)?;
    Ok(Skeleton {
        bones,
        frames,
        torso_parent: torso_parent(layout.torso_parent, layout.num_bones)?,
    })
}

// ============================================================================
// Surfaces
// ============================================================================

/// Skeletal surface header (176 bytes), offsets relative to the surface start
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SkeletalSurfaceHeader {
    pub ident: u32,
    pub name: String,
    pub shader: String,
    pub shader_index: i32,
    pub min_lod: i32,
    pub ofs_header: i32,
    pub num_verts: i32,
    pub ofs_verts: i32,
    pub num_triangles: i32,
    pub ofs_triangles: i32,
    pub ofs_collapse_map: i32,
    pub num_bone_references: i32,
    pub ofs_bone_references: i32,
    pub ofs_end: i32,
}

impl SkeletalSurfaceHeader {
    pub const SIZE: usize = 176;

    pub fn read(reader: &ByteReader<'_>, at: usize) -> Result<Self, ReadError> {
        let mut c = reader.cursor(at);
        Ok(Self {
            ident: c.u32()?,
            name: c.name(NAME_SIZE)?,
            shader: c.name(NAME_SIZE)?,
            shader_index: c.i32()?,
            min_lod: c.i32()?,
            ofs_header: c.i32()?,
            num_verts: c.i32()?,
            ofs_verts: c.i32()?,
            num_triangles: c.i32()?,
            ofs_triangles: c.i32()?,
            ofs_collapse_map: c.i32()?,
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
            .i32(self.min_lod)
            .i32(self.ofs_header)
            .i32(self.num_verts)
            .i32(self.ofs_verts)
            .i32(self.num_triangles)
            .i32(self.ofs_triangles)
            .i32(self.ofs_collapse_map)
            .i32(self.num_bone_references)
            .i32(self.ofs_bone_references)
            .i32(self.ofs_end);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkeletalVertex {
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
    pub weights: SmallVec<[BoneWeight; 4]>,
    /// Weight slot nearest to the vertex, only for two-weight MDS vertices
    pub fixed_parent: Option<usize>,
    pub fixed_dist: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkeletalSurface {
    pub name: String,
    pub shader: String,
    /// 0 when the shader name is empty or unresolved
    pub shader_index: u32,
    pub min_lod: i32,
    pub vertices: Vec<SkeletalVertex>,
    pub indexes: Vec<u32>,
    /// Vertex each vertex collapses into when reducing detail
    pub collapse_map: Vec<i32>,
    pub bone_refs: Vec<i32>,
}

/// Whether vertex records carry the MDS fixed-parent fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VertexLayout {
    WithFixedParent,
    Plain,
}

/// Nearest of exactly two weights, with its distance
pub fn nearest_weight(weights: &[BoneWeight]) -> Option<(usize, f32)> {
    let [a, b] = weights else {
        return None;
    };
    let slot = if length3(a.offset) < length3(b.offset) { 0 } else { 1 };
    Some((slot, length3(weights[slot].offset)))
}

fn read_vertices(
    reader: &ByteReader<'_>,
    at: usize,
    num_verts: usize,
    layout: VertexLayout,
) -> Result<Vec<SkeletalVertex>, LoadError> {
    let mut c = reader.cursor(at);
    let mut vertices = Vec::with_capacity(capacity_hint(reader, num_verts, MIN_VERTEX_SIZE));
    for _ in 0..num_verts {
        let normal = c.vec3()?;
        let tex_coords = c.vec2()?;
        let num_weights = c.i32()?;
        if layout == VertexLayout::WithFixedParent {
            // recomputed from the weights below
            c.skip(8);
        }
        let weights = read_weights(&mut c, reader, num_weights)?;

        let (fixed_parent, fixed_dist) = match layout {
            VertexLayout::WithFixedParent => match nearest_weight(&weights) {
                Some((slot, dist)) => (Some(slot), dist),
                None => (None, 0.0),
            },
            VertexLayout::Plain => (None, 0.0),
        };
        vertices.push(SkeletalVertex {
            normal,
            tex_coords,
            weights,
            fixed_parent,
            fixed_dist,
        });
    }
    Ok(vertices)
}

/// Read `num_surfaces` surfaces chained by their `ofs_end`
pub(crate) fn read_surfaces(
    reader: &ByteReader<'_>,
    at: usize,
    num_surfaces: usize,
    layout: VertexLayout,
    ctx: &mut LoadContext<'_>,
) -> Result<Vec<SkeletalSurface>, LoadError> {
    let mut surf_start = at;
    let mut surfaces = Vec::with_capacity(capacity_hint(reader, num_surfaces, SkeletalSurfaceHeader::SIZE));

    for _ in 0..num_surfaces {
        let sh = SkeletalSurfaceHeader::read(reader, surf_start)?;
        let num_verts = count(sh.num_verts, "vertex")?;
        let num_triangles = count(sh.num_triangles, "triangle")?;
        check_surface_limits(&sh.name, num_verts, num_triangles, &ctx.options.limits)?;

        let name = normalize_surface_name(&sh.name);
        let shader_index = if sh.shader.is_empty() {
            0
        } else {
            ctx.resolve_shader(&sh.shader)
        };

        let indexes = read_triangles(
            reader,
            offset(surf_start, sh.ofs_triangles, "triangle")?,
            num_triangles,
            num_verts,
            &name,
        )?;
        let vertices = read_vertices(
            reader,
            offset(surf_start, sh.ofs_verts, "vertex")?,
            num_verts,
            layout,
        )?;
        let collapse_map = read_i32_array(
            reader,
            offset(surf_start, sh.ofs_collapse_map, "collapse map")?,
            num_verts,
        )?;
        let bone_refs = read_i32_array(
            reader,
            offset(surf_start, sh.ofs_bone_references, "bone reference")?,
            count(sh.num_bone_references, "bone reference")?,
        )?;

        let next = chain_next(surf_start, sh.ofs_end, SkeletalSurfaceHeader::SIZE, "surface")?;
        surfaces.push(SkeletalSurface {
            name,
            shader: sh.shader,
            shader_index,
            min_lod: sh.min_lod,
            vertices,
            indexes,
            collapse_map,
            bone_refs,
        });
        surf_start = next;
    }
    Ok(surfaces)
}
