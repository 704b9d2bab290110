//! Unified in-memory mesh built by the MD3, MDC and TAN parsers
//!
//! Every static-mesh format is expanded into [`MdvModel`]: per-frame bounds,
//! frame-major tags with one shared name per tag, and surfaces whose vertex
//! records are stored frame-major. After parsing, [`finish_mesh`] computes
//! tangents and uploads the surfaces as GPU vertex buffers.

use bytemuck::{Pod, Zeroable};
use smallvec::SmallVec;
use tagmesh_shared::{Bounds, Orientation};
use tracing::debug;

use crate::packing::{StreamLayout, pack_vertex_streams};
use crate::services::{BufferUsage, GpuBufferHandle, LoadContext};
use crate::tangent::compute_surface_tangents;

/// One (frame, vertex) record: position, packed normal, packed tangent
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct MdvVertex {
    pub xyz: [f32; 3],
    pub normal: [i16; 4],
    pub tangent: [i16; 4],
}

/// Per-frame bounding information
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MdvFrame {
    pub bounds: Bounds,
    pub local_origin: [f32; 3],
    pub radius: f32,
}

/// A renderable piece of a static mesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MdvSurface {
    /// Lowercased, `_N` suffix stripped
    pub name: String,
    pub num_verts: usize,
    /// `num_frames × num_verts` records, frame-major
    pub verts: Vec<MdvVertex>,
    /// One texture coordinate per vertex, shared by every frame
    pub st: Vec<[f32; 2]>,
    /// Three indices per triangle
    pub indexes: Vec<u32>,
    pub shader_indexes: SmallVec<[u32; 2]>,
}

impl MdvSurface {
    #[inline]
    pub fn num_triangles(&self) -> usize {
        self.indexes.len() / 3
    }

    /// Vertex records of one frame
    pub fn frame_verts(&self, frame: usize) -> &[MdvVertex] {
        let start = frame * self.num_verts;
        self.verts.get(start..start + self.num_verts).unwrap_or(&[])
    }
}

/// GPU buffer built for one surface
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceBuffer {
    /// Index into [`MdvModel::surfaces`]
    pub surface: usize,
    pub handle: GpuBufferHandle,
    pub layout: StreamLayout,
    pub num_indexes: usize,
    pub num_verts: usize,
}

/// One level of detail of a static mesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MdvModel {
    pub frames: Vec<MdvFrame>,
    /// One name per tag, shared across frames
    pub tag_names: Vec<String>,
    /// `num_frames × num_tags`, frame-major
    pub tags: Vec<Orientation>,
    pub surfaces: Vec<MdvSurface>,
    /// Empty when multi-frame GPU animation is disabled
    pub vao_surfaces: Vec<SurfaceBuffer>,
    /// Bytes declared by the source file
    pub data_size: usize,
}

impl MdvModel {
    #[inline]
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn num_tags(&self) -> usize {
        self.tag_names.len()
    }

    /// First tag named `name` at or after `start`
    pub fn find_tag(&self, name: &str, start: usize) -> Option<usize> {
        self.tag_names
            .iter()
            .enumerate()
            .skip(start)
            .find_map(|(i, n)| (n == name).then_some(i))
    }

    /// Tag `index` in `frame`; frames past the end clamp to the last one
    pub fn tag(&self, frame: i32, index: usize) -> Option<Orientation> {
        let last = self.num_frames().checked_sub(1)?;
        let frame = (frame.max(0) as usize).min(last);
        self.tags.get(frame * self.num_tags() + index).copied()
    }

    /// Frame record with the frame number wrapped into range
    pub fn frame_wrapped(&self, frame: i32) -> Option<&MdvFrame> {
        let n = i32::try_from(self.num_frames()).ok().filter(|&n| n > 0)?;
        self.frames.get(frame.rem_euclid(n) as usize)
    }
}

/// Compute tangents for every surface, then build GPU buffers.
///
/// Runs only after the whole file validated, so a failed parse never
/// creates GPU resources.
pub fn finish_mesh(model: &mut MdvModel, mod_name: &str, ctx: &mut LoadContext<'_>) {
    let num_frames = model.num_frames();

    for surf in &mut model.surfaces {
        compute_surface_tangents(num_frames, surf.num_verts, &mut surf.verts, &surf.st, &surf.indexes);
    }

    if num_frames > 1 && !ctx.options.gpu_vertex_animation {
        debug!(model = mod_name, "skipping GPU buffers for CPU vertex animation");
        model.vao_surfaces.clear();
        return;
    }

    model.vao_surfaces = model
        .surfaces
        .iter()
        .enumerate()
        .map(|(i, surf)| {
            let packed = pack_vertex_streams(num_frames, surf.num_verts, &surf.verts, &surf.st);
            let label = format!("staticMesh_VAO '{}'", surf.name);
            let handle = ctx.gpu.create_vertex_buffer(
                &label,
                &packed.data,
                bytemuck::cast_slice(&surf.indexes),
                BufferUsage::Static,
            );
            ctx.gpu.configure_attributes(handle, &packed.layout);
            SurfaceBuffer {
                surface: i,
                handle,
                layout: packed.layout,
                num_indexes: surf.indexes.len(),
                num_verts: surf.num_verts,
            }
        })
        .collect();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged_model() -> MdvModel {
        let mut tags = Vec::new();
        for frame in 0..2 {
            for tag in 0..3 {
                let mut o = Orientation::IDENTITY;
                o.origin = [frame as f32, tag as f32, 0.0];
                tags.push(o);
            }
        }
        MdvModel {
            frames: vec![MdvFrame::default(); 2],
            tag_names: vec!["tag_weapon".into(), "tag_head".into(), "tag_weapon".into()],
            tags,
            ..Default::default()
        }
    }

    #[test]
    fn test_vertex_is_pod_28_bytes() {
        assert_eq!(std::mem::size_of::<MdvVertex>(), 28);
        let v = MdvVertex::zeroed();
        assert_eq!(bytemuck::bytes_of(&v).len(), 28);
    }

    #[test]
    fn test_find_tag_from_start_index() {
        let model = tagged_model();
        assert_eq!(model.find_tag("tag_weapon", 0), Some(0));
        assert_eq!(model.find_tag("tag_weapon", 1), Some(2));
        assert_eq!(model.find_tag("tag_weapon", 3), None);
        assert_eq!(model.find_tag("tag_missing", 0), None);
    }

    #[test]
    fn test_tag_frame_is_clamped() {
        let model = tagged_model();
        assert_eq!(model.tag(1, 2).unwrap().origin, [1.0, 2.0, 0.0]);
        assert_eq!(model.tag(7, 2).unwrap().origin, [1.0, 2.0, 0.0]);
        assert_eq!(model.tag(-1, 1).unwrap().origin, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_frame_wraps() {
        let mut model = tagged_model();
        model.frames[1].radius = 5.0;
        assert_eq!(model.frame_wrapped(3).unwrap().radius, 5.0);
        assert_eq!(model.frame_wrapped(-1).unwrap().radius, 5.0);
        assert_eq!(MdvModel::default().frame_wrapped(0), None);
    }
}
