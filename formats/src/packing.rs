//! Vertex data packing utilities
//!
//! Provides the conversions between file encodings and GPU vertex streams:
//! - lat/long u16 normals → unit vectors (sine lookup table)
//! - f32 normals/tangents → snorm16x4
//! - per-surface vertex arrays → one packed stream plus attribute descriptors
//!
//! Static meshes with a single frame get a fully interleaved stream. Meshes with
//! several frames get a UV block followed by per-(frame, vertex) records, with a
//! second set of "next frame" attribute slots for GPU-side interpolation.

use std::sync::OnceLock;

use bytemuck::cast_slice;

use crate::formats::mdv::MdvVertex;

// ============================================================================
// Sine Lookup Table
// ============================================================================

/// Number of entries in the circular sine table
pub const FUNCTABLE_SIZE: usize = 1024;
/// Mask used to wrap table indices
pub const FUNCTABLE_MASK: usize = FUNCTABLE_SIZE - 1;

static SIN_TABLE: OnceLock<[f32; FUNCTABLE_SIZE]> = OnceLock::new();

/// Shared sine table, one full period over the table
pub fn sin_table() -> &'static [f32; FUNCTABLE_SIZE] {
    SIN_TABLE.get_or_init(|| {
        core::array::from_fn(|i| {
            (i as f32 * 360.0 / (FUNCTABLE_SIZE - 1) as f32)
                .to_radians()
                .sin()
        })
    })
}

// ============================================================================
// Lat/Long Normals
// ============================================================================

/// Decode a lat/long packed normal.
///
/// The high byte is latitude and the low byte longitude, each scaled from
/// 256 steps to the table size. Cosines are read a quarter period ahead.
#[inline]
pub fn decode_latlong_normal(packed: u16) -> [f32; 3] {
    let table = sin_table();
    let lat = (((packed >> 8) & 0xFF) as usize) * (FUNCTABLE_SIZE / 256);
    let lng = ((packed & 0xFF) as usize) * (FUNCTABLE_SIZE / 256);
    let quarter = FUNCTABLE_SIZE / 4;

    [
        table[(lat + quarter) & FUNCTABLE_MASK] * table[lng],
        table[lat] * table[lng],
        table[(lng + quarter) & FUNCTABLE_MASK],
    ]
}

/// Encode a unit normal into lat/long form
pub fn encode_latlong_normal(normal: [f32; 3]) -> u16 {
    let [x, y, z] = normal;
    if x == 0.0 && y == 0.0 {
        // straight up or down, longitude alone encodes it
        return if z > 0.0 { 0 } else { 128 };
    }
    let scale = 255.0 / std::f32::consts::TAU;
    let lat = (y.atan2(x) * scale) as i32 & 0xFF;
    let lng = (z.clamp(-1.0, 1.0).acos() * scale) as i32 & 0xFF;
    ((lat << 8) | lng) as u16
}

// ============================================================================
// Normal / Tangent Packing
// ============================================================================

#[inline]
fn f32_to_snorm16(value: f32) -> i16 {
    let rounded = value * 32767.0 + if value > 0.0 { 0.5 } else { -0.5 };
    rounded.clamp(-32767.0, 32767.0) as i16
}

/// Pack a unit normal to snorm16x4 (w = 0)
#[inline]
pub fn pack_normal(n: [f32; 3]) -> [i16; 4] {
    [f32_to_snorm16(n[0]), f32_to_snorm16(n[1]), f32_to_snorm16(n[2]), 0]
}

/// Unpack a snorm16x4 normal
#[inline]
pub fn unpack_normal(packed: [i16; 4]) -> [f32; 3] {
    [
        packed[0] as f32 / 32767.0,
        packed[1] as f32 / 32767.0,
        packed[2] as f32 / 32767.0,
    ]
}

/// Pack a tangent (xyz + handedness sign in w) to snorm16x4
#[inline]
pub fn pack_tangent(t: [f32; 4]) -> [i16; 4] {
    [
        f32_to_snorm16(t[0]),
        f32_to_snorm16(t[1]),
        f32_to_snorm16(t[2]),
        f32_to_snorm16(t[3]),
    ]
}

/// Unpack a snorm16x4 tangent
#[inline]
pub fn unpack_tangent(packed: [i16; 4]) -> [f32; 4] {
    packed.map(|v| v as f32 / 32767.0)
}

// ============================================================================
// Stream Layout
// ============================================================================

/// Size of an f32x3 position
pub const SIZE_POSITION: u32 = 12;
/// Size of an f32x2 texture coordinate
pub const SIZE_TEXCOORD: u32 = 8;
/// Size of a snorm16x4 normal
pub const SIZE_NORMAL: u32 = 8;
/// Size of a snorm16x4 tangent
pub const SIZE_TANGENT: u32 = 8;

/// Stride of the interleaved single-frame record
pub const STATIC_VERTEX_STRIDE: u32 = SIZE_POSITION + SIZE_TEXCOORD + SIZE_NORMAL + SIZE_TANGENT;
/// Stride of one per-(frame, vertex) record in the animated layout
pub const ANIMATED_VERTEX_STRIDE: u32 = SIZE_POSITION + SIZE_NORMAL + SIZE_TANGENT;

/// Scalar type of an attribute component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    Float,
    Short,
}

/// Attribute slots a packed stream can populate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeSlot {
    Position,
    TexCoord,
    Normal,
    Tangent,
    /// Next-frame position for GPU interpolation
    Position2,
    /// Next-frame normal for GPU interpolation
    Normal2,
    /// Next-frame tangent for GPU interpolation
    Tangent2,
}

/// How one attribute is read out of the packed stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub slot: AttributeSlot,
    pub count: u32,
    pub component: ComponentType,
    pub normalized: bool,
    pub offset: u32,
    pub stride: u32,
}

/// Attribute descriptors plus per-frame span for a packed stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamLayout {
    pub attributes: Vec<VertexAttribute>,
    /// Bytes between consecutive frames' records (0 for single-frame streams)
    pub frame_size: u32,
}

impl StreamLayout {
    /// Descriptor for `slot`, if the stream populates it
    pub fn attribute(&self, slot: AttributeSlot) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.slot == slot)
    }

    /// Whether the stream carries next-frame slots
    pub fn is_animated(&self) -> bool {
        self.attribute(AttributeSlot::Position2).is_some()
    }
}

/// Packed vertex bytes and the layout describing them
#[derive(Debug, Clone, PartialEq)]
pub struct PackedStream {
    pub data: Vec<u8>,
    pub layout: StreamLayout,
}

const fn attribute(
    slot: AttributeSlot,
    count: u32,
    component: ComponentType,
    normalized: bool,
    offset: u32,
    stride: u32,
) -> VertexAttribute {
    VertexAttribute {
        slot,
        count,
        component,
        normalized,
        offset,
        stride,
    }
}

/// Compute the layout for a surface of `num_verts` vertices over `num_frames` frames
pub fn stream_layout(num_frames: usize, num_verts: usize) -> StreamLayout {
    use AttributeSlot::*;
    use ComponentType::*;

    if num_frames > 1 {
        // texcoords first, then position/normal/tangent per frame
        let offset_st = 0;
        let offset_xyz = num_verts as u32 * SIZE_TEXCOORD;
        let offset_normal = offset_xyz + SIZE_POSITION;
        let offset_tangent = offset_normal + SIZE_NORMAL;
        let stride = ANIMATED_VERTEX_STRIDE;

        let position = attribute(Position, 3, Float, false, offset_xyz, stride);
        let normal = attribute(Normal, 4, Short, true, offset_normal, stride);
        let tangent = attribute(Tangent, 4, Short, true, offset_tangent, stride);

        StreamLayout {
            attributes: vec![
                position,
                attribute(TexCoord, 2, Float, false, offset_st, SIZE_TEXCOORD),
                normal,
                tangent,
                VertexAttribute { slot: Position2, ..position },
                VertexAttribute { slot: Normal2, ..normal },
                VertexAttribute { slot: Tangent2, ..tangent },
            ],
            frame_size: stride * num_verts as u32,
        }
    } else {
        let offset_xyz = 0;
        let offset_st = offset_xyz + SIZE_POSITION;
        let offset_normal = offset_st + SIZE_TEXCOORD;
        let offset_tangent = offset_normal + SIZE_NORMAL;
        let stride = STATIC_VERTEX_STRIDE;

        StreamLayout {
            attributes: vec![
                attribute(Position, 3, Float, false, offset_xyz, stride),
                attribute(TexCoord, 2, Float, false, offset_st, stride),
                attribute(Normal, 4, Short, true, offset_normal, stride),
                attribute(Tangent, 4, Short, true, offset_tangent, stride),
            ],
            frame_size: 0,
        }
    }
}

// ============================================================================
// Full Stream Packing
// ============================================================================

/// Pack a surface's vertices into a GPU-ready stream.
///
/// `verts` holds `num_frames × num_verts` records, frame-major; `st` holds one
/// texture coordinate per vertex, shared by every frame.
pub fn pack_vertex_streams(
    num_frames: usize,
    num_verts: usize,
    verts: &[MdvVertex],
    st: &[[f32; 2]],
) -> PackedStream {
    let layout = stream_layout(num_frames, num_verts);
    let st = &st[..num_verts.min(st.len())];

    let data = if num_frames > 1 {
        let records = &verts[..(num_frames * num_verts).min(verts.len())];
        let mut data =
            Vec::with_capacity(st.len() * SIZE_TEXCOORD as usize + std::mem::size_of_val(records));
        data.extend_from_slice(cast_slice(st));
        // MdvVertex is exactly the animated record: xyz, normal, tangent
        data.extend_from_slice(cast_slice(records));
        data
    } else {
        let mut data = Vec::with_capacity(num_verts * STATIC_VERTEX_STRIDE as usize);
        for (v, uv) in verts.iter().zip(st) {
            data.extend_from_slice(cast_slice(&v.xyz));
            data.extend_from_slice(cast_slice(uv));
            data.extend_from_slice(cast_slice(&v.normal));
            data.extend_from_slice(cast_slice(&v.tangent));
        }
        data
    };

    PackedStream { data, layout }
}
