//! Model file parsing for tagmesh
//!
//! This crate turns raw model files into in-memory models:
//! - `tagmesh-core` (registry) calls the parsers and owns the results
//! - embedders implement [`ShaderResolver`] and [`GpuBufferFactory`]
//!
//! # Modules
//!
//! - [`formats`] - One parser per model format, plus the shared mesh type
//! - [`codec`] - Compressed bone matrix and angle-encoded bone frame decoding
//! - [`packing`] - Lat/long and snorm16 normal packing, GPU vertex streams
//! - [`tangent`] - Per-vertex tangent space generation
//! - [`reader`] - Bounds-checked little-endian reads and writes
//! - [`services`] - Shader and GPU collaborators, load-time options

pub mod codec;
pub mod error;
pub mod formats;
pub mod packing;
pub mod reader;
pub mod services;
pub mod tangent;
pub mod test_utils;

pub use error::LoadError;
pub use reader::{ByteReader, FieldWriter, ReadError};
pub use services::{
    BoundsOverride, BufferUsage, GpuBufferFactory, GpuBufferHandle, ImageMode, LightmapMode,
    LoadContext, LoadOptions, ShaderRef, ShaderResolver, SurfaceLimits,
};

// Re-export commonly used codec and packing items
pub use codec::{CompressedBoneFrame, compress_bone_matrix, decompress_bone_matrix};
pub use packing::{
    AttributeSlot, ComponentType, PackedStream, StreamLayout, VertexAttribute, pack_vertex_streams,
    stream_layout,
};

// Re-export the parsers and their model types
pub use formats::{
    BinarySerializable, BoneInfo, BoneWeight, MdmModel, MdmTag, MdrFrame, MdrLod, MdrModel,
    MdrSurface, MdrTag, MdrVertex, MdsModel, MdsTag, MdvFrame, MdvModel, MdvSurface, MdvVertex,
    MdxModel, SkeletalFrame, SkeletalSurface, SkeletalVertex, Skeleton, SurfaceBuffer, load_md3,
    load_mdc, load_mdm, load_mdr, load_mds, load_mdx, load_tan,
};
