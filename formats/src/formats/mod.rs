//! Model file parsers
//!
//! One module per on-disk format. MD3, MDC and TAN expand into the shared
//! [`MdvModel`] mesh; MDR, MDS, MDM and MDX keep their own model types.
//!
//! Format idents, versions and extensions are defined in
//! `tagmesh_shared::model_format`. All headers implement
//! [`BinarySerializable`].

pub mod common;
pub mod md3;
pub mod mdc;
pub mod mdm;
pub mod mdr;
pub mod mds;
pub mod mdv;
pub mod mdx;
mod serialization;
pub mod skeletal;
pub mod tan;

pub use common::BoneWeight;
pub use md3::*;
pub use mdc::*;
pub use mdm::*;
pub use mdr::*;
pub use mds::*;
pub use mdv::*;
pub use mdx::*;
pub use serialization::BinarySerializable;
pub use skeletal::{
    BoneInfo, SkeletalFrame, SkeletalSurface, SkeletalSurfaceHeader, SkeletalVertex, Skeleton,
    nearest_weight,
};
pub use tan::*;
