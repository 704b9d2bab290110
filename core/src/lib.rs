//! Tagmesh Core - model registry and tag resolution
//!
//! This crate owns loaded models and answers the per-frame queries a
//! renderer asks of them.
//!
//! # Architecture
//!
//! - [`ModelStore`] - Registers models by name, picks a loader by extension
//!   and falls back through the other formats in preference order
//! - [`AssetSource`] - Byte supply the store reads model files from
//! - [`ModelStore::lerp_tag`] / [`ModelStore::model_bounds`] - Interpolated
//!   tag transforms and frame bounds, dispatched per model type
//! - [`LoaderConfig`] - Capacity, surface limits and bounds overrides

pub mod assets;
pub mod config;
pub mod model;
pub mod registry;
pub mod skeleton;
pub mod tags;
pub mod test_utils;

pub use assets::{AssetSource, DirectoryAssetSource, MemoryAssetSource};
pub use config::{ConfigError, LoaderConfig};
pub use model::{MAX_LODS, Model, ModelData, ModelHandle, ModelKind};
pub use registry::{Collaborators, ModelListEntry, ModelListSummary, ModelStore};
pub use skeleton::{SkeletonPose, TorsoPose, blended_bone, bone_orientation};
pub use tags::{FrameChannel, TagLookup, TorsoChannel};

// Re-export the format crates so embedders need only one dependency
pub use tagmesh_formats as formats;
pub use tagmesh_shared as shared;
