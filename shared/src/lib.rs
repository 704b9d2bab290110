//! Shared types for the tagmesh model loading crates.
//!
//! - [`math`] - POD bone matrix, orientation and bounds types
//! - [`model_format`] - File format table and loader preference order
//! - [`constants`] - Path and capacity limits

pub mod constants;
pub mod math;
pub mod model_format;

pub use constants::{MAX_MOD_KNOWN, MAX_QPATH, MD3_MAX_LODS, SHADER_MAX_INDEXES, SHADER_MAX_VERTEXES};
pub use math::{
    BoneMatrix3x4, Bounds, Orientation, angle_vectors, angles_to_axis, multiply_axes, normalize3,
};
pub use model_format::{
    LoaderFamily, MD3_FORMAT, MDC_FORMAT, MDM_FORMAT, MDR_FORMAT, MDS_FORMAT, MDX_FORMAT,
    MODEL_FORMATS, ModelFormat, TAN_FORMAT, format_for_extension, format_for_ident,
};
