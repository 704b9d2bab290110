//! Parse failure taxonomy

use thiserror::Error;

use crate::reader::ReadError;

/// Why a model file could not be turned into a model.
///
/// Every variant is recoverable: the store logs it and moves on to the
/// next candidate file.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    /// The asset source had no bytes for the name
    #[error("{0} not found")]
    NotFound(String),

    /// The first four bytes are not a known ident for this loader
    #[error("unknown file ident {ident:#010x}")]
    UnknownIdent { ident: u32 },

    /// Ident matched but the version field did not
    #[error("wrong version ({found} should be {expected})")]
    WrongVersion { found: i32, expected: i32 },

    /// Header declares fewer than one animation frame
    #[error("has no frames")]
    NoFrames,

    /// A surface reaches the per-surface vertex limit
    #[error("has {count} verts on {surface}, the limit is below {max}")]
    TooManyVertices {
        surface: String,
        count: usize,
        max: usize,
    },

    /// A surface reaches the per-surface index limit
    #[error("has {count} triangles on {surface}, the index limit is below {max}")]
    TooManyTriangles {
        surface: String,
        count: usize,
        max: usize,
    },

    /// A triangle refers to a vertex the surface does not have
    #[error("triangle index {index} on {surface} is outside its {num_verts} vertices")]
    TriangleIndexOutOfRange {
        surface: String,
        index: i32,
        num_verts: usize,
    },

    /// The header's end offset exceeds the supplied buffer
    #[error("header is broken, declares {declared} bytes but the file has {actual}")]
    DeclaredSizeMismatch { declared: usize, actual: usize },

    /// Counts, offsets or indices that cannot describe a valid file
    #[error("has broken structure: {0}")]
    BrokenStructure(String),

    /// An offset-addressed read ran past the end of the buffer
    #[error(transparent)]
    Truncated(#[from] ReadError),
}

impl LoadError {
    pub(crate) fn broken(detail: impl Into<String>) -> Self {
        Self::BrokenStructure(detail.into())
    }
}
