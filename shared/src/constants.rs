//! Centralized constants shared by the format parsers and the model store.

/// Maximum length of an asset path, including the terminating NUL of the file formats.
///
/// Names of this length or longer are rejected at registration.
pub const MAX_QPATH: usize = 64;

/// Number of discrete LOD slots a static mesh model carries.
pub const MD3_MAX_LODS: usize = 3;

/// Default capacity of the model table, including the reserved slot 0.
pub const MAX_MOD_KNOWN: usize = 1024;

/// Default per-surface vertex capacity.
pub const SHADER_MAX_VERTEXES: usize = 1000;

/// Default per-surface index capacity.
pub const SHADER_MAX_INDEXES: usize = 6 * SHADER_MAX_VERTEXES;
