//! Collaborators consumed by the parsers
//!
//! Parsers never look shaders up or create GPU buffers themselves. They go
//! through [`ShaderResolver`] and [`GpuBufferFactory`], bundled with the
//! load-time limits in a [`LoadContext`].

use serde::{Deserialize, Serialize};

use crate::packing::StreamLayout;

/// Lightmap binding requested when resolving a shader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LightmapMode {
    /// Model surfaces never use a lightmap
    #[default]
    None,
    Vertex,
    WhiteImage,
}

/// How the shader's images are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageMode {
    /// No mipmaps, no picmip
    #[default]
    Raw,
    Mipmapped,
}

/// Result of a shader lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderRef {
    pub index: u32,
    /// The resolver fell back to its default shader
    pub is_default: bool,
}

impl ShaderRef {
    /// Index stored on a surface: 0 for the default shader
    #[inline]
    pub fn surface_index(self) -> u32 {
        if self.is_default { 0 } else { self.index }
    }
}

/// Resolves shader names to renderer shader indices
pub trait ShaderResolver {
    fn find_shader(&mut self, name: &str, lightmap: LightmapMode, image: ImageMode) -> ShaderRef;
}

/// Usage hint for GPU buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferUsage {
    #[default]
    Static,
    Dynamic,
}

/// Opaque handle to a GPU vertex/index buffer pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuBufferHandle(pub u32);

/// Creates GPU vertex buffers from packed streams
pub trait GpuBufferFactory {
    /// Upload a vertex stream and its index array
    fn create_vertex_buffer(
        &mut self,
        label: &str,
        vertices: &[u8],
        indices: &[u8],
        usage: BufferUsage,
    ) -> GpuBufferHandle;

    /// Record attribute descriptors for a buffer created above
    fn configure_attributes(&mut self, buffer: GpuBufferHandle, layout: &StreamLayout);
}

/// Per-surface capacity limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceLimits {
    /// A surface fails when its vertex count reaches this value (default: 1000)
    #[serde(default = "default_max_vertexes")]
    pub max_vertexes: usize,
    /// A surface fails when `triangles * 3` reaches this value (default: 6000)
    #[serde(default = "default_max_indexes")]
    pub max_indexes: usize,
}

fn default_max_vertexes() -> usize {
    tagmesh_shared::SHADER_MAX_VERTEXES
}
fn default_max_indexes() -> usize {
    tagmesh_shared::SHADER_MAX_INDEXES
}

impl Default for SurfaceLimits {
    fn default() -> Self {
        Self {
            max_vertexes: default_max_vertexes(),
            max_indexes: default_max_indexes(),
        }
    }
}

/// Fixed frame bounds forced onto compressed-frame meshes by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundsOverride {
    /// Applies when the model name contains this substring
    pub name_contains: String,
    pub radius: f32,
    pub mins: [f32; 3],
    pub maxs: [f32; 3],
}

impl BoundsOverride {
    /// First override whose substring occurs in `model_name`
    pub fn find<'a>(overrides: &'a [BoundsOverride], model_name: &str) -> Option<&'a BoundsOverride> {
        overrides
            .iter()
            .find(|o| !o.name_contains.is_empty() && model_name.contains(&o.name_contains))
    }
}

/// Parse-time options shared by every format
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    pub limits: SurfaceLimits,
    /// Pack multi-frame meshes for GPU-side interpolation
    pub gpu_vertex_animation: bool,
    pub bounds_overrides: Vec<BoundsOverride>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            limits: SurfaceLimits::default(),
            gpu_vertex_animation: true,
            bounds_overrides: Vec::new(),
        }
    }
}

/// Everything a parser borrows for one load
pub struct LoadContext<'a> {
    pub shaders: &'a mut dyn ShaderResolver,
    pub gpu: &'a mut dyn GpuBufferFactory,
    pub options: &'a LoadOptions,
}

impl<'a> LoadContext<'a> {
    pub fn new(
        shaders: &'a mut dyn ShaderResolver,
        gpu: &'a mut dyn GpuBufferFactory,
        options: &'a LoadOptions,
    ) -> Self {
        Self {
            shaders,
            gpu,
            options,
        }
    }

    /// Resolve a surface shader name, mapping the default shader to 0
    pub fn resolve_shader(&mut self, name: &str) -> u32 {
        self.shaders
            .find_shader(name, LightmapMode::None, ImageMode::Raw)
            .surface_index()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_shader_maps_to_zero() {
        let default = ShaderRef {
            index: 17,
            is_default: true,
        };
        let found = ShaderRef {
            index: 17,
            is_default: false,
        };
        assert_eq!(default.surface_index(), 0);
        assert_eq!(found.surface_index(), 17);
    }

    #[test]
    fn test_bounds_override_matches_substring() {
        let overrides = vec![BoundsOverride {
            name_contains: "mg42".into(),
            radius: 256.0,
            mins: [128.0; 3],
            maxs: [-128.0; 3],
        }];
        assert!(BoundsOverride::find(&overrides, "models/mapobjects/weapons/mg42b.mdc").is_some());
        assert!(BoundsOverride::find(&overrides, "models/players/body.mdc").is_none());
    }

    #[test]
    fn test_default_limits() {
        let limits = SurfaceLimits::default();
        assert_eq!(limits.max_vertexes, 1000);
        assert_eq!(limits.max_indexes, 6000);
        assert!(LoadOptions::default().gpu_vertex_animation);
    }
}
