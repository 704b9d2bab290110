//! Shared test utilities for integration and unit tests
//!
//! Re-exports the recording shader and GPU collaborators from
//! `tagmesh_formats::test_utils` and adds an asset source that counts reads.

use std::borrow::Cow;

use crate::assets::{AssetSource, MemoryAssetSource};
use crate::registry::{Collaborators, ModelStore};
use crate::model::ModelHandle;

pub use tagmesh_formats::test_utils::{RecordedBuffer, RecordingGpu, RecordingShaders};

// ============================================================================
// Asset source
// ============================================================================

/// In-memory assets that remember every name they were asked for
#[derive(Debug, Default)]
pub struct CountingAssets {
    pub files: MemoryAssetSource,
    /// Every requested name in order, found or not
    pub requests: Vec<String>,
}

impl CountingAssets {
    pub fn with_file(mut self, name: &str, data: Vec<u8>) -> Self {
        self.files.insert(name, data);
        self
    }

    /// How many times `name` was requested
    pub fn reads_of(&self, name: &str) -> usize {
        self.requests.iter().filter(|r| *r == name).count()
    }
}

impl AssetSource for CountingAssets {
    fn read(&mut self, name: &str) -> Option<Cow<'_, [u8]>> {
        self.requests.push(name.to_string());
        self.files.read(name)
    }
}

// ============================================================================
// Collaborator bundle
// ============================================================================

/// Owns one of each recording collaborator
#[derive(Debug, Default)]
pub struct TestIo {
    pub assets: CountingAssets,
    pub shaders: RecordingShaders,
    pub gpu: RecordingGpu,
}

impl TestIo {
    pub fn new(assets: CountingAssets) -> Self {
        Self {
            assets,
            ..Self::default()
        }
    }

    pub fn collaborators(&mut self) -> Collaborators<'_> {
        Collaborators::new(&mut self.assets, &mut self.shaders, &mut self.gpu)
    }

    /// Register `name` in `store` using these collaborators
    pub fn register(&mut self, store: &mut ModelStore, name: &str) -> ModelHandle {
        store.register(name, &mut self.collaborators())
    }
}
