//! Registered models
//!
//! A [`Model`] is one slot of the registry. Its [`ModelData`] is a closed
//! set of variants, one per loader result, and the tag and bounds queries
//! dispatch on it.

use std::sync::Arc;

use tagmesh_formats::{MdmModel, MdrModel, MdsModel, MdvModel, MdxModel};
use tagmesh_shared::MD3_MAX_LODS;

/// Number of mesh LOD slots
pub const MAX_LODS: usize = MD3_MAX_LODS;

/// Index into the model registry. Handle 0 is the default model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ModelHandle(pub u32);

impl ModelHandle {
    /// The default model, also returned for every failed registration
    pub const NONE: Self = Self(0);

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Type discriminator of a registered model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    Bad,
    Mesh,
    Mdr,
    Mds,
    Mdm,
    Mdx,
}

/// Loaded contents of a slot
#[derive(Debug, Clone)]
pub enum ModelData {
    /// Nothing loaded, or every attempt failed
    Bad,
    /// MD3, MDC or TAN. Slot 0 is the finest LOD; a slot that failed to load
    /// shares the `Arc` of the LOD that replaced it.
    Mesh([Arc<MdvModel>; MAX_LODS]),
    Mdr(MdrModel),
    Mds(MdsModel),
    Mdm(MdmModel),
    Mdx(MdxModel),
}

impl ModelData {
    pub fn kind(&self) -> ModelKind {
        match self {
            ModelData::Bad => ModelKind::Bad,
            ModelData::Mesh(_) => ModelKind::Mesh,
            ModelData::Mdr(_) => ModelKind::Mdr,
            ModelData::Mds(_) => ModelKind::Mds,
            ModelData::Mdm(_) => ModelKind::Mdm,
            ModelData::Mdx(_) => ModelKind::Mdx,
        }
    }

    /// Bytes of parsed data held by this slot, counting shared LODs once
    pub fn data_size(&self) -> usize {
        match self {
            ModelData::Bad => 0,
            ModelData::Mesh(lods) => distinct_lods(lods).map(|m| m.data_size).sum(),
            ModelData::Mdr(m) => m.data_size,
            ModelData::Mds(m) => m.data_size,
            ModelData::Mdm(m) => m.data_size,
            ModelData::Mdx(m) => m.data_size,
        }
    }
}

/// LODs that differ by identity from the next-finer slot
fn distinct_lods(lods: &[Arc<MdvModel>; MAX_LODS]) -> impl Iterator<Item = &Arc<MdvModel>> {
    lods.iter()
        .enumerate()
        .filter(move |(i, lod)| *i == 0 || !Arc::ptr_eq(*lod, &lods[i - 1]))
        .map(|(_, lod)| lod)
}

/// One registry slot
#[derive(Debug, Clone)]
pub struct Model {
    /// Name exactly as registered
    pub name: String,
    pub handle: ModelHandle,
    pub data: ModelData,
}

impl Model {
    pub(crate) fn bad(name: &str, handle: ModelHandle) -> Self {
        Self {
            name: name.to_string(),
            handle,
            data: ModelData::Bad,
        }
    }

    #[inline]
    pub fn kind(&self) -> ModelKind {
        self.data.kind()
    }

    #[inline]
    pub fn is_bad(&self) -> bool {
        matches!(self.data, ModelData::Bad)
    }

    #[inline]
    pub fn data_size(&self) -> usize {
        self.data.data_size()
    }

    /// Mesh LOD slots, finest first
    pub fn lods(&self) -> Option<&[Arc<MdvModel>; MAX_LODS]> {
        match &self.data {
            ModelData::Mesh(lods) => Some(lods),
            _ => None,
        }
    }

    /// Distinct LOD count: 1 for anything but a mesh with real LOD files
    pub fn num_lods(&self) -> usize {
        self.lods().map_or(1, |lods| distinct_lods(lods).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh(data_size: usize) -> Arc<MdvModel> {
        Arc::new(MdvModel {
            data_size,
            ..MdvModel::default()
        })
    }

    #[test]
    fn test_shared_lods_count_once() {
        let fine = mesh(100);
        let coarse = mesh(10);
        let model = Model {
            name: "models/box".into(),
            handle: ModelHandle(1),
            data: ModelData::Mesh([fine.clone(), fine, coarse]),
        };
        assert_eq!(model.kind(), ModelKind::Mesh);
        assert_eq!(model.num_lods(), 2);
        assert_eq!(model.data_size(), 110);
    }

    #[test]
    fn test_single_lod() {
        let only = mesh(42);
        let model = Model {
            name: "models/box.tan".into(),
            handle: ModelHandle(1),
            data: ModelData::Mesh([only.clone(), only.clone(), only]),
        };
        assert_eq!(model.num_lods(), 1);
        assert_eq!(model.data_size(), 42);
    }

    #[test]
    fn test_bad_model() {
        let model = Model::bad("missing", ModelHandle::NONE);
        assert!(model.is_bad());
        assert!(model.handle.is_none());
        assert_eq!(model.data_size(), 0);
        assert_eq!(model.num_lods(), 1);
        assert!(model.lods().is_none());
    }
}
