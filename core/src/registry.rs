//! Model registry
//!
//! [`ModelStore`] owns every registered model. Slot 0 is the default model
//! and doubles as the result of every failed registration. Slots are only
//! ever appended; [`ModelStore::reset`] is the single point where they are
//! all dropped.
//!
//! # Name resolution
//!
//! A name with a recognized extension is first loaded by that extension's
//! loader. If that fails, or the name has no recognized extension, every
//! other format is tried in [`MODEL_FORMATS`] order and the first success
//! wins. MD3 and MDC names additionally try the `_2` and `_1` LOD files.

use std::sync::Arc;

use hashbrown::HashMap;
use tagmesh_formats::{
    ByteReader, GpuBufferFactory, LoadContext, LoadError, LoadOptions, MdvModel, ShaderResolver,
    load_md3, load_mdc, load_mdm, load_mdr, load_mds, load_mdx, load_tan,
};
use tagmesh_shared::{
    LoaderFamily, MAX_QPATH, MD3_FORMAT, MDC_FORMAT, MDM_FORMAT, MDS_FORMAT, MDX_FORMAT,
    MODEL_FORMATS, ModelFormat, format_for_extension,
};
use tracing::{debug, info, warn};

use crate::assets::AssetSource;
use crate::config::LoaderConfig;
use crate::model::{MAX_LODS, Model, ModelData, ModelHandle};

/// External services a registration reads from
pub struct Collaborators<'a> {
    pub assets: &'a mut dyn AssetSource,
    pub shaders: &'a mut dyn ShaderResolver,
    pub gpu: &'a mut dyn GpuBufferFactory,
}

impl<'a> Collaborators<'a> {
    pub fn new(
        assets: &'a mut dyn AssetSource,
        shaders: &'a mut dyn ShaderResolver,
        gpu: &'a mut dyn GpuBufferFactory,
    ) -> Self {
        Self {
            assets,
            shaders,
            gpu,
        }
    }
}

/// One line of [`ModelStore::model_list`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelListEntry {
    pub handle: ModelHandle,
    pub name: String,
    pub data_size: usize,
    pub lods: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelListSummary {
    pub entries: Vec<ModelListEntry>,
    pub total_size: usize,
}

/// Registry of loaded models
#[derive(Debug)]
pub struct ModelStore {
    config: LoaderConfig,
    options: LoadOptions,
    models: Vec<Model>,
    names: HashMap<String, ModelHandle>,
}

impl ModelStore {
    /// Create a store holding only the default model
    pub fn new(config: LoaderConfig) -> Self {
        let options = config.load_options();
        let mut store = Self {
            config,
            options,
            models: Vec::new(),
            names: HashMap::new(),
        };
        store.reset();
        store
    }

    /// Drop every model and recreate the default model in slot 0
    pub fn reset(&mut self) {
        self.models.clear();
        self.names.clear();
        self.models.push(Model::bad("", ModelHandle::NONE));
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Number of registered models, not counting the default model
    pub fn len(&self) -> usize {
        self.models.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Model for `handle`, or the default model for 0 and unknown handles
    pub fn get(&self, handle: ModelHandle) -> &Model {
        self.models
            .get(handle.index())
            .filter(|_| !handle.is_none())
            .unwrap_or(&self.models[0])
    }

    /// Already registered model named exactly `name`, loaded or not
    pub fn find(&self, name: &str) -> Option<&Model> {
        self.names.get(name).map(|&handle| &self.models[handle.index()])
    }

    /// Registered models in handle order, without the default model
    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.iter().skip(1)
    }

    /// Reserve the next slot for `name` as a not-yet-loaded model.
    ///
    /// Returns `None` when the store already holds `max_models` slots.
    pub fn allocate(&mut self, name: &str) -> Option<ModelHandle> {
        if self.models.len() >= self.config.max_models {
            return None;
        }
        let handle = ModelHandle(u32::try_from(self.models.len()).ok()?);
        self.models.push(Model::bad(name, handle));
        self.names.insert(name.to_string(), handle);
        Some(handle)
    }

    /// Load `name` once and return its handle.
    ///
    /// Returns [`ModelHandle::NONE`] if the name is invalid, the store is
    /// full, or no loader could read the model. A failed name stays
    /// registered, so later calls return 0 without touching the assets.
    pub fn register(&mut self, name: &str, io: &mut Collaborators<'_>) -> ModelHandle {
        if name.is_empty() {
            warn!("register_model: empty name");
            return ModelHandle::NONE;
        }
        if name.len() >= MAX_QPATH {
            warn!(name, "model name exceeds {} characters", MAX_QPATH - 1);
            return ModelHandle::NONE;
        }

        if let Some(&handle) = self.names.get(name) {
            return if self.models[handle.index()].is_bad() {
                ModelHandle::NONE
            } else {
                handle
            };
        }

        let Some(handle) = self.allocate(name) else {
            warn!(name, max = self.config.max_models, "register_model: too many models");
            return ModelHandle::NONE;
        };

        let data = self.load_any(name, io);
        let model = &mut self.models[handle.index()];
        model.data = data;
        if model.is_bad() {
            warn!(name, "couldn't load model");
            return ModelHandle::NONE;
        }
        debug!(name, handle = handle.0, kind = ?model.kind(), "registered model");
        handle
    }

    /// Summary of every registered model, also written to the log
    pub fn model_list(&self) -> ModelListSummary {
        let mut summary = ModelListSummary::default();
        for model in self.models() {
            let entry = ModelListEntry {
                handle: model.handle,
                name: model.name.clone(),
                data_size: model.data_size(),
                lods: model.num_lods(),
            };
            info!("{:8} : ({}) {}", entry.data_size, entry.lods, entry.name);
            summary.total_size += entry.data_size;
            summary.entries.push(entry);
        }
        info!("{:8} : Total models", summary.total_size);
        summary
    }

    // ========================================================================
    // Loading
    // ========================================================================

    fn load_any(&self, name: &str, io: &mut Collaborators<'_>) -> ModelData {
        let (stem, explicit) = match split_extension(name) {
            Some((stem, ext)) => match format_for_extension(ext) {
                Some((rank, _)) => (stem, Some((rank, ext))),
                None => (name, None),
            },
            None => (name, None),
        };

        if let Some((rank, ext)) = explicit {
            let data = self.load_format(stem, ext, &MODEL_FORMATS[rank], io);
            if !matches!(data, ModelData::Bad) {
                return data;
            }
        }

        for (rank, format) in MODEL_FORMATS.iter().enumerate() {
            if explicit.is_some_and(|(tried, _)| tried == rank) {
                continue;
            }
            let data = self.load_format(stem, format.extension, format, io);
            if !matches!(data, ModelData::Bad) {
                if explicit.is_some() {
                    warn!("{name} not present, using {stem}.{} instead", format.extension);
                }
                return data;
            }
        }
        ModelData::Bad
    }

    fn load_format(&self, stem: &str, ext: &str, format: &ModelFormat, io: &mut Collaborators<'_>) -> ModelData {
        match format.family {
            LoaderFamily::Md3 => self.load_mesh_lods(stem, ext, io),
            family => self.load_single(&format!("{stem}.{ext}"), family, io),
        }
    }

    /// Load `stem_2.ext`, `stem_1.ext` and `stem.ext`, then backfill the
    /// slots that did not load.
    fn load_mesh_lods(&self, stem: &str, ext: &str, io: &mut Collaborators<'_>) -> ModelData {
        let mod_name = format!("{stem}.{ext}");
        let mut lods: [Option<Arc<MdvModel>>; MAX_LODS] = Default::default();

        for lod in (0..MAX_LODS).rev() {
            let file = if lod == 0 {
                mod_name.clone()
            } else {
                format!("{stem}_{lod}.{ext}")
            };
            let Some(buf) = io.assets.read(&file) else {
                debug!(file = %file, "model file not present");
                continue;
            };

            let mut ctx = LoadContext::new(&mut *io.shaders, &mut *io.gpu, &self.options);
            let result = match ByteReader::new(&buf).u32(0) {
                Ok(ident) if ident == MD3_FORMAT.ident_le() => load_md3(&buf, &mod_name, &mut ctx),
                Ok(ident) if ident == MDC_FORMAT.ident_le() => load_mdc(&buf, &mod_name, &mut ctx),
                Ok(ident) => Err(LoadError::UnknownIdent { ident }),
                Err(e) => Err(e.into()),
            };
            match result {
                Ok(model) => lods[lod] = Some(Arc::new(model)),
                Err(e) => {
                    warn!(file = %file, error = %e, "failed to load model LOD");
                    break;
                }
            }
        }

        match backfill_lods(&lods) {
            Some(lods) => ModelData::Mesh(lods),
            None => ModelData::Bad,
        }
    }

    fn load_single(&self, file: &str, family: LoaderFamily, io: &mut Collaborators<'_>) -> ModelData {
        let Some(buf) = io.assets.read(file) else {
            debug!(file, "model file not present");
            return ModelData::Bad;
        };

        let mut ctx = LoadContext::new(&mut *io.shaders, &mut *io.gpu, &self.options);
        let result = match family {
            LoaderFamily::Mdr => load_mdr(&buf, file, &mut ctx).map(ModelData::Mdr),
            LoaderFamily::Tan => load_tan(&buf, file, &mut ctx).map(|model| {
                let model = Arc::new(model);
                ModelData::Mesh([model.clone(), model.clone(), model])
            }),
            LoaderFamily::Skeletal => match ByteReader::new(&buf).u32(0) {
                Ok(ident) if ident == MDS_FORMAT.ident_le() => load_mds(&buf, file, &mut ctx).map(ModelData::Mds),
                Ok(ident) if ident == MDM_FORMAT.ident_le() => load_mdm(&buf, file, &mut ctx).map(ModelData::Mdm),
                Ok(ident) if ident == MDX_FORMAT.ident_le() => load_mdx(&buf, file).map(ModelData::Mdx),
                Ok(ident) => Err(LoadError::UnknownIdent { ident }),
                Err(e) => Err(e.into()),
            },
            LoaderFamily::Md3 => Err(LoadError::BrokenStructure(
                "mesh LODs are loaded per file".to_string(),
            )),
        };

        result.unwrap_or_else(|e| {
            warn!(file, error = %e, "failed to load model");
            ModelData::Bad
        })
    }
}

/// Split `name` at its last `.`, if that dot belongs to the final path
/// component.
pub(crate) fn split_extension(name: &str) -> Option<(&str, &str)> {
    let dot = name.rfind('.')?;
    if name[dot..].contains('/') {
        return None;
    }
    Some((&name[..dot], &name[dot + 1..]))
}

/// Fill every empty LOD slot with the nearest coarser loaded LOD, or the
/// nearest finer one when no coarser LOD loaded. `None` if nothing loaded.
pub(crate) fn backfill_lods<T: Clone>(lods: &[Option<T>; MAX_LODS]) -> Option<[T; MAX_LODS]> {
    let filled: Vec<T> = (0..MAX_LODS)
        .map(|i| {
            lods[i..]
                .iter()
                .flatten()
                .next()
                .or_else(|| lods[..i].iter().rev().flatten().next())
                .cloned()
        })
        .collect::<Option<_>>()?;
    filled.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("models/box.md3"), Some(("models/box", "md3")));
        assert_eq!(split_extension("models/box.v2.MDS"), Some(("models/box.v2", "MDS")));
        assert_eq!(split_extension("models/box"), None);
        assert_eq!(split_extension("models.v2/box"), None);
        assert_eq!(split_extension("box."), Some(("box", "")));
    }

    #[test]
    fn test_backfill_prefers_coarser_lod() {
        assert_eq!(backfill_lods(&[None, Some(1), Some(2)]), Some([1, 1, 2]));
        assert_eq!(backfill_lods(&[Some(0), None, Some(2)]), Some([0, 2, 2]));
    }

    #[test]
    fn test_backfill_missing_coarse_lod_uses_finer() {
        assert_eq!(backfill_lods(&[Some(0), Some(1), None]), Some([0, 1, 1]));
        assert_eq!(backfill_lods(&[Some(0), None, None]), Some([0, 0, 0]));
    }

    #[test]
    fn test_backfill_nothing_loaded() {
        assert_eq!(backfill_lods::<u8>(&[None, None, None]), None);
    }

    #[test]
    fn test_get_falls_back_to_default_model() {
        let store = ModelStore::new(LoaderConfig::default());
        assert!(store.is_empty());
        assert!(store.get(ModelHandle(0)).is_bad());
        assert_eq!(store.get(ModelHandle(57)).handle, ModelHandle::NONE);
    }

    #[test]
    fn test_allocate_respects_capacity() {
        let mut store = ModelStore::new(LoaderConfig {
            max_models: 3,
            ..LoaderConfig::default()
        });
        assert_eq!(store.allocate("a"), Some(ModelHandle(1)));
        assert_eq!(store.allocate("b"), Some(ModelHandle(2)));
        assert_eq!(store.allocate("c"), None);
        assert_eq!(store.len(), 2);
        assert_eq!(store.find("b").map(|m| m.handle), Some(ModelHandle(2)));

        store.reset();
        assert!(store.is_empty());
        assert!(store.find("b").is_none());
        assert_eq!(store.allocate("c"), Some(ModelHandle(1)));
    }
}
