//! Asset byte supply
//!
//! The registry asks an [`AssetSource`] for the complete contents of a file
//! by name. A read hands back a borrowed or owned buffer; dropping it is the
//! release, so every successful read is released exactly once.

use std::borrow::Cow;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use tracing::warn;

/// Supplies raw model files by name
pub trait AssetSource {
    /// Full contents of `name`, or `None` if it does not exist
    fn read(&mut self, name: &str) -> Option<Cow<'_, [u8]>>;
}

/// Files held in memory, keyed by their exact name.
#[derive(Debug, Default, Clone)]
pub struct MemoryAssetSource {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryAssetSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.files.insert(name.into(), data);
    }

    /// Builder form of [`MemoryAssetSource::insert`]
    pub fn with_file(mut self, name: impl Into<String>, data: Vec<u8>) -> Self {
        self.insert(name, data);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        self.files.remove(name)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl AssetSource for MemoryAssetSource {
    fn read(&mut self, name: &str) -> Option<Cow<'_, [u8]>> {
        self.files.get(name).map(|data| Cow::Borrowed(data.as_slice()))
    }
}

/// Files under a root directory, named by `/`-separated relative paths
#[derive(Debug, Clone)]
pub struct DirectoryAssetSource {
    root: PathBuf,
}

impl DirectoryAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path for `name`, or `None` if it would leave the root
    fn resolve(&self, name: &str) -> Option<PathBuf> {
        let mut path = self.root.clone();
        for part in name.split('/') {
            match part {
                "" | "." => {}
                ".." => return None,
                part => path.push(part),
            }
        }
        Some(path)
    }
}

impl AssetSource for DirectoryAssetSource {
    fn read(&mut self, name: &str) -> Option<Cow<'_, [u8]>> {
        let path = self.resolve(name)?;
        match std::fs::read(&path) {
            Ok(data) => Some(Cow::Owned(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read asset");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source() {
        let mut source = MemoryAssetSource::new().with_file("models/a.md3", vec![1, 2, 3]);
        assert_eq!(source.len(), 1);
        assert_eq!(source.read("models/a.md3").as_deref(), Some(&[1u8, 2, 3][..]));
        assert!(source.read("models/A.md3").is_none());
        assert_eq!(source.remove("models/a.md3"), Some(vec![1, 2, 3]));
        assert!(source.is_empty());
    }

    #[test]
    fn test_directory_source() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("models")).unwrap();
        std::fs::write(dir.path().join("models").join("box.md3"), b"IDP3").unwrap();

        let mut source = DirectoryAssetSource::new(dir.path());
        assert_eq!(source.read("models/box.md3").as_deref(), Some(&b"IDP3"[..]));
        assert!(source.read("models/none.md3").is_none());
    }

    #[test]
    fn test_directory_source_stays_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let inner = dir.path().join("inner");
        std::fs::create_dir_all(&inner).unwrap();
        std::fs::write(dir.path().join("secret.md3"), b"IDP3").unwrap();

        let mut source = DirectoryAssetSource::new(&inner);
        assert!(source.read("../secret.md3").is_none());
    }
}
