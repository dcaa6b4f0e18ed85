use crate::error::StoreError;
use crate::storage::interface::{check_reference, ArtifactStore};
use std::fs;
use std::path::{Path, PathBuf};

/// Artifacts as files under `root`; references are paths relative to it.
#[derive(Debug, Clone)]
pub struct ArtifactStoreDirectory {
    root: PathBuf,
}

impl ArtifactStoreDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactStore for ArtifactStoreDirectory {
    fn put(&self, name: &str, bytes: &[u8]) -> Result<String, StoreError> {
        let path = self.root.join(check_reference(name)?);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        Ok(name.to_string())
    }

    fn get(&self, reference: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.root.join(check_reference(reference)?);
        if !path.is_file() {
            return Err(StoreError::NotFound(reference.to_string()));
        }
        Ok(fs::read(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_creates_batch_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStoreDirectory::new(dir.path());

        let reference = store.put("batch-1/heatmap_2.png", b"\x89PNG").unwrap();
        assert_eq!(reference, "batch-1/heatmap_2.png");
        assert!(dir.path().join("batch-1").join("heatmap_2.png").is_file());
        assert_eq!(store.get(&reference).unwrap(), b"\x89PNG");
    }

    #[test]
    fn missing_artifact_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStoreDirectory::new(dir.path());
        assert!(matches!(store.get("nope.png"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn escaping_the_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStoreDirectory::new(dir.path().join("root"));

        assert!(matches!(
            store.put("../outside.png", b"x"),
            Err(StoreError::InvalidName(_))
        ));
        assert!(matches!(
            store.get("/etc/hostname"),
            Err(StoreError::InvalidName(_))
        ));
        assert!(!dir.path().join("outside.png").exists());
    }
}
