use super::{check_key, ImageStore};
use crate::error::PersistenceError;
use crate::scan::image::CapturedImage;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Stores each image as `<dir>/<key>.<ext>`.
pub struct FsImageStore {
    root: PathBuf,
}

impl FsImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str, image: &CapturedImage) -> PathBuf {
        self.root.join(format!("{}.{}", key, image.extension()))
    }
}

#[async_trait]
impl ImageStore for FsImageStore {
    async fn put(&self, key: &str, image: &CapturedImage) -> Result<(), PersistenceError> {
        check_key(key)?;
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.path_for(key, image);
        tokio::fs::write(&path, image.bytes()).await?;
        debug!("Stored {} bytes at {}", image.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::image::sample_jpeg;

    #[tokio::test]
    async fn writes_image_under_key_and_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsImageStore::new(dir.path().join("scans"));
        let image = sample_jpeg();

        store.put("scan_123", &image).await.unwrap();

        let written = std::fs::read(dir.path().join("scans").join("scan_123.jpg")).unwrap();
        assert_eq!(written, image.bytes());
    }

    #[tokio::test]
    async fn refuses_keys_with_separators() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsImageStore::new(dir.path());
        let result = store.put("nested/scan", &sample_jpeg()).await;
        assert!(matches!(result, Err(PersistenceError::InvalidKey(_))));
    }
}
