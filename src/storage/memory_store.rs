use super::{check_key, ImageStore};
use crate::error::PersistenceError;
use crate::scan::image::CapturedImage;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::Mutex;

/// Keeps stored images in memory, in write order.
#[derive(Default)]
pub struct MemoryImageStore {
    entries: Mutex<IndexMap<String, CapturedImage>>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn get(&self, key: &str) -> Option<CapturedImage> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, IndexMap<String, CapturedImage>> {
        // A poisoned map is still a valid map.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn put(&self, key: &str, image: &CapturedImage) -> Result<(), PersistenceError> {
        check_key(key)?;
        self.lock().insert(key.to_string(), image.clone());
        Ok(())
    }
}
