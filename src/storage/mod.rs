pub mod fs_store;
pub mod memory_store;

pub use fs_store::FsImageStore;
pub use memory_store::MemoryImageStore;

use crate::error::PersistenceError;
use crate::scan::image::CapturedImage;
use async_trait::async_trait;

/// Write-only keyed storage for copies of submitted images.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn put(&self, key: &str, image: &CapturedImage) -> Result<(), PersistenceError>;
}

pub(crate) fn check_key(key: &str) -> Result<(), PersistenceError> {
    let valid = !key.is_empty()
        && key != "."
        && key != ".."
        && !key.contains(['/', '\\', '\0']);
    if valid {
        Ok(())
    } else {
        Err(PersistenceError::InvalidKey(key.to_string()))
    }
}
