pub mod directory_camera;

pub use directory_camera::DirectoryCamera;

use crate::error::MediaError;
use crate::scan::image::CapturedImage;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// An open camera stream. Only the source that issued it can use it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHandle {
    id: Uuid,
    opened_at: DateTime<Utc>,
}

impl StreamHandle {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            opened_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }
}

impl Default for StreamHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// A camera-like device. File uploads skip this and build a
/// [`CapturedImage`] directly.
#[async_trait]
pub trait MediaSource: Send {
    async fn open(&mut self) -> Result<StreamHandle, MediaError>;
    async fn capture_frame(&mut self, stream: &StreamHandle) -> Result<CapturedImage, MediaError>;
    /// Releasing a stream cannot fail; it is also called from `Drop`.
    fn close(&mut self, stream: StreamHandle);
}
