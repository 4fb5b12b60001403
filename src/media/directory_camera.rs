use super::{MediaSource, StreamHandle};
use crate::error::MediaError;
use crate::scan::image::CapturedImage;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// A camera whose device writes snapshots into a directory. Capturing takes
/// the newest decodable image and re-encodes it as JPEG.
pub struct DirectoryCamera {
    dir: PathBuf,
    active: Option<StreamHandle>,
}

impl DirectoryCamera {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            active: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_streaming(&self) -> bool {
        self.active.is_some()
    }

    async fn newest_snapshot(&self) -> Result<PathBuf, MediaError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut newest: Option<(SystemTime, PathBuf)> = None;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if image::ImageFormat::from_path(&path).is_err() {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            let is_newer = newest
                .as_ref()
                .map(|(seen, _)| modified > *seen)
                .unwrap_or(true);
            if is_newer {
                newest = Some((modified, path));
            }
        }
        newest.map(|(_, path)| path).ok_or(MediaError::NoFrame)
    }
}

#[async_trait]
impl MediaSource for DirectoryCamera {
    async fn open(&mut self) -> Result<StreamHandle, MediaError> {
        match tokio::fs::read_dir(&self.dir).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return Err(MediaError::PermissionDenied(self.dir.display().to_string()));
            }
            Err(e) => {
                return Err(MediaError::DeviceUnavailable(format!(
                    "{}: {}",
                    self.dir.display(),
                    e
                )));
            }
        }
        let handle = StreamHandle::new();
        info!("Camera stream {} opened on {}", handle.id(), self.dir.display());
        self.active = Some(handle.clone());
        Ok(handle)
    }

    async fn capture_frame(&mut self, stream: &StreamHandle) -> Result<CapturedImage, MediaError> {
        if self.active.as_ref() != Some(stream) {
            return Err(MediaError::DeviceUnavailable(format!(
                "stream {} is not open",
                stream.id()
            )));
        }
        let path = self.newest_snapshot().await?;
        debug!("Capturing frame from {}", path.display());
        let bytes = tokio::fs::read(&path).await?;
        let frame =
            image::load_from_memory(&bytes).map_err(|e| MediaError::Decode(e.to_string()))?;
        CapturedImage::from_frame(&frame)
    }

    fn close(&mut self, stream: StreamHandle) {
        match self.active.take() {
            Some(active) if active == stream => {
                info!("Camera stream {} closed", stream.id());
            }
            Some(active) => {
                warn!("Ignoring close for unknown stream {}", stream.id());
                self.active = Some(active);
            }
            None => debug!("Camera stream {} already closed", stream.id()),
        }
    }
}
