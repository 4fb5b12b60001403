use crate::error::{MediaError, ScanError};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

/// Encodings the remote classifiers accept.
pub const SUPPORTED_FORMATS: [ImageFormat; 4] = [
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::WebP,
    ImageFormat::Bmp,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOrigin {
    Camera,
    Upload,
}

/// An encoded image captured from a camera or picked from disk.
///
/// The buffer is shared, so clones handed to the analysis task, the
/// transcript and the image store all point at the same bytes.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    bytes: Arc<[u8]>,
    format: Option<ImageFormat>,
    origin: ImageOrigin,
}

impl CapturedImage {
    /// Wraps an uploaded buffer, sniffing its encoding from the magic bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        let format = image::guess_format(&bytes).ok();
        Self {
            bytes: Arc::from(bytes),
            format,
            origin: ImageOrigin::Upload,
        }
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, MediaError> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        Ok(Self::from_bytes(bytes))
    }

    /// Encodes a raw camera frame as JPEG.
    pub fn from_frame(frame: &DynamicImage) -> Result<Self, MediaError> {
        let mut buffer = Vec::new();
        // JPEG has no alpha channel.
        DynamicImage::ImageRgb8(frame.to_rgb8())
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)
            .map_err(|e| MediaError::Encode(e.to_string()))?;
        Ok(Self {
            bytes: Arc::from(buffer),
            format: Some(ImageFormat::Jpeg),
            origin: ImageOrigin::Camera,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }

    pub fn origin(&self) -> ImageOrigin {
        self.origin
    }

    pub fn mime_type(&self) -> &'static str {
        self.format
            .map(|f| f.to_mime_type())
            .unwrap_or("application/octet-stream")
    }

    pub fn extension(&self) -> &'static str {
        self.format
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or("bin")
    }

    /// Checks the preconditions for submitting this image to the classifiers.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.is_empty() {
            return Err(ScanError::InvalidInput(
                "no image was provided".to_string(),
            ));
        }
        match self.format {
            Some(format) if SUPPORTED_FORMATS.contains(&format) => Ok(()),
            Some(format) => Err(ScanError::InvalidInput(format!(
                "unsupported image encoding {:?}",
                format
            ))),
            None => Err(ScanError::InvalidInput(
                "unrecognised image encoding".to_string(),
            )),
        }
    }

    pub fn shares_buffer_with(&self, other: &CapturedImage) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes)
    }
}

#[cfg(test)]
pub(crate) fn sample_jpeg() -> CapturedImage {
    use image::{ImageBuffer, Rgb};
    let frame = DynamicImage::ImageRgb8(ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(
        8,
        8,
        Rgb([40, 160, 60]),
    ));
    let mut upload = CapturedImage::from_frame(&frame).unwrap();
    upload.origin = ImageOrigin::Upload;
    upload
}
