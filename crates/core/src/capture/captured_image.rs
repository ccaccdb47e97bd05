use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use crate::capture::frame_capture::CaptureError;
use crate::shared::frame::Frame;

/// A captured photo frozen into its displayable form (PNG bytes).
///
/// Cloning shares the encoded buffer.
#[derive(Clone, PartialEq)]
pub struct CapturedImage {
    png: Arc<Vec<u8>>,
    width: u32,
    height: u32,
}

impl CapturedImage {
    /// Encodes the raster. Any overlay must already be drawn into `frame`.
    pub fn freeze(frame: &Frame) -> Result<Self, CaptureError> {
        let encode_err = |e: image::ImageError| CaptureError::Encode(e.to_string());
        let size_err = || CaptureError::Encode("frame data does not match its size".into());

        let mut png = Cursor::new(Vec::new());
        match frame.channels() {
            3 => image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
                .ok_or_else(size_err)?
                .write_to(&mut png, image::ImageFormat::Png)
                .map_err(encode_err)?,
            4 => image::RgbaImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
                .ok_or_else(size_err)?
                .write_to(&mut png, image::ImageFormat::Png)
                .map_err(encode_err)?,
            n => return Err(CaptureError::UnsupportedFormat(n)),
        }

        Ok(Self {
            png: Arc::new(png.into_inner()),
            width: frame.width(),
            height: frame.height(),
        })
    }

    pub fn png_bytes(&self) -> &[u8] {
        &self.png
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Decodes the PNG back into pixels.
    pub fn decode(&self) -> Result<image::RgbImage, CaptureError> {
        image::load_from_memory_with_format(&self.png, image::ImageFormat::Png)
            .map(|img| img.to_rgb8())
            .map_err(|e| CaptureError::Encode(e.to_string()))
    }

    /// Writes the PNG to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), CaptureError> {
        let write_err = |e: std::io::Error| CaptureError::Write(format!("{}: {e}", path.display()));
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, self.png.as_slice()).map_err(write_err)
    }
}

impl fmt::Debug for CapturedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("png_len", &self.png.len())
            .finish()
    }
}
