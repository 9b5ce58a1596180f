use std::sync::Arc;

use crate::foundation::error::{TableauError, TableauResult};
use crate::graphics::format::PixelFormat;

/// Immutable pixel buffer handed to texture uploads. Cheap to clone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelData {
    width: u32,
    height: u32,
    stride: u32,
    format: PixelFormat,
    buffer: Arc<[u8]>,
}

impl PixelData {
    /// Tightly packed pixels. The buffer must hold `width * height` texels for uncompressed
    /// formats; compressed payloads are taken as-is.
    pub fn new(buffer: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> TableauResult<Self> {
        Self::with_stride(buffer, width, height, 0, format)
    }

    /// Pixels with rows `stride` texels apart (`0` means `width`).
    pub fn with_stride(
        buffer: Vec<u8>,
        width: u32,
        height: u32,
        stride: u32,
        format: PixelFormat,
    ) -> TableauResult<Self> {
        if format == PixelFormat::Invalid {
            return Err(TableauError::validation("pixel data needs a valid format"));
        }
        if stride != 0 && stride < width {
            return Err(TableauError::validation(format!(
                "stride {stride} is smaller than width {width}"
            )));
        }
        let bpp = u64::from(format.bytes_per_pixel());
        if bpp > 0 {
            let row = u64::from(if stride == 0 { width } else { stride });
            let needed = row * u64::from(height.saturating_sub(1)) * bpp
                + u64::from(width) * bpp * u64::from(height.min(1));
            if (buffer.len() as u64) < needed {
                return Err(TableauError::validation(format!(
                    "pixel buffer holds {} bytes, {width}x{height} {format:?} needs {needed}",
                    buffer.len()
                )));
            }
        }
        Ok(Self {
            width,
            height,
            stride,
            format,
            buffer: buffer.into(),
        })
    }

    /// Wrap a decoded RGBA image.
    pub fn from_rgba_image(image: image::RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            stride: 0,
            format: PixelFormat::Rgba8888,
            buffer: image.into_raw().into(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row pitch in texels; `0` when rows are tightly packed.
    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Raw bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Buffer length in bytes.
    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }
}
