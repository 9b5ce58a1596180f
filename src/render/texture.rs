//! Render-side texture: turns uploads into backend create/update calls.

use std::sync::Arc;

use crate::foundation::core::{Rect, mip_extent};
use crate::foundation::error::{TableauError, TableauResult};
use crate::graphics::controller::{
    AllocationPolicy, GraphicsController, TextureCreateInfo, TextureHandle, TextureUpdateInfo,
    TextureUpdateKind, TextureUpdateSource,
};
use crate::graphics::format::{PixelFormat, TextureType, convert_pixel_format};
use crate::graphics::pixel_data::PixelData;
use crate::render::native::NativeImageSource;

/// Where an upload lands and which part of the pixel data it reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UploadParams {
    /// Cube face, `0` for 2D textures.
    pub layer: u32,
    pub mipmap: u32,
    pub x_offset: u32,
    pub y_offset: u32,
    pub width: u32,
    pub height: u32,
    /// Origin of the sub-rectangle read from the pixel data.
    pub data_x_offset: u32,
    pub data_y_offset: u32,
    pub data_width: u32,
    pub data_height: u32,
}

impl UploadParams {
    /// Whole pixel buffer into mip 0 at the origin.
    pub fn whole(pixels: &PixelData) -> Self {
        Self::region(0, 0, 0, 0, pixels.width(), pixels.height())
    }

    /// `width` x `height` texels from the start of the pixel data into the given region.
    pub fn region(layer: u32, mipmap: u32, x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            layer,
            mipmap,
            x_offset: x,
            y_offset: y,
            width,
            height,
            data_x_offset: 0,
            data_y_offset: 0,
            data_width: width,
            data_height: height,
        }
    }

    /// Read from a sub-rectangle of the pixel data instead of its origin.
    pub fn with_data_region(mut self, x: u32, y: u32, width: u32, height: u32) -> Self {
        self.data_x_offset = x;
        self.data_y_offset = y;
        self.data_width = width;
        self.data_height = height;
        self
    }

    /// Destination rectangle at [`UploadParams::mipmap`].
    pub fn destination(&self) -> Rect {
        Rect::new(self.x_offset, self.y_offset, self.data_width, self.data_height)
    }

    /// Extent a deferred-size texture takes from this upload: the far corner of the
    /// destination rectangle.
    pub fn uploaded_extent(&self) -> TableauResult<(u32, u32)> {
        let width = self.x_offset.checked_add(self.data_width);
        let height = self.y_offset.checked_add(self.data_height);
        match (width, height) {
            (Some(width), Some(height)) => Ok((width, height)),
            _ => Err(TableauError::validation(format!(
                "upload rectangle {:?} overflows the texture extent",
                self.destination()
            ))),
        }
    }

    /// Check the upload against a texture of the given shape.
    pub fn validate(
        &self,
        pixels: &PixelData,
        texture_type: TextureType,
        width: u32,
        height: u32,
    ) -> TableauResult<()> {
        if self.layer >= texture_type.layer_count() {
            return Err(TableauError::validation(format!(
                "layer {} is out of range for a {texture_type:?}",
                self.layer
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(TableauError::validation("upload region is empty"));
        }
        if self.data_width != self.width || self.data_height != self.height {
            return Err(TableauError::validation(format!(
                "source region {}x{} does not match destination {}x{}",
                self.data_width, self.data_height, self.width, self.height
            )));
        }
        if !pixels.format().is_compressed() {
            let source = Rect::new(
                self.data_x_offset,
                self.data_y_offset,
                self.data_width,
                self.data_height,
            );
            if !source.fits_within(pixels.width(), pixels.height()) {
                return Err(TableauError::validation(format!(
                    "source region {source:?} exceeds {}x{} pixel data",
                    pixels.width(),
                    pixels.height()
                )));
            }
        }
        let (mip_w, mip_h) = mip_extent(width, height, self.mipmap)?;
        if !self.destination().fits_within(mip_w, mip_h) {
            return Err(TableauError::validation(format!(
                "upload {:?} exceeds {mip_w}x{mip_h} at mip {}",
                self.destination(),
                self.mipmap
            )));
        }
        Ok(())
    }

    /// Byte offset and length of the region read from `pixels`.
    ///
    /// Compressed data and uploads covering the whole buffer read everything; otherwise the window
    /// starts at the first texel of the region and ends at its last texel.
    pub fn source_window(&self, pixels: &PixelData) -> (usize, usize) {
        let format = pixels.format();
        let partial = self.data_x_offset != 0
            || self.data_y_offset != 0
            || self.data_width != pixels.width()
            || self.data_height != pixels.height();
        if format.is_compressed() || !partial {
            return (0, pixels.buffer_size());
        }
        let bpp = format.bytes_per_pixel() as usize;
        let row_texels = if pixels.stride() != 0 {
            pixels.stride()
        } else {
            pixels.width()
        } as usize;
        let stride_bytes = row_texels * bpp;
        let width_bytes = self.data_width as usize * bpp;
        let offset = self.data_y_offset as usize * stride_bytes + self.data_x_offset as usize * bpp;
        let size = (self.data_height as usize * stride_bytes).saturating_sub(stride_bytes - width_bytes);
        (offset, size)
    }
}

/// Texture state owned by the render side.
///
/// A texture created without a size takes its extent and format from each upload and recreates
/// its backend object every time.
#[derive(Debug, Default)]
pub struct RenderTexture {
    texture_type: TextureType,
    format: PixelFormat,
    width: u32,
    height: u32,
    native: Option<Arc<dyn NativeImageSource>>,
    handle: Option<TextureHandle>,
    native_ready: bool,
    use_uploaded_size: bool,
    updated: bool,
}

impl RenderTexture {
    /// Texture of a fixed shape; a zero width or height defers the shape to the first upload.
    pub fn new(texture_type: TextureType, format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            texture_type,
            format,
            width,
            height,
            use_uploaded_size: width == 0 || height == 0,
            ..Self::default()
        }
    }

    /// Texture sampling a platform image.
    pub fn new_native(native: Arc<dyn NativeImageSource>) -> Self {
        Self {
            width: native.width(),
            height: native.height(),
            native: Some(native),
            ..Self::default()
        }
    }

    /// Acquire backend storage. Sized textures reserve every image now; deferred ones wait for
    /// their first upload; native ones make their first binding attempt.
    pub fn initialize<C>(&mut self, controller: &mut C) -> TableauResult<()>
    where
        C: GraphicsController + ?Sized,
    {
        if self.native.is_some() {
            return self.create_native(controller);
        }
        if self.use_uploaded_size {
            return Ok(());
        }
        self.create(controller, AllocationPolicy::Creation)
    }

    fn create<C>(&mut self, controller: &mut C, allocation: AllocationPolicy) -> TableauResult<()>
    where
        C: GraphicsController + ?Sized,
    {
        if let Some(old) = self.handle.take() {
            controller.destroy_texture(old);
        }
        let handle = controller.create_texture(&TextureCreateInfo {
            texture_type: self.texture_type,
            format: convert_pixel_format(self.format),
            width: self.width,
            height: self.height,
            native: self.native.is_some(),
            allocation,
        })?;
        tracing::debug!(?handle, width = self.width, height = self.height, "texture created");
        self.handle = Some(handle);
        Ok(())
    }

    fn create_native<C>(&mut self, controller: &mut C) -> TableauResult<()>
    where
        C: GraphicsController + ?Sized,
    {
        let Some(native) = self.native.clone() else {
            return Ok(());
        };
        if self.handle.is_none() {
            self.create(controller, AllocationPolicy::Creation)?;
        }
        if !native.create_resource() {
            tracing::debug!("native image resource creation failed");
            self.native_ready = false;
            return Ok(());
        }
        let error = native.target_texture();
        if error != 0 {
            tracing::debug!(error, "native image target failed");
            native.destroy_resource();
            self.native_ready = false;
            return Ok(());
        }
        self.native_ready = true;
        Ok(())
    }

    /// Upload `pixels` according to `params`.
    pub fn upload<C>(
        &mut self,
        controller: &mut C,
        pixels: &PixelData,
        params: &UploadParams,
    ) -> TableauResult<()>
    where
        C: GraphicsController + ?Sized,
    {
        if self.native.is_some() {
            return Err(TableauError::contract("native textures do not accept uploads"));
        }
        if self.use_uploaded_size {
            (self.width, self.height) = params.uploaded_extent()?;
            self.format = pixels.format();
        }
        params.validate(pixels, self.texture_type, self.width, self.height)?;

        let (mip_w, mip_h) = mip_extent(self.width, self.height, params.mipmap)?;
        let full = params.x_offset == 0
            && params.y_offset == 0
            && params.data_width == mip_w
            && params.data_height == mip_h;
        if self.handle.is_none() || self.use_uploaded_size {
            let allocation = if full {
                AllocationPolicy::Upload
            } else {
                AllocationPolicy::Creation
            };
            self.create(controller, allocation)?;
        }
        let texture = self
            .handle
            .ok_or_else(|| TableauError::backend("texture has no backend object"))?;

        let (src_offset, src_size) = params.source_window(pixels);
        let info = TextureUpdateInfo {
            texture,
            layer: params.layer,
            level: params.mipmap,
            dst: params.destination(),
            src_offset,
            src_size,
            src_stride: pixels.stride(),
            src_format: convert_pixel_format(pixels.format()),
            source: 0,
            kind: if full {
                TextureUpdateKind::Full
            } else {
                TextureUpdateKind::Sub
            },
        };
        controller.update_textures(
            &[info],
            &[TextureUpdateSource {
                pixels: pixels.clone(),
            }],
        )?;
        self.updated = true;
        Ok(())
    }

    /// Generate the mip chain from level 0.
    pub fn generate_mipmaps<C>(&mut self, controller: &mut C) -> TableauResult<()>
    where
        C: GraphicsController + ?Sized,
    {
        if self.handle.is_none() {
            if self.use_uploaded_size {
                return Err(TableauError::contract(
                    "texture has no storage until its first upload",
                ));
            }
            self.create(controller, AllocationPolicy::Creation)?;
        }
        let texture = self
            .handle
            .ok_or_else(|| TableauError::backend("texture has no backend object"))?;
        controller.generate_texture_mipmaps(texture)
    }

    /// Handle to sample from this frame, or `None` when the texture is unusable. A native image
    /// whose binding failed is retried here, once per bind.
    pub fn bind<C>(&mut self, controller: &mut C) -> TableauResult<Option<TextureHandle>>
    where
        C: GraphicsController + ?Sized,
    {
        if let Some(native) = self.native.clone() {
            if !self.native_ready {
                tracing::debug!("retrying native image binding");
                self.create_native(controller)?;
            }
            if !self.native_ready {
                return Ok(None);
            }
            native.prepare_texture();
        }
        Ok(self.handle)
    }

    /// Release the backend object and the native binding.
    pub fn destroy<C>(&mut self, controller: &mut C)
    where
        C: GraphicsController + ?Sized,
    {
        if let Some(native) = &self.native {
            if self.native_ready {
                native.destroy_resource();
                self.native_ready = false;
            }
        }
        if let Some(handle) = self.handle.take() {
            controller.destroy_texture(handle);
        }
    }

    pub fn texture_type(&self) -> TextureType {
        self.texture_type
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn handle(&self) -> Option<TextureHandle> {
        self.handle
    }

    pub fn is_native(&self) -> bool {
        self.native.is_some()
    }

    /// Whether the native image is currently bound to the backend.
    pub fn is_native_ready(&self) -> bool {
        self.native_ready
    }

    pub fn has_alpha(&self) -> bool {
        match &self.native {
            Some(native) => native.requires_blending(),
            None => self.format.has_alpha(),
        }
    }

    /// Whether an upload landed since the last [`RenderTexture::render_finished`].
    pub fn is_updated(&self) -> bool {
        self.updated
    }

    pub fn render_finished(&mut self) {
        self.updated = false;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/texture.rs"]
mod tests;
