//! Application-side texture handles.
//!
//! Creation reserves a slot in the shared texture pool so the handle has a stable key before the
//! render side has built anything. Uploads are checked here first, so an invalid rectangle fails
//! at the call site instead of being dropped on the render thread.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::common::memory_pool::PoolKey;
use crate::event::core::{Core, EventShared, upgrade};
use crate::foundation::error::{TableauError, TableauResult};
use crate::graphics::format::{PixelFormat, TextureType};
use crate::graphics::pixel_data::PixelData;
use crate::render::manager::RenderCommand;
use crate::render::native::{NativeImageSource, apply_native_fragment_shader};
use crate::render::texture::UploadParams;
use crate::update::messages::UpdateMessage;

#[derive(Clone, Copy, Debug)]
struct Shape {
    format: PixelFormat,
    width: u32,
    height: u32,
}

#[derive(Debug)]
pub(crate) struct TextureInner {
    key: PoolKey,
    shared: Weak<EventShared>,
    texture_type: TextureType,
    shape: Mutex<Shape>,
    deferred: bool,
    native: Option<Arc<dyn NativeImageSource>>,
}

impl TextureInner {
    fn shape(&self) -> MutexGuard<'_, Shape> {
        self.shape.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for TextureInner {
    fn drop(&mut self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let message = UpdateMessage::Render(RenderCommand::DestroyTexture { key: self.key });
        if let Err(err) = shared.send(message) {
            tracing::trace!(key = ?self.key, %err, "texture dropped after shutdown");
        }
    }
}

/// Handle to a GPU texture. Cheap to clone; the default value is an empty handle.
#[derive(Clone, Debug, Default)]
pub struct Texture {
    inner: Option<Arc<TextureInner>>,
}

impl Texture {
    /// Texture of a fixed shape. A zero width or height gives a deferred texture whose shape comes
    /// from each upload.
    pub fn new(
        core: &Core,
        texture_type: TextureType,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> TableauResult<Self> {
        if format == PixelFormat::Invalid {
            return Err(TableauError::validation("texture format is invalid"));
        }
        let deferred = width == 0 || height == 0;
        Self::create(
            core,
            texture_type,
            Shape {
                format,
                width,
                height,
            },
            deferred,
            None,
            |key| RenderCommand::CreateTexture {
                key,
                texture_type,
                format,
                width,
                height,
            },
        )
    }

    /// Texture whose shape and format are taken from each upload.
    pub fn new_deferred(core: &Core, texture_type: TextureType) -> TableauResult<Self> {
        Self::new(core, texture_type, PixelFormat::default(), 0, 0)
    }

    /// Texture sampling a platform image. It does not accept uploads.
    pub fn new_native(core: &Core, native: Arc<dyn NativeImageSource>) -> TableauResult<Self> {
        let shape = Shape {
            format: PixelFormat::default(),
            width: native.width(),
            height: native.height(),
        };
        let command_native = Arc::clone(&native);
        Self::create(
            core,
            TextureType::Texture2D,
            shape,
            false,
            Some(native),
            move |key| RenderCommand::CreateNativeTexture {
                key,
                native: command_native,
            },
        )
    }

    fn create(
        core: &Core,
        texture_type: TextureType,
        shape: Shape,
        deferred: bool,
        native: Option<Arc<dyn NativeImageSource>>,
        command: impl FnOnce(PoolKey) -> RenderCommand,
    ) -> TableauResult<Self> {
        let shared = core.shared();
        let key = shared.textures().allocate_raw_thread_safe()?;
        let inner = Arc::new(TextureInner {
            key,
            shared: Arc::downgrade(shared),
            texture_type,
            shape: Mutex::new(shape),
            deferred,
            native,
        });
        shared.send(UpdateMessage::Render(command(key)))?;
        Ok(Self { inner: Some(inner) })
    }

    fn inner(&self) -> TableauResult<&Arc<TextureInner>> {
        self.inner
            .as_ref()
            .ok_or_else(|| TableauError::invalid_handle("texture handle is empty"))
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_none()
    }

    /// Slot reserved in the render-side texture pool.
    pub fn key(&self) -> Option<PoolKey> {
        self.inner.as_ref().map(|inner| inner.key)
    }

    /// Upload the whole of `pixels` to mip 0 at the origin.
    pub fn upload(&self, pixels: PixelData) -> TableauResult<()> {
        let params = UploadParams::whole(&pixels);
        self.upload_with(pixels, params)
    }

    /// Upload according to `params`.
    pub fn upload_with(&self, pixels: PixelData, params: UploadParams) -> TableauResult<()> {
        let inner = self.inner()?;
        if inner.native.is_some() {
            return Err(TableauError::contract("native textures do not accept uploads"));
        }
        {
            let mut shape = inner.shape();
            if inner.deferred {
                let (width, height) = params.uploaded_extent()?;
                params.validate(&pixels, inner.texture_type, width, height)?;
                *shape = Shape {
                    format: pixels.format(),
                    width,
                    height,
                };
            } else {
                if pixels.format() != shape.format
                    && (pixels.format().is_compressed() || shape.format.is_compressed())
                {
                    return Err(TableauError::validation(format!(
                        "{:?} data cannot be uploaded to a {:?} texture",
                        pixels.format(),
                        shape.format
                    )));
                }
                params.validate(&pixels, inner.texture_type, shape.width, shape.height)?;
            }
        }
        upgrade(&inner.shared)?.send(UpdateMessage::Render(RenderCommand::UploadTexture {
            key: inner.key,
            pixels,
            params,
        }))
    }

    /// Generate the mip chain from level 0.
    pub fn generate_mipmaps(&self) -> TableauResult<()> {
        let inner = self.inner()?;
        upgrade(&inner.shared)?.send(UpdateMessage::Render(RenderCommand::GenerateMipmaps {
            key: inner.key,
        }))
    }

    pub fn texture_type(&self) -> TableauResult<TextureType> {
        Ok(self.inner()?.texture_type)
    }

    /// Format of the last upload for deferred textures.
    pub fn format(&self) -> TableauResult<PixelFormat> {
        Ok(self.inner()?.shape().format)
    }

    pub fn width(&self) -> TableauResult<u32> {
        Ok(self.inner()?.shape().width)
    }

    pub fn height(&self) -> TableauResult<u32> {
        Ok(self.inner()?.shape().height)
    }

    pub fn is_native(&self) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|inner| inner.native.is_some())
    }

    pub fn native_image(&self) -> Option<Arc<dyn NativeImageSource>> {
        self.inner.as_ref()?.native.clone()
    }

    /// Rewrite a fragment shader to sample this texture's platform image. Returns whether the
    /// source changed; always `false` for non-native textures.
    pub fn apply_native_fragment_shader(&self, shader: &mut String) -> bool {
        match self.inner.as_ref().and_then(|inner| inner.native.as_deref()) {
            Some(native) => apply_native_fragment_shader(native, shader),
            None => false,
        }
    }
}

impl PartialEq for Texture {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/event/texture.rs"]
mod tests;
