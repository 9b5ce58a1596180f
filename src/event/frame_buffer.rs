//! Application-side frame buffer handles.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::event::core::{Core, EventShared, upgrade};
use crate::event::texture::Texture;
use crate::foundation::error::{TableauError, TableauResult};
use crate::render::manager::{FrameBufferId, RenderCommand};
use crate::update::messages::UpdateMessage;

/// Colour attachments a frame buffer accepts.
pub const MAX_COLOR_ATTACHMENTS: usize = 8;

#[derive(Debug, Default)]
struct Attachments {
    color: Vec<Texture>,
    depth: Option<Texture>,
    depth_stencil: Option<Texture>,
}

#[derive(Debug)]
struct FrameBufferInner {
    id: FrameBufferId,
    shared: Weak<EventShared>,
    width: u32,
    height: u32,
    attachments: Mutex<Attachments>,
}

impl FrameBufferInner {
    fn attachments(&self) -> MutexGuard<'_, Attachments> {
        self.attachments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for FrameBufferInner {
    fn drop(&mut self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let message = UpdateMessage::Render(RenderCommand::DestroyFrameBuffer(self.id));
        if let Err(err) = shared.send(message) {
            tracing::trace!(id = ?self.id, %err, "frame buffer dropped after shutdown");
        }
    }
}

/// Render target with up to [`MAX_COLOR_ATTACHMENTS`] colour textures plus optional depth and
/// depth-stencil textures. Attached textures stay alive as long as the frame buffer.
#[derive(Clone, Debug, Default)]
pub struct FrameBuffer {
    inner: Option<Arc<FrameBufferInner>>,
}

impl FrameBuffer {
    pub fn new(core: &Core, width: u32, height: u32) -> TableauResult<Self> {
        if width == 0 || height == 0 {
            return Err(TableauError::validation(format!(
                "frame buffer size must be non-zero, got {width}x{height}"
            )));
        }
        let shared = core.shared();
        let id = shared.next_frame_buffer_id();
        let inner = Arc::new(FrameBufferInner {
            id,
            shared: Arc::downgrade(shared),
            width,
            height,
            attachments: Mutex::new(Attachments::default()),
        });
        shared.send(UpdateMessage::Render(RenderCommand::CreateFrameBuffer {
            id,
            width,
            height,
        }))?;
        Ok(Self { inner: Some(inner) })
    }

    fn inner(&self) -> TableauResult<&Arc<FrameBufferInner>> {
        self.inner
            .as_ref()
            .ok_or_else(|| TableauError::invalid_handle("frame buffer handle is empty"))
    }

    pub fn id(&self) -> Option<FrameBufferId> {
        self.inner.as_ref().map(|inner| inner.id)
    }

    pub fn width(&self) -> TableauResult<u32> {
        Ok(self.inner()?.width)
    }

    pub fn height(&self) -> TableauResult<u32> {
        Ok(self.inner()?.height)
    }

    /// Add the next colour attachment.
    pub fn attach_color_texture(&self, texture: &Texture) -> TableauResult<()> {
        let inner = self.inner()?;
        let key = texture_key(texture)?;
        {
            let mut attachments = inner.attachments();
            if attachments.color.len() >= MAX_COLOR_ATTACHMENTS {
                return Err(TableauError::validation(format!(
                    "a frame buffer holds at most {MAX_COLOR_ATTACHMENTS} colour attachments"
                )));
            }
            attachments.color.push(texture.clone());
        }
        upgrade(&inner.shared)?.send(UpdateMessage::Render(RenderCommand::AttachColorTexture {
            id: inner.id,
            texture: key,
        }))
    }

    pub fn attach_depth_texture(&self, texture: &Texture) -> TableauResult<()> {
        let inner = self.inner()?;
        let key = texture_key(texture)?;
        inner.attachments().depth = Some(texture.clone());
        upgrade(&inner.shared)?.send(UpdateMessage::Render(RenderCommand::AttachDepthTexture {
            id: inner.id,
            texture: key,
        }))
    }

    pub fn attach_depth_stencil_texture(&self, texture: &Texture) -> TableauResult<()> {
        let inner = self.inner()?;
        let key = texture_key(texture)?;
        inner.attachments().depth_stencil = Some(texture.clone());
        upgrade(&inner.shared)?.send(UpdateMessage::Render(
            RenderCommand::AttachDepthStencilTexture {
                id: inner.id,
                texture: key,
            },
        ))
    }

    /// Colour attachment at `index`, or an empty handle.
    pub fn color_texture(&self, index: usize) -> Texture {
        self.inner
            .as_ref()
            .and_then(|inner| inner.attachments().color.get(index).cloned())
            .unwrap_or_default()
    }

    pub fn color_texture_count(&self) -> usize {
        self.inner
            .as_ref()
            .map_or(0, |inner| inner.attachments().color.len())
    }

    pub fn depth_texture(&self) -> Texture {
        self.inner
            .as_ref()
            .and_then(|inner| inner.attachments().depth.clone())
            .unwrap_or_default()
    }

    pub fn depth_stencil_texture(&self) -> Texture {
        self.inner
            .as_ref()
            .and_then(|inner| inner.attachments().depth_stencil.clone())
            .unwrap_or_default()
    }
}

fn texture_key(texture: &Texture) -> TableauResult<crate::common::memory_pool::PoolKey> {
    texture
        .key()
        .ok_or_else(|| TableauError::invalid_handle("texture handle is empty"))
}

#[cfg(test)]
#[path = "../../tests/unit/event/frame_buffer.rs"]
mod tests;
