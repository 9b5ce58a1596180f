//! Render side: executes the per-frame command list against a [`GraphicsController`].

use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::common::memory_pool::{PoolKey, SharedMemoryPool};
use crate::foundation::core::{BufferIndex, FrameId};
use crate::foundation::error::{TableauError, TableauResult};
use crate::foundation::hash::{calculate_hash, calculate_hash_bytes};
use crate::graphics::controller::{
    FrameBufferCreateInfo, FrameBufferHandle, GraphicsController, ShaderCreateInfo, ShaderHandle,
    SubmitInfo, TextureHandle,
};
use crate::graphics::format::{PixelFormat, TextureType};
use crate::graphics::pixel_data::PixelData;
use crate::graphics::shader::{ShaderData, ShaderSourceMode, ShaderStage};
use crate::render::native::NativeImageSource;
use crate::render::texture::{RenderTexture, UploadParams};
use crate::update::node::NodeId;

/// Most colour attachments a frame buffer accepts.
pub const MAX_COLOR_ATTACHMENTS: usize = 8;

/// Application-visible frame buffer identifier.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameBufferId(pub u32);

/// Resource work forwarded from the application to the render side.
#[derive(Debug)]
pub enum RenderCommand {
    /// Emplace a texture into the slot reserved under `key`.
    CreateTexture {
        key: PoolKey,
        texture_type: TextureType,
        format: PixelFormat,
        width: u32,
        height: u32,
    },
    CreateNativeTexture {
        key: PoolKey,
        native: Arc<dyn NativeImageSource>,
    },
    UploadTexture {
        key: PoolKey,
        pixels: PixelData,
        params: UploadParams,
    },
    GenerateMipmaps {
        key: PoolKey,
    },
    DestroyTexture {
        key: PoolKey,
    },
    CompileShader(Arc<ShaderData>),
    CreateFrameBuffer {
        id: FrameBufferId,
        width: u32,
        height: u32,
    },
    AttachColorTexture {
        id: FrameBufferId,
        texture: PoolKey,
    },
    AttachDepthTexture {
        id: FrameBufferId,
        texture: PoolKey,
    },
    AttachDepthStencilTexture {
        id: FrameBufferId,
        texture: PoolKey,
    },
    DestroyFrameBuffer(FrameBufferId),
}

impl RenderCommand {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateTexture { .. } => "create_texture",
            Self::CreateNativeTexture { .. } => "create_native_texture",
            Self::UploadTexture { .. } => "upload_texture",
            Self::GenerateMipmaps { .. } => "generate_mipmaps",
            Self::DestroyTexture { .. } => "destroy_texture",
            Self::CompileShader(_) => "compile_shader",
            Self::CreateFrameBuffer { .. } => "create_frame_buffer",
            Self::AttachColorTexture { .. } => "attach_color_texture",
            Self::AttachDepthTexture { .. } => "attach_depth_texture",
            Self::AttachDepthStencilTexture { .. } => "attach_depth_stencil_texture",
            Self::DestroyFrameBuffer(_) => "destroy_frame_buffer",
        }
    }
}

/// One node to draw, resolved by the update side.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct DrawItem {
    pub node: NodeId,
    pub world_position: [f32; 3],
    pub size: [f32; 3],
    pub color: [f32; 4],
    #[serde(skip)]
    pub texture: Option<PoolKey>,
}

/// Everything the update side hands over for one frame.
#[derive(Debug, Default)]
pub struct RenderFrame {
    pub frame: u64,
    pub buffer: BufferIndex,
    pub commands: Vec<RenderCommand>,
    pub draw_list: Vec<DrawItem>,
    /// Frame ids whose rendered callbacks fire after this frame.
    pub frame_rendered: Vec<FrameId>,
    /// Frame ids whose presented callbacks fire after this frame.
    pub frame_presented: Vec<FrameId>,
    /// Whether a frame callback asked for another frame.
    pub keep_rendering: bool,
}

/// Outcome of [`RenderManager::render`].
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RenderReport {
    pub frame: u64,
    pub commands: usize,
    pub failed_commands: usize,
    pub draw_calls: usize,
    pub textures_bound: usize,
    pub frame_rendered: Vec<FrameId>,
    pub frame_presented: Vec<FrameId>,
}

/// Compiled vertex and fragment stages of one [`ShaderData`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShaderProgram {
    pub vertex: ShaderHandle,
    pub fragment: ShaderHandle,
}

#[derive(Debug, Default)]
struct RenderFrameBuffer {
    width: u32,
    height: u32,
    color: SmallVec<[PoolKey; MAX_COLOR_ATTACHMENTS]>,
    depth: Option<PoolKey>,
    depth_stencil: Option<PoolKey>,
    handle: Option<FrameBufferHandle>,
    dirty: bool,
}

/// Render-side resource owner.
///
/// Textures live in a pool shared with the application thread, which reserves slots; this side
/// fills, uses and releases them.
#[derive(Debug)]
pub struct RenderManager<C: GraphicsController> {
    controller: C,
    textures: Arc<SharedMemoryPool<RenderTexture>>,
    shaders: HashMap<u64, ShaderProgram>,
    frame_buffers: HashMap<FrameBufferId, RenderFrameBuffer>,
}

impl<C: GraphicsController> RenderManager<C> {
    pub fn new(controller: C, textures: Arc<SharedMemoryPool<RenderTexture>>) -> Self {
        Self {
            controller,
            textures,
            shaders: HashMap::new(),
            frame_buffers: HashMap::new(),
        }
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.controller
    }

    /// Texture pool shared with the application side.
    pub fn textures(&self) -> &Arc<SharedMemoryPool<RenderTexture>> {
        &self.textures
    }

    /// Execute `frame`: resource commands in order, then one submit and present.
    ///
    /// A failing command is logged and skipped; later commands still run.
    #[tracing::instrument(skip(self, frame), fields(frame = frame.frame))]
    pub fn render(&mut self, frame: RenderFrame) -> TableauResult<RenderReport> {
        let mut report = RenderReport {
            frame: frame.frame,
            commands: frame.commands.len(),
            ..RenderReport::default()
        };
        for command in frame.commands {
            let kind = command.kind();
            if let Err(err) = self.process(command) {
                tracing::warn!(command = kind, %err, "render command failed");
                report.failed_commands += 1;
            }
        }
        self.refresh_frame_buffers();

        let textures = Arc::clone(&self.textures);
        let mut pool = textures.lock();
        let mut bound: Vec<TextureHandle> = Vec::new();
        for item in &frame.draw_list {
            let Some(key) = item.texture else {
                continue;
            };
            let Some(texture) = pool.get_mut(key) else {
                tracing::trace!(node = ?item.node, "draw item texture is gone");
                continue;
            };
            match texture.bind(&mut self.controller)? {
                Some(handle) => bound.push(handle),
                None => tracing::debug!(node = ?item.node, "texture unusable this frame"),
            }
        }

        self.controller.submit(&SubmitInfo {
            textures: bound.clone(),
            draw_calls: frame.draw_list.len(),
        })?;
        for (_, texture) in pool.iter_mut() {
            texture.render_finished();
        }
        drop(pool);
        self.controller.present()?;

        report.draw_calls = frame.draw_list.len();
        report.textures_bound = bound.len();
        report.frame_rendered = frame.frame_rendered;
        report.frame_presented = frame.frame_presented;
        Ok(report)
    }

    /// Execute one resource command.
    pub fn process(&mut self, command: RenderCommand) -> TableauResult<()> {
        match command {
            RenderCommand::CreateTexture {
                key,
                texture_type,
                format,
                width,
                height,
            } => self.create_texture(key, RenderTexture::new(texture_type, format, width, height)),
            RenderCommand::CreateNativeTexture { key, native } => {
                self.create_texture(key, RenderTexture::new_native(native))
            }
            RenderCommand::UploadTexture {
                key,
                pixels,
                params,
            } => {
                let textures = Arc::clone(&self.textures);
                let mut pool = textures.lock();
                pool.get_mut(key)
                    .ok_or_else(|| missing_texture(key))?
                    .upload(&mut self.controller, &pixels, &params)
            }
            RenderCommand::GenerateMipmaps { key } => {
                let textures = Arc::clone(&self.textures);
                let mut pool = textures.lock();
                pool.get_mut(key)
                    .ok_or_else(|| missing_texture(key))?
                    .generate_mipmaps(&mut self.controller)
            }
            RenderCommand::DestroyTexture { key } => {
                let texture = self.textures.free_thread_safe(key);
                if let Some(mut texture) = texture {
                    texture.destroy(&mut self.controller);
                }
                Ok(())
            }
            RenderCommand::CompileShader(data) => self.compile_shader(&data).map(|_| ()),
            RenderCommand::CreateFrameBuffer { id, width, height } => {
                if self.frame_buffers.contains_key(&id) {
                    return Err(TableauError::validation(format!("{id:?} already exists")));
                }
                self.frame_buffers.insert(
                    id,
                    RenderFrameBuffer {
                        width,
                        height,
                        dirty: true,
                        ..RenderFrameBuffer::default()
                    },
                );
                Ok(())
            }
            RenderCommand::AttachColorTexture { id, texture } => {
                let fb = self.frame_buffer_mut(id)?;
                if fb.color.len() >= MAX_COLOR_ATTACHMENTS {
                    return Err(TableauError::validation(format!(
                        "{id:?} already has {MAX_COLOR_ATTACHMENTS} colour attachments"
                    )));
                }
                fb.color.push(texture);
                fb.dirty = true;
                Ok(())
            }
            RenderCommand::AttachDepthTexture { id, texture } => {
                let fb = self.frame_buffer_mut(id)?;
                fb.depth = Some(texture);
                fb.dirty = true;
                Ok(())
            }
            RenderCommand::AttachDepthStencilTexture { id, texture } => {
                let fb = self.frame_buffer_mut(id)?;
                fb.depth_stencil = Some(texture);
                fb.dirty = true;
                Ok(())
            }
            RenderCommand::DestroyFrameBuffer(id) => {
                if let Some(fb) = self.frame_buffers.remove(&id) {
                    if let Some(handle) = fb.handle {
                        self.controller.destroy_frame_buffer(handle);
                    }
                }
                Ok(())
            }
        }
    }

    fn create_texture(&mut self, key: PoolKey, mut texture: RenderTexture) -> TableauResult<()> {
        let initialized = texture.initialize(&mut self.controller);
        self.textures.emplace_thread_safe(key, texture)?;
        initialized
    }

    fn frame_buffer_mut(&mut self, id: FrameBufferId) -> TableauResult<&mut RenderFrameBuffer> {
        self.frame_buffers
            .get_mut(&id)
            .ok_or_else(|| TableauError::invalid_handle(format!("{id:?} does not exist")))
    }

    /// Compile `data` unless a program with the same hash exists. The hash is computed and stored
    /// on first use.
    pub fn compile_shader(&mut self, data: &ShaderData) -> TableauResult<ShaderProgram> {
        let hash = match data.hash() {
            Ok(hash) => hash,
            Err(_) => {
                let hash = shader_hash(data);
                if data.set_hash(hash).is_err() {
                    tracing::trace!(name = data.name(), "shader hash set concurrently");
                }
                data.hash()?
            }
        };
        if let Some(program) = self.shaders.get(&hash) {
            return Ok(*program);
        }
        let mut create = |stage: ShaderStage| {
            self.controller.create_shader(&ShaderCreateInfo {
                stage,
                mode: data.source_mode(),
                source: data.shader_for_stage(stage).to_vec(),
                version: data.version(stage),
            })
        };
        let program = ShaderProgram {
            vertex: create(ShaderStage::Vertex)?,
            fragment: create(ShaderStage::Fragment)?,
        };
        tracing::debug!(name = data.name(), hash, "shader compiled");
        self.shaders.insert(hash, program);
        Ok(program)
    }

    /// Compiled program for a shader hash.
    pub fn shader(&self, hash: u64) -> Option<ShaderProgram> {
        self.shaders.get(&hash).copied()
    }

    pub fn shader_count(&self) -> usize {
        self.shaders.len()
    }

    /// Backend object of a frame buffer, once its attachments exist.
    pub fn frame_buffer(&self, id: FrameBufferId) -> Option<FrameBufferHandle> {
        self.frame_buffers.get(&id).and_then(|fb| fb.handle)
    }

    fn refresh_frame_buffers(&mut self) {
        let textures = Arc::clone(&self.textures);
        let pool = textures.lock();
        let handle_of = |key: PoolKey| pool.get(key).and_then(RenderTexture::handle);
        // `Some(None)` when nothing is attached, `None` while the attachment has no storage.
        let resolve = |key: Option<PoolKey>| match key {
            None => Some(None),
            Some(key) => handle_of(key).map(Some),
        };
        for (id, fb) in &mut self.frame_buffers {
            if !fb.dirty {
                continue;
            }
            let color: Option<SmallVec<[TextureHandle; 8]>> =
                fb.color.iter().map(|k| handle_of(*k)).collect();
            let (Some(color), Some(depth), Some(depth_stencil)) =
                (color, resolve(fb.depth), resolve(fb.depth_stencil))
            else {
                tracing::debug!(?id, "frame buffer attachments not ready");
                continue;
            };
            if let Some(old) = fb.handle.take() {
                self.controller.destroy_frame_buffer(old);
            }
            match self.controller.create_frame_buffer(&FrameBufferCreateInfo {
                width: fb.width,
                height: fb.height,
                color,
                depth,
                depth_stencil,
            }) {
                Ok(handle) => {
                    fb.handle = Some(handle);
                    fb.dirty = false;
                }
                Err(err) => tracing::warn!(?id, %err, "frame buffer creation failed"),
            }
        }
    }

    /// Release every backend object.
    pub fn shutdown(&mut self) {
        for (_, fb) in self.frame_buffers.drain() {
            if let Some(handle) = fb.handle {
                self.controller.destroy_frame_buffer(handle);
            }
        }
        {
            let mut pool = self.textures.lock();
            for key in pool.keys() {
                if let Some(mut texture) = pool.free(key) {
                    texture.destroy(&mut self.controller);
                }
            }
        }
        for (_, program) in self.shaders.drain() {
            self.controller.destroy_shader(program.vertex);
            self.controller.destroy_shader(program.fragment);
        }
    }
}

fn missing_texture(key: PoolKey) -> TableauError {
    TableauError::invalid_handle(format!("texture {key:?} does not exist"))
}

fn shader_hash(data: &ShaderData) -> u64 {
    match data.source_mode() {
        ShaderSourceMode::Text => calculate_hash(
            &String::from_utf8_lossy(data.shader_for_stage(ShaderStage::Vertex)),
            &String::from_utf8_lossy(data.shader_for_stage(ShaderStage::Fragment)),
        ),
        ShaderSourceMode::Binary => {
            let mut bytes = data.shader_for_stage(ShaderStage::Vertex).to_vec();
            bytes.extend_from_slice(data.shader_for_stage(ShaderStage::Fragment));
            calculate_hash_bytes(&bytes)
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/manager.rs"]
mod tests;
