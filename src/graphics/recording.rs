//! Headless [`GraphicsController`] that records every call.
//!
//! Texture calls are additionally traced the way a GL backend would issue them, so tests can
//! assert on image reservation and upload routing without a GPU.

use std::collections::{HashMap, HashSet};

use crate::foundation::error::{TableauError, TableauResult};
use crate::graphics::controller::{
    AllocationPolicy, FrameBufferCreateInfo, FrameBufferHandle, GraphicsController,
    ShaderCreateInfo, ShaderHandle, SubmitInfo, TextureCreateInfo, TextureHandle,
    TextureUpdateInfo, TextureUpdateKind, TextureUpdateSource,
};
use crate::graphics::format::TextureType;

pub const GL_TEXTURE_2D: u32 = 3553;
pub const GL_TEXTURE_CUBE_MAP: u32 = 34067;
pub const GL_TEXTURE_CUBE_MAP_POSITIVE_X: u32 = 34069;

/// One recorded call.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TraceCall {
    pub method: String,
    pub params: String,
}

/// Ordered log of recorded calls.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct TraceCallStack {
    enabled: bool,
    calls: Vec<TraceCall>,
}

impl TraceCallStack {
    /// Stack that records only when `enabled`.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            calls: Vec::new(),
        }
    }

    pub fn enable(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record a call when enabled.
    pub fn push_call(&mut self, method: &str, params: impl Into<String>) {
        if self.enabled {
            self.calls.push(TraceCall {
                method: method.to_owned(),
                params: params.into(),
            });
        }
    }

    /// Whether `method` was called.
    pub fn find_method(&self, method: &str) -> bool {
        self.calls.iter().any(|c| c.method == method)
    }

    /// Whether `method` was called with exactly `params`.
    pub fn find_method_and_params(&self, method: &str, params: &str) -> bool {
        self.find_index_of_method_and_params(method, params).is_some()
    }

    /// Position of the first `method(params)` call.
    pub fn find_index_of_method_and_params(&self, method: &str, params: &str) -> Option<usize> {
        self.calls
            .iter()
            .position(|c| c.method == method && c.params == params)
    }

    /// Number of calls to `method`.
    pub fn count_method(&self, method: &str) -> usize {
        self.calls.iter().filter(|c| c.method == method).count()
    }

    /// Forget recorded calls.
    pub fn reset(&mut self) {
        self.calls.clear();
    }

    pub fn calls(&self) -> &[TraceCall] {
        &self.calls
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

/// Recording backend options.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ControllerOptions {
    /// Record calls from the start.
    pub trace: bool,
    /// Largest accepted texture edge; larger creations fail.
    pub max_texture_size: u32,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            trace: true,
            max_texture_size: 4096,
        }
    }
}

/// Totals reported by [`RecordingController::summary`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ControllerSummary {
    pub textures_created: usize,
    pub textures_live: usize,
    pub uploads: usize,
    pub shaders_live: usize,
    pub frame_buffers_live: usize,
    pub submits: usize,
    pub presents: usize,
}

/// Controller that keeps handles and traces instead of talking to a GPU.
#[derive(Debug, Default)]
pub struct RecordingController {
    options: ControllerOptions,
    call_trace: TraceCallStack,
    texture_trace: TraceCallStack,
    textures: HashMap<TextureHandle, TextureCreateInfo>,
    shaders: HashSet<ShaderHandle>,
    frame_buffers: HashSet<FrameBufferHandle>,
    next_handle: u32,
    textures_created: usize,
    uploads: usize,
    submits: usize,
    presents: usize,
}

impl RecordingController {
    pub fn new(options: ControllerOptions) -> Self {
        Self {
            options,
            call_trace: TraceCallStack::new(options.trace),
            texture_trace: TraceCallStack::new(options.trace),
            ..Self::default()
        }
    }

    /// Controller-level calls (`CreateTexture`, `UpdateTextures`, ...).
    pub fn call_trace(&self) -> &TraceCallStack {
        &self.call_trace
    }

    pub fn call_trace_mut(&mut self) -> &mut TraceCallStack {
        &mut self.call_trace
    }

    /// GL-level texture calls (`TexImage2D`, `TexSubImage2D`, ...).
    pub fn texture_trace(&self) -> &TraceCallStack {
        &self.texture_trace
    }

    pub fn texture_trace_mut(&mut self) -> &mut TraceCallStack {
        &mut self.texture_trace
    }

    /// Creation parameters of a live texture.
    pub fn texture_info(&self, texture: TextureHandle) -> Option<&TextureCreateInfo> {
        self.textures.get(&texture)
    }

    pub fn summary(&self) -> ControllerSummary {
        ControllerSummary {
            textures_created: self.textures_created,
            textures_live: self.textures.len(),
            uploads: self.uploads,
            shaders_live: self.shaders.len(),
            frame_buffers_live: self.frame_buffers.len(),
            submits: self.submits,
            presents: self.presents,
        }
    }

    fn next(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }

    fn texture(&self, texture: TextureHandle) -> TableauResult<&TextureCreateInfo> {
        self.textures
            .get(&texture)
            .ok_or_else(|| TableauError::backend(format!("unknown texture {texture:?}")))
    }
}

fn image_target(texture_type: TextureType, layer: u32) -> u32 {
    match texture_type {
        TextureType::Texture2D => GL_TEXTURE_2D,
        TextureType::TextureCube => GL_TEXTURE_CUBE_MAP_POSITIVE_X + layer,
    }
}

fn bind_target(texture_type: TextureType) -> u32 {
    match texture_type {
        TextureType::Texture2D => GL_TEXTURE_2D,
        TextureType::TextureCube => GL_TEXTURE_CUBE_MAP,
    }
}

impl GraphicsController for RecordingController {
    fn create_texture(&mut self, info: &TextureCreateInfo) -> TableauResult<TextureHandle> {
        if info.width > self.options.max_texture_size || info.height > self.options.max_texture_size
        {
            return Err(TableauError::backend(format!(
                "texture {}x{} exceeds the {} limit",
                info.width, info.height, self.options.max_texture_size
            )));
        }
        let handle = TextureHandle(self.next());
        self.call_trace.push_call(
            "CreateTexture",
            format!(
                "{:?}, {:?}, {}, {}",
                info.texture_type, info.format, info.width, info.height
            ),
        );
        self.texture_trace.push_call("GenTextures", handle.0.to_string());

        if !info.native && info.allocation == AllocationPolicy::Creation {
            let method = if info.format.is_compressed() {
                "CompressedTexImage2D"
            } else {
                "TexImage2D"
            };
            for layer in 0..info.texture_type.layer_count() {
                self.texture_trace.push_call(
                    method,
                    format!(
                        "{}, 0, {}, {}",
                        image_target(info.texture_type, layer),
                        info.width,
                        info.height
                    ),
                );
            }
        }

        self.textures.insert(handle, *info);
        self.textures_created += 1;
        Ok(handle)
    }

    fn update_textures(
        &mut self,
        updates: &[TextureUpdateInfo],
        sources: &[TextureUpdateSource],
    ) -> TableauResult<()> {
        self.call_trace.push_call(
            "UpdateTextures",
            format!("[{}]:[{}]", updates.len(), sources.len()),
        );
        for update in updates {
            if update.source >= sources.len() {
                return Err(TableauError::backend(format!(
                    "update references source {} of {}",
                    update.source,
                    sources.len()
                )));
            }
            let info = *self.texture(update.texture)?;
            let compressed = info.format.is_compressed() || update.src_format.is_compressed();
            let target = image_target(info.texture_type, update.layer);
            self.texture_trace.push_call(
                "BindTexture",
                format!("{}, {}", bind_target(info.texture_type), update.texture.0),
            );
            let dst = update.dst;
            match (update.kind, compressed) {
                (TextureUpdateKind::Full, false) => self.texture_trace.push_call(
                    "TexImage2D",
                    format!("{target}, {}, {}, {}", update.level, dst.width, dst.height),
                ),
                (TextureUpdateKind::Full, true) => self.texture_trace.push_call(
                    "CompressedTexImage2D",
                    format!("{target}, {}, {}, {}", update.level, dst.width, dst.height),
                ),
                (TextureUpdateKind::Sub, false) => self.texture_trace.push_call(
                    "TexSubImage2D",
                    format!(
                        "{target}, {}, {}, {}, {}, {}",
                        update.level, dst.x, dst.y, dst.width, dst.height
                    ),
                ),
                (TextureUpdateKind::Sub, true) => self.texture_trace.push_call(
                    "CompressedTexSubImage2D",
                    format!(
                        "{target}, {}, {}, {}, {}, {}",
                        update.level, dst.x, dst.y, dst.width, dst.height
                    ),
                ),
            }
            self.uploads += 1;
        }
        Ok(())
    }

    fn generate_texture_mipmaps(&mut self, texture: TextureHandle) -> TableauResult<()> {
        let info = *self.texture(texture)?;
        self.call_trace
            .push_call("GenerateTextureMipmaps", texture.0.to_string());
        self.texture_trace
            .push_call("GenerateMipmap", bind_target(info.texture_type).to_string());
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture).is_some() {
            self.texture_trace
                .push_call("DeleteTextures", texture.0.to_string());
        }
    }

    fn create_shader(&mut self, info: &ShaderCreateInfo) -> TableauResult<ShaderHandle> {
        let handle = ShaderHandle(self.next());
        self.call_trace.push_call(
            "CreateShader",
            format!("{:?}, {:?}, {}", info.stage, info.mode, info.version),
        );
        self.shaders.insert(handle);
        Ok(handle)
    }

    fn destroy_shader(&mut self, shader: ShaderHandle) {
        if self.shaders.remove(&shader) {
            self.call_trace.push_call("DestroyShader", shader.0.to_string());
        }
    }

    fn create_frame_buffer(
        &mut self,
        info: &FrameBufferCreateInfo,
    ) -> TableauResult<FrameBufferHandle> {
        for texture in info
            .color
            .iter()
            .chain(info.depth.iter())
            .chain(info.depth_stencil.iter())
        {
            self.texture(*texture)?;
        }
        let handle = FrameBufferHandle(self.next());
        self.call_trace.push_call(
            "CreateFramebuffer",
            format!(
                "{}, {}, {}, {}, {}",
                info.width,
                info.height,
                info.color.len(),
                info.depth.is_some(),
                info.depth_stencil.is_some()
            ),
        );
        self.frame_buffers.insert(handle);
        Ok(handle)
    }

    fn destroy_frame_buffer(&mut self, frame_buffer: FrameBufferHandle) {
        if self.frame_buffers.remove(&frame_buffer) {
            self.call_trace
                .push_call("DestroyFramebuffer", frame_buffer.0.to_string());
        }
    }

    fn submit(&mut self, info: &SubmitInfo) -> TableauResult<()> {
        for texture in &info.textures {
            let target = bind_target(self.texture(*texture)?.texture_type);
            self.texture_trace
                .push_call("BindTexture", format!("{target}, {}", texture.0));
        }
        self.call_trace
            .push_call("SubmitCommandBuffers", info.draw_calls.to_string());
        self.submits += 1;
        Ok(())
    }

    fn present(&mut self) -> TableauResult<()> {
        self.call_trace.push_call("PresentRenderTarget", "");
        self.presents += 1;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/graphics/recording.rs"]
mod tests;
