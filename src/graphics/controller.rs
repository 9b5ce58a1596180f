use smallvec::SmallVec;

use crate::foundation::core::Rect;
use crate::foundation::error::TableauResult;
use crate::graphics::format::{GraphicsFormat, TextureType};
use crate::graphics::pixel_data::PixelData;
use crate::graphics::shader::{ShaderSourceMode, ShaderStage};

/// Backend texture object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TextureHandle(pub u32);

/// Backend shader object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ShaderHandle(pub u32);

/// Backend frame buffer object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct FrameBufferHandle(pub u32);

/// Whether storage is reserved when the texture is created or on its first upload.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum AllocationPolicy {
    #[default]
    Creation,
    Upload,
}

/// Parameters for [`GraphicsController::create_texture`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TextureCreateInfo {
    pub texture_type: TextureType,
    pub format: GraphicsFormat,
    pub width: u32,
    pub height: u32,
    /// Backed by a native image; the backend reserves no storage.
    pub native: bool,
    pub allocation: AllocationPolicy,
}

/// Whether an upload replaces a whole mip image or a region of it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TextureUpdateKind {
    Full,
    Sub,
}

/// One upload into one texture image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureUpdateInfo {
    pub texture: TextureHandle,
    pub layer: u32,
    pub level: u32,
    /// Destination region at `level`.
    pub dst: Rect,
    /// Byte offset of the first texel in the source.
    pub src_offset: usize,
    /// Bytes read from the source, starting at `src_offset`.
    pub src_size: usize,
    /// Source row pitch in texels, `0` when tightly packed.
    pub src_stride: u32,
    pub src_format: GraphicsFormat,
    /// Index into the source list.
    pub source: usize,
    pub kind: TextureUpdateKind,
}

/// Pixel payload referenced by [`TextureUpdateInfo::source`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureUpdateSource {
    pub pixels: PixelData,
}

/// Parameters for [`GraphicsController::create_shader`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderCreateInfo {
    pub stage: ShaderStage,
    pub mode: ShaderSourceMode,
    pub source: Vec<u8>,
    pub version: u32,
}

/// Parameters for [`GraphicsController::create_frame_buffer`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameBufferCreateInfo {
    pub width: u32,
    pub height: u32,
    pub color: SmallVec<[TextureHandle; 8]>,
    pub depth: Option<TextureHandle>,
    pub depth_stencil: Option<TextureHandle>,
}

/// One frame's worth of draw work.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubmitInfo {
    /// Textures bound for sampling, in draw order.
    pub textures: Vec<TextureHandle>,
    pub draw_calls: usize,
}

/// Operations the render side needs from a GPU backend.
pub trait GraphicsController {
    fn create_texture(&mut self, info: &TextureCreateInfo) -> TableauResult<TextureHandle>;

    /// Apply uploads in order; `updates[i].source` indexes `sources`.
    fn update_textures(
        &mut self,
        updates: &[TextureUpdateInfo],
        sources: &[TextureUpdateSource],
    ) -> TableauResult<()>;

    fn generate_texture_mipmaps(&mut self, texture: TextureHandle) -> TableauResult<()>;

    fn destroy_texture(&mut self, texture: TextureHandle);

    fn create_shader(&mut self, info: &ShaderCreateInfo) -> TableauResult<ShaderHandle>;

    fn destroy_shader(&mut self, shader: ShaderHandle);

    fn create_frame_buffer(
        &mut self,
        info: &FrameBufferCreateInfo,
    ) -> TableauResult<FrameBufferHandle>;

    fn destroy_frame_buffer(&mut self, frame_buffer: FrameBufferHandle);

    fn submit(&mut self, info: &SubmitInfo) -> TableauResult<()>;

    fn present(&mut self) -> TableauResult<()>;
}
