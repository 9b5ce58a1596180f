//! Pixel formats as seen by the application and the backend formats they map to.

/// ASTC block footprint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum AstcBlock {
    B4x4,
    B5x4,
    B5x5,
    B6x5,
    B6x6,
    B8x5,
    B8x6,
    B8x8,
    B10x5,
    B10x6,
    B10x8,
    B10x10,
    B12x10,
    B12x12,
}

impl AstcBlock {
    /// Block width and height in texels.
    pub fn footprint(self) -> (u32, u32) {
        match self {
            Self::B4x4 => (4, 4),
            Self::B5x4 => (5, 4),
            Self::B5x5 => (5, 5),
            Self::B6x5 => (6, 5),
            Self::B6x6 => (6, 6),
            Self::B8x5 => (8, 5),
            Self::B8x6 => (8, 6),
            Self::B8x8 => (8, 8),
            Self::B10x5 => (10, 5),
            Self::B10x6 => (10, 6),
            Self::B10x8 => (10, 8),
            Self::B10x10 => (10, 10),
            Self::B12x10 => (12, 10),
            Self::B12x12 => (12, 12),
        }
    }
}

/// Application-facing pixel layout of texture data.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum PixelFormat {
    Invalid,
    A8,
    L8,
    La88,
    Rgb565,
    Bgr565,
    Rgba4444,
    Bgra4444,
    Rgba5551,
    Bgra5551,
    Rgb888,
    /// RGB with an unused fourth byte.
    Rgb8888,
    Bgr8888,
    #[default]
    Rgba8888,
    Bgra8888,
    DepthUnsignedInt,
    DepthFloat,
    DepthStencil,
    CompressedR11Eac,
    CompressedSignedR11Eac,
    CompressedRg11Eac,
    CompressedSignedRg11Eac,
    CompressedRgb8Etc2,
    CompressedSrgb8Etc2,
    CompressedRgb8Etc1,
    CompressedRgbPvrtc4bppv1,
    CompressedRgb8PunchthroughAlpha1Etc2,
    CompressedSrgb8PunchthroughAlpha1Etc2,
    CompressedRgba8Etc2Eac,
    CompressedSrgb8Alpha8Etc2Eac,
    CompressedRgbaAstc(AstcBlock),
    CompressedSrgb8Alpha8Astc(AstcBlock),
    Rgb16F,
    Rgb32F,
    R11G11B10F,
    ChrominanceU,
    ChrominanceV,
}

impl PixelFormat {
    /// Block-compressed formats are uploaded through the compressed entry points.
    pub fn is_compressed(self) -> bool {
        matches!(
            self,
            Self::CompressedR11Eac
                | Self::CompressedSignedR11Eac
                | Self::CompressedRg11Eac
                | Self::CompressedSignedRg11Eac
                | Self::CompressedRgb8Etc2
                | Self::CompressedSrgb8Etc2
                | Self::CompressedRgb8Etc1
                | Self::CompressedRgbPvrtc4bppv1
                | Self::CompressedRgb8PunchthroughAlpha1Etc2
                | Self::CompressedSrgb8PunchthroughAlpha1Etc2
                | Self::CompressedRgba8Etc2Eac
                | Self::CompressedSrgb8Alpha8Etc2Eac
                | Self::CompressedRgbaAstc(_)
                | Self::CompressedSrgb8Alpha8Astc(_)
        )
    }

    /// Formats storing floating-point channels.
    pub fn is_floating_point(self) -> bool {
        matches!(
            self,
            Self::Rgb16F | Self::Rgb32F | Self::R11G11B10F | Self::DepthFloat
        )
    }

    /// Whether the format carries an alpha channel.
    pub fn has_alpha(self) -> bool {
        matches!(
            self,
            Self::A8
                | Self::La88
                | Self::Rgba4444
                | Self::Bgra4444
                | Self::Rgba5551
                | Self::Bgra5551
                | Self::Rgba8888
                | Self::Bgra8888
                | Self::CompressedRgb8PunchthroughAlpha1Etc2
                | Self::CompressedSrgb8PunchthroughAlpha1Etc2
                | Self::CompressedRgba8Etc2Eac
                | Self::CompressedSrgb8Alpha8Etc2Eac
                | Self::CompressedRgbaAstc(_)
                | Self::CompressedSrgb8Alpha8Astc(_)
        )
    }

    /// Bytes per texel; `0` for compressed and invalid formats.
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::A8 | Self::L8 | Self::ChrominanceU | Self::ChrominanceV => 1,
            Self::La88
            | Self::Rgb565
            | Self::Bgr565
            | Self::Rgba4444
            | Self::Bgra4444
            | Self::Rgba5551
            | Self::Bgra5551
            | Self::DepthUnsignedInt => 2,
            Self::Rgb888 => 3,
            Self::Rgb8888
            | Self::Bgr8888
            | Self::Rgba8888
            | Self::Bgra8888
            | Self::DepthFloat
            | Self::DepthStencil
            | Self::R11G11B10F => 4,
            Self::Rgb16F => 6,
            Self::Rgb32F => 12,
            _ => 0,
        }
    }

    /// Depth or depth-stencil formats.
    pub fn is_depth(self) -> bool {
        matches!(
            self,
            Self::DepthUnsignedInt | Self::DepthFloat | Self::DepthStencil
        )
    }
}

/// Backend storage formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum GraphicsFormat {
    Undefined,
    R8Unorm,
    L8,
    L8A8,
    R5G6B5UnormPack16,
    B5G6R5UnormPack16,
    R4G4B4A4UnormPack16,
    B4G4R4A4UnormPack16,
    R5G5B5A1UnormPack16,
    B5G5R5A1UnormPack16,
    R8G8B8Unorm,
    R8G8B8A8Unorm,
    B8G8R8A8Unorm,
    D16Unorm,
    D32Sfloat,
    D24UnormS8Uint,
    EacR11UnormBlock,
    EacR11SnormBlock,
    EacR11G11UnormBlock,
    EacR11G11SnormBlock,
    Etc2R8G8B8UnormBlock,
    Etc2R8G8B8SrgbBlock,
    Etc2R8G8B8A1UnormBlock,
    Etc2R8G8B8A1SrgbBlock,
    Etc2R8G8B8A8UnormBlock,
    Etc2R8G8B8A8SrgbBlock,
    Pvrtc1_4bppUnormBlock,
    AstcUnormBlock(AstcBlock),
    AstcSrgbBlock(AstcBlock),
    R16G16B16Sfloat,
    R32G32B32Sfloat,
    R11G11B10UfloatPack32,
}

impl GraphicsFormat {
    /// Whether the backend expects compressed upload calls for this format.
    pub fn is_compressed(self) -> bool {
        matches!(
            self,
            Self::EacR11UnormBlock
                | Self::EacR11SnormBlock
                | Self::EacR11G11UnormBlock
                | Self::EacR11G11SnormBlock
                | Self::Etc2R8G8B8UnormBlock
                | Self::Etc2R8G8B8SrgbBlock
                | Self::Etc2R8G8B8A1UnormBlock
                | Self::Etc2R8G8B8A1SrgbBlock
                | Self::Etc2R8G8B8A8UnormBlock
                | Self::Etc2R8G8B8A8SrgbBlock
                | Self::Pvrtc1_4bppUnormBlock
                | Self::AstcUnormBlock(_)
                | Self::AstcSrgbBlock(_)
        )
    }
}

/// Map an application pixel format to the backend storage format.
///
/// RGB-with-padding formats share storage with their alpha counterparts; ETC1 is stored as ETC2
/// and chrominance planes as single-channel luminance.
pub fn convert_pixel_format(format: PixelFormat) -> GraphicsFormat {
    use GraphicsFormat as G;
    use PixelFormat as P;

    match format {
        P::Invalid => G::Undefined,
        P::A8 => G::R8Unorm,
        P::L8 | P::ChrominanceU | P::ChrominanceV => G::L8,
        P::La88 => G::L8A8,
        P::Rgb565 => G::R5G6B5UnormPack16,
        P::Bgr565 => G::B5G6R5UnormPack16,
        P::Rgba4444 => G::R4G4B4A4UnormPack16,
        P::Bgra4444 => G::B4G4R4A4UnormPack16,
        P::Rgba5551 => G::R5G5B5A1UnormPack16,
        P::Bgra5551 => G::B5G5R5A1UnormPack16,
        P::Rgb888 => G::R8G8B8Unorm,
        P::Rgb8888 | P::Rgba8888 => G::R8G8B8A8Unorm,
        P::Bgr8888 | P::Bgra8888 => G::B8G8R8A8Unorm,
        P::DepthUnsignedInt => G::D16Unorm,
        P::DepthFloat => G::D32Sfloat,
        P::DepthStencil => G::D24UnormS8Uint,
        P::CompressedR11Eac => G::EacR11UnormBlock,
        P::CompressedSignedR11Eac => G::EacR11SnormBlock,
        P::CompressedRg11Eac => G::EacR11G11UnormBlock,
        P::CompressedSignedRg11Eac => G::EacR11G11SnormBlock,
        P::CompressedRgb8Etc2 | P::CompressedRgb8Etc1 => G::Etc2R8G8B8UnormBlock,
        P::CompressedSrgb8Etc2 => G::Etc2R8G8B8SrgbBlock,
        P::CompressedRgb8PunchthroughAlpha1Etc2 => G::Etc2R8G8B8A1UnormBlock,
        P::CompressedSrgb8PunchthroughAlpha1Etc2 => G::Etc2R8G8B8A1SrgbBlock,
        P::CompressedRgba8Etc2Eac => G::Etc2R8G8B8A8UnormBlock,
        P::CompressedSrgb8Alpha8Etc2Eac => G::Etc2R8G8B8A8SrgbBlock,
        P::CompressedRgbPvrtc4bppv1 => G::Pvrtc1_4bppUnormBlock,
        P::CompressedRgbaAstc(block) => G::AstcUnormBlock(block),
        P::CompressedSrgb8Alpha8Astc(block) => G::AstcSrgbBlock(block),
        P::Rgb16F => G::R16G16B16Sfloat,
        P::Rgb32F => G::R32G32B32Sfloat,
        P::R11G11B10F => G::R11G11B10UfloatPack32,
    }
}

/// Texture dimensionality.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum TextureType {
    #[default]
    Texture2D,
    /// Six square faces addressed by layer 0..6.
    TextureCube,
}

impl TextureType {
    /// Number of layers (faces) the texture has.
    pub fn layer_count(self) -> u32 {
        match self {
            Self::Texture2D => 1,
            Self::TextureCube => 6,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/graphics/format.rs"]
mod tests;
