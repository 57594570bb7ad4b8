/// Texture trait, texture info and the semantic layout model

use std::any::Any;
use crate::backend::command_buffer::CommandBuffer;
use crate::error::Result;

/// Texture pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum TextureFormat {
    R8_UNORM,
    R8G8_UNORM,
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    B8G8R8A8_UNORM,
    B8G8R8A8_SRGB,
    R16G16B16A16_SFLOAT,
    R32_UINT,
    R32_SFLOAT,
    R32G32B32A32_SFLOAT,

    // Depth/stencil formats
    D16_UNORM,
    D32_FLOAT,
    D24_UNORM_S8_UINT,
    D32_FLOAT_S8_UINT,

    // Block-compressed formats
    BC1_RGBA_UNORM,
    BC3_UNORM,
    BC7_UNORM,
}

impl TextureFormat {
    /// Size of one texel in bytes, `None` for block-compressed formats
    pub fn bytes_per_pixel(self) -> Option<u32> {
        match self {
            TextureFormat::R8_UNORM => Some(1),
            TextureFormat::R8G8_UNORM | TextureFormat::D16_UNORM => Some(2),
            TextureFormat::R8G8B8A8_UNORM
            | TextureFormat::R8G8B8A8_SRGB
            | TextureFormat::B8G8R8A8_UNORM
            | TextureFormat::B8G8R8A8_SRGB
            | TextureFormat::R32_UINT
            | TextureFormat::R32_SFLOAT
            | TextureFormat::D32_FLOAT
            | TextureFormat::D24_UNORM_S8_UINT => Some(4),
            TextureFormat::R16G16B16A16_SFLOAT | TextureFormat::D32_FLOAT_S8_UINT => Some(8),
            TextureFormat::R32G32B32A32_SFLOAT => Some(16),
            TextureFormat::BC1_RGBA_UNORM
            | TextureFormat::BC3_UNORM
            | TextureFormat::BC7_UNORM => None,
        }
    }

    /// Returns true for formats carrying a depth component
    pub fn is_depth(self) -> bool {
        matches!(
            self,
            TextureFormat::D16_UNORM
                | TextureFormat::D32_FLOAT
                | TextureFormat::D24_UNORM_S8_UINT
                | TextureFormat::D32_FLOAT_S8_UINT
        )
    }

    /// Returns true for formats carrying a stencil component
    pub fn has_stencil(self) -> bool {
        matches!(
            self,
            TextureFormat::D24_UNORM_S8_UINT | TextureFormat::D32_FLOAT_S8_UINT
        )
    }

    /// Returns true for block-compressed formats
    pub fn is_compressed(self) -> bool {
        self.bytes_per_pixel().is_none()
    }
}

/// How a texture is used by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureUsage {
    /// Sampled from shaders
    Sampled,
    /// Read/written as a storage image
    Storage,
    /// Rendered into as a color attachment
    ColorAttachment,
    /// Rendered into as a depth/stencil attachment
    DepthStencilAttachment,
    /// Read as a subpass input attachment
    InputAttachment,
}

/// Semantic layout of a texture's memory
///
/// The native layout, access mask and pipeline stage are derived from it
/// through fixed lookup tables owned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureLayout {
    /// Contents undefined (fresh image, or contents may be discarded)
    Undefined,
    /// Usable for any operation, at reduced performance
    General,
    /// Ready to be rendered into as a color attachment
    ColorAttachment,
    /// Ready to be rendered into as a depth/stencil attachment
    DepthStencilAttachment,
    /// Ready to be read by transfer operations
    TransferSource,
    /// Ready to be written by transfer operations (copies, clears)
    TransferDestination,
    /// Ready for the presentation engine
    Present,
}

impl TextureLayout {
    /// Every semantic layout, in declaration order
    pub const ALL: [TextureLayout; 7] = [
        TextureLayout::Undefined,
        TextureLayout::General,
        TextureLayout::ColorAttachment,
        TextureLayout::DepthStencilAttachment,
        TextureLayout::TransferSource,
        TextureLayout::TransferDestination,
        TextureLayout::Present,
    ];
}

/// Memory tiling of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTiling {
    Optimal,
    Linear,
}

/// Declarative description of a texture
#[derive(Debug, Clone, PartialEq)]
pub struct TextureInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Number of mip levels (at least 1)
    pub mip_levels: u32,
    /// Samples per pixel (1 = no multisampling)
    pub samples: u32,
    /// Pixel format
    pub format: TextureFormat,
    /// Memory tiling
    pub tiling: TextureTiling,
    /// Usage kind
    pub usage: TextureUsage,
    /// Layout the image is created in
    pub layout: TextureLayout,
}

impl TextureInfo {
    /// Single-mip, single-sample, optimally tiled texture starting in Undefined layout
    pub fn new(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            width,
            height,
            mip_levels: 1,
            samples: 1,
            format,
            tiling: TextureTiling::Optimal,
            usage,
            layout: TextureLayout::Undefined,
        }
    }
}

/// 2D sub-rectangle of a texture, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TextureRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// The whole base mip level of a texture
    pub fn full(info: &TextureInfo) -> Self {
        Self::new(0, 0, info.width, info.height)
    }
}

// ===== TEXTURE TRAIT =====

/// Texture resource trait
///
/// Implemented by backend-specific texture types. Textures returned by the
/// factory are unmaterialized until `create_image` is called; swapchain
/// textures are materialized from the start.
pub trait Texture: Send + Sync {
    /// Get the declarative properties of this texture
    fn info(&self) -> &TextureInfo;

    /// Current semantic layout
    fn layout(&self) -> TextureLayout;

    /// Returns true once the native image and view exist
    fn is_loaded(&self) -> bool;

    /// Allocate the native image and view. Idempotent.
    fn create_image(&self) -> Result<()>;

    /// Record a layout transition covering every mip level
    ///
    /// # Returns
    ///
    /// * `Ok(false)` - `cmd` is not recording, nothing was recorded
    /// * `Ok(true)` - the texture is now in `new_layout` (no barrier if it already was)
    ///
    /// # Errors
    ///
    /// `InvalidResource` if the texture is not materialized
    fn transition_layout(&self, cmd: &mut dyn CommandBuffer, new_layout: TextureLayout) -> Result<bool>;

    /// Same as `transition_layout` but discards the current contents
    /// (the barrier's source layout is treated as Undefined). Nothing is
    /// recorded when the texture is already in `new_layout`.
    fn force_transition_layout(&self, cmd: &mut dyn CommandBuffer, new_layout: TextureLayout) -> Result<bool>;

    /// Downcast support for backend checks
    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
#[path = "texture_tests.rs"]
mod tests;
