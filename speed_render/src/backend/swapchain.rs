/// Swapchain trait, creation info and extent/image-count selection

use std::any::Any;
use std::sync::Arc;
use glam::UVec2;
use crate::backend::framebuffer::Framebuffer;
use crate::backend::texture::TextureFormat;
use crate::error::Result;

/// Presentation mode
///
/// `Fifo` is always available; other modes fall back to it when the
/// surface does not support them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresentMode {
    /// Vsync, queue of pending images
    #[default]
    Fifo,
    /// Vsync, newest image replaces the pending one
    Mailbox,
    /// No vsync, may tear
    Immediate,
}

/// Swapchain creation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainInfo {
    /// Requested width in pixels
    pub width: u32,
    /// Requested height in pixels
    pub height: u32,
    /// Requested pixel format (falls back to the first surface format if unsupported)
    pub format: TextureFormat,
    /// Minimum number of images
    pub required_images: u32,
    /// Preferred presentation mode
    pub present_mode: PresentMode,
}

impl SwapchainInfo {
    /// Double-buffered B8G8R8A8_SRGB swapchain
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: TextureFormat::B8G8R8A8_SRGB,
            required_images: 2,
            present_mode: PresentMode::Fifo,
        }
    }
}

/// Pick the swapchain extent
///
/// # Arguments
///
/// * `requested` - Size asked for by the caller
/// * `current` - Surface's current extent, `None` when the surface lets the swapchain decide
/// * `min` - Smallest supported extent
/// * `max` - Largest supported extent
pub fn choose_extent(requested: UVec2, current: Option<UVec2>, min: UVec2, max: UVec2) -> UVec2 {
    match current {
        Some(current) => current,
        None => requested.clamp(min, max.max(min)),
    }
}

/// Pick the number of swapchain images
///
/// At least `required` and at least the surface minimum, capped by the
/// surface maximum when it is non-zero (zero means unbounded).
pub fn choose_image_count(required: u32, min: u32, max: u32) -> u32 {
    let count = required.max(min);
    if max > 0 {
        count.min(max)
    } else {
        count
    }
}

/// Swapchain trait
///
/// NoSwapchain -> Active through `create`; `resize` collapses back to
/// NoSwapchain and recreates. Each image is exposed as a framebuffer over a
/// presentation-owned texture.
pub trait Swapchain: Send + Sync {
    /// Create the native swapchain and its framebuffers
    ///
    /// # Errors
    ///
    /// `InvalidOperation` if a native swapchain is already live
    fn create(&mut self) -> Result<()>;

    /// Destroy framebuffers, views and the native swapchain. No-op when inactive.
    fn destroy(&mut self);

    /// Returns true while a native swapchain is live
    fn is_active(&self) -> bool;

    /// Acquire the next image
    ///
    /// # Returns
    ///
    /// * `Ok(Some(framebuffer))` - the framebuffer of the acquired image
    /// * `Ok(None)` - the acquire timed out; the caller may retry
    fn next_image(&mut self) -> Result<Option<Arc<dyn Framebuffer>>>;

    /// Recreate the swapchain for a new window size
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;

    /// Index of the last acquired image
    fn current_image(&self) -> u32;

    fn image_count(&self) -> u32;

    /// One framebuffer per swapchain image, indexed by image index
    fn framebuffers(&self) -> &[Arc<dyn Framebuffer>];

    /// Actual extent width
    fn width(&self) -> u32;

    /// Actual extent height
    fn height(&self) -> u32;

    /// Actual pixel format
    fn format(&self) -> TextureFormat;

    /// Downcast support for backend checks
    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
#[path = "swapchain_tests.rs"]
mod tests;
