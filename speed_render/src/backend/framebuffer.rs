/// Framebuffer trait

use std::any::Any;
use std::sync::Arc;
use crate::backend::render_pass::RenderPass;
use crate::backend::texture::Texture;

/// Concrete set of attachments a render pass writes into
pub trait Framebuffer: Send + Sync {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Attachments, in render pass attachment order
    fn attachments(&self) -> &[Arc<dyn Texture>];

    /// Render pass this framebuffer was created for
    fn render_pass(&self) -> &Arc<dyn RenderPass>;

    /// Index of the first attachment with a color format
    fn first_color_attachment(&self) -> Option<usize> {
        self.attachments()
            .iter()
            .position(|texture| !texture.info().format.is_depth())
    }

    /// Downcast support for backend checks
    fn as_any(&self) -> &dyn Any;
}
