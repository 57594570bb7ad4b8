/// RenderPass trait and attachment descriptions

use std::any::Any;
use glam::Vec4;
use crate::backend::command_buffer::CommandBuffer;
use crate::backend::texture::{TextureFormat, TextureLayout};
use crate::error::Result;

/// What happens to an attachment's contents when the pass begins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadOp {
    /// Keep previous contents (e.g. after `clear_background`)
    #[default]
    Load,
    /// Clear with the value passed to `RenderPass::begin`
    Clear,
    /// Contents are undefined
    DontCare,
}

/// Description of one render pass attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentDescription {
    pub format: TextureFormat,
    pub samples: u32,
    pub load_op: LoadOp,
    /// Layout committed to the attachment when the pass ends
    pub final_layout: TextureLayout,
}

impl AttachmentDescription {
    /// Single-sample attachment that keeps its contents
    ///
    /// Color attachments end in Present, depth attachments stay in DepthStencilAttachment.
    pub fn new(format: TextureFormat) -> Self {
        let final_layout = if format.is_depth() {
            TextureLayout::DepthStencilAttachment
        } else {
            TextureLayout::Present
        };

        Self {
            format,
            samples: 1,
            load_op: LoadOp::Load,
            final_layout,
        }
    }

    /// Returns true for depth/stencil attachments
    pub fn is_depth(&self) -> bool {
        self.format.is_depth()
    }

    /// Layout the attachment is in while the pass runs
    pub fn attachment_layout(&self) -> TextureLayout {
        if self.is_depth() {
            TextureLayout::DepthStencilAttachment
        } else {
            TextureLayout::ColorAttachment
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=0x7F).contains(&self.samples) {
            crate::engine_bail_warn!("speed::RenderPass", InvalidArgument,
                "Number of attachment samples is out of range: {}", self.samples);
        }
        if matches!(self.final_layout, TextureLayout::Undefined) {
            crate::engine_bail_warn!("speed::RenderPass", InvalidArgument,
                "Attachment final layout cannot be Undefined");
        }
        Ok(())
    }
}

/// Clear value for one attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color(Vec4),
    DepthStencil { depth: f32, stencil: u32 },
}

/// Render pass resource trait
pub trait RenderPass: Send + Sync {
    /// Attachment descriptions, in attachment order
    fn attachments(&self) -> &[AttachmentDescription];

    /// Begin the pass over the command buffer's bound framebuffer
    ///
    /// Attachments are transitioned into their attachment layouts first, and
    /// the command buffer's render size is set to the framebuffer extent.
    ///
    /// # Arguments
    ///
    /// * `cmd` - Recording command buffer with a framebuffer of this pass bound
    /// * `clear_values` - One value per attachment using `LoadOp::Clear` (may be empty otherwise)
    fn begin(&self, cmd: &mut dyn CommandBuffer, clear_values: &[ClearValue]) -> Result<()>;

    /// End the pass and commit each attachment's final layout
    fn end(&self, cmd: &mut dyn CommandBuffer) -> Result<()>;

    /// Downcast support for backend checks
    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
#[path = "render_pass_tests.rs"]
mod tests;
