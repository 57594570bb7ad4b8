/// Framebuffer - Vulkan implementation of the Framebuffer trait

use ash::vk;
use speed_render::speed::Result;
use speed_render::speed::render::{Framebuffer, RenderPass, Texture};
use speed_render::{engine_bail_warn, engine_warn_err};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_render_pass::as_vulkan_render_pass;
use crate::vulkan_texture::as_vulkan_texture;
use crate::vulkan_tools::vk_error;

/// Vulkan framebuffer over materialized attachments
pub struct VulkanFramebuffer {
    ctx: Arc<GpuContext>,
    pub(crate) framebuffer: vk::Framebuffer,
    render_pass_handle: vk::RenderPass,
    width: u32,
    height: u32,
    attachments: Vec<Arc<dyn Texture>>,
    render_pass: Arc<dyn RenderPass>,
}

impl VulkanFramebuffer {
    /// Create a framebuffer
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` - zero extent, attachment count or format differs
    ///   from the render pass, or an attachment smaller than the extent
    /// * `InvalidResource` - an attachment is not materialized
    /// * `BackendMismatch` - an attachment or the render pass is not a Vulkan object
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        width: u32,
        height: u32,
        attachments: Vec<Arc<dyn Texture>>,
        render_pass: &Arc<dyn RenderPass>,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            engine_bail_warn!("speed::vulkan::Framebuffer", InvalidArgument,
                "Framebuffer extent must be non-zero ({}x{})", width, height);
        }

        let vk_render_pass = as_vulkan_render_pass(render_pass.as_ref())?;
        let descriptions = vk_render_pass.attachments();
        if descriptions.len() != attachments.len() {
            engine_bail_warn!("speed::vulkan::Framebuffer", InvalidArgument,
                "Render pass expects {} attachments, got {}", descriptions.len(), attachments.len());
        }

        let mut views = Vec::with_capacity(attachments.len());
        for (index, (texture, description)) in attachments.iter().zip(descriptions).enumerate() {
            let info = texture.info();
            if info.format != description.format {
                engine_bail_warn!("speed::vulkan::Framebuffer", InvalidArgument,
                    "Attachment {} has format {:?}, render pass expects {:?}",
                    index, info.format, description.format);
            }
            if info.width < width || info.height < height {
                engine_bail_warn!("speed::vulkan::Framebuffer", InvalidArgument,
                    "Attachment {} ({}x{}) is smaller than the framebuffer ({}x{})",
                    index, info.width, info.height, width, height);
            }
            views.push(as_vulkan_texture(texture.as_ref())?.view()?);
        }

        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(vk_render_pass.render_pass)
            .attachments(&views)
            .width(width)
            .height(height)
            .layers(1);

        let framebuffer = unsafe {
            ctx.device.create_framebuffer(&create_info, None)
                .map_err(|e| vk_error(e, "Failed to create framebuffer"))?
        };

        Ok(Self {
            ctx,
            framebuffer,
            render_pass_handle: vk_render_pass.render_pass,
            width,
            height,
            attachments,
            render_pass: Arc::clone(render_pass),
        })
    }

    pub(crate) fn render_pass_handle(&self) -> vk::RenderPass {
        self.render_pass_handle
    }

    /// Returns true if the first attachment is a swapchain image
    pub(crate) fn is_presentation(&self) -> bool {
        self.attachments
            .first()
            .and_then(|texture| as_vulkan_texture(texture.as_ref()).ok())
            .is_some_and(|texture| texture.is_presentation())
    }
}

impl Framebuffer for VulkanFramebuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn attachments(&self) -> &[Arc<dyn Texture>] {
        &self.attachments
    }

    fn render_pass(&self) -> &Arc<dyn RenderPass> {
        &self.render_pass
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanFramebuffer {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}

/// Downcast a shared framebuffer to the Vulkan implementation
pub(crate) fn as_vulkan_framebuffer(framebuffer: &dyn Framebuffer) -> Result<&VulkanFramebuffer> {
    match framebuffer.as_any().downcast_ref::<VulkanFramebuffer>() {
        Some(framebuffer) => Ok(framebuffer),
        None => Err(engine_warn_err!("speed::vulkan::Framebuffer", BackendMismatch,
            "Framebuffer does not belong to the Vulkan backend")),
    }
}
