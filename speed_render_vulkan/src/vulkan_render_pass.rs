/// RenderPass - Vulkan implementation of the RenderPass trait

use ash::vk;
use speed_render::glam::UVec2;
use speed_render::speed::Result;
use speed_render::speed::render::{
    AttachmentDescription, ClearValue, CommandBuffer, Framebuffer, LoadOp, RenderPass,
};
use speed_render::{engine_bail_warn, engine_warn_err};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_command_buffer::VulkanCommandBuffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_framebuffer::as_vulkan_framebuffer;
use crate::vulkan_texture::as_vulkan_texture;
use crate::vulkan_tools::{layout_to_vk, load_op_to_vk, sample_count_to_vk, texture_format_to_vk, vk_error};

/// Vulkan render pass with a single subpass
pub struct VulkanRenderPass {
    ctx: Arc<GpuContext>,
    pub(crate) render_pass: vk::RenderPass,
    attachments: Vec<AttachmentDescription>,
}

impl VulkanRenderPass {
    /// Create a render pass from ordered attachment descriptions
    ///
    /// Color attachments are referenced in order; the first depth attachment
    /// becomes the depth/stencil attachment of the subpass.
    pub(crate) fn new(ctx: Arc<GpuContext>, attachments: &[AttachmentDescription]) -> Result<Self> {
        if attachments.is_empty() {
            engine_bail_warn!("speed::vulkan::RenderPass", InvalidArgument,
                "Render pass requires at least one attachment");
        }

        let mut descriptions = Vec::with_capacity(attachments.len());
        let mut color_refs = Vec::new();
        let mut depth_ref = None;

        for (index, attachment) in attachments.iter().enumerate() {
            attachment.validate()?;

            let load_op = load_op_to_vk(attachment.load_op);
            let stencil_load_op = if attachment.format.has_stencil() {
                load_op
            } else {
                vk::AttachmentLoadOp::DONT_CARE
            };
            let attachment_layout = layout_to_vk(attachment.attachment_layout());

            descriptions.push(vk::AttachmentDescription::default()
                .format(texture_format_to_vk(attachment.format))
                .samples(sample_count_to_vk(attachment.samples)?)
                .load_op(load_op)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(stencil_load_op)
                .stencil_store_op(vk::AttachmentStoreOp::STORE)
                .initial_layout(attachment_layout)
                .final_layout(layout_to_vk(attachment.final_layout)));

            let reference = vk::AttachmentReference::default()
                .attachment(index as u32)
                .layout(attachment_layout);

            if attachment.is_depth() {
                if depth_ref.is_none() {
                    depth_ref = Some(reference);
                }
            } else {
                color_refs.push(reference);
            }
        }

        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);

        if let Some(depth_ref) = &depth_ref {
            subpass = subpass.depth_stencil_attachment(depth_ref);
        }

        let (stage, access) = if depth_ref.is_some() {
            (
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            )
        } else {
            (vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT, vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
        };

        let dependency = vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(stage)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(stage)
            .dst_access_mask(access);

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&descriptions)
            .subpasses(std::slice::from_ref(&subpass))
            .dependencies(std::slice::from_ref(&dependency));

        let render_pass = unsafe {
            ctx.device.create_render_pass(&create_info, None)
                .map_err(|e| vk_error(e, "Failed to create render pass"))?
        };

        Ok(Self {
            ctx,
            render_pass,
            attachments: attachments.to_vec(),
        })
    }

    /// One native clear value per attachment
    fn clear_values(&self, clear_values: &[ClearValue]) -> Result<Vec<vk::ClearValue>> {
        let mut provided = clear_values.iter();
        let mut native = Vec::with_capacity(self.attachments.len());

        for (index, attachment) in self.attachments.iter().enumerate() {
            if attachment.load_op != LoadOp::Clear {
                native.push(vk::ClearValue::default());
                continue;
            }

            let value = match (provided.next(), attachment.is_depth()) {
                (Some(ClearValue::Color(color)), false) => vk::ClearValue {
                    color: vk::ClearColorValue { float32: color.to_array() },
                },
                (Some(ClearValue::DepthStencil { depth, stencil }), true) => vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue { depth: *depth, stencil: *stencil },
                },
                (Some(_), _) => engine_bail_warn!("speed::vulkan::RenderPass", InvalidArgument,
                    "Clear value kind does not match attachment {} ({:?})", index, attachment.format),
                (None, _) => engine_bail_warn!("speed::vulkan::RenderPass", InvalidArgument,
                    "Missing clear value for attachment {}", index),
            };
            native.push(value);
        }

        if provided.next().is_some() {
            engine_bail_warn!("speed::vulkan::RenderPass", InvalidArgument,
                "More clear values than cleared attachments");
        }

        Ok(native)
    }

    /// Bound framebuffer of `cmd`, which must have been created for this pass
    fn target(&self, cmd: &VulkanCommandBuffer, operation: &str) -> Result<Arc<dyn Framebuffer>> {
        let Some(framebuffer) = cmd.framebuffer() else {
            engine_bail_warn!("speed::vulkan::RenderPass", InvalidOperation,
                "{}: no framebuffer is bound", operation);
        };

        let target = as_vulkan_framebuffer(framebuffer.as_ref())?;
        if target.render_pass_handle() != self.render_pass {
            engine_bail_warn!("speed::vulkan::RenderPass", InvalidArgument,
                "{}: the bound framebuffer was created for another render pass", operation);
        }

        Ok(Arc::clone(framebuffer))
    }
}

impl RenderPass for VulkanRenderPass {
    fn attachments(&self) -> &[AttachmentDescription] {
        &self.attachments
    }

    fn begin(&self, cmd: &mut dyn CommandBuffer, clear_values: &[ClearValue]) -> Result<()> {
        let cmd = VulkanCommandBuffer::downcast_mut(cmd)?;
        cmd.require_recording("begin_render_pass")?;
        let framebuffer = self.target(cmd, "begin_render_pass")?;
        let native_clear_values = self.clear_values(clear_values)?;

        for (description, texture) in self.attachments.iter().zip(framebuffer.attachments()) {
            let texture = as_vulkan_texture(texture.as_ref())?;
            texture.transition_layout_range(cmd, description.attachment_layout(), texture.subresource_range(), false)?;
        }

        let extent = vk::Extent2D {
            width: framebuffer.width(),
            height: framebuffer.height(),
        };
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.render_pass)
            .framebuffer(as_vulkan_framebuffer(framebuffer.as_ref())?.framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&native_clear_values);

        cmd.record_begin_render_pass(&begin_info);
        cmd.set_render_size(Some(UVec2::new(extent.width, extent.height)))
    }

    fn end(&self, cmd: &mut dyn CommandBuffer) -> Result<()> {
        let cmd = VulkanCommandBuffer::downcast_mut(cmd)?;
        cmd.require_recording("end_render_pass")?;
        let framebuffer = self.target(cmd, "end_render_pass")?;

        cmd.record_end_render_pass();

        for (description, texture) in self.attachments.iter().zip(framebuffer.attachments()) {
            as_vulkan_texture(texture.as_ref())?.set_layout(description.final_layout);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanRenderPass {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

/// Downcast a shared render pass to the Vulkan implementation
pub(crate) fn as_vulkan_render_pass(render_pass: &dyn RenderPass) -> Result<&VulkanRenderPass> {
    match render_pass.as_any().downcast_ref::<VulkanRenderPass>() {
        Some(render_pass) => Ok(render_pass),
        None => Err(engine_warn_err!("speed::vulkan::RenderPass", BackendMismatch,
            "Render pass does not belong to the Vulkan backend")),
    }
}
