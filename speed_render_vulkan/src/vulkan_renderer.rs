/// VulkanRenderer - resource factory and queue operations of the Vulkan backend

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use speed_render::speed::{BackendFactory, Config, Error, Renderer, Result};
use speed_render::speed::render::{
    AttachmentDescription, BufferUsage, CommandBuffer, DeviceBuffer, Framebuffer, Pipeline, PipelineInfo,
    RenderPass, Semaphore, Shader, ShaderDesc, Swapchain, SwapchainInfo, Texture, TextureInfo, TextureLayout,
};
use speed_render::{engine_bail_warn, engine_error, engine_info, engine_trace, engine_warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::vulkan_command_buffer::VulkanCommandBuffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_device_buffer::VulkanDeviceBuffer;
use crate::vulkan_framebuffer::{as_vulkan_framebuffer, VulkanFramebuffer};
use crate::vulkan_pipeline::VulkanPipeline;
use crate::vulkan_render_pass::VulkanRenderPass;
use crate::vulkan_semaphore::VulkanSemaphore;
use crate::vulkan_shader::VulkanShader;
use crate::vulkan_swapchain::{as_vulkan_swapchain, VulkanSwapchain};
use crate::vulkan_texture::{as_vulkan_texture, VulkanTexture};
use crate::vulkan_tools::{ensure, vk_error};

/// Vulkan backend entry point
///
/// Creates every resource (`BackendFactory`) and drives the graphics queue
/// (`Renderer`).
pub struct VulkanRenderer {
    ctx: Arc<GpuContext>,
    /// Internal command buffers recording Present transitions
    transition_buffers: Mutex<Vec<VulkanCommandBuffer>>,
    /// Signaled by a batch touching swapchain images, awaited by the next present
    render_finished: vk::Semaphore,
    render_finished_pending: AtomicBool,
}

impl VulkanRenderer {
    /// Create a renderer without a window
    pub fn new_headless(config: Config) -> Result<Self> {
        Self::from_context(GpuContext::new_headless(config)?)
    }

    /// Create a renderer presenting to `window`
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: Config) -> Result<Self> {
        Self::from_context(GpuContext::new(window, config)?)
    }

    fn from_context(ctx: GpuContext) -> Result<Self> {
        let render_finished = unsafe {
            ctx.device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
                .map_err(|e| vk_error(e, "Failed to create render-finished semaphore"))?
        };

        engine_info!("speed::vulkan::Renderer", "Vulkan renderer ready ({})",
            if ctx.surface.is_some() { "windowed" } else { "headless" });

        Ok(Self {
            ctx: Arc::new(ctx),
            transition_buffers: Mutex::new(Vec::new()),
            render_finished,
            render_finished_pending: AtomicBool::new(false),
        })
    }

    /// Shared GPU context
    pub fn context(&self) -> &Arc<GpuContext> {
        &self.ctx
    }

    /// An idle internal command buffer, reused once its last submission completed
    fn take_transition_buffer(&self) -> Result<VulkanCommandBuffer> {
        let mut buffers = self.transition_buffers.lock().unwrap_or_else(PoisonError::into_inner);

        for index in 0..buffers.len() {
            let buffer = &buffers[index];
            if buffer.timeline.value()? >= buffer.last_submitted() {
                return Ok(buffers.swap_remove(index));
            }
        }

        VulkanCommandBuffer::new(Arc::clone(&self.ctx))
    }

    fn return_transition_buffer(&self, buffer: VulkanCommandBuffer) {
        self.transition_buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(buffer);
    }

    /// Record Present transitions for the swapchain images rendered by the batch
    fn record_present_transitions(&self, framebuffers: &[Arc<dyn Framebuffer>]) -> Result<VulkanCommandBuffer> {
        let mut cmd = self.take_transition_buffer()?;
        cmd.begin()?;

        for framebuffer in framebuffers {
            if let Some(texture) = framebuffer.attachments().first() {
                let texture = as_vulkan_texture(texture.as_ref())?;
                texture.transition_layout_range(&mut cmd, TextureLayout::Present, texture.subresource_range(), false)?;
            }
        }

        cmd.end()?;
        Ok(cmd)
    }
}

impl BackendFactory for VulkanRenderer {
    fn create_command_buffers(&self, count: usize) -> Result<Vec<Box<dyn CommandBuffer>>> {
        let mut buffers: Vec<Box<dyn CommandBuffer>> = Vec::with_capacity(count);
        for _ in 0..count {
            buffers.push(Box::new(VulkanCommandBuffer::new(Arc::clone(&self.ctx))?));
        }
        Ok(buffers)
    }

    fn create_device_buffer(&self, size: u64, usage: BufferUsage) -> Result<Arc<dyn DeviceBuffer>> {
        Ok(Arc::new(VulkanDeviceBuffer::new(Arc::clone(&self.ctx), size, usage)?))
    }

    fn create_texture(&self, info: TextureInfo) -> Result<Arc<dyn Texture>> {
        Ok(Arc::new(VulkanTexture::new(Arc::clone(&self.ctx), info)?))
    }

    fn create_render_pass(&self, attachments: &[AttachmentDescription]) -> Result<Arc<dyn RenderPass>> {
        Ok(Arc::new(VulkanRenderPass::new(Arc::clone(&self.ctx), attachments)?))
    }

    fn create_framebuffer(
        &self,
        width: u32,
        height: u32,
        attachments: Vec<Arc<dyn Texture>>,
        render_pass: &Arc<dyn RenderPass>,
    ) -> Result<Arc<dyn Framebuffer>> {
        Ok(Arc::new(VulkanFramebuffer::new(Arc::clone(&self.ctx), width, height, attachments, render_pass)?))
    }

    fn create_shader(&self, desc: ShaderDesc<'_>) -> Result<Arc<dyn Shader>> {
        Ok(Arc::new(VulkanShader::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_pipeline(&self, info: PipelineInfo, render_pass: &Arc<dyn RenderPass>) -> Result<Arc<dyn Pipeline>> {
        Ok(Arc::new(VulkanPipeline::new(Arc::clone(&self.ctx), info, render_pass)?))
    }

    fn create_swapchain(&self, info: SwapchainInfo, render_pass: &Arc<dyn RenderPass>) -> Result<Box<dyn Swapchain>> {
        let mut swapchain = VulkanSwapchain::new(Arc::clone(&self.ctx), info, render_pass)?;
        swapchain.create()?;
        Ok(Box::new(swapchain))
    }

    fn create_semaphore(&self, initial_value: u64) -> Result<Arc<dyn Semaphore>> {
        Ok(Arc::new(VulkanSemaphore::new(Arc::clone(&self.ctx), initial_value)?))
    }
}

impl Renderer for VulkanRenderer {
    fn submit(&self, command_buffers: &mut [&mut dyn CommandBuffer]) -> Result<()> {
        let mut buffers = Vec::with_capacity(command_buffers.len());
        for cmd in command_buffers.iter_mut() {
            let cmd = VulkanCommandBuffer::downcast_mut(&mut **cmd)?;
            cmd.require_executable()?;
            buffers.push(cmd);
        }

        if buffers.is_empty() {
            return Ok(());
        }

        let mut presentation: Vec<Arc<dyn Framebuffer>> = Vec::new();
        for cmd in &buffers {
            for framebuffer in cmd.used_framebuffers() {
                let is_presentation = as_vulkan_framebuffer(framebuffer.as_ref())?.is_presentation();
                if is_presentation && !presentation.iter().any(|seen| Arc::ptr_eq(seen, framebuffer)) {
                    presentation.push(Arc::clone(framebuffer));
                }
            }
        }

        let mut transitions = if presentation.is_empty() {
            None
        } else {
            Some(self.record_present_transitions(&presentation)?)
        };

        let mut handles = Vec::with_capacity(buffers.len() + 1);
        let mut signal_semaphores = Vec::with_capacity(buffers.len() + 2);
        let mut signal_values = Vec::with_capacity(buffers.len() + 2);

        for cmd in buffers.iter().map(|cmd| &**cmd).chain(transitions.as_ref()) {
            handles.push(cmd.command_buffer);
            signal_semaphores.push(cmd.timeline.semaphore);
            signal_values.push(cmd.next_submit_value());
        }

        // Binary semaphores ignore their value
        let signal_render_finished = transitions.is_some()
            && !self.render_finished_pending.swap(true, Ordering::AcqRel);
        if signal_render_finished {
            signal_semaphores.push(self.render_finished);
            signal_values.push(0);
        }

        let mut timeline_info = vk::TimelineSemaphoreSubmitInfo::default()
            .signal_semaphore_values(&signal_values);
        let submit_info = vk::SubmitInfo::default()
            .command_buffers(&handles)
            .signal_semaphores(&signal_semaphores)
            .push_next(&mut timeline_info);

        let submitted = unsafe {
            self.ctx.device.queue_submit(self.ctx.graphics_queue, std::slice::from_ref(&submit_info), vk::Fence::null())
        };

        if let Err(e) = submitted {
            if signal_render_finished {
                self.render_finished_pending.store(false, Ordering::Release);
            }
            if let Some(cmd) = transitions.take() {
                self.return_transition_buffer(cmd);
            }
            return Err(vk_error(e, "Failed to submit command buffers"));
        }

        for cmd in buffers.iter_mut() {
            let value = cmd.next_submit_value();
            cmd.mark_submitted(value);
        }
        if let Some(mut cmd) = transitions {
            let value = cmd.next_submit_value();
            cmd.mark_submitted(value);
            self.return_transition_buffer(cmd);
        }

        engine_trace!("speed::vulkan::Renderer", "Submitted {} command buffer(s), {} presentation target(s)",
            buffers.len(), presentation.len());
        Ok(())
    }

    fn present(&self, swapchains: &[&dyn Swapchain]) -> Result<()> {
        if swapchains.is_empty() {
            return Ok(());
        }
        let loader = self.ctx.swapchain_loader()?;

        let mut handles = Vec::with_capacity(swapchains.len());
        let mut indices = Vec::with_capacity(swapchains.len());
        for swapchain in swapchains {
            let vk_swapchain = as_vulkan_swapchain(*swapchain)?;
            if !vk_swapchain.is_active() {
                engine_bail_warn!("speed::vulkan::Renderer", InvalidOperation,
                    "Cannot present an inactive swapchain");
            }
            handles.push(vk_swapchain.handle());
            indices.push(vk_swapchain.current_image());
        }

        let wait_semaphores = if self.render_finished_pending.swap(false, Ordering::AcqRel) {
            vec![self.render_finished]
        } else {
            Vec::new()
        };

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&handles)
            .image_indices(&indices);

        match unsafe { loader.queue_present(self.ctx.present_queue, &present_info) } {
            Ok(false) => Ok(()),
            Ok(true) => {
                engine_warn!("speed::vulkan::Renderer", "Presented to a suboptimal swapchain");
                Ok(())
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                engine_warn!("speed::vulkan::Renderer", "Presented to an out of date swapchain, resize required");
                Ok(())
            }
            Err(e) => ensure(e, "Failed to present"),
        }
    }

    fn wait_for_end(&self, command_buffers: &mut [&mut dyn CommandBuffer]) -> Result<()> {
        let mut buffers = Vec::with_capacity(command_buffers.len());
        let mut semaphores = Vec::with_capacity(command_buffers.len());
        let mut values = Vec::with_capacity(command_buffers.len());

        for cmd in command_buffers.iter_mut() {
            let cmd = VulkanCommandBuffer::downcast_mut(&mut **cmd)?;
            if cmd.last_submitted() > 0 {
                semaphores.push(cmd.timeline.semaphore);
                values.push(cmd.last_submitted());
            }
            buffers.push(cmd);
        }

        if !semaphores.is_empty() {
            let wait_info = vk::SemaphoreWaitInfo::default()
                .semaphores(&semaphores)
                .values(&values);
            let timeout = self.ctx.config.wait_for_end_timeout;
            let timeout_ns = u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX);

            match unsafe { self.ctx.device.wait_semaphores(&wait_info, timeout_ns) } {
                Ok(()) => {}
                Err(vk::Result::TIMEOUT) => {
                    let message = format!("Command buffers did not complete within {:?}", timeout);
                    engine_error!("speed::vulkan::Renderer", "{}", message);
                    return Err(Error::Timeout(message));
                }
                Err(e) => return Err(vk_error(e, "Failed to wait for command buffers")),
            }
        }

        for cmd in buffers {
            cmd.retire_completed()?;
        }
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        self.ctx.wait_idle()
    }
}

impl Drop for VulkanRenderer {
    fn drop(&mut self) {
        self.ctx.wait_idle().ok();
        self.transition_buffers
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        unsafe {
            self.ctx.device.destroy_semaphore(self.render_finished, None);
        }
    }
}
