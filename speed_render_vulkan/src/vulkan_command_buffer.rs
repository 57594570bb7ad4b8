/// CommandBuffer - Vulkan implementation of the CommandBuffer trait
///
/// Each command buffer owns its pool, its timeline semaphore and the dispose
/// queue of the staging buffers its transfers allocated.

use ash::vk;
use speed_render::glam::{UVec2, Vec4};
use speed_render::speed::Result;
use speed_render::speed::render::{
    BufferRange, BufferUsage, CommandBuffer, DeviceBuffer, DisposeQueue, Framebuffer, IndexType,
    Pipeline, PipelineType, RecordingState, Semaphore, Texture, TextureLayout, TextureRegion, TextureUsage,
    Viewport,
};
use speed_render::{engine_bail_warn, engine_trace, engine_warn, engine_warn_err};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_barrier::{BufferBarrier, LayoutTransition};
use crate::vulkan_context::GpuContext;
use crate::vulkan_device_buffer::{as_vulkan_buffer, VulkanDeviceBuffer};
use crate::vulkan_framebuffer::as_vulkan_framebuffer;
use crate::vulkan_pipeline::as_vulkan_pipeline;
use crate::vulkan_semaphore::VulkanSemaphore;
use crate::vulkan_texture::as_vulkan_texture;
use crate::vulkan_tools::{index_type_to_vk, vk_error};

/// Vulkan command buffer implementation
pub struct VulkanCommandBuffer {
    pub(crate) ctx: Arc<GpuContext>,
    pool: vk::CommandPool,
    pub(crate) command_buffer: vk::CommandBuffer,
    state: RecordingState,
    framebuffer: Option<Arc<dyn Framebuffer>>,
    /// Every framebuffer bound during the current recording
    used_framebuffers: Vec<Arc<dyn Framebuffer>>,
    pipeline: Option<Arc<dyn Pipeline>>,
    /// Signaled with `last_submitted` when the last submission completes
    pub(crate) timeline: VulkanSemaphore,
    last_submitted: u64,
    /// Staging buffers waiting for their submission to complete
    disposals: DisposeQueue<VulkanDeviceBuffer>,
    commands: u64,
}

impl VulkanCommandBuffer {
    /// Create an idle command buffer with its own pool on the graphics queue family
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        unsafe {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(ctx.graphics_queue_family)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

            let pool = ctx.device.create_command_pool(&pool_info, None)
                .map_err(|e| vk_error(e, "Failed to create command pool"))?;

            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            let command_buffer = match ctx.device.allocate_command_buffers(&allocate_info) {
                Ok(buffers) => buffers[0],
                Err(e) => {
                    ctx.device.destroy_command_pool(pool, None);
                    return Err(vk_error(e, "Failed to allocate command buffer"));
                }
            };

            let timeline = match VulkanSemaphore::new(Arc::clone(&ctx), 0) {
                Ok(timeline) => timeline,
                Err(e) => {
                    ctx.device.destroy_command_pool(pool, None);
                    return Err(e);
                }
            };

            Ok(Self {
                ctx,
                pool,
                command_buffer,
                state: RecordingState::new(),
                framebuffer: None,
                used_framebuffers: Vec::new(),
                pipeline: None,
                timeline,
                last_submitted: 0,
                disposals: DisposeQueue::new(),
                commands: 0,
            })
        }
    }

    /// Downcast a command buffer to the Vulkan implementation
    pub(crate) fn downcast_mut(cmd: &mut dyn CommandBuffer) -> Result<&mut Self> {
        match cmd.as_any_mut().downcast_mut::<Self>() {
            Some(cmd) => Ok(cmd),
            None => Err(engine_warn_err!("speed::vulkan::CommandBuffer", BackendMismatch,
                "Command buffer does not belong to the Vulkan backend")),
        }
    }

    pub(crate) fn require_recording(&self, operation: &str) -> Result<()> {
        self.state.require_recording(operation)
    }

    fn recorded(&mut self) {
        self.commands += 1;
    }

    /// Timeline value signaled by the last submission (0 if never submitted)
    pub(crate) fn last_submitted(&self) -> u64 {
        self.last_submitted
    }

    /// Value the next submission will signal
    pub(crate) fn next_submit_value(&self) -> u64 {
        self.last_submitted + 1
    }

    /// Register a submission signaling `value`; pending disposals retire with it
    pub(crate) fn mark_submitted(&mut self, value: u64) {
        self.last_submitted = value;
        self.state.mark_submitted();
        self.disposals.seal(value);
    }

    /// Fails unless an ended, not yet submitted recording is held
    pub(crate) fn require_executable(&self) -> Result<()> {
        self.state.require_executable()
    }

    /// Staging buffers recorded since the last submission
    pub fn pending_disposals(&self) -> usize {
        self.disposals.pending_len()
    }

    /// Staging buffers held until a submitted timeline value is reached
    pub fn in_flight_disposals(&self) -> usize {
        self.disposals.in_flight_len()
    }

    /// Framebuffers bound during the last recording
    pub(crate) fn used_framebuffers(&self) -> &[Arc<dyn Framebuffer>] {
        &self.used_framebuffers
    }

    /// Release the staging buffers whose submission has completed
    pub(crate) fn retire_completed(&mut self) -> Result<()> {
        let completed = self.timeline.value()?;
        let retired = self.disposals.retire(completed);
        if !retired.is_empty() {
            engine_trace!("speed::vulkan::CommandBuffer",
                "Released {} staging buffer(s) at timeline value {}", retired.len(), completed);
        }
        Ok(())
    }

    /// Keep `buffer` alive until the next submission of this command buffer completes
    pub(crate) fn dispose(&mut self, buffer: VulkanDeviceBuffer) {
        self.disposals.push(buffer);
    }

    // ===== NATIVE RECORDING =====

    pub(crate) fn record_image_barrier(
        &mut self,
        transition: &LayoutTransition,
        image: vk::Image,
        range: vk::ImageSubresourceRange,
    ) {
        let barrier = transition.image_barrier(image, range);
        self.record_raw_image_barrier(transition.src_stage, transition.dst_stage, barrier);
    }

    pub(crate) fn record_raw_image_barrier(
        &mut self,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        barrier: vk::ImageMemoryBarrier<'_>,
    ) {
        unsafe {
            self.ctx.device.cmd_pipeline_barrier(
                self.command_buffer,
                src_stage,
                dst_stage,
                vk::DependencyFlags::BY_REGION,
                &[],
                &[],
                std::slice::from_ref(&barrier),
            );
        }
        self.recorded();
    }

    pub(crate) fn record_buffer_barrier(&mut self, barrier: &BufferBarrier, buffer: vk::Buffer, offset: u64, size: u64) {
        let native = barrier.buffer_barrier(buffer, offset, size);
        unsafe {
            self.ctx.device.cmd_pipeline_barrier(
                self.command_buffer,
                barrier.src_stage,
                barrier.dst_stage,
                vk::DependencyFlags::BY_REGION,
                &[],
                std::slice::from_ref(&native),
                &[],
            );
        }
        self.recorded();
    }

    pub(crate) fn record_copy_buffer(&mut self, src: vk::Buffer, dst: vk::Buffer, region: vk::BufferCopy) {
        unsafe {
            self.ctx.device.cmd_copy_buffer(self.command_buffer, src, dst, std::slice::from_ref(&region));
        }
        self.recorded();
    }

    pub(crate) fn record_copy_image(&mut self, src: vk::Image, dst: vk::Image, region: vk::ImageCopy) {
        unsafe {
            self.ctx.device.cmd_copy_image(
                self.command_buffer,
                src,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                dst,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                std::slice::from_ref(&region),
            );
        }
        self.recorded();
    }

    pub(crate) fn record_copy_buffer_to_image(&mut self, src: vk::Buffer, dst: vk::Image, region: vk::BufferImageCopy) {
        unsafe {
            self.ctx.device.cmd_copy_buffer_to_image(
                self.command_buffer,
                src,
                dst,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                std::slice::from_ref(&region),
            );
        }
        self.recorded();
    }

    pub(crate) fn record_copy_image_to_buffer(&mut self, src: vk::Image, dst: vk::Buffer, region: vk::BufferImageCopy) {
        unsafe {
            self.ctx.device.cmd_copy_image_to_buffer(
                self.command_buffer,
                src,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                dst,
                std::slice::from_ref(&region),
            );
        }
        self.recorded();
    }

    pub(crate) fn record_begin_render_pass(&mut self, begin_info: &vk::RenderPassBeginInfo<'_>) {
        unsafe {
            self.ctx.device.cmd_begin_render_pass(self.command_buffer, begin_info, vk::SubpassContents::INLINE);
        }
        self.recorded();
    }

    pub(crate) fn record_end_render_pass(&mut self) {
        unsafe {
            self.ctx.device.cmd_end_render_pass(self.command_buffer);
        }
        self.recorded();
    }

    fn record_viewport(&mut self, viewport: Viewport) {
        let native = vk::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: vk::Extent2D {
                width: viewport.width as u32,
                height: viewport.height as u32,
            },
        };

        unsafe {
            self.ctx.device.cmd_set_viewport(self.command_buffer, 0, std::slice::from_ref(&native));
            self.ctx.device.cmd_set_scissor(self.command_buffer, 0, std::slice::from_ref(&scissor));
        }
        self.commands += 2;
    }

    fn require_graphics_pipeline(&self, operation: &str) -> Result<()> {
        self.require_recording(operation)?;
        if self.state.bound_pipeline_type() != Some(PipelineType::Graphics) {
            engine_bail_warn!("speed::vulkan::CommandBuffer", InvalidOperation,
                "{}: a graphics pipeline must be bound", operation);
        }
        Ok(())
    }

    fn bound_framebuffer(&self, operation: &str) -> Result<Arc<dyn Framebuffer>> {
        match &self.framebuffer {
            Some(framebuffer) => Ok(Arc::clone(framebuffer)),
            None => Err(engine_warn_err!("speed::vulkan::CommandBuffer", InvalidOperation,
                "{}: no framebuffer is bound", operation)),
        }
    }
}

impl CommandBuffer for VulkanCommandBuffer {
    fn begin(&mut self) -> Result<bool> {
        if self.state.is_recording() {
            return Ok(false);
        }

        let completed = self.timeline.value()?;
        if completed < self.last_submitted {
            engine_bail_warn!("speed::vulkan::CommandBuffer", InvalidOperation,
                "Command buffer is still executing (timeline {} < {})", completed, self.last_submitted);
        }
        self.retire_completed()?;

        unsafe {
            self.ctx.device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| vk_error(e, "Failed to reset command buffer"))?;

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

            self.ctx.device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| vk_error(e, "Failed to begin command buffer"))?;
        }

        self.state.begin();
        self.framebuffer = None;
        self.used_framebuffers.clear();
        self.pipeline = None;
        Ok(true)
    }

    fn end(&mut self) -> Result<bool> {
        if !self.state.is_recording() {
            return Ok(false);
        }

        unsafe {
            self.ctx.device
                .end_command_buffer(self.command_buffer)
                .map_err(|e| vk_error(e, "Failed to end command buffer"))?;
        }

        self.state.end();
        Ok(true)
    }

    fn is_recording(&self) -> bool {
        self.state.is_recording()
    }

    fn framebuffer(&self) -> Option<&Arc<dyn Framebuffer>> {
        self.framebuffer.as_ref()
    }

    fn set_framebuffer(&mut self, framebuffer: Option<Arc<dyn Framebuffer>>) -> Result<()> {
        self.require_recording("set_framebuffer")?;

        if let Some(framebuffer) = &framebuffer {
            as_vulkan_framebuffer(framebuffer.as_ref())?;
            if !self.used_framebuffers.iter().any(|used| Arc::ptr_eq(used, framebuffer)) {
                self.used_framebuffers.push(Arc::clone(framebuffer));
            }
        }

        self.framebuffer = framebuffer;
        Ok(())
    }

    fn pipeline(&self) -> Option<&Arc<dyn Pipeline>> {
        self.pipeline.as_ref()
    }

    fn set_pipeline(&mut self, pipeline: Arc<dyn Pipeline>) -> Result<()> {
        self.require_recording("set_pipeline")?;
        let vk_pipeline = as_vulkan_pipeline(pipeline.as_ref())?;
        let handle = vk_pipeline.pipeline;
        let bind_point = vk_pipeline.bind_point();

        if let Some(viewport) = self.state.bind_pipeline(pipeline.pipeline_type())? {
            self.record_viewport(viewport);
        }

        unsafe {
            self.ctx.device.cmd_bind_pipeline(self.command_buffer, bind_point, handle);
        }
        self.recorded();
        self.pipeline = Some(pipeline);
        Ok(())
    }

    fn render_size(&self) -> Option<UVec2> {
        self.state.render_size()
    }

    fn set_render_size(&mut self, size: Option<UVec2>) -> Result<()> {
        if let Some(viewport) = self.state.set_render_size(size)? {
            self.record_viewport(viewport);
        }
        Ok(())
    }

    fn clear_background(&mut self, color: Vec4) -> Result<()> {
        self.require_recording("clear_background")?;
        let framebuffer = self.bound_framebuffer("clear_background")?;

        let Some(index) = framebuffer.first_color_attachment() else {
            engine_bail_warn!("speed::vulkan::CommandBuffer", InvalidOperation,
                "clear_background: the bound framebuffer has no color attachment");
        };

        let texture = as_vulkan_texture(framebuffer.attachments()[index].as_ref())?;
        let range = texture.subresource_range();
        texture.transition_layout_range(self, TextureLayout::TransferDestination, range, false)?;
        let image = texture.image()?;

        let clear_color = vk::ClearColorValue {
            float32: color.to_array(),
        };

        unsafe {
            self.ctx.device.cmd_clear_color_image(
                self.command_buffer,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &clear_color,
                std::slice::from_ref(&range),
            );
        }
        self.recorded();
        Ok(())
    }

    fn clear_depth_stencil(&mut self, attachment: usize, depth: f32, stencil: u32) -> Result<()> {
        self.require_recording("clear_depth_stencil")?;
        let framebuffer = self.bound_framebuffer("clear_depth_stencil")?;

        let Some(texture) = framebuffer.attachments().get(attachment) else {
            engine_bail_warn!("speed::vulkan::CommandBuffer", OutOfBounds,
                "clear_depth_stencil: attachment index {} out of range ({} attachments)",
                attachment, framebuffer.attachments().len());
        };

        let info = texture.info();
        if info.usage != TextureUsage::DepthStencilAttachment || !info.format.is_depth() {
            engine_bail_warn!("speed::vulkan::CommandBuffer", InvalidArgument,
                "clear_depth_stencil: attachment {} is not a depth/stencil attachment", attachment);
        }

        let texture = as_vulkan_texture(texture.as_ref())?;
        let range = texture.subresource_range();

        let layout = if texture.layout() == TextureLayout::General {
            vk::ImageLayout::GENERAL
        } else {
            texture.transition_layout_range(self, TextureLayout::TransferDestination, range, false)?;
            vk::ImageLayout::TRANSFER_DST_OPTIMAL
        };
        let image = texture.image()?;

        let clear_value = vk::ClearDepthStencilValue { depth, stencil };

        unsafe {
            self.ctx.device.cmd_clear_depth_stencil_image(
                self.command_buffer,
                image,
                layout,
                &clear_value,
                std::slice::from_ref(&range),
            );
        }
        self.recorded();
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: Option<&Arc<dyn DeviceBuffer>>, slot: u32) -> Result<()> {
        self.require_recording("bind_vertex_buffer")?;
        let Some(buffer) = buffer else {
            return Ok(());
        };

        let buffer = as_vulkan_buffer(buffer.as_ref())?;
        if !buffer.usage().contains(BufferUsage::VERTEX) {
            engine_bail_warn!("speed::vulkan::CommandBuffer", InvalidArgument,
                "Device buffer must be created for vertex use to be bound as a vertex buffer");
        }

        unsafe {
            self.ctx.device.cmd_bind_vertex_buffers(self.command_buffer, slot, &[buffer.buffer], &[0]);
        }
        self.recorded();
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &Arc<dyn DeviceBuffer>, index_type: IndexType) -> Result<()> {
        self.require_recording("bind_index_buffer")?;

        let buffer = as_vulkan_buffer(buffer.as_ref())?;
        if !buffer.usage().contains(BufferUsage::INDEX) {
            engine_bail_warn!("speed::vulkan::CommandBuffer", InvalidArgument,
                "Device buffer must be created for index use to be bound as an index buffer");
        }

        unsafe {
            self.ctx.device.cmd_bind_index_buffer(self.command_buffer, buffer.buffer, 0, index_type_to_vk(index_type));
        }
        self.recorded();
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()> {
        self.draw_instanced(vertex_count, 1, first_vertex, 0)
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()> {
        self.draw_indexed_instanced(index_count, 1, first_index, vertex_offset, 0)
    }

    fn draw_instanced(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> Result<()> {
        self.require_graphics_pipeline("draw")?;

        unsafe {
            self.ctx.device.cmd_draw(self.command_buffer, vertex_count, instance_count, first_vertex, first_instance);
        }
        self.recorded();
        Ok(())
    }

    fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()> {
        self.require_graphics_pipeline("draw_indexed")?;

        unsafe {
            self.ctx.device.cmd_draw_indexed(
                self.command_buffer,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            );
        }
        self.recorded();
        Ok(())
    }

    fn copy_buffer(
        &mut self,
        dst: &Arc<dyn DeviceBuffer>,
        dst_range: BufferRange,
        src: &Arc<dyn DeviceBuffer>,
        src_range: BufferRange,
    ) -> Result<()> {
        self.transfer_buffer(dst.as_ref(), dst_range, src.as_ref(), src_range)
    }

    fn upload_buffer(
        &mut self,
        dst: &Arc<dyn DeviceBuffer>,
        dst_range: BufferRange,
        data: &[u8],
        src_range: BufferRange,
    ) -> Result<()> {
        self.upload_to_buffer(dst.as_ref(), dst_range, data, src_range)
    }

    fn copy_texture(
        &mut self,
        dst: &Arc<dyn Texture>,
        dst_region: TextureRegion,
        src: &Arc<dyn Texture>,
        src_region: TextureRegion,
    ) -> Result<()> {
        if Arc::ptr_eq(dst, src) {
            self.require_recording("copy_texture")?;
            engine_bail_warn!("speed::vulkan::CommandBuffer", InvalidArgument,
                "copy_texture: source and destination must be different textures");
        }
        self.transfer_texture(dst.as_ref(), dst_region, src.as_ref(), src_region)
    }

    fn copy_buffer_to_texture(
        &mut self,
        dst: &Arc<dyn Texture>,
        region: TextureRegion,
        src: &Arc<dyn DeviceBuffer>,
        src_offset: u64,
    ) -> Result<()> {
        self.transfer_buffer_to_texture(dst.as_ref(), region, src.as_ref(), src_offset)
    }

    fn copy_texture_to_buffer(
        &mut self,
        dst: &Arc<dyn DeviceBuffer>,
        dst_offset: u64,
        src: &Arc<dyn Texture>,
        region: TextureRegion,
    ) -> Result<()> {
        self.transfer_texture_to_buffer(dst.as_ref(), dst_offset, src.as_ref(), region)
    }

    fn upload_texture(&mut self, dst: &Arc<dyn Texture>, region: TextureRegion, data: &[u8]) -> Result<()> {
        self.upload_to_texture(dst.as_ref(), region, data)
    }

    fn recorded_commands(&self) -> u64 {
        self.commands
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Drop for VulkanCommandBuffer {
    fn drop(&mut self) {
        if self.last_submitted > self.timeline.cached_value() {
            let timeout = self.ctx.config.wait_for_end_timeout;
            if !matches!(self.timeline.wait(self.last_submitted, timeout), Ok(Some(_))) {
                engine_warn!("speed::vulkan::CommandBuffer",
                    "Dropping a command buffer whose submission did not complete");
            }
        }

        drop(self.disposals.drain_all());

        unsafe {
            self.ctx.device.destroy_command_pool(self.pool, None);
        }
    }
}
