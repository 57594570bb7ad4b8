/// BackendFactory trait - creation of every backend resource

use std::sync::Arc;
use crate::backend::command_buffer::CommandBuffer;
use crate::backend::device_buffer::{BufferUsage, DeviceBuffer};
use crate::backend::framebuffer::Framebuffer;
use crate::backend::pipeline::{Pipeline, PipelineInfo};
use crate::backend::render_pass::{AttachmentDescription, RenderPass};
use crate::backend::semaphore::Semaphore;
use crate::backend::shader::{Shader, ShaderDesc};
use crate::backend::swapchain::{Swapchain, SwapchainInfo};
use crate::backend::texture::{Texture, TextureInfo};
use crate::error::Result;

/// Resource factory implemented by each backend
///
/// Every resource passed back in (render passes, textures, shaders) must
/// come from the same backend, otherwise `BackendMismatch` is returned.
pub trait BackendFactory: Send + Sync {
    /// Create `count` idle command buffers
    fn create_command_buffers(&self, count: usize) -> Result<Vec<Box<dyn CommandBuffer>>>;

    /// Create a single idle command buffer
    fn create_command_buffer(&self) -> Result<Box<dyn CommandBuffer>> {
        let mut buffers = self.create_command_buffers(1)?;
        match buffers.pop() {
            Some(buffer) => Ok(buffer),
            None => Err(crate::engine_err!("speed::BackendFactory",
                "Backend returned no command buffer")),
        }
    }

    /// Create a device buffer
    ///
    /// # Arguments
    ///
    /// * `size` - Size in bytes (non-zero)
    /// * `usage` - Usage flags (non-empty); STAGING makes it host-mappable
    fn create_device_buffer(&self, size: u64, usage: BufferUsage) -> Result<Arc<dyn DeviceBuffer>>;

    /// Create an unmaterialized texture (see `Texture::create_image`)
    fn create_texture(&self, info: TextureInfo) -> Result<Arc<dyn Texture>>;

    /// Create a render pass from ordered attachment descriptions
    fn create_render_pass(&self, attachments: &[AttachmentDescription]) -> Result<Arc<dyn RenderPass>>;

    /// Create a framebuffer over materialized attachments
    fn create_framebuffer(
        &self,
        width: u32,
        height: u32,
        attachments: Vec<Arc<dyn Texture>>,
        render_pass: &Arc<dyn RenderPass>,
    ) -> Result<Arc<dyn Framebuffer>>;

    /// Create a shader module from SPIR-V bytecode
    fn create_shader(&self, desc: ShaderDesc<'_>) -> Result<Arc<dyn Shader>>;

    /// Create a graphics or compute pipeline
    fn create_pipeline(&self, info: PipelineInfo, render_pass: &Arc<dyn RenderPass>) -> Result<Arc<dyn Pipeline>>;

    /// Create and activate a swapchain on the backend's surface
    fn create_swapchain(&self, info: SwapchainInfo, render_pass: &Arc<dyn RenderPass>) -> Result<Box<dyn Swapchain>>;

    /// Create a timeline semaphore
    fn create_semaphore(&self, initial_value: u64) -> Result<Arc<dyn Semaphore>>;
}
