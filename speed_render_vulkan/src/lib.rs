/*!
# Speed Render - Vulkan Backend

Vulkan implementation of the `speed_render` backend interfaces.

## Features

- Timeline semaphore per command buffer: `submit` never blocks, `wait_for_end` is bounded
- Transient staging buffers retired once the GPU passed the submission that used them
- Semantic texture layouts translated to pipeline barriers
- Swapchain images exposed as framebuffers, transitioned to Present at submit
- gpu-allocator managed memory, dedicated allocation per resource

## Validation

Build with the `vulkan-validation` feature and set `Config::enable_validation`
to route validation layer messages to the engine logger.
*/

mod vulkan_tools;
mod vulkan_barrier;
mod vulkan_context;
mod vulkan_semaphore;
mod vulkan_device_buffer;
mod vulkan_texture;
mod vulkan_command_buffer;
mod vulkan_transfer;
mod vulkan_render_pass;
mod vulkan_framebuffer;
mod vulkan_shader;
mod vulkan_pipeline;
mod vulkan_swapchain;
mod vulkan_renderer;

#[cfg(feature = "vulkan-validation")]
mod debug;

pub use vulkan_context::GpuContext;
pub use vulkan_renderer::VulkanRenderer;
pub use vulkan_command_buffer::VulkanCommandBuffer;
pub use vulkan_device_buffer::VulkanDeviceBuffer;
pub use vulkan_texture::VulkanTexture;
pub use vulkan_render_pass::VulkanRenderPass;
pub use vulkan_framebuffer::VulkanFramebuffer;
pub use vulkan_shader::VulkanShader;
pub use vulkan_pipeline::VulkanPipeline;
pub use vulkan_swapchain::{SurfaceCapabilities, VulkanSwapchain};
pub use vulkan_semaphore::VulkanSemaphore;

#[cfg(feature = "vulkan-validation")]
pub use debug::{get_validation_stats, print_validation_stats_report, ValidationStats};
