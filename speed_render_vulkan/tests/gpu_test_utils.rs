//! Shared helpers for the GPU integration tests
//!
//! Every test binary includes this file with `mod gpu_test_utils;`.

#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use speed_render::speed::{BackendFactory, Config, Renderer};
use speed_render::speed::render::{
    BufferMapType, BufferUsage, CommandBuffer, DeviceBuffer, Texture, TextureFormat, TextureInfo, TextureUsage,
};
use speed_render_vulkan::VulkanRenderer;
use winit::event_loop::EventLoop;
use winit::window::Window;

static HEADLESS: OnceLock<VulkanRenderer> = OnceLock::new();

/// Headless renderer shared by every test of the binary
pub fn renderer() -> &'static VulkanRenderer {
    HEADLESS.get_or_init(|| {
        VulkanRenderer::new_headless(Config::default()).expect("Failed to create headless renderer")
    })
}

/// Hidden window for swapchain tests
#[allow(deprecated)]
pub fn create_test_window() -> (Window, EventLoop<()>) {
    let mut builder = EventLoop::builder();
    #[cfg(target_os = "linux")]
    {
        use winit::platform::x11::EventLoopBuilderExtX11;
        builder.with_any_thread(true);
    }
    let event_loop = builder.build().unwrap();
    let window_attrs = Window::default_attributes()
        .with_title("Speed Render Swapchain Test")
        .with_inner_size(winit::dpi::PhysicalSize::new(320, 240))
        .with_visible(false);
    let window = event_loop.create_window(window_attrs).unwrap();
    (window, event_loop)
}

pub fn command_buffer() -> Box<dyn CommandBuffer> {
    renderer().create_command_buffer().unwrap()
}

pub fn device_buffer(size: u64, usage: BufferUsage) -> Arc<dyn DeviceBuffer> {
    renderer().create_device_buffer(size, usage).unwrap()
}

/// Materialized texture in Undefined layout
pub fn texture(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Arc<dyn Texture> {
    let texture = renderer().create_texture(TextureInfo::new(width, height, format, usage)).unwrap();
    texture.create_image().unwrap();
    texture
}

/// End, submit and wait for a single command buffer
pub fn submit_and_wait(cmd: &mut dyn CommandBuffer) {
    cmd.end().unwrap();
    renderer().submit(&mut [&mut *cmd]).unwrap();
    renderer().wait_for_end(&mut [&mut *cmd]).unwrap();
}

/// Host copy of a staging buffer's contents
pub fn read_back(buffer: &Arc<dyn DeviceBuffer>) -> Vec<u8> {
    let mapped = buffer.map_all(BufferMapType::Read).unwrap();
    mapped.as_slice().unwrap().to_vec()
}
