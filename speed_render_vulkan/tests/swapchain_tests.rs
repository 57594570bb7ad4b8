//! GPU tests for swapchain acquisition, presentation and recreation
//!
//! A single windowed test per binary: winit allows one event loop per process.
//!
//! Run with: cargo test -p speed_render_vulkan --test swapchain_tests -- --ignored

mod gpu_test_utils;

use gpu_test_utils::*;
use serial_test::serial;
use speed_render::glam::Vec4;
use speed_render::speed::{BackendFactory, Config, Error, Renderer};
use speed_render::speed::render::{
    AttachmentDescription, Swapchain, SwapchainInfo, TextureFormat, TextureLayout,
};
use speed_render_vulkan::{VulkanRenderer, VulkanSwapchain};

/// Acquire an image, retrying a few times on timeouts
fn acquire(swapchain: &mut dyn Swapchain) -> std::sync::Arc<dyn speed_render::speed::render::Framebuffer> {
    for _ in 0..8 {
        if let Some(framebuffer) = swapchain.next_image().unwrap() {
            return framebuffer;
        }
    }
    panic!("No swapchain image could be acquired");
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_swapchain_headless_creation_fails() {
    let render_pass = renderer()
        .create_render_pass(&[AttachmentDescription::new(TextureFormat::B8G8R8A8_SRGB)])
        .unwrap();

    let result = renderer().create_swapchain(SwapchainInfo::new(320, 240), &render_pass);
    assert!(matches!(result, Err(Error::InvalidOperation(_))));
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_swapchain_lifecycle() {
    let (window, _event_loop) = create_test_window();
    let renderer = VulkanRenderer::new(&window, Config::default()).unwrap();

    let render_pass = renderer
        .create_render_pass(&[AttachmentDescription::new(TextureFormat::B8G8R8A8_SRGB)])
        .unwrap();
    let mut swapchain = renderer.create_swapchain(SwapchainInfo::new(320, 240), &render_pass).unwrap();

    assert!(swapchain.is_active());
    assert!(swapchain.image_count() >= 1);
    assert_eq!(swapchain.framebuffers().len() as u32, swapchain.image_count());
    assert!(swapchain.width() > 0 && swapchain.height() > 0);

    let vk_swapchain = swapchain.as_any().downcast_ref::<VulkanSwapchain>().unwrap();
    let snapshot = vk_swapchain.surface_capabilities();
    assert!(!snapshot.formats.is_empty());
    assert!(snapshot.present_modes.contains(&ash::vk::PresentModeKHR::FIFO));
    assert_eq!(vk_swapchain.present_mode(), ash::vk::PresentModeKHR::FIFO);

    // Creating an active swapchain again is rejected
    assert!(matches!(swapchain.create(), Err(Error::InvalidOperation(_))));
    assert!(swapchain.is_active());

    // Acquire, clear and present a few frames
    let mut cmd = renderer.create_command_buffer().unwrap();
    for _ in 0..3 {
        let framebuffer = acquire(swapchain.as_mut());
        assert!(swapchain.current_image() < swapchain.image_count());

        cmd.begin().unwrap();
        cmd.set_framebuffer(Some(framebuffer.clone())).unwrap();
        cmd.clear_background(Vec4::new(0.0, 0.0, 1.0, 1.0)).unwrap();
        cmd.end().unwrap();

        renderer.submit(&mut [cmd.as_mut()]).unwrap();
        assert_eq!(framebuffer.attachments()[0].layout(), TextureLayout::Present);

        renderer.present(&[swapchain.as_ref()]).unwrap();
        renderer.wait_for_end(&mut [cmd.as_mut()]).unwrap();
    }

    // Recreation keeps the swapchain usable
    swapchain.resize(200, 150).unwrap();
    assert!(swapchain.is_active());
    assert!(swapchain.width() > 0 && swapchain.height() > 0);
    let framebuffer = acquire(swapchain.as_mut());
    assert_eq!(framebuffer.width(), swapchain.width());
    assert!(swapchain.current_image() < swapchain.image_count());

    // Inactive swapchains refuse acquisition and presentation
    renderer.wait_idle().unwrap();
    swapchain.destroy();
    assert!(!swapchain.is_active());
    assert!(matches!(swapchain.next_image(), Err(Error::InvalidOperation(_))));
    assert!(matches!(renderer.present(&[swapchain.as_ref()]), Err(Error::InvalidOperation(_))));

    swapchain.create().unwrap();
    assert!(swapchain.is_active());
}
