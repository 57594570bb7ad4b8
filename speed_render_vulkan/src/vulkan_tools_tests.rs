//! Unit tests for vulkan_tools.rs
//!
//! Pure conversion tables and result classification, no GPU required.

use ash::vk;
use speed_render::speed::Error;
use speed_render::speed::render::{BufferUsage, TextureFormat, TextureLayout, TextureUsage};
use crate::vulkan_tools::*;

const ALL_FORMATS: [TextureFormat; 17] = [
    TextureFormat::R8_UNORM,
    TextureFormat::R8G8_UNORM,
    TextureFormat::R8G8B8A8_UNORM,
    TextureFormat::R8G8B8A8_SRGB,
    TextureFormat::B8G8R8A8_UNORM,
    TextureFormat::B8G8R8A8_SRGB,
    TextureFormat::R16G16B16A16_SFLOAT,
    TextureFormat::R32_UINT,
    TextureFormat::R32_SFLOAT,
    TextureFormat::R32G32B32A32_SFLOAT,
    TextureFormat::D16_UNORM,
    TextureFormat::D32_FLOAT,
    TextureFormat::D24_UNORM_S8_UINT,
    TextureFormat::D32_FLOAT_S8_UINT,
    TextureFormat::BC1_RGBA_UNORM,
    TextureFormat::BC3_UNORM,
    TextureFormat::BC7_UNORM,
];

// ============================================================================
// RESULT CLASSIFICATION
// ============================================================================

#[test]
fn test_ensure_success() {
    assert!(ensure(vk::Result::SUCCESS, "test").is_ok());
}

#[test]
fn test_ensure_recoverable_codes_are_ok() {
    assert!(ensure(vk::Result::TIMEOUT, "test").is_ok());
    assert!(ensure(vk::Result::SUBOPTIMAL_KHR, "test").is_ok());
    assert!(ensure(vk::Result::NOT_READY, "test").is_ok());
    assert!(is_recoverable(vk::Result::TIMEOUT));
    assert!(!is_recoverable(vk::Result::ERROR_DEVICE_LOST));
}

#[test]
fn test_ensure_out_of_memory() {
    assert_eq!(ensure(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY, "test"), Err(Error::OutOfMemory));
    assert_eq!(ensure(vk::Result::ERROR_OUT_OF_HOST_MEMORY, "test"), Err(Error::OutOfMemory));
}

#[test]
fn test_ensure_other_errors_are_fatal() {
    let err = ensure(vk::Result::ERROR_DEVICE_LOST, "queue submit").unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, Error::BackendError(ref msg) if msg.contains("queue submit")));
}

// ============================================================================
// FORMATS
// ============================================================================

#[test]
fn test_texture_format_round_trip() {
    for format in ALL_FORMATS {
        assert_eq!(vk_format_to_texture(texture_format_to_vk(format)).unwrap(), format);
    }
}

#[test]
fn test_unknown_native_format_is_rejected() {
    let result = vk_format_to_texture(vk::Format::A2B10G10R10_UNORM_PACK32);
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}

#[test]
fn test_aspect_mask() {
    assert_eq!(aspect_mask(TextureFormat::R8G8B8A8_UNORM), vk::ImageAspectFlags::COLOR);
    assert_eq!(aspect_mask(TextureFormat::D32_FLOAT), vk::ImageAspectFlags::DEPTH);
    assert_eq!(
        aspect_mask(TextureFormat::D24_UNORM_S8_UINT),
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    );
}

// ============================================================================
// LAYOUT TABLES
// ============================================================================

#[test]
fn test_layout_stage_table() {
    assert_eq!(layout_stage(TextureLayout::Undefined), vk::PipelineStageFlags::TOP_OF_PIPE);
    assert_eq!(layout_stage(TextureLayout::ColorAttachment), vk::PipelineStageFlags::TOP_OF_PIPE);
    assert_eq!(layout_stage(TextureLayout::TransferDestination), vk::PipelineStageFlags::TRANSFER);
    assert_eq!(layout_stage(TextureLayout::TransferSource), vk::PipelineStageFlags::TRANSFER);
    assert_eq!(
        layout_stage(TextureLayout::DepthStencilAttachment),
        vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
    );
    assert_eq!(layout_stage(TextureLayout::Present), vk::PipelineStageFlags::BOTTOM_OF_PIPE);
    assert_eq!(layout_stage(TextureLayout::General), vk::PipelineStageFlags::ALL_COMMANDS);
}

#[test]
fn test_layout_access_table() {
    assert_eq!(layout_access(TextureLayout::Undefined), vk::AccessFlags::NONE);
    assert_eq!(layout_access(TextureLayout::ColorAttachment), vk::AccessFlags::NONE);
    assert_eq!(layout_access(TextureLayout::Present), vk::AccessFlags::NONE);
    assert_eq!(layout_access(TextureLayout::TransferDestination), vk::AccessFlags::TRANSFER_WRITE);
    assert_eq!(layout_access(TextureLayout::TransferSource), vk::AccessFlags::TRANSFER_READ);
    assert_eq!(
        layout_access(TextureLayout::DepthStencilAttachment),
        vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE
    );
    assert_eq!(
        layout_access(TextureLayout::General),
        vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE
    );
}

// ============================================================================
// USAGE TABLES
// ============================================================================

#[test]
fn test_buffer_usage_access_single_flags() {
    assert_eq!(buffer_usage_access(BufferUsage::VERTEX).unwrap(), vk::AccessFlags::VERTEX_ATTRIBUTE_READ);
    assert_eq!(buffer_usage_access(BufferUsage::INDEX).unwrap(), vk::AccessFlags::INDEX_READ);
    assert_eq!(buffer_usage_access(BufferUsage::UNIFORM).unwrap(), vk::AccessFlags::UNIFORM_READ);
    assert_eq!(
        buffer_usage_access(BufferUsage::STORAGE).unwrap(),
        vk::AccessFlags::SHADER_READ | vk::AccessFlags::SHADER_WRITE
    );
    assert_eq!(
        buffer_usage_access(BufferUsage::STAGING).unwrap(),
        vk::AccessFlags::TRANSFER_READ | vk::AccessFlags::TRANSFER_WRITE
    );
}

#[test]
fn test_buffer_usage_access_union() {
    let access = buffer_usage_access(BufferUsage::VERTEX | BufferUsage::INDEX).unwrap();
    assert_eq!(access, vk::AccessFlags::VERTEX_ATTRIBUTE_READ | vk::AccessFlags::INDEX_READ);
}

#[test]
fn test_buffer_usage_access_empty_is_error() {
    assert!(matches!(buffer_usage_access(BufferUsage::empty()), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_buffer_usage_stage() {
    assert_eq!(buffer_usage_stage(BufferUsage::VERTEX), vk::PipelineStageFlags::VERTEX_INPUT);
    assert_eq!(
        buffer_usage_stage(BufferUsage::VERTEX | BufferUsage::STORAGE),
        vk::PipelineStageFlags::VERTEX_INPUT
    );
    assert_eq!(buffer_usage_stage(BufferUsage::UNIFORM), vk::PipelineStageFlags::ALL_COMMANDS);
}

#[test]
fn test_buffer_usage_always_allows_transfers() {
    let flags = buffer_usage_to_vk(BufferUsage::UNIFORM);
    assert!(flags.contains(vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::TRANSFER_DST));
    assert!(flags.contains(vk::BufferUsageFlags::UNIFORM_BUFFER));
    assert!(!flags.contains(vk::BufferUsageFlags::VERTEX_BUFFER));
}

#[test]
fn test_texture_usage_access_table() {
    assert_eq!(texture_usage_access(TextureUsage::Sampled), vk::AccessFlags::SHADER_READ);
    assert_eq!(
        texture_usage_access(TextureUsage::Storage),
        vk::AccessFlags::SHADER_READ | vk::AccessFlags::SHADER_WRITE
    );
    assert_eq!(
        texture_usage_access(TextureUsage::ColorAttachment),
        vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE
    );
    assert_eq!(
        texture_usage_access(TextureUsage::DepthStencilAttachment),
        vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
    );
    assert_eq!(texture_usage_access(TextureUsage::InputAttachment), vk::AccessFlags::INPUT_ATTACHMENT_READ);
}

#[test]
fn test_sample_count_conversion() {
    assert_eq!(sample_count_to_vk(1).unwrap(), vk::SampleCountFlags::TYPE_1);
    assert_eq!(sample_count_to_vk(64).unwrap(), vk::SampleCountFlags::TYPE_64);
    assert!(matches!(sample_count_to_vk(3), Err(Error::InvalidArgument(_))));
    assert!(matches!(sample_count_to_vk(0), Err(Error::InvalidArgument(_))));
}
