//! Unit tests for vulkan_barrier.rs

use ash::vk;
use speed_render::speed::Error;
use speed_render::speed::render::{BufferUsage, TextureLayout, TextureUsage};
use crate::vulkan_barrier::*;

fn color_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

#[test]
fn test_transition_undefined_to_color_attachment() {
    let transition = LayoutTransition::between(TextureLayout::Undefined, TextureLayout::ColorAttachment);
    assert_eq!(transition.old_layout, vk::ImageLayout::UNDEFINED);
    assert_eq!(transition.new_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
    assert_eq!(transition.src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
    assert_eq!(transition.dst_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
    assert_eq!(transition.src_access, vk::AccessFlags::NONE);
    assert_eq!(transition.dst_access, vk::AccessFlags::NONE);
}

#[test]
fn test_transition_transfer_destination_to_present() {
    let transition = LayoutTransition::between(TextureLayout::TransferDestination, TextureLayout::Present);
    assert_eq!(transition.old_layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
    assert_eq!(transition.new_layout, vk::ImageLayout::PRESENT_SRC_KHR);
    assert_eq!(transition.src_stage, vk::PipelineStageFlags::TRANSFER);
    assert_eq!(transition.dst_stage, vk::PipelineStageFlags::BOTTOM_OF_PIPE);
    assert_eq!(transition.src_access, vk::AccessFlags::TRANSFER_WRITE);
    assert_eq!(transition.dst_access, vk::AccessFlags::NONE);
}

#[test]
fn test_every_transition_pair_is_defined() {
    for from in TextureLayout::ALL {
        for to in TextureLayout::ALL {
            let transition = LayoutTransition::between(from, to);
            assert!(!transition.src_stage.is_empty(), "{:?} -> {:?}", from, to);
            assert!(!transition.dst_stage.is_empty(), "{:?} -> {:?}", from, to);
        }
    }
}

#[test]
fn test_image_barrier_carries_transition() {
    let transition = LayoutTransition::between(TextureLayout::ColorAttachment, TextureLayout::TransferSource);
    let barrier = transition.image_barrier(vk::Image::null(), color_range());
    assert_eq!(barrier.old_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
    assert_eq!(barrier.new_layout, vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
    assert_eq!(barrier.dst_access_mask, vk::AccessFlags::TRANSFER_READ);
    assert_eq!(barrier.src_queue_family_index, vk::QUEUE_FAMILY_IGNORED);
    assert_eq!(barrier.subresource_range.aspect_mask, vk::ImageAspectFlags::COLOR);
}

#[test]
fn test_ownership_barrier_keeps_layout_and_access() {
    let barrier = ownership_barrier(TextureLayout::TransferSource, 0, 2, vk::Image::null(), color_range());
    assert_eq!(barrier.old_layout, barrier.new_layout);
    assert_eq!(barrier.src_access_mask, barrier.dst_access_mask);
    assert_eq!(barrier.src_queue_family_index, 0);
    assert_eq!(barrier.dst_queue_family_index, 2);
}

#[test]
fn test_buffer_barrier_after_transfer() {
    let barrier = BufferBarrier::after_transfer(BufferUsage::VERTEX).unwrap();
    assert_eq!(barrier.src_stage, vk::PipelineStageFlags::TRANSFER);
    assert_eq!(barrier.dst_stage, vk::PipelineStageFlags::VERTEX_INPUT);
    assert_eq!(barrier.src_access, vk::AccessFlags::TRANSFER_WRITE);
    assert_eq!(barrier.dst_access, vk::AccessFlags::VERTEX_ATTRIBUTE_READ);

    let native = barrier.buffer_barrier(vk::Buffer::null(), 16, 32);
    assert_eq!(native.offset, 16);
    assert_eq!(native.size, 32);
}

#[test]
fn test_buffer_barrier_staging_is_host_visible() {
    let barrier = BufferBarrier::after_transfer(BufferUsage::STAGING).unwrap();
    assert!(barrier.dst_stage.contains(vk::PipelineStageFlags::HOST));
    assert!(barrier.dst_access.contains(vk::AccessFlags::HOST_READ));
    assert!(barrier.dst_access.contains(vk::AccessFlags::TRANSFER_READ));
}

#[test]
fn test_buffer_barrier_between_transfers() {
    let barrier = BufferBarrier::between_transfers();
    assert_eq!(barrier.src_access, vk::AccessFlags::TRANSFER_WRITE);
    assert_eq!(barrier.dst_access, vk::AccessFlags::TRANSFER_READ);
    assert_eq!(barrier.dst_stage, vk::PipelineStageFlags::TRANSFER);
}

#[test]
fn test_buffer_barrier_empty_usage_is_error() {
    let result = BufferBarrier::after_transfer(BufferUsage::empty());
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}

#[test]
fn test_texture_after_transfer_keeps_layout() {
    let transition = texture_after_transfer(TextureLayout::TransferDestination, TextureUsage::Sampled);
    assert_eq!(transition.old_layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
    assert_eq!(transition.new_layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
    assert_eq!(transition.src_access, vk::AccessFlags::TRANSFER_WRITE);
    assert_eq!(transition.dst_access, vk::AccessFlags::SHADER_READ);
}
