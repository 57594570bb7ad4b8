/// Barrier computation from semantic layouts and usages
///
/// Everything here is pure: the command buffer records what these functions
/// compute.

use ash::vk;
use speed_render::speed::Result;
use speed_render::speed::render::{BufferUsage, TextureLayout, TextureUsage};

use crate::vulkan_tools::{
    buffer_usage_access, buffer_usage_stage, layout_access, layout_stage, layout_to_vk,
    texture_usage_access,
};

/// Image layout transition with its synchronization scopes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LayoutTransition {
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
}

impl LayoutTransition {
    /// Transition from `from` to `to`, stages and accesses taken from the layout tables
    pub fn between(from: TextureLayout, to: TextureLayout) -> Self {
        Self {
            old_layout: layout_to_vk(from),
            new_layout: layout_to_vk(to),
            src_stage: layout_stage(from),
            dst_stage: layout_stage(to),
            src_access: layout_access(from),
            dst_access: layout_access(to),
        }
    }

    /// Native barrier applying this transition to `range` of `image`
    pub fn image_barrier(&self, image: vk::Image, range: vk::ImageSubresourceRange) -> vk::ImageMemoryBarrier<'static> {
        vk::ImageMemoryBarrier::default()
            .old_layout(self.old_layout)
            .new_layout(self.new_layout)
            .src_access_mask(self.src_access)
            .dst_access_mask(self.dst_access)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(range)
    }
}

/// Barrier moving ownership of an image between queue families
///
/// Layout, stage and access are unchanged on both sides.
pub(crate) fn ownership_barrier(
    layout: TextureLayout,
    src_family: u32,
    dst_family: u32,
    image: vk::Image,
    range: vk::ImageSubresourceRange,
) -> vk::ImageMemoryBarrier<'static> {
    let native = layout_to_vk(layout);
    let access = layout_access(layout);
    vk::ImageMemoryBarrier::default()
        .old_layout(native)
        .new_layout(native)
        .src_access_mask(access)
        .dst_access_mask(access)
        .src_queue_family_index(src_family)
        .dst_queue_family_index(dst_family)
        .image(image)
        .subresource_range(range)
}

/// Execution and memory scopes of a buffer barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BufferBarrier {
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
}

impl BufferBarrier {
    /// Make transfer writes visible to the buffer's usage
    ///
    /// Staging buffers are also read back by the host.
    pub fn after_transfer(usage: BufferUsage) -> Result<Self> {
        let mut barrier = Self {
            src_stage: vk::PipelineStageFlags::TRANSFER,
            dst_stage: buffer_usage_stage(usage),
            src_access: vk::AccessFlags::TRANSFER_WRITE,
            dst_access: buffer_usage_access(usage)?,
        };
        if usage.contains(BufferUsage::STAGING) {
            barrier.dst_stage |= vk::PipelineStageFlags::HOST;
            barrier.dst_access |= vk::AccessFlags::HOST_READ;
        }
        Ok(barrier)
    }

    /// Transfer write followed by a transfer read of the same bytes
    pub fn between_transfers() -> Self {
        Self {
            src_stage: vk::PipelineStageFlags::TRANSFER,
            dst_stage: vk::PipelineStageFlags::TRANSFER,
            src_access: vk::AccessFlags::TRANSFER_WRITE,
            dst_access: vk::AccessFlags::TRANSFER_READ,
        }
    }

    /// Native barrier over `size` bytes of `buffer` starting at `offset`
    pub fn buffer_barrier(&self, buffer: vk::Buffer, offset: u64, size: u64) -> vk::BufferMemoryBarrier<'static> {
        vk::BufferMemoryBarrier::default()
            .src_access_mask(self.src_access)
            .dst_access_mask(self.dst_access)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .buffer(buffer)
            .offset(offset)
            .size(size)
    }
}

/// Scopes of the barrier closing a transfer into a texture
///
/// The texture stays in `layout`; transfer writes become visible to the
/// texture's usage.
pub(crate) fn texture_after_transfer(layout: TextureLayout, usage: TextureUsage) -> LayoutTransition {
    let native = layout_to_vk(layout);
    LayoutTransition {
        old_layout: native,
        new_layout: native,
        src_stage: vk::PipelineStageFlags::TRANSFER,
        dst_stage: vk::PipelineStageFlags::ALL_COMMANDS,
        src_access: vk::AccessFlags::TRANSFER_WRITE,
        dst_access: texture_usage_access(usage),
    }
}

#[cfg(test)]
#[path = "vulkan_barrier_tests.rs"]
mod tests;
