/// Staging-mediated transfers recorded by `VulkanCommandBuffer`
///
/// Bounds are validated before anything is recorded. Host bytes and
/// buffer-to-buffer copies go through a transient staging buffer that is
/// handed to the command buffer's dispose queue.

use ash::vk;
use speed_render::speed::Result;
use speed_render::speed::render::{
    texture_region_byte_size, validate_buffer_copy, validate_buffer_texture_copy, validate_texture_copy,
    validate_texture_region, BufferMapType, BufferRange, BufferUsage, DeviceBuffer, Texture, TextureLayout,
    TextureRegion,
};
use speed_render::{engine_bail_warn, engine_trace};
use std::sync::Arc;

use crate::vulkan_barrier::{texture_after_transfer, BufferBarrier};
use crate::vulkan_command_buffer::VulkanCommandBuffer;
use crate::vulkan_device_buffer::{as_vulkan_buffer, VulkanDeviceBuffer};
use crate::vulkan_texture::{as_vulkan_texture, VulkanTexture};
use crate::vulkan_tools::aspect_mask;

fn image_offset(region: TextureRegion) -> vk::Offset3D {
    vk::Offset3D {
        x: region.x as i32,
        y: region.y as i32,
        z: 0,
    }
}

fn image_extent(region: TextureRegion) -> vk::Extent3D {
    vk::Extent3D {
        width: region.width,
        height: region.height,
        depth: 1,
    }
}

fn base_layer(texture: &VulkanTexture) -> vk::ImageSubresourceLayers {
    vk::ImageSubresourceLayers {
        aspect_mask: aspect_mask(texture.info().format),
        mip_level: 0,
        base_array_layer: 0,
        layer_count: 1,
    }
}

fn buffer_image_copy(buffer_offset: u64, texture: &VulkanTexture, region: TextureRegion) -> vk::BufferImageCopy {
    vk::BufferImageCopy {
        buffer_offset,
        // Tightly packed
        buffer_row_length: 0,
        buffer_image_height: 0,
        image_subresource: base_layer(texture),
        image_offset: image_offset(region),
        image_extent: image_extent(region),
    }
}

impl VulkanCommandBuffer {
    fn create_staging(&self, size: u64) -> Result<VulkanDeviceBuffer> {
        VulkanDeviceBuffer::new(Arc::clone(&self.ctx), size, BufferUsage::STAGING)
    }

    /// Fill a fresh staging buffer with `data`
    fn stage_bytes(&self, data: &[u8]) -> Result<VulkanDeviceBuffer> {
        let staging = self.create_staging(data.len() as u64)?;
        {
            let mut mapped = staging.map_all(BufferMapType::Write)?;
            mapped.write(0, data)?;
        }
        Ok(staging)
    }

    /// Close a transfer into `buffer`
    fn finish_buffer_write(&mut self, buffer: &VulkanDeviceBuffer, offset: u64, size: u64) -> Result<()> {
        let barrier = BufferBarrier::after_transfer(buffer.usage())?;
        self.record_buffer_barrier(&barrier, buffer.buffer, offset, size);
        Ok(())
    }

    /// Close a transfer into `texture`, which stays in TransferDestination
    fn finish_texture_write(&mut self, texture: &VulkanTexture) -> Result<()> {
        let transition = texture_after_transfer(TextureLayout::TransferDestination, texture.info().usage);
        let image = texture.image()?;
        self.record_image_barrier(&transition, image, texture.subresource_range());
        Ok(())
    }

    pub(crate) fn transfer_buffer(
        &mut self,
        dst: &dyn DeviceBuffer,
        dst_range: BufferRange,
        src: &dyn DeviceBuffer,
        src_range: BufferRange,
    ) -> Result<()> {
        self.require_recording("copy_buffer")?;
        let dst = as_vulkan_buffer(dst)?;
        let src = as_vulkan_buffer(src)?;
        validate_buffer_copy(dst.size(), dst_range, src.size(), src_range)?;

        let size = src_range.size;
        if size == 0 {
            return Ok(());
        }

        let staging = self.create_staging(size)?;

        self.record_copy_buffer(src.buffer, staging.buffer, vk::BufferCopy {
            src_offset: src_range.offset,
            dst_offset: 0,
            size,
        });
        self.record_buffer_barrier(&BufferBarrier::between_transfers(), staging.buffer, 0, size);
        self.record_copy_buffer(staging.buffer, dst.buffer, vk::BufferCopy {
            src_offset: 0,
            dst_offset: dst_range.offset,
            size,
        });
        self.finish_buffer_write(dst, dst_range.offset, size)?;

        self.dispose(staging);
        engine_trace!("speed::vulkan::CommandBuffer", "Recorded {} byte buffer copy", size);
        Ok(())
    }

    pub(crate) fn upload_to_buffer(
        &mut self,
        dst: &dyn DeviceBuffer,
        dst_range: BufferRange,
        data: &[u8],
        src_range: BufferRange,
    ) -> Result<()> {
        self.require_recording("upload_buffer")?;
        let dst = as_vulkan_buffer(dst)?;
        validate_buffer_copy(dst.size(), dst_range, data.len() as u64, src_range)?;

        let size = src_range.size;
        if size == 0 {
            return Ok(());
        }

        let start = src_range.offset as usize;
        let staging = self.stage_bytes(&data[start..start + size as usize])?;

        self.record_copy_buffer(staging.buffer, dst.buffer, vk::BufferCopy {
            src_offset: 0,
            dst_offset: dst_range.offset,
            size,
        });
        self.finish_buffer_write(dst, dst_range.offset, size)?;

        self.dispose(staging);
        Ok(())
    }

    pub(crate) fn transfer_texture(
        &mut self,
        dst: &dyn Texture,
        dst_region: TextureRegion,
        src: &dyn Texture,
        src_region: TextureRegion,
    ) -> Result<()> {
        self.require_recording("copy_texture")?;
        let dst = as_vulkan_texture(dst)?;
        let src = as_vulkan_texture(src)?;
        validate_texture_copy(dst.info(), dst_region, src.info(), src_region)?;
        let src_image = src.image()?;
        let dst_image = dst.image()?;

        src.transition_layout_range(self, TextureLayout::TransferSource, src.subresource_range(), false)?;
        dst.transition_layout_range(self, TextureLayout::TransferDestination, dst.subresource_range(), false)?;

        self.record_copy_image(src_image, dst_image, vk::ImageCopy {
            src_subresource: base_layer(src),
            src_offset: image_offset(src_region),
            dst_subresource: base_layer(dst),
            dst_offset: image_offset(dst_region),
            extent: image_extent(src_region),
        });

        self.finish_texture_write(dst)
    }

    pub(crate) fn transfer_buffer_to_texture(
        &mut self,
        dst: &dyn Texture,
        region: TextureRegion,
        src: &dyn DeviceBuffer,
        src_offset: u64,
    ) -> Result<()> {
        self.require_recording("copy_buffer_to_texture")?;
        let dst = as_vulkan_texture(dst)?;
        let src = as_vulkan_buffer(src)?;
        validate_buffer_texture_copy(src.size(), src_offset, dst.info(), region)?;
        let dst_image = dst.image()?;

        dst.transition_layout_range(self, TextureLayout::TransferDestination, dst.subresource_range(), false)?;
        self.record_copy_buffer_to_image(src.buffer, dst_image, buffer_image_copy(src_offset, dst, region));

        self.finish_texture_write(dst)
    }

    pub(crate) fn transfer_texture_to_buffer(
        &mut self,
        dst: &dyn DeviceBuffer,
        dst_offset: u64,
        src: &dyn Texture,
        region: TextureRegion,
    ) -> Result<()> {
        self.require_recording("copy_texture_to_buffer")?;
        let dst = as_vulkan_buffer(dst)?;
        let src = as_vulkan_texture(src)?;
        let size = validate_buffer_texture_copy(dst.size(), dst_offset, src.info(), region)?;
        let src_image = src.image()?;

        src.transition_layout_range(self, TextureLayout::TransferSource, src.subresource_range(), false)?;
        self.record_copy_image_to_buffer(src_image, dst.buffer, buffer_image_copy(dst_offset, src, region));

        self.finish_buffer_write(dst, dst_offset, size)
    }

    pub(crate) fn upload_to_texture(&mut self, dst: &dyn Texture, region: TextureRegion, data: &[u8]) -> Result<()> {
        self.require_recording("upload_texture")?;
        let dst = as_vulkan_texture(dst)?;
        validate_texture_region(dst.info(), region, "destination")?;

        let size = texture_region_byte_size(dst.info().format, region)?;
        if data.len() as u64 != size {
            engine_bail_warn!("speed::vulkan::CommandBuffer", OutOfBounds,
                "upload_texture: {} bytes provided for a {}x{} region of {} bytes",
                data.len(), region.width, region.height, size);
        }
        let dst_image = dst.image()?;

        let staging = self.stage_bytes(data)?;

        dst.transition_layout_range(self, TextureLayout::TransferDestination, dst.subresource_range(), false)?;
        self.record_copy_buffer_to_image(staging.buffer, dst_image, buffer_image_copy(0, dst, region));
        self.finish_texture_write(dst)?;

        self.dispose(staging);
        Ok(())
    }
}
