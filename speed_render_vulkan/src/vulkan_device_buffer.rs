/// DeviceBuffer - Vulkan implementation of the DeviceBuffer trait

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use speed_render::speed::{Error, Result};
use speed_render::speed::render::{
    BufferMapType, BufferRange, BufferUsage, CommandBuffer, DeviceBuffer, HostMapping, MappedMemory,
};
use speed_render::{engine_bail_warn, engine_error, engine_trace};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_barrier::BufferBarrier;
use crate::vulkan_command_buffer::VulkanCommandBuffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_tools::{buffer_usage_to_vk, vk_error};

/// Vulkan device buffer with a dedicated allocation
///
/// Staging buffers live in host-visible coherent memory; every other usage
/// lives in device-local memory.
pub struct VulkanDeviceBuffer {
    ctx: Arc<GpuContext>,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: u64,
    usage: BufferUsage,
    mapping: HostMapping,
}

impl VulkanDeviceBuffer {
    /// Create a buffer and bind its memory
    ///
    /// # Arguments
    ///
    /// * `ctx` - Shared GPU context
    /// * `size` - Size in bytes (non-zero)
    /// * `usage` - Usage flags (non-empty)
    pub(crate) fn new(ctx: Arc<GpuContext>, size: u64, usage: BufferUsage) -> Result<Self> {
        if size == 0 {
            engine_bail_warn!("speed::vulkan::DeviceBuffer", InvalidArgument,
                "Device buffer size must be non-zero");
        }
        if usage.is_empty() {
            engine_bail_warn!("speed::vulkan::DeviceBuffer", InvalidArgument,
                "Device buffer usage must be non-empty");
        }

        unsafe {
            let create_info = vk::BufferCreateInfo::default()
                .size(size)
                .usage(buffer_usage_to_vk(usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = ctx.device.create_buffer(&create_info, None)
                .map_err(|e| vk_error(e, "Failed to create device buffer"))?;

            let requirements = ctx.device.get_buffer_memory_requirements(buffer);

            let location = if usage.contains(BufferUsage::STAGING) {
                MemoryLocation::GpuToCpu
            } else {
                MemoryLocation::GpuOnly
            };

            let allocation = ctx.allocator().allocate(&AllocationCreateDesc {
                name: "device buffer",
                requirements,
                location,
                linear: true,
                allocation_scheme: AllocationScheme::DedicatedBuffer(buffer),
            });

            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_buffer(buffer, None);
                    let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                    engine_error!("speed::vulkan::DeviceBuffer",
                        "Out of GPU memory for buffer (required: {:.2} MB): {:?}", size_mb, e);
                    return Err(Error::OutOfMemory);
                }
            };

            if let Err(e) = ctx.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                ctx.allocator().free(allocation).ok();
                ctx.device.destroy_buffer(buffer, None);
                return Err(vk_error(e, "Failed to bind buffer memory"));
            }

            engine_trace!("speed::vulkan::DeviceBuffer", "Created {} byte buffer ({:?})", size, usage);

            Ok(Self {
                ctx,
                buffer,
                allocation: Some(allocation),
                size,
                usage,
                mapping: HostMapping::new(),
            })
        }
    }
}

impl DeviceBuffer for VulkanDeviceBuffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn mapped_range(&self) -> Option<BufferRange> {
        self.mapping.active()
    }

    fn map_to_host(&self, map_type: BufferMapType, size: u64, offset: u64) -> Result<MappedMemory<'_>> {
        let base = self.allocation.as_ref().and_then(|allocation| allocation.mapped_ptr());

        match base {
            // SAFETY: the mapped pointer covers `self.size` bytes of coherent
            // host-visible memory owned by this buffer for its whole lifetime
            Some(base) => unsafe {
                self.mapping.map(base.cast(), self.size, self.usage, map_type, size, offset)
            },
            None if !self.can_be_mapped() => {
                engine_bail_warn!("speed::vulkan::DeviceBuffer", InvalidOperation,
                    "Device buffer must be created for staging use to be mapped")
            }
            None => Err(speed_render::engine_err!("speed::vulkan::DeviceBuffer",
                "Staging buffer memory is not host-visible")),
        }
    }

    fn barrier(&self, cmd: &mut dyn CommandBuffer) -> Result<bool> {
        let cmd = VulkanCommandBuffer::downcast_mut(cmd)?;
        if !cmd.is_recording() {
            return Ok(false);
        }

        let barrier = BufferBarrier::after_transfer(self.usage)?;
        cmd.record_buffer_barrier(&barrier, self.buffer, 0, self.size);
        Ok(true)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanDeviceBuffer {
    fn drop(&mut self) {
        unsafe {
            if let Some(allocation) = self.allocation.take() {
                self.ctx.allocator().free(allocation).ok();
            }
            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}

/// Downcast a shared device buffer to the Vulkan implementation
pub(crate) fn as_vulkan_buffer(buffer: &dyn DeviceBuffer) -> Result<&VulkanDeviceBuffer> {
    match buffer.as_any().downcast_ref::<VulkanDeviceBuffer>() {
        Some(buffer) => Ok(buffer),
        None => Err(speed_render::engine_warn_err!("speed::vulkan::DeviceBuffer", BackendMismatch,
            "Device buffer does not belong to the Vulkan backend")),
    }
}
