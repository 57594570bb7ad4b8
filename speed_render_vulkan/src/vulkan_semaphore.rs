/// Semaphore - Vulkan timeline semaphore

use ash::vk;
use speed_render::speed::Result;
use speed_render::speed::render::Semaphore;
use speed_render::{engine_bail_warn, engine_warn};
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::vulkan_context::GpuContext;
use crate::vulkan_tools::vk_error;

/// Vulkan timeline semaphore
pub struct VulkanSemaphore {
    ctx: Arc<GpuContext>,
    pub(crate) semaphore: vk::Semaphore,
    /// Last value observed by the host
    cached: AtomicU64,
}

impl VulkanSemaphore {
    /// Create a timeline semaphore starting at `initial_value`
    pub(crate) fn new(ctx: Arc<GpuContext>, initial_value: u64) -> Result<Self> {
        let mut type_info = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(initial_value);
        let create_info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);

        let semaphore = unsafe {
            ctx.device.create_semaphore(&create_info, None)
                .map_err(|e| vk_error(e, "Failed to create timeline semaphore"))?
        };

        Ok(Self {
            ctx,
            semaphore,
            cached: AtomicU64::new(initial_value),
        })
    }

    fn observe(&self, value: u64) {
        self.cached.fetch_max(value, Ordering::AcqRel);
    }
}

impl Semaphore for VulkanSemaphore {
    fn value(&self) -> Result<u64> {
        let value = unsafe {
            self.ctx.device.get_semaphore_counter_value(self.semaphore)
                .map_err(|e| vk_error(e, "Failed to read timeline semaphore"))?
        };
        self.observe(value);
        Ok(value)
    }

    fn cached_value(&self) -> u64 {
        self.cached.load(Ordering::Acquire)
    }

    fn signal(&self, value: u64) -> Result<()> {
        let cached = self.cached_value();
        if value <= cached {
            engine_bail_warn!("speed::vulkan::Semaphore", InvalidArgument,
                "Signaled value {} must be greater than the current value {}", value, cached);
        }

        let signal_info = vk::SemaphoreSignalInfo::default()
            .semaphore(self.semaphore)
            .value(value);

        unsafe {
            self.ctx.device.signal_semaphore(&signal_info)
                .map_err(|e| vk_error(e, "Failed to signal timeline semaphore"))?;
        }
        self.observe(value);
        Ok(())
    }

    fn wait(&self, target: u64, timeout: Duration) -> Result<Option<u64>> {
        let semaphores = [self.semaphore];
        let values = [target];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);

        let timeout_ns = u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX);
        match unsafe { self.ctx.device.wait_semaphores(&wait_info, timeout_ns) } {
            Ok(()) => self.value().map(Some),
            Err(vk::Result::TIMEOUT) => {
                engine_warn!("speed::vulkan::Semaphore",
                    "Timed out after {:?} waiting for value {} (last observed {})",
                    timeout, target, self.cached_value());
                Ok(None)
            }
            Err(e) => Err(vk_error(e, "Failed to wait on timeline semaphore")),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanSemaphore {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_semaphore(self.semaphore, None);
        }
    }
}
