/// Texture - Vulkan implementation of the Texture trait
///
/// A texture is Unmaterialized until `create_image` allocates its image and
/// view. Swapchain images are wrapped as presentation-owned textures: only
/// their view belongs to us.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use speed_render::speed::{Error, Result};
use speed_render::speed::render::{CommandBuffer, Texture, TextureInfo, TextureLayout, TextureUsage};
use speed_render::{engine_bail_warn, engine_error, engine_trace, engine_warn_err};
use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::vulkan_barrier::{ownership_barrier, LayoutTransition};
use crate::vulkan_command_buffer::VulkanCommandBuffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_tools::{
    aspect_mask, sample_count_to_vk, texture_format_to_vk, texture_usage_to_vk, tiling_to_vk, vk_error,
};

/// Who owns the memory behind a materialized image
enum ImageMemory {
    /// Dedicated allocation released with the texture
    Owned(Allocation),
    /// Swapchain image owned by the presentation engine
    Presentation,
}

enum ImageState {
    Unmaterialized,
    Materialized {
        image: vk::Image,
        view: vk::ImageView,
        memory: ImageMemory,
    },
}

struct TextureState {
    image: ImageState,
    layout: TextureLayout,
}

/// Vulkan texture implementation
pub struct VulkanTexture {
    ctx: Arc<GpuContext>,
    info: TextureInfo,
    state: Mutex<TextureState>,
}

impl VulkanTexture {
    /// Create an unmaterialized texture
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for zero dimensions or mip count, a sample count
    /// outside 1..=127, or an initial layout other than Undefined
    pub(crate) fn new(ctx: Arc<GpuContext>, info: TextureInfo) -> Result<Self> {
        if info.width == 0 || info.height == 0 || info.mip_levels == 0 {
            engine_bail_warn!("speed::vulkan::Texture", InvalidArgument,
                "Texture dimensions and mip count must be non-zero ({}x{}, {} mips)",
                info.width, info.height, info.mip_levels);
        }
        if !(1..=0x7F).contains(&info.samples) {
            engine_bail_warn!("speed::vulkan::Texture", InvalidArgument,
                "Number of texture samples is out of range: {}", info.samples);
        }
        if info.layout != TextureLayout::Undefined {
            engine_bail_warn!("speed::vulkan::Texture", InvalidArgument,
                "Textures are created in the Undefined layout, got {:?}", info.layout);
        }

        let layout = info.layout;
        Ok(Self {
            ctx,
            info,
            state: Mutex::new(TextureState {
                image: ImageState::Unmaterialized,
                layout,
            }),
        })
    }

    /// Wrap a swapchain image
    ///
    /// Only the view is created (and later destroyed) here.
    pub(crate) fn from_presentation(ctx: Arc<GpuContext>, image: vk::Image, info: TextureInfo) -> Result<Self> {
        let view = Self::create_view(&ctx, image, &info)?;
        Ok(Self {
            ctx,
            info,
            state: Mutex::new(TextureState {
                image: ImageState::Materialized {
                    image,
                    view,
                    memory: ImageMemory::Presentation,
                },
                layout: TextureLayout::Undefined,
            }),
        })
    }

    fn create_view(ctx: &GpuContext, image: vk::Image, info: &TextureInfo) -> Result<vk::ImageView> {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(texture_format_to_vk(info.format))
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(Self::full_range(info));

        unsafe {
            ctx.device.create_image_view(&create_info, None)
                .map_err(|e| vk_error(e, "Failed to create image view"))
        }
    }

    fn full_range(info: &TextureInfo) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: aspect_mask(info.format),
            base_mip_level: 0,
            level_count: info.mip_levels,
            base_array_layer: 0,
            layer_count: 1,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TextureState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every mip level of the single layer
    pub fn subresource_range(&self) -> vk::ImageSubresourceRange {
        Self::full_range(&self.info)
    }

    /// Native image, `InvalidResource` while unmaterialized
    pub fn image(&self) -> Result<vk::Image> {
        match &self.lock().image {
            ImageState::Materialized { image, .. } => Ok(*image),
            ImageState::Unmaterialized => Err(Self::unmaterialized()),
        }
    }

    /// Native view, `InvalidResource` while unmaterialized
    pub fn view(&self) -> Result<vk::ImageView> {
        match &self.lock().image {
            ImageState::Materialized { view, .. } => Ok(*view),
            ImageState::Unmaterialized => Err(Self::unmaterialized()),
        }
    }

    /// Returns true for swapchain images
    pub fn is_presentation(&self) -> bool {
        matches!(
            self.lock().image,
            ImageState::Materialized { memory: ImageMemory::Presentation, .. }
        )
    }

    fn unmaterialized() -> Error {
        engine_warn_err!("speed::vulkan::Texture", InvalidResource,
            "Texture image has not been created")
    }

    /// Record a layout transition of `range`
    ///
    /// # Arguments
    ///
    /// * `cmd` - Command buffer to record into
    /// * `new_layout` - Target layout
    /// * `range` - Subresources to transition
    /// * `discard` - Treat the current layout as Undefined when a barrier is recorded
    ///
    /// # Returns
    ///
    /// `Ok(false)` if `cmd` is not recording (nothing recorded)
    pub fn transition_layout_range(
        &self,
        cmd: &mut VulkanCommandBuffer,
        new_layout: TextureLayout,
        range: vk::ImageSubresourceRange,
        discard: bool,
    ) -> Result<bool> {
        if !cmd.is_recording() {
            return Ok(false);
        }

        let mut state = self.lock();
        let ImageState::Materialized { image, .. } = state.image else {
            return Err(Self::unmaterialized());
        };

        if state.layout == new_layout {
            return Ok(true);
        }

        let old_layout = if discard { TextureLayout::Undefined } else { state.layout };
        let transition = LayoutTransition::between(old_layout, new_layout);
        cmd.record_image_barrier(&transition, image, range);

        engine_trace!("speed::vulkan::Texture", "Layout {:?} -> {:?}", old_layout, new_layout);
        state.layout = new_layout;
        Ok(true)
    }

    /// Move ownership of `range` from queue family `src_family` to `dst_family`
    ///
    /// No-op (returning `Ok(true)`) when both families are equal.
    pub fn transfer_queue_family(
        &self,
        cmd: &mut VulkanCommandBuffer,
        src_family: u32,
        dst_family: u32,
        range: vk::ImageSubresourceRange,
    ) -> Result<bool> {
        if !cmd.is_recording() {
            return Ok(false);
        }

        let state = self.lock();
        let ImageState::Materialized { image, .. } = state.image else {
            return Err(Self::unmaterialized());
        };

        if src_family == dst_family {
            return Ok(true);
        }

        let barrier = ownership_barrier(state.layout, src_family, dst_family, image, range);
        let stage = crate::vulkan_tools::layout_stage(state.layout);
        cmd.record_raw_image_barrier(stage, stage, barrier);
        Ok(true)
    }

    /// Commit a layout reached through a render pass (no barrier recorded)
    pub(crate) fn set_layout(&self, layout: TextureLayout) {
        self.lock().layout = layout;
    }
}

impl Texture for VulkanTexture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }

    fn layout(&self) -> TextureLayout {
        self.lock().layout
    }

    fn is_loaded(&self) -> bool {
        matches!(self.lock().image, ImageState::Materialized { .. })
    }

    fn create_image(&self) -> Result<()> {
        let mut state = self.lock();
        if matches!(state.image, ImageState::Materialized { .. }) {
            return Ok(());
        }

        let info = &self.info;
        let ctx = &self.ctx;
        let samples = sample_count_to_vk(info.samples)?;

        unsafe {
            let create_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(texture_format_to_vk(info.format))
                .extent(vk::Extent3D {
                    width: info.width,
                    height: info.height,
                    depth: 1,
                })
                .mip_levels(info.mip_levels)
                .array_layers(1)
                .samples(samples)
                .tiling(tiling_to_vk(info.tiling))
                .usage(texture_usage_to_vk(info.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = ctx.device.create_image(&create_info, None)
                .map_err(|e| vk_error(e, "Failed to create image"))?;

            let requirements = ctx.device.get_image_memory_requirements(image);

            let allocation = ctx.allocator().allocate(&AllocationCreateDesc {
                name: "texture",
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: matches!(info.tiling, speed_render::speed::render::TextureTiling::Linear),
                allocation_scheme: AllocationScheme::DedicatedImage(image),
            });

            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_image(image, None);
                    let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                    engine_error!("speed::vulkan::Texture",
                        "Out of GPU memory for texture {}x{} (required: {:.2} MB): {:?}",
                        info.width, info.height, size_mb, e);
                    return Err(Error::OutOfMemory);
                }
            };

            if let Err(e) = ctx.device.bind_image_memory(image, allocation.memory(), allocation.offset()) {
                ctx.allocator().free(allocation).ok();
                ctx.device.destroy_image(image, None);
                return Err(vk_error(e, "Failed to bind image memory"));
            }

            let view = match Self::create_view(ctx, image, info) {
                Ok(view) => view,
                Err(e) => {
                    ctx.allocator().free(allocation).ok();
                    ctx.device.destroy_image(image, None);
                    return Err(e);
                }
            };

            state.image = ImageState::Materialized {
                image,
                view,
                memory: ImageMemory::Owned(allocation),
            };
        }

        engine_trace!("speed::vulkan::Texture", "Materialized {}x{} {:?} texture",
            info.width, info.height, info.format);
        Ok(())
    }

    fn transition_layout(&self, cmd: &mut dyn CommandBuffer, new_layout: TextureLayout) -> Result<bool> {
        let cmd = VulkanCommandBuffer::downcast_mut(cmd)?;
        self.transition_layout_range(cmd, new_layout, self.subresource_range(), false)
    }

    fn force_transition_layout(&self, cmd: &mut dyn CommandBuffer, new_layout: TextureLayout) -> Result<bool> {
        let cmd = VulkanCommandBuffer::downcast_mut(cmd)?;
        self.transition_layout_range(cmd, new_layout, self.subresource_range(), true)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        let image_state = std::mem::replace(&mut state.image, ImageState::Unmaterialized);

        if let ImageState::Materialized { image, view, memory } = image_state {
            unsafe {
                self.ctx.device.destroy_image_view(view, None);

                if let ImageMemory::Owned(allocation) = memory {
                    self.ctx.allocator().free(allocation).ok();
                    self.ctx.device.destroy_image(image, None);
                }
            }
        }
    }
}

/// Downcast a shared texture to the Vulkan implementation
pub(crate) fn as_vulkan_texture(texture: &dyn Texture) -> Result<&VulkanTexture> {
    match texture.as_any().downcast_ref::<VulkanTexture>() {
        Some(texture) => Ok(texture),
        None => Err(engine_warn_err!("speed::vulkan::Texture", BackendMismatch,
            "Texture does not belong to the Vulkan backend")),
    }
}

/// Info of a swapchain image wrapped as a texture
pub(crate) fn presentation_info(width: u32, height: u32, format: speed_render::speed::render::TextureFormat) -> TextureInfo {
    TextureInfo::new(width, height, format, TextureUsage::ColorAttachment)
}
