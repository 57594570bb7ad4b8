/// Swapchain - Vulkan implementation of the Swapchain trait
///
/// Presentation only: acquisition is fenced with a bounded timeout and each
/// image is exposed as a framebuffer over a presentation-owned texture.

use ash::vk;
use speed_render::glam::UVec2;
use speed_render::speed::Result;
use speed_render::speed::render::{
    choose_extent, choose_image_count, AttachmentDescription, Framebuffer, PresentMode, RenderPass, Swapchain,
    SwapchainInfo, Texture, TextureFormat,
};
use speed_render::{engine_bail_warn, engine_debug, engine_warn, engine_warn_err};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::{GpuContext, SurfaceHandle};
use crate::vulkan_framebuffer::VulkanFramebuffer;
use crate::vulkan_texture::{presentation_info, VulkanTexture};
use crate::vulkan_tools::{
    ensure, is_recoverable, present_mode_to_vk, texture_format_to_vk, vk_error, vk_format_to_texture,
};

/// What the surface supports, queried at each (re)creation
#[derive(Debug, Clone, Default)]
pub struct SurfaceCapabilities {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceCapabilities {
    unsafe fn query(ctx: &GpuContext, surface: &SurfaceHandle) -> Result<Self> {
        let capabilities = surface.loader
            .get_physical_device_surface_capabilities(ctx.physical_device, surface.surface)
            .map_err(|e| vk_error(e, "Failed to get surface capabilities"))?;

        let formats = surface.loader
            .get_physical_device_surface_formats(ctx.physical_device, surface.surface)
            .map_err(|e| vk_error(e, "Failed to get surface formats"))?;

        let present_modes = surface.loader
            .get_physical_device_surface_present_modes(ctx.physical_device, surface.surface)
            .map_err(|e| vk_error(e, "Failed to get surface present modes"))?;

        Ok(Self { capabilities, formats, present_modes })
    }
}

/// Pick the present mode: the preferred one when offered, FIFO otherwise
pub(crate) fn choose_present_mode(available: &[vk::PresentModeKHR], preferred: PresentMode) -> vk::PresentModeKHR {
    let preferred = present_mode_to_vk(preferred);
    if available.contains(&preferred) {
        preferred
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Fails with `InvalidArgument` when the render pass's first color
/// attachment cannot render into images of `format`
pub(crate) fn check_attachment_format(format: TextureFormat, attachments: &[AttachmentDescription]) -> Result<()> {
    let Some(color) = attachments.iter().find(|attachment| !attachment.is_depth()) else {
        engine_bail_warn!("speed::vulkan::Swapchain", InvalidArgument,
            "Render pass has no color attachment for the swapchain images");
    };

    if color.format != format {
        engine_bail_warn!("speed::vulkan::Swapchain", InvalidArgument,
            "Surface format {:?} does not match the render pass color attachment format {:?}",
            format, color.format);
    }
    Ok(())
}

/// Pick the surface format
///
/// The requested format in the SRGB non-linear color space if the surface
/// offers it, otherwise the first reported format.
pub(crate) fn choose_surface_format(
    available: &[vk::SurfaceFormatKHR],
    requested: vk::Format,
) -> Option<vk::SurfaceFormatKHR> {
    available
        .iter()
        .find(|candidate| {
            candidate.format == requested && candidate.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| available.first())
        .copied()
}

/// Native extent reported by the surface, `None` when the swapchain decides
pub(crate) fn surface_current_extent(capabilities: &vk::SurfaceCapabilitiesKHR) -> Option<UVec2> {
    if capabilities.current_extent.width == u32::MAX {
        None
    } else {
        Some(UVec2::new(capabilities.current_extent.width, capabilities.current_extent.height))
    }
}

/// Vulkan swapchain implementation
pub struct VulkanSwapchain {
    ctx: Arc<GpuContext>,
    render_pass: Arc<dyn RenderPass>,
    info: SwapchainInfo,
    /// Null while no native swapchain is live
    swapchain: vk::SwapchainKHR,
    acquire_fence: vk::Fence,
    framebuffers: Vec<Arc<dyn Framebuffer>>,
    extent: UVec2,
    format: TextureFormat,
    present_mode: vk::PresentModeKHR,
    current_image: u32,
    /// Snapshot taken by the last `create`
    surface_capabilities: SurfaceCapabilities,
}

impl VulkanSwapchain {
    /// Build an inactive swapchain; `create` makes it live
    pub(crate) fn new(ctx: Arc<GpuContext>, info: SwapchainInfo, render_pass: &Arc<dyn RenderPass>) -> Result<Self> {
        ctx.swapchain_loader()?;
        crate::vulkan_render_pass::as_vulkan_render_pass(render_pass.as_ref())?;

        Ok(Self {
            ctx,
            render_pass: Arc::clone(render_pass),
            info,
            swapchain: vk::SwapchainKHR::null(),
            acquire_fence: vk::Fence::null(),
            framebuffers: Vec::new(),
            extent: UVec2::new(info.width, info.height),
            format: info.format,
            present_mode: vk::PresentModeKHR::FIFO,
            current_image: 0,
            surface_capabilities: SurfaceCapabilities::default(),
        })
    }

    pub(crate) fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Surface capabilities, formats and present modes seen by the last (re)creation
    pub fn surface_capabilities(&self) -> &SurfaceCapabilities {
        &self.surface_capabilities
    }

    /// Present mode of the live swapchain
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    unsafe fn create_native(&mut self) -> Result<()> {
        let loader = self.ctx.swapchain_loader()?;
        let Some(surface) = self.ctx.surface.as_ref() else {
            engine_bail_warn!("speed::vulkan::Swapchain", InvalidOperation,
                "Context was created without a surface");
        };

        self.surface_capabilities = SurfaceCapabilities::query(&self.ctx, surface)?;
        let SurfaceCapabilities { capabilities, formats, present_modes } = &self.surface_capabilities;
        let capabilities = *capabilities;

        let requested = texture_format_to_vk(self.info.format);
        let Some(surface_format) = choose_surface_format(formats, requested) else {
            engine_bail_warn!("speed::vulkan::Swapchain", InvalidResource,
                "Surface reports no pixel format");
        };
        if surface_format.format != requested {
            engine_warn!("speed::vulkan::Swapchain",
                "Surface does not offer {:?} in SRGB non-linear, falling back to {:?}",
                self.info.format, surface_format.format);
        }
        let format = vk_format_to_texture(surface_format.format)?;
        check_attachment_format(format, self.render_pass.attachments())?;

        let present_mode = choose_present_mode(present_modes, self.info.present_mode);
        if present_mode != present_mode_to_vk(self.info.present_mode) {
            engine_warn!("speed::vulkan::Swapchain",
                "Present mode {:?} is not supported by the surface, using FIFO", self.info.present_mode);
        }

        let extent = choose_extent(
            UVec2::new(self.info.width, self.info.height),
            surface_current_extent(&capabilities),
            UVec2::new(capabilities.min_image_extent.width, capabilities.min_image_extent.height),
            UVec2::new(capabilities.max_image_extent.width, capabilities.max_image_extent.height),
        );
        if extent.x == 0 || extent.y == 0 {
            engine_bail_warn!("speed::vulkan::Swapchain", InvalidArgument,
                "Swapchain extent must be non-zero ({}x{})", extent.x, extent.y);
        }

        let image_count = choose_image_count(
            self.info.required_images,
            capabilities.min_image_count,
            capabilities.max_image_count,
        );

        let pre_transform = if capabilities.supported_transforms.contains(vk::SurfaceTransformFlagsKHR::IDENTITY) {
            vk::SurfaceTransformFlagsKHR::IDENTITY
        } else {
            capabilities.current_transform
        };

        let queue_families = [self.ctx.graphics_queue_family, self.ctx.present_queue_family];
        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(vk::Extent2D { width: extent.x, height: extent.y })
            .image_array_layers(1)
            .image_usage(
                vk::ImageUsageFlags::COLOR_ATTACHMENT
                    | vk::ImageUsageFlags::TRANSFER_SRC
                    | vk::ImageUsageFlags::TRANSFER_DST,
            )
            .pre_transform(pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true);

        create_info = if queue_families[0] != queue_families[1] {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&queue_families)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let swapchain = loader.create_swapchain(&create_info, None)
            .map_err(|e| vk_error(e, "Failed to create swapchain"))?;
        self.swapchain = swapchain;
        self.extent = extent;
        self.format = format;
        self.present_mode = present_mode;
        self.current_image = 0;

        self.acquire_fence = self.ctx.device
            .create_fence(&vk::FenceCreateInfo::default(), None)
            .map_err(|e| vk_error(e, "Failed to create acquire fence"))?;

        let images = loader.get_swapchain_images(swapchain)
            .map_err(|e| vk_error(e, "Failed to get swapchain images"))?;

        for image in images {
            let texture: Arc<dyn Texture> = Arc::new(VulkanTexture::from_presentation(
                Arc::clone(&self.ctx),
                image,
                presentation_info(extent.x, extent.y, format),
            )?);
            let framebuffer = VulkanFramebuffer::new(
                Arc::clone(&self.ctx),
                extent.x,
                extent.y,
                vec![texture],
                &self.render_pass,
            )?;
            self.framebuffers.push(Arc::new(framebuffer));
        }

        engine_debug!("speed::vulkan::Swapchain", "Created {}x{} {:?} swapchain with {} images",
            extent.x, extent.y, format, self.framebuffers.len());
        Ok(())
    }
}

impl Swapchain for VulkanSwapchain {
    fn create(&mut self) -> Result<()> {
        if self.is_active() {
            engine_bail_warn!("speed::vulkan::Swapchain", InvalidOperation,
                "Swapchain must be destroyed before being created again");
        }

        let created = unsafe { self.create_native() };
        if created.is_err() {
            self.destroy();
        }
        created
    }

    fn destroy(&mut self) {
        if !self.is_active() && self.acquire_fence == vk::Fence::null() {
            return;
        }

        // Views and framebuffers first; the images belong to the swapchain
        self.framebuffers.clear();

        unsafe {
            if self.acquire_fence != vk::Fence::null() {
                self.ctx.device.destroy_fence(self.acquire_fence, None);
                self.acquire_fence = vk::Fence::null();
            }
            if self.swapchain != vk::SwapchainKHR::null() {
                if let Ok(loader) = self.ctx.swapchain_loader() {
                    loader.destroy_swapchain(self.swapchain, None);
                }
                self.swapchain = vk::SwapchainKHR::null();
            }
        }
    }

    fn is_active(&self) -> bool {
        self.swapchain != vk::SwapchainKHR::null()
    }

    fn next_image(&mut self) -> Result<Option<Arc<dyn Framebuffer>>> {
        if !self.is_active() {
            engine_bail_warn!("speed::vulkan::Swapchain", InvalidOperation,
                "next_image: the swapchain is not active");
        }

        let loader = self.ctx.swapchain_loader()?;
        let timeout = u64::try_from(self.ctx.config.acquire_timeout.as_nanos()).unwrap_or(u64::MAX);

        unsafe {
            self.ctx.device.reset_fences(&[self.acquire_fence])
                .map_err(|e| vk_error(e, "Failed to reset acquire fence"))?;

            let index = match loader.acquire_next_image(self.swapchain, timeout, vk::Semaphore::null(), self.acquire_fence) {
                Ok((index, suboptimal)) => {
                    if suboptimal {
                        engine_warn!("speed::vulkan::Swapchain", "Swapchain is suboptimal for the surface");
                    }
                    index
                }
                Err(e) if is_recoverable(e) => {
                    engine_warn!("speed::vulkan::Swapchain",
                        "Timed out acquiring a swapchain image after {:?}", self.ctx.config.acquire_timeout);
                    return Ok(None);
                }
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                    engine_warn!("speed::vulkan::Swapchain", "Swapchain is out of date, resize required");
                    return Ok(None);
                }
                Err(e) => return Err(vk_error(e, "Failed to acquire swapchain image")),
            };

            if let Err(e) = self.ctx.device.wait_for_fences(&[self.acquire_fence], true, timeout) {
                ensure(e, "Waiting for the presentation engine to release the acquired image")?;
            }

            match self.framebuffers.get(index as usize) {
                Some(framebuffer) => {
                    self.current_image = index;
                    Ok(Some(Arc::clone(framebuffer)))
                }
                None => Err(engine_warn_err!("speed::vulkan::Swapchain", InvalidResource,
                    "Acquired image index {} out of range ({} images)", index, self.framebuffers.len())),
            }
        }
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.ctx.wait_idle()?;
        self.destroy();
        self.info.width = width;
        self.info.height = height;
        self.create()
    }

    fn current_image(&self) -> u32 {
        self.current_image
    }

    fn image_count(&self) -> u32 {
        self.framebuffers.len() as u32
    }

    fn framebuffers(&self) -> &[Arc<dyn Framebuffer>] {
        &self.framebuffers
    }

    fn width(&self) -> u32 {
        self.extent.x
    }

    fn height(&self) -> u32 {
        self.extent.y
    }

    fn format(&self) -> TextureFormat {
        self.format
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanSwapchain {
    fn drop(&mut self) {
        self.ctx.wait_idle().ok();
        self.destroy();
    }
}

/// Downcast a swapchain to the Vulkan implementation
pub(crate) fn as_vulkan_swapchain(swapchain: &dyn Swapchain) -> Result<&VulkanSwapchain> {
    match swapchain.as_any().downcast_ref::<VulkanSwapchain>() {
        Some(swapchain) => Ok(swapchain),
        None => Err(engine_warn_err!("speed::vulkan::Swapchain", BackendMismatch,
            "Swapchain does not belong to the Vulkan backend")),
    }
}

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;
