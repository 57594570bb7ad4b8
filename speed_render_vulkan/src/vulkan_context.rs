/// GpuContext - Instance, device and allocator shared by every Vulkan object
///
/// Every resource holds an `Arc<GpuContext>`, so the device outlives all of
/// them and is torn down exactly once, when the last resource is dropped.

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use speed_render::speed::{Config, Engine, Error, Result};
use speed_render::{engine_error, engine_info};
use std::ffi::CStr;
use std::mem::ManuallyDrop;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Window surface and its loader
pub(crate) struct SurfaceHandle {
    pub loader: ash::khr::surface::Instance,
    pub surface: vk::SurfaceKHR,
}

/// Validation messenger and its loader
struct DebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

/// Shared GPU context
pub struct GpuContext {
    /// Vulkan loader, must outlive the instance
    _entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) device: ash::Device,

    /// GPU memory allocator, dropped before the device
    allocator: ManuallyDrop<Mutex<Allocator>>,

    pub(crate) graphics_queue: vk::Queue,
    pub(crate) graphics_queue_family: u32,
    /// Present queue (same as graphics when headless)
    pub(crate) present_queue: vk::Queue,
    pub(crate) present_queue_family: u32,

    /// Window surface, `None` for headless contexts
    pub(crate) surface: Option<SurfaceHandle>,
    /// Swapchain loader, present only with a surface
    pub(crate) swapchain_loader: Option<ash::khr::swapchain::Device>,

    debug_messenger: Option<DebugMessenger>,

    pub(crate) config: Config,
}

fn init_failed(message: String) -> Error {
    engine_error!("speed::vulkan::GpuContext", "{}", message);
    Error::InitializationFailed(message)
}

fn has_extension(available: &[vk::ExtensionProperties], name: &CStr) -> bool {
    available
        .iter()
        .any(|extension| extension.extension_name_as_c_str().is_ok_and(|candidate| candidate == name))
}

impl GpuContext {
    /// Create a context without a window (offscreen rendering, tests)
    pub fn new_headless(config: Config) -> Result<Self> {
        Self::create(config, None)
    }

    /// Create a context presenting to `window`
    ///
    /// # Arguments
    ///
    /// * `window` - Window for surface creation
    /// * `config` - Backend configuration
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: Config) -> Result<Self> {
        let display_handle = window.display_handle()
            .map_err(|e| init_failed(format!("Failed to get display handle: {}", e)))?;
        let window_handle = window.window_handle()
            .map_err(|e| init_failed(format!("Failed to get window handle: {}", e)))?;

        Self::create(config, Some((display_handle.as_raw(), window_handle.as_raw())))
    }

    fn create(config: Config, window: Option<(RawDisplayHandle, RawWindowHandle)>) -> Result<Self> {
        Engine::set_min_severity(config.min_log_severity);

        let validation = config.enable_validation && cfg!(feature = "vulkan-validation");

        unsafe {
            let entry = ash::Entry::load()
                .map_err(|e| init_failed(format!("Failed to load Vulkan library: {:?}", e)))?;

            let app_name = std::ffi::CString::new(config.app_name.as_str())
                .map_err(|e| init_failed(format!("Invalid application name: {}", e)))?;
            let (major, minor, patch) = config.app_version;

            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, major, minor, patch))
                .engine_name(c"Speed")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            let mut extension_names = match window {
                Some((display, _)) => ash_window::enumerate_required_extensions(display)
                    .map_err(|e| init_failed(format!("Failed to get required extensions: {}", e)))?
                    .to_vec(),
                // Present layout stays valid offscreen when the loader offers surfaces
                None => {
                    let available = entry.enumerate_instance_extension_properties(None).unwrap_or_default();
                    if has_extension(&available, ash::khr::surface::NAME) {
                        vec![ash::khr::surface::NAME.as_ptr()]
                    } else {
                        Vec::new()
                    }
                }
            };
            let surface_extension = window.is_some() || !extension_names.is_empty();

            if validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            }

            let layer_names = if validation {
                vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
            } else {
                vec![]
            };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry.create_instance(&create_info, None)
                .map_err(|e| init_failed(format!("Failed to create Vulkan instance: {:?}", e)))?;

            let debug_messenger = if validation {
                match Self::create_debug_messenger(&entry, &instance) {
                    Ok(messenger) => Some(messenger),
                    Err(e) => {
                        instance.destroy_instance(None);
                        return Err(e);
                    }
                }
            } else {
                None
            };

            let surface = match window {
                Some((display, window)) => {
                    match ash_window::create_surface(&entry, &instance, display, window, None) {
                        Ok(surface) => Some(SurfaceHandle {
                            loader: ash::khr::surface::Instance::new(&entry, &instance),
                            surface,
                        }),
                        Err(e) => {
                            Self::destroy_instance(&instance, None, debug_messenger.as_ref());
                            return Err(init_failed(format!("Failed to create surface: {:?}", e)));
                        }
                    }
                }
                None => None,
            };

            match Self::create_device(&instance, surface.as_ref(), surface_extension) {
                Ok((physical_device, device, families)) => {
                    let (graphics_queue_family, present_queue_family) = families;
                    let graphics_queue = device.get_device_queue(graphics_queue_family, 0);
                    let present_queue = device.get_device_queue(present_queue_family, 0);

                    let allocator = Allocator::new(&AllocatorCreateDesc {
                        instance: instance.clone(),
                        device: device.clone(),
                        physical_device,
                        debug_settings: Default::default(),
                        buffer_device_address: false,
                        allocation_sizes: Default::default(),
                    });

                    let allocator = match allocator {
                        Ok(allocator) => allocator,
                        Err(e) => {
                            device.destroy_device(None);
                            Self::destroy_instance(&instance, surface.as_ref(), debug_messenger.as_ref());
                            return Err(init_failed(format!("Failed to create GPU allocator: {:?}", e)));
                        }
                    };

                    let swapchain_loader = surface
                        .as_ref()
                        .map(|_| ash::khr::swapchain::Device::new(&instance, &device));

                    let properties = instance.get_physical_device_properties(physical_device);
                    let name = CStr::from_ptr(properties.device_name.as_ptr()).to_string_lossy();
                    engine_info!("speed::vulkan::GpuContext",
                        "Using GPU '{}' (graphics family {}, present family {}, {})",
                        name, graphics_queue_family, present_queue_family,
                        if surface.is_some() { "windowed" } else { "headless" });

                    Ok(Self {
                        _entry: entry,
                        instance,
                        physical_device,
                        device,
                        allocator: ManuallyDrop::new(Mutex::new(allocator)),
                        graphics_queue,
                        graphics_queue_family,
                        present_queue,
                        present_queue_family,
                        surface,
                        swapchain_loader,
                        debug_messenger,
                        config,
                    })
                }
                Err(e) => {
                    Self::destroy_instance(&instance, surface.as_ref(), debug_messenger.as_ref());
                    Err(e)
                }
            }
        }
    }

    #[cfg(feature = "vulkan-validation")]
    unsafe fn create_debug_messenger(entry: &ash::Entry, instance: &ash::Instance) -> Result<DebugMessenger> {
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);

        let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
            )
            .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

        crate::debug::reset_validation_stats();

        let messenger = loader.create_debug_utils_messenger(&debug_info, None)
            .map_err(|e| init_failed(format!("Failed to create debug messenger: {:?}", e)))?;

        Ok(DebugMessenger { loader, messenger })
    }

    #[cfg(not(feature = "vulkan-validation"))]
    unsafe fn create_debug_messenger(_entry: &ash::Entry, _instance: &ash::Instance) -> Result<DebugMessenger> {
        Err(init_failed("Validation requires the vulkan-validation feature".to_string()))
    }

    /// Pick the first GPU with a graphics queue (and present support when
    /// windowed) and create the logical device
    ///
    /// # Returns
    ///
    /// Physical device, logical device and (graphics, present) queue families
    unsafe fn create_device(
        instance: &ash::Instance,
        surface: Option<&SurfaceHandle>,
        surface_extension: bool,
    ) -> Result<(vk::PhysicalDevice, ash::Device, (u32, u32))> {
        let physical_devices = instance.enumerate_physical_devices()
            .map_err(|e| init_failed(format!("Failed to enumerate physical devices: {:?}", e)))?;

        let mut selected = None;
        for physical_device in physical_devices {
            let queue_families = instance.get_physical_device_queue_family_properties(physical_device);

            let Some(graphics_family) = queue_families
                .iter()
                .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                .map(|index| index as u32)
            else {
                continue;
            };

            let present_family = match surface {
                Some(surface) => (0..queue_families.len() as u32).find(|&index| {
                    surface.loader
                        .get_physical_device_surface_support(physical_device, index, surface.surface)
                        .unwrap_or(false)
                }),
                None => Some(graphics_family),
            };

            if let Some(present_family) = present_family {
                selected = Some((physical_device, graphics_family, present_family));
                break;
            }
        }

        let Some((physical_device, graphics_family, present_family)) = selected else {
            return Err(init_failed("No Vulkan-capable GPU with a graphics queue found".to_string()));
        };

        let queue_priorities = [1.0];
        let mut queue_create_infos = vec![
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(graphics_family)
                .queue_priorities(&queue_priorities),
        ];
        if present_family != graphics_family {
            queue_create_infos.push(
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(present_family)
                    .queue_priorities(&queue_priorities),
            );
        }

        let swapchain_supported = surface.is_some() || (surface_extension && instance
            .enumerate_device_extension_properties(physical_device)
            .is_ok_and(|available| has_extension(&available, ash::khr::swapchain::NAME)));

        let device_extension_names = if swapchain_supported {
            vec![ash::khr::swapchain::NAME.as_ptr()]
        } else {
            vec![]
        };

        let mut vulkan12_features = vk::PhysicalDeviceVulkan12Features::default()
            .timeline_semaphore(true);

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&device_extension_names)
            .push_next(&mut vulkan12_features);

        let device = instance.create_device(physical_device, &device_create_info, None)
            .map_err(|e| init_failed(format!("Failed to create logical device: {:?}", e)))?;

        Ok((physical_device, device, (graphics_family, present_family)))
    }

    unsafe fn destroy_instance(
        instance: &ash::Instance,
        surface: Option<&SurfaceHandle>,
        debug_messenger: Option<&DebugMessenger>,
    ) {
        if let Some(surface) = surface {
            surface.loader.destroy_surface(surface.surface, None);
        }
        if let Some(debug) = debug_messenger {
            debug.loader.destroy_debug_utils_messenger(debug.messenger, None);
        }
        instance.destroy_instance(None);
    }

    /// Lock the allocator, recovering from a poisoned lock
    pub(crate) fn allocator(&self) -> MutexGuard<'_, Allocator> {
        self.allocator.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Swapchain loader, or `InvalidOperation` for headless contexts
    pub(crate) fn swapchain_loader(&self) -> Result<&ash::khr::swapchain::Device> {
        match self.swapchain_loader.as_ref() {
            Some(loader) => Ok(loader),
            None => Err(speed_render::engine_warn_err!("speed::vulkan::GpuContext", InvalidOperation,
                "Context was created without a surface")),
        }
    }

    /// Block until the device is idle
    pub fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.device.device_wait_idle()
                .map_err(|e| crate::vulkan_tools::vk_error(e, "Failed to wait for device idle"))
        }
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            // Allocator must release its memory blocks before the device goes away
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);
            Self::destroy_instance(&self.instance, self.surface.as_ref(), self.debug_messenger.as_ref());
        }
    }
}
