/// Shader - Vulkan implementation of the Shader trait

use ash::vk;
use speed_render::speed::Result;
use speed_render::speed::render::{Shader, ShaderDesc, ShaderType};
use speed_render::{engine_bail_warn, engine_debug, engine_warn_err};
use std::any::Any;
use std::ffi::CString;
use std::io::Cursor;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_tools::{shader_type_to_vk, vk_error};

/// Vulkan shader module
pub struct VulkanShader {
    ctx: Arc<GpuContext>,
    pub(crate) module: vk::ShaderModule,
    pub(crate) stage: vk::ShaderStageFlags,
    shader_type: ShaderType,
    entry_point: String,
    /// Null-terminated copy of `entry_point` for pipeline creation
    pub(crate) entry_point_name: CString,
}

/// Names of the entry points declared in a SPIR-V module
pub(crate) fn reflect_entry_points(code: &[u32]) -> Result<Vec<String>> {
    let entry_points = spirq::ReflectConfig::new()
        .spv(code)
        .reflect()
        .map_err(|e| engine_warn_err!("speed::vulkan::Shader", InvalidArgument,
            "SPIR-V reflection failed: {:?}", e))?;

    Ok(entry_points.into_iter().map(|entry_point| entry_point.name).collect())
}

impl VulkanShader {
    /// Create a shader module
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the bytecode length is not a multiple of 4, the
    /// bytecode is not valid SPIR-V, or the entry point is not declared
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: ShaderDesc<'_>) -> Result<Self> {
        if desc.code.is_empty() || desc.code.len() % 4 != 0 {
            engine_bail_warn!("speed::vulkan::Shader", InvalidArgument,
                "Shader code size must be a non-zero multiple of 4 (size: {} bytes)", desc.code.len());
        }

        let code = ash::util::read_spv(&mut Cursor::new(desc.code))
            .map_err(|e| engine_warn_err!("speed::vulkan::Shader", InvalidArgument,
                "Shader code is not SPIR-V: {}", e))?;

        let entry_points = reflect_entry_points(&code)?;
        if !entry_points.iter().any(|name| name == desc.entry_point) {
            engine_bail_warn!("speed::vulkan::Shader", InvalidArgument,
                "Entry point '{}' not found in shader module (available: {:?})",
                desc.entry_point, entry_points);
        }

        let entry_point_name = CString::new(desc.entry_point)
            .map_err(|_| engine_warn_err!("speed::vulkan::Shader", InvalidArgument,
                "Entry point name contains a null byte"))?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
        let module = unsafe {
            ctx.device.create_shader_module(&create_info, None)
                .map_err(|e| vk_error(e, "Failed to create shader module"))?
        };

        engine_debug!("speed::vulkan::Shader", "Created {:?} shader '{}' ({} words)",
            desc.shader_type, desc.entry_point, code.len());

        Ok(Self {
            ctx,
            module,
            stage: shader_type_to_vk(desc.shader_type),
            shader_type: desc.shader_type,
            entry_point: desc.entry_point.to_string(),
            entry_point_name,
        })
    }
}

impl Shader for VulkanShader {
    fn shader_type(&self) -> ShaderType {
        self.shader_type
    }

    fn entry_point(&self) -> &str {
        &self.entry_point
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanShader {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Downcast a shared shader to the Vulkan implementation
pub(crate) fn as_vulkan_shader(shader: &dyn Shader) -> Result<&VulkanShader> {
    match shader.as_any().downcast_ref::<VulkanShader>() {
        Some(shader) => Ok(shader),
        None => Err(engine_warn_err!("speed::vulkan::Shader", BackendMismatch,
            "Shader does not belong to the Vulkan backend")),
    }
}
