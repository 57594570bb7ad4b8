/// Vulkan result checking and the fixed conversion tables between the
/// backend-agnostic types and their native counterparts

use ash::vk;
use speed_render::speed::{Error, Result};
use speed_render::speed::render::{
    BufferUsage, CullMode, DepthComparator, DescriptorType, FrontFace, IndexType, LoadOp,
    PolygonMode, PresentMode, ShaderStages, ShaderType, TextureFormat, TextureLayout, TextureTiling,
    TextureUsage, VertexFormat, VertexInputRate,
};
use speed_render::{engine_error, engine_warn, engine_bail_warn};

// ===== RESULT CHECKING =====

/// Turn a native error into a fatal `Error`, logging it once
///
/// # Arguments
///
/// * `result` - Native error code
/// * `what` - Description of the failed call, used in the message
pub(crate) fn vk_error(result: vk::Result, what: &str) -> Error {
    match result {
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
            engine_error!("speed::vulkan", "{}: out of memory ({:?})", what, result);
            Error::OutOfMemory
        }
        _ => {
            engine_error!("speed::vulkan", "{}: {:?}", what, result);
            Error::BackendError(format!("{}: {:?}", what, result))
        }
    }
}

/// Classify a native result code
///
/// SUCCESS passes; TIMEOUT, NOT_READY and SUBOPTIMAL are recoverable and only
/// logged as warnings; everything else is fatal.
pub(crate) fn ensure(result: vk::Result, what: &str) -> Result<()> {
    match result {
        vk::Result::SUCCESS => Ok(()),
        recoverable if is_recoverable(recoverable) => {
            engine_warn!("speed::vulkan", "{}: {:?}", what, recoverable);
            Ok(())
        }
        _ => Err(vk_error(result, what)),
    }
}

/// Returns true for result codes `ensure` treats as recoverable
pub(crate) fn is_recoverable(result: vk::Result) -> bool {
    matches!(
        result,
        vk::Result::TIMEOUT | vk::Result::NOT_READY | vk::Result::SUBOPTIMAL_KHR
    )
}

// ===== FORMATS =====

pub(crate) fn texture_format_to_vk(format: TextureFormat) -> vk::Format {
    match format {
        TextureFormat::R8_UNORM => vk::Format::R8_UNORM,
        TextureFormat::R8G8_UNORM => vk::Format::R8G8_UNORM,
        TextureFormat::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
        TextureFormat::R8G8B8A8_SRGB => vk::Format::R8G8B8A8_SRGB,
        TextureFormat::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
        TextureFormat::B8G8R8A8_SRGB => vk::Format::B8G8R8A8_SRGB,
        TextureFormat::R16G16B16A16_SFLOAT => vk::Format::R16G16B16A16_SFLOAT,
        TextureFormat::R32_UINT => vk::Format::R32_UINT,
        TextureFormat::R32_SFLOAT => vk::Format::R32_SFLOAT,
        TextureFormat::R32G32B32A32_SFLOAT => vk::Format::R32G32B32A32_SFLOAT,
        TextureFormat::D16_UNORM => vk::Format::D16_UNORM,
        TextureFormat::D32_FLOAT => vk::Format::D32_SFLOAT,
        TextureFormat::D24_UNORM_S8_UINT => vk::Format::D24_UNORM_S8_UINT,
        TextureFormat::D32_FLOAT_S8_UINT => vk::Format::D32_SFLOAT_S8_UINT,
        TextureFormat::BC1_RGBA_UNORM => vk::Format::BC1_RGBA_UNORM_BLOCK,
        TextureFormat::BC3_UNORM => vk::Format::BC3_UNORM_BLOCK,
        TextureFormat::BC7_UNORM => vk::Format::BC7_UNORM_BLOCK,
    }
}

/// Reverse of `texture_format_to_vk` for formats reported by the driver
pub(crate) fn vk_format_to_texture(format: vk::Format) -> Result<TextureFormat> {
    let converted = match format {
        vk::Format::R8_UNORM => TextureFormat::R8_UNORM,
        vk::Format::R8G8_UNORM => TextureFormat::R8G8_UNORM,
        vk::Format::R8G8B8A8_UNORM => TextureFormat::R8G8B8A8_UNORM,
        vk::Format::R8G8B8A8_SRGB => TextureFormat::R8G8B8A8_SRGB,
        vk::Format::B8G8R8A8_UNORM => TextureFormat::B8G8R8A8_UNORM,
        vk::Format::B8G8R8A8_SRGB => TextureFormat::B8G8R8A8_SRGB,
        vk::Format::R16G16B16A16_SFLOAT => TextureFormat::R16G16B16A16_SFLOAT,
        vk::Format::R32_UINT => TextureFormat::R32_UINT,
        vk::Format::R32_SFLOAT => TextureFormat::R32_SFLOAT,
        vk::Format::R32G32B32A32_SFLOAT => TextureFormat::R32G32B32A32_SFLOAT,
        vk::Format::D16_UNORM => TextureFormat::D16_UNORM,
        vk::Format::D32_SFLOAT => TextureFormat::D32_FLOAT,
        vk::Format::D24_UNORM_S8_UINT => TextureFormat::D24_UNORM_S8_UINT,
        vk::Format::D32_SFLOAT_S8_UINT => TextureFormat::D32_FLOAT_S8_UINT,
        vk::Format::BC1_RGBA_UNORM_BLOCK => TextureFormat::BC1_RGBA_UNORM,
        vk::Format::BC3_UNORM_BLOCK => TextureFormat::BC3_UNORM,
        vk::Format::BC7_UNORM_BLOCK => TextureFormat::BC7_UNORM,
        other => engine_bail_warn!("speed::vulkan", InvalidArgument,
            "Native format {:?} has no texture format counterpart", other),
    };
    Ok(converted)
}

/// Aspects covered by a whole-image barrier or copy
pub(crate) fn aspect_mask(format: TextureFormat) -> vk::ImageAspectFlags {
    if format.has_stencil() {
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    } else if format.is_depth() {
        vk::ImageAspectFlags::DEPTH
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

pub(crate) fn vertex_format_to_vk(format: VertexFormat) -> vk::Format {
    match format {
        VertexFormat::Float => vk::Format::R32_SFLOAT,
        VertexFormat::Float2 => vk::Format::R32G32_SFLOAT,
        VertexFormat::Float3 => vk::Format::R32G32B32_SFLOAT,
        VertexFormat::Float4 => vk::Format::R32G32B32A32_SFLOAT,
        VertexFormat::UInt => vk::Format::R32_UINT,
        VertexFormat::Int => vk::Format::R32_SINT,
        VertexFormat::UByte4Norm => vk::Format::R8G8B8A8_UNORM,
    }
}

// ===== LAYOUTS =====

pub(crate) fn layout_to_vk(layout: TextureLayout) -> vk::ImageLayout {
    match layout {
        TextureLayout::Undefined => vk::ImageLayout::UNDEFINED,
        TextureLayout::General => vk::ImageLayout::GENERAL,
        TextureLayout::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        TextureLayout::DepthStencilAttachment => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        TextureLayout::TransferSource => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        TextureLayout::TransferDestination => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        TextureLayout::Present => vk::ImageLayout::PRESENT_SRC_KHR,
    }
}

/// Pipeline stage that produces or consumes a texture in `layout`
pub(crate) fn layout_stage(layout: TextureLayout) -> vk::PipelineStageFlags {
    match layout {
        TextureLayout::Undefined | TextureLayout::ColorAttachment => vk::PipelineStageFlags::TOP_OF_PIPE,
        TextureLayout::TransferDestination | TextureLayout::TransferSource => vk::PipelineStageFlags::TRANSFER,
        TextureLayout::DepthStencilAttachment => vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        TextureLayout::Present => vk::PipelineStageFlags::BOTTOM_OF_PIPE,
        TextureLayout::General => vk::PipelineStageFlags::ALL_COMMANDS,
    }
}

/// Memory access performed on a texture in `layout`
pub(crate) fn layout_access(layout: TextureLayout) -> vk::AccessFlags {
    match layout {
        TextureLayout::Undefined | TextureLayout::ColorAttachment | TextureLayout::Present => {
            vk::AccessFlags::NONE
        }
        TextureLayout::TransferDestination => vk::AccessFlags::TRANSFER_WRITE,
        TextureLayout::TransferSource => vk::AccessFlags::TRANSFER_READ,
        TextureLayout::DepthStencilAttachment => {
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE
        }
        TextureLayout::General => vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
    }
}

// ===== USAGES =====

/// Native usage flags; every buffer can take part in transfers
pub(crate) fn buffer_usage_to_vk(usage: BufferUsage) -> vk::BufferUsageFlags {
    let mut flags = vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::TRANSFER_DST;
    if usage.contains(BufferUsage::VERTEX) {
        flags |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if usage.contains(BufferUsage::INDEX) {
        flags |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if usage.contains(BufferUsage::UNIFORM) {
        flags |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if usage.contains(BufferUsage::STORAGE) {
        flags |= vk::BufferUsageFlags::STORAGE_BUFFER;
    }
    flags
}

/// Access mask of a buffer's usage: the union over every usage flag
pub(crate) fn buffer_usage_access(usage: BufferUsage) -> Result<vk::AccessFlags> {
    if usage.is_empty() {
        engine_bail_warn!("speed::vulkan", InvalidArgument, "Buffer usage set is empty");
    }

    let mut access = vk::AccessFlags::NONE;
    if usage.contains(BufferUsage::VERTEX) {
        access |= vk::AccessFlags::VERTEX_ATTRIBUTE_READ;
    }
    if usage.contains(BufferUsage::INDEX) {
        access |= vk::AccessFlags::INDEX_READ;
    }
    if usage.contains(BufferUsage::UNIFORM) {
        access |= vk::AccessFlags::UNIFORM_READ;
    }
    if usage.contains(BufferUsage::STORAGE) {
        access |= vk::AccessFlags::SHADER_READ | vk::AccessFlags::SHADER_WRITE;
    }
    if usage.contains(BufferUsage::STAGING) {
        access |= vk::AccessFlags::TRANSFER_READ | vk::AccessFlags::TRANSFER_WRITE;
    }
    Ok(access)
}

/// Stage at which a buffer's usage first reads it
pub(crate) fn buffer_usage_stage(usage: BufferUsage) -> vk::PipelineStageFlags {
    if usage.contains(BufferUsage::VERTEX) {
        vk::PipelineStageFlags::VERTEX_INPUT
    } else {
        vk::PipelineStageFlags::ALL_COMMANDS
    }
}

/// Native usage flags of a texture; every texture can take part in transfers
pub(crate) fn texture_usage_to_vk(usage: TextureUsage) -> vk::ImageUsageFlags {
    let transfer = vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST;
    transfer
        | match usage {
            TextureUsage::Sampled => vk::ImageUsageFlags::SAMPLED,
            TextureUsage::Storage => vk::ImageUsageFlags::STORAGE,
            TextureUsage::ColorAttachment => vk::ImageUsageFlags::COLOR_ATTACHMENT,
            TextureUsage::DepthStencilAttachment => vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            TextureUsage::InputAttachment => vk::ImageUsageFlags::INPUT_ATTACHMENT,
        }
}

/// Access performed by a texture's usage after a transfer
pub(crate) fn texture_usage_access(usage: TextureUsage) -> vk::AccessFlags {
    match usage {
        TextureUsage::Sampled => vk::AccessFlags::SHADER_READ,
        TextureUsage::Storage => vk::AccessFlags::SHADER_READ | vk::AccessFlags::SHADER_WRITE,
        TextureUsage::ColorAttachment => {
            vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE
        }
        TextureUsage::DepthStencilAttachment => vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ,
        TextureUsage::InputAttachment => vk::AccessFlags::INPUT_ATTACHMENT_READ,
    }
}

pub(crate) fn tiling_to_vk(tiling: TextureTiling) -> vk::ImageTiling {
    match tiling {
        TextureTiling::Optimal => vk::ImageTiling::OPTIMAL,
        TextureTiling::Linear => vk::ImageTiling::LINEAR,
    }
}

/// Sample count flag for `samples` (a power of two up to 64)
pub(crate) fn sample_count_to_vk(samples: u32) -> Result<vk::SampleCountFlags> {
    let flags = match samples {
        1 => vk::SampleCountFlags::TYPE_1,
        2 => vk::SampleCountFlags::TYPE_2,
        4 => vk::SampleCountFlags::TYPE_4,
        8 => vk::SampleCountFlags::TYPE_8,
        16 => vk::SampleCountFlags::TYPE_16,
        32 => vk::SampleCountFlags::TYPE_32,
        64 => vk::SampleCountFlags::TYPE_64,
        other => engine_bail_warn!("speed::vulkan", InvalidArgument,
            "Unsupported sample count {} (must be a power of two up to 64)", other),
    };
    Ok(flags)
}

pub(crate) fn present_mode_to_vk(mode: PresentMode) -> vk::PresentModeKHR {
    match mode {
        PresentMode::Fifo => vk::PresentModeKHR::FIFO,
        PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
    }
}

// ===== PIPELINE STATE =====

pub(crate) fn load_op_to_vk(load_op: LoadOp) -> vk::AttachmentLoadOp {
    match load_op {
        LoadOp::Load => vk::AttachmentLoadOp::LOAD,
        LoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
        LoadOp::DontCare => vk::AttachmentLoadOp::DONT_CARE,
    }
}

pub(crate) fn input_rate_to_vk(rate: VertexInputRate) -> vk::VertexInputRate {
    match rate {
        VertexInputRate::Vertex => vk::VertexInputRate::VERTEX,
        VertexInputRate::Instance => vk::VertexInputRate::INSTANCE,
    }
}

pub(crate) fn polygon_mode_to_vk(mode: PolygonMode) -> vk::PolygonMode {
    match mode {
        PolygonMode::Fill => vk::PolygonMode::FILL,
        PolygonMode::Line => vk::PolygonMode::LINE,
        PolygonMode::Point => vk::PolygonMode::POINT,
    }
}

pub(crate) fn cull_mode_to_vk(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
        CullMode::FrontAndBack => vk::CullModeFlags::FRONT_AND_BACK,
    }
}

pub(crate) fn front_face_to_vk(face: FrontFace) -> vk::FrontFace {
    match face {
        FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
        FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
    }
}

pub(crate) fn compare_op_to_vk(comparator: DepthComparator) -> vk::CompareOp {
    match comparator {
        DepthComparator::Never => vk::CompareOp::NEVER,
        DepthComparator::Less => vk::CompareOp::LESS,
        DepthComparator::Equal => vk::CompareOp::EQUAL,
        DepthComparator::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
        DepthComparator::Greater => vk::CompareOp::GREATER,
        DepthComparator::NotEqual => vk::CompareOp::NOT_EQUAL,
        DepthComparator::GreaterOrEqual => vk::CompareOp::GREATER_OR_EQUAL,
        DepthComparator::Always => vk::CompareOp::ALWAYS,
    }
}

pub(crate) fn descriptor_type_to_vk(descriptor_type: DescriptorType) -> vk::DescriptorType {
    match descriptor_type {
        DescriptorType::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        DescriptorType::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
        DescriptorType::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        DescriptorType::SampledImage => vk::DescriptorType::SAMPLED_IMAGE,
        DescriptorType::StorageImage => vk::DescriptorType::STORAGE_IMAGE,
        DescriptorType::InputAttachment => vk::DescriptorType::INPUT_ATTACHMENT,
    }
}

pub(crate) fn shader_type_to_vk(shader_type: ShaderType) -> vk::ShaderStageFlags {
    match shader_type {
        ShaderType::Vertex => vk::ShaderStageFlags::VERTEX,
        ShaderType::Fragment => vk::ShaderStageFlags::FRAGMENT,
        ShaderType::Compute => vk::ShaderStageFlags::COMPUTE,
    }
}

pub(crate) fn shader_stages_to_vk(stages: ShaderStages) -> vk::ShaderStageFlags {
    let mut flags = vk::ShaderStageFlags::empty();
    if stages.contains(ShaderStages::VERTEX) {
        flags |= vk::ShaderStageFlags::VERTEX;
    }
    if stages.contains(ShaderStages::FRAGMENT) {
        flags |= vk::ShaderStageFlags::FRAGMENT;
    }
    if stages.contains(ShaderStages::COMPUTE) {
        flags |= vk::ShaderStageFlags::COMPUTE;
    }
    flags
}

pub(crate) fn index_type_to_vk(index_type: IndexType) -> vk::IndexType {
    match index_type {
        IndexType::U16 => vk::IndexType::UINT16,
        IndexType::U32 => vk::IndexType::UINT32,
    }
}

#[cfg(test)]
#[path = "vulkan_tools_tests.rs"]
mod tests;
