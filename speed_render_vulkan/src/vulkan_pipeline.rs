/// Pipeline - Vulkan graphics and compute pipelines

use ash::vk;
use speed_render::speed::Result;
use speed_render::speed::render::{Pipeline, PipelineInfo, PipelineType, RenderPass, Shader, ShaderType};
use speed_render::{engine_debug, engine_err, engine_warn_err};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_render_pass::as_vulkan_render_pass;
use crate::vulkan_shader::{as_vulkan_shader, VulkanShader};
use crate::vulkan_tools::{
    compare_op_to_vk, cull_mode_to_vk, descriptor_type_to_vk, front_face_to_vk, input_rate_to_vk,
    polygon_mode_to_vk, sample_count_to_vk, shader_stages_to_vk, vertex_format_to_vk, vk_error,
};

/// Vulkan pipeline with its layout and descriptor set layouts
pub struct VulkanPipeline {
    ctx: Arc<GpuContext>,
    pub(crate) pipeline: vk::Pipeline,
    pub(crate) layout: vk::PipelineLayout,
    set_layouts: Vec<vk::DescriptorSetLayout>,
    pipeline_type: PipelineType,
    /// Keeps the render pass alive as long as the pipeline
    _render_pass: Arc<dyn RenderPass>,
}

fn stage_info<'a>(shader: &'a VulkanShader) -> vk::PipelineShaderStageCreateInfo<'a> {
    vk::PipelineShaderStageCreateInfo::default()
        .stage(shader.stage)
        .module(shader.module)
        .name(&shader.entry_point_name)
}

impl VulkanPipeline {
    /// Create a pipeline from its declarative description
    ///
    /// Graphics pipelines target subpass 0 of `render_pass` with dynamic
    /// viewport and scissor.
    pub(crate) fn new(ctx: Arc<GpuContext>, info: PipelineInfo, render_pass: &Arc<dyn RenderPass>) -> Result<Self> {
        info.validate()?;
        let vk_render_pass = as_vulkan_render_pass(render_pass.as_ref())?;

        // Every shader must come from this backend, even unused ones
        let mut shaders = Vec::with_capacity(info.shaders.len());
        for shader in &info.shaders {
            shaders.push(as_vulkan_shader(shader.as_ref())?);
        }

        unsafe {
            let set_layouts = Self::create_set_layouts(&ctx, &info)?;

            let layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
            let layout = match ctx.device.create_pipeline_layout(&layout_info, None) {
                Ok(layout) => layout,
                Err(e) => {
                    Self::destroy_set_layouts(&ctx, &set_layouts);
                    return Err(vk_error(e, "Failed to create pipeline layout"));
                }
            };

            let pipeline = match info.pipeline_type {
                PipelineType::Graphics => Self::create_graphics(&ctx, &info, &shaders, layout, vk_render_pass.render_pass),
                PipelineType::Compute => Self::create_compute(&ctx, &shaders, layout),
            };

            let pipeline = match pipeline {
                Ok(pipeline) => pipeline,
                Err(e) => {
                    ctx.device.destroy_pipeline_layout(layout, None);
                    Self::destroy_set_layouts(&ctx, &set_layouts);
                    return Err(e);
                }
            };

            engine_debug!("speed::vulkan::Pipeline", "Created {:?} pipeline ({} descriptor sets)",
                info.pipeline_type, set_layouts.len());

            Ok(Self {
                ctx,
                pipeline,
                layout,
                set_layouts,
                pipeline_type: info.pipeline_type,
                _render_pass: Arc::clone(render_pass),
            })
        }
    }

    unsafe fn create_set_layouts(ctx: &GpuContext, info: &PipelineInfo) -> Result<Vec<vk::DescriptorSetLayout>> {
        let mut set_layouts = Vec::with_capacity(info.bindings.len());

        for set in &info.bindings {
            let bindings: Vec<vk::DescriptorSetLayoutBinding> = set
                .iter()
                .map(|binding| {
                    vk::DescriptorSetLayoutBinding::default()
                        .binding(binding.binding)
                        .descriptor_type(descriptor_type_to_vk(binding.descriptor_type))
                        .descriptor_count(binding.count)
                        .stage_flags(shader_stages_to_vk(binding.stages))
                })
                .collect();

            let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
            match ctx.device.create_descriptor_set_layout(&create_info, None) {
                Ok(set_layout) => set_layouts.push(set_layout),
                Err(e) => {
                    Self::destroy_set_layouts(ctx, &set_layouts);
                    return Err(vk_error(e, "Failed to create descriptor set layout"));
                }
            }
        }

        Ok(set_layouts)
    }

    unsafe fn destroy_set_layouts(ctx: &GpuContext, set_layouts: &[vk::DescriptorSetLayout]) {
        for set_layout in set_layouts {
            ctx.device.destroy_descriptor_set_layout(*set_layout, None);
        }
    }

    fn find<'a>(shaders: &[&'a VulkanShader], shader_type: ShaderType) -> Result<&'a VulkanShader> {
        match shaders.iter().find(|shader| shader.shader_type() == shader_type) {
            Some(shader) => Ok(*shader),
            None => Err(engine_warn_err!("speed::vulkan::Pipeline", InvalidArgument,
                "Pipeline requires a {:?} shader", shader_type)),
        }
    }

    unsafe fn create_graphics(
        ctx: &GpuContext,
        info: &PipelineInfo,
        shaders: &[&VulkanShader],
        layout: vk::PipelineLayout,
        render_pass: vk::RenderPass,
    ) -> Result<vk::Pipeline> {
        let vertex_shader = Self::find(shaders, ShaderType::Vertex)?;
        let fragment_shader = Self::find(shaders, ShaderType::Fragment)?;
        let stages = [stage_info(vertex_shader), stage_info(fragment_shader)];

        let vertex_bindings: Vec<vk::VertexInputBindingDescription> = info.vertex.bindings
            .iter()
            .map(|binding| vk::VertexInputBindingDescription {
                binding: binding.slot,
                stride: binding.stride,
                input_rate: input_rate_to_vk(binding.input_rate),
            })
            .collect();

        let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = info.vertex.attributes
            .iter()
            .map(|attribute| vk::VertexInputAttributeDescription {
                location: attribute.location,
                binding: attribute.slot,
                format: vertex_format_to_vk(attribute.format),
                offset: attribute.offset,
            })
            .collect();

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Static extent, overridden by the dynamic viewport/scissor state
        let viewports = [vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: info.viewport.x as f32,
            height: info.viewport.y as f32,
            min_depth: info.depth.min_depth,
            max_depth: info.depth.max_depth,
        }];
        let scissors = [vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: vk::Extent2D {
                width: info.viewport.x,
                height: info.viewport.y,
            },
        }];
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(polygon_mode_to_vk(info.rasterization.polygon_mode))
            .line_width(1.0)
            .cull_mode(cull_mode_to_vk(info.rasterization.cull_mode))
            .front_face(front_face_to_vk(info.rasterization.front_face))
            .depth_bias_enable(false);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(sample_count_to_vk(info.samples)?);

        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(info.depth.enable_depth_test)
            .depth_write_enable(info.depth.enable_depth_test)
            .depth_compare_op(compare_op_to_vk(info.depth.comparator))
            .depth_bounds_test_enable(false)
            .min_depth_bounds(info.depth.min_depth)
            .max_depth_bounds(info.depth.max_depth)
            .stencil_test_enable(false);

        let blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = (0..info.color_attachment_count)
            .map(|_| {
                vk::PipelineColorBlendAttachmentState::default()
                    .color_write_mask(vk::ColorComponentFlags::RGBA)
                    .blend_enable(false)
            })
            .collect();

        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default()
            .dynamic_states(&dynamic_states);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .depth_stencil_state(&depth_stencil_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0);

        let pipelines = ctx.device
            .create_graphics_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&create_info), None)
            .map_err(|(_, e)| vk_error(e, "Failed to create graphics pipeline"))?;

        match pipelines.first() {
            Some(pipeline) => Ok(*pipeline),
            None => Err(engine_err!("speed::vulkan::Pipeline", "Driver returned no graphics pipeline")),
        }
    }

    unsafe fn create_compute(
        ctx: &GpuContext,
        shaders: &[&VulkanShader],
        layout: vk::PipelineLayout,
    ) -> Result<vk::Pipeline> {
        let compute_shader = Self::find(shaders, ShaderType::Compute)?;

        let create_info = vk::ComputePipelineCreateInfo::default()
            .stage(stage_info(compute_shader))
            .layout(layout);

        let pipelines = ctx.device
            .create_compute_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&create_info), None)
            .map_err(|(_, e)| vk_error(e, "Failed to create compute pipeline"))?;

        match pipelines.first() {
            Some(pipeline) => Ok(*pipeline),
            None => Err(engine_err!("speed::vulkan::Pipeline", "Driver returned no compute pipeline")),
        }
    }

    /// Bind point matching the pipeline type
    pub(crate) fn bind_point(&self) -> vk::PipelineBindPoint {
        match self.pipeline_type {
            PipelineType::Graphics => vk::PipelineBindPoint::GRAPHICS,
            PipelineType::Compute => vk::PipelineBindPoint::COMPUTE,
        }
    }
}

impl Pipeline for VulkanPipeline {
    fn pipeline_type(&self) -> PipelineType {
        self.pipeline_type
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanPipeline {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline(self.pipeline, None);
            self.ctx.device.destroy_pipeline_layout(self.layout, None);
            Self::destroy_set_layouts(&self.ctx, &self.set_layouts);
        }
    }
}

/// Downcast a shared pipeline to the Vulkan implementation
pub(crate) fn as_vulkan_pipeline(pipeline: &dyn Pipeline) -> Result<&VulkanPipeline> {
    match pipeline.as_any().downcast_ref::<VulkanPipeline>() {
        Some(pipeline) => Ok(pipeline),
        None => Err(engine_warn_err!("speed::vulkan::Pipeline", BackendMismatch,
            "Pipeline does not belong to the Vulkan backend")),
    }
}
