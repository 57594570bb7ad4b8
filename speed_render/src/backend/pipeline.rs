/// Pipeline trait and the declarative pipeline descriptor

use std::any::Any;
use std::sync::Arc;
use glam::UVec2;
use crate::backend::shader::{Shader, ShaderStages, ShaderType};
use crate::error::Result;

/// Kind of pipeline, selects the bind point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineType {
    Graphics,
    Compute,
}

// ===== VERTEX INPUT =====

/// Vertex input rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexInputRate {
    Vertex,
    Instance,
}

/// Vertex attribute format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    Float,
    Float2,
    Float3,
    Float4,
    UInt,
    Int,
    UByte4Norm,
}

/// One vertex buffer binding slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBinding {
    pub slot: u32,
    pub stride: u32,
    pub input_rate: VertexInputRate,
}

/// One vertex attribute fed from a binding slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Shader input location
    pub location: u32,
    /// Binding slot the attribute reads from
    pub slot: u32,
    pub format: VertexFormat,
    /// Byte offset inside one vertex
    pub offset: u32,
}

/// Vertex input layout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexInputInfo {
    pub bindings: Vec<VertexBinding>,
    pub attributes: Vec<VertexAttribute>,
}

// ===== FIXED FUNCTION STATE =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolygonMode {
    #[default]
    Fill,
    Line,
    Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullMode {
    #[default]
    None,
    Front,
    Back,
    FrontAndBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrontFace {
    #[default]
    CounterClockwise,
    Clockwise,
}

/// Rasterizer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RasterizationInfo {
    pub polygon_mode: PolygonMode,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
}

/// Depth comparison function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepthComparator {
    Never,
    #[default]
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

/// Depth test state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthInfo {
    pub enable_depth_test: bool,
    pub comparator: DepthComparator,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Default for DepthInfo {
    fn default() -> Self {
        Self {
            enable_depth_test: false,
            comparator: DepthComparator::Less,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

// ===== DESCRIPTORS =====

/// Kind of resource bound to a descriptor slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorType {
    UniformBuffer,
    StorageBuffer,
    CombinedImageSampler,
    SampledImage,
    StorageImage,
    InputAttachment,
}

/// One binding of a descriptor set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    pub count: u32,
    pub stages: ShaderStages,
}

// ===== PIPELINE INFO =====

/// Declarative description of a pipeline
#[derive(Clone)]
pub struct PipelineInfo {
    pub pipeline_type: PipelineType,
    /// Shader set; graphics pipelines need a vertex and a fragment shader,
    /// compute pipelines a compute shader
    pub shaders: Vec<Arc<dyn Shader>>,
    pub vertex: VertexInputInfo,
    /// Static viewport extent (viewport and scissor are also dynamic state)
    pub viewport: UVec2,
    pub rasterization: RasterizationInfo,
    /// Rasterization samples
    pub samples: u32,
    pub depth: DepthInfo,
    pub color_attachment_count: u32,
    /// Descriptor bindings, one list per set
    pub bindings: Vec<Vec<DescriptorBinding>>,
}

impl PipelineInfo {
    /// Graphics pipeline with default fixed-function state and one color attachment
    pub fn graphics(shaders: Vec<Arc<dyn Shader>>, viewport: UVec2) -> Self {
        Self {
            pipeline_type: PipelineType::Graphics,
            shaders,
            vertex: VertexInputInfo::default(),
            viewport,
            rasterization: RasterizationInfo::default(),
            samples: 1,
            depth: DepthInfo::default(),
            color_attachment_count: 1,
            bindings: Vec::new(),
        }
    }

    /// Compute pipeline around a single compute shader
    pub fn compute(shader: Arc<dyn Shader>) -> Self {
        Self {
            pipeline_type: PipelineType::Compute,
            shaders: vec![shader],
            vertex: VertexInputInfo::default(),
            viewport: UVec2::ZERO,
            rasterization: RasterizationInfo::default(),
            samples: 1,
            depth: DepthInfo::default(),
            color_attachment_count: 0,
            bindings: Vec::new(),
        }
    }

    /// First shader of the given type
    pub fn shader(&self, shader_type: ShaderType) -> Option<&Arc<dyn Shader>> {
        self.shaders.iter().find(|shader| shader.shader_type() == shader_type)
    }

    /// Backend-independent checks run before any native object is created
    pub fn validate(&self) -> Result<()> {
        if !(1..=0x7F).contains(&self.samples) {
            crate::engine_bail_warn!("speed::Pipeline", InvalidArgument,
                "Number of pipeline samples is out of range: {}", self.samples);
        }

        if self.depth.min_depth > self.depth.max_depth {
            crate::engine_bail_warn!("speed::Pipeline", InvalidArgument,
                "Minimum depth value {} is bigger than maximum depth value {}",
                self.depth.min_depth, self.depth.max_depth);
        }

        match self.pipeline_type {
            PipelineType::Graphics => {
                if self.shader(ShaderType::Vertex).is_none() || self.shader(ShaderType::Fragment).is_none() {
                    crate::engine_bail_warn!("speed::Pipeline", InvalidArgument,
                        "Graphics pipeline requires a vertex and a fragment shader");
                }
            }
            PipelineType::Compute => {
                if self.shader(ShaderType::Compute).is_none() {
                    crate::engine_bail_warn!("speed::Pipeline", InvalidArgument,
                        "Compute pipeline requires a compute shader");
                }
            }
        }

        for attribute in &self.vertex.attributes {
            if !self.vertex.bindings.iter().any(|binding| binding.slot == attribute.slot) {
                crate::engine_bail_warn!("speed::Pipeline", InvalidArgument,
                    "Vertex attribute at location {} reads unbound slot {}", attribute.location, attribute.slot);
            }
        }

        Ok(())
    }
}

/// Pipeline resource trait
pub trait Pipeline: Send + Sync {
    fn pipeline_type(&self) -> PipelineType;

    /// Downcast support for backend checks
    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
