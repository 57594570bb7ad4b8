//! Unit tests for pipeline.rs (descriptor validation)

use crate::backend::pipeline::*;
use crate::backend::shader::{Shader, ShaderType};
use crate::error::Error;
use glam::UVec2;
use std::any::Any;
use std::sync::Arc;

struct TestShader(ShaderType);

impl Shader for TestShader {
    fn shader_type(&self) -> ShaderType {
        self.0
    }

    fn entry_point(&self) -> &str {
        "main"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn shader(shader_type: ShaderType) -> Arc<dyn Shader> {
    Arc::new(TestShader(shader_type))
}

fn graphics_info() -> PipelineInfo {
    PipelineInfo::graphics(
        vec![shader(ShaderType::Vertex), shader(ShaderType::Fragment)],
        UVec2::new(256, 256),
    )
}

#[test]
fn test_graphics_defaults_are_valid() {
    let info = graphics_info();
    assert_eq!(info.pipeline_type, PipelineType::Graphics);
    assert_eq!(info.samples, 1);
    assert_eq!(info.color_attachment_count, 1);
    assert!(info.validate().is_ok());
}

#[test]
fn test_graphics_requires_fragment_shader() {
    let info = PipelineInfo::graphics(vec![shader(ShaderType::Vertex)], UVec2::new(1, 1));
    assert!(matches!(info.validate(), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_compute_requires_compute_shader() {
    let info = PipelineInfo::compute(shader(ShaderType::Vertex));
    assert!(matches!(info.validate(), Err(Error::InvalidArgument(_))));

    let info = PipelineInfo::compute(shader(ShaderType::Compute));
    assert!(info.validate().is_ok());
}

#[test]
fn test_sample_count_range() {
    let mut info = graphics_info();
    info.samples = 0;
    assert!(matches!(info.validate(), Err(Error::InvalidArgument(_))));

    info.samples = 0x80;
    assert!(matches!(info.validate(), Err(Error::InvalidArgument(_))));

    info.samples = 0x7F;
    assert!(info.validate().is_ok());
}

#[test]
fn test_depth_bounds_order() {
    let mut info = graphics_info();
    info.depth.min_depth = 0.8;
    info.depth.max_depth = 0.2;
    assert!(matches!(info.validate(), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_attribute_requires_bound_slot() {
    let mut info = graphics_info();
    info.vertex.attributes.push(VertexAttribute {
        location: 0,
        slot: 1,
        format: VertexFormat::Float3,
        offset: 0,
    });
    assert!(matches!(info.validate(), Err(Error::InvalidArgument(_))));

    info.vertex.bindings.push(VertexBinding {
        slot: 1,
        stride: 12,
        input_rate: VertexInputRate::Vertex,
    });
    assert!(info.validate().is_ok());
}

#[test]
fn test_shader_lookup_by_type() {
    let info = graphics_info();
    assert_eq!(info.shader(ShaderType::Fragment).unwrap().shader_type(), ShaderType::Fragment);
    assert!(info.shader(ShaderType::Compute).is_none());
}
