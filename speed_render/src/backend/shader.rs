/// Shader trait and shader descriptor

use std::any::Any;
use bitflags::bitflags;

/// Pipeline stage a shader module is compiled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderType {
    Vertex,
    Fragment,
    Compute,
}

bitflags! {
    /// Set of shader stages (descriptor visibility)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const COMPUTE = 1 << 2;
    }
}

impl From<ShaderType> for ShaderStages {
    fn from(shader_type: ShaderType) -> Self {
        match shader_type {
            ShaderType::Vertex => ShaderStages::VERTEX,
            ShaderType::Fragment => ShaderStages::FRAGMENT,
            ShaderType::Compute => ShaderStages::COMPUTE,
        }
    }
}

/// Descriptor for creating a shader module
#[derive(Debug, Clone)]
pub struct ShaderDesc<'a> {
    /// Stage the module is used for
    pub shader_type: ShaderType,
    /// SPIR-V bytecode (length must be a multiple of 4)
    pub code: &'a [u8],
    /// Entry point function name
    pub entry_point: &'a str,
}

/// Shader module resource trait
pub trait Shader: Send + Sync {
    fn shader_type(&self) -> ShaderType;

    fn entry_point(&self) -> &str;

    /// Downcast support for backend checks
    fn as_any(&self) -> &dyn Any;
}
