/// CommandBuffer trait - recording of rendering and transfer commands

use std::any::Any;
use std::sync::Arc;
use glam::{UVec2, Vec4};
use crate::backend::device_buffer::{BufferRange, DeviceBuffer};
use crate::backend::framebuffer::Framebuffer;
use crate::backend::pipeline::Pipeline;
use crate::backend::texture::{Texture, TextureRegion};
use crate::error::Result;

/// Type of indices in an index buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    /// Size of one index in bytes
    pub fn size(self) -> u64 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// Command buffer for recording rendering and transfer commands
///
/// A command buffer is Idle or Recording. Every operation below except the
/// getters requires Recording and fails with `InvalidOperation` otherwise,
/// without issuing any native command. Recorded commands are sent to the
/// GPU through `Renderer::submit`.
pub trait CommandBuffer: Send + Sync {
    /// Idle -> Recording
    ///
    /// # Returns
    ///
    /// `Ok(false)` if the buffer was already recording
    ///
    /// # Errors
    ///
    /// `InvalidOperation` while the previous submission of this buffer is still executing
    fn begin(&mut self) -> Result<bool>;

    /// Recording -> Idle. Clears the render size.
    ///
    /// # Returns
    ///
    /// `Ok(false)` if the buffer was not recording
    fn end(&mut self) -> Result<bool>;

    fn is_recording(&self) -> bool;

    // ===== BOUND STATE =====

    /// Framebuffer targeted by clears and render passes
    fn framebuffer(&self) -> Option<&Arc<dyn Framebuffer>>;

    /// Bind (or unbind) the framebuffer targeted by clears and render passes
    fn set_framebuffer(&mut self, framebuffer: Option<Arc<dyn Framebuffer>>) -> Result<()>;

    fn pipeline(&self) -> Option<&Arc<dyn Pipeline>>;

    /// Bind a pipeline
    ///
    /// Graphics pipelines require a render size; viewport and scissor are
    /// re-issued for it.
    fn set_pipeline(&mut self, pipeline: Arc<dyn Pipeline>) -> Result<()>;

    fn render_size(&self) -> Option<UVec2>;

    /// Set the render size and re-issue viewport/scissor (0, 0, w, h, depth 0..1)
    fn set_render_size(&mut self, size: Option<UVec2>) -> Result<()>;

    // ===== CLEARS =====

    /// Clear the first color attachment of the bound framebuffer
    ///
    /// The attachment is transitioned into TransferDestination first.
    fn clear_background(&mut self, color: Vec4) -> Result<()>;

    /// Clear a depth/stencil attachment of the bound framebuffer
    ///
    /// # Arguments
    ///
    /// * `attachment` - Index of the attachment in the framebuffer
    /// * `depth` - Depth clear value
    /// * `stencil` - Stencil clear value
    fn clear_depth_stencil(&mut self, attachment: usize, depth: f32, stencil: u32) -> Result<()>;

    // ===== GEOMETRY =====

    /// Bind a vertex buffer to a slot. `None` is a no-op.
    fn bind_vertex_buffer(&mut self, buffer: Option<&Arc<dyn DeviceBuffer>>, slot: u32) -> Result<()>;

    fn bind_index_buffer(&mut self, buffer: &Arc<dyn DeviceBuffer>, index_type: IndexType) -> Result<()>;

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()>;

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()>;

    fn draw_instanced(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> Result<()>;

    fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()>;

    // ===== TRANSFERS =====

    /// Copy `src_range` of `src` into `dst` at `dst_range.offset`
    ///
    /// The bytes go through a transient staging buffer released once the
    /// submission has completed on the GPU.
    ///
    /// # Errors
    ///
    /// `OutOfBounds` if a range exceeds its buffer or `src_range` is larger
    /// than `dst_range`
    fn copy_buffer(
        &mut self,
        dst: &Arc<dyn DeviceBuffer>,
        dst_range: BufferRange,
        src: &Arc<dyn DeviceBuffer>,
        src_range: BufferRange,
    ) -> Result<()>;

    /// Upload `src_range` of host bytes into `dst` at `dst_range.offset`
    fn upload_buffer(
        &mut self,
        dst: &Arc<dyn DeviceBuffer>,
        dst_range: BufferRange,
        data: &[u8],
        src_range: BufferRange,
    ) -> Result<()>;

    /// Copy a region of `src` into a region of `dst`
    fn copy_texture(
        &mut self,
        dst: &Arc<dyn Texture>,
        dst_region: TextureRegion,
        src: &Arc<dyn Texture>,
        src_region: TextureRegion,
    ) -> Result<()>;

    /// Copy tightly packed texels from `src` at `src_offset` into a region of `dst`
    fn copy_buffer_to_texture(
        &mut self,
        dst: &Arc<dyn Texture>,
        region: TextureRegion,
        src: &Arc<dyn DeviceBuffer>,
        src_offset: u64,
    ) -> Result<()>;

    /// Copy a region of `src` as tightly packed texels into `dst` at `dst_offset`
    fn copy_texture_to_buffer(
        &mut self,
        dst: &Arc<dyn DeviceBuffer>,
        dst_offset: u64,
        src: &Arc<dyn Texture>,
        region: TextureRegion,
    ) -> Result<()>;

    /// Upload tightly packed host texels into a region of `dst`
    fn upload_texture(&mut self, dst: &Arc<dyn Texture>, region: TextureRegion, data: &[u8]) -> Result<()>;

    // ===== INTROSPECTION =====

    /// Number of native commands recorded since creation
    fn recorded_commands(&self) -> u64;

    /// Downcast support for backend checks
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Typed helpers on top of `CommandBuffer`
pub trait CommandBufferExt {
    /// Upload a slice of plain-old-data values into `dst` at byte offset `dst_offset`
    fn upload_slice<T: bytemuck::Pod>(
        &mut self,
        dst: &Arc<dyn DeviceBuffer>,
        dst_offset: u64,
        values: &[T],
    ) -> Result<()>;
}

impl<C: CommandBuffer + ?Sized> CommandBufferExt for C {
    fn upload_slice<T: bytemuck::Pod>(
        &mut self,
        dst: &Arc<dyn DeviceBuffer>,
        dst_offset: u64,
        values: &[T],
    ) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(values);
        let size = bytes.len() as u64;
        self.upload_buffer(dst, BufferRange::new(dst_offset, size), bytes, BufferRange::whole(size))
    }
}
