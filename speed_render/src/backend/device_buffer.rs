/// DeviceBuffer trait, usage flags and the host mapping guard

use std::any::Any;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::{Mutex, MutexGuard, PoisonError};
use bitflags::bitflags;
use crate::backend::command_buffer::CommandBuffer;
use crate::error::Result;

bitflags! {
    /// What a device buffer is used for
    ///
    /// Staging is the only usage that makes a buffer host-mappable.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Vertex attribute source
        const VERTEX = 1 << 0;
        /// Index source
        const INDEX = 1 << 1;
        /// Uniform block source
        const UNIFORM = 1 << 2;
        /// Shader storage (read/write)
        const STORAGE = 1 << 3;
        /// Host-visible transfer buffer
        const STAGING = 1 << 4;
    }
}

/// Access requested when mapping a buffer to host memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferMapType {
    Read,
    Write,
    ReadWrite,
}

impl BufferMapType {
    pub fn is_readable(self) -> bool {
        matches!(self, BufferMapType::Read | BufferMapType::ReadWrite)
    }

    pub fn is_writable(self) -> bool {
        matches!(self, BufferMapType::Write | BufferMapType::ReadWrite)
    }
}

/// Byte range of a buffer (offset + size)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferRange {
    pub offset: u64,
    pub size: u64,
}

impl BufferRange {
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// Range starting at offset 0
    pub fn whole(size: u64) -> Self {
        Self { offset: 0, size }
    }

    /// End of the range, `None` on overflow
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.size)
    }
}

// ===== HOST MAPPING =====

/// Tracks the single outstanding host mapping of a buffer
///
/// Backends embed one `HostMapping` per buffer and hand out `MappedMemory`
/// guards through [`HostMapping::map`]. Dropping the guard unmaps.
#[derive(Debug, Default)]
pub struct HostMapping {
    active: Mutex<Option<BufferRange>>,
}

impl HostMapping {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<BufferRange>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Currently mapped range, if any
    pub fn active(&self) -> Option<BufferRange> {
        *self.lock()
    }

    /// Validate and open a mapping of `size` bytes at `offset`
    ///
    /// # Errors
    ///
    /// * `InvalidOperation` - buffer is not staging, or a mapping is already outstanding
    /// * `OutOfBounds` - `size + offset` exceeds `capacity`
    ///
    /// # Safety
    ///
    /// `base` must point to the start of a host-visible allocation at least
    /// `capacity` bytes long, valid for as long as `self` is borrowed, and not
    /// accessed through any other path while the mapping is alive.
    pub unsafe fn map(
        &self,
        base: NonNull<u8>,
        capacity: u64,
        usage: BufferUsage,
        map_type: BufferMapType,
        size: u64,
        offset: u64,
    ) -> Result<MappedMemory<'_>> {
        if !usage.contains(BufferUsage::STAGING) {
            crate::engine_bail_warn!("speed::DeviceBuffer", InvalidOperation,
                "Device buffer must be created for staging use to be mapped");
        }

        let range = BufferRange::new(offset, size);
        match range.end() {
            Some(end) if end <= capacity => {}
            _ => crate::engine_bail_warn!("speed::DeviceBuffer", OutOfBounds,
                "Mapping {} bytes at offset {} exceeds buffer size {}", size, offset, capacity),
        }

        let (Ok(len), Ok(start)) = (usize::try_from(size), usize::try_from(offset)) else {
            crate::engine_bail_warn!("speed::DeviceBuffer", InvalidArgument,
                "Mapping range does not fit in host address space");
        };

        let mut active = self.lock();
        if let Some(current) = *active {
            crate::engine_bail_warn!("speed::DeviceBuffer", InvalidOperation,
                "Buffer is already mapped (offset {}, size {})", current.offset, current.size);
        }
        *active = Some(range);

        Ok(MappedMemory {
            // SAFETY: start + len <= capacity, checked above
            ptr: unsafe { NonNull::new_unchecked(base.as_ptr().add(start)) },
            len,
            range,
            map_type,
            owner: self,
            _marker: PhantomData,
        })
    }
}

/// Host view of a mapped buffer range
///
/// Unmaps on drop. Reads require a readable map type and writes a writable one.
pub struct MappedMemory<'a> {
    ptr: NonNull<u8>,
    len: usize,
    range: BufferRange,
    map_type: BufferMapType,
    owner: &'a HostMapping,
    _marker: PhantomData<&'a mut [u8]>,
}

impl MappedMemory<'_> {
    /// Mapped range within the buffer
    pub fn range(&self) -> BufferRange {
        self.range
    }

    pub fn map_type(&self) -> BufferMapType {
        self.map_type
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Mapped bytes (requires Read or ReadWrite)
    pub fn as_slice(&self) -> Result<&[u8]> {
        if !self.map_type.is_readable() {
            crate::engine_bail_warn!("speed::DeviceBuffer", InvalidOperation,
                "Mapping was opened for {:?} and cannot be read", self.map_type);
        }
        // SAFETY: ptr/len describe the exclusively mapped range (HostMapping::map contract)
        Ok(unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) })
    }

    /// Mapped bytes (requires Write or ReadWrite)
    pub fn as_mut_slice(&mut self) -> Result<&mut [u8]> {
        if !self.map_type.is_writable() {
            crate::engine_bail_warn!("speed::DeviceBuffer", InvalidOperation,
                "Mapping was opened for {:?} and cannot be written", self.map_type);
        }
        // SAFETY: see as_slice; &mut self guarantees a unique borrow
        Ok(unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) })
    }

    /// Copy `data` into the mapping starting at `offset`
    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let len = self.len;
        let end = offset.checked_add(data.len()).filter(|end| *end <= len);
        let Some(end) = end else {
            crate::engine_bail_warn!("speed::DeviceBuffer", OutOfBounds,
                "Writing {} bytes at offset {} exceeds mapping of {} bytes", data.len(), offset, len);
        };
        self.as_mut_slice()?[offset..end].copy_from_slice(data);
        Ok(())
    }

    /// Copy bytes starting at `offset` into `out`
    pub fn read(&self, offset: usize, out: &mut [u8]) -> Result<()> {
        let end = offset.checked_add(out.len()).filter(|end| *end <= self.len);
        let Some(end) = end else {
            crate::engine_bail_warn!("speed::DeviceBuffer", OutOfBounds,
                "Reading {} bytes at offset {} exceeds mapping of {} bytes", out.len(), offset, self.len);
        };
        out.copy_from_slice(&self.as_slice()?[offset..end]);
        Ok(())
    }

    /// Explicitly end the mapping (same as dropping it)
    pub fn unmap(self) {}
}

impl Drop for MappedMemory<'_> {
    fn drop(&mut self) {
        *self.owner.lock() = None;
    }
}

// ===== DEVICE BUFFER TRAIT =====

/// Device buffer resource trait
///
/// Size and usage are fixed at creation. The native allocation is released
/// when the buffer is dropped.
pub trait DeviceBuffer: Send + Sync {
    /// Size in bytes
    fn size(&self) -> u64;

    /// Usage flags
    fn usage(&self) -> BufferUsage;

    /// Returns true iff the buffer is tagged Staging
    fn can_be_mapped(&self) -> bool {
        self.usage().contains(BufferUsage::STAGING)
    }

    /// Currently mapped range, if any
    fn mapped_range(&self) -> Option<BufferRange>;

    /// Map `size` bytes at `offset` to host memory
    ///
    /// # Arguments
    ///
    /// * `map_type` - Requested host access
    /// * `size` - Number of bytes to map
    /// * `offset` - Byte offset into the buffer
    ///
    /// # Returns
    ///
    /// A guard giving access to the mapped bytes; the buffer is unmapped when it drops
    fn map_to_host(&self, map_type: BufferMapType, size: u64, offset: u64) -> Result<MappedMemory<'_>>;

    /// Map the whole buffer
    fn map_all(&self, map_type: BufferMapType) -> Result<MappedMemory<'_>> {
        self.map_to_host(map_type, self.size(), 0)
    }

    /// Record a barrier making prior transfer writes visible to this buffer's usage
    ///
    /// Returns `Ok(false)` without recording when `cmd` is not recording.
    fn barrier(&self, cmd: &mut dyn CommandBuffer) -> Result<bool>;

    /// Downcast support for backend checks
    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
#[path = "device_buffer_tests.rs"]
mod tests;
