/// Bounds validation for the staging transfer protocol
///
/// All checks run before a backend records anything, so a rejected copy or
/// upload never issues a native command.

use crate::backend::device_buffer::BufferRange;
use crate::backend::texture::{TextureFormat, TextureInfo, TextureRegion};
use crate::error::Result;

/// Validate a buffer -> buffer (or host slice -> buffer) transfer
///
/// # Arguments
///
/// * `dst_capacity` - Size of the destination buffer
/// * `dst` - Destination byte range
/// * `src_capacity` - Size of the source buffer or host slice
/// * `src` - Source byte range
///
/// # Errors
///
/// `OutOfBounds` when either range exceeds its capacity or the source range
/// is larger than the destination range
pub fn validate_buffer_copy(
    dst_capacity: u64,
    dst: BufferRange,
    src_capacity: u64,
    src: BufferRange,
) -> Result<()> {
    if src.end().map_or(true, |end| end > src_capacity) {
        crate::engine_bail_warn!("speed::Transfer", OutOfBounds,
            "Provided out of bounds borders for source buffer (offset {} + size {} > {})",
            src.offset, src.size, src_capacity);
    }

    if dst.end().map_or(true, |end| end > dst_capacity) {
        crate::engine_bail_warn!("speed::Transfer", OutOfBounds,
            "Provided out of bounds borders for destination buffer (offset {} + size {} > {})",
            dst.offset, dst.size, dst_capacity);
    }

    if src.size > dst.size {
        crate::engine_bail_warn!("speed::Transfer", OutOfBounds,
            "Source size is bigger than destination size ({} > {})", src.size, dst.size);
    }

    Ok(())
}

/// Validate that `region` lies inside the base level of a texture
pub fn validate_texture_region(info: &TextureInfo, region: TextureRegion, label: &str) -> Result<()> {
    if region.width == 0 || region.height == 0 {
        crate::engine_bail_warn!("speed::Transfer", InvalidArgument,
            "Empty {} texture region ({}x{})", label, region.width, region.height);
    }

    let fits_x = region.x.checked_add(region.width).is_some_and(|end| end <= info.width);
    let fits_y = region.y.checked_add(region.height).is_some_and(|end| end <= info.height);
    if !fits_x || !fits_y {
        crate::engine_bail_warn!("speed::Transfer", OutOfBounds,
            "Provided out of bounds borders for {} texture ({:?} outside {}x{})",
            label, region, info.width, info.height);
    }

    Ok(())
}

/// Validate a texture -> texture copy
///
/// The copy extent is the source region's extent; the destination region
/// must be at least as large. Formats must share a texel size.
pub fn validate_texture_copy(
    dst_info: &TextureInfo,
    dst_region: TextureRegion,
    src_info: &TextureInfo,
    src_region: TextureRegion,
) -> Result<()> {
    validate_texture_region(src_info, src_region, "source")?;
    validate_texture_region(dst_info, dst_region, "destination")?;

    if src_region.width > dst_region.width || src_region.height > dst_region.height {
        crate::engine_bail_warn!("speed::Transfer", OutOfBounds,
            "Source size is bigger than destination size ({}x{} > {}x{})",
            src_region.width, src_region.height, dst_region.width, dst_region.height);
    }

    if src_info.format.bytes_per_pixel() != dst_info.format.bytes_per_pixel() {
        crate::engine_bail_warn!("speed::Transfer", InvalidArgument,
            "Incompatible texture formats for copy: {:?} -> {:?}", src_info.format, dst_info.format);
    }

    Ok(())
}

/// Byte size of a tightly packed region of `format` texels
///
/// # Errors
///
/// `InvalidArgument` for block-compressed and depth/stencil formats,
/// `OutOfBounds` when the size does not fit in 64 bits
pub fn texture_region_byte_size(format: TextureFormat, region: TextureRegion) -> Result<u64> {
    let Some(bytes_per_pixel) = format.bytes_per_pixel().filter(|_| !format.is_depth()) else {
        crate::engine_bail_warn!("speed::Transfer", InvalidArgument,
            "Byte transfers are not supported for texture format {:?}", format);
    };

    let size = (region.width as u64)
        .checked_mul(region.height as u64)
        .and_then(|texels| texels.checked_mul(bytes_per_pixel as u64));

    match size {
        Some(size) => Ok(size),
        None => Err(crate::engine_warn_err!("speed::Transfer", OutOfBounds,
            "Region {}x{} of {:?} overflows a 64-bit byte size", region.width, region.height, format)),
    }
}

/// Validate a buffer <-> texture copy and return its byte size
///
/// # Arguments
///
/// * `buffer_capacity` - Size of the buffer side
/// * `buffer_offset` - Byte offset of the tightly packed texel data in the buffer
/// * `info` - Texture side
/// * `region` - Texture region
pub fn validate_buffer_texture_copy(
    buffer_capacity: u64,
    buffer_offset: u64,
    info: &TextureInfo,
    region: TextureRegion,
) -> Result<u64> {
    validate_texture_region(info, region, "texture")?;
    let size = texture_region_byte_size(info.format, region)?;

    if BufferRange::new(buffer_offset, size).end().map_or(true, |end| end > buffer_capacity) {
        crate::engine_bail_warn!("speed::Transfer", OutOfBounds,
            "Provided out of bounds borders for buffer (offset {} + size {} > {})",
            buffer_offset, size, buffer_capacity);
    }

    Ok(size)
}

#[cfg(test)]
#[path = "transfer_tests.rs"]
mod tests;
