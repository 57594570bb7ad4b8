//! Unit tests for transfer.rs (bounds safety of copy/upload)

use crate::backend::device_buffer::BufferRange;
use crate::backend::texture::{TextureFormat, TextureInfo, TextureRegion, TextureUsage};
use crate::backend::transfer::*;
use crate::error::Error;

fn rgba(width: u32, height: u32) -> TextureInfo {
    TextureInfo::new(width, height, TextureFormat::R8G8B8A8_UNORM, TextureUsage::Sampled)
}

// ============================================================================
// BUFFER COPIES
// ============================================================================

#[test]
fn test_buffer_copy_within_bounds() {
    assert!(validate_buffer_copy(256, BufferRange::whole(256), 256, BufferRange::whole(256)).is_ok());
    assert!(validate_buffer_copy(256, BufferRange::new(128, 128), 64, BufferRange::new(0, 64)).is_ok());
}

#[test]
fn test_buffer_copy_source_out_of_bounds() {
    let err = validate_buffer_copy(256, BufferRange::whole(256), 100, BufferRange::new(10, 91)).unwrap_err();
    assert!(matches!(err, Error::OutOfBounds(ref msg) if msg.contains("source")));
}

#[test]
fn test_buffer_copy_destination_out_of_bounds() {
    let err = validate_buffer_copy(100, BufferRange::new(50, 51), 256, BufferRange::whole(10)).unwrap_err();
    assert!(matches!(err, Error::OutOfBounds(ref msg) if msg.contains("destination")));
}

#[test]
fn test_buffer_copy_source_bigger_than_destination() {
    let err = validate_buffer_copy(256, BufferRange::whole(16), 256, BufferRange::whole(32)).unwrap_err();
    assert!(matches!(err, Error::OutOfBounds(ref msg) if msg.contains("bigger")));
}

#[test]
fn test_buffer_copy_overflowing_range() {
    let result = validate_buffer_copy(u64::MAX, BufferRange::whole(8), u64::MAX, BufferRange::new(u64::MAX, 8));
    assert!(matches!(result, Err(Error::OutOfBounds(_))));
}

#[test]
fn test_buffer_copy_every_violation_is_rejected() {
    let capacity = 64u64;
    for offset in [0u64, 1, 32, 63, 64] {
        for size in [0u64, 1, 32, 64, 65] {
            let src = BufferRange::new(offset, size);
            let dst = BufferRange::whole(capacity);
            let fits = offset + size <= capacity;
            assert_eq!(
                validate_buffer_copy(capacity, dst, capacity, src).is_ok(),
                fits,
                "offset {} size {}",
                offset,
                size
            );
        }
    }
}

// ============================================================================
// TEXTURE REGIONS
// ============================================================================

#[test]
fn test_texture_region_bounds() {
    let info = rgba(256, 128);
    assert!(validate_texture_region(&info, TextureRegion::new(0, 0, 256, 128), "source").is_ok());
    assert!(validate_texture_region(&info, TextureRegion::new(200, 100, 56, 28), "source").is_ok());

    let result = validate_texture_region(&info, TextureRegion::new(200, 0, 57, 1), "source");
    assert!(matches!(result, Err(Error::OutOfBounds(_))));

    let result = validate_texture_region(&info, TextureRegion::new(0, 100, 1, 29), "source");
    assert!(matches!(result, Err(Error::OutOfBounds(_))));

    let result = validate_texture_region(&info, TextureRegion::new(u32::MAX, 0, 2, 1), "source");
    assert!(matches!(result, Err(Error::OutOfBounds(_))));
}

#[test]
fn test_texture_region_must_not_be_empty() {
    let info = rgba(4, 4);
    let result = validate_texture_region(&info, TextureRegion::new(0, 0, 0, 4), "destination");
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}

#[test]
fn test_texture_copy_source_bigger_than_destination() {
    let src = rgba(256, 256);
    let dst = rgba(256, 256);
    let result = validate_texture_copy(
        &dst,
        TextureRegion::new(0, 0, 128, 256),
        &src,
        TextureRegion::new(0, 0, 256, 256),
    );
    assert!(matches!(result, Err(Error::OutOfBounds(_))));

    assert!(validate_texture_copy(&dst, TextureRegion::full(&dst), &src, TextureRegion::full(&src)).is_ok());
}

#[test]
fn test_texture_copy_incompatible_formats() {
    let src = rgba(16, 16);
    let dst = TextureInfo::new(16, 16, TextureFormat::R32G32B32A32_SFLOAT, TextureUsage::Sampled);
    let result = validate_texture_copy(&dst, TextureRegion::full(&dst), &src, TextureRegion::full(&src));
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}

// ============================================================================
// BUFFER <-> TEXTURE
// ============================================================================

#[test]
fn test_region_byte_size() {
    let size = texture_region_byte_size(TextureFormat::R8G8B8A8_UNORM, TextureRegion::new(0, 0, 256, 256)).unwrap();
    assert_eq!(size, 256 * 256 * 4);

    let size = texture_region_byte_size(TextureFormat::R8_UNORM, TextureRegion::new(3, 3, 5, 7)).unwrap();
    assert_eq!(size, 35);
}

#[test]
fn test_region_byte_size_overflow_is_out_of_bounds() {
    let region = TextureRegion::new(0, 0, u32::MAX, u32::MAX);
    assert!(matches!(
        texture_region_byte_size(TextureFormat::R32G32B32A32_SFLOAT, region),
        Err(Error::OutOfBounds(_))
    ));

    let info = TextureInfo::new(u32::MAX, u32::MAX, TextureFormat::R32G32B32A32_SFLOAT, TextureUsage::Sampled);
    assert!(matches!(
        validate_buffer_texture_copy(u64::MAX, 0, &info, region),
        Err(Error::OutOfBounds(_))
    ));
}

#[test]
fn test_region_byte_size_rejects_compressed_and_depth() {
    let region = TextureRegion::new(0, 0, 4, 4);
    assert!(matches!(
        texture_region_byte_size(TextureFormat::BC7_UNORM, region),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        texture_region_byte_size(TextureFormat::D32_FLOAT, region),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_buffer_texture_copy_bounds() {
    let info = rgba(16, 16);
    let region = TextureRegion::full(&info);

    assert_eq!(validate_buffer_texture_copy(1024, 0, &info, region).unwrap(), 1024);

    let result = validate_buffer_texture_copy(1024, 4, &info, region);
    assert!(matches!(result, Err(Error::OutOfBounds(_))));

    let result = validate_buffer_texture_copy(4096, 0, &info, TextureRegion::new(8, 8, 9, 1));
    assert!(matches!(result, Err(Error::OutOfBounds(_))));
}
