//! Unit tests for texture.rs

use crate::backend::texture::*;

#[test]
fn test_texture_info_new_defaults() {
    let info = TextureInfo::new(256, 128, TextureFormat::R8G8B8A8_UNORM, TextureUsage::ColorAttachment);
    assert_eq!(info.width, 256);
    assert_eq!(info.height, 128);
    assert_eq!(info.mip_levels, 1);
    assert_eq!(info.samples, 1);
    assert_eq!(info.tiling, TextureTiling::Optimal);
    assert_eq!(info.layout, TextureLayout::Undefined);
}

#[test]
fn test_texture_region_full() {
    let info = TextureInfo::new(64, 32, TextureFormat::R8_UNORM, TextureUsage::Sampled);
    assert_eq!(TextureRegion::full(&info), TextureRegion::new(0, 0, 64, 32));
}

#[test]
fn test_format_bytes_per_pixel() {
    assert_eq!(TextureFormat::R8_UNORM.bytes_per_pixel(), Some(1));
    assert_eq!(TextureFormat::R8G8B8A8_UNORM.bytes_per_pixel(), Some(4));
    assert_eq!(TextureFormat::R16G16B16A16_SFLOAT.bytes_per_pixel(), Some(8));
    assert_eq!(TextureFormat::R32G32B32A32_SFLOAT.bytes_per_pixel(), Some(16));
    assert_eq!(TextureFormat::BC7_UNORM.bytes_per_pixel(), None);
}

#[test]
fn test_format_depth_and_stencil_flags() {
    assert!(TextureFormat::D32_FLOAT.is_depth());
    assert!(!TextureFormat::D32_FLOAT.has_stencil());
    assert!(TextureFormat::D24_UNORM_S8_UINT.is_depth());
    assert!(TextureFormat::D24_UNORM_S8_UINT.has_stencil());
    assert!(!TextureFormat::B8G8R8A8_SRGB.is_depth());
}

#[test]
fn test_format_compressed() {
    assert!(TextureFormat::BC1_RGBA_UNORM.is_compressed());
    assert!(!TextureFormat::R32_UINT.is_compressed());
}

#[test]
fn test_layout_all_is_complete_and_unique() {
    let all = TextureLayout::ALL;
    for (i, a) in all.iter().enumerate() {
        for b in &all[i + 1..] {
            assert_ne!(a, b);
        }
    }
    assert!(all.contains(&TextureLayout::Present));
    assert!(all.contains(&TextureLayout::General));
}
