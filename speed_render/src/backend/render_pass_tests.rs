//! Unit tests for render_pass.rs

use crate::backend::render_pass::*;
use crate::backend::texture::{TextureFormat, TextureLayout};
use crate::error::Error;

#[test]
fn test_color_attachment_defaults() {
    let desc = AttachmentDescription::new(TextureFormat::B8G8R8A8_SRGB);
    assert_eq!(desc.samples, 1);
    assert_eq!(desc.load_op, LoadOp::Load);
    assert_eq!(desc.final_layout, TextureLayout::Present);
    assert_eq!(desc.attachment_layout(), TextureLayout::ColorAttachment);
    assert!(!desc.is_depth());
}

#[test]
fn test_depth_attachment_defaults() {
    let desc = AttachmentDescription::new(TextureFormat::D32_FLOAT);
    assert!(desc.is_depth());
    assert_eq!(desc.final_layout, TextureLayout::DepthStencilAttachment);
    assert_eq!(desc.attachment_layout(), TextureLayout::DepthStencilAttachment);
}

#[test]
fn test_sample_count_validation() {
    let mut desc = AttachmentDescription::new(TextureFormat::R8G8B8A8_UNORM);
    assert!(desc.validate().is_ok());

    desc.samples = 0;
    assert!(matches!(desc.validate(), Err(Error::InvalidArgument(_))));

    desc.samples = 128;
    assert!(matches!(desc.validate(), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_undefined_final_layout_rejected() {
    let mut desc = AttachmentDescription::new(TextureFormat::R8G8B8A8_UNORM);
    desc.final_layout = TextureLayout::Undefined;
    assert!(matches!(desc.validate(), Err(Error::InvalidArgument(_))));
}
