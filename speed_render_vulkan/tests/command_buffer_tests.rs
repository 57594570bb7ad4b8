//! GPU tests for the command buffer state machine
//!
//! Run with: cargo test -p speed_render_vulkan --test command_buffer_tests -- --ignored

mod gpu_test_utils;

use gpu_test_utils::*;
use serial_test::serial;
use speed_render::glam::{UVec2, Vec4};
use speed_render::speed::{BackendFactory, Error, Renderer, Result};
use speed_render::speed::render::{
    AttachmentDescription, BufferRange, BufferUsage, ClearValue, CommandBuffer, IndexType, RenderPass,
    TextureFormat, TextureLayout, TextureRegion, TextureUsage,
};

fn assert_invalid_operation(result: Result<()>, operation: &str) {
    assert!(
        matches!(result, Err(Error::InvalidOperation(_))),
        "{} should be rejected while idle, got {:?}", operation, result
    );
}

// ============================================================================
// STATE GATING
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_command_buffer_idle_rejects_recording_operations() {
    let buffer = device_buffer(64, BufferUsage::VERTEX | BufferUsage::INDEX);
    let staging = device_buffer(64, BufferUsage::STAGING);
    let color = texture(4, 4, TextureFormat::R8G8B8A8_UNORM, TextureUsage::ColorAttachment);
    let render_pass = renderer()
        .create_render_pass(&[AttachmentDescription::new(TextureFormat::R8G8B8A8_UNORM)])
        .unwrap();
    let framebuffer = renderer()
        .create_framebuffer(4, 4, vec![color.clone()], &render_pass)
        .unwrap();
    let region = TextureRegion::new(0, 0, 4, 4);

    let mut cmd = command_buffer();
    assert!(!cmd.is_recording());
    let recorded = cmd.recorded_commands();

    assert_invalid_operation(cmd.set_framebuffer(Some(framebuffer)), "set_framebuffer");
    assert_invalid_operation(cmd.set_render_size(Some(UVec2::new(4, 4))), "set_render_size");
    assert_invalid_operation(cmd.clear_background(Vec4::ONE), "clear_background");
    assert_invalid_operation(cmd.clear_depth_stencil(0, 1.0, 0), "clear_depth_stencil");
    assert_invalid_operation(cmd.bind_vertex_buffer(Some(&buffer), 0), "bind_vertex_buffer");
    assert_invalid_operation(cmd.bind_vertex_buffer(None, 0), "bind_vertex_buffer");
    assert_invalid_operation(cmd.bind_index_buffer(&buffer, IndexType::U16), "bind_index_buffer");
    assert_invalid_operation(cmd.draw(3, 0), "draw");
    assert_invalid_operation(cmd.draw_indexed(3, 0, 0), "draw_indexed");
    assert_invalid_operation(cmd.draw_instanced(3, 2, 0, 0), "draw_instanced");
    assert_invalid_operation(cmd.draw_indexed_instanced(3, 2, 0, 0, 0), "draw_indexed_instanced");
    assert_invalid_operation(
        cmd.copy_buffer(&staging, BufferRange::whole(64), &buffer, BufferRange::whole(64)),
        "copy_buffer",
    );
    assert_invalid_operation(
        cmd.upload_buffer(&buffer, BufferRange::whole(4), &[1, 2, 3, 4], BufferRange::whole(4)),
        "upload_buffer",
    );
    assert_invalid_operation(cmd.copy_buffer_to_texture(&color, region, &staging, 0), "copy_buffer_to_texture");
    assert_invalid_operation(cmd.copy_texture_to_buffer(&staging, 0, &color, region), "copy_texture_to_buffer");
    assert_invalid_operation(cmd.upload_texture(&color, region, &[0u8; 64]), "upload_texture");
    assert_invalid_operation(render_pass.begin(cmd.as_mut(), &[]), "render_pass_begin");
    assert_invalid_operation(render_pass.end(cmd.as_mut()), "render_pass_end");

    assert!(!color.transition_layout(cmd.as_mut(), TextureLayout::General).unwrap());
    assert!(!buffer.barrier(cmd.as_mut()).unwrap());

    assert_eq!(cmd.recorded_commands(), recorded);
    assert_eq!(color.layout(), TextureLayout::Undefined);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_command_buffer_begin_end_report_transitions() {
    let mut cmd = command_buffer();

    assert!(cmd.begin().unwrap());
    assert!(!cmd.begin().unwrap());
    assert!(cmd.is_recording());

    assert!(cmd.end().unwrap());
    assert!(!cmd.end().unwrap());
    assert!(!cmd.is_recording());
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_command_buffer_end_clears_render_size() {
    let mut cmd = command_buffer();
    cmd.begin().unwrap();

    cmd.set_render_size(Some(UVec2::new(64, 32))).unwrap();
    assert_eq!(cmd.render_size(), Some(UVec2::new(64, 32)));

    cmd.end().unwrap();
    assert_eq!(cmd.render_size(), None);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_command_buffer_render_size_issues_viewport() {
    let mut cmd = command_buffer();
    cmd.begin().unwrap();
    let recorded = cmd.recorded_commands();

    cmd.set_render_size(Some(UVec2::new(64, 32))).unwrap();
    assert_eq!(cmd.recorded_commands(), recorded + 2);

    let result = cmd.set_render_size(Some(UVec2::new(0, 32)));
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
    assert_eq!(cmd.recorded_commands(), recorded + 2);

    cmd.end().unwrap();
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_command_buffer_draw_requires_graphics_pipeline() {
    let mut cmd = command_buffer();
    cmd.begin().unwrap();
    cmd.set_render_size(Some(UVec2::new(16, 16))).unwrap();
    let recorded = cmd.recorded_commands();

    assert!(matches!(cmd.draw(3, 0), Err(Error::InvalidOperation(_))));
    assert!(matches!(cmd.draw_indexed(3, 0, 0), Err(Error::InvalidOperation(_))));
    assert_eq!(cmd.recorded_commands(), recorded);

    cmd.end().unwrap();
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_command_buffer_bind_checks_buffer_usage() {
    let vertex = device_buffer(64, BufferUsage::VERTEX);
    let index = device_buffer(64, BufferUsage::INDEX);

    let mut cmd = command_buffer();
    cmd.begin().unwrap();
    let recorded = cmd.recorded_commands();

    assert!(matches!(cmd.bind_vertex_buffer(Some(&index), 0), Err(Error::InvalidArgument(_))));
    assert!(matches!(cmd.bind_index_buffer(&vertex, IndexType::U32), Err(Error::InvalidArgument(_))));
    assert_eq!(cmd.recorded_commands(), recorded);

    cmd.bind_vertex_buffer(None, 0).unwrap();
    assert_eq!(cmd.recorded_commands(), recorded);

    cmd.bind_vertex_buffer(Some(&vertex), 0).unwrap();
    cmd.bind_index_buffer(&index, IndexType::U32).unwrap();
    assert_eq!(cmd.recorded_commands(), recorded + 2);

    cmd.end().unwrap();
}

// ============================================================================
// CLEARS AND RENDER PASSES
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_command_buffer_clear_without_framebuffer() {
    let mut cmd = command_buffer();
    cmd.begin().unwrap();

    assert!(matches!(cmd.clear_background(Vec4::ONE), Err(Error::InvalidOperation(_))));
    assert!(matches!(cmd.clear_depth_stencil(0, 1.0, 0), Err(Error::InvalidOperation(_))));

    cmd.end().unwrap();
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_command_buffer_clear_depth_stencil_checks_attachment() {
    let color = texture(8, 8, TextureFormat::R8G8B8A8_UNORM, TextureUsage::ColorAttachment);
    let depth = texture(8, 8, TextureFormat::D32_FLOAT, TextureUsage::DepthStencilAttachment);
    let render_pass = renderer()
        .create_render_pass(&[
            AttachmentDescription::new(TextureFormat::R8G8B8A8_UNORM),
            AttachmentDescription::new(TextureFormat::D32_FLOAT),
        ])
        .unwrap();
    let framebuffer = renderer()
        .create_framebuffer(8, 8, vec![color, depth.clone()], &render_pass)
        .unwrap();

    let mut cmd = command_buffer();
    cmd.begin().unwrap();
    cmd.set_framebuffer(Some(framebuffer)).unwrap();

    assert!(matches!(cmd.clear_depth_stencil(2, 1.0, 0), Err(Error::OutOfBounds(_))));
    assert!(matches!(cmd.clear_depth_stencil(0, 1.0, 0), Err(Error::InvalidArgument(_))));

    cmd.clear_depth_stencil(1, 1.0, 0).unwrap();
    assert_eq!(depth.layout(), TextureLayout::TransferDestination);

    submit_and_wait(cmd.as_mut());
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_command_buffer_render_pass_commits_final_layout() {
    let color = texture(16, 16, TextureFormat::R8G8B8A8_UNORM, TextureUsage::ColorAttachment);
    let mut description = AttachmentDescription::new(TextureFormat::R8G8B8A8_UNORM);
    description.load_op = speed_render::speed::render::LoadOp::Clear;
    description.final_layout = TextureLayout::TransferSource;

    let render_pass = renderer().create_render_pass(&[description]).unwrap();
    let framebuffer = renderer()
        .create_framebuffer(16, 16, vec![color.clone()], &render_pass)
        .unwrap();

    let mut cmd = command_buffer();
    cmd.begin().unwrap();

    // No framebuffer bound yet
    assert!(render_pass.begin(cmd.as_mut(), &[ClearValue::Color(Vec4::ZERO)]).is_err());

    cmd.set_framebuffer(Some(framebuffer)).unwrap();
    render_pass.begin(cmd.as_mut(), &[ClearValue::Color(Vec4::ZERO)]).unwrap();
    assert_eq!(color.layout(), TextureLayout::ColorAttachment);
    assert_eq!(cmd.render_size(), Some(UVec2::new(16, 16)));

    render_pass.end(cmd.as_mut()).unwrap();
    assert_eq!(color.layout(), TextureLayout::TransferSource);

    submit_and_wait(cmd.as_mut());
}

// ============================================================================
// SUBMISSION
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_command_buffer_submit_requires_ended_buffer() {
    let mut cmd = command_buffer();
    cmd.begin().unwrap();

    let result = renderer().submit(&mut [cmd.as_mut()]);
    assert!(matches!(result, Err(Error::InvalidOperation(_))));

    submit_and_wait(cmd.as_mut());
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_command_buffer_submit_rejects_never_begun() {
    let mut cmd = command_buffer();

    let result = renderer().submit(&mut [cmd.as_mut()]);
    assert!(matches!(result, Err(Error::InvalidOperation(_))));
    renderer().wait_for_end(&mut [cmd.as_mut()]).unwrap();
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_command_buffer_submit_twice_requires_new_recording() {
    let mut cmd = command_buffer();
    cmd.begin().unwrap();
    submit_and_wait(cmd.as_mut());

    let result = renderer().submit(&mut [cmd.as_mut()]);
    assert!(matches!(result, Err(Error::InvalidOperation(_))));

    // A rejected buffer in a batch keeps the whole batch off the queue
    let mut other = command_buffer();
    other.begin().unwrap();
    other.end().unwrap();
    let result = renderer().submit(&mut [other.as_mut(), cmd.as_mut()]);
    assert!(matches!(result, Err(Error::InvalidOperation(_))));

    cmd.begin().unwrap();
    submit_and_wait(cmd.as_mut());
    renderer().submit(&mut [other.as_mut()]).unwrap();
    renderer().wait_for_end(&mut [other.as_mut()]).unwrap();
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_command_buffer_reused_after_wait_for_end() {
    let mut buffers = renderer().create_command_buffers(2).unwrap();
    assert_eq!(buffers.len(), 2);

    for _ in 0..3 {
        for cmd in buffers.iter_mut() {
            assert!(cmd.begin().unwrap());
            cmd.end().unwrap();
        }

        let mut batch: Vec<&mut dyn CommandBuffer> = buffers
            .iter_mut()
            .map(|cmd| &mut **cmd as &mut dyn CommandBuffer)
            .collect();
        renderer().submit(&mut batch).unwrap();
        renderer().wait_for_end(&mut batch).unwrap();
    }
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_command_buffer_wait_for_unsubmitted_returns_immediately() {
    let mut cmd = command_buffer();
    renderer().wait_for_end(&mut [cmd.as_mut()]).unwrap();
}
