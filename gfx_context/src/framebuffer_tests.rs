//! Unit tests for framebuffer.rs

use crate::attachments::{AttachmentsOperations, LoadOp, StoreOp};
use crate::framebuffer::*;
use crate::mock_graphics_device::{MockAttachment, MockGraphicsDevice};
use crate::render_state::RenderPassId;
use crate::types::{ClearBits, Extent2D, TextureFormat};
use std::sync::Arc;

// ============================================================================
// HELPERS
// ============================================================================

fn surface(extent: Extent2D, image_index: u32) -> FramebufferTarget<'static, MockAttachment> {
    FramebufferTarget::Surface {
        extent,
        color_format: TextureFormat::B8G8R8A8_SRGB,
        depth_stencil_format: TextureFormat::D24_UNORM_S8_UINT,
        image_count: 3,
        image_index,
    }
}

fn target(size: u32) -> RenderTarget<MockAttachment> {
    RenderTarget {
        id: TargetId(1),
        extent: Extent2D::new(size, size),
        color: MockAttachment { id: 1 },
        color_format: TextureFormat::R8G8B8A8_UNORM,
        depth_stencil: None,
    }
}

fn ops(clear: ClearBits, store: ClearBits) -> AttachmentsOperations {
    AttachmentsOperations::from_bits(clear, store)
}

// ============================================================================
// SURFACE
// ============================================================================

#[test]
fn test_surface_builds_one_framebuffer_per_image() {
    let device = MockGraphicsDevice::new();
    let mut manager = FramebufferManager::new();
    let extent = Extent2D::new(800, 600);

    let (first, retired) = manager.resolve(&device, &surface(extent, 0), ops(ClearBits::all(), ClearBits::empty())).unwrap();
    assert!(retired.is_none());
    assert_eq!(first.render_pass_id, RenderPassId(1));
    assert_eq!(manager.framebuffer_creations(), 3);
    assert_eq!(device.counters.framebuffers_live(), 3);

    let (second, _) = manager.resolve(&device, &surface(extent, 2), ops(ClearBits::all(), ClearBits::empty())).unwrap();
    assert!(Arc::ptr_eq(&first.render_pass, &second.render_pass));
    assert!(!Arc::ptr_eq(&first.framebuffer, &second.framebuffer));
    assert_eq!(second.framebuffer.source, "swapchain:2");
    assert_eq!(manager.render_pass_creations(), 1);
}

#[test]
fn test_surface_operations_are_forced() {
    let forced = surface_operations(ops(ClearBits::empty(), ClearBits::STENCIL));

    assert_eq!(forced.color.load, LoadOp::Clear);
    assert_eq!(forced.color.store, StoreOp::Store);
    assert_eq!(forced.depth.load, LoadOp::Clear);
    assert_eq!(forced.stencil.load, LoadOp::DontCare);
    assert_eq!(forced.stencil.store, StoreOp::Store);
}

#[test]
#[should_panic(expected = "out of range")]
fn test_surface_image_index_out_of_range_panics() {
    let device = MockGraphicsDevice::new();
    let mut manager = FramebufferManager::new();
    let _ = manager.resolve(&device, &surface(Extent2D::new(8, 8), 3), ops(ClearBits::empty(), ClearBits::empty()));
}

// ============================================================================
// OFFSCREEN
// ============================================================================

#[test]
fn test_new_operations_add_render_pass_but_reuse_framebuffer() {
    let device = MockGraphicsDevice::new();
    let mut manager = FramebufferManager::new();
    let rt = target(64);

    let (load, _) = manager
        .resolve(&device, &FramebufferTarget::Offscreen(&rt), ops(ClearBits::empty(), ClearBits::COLOR))
        .unwrap();
    let (clear, _) = manager
        .resolve(&device, &FramebufferTarget::Offscreen(&rt), ops(ClearBits::COLOR, ClearBits::COLOR))
        .unwrap();

    assert_ne!(load.render_pass_id, clear.render_pass_id);
    assert!(Arc::ptr_eq(&load.framebuffer, &clear.framebuffer));
    assert_eq!(manager.render_pass_creations(), 2);
    assert_eq!(manager.framebuffer_creations(), 1);
    assert!(!load.render_pass.desc.presentable);
}

#[test]
fn test_signature_change_retires_entry() {
    let device = MockGraphicsDevice::new();
    let mut manager = FramebufferManager::new();
    let small = target(64);
    let large = target(128);
    let clear = ops(ClearBits::COLOR, ClearBits::COLOR);

    let (old, _) = manager.resolve(&device, &FramebufferTarget::Offscreen(&small), clear).unwrap();
    let (new, retired) = manager.resolve(&device, &FramebufferTarget::Offscreen(&large), clear).unwrap();

    let retired = retired.expect("entry should be retired");
    assert_eq!(retired.render_pass_ids, vec![old.render_pass_id]);
    assert_eq!(retired.framebuffers.len(), 1);
    assert!(new.render_pass_id > old.render_pass_id);
    assert_eq!(new.extent, Extent2D::new(128, 128));
    assert_eq!(manager.len(), 1);
}

#[test]
fn test_ids_keep_increasing_after_clear() {
    let device = MockGraphicsDevice::new();
    let mut manager = FramebufferManager::new();
    let rt = target(32);
    let clear = ops(ClearBits::COLOR, ClearBits::COLOR);

    let (before, _) = manager.resolve(&device, &FramebufferTarget::Offscreen(&rt), clear).unwrap();
    drop(before);
    manager.clear();
    assert!(manager.is_empty());
    assert_eq!(device.counters.render_passes_live(), 0);

    let (after, _) = manager.resolve(&device, &FramebufferTarget::Offscreen(&rt), clear).unwrap();
    assert_eq!(after.render_pass_id, RenderPassId(2));
}

#[test]
fn test_remove_hands_back_objects() {
    let device = MockGraphicsDevice::new();
    let mut manager = FramebufferManager::new();
    let rt = target(16);
    let _ = manager
        .resolve(&device, &FramebufferTarget::Offscreen(&rt), ops(ClearBits::empty(), ClearBits::COLOR))
        .unwrap();

    let retired = manager.remove(FramebufferKey::Offscreen(TargetId(1))).unwrap();
    assert_eq!(retired.render_passes.len(), 1);
    assert!(!manager.contains(FramebufferKey::Offscreen(TargetId(1))));
    assert!(manager.remove(FramebufferKey::Offscreen(TargetId(1))).is_none());
}
