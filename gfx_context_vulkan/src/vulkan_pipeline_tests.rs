//! Unit tests for reflection merging and baked pipeline state

use super::*;
use gfx_context::gfx::types::{StencilAction, StencilFace, TestFunction};

fn reflected(binding: u32, kind: BindingKind, stage: vk::ShaderStageFlags) -> ReflectedBinding {
    ReflectedBinding { set: 0, binding, kind, stage }
}

// ============================================================================
// BINDING MERGE
// ============================================================================

#[test]
fn test_merge_combines_stages_for_shared_binding() {
    let stages = [
        reflected(0, BindingKind::UniformBuffer, vk::ShaderStageFlags::VERTEX),
        reflected(0, BindingKind::UniformBuffer, vk::ShaderStageFlags::FRAGMENT),
    ];
    let merged = merge_bindings(&stages, &[]).unwrap();

    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].stages, vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT);
    assert_eq!(merged[0].descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
}

#[test]
fn test_merge_sorts_by_binding_and_marks_dynamic() {
    let stages = [
        reflected(2, BindingKind::CombinedImageSampler, vk::ShaderStageFlags::FRAGMENT),
        reflected(1, BindingKind::UniformBuffer, vk::ShaderStageFlags::VERTEX),
        reflected(0, BindingKind::UniformBuffer, vk::ShaderStageFlags::VERTEX),
    ];
    let merged = merge_bindings(&stages, &[1]).unwrap();

    let order: Vec<u32> = merged.iter().map(|b| b.binding).collect();
    assert_eq!(order, vec![0, 1, 2]);
    assert!(!merged[0].is_dynamic());
    assert!(merged[1].is_dynamic());
    assert_eq!(merged[2].descriptor_type, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
}

#[test]
fn test_merge_keeps_sparse_bindings_ordered() {
    let stages = [
        reflected(9, BindingKind::UniformBuffer, vk::ShaderStageFlags::FRAGMENT),
        reflected(4, BindingKind::CombinedImageSampler, vk::ShaderStageFlags::FRAGMENT),
        reflected(9, BindingKind::UniformBuffer, vk::ShaderStageFlags::VERTEX),
        reflected(7, BindingKind::UniformBuffer, vk::ShaderStageFlags::VERTEX),
    ];
    let merged = merge_bindings(&stages, &[9]).unwrap();

    let order: Vec<u32> = merged.iter().map(|b| b.binding).collect();
    assert_eq!(order, vec![4, 7, 9]);
    assert!(merged[2].is_dynamic());
    assert_eq!(merged[2].stages, vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT);
}

#[test]
fn test_merge_rejects_conflicting_kinds() {
    let stages = [
        reflected(3, BindingKind::UniformBuffer, vk::ShaderStageFlags::VERTEX),
        reflected(3, BindingKind::CombinedImageSampler, vk::ShaderStageFlags::FRAGMENT),
    ];
    assert!(matches!(merge_bindings(&stages, &[]), Err(Error::InvalidResource(_))));
}

#[test]
fn test_merge_rejects_other_sets() {
    let mut binding = reflected(0, BindingKind::UniformBuffer, vk::ShaderStageFlags::VERTEX);
    binding.set = 1;
    assert!(matches!(merge_bindings(&[binding], &[]), Err(Error::InvalidResource(_))));
}

#[test]
fn test_merge_of_nothing_is_empty() {
    assert!(merge_bindings(&[], &[0]).unwrap().is_empty());
}

// ============================================================================
// DEPTH / STENCIL
// ============================================================================

#[test]
fn test_default_key_disables_tests() {
    let state = VulkanDepthStencilState::new(&DepthStencilKey::default());
    let info = state.create_info();
    assert_eq!(info.depth_test_enable, vk::FALSE);
    assert_eq!(info.depth_write_enable, vk::FALSE);
    assert_eq!(info.stencil_test_enable, vk::FALSE);
}

#[test]
fn test_depth_write_follows_depth_test() {
    let mut key = DepthStencilKey::default();
    key.set_depth_test_enabled(true);
    key.set_depth_function(TestFunction::LessOrEqual);

    let info = VulkanDepthStencilState::new(&key).create_info();
    assert_eq!(info.depth_test_enable, vk::TRUE);
    assert_eq!(info.depth_write_enable, vk::TRUE);
    assert_eq!(info.depth_compare_op, vk::CompareOp::LESS_OR_EQUAL);
}

#[test]
fn test_stencil_faces_are_converted_separately() {
    let mut key = DepthStencilKey::default();
    key.set_stencil_test_enabled(true);
    key.set_stencil_function(StencilFace::Back, TestFunction::Equal);
    key.set_stencil_actions(StencilFace::Front, StencilAction::Keep, StencilAction::Keep, StencilAction::Replace);

    let info = VulkanDepthStencilState::new(&key).create_info();
    assert_eq!(info.stencil_test_enable, vk::TRUE);
    assert_eq!(info.front.pass_op, vk::StencilOp::REPLACE);
    assert_eq!(info.back.pass_op, vk::StencilOp::KEEP);
    assert_eq!(info.back.compare_op, vk::CompareOp::EQUAL);
    assert_eq!(info.front.compare_mask, 0xFF);
}

// ============================================================================
// BLENDING
// ============================================================================

#[test]
fn test_blend_attachment_writes_all_channels() {
    let disabled = color_blend_attachment(false);
    assert_eq!(disabled.blend_enable, vk::FALSE);
    assert_eq!(disabled.color_write_mask, vk::ColorComponentFlags::RGBA);

    let enabled = color_blend_attachment(true);
    assert_eq!(enabled.blend_enable, vk::TRUE);
    assert_eq!(enabled.src_color_blend_factor, vk::BlendFactor::SRC_ALPHA);
}
