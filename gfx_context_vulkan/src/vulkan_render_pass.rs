//! Render passes built from attachment formats and load/store operations
//!
//! One subpass, one color attachment and an optional depth/stencil
//! attachment. Presentable passes end in `PRESENT_SRC_KHR`. Offscreen passes
//! end in `COLOR_ATTACHMENT_OPTIMAL` and rely on the post-render barrier to
//! move the image back to its shader-read resting layout.

use ash::vk;
use gfx_context::gfx::device::RenderPassDesc;
use gfx_context::gfx::types::LoadOp;
use gfx_context::gfx::Result;
use gfx_context::gfx_err;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{load_op_to_vk, store_op_to_vk, texture_format_to_vk};
use crate::vulkan_texture::OFFSCREEN_COLOR_LAYOUT;

const LOG_SOURCE: &str = "gfx::vulkan";

pub struct VulkanRenderPass {
    ctx: Arc<GpuContext>,
    render_pass: vk::RenderPass,
    has_depth_stencil: bool,
}

impl VulkanRenderPass {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &RenderPassDesc) -> Result<Self> {
        let (color_initial, color_final) = color_layouts(desc.ops.color.load, desc.presentable);

        let mut attachments = vec![vk::AttachmentDescription::default()
            .format(texture_format_to_vk(desc.color_format))
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(load_op_to_vk(desc.ops.color.load))
            .store_op(store_op_to_vk(desc.ops.color.store))
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(color_initial)
            .final_layout(color_final)];

        if let Some(depth_format) = desc.depth_stencil_format {
            let loads = desc.ops.depth.load == LoadOp::Load || desc.ops.stencil.load == LoadOp::Load;
            attachments.push(
                vk::AttachmentDescription::default()
                    .format(texture_format_to_vk(depth_format))
                    .samples(vk::SampleCountFlags::TYPE_1)
                    .load_op(load_op_to_vk(desc.ops.depth.load))
                    .store_op(store_op_to_vk(desc.ops.depth.store))
                    .stencil_load_op(load_op_to_vk(desc.ops.stencil.load))
                    .stencil_store_op(store_op_to_vk(desc.ops.stencil.store))
                    .initial_layout(depth_initial_layout(loads))
                    .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
            );
        }

        let color_ref = vk::AttachmentReference::default()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        let depth_ref = vk::AttachmentReference::default()
            .attachment(1)
            .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

        let has_depth_stencil = desc.depth_stencil_format.is_some();
        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(std::slice::from_ref(&color_ref));
        if has_depth_stencil {
            subpass = subpass.depth_stencil_attachment(&depth_ref);
        }

        let dependencies = subpass_dependencies(has_depth_stencil);

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(std::slice::from_ref(&subpass))
            .dependencies(&dependencies);

        let render_pass = unsafe {
            ctx.device
                .create_render_pass(&create_info, None)
                .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to create render pass: {:?}", e))?
        };

        Ok(Self { ctx, render_pass, has_depth_stencil })
    }

    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn has_depth_stencil(&self) -> bool {
        self.has_depth_stencil
    }
}

impl Drop for VulkanRenderPass {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

/// (initial, final) layouts of the color attachment
pub(crate) fn color_layouts(load: LoadOp, presentable: bool) -> (vk::ImageLayout, vk::ImageLayout) {
    let resting = if presentable {
        vk::ImageLayout::PRESENT_SRC_KHR
    } else {
        OFFSCREEN_COLOR_LAYOUT
    };
    let initial = if load == LoadOp::Load { resting } else { vk::ImageLayout::UNDEFINED };
    let final_layout = if presentable {
        vk::ImageLayout::PRESENT_SRC_KHR
    } else {
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
    };
    (initial, final_layout)
}

pub(crate) fn depth_initial_layout(loads: bool) -> vk::ImageLayout {
    if loads {
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
    } else {
        vk::ImageLayout::UNDEFINED
    }
}

/// External dependencies: previous writes and reads before the pass, and
/// fragment-shader reads of the results after it
pub(crate) fn subpass_dependencies(has_depth_stencil: bool) -> [vk::SubpassDependency; 2] {
    let (stages, access) = if has_depth_stencil {
        (
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
                | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        )
    } else {
        (
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        )
    };

    [
        vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(stages | vk::PipelineStageFlags::FRAGMENT_SHADER)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(stages)
            .dst_access_mask(access),
        vk::SubpassDependency::default()
            .src_subpass(0)
            .dst_subpass(vk::SUBPASS_EXTERNAL)
            .src_stage_mask(stages)
            .src_access_mask(access)
            .dst_stage_mask(vk::PipelineStageFlags::FRAGMENT_SHADER)
            .dst_access_mask(vk::AccessFlags::SHADER_READ),
    ]
}

#[cfg(test)]
#[path = "vulkan_render_pass_tests.rs"]
mod tests;
