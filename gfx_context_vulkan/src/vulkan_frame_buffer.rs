//! Framebuffer - VkFramebuffer plus the attachments it references
//!
//! Offscreen framebuffers keep their images alive through the `Arc`s, so
//! a retired framebuffer never outlives its views.

use ash::vk;
use gfx_context::gfx::types::Extent2D;
use gfx_context::gfx::Result;
use gfx_context::gfx_err;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_render_pass::VulkanRenderPass;
use crate::vulkan_texture::VulkanImage;

const LOG_SOURCE: &str = "gfx::vulkan";

pub struct VulkanFramebuffer {
    ctx: Arc<GpuContext>,
    framebuffer: vk::Framebuffer,
    extent: Extent2D,
    _images: Vec<Arc<VulkanImage>>,
}

impl VulkanFramebuffer {
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        render_pass: &VulkanRenderPass,
        views: &[vk::ImageView],
        images: Vec<Arc<VulkanImage>>,
        extent: Extent2D,
    ) -> Result<Self> {
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass.handle())
            .attachments(views)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe {
            ctx.device.create_framebuffer(&create_info, None).map_err(|e| {
                gfx_err!(LOG_SOURCE, "Failed to create {}x{} framebuffer: {:?}", extent.width, extent.height, e)
            })?
        };

        Ok(Self { ctx, framebuffer, extent, _images: images })
    }

    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }
}

impl Drop for VulkanFramebuffer {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}
