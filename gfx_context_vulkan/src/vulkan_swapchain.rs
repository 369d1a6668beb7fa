//! Swapchain - VkSwapchainKHR and one image view per presentable image
//!
//! Built from the backend-neutral `SwapchainDesc`. Recreation always goes
//! through destroy + create; the images themselves belong to the swapchain.

use ash::vk;
use gfx_context::gfx::device::{PresentMode, SwapchainDesc};
use gfx_context::gfx::Result;
use gfx_context::gfx_err;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{extent_to_vk, image_usage_to_vk};

const LOG_SOURCE: &str = "gfx::vulkan";

pub(crate) struct VulkanSwapchain {
    ctx: Arc<GpuContext>,
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    views: Vec<vk::ImageView>,
}

fn present_mode_to_vk(mode: PresentMode) -> vk::PresentModeKHR {
    match mode {
        PresentMode::Fifo => vk::PresentModeKHR::FIFO,
    }
}

impl VulkanSwapchain {
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        loader: ash::khr::swapchain::Device,
        surface: vk::SurfaceKHR,
        surface_format: vk::SurfaceFormatKHR,
        pre_transform: vk::SurfaceTransformFlagsKHR,
        queue_families: &[u32],
        desc: &SwapchainDesc,
    ) -> Result<Self> {
        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(desc.image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent_to_vk(desc.extent))
            .image_array_layers(1)
            .image_usage(image_usage_to_vk(desc.usage))
            .pre_transform(pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode_to_vk(desc.present_mode))
            .clipped(true);

        create_info = if queue_families.len() > 1 {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(queue_families)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let swapchain = unsafe {
            loader
                .create_swapchain(&create_info, None)
                .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to create swapchain: {:?}", e))?
        };

        // From here on Drop releases the swapchain and any view created so far
        let mut chain = Self { ctx, loader, swapchain, views: Vec::new() };

        let images = unsafe {
            chain
                .loader
                .get_swapchain_images(swapchain)
                .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to get swapchain images: {:?}", e))?
        };

        for image in images {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(surface_format.format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            let view = unsafe {
                chain
                    .ctx
                    .device
                    .create_image_view(&view_info, None)
                    .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to create swapchain image view: {:?}", e))?
            };
            chain.views.push(view);
        }

        Ok(chain)
    }

    pub(crate) fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    pub(crate) fn loader(&self) -> &ash::khr::swapchain::Device {
        &self.loader
    }

    pub(crate) fn image_count(&self) -> u32 {
        self.views.len() as u32
    }

    pub(crate) fn view(&self, image_index: u32) -> Option<vk::ImageView> {
        self.views.get(image_index as usize).copied()
    }
}

impl Drop for VulkanSwapchain {
    fn drop(&mut self) {
        unsafe {
            for view in self.views.drain(..) {
                self.ctx.device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}
