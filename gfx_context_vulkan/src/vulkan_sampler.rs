//! Sampler - VkSampler described by a SamplerKey
//!
//! Caching lives in the context's sampler cache; this type only owns the
//! Vulkan object.

use ash::vk;
use gfx_context::gfx::types::SamplerKey;
use gfx_context::gfx::Result;
use gfx_context::gfx_err;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{address_mode_to_vk, filter_to_vk};

const LOG_SOURCE: &str = "gfx::vulkan";

pub struct VulkanSampler {
    ctx: Arc<GpuContext>,
    sampler: vk::Sampler,
}

impl VulkanSampler {
    pub(crate) fn new(ctx: Arc<GpuContext>, key: &SamplerKey) -> Result<Self> {
        let create_info = sampler_create_info(key);
        let sampler = unsafe {
            ctx.device
                .create_sampler(&create_info, None)
                .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to create sampler {:?}: {:?}", key, e))?
        };
        Ok(Self { ctx, sampler })
    }

    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for VulkanSampler {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_sampler(self.sampler, None);
        }
    }
}

pub(crate) fn sampler_create_info(key: &SamplerKey) -> vk::SamplerCreateInfo<'static> {
    let (filter, mipmap) = filter_to_vk(key.filter);
    vk::SamplerCreateInfo::default()
        .mag_filter(filter)
        .min_filter(filter)
        .mipmap_mode(mipmap)
        .address_mode_u(address_mode_to_vk(key.wrap_u))
        .address_mode_v(address_mode_to_vk(key.wrap_v))
        .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
        .mip_lod_bias(0.0)
        .min_lod(0.0)
        .max_lod(vk::LOD_CLAMP_NONE)
        .border_color(vk::BorderColor::FLOAT_OPAQUE_BLACK)
        .anisotropy_enable(false)
        .compare_enable(false)
        .unnormalized_coordinates(false)
}

#[cfg(test)]
#[path = "vulkan_sampler_tests.rs"]
mod tests;
