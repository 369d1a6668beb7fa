//! Per-frame descriptor allocation
//!
//! Descriptor sets are written for every draw and thrown away with the
//! frame: all pools are reset when the next frame begins recording, after
//! the frame fence guarantees the GPU is done with them. An exhausted pool
//! is followed by a new one instead of failing the draw.

use ash::vk;
use gfx_context::gfx::Result;
use gfx_context::gfx_err;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

const LOG_SOURCE: &str = "gfx::vulkan";

const SETS_PER_POOL: u32 = 1024;

pub(crate) struct DescriptorAllocator {
    ctx: Arc<GpuContext>,
    pools: Vec<vk::DescriptorPool>,
    current: usize,
}

impl DescriptorAllocator {
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        let pool = create_descriptor_pool(&ctx)?;
        Ok(Self { ctx, pools: vec![pool], current: 0 })
    }

    /// Recycle every set handed out since the last reset
    pub(crate) fn reset(&mut self) -> Result<()> {
        for &pool in &self.pools {
            unsafe {
                self.ctx
                    .device
                    .reset_descriptor_pool(pool, vk::DescriptorPoolResetFlags::empty())
                    .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to reset descriptor pool: {:?}", e))?;
            }
        }
        self.current = 0;
        Ok(())
    }

    pub(crate) fn allocate(&mut self, layout: vk::DescriptorSetLayout) -> Result<vk::DescriptorSet> {
        loop {
            let alloc_info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(self.pools[self.current])
                .set_layouts(std::slice::from_ref(&layout));

            match unsafe { self.ctx.device.allocate_descriptor_sets(&alloc_info) } {
                Ok(sets) => {
                    return sets
                        .into_iter()
                        .next()
                        .ok_or_else(|| gfx_err!(LOG_SOURCE, "Descriptor allocation returned no set"));
                }
                Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {
                    self.current += 1;
                    if self.current == self.pools.len() {
                        let pool = create_descriptor_pool(&self.ctx)?;
                        self.pools.push(pool);
                    }
                }
                Err(e) => return Err(gfx_err!(LOG_SOURCE, "Failed to allocate descriptor set: {:?}", e)),
            }
        }
    }
}

impl Drop for DescriptorAllocator {
    fn drop(&mut self) {
        unsafe {
            for pool in self.pools.drain(..) {
                self.ctx.device.destroy_descriptor_pool(pool, None);
            }
        }
    }
}

fn create_descriptor_pool(ctx: &GpuContext) -> Result<vk::DescriptorPool> {
    let pool_sizes = [
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: 2 * SETS_PER_POOL,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: SETS_PER_POOL,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            descriptor_count: SETS_PER_POOL,
        },
    ];
    let info = vk::DescriptorPoolCreateInfo::default()
        .pool_sizes(&pool_sizes)
        .max_sets(SETS_PER_POOL);

    unsafe {
        ctx.device
            .create_descriptor_pool(&info, None)
            .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to create descriptor pool: {:?}", e))
    }
}
