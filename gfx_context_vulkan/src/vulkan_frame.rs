//! Per-frame Vulkan objects
//!
//! One frame is in flight at a time: a single fence, an acquire and a
//! release semaphore, and two primary command buffers. The memory command
//! buffer carries staging copies and is submitted ahead of the rendering
//! command buffer in the same batch.

use ash::vk;
use gfx_context::gfx::Result;
use gfx_context::gfx_err;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

const LOG_SOURCE: &str = "gfx::vulkan";

// ===== COMMAND POOL =====

pub(crate) struct CommandPool {
    ctx: Arc<GpuContext>,
    pool: vk::CommandPool,
}

impl CommandPool {
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(ctx.graphics_queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let pool = unsafe {
            ctx.device
                .create_command_pool(&create_info, None)
                .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to create command pool: {:?}", e))?
        };
        Ok(Self { ctx, pool })
    }

    pub(crate) fn allocate_frame_buffers(&self) -> Result<FrameCommandBuffers> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(2);
        let buffers = unsafe {
            self.ctx
                .device
                .allocate_command_buffers(&alloc_info)
                .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to allocate command buffers: {:?}", e))?
        };
        match buffers.as_slice() {
            [memory, rendering] => Ok(FrameCommandBuffers { memory: *memory, rendering: *rendering }),
            _ => Err(gfx_err!(LOG_SOURCE, "Expected 2 command buffers, got {}", buffers.len())),
        }
    }

    pub(crate) fn free_frame_buffers(&self, buffers: FrameCommandBuffers) {
        unsafe {
            self.ctx
                .device
                .free_command_buffers(self.pool, &[buffers.memory, buffers.rendering]);
        }
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_command_pool(self.pool, None);
        }
    }
}

/// Command buffers recorded every frame
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameCommandBuffers {
    /// Staging copies, submitted first
    pub memory: vk::CommandBuffer,
    pub rendering: vk::CommandBuffer,
}

impl FrameCommandBuffers {
    pub(crate) fn begin(&self, device: &ash::Device) -> Result<()> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        for command_buffer in [self.memory, self.rendering] {
            unsafe {
                device
                    .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
                    .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to reset command buffer: {:?}", e))?;
                device
                    .begin_command_buffer(command_buffer, &begin_info)
                    .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to begin command buffer: {:?}", e))?;
            }
        }
        Ok(())
    }

    pub(crate) fn end(&self, device: &ash::Device) -> Result<()> {
        for command_buffer in [self.memory, self.rendering] {
            unsafe {
                device
                    .end_command_buffer(command_buffer)
                    .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to end command buffer: {:?}", e))?;
            }
        }
        Ok(())
    }
}

// ===== SYNC =====

/// Frame fence plus acquire/release semaphores
pub(crate) struct FrameSync {
    ctx: Arc<GpuContext>,
    pub fence: vk::Fence,
    /// Signaled when the acquired image is ready to be rendered to
    pub acquire: vk::Semaphore,
    /// Signaled when rendering is done, waited on by present
    pub release: vk::Semaphore,
}

impl FrameSync {
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        unsafe {
            // Starts signaled so the first frame does not wait forever
            let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
            let fence = ctx
                .device
                .create_fence(&fence_info, None)
                .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to create frame fence: {:?}", e))?;

            let mut sync = Self {
                ctx,
                fence,
                acquire: vk::Semaphore::null(),
                release: vk::Semaphore::null(),
            };

            let semaphore_info = vk::SemaphoreCreateInfo::default();
            sync.acquire = sync
                .ctx
                .device
                .create_semaphore(&semaphore_info, None)
                .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to create acquire semaphore: {:?}", e))?;
            sync.release = sync
                .ctx
                .device
                .create_semaphore(&semaphore_info, None)
                .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to create release semaphore: {:?}", e))?;

            Ok(sync)
        }
    }
}

impl Drop for FrameSync {
    fn drop(&mut self) {
        unsafe {
            let device = &self.ctx.device;
            device.destroy_semaphore(self.release, None);
            device.destroy_semaphore(self.acquire, None);
            device.destroy_fence(self.fence, None);
        }
    }
}
