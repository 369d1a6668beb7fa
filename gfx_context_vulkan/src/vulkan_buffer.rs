//! Host-visible Vulkan buffers
//!
//! `VulkanBuffer` backs vertex, index and uniform data and is written
//! through its persistent mapping. `VulkanHostBuffer` backs the staging
//! arena: writes land in mapped memory and `flush` publishes the written
//! range with `vkFlushMappedMemoryRanges`.

use ash::vk;
use gfx_context::gfx::resource::{BufferTarget, GpuBuffer, HostBuffer};
use gfx_context::gfx::{Error, Result};
use gfx_context::{gfx_bail, gfx_err, gfx_error};
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

const LOG_SOURCE: &str = "gfx::vulkan";

/// Create a CPU-to-GPU buffer bound to fresh memory
pub(crate) fn allocate_buffer(
    ctx: &GpuContext,
    name: &str,
    size: u64,
    usage: vk::BufferUsageFlags,
) -> Result<(vk::Buffer, Allocation)> {
    unsafe {
        let buffer_create_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = ctx
            .device
            .create_buffer(&buffer_create_info, None)
            .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to create {} of {} bytes: {:?}", name, size, e))?;

        let requirements = ctx.device.get_buffer_memory_requirements(buffer);
        let allocated = ctx.allocator().allocate(&AllocationCreateDesc {
            name,
            requirements,
            location: MemoryLocation::CpuToGpu,
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        });

        let allocation = match allocated {
            Ok(allocation) => allocation,
            Err(_) => {
                ctx.device.destroy_buffer(buffer, None);
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                gfx_error!(LOG_SOURCE, "Out of GPU memory for {} (required: {:.2} MB)", name, size_mb);
                return Err(Error::OutOfMemory);
            }
        };

        if let Err(e) = ctx.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
            ctx.allocator().free(allocation).ok();
            ctx.device.destroy_buffer(buffer, None);
            gfx_bail!(LOG_SOURCE, "Failed to bind {} memory: {:?}", name, e);
        }

        Ok((buffer, allocation))
    }
}

/// Copy `data` into the persistent mapping of `allocation` at `offset`
fn write_mapped(allocation: Option<&Allocation>, size: u64, offset: u64, data: &[u8]) -> Result<()> {
    offset
        .checked_add(data.len() as u64)
        .filter(|&end| end <= size)
        .ok_or_else(|| {
            Error::InvalidResource(format!(
                "Write of {} bytes at offset {} exceeds buffer size {}",
                data.len(),
                offset,
                size
            ))
        })?;

    let allocation = allocation.ok_or_else(|| gfx_err!(LOG_SOURCE, "Buffer write failed: no GPU allocation"))?;
    let mapped_ptr = allocation
        .mapped_ptr()
        .ok_or_else(|| gfx_err!(LOG_SOURCE, "Buffer is not CPU-accessible"))?
        .as_ptr() as *mut u8;

    unsafe {
        std::ptr::copy_nonoverlapping(data.as_ptr(), mapped_ptr.add(offset as usize), data.len());
    }
    Ok(())
}

fn release(ctx: &GpuContext, buffer: vk::Buffer, allocation: Option<Allocation>) {
    unsafe {
        if let Some(allocation) = allocation {
            ctx.allocator().free(allocation).ok();
        }
        ctx.device.destroy_buffer(buffer, None);
    }
}

// ============================================================================
// VulkanBuffer
// ============================================================================

/// Vertex, index or uniform buffer
pub struct VulkanBuffer {
    ctx: Arc<GpuContext>,
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: u64,
}

impl VulkanBuffer {
    pub(crate) fn new(ctx: Arc<GpuContext>, target: BufferTarget, size: u64) -> Result<Self> {
        let (name, usage) = match target {
            BufferTarget::Vertex => ("vertex buffer", vk::BufferUsageFlags::VERTEX_BUFFER),
            BufferTarget::Index => ("index buffer", vk::BufferUsageFlags::INDEX_BUFFER),
        };
        Self::with_usage(ctx, name, size, usage | vk::BufferUsageFlags::TRANSFER_DST)
    }

    pub(crate) fn uniform(ctx: Arc<GpuContext>, size: u64) -> Result<Self> {
        Self::with_usage(ctx, "uniform buffer", size, vk::BufferUsageFlags::UNIFORM_BUFFER)
    }

    fn with_usage(ctx: Arc<GpuContext>, name: &str, size: u64, usage: vk::BufferUsageFlags) -> Result<Self> {
        let (buffer, allocation) = allocate_buffer(&ctx, name, size, usage)?;
        Ok(Self { ctx, buffer, allocation: Some(allocation), size })
    }

    /// Raw handle, used in shader parameters and copy commands
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }
}

impl GpuBuffer for VulkanBuffer {
    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        write_mapped(self.allocation.as_ref(), self.size, offset, data)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        release(&self.ctx, self.buffer, self.allocation.take());
    }
}

// ============================================================================
// VulkanHostBuffer
// ============================================================================

/// Staging buffer used as a transfer source
pub struct VulkanHostBuffer {
    ctx: Arc<GpuContext>,
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: u64,
    /// `nonCoherentAtomSize`: flushed ranges are widened to this granularity
    atom_size: u64,
}

impl VulkanHostBuffer {
    pub(crate) fn new(ctx: Arc<GpuContext>, size: u64, atom_size: u64) -> Result<Self> {
        let (buffer, allocation) = allocate_buffer(&ctx, "staging buffer", size, vk::BufferUsageFlags::TRANSFER_SRC)?;
        Ok(Self {
            ctx,
            buffer,
            allocation: Some(allocation),
            size,
            atom_size: atom_size.max(1),
        })
    }

    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }
}

/// Widen `[offset, offset + size)` to `atom`, clamped to the allocation
pub(crate) fn flush_range(offset: u64, size: u64, atom: u64, allocation_size: u64) -> (u64, u64) {
    let start = offset - offset % atom;
    let end = (offset + size).div_ceil(atom) * atom;
    let end = end.min(allocation_size);
    (start, end - start)
}

impl HostBuffer for VulkanHostBuffer {
    fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        write_mapped(self.allocation.as_ref(), self.size, offset, data)
    }

    fn flush(&self, offset: u64, size: u64) -> Result<()> {
        if size == 0 {
            return Ok(());
        }
        let allocation = self
            .allocation
            .as_ref()
            .ok_or_else(|| gfx_err!(LOG_SOURCE, "Staging flush failed: no GPU allocation"))?;

        let (start, length) = flush_range(offset, size, self.atom_size, allocation.size());

        unsafe {
            let range = vk::MappedMemoryRange::default()
                .memory(allocation.memory())
                .offset(allocation.offset() + start)
                .size(length);
            self.ctx
                .device
                .flush_mapped_memory_ranges(std::slice::from_ref(&range))
                .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to flush staging memory: {:?}", e))
        }
    }

    fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for VulkanHostBuffer {
    fn drop(&mut self) {
        release(&self.ctx, self.buffer, self.allocation.take());
    }
}

#[cfg(test)]
#[path = "vulkan_buffer_tests.rs"]
mod tests;
