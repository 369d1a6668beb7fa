//! Fixed-capacity vertex and index buffer resource
//!
//! A BufferResource owns one backend allocation of exactly
//! `capacity * element_size` bytes and tracks how many elements have been
//! filled. Uploads append at the fill cursor; writing past capacity is a
//! caller bug and panics. The allocation is released as soon as the
//! resource is dropped.

use crate::error::Result;
use crate::types::IndexType;

/// What a buffer resource feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Vertex buffer
    Vertex,
    /// Index buffer
    Index,
}

/// Backend GPU buffer
///
/// Implemented by backend-specific buffer types (e.g., VulkanBuffer, GlBuffer).
/// The buffer is destroyed when dropped.
pub trait GpuBuffer {
    /// Write `data` at byte `offset`
    fn update(&self, offset: u64, data: &[u8]) -> Result<()>;

    /// Allocation size in bytes
    fn size(&self) -> u64;
}

/// Creates backend buffers for BufferResource
pub trait BufferAllocator {
    type Buffer: GpuBuffer;

    /// Allocate a buffer of `size_bytes` for `target`
    fn create_buffer(&self, target: BufferTarget, size_bytes: u64) -> Result<Self::Buffer>;
}

// ===== BUFFER RESOURCE =====

/// Vertex or index data with a fixed element capacity
pub struct BufferResource<B: GpuBuffer> {
    buffer: B,
    target: BufferTarget,
    element_size: u32,
    capacity: u32,
    current_size: u32,
}

impl<B: GpuBuffer> BufferResource<B> {
    /// Allocate `capacity` elements of `element_size` bytes
    pub fn new<A>(allocator: &A, target: BufferTarget, element_size: u32, capacity: u32) -> Result<Self>
    where
        A: BufferAllocator<Buffer = B> + ?Sized,
    {
        assert!(element_size > 0, "BufferResource element size must be non-zero");
        if target == BufferTarget::Index {
            assert!(
                IndexType::from_element_size(element_size).is_some(),
                "Index buffer element size must be 2 or 4 bytes, got {}",
                element_size
            );
        }

        let buffer = allocator.create_buffer(target, element_size as u64 * capacity as u64)?;

        Ok(Self {
            buffer,
            target,
            element_size,
            capacity,
            current_size: 0,
        })
    }

    /// Append typed elements at the fill cursor
    ///
    /// # Panics
    ///
    /// Panics if `T` is not `element_size` bytes or if the upload would
    /// exceed capacity.
    pub fn upload_data<T: bytemuck::Pod>(&mut self, data: &[T]) -> Result<()> {
        assert_eq!(
            std::mem::size_of::<T>(),
            self.element_size as usize,
            "Element type size does not match the buffer element size"
        );
        self.upload_bytes(bytemuck::cast_slice(data), data.len() as u32)
    }

    /// Append `count` elements of raw bytes at the fill cursor
    ///
    /// # Panics
    ///
    /// Panics if `current_size + count > capacity` or if `data` is shorter
    /// than `count` elements.
    pub fn upload_bytes(&mut self, data: &[u8], count: u32) -> Result<()> {
        assert!(
            self.current_size as u64 + count as u64 <= self.capacity as u64,
            "Buffer overflow: {} + {} elements exceeds capacity {}",
            self.current_size,
            count,
            self.capacity
        );
        let len = count as usize * self.element_size as usize;
        assert!(data.len() >= len, "Upload data shorter than {} elements", count);

        if count == 0 {
            return Ok(());
        }

        let offset = self.current_size as u64 * self.element_size as u64;
        self.buffer.update(offset, &data[..len])?;
        self.current_size += count;
        Ok(())
    }

    /// Reset the fill cursor; the allocation is kept
    pub fn clear(&mut self) {
        self.current_size = 0;
    }

    // ===== ACCESSORS =====

    pub fn target(&self) -> BufferTarget { self.target }

    pub fn element_size(&self) -> u32 { self.element_size }

    pub fn capacity(&self) -> u32 { self.capacity }

    pub fn current_size(&self) -> u32 { self.current_size }

    pub fn available_size(&self) -> u32 { self.capacity - self.current_size }

    /// Index type for index buffers, `None` for vertex buffers
    pub fn index_type(&self) -> Option<IndexType> {
        match self.target {
            BufferTarget::Index => IndexType::from_element_size(self.element_size),
            BufferTarget::Vertex => None,
        }
    }

    /// Underlying backend buffer
    pub fn gpu_buffer(&self) -> &B { &self.buffer }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
