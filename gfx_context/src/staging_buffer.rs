//! Per-frame staging arena
//!
//! Bump allocator over one host-visible buffer. Writes go through
//! `reserve`/`stage`, `flush` makes the written range visible to the GPU
//! before submission and `reset` rewinds the cursor once the frame has been
//! consumed. When a frame asks for more than what is left, the arena moves to
//! a larger buffer (next power of two) and keeps the old one in a retired
//! list until the owner hands it to deferred destruction.

use crate::error::Result;

/// Host-visible backend buffer used for staging
pub trait HostBuffer {
    /// Copy `data` into mapped memory at byte `offset`
    fn write(&self, offset: u64, data: &[u8]) -> Result<()>;

    /// Make `[offset, offset + size)` visible to the device
    fn flush(&self, offset: u64, size: u64) -> Result<()>;

    /// Size in bytes
    fn size(&self) -> u64;
}

/// A range handed out by the staging arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagingRegion {
    pub offset: u64,
    pub size: u64,
}

pub struct StagingBuffer<H: HostBuffer> {
    buffer: H,
    cursor: u64,
    alignment: u64,
    retired: Vec<H>,
    reallocations: u32,
}

impl<H: HostBuffer> StagingBuffer<H> {
    /// Wrap `buffer`; `alignment` must be a power of two
    pub fn new(buffer: H, alignment: u64) -> Self {
        assert!(alignment.is_power_of_two(), "Staging alignment must be a power of two");
        Self {
            buffer,
            cursor: 0,
            alignment,
            retired: Vec::new(),
            reallocations: 0,
        }
    }

    fn aligned_cursor(&self) -> u64 {
        (self.cursor + self.alignment - 1) & !(self.alignment - 1)
    }

    /// Whether `size` bytes fit without reallocation
    pub fn has_enough_space(&self, size: u64) -> bool {
        self.aligned_cursor() + size <= self.buffer.size()
    }

    /// Reserve `size` bytes, moving to a larger buffer built by `grow` if needed
    pub fn reserve<F>(&mut self, size: u64, grow: F) -> Result<StagingRegion>
    where
        F: FnOnce(u64) -> Result<H>,
    {
        if !self.has_enough_space(size) {
            let new_size = (self.buffer.size() + size).next_power_of_two();
            let replacement = grow(new_size)?;

            // What was staged so far stays readable from the retired buffer.
            if self.cursor > 0 {
                self.buffer.flush(0, self.cursor)?;
            }
            let old = std::mem::replace(&mut self.buffer, replacement);
            self.retired.push(old);
            self.cursor = 0;
            self.reallocations += 1;
            crate::gfx_info!(
                "gfx::context",
                "Staging buffer grown to {} bytes",
                new_size
            );
        }

        let offset = self.aligned_cursor();
        self.cursor = offset + size;
        Ok(StagingRegion { offset, size })
    }

    /// Reserve space for `data` and copy it in
    pub fn stage<F>(&mut self, data: &[u8], grow: F) -> Result<StagingRegion>
    where
        F: FnOnce(u64) -> Result<H>,
    {
        let region = self.reserve(data.len() as u64, grow)?;
        self.buffer.write(region.offset, data)?;
        Ok(region)
    }

    /// Make everything written this frame visible to the device
    pub fn flush(&mut self) -> Result<()> {
        if self.cursor > 0 {
            self.buffer.flush(0, self.cursor)?;
        }
        Ok(())
    }

    /// Rewind the cursor; only valid once the frame's submission completed
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Buffers replaced by a reallocation, to be destroyed once the GPU is done
    pub fn take_retired(&mut self) -> Vec<H> {
        std::mem::take(&mut self.retired)
    }

    pub fn buffer(&self) -> &H { &self.buffer }

    pub fn used(&self) -> u64 { self.cursor }

    pub fn capacity(&self) -> u64 { self.buffer.size() }

    pub fn reallocations(&self) -> u32 { self.reallocations }
}

#[cfg(test)]
#[path = "staging_buffer_tests.rs"]
mod tests;
