//! GL buffer objects for vertex, index and uniform data

use gfx_context::gfx::resource::{BufferTarget, GpuBuffer};
use gfx_context::gfx::{Error, Result};
use gfx_context::gfx_err;
use glow::HasContext;
use std::rc::Rc;

const LOG_SOURCE: &str = "gfx::gl";

/// What a GL buffer is bound as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlBufferKind {
    Vertex,
    Index,
    Uniform,
}

impl GlBufferKind {
    fn bind_target(self) -> u32 {
        match self {
            GlBufferKind::Vertex => glow::ARRAY_BUFFER,
            GlBufferKind::Index => glow::ELEMENT_ARRAY_BUFFER,
            GlBufferKind::Uniform => glow::UNIFORM_BUFFER,
        }
    }
}

impl From<BufferTarget> for GlBufferKind {
    fn from(target: BufferTarget) -> Self {
        match target {
            BufferTarget::Vertex => GlBufferKind::Vertex,
            BufferTarget::Index => GlBufferKind::Index,
        }
    }
}

pub struct GlBuffer {
    gl: Rc<glow::Context>,
    buffer: glow::Buffer,
    kind: GlBufferKind,
    size: u64,
}

impl GlBuffer {
    pub(crate) fn new(gl: Rc<glow::Context>, kind: GlBufferKind, size: u64) -> Result<Self> {
        let gl_size = i32::try_from(size)
            .map_err(|_| Error::InvalidResource(format!("Buffer of {} bytes exceeds GL limits", size)))?;
        let target = kind.bind_target();

        let buffer = unsafe {
            let buffer = gl
                .create_buffer()
                .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to create {:?} buffer: {}", kind, e))?;
            gl.bind_buffer(target, Some(buffer));
            gl.buffer_data_size(target, gl_size, glow::DYNAMIC_DRAW);
            buffer
        };

        Ok(Self { gl, buffer, kind, size })
    }

    /// Raw handle, used in shader parameters
    pub fn handle(&self) -> glow::Buffer {
        self.buffer
    }

    pub fn kind(&self) -> GlBufferKind {
        self.kind
    }
}

impl GpuBuffer for GlBuffer {
    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset.checked_add(data.len() as u64);
        if end.map_or(true, |end| end > self.size) {
            return Err(Error::InvalidResource(format!(
                "Write of {} bytes at offset {} exceeds buffer size {}",
                data.len(),
                offset,
                self.size
            )));
        }
        if data.is_empty() {
            return Ok(());
        }

        let target = self.kind.bind_target();
        unsafe {
            self.gl.bind_buffer(target, Some(self.buffer));
            // offset + len <= size <= i32::MAX
            self.gl.buffer_sub_data_u8_slice(target, offset as i32, data);
        }
        Ok(())
    }

    fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for GlBuffer {
    fn drop(&mut self) {
        unsafe {
            self.gl.delete_buffer(self.buffer);
        }
    }
}
