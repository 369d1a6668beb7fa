//! Offscreen render target: a framebuffer object with a sampled color
//! texture and an optional depth/stencil renderbuffer

use gfx_context::gfx::resource::TargetId;
use gfx_context::gfx::types::{Extent2D, TextureFormat};
use gfx_context::gfx::{Error, Result};
use gfx_context::{gfx_err, gfx_error};
use glow::HasContext;
use std::rc::Rc;

use crate::gl_format::internal_format_to_gl;

const LOG_SOURCE: &str = "gfx::gl";

pub struct GlRenderTarget {
    gl: Rc<glow::Context>,
    id: TargetId,
    extent: Extent2D,
    framebuffer: Option<glow::Framebuffer>,
    color: Option<glow::Texture>,
    depth_stencil: Option<glow::Renderbuffer>,
}

impl GlRenderTarget {
    pub(crate) fn new(
        gl: Rc<glow::Context>,
        id: TargetId,
        extent: Extent2D,
        color_format: TextureFormat,
        depth_stencil_format: Option<TextureFormat>,
    ) -> Result<Self> {
        if extent.is_empty() {
            return Err(Error::InvalidResource(format!("Render target {:?} has an empty extent", id)));
        }
        let (width, height) = (extent.width as i32, extent.height as i32);

        // Filled in as objects are created so Drop releases a partial target
        let mut target = Self { gl, id, extent, framebuffer: None, color: None, depth_stencil: None };
        let gl = Rc::clone(&target.gl);

        unsafe {
            let color = gl
                .create_texture()
                .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to create color texture: {}", e))?;
            target.color = Some(color);
            gl.bind_texture(glow::TEXTURE_2D, Some(color));
            gl.tex_storage_2d(glow::TEXTURE_2D, 1, internal_format_to_gl(color_format), width, height);
            gl.bind_texture(glow::TEXTURE_2D, None);

            let framebuffer = gl
                .create_framebuffer()
                .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to create framebuffer: {}", e))?;
            target.framebuffer = Some(framebuffer);
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(color),
                0,
            );

            if let Some(format) = depth_stencil_format {
                let renderbuffer = gl
                    .create_renderbuffer()
                    .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to create depth/stencil buffer: {}", e))?;
                target.depth_stencil = Some(renderbuffer);
                gl.bind_renderbuffer(glow::RENDERBUFFER, Some(renderbuffer));
                gl.renderbuffer_storage(glow::RENDERBUFFER, internal_format_to_gl(format), width, height);
                gl.bind_renderbuffer(glow::RENDERBUFFER, None);
                gl.framebuffer_renderbuffer(
                    glow::FRAMEBUFFER,
                    glow::DEPTH_STENCIL_ATTACHMENT,
                    glow::RENDERBUFFER,
                    Some(renderbuffer),
                );
            }

            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            if status != glow::FRAMEBUFFER_COMPLETE {
                gfx_error!(LOG_SOURCE, "Render target {:?} incomplete: {:#x}", id, status);
                return Err(Error::InvalidResource(format!(
                    "Render target {:?} incomplete ({:#x})",
                    id, status
                )));
            }
        }

        Ok(target)
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    pub fn has_depth_stencil(&self) -> bool {
        self.depth_stencil.is_some()
    }

    /// Color texture, to sample the target in a later pass
    pub fn color_texture(&self) -> Option<glow::Texture> {
        self.color
    }

    pub(crate) fn framebuffer(&self) -> Option<glow::Framebuffer> {
        self.framebuffer
    }
}

impl Drop for GlRenderTarget {
    fn drop(&mut self) {
        unsafe {
            if let Some(framebuffer) = self.framebuffer.take() {
                self.gl.delete_framebuffer(framebuffer);
            }
            if let Some(renderbuffer) = self.depth_stencil.take() {
                self.gl.delete_renderbuffer(renderbuffer);
            }
            if let Some(texture) = self.color.take() {
                self.gl.delete_texture(texture);
            }
        }
    }
}
