//! GL sampler object described by a SamplerKey

use gfx_context::gfx::types::SamplerKey;
use gfx_context::gfx::Result;
use gfx_context::gfx_err;
use glow::HasContext;
use std::rc::Rc;

use crate::gl_format::{filter_to_gl, wrapping_to_gl};

const LOG_SOURCE: &str = "gfx::gl";

pub struct GlSampler {
    gl: Rc<glow::Context>,
    sampler: glow::Sampler,
}

impl GlSampler {
    pub(crate) fn new(gl: Rc<glow::Context>, key: &SamplerKey) -> Result<Self> {
        let (min_filter, mag_filter) = filter_to_gl(key.filter);
        let sampler = unsafe {
            let sampler = gl
                .create_sampler()
                .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to create sampler {:?}: {}", key, e))?;
            gl.sampler_parameter_i32(sampler, glow::TEXTURE_MIN_FILTER, min_filter as i32);
            gl.sampler_parameter_i32(sampler, glow::TEXTURE_MAG_FILTER, mag_filter as i32);
            gl.sampler_parameter_i32(sampler, glow::TEXTURE_WRAP_S, wrapping_to_gl(key.wrap_u) as i32);
            gl.sampler_parameter_i32(sampler, glow::TEXTURE_WRAP_T, wrapping_to_gl(key.wrap_v) as i32);
            sampler
        };
        Ok(Self { gl, sampler })
    }

    pub fn handle(&self) -> glow::Sampler {
        self.sampler
    }
}

impl Drop for GlSampler {
    fn drop(&mut self) {
        unsafe {
            self.gl.delete_sampler(self.sampler);
        }
    }
}
