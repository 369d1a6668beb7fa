/*!
# gfx_context_gl

OpenGL ES 3 / OpenGL 3.3+ backend for `gfx_context`, built on glow.

GL is immediate-mode: the driver orders and synchronizes all work, so this
backend implements `GraphicsContext` directly instead of going through
`ExplicitContext`. The caller owns the GL surface and provides a present
callback (swap buffers).

```no_run
use gfx_context::gfx::{ApiVersion, Config, GraphicsContext};
use gfx_context_gl::gfx::GlContext;
# fn run(gl: glow::Context) -> gfx_context::gfx::Result<()> {
let mut context = GlContext::new(gl, Config::default(), || Ok(()));
context.init(ApiVersion::new(3, 0))?;
context.resize(800, 600)?;
if context.begin_frame()? {
    context.apply_framebuffer(true, "frame")?;
    context.present()?;
}
# Ok(())
# }
```
*/

mod gl_format;
mod gl_pass;
mod gl_frame;
mod gl_buffer;
mod gl_sampler;
mod gl_program;
mod gl_render_target;
mod gl_context;

pub mod gfx {
    pub use crate::gl_buffer::{GlBuffer, GlBufferKind};
    pub use crate::gl_context::{GlContext, PresentCallback};
    pub use crate::gl_pass::{PassIntent, PassPlan};
    pub use crate::gl_program::GlProgram;
    pub use crate::gl_render_target::GlRenderTarget;
    pub use crate::gl_sampler::GlSampler;
}
