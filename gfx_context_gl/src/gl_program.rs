//! GLSL program linked from a vertex and a fragment stage
//!
//! Uniform blocks and samplers are expected to carry explicit
//! `layout(binding = N)` qualifiers, which is what `ParamDescriptor`
//! binding slots refer to.

use gfx_context::gfx::types::ProgramId;
use gfx_context::gfx::{Error, Result};
use gfx_context::{gfx_debug, gfx_error};
use glow::HasContext;
use std::rc::Rc;

const LOG_SOURCE: &str = "gfx::gl";

pub struct GlProgram {
    gl: Rc<glow::Context>,
    program: glow::Program,
    id: ProgramId,
}

impl GlProgram {
    pub(crate) fn new(gl: Rc<glow::Context>, id: ProgramId, vertex_src: &str, fragment_src: &str) -> Result<Self> {
        unsafe {
            let vertex = compile_stage(&gl, glow::VERTEX_SHADER, vertex_src)?;
            let fragment = match compile_stage(&gl, glow::FRAGMENT_SHADER, fragment_src) {
                Ok(fragment) => fragment,
                Err(e) => {
                    gl.delete_shader(vertex);
                    return Err(e);
                }
            };

            let program = match gl.create_program() {
                Ok(program) => program,
                Err(e) => {
                    gl.delete_shader(vertex);
                    gl.delete_shader(fragment);
                    return Err(program_error("Failed to create program", &e));
                }
            };
            gl.attach_shader(program, vertex);
            gl.attach_shader(program, fragment);
            gl.link_program(program);

            let linked = gl.get_program_link_status(program);
            let log = gl.get_program_info_log(program);
            gl.detach_shader(program, vertex);
            gl.detach_shader(program, fragment);
            gl.delete_shader(vertex);
            gl.delete_shader(fragment);

            if !linked {
                gl.delete_program(program);
                return Err(program_error("Program link failed", &log));
            }

            gfx_debug!(LOG_SOURCE, "Linked program {:?}", id);
            Ok(Self { gl, program, id })
        }
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn handle(&self) -> glow::Program {
        self.program
    }
}

impl Drop for GlProgram {
    fn drop(&mut self) {
        unsafe {
            self.gl.delete_program(self.program);
        }
    }
}

fn program_error(what: &str, log: &str) -> Error {
    gfx_error!(LOG_SOURCE, "{}: {}", what, log);
    Error::InvalidResource(format!("{}: {}", what, log))
}

unsafe fn compile_stage(gl: &glow::Context, stage: u32, source: &str) -> Result<glow::Shader> {
    let shader = gl
        .create_shader(stage)
        .map_err(|e| program_error("Failed to create shader", &e))?;
    gl.shader_source(shader, source);
    gl.compile_shader(shader);
    if !gl.get_shader_compile_status(shader) {
        let log = gl.get_shader_info_log(shader);
        gl.delete_shader(shader);
        let what = if stage == glow::VERTEX_SHADER {
            "Vertex shader compilation failed"
        } else {
            "Fragment shader compilation failed"
        };
        return Err(program_error(what, &log));
    }
    Ok(shader)
}
