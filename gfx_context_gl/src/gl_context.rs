//! GlContext - immediate-mode implementation of GraphicsContext
//!
//! The driver schedules and synchronizes everything, so there are no fences,
//! no swapchain and no pipeline objects. State setters are applied to GL as
//! they arrive. Render passes are emulated: clear intent turns into
//! `glClear` when the pass opens and attachments that are not stored are
//! invalidated when the pass closes (see `gl_pass` and `gl_frame`).
//!
//! The platform owns the GL surface; presentation goes through the callback
//! given to `new` (typically the windowing layer's swap-buffers).

use std::rc::Rc;
use std::sync::Arc;

use gfx_context::gfx::device::{ContextHandler, FrameInfo, HandlerId, HandlerRegistry, HandlerType};
use gfx_context::gfx::resource::{
    BufferAllocator, BufferResource, BufferTarget, ParamDescriptor, ParamDescriptorSet, TargetId,
};
use gfx_context::gfx::types::{
    BindingInfo, ClearBits, Color, DepthStencilKey, Extent2D, PrimitiveTopology, ProgramId, SamplerKey,
    StencilAction, StencilFace, TestFunction, TextureFormat, Viewport,
};
use gfx_context::gfx::{ApiVersion, Config, ContextState, Error, GraphicsContext, Result};
use gfx_context::state_cache::{CacheStats, StateCache};
use gfx_context::{gfx_debug, gfx_error, gfx_info};
use glow::HasContext;

use crate::gl_buffer::{GlBuffer, GlBufferKind};
use crate::gl_format::{
    attribute_layout, clear_mask, index_type_to_gl, invalidate_attachments, stencil_action_to_gl,
    stencil_face_to_gl, test_function_to_gl, topology_to_gl,
};
use crate::gl_frame::FrameState;
use crate::gl_program::GlProgram;
use crate::gl_render_target::GlRenderTarget;
use crate::gl_sampler::GlSampler;

const LOG_SOURCE: &str = "gfx::gl";

const STENCIL_MASK: u32 = 0xFF;

/// Platform hook that shows the finished frame
pub type PresentCallback = Box<dyn FnMut() -> Result<()>>;

pub struct GlContext {
    gl: Rc<glow::Context>,
    present_callback: PresentCallback,
    config: Config,
    state: ContextState,
    api_version: Option<ApiVersion>,
    renderer_name: String,
    supports_debug: bool,

    // ===== TARGET =====
    surface_extent: Extent2D,
    current_target: Option<Rc<GlRenderTarget>>,
    clear_color: Color,

    // ===== DRAW STATE =====
    frame: FrameState,
    program: Option<Arc<GlProgram>>,
    params: ParamDescriptorSet<glow::Buffer, glow::Texture>,
    samplers: StateCache<SamplerKey, GlSampler>,
    vertex_array: Option<glow::VertexArray>,
    enabled_attributes: Vec<u32>,

    handlers: HandlerRegistry,
    frame_index: u64,
    next_program_id: u64,
}

impl GlContext {
    /// Wrap a current GL context
    ///
    /// `present` is called once per frame, after the last pass was closed.
    pub fn new<F>(gl: glow::Context, config: Config, present: F) -> Self
    where
        F: FnMut() -> Result<()> + 'static,
    {
        Self {
            gl: Rc::new(gl),
            present_callback: Box::new(present),
            config,
            state: ContextState::Uninitialized,
            api_version: None,
            renderer_name: String::new(),
            supports_debug: false,
            surface_extent: Extent2D::default(),
            current_target: None,
            clear_color: Color::BLACK,
            frame: FrameState::default(),
            program: None,
            params: ParamDescriptorSet::new(),
            samplers: StateCache::new(),
            vertex_array: None,
            enabled_attributes: Vec::new(),
            handlers: HandlerRegistry::new(),
            frame_index: 0,
            next_program_id: 1,
        }
    }

    // ===== ACCESSORS =====

    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn surface_extent(&self) -> Extent2D {
        self.surface_extent
    }

    /// Clear and store bits accumulated for the next `apply_framebuffer`
    pub fn pending_attachment_bits(&self) -> (ClearBits, ClearBits) {
        self.frame.pending_bits()
    }

    pub fn stencil_reference_value(&self) -> u32 {
        self.frame.stencil_reference
    }

    pub fn depth_stencil_state(&self) -> &DepthStencilKey {
        &self.frame.depth_stencil
    }

    pub fn sampler_stats(&self) -> CacheStats {
        self.samplers.stats()
    }

    // ===== RESOURCES =====

    /// Link a program from GLSL sources
    pub fn create_program(&mut self, vertex_src: &str, fragment_src: &str) -> Result<Arc<GlProgram>> {
        let id = ProgramId(self.next_program_id);
        self.next_program_id += 1;
        Ok(Arc::new(GlProgram::new(Rc::clone(&self.gl), id, vertex_src, fragment_src)?))
    }

    pub fn create_uniform_buffer(&self, size: u64) -> Result<GlBuffer> {
        GlBuffer::new(Rc::clone(&self.gl), GlBufferKind::Uniform, size)
    }

    /// Offscreen target; the depth/stencil attachment is D24S8 when requested
    pub fn create_render_target(
        &self,
        id: TargetId,
        extent: Extent2D,
        color_format: TextureFormat,
        with_depth_stencil: bool,
    ) -> Result<Rc<GlRenderTarget>> {
        let depth_stencil_format = with_depth_stencil.then_some(TextureFormat::D24_UNORM_S8_UINT);
        Ok(Rc::new(GlRenderTarget::new(
            Rc::clone(&self.gl),
            id,
            extent,
            color_format,
            depth_stencil_format,
        )?))
    }

    // ===== PASS EMULATION =====

    fn bind_current_target(&self) {
        let framebuffer = self.current_target.as_ref().and_then(|target| target.framebuffer());
        unsafe {
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, framebuffer);
        }
    }

    fn current_extent(&self) -> Extent2D {
        match &self.current_target {
            Some(target) => target.extent(),
            None => self.surface_extent,
        }
    }

    fn current_has_depth_stencil(&self) -> bool {
        self.current_target
            .as_ref()
            .map_or(true, |target| target.has_depth_stencil())
    }

    fn apply_viewport(&self, viewport: Viewport) {
        unsafe {
            self.gl
                .viewport(viewport.x, viewport.y, viewport.width as i32, viewport.height as i32);
        }
    }

    fn invalidate(&self, bits: ClearBits) {
        if bits.is_empty() {
            return;
        }
        let attachments = invalidate_attachments(bits, self.current_target.is_none());
        unsafe {
            self.gl.invalidate_framebuffer(glow::FRAMEBUFFER, &attachments);
        }
    }

    /// Clear attachments of the bound framebuffer, ignoring write masks
    fn clear_now(&self, bits: ClearBits) {
        let bits = if self.current_has_depth_stencil() { bits } else { bits & ClearBits::COLOR };
        let mask = clear_mask(bits);
        if mask == 0 {
            return;
        }
        let Color { r, g, b, a } = self.clear_color;
        unsafe {
            self.gl.clear_color(r, g, b, a);
            self.gl.clear_depth_f32(1.0);
            self.gl.clear_stencil(0);
            self.gl.color_mask(true, true, true, true);
            self.gl.depth_mask(true);
            self.gl.stencil_mask(STENCIL_MASK);
            self.gl.clear(mask);
            // Depth writes follow the depth test
            self.gl.depth_mask(self.frame.depth_stencil.depth_enabled);
        }
    }

    fn close_pass(&mut self) {
        let Some(pass) = self.frame.close_pass() else {
            return;
        };
        self.invalidate(pass.invalidate_on_close);
        if pass.label_pushed {
            unsafe { self.gl.pop_debug_group() };
        }
        if self.state == ContextState::RenderPassActive {
            self.state = ContextState::FrameActive;
        }
    }

    // ===== STATE APPLICATION =====

    fn apply_stencil_functions(&self) {
        let reference = self.frame.stencil_reference as i32;
        unsafe {
            self.gl.stencil_func_separate(
                glow::FRONT,
                test_function_to_gl(self.frame.depth_stencil.front.function),
                reference,
                STENCIL_MASK,
            );
            self.gl.stencil_func_separate(
                glow::BACK,
                test_function_to_gl(self.frame.depth_stencil.back.function),
                reference,
                STENCIL_MASK,
            );
        }
    }

    /// Push the whole depth/stencil/blend state to GL
    fn apply_fixed_function_state(&self) {
        let key = &self.frame.depth_stencil;
        unsafe {
            set_capability(&self.gl, glow::DEPTH_TEST, key.depth_enabled);
            self.gl.depth_mask(key.depth_enabled);
            self.gl.depth_func(test_function_to_gl(key.depth_function));

            set_capability(&self.gl, glow::STENCIL_TEST, key.stencil_enabled);
            for (face, state) in [(glow::FRONT, key.front), (glow::BACK, key.back)] {
                self.gl.stencil_op_separate(
                    face,
                    stencil_action_to_gl(state.stencil_fail),
                    stencil_action_to_gl(state.depth_fail),
                    stencil_action_to_gl(state.pass),
                );
            }

            set_capability(&self.gl, glow::BLEND, self.frame.blending_enabled);
            self.gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
        }
        self.apply_stencil_functions();
    }

    fn bind_vertex_layout(&mut self, vertices: &GlBuffer) {
        let mut enabled = Vec::new();
        unsafe {
            self.gl.bind_vertex_array(self.vertex_array);
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(vertices.handle()));
            for binding in &self.frame.bindings {
                let stride = binding.stride as i32;
                for attribute in &binding.attributes {
                    let layout = attribute_layout(attribute.format);
                    self.gl.enable_vertex_attrib_array(attribute.location);
                    if layout.integer {
                        self.gl.vertex_attrib_pointer_i32(
                            attribute.location,
                            layout.components,
                            layout.data_type,
                            stride,
                            attribute.offset as i32,
                        );
                    } else {
                        self.gl.vertex_attrib_pointer_f32(
                            attribute.location,
                            layout.components,
                            layout.data_type,
                            layout.normalized,
                            stride,
                            attribute.offset as i32,
                        );
                    }
                    enabled.push(attribute.location);
                }
            }
            for stale in self.enabled_attributes.iter().filter(|location| !enabled.contains(location)) {
                self.gl.disable_vertex_attrib_array(*stale);
            }
        }
        self.enabled_attributes = enabled;
    }

    fn bind_params(&mut self) -> Result<()> {
        for param in self.params.as_slice() {
            match *param {
                ParamDescriptor::UniformBuffer { binding, buffer, offset, range } => unsafe {
                    self.gl
                        .bind_buffer_range(glow::UNIFORM_BUFFER, binding, Some(buffer), offset as i32, range as i32);
                },
                ParamDescriptor::DynamicUniformBuffer { binding, buffer, range, dynamic_offset } => unsafe {
                    self.gl.bind_buffer_range(
                        glow::UNIFORM_BUFFER,
                        binding,
                        Some(buffer),
                        dynamic_offset as i32,
                        range as i32,
                    );
                },
                ParamDescriptor::Texture { binding, texture, sampler } => {
                    let gl = Rc::clone(&self.gl);
                    let sampler = self
                        .samplers
                        .get_or_try_create(&sampler, |key| GlSampler::new(gl, key))?;
                    unsafe {
                        self.gl.active_texture(glow::TEXTURE0 + binding);
                        self.gl.bind_texture(glow::TEXTURE_2D, Some(texture));
                        self.gl.bind_sampler(binding, Some(sampler.handle()));
                    }
                }
            }
        }
        Ok(())
    }

    fn reset_frame_state(&mut self) {
        self.frame.reset();
        self.params.clear();
        self.program = None;
        self.current_target = None;
        unsafe {
            self.gl.use_program(None);
        }
        self.apply_fixed_function_state();
    }
}

unsafe fn set_capability(gl: &glow::Context, capability: u32, enabled: bool) {
    if enabled {
        gl.enable(capability);
    } else {
        gl.disable(capability);
    }
}

impl BufferAllocator for GlContext {
    type Buffer = GlBuffer;

    fn create_buffer(&self, target: BufferTarget, size_bytes: u64) -> Result<GlBuffer> {
        GlBuffer::new(Rc::clone(&self.gl), target.into(), size_bytes)
    }
}

// ============================================================================
// GraphicsContext
// ============================================================================

impl GraphicsContext for GlContext {
    type Buffer = GlBuffer;
    type Program = GlProgram;
    type RenderTarget = Rc<GlRenderTarget>;
    type BufferHandle = glow::Buffer;
    type TextureHandle = glow::Texture;

    fn init(&mut self, api_version: ApiVersion) -> Result<()> {
        assert_eq!(self.state, ContextState::Uninitialized, "Context initialized twice");

        let version = self.gl.version();
        if (version.major, version.minor) < (api_version.major, api_version.minor) {
            gfx_error!(
                LOG_SOURCE,
                "GL {}.{} requested, context provides {}.{}",
                api_version.major,
                api_version.minor,
                version.major,
                version.minor
            );
            return Err(Error::InitializationFailed(format!(
                "GL {}.{} not available (have {}.{})",
                api_version.major, api_version.minor, version.major, version.minor
            )));
        }

        let vertex_array = unsafe {
            let vertex_array = self.gl.create_vertex_array().map_err(|e| {
                gfx_error!(LOG_SOURCE, "Failed to create vertex array: {}", e);
                Error::InitializationFailed(format!("Failed to create vertex array: {}", e))
            })?;
            self.gl.bind_vertex_array(Some(vertex_array));
            vertex_array
        };
        self.vertex_array = Some(vertex_array);

        self.renderer_name = unsafe {
            format!(
                "{} ({})",
                self.gl.get_parameter_string(glow::RENDERER),
                self.gl.get_parameter_string(glow::VERSION)
            )
        };
        self.supports_debug = self.gl.supports_debug();
        self.apply_fixed_function_state();

        self.handlers.reset();
        self.api_version = Some(api_version);
        self.state = ContextState::Ready;

        gfx_info!(LOG_SOURCE, "Context initialized: {} (API {})", self.renderer_name, api_version);
        Ok(())
    }

    fn api_version(&self) -> Option<ApiVersion> {
        self.api_version
    }

    fn renderer_name(&self) -> String {
        self.renderer_name.clone()
    }

    fn state(&self) -> ContextState {
        self.state
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        assert!(!self.state.in_frame(), "resize called inside a frame");
        self.surface_extent = Extent2D::new(width, height);
        gfx_debug!(LOG_SOURCE, "Surface resized to {}x{}", width, height);
        Ok(())
    }

    fn begin_frame(&mut self) -> Result<bool> {
        assert_eq!(self.state, ContextState::Ready, "begin_frame called outside Ready state");
        if self.surface_extent.is_empty() {
            return Ok(false);
        }

        self.frame_index += 1;
        self.current_target = None;
        self.bind_current_target();
        self.state = ContextState::FrameActive;
        Ok(true)
    }

    fn present(&mut self) -> Result<()> {
        assert!(self.state.in_frame(), "present called outside a frame");
        self.state = ContextState::Presenting;
        let info = FrameInfo { frame_index: self.frame_index, image_index: 0 };

        self.handlers.invoke(HandlerType::PrePresent, &info);
        self.close_pass();

        let presented = (self.present_callback)();
        if let Err(e) = &presented {
            gfx_error!(LOG_SOURCE, "Present callback failed: {}", e);
        }

        self.handlers.invoke(HandlerType::PostPresent, &info);
        self.reset_frame_state();
        self.state = ContextState::Ready;
        presented
    }

    // ===== FRAMEBUFFER =====

    fn set_framebuffer(&mut self, target: Option<Rc<GlRenderTarget>>) -> Result<()> {
        assert!(self.state.in_frame(), "set_framebuffer called outside a frame");
        self.close_pass();
        self.current_target = target;
        self.bind_current_target();
        Ok(())
    }

    fn apply_framebuffer(&mut self, clear_on_load: bool, label: &str) -> Result<()> {
        assert!(self.state.in_frame(), "apply_framebuffer called outside a frame");
        self.close_pass();

        let surface = self.current_target.is_none();
        let has_depth_stencil = self.current_has_depth_stencil();
        let plan = self.frame.open_pass(clear_on_load, surface, has_depth_stencil);
        self.bind_current_target();

        if self.supports_debug && !label.is_empty() {
            unsafe { self.gl.push_debug_group(glow::DEBUG_SOURCE_APPLICATION, 0, label) };
            self.frame.mark_label_pushed();
        }

        self.apply_viewport(self.frame.viewport_for(self.current_extent()));
        self.invalidate(plan.invalidate_on_open);
        self.clear_now(plan.clear);

        self.state = ContextState::RenderPassActive;
        Ok(())
    }

    fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }

    fn clear(&mut self, clear_bits: ClearBits, store_bits: ClearBits) {
        if self.frame.pass_open() {
            self.clear_now(clear_bits);
        } else {
            self.frame.record_clear(clear_bits, store_bits);
        }
    }

    // ===== STATE =====

    fn set_viewport(&mut self, viewport: Viewport) {
        self.frame.set_viewport(viewport);
        if self.state.in_frame() {
            self.apply_viewport(viewport);
        }
    }

    fn set_depth_test_enabled(&mut self, enabled: bool) {
        self.frame.depth_stencil.set_depth_test_enabled(enabled);
        unsafe {
            set_capability(&self.gl, glow::DEPTH_TEST, enabled);
            self.gl.depth_mask(enabled);
        }
    }

    fn set_depth_test_function(&mut self, function: TestFunction) {
        self.frame.depth_stencil.set_depth_function(function);
        unsafe {
            self.gl.depth_func(test_function_to_gl(function));
        }
    }

    fn set_stencil_test_enabled(&mut self, enabled: bool) {
        self.frame.depth_stencil.set_stencil_test_enabled(enabled);
        unsafe {
            set_capability(&self.gl, glow::STENCIL_TEST, enabled);
        }
    }

    fn set_stencil_function(&mut self, face: StencilFace, function: TestFunction) {
        self.frame.depth_stencil.set_stencil_function(face, function);
        self.apply_stencil_functions();
    }

    fn set_stencil_actions(
        &mut self,
        face: StencilFace,
        stencil_fail: StencilAction,
        depth_fail: StencilAction,
        pass: StencilAction,
    ) {
        self.frame.depth_stencil.set_stencil_actions(face, stencil_fail, depth_fail, pass);
        unsafe {
            self.gl.stencil_op_separate(
                stencil_face_to_gl(face),
                stencil_action_to_gl(stencil_fail),
                stencil_action_to_gl(depth_fail),
                stencil_action_to_gl(pass),
            );
        }
    }

    fn set_stencil_reference_value(&mut self, value: u32) {
        self.frame.stencil_reference = value;
        self.apply_stencil_functions();
    }

    fn set_blending_enabled(&mut self, enabled: bool) {
        self.frame.blending_enabled = enabled;
        unsafe {
            set_capability(&self.gl, glow::BLEND, enabled);
        }
    }

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) {
        self.frame.topology = topology;
    }

    fn set_binding_info(&mut self, bindings: &[BindingInfo]) {
        self.frame.bindings = bindings.to_vec();
    }

    fn set_program(&mut self, program: Arc<GlProgram>) {
        unsafe {
            self.gl.use_program(Some(program.handle()));
        }
        self.program = Some(program);
    }

    fn apply_param_descriptor(&mut self, descriptor: ParamDescriptor<glow::Buffer, glow::Texture>) {
        self.params.apply(descriptor);
    }

    // ===== DRAW =====

    fn draw_indexed(&mut self, vertices: &BufferResource<GlBuffer>, indices: &BufferResource<GlBuffer>) -> Result<()> {
        assert!(self.frame.pass_open(), "draw_indexed called without an open render pass");
        assert!(self.program.is_some(), "draw_indexed called without a program");
        let index_type = match indices.index_type() {
            Some(index_type) => index_type,
            None => panic!("draw_indexed index buffer is not an index buffer"),
        };

        self.bind_vertex_layout(vertices.gpu_buffer());
        self.bind_params()?;

        let count = indices.current_size();
        if count == 0 {
            return Ok(());
        }
        unsafe {
            self.gl
                .bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(indices.gpu_buffer().handle()));
            self.gl
                .draw_elements(topology_to_gl(self.frame.topology), count as i32, index_type_to_gl(index_type), 0);
        }
        Ok(())
    }

    // ===== HOOKS =====

    fn register_handler(&mut self, handler_type: HandlerType, handler: ContextHandler) -> HandlerId {
        self.handlers.register(handler_type, handler)
    }

    fn unregister_handler(&mut self, id: HandlerId) -> bool {
        self.handlers.unregister(id)
    }
}

impl Drop for GlContext {
    fn drop(&mut self) {
        self.handlers.reset();
        self.params.clear();
        self.program = None;
        self.current_target = None;
        self.samplers.drain();
        if let Some(vertex_array) = self.vertex_array.take() {
            unsafe {
                self.gl.bind_vertex_array(None);
                self.gl.delete_vertex_array(vertex_array);
            }
        }
        if self.state != ContextState::Uninitialized {
            gfx_info!(LOG_SOURCE, "Context destroyed after {} frames", self.frame_index);
        }
    }
}
