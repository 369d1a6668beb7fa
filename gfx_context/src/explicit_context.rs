//! Frame lifecycle over an explicit GPU API
//!
//! `ExplicitContext<D>` drives any `GraphicsDevice` through
//! `Uninitialized -> Ready -> FrameActive <-> RenderPassActive -> Presenting -> Ready`.
//! It owns every cache, the staging buffer, the framebuffer entries and the
//! object manager; the device only executes what it is told.
//!
//! One frame is in flight at most: `begin_frame` waits on the previous
//! frame's fence and `present` waits for the queue to drain. A "device lost"
//! result from a wait, a submission or a present is logged and treated as
//! success so the render thread never blocks on a dead device.

use std::sync::Arc;

use crate::attachments::AttachmentsOperations;
use crate::buffer::BufferResource;
use crate::config::{ApiVersion, Config};
use crate::context::{ContextState, GraphicsContext};
use crate::device::{
    AcquireStatus, GpuProgram, GraphicsDevice, PipelineDesc, PresentStatus, ResolvedParam, SubmitStatus,
    WaitStatus,
};
use crate::error::Result;
use crate::framebuffer::{
    FramebufferKey, FramebufferManager, FramebufferTarget, RenderTarget, RetiredFramebuffers, TargetId,
};
use crate::handlers::{ContextHandler, FrameInfo, HandlerId, HandlerRegistry, HandlerType};
use crate::object_manager::{ObjectManager, ObjectStats};
use crate::param_descriptor::{ParamDescriptor, ParamDescriptorSet};
use crate::render_state::{DepthStencilKey, PipelineKey, SamplerKey};
use crate::staging_buffer::{StagingBuffer, StagingRegion};
use crate::state_cache::{CacheStats, StateCache};
use crate::swapchain::SwapchainDesc;
use crate::types::{
    BindingInfo, ClearBits, Color, Extent2D, PrimitiveTopology, StencilAction, StencilFace, TestFunction,
    Viewport,
};
use crate::{gfx_debug, gfx_info, gfx_trace, gfx_warn};

/// Stencil reference value restored after every present
pub const DEFAULT_STENCIL_REFERENCE: u32 = 1;

const LOG_SOURCE: &str = "gfx::context";

/// Counters exposed for instrumentation and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContextStats {
    pub pipelines: CacheStats,
    pub depth_stencil_states: CacheStats,
    pub samplers: CacheStats,
    pub render_pass_creations: u64,
    pub framebuffer_creations: u64,
    pub swapchain_recreations: u64,
    pub presented_frames: u64,
    pub objects: ObjectStats,
}

pub struct ExplicitContext<D: GraphicsDevice> {
    config: Config,
    state: ContextState,
    api_version: Option<ApiVersion>,

    // ===== SURFACE =====
    surface_attached: bool,
    present_available: bool,
    surface_extent: Extent2D,
    swapchain_extent: Extent2D,
    swapchain_image_count: u32,
    image_index: u32,
    recreate_pending: bool,

    // ===== CURRENT TARGET =====
    framebuffers: FramebufferManager<D>,
    current_target: Option<RenderTarget<D::Attachment>>,
    current_render_pass: Option<Arc<D::RenderPass>>,
    current_framebuffer: Option<Arc<D::Framebuffer>>,
    current_extent: Extent2D,
    render_pass_open: bool,
    clear_bits: ClearBits,
    store_bits: ClearBits,
    clear_color: Color,
    viewport: Option<Viewport>,

    // ===== PER-DRAW STATE =====
    pipeline_key: PipelineKey,
    program: Option<Arc<D::Program>>,
    params: ParamDescriptorSet<D::BufferHandle, D::TextureHandle>,
    stencil_reference: u32,
    current_pipeline: Option<Arc<D::Pipeline>>,

    // ===== CACHES =====
    pipelines: StateCache<PipelineKey, D::Pipeline>,
    depth_stencil_states: StateCache<DepthStencilKey, D::DepthStencilState>,
    samplers: StateCache<SamplerKey, D::Sampler>,

    staging: Option<StagingBuffer<D::HostBuffer>>,
    objects: ObjectManager,
    handlers: HandlerRegistry,

    /// Generation of the frame being recorded (or last recorded)
    generation: u64,
    frame_index: u64,
    presented_frames: u64,
    swapchain_recreations: u64,

    // Last field: every object above is released before the device.
    device: D,
}

impl<D: GraphicsDevice> ExplicitContext<D> {
    pub fn new(device: D, config: Config) -> Self {
        let objects = ObjectManager::new(config.sync_collect_budget);
        Self {
            config,
            state: ContextState::Uninitialized,
            api_version: None,
            surface_attached: false,
            present_available: true,
            surface_extent: Extent2D::default(),
            swapchain_extent: Extent2D::default(),
            swapchain_image_count: 0,
            image_index: 0,
            recreate_pending: false,
            framebuffers: FramebufferManager::new(),
            current_target: None,
            current_render_pass: None,
            current_framebuffer: None,
            current_extent: Extent2D::default(),
            render_pass_open: false,
            clear_bits: ClearBits::empty(),
            store_bits: ClearBits::empty(),
            clear_color: Color::default(),
            viewport: None,
            pipeline_key: PipelineKey::default(),
            program: None,
            params: ParamDescriptorSet::new(),
            stencil_reference: DEFAULT_STENCIL_REFERENCE,
            current_pipeline: None,
            pipelines: StateCache::new(),
            depth_stencil_states: StateCache::new(),
            samplers: StateCache::new(),
            staging: None,
            objects,
            handlers: HandlerRegistry::new(),
            generation: 0,
            frame_index: 0,
            presented_frames: 0,
            swapchain_recreations: 0,
            device,
        }
    }

    // ===== ACCESSORS =====

    pub fn device(&self) -> &D { &self.device }

    pub fn device_mut(&mut self) -> &mut D { &mut self.device }

    pub fn config(&self) -> &Config { &self.config }

    pub fn swapchain_extent(&self) -> Extent2D { self.swapchain_extent }

    pub fn swapchain_image_count(&self) -> u32 { self.swapchain_image_count }

    /// Pending clear and store intent, consumed by the next `apply_framebuffer`
    pub fn pending_attachment_bits(&self) -> (ClearBits, ClearBits) {
        (self.clear_bits, self.store_bits)
    }

    pub fn stencil_reference_value(&self) -> u32 { self.stencil_reference }

    pub fn pipeline_key(&self) -> &PipelineKey { &self.pipeline_key }

    pub fn param_descriptors(&self) -> &ParamDescriptorSet<D::BufferHandle, D::TextureHandle> {
        &self.params
    }

    /// Dynamic offset of the bound dynamic uniform buffer
    pub fn current_dynamic_buffer_offset(&self) -> Option<u32> {
        self.params.dynamic_offset()
    }

    pub fn staging_buffer(&self) -> Option<&StagingBuffer<D::HostBuffer>> {
        self.staging.as_ref()
    }

    pub fn staging_buffer_mut(&mut self) -> Option<&mut StagingBuffer<D::HostBuffer>> {
        self.staging.as_mut()
    }

    pub fn stats(&self) -> ContextStats {
        ContextStats {
            pipelines: self.pipelines.stats(),
            depth_stencil_states: self.depth_stencil_states.stats(),
            samplers: self.samplers.stats(),
            render_pass_creations: self.framebuffers.render_pass_creations(),
            framebuffer_creations: self.framebuffers.framebuffer_creations(),
            swapchain_recreations: self.swapchain_recreations,
            presented_frames: self.presented_frames,
            objects: self.objects.stats(),
        }
    }

    // ===== SURFACE =====

    /// Surface became available; builds the swapchain chain
    pub fn attach_surface(&mut self, extent: Extent2D) -> Result<()> {
        assert!(!self.state.in_frame(), "attach_surface called inside a frame");
        self.surface_attached = true;
        self.surface_extent = extent;
        gfx_info!(LOG_SOURCE, "Surface attached ({}x{})", extent.width, extent.height);
        self.recreate_swapchain_and_dependencies()
    }

    /// Surface is going away; tears the swapchain chain down
    pub fn detach_surface(&mut self) -> Result<()> {
        assert!(!self.state.in_frame(), "detach_surface called inside a frame");
        self.device.wait_idle()?;
        self.reset_swapchain_and_dependencies();
        self.surface_attached = false;
        gfx_info!(LOG_SOURCE, "Surface detached");
        Ok(())
    }

    pub fn set_present_available(&mut self, available: bool) {
        gfx_info!(LOG_SOURCE, "Present available: {}", available);
        self.present_available = available;
    }

    fn reset_swapchain_and_dependencies(&mut self) {
        self.framebuffers.clear();
        self.pipelines.drain();
        self.current_render_pass = None;
        self.current_framebuffer = None;
        self.current_pipeline = None;

        self.device.destroy_depth_attachment();
        self.device.destroy_command_buffers();
        self.device.destroy_swapchain();
        self.swapchain_image_count = 0;

        // Device is idle: everything retired so far is safe to destroy.
        self.objects.collect_sync(self.generation);
    }

    /// Rebuild swapchain, depth attachment and command buffers for the
    /// current surface extent
    ///
    /// Safe to call on surface attach, on resize and as recovery from a
    /// stale acquire or present.
    pub fn recreate_swapchain_and_dependencies(&mut self) -> Result<()> {
        self.device.wait_idle()?;
        self.reset_swapchain_and_dependencies();

        let caps = self.device.surface_capabilities()?;
        let desc = SwapchainDesc::from_capabilities(&caps, self.surface_extent);
        if desc.extent.is_empty() {
            gfx_info!(LOG_SOURCE, "Surface has zero extent, swapchain recreation postponed");
            self.recreate_pending = true;
            return Ok(());
        }

        self.device.recreate_depth_attachment(desc.extent)?;
        self.swapchain_image_count = self.device.create_swapchain(&desc)?;
        self.swapchain_extent = desc.extent;
        self.device.create_command_buffers()?;
        self.device.wait_idle()?;

        self.recreate_pending = false;
        self.swapchain_recreations += 1;
        gfx_info!(
            LOG_SOURCE,
            "Swapchain recreated: {}x{}, {} images",
            desc.extent.width,
            desc.extent.height,
            self.swapchain_image_count
        );
        Ok(())
    }

    // ===== TARGETS / OBJECTS =====

    /// Forget an offscreen target that is being destroyed
    pub fn remove_render_target(&mut self, id: TargetId) {
        if let Some(retired) = self.framebuffers.remove(FramebufferKey::Offscreen(id)) {
            self.retire_framebuffers(retired);
        }
    }

    /// Destroy `object` once no frame in flight can reference it
    pub fn retire_object<T: Send + 'static>(&mut self, object: T) {
        self.objects.retire(self.generation, object);
    }

    /// Block until the background sweeper, if running, has finished
    pub fn wait_for_async_collection(&mut self) {
        self.objects.wait_async();
    }

    fn retire_framebuffers(&mut self, retired: RetiredFramebuffers<D>) {
        let ids = retired.render_pass_ids;
        let pipelines = self.pipelines.drain_where(|key| ids.contains(&key.render_pass));
        gfx_debug!(
            LOG_SOURCE,
            "Retiring {} render passes, {} framebuffers, {} pipelines",
            ids.len(),
            retired.framebuffers.len(),
            pipelines.len()
        );
        for pipeline in pipelines {
            self.objects.retire(self.generation, pipeline);
        }
        for render_pass in retired.render_passes {
            self.objects.retire(self.generation, render_pass);
        }
        for framebuffer in retired.framebuffers {
            self.objects.retire(self.generation, framebuffer);
        }
    }

    /// Copy `data` into the staging buffer, growing it if this frame needs more
    pub fn stage_data(&mut self, data: &[u8]) -> Result<StagingRegion> {
        let device = &self.device;
        match self.staging.as_mut() {
            Some(staging) => staging.stage(data, |size| device.create_host_buffer(size)),
            None => panic!("stage_data called before init"),
        }
    }

    // ===== CACHES =====

    pub fn get_sampler(&mut self, key: &SamplerKey) -> Result<Arc<D::Sampler>> {
        let device = &self.device;
        self.samplers.get_or_try_create(key, |key| device.create_sampler(key))
    }

    /// Pipeline for the current key, built on first use
    ///
    /// # Panics
    ///
    /// Panics without a program or outside an open render pass.
    pub fn current_pipeline(&mut self) -> Result<Arc<D::Pipeline>> {
        let program = match &self.program {
            Some(program) => Arc::clone(program),
            None => panic!("No program set for the current pipeline"),
        };
        let render_pass = match (&self.current_render_pass, self.render_pass_open) {
            (Some(render_pass), true) => Arc::clone(render_pass),
            _ => panic!("No render pass open for the current pipeline"),
        };

        let device = &self.device;
        let depth_stencil_states = &mut self.depth_stencil_states;
        self.pipelines.get_or_try_create(&self.pipeline_key, |key| {
            let depth_stencil = depth_stencil_states
                .get_or_try_create(&key.depth_stencil, |ds| device.create_depth_stencil_state(ds))?;
            device.create_pipeline(&PipelineDesc {
                key,
                render_pass: &render_pass,
                program: &program,
                depth_stencil: &depth_stencil,
            })
        })
    }

    fn resolve_params(&mut self) -> Result<Vec<ResolvedParam<D>>> {
        let mut resolved = Vec::with_capacity(self.params.len());
        let device = &self.device;
        for param in self.params.as_slice() {
            resolved.push(match param {
                ParamDescriptor::UniformBuffer { binding, buffer, offset, range } => ResolvedParam::UniformBuffer {
                    binding: *binding,
                    buffer: *buffer,
                    offset: *offset,
                    range: *range,
                },
                ParamDescriptor::DynamicUniformBuffer { binding, buffer, range, dynamic_offset } => {
                    ResolvedParam::DynamicUniformBuffer {
                        binding: *binding,
                        buffer: *buffer,
                        range: *range,
                        dynamic_offset: *dynamic_offset,
                    }
                }
                ParamDescriptor::Texture { binding, texture, sampler } => ResolvedParam::Texture {
                    binding: *binding,
                    texture: *texture,
                    sampler: self.samplers.get_or_try_create(sampler, |key| device.create_sampler(key))?,
                },
            });
        }
        Ok(resolved)
    }

    // ===== FRAME HELPERS =====

    fn close_render_pass(&mut self) {
        if !self.render_pass_open {
            return;
        }
        self.device.end_render_pass();
        if let Some(target) = &self.current_target {
            self.device.post_render_barrier(&target.color);
        }
        self.device.pop_debug_label();
        self.render_pass_open = false;
        if self.state == ContextState::RenderPassActive {
            self.state = ContextState::FrameActive;
        }
    }

    fn frame_info(&self) -> FrameInfo {
        FrameInfo {
            frame_index: self.frame_index,
            image_index: self.image_index,
        }
    }

    fn reset_frame_state(&mut self) {
        self.pipeline_key = PipelineKey::default();
        self.stencil_reference = DEFAULT_STENCIL_REFERENCE;
        self.params.clear();
        self.clear_bits = ClearBits::empty();
        self.store_bits = ClearBits::empty();
        self.program = None;
        self.current_pipeline = None;
        self.current_render_pass = None;
        self.current_framebuffer = None;
        self.current_target = None;
    }
}

impl<D: GraphicsDevice> GraphicsContext for ExplicitContext<D> {
    type Buffer = D::Buffer;
    type Program = D::Program;
    type RenderTarget = RenderTarget<D::Attachment>;
    type BufferHandle = D::BufferHandle;
    type TextureHandle = D::TextureHandle;

    fn init(&mut self, api_version: ApiVersion) -> Result<()> {
        assert_eq!(self.state, ContextState::Uninitialized, "Context initialized twice");

        self.device.create_command_pool()?;
        self.device.create_sync_primitives()?;

        let host_buffer = self.device.create_host_buffer(self.config.staging_buffer_size)?;
        self.staging = Some(StagingBuffer::new(host_buffer, self.device.staging_alignment()));

        self.handlers.reset();
        self.api_version = Some(api_version);
        self.state = ContextState::Ready;

        gfx_info!(
            LOG_SOURCE,
            "Context initialized: {} (API {})",
            self.device.renderer_name(),
            api_version
        );
        Ok(())
    }

    fn api_version(&self) -> Option<ApiVersion> {
        self.api_version
    }

    fn renderer_name(&self) -> String {
        self.device.renderer_name()
    }

    fn state(&self) -> ContextState {
        self.state
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        assert!(!self.state.in_frame(), "resize called inside a frame");
        self.surface_extent = Extent2D::new(width, height);
        if !self.surface_attached {
            return Ok(());
        }
        if self.surface_extent.is_empty() {
            self.recreate_pending = true;
            return Ok(());
        }
        gfx_info!(LOG_SOURCE, "Resize to {}x{}", width, height);
        self.recreate_swapchain_and_dependencies()
    }

    fn begin_frame(&mut self) -> Result<bool> {
        assert_eq!(self.state, ContextState::Ready, "begin_frame called outside Ready state");

        if !self.present_available || !self.surface_attached {
            return Ok(false);
        }
        if self.recreate_pending {
            if self.surface_extent.is_empty() {
                return Ok(false);
            }
            self.recreate_swapchain_and_dependencies()?;
        }
        if self.swapchain_image_count == 0 {
            return Ok(false);
        }

        if self.device.wait_frame_fence(self.config.fence_timeout_ns)? == WaitStatus::DeviceLost {
            gfx_warn!(LOG_SOURCE, "Device lost while waiting for the frame fence, continuing");
        }

        let image_index = match self.device.acquire_next_image()? {
            AcquireStatus::Acquired(index) => index,
            AcquireStatus::Suboptimal(index) => {
                self.recreate_pending = true;
                index
            }
            AcquireStatus::OutOfDate => {
                gfx_info!(LOG_SOURCE, "Swapchain out of date on acquire, recreating");
                self.recreate_swapchain_and_dependencies()?;
                if self.swapchain_image_count == 0 {
                    return Ok(false);
                }
                match self.device.acquire_next_image()? {
                    AcquireStatus::Acquired(index) => index,
                    AcquireStatus::Suboptimal(index) => {
                        self.recreate_pending = true;
                        index
                    }
                    status => {
                        gfx_warn!(LOG_SOURCE, "Acquire failed after recreation ({:?}), skipping frame", status);
                        return Ok(false);
                    }
                }
            }
            AcquireStatus::DeviceLost => {
                gfx_warn!(LOG_SOURCE, "Device lost on acquire, skipping frame");
                return Ok(false);
            }
        };

        // Only now is a submission guaranteed to signal the fence again.
        self.device.reset_frame_fence()?;
        self.device.begin_command_buffers()?;

        self.image_index = image_index;
        self.generation += 1;
        self.frame_index += 1;
        self.state = ContextState::FrameActive;

        if let Some(viewport) = self.viewport {
            self.device.set_viewport(viewport);
        }

        gfx_trace!(LOG_SOURCE, "Frame {} begun on image {}", self.frame_index, image_index);
        Ok(true)
    }

    fn set_framebuffer(&mut self, target: Option<Self::RenderTarget>) -> Result<()> {
        assert!(self.state.in_frame(), "set_framebuffer called outside a frame");
        self.close_render_pass();
        self.current_target = target;
        Ok(())
    }

    fn apply_framebuffer(&mut self, clear_on_load: bool, label: &str) -> Result<()> {
        assert!(self.state.in_frame(), "apply_framebuffer called outside a frame");
        self.close_render_pass();

        if clear_on_load {
            self.clear_bits |= ClearBits::all();
        }
        let ops = AttachmentsOperations::from_bits(self.clear_bits, self.store_bits);
        self.clear_bits = ClearBits::empty();
        self.store_bits = ClearBits::empty();

        self.device.set_stencil_reference(self.stencil_reference);

        let target = match &self.current_target {
            None => FramebufferTarget::Surface {
                extent: self.swapchain_extent,
                color_format: self.device.surface_format(),
                depth_stencil_format: self.device.depth_stencil_format(),
                image_count: self.swapchain_image_count,
                image_index: self.image_index,
            },
            Some(render_target) => FramebufferTarget::Offscreen(render_target),
        };
        let (resolved, retired) = self.framebuffers.resolve(&self.device, &target, ops)?;
        if let Some(retired) = retired {
            self.retire_framebuffers(retired);
        }

        self.pipeline_key.render_pass = resolved.render_pass_id;
        self.current_pipeline = None;

        self.device.push_debug_label(label);
        self.device.begin_render_pass(
            &resolved.render_pass,
            &resolved.framebuffer,
            resolved.extent,
            self.clear_color,
        );
        // A scene viewport persists; without one each pass covers its target
        if self.viewport.is_none() {
            self.device.set_viewport(Viewport::full(resolved.extent));
        }

        self.current_extent = resolved.extent;
        self.current_render_pass = Some(resolved.render_pass);
        self.current_framebuffer = Some(resolved.framebuffer);
        self.render_pass_open = true;
        self.state = ContextState::RenderPassActive;
        Ok(())
    }

    fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }

    fn clear(&mut self, clear_bits: ClearBits, store_bits: ClearBits) {
        if self.render_pass_open {
            self.device.clear_attachments(clear_bits, self.clear_color, self.current_extent);
        } else {
            self.clear_bits |= clear_bits;
            self.store_bits |= store_bits;
        }
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
        if self.state.in_frame() {
            self.device.set_viewport(viewport);
        }
    }

    fn set_depth_test_enabled(&mut self, enabled: bool) {
        self.pipeline_key.depth_stencil.set_depth_test_enabled(enabled);
    }

    fn set_depth_test_function(&mut self, function: TestFunction) {
        self.pipeline_key.depth_stencil.set_depth_function(function);
    }

    fn set_stencil_test_enabled(&mut self, enabled: bool) {
        self.pipeline_key.depth_stencil.set_stencil_test_enabled(enabled);
    }

    fn set_stencil_function(&mut self, face: StencilFace, function: TestFunction) {
        self.pipeline_key.depth_stencil.set_stencil_function(face, function);
    }

    fn set_stencil_actions(
        &mut self,
        face: StencilFace,
        stencil_fail: StencilAction,
        depth_fail: StencilAction,
        pass: StencilAction,
    ) {
        self.pipeline_key
            .depth_stencil
            .set_stencil_actions(face, stencil_fail, depth_fail, pass);
    }

    fn set_stencil_reference_value(&mut self, value: u32) {
        self.stencil_reference = value;
        if self.render_pass_open {
            self.device.set_stencil_reference(value);
        }
    }

    fn set_blending_enabled(&mut self, enabled: bool) {
        self.pipeline_key.blending_enabled = enabled;
    }

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) {
        self.pipeline_key.topology = topology;
    }

    fn set_binding_info(&mut self, bindings: &[BindingInfo]) {
        self.pipeline_key.bindings.clear();
        self.pipeline_key.bindings.extend_from_slice(bindings);
    }

    fn set_program(&mut self, program: Arc<D::Program>) {
        self.pipeline_key.program = Some(program.id());
        self.program = Some(program);
    }

    fn apply_param_descriptor(&mut self, descriptor: ParamDescriptor<D::BufferHandle, D::TextureHandle>) {
        self.params.apply(descriptor);
    }

    fn draw_indexed(
        &mut self,
        vertices: &BufferResource<D::Buffer>,
        indices: &BufferResource<D::Buffer>,
    ) -> Result<()> {
        assert!(self.render_pass_open, "draw_indexed called without an open render pass");
        let index_type = match indices.index_type() {
            Some(index_type) => index_type,
            None => panic!("draw_indexed index buffer is not an index buffer"),
        };

        let pipeline = self.current_pipeline()?;
        let rebind = match &self.current_pipeline {
            Some(bound) => !Arc::ptr_eq(bound, &pipeline),
            None => true,
        };
        if rebind {
            self.device.bind_pipeline(&pipeline);
            self.current_pipeline = Some(Arc::clone(&pipeline));
        }

        let params = self.resolve_params()?;
        if let Some(program) = &self.program {
            self.device.bind_params(program, &params)?;
        }

        self.device.bind_vertex_buffer(vertices.gpu_buffer());
        self.device.bind_index_buffer(indices.gpu_buffer(), index_type);
        self.device.draw_indexed(indices.current_size());
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        assert!(self.state.in_frame(), "present called outside a frame");
        self.state = ContextState::Presenting;
        let info = self.frame_info();

        // Staged data must be visible before the command buffers are submitted.
        if let Some(staging) = self.staging.as_mut() {
            staging.flush()?;
        }

        self.handlers.invoke(HandlerType::PrePresent, &info);

        self.close_render_pass();
        self.device.end_command_buffers()?;

        let mut recreate = self.recreate_pending;
        match self.device.submit()? {
            SubmitStatus::Submitted => match self.device.present(self.image_index)? {
                PresentStatus::Presented => {}
                status @ (PresentStatus::Suboptimal | PresentStatus::OutOfDate) => {
                    gfx_info!(LOG_SOURCE, "Present returned {:?}, recreating swapchain", status);
                    recreate = true;
                }
                PresentStatus::DeviceLost => {
                    gfx_warn!(LOG_SOURCE, "Device lost on present, continuing");
                }
            },
            SubmitStatus::DeviceLost => {
                gfx_warn!(LOG_SOURCE, "Device lost on submit, frame dropped");
            }
        }

        if self.device.wait_queue_idle()? == WaitStatus::DeviceLost {
            gfx_warn!(LOG_SOURCE, "Device lost while waiting for the queue, continuing");
        }

        if recreate && self.surface_attached {
            self.recreate_swapchain_and_dependencies()?;
        }

        self.handlers.invoke(HandlerType::PostPresent, &info);

        // The queue is idle: this frame's staged data has been consumed.
        if let Some(staging) = self.staging.as_mut() {
            staging.reset();
            for old in staging.take_retired() {
                self.objects.retire(self.generation, old);
            }
        }

        self.objects.collect_sync(self.generation);
        self.presented_frames += 1;
        let period = self.config.async_collect_period;
        if period > 0 && self.presented_frames % period == 0 {
            self.objects.collect_async();
        }

        self.reset_frame_state();
        self.state = ContextState::Ready;
        Ok(())
    }

    fn register_handler(&mut self, handler_type: HandlerType, handler: ContextHandler) -> HandlerId {
        self.handlers.register(handler_type, handler)
    }

    fn unregister_handler(&mut self, id: HandlerId) -> bool {
        self.handlers.unregister(id)
    }
}

impl<D: GraphicsDevice> Drop for ExplicitContext<D> {
    fn drop(&mut self) {
        if self.state != ContextState::Uninitialized {
            if let Err(e) = self.device.wait_idle() {
                crate::gfx_error!(LOG_SOURCE, "wait_idle failed during teardown: {}", e);
            }
        }

        self.reset_frame_state();
        self.framebuffers.clear();
        self.pipelines.drain();
        self.depth_stencil_states.drain();
        self.samplers.drain();
        self.staging = None;
        self.objects.shutdown();
        self.handlers.reset();
    }
}

#[cfg(test)]
#[path = "explicit_context_tests.rs"]
mod tests;
