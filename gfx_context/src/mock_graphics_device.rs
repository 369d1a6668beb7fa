//! Mock GraphicsDevice for unit tests (no GPU required)
//!
//! Records every call as a string, counts live backend objects through
//! shared atomic counters (decremented in Drop) and lets tests script the
//! results of fence waits, acquires, submissions and presents.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::buffer::{BufferAllocator, BufferTarget, GpuBuffer};
use crate::device::{
    AcquireStatus, FramebufferSource, GpuProgram, GraphicsDevice, PipelineDesc, PresentStatus, RenderPassDesc,
    ResolvedParam, SubmitStatus, WaitStatus,
};
use crate::error::Result;
use crate::render_state::{DepthStencilKey, PipelineKey, ProgramId, SamplerKey};
use crate::staging_buffer::HostBuffer;
use crate::swapchain::{ImageUsage, SurfaceCapabilities, SwapchainDesc};
use crate::types::{ClearBits, Color, Extent2D, IndexType, TextureFormat, Viewport};

// ============================================================================
// Counters
// ============================================================================

#[derive(Debug, Default)]
pub struct MockCounters {
    pub render_passes_live: AtomicUsize,
    pub framebuffers_live: AtomicUsize,
    pub pipelines_live: AtomicUsize,
    pub samplers_live: AtomicUsize,
    pub image_views_live: AtomicUsize,
    pub pipelines_created: AtomicUsize,
    pub depth_stencil_states_created: AtomicUsize,
    pub swapchains_created: AtomicUsize,
    pub depth_attachments_created: AtomicUsize,
    pub command_buffer_sets_created: AtomicUsize,
}

fn load(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

fn increment(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

fn decrement(counter: &AtomicUsize) {
    counter.fetch_sub(1, Ordering::SeqCst);
}

impl MockCounters {
    pub fn render_passes_live(&self) -> usize { load(&self.render_passes_live) }
    pub fn framebuffers_live(&self) -> usize { load(&self.framebuffers_live) }
    pub fn pipelines_live(&self) -> usize { load(&self.pipelines_live) }
    pub fn samplers_live(&self) -> usize { load(&self.samplers_live) }
    pub fn image_views_live(&self) -> usize { load(&self.image_views_live) }
    pub fn pipelines_created(&self) -> usize { load(&self.pipelines_created) }
    pub fn depth_stencil_states_created(&self) -> usize { load(&self.depth_stencil_states_created) }
    pub fn swapchains_created(&self) -> usize { load(&self.swapchains_created) }
    pub fn depth_attachments_created(&self) -> usize { load(&self.depth_attachments_created) }
    pub fn command_buffer_sets_created(&self) -> usize { load(&self.command_buffer_sets_created) }
}

// ============================================================================
// Mock objects
// ============================================================================

#[derive(Debug)]
pub struct MockRenderPass {
    pub desc: RenderPassDesc,
    counters: Arc<MockCounters>,
}

impl Drop for MockRenderPass {
    fn drop(&mut self) {
        decrement(&self.counters.render_passes_live);
    }
}

#[derive(Debug)]
pub struct MockFramebuffer {
    pub extent: Extent2D,
    /// "swapchain:<index>" or "offscreen:<color id>"
    pub source: String,
    counters: Arc<MockCounters>,
}

impl Drop for MockFramebuffer {
    fn drop(&mut self) {
        decrement(&self.counters.framebuffers_live);
    }
}

#[derive(Debug)]
pub struct MockPipeline {
    pub key: PipelineKey,
    counters: Arc<MockCounters>,
}

impl Drop for MockPipeline {
    fn drop(&mut self) {
        decrement(&self.counters.pipelines_live);
    }
}

#[derive(Debug)]
pub struct MockSampler {
    pub key: SamplerKey,
    counters: Arc<MockCounters>,
}

impl Drop for MockSampler {
    fn drop(&mut self) {
        decrement(&self.counters.samplers_live);
    }
}

#[derive(Debug)]
pub struct MockDepthStencilState {
    pub key: DepthStencilKey,
}

#[derive(Debug)]
struct MockImageView {
    counters: Arc<MockCounters>,
}

impl Drop for MockImageView {
    fn drop(&mut self) {
        decrement(&self.counters.image_views_live);
    }
}

#[derive(Debug)]
pub struct MockProgram {
    pub id: ProgramId,
}

impl MockProgram {
    pub fn new(id: u64) -> Self {
        Self { id: ProgramId(id) }
    }
}

impl GpuProgram for MockProgram {
    fn id(&self) -> ProgramId {
        self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockAttachment {
    pub id: u32,
}

#[derive(Debug)]
pub struct MockBuffer {
    pub target: BufferTarget,
    pub size: u64,
    pub writes: RefCell<Vec<(u64, usize)>>,
}

impl GpuBuffer for MockBuffer {
    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        self.writes.borrow_mut().push((offset, data.len()));
        Ok(())
    }

    fn size(&self) -> u64 {
        self.size
    }
}

#[derive(Debug)]
pub struct MockHostBuffer {
    pub size: u64,
    pub flushes: Mutex<Vec<(u64, u64)>>,
}

impl HostBuffer for MockHostBuffer {
    fn write(&self, _offset: u64, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    fn flush(&self, offset: u64, size: u64) -> Result<()> {
        if let Ok(mut flushes) = self.flushes.lock() {
            flushes.push((offset, size));
        }
        Ok(())
    }

    fn size(&self) -> u64 {
        self.size
    }
}

// ============================================================================
// Mock device
// ============================================================================

pub struct MockGraphicsDevice {
    pub commands: RefCell<Vec<String>>,
    pub counters: Arc<MockCounters>,
    pub caps: SurfaceCapabilities,
    pub render_pass_descs: RefCell<Vec<RenderPassDesc>>,
    /// Scripted results, consumed front to back; empty means success
    pub fence_results: VecDeque<WaitStatus>,
    pub acquire_results: VecDeque<AcquireStatus>,
    pub submit_results: VecDeque<SubmitStatus>,
    pub present_results: VecDeque<PresentStatus>,
    pub queue_idle_results: VecDeque<WaitStatus>,
    swapchain_views: Vec<MockImageView>,
    next_image: u32,
    depth_extent: Option<Extent2D>,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self {
            commands: RefCell::new(Vec::new()),
            counters: Arc::new(MockCounters::default()),
            caps: SurfaceCapabilities {
                min_image_count: 2,
                max_image_count: 3,
                current_extent: None,
                min_extent: Extent2D::new(1, 1),
                max_extent: Extent2D::new(4096, 4096),
                supported_usage: ImageUsage::COLOR_ATTACHMENT | ImageUsage::TRANSFER_SRC,
            },
            render_pass_descs: RefCell::new(Vec::new()),
            fence_results: VecDeque::new(),
            acquire_results: VecDeque::new(),
            submit_results: VecDeque::new(),
            present_results: VecDeque::new(),
            queue_idle_results: VecDeque::new(),
            swapchain_views: Vec::new(),
            next_image: 0,
            depth_extent: None,
        }
    }

    fn record(&self, command: impl Into<String>) {
        self.commands.borrow_mut().push(command.into());
    }

    /// Recorded commands, oldest first
    pub fn commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }

    pub fn take_commands(&self) -> Vec<String> {
        std::mem::take(&mut *self.commands.borrow_mut())
    }

    pub fn count(&self, command: &str) -> usize {
        self.commands.borrow().iter().filter(|c| c.as_str() == command).count()
    }

    pub fn depth_extent(&self) -> Option<Extent2D> {
        self.depth_extent
    }
}

impl Default for MockGraphicsDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferAllocator for MockGraphicsDevice {
    type Buffer = MockBuffer;

    fn create_buffer(&self, target: BufferTarget, size_bytes: u64) -> Result<MockBuffer> {
        Ok(MockBuffer {
            target,
            size: size_bytes,
            writes: RefCell::new(Vec::new()),
        })
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    type RenderPass = MockRenderPass;
    type Framebuffer = MockFramebuffer;
    type Pipeline = MockPipeline;
    type DepthStencilState = MockDepthStencilState;
    type Sampler = MockSampler;
    type Program = MockProgram;
    type Attachment = MockAttachment;
    type HostBuffer = MockHostBuffer;
    type BufferHandle = u64;
    type TextureHandle = u32;

    fn renderer_name(&self) -> String {
        "Mock Renderer".to_string()
    }

    fn create_command_pool(&mut self) -> Result<()> {
        self.record("create_command_pool");
        Ok(())
    }

    fn create_sync_primitives(&mut self) -> Result<()> {
        self.record("create_sync_primitives");
        Ok(())
    }

    fn surface_capabilities(&self) -> Result<SurfaceCapabilities> {
        Ok(self.caps)
    }

    fn surface_format(&self) -> TextureFormat {
        TextureFormat::B8G8R8A8_UNORM
    }

    fn depth_stencil_format(&self) -> TextureFormat {
        TextureFormat::D24_UNORM_S8_UINT
    }

    fn recreate_depth_attachment(&mut self, extent: Extent2D) -> Result<()> {
        self.record("recreate_depth_attachment");
        increment(&self.counters.depth_attachments_created);
        self.depth_extent = Some(extent);
        Ok(())
    }

    fn destroy_depth_attachment(&mut self) {
        self.record("destroy_depth_attachment");
        self.depth_extent = None;
    }

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> Result<u32> {
        self.record("create_swapchain");
        increment(&self.counters.swapchains_created);
        for _ in 0..desc.image_count {
            increment(&self.counters.image_views_live);
            self.swapchain_views.push(MockImageView { counters: Arc::clone(&self.counters) });
        }
        self.next_image = 0;
        Ok(desc.image_count)
    }

    fn destroy_swapchain(&mut self) {
        self.record("destroy_swapchain");
        self.swapchain_views.clear();
    }

    fn create_command_buffers(&mut self) -> Result<()> {
        self.record("create_command_buffers");
        increment(&self.counters.command_buffer_sets_created);
        Ok(())
    }

    fn destroy_command_buffers(&mut self) {
        self.record("destroy_command_buffers");
    }

    fn wait_frame_fence(&mut self, _timeout_ns: u64) -> Result<WaitStatus> {
        self.record("wait_frame_fence");
        Ok(self.fence_results.pop_front().unwrap_or(WaitStatus::Signaled))
    }

    fn reset_frame_fence(&mut self) -> Result<()> {
        self.record("reset_frame_fence");
        Ok(())
    }

    fn acquire_next_image(&mut self) -> Result<AcquireStatus> {
        self.record("acquire_next_image");
        if let Some(status) = self.acquire_results.pop_front() {
            return Ok(status);
        }
        let image_count = self.swapchain_views.len().max(1) as u32;
        let index = self.next_image % image_count;
        self.next_image = (index + 1) % image_count;
        Ok(AcquireStatus::Acquired(index))
    }

    fn begin_command_buffers(&mut self) -> Result<()> {
        self.record("begin_command_buffers");
        Ok(())
    }

    fn end_command_buffers(&mut self) -> Result<()> {
        self.record("end_command_buffers");
        Ok(())
    }

    fn submit(&mut self) -> Result<SubmitStatus> {
        self.record("submit");
        Ok(self.submit_results.pop_front().unwrap_or(SubmitStatus::Submitted))
    }

    fn present(&mut self, image_index: u32) -> Result<PresentStatus> {
        self.record(format!("present:{}", image_index));
        Ok(self.present_results.pop_front().unwrap_or(PresentStatus::Presented))
    }

    fn wait_queue_idle(&mut self) -> Result<WaitStatus> {
        self.record("wait_queue_idle");
        Ok(self.queue_idle_results.pop_front().unwrap_or(WaitStatus::Signaled))
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.record("wait_idle");
        Ok(())
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<MockRenderPass> {
        self.record("create_render_pass");
        increment(&self.counters.render_passes_live);
        self.render_pass_descs.borrow_mut().push(*desc);
        Ok(MockRenderPass {
            desc: *desc,
            counters: Arc::clone(&self.counters),
        })
    }

    fn create_framebuffer(
        &self,
        _render_pass: &MockRenderPass,
        source: FramebufferSource<'_, MockAttachment>,
        extent: Extent2D,
    ) -> Result<MockFramebuffer> {
        let source = match source {
            FramebufferSource::Swapchain { image_index } => format!("swapchain:{}", image_index),
            FramebufferSource::Offscreen { color, .. } => format!("offscreen:{}", color.id),
        };
        self.record(format!("create_framebuffer:{}", source));
        increment(&self.counters.framebuffers_live);
        Ok(MockFramebuffer {
            extent,
            source,
            counters: Arc::clone(&self.counters),
        })
    }

    fn create_depth_stencil_state(&self, key: &DepthStencilKey) -> Result<MockDepthStencilState> {
        increment(&self.counters.depth_stencil_states_created);
        Ok(MockDepthStencilState { key: *key })
    }

    fn create_pipeline(&self, desc: &PipelineDesc<'_, Self>) -> Result<MockPipeline> {
        self.record("create_pipeline");
        increment(&self.counters.pipelines_created);
        increment(&self.counters.pipelines_live);
        Ok(MockPipeline {
            key: desc.key.clone(),
            counters: Arc::clone(&self.counters),
        })
    }

    fn create_sampler(&self, key: &SamplerKey) -> Result<MockSampler> {
        self.record("create_sampler");
        increment(&self.counters.samplers_live);
        Ok(MockSampler {
            key: *key,
            counters: Arc::clone(&self.counters),
        })
    }

    fn create_host_buffer(&self, size: u64) -> Result<MockHostBuffer> {
        self.record(format!("create_host_buffer:{}", size));
        Ok(MockHostBuffer {
            size,
            flushes: Mutex::new(Vec::new()),
        })
    }

    fn staging_alignment(&self) -> u64 {
        16
    }

    fn begin_render_pass(
        &mut self,
        _render_pass: &MockRenderPass,
        framebuffer: &MockFramebuffer,
        extent: Extent2D,
        _clear_color: Color,
    ) {
        self.record(format!(
            "begin_render_pass:{}:{}x{}",
            framebuffer.source, extent.width, extent.height
        ));
    }

    fn end_render_pass(&mut self) {
        self.record("end_render_pass");
    }

    fn post_render_barrier(&mut self, color: &MockAttachment) {
        self.record(format!("post_render_barrier:{}", color.id));
    }

    fn clear_attachments(&mut self, bits: ClearBits, _color: Color, extent: Extent2D) {
        self.record(format!(
            "clear_attachments:{}:{}x{}",
            bits.bits(),
            extent.width,
            extent.height
        ));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.record(format!("set_viewport:{}x{}", viewport.width, viewport.height));
    }

    fn set_stencil_reference(&mut self, value: u32) {
        self.record(format!("set_stencil_reference:{}", value));
    }

    fn bind_pipeline(&mut self, _pipeline: &MockPipeline) {
        self.record("bind_pipeline");
    }

    fn bind_params(&mut self, _program: &MockProgram, params: &[ResolvedParam<Self>]) -> Result<()> {
        self.record(format!("bind_params:{}", params.len()));
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, _buffer: &MockBuffer) {
        self.record("bind_vertex_buffer");
    }

    fn bind_index_buffer(&mut self, _buffer: &MockBuffer, index_type: IndexType) {
        self.record(format!("bind_index_buffer:{:?}", index_type));
    }

    fn draw_indexed(&mut self, index_count: u32) {
        self.record(format!("draw_indexed:{}", index_count));
    }

    fn push_debug_label(&mut self, label: &str) {
        self.record(format!("push_debug_label:{}", label));
    }

    fn pop_debug_label(&mut self) {
        self.record("pop_debug_label");
    }
}
