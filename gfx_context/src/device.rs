//! GraphicsDevice trait - explicit backend contract
//!
//! Everything `ExplicitContext` needs from an explicit GPU API (Vulkan,
//! Metal-like): fixed resources, the frame fence, image acquisition, command
//! recording, object creation, submission and presentation. Backends own
//! the API handles; the context owns the state machine and the caches.
//!
//! Object types are RAII: dropping a RenderPass, Framebuffer, Pipeline,
//! DepthStencilState or Sampler destroys the backend object. They must be
//! `Send` so deferred destruction can run on the sweeper thread.

use std::fmt;
use std::sync::Arc;

use crate::attachments::AttachmentsOperations;
use crate::buffer::BufferAllocator;
use crate::error::Result;
use crate::render_state::{DepthStencilKey, PipelineKey, ProgramId, SamplerKey};
use crate::staging_buffer::HostBuffer;
use crate::swapchain::{SurfaceCapabilities, SwapchainDesc};
use crate::types::{ClearBits, Color, Extent2D, IndexType, TextureFormat, Viewport};

// ============================================================================
// Status codes
// ============================================================================

/// Result of waiting on a fence or a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    Signaled,
    DeviceLost,
}

/// Result of acquiring the next presentable image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireStatus {
    Acquired(u32),
    /// Usable, but the swapchain no longer matches the surface exactly
    Suboptimal(u32),
    /// Swapchain must be recreated before rendering
    OutOfDate,
    DeviceLost,
}

/// Result of a queue submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStatus {
    Submitted,
    DeviceLost,
}

/// Result of a present request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    Presented,
    Suboptimal,
    OutOfDate,
    DeviceLost,
}

// ============================================================================
// Descriptors
// ============================================================================

/// Compiled GPU program
pub trait GpuProgram: Send + Sync + 'static {
    fn id(&self) -> ProgramId;
}

/// Descriptor for creating a render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderPassDesc {
    pub color_format: TextureFormat,
    pub depth_stencil_format: Option<TextureFormat>,
    pub ops: AttachmentsOperations,
    /// Final color layout: presentable (surface) or color attachment (offscreen)
    pub presentable: bool,
}

/// Images a framebuffer is built from
#[derive(Debug, Clone, Copy)]
pub enum FramebufferSource<'a, A> {
    /// Swapchain image `image_index` plus the shared surface depth attachment
    Swapchain { image_index: u32 },
    /// Offscreen color attachment plus optional depth/stencil
    Offscreen {
        color: &'a A,
        depth_stencil: Option<&'a A>,
    },
}

/// Descriptor for creating a pipeline
pub struct PipelineDesc<'a, D: GraphicsDevice + ?Sized> {
    pub key: &'a PipelineKey,
    pub render_pass: &'a D::RenderPass,
    pub program: &'a D::Program,
    pub depth_stencil: &'a D::DepthStencilState,
}

/// Shader parameter with its sampler resolved through the sampler cache
pub enum ResolvedParam<D: GraphicsDevice + ?Sized> {
    UniformBuffer {
        binding: u32,
        buffer: D::BufferHandle,
        offset: u64,
        range: u64,
    },
    DynamicUniformBuffer {
        binding: u32,
        buffer: D::BufferHandle,
        range: u64,
        dynamic_offset: u32,
    },
    Texture {
        binding: u32,
        texture: D::TextureHandle,
        sampler: Arc<D::Sampler>,
    },
}

// ============================================================================
// GraphicsDevice trait
// ============================================================================

pub trait GraphicsDevice: BufferAllocator {
    type RenderPass: Send + Sync + 'static;
    type Framebuffer: Send + Sync + 'static;
    type Pipeline: Send + Sync + 'static;
    type DepthStencilState: Send + Sync + 'static;
    type Sampler: Send + Sync + 'static;
    type Program: GpuProgram;
    /// Offscreen attachment reference (cheap to clone)
    type Attachment: Clone;
    type HostBuffer: HostBuffer + Send + 'static;
    type BufferHandle: Copy + fmt::Debug;
    type TextureHandle: Copy + fmt::Debug;

    /// Device name and API/driver versions
    fn renderer_name(&self) -> String;

    // ===== FIXED RESOURCES =====

    fn create_command_pool(&mut self) -> Result<()>;

    /// Frame fence plus acquire/release semaphores
    fn create_sync_primitives(&mut self) -> Result<()>;

    // ===== SURFACE / SWAPCHAIN =====

    fn surface_capabilities(&self) -> Result<SurfaceCapabilities>;

    fn surface_format(&self) -> TextureFormat;

    fn depth_stencil_format(&self) -> TextureFormat;

    /// (Re)create the depth attachment shared by surface framebuffers
    fn recreate_depth_attachment(&mut self, extent: Extent2D) -> Result<()>;

    fn destroy_depth_attachment(&mut self);

    /// Build the swapchain and its image views; returns the image count
    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> Result<u32>;

    /// Destroy the swapchain and its image views
    fn destroy_swapchain(&mut self);

    fn create_command_buffers(&mut self) -> Result<()>;

    fn destroy_command_buffers(&mut self);

    // ===== FRAME =====

    fn wait_frame_fence(&mut self, timeout_ns: u64) -> Result<WaitStatus>;

    fn reset_frame_fence(&mut self) -> Result<()>;

    /// Acquire the next image, signaling the acquire semaphore
    fn acquire_next_image(&mut self) -> Result<AcquireStatus>;

    fn begin_command_buffers(&mut self) -> Result<()>;

    fn end_command_buffers(&mut self) -> Result<()>;

    /// Submit the frame's command buffers (wait acquire, signal release + fence)
    fn submit(&mut self) -> Result<SubmitStatus>;

    /// Present `image_index`, waiting on the release semaphore
    fn present(&mut self, image_index: u32) -> Result<PresentStatus>;

    fn wait_queue_idle(&mut self) -> Result<WaitStatus>;

    fn wait_idle(&mut self) -> Result<()>;

    // ===== OBJECT CREATION =====

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Self::RenderPass>;

    fn create_framebuffer(
        &self,
        render_pass: &Self::RenderPass,
        source: FramebufferSource<'_, Self::Attachment>,
        extent: Extent2D,
    ) -> Result<Self::Framebuffer>;

    fn create_depth_stencil_state(&self, key: &DepthStencilKey) -> Result<Self::DepthStencilState>;

    fn create_pipeline(&self, desc: &PipelineDesc<'_, Self>) -> Result<Self::Pipeline>;

    fn create_sampler(&self, key: &SamplerKey) -> Result<Self::Sampler>;

    fn create_host_buffer(&self, size: u64) -> Result<Self::HostBuffer>;

    /// Required alignment of staging allocations
    fn staging_alignment(&self) -> u64;

    // ===== RECORDING =====

    fn begin_render_pass(
        &mut self,
        render_pass: &Self::RenderPass,
        framebuffer: &Self::Framebuffer,
        extent: Extent2D,
        clear_color: Color,
    );

    fn end_render_pass(&mut self);

    /// Make an offscreen color attachment readable by fragment shaders
    fn post_render_barrier(&mut self, color: &Self::Attachment);

    /// Clear attachments of the open render pass over `extent`
    fn clear_attachments(&mut self, bits: ClearBits, color: Color, extent: Extent2D);

    fn set_viewport(&mut self, viewport: Viewport);

    fn set_stencil_reference(&mut self, value: u32);

    fn bind_pipeline(&mut self, pipeline: &Self::Pipeline);

    fn bind_params(&mut self, program: &Self::Program, params: &[ResolvedParam<Self>]) -> Result<()>;

    fn bind_vertex_buffer(&mut self, buffer: &Self::Buffer);

    fn bind_index_buffer(&mut self, buffer: &Self::Buffer, index_type: IndexType);

    fn draw_indexed(&mut self, index_count: u32);

    fn push_debug_label(&mut self, label: &str);

    fn pop_debug_label(&mut self);
}
