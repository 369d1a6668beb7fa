//! GraphicsContext trait - frame-lifecycle contract driven by the scene layer
//!
//! One implementation per backend, selected once at startup:
//! `ExplicitContext<D>` for explicit APIs and the immediate-mode OpenGL
//! context in its own crate.
//!
//! Frame protocol:
//!
//! ```text
//! begin_frame -> { set_framebuffer, apply_framebuffer, set_*, draw_indexed } -> present
//! ```

use std::sync::Arc;

use crate::buffer::{BufferResource, GpuBuffer};
use crate::config::ApiVersion;
use crate::error::Result;
use crate::handlers::{ContextHandler, HandlerId, HandlerType};
use crate::param_descriptor::ParamDescriptor;
use crate::types::{
    BindingInfo, ClearBits, Color, PrimitiveTopology, StencilAction, StencilFace, TestFunction, Viewport,
};

/// Frame state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Before `init`
    Uninitialized,
    /// Between frames
    Ready,
    /// Frame begun, no render pass open
    FrameActive,
    /// Frame begun, render pass open
    RenderPassActive,
    /// Inside `present`
    Presenting,
}

impl ContextState {
    /// Whether a frame has been begun and not yet presented
    pub fn in_frame(&self) -> bool {
        matches!(self, ContextState::FrameActive | ContextState::RenderPassActive)
    }
}

pub trait GraphicsContext {
    /// Backend buffer behind vertex/index BufferResources
    type Buffer: GpuBuffer;
    /// Compiled GPU program
    type Program;
    /// Offscreen render target handle
    type RenderTarget;
    /// Buffer handle used by uniform parameters
    type BufferHandle;
    /// Texture handle used by texture parameters
    type TextureHandle;

    // ===== LIFECYCLE =====

    /// Allocate the staging buffer and the backend's fixed resources
    fn init(&mut self, api_version: ApiVersion) -> Result<()>;

    fn api_version(&self) -> Option<ApiVersion>;

    fn renderer_name(&self) -> String;

    fn state(&self) -> ContextState;

    /// Surface size changed; rebuilds the swapchain chain where there is one
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;

    /// Start a frame
    ///
    /// Returns `Ok(false)` when no frame can be rendered right now
    /// (presentation unavailable, zero-sized surface, swapchain still stale
    /// after one recreation).
    fn begin_frame(&mut self) -> Result<bool>;

    /// Finish the frame: submit, present, run deferred work
    fn present(&mut self) -> Result<()>;

    // ===== FRAMEBUFFER =====

    /// Select the render target (`None` = presentation surface)
    ///
    /// Closes the open render pass, if any. Does not open a new one.
    fn set_framebuffer(&mut self, target: Option<Self::RenderTarget>) -> Result<()>;

    /// Open a render pass on the current target
    ///
    /// `clear_on_load` adds a color, depth and stencil clear request before
    /// the load/store policy is computed. `label` is a debug marker.
    fn apply_framebuffer(&mut self, clear_on_load: bool, label: &str) -> Result<()>;

    fn set_clear_color(&mut self, color: Color);

    /// Clear now if a render pass is open, otherwise record intent for the
    /// next `apply_framebuffer`
    fn clear(&mut self, clear_bits: ClearBits, store_bits: ClearBits);

    // ===== STATE =====

    fn set_viewport(&mut self, viewport: Viewport);

    fn set_depth_test_enabled(&mut self, enabled: bool);

    fn set_depth_test_function(&mut self, function: TestFunction);

    fn set_stencil_test_enabled(&mut self, enabled: bool);

    fn set_stencil_function(&mut self, face: StencilFace, function: TestFunction);

    fn set_stencil_actions(
        &mut self,
        face: StencilFace,
        stencil_fail: StencilAction,
        depth_fail: StencilAction,
        pass: StencilAction,
    );

    fn set_stencil_reference_value(&mut self, value: u32);

    fn set_blending_enabled(&mut self, enabled: bool);

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology);

    fn set_binding_info(&mut self, bindings: &[BindingInfo]);

    fn set_program(&mut self, program: Arc<Self::Program>);

    fn apply_param_descriptor(&mut self, descriptor: ParamDescriptor<Self::BufferHandle, Self::TextureHandle>);

    // ===== DRAW =====

    /// Draw every index currently uploaded to `indices`
    ///
    /// # Panics
    ///
    /// Panics without a program or outside an open render pass.
    fn draw_indexed(
        &mut self,
        vertices: &BufferResource<Self::Buffer>,
        indices: &BufferResource<Self::Buffer>,
    ) -> Result<()>;

    // ===== HOOKS =====

    fn register_handler(&mut self, handler_type: HandlerType, handler: ContextHandler) -> HandlerId;

    fn unregister_handler(&mut self, id: HandlerId) -> bool;
}
