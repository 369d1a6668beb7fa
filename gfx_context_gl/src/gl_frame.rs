//! Per-frame bookkeeping of the immediate-mode context
//!
//! Everything here is plain data: which pass is open, which attachments it
//! must invalidate, the draw state the scene has set and what is reset
//! after present. `GlContext` turns the decisions into GL calls.

use gfx_context::explicit_context::DEFAULT_STENCIL_REFERENCE;
use gfx_context::framebuffer::surface_operations;
use gfx_context::gfx::types::{
    BindingInfo, ClearBits, DepthStencilKey, Extent2D, PrimitiveTopology, Viewport,
};

use crate::gl_pass::{PassIntent, PassPlan};

/// The emulated render pass currently open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenPass {
    pub invalidate_on_close: ClearBits,
    pub label_pushed: bool,
}

#[derive(Debug, Clone)]
pub struct FrameState {
    intent: PassIntent,
    open_pass: Option<OpenPass>,
    viewport: Option<Viewport>,

    pub depth_stencil: DepthStencilKey,
    pub stencil_reference: u32,
    pub blending_enabled: bool,
    pub topology: PrimitiveTopology,
    pub bindings: Vec<BindingInfo>,
}

impl Default for FrameState {
    fn default() -> Self {
        Self {
            intent: PassIntent::default(),
            open_pass: None,
            viewport: None,
            depth_stencil: DepthStencilKey::default(),
            stencil_reference: DEFAULT_STENCIL_REFERENCE,
            blending_enabled: false,
            topology: PrimitiveTopology::default(),
            bindings: Vec::new(),
        }
    }
}

impl FrameState {
    pub fn pass_open(&self) -> bool {
        self.open_pass.is_some()
    }

    pub fn pending_bits(&self) -> (ClearBits, ClearBits) {
        self.intent.bits()
    }

    pub fn record_clear(&mut self, clear: ClearBits, store: ClearBits) {
        self.intent.record(clear, store);
    }

    /// Resolve the pending intent into the plan of a new pass
    ///
    /// The default framebuffer is always cleared on open and its color is
    /// always kept, since it is presented after the last pass.
    pub fn open_pass(&mut self, clear_on_load: bool, surface: bool, has_depth_stencil: bool) -> PassPlan {
        debug_assert!(self.open_pass.is_none(), "previous pass still open");
        let mut ops = self.intent.take(clear_on_load);
        if surface {
            ops = surface_operations(ops);
        }
        let plan = PassPlan::new(&ops, has_depth_stencil);
        self.open_pass = Some(OpenPass { invalidate_on_close: plan.invalidate_on_close, label_pushed: false });
        plan
    }

    pub fn mark_label_pushed(&mut self) {
        if let Some(pass) = self.open_pass.as_mut() {
            pass.label_pushed = true;
        }
    }

    /// Close the open pass, returning what it still has to do on GL
    pub fn close_pass(&mut self) -> Option<OpenPass> {
        self.open_pass.take()
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
    }

    /// Viewport of a pass on a target of `extent`
    pub fn viewport_for(&self, extent: Extent2D) -> Viewport {
        self.viewport.unwrap_or_else(|| Viewport::full(extent))
    }

    /// Back to defaults after present; the scene viewport is kept
    pub fn reset(&mut self) {
        *self = Self { viewport: self.viewport, ..Self::default() };
    }
}

#[cfg(test)]
#[path = "gl_frame_tests.rs"]
mod tests;
