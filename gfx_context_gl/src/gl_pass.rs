//! Render pass emulation for the immediate-mode backend
//!
//! GL has no render pass objects. Load operations become a `glClear` when
//! the pass opens and "don't care" operations become
//! `glInvalidateFramebuffer` calls, so tiled GPUs can skip loading or
//! storing those attachments.

use gfx_context::gfx::types::{AttachmentsOperations, ClearBits, LoadOp, StoreOp};

/// Clear/store intent accumulated since the last apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassIntent {
    clear: ClearBits,
    store: ClearBits,
}

impl PassIntent {
    pub fn record(&mut self, clear: ClearBits, store: ClearBits) {
        self.clear |= clear;
        self.store |= store;
    }

    /// Resolve the load/store policy and start accumulating from scratch
    pub fn take(&mut self, clear_on_load: bool) -> AttachmentsOperations {
        if clear_on_load {
            self.clear |= ClearBits::all();
        }
        let ops = AttachmentsOperations::from_bits(self.clear, self.store);
        *self = Self::default();
        ops
    }

    pub fn bits(&self) -> (ClearBits, ClearBits) {
        (self.clear, self.store)
    }
}

/// GL work for one emulated render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassPlan {
    /// Attachments to `glClear` when the pass opens
    pub clear: ClearBits,
    /// Attachments whose previous contents are not needed
    pub invalidate_on_open: ClearBits,
    /// Attachments to invalidate when the pass closes
    pub invalidate_on_close: ClearBits,
}

impl PassPlan {
    /// Plan a pass on a target; attachments the target lacks are ignored
    pub fn new(ops: &AttachmentsOperations, has_depth_stencil: bool) -> Self {
        let available = if has_depth_stencil { ClearBits::all() } else { ClearBits::COLOR };
        let per_attachment = [
            (ClearBits::COLOR, ops.color),
            (ClearBits::DEPTH, ops.depth),
            (ClearBits::STENCIL, ops.stencil),
        ];

        let mut plan = Self {
            clear: ClearBits::empty(),
            invalidate_on_open: ClearBits::empty(),
            invalidate_on_close: ClearBits::empty(),
        };
        for (bit, attachment) in per_attachment {
            if !available.contains(bit) {
                continue;
            }
            match attachment.load {
                LoadOp::Clear => plan.clear |= bit,
                LoadOp::DontCare => plan.invalidate_on_open |= bit,
                LoadOp::Load => {}
            }
            if attachment.store == StoreOp::DontCare {
                plan.invalidate_on_close |= bit;
            }
        }
        plan
    }
}

#[cfg(test)]
#[path = "gl_pass_tests.rs"]
mod tests;
