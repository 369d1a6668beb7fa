//! Attachment load/store policy
//!
//! Turns the clear/store intent accumulated since the last apply into the
//! load and store operations of each attachment.

use crate::types::ClearBits;

/// Attachment load operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LoadOp {
    /// Clear to the clear value
    Clear,
    /// Preserve previous contents
    Load,
    /// Contents are undefined
    DontCare,
}

/// Attachment store operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreOp {
    /// Write results to memory
    Store,
    /// Results may be discarded
    DontCare,
}

/// Load and store operations of one attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttachmentOps {
    pub load: LoadOp,
    pub store: StoreOp,
}

impl AttachmentOps {
    /// Clear if requested, otherwise load only what is going to be stored
    pub fn resolve(clear: bool, store: bool) -> Self {
        let load = if clear {
            LoadOp::Clear
        } else if store {
            LoadOp::Load
        } else {
            LoadOp::DontCare
        };
        let store = if store { StoreOp::Store } else { StoreOp::DontCare };
        Self { load, store }
    }
}

/// Operations for every attachment of a render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttachmentsOperations {
    pub color: AttachmentOps,
    pub depth: AttachmentOps,
    pub stencil: AttachmentOps,
}

impl AttachmentsOperations {
    pub fn from_bits(clear: ClearBits, store: ClearBits) -> Self {
        Self {
            color: AttachmentOps::resolve(
                clear.contains(ClearBits::COLOR),
                store.contains(ClearBits::COLOR),
            ),
            depth: AttachmentOps::resolve(
                clear.contains(ClearBits::DEPTH),
                store.contains(ClearBits::DEPTH),
            ),
            stencil: AttachmentOps::resolve(
                clear.contains(ClearBits::STENCIL),
                store.contains(ClearBits::STENCIL),
            ),
        }
    }

    /// Whether any attachment is cleared on load
    pub fn clears_any(&self) -> bool {
        self.color.load == LoadOp::Clear
            || self.depth.load == LoadOp::Clear
            || self.stencil.load == LoadOp::Clear
    }
}

#[cfg(test)]
#[path = "attachments_tests.rs"]
mod tests;
