//! Pre/post-present hooks
//!
//! Identifiers come from a counter owned by the registry, starting at 1 and
//! restarting on `reset`.

use rustc_hash::FxHashMap;

/// When a handler runs during `present`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerType {
    /// After the staging flush, before the render pass is closed
    PrePresent,
    /// After the image was handed to the presentation engine
    PostPresent,
}

/// Handle returned by `register`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub u32);

/// Frame information passed to handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Number of frames begun since init
    pub frame_index: u64,
    /// Swapchain image of the frame (0 for single-buffered backends)
    pub image_index: u32,
}

pub type ContextHandler = Box<dyn FnMut(&FrameInfo) + Send>;

struct Registered {
    handler_type: HandlerType,
    handler: ContextHandler,
}

pub struct HandlerRegistry {
    next_id: u32,
    handlers: FxHashMap<HandlerId, Registered>,
    /// Registration order, so handlers run deterministically
    order: Vec<HandlerId>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            handlers: FxHashMap::default(),
            order: Vec::new(),
        }
    }

    pub fn register(&mut self, handler_type: HandlerType, handler: ContextHandler) -> HandlerId {
        assert!(self.next_id < u32::MAX, "Handler identifiers exhausted");
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers.insert(id, Registered { handler_type, handler });
        self.order.push(id);
        id
    }

    /// Returns false if `id` was not registered
    pub fn unregister(&mut self, id: HandlerId) -> bool {
        if self.handlers.remove(&id).is_some() {
            self.order.retain(|other| *other != id);
            true
        } else {
            false
        }
    }

    /// Run every handler of `handler_type` in registration order
    pub fn invoke(&mut self, handler_type: HandlerType, info: &FrameInfo) {
        for id in &self.order {
            if let Some(registered) = self.handlers.get_mut(id) {
                if registered.handler_type == handler_type {
                    (registered.handler)(info);
                }
            }
        }
    }

    /// Drop every handler and restart identifiers at 1
    pub fn reset(&mut self) {
        self.handlers.clear();
        self.order.clear();
        self.next_id = 1;
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;
