/*!
# gfx_context

Backend-neutral graphics context for a map renderer.

The scene layer talks to one `GraphicsContext` per process, selected at
startup. Explicit APIs implement the small `GraphicsDevice` contract and get
the whole frame lifecycle from `ExplicitContext`; immediate-mode APIs
(OpenGL ES) implement `GraphicsContext` directly.

## Architecture

- **GraphicsContext**: frame lifecycle and draw-state contract
- **ExplicitContext**: state machine, caches and deferred destruction over a `GraphicsDevice`
- **GraphicsDevice**: what an explicit backend must provide
- **BufferResource**: fixed-capacity vertex/index storage
- **StagingBuffer**: per-frame host-visible arena
- **ObjectManager**: generation-tagged deferred destruction
*/

pub mod error;
pub mod log;
pub mod config;
pub mod types;
pub mod render_state;
pub mod state_cache;
pub mod attachments;
pub mod buffer;
pub mod staging_buffer;
pub mod swapchain;
pub mod handlers;
pub mod object_manager;
pub mod param_descriptor;
pub mod device;
pub mod framebuffer;
pub mod context;
pub mod explicit_context;

#[cfg(test)]
mod mock_graphics_device;

pub use error::{Error, Result};

/// Everything a backend or the scene layer needs, in one namespace
pub mod gfx {
    pub use crate::error::{Error, Result};

    pub use crate::config::{ApiVersion, Config, DebugSeverity};
    pub use crate::context::{ContextState, GraphicsContext};
    pub use crate::explicit_context::{ContextStats, ExplicitContext};
    pub use crate::device::GraphicsDevice;

    // Logging sub-module (types only, the gfx_* macros live at the crate root)
    pub mod log {
        pub use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
    }

    pub mod types {
        pub use crate::attachments::*;
        pub use crate::render_state::*;
        pub use crate::types::*;
    }

    pub mod resource {
        pub use crate::buffer::*;
        pub use crate::framebuffer::{RenderTarget, TargetId};
        pub use crate::param_descriptor::*;
        pub use crate::staging_buffer::*;
    }

    pub mod device {
        pub use crate::device::*;
        pub use crate::handlers::*;
        pub use crate::swapchain::*;
    }
}
