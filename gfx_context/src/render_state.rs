//! Render state keys
//!
//! Pure value types used as cache keys. Equal keys always describe the same
//! backend object; fields are stored structurally rather than bit-packed.

use crate::types::{
    BindingInfo, PrimitiveTopology, StencilAction, StencilFace, TestFunction, TextureFilter,
    TextureWrapping,
};

/// Identity of a backend render pass, assigned by the framebuffer manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RenderPassId(pub u64);

/// Identity of a compiled GPU program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u64);

/// Stencil configuration for one polygon face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StencilFaceState {
    pub function: TestFunction,
    pub stencil_fail: StencilAction,
    pub depth_fail: StencilAction,
    pub pass: StencilAction,
}

impl Default for StencilFaceState {
    fn default() -> Self {
        Self {
            function: TestFunction::Always,
            stencil_fail: StencilAction::Keep,
            depth_fail: StencilAction::Keep,
            pass: StencilAction::Keep,
        }
    }
}

// ===== DEPTH/STENCIL KEY =====

/// Depth and stencil configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct DepthStencilKey {
    pub depth_enabled: bool,
    pub depth_function: TestFunction,
    pub stencil_enabled: bool,
    pub front: StencilFaceState,
    pub back: StencilFaceState,
}

impl DepthStencilKey {
    pub fn set_depth_test_enabled(&mut self, enabled: bool) {
        self.depth_enabled = enabled;
    }

    pub fn set_depth_function(&mut self, function: TestFunction) {
        self.depth_function = function;
    }

    pub fn set_stencil_test_enabled(&mut self, enabled: bool) {
        self.stencil_enabled = enabled;
    }

    pub fn set_stencil_function(&mut self, face: StencilFace, function: TestFunction) {
        for state in self.faces_mut(face) {
            state.function = function;
        }
    }

    pub fn set_stencil_actions(
        &mut self,
        face: StencilFace,
        stencil_fail: StencilAction,
        depth_fail: StencilAction,
        pass: StencilAction,
    ) {
        for state in self.faces_mut(face) {
            state.stencil_fail = stencil_fail;
            state.depth_fail = depth_fail;
            state.pass = pass;
        }
    }

    fn faces_mut(&mut self, face: StencilFace) -> Vec<&mut StencilFaceState> {
        match face {
            StencilFace::Front => vec![&mut self.front],
            StencilFace::Back => vec![&mut self.back],
            StencilFace::FrontAndBack => vec![&mut self.front, &mut self.back],
        }
    }
}

// ===== PIPELINE KEY =====

/// Everything a backend needs to build one pipeline object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PipelineKey {
    pub render_pass: RenderPassId,
    pub program: Option<ProgramId>,
    pub depth_stencil: DepthStencilKey,
    pub bindings: Vec<BindingInfo>,
    pub topology: PrimitiveTopology,
    pub blending_enabled: bool,
}

// ===== SAMPLER KEY =====

/// Sampler configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SamplerKey {
    pub filter: TextureFilter,
    pub wrap_u: TextureWrapping,
    pub wrap_v: TextureWrapping,
}

impl SamplerKey {
    pub const fn new(filter: TextureFilter, wrap_u: TextureWrapping, wrap_v: TextureWrapping) -> Self {
        Self { filter, wrap_u, wrap_v }
    }
}

#[cfg(test)]
#[path = "render_state_tests.rs"]
mod tests;
