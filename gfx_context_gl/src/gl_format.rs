//! Conversions between gfx_context value types and GL enums
//!
//! Pure functions only, so they can be unit tested without a GL context.

use gfx_context::gfx::types::{
    AttributeFormat, ClearBits, IndexType, PrimitiveTopology, StencilAction, StencilFace, TestFunction,
    TextureFilter, TextureFormat, TextureWrapping,
};

// ===== DEPTH / STENCIL =====

pub fn test_function_to_gl(function: TestFunction) -> u32 {
    match function {
        TestFunction::Never => glow::NEVER,
        TestFunction::Less => glow::LESS,
        TestFunction::Equal => glow::EQUAL,
        TestFunction::LessOrEqual => glow::LEQUAL,
        TestFunction::Greater => glow::GREATER,
        TestFunction::NotEqual => glow::NOTEQUAL,
        TestFunction::GreaterOrEqual => glow::GEQUAL,
        TestFunction::Always => glow::ALWAYS,
    }
}

pub fn stencil_action_to_gl(action: StencilAction) -> u32 {
    match action {
        StencilAction::Keep => glow::KEEP,
        StencilAction::Zero => glow::ZERO,
        StencilAction::Replace => glow::REPLACE,
        StencilAction::Increment => glow::INCR,
        StencilAction::IncrementWrap => glow::INCR_WRAP,
        StencilAction::Decrement => glow::DECR,
        StencilAction::DecrementWrap => glow::DECR_WRAP,
        StencilAction::Invert => glow::INVERT,
    }
}

pub fn stencil_face_to_gl(face: StencilFace) -> u32 {
    match face {
        StencilFace::Front => glow::FRONT,
        StencilFace::Back => glow::BACK,
        StencilFace::FrontAndBack => glow::FRONT_AND_BACK,
    }
}

// ===== GEOMETRY =====

pub fn topology_to_gl(topology: PrimitiveTopology) -> u32 {
    match topology {
        PrimitiveTopology::Points => glow::POINTS,
        PrimitiveTopology::Lines => glow::LINES,
        PrimitiveTopology::LineStrip => glow::LINE_STRIP,
        PrimitiveTopology::Triangles => glow::TRIANGLES,
        PrimitiveTopology::TriangleStrip => glow::TRIANGLE_STRIP,
    }
}

pub fn index_type_to_gl(index_type: IndexType) -> u32 {
    match index_type {
        IndexType::U16 => glow::UNSIGNED_SHORT,
        IndexType::U32 => glow::UNSIGNED_INT,
    }
}

/// How a vertex attribute is fed to `glVertexAttrib*Pointer`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeLayout {
    pub components: i32,
    pub data_type: u32,
    pub normalized: bool,
    /// Integer attributes go through `glVertexAttribIPointer`
    pub integer: bool,
}

pub fn attribute_layout(format: AttributeFormat) -> AttributeLayout {
    let components = format.component_count() as i32;
    match format {
        AttributeFormat::R32_SFLOAT
        | AttributeFormat::R32G32_SFLOAT
        | AttributeFormat::R32G32B32_SFLOAT
        | AttributeFormat::R32G32B32A32_SFLOAT => AttributeLayout {
            components,
            data_type: glow::FLOAT,
            normalized: false,
            integer: false,
        },
        AttributeFormat::R8G8B8A8_UNORM => AttributeLayout {
            components,
            data_type: glow::UNSIGNED_BYTE,
            normalized: true,
            integer: false,
        },
        AttributeFormat::R16G16_SINT => AttributeLayout {
            components,
            data_type: glow::SHORT,
            normalized: false,
            integer: true,
        },
    }
}

// ===== TEXTURES =====

/// (min filter, mag filter)
pub fn filter_to_gl(filter: TextureFilter) -> (u32, u32) {
    match filter {
        TextureFilter::Nearest => (glow::NEAREST, glow::NEAREST),
        TextureFilter::Linear => (glow::LINEAR, glow::LINEAR),
    }
}

pub fn wrapping_to_gl(wrapping: TextureWrapping) -> u32 {
    match wrapping {
        TextureWrapping::ClampToEdge => glow::CLAMP_TO_EDGE,
        TextureWrapping::Repeat => glow::REPEAT,
        TextureWrapping::MirroredRepeat => glow::MIRRORED_REPEAT,
    }
}

/// Sized internal format for render target storage
///
/// GL has no BGRA storage formats; BGRA requests are stored as RGBA.
pub fn internal_format_to_gl(format: TextureFormat) -> u32 {
    match format {
        TextureFormat::R8G8B8A8_UNORM | TextureFormat::B8G8R8A8_UNORM => glow::RGBA8,
        TextureFormat::R8G8B8A8_SRGB | TextureFormat::B8G8R8A8_SRGB => glow::SRGB8_ALPHA8,
        TextureFormat::D24_UNORM_S8_UINT => glow::DEPTH24_STENCIL8,
        TextureFormat::D32_FLOAT_S8_UINT => glow::DEPTH32F_STENCIL8,
    }
}

// ===== CLEAR / INVALIDATE =====

pub fn clear_mask(bits: ClearBits) -> u32 {
    let mut mask = 0;
    if bits.contains(ClearBits::COLOR) {
        mask |= glow::COLOR_BUFFER_BIT;
    }
    if bits.contains(ClearBits::DEPTH) {
        mask |= glow::DEPTH_BUFFER_BIT;
    }
    if bits.contains(ClearBits::STENCIL) {
        mask |= glow::STENCIL_BUFFER_BIT;
    }
    mask
}

/// Attachment names for `glInvalidateFramebuffer`
///
/// The default framebuffer uses `COLOR`/`DEPTH`/`STENCIL`, framebuffer
/// objects use their attachment points.
pub fn invalidate_attachments(bits: ClearBits, default_framebuffer: bool) -> Vec<u32> {
    let (color, depth, stencil) = if default_framebuffer {
        (glow::COLOR, glow::DEPTH, glow::STENCIL)
    } else {
        (glow::COLOR_ATTACHMENT0, glow::DEPTH_ATTACHMENT, glow::STENCIL_ATTACHMENT)
    };

    let mut attachments = Vec::with_capacity(3);
    if bits.contains(ClearBits::COLOR) {
        attachments.push(color);
    }
    if bits.contains(ClearBits::DEPTH) {
        attachments.push(depth);
    }
    if bits.contains(ClearBits::STENCIL) {
        attachments.push(stencil);
    }
    attachments
}

#[cfg(test)]
#[path = "gl_format_tests.rs"]
mod tests;
