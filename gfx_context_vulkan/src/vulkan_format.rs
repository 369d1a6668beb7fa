//! Conversions between gfx_context value types and Vulkan enums
//!
//! Pure functions only, so they can be unit tested without a GPU.

use ash::vk;
use gfx_context::gfx::device::{ImageUsage, SurfaceCapabilities};
use gfx_context::gfx::types::{
    AttributeFormat, ClearBits, Color, Extent2D, IndexType, LoadOp, PrimitiveTopology,
    StencilAction, StoreOp, TestFunction, TextureFilter, TextureFormat, TextureWrapping,
    Viewport,
};

// ===== FORMATS =====

pub fn texture_format_to_vk(format: TextureFormat) -> vk::Format {
    match format {
        TextureFormat::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
        TextureFormat::R8G8B8A8_SRGB => vk::Format::R8G8B8A8_SRGB,
        TextureFormat::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
        TextureFormat::B8G8R8A8_SRGB => vk::Format::B8G8R8A8_SRGB,
        TextureFormat::D24_UNORM_S8_UINT => vk::Format::D24_UNORM_S8_UINT,
        TextureFormat::D32_FLOAT_S8_UINT => vk::Format::D32_SFLOAT_S8_UINT,
    }
}

/// Inverse of `texture_format_to_vk`, `None` for formats the context never uses
pub fn texture_format_from_vk(format: vk::Format) -> Option<TextureFormat> {
    match format {
        vk::Format::R8G8B8A8_UNORM => Some(TextureFormat::R8G8B8A8_UNORM),
        vk::Format::R8G8B8A8_SRGB => Some(TextureFormat::R8G8B8A8_SRGB),
        vk::Format::B8G8R8A8_UNORM => Some(TextureFormat::B8G8R8A8_UNORM),
        vk::Format::B8G8R8A8_SRGB => Some(TextureFormat::B8G8R8A8_SRGB),
        vk::Format::D24_UNORM_S8_UINT => Some(TextureFormat::D24_UNORM_S8_UINT),
        vk::Format::D32_SFLOAT_S8_UINT => Some(TextureFormat::D32_FLOAT_S8_UINT),
        _ => None,
    }
}

pub fn attribute_format_to_vk(format: AttributeFormat) -> vk::Format {
    match format {
        AttributeFormat::R32_SFLOAT => vk::Format::R32_SFLOAT,
        AttributeFormat::R32G32_SFLOAT => vk::Format::R32G32_SFLOAT,
        AttributeFormat::R32G32B32_SFLOAT => vk::Format::R32G32B32_SFLOAT,
        AttributeFormat::R32G32B32A32_SFLOAT => vk::Format::R32G32B32A32_SFLOAT,
        AttributeFormat::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
        AttributeFormat::R16G16_SINT => vk::Format::R16G16_SINT,
    }
}

/// Pick the presentation format: sRGB BGRA/RGBA first, then their UNORM
/// variants, otherwise `None`
pub fn choose_surface_format(available: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    const PREFERRED: [vk::Format; 4] = [
        vk::Format::B8G8R8A8_SRGB,
        vk::Format::R8G8B8A8_SRGB,
        vk::Format::B8G8R8A8_UNORM,
        vk::Format::R8G8B8A8_UNORM,
    ];

    PREFERRED.iter().find_map(|&wanted| {
        available
            .iter()
            .find(|f| f.format == wanted && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
            .copied()
    })
}

// ===== SURFACE =====

pub fn image_usage_to_vk(usage: ImageUsage) -> vk::ImageUsageFlags {
    let mut flags = vk::ImageUsageFlags::empty();
    if usage.contains(ImageUsage::COLOR_ATTACHMENT) {
        flags |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
    }
    if usage.contains(ImageUsage::TRANSFER_SRC) {
        flags |= vk::ImageUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(ImageUsage::TRANSFER_DST) {
        flags |= vk::ImageUsageFlags::TRANSFER_DST;
    }
    flags
}

fn image_usage_from_vk(flags: vk::ImageUsageFlags) -> ImageUsage {
    let mut usage = ImageUsage::empty();
    if flags.contains(vk::ImageUsageFlags::COLOR_ATTACHMENT) {
        usage |= ImageUsage::COLOR_ATTACHMENT;
    }
    if flags.contains(vk::ImageUsageFlags::TRANSFER_SRC) {
        usage |= ImageUsage::TRANSFER_SRC;
    }
    if flags.contains(vk::ImageUsageFlags::TRANSFER_DST) {
        usage |= ImageUsage::TRANSFER_DST;
    }
    usage
}

fn extent_from_vk(extent: vk::Extent2D) -> Extent2D {
    Extent2D::new(extent.width, extent.height)
}

pub fn extent_to_vk(extent: Extent2D) -> vk::Extent2D {
    vk::Extent2D { width: extent.width, height: extent.height }
}

/// `current_extent` of u32::MAX means the swapchain decides the size
pub fn surface_capabilities_from_vk(caps: &vk::SurfaceCapabilitiesKHR) -> SurfaceCapabilities {
    let current_extent = if caps.current_extent.width == u32::MAX {
        None
    } else {
        Some(extent_from_vk(caps.current_extent))
    };

    SurfaceCapabilities {
        min_image_count: caps.min_image_count,
        max_image_count: caps.max_image_count,
        current_extent,
        min_extent: extent_from_vk(caps.min_image_extent),
        max_extent: extent_from_vk(caps.max_image_extent),
        supported_usage: image_usage_from_vk(caps.supported_usage_flags),
    }
}

// ===== DEPTH / STENCIL =====

pub fn compare_op_to_vk(function: TestFunction) -> vk::CompareOp {
    match function {
        TestFunction::Never => vk::CompareOp::NEVER,
        TestFunction::Less => vk::CompareOp::LESS,
        TestFunction::Equal => vk::CompareOp::EQUAL,
        TestFunction::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
        TestFunction::Greater => vk::CompareOp::GREATER,
        TestFunction::NotEqual => vk::CompareOp::NOT_EQUAL,
        TestFunction::GreaterOrEqual => vk::CompareOp::GREATER_OR_EQUAL,
        TestFunction::Always => vk::CompareOp::ALWAYS,
    }
}

pub fn stencil_op_to_vk(action: StencilAction) -> vk::StencilOp {
    match action {
        StencilAction::Keep => vk::StencilOp::KEEP,
        StencilAction::Zero => vk::StencilOp::ZERO,
        StencilAction::Replace => vk::StencilOp::REPLACE,
        StencilAction::Increment => vk::StencilOp::INCREMENT_AND_CLAMP,
        StencilAction::IncrementWrap => vk::StencilOp::INCREMENT_AND_WRAP,
        StencilAction::Decrement => vk::StencilOp::DECREMENT_AND_CLAMP,
        StencilAction::DecrementWrap => vk::StencilOp::DECREMENT_AND_WRAP,
        StencilAction::Invert => vk::StencilOp::INVERT,
    }
}

// ===== GEOMETRY =====

pub fn topology_to_vk(topology: PrimitiveTopology) -> vk::PrimitiveTopology {
    match topology {
        PrimitiveTopology::Points => vk::PrimitiveTopology::POINT_LIST,
        PrimitiveTopology::Lines => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopology::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
        PrimitiveTopology::Triangles => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
    }
}

pub fn index_type_to_vk(index_type: IndexType) -> vk::IndexType {
    match index_type {
        IndexType::U16 => vk::IndexType::UINT16,
        IndexType::U32 => vk::IndexType::UINT32,
    }
}

// ===== SAMPLERS =====

pub fn filter_to_vk(filter: TextureFilter) -> (vk::Filter, vk::SamplerMipmapMode) {
    match filter {
        TextureFilter::Nearest => (vk::Filter::NEAREST, vk::SamplerMipmapMode::NEAREST),
        TextureFilter::Linear => (vk::Filter::LINEAR, vk::SamplerMipmapMode::LINEAR),
    }
}

pub fn address_mode_to_vk(wrapping: TextureWrapping) -> vk::SamplerAddressMode {
    match wrapping {
        TextureWrapping::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        TextureWrapping::Repeat => vk::SamplerAddressMode::REPEAT,
        TextureWrapping::MirroredRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
    }
}

// ===== RENDER PASSES =====

pub fn load_op_to_vk(op: LoadOp) -> vk::AttachmentLoadOp {
    match op {
        LoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
        LoadOp::Load => vk::AttachmentLoadOp::LOAD,
        LoadOp::DontCare => vk::AttachmentLoadOp::DONT_CARE,
    }
}

pub fn store_op_to_vk(op: StoreOp) -> vk::AttachmentStoreOp {
    match op {
        StoreOp::Store => vk::AttachmentStoreOp::STORE,
        StoreOp::DontCare => vk::AttachmentStoreOp::DONT_CARE,
    }
}

pub fn clear_color_to_vk(color: Color) -> vk::ClearValue {
    vk::ClearValue {
        color: vk::ClearColorValue { float32: [color.r, color.g, color.b, color.a] },
    }
}

/// Depth clears to the far plane, stencil to zero
pub fn clear_depth_stencil_to_vk() -> vk::ClearValue {
    vk::ClearValue {
        depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
    }
}

/// Aspect mask of the depth/stencil part of a clear request
pub fn depth_stencil_aspect(bits: ClearBits) -> vk::ImageAspectFlags {
    let mut aspect = vk::ImageAspectFlags::empty();
    if bits.contains(ClearBits::DEPTH) {
        aspect |= vk::ImageAspectFlags::DEPTH;
    }
    if bits.contains(ClearBits::STENCIL) {
        aspect |= vk::ImageAspectFlags::STENCIL;
    }
    aspect
}

pub fn viewport_to_vk(viewport: Viewport) -> (vk::Viewport, vk::Rect2D) {
    let vk_viewport = vk::Viewport {
        x: viewport.x as f32,
        y: viewport.y as f32,
        width: viewport.width as f32,
        height: viewport.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    };
    let scissor = vk::Rect2D {
        offset: vk::Offset2D { x: viewport.x.max(0), y: viewport.y.max(0) },
        extent: vk::Extent2D { width: viewport.width, height: viewport.height },
    };
    (vk_viewport, scissor)
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;
