//! Value types shared by the context, the caches and every backend

use bitflags::bitflags;

bitflags! {
    /// Attachments targeted by a clear or store request
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClearBits: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

// ===== DEPTH/STENCIL ENUMS =====

/// Comparison function for depth and stencil tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum TestFunction {
    Never,
    #[default]
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

/// Which polygon faces a stencil setter applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilFace {
    Front,
    Back,
    FrontAndBack,
}

/// Stencil buffer update action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum StencilAction {
    #[default]
    Keep,
    Zero,
    Replace,
    Increment,
    IncrementWrap,
    Decrement,
    DecrementWrap,
    Invert,
}

// ===== GEOMETRY =====

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum PrimitiveTopology {
    Points,
    Lines,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
}

/// Index buffer element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    /// Size in bytes of one index element
    pub fn size_bytes(&self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }

    /// Index type matching an element size, if any
    pub fn from_element_size(size: u32) -> Option<Self> {
        match size {
            2 => Some(IndexType::U16),
            4 => Some(IndexType::U32),
            _ => None,
        }
    }
}

/// Vertex attribute data format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(non_camel_case_types)]
pub enum AttributeFormat {
    R32_SFLOAT,
    R32G32_SFLOAT,
    R32G32B32_SFLOAT,
    R32G32B32A32_SFLOAT,
    R8G8B8A8_UNORM,
    R16G16_SINT,
}

impl AttributeFormat {
    /// Size in bytes of one attribute value
    pub fn size_bytes(&self) -> u32 {
        match self {
            AttributeFormat::R32_SFLOAT => 4,
            AttributeFormat::R32G32_SFLOAT => 8,
            AttributeFormat::R32G32B32_SFLOAT => 12,
            AttributeFormat::R32G32B32A32_SFLOAT => 16,
            AttributeFormat::R8G8B8A8_UNORM => 4,
            AttributeFormat::R16G16_SINT => 4,
        }
    }

    /// Number of components
    pub fn component_count(&self) -> u32 {
        match self {
            AttributeFormat::R32_SFLOAT => 1,
            AttributeFormat::R32G32_SFLOAT | AttributeFormat::R16G16_SINT => 2,
            AttributeFormat::R32G32B32_SFLOAT => 3,
            AttributeFormat::R32G32B32A32_SFLOAT | AttributeFormat::R8G8B8A8_UNORM => 4,
        }
    }
}

/// One vertex attribute inside a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexAttribute {
    /// Attribute location in the program
    pub location: u32,
    /// Data format
    pub format: AttributeFormat,
    /// Offset in bytes from the start of the vertex
    pub offset: u32,
}

/// Layout of one vertex buffer binding
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BindingInfo {
    /// Binding slot
    pub binding: u32,
    /// Stride in bytes between consecutive vertices
    pub stride: u32,
    /// Attributes read from this binding
    pub attributes: Vec<VertexAttribute>,
}

impl BindingInfo {
    /// Build a tightly packed binding from an ordered attribute list
    pub fn packed(binding: u32, formats: &[(u32, AttributeFormat)]) -> Self {
        let mut offset = 0;
        let mut attributes = Vec::with_capacity(formats.len());
        for &(location, format) in formats {
            attributes.push(VertexAttribute { location, format, offset });
            offset += format.size_bytes();
        }
        Self { binding, stride: offset, attributes }
    }
}

// ===== TEXTURES =====

/// Texture filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum TextureFilter {
    Nearest,
    #[default]
    Linear,
}

/// Texture addressing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum TextureWrapping {
    #[default]
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

/// Attachment and texture formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(non_camel_case_types)]
pub enum TextureFormat {
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    B8G8R8A8_UNORM,
    B8G8R8A8_SRGB,
    D24_UNORM_S8_UINT,
    D32_FLOAT_S8_UINT,
}

impl TextureFormat {
    pub fn is_depth_stencil(&self) -> bool {
        matches!(self, TextureFormat::D24_UNORM_S8_UINT | TextureFormat::D32_FLOAT_S8_UINT)
    }
}

// ===== MISC =====

/// RGBA clear color
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color { r: 0.0, g: 0.0, b: 0.0, a: 1.0 };

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

/// Size of a surface or attachment in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A zero-sized surface cannot back a swapchain (minimized window)
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Viewport rectangle in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Viewport covering a whole extent
    pub fn full(extent: Extent2D) -> Self {
        Self { x: 0, y: 0, width: extent.width, height: extent.height }
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
