//! Swapchain description
//!
//! Backend-neutral choice of image count, extent, usage and present mode
//! from what the surface reports. Backends translate the result into their
//! own create-info.

use crate::types::Extent2D;
use bitflags::bitflags;

bitflags! {
    /// Swapchain image usage
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageUsage: u32 {
        const COLOR_ATTACHMENT = 1 << 0;
        const TRANSFER_SRC = 1 << 1;
        const TRANSFER_DST = 1 << 2;
    }
}

/// Presentation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentMode {
    /// Vsync, always available
    Fifo,
}

/// What the presentation surface supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceCapabilities {
    pub min_image_count: u32,
    /// 0 means no upper bound
    pub max_image_count: u32,
    /// `None` when the surface size is decided by the swapchain
    pub current_extent: Option<Extent2D>,
    pub min_extent: Extent2D,
    pub max_extent: Extent2D,
    pub supported_usage: ImageUsage,
}

/// Parameters for (re)building the swapchain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainDesc {
    pub image_count: u32,
    pub extent: Extent2D,
    pub usage: ImageUsage,
    pub present_mode: PresentMode,
}

impl SwapchainDesc {
    pub fn from_capabilities(caps: &SurfaceCapabilities, requested_extent: Extent2D) -> Self {
        let extent = match caps.current_extent {
            Some(extent) => extent,
            None => Extent2D {
                width: requested_extent
                    .width
                    .clamp(caps.min_extent.width, caps.max_extent.width),
                height: requested_extent
                    .height
                    .clamp(caps.min_extent.height, caps.max_extent.height),
            },
        };

        let optional = ImageUsage::TRANSFER_SRC | ImageUsage::TRANSFER_DST;
        let usage = ImageUsage::COLOR_ATTACHMENT | (caps.supported_usage & optional);

        Self {
            image_count: choose_image_count(caps),
            extent,
            usage,
            present_mode: PresentMode::Fifo,
        }
    }
}

/// One more than the minimum, clamped to the maximum when bounded
pub fn choose_image_count(caps: &SurfaceCapabilities) -> u32 {
    let desired = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        desired.min(caps.max_image_count)
    } else {
        desired
    }
}

#[cfg(test)]
#[path = "swapchain_tests.rs"]
mod tests;
