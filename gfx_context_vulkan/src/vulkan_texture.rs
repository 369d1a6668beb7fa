//! Render target images
//!
//! A `VulkanImage` owns a device-local image, its view and its memory. The
//! context shares them as `Arc<VulkanImage>` attachments: surface depth,
//! offscreen color and offscreen depth/stencil. Fresh images are moved out of
//! `UNDEFINED` right away so a render pass that loads them finds the layout
//! it declares.

use ash::vk;
use gfx_context::gfx::types::{Extent2D, TextureFormat};
use gfx_context::gfx::{Error, Result};
use gfx_context::{gfx_bail, gfx_err, gfx_error};
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::texture_format_to_vk;

const LOG_SOURCE: &str = "gfx::vulkan";

/// Layout offscreen color attachments rest in between passes
pub(crate) const OFFSCREEN_COLOR_LAYOUT: vk::ImageLayout = vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL;

pub struct VulkanImage {
    ctx: Arc<GpuContext>,
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<Allocation>,
    format: TextureFormat,
    extent: Extent2D,
}

impl VulkanImage {
    /// Sampled color attachment, left in `SHADER_READ_ONLY_OPTIMAL`
    pub fn color_attachment(ctx: Arc<GpuContext>, extent: Extent2D, format: TextureFormat) -> Result<Arc<Self>> {
        if format.is_depth_stencil() {
            return Err(Error::InvalidResource(format!("{:?} is not a color format", format)));
        }
        let image = Self::new(
            ctx,
            "color attachment",
            extent,
            format,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
        )?;
        image.transition(OFFSCREEN_COLOR_LAYOUT)?;
        Ok(Arc::new(image))
    }

    /// Depth/stencil attachment, left in `DEPTH_STENCIL_ATTACHMENT_OPTIMAL`
    pub fn depth_stencil_attachment(ctx: Arc<GpuContext>, extent: Extent2D, format: TextureFormat) -> Result<Arc<Self>> {
        if !format.is_depth_stencil() {
            return Err(Error::InvalidResource(format!("{:?} is not a depth/stencil format", format)));
        }
        let image = Self::new(
            ctx,
            "depth/stencil attachment",
            extent,
            format,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        )?;
        image.transition(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)?;
        Ok(Arc::new(image))
    }

    fn new(
        ctx: Arc<GpuContext>,
        name: &str,
        extent: Extent2D,
        format: TextureFormat,
        usage: vk::ImageUsageFlags,
    ) -> Result<Self> {
        if extent.is_empty() {
            return Err(Error::InvalidResource(format!("Cannot create a {}x{} {}", extent.width, extent.height, name)));
        }

        unsafe {
            let image_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(texture_format_to_vk(format))
                .extent(vk::Extent3D { width: extent.width, height: extent.height, depth: 1 })
                .mip_levels(1)
                .array_layers(1)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = ctx
                .device
                .create_image(&image_info, None)
                .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to create {}: {:?}", name, e))?;

            let requirements = ctx.device.get_image_memory_requirements(image);
            let allocated = ctx.allocator().allocate(&AllocationCreateDesc {
                name,
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            });
            let allocation = match allocated {
                Ok(allocation) => allocation,
                Err(_) => {
                    ctx.device.destroy_image(image, None);
                    gfx_error!(LOG_SOURCE, "Out of GPU memory for {} ({}x{})", name, extent.width, extent.height);
                    return Err(Error::OutOfMemory);
                }
            };

            if let Err(e) = ctx.device.bind_image_memory(image, allocation.memory(), allocation.offset()) {
                ctx.allocator().free(allocation).ok();
                ctx.device.destroy_image(image, None);
                gfx_bail!(LOG_SOURCE, "Failed to bind {} memory: {:?}", name, e);
            }

            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(texture_format_to_vk(format))
                .subresource_range(subresource_range(format));

            let view = match ctx.device.create_image_view(&view_info, None) {
                Ok(view) => view,
                Err(e) => {
                    ctx.allocator().free(allocation).ok();
                    ctx.device.destroy_image(image, None);
                    gfx_bail!(LOG_SOURCE, "Failed to create {} view: {:?}", name, e);
                }
            };

            Ok(Self {
                ctx,
                image,
                view,
                allocation: Some(allocation),
                format,
                extent,
            })
        }
    }

    fn transition(&self, new_layout: vk::ImageLayout) -> Result<()> {
        let barrier = layout_barrier(
            self.image,
            self.format,
            vk::ImageLayout::UNDEFINED,
            new_layout,
            vk::AccessFlags::empty(),
            vk::AccessFlags::SHADER_READ
                | vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        );
        self.ctx.one_shot(|device, command_buffer| unsafe {
            device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::ALL_GRAPHICS,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                std::slice::from_ref(&barrier),
            );
        })
    }

    pub fn image(&self) -> vk::Image {
        self.image
    }

    /// Image view, also the texture handle of shader parameters
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }
}

impl std::fmt::Debug for VulkanImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanImage")
            .field("image", &self.image)
            .field("format", &self.format)
            .field("extent", &self.extent)
            .finish()
    }
}

impl Drop for VulkanImage {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_image_view(self.view, None);
            if let Some(allocation) = self.allocation.take() {
                self.ctx.allocator().free(allocation).ok();
            }
            self.ctx.device.destroy_image(self.image, None);
        }
    }
}

pub(crate) fn aspect_mask(format: TextureFormat) -> vk::ImageAspectFlags {
    if format.is_depth_stencil() {
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

fn subresource_range(format: TextureFormat) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: aspect_mask(format),
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

pub(crate) fn layout_barrier(
    image: vk::Image,
    format: TextureFormat,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
    src_access: vk::AccessFlags,
    dst_access: vk::AccessFlags,
) -> vk::ImageMemoryBarrier<'static> {
    vk::ImageMemoryBarrier::default()
        .src_access_mask(src_access)
        .dst_access_mask(dst_access)
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(subresource_range(format))
}
