/*!
# gfx_context_vulkan

Vulkan backend for `gfx_context`.

`VulkanDevice` implements the `GraphicsDevice` contract with ash, memory
comes from gpu-allocator and shader bindings are reflected with spirq. The
frame lifecycle, caches and deferred destruction come from
`ExplicitContext`, so the context the scene layer sees is
`VulkanContext = ExplicitContext<VulkanDevice>`.

```no_run
use gfx_context::gfx::{ApiVersion, Config, GraphicsContext};
use gfx_context_vulkan::gfx::{VulkanContext, VulkanDevice};
# fn run(window: &winit::window::Window) -> gfx_context::gfx::Result<()> {
let config = Config::default();
let device = VulkanDevice::new(window, &config)?;
let mut context = VulkanContext::new(device, config);
context.init(ApiVersion::new(1, 1))?;
context.attach_surface(gfx_context::gfx::types::Extent2D::new(800, 600))?;
# Ok(())
# }
```
*/

mod vulkan_context;
mod vulkan_debug;
mod vulkan_format;
mod vulkan_buffer;
mod vulkan_texture;
mod vulkan_render_pass;
mod vulkan_frame_buffer;
mod vulkan_sampler;
mod vulkan_pipeline;
mod vulkan_descriptor;
mod vulkan_swapchain;
mod vulkan_frame;
mod vulkan_device;

pub mod gfx {
    use gfx_context::gfx::ExplicitContext;

    pub use crate::vulkan_buffer::{VulkanBuffer, VulkanHostBuffer};
    pub use crate::vulkan_context::GpuContext;
    pub use crate::vulkan_device::{stage_buffer_upload, VulkanDevice};
    pub use crate::vulkan_frame_buffer::VulkanFramebuffer;
    pub use crate::vulkan_pipeline::{
        ProgramBinding, ProgramDesc, VulkanDepthStencilState, VulkanPipeline, VulkanProgram,
    };
    pub use crate::vulkan_render_pass::VulkanRenderPass;
    pub use crate::vulkan_sampler::VulkanSampler;
    pub use crate::vulkan_texture::VulkanImage;

    /// Graphics context driving a Vulkan device
    pub type VulkanContext = ExplicitContext<VulkanDevice>;
}
