//! VulkanDevice - Vulkan implementation of the GraphicsDevice trait
//!
//! Owns the surface, the swapchain, the surface depth attachment and the
//! per-frame objects. Everything else (instance, device, allocator, queues)
//! lives in the shared `GpuContext` so resources created from this device
//! can outlive it.

use ash::vk;
use gfx_context::gfx::device::{
    AcquireStatus, FramebufferSource, GraphicsDevice, PipelineDesc, PresentStatus, RenderPassDesc,
    ResolvedParam, SubmitStatus, SurfaceCapabilities, SwapchainDesc, WaitStatus,
};
use gfx_context::gfx::resource::{BufferAllocator, BufferTarget, GpuBuffer, RenderTarget, TargetId};
use gfx_context::gfx::types::{
    ClearBits, Color, DepthStencilKey, Extent2D, IndexType, ProgramId, SamplerKey, TextureFormat, Viewport,
};
use gfx_context::gfx::{Config, Error, ExplicitContext, Result};
use gfx_context::{gfx_debug, gfx_err, gfx_error, gfx_info, gfx_warn};
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::CString;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::vulkan_buffer::{VulkanBuffer, VulkanHostBuffer};
use crate::vulkan_context::GpuContext;
use crate::vulkan_debug;
use crate::vulkan_descriptor::DescriptorAllocator;
use crate::vulkan_format::{
    choose_surface_format, clear_color_to_vk, clear_depth_stencil_to_vk, depth_stencil_aspect, extent_to_vk,
    index_type_to_vk, surface_capabilities_from_vk, texture_format_from_vk, texture_format_to_vk,
    viewport_to_vk,
};
use crate::vulkan_frame::{CommandPool, FrameCommandBuffers, FrameSync};
use crate::vulkan_frame_buffer::VulkanFramebuffer;
use crate::vulkan_pipeline::{ProgramDesc, VulkanDepthStencilState, VulkanPipeline, VulkanProgram};
use crate::vulkan_render_pass::VulkanRenderPass;
use crate::vulkan_sampler::VulkanSampler;
use crate::vulkan_swapchain::VulkanSwapchain;
use crate::vulkan_texture::{layout_barrier, VulkanImage, OFFSCREEN_COLOR_LAYOUT};

const LOG_SOURCE: &str = "gfx::vulkan";

/// Log an initialization failure and turn it into `Error::InitializationFailed`
fn init_error(what: &str, cause: impl std::fmt::Debug) -> Error {
    gfx_error!(LOG_SOURCE, "{}: {:?}", what, cause);
    Error::InitializationFailed(format!("{}: {:?}", what, cause))
}

// ============================================================================
// Instance bootstrap
// ============================================================================

/// Instance-level objects created before the logical device exists
///
/// Destroys whatever it still holds when dropped, so a failure between
/// instance creation and `GpuContext` construction does not leak.
struct InstanceGuard {
    entry: ash::Entry,
    instance: Option<ash::Instance>,
    messenger: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    surface: Option<vk::SurfaceKHR>,
    surface_loader: ash::khr::surface::Instance,
}

impl InstanceGuard {
    fn instance(&self) -> Result<&ash::Instance> {
        self.instance
            .as_ref()
            .ok_or_else(|| Error::InitializationFailed("Instance already released".to_string()))
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        unsafe {
            if let Some(surface) = self.surface.take() {
                self.surface_loader.destroy_surface(surface, None);
            }
            if let Some((loader, messenger)) = self.messenger.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            if let Some(instance) = self.instance.take() {
                instance.destroy_instance(None);
            }
        }
    }
}

/// GPU chosen for rendering with its queue families
struct SelectedGpu {
    physical_device: vk::PhysicalDevice,
    graphics_family: u32,
    present_family: u32,
}

fn select_gpu(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<SelectedGpu> {
    let physical_devices = unsafe { instance.enumerate_physical_devices() }
        .map_err(|e| init_error("Failed to enumerate physical devices", e))?;

    for physical_device in physical_devices {
        let families = unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

        let graphics_family = families
            .iter()
            .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
            .map(|index| index as u32);

        let presents = |index: u32| unsafe {
            surface_loader
                .get_physical_device_surface_support(physical_device, index, surface)
                .unwrap_or(false)
        };

        if let Some(graphics_family) = graphics_family {
            // Prefer one family doing both
            let present_family = if presents(graphics_family) {
                Some(graphics_family)
            } else {
                (0..families.len() as u32).find(|&index| presents(index))
            };
            if let Some(present_family) = present_family {
                return Ok(SelectedGpu { physical_device, graphics_family, present_family });
            }
        }
    }

    Err(init_error("No GPU with graphics and present queues", vk::Result::ERROR_INITIALIZATION_FAILED))
}

fn select_depth_format(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Result<TextureFormat> {
    for candidate in [TextureFormat::D24_UNORM_S8_UINT, TextureFormat::D32_FLOAT_S8_UINT] {
        let properties = unsafe {
            instance.get_physical_device_format_properties(physical_device, texture_format_to_vk(candidate))
        };
        if properties
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        {
            return Ok(candidate);
        }
    }
    Err(init_error("No supported depth/stencil format", vk::Result::ERROR_FORMAT_NOT_SUPPORTED))
}

fn describe_device(properties: &vk::PhysicalDeviceProperties) -> String {
    let name = properties
        .device_name_as_c_str()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "Unknown device".to_string());
    format!(
        "{} (Vulkan {}.{}.{}, driver {:#x})",
        name,
        vk::api_version_major(properties.api_version),
        vk::api_version_minor(properties.api_version),
        vk::api_version_patch(properties.api_version),
        properties.driver_version
    )
}

// ============================================================================
// VulkanDevice
// ============================================================================

pub struct VulkanDevice {
    descriptors: Option<DescriptorAllocator>,
    command_buffers: Option<FrameCommandBuffers>,
    command_pool: Option<CommandPool>,
    sync: Option<FrameSync>,
    swapchain: Option<VulkanSwapchain>,
    depth_attachment: Option<Arc<VulkanImage>>,

    swapchain_loader: ash::khr::swapchain::Device,
    surface_loader: ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    surface_format: vk::SurfaceFormatKHR,
    color_format: TextureFormat,
    depth_format: TextureFormat,
    queue_families: Vec<u32>,
    limits: vk::PhysicalDeviceLimits,
    renderer_name: String,

    next_program_id: AtomicU64,
    /// Whether the render pass being recorded has a depth/stencil attachment
    pass_has_depth_stencil: bool,
    /// One entry per pushed label; `false` when nothing was recorded
    debug_labels: Vec<bool>,

    ctx: Arc<GpuContext>,
}

impl VulkanDevice {
    /// Create the instance, the window surface and the logical device
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: &Config) -> Result<Self> {
        let entry = unsafe { ash::Entry::load() }.map_err(|e| init_error("Failed to load Vulkan library", e))?;

        let app_name = CString::new(config.app_name.clone())
            .map_err(|e| init_error("Invalid application name", e))?;
        let (major, minor, patch) = config.app_version;
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, major, minor, patch))
            .engine_name(c"gfx_context")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_1);

        let display_handle = window
            .display_handle()
            .map_err(|e| init_error("Failed to get display handle", e))?;
        let window_handle = window
            .window_handle()
            .map_err(|e| init_error("Failed to get window handle", e))?;

        let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
            .map_err(|e| init_error("Failed to get required extensions", e))?
            .to_vec();
        if config.enable_validation {
            extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
        }
        let layer_names = if config.enable_validation {
            vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
        } else {
            vec![]
        };

        let instance_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layer_names)
            .enabled_extension_names(&extension_names);

        let instance = unsafe { entry.create_instance(&instance_info, None) }
            .map_err(|e| init_error("Failed to create Vulkan instance", e))?;

        let mut guard = InstanceGuard {
            surface_loader: ash::khr::surface::Instance::new(&entry, &instance),
            entry,
            instance: Some(instance),
            messenger: None,
            surface: None,
        };

        if config.enable_validation {
            let instance = guard.instance()?;
            let loader = ash::ext::debug_utils::Instance::new(&guard.entry, instance);
            let messenger_info = vulkan_debug::messenger_create_info(config.debug_severity);
            let messenger = unsafe { loader.create_debug_utils_messenger(&messenger_info, None) }
                .map_err(|e| init_error("Failed to create debug messenger", e))?;
            guard.messenger = Some((loader, messenger));
        }

        let surface = unsafe {
            ash_window::create_surface(
                &guard.entry,
                guard.instance()?,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
        }
        .map_err(|e| init_error("Failed to create surface", e))?;
        guard.surface = Some(surface);

        let instance = guard.instance()?;
        let gpu = select_gpu(instance, &guard.surface_loader, surface)?;
        let depth_format = select_depth_format(instance, gpu.physical_device)?;

        let surface_formats = unsafe {
            guard
                .surface_loader
                .get_physical_device_surface_formats(gpu.physical_device, surface)
        }
        .map_err(|e| init_error("Failed to query surface formats", e))?;
        let surface_format = choose_surface_format(&surface_formats)
            .ok_or_else(|| init_error("No supported surface format", &surface_formats))?;
        let color_format = texture_format_from_vk(surface_format.format)
            .ok_or_else(|| init_error("Unexpected surface format", surface_format.format))?;

        // Logical device
        let queue_priorities = [1.0];
        let mut queue_families = vec![gpu.graphics_family];
        if gpu.present_family != gpu.graphics_family {
            queue_families.push(gpu.present_family);
        }
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = queue_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();
        let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];
        let device_features = vk::PhysicalDeviceFeatures::default();
        let device_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&device_extension_names)
            .enabled_features(&device_features);

        let device = unsafe { instance.create_device(gpu.physical_device, &device_info, None) }
            .map_err(|e| init_error("Failed to create logical device", e))?;

        let allocator = match Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device: gpu.physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        }) {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                return Err(init_error("Failed to create GPU allocator", e));
            }
        };

        let upload_pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(gpu.graphics_family)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let upload_command_pool = match unsafe { device.create_command_pool(&upload_pool_info, None) } {
            Ok(pool) => pool,
            Err(e) => {
                drop(allocator);
                unsafe { device.destroy_device(None) };
                return Err(init_error("Failed to create upload command pool", e));
            }
        };

        let (graphics_queue, present_queue) = unsafe {
            (
                device.get_device_queue(gpu.graphics_family, 0),
                device.get_device_queue(gpu.present_family, 0),
            )
        };

        // The context takes over the instance and the messenger; the surface
        // stays with the device
        let surface = guard.surface.take().unwrap_or(surface);
        let surface_loader = guard.surface_loader.clone();
        let messenger = guard.messenger.take();
        let instance = guard
            .instance
            .take()
            .ok_or_else(|| Error::InitializationFailed("Instance already released".to_string()))?;
        let entry = guard.entry.clone();
        drop(guard);

        let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &device);
        let ctx = Arc::new(GpuContext::new(
            entry,
            instance,
            device,
            gpu.physical_device,
            allocator,
            graphics_queue,
            gpu.graphics_family,
            present_queue,
            upload_command_pool,
            messenger,
        ));

        let properties = ctx.device_properties();
        let renderer_name = describe_device(&properties);
        gfx_info!(LOG_SOURCE, "Using {}", renderer_name);
        gfx_debug!(
            LOG_SOURCE,
            "Surface format {:?}, depth format {:?}, validation {}",
            color_format,
            depth_format,
            config.enable_validation
        );

        Ok(Self {
            descriptors: None,
            command_buffers: None,
            command_pool: None,
            sync: None,
            swapchain: None,
            depth_attachment: None,
            swapchain_loader,
            surface_loader,
            surface,
            surface_format,
            color_format,
            depth_format,
            queue_families,
            limits: properties.limits,
            renderer_name,
            next_program_id: AtomicU64::new(1),
            pass_has_depth_stencil: false,
            debug_labels: Vec::new(),
            ctx,
        })
    }

    // ===== RESOURCES OUTSIDE THE CONTEXT CONTRACT =====

    /// Compile a vertex + fragment program from SPIR-V
    pub fn create_program(&self, desc: &ProgramDesc<'_>) -> Result<VulkanProgram> {
        let id = ProgramId(self.next_program_id.fetch_add(1, Ordering::Relaxed));
        VulkanProgram::new(Arc::clone(&self.ctx), id, desc)
    }

    /// Host-visible uniform buffer for shader parameters
    pub fn create_uniform_buffer(&self, size: u64) -> Result<VulkanBuffer> {
        VulkanBuffer::uniform(Arc::clone(&self.ctx), size)
    }

    /// Offscreen target with a sampled color attachment and an optional
    /// depth/stencil attachment in the surface depth format
    pub fn create_render_target(
        &self,
        id: TargetId,
        extent: Extent2D,
        color_format: TextureFormat,
        with_depth_stencil: bool,
    ) -> Result<RenderTarget<Arc<VulkanImage>>> {
        let color = VulkanImage::color_attachment(Arc::clone(&self.ctx), extent, color_format)?;
        let depth_stencil = if with_depth_stencil {
            let depth = VulkanImage::depth_stencil_attachment(Arc::clone(&self.ctx), extent, self.depth_format)?;
            Some((depth, self.depth_format))
        } else {
            None
        };
        Ok(RenderTarget { id, extent, color, color_format, depth_stencil })
    }

    /// Record a buffer copy into this frame's memory command buffer
    ///
    /// Copies run before any rendering command of the same frame.
    pub fn record_buffer_copy(&mut self, src: vk::Buffer, src_offset: u64, dst: vk::Buffer, dst_offset: u64, size: u64) {
        let Some(buffers) = self.command_buffers else {
            gfx_warn!(LOG_SOURCE, "Buffer copy recorded without command buffers, dropped");
            return;
        };
        let region = vk::BufferCopy { src_offset, dst_offset, size };
        unsafe {
            self.ctx
                .device
                .cmd_copy_buffer(buffers.memory, src, dst, std::slice::from_ref(&region));
        }
    }

    fn rendering_command_buffer(&self) -> Option<vk::CommandBuffer> {
        self.command_buffers.map(|buffers| buffers.rendering)
    }

    fn require<'a, T>(value: &'a Option<T>, what: &str) -> Result<&'a T> {
        value
            .as_ref()
            .ok_or_else(|| Error::InvalidState(format!("{} not created", what)))
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.ctx.device.device_wait_idle() {
                gfx_error!(LOG_SOURCE, "device_wait_idle failed during shutdown: {:?}", e);
            }
        }

        self.descriptors = None;
        if let (Some(pool), Some(buffers)) = (&self.command_pool, self.command_buffers.take()) {
            pool.free_frame_buffers(buffers);
        }
        self.command_pool = None;
        self.sync = None;
        self.swapchain = None;
        self.depth_attachment = None;

        unsafe {
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

/// Stage `data` in the frame's staging arena and record its copy into `dst`
///
/// Must be called inside a frame; the copy lands before the frame's
/// rendering commands.
pub fn stage_buffer_upload(
    context: &mut ExplicitContext<VulkanDevice>,
    data: &[u8],
    dst: &VulkanBuffer,
    dst_offset: u64,
) -> Result<()> {
    if dst_offset + data.len() as u64 > dst.size() {
        return Err(Error::InvalidResource(format!(
            "Upload of {} bytes at offset {} exceeds buffer size {}",
            data.len(),
            dst_offset,
            dst.size()
        )));
    }
    let region = context.stage_data(data)?;
    let src = context
        .staging_buffer()
        .map(|staging| staging.buffer().handle())
        .ok_or_else(|| Error::InvalidState("No staging buffer".to_string()))?;
    context
        .device_mut()
        .record_buffer_copy(src, region.offset, dst.handle(), dst_offset, region.size);
    Ok(())
}

// ============================================================================
// BufferAllocator
// ============================================================================

impl BufferAllocator for VulkanDevice {
    type Buffer = VulkanBuffer;

    fn create_buffer(&self, target: BufferTarget, size_bytes: u64) -> Result<VulkanBuffer> {
        VulkanBuffer::new(Arc::clone(&self.ctx), target, size_bytes)
    }
}

// ============================================================================
// GraphicsDevice
// ============================================================================

impl GraphicsDevice for VulkanDevice {
    type RenderPass = VulkanRenderPass;
    type Framebuffer = VulkanFramebuffer;
    type Pipeline = VulkanPipeline;
    type DepthStencilState = VulkanDepthStencilState;
    type Sampler = VulkanSampler;
    type Program = VulkanProgram;
    type Attachment = Arc<VulkanImage>;
    type HostBuffer = VulkanHostBuffer;
    type BufferHandle = vk::Buffer;
    type TextureHandle = vk::ImageView;

    fn renderer_name(&self) -> String {
        self.renderer_name.clone()
    }

    // ===== FIXED RESOURCES =====

    fn create_command_pool(&mut self) -> Result<()> {
        self.command_pool = Some(CommandPool::new(Arc::clone(&self.ctx))?);
        // Descriptor pools are reset with the command buffers, once per frame
        self.descriptors = Some(DescriptorAllocator::new(Arc::clone(&self.ctx))?);
        Ok(())
    }

    fn create_sync_primitives(&mut self) -> Result<()> {
        self.sync = Some(FrameSync::new(Arc::clone(&self.ctx))?);
        Ok(())
    }

    // ===== SURFACE / SWAPCHAIN =====

    fn surface_capabilities(&self) -> Result<SurfaceCapabilities> {
        let caps = unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(self.ctx.physical_device, self.surface)
        }
        .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to query surface capabilities: {:?}", e))?;
        Ok(surface_capabilities_from_vk(&caps))
    }

    fn surface_format(&self) -> TextureFormat {
        self.color_format
    }

    fn depth_stencil_format(&self) -> TextureFormat {
        self.depth_format
    }

    fn recreate_depth_attachment(&mut self, extent: Extent2D) -> Result<()> {
        self.depth_attachment = None;
        self.depth_attachment = Some(VulkanImage::depth_stencil_attachment(
            Arc::clone(&self.ctx),
            extent,
            self.depth_format,
        )?);
        Ok(())
    }

    fn destroy_depth_attachment(&mut self) {
        self.depth_attachment = None;
    }

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> Result<u32> {
        let caps = unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(self.ctx.physical_device, self.surface)
        }
        .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to query surface capabilities: {:?}", e))?;

        let swapchain = VulkanSwapchain::new(
            Arc::clone(&self.ctx),
            self.swapchain_loader.clone(),
            self.surface,
            self.surface_format,
            caps.current_transform,
            &self.queue_families,
            desc,
        )?;
        let image_count = swapchain.image_count();
        self.swapchain = Some(swapchain);
        Ok(image_count)
    }

    fn destroy_swapchain(&mut self) {
        self.swapchain = None;
    }

    fn create_command_buffers(&mut self) -> Result<()> {
        let buffers = Self::require(&self.command_pool, "Command pool")?.allocate_frame_buffers()?;
        self.command_buffers = Some(buffers);
        Ok(())
    }

    fn destroy_command_buffers(&mut self) {
        if let (Some(pool), Some(buffers)) = (&self.command_pool, self.command_buffers.take()) {
            pool.free_frame_buffers(buffers);
        }
    }

    // ===== FRAME =====

    fn wait_frame_fence(&mut self, timeout_ns: u64) -> Result<WaitStatus> {
        let fence = Self::require(&self.sync, "Frame sync")?.fence;
        match unsafe { self.ctx.device.wait_for_fences(&[fence], true, timeout_ns) } {
            Ok(()) => Ok(WaitStatus::Signaled),
            Err(vk::Result::ERROR_DEVICE_LOST) => Ok(WaitStatus::DeviceLost),
            Err(e) => Err(gfx_err!(LOG_SOURCE, "Failed to wait for the frame fence: {:?}", e)),
        }
    }

    fn reset_frame_fence(&mut self) -> Result<()> {
        let fence = Self::require(&self.sync, "Frame sync")?.fence;
        unsafe { self.ctx.device.reset_fences(&[fence]) }
            .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to reset the frame fence: {:?}", e))
    }

    fn acquire_next_image(&mut self) -> Result<AcquireStatus> {
        let swapchain = Self::require(&self.swapchain, "Swapchain")?;
        let acquire = Self::require(&self.sync, "Frame sync")?.acquire;

        let acquired = unsafe {
            swapchain
                .loader()
                .acquire_next_image(swapchain.handle(), u64::MAX, acquire, vk::Fence::null())
        };
        match acquired {
            Ok((index, false)) => Ok(AcquireStatus::Acquired(index)),
            Ok((index, true)) => Ok(AcquireStatus::Suboptimal(index)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireStatus::OutOfDate),
            Err(vk::Result::ERROR_DEVICE_LOST) => Ok(AcquireStatus::DeviceLost),
            Err(e) => Err(gfx_err!(LOG_SOURCE, "Failed to acquire swapchain image: {:?}", e)),
        }
    }

    fn begin_command_buffers(&mut self) -> Result<()> {
        if let Some(descriptors) = self.descriptors.as_mut() {
            descriptors.reset()?;
        }
        self.debug_labels.clear();
        Self::require(&self.command_buffers, "Command buffers")?.begin(&self.ctx.device)
    }

    fn end_command_buffers(&mut self) -> Result<()> {
        Self::require(&self.command_buffers, "Command buffers")?.end(&self.ctx.device)
    }

    fn submit(&mut self) -> Result<SubmitStatus> {
        let buffers = *Self::require(&self.command_buffers, "Command buffers")?;
        let sync = Self::require(&self.sync, "Frame sync")?;

        let wait_semaphores = [sync.acquire];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [buffers.memory, buffers.rendering];
        let signal_semaphores = [sync.release];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        match unsafe { self.ctx.device.queue_submit(self.ctx.graphics_queue, &[submit_info], sync.fence) } {
            Ok(()) => Ok(SubmitStatus::Submitted),
            Err(vk::Result::ERROR_DEVICE_LOST) => Ok(SubmitStatus::DeviceLost),
            Err(e) => Err(gfx_err!(LOG_SOURCE, "Failed to submit frame: {:?}", e)),
        }
    }

    fn present(&mut self, image_index: u32) -> Result<PresentStatus> {
        let swapchain = Self::require(&self.swapchain, "Swapchain")?;
        let release = Self::require(&self.sync, "Frame sync")?.release;

        let wait_semaphores = [release];
        let swapchains = [swapchain.handle()];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { swapchain.loader().queue_present(self.ctx.present_queue, &present_info) } {
            Ok(false) => Ok(PresentStatus::Presented),
            Ok(true) => Ok(PresentStatus::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentStatus::OutOfDate),
            Err(vk::Result::ERROR_DEVICE_LOST) => Ok(PresentStatus::DeviceLost),
            Err(e) => Err(gfx_err!(LOG_SOURCE, "Failed to present image {}: {:?}", image_index, e)),
        }
    }

    fn wait_queue_idle(&mut self) -> Result<WaitStatus> {
        let mut queues = vec![self.ctx.graphics_queue];
        if self.ctx.present_queue != self.ctx.graphics_queue {
            queues.push(self.ctx.present_queue);
        }
        for queue in queues {
            match unsafe { self.ctx.device.queue_wait_idle(queue) } {
                Ok(()) => {}
                Err(vk::Result::ERROR_DEVICE_LOST) => return Ok(WaitStatus::DeviceLost),
                Err(e) => return Err(gfx_err!(LOG_SOURCE, "Failed to wait for queue idle: {:?}", e)),
            }
        }
        Ok(WaitStatus::Signaled)
    }

    fn wait_idle(&mut self) -> Result<()> {
        match unsafe { self.ctx.device.device_wait_idle() } {
            Ok(()) => Ok(()),
            Err(vk::Result::ERROR_DEVICE_LOST) => {
                gfx_warn!(LOG_SOURCE, "Device lost while waiting for idle");
                Ok(())
            }
            Err(e) => Err(gfx_err!(LOG_SOURCE, "Failed to wait for device idle: {:?}", e)),
        }
    }

    // ===== OBJECT CREATION =====

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<VulkanRenderPass> {
        VulkanRenderPass::new(Arc::clone(&self.ctx), desc)
    }

    fn create_framebuffer(
        &self,
        render_pass: &VulkanRenderPass,
        source: FramebufferSource<'_, Arc<VulkanImage>>,
        extent: Extent2D,
    ) -> Result<VulkanFramebuffer> {
        let (views, images) = match source {
            FramebufferSource::Swapchain { image_index } => {
                let swapchain = Self::require(&self.swapchain, "Swapchain")?;
                let view = swapchain
                    .view(image_index)
                    .ok_or_else(|| Error::InvalidResource(format!("No swapchain image {}", image_index)))?;
                let mut views = vec![view];
                let mut images = Vec::new();
                if render_pass.has_depth_stencil() {
                    let depth = Self::require(&self.depth_attachment, "Depth attachment")?;
                    views.push(depth.view());
                    images.push(Arc::clone(depth));
                }
                (views, images)
            }
            FramebufferSource::Offscreen { color, depth_stencil } => {
                let mut views = vec![color.view()];
                let mut images = vec![Arc::clone(color)];
                if let Some(depth) = depth_stencil {
                    views.push(depth.view());
                    images.push(Arc::clone(depth));
                }
                (views, images)
            }
        };
        VulkanFramebuffer::new(Arc::clone(&self.ctx), render_pass, &views, images, extent)
    }

    fn create_depth_stencil_state(&self, key: &DepthStencilKey) -> Result<VulkanDepthStencilState> {
        Ok(VulkanDepthStencilState::new(key))
    }

    fn create_pipeline(&self, desc: &PipelineDesc<'_, Self>) -> Result<VulkanPipeline> {
        VulkanPipeline::new(Arc::clone(&self.ctx), desc)
    }

    fn create_sampler(&self, key: &SamplerKey) -> Result<VulkanSampler> {
        VulkanSampler::new(Arc::clone(&self.ctx), key)
    }

    fn create_host_buffer(&self, size: u64) -> Result<VulkanHostBuffer> {
        VulkanHostBuffer::new(Arc::clone(&self.ctx), size, self.limits.non_coherent_atom_size)
    }

    fn staging_alignment(&self) -> u64 {
        self.limits
            .non_coherent_atom_size
            .max(self.limits.optimal_buffer_copy_offset_alignment)
            .max(16)
    }

    // ===== RECORDING =====

    fn begin_render_pass(
        &mut self,
        render_pass: &VulkanRenderPass,
        framebuffer: &VulkanFramebuffer,
        extent: Extent2D,
        clear_color: Color,
    ) {
        let Some(command_buffer) = self.rendering_command_buffer() else { return };
        let clear_values = [clear_color_to_vk(clear_color), clear_depth_stencil_to_vk()];
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass.handle())
            .framebuffer(framebuffer.handle())
            .render_area(vk::Rect2D { offset: vk::Offset2D { x: 0, y: 0 }, extent: extent_to_vk(extent) })
            .clear_values(&clear_values);
        unsafe {
            self.ctx
                .device
                .cmd_begin_render_pass(command_buffer, &begin_info, vk::SubpassContents::INLINE);
        }
        self.pass_has_depth_stencil = render_pass.has_depth_stencil();
    }

    fn end_render_pass(&mut self) {
        let Some(command_buffer) = self.rendering_command_buffer() else { return };
        unsafe { self.ctx.device.cmd_end_render_pass(command_buffer) };
        self.pass_has_depth_stencil = false;
    }

    fn post_render_barrier(&mut self, color: &Arc<VulkanImage>) {
        let Some(command_buffer) = self.rendering_command_buffer() else { return };
        let barrier = layout_barrier(
            color.image(),
            color.format(),
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            OFFSCREEN_COLOR_LAYOUT,
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            vk::AccessFlags::SHADER_READ,
        );
        unsafe {
            self.ctx.device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                std::slice::from_ref(&barrier),
            );
        }
    }

    fn clear_attachments(&mut self, bits: ClearBits, color: Color, extent: Extent2D) {
        let Some(command_buffer) = self.rendering_command_buffer() else { return };

        let mut attachments = Vec::with_capacity(2);
        if bits.contains(ClearBits::COLOR) {
            attachments.push(vk::ClearAttachment {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                color_attachment: 0,
                clear_value: clear_color_to_vk(color),
            });
        }
        let aspect = depth_stencil_aspect(bits);
        if !aspect.is_empty() && self.pass_has_depth_stencil {
            attachments.push(vk::ClearAttachment {
                aspect_mask: aspect,
                color_attachment: 0,
                clear_value: clear_depth_stencil_to_vk(),
            });
        }
        if attachments.is_empty() {
            return;
        }

        let rect = vk::ClearRect {
            rect: vk::Rect2D { offset: vk::Offset2D { x: 0, y: 0 }, extent: extent_to_vk(extent) },
            base_array_layer: 0,
            layer_count: 1,
        };
        unsafe {
            self.ctx
                .device
                .cmd_clear_attachments(command_buffer, &attachments, std::slice::from_ref(&rect));
        }
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        let Some(command_buffer) = self.rendering_command_buffer() else { return };
        let (vk_viewport, scissor) = viewport_to_vk(viewport);
        unsafe {
            self.ctx.device.cmd_set_viewport(command_buffer, 0, &[vk_viewport]);
            self.ctx.device.cmd_set_scissor(command_buffer, 0, &[scissor]);
        }
    }

    fn set_stencil_reference(&mut self, value: u32) {
        let Some(command_buffer) = self.rendering_command_buffer() else { return };
        unsafe {
            self.ctx
                .device
                .cmd_set_stencil_reference(command_buffer, vk::StencilFaceFlags::FRONT_AND_BACK, value);
        }
    }

    fn bind_pipeline(&mut self, pipeline: &VulkanPipeline) {
        let Some(command_buffer) = self.rendering_command_buffer() else { return };
        unsafe {
            self.ctx
                .device
                .cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline.handle());
        }
    }

    fn bind_params(&mut self, program: &VulkanProgram, params: &[ResolvedParam<Self>]) -> Result<()> {
        let Some(layout) = program.set_layout() else { return Ok(()) };
        let command_buffer = *Self::require(&self.command_buffers, "Command buffers")?;
        let descriptors = self
            .descriptors
            .as_mut()
            .ok_or_else(|| Error::InvalidState("Descriptor pools not created".to_string()))?;
        let set = descriptors.allocate(layout)?;

        let mut buffer_infos = Vec::new();
        let mut image_infos = Vec::new();
        // (binding, descriptor type, is image, index into the info vectors)
        let mut entries = Vec::with_capacity(params.len());
        let mut dynamic_offsets: Vec<(u32, u32)> = Vec::new();

        for param in params {
            let binding = match param {
                ResolvedParam::UniformBuffer { binding, .. }
                | ResolvedParam::DynamicUniformBuffer { binding, .. }
                | ResolvedParam::Texture { binding, .. } => *binding,
            };
            let Some(declared) = program.binding(binding) else {
                gfx_debug!(LOG_SOURCE, "Program has no binding {}, parameter ignored", binding);
                continue;
            };

            match param {
                ResolvedParam::UniformBuffer { buffer, offset, range, .. } => {
                    buffer_infos.push(vk::DescriptorBufferInfo { buffer: *buffer, offset: *offset, range: *range });
                    entries.push((binding, declared.descriptor_type, false, buffer_infos.len() - 1));
                    if declared.is_dynamic() {
                        dynamic_offsets.push((binding, 0));
                    }
                }
                ResolvedParam::DynamicUniformBuffer { buffer, range, dynamic_offset, .. } => {
                    let offset = if declared.is_dynamic() { 0 } else { u64::from(*dynamic_offset) };
                    buffer_infos.push(vk::DescriptorBufferInfo { buffer: *buffer, offset, range: *range });
                    entries.push((binding, declared.descriptor_type, false, buffer_infos.len() - 1));
                    if declared.is_dynamic() {
                        dynamic_offsets.push((binding, *dynamic_offset));
                    }
                }
                ResolvedParam::Texture { texture, sampler, .. } => {
                    image_infos.push(vk::DescriptorImageInfo {
                        sampler: sampler.handle(),
                        image_view: *texture,
                        image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                    });
                    entries.push((binding, declared.descriptor_type, true, image_infos.len() - 1));
                }
            }
        }

        let writes: Vec<vk::WriteDescriptorSet> = entries
            .iter()
            .map(|&(binding, descriptor_type, is_image, index)| {
                let write = vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(binding)
                    .descriptor_type(descriptor_type);
                if is_image {
                    write.image_info(std::slice::from_ref(&image_infos[index]))
                } else {
                    write.buffer_info(std::slice::from_ref(&buffer_infos[index]))
                }
            })
            .collect();

        // Dynamic offsets are consumed in binding order
        dynamic_offsets.sort_by_key(|&(binding, _)| binding);
        let offsets: Vec<u32> = dynamic_offsets.into_iter().map(|(_, offset)| offset).collect();

        unsafe {
            self.ctx.device.update_descriptor_sets(&writes, &[]);
            self.ctx.device.cmd_bind_descriptor_sets(
                command_buffer.rendering,
                vk::PipelineBindPoint::GRAPHICS,
                program.pipeline_layout(),
                0,
                &[set],
                &offsets,
            );
        }
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &VulkanBuffer) {
        let Some(command_buffer) = self.rendering_command_buffer() else { return };
        unsafe {
            self.ctx
                .device
                .cmd_bind_vertex_buffers(command_buffer, 0, &[buffer.handle()], &[0]);
        }
    }

    fn bind_index_buffer(&mut self, buffer: &VulkanBuffer, index_type: IndexType) {
        let Some(command_buffer) = self.rendering_command_buffer() else { return };
        unsafe {
            self.ctx
                .device
                .cmd_bind_index_buffer(command_buffer, buffer.handle(), 0, index_type_to_vk(index_type));
        }
    }

    fn draw_indexed(&mut self, index_count: u32) {
        let Some(command_buffer) = self.rendering_command_buffer() else { return };
        unsafe {
            self.ctx.device.cmd_draw_indexed(command_buffer, index_count, 1, 0, 0, 0);
        }
    }

    fn push_debug_label(&mut self, label: &str) {
        let recorded = match (&self.ctx.debug_utils, self.rendering_command_buffer()) {
            (Some(debug_utils), Some(command_buffer)) if !label.is_empty() => match CString::new(label) {
                Ok(name) => {
                    let label_info = vk::DebugUtilsLabelEXT::default().label_name(&name);
                    unsafe { debug_utils.cmd_begin_debug_utils_label(command_buffer, &label_info) };
                    true
                }
                Err(_) => false,
            },
            _ => false,
        };
        self.debug_labels.push(recorded);
    }

    fn pop_debug_label(&mut self) {
        if self.debug_labels.pop() != Some(true) {
            return;
        }
        if let (Some(debug_utils), Some(command_buffer)) = (&self.ctx.debug_utils, self.rendering_command_buffer()) {
            unsafe { debug_utils.cmd_end_debug_utils_label(command_buffer) };
        }
    }
}
