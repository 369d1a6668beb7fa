//! GpuContext - instance, device and allocator shared by every Vulkan object
//!
//! Each RAII wrapper (buffers, images, render passes, pipelines, samplers)
//! holds an `Arc<GpuContext>`, so the device outlives every object created
//! from it even when destruction is deferred to the sweeper thread. The
//! last reference tears down the allocator, the debug messenger, the device
//! and the instance, in that order.

use ash::vk;
use gfx_context::gfx::Result;
use gfx_context::gfx_err;
use gpu_allocator::vulkan::Allocator;
use std::mem::ManuallyDrop;
use std::sync::{Mutex, MutexGuard};

const LOG_SOURCE: &str = "gfx::vulkan";

pub struct GpuContext {
    pub(crate) instance: ash::Instance,
    pub(crate) device: ash::Device,
    pub(crate) physical_device: vk::PhysicalDevice,

    /// Dropped explicitly before the device is destroyed
    allocator: ManuallyDrop<Mutex<Allocator>>,

    pub(crate) graphics_queue: vk::Queue,
    pub(crate) graphics_queue_family: u32,
    pub(crate) present_queue: vk::Queue,

    /// Pool for one-shot commands outside the frame (layout transitions)
    upload_command_pool: Mutex<vk::CommandPool>,

    /// Device-level debug utils (labels), present when validation is enabled
    pub(crate) debug_utils: Option<ash::ext::debug_utils::Device>,

    debug_messenger: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,

    /// Keeps the Vulkan library loaded until the instance is gone
    _entry: ash::Entry,
}

impl GpuContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        entry: ash::Entry,
        instance: ash::Instance,
        device: ash::Device,
        physical_device: vk::PhysicalDevice,
        allocator: Allocator,
        graphics_queue: vk::Queue,
        graphics_queue_family: u32,
        present_queue: vk::Queue,
        upload_command_pool: vk::CommandPool,
        debug_messenger: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    ) -> Self {
        let debug_utils = debug_messenger
            .as_ref()
            .map(|_| ash::ext::debug_utils::Device::new(&instance, &device));

        Self {
            instance,
            device,
            physical_device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue,
            graphics_queue_family,
            present_queue,
            upload_command_pool: Mutex::new(upload_command_pool),
            debug_utils,
            debug_messenger,
            _entry: entry,
        }
    }

    /// Lock the allocator, recovering from a poisoned lock
    pub(crate) fn allocator(&self) -> MutexGuard<'_, Allocator> {
        self.allocator.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record commands into a transient command buffer, submit them on the
    /// graphics queue and wait for completion
    pub(crate) fn one_shot<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        let pool = self.upload_command_pool.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        unsafe {
            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(*pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let command_buffer = self
                .device
                .allocate_command_buffers(&alloc_info)
                .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to allocate one-shot command buffer: {:?}", e))?[0];

            let submitted = (|| {
                let begin_info = vk::CommandBufferBeginInfo::default()
                    .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
                self.device
                    .begin_command_buffer(command_buffer, &begin_info)
                    .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to begin one-shot command buffer: {:?}", e))?;

                record(&self.device, command_buffer);

                self.device
                    .end_command_buffer(command_buffer)
                    .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to end one-shot command buffer: {:?}", e))?;

                let submit_info = vk::SubmitInfo::default()
                    .command_buffers(std::slice::from_ref(&command_buffer));
                self.device
                    .queue_submit(self.graphics_queue, &[submit_info], vk::Fence::null())
                    .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to submit one-shot commands: {:?}", e))?;
                self.device
                    .queue_wait_idle(self.graphics_queue)
                    .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to wait for one-shot commands: {:?}", e))
            })();

            self.device.free_command_buffers(*pool, &[command_buffer]);
            submitted
        }
    }

    pub(crate) fn device_properties(&self) -> vk::PhysicalDeviceProperties {
        unsafe { self.instance.get_physical_device_properties(self.physical_device) }
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            let pool = self.upload_command_pool.get_mut().map(|pool| *pool).unwrap_or_else(|poisoned| *poisoned.into_inner());
            self.device.destroy_command_pool(pool, None);

            // Allocator frees its memory blocks through the device
            ManuallyDrop::drop(&mut self.allocator);

            if let Some((loader, messenger)) = self.debug_messenger.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }

            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}
