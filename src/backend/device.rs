// Vulkan Device - logical GPU interface
//
// Responsibilities:
// - Logical device creation from a negotiated DeviceSpec
// - Graphics + presentation queue retrieval (possibly the same queue)
// - Memory allocator setup for render-target textures

use super::guard::Guard;
use super::instance::Instance;
use super::negotiate;
use super::physical_device::{DeviceSpec, PhysicalDeviceInfo};
use crate::error::Result;
use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use parking_lot::Mutex;

/// Logical device wrapper; destroyed explicitly before its instance
pub struct Device {
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub name: String,

    // Queue handles
    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,
    pub present_queue: vk::Queue,
    pub present_queue_family: u32,

    allocator: Option<Mutex<Allocator>>,
}

impl Device {
    pub fn new(instance: &Instance, selected: &PhysicalDeviceInfo, spec: &DeviceSpec) -> Result<Self> {
        let physical_device = selected.handle;

        let device = Guard::new(
            Self::create_logical_device(&instance.instance, physical_device, spec)?,
            |device: ash::Device| unsafe { device.destroy_device(None) },
        );

        let graphics_queue = unsafe { device.get_device_queue(spec.graphics_queue_family, 0) };
        let present_queue = unsafe { device.get_device_queue(spec.present_queue_family, 0) };

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.instance.clone(),
            device: (*device).clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })?;

        let properties = unsafe { instance.instance.get_physical_device_properties(physical_device) };

        log::info!("Selected GPU: {}", selected.name);
        log::info!(
            "API Version: {}.{}.{}",
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            vk::api_version_patch(properties.api_version)
        );
        if spec.shares_queue_family() {
            log::debug!("Graphics and present share queue family {}", spec.graphics_queue_family);
        } else {
            log::debug!(
                "Graphics queue family {}, present queue family {}",
                spec.graphics_queue_family,
                spec.present_queue_family
            );
        }

        Ok(Self {
            device: device.into_inner(),
            physical_device,
            name: selected.name.clone(),
            graphics_queue,
            graphics_queue_family: spec.graphics_queue_family,
            present_queue,
            present_queue_family: spec.present_queue_family,
            allocator: Some(Mutex::new(allocator)),
        })
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        spec: &DeviceSpec,
    ) -> Result<ash::Device> {
        let queue_priorities = [1.0];
        let mut queue_create_infos = vec![vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(spec.graphics_queue_family)
            .queue_priorities(&queue_priorities)
            .build()];
        if !spec.shares_queue_family() {
            queue_create_infos.push(
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(spec.present_queue_family)
                    .queue_priorities(&queue_priorities)
                    .build(),
            );
        }

        let extension_ptrs = negotiate::as_ptrs(&spec.extensions);

        let features = vk::PhysicalDeviceFeatures::builder()
            .sampler_anisotropy(spec.features.sampler_anisotropy)
            .fill_mode_non_solid(spec.features.fill_mode_non_solid)
            .build();
        let mut features13 = vk::PhysicalDeviceVulkan13Features::builder()
            .dynamic_rendering(true);

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_ptrs)
            .enabled_features(&features)
            .push_next(&mut features13);

        let device = unsafe { instance.create_device(physical_device, &create_info, None) }?;
        Ok(device)
    }

    pub fn allocator(&self) -> &Mutex<Allocator> {
        match &self.allocator {
            Some(allocator) => allocator,
            None => unreachable!("allocator used after device teardown"),
        }
    }

    /// Wait for both queues to drain
    pub fn wait_queues_idle(&self) -> Result<()> {
        unsafe {
            self.device.queue_wait_idle(self.graphics_queue)?;
            if self.present_queue != self.graphics_queue {
                self.device.queue_wait_idle(self.present_queue)?;
            }
        }
        Ok(())
    }

    /// Wait for the whole device to be idle (e.g., before swapchain recreation)
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }?;
        Ok(())
    }

    /// Destroy the allocator, then the logical device.
    ///
    /// Swapchain and textures must already be released.
    pub fn destroy(mut self) {
        log::info!("Destroying Vulkan device...");
        // The allocator frees its memory blocks through the device
        self.allocator = None;
        unsafe { self.device.destroy_device(None) };
    }
}
