// Synchronization primitives
//
// Per frame in flight: a semaphore signalled when the acquired image is ready
// and a fence signalled when the frame's command buffer has finished.
// Per swapchain image: a semaphore the presentation engine waits on.

use crate::error::Result;
use ash::vk;

/// Frame synchronization - one per frame in flight
pub struct FrameSync {
    pub image_available: vk::Semaphore,
    pub in_flight_fence: vk::Fence,
    pub command_buffer: vk::CommandBuffer,
}

impl FrameSync {
    pub fn new(device: &ash::Device, command_buffer: vk::CommandBuffer) -> Result<Self> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED); // Start signaled

        let image_available = unsafe { device.create_semaphore(&semaphore_info, None) }?;
        let in_flight_fence = match unsafe { device.create_fence(&fence_info, None) } {
            Ok(fence) => fence,
            Err(e) => {
                unsafe { device.destroy_semaphore(image_available, None) };
                return Err(e.into());
            }
        };

        Ok(Self {
            image_available,
            in_flight_fence,
            command_buffer,
        })
    }

    /// Command buffers are freed with their pool, not here
    pub fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_semaphore(self.image_available, None);
            device.destroy_fence(self.in_flight_fence, None);
        }
    }
}

/// Signalled by the submit of the frame rendering into this image
pub fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    let semaphore_info = vk::SemaphoreCreateInfo::builder();
    Ok(unsafe { device.create_semaphore(&semaphore_info, None) }?)
}
