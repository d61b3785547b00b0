// Presentation surface bound to a platform window

use super::instance::Instance;
use crate::error::{Result, RhiError};
use crate::rhi::WindowHandle;
use ash::vk;

pub struct Surface {
    pub loader: ash::extensions::khr::Surface,
    pub surface: vk::SurfaceKHR,
}

impl Surface {
    /// Create a surface for `window`. Failure here aborts renderer construction.
    pub fn new(instance: &Instance, window: &WindowHandle) -> Result<Self> {
        let surface = unsafe {
            ash_window::create_surface(
                &instance.entry,
                &instance.instance,
                window.display,
                window.window,
                None,
            )
        }
        .map_err(RhiError::SurfaceCreation)?;

        let loader = ash::extensions::khr::Surface::new(&instance.entry, &instance.instance);
        log::debug!("Created presentation surface {:?}", surface);

        Ok(Self { loader, surface })
    }

    pub fn capabilities(&self, physical_device: vk::PhysicalDevice) -> Result<vk::SurfaceCapabilitiesKHR> {
        let caps = unsafe {
            self.loader
                .get_physical_device_surface_capabilities(physical_device, self.surface)
        }?;
        Ok(caps)
    }

    pub fn formats(&self, physical_device: vk::PhysicalDevice) -> Result<Vec<vk::SurfaceFormatKHR>> {
        let formats = unsafe {
            self.loader
                .get_physical_device_surface_formats(physical_device, self.surface)
        }?;
        Ok(formats)
    }

    pub fn present_modes(&self, physical_device: vk::PhysicalDevice) -> Result<Vec<vk::PresentModeKHR>> {
        let modes = unsafe {
            self.loader
                .get_physical_device_surface_present_modes(physical_device, self.surface)
        }?;
        Ok(modes)
    }

    /// Must run after the swapchain is gone and before the instance is destroyed
    pub fn destroy(self) {
        unsafe { self.loader.destroy_surface(self.surface, None) };
    }
}
