// Textures used as render attachments
//
// A Texture's `layout` is the single source of truth for what the image may
// currently be used for. Only the barrier engine changes it.

use super::device::Device;
use crate::error::Result;
use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;

/// Depth formats tried in order when the swapchain wants a depth attachment
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

#[derive(Debug)]
pub struct Texture {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub aspect: vk::ImageAspectFlags,
    layout: vk::ImageLayout,
    /// None for images owned by the swapchain
    allocation: Option<Allocation>,
}

impl Texture {
    /// Wrap an image we do not own memory for (swapchain images)
    pub fn from_image(
        image: vk::Image,
        view: vk::ImageView,
        format: vk::Format,
        extent: vk::Extent2D,
        aspect: vk::ImageAspectFlags,
    ) -> Self {
        Self {
            image,
            view,
            format,
            extent,
            aspect,
            layout: vk::ImageLayout::UNDEFINED,
            allocation: None,
        }
    }

    pub fn layout(&self) -> vk::ImageLayout {
        self.layout
    }

    pub(in crate::backend) fn set_layout(&mut self, layout: vk::ImageLayout) {
        self.layout = layout;
    }

    /// Whole image: all mip levels, first array layer
    pub fn subresource_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: self.aspect,
            base_mip_level: 0,
            level_count: vk::REMAINING_MIP_LEVELS,
            base_array_layer: 0,
            layer_count: 1,
        }
    }

    pub fn is_depth(&self) -> bool {
        self.aspect.contains(vk::ImageAspectFlags::DEPTH)
    }

    /// Create a device-local depth/stencil attachment
    pub fn create_depth(device: &Device, format: vk::Format, extent: vk::Extent2D) -> Result<Self> {
        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .samples(vk::SampleCountFlags::TYPE_1)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let image = unsafe { device.device.create_image(&image_info, None) }?;

        let requirements = unsafe { device.device.get_image_memory_requirements(image) };
        let allocation = device.allocator().lock().allocate(&AllocationCreateDesc {
            name: "depth attachment",
            requirements,
            location: MemoryLocation::GpuOnly,
            linear: false,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.device.destroy_image(image, None) };
                return Err(e.into());
            }
        };

        let aspect = depth_aspect(format);
        let bound = unsafe {
            device
                .device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
        }
        .and_then(|_| {
            let view_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: aspect,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            unsafe { device.device.create_image_view(&view_info, None) }
        });

        let view = match bound {
            Ok(view) => view,
            Err(e) => {
                let _ = device.allocator().lock().free(allocation);
                unsafe { device.device.destroy_image(image, None) };
                return Err(e.into());
            }
        };

        log::debug!(
            "Created {:?} depth attachment {}x{}",
            format,
            extent.width,
            extent.height
        );

        Ok(Self {
            image,
            view,
            format,
            extent,
            aspect,
            layout: vk::ImageLayout::UNDEFINED,
            allocation: Some(allocation),
        })
    }

    /// Release the view, and the image plus its memory when we own them
    pub fn destroy(mut self, device: &Device) {
        unsafe { device.device.destroy_image_view(self.view, None) };

        if let Some(allocation) = self.allocation.take() {
            if let Err(e) = device.allocator().lock().free(allocation) {
                log::warn!("Failed to free texture memory: {}", e);
            }
            unsafe { device.device.destroy_image(self.image, None) };
        }
    }
}

pub fn depth_aspect(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D16_UNORM_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        _ => vk::ImageAspectFlags::DEPTH,
    }
}

/// First candidate the GPU can use as an optimal-tiling depth attachment
pub fn find_depth_format(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Option<vk::Format> {
    DEPTH_FORMAT_CANDIDATES.into_iter().find(|&format| {
        let props = unsafe { instance.get_physical_device_format_properties(physical_device, format) };
        props
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color_texture() -> Texture {
        Texture::from_image(
            vk::Image::null(),
            vk::ImageView::null(),
            vk::Format::B8G8R8A8_SRGB,
            vk::Extent2D { width: 64, height: 64 },
            vk::ImageAspectFlags::COLOR,
        )
    }

    #[test]
    fn new_textures_start_undefined() {
        assert_eq!(color_texture().layout(), vk::ImageLayout::UNDEFINED);
    }

    #[test]
    fn subresource_covers_all_mips_of_first_layer() {
        let range = color_texture().subresource_range();
        assert_eq!(range.base_mip_level, 0);
        assert_eq!(range.level_count, vk::REMAINING_MIP_LEVELS);
        assert_eq!(range.base_array_layer, 0);
        assert_eq!(range.layer_count, 1);
        assert_eq!(range.aspect_mask, vk::ImageAspectFlags::COLOR);
    }

    #[test]
    fn stencil_formats_get_both_aspects() {
        assert_eq!(depth_aspect(vk::Format::D32_SFLOAT), vk::ImageAspectFlags::DEPTH);
        assert_eq!(
            depth_aspect(vk::Format::D24_UNORM_S8_UINT),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
    }
}
