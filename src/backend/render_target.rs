// Render target - the attachments of one dynamic rendering pass

use super::frame::VulkanFrameState;
use super::texture::Texture;
use ash::vk;

pub struct ColorAttachment<'a> {
    pub texture: &'a Texture,
    pub clear: [f32; 4],
}

pub struct DepthAttachment<'a> {
    pub texture: &'a Texture,
    pub depth: f32,
    pub stencil: u32,
}

/// Borrowed view over the textures a pass draws into
pub struct RenderTarget<'a> {
    colors: Vec<ColorAttachment<'a>>,
    depth: Option<DepthAttachment<'a>>,
    extent: vk::Extent2D,
}

impl<'a> RenderTarget<'a> {
    pub fn new(color: &'a Texture, clear: [f32; 4]) -> Self {
        Self {
            extent: color.extent,
            colors: vec![ColorAttachment { texture: color, clear }],
            depth: None,
        }
    }

    pub fn with_color(mut self, texture: &'a Texture, clear: [f32; 4]) -> Self {
        self.colors.push(ColorAttachment { texture, clear });
        self
    }

    pub fn with_depth(mut self, texture: &'a Texture, depth: f32, stencil: u32) -> Self {
        self.depth = Some(DepthAttachment { texture, depth, stencil });
        self
    }

    /// The frame's color image, plus its depth texture cleared to 1.0
    pub fn for_frame(frame: &'a VulkanFrameState, clear_color: [f32; 4]) -> Self {
        let target = Self::new(&frame.color, clear_color);
        match &frame.depth {
            Some(depth) => target.with_depth(depth, 1.0, 0),
            None => target,
        }
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn color_infos(&self) -> Vec<vk::RenderingAttachmentInfo> {
        self.colors
            .iter()
            .map(|attachment| {
                vk::RenderingAttachmentInfo::builder()
                    .image_view(attachment.texture.view)
                    .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                    .load_op(vk::AttachmentLoadOp::CLEAR)
                    .store_op(vk::AttachmentStoreOp::STORE)
                    .clear_value(vk::ClearValue {
                        color: vk::ClearColorValue {
                            float32: attachment.clear,
                        },
                    })
                    .build()
            })
            .collect()
    }

    /// Depth is not read after the pass, so it is never stored
    pub fn depth_info(&self) -> Option<vk::RenderingAttachmentInfo> {
        self.depth.as_ref().map(|attachment| {
            vk::RenderingAttachmentInfo::builder()
                .image_view(attachment.texture.view)
                .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .clear_value(vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue {
                        depth: attachment.depth,
                        stencil: attachment.stencil,
                    },
                })
                .build()
        })
    }

    fn has_stencil(&self) -> bool {
        self.depth
            .as_ref()
            .is_some_and(|d| d.texture.aspect.contains(vk::ImageAspectFlags::STENCIL))
    }

    /// Begin a dynamic rendering pass over all attachments
    pub fn begin(&self, device: &ash::Device, cmd: vk::CommandBuffer) {
        debug_assert!(self
            .colors
            .iter()
            .all(|c| c.texture.layout() == vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL));
        debug_assert!(self
            .depth
            .as_ref()
            .map_or(true, |d| d.texture.layout() == vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL));

        let color_infos = self.color_infos();
        let depth_info = self.depth_info();

        let mut rendering_info = vk::RenderingInfo::builder()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.extent,
            })
            .layer_count(1)
            .color_attachments(&color_infos);
        if let Some(depth_info) = depth_info.as_ref() {
            rendering_info = rendering_info.depth_attachment(depth_info);
            if self.has_stencil() {
                rendering_info = rendering_info.stencil_attachment(depth_info);
            }
        }

        unsafe { device.cmd_begin_rendering(cmd, &rendering_info) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::barrier::tests::texture;

    #[test]
    fn color_attachments_clear_and_store() {
        let color = texture(vk::ImageAspectFlags::COLOR);
        let target = RenderTarget::new(&color, [0.1, 0.2, 0.3, 1.0]);

        let infos = target.color_infos();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(infos[0].store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(infos[0].image_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(unsafe { infos[0].clear_value.color.float32 }, [0.1, 0.2, 0.3, 1.0]);
        assert!(target.depth_info().is_none());
        assert_eq!(target.extent(), color.extent);
    }

    #[test]
    fn depth_attachment_is_cleared_and_discarded() {
        let color = texture(vk::ImageAspectFlags::COLOR);
        let depth = texture(vk::ImageAspectFlags::DEPTH);
        let target = RenderTarget::new(&color, [0.0; 4]).with_depth(&depth, 1.0, 0);

        let info = target.depth_info().unwrap();
        assert_eq!(info.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(info.store_op, vk::AttachmentStoreOp::DONT_CARE);
        assert_eq!(unsafe { info.clear_value.depth_stencil.depth }, 1.0);
        assert!(!target.has_stencil());
    }

    #[test]
    fn stencil_formats_bind_stencil_too() {
        let color = texture(vk::ImageAspectFlags::COLOR);
        let depth = texture(vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL);
        let target = RenderTarget::new(&color, [0.0; 4]).with_depth(&depth, 1.0, 0);
        assert!(target.has_stencil());
    }

    #[test]
    fn extra_color_attachments_keep_their_clear_values() {
        let first = texture(vk::ImageAspectFlags::COLOR);
        let second = texture(vk::ImageAspectFlags::COLOR);
        let target = RenderTarget::new(&first, [0.0; 4]).with_color(&second, [1.0; 4]);

        let infos = target.color_infos();
        assert_eq!(infos.len(), 2);
        assert_eq!(unsafe { infos[1].clear_value.color.float32 }, [1.0; 4]);
    }
}
