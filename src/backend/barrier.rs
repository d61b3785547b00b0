// Resource barrier engine
//
// Every layout change goes through `transition`, which checks the texture's
// tracked layout against the transition's source layout, records one image
// memory barrier and then updates the tracked layout.

use super::texture::Texture;
use ash::vk;

/// One layout change plus the access/stage scopes that order it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutTransition {
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
}

impl LayoutTransition {
    /// The opposite transition with source and destination scopes swapped
    pub fn reversed(&self) -> Self {
        Self {
            old_layout: self.new_layout,
            new_layout: self.old_layout,
            src_access: self.dst_access,
            dst_access: self.src_access,
            src_stage: self.dst_stage,
            dst_stage: self.src_stage,
        }
    }

    /// Color image becomes a render target.
    ///
    /// No prior access to wait for. The source stage matches the stage the
    /// acquire semaphore is waited on, so the layout change happens after it.
    pub fn to_color_attachment(from: vk::ImageLayout) -> Self {
        Self {
            old_layout: from,
            new_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            src_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            dst_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        }
    }

    /// Rendered color image is handed to the presentation engine
    pub fn color_to_present() -> Self {
        Self {
            old_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            new_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            src_access: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            dst_access: vk::AccessFlags::empty(),
            src_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            dst_stage: vk::PipelineStageFlags::BOTTOM_OF_PIPE,
        }
    }

    pub fn to_depth_attachment(from: vk::ImageLayout) -> Self {
        Self {
            old_layout: from,
            new_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            src_access: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            dst_access: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            src_stage: vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
            dst_stage: vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
                | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
        }
    }

    /// End-of-frame depth barrier: layout kept, scopes reversed
    pub fn depth_release() -> Self {
        let acquire = Self::to_depth_attachment(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
        Self {
            src_access: acquire.dst_access,
            dst_access: acquire.src_access,
            src_stage: acquire.dst_stage,
            dst_stage: acquire.src_stage,
            ..acquire
        }
    }
}

/// Sink for image barriers; implemented over a command buffer
pub trait BarrierRecorder {
    fn image_barrier(
        &mut self,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        barrier: &vk::ImageMemoryBarrier,
    );
}

/// Records barriers into a command buffer in the recording state
pub struct CommandRecorder<'a> {
    pub device: &'a ash::Device,
    pub cmd: vk::CommandBuffer,
}

impl BarrierRecorder for CommandRecorder<'_> {
    fn image_barrier(
        &mut self,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        barrier: &vk::ImageMemoryBarrier,
    ) {
        unsafe {
            self.device.cmd_pipeline_barrier(
                self.cmd,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                std::slice::from_ref(barrier),
            );
        }
    }
}

/// Barrier for `texture` described by `t`. Queue ownership never moves.
pub fn image_barrier(texture: &Texture, t: &LayoutTransition) -> vk::ImageMemoryBarrier {
    vk::ImageMemoryBarrier::builder()
        .src_access_mask(t.src_access)
        .dst_access_mask(t.dst_access)
        .old_layout(t.old_layout)
        .new_layout(t.new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(texture.image)
        .subresource_range(texture.subresource_range())
        .build()
}

/// Issue `t` on `texture`.
///
/// # Panics
/// If the texture's tracked layout differs from `t.old_layout`. That means
/// the caller lost track of the image state, and recording the barrier would
/// corrupt the image.
pub fn transition<R: BarrierRecorder + ?Sized>(
    recorder: &mut R,
    texture: &mut Texture,
    t: &LayoutTransition,
) {
    assert_eq!(
        texture.layout(),
        t.old_layout,
        "layout transition expects {:?} but image {:?} is in {:?}",
        t.old_layout,
        texture.image,
        texture.layout()
    );

    let barrier = image_barrier(texture, t);
    recorder.image_barrier(t.src_stage, t.dst_stage, &barrier);
    texture.set_layout(t.new_layout);
}
