// Per-frame and per-draw state of the Vulkan backend
//
// VulkanFrameState carries everything one frame touches between `prepare`
// and `present`. VulkanGraphicsState describes one indexed draw. Both cross
// the backend-agnostic Renderer contract as trait objects and are downcast
// back here.

use super::barrier::{self, BarrierRecorder, LayoutTransition};
use super::texture::Texture;
use crate::error::{Result, RhiError};
use crate::rhi::{Backend, CullMode, FrameState, FrontFace, GraphicsState, PrimitiveTopology};
use ash::vk;
use std::any::Any;

pub struct VulkanFrameState {
    pub command_buffer: vk::CommandBuffer,
    /// Frame-in-flight slot whose sync objects this frame uses
    pub slot: usize,
    pub image_index: u32,
    pub extent: vk::Extent2D,
    pub color: Texture,
    pub depth: Option<Texture>,
    /// Inside cmd_begin_rendering / cmd_end_rendering
    pub rendering: bool,
}

impl VulkanFrameState {
    pub fn new(
        command_buffer: vk::CommandBuffer,
        slot: usize,
        image_index: u32,
        extent: vk::Extent2D,
        color: Texture,
        depth: Option<Texture>,
    ) -> Self {
        Self {
            command_buffer,
            slot,
            image_index,
            extent,
            color,
            depth,
            rendering: false,
        }
    }

    /// Hand the textures back to the swapchain
    pub fn into_textures(self) -> (u32, Texture, Option<Texture>) {
        (self.image_index, self.color, self.depth)
    }
}

impl FrameState for VulkanFrameState {
    fn backend(&self) -> Backend {
        Backend::Vulkan
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VertexBufferBinding {
    pub buffer: vk::Buffer,
    pub offset: vk::DeviceSize,
}

#[derive(Debug, Clone, Copy)]
pub struct IndexBufferBinding {
    pub buffer: vk::Buffer,
    pub offset: vk::DeviceSize,
    pub index_type: vk::IndexType,
    pub index_count: u32,
}

#[derive(Debug, Clone)]
pub struct PushConstants {
    pub stages: vk::ShaderStageFlags,
    pub offset: u32,
    pub data: Vec<u8>,
}

/// Everything needed for one indexed draw.
///
/// The pipeline must be built for dynamic rendering with viewport, scissor,
/// cull mode, front face and primitive topology as dynamic state. Buffers
/// are owned by the caller and only read while the frame is recorded.
#[derive(Debug, Clone)]
pub struct VulkanGraphicsState {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    pub vertex_buffers: Vec<VertexBufferBinding>,
    pub index_buffer: IndexBufferBinding,
    pub instance_count: u32,
    pub push_constants: Option<PushConstants>,
    pub topology: PrimitiveTopology,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
}

impl VulkanGraphicsState {
    pub fn new(pipeline: vk::Pipeline, layout: vk::PipelineLayout, index_buffer: IndexBufferBinding) -> Self {
        Self {
            pipeline,
            layout,
            vertex_buffers: Vec::new(),
            index_buffer,
            instance_count: 1,
            push_constants: None,
            topology: PrimitiveTopology::default(),
            cull_mode: CullMode::default(),
            front_face: FrontFace::default(),
        }
    }

    pub fn with_vertex_buffer(mut self, buffer: vk::Buffer, offset: vk::DeviceSize) -> Self {
        self.vertex_buffers.push(VertexBufferBinding { buffer, offset });
        self
    }

    pub fn with_push_constants(mut self, stages: vk::ShaderStageFlags, offset: u32, data: &[u8]) -> Self {
        self.push_constants = Some(PushConstants {
            stages,
            offset,
            data: data.to_vec(),
        });
        self
    }
}

impl GraphicsState for VulkanGraphicsState {
    fn backend(&self) -> Backend {
        Backend::Vulkan
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn downcast_frame_mut(frame: &mut dyn FrameState) -> Result<&mut VulkanFrameState> {
    frame
        .as_any_mut()
        .downcast_mut::<VulkanFrameState>()
        .ok_or(RhiError::BackendMismatch("FrameState"))
}

pub fn downcast_frame(frame: Box<dyn FrameState>) -> Result<Box<VulkanFrameState>> {
    frame
        .into_any()
        .downcast::<VulkanFrameState>()
        .map_err(|_| RhiError::BackendMismatch("FrameState"))
}

pub fn downcast_graphics(state: &dyn GraphicsState) -> Result<&VulkanGraphicsState> {
    state
        .as_any()
        .downcast_ref::<VulkanGraphicsState>()
        .ok_or(RhiError::BackendMismatch("GraphicsState"))
}

pub fn topology(topology: PrimitiveTopology) -> vk::PrimitiveTopology {
    match topology {
        PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
        PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopology::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
    }
}

pub fn cull_mode(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
        CullMode::FrontAndBack => vk::CullModeFlags::FRONT_AND_BACK,
    }
}

pub fn front_face(face: FrontFace) -> vk::FrontFace {
    match face {
        FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
        FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
    }
}

/// Bring the frame's attachments into their render layouts.
///
/// Fresh swapchain images come in as UNDEFINED, reused ones as PRESENT_SRC.
/// The depth texture is UNDEFINED only on first use after (re)creation.
pub fn begin_attachments<R: BarrierRecorder + ?Sized>(
    recorder: &mut R,
    color: &mut Texture,
    depth: Option<&mut Texture>,
) {
    let from = match color.layout() {
        vk::ImageLayout::UNDEFINED => vk::ImageLayout::UNDEFINED,
        _ => vk::ImageLayout::PRESENT_SRC_KHR,
    };
    barrier::transition(recorder, color, &LayoutTransition::to_color_attachment(from));

    if let Some(depth) = depth {
        let from = match depth.layout() {
            vk::ImageLayout::UNDEFINED => vk::ImageLayout::UNDEFINED,
            _ => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };
        barrier::transition(recorder, depth, &LayoutTransition::to_depth_attachment(from));
    }
}

/// Hand color to presentation and release depth with the mirrored scopes
pub fn end_attachments<R: BarrierRecorder + ?Sized>(
    recorder: &mut R,
    color: &mut Texture,
    depth: Option<&mut Texture>,
) {
    barrier::transition(recorder, color, &LayoutTransition::color_to_present());

    if let Some(depth) = depth {
        barrier::transition(recorder, depth, &LayoutTransition::depth_release());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::barrier::tests::{texture, RecordedBarriers};

    const UNDEFINED: vk::ImageLayout = vk::ImageLayout::UNDEFINED;
    const COLOR: vk::ImageLayout = vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL;
    const PRESENT: vk::ImageLayout = vk::ImageLayout::PRESENT_SRC_KHR;
    const DEPTH: vk::ImageLayout = vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL;

    fn frame() -> VulkanFrameState {
        VulkanFrameState::new(
            vk::CommandBuffer::null(),
            0,
            0,
            vk::Extent2D { width: 8, height: 8 },
            texture(vk::ImageAspectFlags::COLOR),
            Some(texture(vk::ImageAspectFlags::DEPTH)),
        )
    }

    struct OtherFrame;

    impl FrameState for OtherFrame {
        fn backend(&self) -> Backend {
            Backend::Mock
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
        fn into_any(self: Box<Self>) -> Box<dyn Any> {
            self
        }
    }

    struct OtherState;

    impl GraphicsState for OtherState {
        fn backend(&self) -> Backend {
            Backend::WebGpu
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn empty_frames_cycle_color_and_depth() {
        let mut recorder = RecordedBarriers::default();
        let mut frame = frame();

        // Two prepare/present pairs with nothing rendered in between
        for _ in 0..2 {
            begin_attachments(&mut recorder, &mut frame.color, frame.depth.as_mut());
            end_attachments(&mut recorder, &mut frame.color, frame.depth.as_mut());
        }

        assert_eq!(
            recorder.layouts(),
            vec![
                (UNDEFINED, COLOR),
                (UNDEFINED, DEPTH),
                (COLOR, PRESENT),
                (DEPTH, DEPTH),
                (PRESENT, COLOR),
                (DEPTH, DEPTH),
                (COLOR, PRESENT),
                (DEPTH, DEPTH),
            ]
        );
        assert_eq!(frame.color.layout(), PRESENT);
        assert_eq!(frame.depth.as_ref().map(Texture::layout), Some(DEPTH));
    }

    #[test]
    fn depth_release_reverses_depth_acquire_scopes() {
        let mut recorder = RecordedBarriers::default();
        let mut frame = frame();
        begin_attachments(&mut recorder, &mut frame.color, frame.depth.as_mut());
        end_attachments(&mut recorder, &mut frame.color, frame.depth.as_mut());
        begin_attachments(&mut recorder, &mut frame.color, frame.depth.as_mut());

        let (release_src, release_dst, release) = recorder.barriers[3];
        let (acquire_src, acquire_dst, acquire) = recorder.barriers[5];
        assert_eq!((release_src, release_dst), (acquire_dst, acquire_src));
        assert_eq!(release.src_access_mask, acquire.dst_access_mask);
        assert_eq!(release.dst_access_mask, acquire.src_access_mask);
    }

    #[test]
    fn color_only_frames_skip_depth() {
        let mut recorder = RecordedBarriers::default();
        let mut color = texture(vk::ImageAspectFlags::COLOR);
        begin_attachments(&mut recorder, &mut color, None);
        end_attachments(&mut recorder, &mut color, None);
        assert_eq!(recorder.layouts(), vec![(UNDEFINED, COLOR), (COLOR, PRESENT)]);
    }

    #[test]
    #[should_panic(expected = "layout transition expects")]
    fn ending_an_unstarted_frame_fails_fast() {
        let mut recorder = RecordedBarriers::default();
        let mut frame = frame();
        end_attachments(&mut recorder, &mut frame.color, frame.depth.as_mut());
    }

    #[test]
    fn frames_from_other_backends_are_rejected() {
        let mut other = OtherFrame;
        assert!(matches!(
            downcast_frame_mut(&mut other),
            Err(RhiError::BackendMismatch("FrameState"))
        ));
        assert!(matches!(
            downcast_frame(Box::new(OtherFrame)),
            Err(RhiError::BackendMismatch("FrameState"))
        ));
        assert!(matches!(
            downcast_graphics(&OtherState),
            Err(RhiError::BackendMismatch("GraphicsState"))
        ));
    }

    #[test]
    fn vulkan_frames_round_trip_through_the_contract() {
        let boxed: Box<dyn FrameState> = Box::new(frame());
        assert_eq!(boxed.backend(), Backend::Vulkan);
        let frame = downcast_frame(boxed).unwrap();
        let (image_index, color, depth) = frame.into_textures();
        assert_eq!(image_index, 0);
        assert!(!color.is_depth());
        assert!(depth.is_some_and(|d| d.is_depth()));
    }

    #[test]
    fn graphics_state_defaults() {
        let state = VulkanGraphicsState::new(
            vk::Pipeline::null(),
            vk::PipelineLayout::null(),
            IndexBufferBinding {
                buffer: vk::Buffer::null(),
                offset: 0,
                index_type: vk::IndexType::UINT16,
                index_count: 3,
            },
        )
        .with_push_constants(vk::ShaderStageFlags::VERTEX, 0, &[1, 2, 3, 4]);

        assert_eq!(downcast_graphics(&state).unwrap().instance_count, 1);
        assert_eq!(topology(state.topology), vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(cull_mode(state.cull_mode), vk::CullModeFlags::BACK);
        assert_eq!(front_face(state.front_face), vk::FrontFace::COUNTER_CLOCKWISE);
        assert_eq!(state.push_constants.map(|p| p.data.len()), Some(4));
    }
}
