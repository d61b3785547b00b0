// Swapchain - Window presentation
//
// Manages the chain of images we render to and present to the screen, the
// per-slot synchronization that paces acquisition, and the state machine
// that keeps acquire -> submit -> present in order.

use super::device::Device;
use super::frame::VulkanFrameState;
use super::instance::Instance;
use super::surface::Surface;
use super::sync::{self, FrameSync};
use super::texture::Texture;
use crate::config::RendererConfig;
use crate::error::{Result, RhiError};
use ash::vk;

/// Lifecycle of the presentation chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainState {
    /// No usable images; the chain must be (re)built with `reset`
    Uninitialized,
    Ready,
    Acquiring,
    Acquired,
    Submitted,
    Presented,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainOp {
    BeginAcquire,
    FinishAcquire,
    AbortAcquire,
    Submit,
    Present,
    /// Drop an outstanding frame whose image will never be presented
    Discard,
    Invalidate,
    Rebuild,
}

impl SwapchainOp {
    fn name(self) -> &'static str {
        match self {
            Self::BeginAcquire | Self::FinishAcquire | Self::AbortAcquire => "acquire",
            Self::Submit => "submit",
            Self::Present => "present",
            Self::Discard => "discard",
            Self::Invalidate => "invalidate",
            Self::Rebuild => "reset",
        }
    }
}

impl SwapchainState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Ready => "ready",
            Self::Acquiring => "acquiring",
            Self::Acquired => "acquired",
            Self::Submitted => "submitted",
            Self::Presented => "presented",
        }
    }

    /// Next state after `op`, or why `op` is not allowed now
    pub fn advance(self, op: SwapchainOp) -> Result<Self> {
        use SwapchainOp as Op;
        use SwapchainState as S;

        match (self, op) {
            (S::Ready | S::Presented, Op::BeginAcquire) => Ok(S::Acquiring),
            // A chain without images behaves like an outdated one
            (S::Uninitialized, Op::BeginAcquire) => Err(RhiError::SurfaceOutOfDate),
            (S::Acquiring, Op::FinishAcquire) => Ok(S::Acquired),
            (S::Acquiring, Op::AbortAcquire) => Ok(S::Ready),
            (S::Acquired, Op::Submit) => Ok(S::Submitted),
            (S::Submitted, Op::Present) => Ok(S::Presented),
            (S::Acquiring | S::Acquired | S::Submitted, Op::Discard) => Ok(S::Uninitialized),
            // Tearing down the chain while a frame holds its textures would strand them
            (S::Uninitialized | S::Ready | S::Presented, Op::Invalidate) => Ok(S::Uninitialized),
            (S::Uninitialized, Op::Rebuild) => Ok(S::Ready),
            (state, op) => Err(RhiError::InvalidState {
                operation: op.name(),
                state: state.name(),
            }),
        }
    }
}

/// Swapchain sizing and format hints taken from the configuration
#[derive(Debug, Clone, Copy)]
pub struct SwapchainSettings {
    pub format: vk::Format,
    pub present_mode: vk::PresentModeKHR,
    pub image_count: Option<u32>,
    pub frames_in_flight: usize,
    pub depth_format: Option<vk::Format>,
}

impl SwapchainSettings {
    pub fn from_config(config: &RendererConfig, depth_format: Option<vk::Format>) -> Self {
        Self {
            format: config.surface_format(),
            present_mode: config.present_mode(),
            image_count: config.swapchain.image_count,
            frames_in_flight: config.frames_in_flight(),
            depth_format,
        }
    }
}

/// Prefer the requested format in sRGB non-linear color space, else the first one offered
pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
    preferred: vk::Format,
) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| f.format == preferred && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        .or_else(|| formats.first())
        .copied()
}

pub fn choose_present_mode(modes: &[vk::PresentModeKHR], preferred: vk::PresentModeKHR) -> vk::PresentModeKHR {
    if modes.contains(&preferred) {
        preferred
    } else {
        vk::PresentModeKHR::FIFO // FIFO is always supported
    }
}

/// Surface-defined extent, or the window size clamped to the surface limits
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, size: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: size
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: size
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// Requested image count (default: one more than the minimum) within surface limits
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR, requested: Option<u32>) -> u32 {
    let mut image_count = requested.unwrap_or(caps.min_image_count + 1).max(caps.min_image_count);
    if caps.max_image_count > 0 && image_count > caps.max_image_count {
        image_count = caps.max_image_count;
    }
    image_count
}

pub struct Swapchain {
    swapchain_loader: ash::extensions::khr::Swapchain,
    swapchain: vk::SwapchainKHR,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
    settings: SwapchainSettings,
    /// Window size used when the surface leaves the extent to us
    surface_size: vk::Extent2D,

    /// One slot per swapchain image; empty while a frame holds the texture
    textures: Vec<Option<Texture>>,
    depth: Option<Texture>,
    /// Waited on by presentation, one per swapchain image
    render_finished: Vec<vk::Semaphore>,

    command_pool: vk::CommandPool,
    command_buffers: Vec<vk::CommandBuffer>,
    frames: Vec<FrameSync>,
    current_frame: usize,

    state: SwapchainState,
}

impl Swapchain {
    pub fn new(
        instance: &Instance,
        device: &Device,
        surface: &Surface,
        settings: SwapchainSettings,
        surface_size: vk::Extent2D,
    ) -> Result<Self> {
        let swapchain_loader = ash::extensions::khr::Swapchain::new(&instance.instance, &device.device);

        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(device.graphics_queue_family)
            // TRANSIENT: Command buffers are short-lived
            // RESET: Allow individual buffer reset
            .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let command_pool = unsafe { device.device.create_command_pool(&pool_info, None) }?;

        let mut swapchain = Self {
            swapchain_loader,
            swapchain: vk::SwapchainKHR::null(),
            format: vk::SurfaceFormatKHR::default(),
            extent: surface_size,
            present_mode: vk::PresentModeKHR::FIFO,
            settings,
            surface_size,
            textures: Vec::new(),
            depth: None,
            render_finished: Vec::new(),
            command_pool,
            command_buffers: Vec::new(),
            frames: Vec::new(),
            current_frame: 0,
            state: SwapchainState::Uninitialized,
        };

        if let Err(e) = swapchain.allocate_command_buffers(device).and_then(|_| swapchain.build(device, surface)) {
            swapchain.destroy(device);
            return Err(e);
        }

        Ok(swapchain)
    }

    pub fn state(&self) -> SwapchainState {
        self.state
    }

    pub fn set_surface_size(&mut self, width: u32, height: u32) {
        self.surface_size = vk::Extent2D { width, height };
    }

    fn allocate_command_buffers(&mut self, device: &Device) -> Result<()> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(self.settings.frames_in_flight as u32);

        self.command_buffers = unsafe { device.device.allocate_command_buffers(&alloc_info) }?;
        Ok(())
    }

    /// Create the image chain, attachments and per-slot sync objects
    fn build(&mut self, device: &Device, surface: &Surface) -> Result<()> {
        let caps = surface.capabilities(device.physical_device)?;
        let formats = surface.formats(device.physical_device)?;
        let present_modes = surface.present_modes(device.physical_device)?;

        let extent = choose_extent(&caps, self.surface_size);
        if extent.width == 0 || extent.height == 0 {
            // Minimized window: stay uninitialized until the next reset
            log::debug!("Surface has zero extent, deferring swapchain creation");
            return Ok(());
        }

        let format = choose_surface_format(&formats, self.settings.format)
            .ok_or(RhiError::Vulkan(vk::Result::ERROR_FORMAT_NOT_SUPPORTED))?;
        let present_mode = choose_present_mode(&present_modes, self.settings.present_mode);
        let image_count = choose_image_count(&caps, self.settings.image_count);

        let composite_alpha = [
            vk::CompositeAlphaFlagsKHR::OPAQUE,
            vk::CompositeAlphaFlagsKHR::INHERIT,
            vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
            vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
        ]
        .into_iter()
        .find(|&alpha| caps.supported_composite_alpha.contains(alpha))
        .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE);

        log::info!(
            "Creating swapchain: {}x{}, {:?}, {:?}, {} image(s)",
            extent.width,
            extent.height,
            format.format,
            present_mode,
            image_count
        );

        // Separate queue families share the images instead of transferring ownership
        let queue_families = [device.graphics_queue_family, device.present_queue_family];
        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface.surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .pre_transform(caps.current_transform)
            .composite_alpha(composite_alpha)
            .present_mode(present_mode)
            .clipped(true);
        create_info = if device.graphics_queue_family != device.present_queue_family {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&queue_families)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        self.swapchain = unsafe { self.swapchain_loader.create_swapchain(&create_info, None) }?;
        self.format = format;
        self.extent = extent;
        self.present_mode = present_mode;

        let images = unsafe { self.swapchain_loader.get_swapchain_images(self.swapchain) }?;

        for &image in &images {
            let view_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format.format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            let view = unsafe { device.device.create_image_view(&view_info, None) }?;
            self.textures.push(Some(Texture::from_image(
                image,
                view,
                format.format,
                extent,
                vk::ImageAspectFlags::COLOR,
            )));
            self.render_finished.push(sync::create_semaphore(&device.device)?);
        }

        if let Some(depth_format) = self.settings.depth_format {
            self.depth = Some(Texture::create_depth(device, depth_format, extent)?);
        }

        for &command_buffer in &self.command_buffers {
            self.frames.push(FrameSync::new(&device.device, command_buffer)?);
        }
        self.current_frame = 0;

        log::info!("Created swapchain with {} images", images.len());
        self.state = self.state.advance(SwapchainOp::Rebuild)?;
        Ok(())
    }

    /// Destroy everything `build` created; safe on partially built chains
    fn teardown(&mut self, device: &Device) {
        for frame in self.frames.drain(..) {
            frame.destroy(&device.device);
        }
        for semaphore in self.render_finished.drain(..) {
            unsafe { device.device.destroy_semaphore(semaphore, None) };
        }
        if let Some(depth) = self.depth.take() {
            depth.destroy(device);
        }
        for texture in self.textures.drain(..).flatten() {
            texture.destroy(device);
        }
        if self.swapchain != vk::SwapchainKHR::null() {
            unsafe { self.swapchain_loader.destroy_swapchain(self.swapchain, None) };
            self.swapchain = vk::SwapchainKHR::null();
        }

        self.state = SwapchainState::Uninitialized;
    }

    /// Wait for a free slot and acquire the next presentable image
    pub fn acquire_next_texture(&mut self, device: &Device) -> Result<VulkanFrameState> {
        self.state = self.state.advance(SwapchainOp::BeginAcquire)?;

        let (slot, image_index) = match self.acquire_image(device) {
            Ok(acquired) => acquired,
            Err(e) => {
                self.state = self.state.advance(SwapchainOp::AbortAcquire)?;
                return Err(e);
            }
        };

        match self.take_frame(device, slot, image_index) {
            Ok(frame) => {
                self.state = self.state.advance(SwapchainOp::FinishAcquire)?;
                Ok(frame)
            }
            Err(e) => {
                // The image is ours and its semaphore is signalled with no waiter
                self.state = self.state.advance(SwapchainOp::Discard)?;
                Err(e)
            }
        }
    }

    /// Returns the frame slot and the index of the acquired image
    fn acquire_image(&mut self, device: &Device) -> Result<(usize, u32)> {
        let slot = self.current_frame;
        let sync = &self.frames[slot];

        // Wait for the frame that last used this slot
        unsafe {
            device
                .device
                .wait_for_fences(&[sync.in_flight_fence], true, u64::MAX)
        }?;

        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                sync.image_available,
                vk::Fence::null(),
            )
        };

        let image_index = match result {
            Ok((index, suboptimal)) => {
                if suboptimal {
                    log::debug!("Acquired image {} from a suboptimal swapchain", index);
                }
                index
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::warn!("Swapchain out of date during acquire");
                return Err(RhiError::SurfaceOutOfDate);
            }
            Err(e) => return Err(e.into()),
        };

        Ok((slot, image_index))
    }

    fn take_frame(&mut self, device: &Device, slot: usize, image_index: u32) -> Result<VulkanFrameState> {
        let sync = &self.frames[slot];
        unsafe {
            device
                .device
                .reset_command_buffer(sync.command_buffer, vk::CommandBufferResetFlags::empty())
        }?;

        let color = self
            .textures
            .get_mut(image_index as usize)
            .and_then(Option::take)
            .ok_or(RhiError::InvalidState {
                operation: "acquire",
                state: "image still held by another frame",
            })?;
        let depth = self.depth.take();

        Ok(VulkanFrameState::new(
            sync.command_buffer,
            slot,
            image_index,
            self.extent,
            color,
            depth,
        ))
    }

    /// Enqueue the frame's command buffer on the graphics queue
    pub fn submit(&mut self, device: &Device, frame: &VulkanFrameState) -> Result<()> {
        self.state = self.state.advance(SwapchainOp::Submit)?;
        let sync = &self.frames[frame.slot];

        let wait_semaphores = [sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [self.render_finished[frame.image_index as usize]];
        let command_buffers = [frame.command_buffer];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores) // Wait for image to be available
            .wait_dst_stage_mask(&wait_stages) // Which stage waits
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores); // Signal when done

        unsafe {
            // Only reset once work is guaranteed to be submitted, or the next wait never returns
            device.device.reset_fences(&[sync.in_flight_fence])?;
            device.device.queue_submit(
                device.graphics_queue,
                &[submit_info.build()],
                sync.in_flight_fence,
            )?;
        }

        Ok(())
    }

    /// Present the frame's image and take its textures back
    pub fn present(&mut self, device: &Device, frame: VulkanFrameState) -> Result<()> {
        let transition = self.state.advance(SwapchainOp::Present);

        let image_index = frame.image_index;
        let slot = frame.slot;
        self.restore(frame);
        self.state = transition?;

        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [self.render_finished[image_index as usize]];

        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe {
            self.swapchain_loader
                .queue_present(device.present_queue, &present_info)
        };

        self.current_frame = (slot + 1) % self.frames.len();

        match result {
            Ok(false) => Ok(()),
            Ok(true) => {
                log::warn!("Swapchain suboptimal after present");
                Err(RhiError::SurfaceSuboptimal)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::warn!("Swapchain out of date during present");
                Err(RhiError::SurfaceOutOfDate)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Give a frame's textures back to their slots
    fn restore(&mut self, frame: VulkanFrameState) {
        let (image_index, color, depth) = frame.into_textures();
        if let Some(slot) = self.textures.get_mut(image_index as usize) {
            *slot = Some(color);
        }
        if depth.is_some() {
            self.depth = depth;
        }
    }

    /// Take back a frame that will never be submitted.
    ///
    /// Its acquire semaphore stays signalled, so the chain is marked for
    /// rebuild and the next acquire reports it as out of date.
    pub fn abandon(&mut self, frame: VulkanFrameState) {
        log::warn!("Abandoning frame for image {}", frame.image_index);
        self.restore(frame);
        self.state = match self.state.advance(SwapchainOp::Discard) {
            Ok(state) => state,
            Err(e) => {
                log::warn!("{}", e);
                SwapchainState::Uninitialized
            }
        };
    }

    /// Tear down and rebuild the image chain in place (resize, surface invalidation).
    ///
    /// Rejected while a frame is outstanding: present or drop it first.
    pub fn reset(&mut self, device: &Device, surface: &Surface) -> Result<()> {
        let invalidated = self.state.advance(SwapchainOp::Invalidate)?;

        // Wait for GPU to finish all work before destroying resources
        device.wait_idle()?;

        self.state = invalidated;
        self.teardown(device);
        self.build(device, surface)
    }

    pub fn destroy(mut self, device: &Device) {
        self.teardown(device);
        unsafe {
            // Also frees the command buffers
            device.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SwapchainOp as Op;
    use SwapchainState as S;

    fn run(start: S, ops: &[Op]) -> Result<S> {
        ops.iter().try_fold(start, |state, &op| state.advance(op))
    }

    fn caps(min: u32, max: u32, current: vk::Extent2D) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: current,
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
            ..Default::default()
        }
    }

    const FRAME: [Op; 4] = [Op::BeginAcquire, Op::FinishAcquire, Op::Submit, Op::Present];

    #[test]
    fn full_frame_cycle_ends_presented() {
        assert_eq!(run(S::Ready, &FRAME).unwrap(), S::Presented);
        // Consecutive frames
        let two: Vec<Op> = FRAME.iter().chain(FRAME.iter()).copied().collect();
        assert_eq!(run(S::Ready, &two).unwrap(), S::Presented);
    }

    #[test]
    fn reset_after_a_cycle_returns_to_ready() {
        let state = run(S::Ready, &FRAME).unwrap();
        assert_eq!(run(state, &[Op::Invalidate, Op::Rebuild]).unwrap(), S::Ready);
        // And the next frame can start right away
        assert_eq!(run(S::Ready, &FRAME[..1]).unwrap(), S::Acquiring);
    }

    #[test]
    fn reset_is_rejected_while_a_frame_is_held() {
        for prefix in 1..FRAME.len() {
            let state = run(S::Ready, &FRAME[..prefix]).unwrap();
            assert!(matches!(
                state.advance(Op::Invalidate),
                Err(RhiError::InvalidState { operation: "invalidate", .. })
            ));
        }
    }

    #[test]
    fn reset_is_allowed_between_frames() {
        for state in [S::Uninitialized, S::Ready, S::Presented] {
            assert_eq!(run(state, &[Op::Invalidate, Op::Rebuild]).unwrap(), S::Ready);
        }
    }

    #[test]
    fn discarded_frames_force_a_rebuild() {
        for prefix in 1..FRAME.len() {
            let state = run(S::Ready, &FRAME[..prefix]).unwrap();
            let discarded = state.advance(Op::Discard).unwrap();
            assert_eq!(discarded, S::Uninitialized);
            assert!(matches!(discarded.advance(Op::BeginAcquire), Err(RhiError::SurfaceOutOfDate)));
            assert_eq!(run(discarded, &[Op::Invalidate, Op::Rebuild]).unwrap(), S::Ready);
        }
    }

    #[test]
    fn discard_needs_an_outstanding_frame() {
        assert!(S::Ready.advance(Op::Discard).is_err());
        assert!(S::Presented.advance(Op::Discard).is_err());
        assert!(S::Uninitialized.advance(Op::Discard).is_err());
    }

    #[test]
    fn out_of_order_operations_are_rejected() {
        assert!(matches!(
            S::Ready.advance(Op::Submit),
            Err(RhiError::InvalidState { operation: "submit", state: "ready" })
        ));
        assert!(S::Acquired.advance(Op::Present).is_err());
        assert!(S::Acquired.advance(Op::BeginAcquire).is_err());
        assert!(S::Submitted.advance(Op::BeginAcquire).is_err());
        assert!(S::Ready.advance(Op::Rebuild).is_err());
    }

    #[test]
    fn acquire_without_images_is_out_of_date() {
        let err = S::Uninitialized.advance(Op::BeginAcquire).unwrap_err();
        assert!(matches!(err, RhiError::SurfaceOutOfDate));
        assert!(err.is_recoverable());
    }

    #[test]
    fn failed_acquire_returns_to_ready() {
        assert_eq!(run(S::Presented, &[Op::BeginAcquire, Op::AbortAcquire]).unwrap(), S::Ready);
    }

    #[test]
    fn surface_format_prefers_requested_srgb() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        assert_eq!(
            choose_surface_format(&formats, vk::Format::B8G8R8A8_SRGB).unwrap().format,
            vk::Format::B8G8R8A8_SRGB
        );
        assert_eq!(
            choose_surface_format(&formats, vk::Format::R8G8B8A8_SRGB).unwrap().format,
            vk::Format::R8G8B8A8_UNORM
        );
        assert!(choose_surface_format(&[], vk::Format::B8G8R8A8_SRGB).is_none());
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            choose_present_mode(&modes, vk::PresentModeKHR::MAILBOX),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&modes, vk::PresentModeKHR::IMMEDIATE),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn extent_follows_surface_or_clamped_window() {
        let fixed = caps(2, 3, vk::Extent2D { width: 800, height: 600 });
        assert_eq!(
            choose_extent(&fixed, vk::Extent2D { width: 1, height: 1 }),
            vk::Extent2D { width: 800, height: 600 }
        );

        let free = caps(2, 3, vk::Extent2D { width: u32::MAX, height: u32::MAX });
        assert_eq!(
            choose_extent(&free, vk::Extent2D { width: 10_000, height: 720 }),
            vk::Extent2D { width: 4096, height: 720 }
        );
    }

    #[test]
    fn image_count_respects_limits() {
        let extent = vk::Extent2D { width: 1, height: 1 };
        assert_eq!(choose_image_count(&caps(2, 3, extent), None), 3);
        assert_eq!(choose_image_count(&caps(3, 3, extent), None), 3);
        assert_eq!(choose_image_count(&caps(2, 0, extent), None), 3);
        assert_eq!(choose_image_count(&caps(2, 0, extent), Some(5)), 5);
        assert_eq!(choose_image_count(&caps(2, 4, extent), Some(8)), 4);
        assert_eq!(choose_image_count(&caps(2, 4, extent), Some(1)), 2);
    }
}
