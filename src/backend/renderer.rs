// VulkanRenderer - frame lifecycle on top of the Vulkan backend
//
// FRAME FLOW:
// ┌──────────────────────────────────────────────────────────────────────┐
// │  prepare ──> render* ──> present                                     │
// │  acquire      bind +      end pass, barriers back,                   │
// │  begin cmd    draw        submit, present                            │
// │  barriers                                                            │
// │  begin pass                                                          │
// └──────────────────────────────────────────────────────────────────────┘
// SurfaceOutOfDate / SurfaceSuboptimal from any step: call `reset`, retry.

use super::barrier::CommandRecorder;
use super::device::Device;
use super::frame::{self, VulkanFrameState, VulkanGraphicsState};
use super::guard::Guard;
use super::instance::Instance;
use super::physical_device::{self, DeviceRequirements};
use super::render_target::RenderTarget;
use super::surface::Surface;
use super::swapchain::{Swapchain, SwapchainSettings, SwapchainState};
use super::texture;
use crate::config::RendererConfig;
use crate::error::{Result, RhiError};
use crate::rhi::{Backend, FrameState, GraphicsState, Renderer, WindowHandle};
use ash::vk;

/// Owns every native object of one window's renderer.
///
/// All handles are `None` once `close` has run.
pub struct VulkanRenderer {
    instance: Option<Instance>,
    surface: Option<Surface>,
    device: Option<Device>,
    swapchain: Option<Swapchain>,
    clear_color: [f32; 4],
}

impl VulkanRenderer {
    pub fn device_name(&self) -> Option<&str> {
        self.device.as_ref().map(|d| d.name.as_str())
    }

    pub fn swapchain_state(&self) -> Option<SwapchainState> {
        self.swapchain.as_ref().map(Swapchain::state)
    }

    pub fn is_closed(&self) -> bool {
        self.device.is_none()
    }

    fn device(&self, operation: &'static str) -> Result<&Device> {
        self.device.as_ref().ok_or(RhiError::InvalidState {
            operation,
            state: "closed",
        })
    }

    fn parts(&mut self, operation: &'static str) -> Result<(&Device, &Surface, &mut Swapchain)> {
        match (self.device.as_ref(), self.surface.as_ref(), self.swapchain.as_mut()) {
            (Some(device), Some(surface), Some(swapchain)) => Ok((device, surface, swapchain)),
            _ => Err(RhiError::InvalidState {
                operation,
                state: "closed",
            }),
        }
    }

    /// Start recording: attachments to render layouts, then open the pass
    fn begin_frame(device: &ash::Device, frame: &mut VulkanFrameState, clear_color: [f32; 4]) -> Result<()> {
        let cmd = frame.command_buffer;
        let begin_info =
            vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { device.begin_command_buffer(cmd, &begin_info) }?;

        let mut recorder = CommandRecorder { device, cmd };
        frame::begin_attachments(&mut recorder, &mut frame.color, frame.depth.as_mut());

        RenderTarget::for_frame(frame, clear_color).begin(device, cmd);
        frame.rendering = true;
        Ok(())
    }

    /// Close the pass, hand the image back to presentation and finish recording
    fn end_frame(device: &ash::Device, frame: &mut VulkanFrameState) -> Result<()> {
        if !frame.rendering {
            return Err(RhiError::InvalidState {
                operation: "present",
                state: "not rendering",
            });
        }

        let cmd = frame.command_buffer;
        unsafe { device.cmd_end_rendering(cmd) };
        frame.rendering = false;

        let mut recorder = CommandRecorder { device, cmd };
        frame::end_attachments(&mut recorder, &mut frame.color, frame.depth.as_mut());

        unsafe { device.end_command_buffer(cmd) }?;
        Ok(())
    }

    fn record_draw(device: &ash::Device, frame: &VulkanFrameState, state: &VulkanGraphicsState) {
        let cmd = frame.command_buffer;
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: frame.extent.width as f32,
            height: frame.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: frame.extent,
        };

        unsafe {
            device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, state.pipeline);
            device.cmd_set_viewport(cmd, 0, &[viewport]);
            device.cmd_set_scissor(cmd, 0, &[scissor]);
            device.cmd_set_cull_mode(cmd, frame::cull_mode(state.cull_mode));
            device.cmd_set_front_face(cmd, frame::front_face(state.front_face));
            device.cmd_set_primitive_topology(cmd, frame::topology(state.topology));

            if let Some(push) = &state.push_constants {
                device.cmd_push_constants(cmd, state.layout, push.stages, push.offset, &push.data);
            }

            if !state.vertex_buffers.is_empty() {
                let buffers: Vec<vk::Buffer> = state.vertex_buffers.iter().map(|b| b.buffer).collect();
                let offsets: Vec<vk::DeviceSize> = state.vertex_buffers.iter().map(|b| b.offset).collect();
                device.cmd_bind_vertex_buffers(cmd, 0, &buffers, &offsets);
            }

            let index = &state.index_buffer;
            device.cmd_bind_index_buffer(cmd, index.buffer, index.offset, index.index_type);
            device.cmd_draw_indexed(cmd, index.index_count, state.instance_count, 0, 0, 0);
        }
    }
}

impl Renderer for VulkanRenderer {
    /// Build instance, surface, device and swapchain in that order.
    ///
    /// On failure everything created so far is released again and no
    /// renderer is returned.
    fn create(window: &WindowHandle, config: &RendererConfig) -> Result<Self> {
        log::info!("Initializing Vulkan...");

        let instance = Guard::new(Instance::new(config, window.display)?, Instance::destroy);
        let surface = Guard::new(Surface::new(&instance, window)?, Surface::destroy);

        let requirements = DeviceRequirements::new(config.device.extra_extensions.as_slice())?;
        let devices = physical_device::enumerate(&instance.instance, &surface.loader, surface.surface, &requirements)?;
        let selection = physical_device::select(devices, config.device.name.as_deref(), config.device.strict_name)?;
        let spec = selection
            .device
            .spec()
            .ok_or_else(|| RhiError::NoCompatibleDevice { rejected: Vec::new() })?;

        let device = Guard::new(Device::new(&instance, &selection.device, spec)?, Device::destroy);

        let depth_format = if config.swapchain.depth {
            let format = texture::find_depth_format(&instance.instance, device.physical_device);
            if format.is_none() {
                log::warn!("No supported depth format, rendering without depth");
            }
            format
        } else {
            None
        };

        let swapchain = Swapchain::new(
            &instance,
            &device,
            &surface,
            SwapchainSettings::from_config(config, depth_format),
            vk::Extent2D {
                width: window.width,
                height: window.height,
            },
        )?;

        log::info!("Vulkan initialized successfully!");

        Ok(Self {
            swapchain: Some(swapchain),
            device: Some(device.into_inner()),
            surface: Some(surface.into_inner()),
            instance: Some(instance.into_inner()),
            clear_color: config.swapchain.clear_color,
        })
    }

    fn backend(&self) -> Backend {
        Backend::Vulkan
    }

    fn prepare(&mut self) -> Result<Box<dyn FrameState>> {
        let clear_color = self.clear_color;
        let (device, _, swapchain) = self.parts("prepare")?;

        let mut frame = swapchain.acquire_next_texture(device)?;
        if let Err(e) = Self::begin_frame(&device.device, &mut frame, clear_color) {
            swapchain.abandon(frame);
            return Err(e);
        }

        Ok(Box::new(frame))
    }

    fn render(&mut self, frame: &mut dyn FrameState, state: &dyn GraphicsState) -> Result<()> {
        let frame = frame::downcast_frame_mut(frame)?;
        let state = frame::downcast_graphics(state)?;
        if !frame.rendering {
            return Err(RhiError::InvalidState {
                operation: "render",
                state: "not rendering",
            });
        }

        let device = self.device("render")?;
        Self::record_draw(&device.device, frame, state);
        Ok(())
    }

    fn present(&mut self, frame: Box<dyn FrameState>) -> Result<()> {
        let mut frame = *frame::downcast_frame(frame)?;
        let (device, _, swapchain) = self.parts("present")?;

        if let Err(e) = Self::end_frame(&device.device, &mut frame) {
            swapchain.abandon(frame);
            return Err(e);
        }
        if let Err(e) = swapchain.submit(device, &frame) {
            swapchain.abandon(frame);
            return Err(e);
        }

        swapchain.present(device, frame)
    }

    fn reset(&mut self) -> Result<()> {
        let (device, surface, swapchain) = self.parts("reset")?;
        log::info!("Recreating swapchain...");
        swapchain.reset(device, surface)
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        let (_, _, swapchain) = self.parts("resize")?;
        log::debug!("Surface resized to {}x{}", width, height);
        swapchain.set_surface_size(width, height);
        self.reset()
    }

    /// Destroy in reverse order of creation. Calling it again is a no-op.
    fn close(&mut self) -> Result<()> {
        let Some(device) = self.device.as_ref() else {
            return Ok(());
        };

        log::info!("Cleaning up Vulkan resources...");

        // Teardown continues even if the device was lost
        let idle = device.wait_queues_idle();
        if let Err(e) = &idle {
            log::error!("Failed to wait for GPU before teardown: {}", e);
        }

        if let Some(swapchain) = self.swapchain.take() {
            swapchain.destroy(device);
        }
        if let Some(surface) = self.surface.take() {
            surface.destroy();
        }
        if let Some(device) = self.device.take() {
            device.destroy();
        }
        if let Some(instance) = self.instance.take() {
            instance.destroy();
        }

        log::info!("Cleanup complete");
        idle
    }
}

impl Drop for VulkanRenderer {
    fn drop(&mut self) {
        if !self.is_closed() {
            if let Err(e) = self.close() {
                log::error!("Renderer teardown failed: {}", e);
            }
        }
    }
}
