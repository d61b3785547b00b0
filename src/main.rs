// =============================================================================
// vk-rhi demo - clears a window through the Renderer contract
// =============================================================================
//
// FRAME FLOW:
// 1. prepare()  - acquire an image, begin recording, open the render pass
// 2. render()   - (none here: an empty pass still clears the image)
// 3. present()  - close the pass, submit, present
// Recoverable surface errors trigger reset() and the frame is skipped.
//
// =============================================================================

use anyhow::{Context, Result};
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use std::sync::Arc;
use std::time::Instant;
use vk_rhi::config::{warn_defaults, DEFAULT_CONFIG_PATH};
use vk_rhi::{Renderer, RendererConfig, VulkanRenderer, WindowHandle};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowAttributes},
};

fn main() -> Result<()> {
    let (config, config_error) = RendererConfig::load_or_default(DEFAULT_CONFIG_PATH);

    // RUST_LOG overrides the configured level
    env_logger::Builder::new()
        .filter_level(config.log_level())
        .parse_default_env()
        .init();

    // Only reportable once the logger exists
    if let Some(e) = &config_error {
        warn_defaults(DEFAULT_CONFIG_PATH, e);
    }

    log::info!("Starting vk-rhi demo");
    log::info!(
        "Window: {}x{}, present mode: {}",
        config.window.width,
        config.window.height,
        config.swapchain.present_mode
    );

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;
    Ok(())
}

struct App {
    config: RendererConfig,
    // Declared before the window so it is dropped while the window still exists
    renderer: Option<VulkanRenderer>,
    window: Option<Arc<Window>>,
    /// Set to true when window is minimized (size = 0) - skip rendering
    is_minimized: bool,

    frame_count: u32,
    last_fps_update: Instant,
}

impl App {
    fn new(config: RendererConfig) -> Self {
        Self {
            config,
            renderer: None,
            window: None,
            is_minimized: false,
            frame_count: 0,
            last_fps_update: Instant::now(),
        }
    }

    fn init_renderer(&mut self, window: &Window) -> Result<()> {
        let size = window.inner_size();
        let handle = WindowHandle {
            display: window.raw_display_handle(),
            window: window.raw_window_handle(),
            width: size.width,
            height: size.height,
        };

        let renderer = VulkanRenderer::create(&handle, &self.config).context("Failed to create renderer")?;
        if let Some(name) = renderer.device_name() {
            log::info!("Rendering on {}", name);
        }
        self.renderer = Some(renderer);
        Ok(())
    }

    /// One empty frame. Returns false when the frame was skipped.
    fn render_frame(&mut self) -> Result<bool> {
        if self.is_minimized {
            return Ok(false);
        }
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(false);
        };

        let result = renderer.prepare().and_then(|frame| renderer.present(frame));

        match result {
            Ok(()) => Ok(true),
            Err(e) if e.is_recoverable() => {
                log::debug!("{}, recreating swapchain", e);
                renderer.reset().context("Failed to recreate swapchain")?;
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn update_fps(&mut self) {
        self.frame_count += 1;

        let elapsed = self.last_fps_update.elapsed().as_secs_f32();
        if elapsed >= 1.0 {
            let fps = self.frame_count as f32 / elapsed;
            if let Some(window) = &self.window {
                window.set_title(&format!("{} - {:.0} FPS", self.config.window.title, fps));
            }
            self.frame_count = 0;
            self.last_fps_update = Instant::now();
        }
    }

    fn shutdown(&mut self) {
        if let Some(mut renderer) = self.renderer.take() {
            if let Err(e) = renderer.close() {
                log::error!("Shutdown error: {:?}", e);
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        let window = match event_loop.create_window(window_attributes) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("Failed to create window: {:?}", e);
                event_loop.exit();
                return;
            }
        };

        if let Err(e) = self.init_renderer(&window) {
            log::error!("Failed to initialize Vulkan: {:?}", e);
            event_loop.exit();
            return;
        }

        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.shutdown();
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);

                self.is_minimized = size.width == 0 || size.height == 0;
                if self.is_minimized {
                    return;
                }
                if let Some(renderer) = self.renderer.as_mut() {
                    if let Err(e) = renderer.resize(size.width, size.height) {
                        log::error!("Resize failed: {:?}", e);
                        self.shutdown();
                        event_loop.exit();
                    }
                }
            }

            WindowEvent::RedrawRequested => match self.render_frame() {
                Ok(true) => self.update_fps(),
                Ok(false) => {}
                Err(e) => {
                    log::error!("Render error: {:?}", e);
                    self.shutdown();
                    event_loop.exit();
                }
            },

            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};

                if event.state.is_pressed() && event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    log::info!("ESC pressed, exiting...");
                    self.shutdown();
                    event_loop.exit();
                }
            }

            _ => {}
        }
    }

    /// Request continuous redraws
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}
