// Render Hardware Interface with a Vulkan backend
//
// ┌─────────────────────────────────────────────────────────────────┐
// │  Client code                                                    │
// │    └── rhi::Renderer (prepare / render / present / reset)       │
// │          └── backend::VulkanRenderer                            │
// │                ├── Capability negotiation (instance + device)   │
// │                ├── Swapchain (acquire / submit / present)       │
// │                └── Barriers (tracked image layouts)             │
// └─────────────────────────────────────────────────────────────────┘

pub mod backend;
pub mod config;
pub mod error;
pub mod rhi;

pub use backend::VulkanRenderer;
pub use config::RendererConfig;
pub use error::{Result, RhiError};
pub use rhi::{
    Backend, CullMode, FrameState, FrontFace, GraphicsState, PrimitiveTopology, Renderer,
    WindowHandle,
};
