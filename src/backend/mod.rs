// Backend module - Vulkan implementation of the RHI
//
// Design: Thin wrapper around ash with explicit ownership and teardown order
// Layout tracking: every image layout change goes through `barrier`

pub mod barrier;
pub mod device;
pub mod frame;
pub mod guard;
pub mod instance;
pub mod negotiate;
pub mod physical_device;
pub mod render_target;
pub mod renderer;
pub mod surface;
pub mod swapchain;
pub mod sync;
pub mod texture;

pub use frame::{VulkanFrameState, VulkanGraphicsState};
pub use renderer::VulkanRenderer;
pub use swapchain::{Swapchain, SwapchainState};
