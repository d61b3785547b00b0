// Backend-agnostic Renderer contract
//
// Client code talks to a renderer only through these traits. Each backend
// supplies its own FrameState/GraphicsState types and validates them at the
// boundary with `as_any` downcasts.

use crate::config::RendererConfig;
use crate::error::Result;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::any::Any;

/// Which implementation of the contract produced an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Vulkan,
    WebGpu,
    Mock,
}

/// Opaque platform surface-creation token.
///
/// Produced by windowing code; the renderer only forwards the raw handles to
/// the native surface factory.
#[derive(Debug, Clone, Copy)]
pub struct WindowHandle {
    pub display: RawDisplayHandle,
    pub window: RawWindowHandle,
    pub width: u32,
    pub height: u32,
}

/// One frame's working set, created by `prepare` and consumed by `present`
pub trait FrameState: Any {
    fn backend(&self) -> Backend;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

/// Immutable description of a single draw
pub trait GraphicsState: Any {
    fn backend(&self) -> Backend;
    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullMode {
    None,
    Front,
    #[default]
    Back,
    FrontAndBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrontFace {
    #[default]
    CounterClockwise,
    Clockwise,
}

/// The per-frame protocol every backend implements.
///
/// Call order per frame: `prepare`, any number of `render`, then `present`.
/// Errors for which `RhiError::is_recoverable` holds are answered with `reset`
/// and a retry of the frame.
pub trait Renderer {
    /// Negotiate capabilities, create the device and bind it to `window`
    fn create(window: &WindowHandle, config: &RendererConfig) -> Result<Self>
    where
        Self: Sized;

    fn backend(&self) -> Backend;

    fn prepare(&mut self) -> Result<Box<dyn FrameState>>;

    fn render(&mut self, frame: &mut dyn FrameState, state: &dyn GraphicsState) -> Result<()>;

    fn present(&mut self, frame: Box<dyn FrameState>) -> Result<()>;

    /// Recreate the presentation chain after the surface became invalid
    fn reset(&mut self) -> Result<()>;

    /// Record a new surface size and recreate the presentation chain
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;

    /// Wait for the GPU and release every native object in reverse creation order
    fn close(&mut self) -> Result<()>;
}
