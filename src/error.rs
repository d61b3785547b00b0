// RHI error taxonomy
//
// Fatal initialization errors abort renderer construction.
// Presentation conditions are recoverable: the caller resets and retries the frame.
// Contract violations indicate a bug in the calling code.

use ash::vk;
use std::fmt;
use thiserror::Error;

/// What kind of capability a negotiation was about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityKind {
    InstanceLayer,
    InstanceExtension,
    DeviceExtension,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InstanceLayer => f.write_str("instance layer"),
            Self::InstanceExtension => f.write_str("instance extension"),
            Self::DeviceExtension => f.write_str("device extension"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RhiError {
    #[error("Failed to load Vulkan library: {0}")]
    LibraryLoad(#[from] ash::LoadingError),

    #[error(
        "Vulkan instance version {} is too old, {} required",
        format_version(.found),
        format_version(.required)
    )]
    UnsupportedInstanceVersion { found: u32, required: u32 },

    #[error("Missing required {kind}(s): {}", .missing.join(", "))]
    MissingCapabilities {
        kind: CapabilityKind,
        missing: Vec<String>,
    },

    #[error("No Vulkan-capable GPU found")]
    NoDevices,

    #[error("No compatible GPU found ({})", describe_rejections(.rejected))]
    NoCompatibleDevice { rejected: Vec<(String, String)> },

    #[error("Requested GPU '{0}' is not among the compatible devices")]
    RequestedDeviceUnavailable(String),

    #[error("Failed to create presentation surface: {0}")]
    SurfaceCreation(vk::Result),

    #[error("Invalid capability name '{0}'")]
    InvalidName(String),

    #[error("GPU memory allocation failed: {0}")]
    Allocation(#[from] gpu_allocator::AllocationError),

    #[error("Swapchain is out of date with its surface")]
    SurfaceOutOfDate,

    #[error("Swapchain no longer matches its surface exactly")]
    SurfaceSuboptimal,

    #[error("{0} does not belong to the Vulkan backend")]
    BackendMismatch(&'static str),

    #[error("Invalid swapchain state: cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    #[error("Vulkan call failed: {0}")]
    Vulkan(#[from] vk::Result),
}

impl RhiError {
    /// True for conditions the caller handles by calling `reset` and retrying the frame
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SurfaceOutOfDate | Self::SurfaceSuboptimal)
    }
}

fn format_version(version: &u32) -> String {
    format!(
        "{}.{}",
        vk::api_version_major(*version),
        vk::api_version_minor(*version)
    )
}

fn describe_rejections(rejected: &[(String, String)]) -> String {
    if rejected.is_empty() {
        return "no candidates".to_string();
    }
    rejected
        .iter()
        .map(|(name, reason)| format!("{name}: {reason}"))
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, RhiError>;
