// =============================================================================
// CONFIGURATION - Load renderer settings from vk-rhi.toml
// =============================================================================
//
// Every section has defaults, so a missing file or a partial file still
// produces a usable configuration.

use anyhow::{Context, Result};
use ash::vk;
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "vk-rhi.toml";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RendererConfig {
    pub window: WindowConfig,
    pub device: DeviceConfig,
    pub swapchain: SwapchainConfig,
    pub debug: DebugConfig,
}

/// Window settings (used by the demo binary)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "vk-rhi".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// GPU selection settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Exact device name to prefer over the highest-scoring device
    pub name: Option<String>,
    /// Fail instead of falling back when `name` matches no compatible device
    pub strict_name: bool,
    pub validation_layers: bool,
    /// Device extensions to enable when the selected GPU offers them
    pub extra_extensions: Vec<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: None,
            strict_name: false,
            validation_layers: cfg!(debug_assertions),
            extra_extensions: Vec::new(),
        }
    }
}

/// Swapchain sizing and format hints
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SwapchainConfig {
    pub present_mode: String,
    pub surface_format: String,
    /// Requested image count, clamped to what the surface allows
    pub image_count: Option<u32>,
    pub frames_in_flight: usize,
    pub depth: bool,
    pub clear_color: [f32; 4],
}

impl Default for SwapchainConfig {
    fn default() -> Self {
        Self {
            present_mode: "fifo".to_string(),
            surface_format: "bgra8_srgb".to_string(),
            image_count: None,
            frames_in_flight: 2,
            depth: true,
            clear_color: [0.1, 0.2, 0.8, 1.0],
        }
    }
}

/// Debug settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl RendererConfig {
    /// Load configuration from the default path, falling back to defaults on error
    pub fn load() -> Self {
        let (config, error) = Self::load_or_default(DEFAULT_CONFIG_PATH);
        if let Some(e) = error {
            warn_defaults(DEFAULT_CONFIG_PATH, &e);
        }
        config
    }

    /// Like `load_from_path`, but a broken file yields defaults plus the error.
    ///
    /// For callers that must set up logging from the configuration before
    /// they can report why it was not used.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> (Self, Option<anyhow::Error>) {
        match Self::load_from_path(path) {
            Ok(config) => (config, None),
            Err(e) => (RendererConfig::default(), Some(e)),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(RendererConfig::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Preferred present mode; FIFO is used when the surface lacks it
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        match self.swapchain.present_mode.to_lowercase().as_str() {
            "immediate" => vk::PresentModeKHR::IMMEDIATE,
            "mailbox" => vk::PresentModeKHR::MAILBOX,
            "fifo" => vk::PresentModeKHR::FIFO,
            "fifo_relaxed" => vk::PresentModeKHR::FIFO_RELAXED,
            other => {
                log::warn!("Unknown present mode '{}', defaulting to FIFO", other);
                vk::PresentModeKHR::FIFO
            }
        }
    }

    /// Preferred surface format; the first surface format is used when unavailable
    pub fn surface_format(&self) -> vk::Format {
        match self.swapchain.surface_format.to_lowercase().as_str() {
            "bgra8_srgb" => vk::Format::B8G8R8A8_SRGB,
            "bgra8_unorm" => vk::Format::B8G8R8A8_UNORM,
            "rgba8_srgb" => vk::Format::R8G8B8A8_SRGB,
            "rgba8_unorm" => vk::Format::R8G8B8A8_UNORM,
            other => {
                log::warn!("Unknown surface format '{}', defaulting to bgra8_srgb", other);
                vk::Format::B8G8R8A8_SRGB
            }
        }
    }

    pub fn frames_in_flight(&self) -> usize {
        self.swapchain.frames_in_flight.max(1)
    }

    pub fn log_level(&self) -> log::LevelFilter {
        self.debug.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

/// Report a configuration file that could not be used
pub fn warn_defaults(path: impl AsRef<Path>, error: &anyhow::Error) {
    log::warn!("Failed to load {:?}: {:#}. Using defaults.", path.as_ref(), error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = RendererConfig::from_toml("").unwrap();
        assert_eq!(config.device.name, None);
        assert!(!config.device.strict_name);
        assert_eq!(config.present_mode(), vk::PresentModeKHR::FIFO);
        assert_eq!(config.surface_format(), vk::Format::B8G8R8A8_SRGB);
        assert_eq!(config.frames_in_flight(), 2);
        assert!(config.swapchain.depth);
    }

    #[test]
    fn parses_device_and_swapchain_sections() {
        let config = RendererConfig::from_toml(
            r#"
            [device]
            name = "NVIDIA GeForce RTX 3080"
            strict_name = true
            extra_extensions = ["VK_EXT_memory_budget"]

            [swapchain]
            present_mode = "Mailbox"
            surface_format = "rgba8_unorm"
            image_count = 3
            frames_in_flight = 0
            depth = false

            [debug]
            log_level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.device.name.as_deref(), Some("NVIDIA GeForce RTX 3080"));
        assert!(config.device.strict_name);
        assert_eq!(config.device.extra_extensions, vec!["VK_EXT_memory_budget"]);
        assert_eq!(config.present_mode(), vk::PresentModeKHR::MAILBOX);
        assert_eq!(config.surface_format(), vk::Format::R8G8B8A8_UNORM);
        assert_eq!(config.swapchain.image_count, Some(3));
        assert_eq!(config.frames_in_flight(), 1);
        assert!(!config.swapchain.depth);
        assert_eq!(config.log_level(), log::LevelFilter::Debug);
    }

    #[test]
    fn unknown_strings_fall_back() {
        let config = RendererConfig::from_toml(
            r#"
            [swapchain]
            present_mode = "vsync-ish"
            surface_format = "hdr"
            [debug]
            log_level = "loud"
            "#,
        )
        .unwrap();
        assert_eq!(config.present_mode(), vk::PresentModeKHR::FIFO);
        assert_eq!(config.surface_format(), vk::Format::B8G8R8A8_SRGB);
        assert_eq!(config.log_level(), log::LevelFilter::Info);
    }

    fn scratch_file(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("vk-rhi-{}-{}.toml", name, std::process::id()));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let path = std::env::temp_dir().join("vk-rhi-does-not-exist.toml");
        let (config, error) = RendererConfig::load_or_default(path);
        assert!(error.is_none());
        assert_eq!(config.frames_in_flight(), 2);
    }

    #[test]
    fn broken_file_falls_back_and_keeps_the_error() {
        let path = scratch_file("broken", "[swapchain\nframes_in_flight = 3");
        let (config, error) = RendererConfig::load_or_default(&path);
        std::fs::remove_file(&path).unwrap();

        let error = error.expect("parse failure is reported");
        assert!(format!("{:#}", error).contains("Failed to parse config file"));
        assert_eq!(config.frames_in_flight(), 2);
    }

    #[test]
    fn readable_file_is_used() {
        let path = scratch_file("valid", "[debug]\nlog_level = \"trace\"");
        let (config, error) = RendererConfig::load_or_default(&path);
        std::fs::remove_file(&path).unwrap();

        assert!(error.is_none());
        assert_eq!(config.log_level(), log::LevelFilter::Trace);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(RendererConfig::from_toml("[device\nname = 1").is_err());
    }
}
