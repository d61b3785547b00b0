// Physical device enumeration and selection
//
// Each GPU is captured once as an immutable `PhysicalDeviceInfo` snapshot.
// Compatibility and score are derived from the snapshot alone, which keeps
// selection deterministic and testable without a driver.

use super::negotiate;
use crate::error::{Result, RhiError};
use ash::vk;
use std::collections::HashSet;
use std::ffi::{CStr, CString};

/// Minimum device API version: dynamic rendering and extended dynamic state are core in 1.3
pub const REQUIRED_API_VERSION: u32 = vk::API_VERSION_1_3;

/// Queue capabilities of one queue family, as seen by this renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilySupport {
    pub graphics: bool,
    pub present: bool,
}

/// Optional features we turn on when the device has them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceFeatures {
    pub sampler_anisotropy: bool,
    pub fill_mode_non_solid: bool,
}

/// Raw capabilities of a GPU, gathered from the driver
#[derive(Debug, Clone)]
pub struct DeviceCapabilities {
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub api_version: u32,
    pub max_image_dimension_2d: u32,
    pub extensions: HashSet<CString>,
    pub queue_families: Vec<QueueFamilySupport>,
    pub dynamic_rendering: bool,
    pub features: DeviceFeatures,
    pub surface_format_count: usize,
    pub present_mode_count: usize,
}

/// Everything needed to create a logical device on a compatible GPU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSpec {
    pub graphics_queue_family: u32,
    pub present_queue_family: u32,
    pub extensions: Vec<CString>,
    pub features: DeviceFeatures,
}

impl DeviceSpec {
    pub fn shares_queue_family(&self) -> bool {
        self.graphics_queue_family == self.present_queue_family
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compatibility {
    Compatible(DeviceSpec),
    Incompatible(String),
}

/// Device extension lists used to judge every candidate
#[derive(Debug, Clone, Default)]
pub struct DeviceRequirements {
    pub required_extensions: Vec<CString>,
    pub optional_extensions: Vec<CString>,
}

impl DeviceRequirements {
    pub fn new<S: AsRef<str>>(extra_extensions: &[S]) -> Result<Self> {
        let mut optional_extensions = vec![CString::from(vk::KhrPortabilitySubsetFn::name())];
        optional_extensions.extend(negotiate::to_cstrings(extra_extensions)?);

        Ok(Self {
            required_extensions: vec![CString::from(ash::extensions::khr::Swapchain::name())],
            optional_extensions,
        })
    }
}

/// Read-only descriptor of one GPU
#[derive(Debug, Clone)]
pub struct PhysicalDeviceInfo {
    pub handle: vk::PhysicalDevice,
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub api_version: u32,
    pub compatibility: Compatibility,
    pub score: u32,
}

impl PhysicalDeviceInfo {
    pub fn from_capabilities(
        handle: vk::PhysicalDevice,
        caps: &DeviceCapabilities,
        requirements: &DeviceRequirements,
    ) -> Self {
        Self {
            handle,
            name: caps.name.clone(),
            device_type: caps.device_type,
            api_version: caps.api_version,
            compatibility: evaluate(caps, requirements),
            score: score(caps),
        }
    }

    pub fn spec(&self) -> Option<&DeviceSpec> {
        match &self.compatibility {
            Compatibility::Compatible(spec) => Some(spec),
            Compatibility::Incompatible(_) => None,
        }
    }
}

/// Pick graphics and present families, preferring a single family that does both
pub fn choose_queue_families(families: &[QueueFamilySupport]) -> Option<(u32, u32)> {
    if let Some(both) = families.iter().position(|f| f.graphics && f.present) {
        return Some((both as u32, both as u32));
    }

    let graphics = families.iter().position(|f| f.graphics)?;
    let present = families.iter().position(|f| f.present)?;
    Some((graphics as u32, present as u32))
}

/// Derive the compatibility verdict for a GPU
pub fn evaluate(caps: &DeviceCapabilities, requirements: &DeviceRequirements) -> Compatibility {
    if caps.api_version < REQUIRED_API_VERSION {
        return Compatibility::Incompatible(format!(
            "Vulkan {}.{} device, 1.3 required",
            vk::api_version_major(caps.api_version),
            vk::api_version_minor(caps.api_version)
        ));
    }

    if !caps.dynamic_rendering {
        return Compatibility::Incompatible("dynamic rendering not supported".to_string());
    }

    let missing = negotiate::missing(&caps.extensions, &requirements.required_extensions);
    if !missing.is_empty() {
        return Compatibility::Incompatible(format!(
            "missing device extensions: {}",
            missing.join(", ")
        ));
    }

    if !caps.queue_families.iter().any(|f| f.graphics) {
        return Compatibility::Incompatible("no graphics queue family".to_string());
    }

    let Some((graphics_queue_family, present_queue_family)) =
        choose_queue_families(&caps.queue_families)
    else {
        return Compatibility::Incompatible("cannot present to the surface".to_string());
    };

    if caps.surface_format_count == 0 || caps.present_mode_count == 0 {
        return Compatibility::Incompatible("surface has no formats or present modes".to_string());
    }

    let extensions = match negotiate::negotiate(
        crate::error::CapabilityKind::DeviceExtension,
        &caps.extensions,
        &requirements.required_extensions,
        &requirements.optional_extensions,
    ) {
        Ok(extensions) => extensions,
        Err(e) => return Compatibility::Incompatible(e.to_string()),
    };

    Compatibility::Compatible(DeviceSpec {
        graphics_queue_family,
        present_queue_family,
        extensions,
        features: caps.features,
    })
}

/// Selection score: device class first, texture size limit as refinement
pub fn score(caps: &DeviceCapabilities) -> u32 {
    let class = match caps.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 50,
        _ => 1,
    };
    class + caps.max_image_dimension_2d / 1024
}

/// Outcome of device selection
#[derive(Debug, Clone)]
pub struct Selection {
    pub device: PhysicalDeviceInfo,
    /// Set when a requested name could not be honoured and we fell back
    pub fallback_from: Option<String>,
}

/// Choose a GPU from enumerated candidates.
///
/// A compatible device whose name equals `requested` wins. Otherwise the
/// compatible device with the highest score wins, first enumerated on ties.
/// An unmatched name falls back with a warning, or fails when `strict`.
pub fn select(
    devices: Vec<PhysicalDeviceInfo>,
    requested: Option<&str>,
    strict: bool,
) -> Result<Selection> {
    if devices.is_empty() {
        return Err(RhiError::NoDevices);
    }

    let (compatible, incompatible): (Vec<_>, Vec<_>) = devices
        .into_iter()
        .partition(|d| matches!(d.compatibility, Compatibility::Compatible(_)));

    for device in &incompatible {
        if let Compatibility::Incompatible(reason) = &device.compatibility {
            log::info!("Skipping GPU '{}': {}", device.name, reason);
        }
    }

    if compatible.is_empty() {
        let rejected = incompatible
            .into_iter()
            .map(|d| match d.compatibility {
                Compatibility::Incompatible(reason) => (d.name, reason),
                Compatibility::Compatible(_) => (d.name, String::new()),
            })
            .collect();
        return Err(RhiError::NoCompatibleDevice { rejected });
    }

    if let Some(name) = requested {
        if let Some(device) = compatible.iter().find(|d| d.name == name) {
            return Ok(Selection {
                device: device.clone(),
                fallback_from: None,
            });
        }

        if strict {
            return Err(RhiError::RequestedDeviceUnavailable(name.to_string()));
        }
        log::warn!(
            "Requested GPU '{}' is not available or not compatible, using default selection",
            name
        );
    }

    let mut best: Option<&PhysicalDeviceInfo> = None;
    for device in &compatible {
        // Strictly greater keeps the first-seen device on ties
        if best.map_or(true, |b| device.score > b.score) {
            best = Some(device);
        }
    }

    let device = best.cloned().ok_or(RhiError::NoDevices)?;
    Ok(Selection {
        device,
        fallback_from: requested.map(str::to_string),
    })
}

/// Query the driver for everything `evaluate` and `score` need
pub fn query_capabilities(
    instance: &ash::Instance,
    surface_loader: &ash::extensions::khr::Surface,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
) -> Result<DeviceCapabilities> {
    let properties = unsafe { instance.get_physical_device_properties(physical_device) };
    let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
        .to_string_lossy()
        .into_owned();

    let extensions = negotiate::available_device_extensions(instance, physical_device)?;

    let families = unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
    let mut queue_families = Vec::with_capacity(families.len());
    for (index, family) in families.iter().enumerate() {
        let present = unsafe {
            surface_loader.get_physical_device_surface_support(
                physical_device,
                index as u32,
                surface,
            )
        }?;
        queue_families.push(QueueFamilySupport {
            graphics: family.queue_flags.contains(vk::QueueFlags::GRAPHICS),
            present,
        });
    }

    // Vulkan 1.3 feature structs only exist on 1.3 devices
    let (dynamic_rendering, features) = if properties.api_version >= REQUIRED_API_VERSION {
        let mut features13 = vk::PhysicalDeviceVulkan13Features::default();
        let mut features2 = vk::PhysicalDeviceFeatures2::builder().push_next(&mut features13);
        unsafe { instance.get_physical_device_features2(physical_device, &mut features2) };
        let base = features2.features;
        (
            features13.dynamic_rendering == vk::TRUE,
            DeviceFeatures {
                sampler_anisotropy: base.sampler_anisotropy == vk::TRUE,
                fill_mode_non_solid: base.fill_mode_non_solid == vk::TRUE,
            },
        )
    } else {
        (false, DeviceFeatures::default())
    };

    let surface_format_count = unsafe {
        surface_loader.get_physical_device_surface_formats(physical_device, surface)
    }?
    .len();
    let present_mode_count = unsafe {
        surface_loader.get_physical_device_surface_present_modes(physical_device, surface)
    }?
    .len();

    Ok(DeviceCapabilities {
        name,
        device_type: properties.device_type,
        api_version: properties.api_version,
        max_image_dimension_2d: properties.limits.max_image_dimension2_d,
        extensions,
        queue_families,
        dynamic_rendering,
        features,
        surface_format_count,
        present_mode_count,
    })
}

/// Enumerate every GPU and snapshot its compatibility and score
pub fn enumerate(
    instance: &ash::Instance,
    surface_loader: &ash::extensions::khr::Surface,
    surface: vk::SurfaceKHR,
    requirements: &DeviceRequirements,
) -> Result<Vec<PhysicalDeviceInfo>> {
    let handles = unsafe { instance.enumerate_physical_devices() }?;
    log::debug!("Found {} physical device(s)", handles.len());

    handles
        .into_iter()
        .map(|handle| {
            let caps = query_capabilities(instance, surface_loader, surface, handle)?;
            let info = PhysicalDeviceInfo::from_capabilities(handle, &caps, requirements);
            log::debug!(
                "GPU '{}' ({:?}): score {}, {:?}",
                info.name,
                info.device_type,
                info.score,
                info.compatibility
            );
            Ok(info)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requirements() -> DeviceRequirements {
        DeviceRequirements::new::<&str>(&[]).unwrap()
    }

    fn capable(name: &str, device_type: vk::PhysicalDeviceType) -> DeviceCapabilities {
        DeviceCapabilities {
            name: name.to_string(),
            device_type,
            api_version: vk::API_VERSION_1_3,
            max_image_dimension_2d: 16384,
            extensions: [CString::from(ash::extensions::khr::Swapchain::name())]
                .into_iter()
                .collect(),
            queue_families: vec![QueueFamilySupport {
                graphics: true,
                present: true,
            }],
            dynamic_rendering: true,
            features: DeviceFeatures::default(),
            surface_format_count: 2,
            present_mode_count: 1,
        }
    }

    fn info(caps: &DeviceCapabilities) -> PhysicalDeviceInfo {
        PhysicalDeviceInfo::from_capabilities(vk::PhysicalDevice::null(), caps, &requirements())
    }

    fn with_score(name: &str, score: u32) -> PhysicalDeviceInfo {
        let mut device = info(&capable(name, vk::PhysicalDeviceType::DISCRETE_GPU));
        device.score = score;
        device
    }

    fn incompatible(name: &str) -> PhysicalDeviceInfo {
        let mut caps = capable(name, vk::PhysicalDeviceType::DISCRETE_GPU);
        caps.api_version = vk::API_VERSION_1_2;
        let mut device = info(&caps);
        device.score = 10_000;
        device
    }

    #[test]
    fn compatible_device_gets_a_spec() {
        let caps = capable("GPU", vk::PhysicalDeviceType::DISCRETE_GPU);
        match evaluate(&caps, &requirements()) {
            Compatibility::Compatible(spec) => {
                assert_eq!(spec.graphics_queue_family, 0);
                assert!(spec.shares_queue_family());
                assert_eq!(
                    spec.extensions,
                    vec![CString::from(ash::extensions::khr::Swapchain::name())]
                );
            }
            Compatibility::Incompatible(reason) => panic!("unexpected: {reason}"),
        }
    }

    #[test]
    fn portability_subset_is_enabled_when_offered() {
        let mut caps = capable("MoltenVK", vk::PhysicalDeviceType::INTEGRATED_GPU);
        caps.extensions
            .insert(CString::from(vk::KhrPortabilitySubsetFn::name()));
        let spec = info(&caps).spec().cloned().unwrap();
        assert!(spec
            .extensions
            .contains(&CString::from(vk::KhrPortabilitySubsetFn::name())));
    }

    #[test]
    fn incompatibility_reasons() {
        let mut old = capable("old", vk::PhysicalDeviceType::DISCRETE_GPU);
        old.api_version = vk::API_VERSION_1_1;
        let mut no_swapchain = capable("headless", vk::PhysicalDeviceType::DISCRETE_GPU);
        no_swapchain.extensions.clear();
        let mut no_graphics = capable("compute", vk::PhysicalDeviceType::DISCRETE_GPU);
        no_graphics.queue_families = vec![QueueFamilySupport {
            graphics: false,
            present: true,
        }];
        let mut no_present = capable("offscreen", vk::PhysicalDeviceType::DISCRETE_GPU);
        no_present.queue_families = vec![QueueFamilySupport {
            graphics: true,
            present: false,
        }];
        let mut no_dynamic = capable("legacy", vk::PhysicalDeviceType::DISCRETE_GPU);
        no_dynamic.dynamic_rendering = false;

        for (caps, expected) in [
            (old, "Vulkan 1.1 device"),
            (no_swapchain, "VK_KHR_swapchain"),
            (no_graphics, "no graphics queue"),
            (no_present, "cannot present"),
            (no_dynamic, "dynamic rendering"),
        ] {
            match evaluate(&caps, &requirements()) {
                Compatibility::Incompatible(reason) => {
                    assert!(reason.contains(expected), "{}: {}", caps.name, reason)
                }
                Compatibility::Compatible(_) => panic!("{} should be incompatible", caps.name),
            }
        }
    }

    #[test]
    fn queue_families_prefer_a_shared_family() {
        let families = [
            QueueFamilySupport { graphics: true, present: false },
            QueueFamilySupport { graphics: false, present: true },
            QueueFamilySupport { graphics: true, present: true },
        ];
        assert_eq!(choose_queue_families(&families), Some((2, 2)));
        assert_eq!(choose_queue_families(&families[..2]), Some((0, 1)));
        assert_eq!(choose_queue_families(&families[..1]), None);
    }

    #[test]
    fn discrete_outscores_integrated() {
        let discrete = capable("d", vk::PhysicalDeviceType::DISCRETE_GPU);
        let integrated = capable("i", vk::PhysicalDeviceType::INTEGRATED_GPU);
        let cpu = capable("c", vk::PhysicalDeviceType::CPU);
        assert!(score(&discrete) > score(&integrated));
        assert!(score(&integrated) > score(&cpu));
    }

    #[test]
    fn no_devices_fails() {
        assert!(matches!(select(Vec::new(), None, false), Err(RhiError::NoDevices)));
    }

    #[test]
    fn only_incompatible_devices_fails_with_reasons() {
        let err = select(vec![incompatible("a"), incompatible("b")], None, false).unwrap_err();
        match err {
            RhiError::NoCompatibleDevice { rejected } => {
                assert_eq!(rejected.len(), 2);
                assert_eq!(rejected[0].0, "a");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn highest_score_wins_and_incompatible_is_ignored() {
        let devices = vec![with_score("low", 10), incompatible("fast-but-old"), with_score("high", 20)];
        let selection = select(devices, None, false).unwrap();
        assert_eq!(selection.device.name, "high");
        assert_eq!(selection.fallback_from, None);
    }

    #[test]
    fn ties_go_to_the_first_enumerated() {
        for _ in 0..3 {
            let devices = vec![with_score("first", 7), with_score("second", 7), with_score("low", 3)];
            assert_eq!(select(devices, None, false).unwrap().device.name, "first");
        }
    }

    #[test]
    fn requested_name_beats_score() {
        let devices = vec![with_score("big", 1000), with_score("small", 1)];
        let selection = select(devices, Some("small"), false).unwrap();
        assert_eq!(selection.device.name, "small");
        assert_eq!(selection.fallback_from, None);
    }

    #[test]
    fn unknown_name_falls_back_to_max_score() {
        let devices = vec![with_score("a", 5), with_score("b", 9)];
        let selection = select(devices, Some("missing"), false).unwrap();
        assert_eq!(selection.device.name, "b");
        assert_eq!(selection.fallback_from.as_deref(), Some("missing"));
    }

    #[test]
    fn incompatible_name_match_falls_back() {
        let devices = vec![incompatible("wanted"), with_score("other", 1)];
        let selection = select(devices, Some("wanted"), false).unwrap();
        assert_eq!(selection.device.name, "other");
    }

    #[test]
    fn strict_mode_rejects_unknown_name() {
        let devices = vec![with_score("a", 5)];
        assert!(matches!(
            select(devices, Some("missing"), true),
            Err(RhiError::RequestedDeviceUnavailable(name)) if name == "missing"
        ));
    }
}
