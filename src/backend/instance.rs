// Vulkan instance - driver connection
//
// Responsibilities:
// - Load the Vulkan library and check the instance version
// - Negotiate layers and extensions against what the loader offers
// - Route validation messages into the `log` facade

use super::guard::Guard;
use super::negotiate;
use crate::config::RendererConfig;
use crate::error::{CapabilityKind, Result, RhiError};
use ash::{vk, Entry};
use raw_window_handle::RawDisplayHandle;
use std::ffi::{CStr, CString};

pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Process-wide handle to the driver
pub struct Instance {
    pub entry: Entry,
    pub instance: ash::Instance,
    debug_utils: Option<(ash::extensions::ext::DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl Instance {
    pub fn new(config: &RendererConfig, display: RawDisplayHandle) -> Result<Self> {
        let entry = unsafe { Entry::load() }?;

        let version = entry
            .try_enumerate_instance_version()?
            .unwrap_or(vk::API_VERSION_1_0);
        if version < vk::API_VERSION_1_3 {
            return Err(RhiError::UnsupportedInstanceVersion {
                found: version,
                required: vk::API_VERSION_1_3,
            });
        }

        let validation = config.device.validation_layers;

        let optional_layers = if validation {
            vec![CString::from(VALIDATION_LAYER)]
        } else {
            Vec::new()
        };
        let layers = negotiate::negotiate(
            CapabilityKind::InstanceLayer,
            &negotiate::available_instance_layers(&entry)?,
            &[],
            &optional_layers,
        )?;
        if validation && layers.is_empty() {
            log::warn!("Validation requested but {:?} is not installed", VALIDATION_LAYER);
        }

        // Surface extensions for this platform are mandatory
        let required_extensions =
            unsafe { negotiate::from_raw_names(ash_window::enumerate_required_extensions(display)?) };
        let mut optional_extensions = vec![CString::from(vk::KhrPortabilityEnumerationFn::name())];
        if validation {
            optional_extensions.push(CString::from(ash::extensions::ext::DebugUtils::name()));
        }
        let extensions = negotiate::negotiate(
            CapabilityKind::InstanceExtension,
            &negotiate::available_instance_extensions(&entry)?,
            &required_extensions,
            &optional_extensions,
        )?;

        let instance = Guard::new(
            Self::create_instance(&entry, &config.window.title, &layers, &extensions)?,
            |instance: ash::Instance| unsafe { instance.destroy_instance(None) },
        );

        let debug_utils = if extensions
            .iter()
            .any(|e| e.as_c_str() == ash::extensions::ext::DebugUtils::name())
        {
            Some(Self::setup_debug_messenger(&entry, &instance)?)
        } else {
            None
        };

        log::info!(
            "Vulkan instance {}.{}.{} created ({} layer(s), {} extension(s))",
            vk::api_version_major(version),
            vk::api_version_minor(version),
            vk::api_version_patch(version),
            layers.len(),
            extensions.len()
        );

        Ok(Self {
            entry,
            instance: instance.into_inner(),
            debug_utils,
        })
    }

    fn create_instance(
        entry: &Entry,
        app_name: &str,
        layers: &[CString],
        extensions: &[CString],
    ) -> Result<ash::Instance> {
        let app_name_cstr = CString::new(app_name)
            .map_err(|_| RhiError::InvalidName(app_name.to_string()))?;
        let engine_name = c"vk-rhi";

        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_3);

        let layer_ptrs = negotiate::as_ptrs(layers);
        let extension_ptrs = negotiate::as_ptrs(extensions);

        let flags = if extensions
            .iter()
            .any(|e| e.as_c_str() == vk::KhrPortabilityEnumerationFn::name())
        {
            vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
        } else {
            vk::InstanceCreateFlags::empty()
        };

        let create_info = vk::InstanceCreateInfo::builder()
            .flags(flags)
            .application_info(&app_info)
            .enabled_layer_names(&layer_ptrs)
            .enabled_extension_names(&extension_ptrs);

        let instance = unsafe { entry.create_instance(&create_info, None) }?;
        Ok(instance)
    }

    fn setup_debug_messenger(
        entry: &Entry,
        instance: &ash::Instance,
    ) -> Result<(ash::extensions::ext::DebugUtils, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = ash::extensions::ext::DebugUtils::new(entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }?;

        Ok((debug_utils, messenger))
    }

    /// Destroy the debug messenger and the instance.
    ///
    /// Every surface and device created from this instance must already be gone.
    pub fn destroy(mut self) {
        log::info!("Destroying Vulkan instance...");
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan] {}", message.to_string_lossy());
        }
        _ => {
            log::debug!("[Vulkan] {}", message.to_string_lossy());
        }
    }

    vk::FALSE
}
