// Capability negotiation
//
// Intersects what the driver offers with what we require and what we would
// like to have. Runs once for the instance (layers + extensions) and once per
// candidate GPU (device extensions).

use crate::error::{CapabilityKind, Result, RhiError};
use ash::{vk, Entry};
use std::collections::HashSet;
use std::ffi::{c_char, CStr, CString};

/// Accept every required entry plus whichever optional entries are available.
///
/// Fails if any required entry is missing. Absent optional entries are dropped
/// without error. Order is required entries first, then optional ones, without
/// duplicates.
pub fn negotiate(
    kind: CapabilityKind,
    available: &HashSet<CString>,
    required: &[CString],
    optional: &[CString],
) -> Result<Vec<CString>> {
    let missing: Vec<String> = required
        .iter()
        .filter(|name| !available.contains(*name))
        .map(|name| name.to_string_lossy().into_owned())
        .collect();

    if !missing.is_empty() {
        return Err(RhiError::MissingCapabilities { kind, missing });
    }

    let mut accepted: Vec<CString> = Vec::with_capacity(required.len() + optional.len());
    for name in required {
        if !accepted.contains(name) {
            accepted.push(name.clone());
        }
    }

    for name in optional {
        if available.contains(name) {
            if !accepted.contains(name) {
                accepted.push(name.clone());
            }
        } else {
            log::debug!("Optional {} {:?} not available, skipping", kind, name);
        }
    }

    Ok(accepted)
}

/// Check-only form of [`negotiate`] used while judging device compatibility
pub fn missing(available: &HashSet<CString>, required: &[CString]) -> Vec<String> {
    required
        .iter()
        .filter(|name| !available.contains(*name))
        .map(|name| name.to_string_lossy().into_owned())
        .collect()
}

pub fn to_cstrings<S: AsRef<str>>(names: &[S]) -> Result<Vec<CString>> {
    names
        .iter()
        .map(|name| {
            CString::new(name.as_ref()).map_err(|_| RhiError::InvalidName(name.as_ref().to_string()))
        })
        .collect()
}

/// Copy a static list of C string pointers (as handed out by ash-window)
///
/// # Safety
/// Every pointer must reference a valid NUL-terminated string.
pub unsafe fn from_raw_names(names: &[*const c_char]) -> Vec<CString> {
    names
        .iter()
        .map(|&ptr| CStr::from_ptr(ptr).to_owned())
        .collect()
}

pub fn as_ptrs(names: &[CString]) -> Vec<*const c_char> {
    names.iter().map(|name| name.as_ptr()).collect()
}

fn fixed_name(raw: &[c_char]) -> CString {
    // Vulkan guarantees NUL termination inside the fixed-size array
    unsafe { CStr::from_ptr(raw.as_ptr()) }.to_owned()
}

pub fn available_instance_layers(entry: &Entry) -> Result<HashSet<CString>> {
    let layers = entry.enumerate_instance_layer_properties()?;
    Ok(layers.iter().map(|l| fixed_name(&l.layer_name)).collect())
}

pub fn available_instance_extensions(entry: &Entry) -> Result<HashSet<CString>> {
    let extensions = entry.enumerate_instance_extension_properties(None)?;
    Ok(extensions
        .iter()
        .map(|e| fixed_name(&e.extension_name))
        .collect())
}

pub fn available_device_extensions(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> Result<HashSet<CString>> {
    let extensions = unsafe { instance.enumerate_device_extension_properties(physical_device) }?;
    Ok(extensions
        .iter()
        .map(|e| fixed_name(&e.extension_name))
        .collect())
}
