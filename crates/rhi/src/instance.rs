//! Vulkan instance management.
//!
//! This module handles VkInstance creation, validation layers, and the debug
//! messenger that forwards validation output to `tracing`.
//!
//! # Example
//!
//! ```no_run
//! use triangle_core::Config;
//! use triangle_rhi::instance::Instance;
//!
//! let config = Config::default();
//! // Surface extensions normally come from the windowing layer.
//! let instance = Instance::new(&config, &[]).expect("Failed to create Vulkan instance");
//! let vk_instance = instance.handle();
//! ```

use std::ffi::{CStr, CString, c_char};

use ash::{Entry, vk};
use tracing::{debug, error, info, warn};

use triangle_core::Config;

use crate::error::{RhiError, RhiResult};

/// Vulkan instance wrapper with optional validation layer support.
///
/// Dropping it destroys the debug messenger first, then the instance.
pub struct Instance {
    entry: Entry,
    instance: ash::Instance,
    debug_utils: Option<ash::ext::debug_utils::Instance>,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    enabled_layers: Vec<CString>,
}

impl Instance {
    /// Creates a new Vulkan instance.
    ///
    /// # Arguments
    ///
    /// * `config` - Supplies the validation switch and layer names
    /// * `surface_extensions` - Instance extensions needed to create a surface
    ///   for the target window
    ///
    /// # Errors
    ///
    /// Returns an error if the Vulkan library cannot be loaded, instance
    /// creation fails, or the debug messenger cannot be created.
    pub fn new(config: &Config, surface_extensions: &[*const c_char]) -> RhiResult<Self> {
        let entry = unsafe { Entry::load()? };

        let enabled_layers = if config.enable_validation {
            let available = Self::available_layers(&entry)?;
            let (present, missing): (Vec<_>, Vec<_>) = config
                .validation_layers
                .iter()
                .cloned()
                .partition(|layer| available.contains(layer));
            for layer in &missing {
                warn!(
                    "Validation layer {:?} requested but not available, proceeding without it",
                    layer
                );
            }
            present
        } else {
            Vec::new()
        };
        let validation_available = !enabled_layers.is_empty();

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"Hello Triangle")
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"No Engine")
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let mut extensions = surface_extensions.to_vec();
        if validation_available {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
        }

        let layer_ptrs: Vec<*const c_char> =
            enabled_layers.iter().map(|layer| layer.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_ptrs);

        let instance = unsafe {
            entry
                .create_instance(&create_info, None)
                .map_err(RhiError::InstanceCreationFailed)?
        };

        info!(
            "Vulkan instance created ({} extensions, {} layers)",
            extensions.len(),
            layer_ptrs.len()
        );

        let (debug_utils, debug_messenger) = if validation_available {
            let debug_utils = ash::ext::debug_utils::Instance::new(&entry, &instance);
            match Self::setup_debug_messenger(&debug_utils) {
                Ok(messenger) => {
                    info!("Validation layers enabled, debug messenger created");
                    (Some(debug_utils), Some(messenger))
                }
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            (None, None)
        };

        Ok(Self {
            entry,
            instance,
            debug_utils,
            debug_messenger,
            enabled_layers,
        })
    }

    /// Returns the Vulkan instance handle.
    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    /// Returns the Vulkan entry point loader.
    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Returns whether validation layers are enabled.
    #[inline]
    pub fn has_validation(&self) -> bool {
        self.debug_messenger.is_some()
    }

    /// Layers actually enabled on the instance. Device creation passes the
    /// same list for older implementations that still honor device layers.
    pub fn enabled_layers(&self) -> &[CString] {
        &self.enabled_layers
    }

    fn available_layers(entry: &Entry) -> RhiResult<Vec<CString>> {
        let properties = unsafe { entry.enumerate_instance_layer_properties()? };
        Ok(properties
            .iter()
            .filter_map(|layer| layer.layer_name_as_c_str().ok().map(|name| name.to_owned()))
            .collect())
    }

    fn setup_debug_messenger(
        debug_utils: &ash::ext::debug_utils::Instance,
    ) -> RhiResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe {
            debug_utils
                .create_debug_utils_messenger(&create_info, None)
                .map_err(RhiError::from)?
        };

        Ok(messenger)
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let (Some(debug_utils), Some(messenger)) = (&self.debug_utils, self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        info!("Vulkan instance destroyed");
    }
}

/// Forwards validation layer messages to `tracing`.
///
/// # Safety
///
/// Called by the Vulkan loader with a callback data pointer that is valid for
/// the duration of the call.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }

    let callback_data = unsafe { &*p_callback_data };
    let message = if callback_data.p_message.is_null() {
        std::borrow::Cow::Borrowed("(no message)")
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message).to_string_lossy() }
    };

    let kind = message_kind(message_type);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => error!("[Vulkan {}] {}", kind, message),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => warn!("[Vulkan {}] {}", kind, message),
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => info!("[Vulkan {}] {}", kind, message),
        _ => debug!("[Vulkan {}] {}", kind, message),
    }

    // Never abort the triggering call.
    vk::FALSE
}

fn message_kind(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::GENERAL) {
        "General"
    } else {
        "Unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_creation_without_validation() {
        let config = Config::default().with_validation(false);
        match Instance::new(&config, &[]) {
            Ok(instance) => {
                assert!(!instance.has_validation());
                assert!(instance.enabled_layers().is_empty());
            }
            Err(RhiError::LoadingError(_) | RhiError::InstanceCreationFailed(_)) => {
                eprintln!("Skipping test: Vulkan not available");
            }
            Err(e) => {
                panic!("Unexpected error: {:?}", e);
            }
        }
    }

    #[test]
    fn test_instance_creation_with_validation() {
        let config = Config::default().with_validation(true);
        match Instance::new(&config, &[]) {
            Ok(instance) => {
                // Depends on whether the SDK layers are installed.
                if instance.has_validation() {
                    assert!(instance.debug_utils.is_some());
                    assert!(!instance.enabled_layers().is_empty());
                }
            }
            Err(RhiError::LoadingError(_) | RhiError::InstanceCreationFailed(_)) => {
                eprintln!("Skipping test: Vulkan not available");
            }
            Err(e) => {
                panic!("Unexpected error: {:?}", e);
            }
        }
    }

    #[test]
    fn test_message_kind_prefers_validation() {
        let flags = vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION;
        assert_eq!(message_kind(flags), "Validation");
        assert_eq!(
            message_kind(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE),
            "Performance"
        );
        assert_eq!(
            message_kind(vk::DebugUtilsMessageTypeFlagsEXT::empty()),
            "Unknown"
        );
    }
}
