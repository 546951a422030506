//! Physical device (GPU) selection.
//!
//! The capability query inspects each adapter once, gathering its queue
//! families, device extensions and surface support into an
//! [`AdapterCandidate`]. Suitability is a pure predicate over that snapshot
//! and the first suitable adapter in enumeration order is chosen.
//!
//! # Example
//!
//! ```no_run
//! use triangle_core::Config;
//! use triangle_rhi::instance::Instance;
//! use triangle_rhi::physical_device::select_physical_device;
//! use ash::vk;
//!
//! let config = Config::default();
//! let instance = Instance::new(&config, &[]).expect("Failed to create instance");
//! // Assume surface is created from a window
//! let surface: vk::SurfaceKHR = vk::SurfaceKHR::null(); // placeholder
//! let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
//!
//! let adapter = select_physical_device(
//!     instance.handle(),
//!     surface,
//!     &surface_loader,
//!     &config.device_extensions,
//! )
//! .expect("Failed to select physical device");
//!
//! println!("Selected GPU: {:?}", adapter.device_name());
//! ```

use std::ffi::{CStr, CString};

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::{RhiError, RhiResult};

/// Queue family indices for graphics and presentation.
///
/// Both may name the same family.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Index of the queue family that supports graphics operations.
    pub graphics_family: Option<u32>,
    /// Index of the queue family that supports presentation to a surface.
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// Scans queue families in order, recording the first graphics-capable
    /// family and the first family `present_support` accepts. Stops as soon
    /// as both are known; families exposing zero queues are skipped.
    pub fn from_families(
        families: &[vk::QueueFamilyProperties],
        mut present_support: impl FnMut(u32) -> bool,
    ) -> Self {
        let mut indices = Self::default();

        for (i, family) in families.iter().enumerate() {
            let i = i as u32;

            if family.queue_count == 0 {
                continue;
            }

            if indices.graphics_family.is_none()
                && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
            {
                indices.graphics_family = Some(i);
            }

            if indices.present_family.is_none() && present_support(i) {
                indices.present_family = Some(i);
            }

            if indices.is_complete() {
                break;
            }
        }

        indices
    }

    /// Checks if both graphics and present families were found.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Returns whether graphics and presentation use different families.
    #[inline]
    pub fn is_split(&self) -> bool {
        self.graphics_family != self.present_family
    }

    /// Returns the unique queue family indices, graphics first.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(2);

        if let Some(graphics) = self.graphics_family {
            families.push(graphics);
        }
        if let Some(present) = self.present_family
            && !families.contains(&present)
        {
            families.push(present);
        }

        families
    }
}

/// Snapshot of one adapter's capabilities relevant to presenting to a
/// surface.
#[derive(Clone)]
pub struct AdapterCandidate {
    /// Vulkan physical device handle.
    pub device: vk::PhysicalDevice,
    /// Device properties (name, limits, API version, etc.).
    pub properties: vk::PhysicalDeviceProperties,
    /// Queue family indices for graphics and presentation.
    pub queue_families: QueueFamilyIndices,
    /// Device extensions the adapter advertises.
    pub available_extensions: Vec<CString>,
    /// Surface formats offered for the target surface.
    pub surface_formats: Vec<vk::SurfaceFormatKHR>,
    /// Present modes offered for the target surface.
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl AdapterCandidate {
    /// Gathers the capability snapshot for `device` against `surface`.
    pub fn query(
        instance: &ash::Instance,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> RhiResult<Self> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

        let queue_families = QueueFamilyIndices::from_families(&families, |index| unsafe {
            surface_loader
                .get_physical_device_surface_support(device, index, surface)
                .unwrap_or(false)
        });

        let available_extensions = unsafe {
            instance
                .enumerate_device_extension_properties(device)?
                .iter()
                .filter_map(|ext| ext.extension_name_as_c_str().ok().map(|name| name.to_owned()))
                .collect()
        };

        let (surface_formats, present_modes) = unsafe {
            (
                surface_loader
                    .get_physical_device_surface_formats(device, surface)
                    .map_err(|e| RhiError::SurfaceError(format!("Failed to query formats: {e}")))?,
                surface_loader
                    .get_physical_device_surface_present_modes(device, surface)
                    .map_err(|e| {
                        RhiError::SurfaceError(format!("Failed to query present modes: {e}"))
                    })?,
            )
        };

        Ok(Self {
            device,
            properties,
            queue_families,
            available_extensions,
            surface_formats,
            present_modes,
        })
    }

    /// Returns whether every extension in `required` is advertised.
    pub fn supports_extensions(&self, required: &[CString]) -> bool {
        required
            .iter()
            .all(|ext| self.available_extensions.iter().any(|avail| avail == ext))
    }

    /// The suitability predicate: complete queue families, all required
    /// extensions, and at least one surface format and present mode.
    pub fn is_suitable(&self, required: &[CString]) -> bool {
        self.queue_families.is_complete()
            && self.supports_extensions(required)
            && !self.surface_formats.is_empty()
            && !self.present_modes.is_empty()
    }

    /// Returns the device name as a string.
    pub fn device_name(&self) -> &str {
        self.properties
            .device_name_as_c_str()
            .ok()
            .and_then(|name| name.to_str().ok())
            .unwrap_or("Unknown Device")
    }

    /// Returns a human-readable string for the device type.
    pub fn device_type_name(&self) -> &'static str {
        match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
            vk::PhysicalDeviceType::CPU => "CPU",
            _ => "Other",
        }
    }

    /// Returns the Vulkan API version supported by the device.
    pub fn api_version(&self) -> (u32, u32, u32) {
        let version = self.properties.api_version;
        (
            vk::api_version_major(version),
            vk::api_version_minor(version),
            vk::api_version_patch(version),
        )
    }

    fn log_rejection(&self, required: &[CString]) {
        let missing: Vec<&CStr> = required
            .iter()
            .filter(|ext| !self.available_extensions.contains(*ext))
            .map(CString::as_c_str)
            .collect();
        debug!(
            "GPU '{}' skipped: graphics={} present={} missing_extensions={:?} formats={} present_modes={}",
            self.device_name(),
            self.queue_families.graphics_family.is_some(),
            self.queue_families.present_family.is_some(),
            missing,
            self.surface_formats.len(),
            self.present_modes.len()
        );
    }
}

impl std::fmt::Debug for AdapterCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (major, minor, patch) = self.api_version();
        f.debug_struct("AdapterCandidate")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("api_version", &format!("{}.{}.{}", major, minor, patch))
            .field("queue_families", &self.queue_families)
            .finish()
    }
}

/// Returns the first suitable candidate in enumeration order.
pub fn select_first_suitable(
    candidates: Vec<AdapterCandidate>,
    required: &[CString],
) -> Option<AdapterCandidate> {
    candidates.into_iter().find(|candidate| {
        let suitable = candidate.is_suitable(required);
        if !suitable {
            candidate.log_rejection(required);
        }
        suitable
    })
}

/// Keeps the adapters whose capability query succeeded. An adapter that
/// cannot be queried is unsuitable; it does not end the scan.
pub fn queried_candidates(
    results: impl IntoIterator<Item = RhiResult<AdapterCandidate>>,
) -> Vec<AdapterCandidate> {
    results
        .into_iter()
        .enumerate()
        .filter_map(|(index, result)| match result {
            Ok(candidate) => Some(candidate),
            Err(e) => {
                warn!("GPU {} skipped: capability query failed: {}", index, e);
                None
            }
        })
        .collect()
}

/// Enumerates adapters and selects the first one able to render to and
/// present on `surface`.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableAdapter`] if no adapter qualifies.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
    required_extensions: &[CString],
) -> RhiResult<AdapterCandidate> {
    let devices = unsafe { instance.enumerate_physical_devices()? };

    if devices.is_empty() {
        warn!("No Vulkan-capable GPUs found");
        return Err(RhiError::NoSuitableAdapter);
    }

    info!("Found {} GPU(s)", devices.len());

    let candidates = queried_candidates(
        devices
            .into_iter()
            .map(|device| AdapterCandidate::query(instance, device, surface, surface_loader)),
    );

    for candidate in &candidates {
        debug!("Candidate: {:?}", candidate);
    }

    let selected = select_first_suitable(candidates, required_extensions).ok_or_else(|| {
        warn!("No suitable GPU found with required capabilities");
        RhiError::NoSuitableAdapter
    })?;

    let (major, minor, patch) = selected.api_version();
    info!(
        "Selected GPU: '{}' ({}) - Vulkan {}.{}.{}, graphics family {:?}, present family {:?}",
        selected.device_name(),
        selected.device_type_name(),
        major,
        minor,
        patch,
        selected.queue_families.graphics_family,
        selected.queue_families.present_family
    );

    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags, count: u32) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: count,
            ..Default::default()
        }
    }

    fn swapchain_ext() -> Vec<CString> {
        vec![CString::new("VK_KHR_swapchain").unwrap()]
    }

    fn full_candidate() -> AdapterCandidate {
        AdapterCandidate {
            device: vk::PhysicalDevice::null(),
            properties: vk::PhysicalDeviceProperties::default(),
            queue_families: QueueFamilyIndices {
                graphics_family: Some(0),
                present_family: Some(0),
            },
            available_extensions: swapchain_ext(),
            surface_formats: vec![vk::SurfaceFormatKHR::default()],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        }
    }

    #[test]
    fn test_queue_family_indices_default() {
        let indices = QueueFamilyIndices::default();
        assert!(indices.graphics_family.is_none());
        assert!(indices.present_family.is_none());
        assert!(!indices.is_complete());
    }

    #[test]
    fn test_queue_family_indices_incomplete() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: None,
        };
        assert!(!indices.is_complete());

        let indices2 = QueueFamilyIndices {
            graphics_family: None,
            present_family: Some(0),
        };
        assert!(!indices2.is_complete());
    }

    #[test]
    fn test_unique_families() {
        let split = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(1),
        };
        assert!(split.is_split());
        assert_eq!(split.unique_families(), vec![0, 1]);

        let shared = QueueFamilyIndices {
            graphics_family: Some(2),
            present_family: Some(2),
        };
        assert!(!shared.is_split());
        assert_eq!(shared.unique_families(), vec![2]);
    }

    #[test]
    fn test_from_families_shared_family() {
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 4)];
        let indices = QueueFamilyIndices::from_families(&families, |_| true);
        assert_eq!(indices.graphics_family, Some(0));
        assert_eq!(indices.present_family, Some(0));
    }

    #[test]
    fn test_from_families_split_families() {
        let families = [
            family(vk::QueueFlags::GRAPHICS, 1),
            family(vk::QueueFlags::TRANSFER, 1),
        ];
        let indices = QueueFamilyIndices::from_families(&families, |i| i == 1);
        assert_eq!(indices.graphics_family, Some(0));
        assert_eq!(indices.present_family, Some(1));
    }

    #[test]
    fn test_from_families_skips_empty_and_stops_when_complete() {
        let families = [
            family(vk::QueueFlags::GRAPHICS, 0),
            family(vk::QueueFlags::GRAPHICS, 2),
            family(vk::QueueFlags::GRAPHICS, 2),
        ];
        let mut queried = Vec::new();
        let indices = QueueFamilyIndices::from_families(&families, |i| {
            queried.push(i);
            true
        });
        assert_eq!(indices.graphics_family, Some(1));
        assert_eq!(indices.present_family, Some(1));
        assert_eq!(queried, vec![1]);
    }

    #[test]
    fn test_from_families_without_present_support() {
        let families = [family(vk::QueueFlags::GRAPHICS, 1)];
        let indices = QueueFamilyIndices::from_families(&families, |_| false);
        assert!(!indices.is_complete());
    }

    #[test]
    fn test_is_suitable_requires_every_condition() {
        let required = swapchain_ext();
        assert!(full_candidate().is_suitable(&required));

        let mut no_present = full_candidate();
        no_present.queue_families.present_family = None;
        assert!(!no_present.is_suitable(&required));

        let mut no_ext = full_candidate();
        no_ext.available_extensions.clear();
        assert!(!no_ext.is_suitable(&required));

        let mut no_formats = full_candidate();
        no_formats.surface_formats.clear();
        assert!(!no_formats.is_suitable(&required));

        let mut no_modes = full_candidate();
        no_modes.present_modes.clear();
        assert!(!no_modes.is_suitable(&required));
    }

    #[test]
    fn test_selection_skips_graphics_only_adapter() {
        let required = swapchain_ext();

        let mut graphics_only = full_candidate();
        graphics_only.queue_families.present_family = None;
        graphics_only.properties.device_id = 1;

        let mut complete = full_candidate();
        complete.properties.device_id = 2;

        let selected = select_first_suitable(vec![graphics_only, complete], &required)
            .expect("second adapter qualifies");
        assert_eq!(selected.properties.device_id, 2);
    }

    #[test]
    fn test_selection_prefers_enumeration_order() {
        let required = swapchain_ext();

        let mut first = full_candidate();
        first.properties.device_id = 1;
        first.properties.device_type = vk::PhysicalDeviceType::INTEGRATED_GPU;

        let mut second = full_candidate();
        second.properties.device_id = 2;
        second.properties.device_type = vk::PhysicalDeviceType::DISCRETE_GPU;

        let selected = select_first_suitable(vec![first, second], &required).unwrap();
        assert_eq!(selected.properties.device_id, 1);
    }

    #[test]
    fn test_failed_query_does_not_end_scan() {
        let required = swapchain_ext();

        let mut complete = full_candidate();
        complete.properties.device_id = 2;

        let candidates = queried_candidates(vec![
            Err(RhiError::SurfaceError("surface lost".to_string())),
            Ok(complete),
        ]);
        assert_eq!(candidates.len(), 1);

        let selected = select_first_suitable(candidates, &required)
            .expect("queryable adapter qualifies");
        assert_eq!(selected.properties.device_id, 2);
    }

    #[test]
    fn test_selection_none_suitable() {
        let mut candidate = full_candidate();
        candidate.available_extensions.clear();
        assert!(select_first_suitable(vec![candidate], &swapchain_ext()).is_none());
    }
}
