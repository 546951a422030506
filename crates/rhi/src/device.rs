//! Vulkan logical device and queue binding.
//!
//! The [`Device`] owns the logical device created on the selected adapter
//! and the graphics and present queues retrieved from it. When both roles
//! live in the same family a single queue is created and bound twice.
//!
//! # Example
//!
//! ```no_run
//! use triangle_core::Config;
//! use triangle_rhi::instance::Instance;
//! use triangle_rhi::physical_device::select_physical_device;
//! use triangle_rhi::device::Device;
//! use ash::vk;
//!
//! let config = Config::default();
//! let instance = Instance::new(&config, &[]).expect("Failed to create instance");
//! let surface: vk::SurfaceKHR = vk::SurfaceKHR::null(); // placeholder
//! let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
//!
//! let adapter = select_physical_device(
//!     instance.handle(),
//!     surface,
//!     &surface_loader,
//!     &config.device_extensions,
//! )
//! .expect("No suitable GPU found");
//!
//! let device = Device::new(&instance, &adapter, &config.device_extensions)
//!     .expect("Failed to create logical device");
//!
//! let graphics_queue = device.graphics_queue();
//! let present_queue = device.present_queue();
//! ```

use std::ffi::{CString, c_char};
use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::physical_device::{AdapterCandidate, QueueFamilyIndices};

/// Queue priority used for every created queue.
const QUEUE_PRIORITY: [f32; 1] = [1.0];

/// Vulkan logical device wrapper.
///
/// Shared through `Arc` by every object that must be destroyed before it.
pub struct Device {
    device: ash::Device,
    physical_device: vk::PhysicalDevice,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    queue_families: QueueFamilyIndices,
}

impl Device {
    /// Creates the logical device with one queue per unique family.
    ///
    /// # Arguments
    ///
    /// * `instance` - The Vulkan instance; its enabled layers are forwarded
    /// * `adapter` - The selected adapter; its queue families must be complete
    /// * `extensions` - Device extensions to enable
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::NoSuitableAdapter`] if the adapter's queue families
    /// are incomplete and [`RhiError::DeviceCreationFailed`] if the driver
    /// rejects the device.
    pub fn new(
        instance: &Instance,
        adapter: &AdapterCandidate,
        extensions: &[CString],
    ) -> RhiResult<Arc<Self>> {
        let queue_families = adapter.queue_families;
        let (Some(graphics_family), Some(present_family)) =
            (queue_families.graphics_family, queue_families.present_family)
        else {
            return Err(RhiError::NoSuitableAdapter);
        };

        let queue_create_infos = queue_create_infos(&queue_families);

        debug!(
            "Creating {} queue(s) for families: {:?}",
            queue_create_infos.len(),
            queue_families.unique_families()
        );

        let features = vk::PhysicalDeviceFeatures::default();

        let extension_names: Vec<*const c_char> =
            extensions.iter().map(|ext| ext.as_ptr()).collect();
        let layer_names: Vec<*const c_char> = instance
            .enabled_layers()
            .iter()
            .map(|layer| layer.as_ptr())
            .collect();

        // Device layers are deprecated but still honored by older loaders.
        #[allow(deprecated)]
        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_layer_names(&layer_names)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .handle()
                .create_device(adapter.device, &create_info, None)
                .map_err(RhiError::DeviceCreationFailed)?
        };

        info!(
            "Logical device created on '{}' with {} extension(s)",
            adapter.device_name(),
            extension_names.len()
        );

        let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };
        debug!("Graphics queue retrieved from family {}", graphics_family);

        let present_queue = unsafe { device.get_device_queue(present_family, 0) };
        debug!("Present queue retrieved from family {}", present_family);

        Ok(Arc::new(Self {
            device,
            physical_device: adapter.device,
            graphics_queue,
            present_queue,
            queue_families,
        }))
    }

    /// Returns the Vulkan logical device handle.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Returns the physical device handle.
    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Returns the graphics queue handle.
    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Returns the presentation queue handle.
    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Returns the queue family indices.
    #[inline]
    pub fn queue_families(&self) -> &QueueFamilyIndices {
        &self.queue_families
    }

    /// Blocks until all outstanding work on all queues has completed.
    pub fn wait_idle(&self) -> RhiResult<()> {
        unsafe {
            self.device
                .device_wait_idle()
                .map_err(|e| RhiError::from_frame_result(e, RhiError::VulkanError))?
        };
        Ok(())
    }

    /// Submits command buffers to the graphics queue.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    /// - All command buffers are valid and recorded
    /// - Every referenced semaphore and the fence are not in use by another
    ///   pending submission
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SubmitFailed`], or [`RhiError::DeviceLost`] when
    /// the device was lost.
    pub unsafe fn submit_graphics(
        &self,
        submit_infos: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> RhiResult<()> {
        unsafe {
            self.device
                .queue_submit(self.graphics_queue, submit_infos, fence)
                .map_err(|e| RhiError::from_frame_result(e, RhiError::SubmitFailed))?;
        }
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                tracing::error!("Failed to wait for device idle during drop: {:?}", e);
            }
            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// Safety: ash::Device is Send+Sync and the remaining fields are plain
// handles or Copy data.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

/// Builds one queue create info per unique family, each requesting a single
/// queue at priority 1.0.
fn queue_create_infos(families: &QueueFamilyIndices) -> Vec<vk::DeviceQueueCreateInfo<'static>> {
    families
        .unique_families()
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(&QUEUE_PRIORITY)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_create_infos_deduplicated() {
        let shared = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
        };
        let infos = queue_create_infos(&shared);
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].queue_family_index, 0);
        assert_eq!(infos[0].queue_count, 1);
    }

    #[test]
    fn test_queue_create_infos_split() {
        let split = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(2),
        };
        let infos = queue_create_infos(&split);
        let families: Vec<u32> = infos.iter().map(|i| i.queue_family_index).collect();
        assert_eq!(families, vec![0, 2]);
        for info in &infos {
            assert_eq!(info.queue_count, 1);
            // SAFETY: points at QUEUE_PRIORITY.
            assert_eq!(unsafe { *info.p_queue_priorities }, 1.0);
        }
    }

    #[test]
    fn test_device_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Device>();
    }
}
