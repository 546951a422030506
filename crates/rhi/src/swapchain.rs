//! Presentable image chain.
//!
//! This module negotiates the swapchain against the surface (image count,
//! format, present mode, extent, sharing mode), creates one color view per
//! image, and wraps image acquisition and presentation.
//!
//! The chain is created once. Out-of-date surfaces are reported as
//! [`RhiError::SurfaceOutOfDate`] rather than triggering recreation.
//!
//! # Example
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use triangle_rhi::{device::Device, instance::Instance, swapchain::Swapchain, vk};
//! # fn demo(instance: &Instance, device: Arc<Device>, surface: vk::SurfaceKHR,
//! #         loader: &ash::khr::surface::Instance, semaphore: vk::Semaphore)
//! #         -> triangle_rhi::RhiResult<()> {
//! let swapchain = Swapchain::new(instance, device.clone(), surface, loader, 800, 600)?;
//!
//! let image_index = swapchain.acquire_next_image(semaphore, u64::MAX)?;
//! // ... submit work rendering into swapchain.image_views()[image_index as usize] ...
//! swapchain.present(device.present_queue(), image_index, semaphore)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;

/// Preferred surface format and color space pair.
pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Swapchain surface support details.
#[derive(Debug, Clone)]
pub struct SwapchainSupportDetails {
    /// Surface capabilities (min/max image count, extents, transforms, etc.)
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats (format and color space combinations)
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes (FIFO, MAILBOX, IMMEDIATE, etc.)
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    /// Queries swapchain support details for a physical device and surface.
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> RhiResult<Self> {
        let surface_err = |what: &str, e: vk::Result| {
            RhiError::SurfaceError(format!("Failed to query surface {what}: {e}"))
        };

        let capabilities = unsafe {
            surface_loader
                .get_physical_device_surface_capabilities(physical_device, surface)
                .map_err(|e| surface_err("capabilities", e))?
        };

        let formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(physical_device, surface)
                .map_err(|e| surface_err("formats", e))?
        };

        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(physical_device, surface)
                .map_err(|e| surface_err("present modes", e))?
        };

        debug!(
            "Swapchain support: {} formats, {} present modes, image count: {}-{}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            max_image_count_label(&capabilities)
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// Returns true if at least one format and one present mode are available.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Vulkan swapchain wrapper.
///
/// Owns the swapchain handle and one image view per swapchain image. The
/// images themselves belong to the swapchain.
pub struct Swapchain {
    device: Arc<Device>,
    swapchain_loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::Format,
    color_space: vk::ColorSpaceKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
    suboptimal_reported: AtomicBool,
}

impl Swapchain {
    /// Creates the swapchain and its image views.
    ///
    /// `width` and `height` are the window framebuffer size, used only when
    /// the surface leaves the extent to the application.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SurfaceError`] if the surface cannot be queried,
    /// [`RhiError::SwapchainCreationFailed`] or
    /// [`RhiError::ImageViewCreationFailed`] on creation failures.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
        width: u32,
        height: u32,
    ) -> RhiResult<Self> {
        let swapchain_loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());

        let support =
            SwapchainSupportDetails::query(device.physical_device(), surface, surface_loader)?;

        let surface_format = choose_surface_format(&support.formats).ok_or_else(|| {
            RhiError::SurfaceError("Surface reports no supported formats".to_string())
        })?;
        let present_mode = choose_present_mode(&support.present_modes);
        let extent = choose_extent(&support.capabilities, width, height);
        let image_count = determine_image_count(&support.capabilities);

        info!(
            "Creating swapchain: {}x{}, format {:?}, color space {:?}, present mode {:?}, {} images",
            extent.width,
            extent.height,
            surface_format.format,
            surface_format.color_space,
            present_mode,
            image_count
        );

        let queue_families = device.queue_families();
        let (Some(graphics_family), Some(present_family)) =
            (queue_families.graphics_family, queue_families.present_family)
        else {
            return Err(RhiError::NoSuitableAdapter);
        };
        let queue_family_indices = [graphics_family, present_family];

        let (sharing_mode, queue_family_indices_slice) = if graphics_family != present_family {
            debug!(
                "Using CONCURRENT sharing mode between graphics ({}) and present ({}) queues",
                graphics_family, present_family
            );
            (vk::SharingMode::CONCURRENT, queue_family_indices.as_slice())
        } else {
            debug!("Using EXCLUSIVE sharing mode (same queue family for graphics and present)");
            (vk::SharingMode::EXCLUSIVE, &[][..])
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(queue_family_indices_slice)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let swapchain = unsafe {
            swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(RhiError::SwapchainCreationFailed)?
        };

        let images = match unsafe { swapchain_loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(RhiError::SwapchainCreationFailed(e));
            }
        };
        info!("Swapchain created with {} images", images.len());

        let image_views = match create_image_views(&device, &images, surface_format.format) {
            Ok(views) => views,
            Err(e) => {
                unsafe { swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(e);
            }
        };

        Ok(Self {
            device,
            swapchain_loader,
            swapchain,
            images,
            image_views,
            format: surface_format.format,
            color_space: surface_format.color_space,
            extent,
            present_mode,
            suboptimal_reported: AtomicBool::new(false),
        })
    }

    /// Acquires the next presentable image, signaling `semaphore` once the
    /// presentation engine has released it.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SurfaceOutOfDate`], [`RhiError::Timeout`],
    /// [`RhiError::DeviceLost`] or [`RhiError::AcquireFailed`].
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore, timeout: u64) -> RhiResult<u32> {
        let (image_index, suboptimal) = unsafe {
            self.swapchain_loader
                .acquire_next_image(self.swapchain, timeout, semaphore, vk::Fence::null())
                .map_err(|e| RhiError::from_frame_result(e, RhiError::AcquireFailed))?
        };

        if suboptimal {
            self.report_suboptimal();
        }

        Ok(image_index)
    }

    /// Queues `image_index` for presentation once `wait_semaphore` signals.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SurfaceOutOfDate`], [`RhiError::DeviceLost`] or
    /// [`RhiError::PresentFailed`].
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> RhiResult<()> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let suboptimal = unsafe {
            self.swapchain_loader
                .queue_present(queue, &present_info)
                .map_err(|e| RhiError::from_frame_result(e, RhiError::PresentFailed))?
        };

        if suboptimal {
            self.report_suboptimal();
        }

        Ok(())
    }

    fn report_suboptimal(&self) {
        if !self.suboptimal_reported.swap(true, Ordering::Relaxed) {
            warn!("Swapchain is suboptimal for the surface; continuing without recreation");
        }
    }

    /// Returns the swapchain handle.
    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Returns the swapchain image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Returns the swapchain color space.
    #[inline]
    pub fn color_space(&self) -> vk::ColorSpaceKHR {
        self.color_space
    }

    /// Returns the swapchain extent (resolution).
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Returns the present mode.
    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Returns the number of swapchain images.
    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Returns all image views.
    #[inline]
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        for &image_view in &self.image_views {
            unsafe {
                self.device.handle().destroy_image_view(image_view, None);
            }
        }

        unsafe {
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }

        info!(
            "Swapchain destroyed (was {}x{}, {} images)",
            self.extent.width,
            self.extent.height,
            self.images.len()
        );
    }
}

fn max_image_count_label(capabilities: &vk::SurfaceCapabilitiesKHR) -> String {
    if capabilities.max_image_count == 0 {
        "unlimited".to_string()
    } else {
        capabilities.max_image_count.to_string()
    }
}

/// Chooses the surface format.
///
/// Picks [`PREFERRED_SURFACE_FORMAT`] wherever it appears in the list,
/// otherwise the first entry. Returns `None` only for an empty list.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    let preferred = formats.iter().find(|f| {
        f.format == PREFERRED_SURFACE_FORMAT.format
            && f.color_space == PREFERRED_SURFACE_FORMAT.color_space
    });

    if let Some(&format) = preferred {
        debug!("Selected preferred surface format: B8G8R8A8_SRGB with SRGB_NONLINEAR");
        return Some(format);
    }

    let first = formats.first().copied()?;
    warn!(
        "Preferred surface format unavailable, using {:?} / {:?}",
        first.format, first.color_space
    );
    Some(first)
}

/// Chooses MAILBOX when offered, otherwise FIFO (always available).
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        debug!("Selected MAILBOX present mode");
        return vk::PresentModeKHR::MAILBOX;
    }

    debug!("Selected FIFO present mode (vsync)");
    vk::PresentModeKHR::FIFO
}

/// Chooses the swapchain extent.
///
/// Uses the surface's current extent unless its width is the `u32::MAX`
/// sentinel, in which case the window framebuffer size is clamped into the
/// surface's min/max extents.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        debug!(
            "Using current surface extent: {}x{}",
            capabilities.current_extent.width, capabilities.current_extent.height
        );
        return capabilities.current_extent;
    }

    let extent = vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    };

    debug!(
        "Calculated extent: {}x{} (requested: {}x{}, min: {}x{}, max: {}x{})",
        extent.width,
        extent.height,
        width,
        height,
        capabilities.min_image_extent.width,
        capabilities.min_image_extent.height,
        capabilities.max_image_extent.width,
        capabilities.max_image_extent.height
    );

    extent
}

/// Requests one image more than the minimum, clamped to the maximum unless
/// the maximum is 0 (unbounded).
pub fn determine_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let preferred = capabilities.min_image_count + 1;

    let image_count = if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    };

    debug!(
        "Image count: {} (min: {}, max: {})",
        image_count,
        capabilities.min_image_count,
        max_image_count_label(capabilities)
    );

    image_count
}

/// Creates one 2D color view per swapchain image.
fn create_image_views(
    device: &Device,
    images: &[vk::Image],
    format: vk::Format,
) -> RhiResult<Vec<vk::ImageView>> {
    let mut image_views = Vec::with_capacity(images.len());

    for &image in images {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        match unsafe { device.handle().create_image_view(&create_info, None) } {
            Ok(view) => image_views.push(view),
            Err(e) => {
                for &view in &image_views {
                    unsafe { device.handle().destroy_image_view(view, None) };
                }
                return Err(RhiError::ImageViewCreationFailed(e));
            }
        }
    }

    debug!("Created {} image views", image_views.len());
    Ok(image_views)
}
