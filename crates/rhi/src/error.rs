//! RHI-specific error types.

use std::path::PathBuf;

use ash::vk;
use thiserror::Error;

/// RHI-specific error type.
///
/// Each construction or per-frame step has its own variant so the caller can
/// tell which stage of the pipeline failed.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error not attributed to a specific stage
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] vk::Result),

    /// Failed to load Vulkan
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// Instance creation failed
    #[error("Failed to create Vulkan instance: {0}")]
    InstanceCreationFailed(vk::Result),

    /// Surface creation or query error
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// No adapter satisfies the suitability predicate
    #[error("No suitable GPU found")]
    NoSuitableAdapter,

    /// Logical device creation failed
    #[error("Failed to create logical device: {0}")]
    DeviceCreationFailed(vk::Result),

    /// Swapchain creation failed
    #[error("Failed to create swapchain: {0}")]
    SwapchainCreationFailed(vk::Result),

    /// Swapchain image view creation failed
    #[error("Failed to create image view: {0}")]
    ImageViewCreationFailed(vk::Result),

    /// Render pass creation failed
    #[error("Failed to create render pass: {0}")]
    RenderPassCreationFailed(vk::Result),

    /// Framebuffer creation failed
    #[error("Failed to create framebuffer: {0}")]
    FramebufferCreationFailed(vk::Result),

    /// Shader bytecode could not be read
    #[error("Failed to read shader '{}': {source}", path.display())]
    ShaderLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Shader bytecode rejected
    #[error("Invalid shader module: {0}")]
    ShaderModuleInvalid(String),

    /// Pipeline layout creation failed
    #[error("Failed to create pipeline layout: {0}")]
    PipelineLayoutFailed(vk::Result),

    /// Graphics pipeline creation failed
    #[error("Failed to create graphics pipeline: {0}")]
    PipelineCreationFailed(vk::Result),

    /// Command pool creation failed
    #[error("Failed to create command pool: {0}")]
    CommandPoolCreationFailed(vk::Result),

    /// Command buffer allocation failed
    #[error("Failed to allocate command buffers: {0}")]
    CommandBufferAllocationFailed(vk::Result),

    /// vkBeginCommandBuffer failed
    #[error("Failed to begin recording command buffer: {0}")]
    BeginRecordingFailed(vk::Result),

    /// vkEndCommandBuffer failed
    #[error("Failed to record command buffer: {0}")]
    EndRecordingFailed(vk::Result),

    /// Semaphore or fence creation failed
    #[error("Failed to create synchronization objects: {0}")]
    SyncObjectCreationFailed(vk::Result),

    /// Image acquisition failed
    #[error("Failed to acquire swapchain image: {0}")]
    AcquireFailed(vk::Result),

    /// Queue submission failed
    #[error("Failed to submit draw command buffer: {0}")]
    SubmitFailed(vk::Result),

    /// Presentation failed
    #[error("Failed to present swapchain image: {0}")]
    PresentFailed(vk::Result),

    /// The surface changed and the swapchain no longer matches it
    #[error("Swapchain is out of date with the surface")]
    SurfaceOutOfDate,

    /// A fence or acquire wait exceeded the configured timeout
    #[error("Timed out waiting for the GPU")]
    Timeout,

    /// The logical device was lost
    #[error("Device lost")]
    DeviceLost,

    /// Invalid configuration or argument
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RhiError {
    /// Map a per-frame failure, reserving `TIMEOUT` and `ERROR_DEVICE_LOST`
    /// for their dedicated variants.
    pub fn from_frame_result(result: vk::Result, fallback: fn(vk::Result) -> Self) -> Self {
        match result {
            vk::Result::TIMEOUT => Self::Timeout,
            vk::Result::ERROR_DEVICE_LOST => Self::DeviceLost,
            vk::Result::ERROR_OUT_OF_DATE_KHR => Self::SurfaceOutOfDate,
            other => fallback(other),
        }
    }
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
