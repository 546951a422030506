//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! This crate provides owned wrappers over Vulkan objects using the `ash`
//! crate. It handles:
//! - Instance creation and validation messaging
//! - Adapter capability query and selection
//! - Logical device and queue binding
//! - Swapchain negotiation, acquisition and presentation
//! - Render pass, framebuffers, shaders and the graphics pipeline
//! - Command pools and command buffer recording
//! - Synchronization primitives
//!
//! Every wrapper releases its Vulkan object on drop. Objects created from the
//! logical device hold an `Arc<Device>`, so the device outlives them.

mod error;

pub mod command;
pub mod device;
pub mod framebuffer;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod swapchain;
pub mod sync;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
