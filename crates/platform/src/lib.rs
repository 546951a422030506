//! Platform abstraction layer for the triangle renderer.
//!
//! This crate provides:
//! - Window management via winit
//! - Vulkan surface creation and the instance extensions it requires

mod window;

pub use window::{Surface, Window, required_instance_extensions};

// Re-export winit types that users might need
pub use winit::event::WindowEvent;
pub use winit::event_loop::{ActiveEventLoop, EventLoop};
