//! Triangle rendering on top of the Vulkan abstraction layer.
//!
//! - [`recorder`]: per-image command buffer recording
//! - [`frame_scheduler`]: the frames-in-flight protocol, independent of Vulkan
//! - [`frame_manager`]: Vulkan synchronization objects driving the protocol
//! - [`renderer`]: initialization, per-frame entry point and teardown

pub mod frame_manager;
pub mod frame_scheduler;
pub mod recorder;
pub mod renderer;

pub use frame_manager::FrameManager;
pub use frame_scheduler::{FrameBackend, FrameReport, FrameScheduler, SlotState};
pub use recorder::{CommandRecorder, RecordStep};
pub use renderer::TriangleRenderer;
