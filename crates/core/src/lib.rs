//! Core utilities for the triangle renderer.
//!
//! This crate provides foundational types used across the workspace:
//! - Error types and result aliases
//! - Logging initialization
//! - Immutable configuration
//! - Frame rate statistics

mod config;
mod error;
mod frame_timer;
mod logging;

pub use config::{
    Config, DEFAULT_MAX_FRAMES_IN_FLIGHT, KHRONOS_VALIDATION_LAYER, SWAPCHAIN_EXTENSION,
};
pub use error::{Error, Result};
pub use frame_timer::{FrameRateSample, FrameTimer};
pub use logging::{DEFAULT_LOG_FILTER, init_logging};
