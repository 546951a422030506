//! Error types shared across the workspace.

use thiserror::Error;

/// Errors raised outside the Vulkan abstraction layer.
#[derive(Error, Debug)]
pub enum Error {
    /// Window creation or management errors
    #[error("Window error: {0}")]
    Window(String),

    /// Surface creation errors
    #[error("Surface error: {0}")]
    Surface(String),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias using the core Error type.
pub type Result<T> = std::result::Result<T, Error>;
