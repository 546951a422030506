//! Immutable application configuration.
//!
//! Built once at startup and passed by reference to every component that
//! needs window dimensions, layer/extension lists, shader paths or frame
//! pacing parameters.

use std::ffi::CString;
use std::path::PathBuf;

use crate::{Error, Result};

/// Khronos validation layer name.
pub const KHRONOS_VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

/// Swapchain device extension name.
pub const SWAPCHAIN_EXTENSION: &str = "VK_KHR_swapchain";

/// Default number of frames the CPU may record ahead of the GPU.
pub const DEFAULT_MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Configuration shared by the window, device and renderer.
#[derive(Debug, Clone)]
pub struct Config {
    /// Window width in pixels.
    pub window_width: u32,
    /// Window height in pixels.
    pub window_height: u32,
    /// Window title.
    pub window_title: String,
    /// Enable validation layers and the debug messenger.
    pub enable_validation: bool,
    /// Instance layers requested when validation is enabled.
    pub validation_layers: Vec<CString>,
    /// Device extensions every adapter must support.
    pub device_extensions: Vec<CString>,
    /// Number of in-flight frame slots.
    pub max_frames_in_flight: usize,
    /// SPIR-V vertex shader path.
    pub vertex_shader_path: PathBuf,
    /// SPIR-V fragment shader path.
    pub fragment_shader_path: PathBuf,
    /// Fence and acquire timeout in nanoseconds. `u64::MAX` waits forever.
    pub fence_timeout_ns: u64,
    /// Render pass clear color (RGBA).
    pub clear_color: [f32; 4],
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_width: 800,
            window_height: 600,
            window_title: "Vulkan".to_string(),
            enable_validation: cfg!(debug_assertions),
            validation_layers: vec![cstring(KHRONOS_VALIDATION_LAYER)],
            device_extensions: vec![cstring(SWAPCHAIN_EXTENSION)],
            max_frames_in_flight: DEFAULT_MAX_FRAMES_IN_FLIGHT,
            vertex_shader_path: PathBuf::from("res/shaders/vert.spv"),
            fragment_shader_path: PathBuf::from("res/shaders/frag.spv"),
            fence_timeout_ns: u64::MAX,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl Config {
    /// Set the window size.
    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window_width = width;
        self.window_height = height;
        self
    }

    /// Set the window title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.window_title = title.into();
        self
    }

    /// Enable or disable validation layers.
    pub fn with_validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Set the number of in-flight frame slots.
    pub fn with_max_frames_in_flight(mut self, frames: usize) -> Self {
        self.max_frames_in_flight = frames;
        self
    }

    /// Set both shader paths.
    pub fn with_shader_paths(
        mut self,
        vertex: impl Into<PathBuf>,
        fragment: impl Into<PathBuf>,
    ) -> Self {
        self.vertex_shader_path = vertex.into();
        self.fragment_shader_path = fragment.into();
        self
    }

    /// Set the fence timeout in nanoseconds.
    pub fn with_fence_timeout_ns(mut self, timeout: u64) -> Self {
        self.fence_timeout_ns = timeout;
        self
    }

    /// Set the clear color.
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Check that the configuration can drive a renderer.
    pub fn validate(&self) -> Result<()> {
        if self.window_width == 0 || self.window_height == 0 {
            return Err(Error::Config(format!(
                "window size must be non-zero, got {}x{}",
                self.window_width, self.window_height
            )));
        }
        if self.max_frames_in_flight == 0 {
            return Err(Error::Config(
                "max_frames_in_flight must be at least 1".to_string(),
            ));
        }
        if self.fence_timeout_ns == 0 {
            return Err(Error::Config("fence_timeout_ns must be non-zero".to_string()));
        }
        if !self
            .device_extensions
            .iter()
            .any(|ext| ext.as_bytes() == SWAPCHAIN_EXTENSION.as_bytes())
        {
            return Err(Error::Config(format!(
                "device_extensions must include {SWAPCHAIN_EXTENSION}"
            )));
        }
        Ok(())
    }
}

fn cstring(name: &str) -> CString {
    // Constant names contain no interior NUL.
    CString::new(name).unwrap_or_default()
}
