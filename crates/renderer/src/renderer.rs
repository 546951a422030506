//! Triangle renderer orchestration.
//!
//! [`TriangleRenderer`] builds every Vulkan object needed to draw a single
//! triangle into a window, records the per-image command buffers once, and
//! then hands each frame to the [`FrameManager`].

use std::sync::Arc;

use tracing::{error, info};

use triangle_core::Config;
use triangle_platform::{Surface, Window, required_instance_extensions};
use triangle_rhi::command::{CommandBuffer, CommandPool};
use triangle_rhi::device::Device;
use triangle_rhi::framebuffer::Framebuffer;
use triangle_rhi::instance::Instance;
use triangle_rhi::physical_device::select_physical_device;
use triangle_rhi::pipeline::{GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use triangle_rhi::render_pass::RenderPass;
use triangle_rhi::shader::{Shader, ShaderStage};
use triangle_rhi::swapchain::Swapchain;
use triangle_rhi::{RhiError, RhiResult};

use crate::frame_manager::FrameManager;
use crate::frame_scheduler::FrameReport;
use crate::recorder::CommandRecorder;

/// Owns all Vulkan state for the triangle demo.
///
/// # Resource Destruction Order
///
/// 1. Wait for the device to go idle
/// 2. Synchronization objects
/// 3. Command buffers and pool
/// 4. Framebuffers
/// 5. Pipeline, pipeline layout, render pass
/// 6. Swapchain and its image views
/// 7. Device
/// 8. Surface
/// 9. Instance (and debug messenger)
///
/// Steps 2 to 9 follow from field declaration order: keep the fields sorted
/// from last created to first created.
pub struct TriangleRenderer {
    frame_manager: FrameManager,
    command_buffers: Vec<CommandBuffer>,
    command_pool: CommandPool,
    framebuffers: Vec<Framebuffer>,
    pipeline: Pipeline,
    pipeline_layout: PipelineLayout,
    render_pass: RenderPass,
    swapchain: Swapchain,
    device: Arc<Device>,
    surface: Surface,
    instance: Instance,
}

impl TriangleRenderer {
    /// Runs the full initialization sequence for `window`.
    ///
    /// # Errors
    ///
    /// Returns the first failure; objects created before it are released.
    pub fn new(window: &Window, config: &Config) -> RhiResult<Self> {
        let (width, height) = window.framebuffer_size();
        info!("Initializing triangle renderer ({}x{})", width, height);

        let display_handle = window
            .raw_display_handle()
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;
        let surface_extensions = required_instance_extensions(display_handle)
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;

        let instance = Instance::new(config, &surface_extensions)?;

        let surface = window
            .create_surface(instance.entry(), instance.handle())
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;

        let adapter = select_physical_device(
            instance.handle(),
            surface.handle(),
            surface.loader(),
            &config.device_extensions,
        )?;

        let device = Device::new(&instance, &adapter, &config.device_extensions)?;

        let swapchain = Swapchain::new(
            &instance,
            device.clone(),
            surface.handle(),
            surface.loader(),
            width,
            height,
        )?;

        let render_pass = RenderPass::new_presentable(device.clone(), swapchain.format())?;

        let pipeline_layout = PipelineLayout::empty(device.clone())?;
        let pipeline = {
            let vertex_shader = Shader::from_spirv_file(
                device.clone(),
                &config.vertex_shader_path,
                ShaderStage::Vertex,
            )?;
            let fragment_shader = Shader::from_spirv_file(
                device.clone(),
                &config.fragment_shader_path,
                ShaderStage::Fragment,
            )?;

            // Shader modules are released at the end of this block.
            GraphicsPipelineBuilder::new()
                .vertex_shader(&vertex_shader)
                .fragment_shader(&fragment_shader)
                .render_pass(render_pass.handle(), 0)
                .extent(swapchain.extent())
                .build(device.clone(), &pipeline_layout)?
        };

        let framebuffers = Framebuffer::for_each_view(
            &device,
            render_pass.handle(),
            swapchain.image_views(),
            swapchain.extent(),
        )?;

        let graphics_family = device
            .queue_families()
            .graphics_family
            .ok_or(RhiError::NoSuitableAdapter)?;
        let command_pool = CommandPool::new(device.clone(), graphics_family)?;
        let command_buffers = command_pool.allocate_command_buffers(framebuffers.len() as u32)?;

        CommandRecorder::new(
            render_pass.handle(),
            pipeline.handle(),
            swapchain.extent(),
            config.clear_color,
        )
        .record_all(&command_buffers, &framebuffers)?;

        let frame_manager = FrameManager::new(device.clone(), config, swapchain.image_count())?;

        info!(
            "Renderer initialized: {} swapchain images, {} frames in flight",
            swapchain.image_count(),
            frame_manager.frames_in_flight()
        );

        Ok(Self {
            frame_manager,
            command_buffers,
            command_pool,
            framebuffers,
            pipeline,
            pipeline_layout,
            render_pass,
            swapchain,
            device,
            surface,
            instance,
        })
    }

    /// Acquires, submits and presents one frame.
    pub fn draw_frame(&mut self) -> RhiResult<FrameReport> {
        self.frame_manager
            .draw_frame(&self.swapchain, &self.command_buffers)
    }

    /// Blocks until the device has finished all submitted work.
    pub fn wait_idle(&self) -> RhiResult<()> {
        self.device.wait_idle()
    }

    /// Frames presented so far.
    pub fn frames_rendered(&self) -> u64 {
        self.frame_manager.scheduler().frames_rendered()
    }
}

impl Drop for TriangleRenderer {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            error!(
                "Failed to wait for device idle during renderer drop: {:?}",
                e
            );
        }

        // Fields are released next, in declaration order.
        info!("Device idle, releasing renderer resources");
    }
}
