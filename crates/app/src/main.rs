//! Hello Triangle - Main Entry Point
//!
//! Opens a fixed-size window and draws a single triangle with Vulkan until
//! the window is closed.

use anyhow::{Result, anyhow};
use tracing::{debug, error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use triangle_core::{Config, FrameTimer};
use triangle_platform::Window;
use triangle_renderer::TriangleRenderer;

struct App {
    config: Config,
    // Field order matters: the renderer must drop before its window.
    renderer: Option<TriangleRenderer>,
    window: Option<Window>,
    frame_timer: FrameTimer,
    error: Option<anyhow::Error>,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            config,
            renderer: None,
            window: None,
            frame_timer: FrameTimer::default(),
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{:#}", err);
        self.error = Some(err);
        event_loop.exit();
    }

    /// Finish outstanding GPU work and release the renderer before the window.
    fn shutdown(&mut self) {
        if let Some(renderer) = self.renderer.take() {
            if let Err(e) = renderer.wait_idle() {
                error!("Failed to wait for device idle on shutdown: {:?}", e);
            }
            info!("Rendered {} frames", renderer.frames_rendered());
        }
        self.window = None;
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match Window::new(event_loop, &self.config) {
            Ok(window) => window,
            Err(e) => {
                self.fail(event_loop, anyhow!("Failed to create window: {}", e));
                return;
            }
        };

        match TriangleRenderer::new(&window, &self.config) {
            Ok(renderer) => {
                info!("Initialization complete, entering main loop");
                self.renderer = Some(renderer);
                self.window = Some(window);
            }
            Err(e) => {
                self.fail(event_loop, anyhow!("Failed to create renderer: {}", e));
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                let Some(renderer) = self.renderer.as_mut() else {
                    return;
                };

                match renderer.draw_frame() {
                    Ok(report) => {
                        debug!(
                            "slot {} image {} (waited on {:?})",
                            report.slot, report.image_index, report.waited_on_slot
                        );
                        if let Some(sample) = self.frame_timer.record_frame() {
                            info!(
                                "{:.1} fps ({:.2} ms/frame, {} total)",
                                sample.fps(),
                                sample.frame_time_ms(),
                                sample.total_frames
                            );
                        }
                    }
                    Err(e) => self.fail(event_loop, anyhow!("Render error: {}", e)),
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if event_loop.exiting() {
            return;
        }
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.shutdown();
    }
}

fn main() -> Result<()> {
    triangle_core::init_logging();
    info!("Starting Hello Triangle");

    let config = Config::default();
    config.validate()?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;
    app.shutdown();

    match app.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
