//! Application runner and event loop.

use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;
use trigon_platform::{create_event_loop, is_exit_request, PlatformError, SurfaceEvent};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow};
use winit::window::WindowId;

use crate::config::AppConfig;
use crate::context::AppContext;

/// Run the triangle presenter until the window closes or a fatal error occurs.
///
/// The window and presenter are built on the first resume. Returns the first
/// fatal error once the GPU has been drained and every resource released.
pub fn run_app(config: AppConfig) -> anyhow::Result<()> {
    init_logging();

    info!("{} starting...", config.title);

    let event_loop = create_event_loop()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = AppRunner {
        config,
        state: None,
        error: None,
    };

    event_loop
        .run_app(&mut runner)
        .map_err(|e| PlatformError::EventLoop(e.to_string()))?;

    runner.error.map_or(Ok(()), Err)
}

fn init_logging() {
    // A subscriber installed by an embedding program takes precedence.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

/// Internal application runner that implements winit's ApplicationHandler.
struct AppRunner {
    config: AppConfig,
    state: Option<AppContext>,
    /// First fatal error; reported once the loop has exited.
    error: Option<anyhow::Error>,
}

impl ApplicationHandler for AppRunner {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() || self.error.is_some() {
            return;
        }

        info!("Creating application state...");

        match self.create_state(event_loop) {
            Ok(state) => {
                self.state = Some(state);
                info!("Application ready!");
            }
            Err(e) => self.fail(event_loop, e.context("Failed to initialize application")),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if is_exit_request(&event) {
            info!("Exit requested");
            self.stop(event_loop);
            return;
        }

        let Some(state) = &mut self.state else {
            return;
        };

        if let Some(surface_event) = SurfaceEvent::from_window_event(&event) {
            debug!("Surface event: {surface_event:?}");
            state.push_surface_event(surface_event);
            state.window.request_redraw();
            return;
        }

        if matches!(event, WindowEvent::RedrawRequested) {
            if let Err(e) = state.render_frame() {
                self.fail(event_loop, anyhow::Error::new(e).context("Render error"));
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(state) = &self.state else {
            return;
        };

        // A minimized window produces no frames; sleep until the next event.
        if state.is_stalled() {
            event_loop.set_control_flow(ControlFlow::Wait);
        } else {
            event_loop.set_control_flow(ControlFlow::Poll);
            state.window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.release();
    }
}

impl AppRunner {
    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppContext> {
        let window = self.config.platform().create_window(event_loop)?;
        AppContext::new(window, &self.config)
    }

    /// Record a fatal error, release everything and leave the loop.
    fn fail(&mut self, event_loop: &ActiveEventLoop, e: anyhow::Error) {
        error!("{e:#}");
        if self.error.is_none() {
            self.error = Some(e);
        }
        self.stop(event_loop);
    }

    fn stop(&mut self, event_loop: &ActiveEventLoop) {
        self.release();
        event_loop.exit();
    }

    fn release(&mut self) {
        let Some(mut state) = self.state.take() else {
            return;
        };

        if let Err(e) = state.shutdown() {
            error!("Shutdown failed: {e}");
            if self.error.is_none() {
                self.error = Some(anyhow::Error::new(e).context("Shutdown failed"));
            }
        }
    }
}
