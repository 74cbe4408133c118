//! Platform abstraction for Trigon.
//!
//! Provides window configuration and the surface event channel that carries
//! resize notifications from the winit handler to the renderer.

mod events;

pub use events::{SurfaceEvent, SurfaceEvents};

use std::sync::Arc;

use thiserror::Error;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowAttributes};

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Window creation failed: {0}")]
    WindowCreation(String),
    #[error("Event loop error: {0}")]
    EventLoop(String),
}

pub type Result<T> = std::result::Result<T, PlatformError>;

/// Platform configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            title: "Vulkan".to_string(),
            width: 800,
            height: 600,
            resizable: true,
        }
    }
}

impl PlatformConfig {
    /// Window attributes for the initial window.
    pub fn window_attributes(&self) -> WindowAttributes {
        Window::default_attributes()
            .with_title(&self.title)
            .with_inner_size(PhysicalSize::new(self.width, self.height))
            .with_resizable(self.resizable)
    }

    /// Create the window on a running event loop.
    pub fn create_window(&self, event_loop: &ActiveEventLoop) -> Result<Arc<Window>> {
        let window = event_loop
            .create_window(self.window_attributes())
            .map_err(|e| PlatformError::WindowCreation(e.to_string()))?;
        Ok(Arc::new(window))
    }
}

/// Create the event loop. Only one may exist per process.
pub fn create_event_loop() -> Result<EventLoop<()>> {
    EventLoop::new().map_err(|e| PlatformError::EventLoop(e.to_string()))
}

/// Size of a window's drawable area in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FramebufferSize {
    pub width: u32,
    pub height: u32,
}

impl FramebufferSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Minimized windows report a zero-area framebuffer.
    pub const fn is_zero_area(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl From<PhysicalSize<u32>> for FramebufferSize {
    fn from(size: PhysicalSize<u32>) -> Self {
        Self::new(size.width, size.height)
    }
}

/// Current drawable size of `window`.
pub fn framebuffer_size(window: &Window) -> FramebufferSize {
    window.inner_size().into()
}

/// Whether the event asks the application to quit: a close request or Escape.
pub fn is_exit_request(event: &WindowEvent) -> bool {
    match event {
        WindowEvent::CloseRequested => true,
        WindowEvent::KeyboardInput { event, .. } => is_escape_press(event),
        _ => false,
    }
}

fn is_escape_press(event: &KeyEvent) -> bool {
    event.state == ElementState::Pressed
        && matches!(event.logical_key, Key::Named(NamedKey::Escape))
}
