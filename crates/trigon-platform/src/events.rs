//! Surface events flowing from the window handler to the renderer.

use crossbeam::channel::{self, Receiver, Sender};
use tracing::trace;
use winit::event::WindowEvent;

use crate::FramebufferSize;

/// A change to the window's drawable surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    Resized { width: u32, height: u32 },
    /// The framebuffer shrank to zero area.
    Minimized,
}

impl SurfaceEvent {
    pub const fn from_size(size: FramebufferSize) -> Self {
        if size.is_zero_area() {
            Self::Minimized
        } else {
            Self::Resized {
                width: size.width,
                height: size.height,
            }
        }
    }

    /// The surface event carried by a window event, if any.
    pub fn from_window_event(event: &WindowEvent) -> Option<Self> {
        match event {
            WindowEvent::Resized(size) => Some(Self::from_size((*size).into())),
            _ => None,
        }
    }

    /// Framebuffer size after this event.
    pub const fn size(self) -> FramebufferSize {
        match self {
            Self::Resized { width, height } => FramebufferSize::new(width, height),
            Self::Minimized => FramebufferSize::new(0, 0),
        }
    }
}

/// Unbounded queue of surface events, drained once per rendered frame.
#[derive(Debug)]
pub struct SurfaceEvents {
    tx: Sender<SurfaceEvent>,
    rx: Receiver<SurfaceEvent>,
}

impl Default for SurfaceEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceEvents {
    pub fn new() -> Self {
        let (tx, rx) = channel::unbounded();
        Self { tx, rx }
    }

    /// Queue an event from the owning thread.
    pub fn push(&self, event: SurfaceEvent) {
        // Both halves live in self, so the channel cannot be disconnected.
        let _ = self.tx.send(event);
    }

    /// Take every queued event and coalesce them into the latest one.
    ///
    /// `Some` means a resize is pending.
    pub fn drain(&self) -> Option<SurfaceEvent> {
        let mut latest = None;
        let mut count = 0_usize;
        for event in self.rx.try_iter() {
            latest = Some(event);
            count += 1;
        }
        if count > 1 {
            trace!("Coalesced {count} surface events into {latest:?}");
        }
        latest
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
