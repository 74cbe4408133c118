//! Application context.

use std::sync::Arc;
use std::time::Instant;

use ash::vk;
use tracing::{error, info};
use trigon_gpu::{
    FrameOutcome, FrameScheduler, GpuContextBuilder, ShaderSet, VulkanPresenter,
};
use trigon_platform::{framebuffer_size, SurfaceEvent, SurfaceEvents};
use winit::window::Window;

use crate::config::AppConfig;

/// Everything the running application owns: window, presenter and scheduler.
///
/// Field order matters on drop: the presenter (and with it the surface) goes
/// before the window.
pub struct AppContext {
    scheduler: Option<FrameScheduler<VulkanPresenter>>,
    presenter: VulkanPresenter,
    events: SurfaceEvents,
    started: Instant,
    last_outcome: Option<FrameOutcome>,
    /// The window handle.
    pub window: Arc<Window>,
}

impl AppContext {
    /// Load shaders, bring up Vulkan for `window` and create the frame slots.
    ///
    /// The first swapchain is built on the first [`render_frame`](Self::render_frame).
    pub fn new(window: Arc<Window>, config: &AppConfig) -> anyhow::Result<Self> {
        let shaders = ShaderSet::load(&config.vertex_shader, &config.fragment_shader)?;

        let gpu = GpuContextBuilder::new()
            .app_name(&config.title)
            .validation(config.validation)
            .build(window.as_ref())?;

        let mut presenter = VulkanPresenter::new(gpu, shaders, config.presenter())?;
        let scheduler = FrameScheduler::new(&mut presenter, config.frames_in_flight)?;

        info!(
            "Rendering with {} frames in flight",
            scheduler.frames_in_flight()
        );

        Ok(Self {
            scheduler: Some(scheduler),
            presenter,
            events: SurfaceEvents::new(),
            started: Instant::now(),
            last_outcome: None,
            window,
        })
    }

    /// Queue a surface change for the next frame.
    pub fn push_surface_event(&self, event: SurfaceEvent) {
        self.events.push(event);
    }

    /// Apply pending surface events and run one frame cycle.
    pub fn render_frame(&mut self) -> trigon_gpu::Result<FrameOutcome> {
        let Some(scheduler) = self.scheduler.as_mut() else {
            return Err(trigon_gpu::GpuError::InvalidState(
                "render_frame called after shutdown".into(),
            ));
        };

        if self.events.drain().is_some() {
            scheduler.notify_resized();
        }

        let size = framebuffer_size(&self.window);
        let extent = vk::Extent2D {
            width: size.width,
            height: size.height,
        };

        let outcome = scheduler.render_frame(&mut self.presenter, extent)?;
        self.last_outcome = Some(outcome);
        Ok(outcome)
    }

    /// Outcome of the most recent frame cycle.
    pub const fn last_outcome(&self) -> Option<FrameOutcome> {
        self.last_outcome
    }

    /// Whether frames are being skipped until the window has a non-zero area again.
    pub fn is_stalled(&self) -> bool {
        matches!(
            self.last_outcome,
            Some(FrameOutcome::Skipped(trigon_gpu::SkipReason::ZeroExtent))
        )
    }

    pub fn frame_count(&self) -> u64 {
        self.scheduler
            .as_ref()
            .map_or(0, FrameScheduler::frame_count)
    }

    /// Drain the GPU and destroy the swapchain and frame slots. Idempotent.
    pub fn shutdown(&mut self) -> trigon_gpu::Result<()> {
        let Some(scheduler) = self.scheduler.take() else {
            return Ok(());
        };

        let frames = scheduler.frame_count();
        let elapsed = self.started.elapsed().as_secs_f64();
        if frames > 0 && elapsed > 0.0 {
            #[allow(clippy::cast_precision_loss)]
            let average = frames as f64 / elapsed;
            info!("Presented {frames} frames ({average:.1} fps average)");
        }

        info!("Starting cleanup...");
        scheduler.shutdown(&mut self.presenter)?;
        info!("Cleanup complete");
        Ok(())
    }
}

impl Drop for AppContext {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("Cleanup failed: {e}");
        }
    }
}
