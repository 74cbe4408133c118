//! Swapchain lifecycle: invalidation, drain, teardown and rebuild.

use ash::vk;
use tracing::{debug, info};

use crate::error::Result;
use crate::frame::{FrameSlotPool, InFlightMap, PresentBackend, SwapchainResources};
use crate::swapchain::{is_zero_area, plan_swapchain};

/// Where the swapchain is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Frames may be rendered against the current generation.
    Live,
    /// The current generation must not be used. A rebuild is pending.
    Invalidated,
    /// Resources are being torn down and recreated.
    Rebuilding,
}

/// Why the swapchain was invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidation {
    /// No generation has been built yet.
    Initial,
    AcquireOutOfDate,
    PresentOutOfDate,
    Suboptimal,
    Resized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
    Rebuilt { epoch: u64 },
    /// The framebuffer has zero area; nothing was drained or destroyed.
    Deferred,
}

/// One build of the swapchain and everything that embeds its format or extent.
#[derive(Debug)]
pub struct SwapchainGeneration<R> {
    epoch: u64,
    retired: bool,
    resources: R,
}

impl<R> SwapchainGeneration<R> {
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether this generation is being replaced and may no longer be rendered to.
    pub const fn is_retired(&self) -> bool {
        self.retired
    }

    pub const fn resources(&self) -> &R {
        &self.resources
    }
}

/// Drives a swapchain generation through `Live → Invalidated → Rebuilding → Live`.
#[derive(Debug)]
pub struct SwapchainLifecycle<R> {
    state: LifecycleState,
    cause: Option<Invalidation>,
    generation: Option<SwapchainGeneration<R>>,
    next_epoch: u64,
}

impl<R: SwapchainResources> Default for SwapchainLifecycle<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: SwapchainResources> SwapchainLifecycle<R> {
    /// Start invalidated, with the first build pending.
    pub const fn new() -> Self {
        Self {
            state: LifecycleState::Invalidated,
            cause: Some(Invalidation::Initial),
            generation: None,
            next_epoch: 0,
        }
    }

    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_live(&self) -> bool {
        self.state == LifecycleState::Live
    }

    /// The first reason recorded since the last successful rebuild.
    pub const fn pending_cause(&self) -> Option<Invalidation> {
        self.cause
    }

    /// The current generation, if one has been built.
    pub const fn generation(&self) -> Option<&SwapchainGeneration<R>> {
        self.generation.as_ref()
    }

    /// Retire the current generation. Later causes are coalesced.
    pub fn invalidate(&mut self, cause: Invalidation) {
        if self.cause.is_none() {
            debug!("Swapchain invalidated: {cause:?}");
            self.cause = Some(cause);
        }
        if let Some(generation) = self.generation.as_mut() {
            generation.retired = true;
        }
        if self.state == LifecycleState::Live {
            self.state = LifecycleState::Invalidated;
        }
    }

    /// Replace the current generation.
    ///
    /// Waits on every slot's fence and then on device idle before anything is
    /// destroyed. A zero-area framebuffer defers the rebuild without touching
    /// any resource; the state stays `Invalidated`.
    pub fn rebuild<B>(
        &mut self,
        backend: &mut B,
        slots: &FrameSlotPool<B>,
        images_in_flight: &mut InFlightMap<B::Fence>,
        framebuffer: vk::Extent2D,
    ) -> Result<RebuildOutcome>
    where
        B: PresentBackend<Resources = R>,
    {
        if is_zero_area(framebuffer) {
            debug!("Deferring swapchain rebuild: framebuffer is {}x{}", framebuffer.width, framebuffer.height);
            return Ok(RebuildOutcome::Deferred);
        }

        self.state = LifecycleState::Rebuilding;
        self.release(backend, slots)?;

        let caps = backend.surface_capabilities()?;
        let Some(plan) = plan_swapchain(&caps, framebuffer)? else {
            debug!("Deferring swapchain rebuild: surface reports zero extent");
            self.state = LifecycleState::Invalidated;
            return Ok(RebuildOutcome::Deferred);
        };

        let resources = backend.create_resources(&plan)?;
        images_in_flight.reset(resources.image_count());

        let epoch = self.next_epoch;
        self.next_epoch += 1;
        info!(
            "Swapchain generation {epoch}: {}x{}, {} images, {:?} / {:?}, {:?} (cause: {:?})",
            plan.extent.width,
            plan.extent.height,
            resources.image_count(),
            plan.surface_format.format,
            plan.surface_format.color_space,
            plan.present_mode,
            self.cause.unwrap_or(Invalidation::Initial),
        );

        self.generation = Some(SwapchainGeneration {
            epoch,
            retired: false,
            resources,
        });
        self.cause = None;
        self.state = LifecycleState::Live;

        Ok(RebuildOutcome::Rebuilt { epoch })
    }

    /// Drain and destroy the current generation for shutdown.
    pub fn shutdown<B>(&mut self, backend: &mut B, slots: &FrameSlotPool<B>) -> Result<()>
    where
        B: PresentBackend<Resources = R>,
    {
        self.state = LifecycleState::Invalidated;
        self.release(backend, slots)
    }

    /// Wait until no frame is in flight, then destroy the current generation.
    fn release<B>(&mut self, backend: &mut B, slots: &FrameSlotPool<B>) -> Result<()>
    where
        B: PresentBackend<Resources = R>,
    {
        slots.wait_all(backend)?;
        backend.wait_idle()?;

        if let Some(generation) = self.generation.take() {
            debug!("Destroying swapchain generation {}", generation.epoch);
            backend.destroy_resources(generation.resources);
        }
        Ok(())
    }
}
