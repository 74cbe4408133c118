use std::fmt;

use ash::vk;

use crate::error::Result;
use crate::surface::SurfaceCapabilities;
use crate::swapchain::SwapchainPlan;

/// Binary semaphores and fences.
pub trait SyncDevice {
    type Semaphore: Copy + Eq + fmt::Debug;
    type Fence: Copy + Eq + fmt::Debug;

    fn create_semaphore(&mut self) -> Result<Self::Semaphore>;

    /// Create a fence, already signaled if `signaled` is set.
    fn create_fence(&mut self, signaled: bool) -> Result<Self::Fence>;

    /// Block until the fence is signaled.
    fn wait_for_fence(&mut self, fence: Self::Fence) -> Result<()>;

    fn reset_fence(&mut self, fence: Self::Fence) -> Result<()>;

    fn destroy_semaphore(&mut self, semaphore: Self::Semaphore);

    fn destroy_fence(&mut self, fence: Self::Fence);
}

/// Resources that live exactly as long as one swapchain generation.
pub trait SwapchainResources {
    fn image_count(&self) -> usize;
    fn extent(&self) -> vk::Extent2D;
}

/// Result of asking the surface for the next image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image was acquired and the semaphore will be signaled.
    Acquired { image_index: u32, suboptimal: bool },
    /// The surface changed; no image was acquired and nothing will be signaled.
    OutOfDate,
}

/// Result of a present request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

/// Device and presentation surface as seen by the frame scheduler.
///
/// Stale surfaces are reported through the outcome enums. Every `Err` is fatal.
pub trait PresentBackend: SyncDevice {
    type Resources: SwapchainResources;

    fn surface_capabilities(&mut self) -> Result<SurfaceCapabilities>;

    /// Build the swapchain and everything that depends on its format or extent.
    fn create_resources(&mut self, plan: &SwapchainPlan) -> Result<Self::Resources>;

    /// Destroy one generation. Only called once no submission references it.
    fn destroy_resources(&mut self, resources: Self::Resources);

    fn acquire_next_image(
        &mut self,
        resources: &Self::Resources,
        signal: Self::Semaphore,
    ) -> Result<AcquireOutcome>;

    /// Submit the prerecorded commands for `image_index`.
    fn submit(
        &mut self,
        resources: &Self::Resources,
        image_index: u32,
        wait: Self::Semaphore,
        signal: Self::Semaphore,
        fence: Self::Fence,
    ) -> Result<()>;

    fn present(
        &mut self,
        resources: &Self::Resources,
        image_index: u32,
        wait: Self::Semaphore,
    ) -> Result<PresentOutcome>;

    /// Block until every queue is idle.
    fn wait_idle(&mut self) -> Result<()>;
}
