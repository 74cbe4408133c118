//! Frame presentation core.
//!
//! The pieces here know nothing about Vulkan handles. They drive any
//! [`PresentBackend`]:
//! - [`FrameSlotPool`]: N reusable semaphore/fence bundles
//! - [`InFlightMap`]: which slot's fence last targeted each swapchain image
//! - [`SwapchainLifecycle`]: the `Live → Invalidated → Rebuilding → Live` machine
//! - [`FrameScheduler`]: one acquire → submit → present cycle per call

mod backend;
mod in_flight;
mod lifecycle;
mod scheduler;
mod slots;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{AcquireOutcome, PresentBackend, PresentOutcome, SwapchainResources, SyncDevice};
pub use in_flight::InFlightMap;
pub use lifecycle::{
    Invalidation, LifecycleState, RebuildOutcome, SwapchainGeneration, SwapchainLifecycle,
};
pub use scheduler::{FrameOutcome, FrameScheduler, SkipReason};
pub use slots::{FrameSlot, FrameSlotPool};
