//! Vulkan presentation layer for Trigon.
//!
//! This crate provides:
//! - Vulkan instance, debug messenger and device management
//! - Surface capability queries and swapchain selection policy
//! - Render pass, pipeline and command recording for the triangle pass
//! - A backend-agnostic frame scheduler and swapchain lifecycle manager
//!   (see [`frame`]), driven against Vulkan through [`VulkanPresenter`]

pub mod capabilities;
pub mod command;
pub mod context;
pub mod debug;
pub mod error;
pub mod frame;
pub mod instance;
pub mod pipeline;
pub mod presenter;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use capabilities::{GpuCapabilities, GpuVendor};
pub use context::{GpuContext, GpuContextBuilder, QueueFamilies};
pub use error::{GpuError, Result};
pub use frame::{
    AcquireOutcome, FrameOutcome, FrameScheduler, FrameSlot, FrameSlotPool, InFlightMap,
    Invalidation, LifecycleState, PresentBackend, PresentOutcome, RebuildOutcome, SkipReason,
    SwapchainGeneration, SwapchainLifecycle, SwapchainResources, SyncDevice,
};
pub use pipeline::{ShaderSet, TrianglePipeline};
pub use presenter::{PresenterConfig, SwapchainResourceSet, VulkanPresenter};
pub use surface::{SurfaceCapabilities, SurfaceContext};
pub use swapchain::{plan_swapchain, SwapchainPlan};
