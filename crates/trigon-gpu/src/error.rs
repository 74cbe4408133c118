//! GPU error types.

use std::path::PathBuf;
use std::time::Duration;

use ash::vk;
use thiserror::Error;

/// GPU-related errors.
///
/// Stale or suboptimal surfaces never surface as errors; the frame scheduler
/// turns them into swapchain rebuilds. Everything here is fatal.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Vulkan error.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// The Vulkan loader could not be found or initialized.
    #[error("Failed to load Vulkan: {0}")]
    Loading(#[from] ash::LoadingError),

    /// No GPU exposes graphics, presentation and swapchain support.
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// Required extension not supported.
    #[error("Required extension not supported: {0}")]
    ExtensionNotSupported(String),

    /// Surface creation failed.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// Swapchain creation failed.
    #[error("Swapchain creation failed: {0}")]
    SwapchainCreation(String),

    /// A SPIR-V blob could not be read.
    #[error("Failed to load shader {}: {source}", path.display())]
    ShaderLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Pipeline or render pass creation failed.
    #[error("Pipeline creation failed: {0}")]
    PipelineCreation(String),

    /// A bounded fence wait expired.
    #[error("GPU did not signal within {0:?}")]
    Timeout(Duration),

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;
