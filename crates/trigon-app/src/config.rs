//! Application configuration.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use trigon_gpu::PresenterConfig;
use trigon_platform::PlatformConfig;

/// Environment variable overriding [`AppConfig::vertex_shader`].
pub const VERTEX_SHADER_ENV: &str = "TRIGON_VERTEX_SHADER";
/// Environment variable overriding [`AppConfig::fragment_shader`].
pub const FRAGMENT_SHADER_ENV: &str = "TRIGON_FRAGMENT_SHADER";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Window title, also used as the Vulkan application name.
    pub title: String,
    /// Initial window width.
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    pub resizable: bool,
    /// Enable Vulkan validation layers (default: debug builds only).
    pub validation: bool,
    /// Number of frames the CPU may record ahead of the GPU.
    pub frames_in_flight: usize,
    /// Bound on fence waits. `None` waits forever.
    pub fence_timeout: Option<Duration>,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Vulkan".to_string(),
            width: 800,
            height: 600,
            resizable: true,
            validation: cfg!(debug_assertions),
            frames_in_flight: 2,
            fence_timeout: None,
            vertex_shader: PathBuf::from("shaders/vert.spv"),
            fragment_shader: PathBuf::from("shaders/frag.spv"),
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the window dimensions.
    #[must_use]
    pub const fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    #[must_use]
    pub const fn with_resizable(mut self, resizable: bool) -> Self {
        self.resizable = resizable;
        self
    }

    /// Enable or disable validation layers.
    #[must_use]
    pub const fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    #[must_use]
    pub const fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames;
        self
    }

    #[must_use]
    pub const fn with_fence_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fence_timeout = timeout;
        self
    }

    /// Set the SPIR-V paths for both shader stages.
    #[must_use]
    pub fn with_shaders(mut self, vertex: impl Into<PathBuf>, fragment: impl Into<PathBuf>) -> Self {
        self.vertex_shader = vertex.into();
        self.fragment_shader = fragment.into();
        self
    }

    /// Apply shader path overrides from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var_os(key))
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        if let Some(path) = lookup(VERTEX_SHADER_ENV).filter(|p| !p.is_empty()) {
            self.vertex_shader = path.into();
        }
        if let Some(path) = lookup(FRAGMENT_SHADER_ENV).filter(|p| !p.is_empty()) {
            self.fragment_shader = path.into();
        }
        self
    }

    /// Window settings.
    pub fn platform(&self) -> PlatformConfig {
        PlatformConfig {
            title: self.title.clone(),
            width: self.width,
            height: self.height,
            resizable: self.resizable,
        }
    }

    pub const fn presenter(&self) -> PresenterConfig {
        PresenterConfig {
            fence_timeout: self.fence_timeout,
        }
    }
}
