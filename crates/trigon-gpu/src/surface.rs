//! Surface management for windowed rendering.
//!
//! Hides the raw-window-handle plumbing from application code and answers
//! the capability queries the swapchain policy needs.

use crate::error::{GpuError, Result};
use crate::swapchain::{select_present_mode, select_surface_format};
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

/// Vulkan surface for a window.
pub struct SurfaceContext {
    /// The Vulkan surface handle.
    pub surface: vk::SurfaceKHR,
    /// Surface extension loader.
    pub surface_loader: ash::khr::surface::Instance,
}

impl SurfaceContext {
    /// Create a surface for a window.
    ///
    /// # Safety
    /// The instance must have been created with the window system extensions
    /// reported for this window's display, and must outlive the surface.
    pub unsafe fn from_window<W>(
        entry: &ash::Entry,
        instance: &ash::Instance,
        window: &W,
    ) -> Result<Self>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let display = window
            .display_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?;
        let window_handle = window
            .window_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get window handle: {e}")))?;

        let surface = ash_window::create_surface(
            entry,
            instance,
            display.as_raw(),
            window_handle.as_raw(),
            None,
        )
        .map_err(|e| GpuError::SurfaceCreation(e.to_string()))?;

        Ok(Self {
            surface,
            surface_loader: ash::khr::surface::Instance::new(entry, instance),
        })
    }

    /// Query formats, present modes and extent bounds for a physical device.
    ///
    /// # Safety
    /// The physical device must belong to the instance this surface was created on.
    pub unsafe fn capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<SurfaceCapabilities> {
        let capabilities = self
            .surface_loader
            .get_physical_device_surface_capabilities(physical_device, self.surface)?;
        let formats = self
            .surface_loader
            .get_physical_device_surface_formats(physical_device, self.surface)?;
        let present_modes = self
            .surface_loader
            .get_physical_device_surface_present_modes(physical_device, self.surface)?;

        Ok(SurfaceCapabilities {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// Whether a queue family of the device can present to this surface.
    ///
    /// # Safety
    /// The physical device must belong to the instance this surface was created on.
    pub unsafe fn supports_present(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
    ) -> Result<bool> {
        Ok(self.surface_loader.get_physical_device_surface_support(
            physical_device,
            queue_family,
            self.surface,
        )?)
    }

    /// Destroy the surface.
    ///
    /// # Safety
    /// No swapchain created from this surface may still exist.
    pub unsafe fn destroy(&self) {
        self.surface_loader.destroy_surface(self.surface, None);
    }
}

/// Surface capabilities query result.
#[derive(Debug, Clone, Default)]
pub struct SurfaceCapabilities {
    /// Raw surface capabilities.
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats.
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes.
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceCapabilities {
    /// A swapchain can be built only if the surface offers at least one
    /// format and one present mode.
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }

    /// Get the recommended surface format.
    pub fn recommended_format(&self) -> Option<vk::SurfaceFormatKHR> {
        select_surface_format(&self.formats)
    }

    /// Get the recommended present mode.
    pub fn recommended_present_mode(&self) -> vk::PresentModeKHR {
        select_present_mode(&self.present_modes)
    }
}
