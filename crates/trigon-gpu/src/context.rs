//! GPU context management.

use std::collections::HashSet;
use std::ffi::c_char;

use crate::capabilities::GpuCapabilities;
use crate::debug::DebugMessenger;
use crate::error::{GpuError, Result};
use crate::instance::{create_instance, required_device_extensions, select_physical_device};
use crate::surface::{SurfaceCapabilities, SurfaceContext};
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

/// Queue family indices used for rendering and presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    /// Whether one family serves both roles.
    pub const fn is_shared(self) -> bool {
        self.graphics == self.present
    }

    /// Distinct family indices, one queue is created per entry.
    pub fn unique(self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// Vulkan instance, surface, device and queues for one window.
pub struct GpuContext {
    // Entry must be kept alive for the lifetime of the context
    #[allow(dead_code)]
    entry: ash::Entry,
    instance: ash::Instance,
    debug_messenger: Option<DebugMessenger>,
    surface: SurfaceContext,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    capabilities: GpuCapabilities,
    queue_families: QueueFamilies,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    swapchain_loader: ash::khr::swapchain::Device,
}

impl GpuContext {
    /// Get the Vulkan device handle.
    pub const fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get the Vulkan instance handle.
    pub const fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Get the physical device handle.
    pub const fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Get GPU capabilities.
    pub const fn capabilities(&self) -> &GpuCapabilities {
        &self.capabilities
    }

    pub const fn queue_families(&self) -> QueueFamilies {
        self.queue_families
    }

    /// Queue receiving rendering submissions.
    pub const fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Queue receiving present requests.
    pub const fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    pub const fn surface(&self) -> &SurfaceContext {
        &self.surface
    }

    pub const fn swapchain_loader(&self) -> &ash::khr::swapchain::Device {
        &self.swapchain_loader
    }

    /// Current surface formats, present modes and extent bounds.
    pub fn surface_capabilities(&self) -> Result<SurfaceCapabilities> {
        // SAFETY: the physical device was enumerated from this context's instance.
        unsafe { self.surface.capabilities(self.physical_device) }
    }

    /// Wait for device to be idle.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.device.device_wait_idle()?;
        }
        Ok(())
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
            self.surface.destroy();
            if let Some(messenger) = &self.debug_messenger {
                messenger.destroy();
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Builder for creating a GPU context.
pub struct GpuContextBuilder {
    app_name: String,
    enable_validation: bool,
}

impl Default for GpuContextBuilder {
    fn default() -> Self {
        Self {
            app_name: "Trigon".to_string(),
            enable_validation: cfg!(debug_assertions),
        }
    }
}

impl GpuContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    #[must_use]
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers and the debug messenger.
    #[must_use]
    pub const fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Build a context that renders to `window`.
    pub fn build<W>(self, window: &W) -> Result<GpuContext>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let entry = unsafe { ash::Entry::load() }?;

        let display = window
            .display_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?
            .as_raw();

        let instance =
            unsafe { create_instance(&entry, &self.app_name, display, self.enable_validation) }?;

        // From here on every early return must release what was created so far.
        let debug_messenger = if self.enable_validation {
            match unsafe { DebugMessenger::new(&entry, &instance) } {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        let release = |surface: Option<&SurfaceContext>| unsafe {
            if let Some(surface) = surface {
                surface.destroy();
            }
            if let Some(messenger) = &debug_messenger {
                messenger.destroy();
            }
            instance.destroy_instance(None);
        };

        let surface = match unsafe { SurfaceContext::from_window(&entry, &instance, window) } {
            Ok(surface) => surface,
            Err(e) => {
                release(None);
                return Err(e);
            }
        };

        let selected = unsafe { select_physical_device(&instance, &surface) }.and_then(
            |(physical_device, queue_families, capabilities)| {
                let device = unsafe { create_device(&instance, physical_device, queue_families) }?;
                Ok((physical_device, queue_families, capabilities, device))
            },
        );
        let (physical_device, queue_families, capabilities, device) = match selected {
            Ok(selected) => selected,
            Err(e) => {
                release(Some(&surface));
                return Err(e);
            }
        };

        tracing::info!("Selected GPU: {}", capabilities.summary());
        tracing::debug!(
            "Queue families: graphics={} present={}",
            queue_families.graphics,
            queue_families.present
        );

        let graphics_queue = unsafe { device.get_device_queue(queue_families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(queue_families.present, 0) };
        let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &device);

        Ok(GpuContext {
            entry,
            instance,
            debug_messenger,
            surface,
            physical_device,
            device,
            capabilities,
            queue_families,
            graphics_queue,
            present_queue,
            swapchain_loader,
        })
    }
}

/// Find a graphics family and a family able to present to the surface.
///
/// Prefers a single family doing both. Returns `None` when either role is missing.
///
/// # Safety
/// The instance, physical device and surface must be valid.
pub(crate) unsafe fn find_queue_families(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    surface: &SurfaceContext,
) -> Result<Option<QueueFamilies>> {
    let families = instance.get_physical_device_queue_family_properties(physical_device);

    let mut graphics = None;
    let mut present = None;

    for (index, family) in families.iter().enumerate() {
        let Ok(index) = u32::try_from(index) else {
            break;
        };
        let has_graphics = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        let can_present = surface.supports_present(physical_device, index)?;

        if has_graphics && can_present {
            return Ok(Some(QueueFamilies {
                graphics: index,
                present: index,
            }));
        }
        if has_graphics && graphics.is_none() {
            graphics = Some(index);
        }
        if can_present && present.is_none() {
            present = Some(index);
        }
    }

    Ok(graphics
        .zip(present)
        .map(|(graphics, present)| QueueFamilies { graphics, present }))
}

/// Create the logical device with one queue per unique family.
///
/// # Safety
/// The instance and physical device must be valid.
unsafe fn create_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    queue_families: QueueFamilies,
) -> Result<ash::Device> {
    let unique_families: HashSet<u32> = queue_families.unique().into_iter().collect();

    let queue_priority = 1.0_f32;
    let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
        .iter()
        .map(|&family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(std::slice::from_ref(&queue_priority))
        })
        .collect();

    let extension_names: Vec<*const c_char> = required_device_extensions()
        .iter()
        .map(|ext| ext.as_ptr())
        .collect();

    let features = vk::PhysicalDeviceFeatures::default();
    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .enabled_features(&features);

    Ok(instance.create_device(physical_device, &device_create_info, None)?)
}
