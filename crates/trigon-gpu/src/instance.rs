//! Vulkan instance creation and physical device selection.

use std::ffi::{c_char, CStr, CString};

use crate::capabilities::GpuCapabilities;
use crate::context::{find_queue_families, QueueFamilies};
use crate::debug::messenger_create_info;
use crate::error::{GpuError, Result};
use crate::surface::SurfaceContext;
use ash::vk;
use raw_window_handle::RawDisplayHandle;

/// Validation layers enabled when validation is requested.
pub fn validation_layers() -> Vec<&'static CStr> {
    vec![c"VK_LAYER_KHRONOS_validation"]
}

/// Device extensions every candidate must expose.
pub fn required_device_extensions() -> Vec<&'static CStr> {
    vec![ash::khr::swapchain::NAME]
}

/// Create a Vulkan instance able to present to the given display.
///
/// # Safety
/// The entry must be a valid Vulkan entry point.
pub unsafe fn create_instance(
    entry: &ash::Entry,
    app_name: &str,
    display: RawDisplayHandle,
    enable_validation: bool,
) -> Result<ash::Instance> {
    let app_name = CString::new(app_name)
        .map_err(|_| GpuError::InvalidState("application name contains a NUL byte".into()))?;

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 1, 0, 0))
        .engine_name(c"Trigon")
        .engine_version(vk::make_api_version(0, 1, 0, 0))
        .api_version(vk::API_VERSION_1_2);

    let mut extension_names: Vec<*const c_char> =
        ash_window::enumerate_required_extensions(display)?.to_vec();
    if enable_validation {
        extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
    }
    #[cfg(target_os = "macos")]
    {
        extension_names.push(ash::khr::portability_enumeration::NAME.as_ptr());
        extension_names.push(ash::khr::get_physical_device_properties2::NAME.as_ptr());
    }

    let layers = if enable_validation {
        available_validation_layers(entry)?
    } else {
        Vec::new()
    };
    let layer_names: Vec<*const c_char> = layers.iter().map(|l| l.as_ptr()).collect();

    // Required for MoltenVK on macOS
    #[cfg(target_os = "macos")]
    let create_flags = vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    #[cfg(not(target_os = "macos"))]
    let create_flags = vk::InstanceCreateFlags::empty();

    let mut debug_info = messenger_create_info();
    let mut create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extension_names)
        .enabled_layer_names(&layer_names)
        .flags(create_flags);
    if enable_validation {
        create_info = create_info.push_next(&mut debug_info);
    }

    Ok(entry.create_instance(&create_info, None)?)
}

/// Requested validation layers the loader actually offers.
///
/// Missing layers are logged and skipped rather than failing instance creation.
unsafe fn available_validation_layers(entry: &ash::Entry) -> Result<Vec<&'static CStr>> {
    let available = entry.enumerate_instance_layer_properties()?;

    Ok(validation_layers()
        .into_iter()
        .filter(|layer| {
            let found = available
                .iter()
                .any(|props| CStr::from_ptr(props.layer_name.as_ptr()) == *layer);
            if !found {
                tracing::warn!("Validation layer {} not available", layer.to_string_lossy());
            }
            found
        })
        .collect())
}

/// Select the best physical device able to render to and present on the surface.
///
/// # Safety
/// The instance and surface must be valid.
pub unsafe fn select_physical_device(
    instance: &ash::Instance,
    surface: &SurfaceContext,
) -> Result<(vk::PhysicalDevice, QueueFamilies, GpuCapabilities)> {
    let mut best: Option<(vk::PhysicalDevice, QueueFamilies, GpuCapabilities)> = None;

    for device in instance.enumerate_physical_devices()? {
        let capabilities = GpuCapabilities::query(instance, device);

        let Some(families) = find_queue_families(instance, device, surface)? else {
            tracing::debug!("Skipping {}: no graphics/present queue", capabilities.device_name);
            continue;
        };

        if let Some(missing) = required_device_extensions()
            .into_iter()
            .find(|ext| !capabilities.supports_extension(ext))
        {
            tracing::debug!(
                "Skipping {}: missing {}",
                capabilities.device_name,
                missing.to_string_lossy()
            );
            continue;
        }

        if !surface.capabilities(device)?.is_adequate() {
            tracing::debug!("Skipping {}: surface has no formats or present modes", capabilities.device_name);
            continue;
        }

        let better = best
            .as_ref()
            .map_or(true, |(_, _, current)| capabilities.score() > current.score());
        if better {
            best = Some((device, families, capabilities));
        }
    }

    best.ok_or(GpuError::NoSuitableDevice)
}
