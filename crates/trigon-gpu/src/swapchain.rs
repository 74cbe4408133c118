//! Swapchain selection policy and the Vulkan swapchain wrapper.

use crate::context::QueueFamilies;
use crate::error::{GpuError, Result};
use crate::surface::SurfaceCapabilities;
use ash::vk;

/// Everything chosen for one swapchain generation before any resource exists.
#[derive(Debug, Clone, Copy)]
pub struct SwapchainPlan {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

/// Choose format, present mode, extent and image count for a rebuild.
///
/// Returns `Ok(None)` when the resulting extent has zero area; callers must
/// wait for the window to become visible again instead of building.
pub fn plan_swapchain(
    caps: &SurfaceCapabilities,
    framebuffer: vk::Extent2D,
) -> Result<Option<SwapchainPlan>> {
    let surface_format = caps
        .recommended_format()
        .ok_or_else(|| GpuError::SwapchainCreation("surface reports no formats".into()))?;

    let extent = calculate_extent(&caps.capabilities, framebuffer);
    if is_zero_area(extent) {
        return Ok(None);
    }

    Ok(Some(SwapchainPlan {
        surface_format,
        present_mode: caps.recommended_present_mode(),
        extent,
        image_count: select_image_count(&caps.capabilities),
        pre_transform: caps.capabilities.current_transform,
    }))
}

/// Whether either side of an extent is zero.
pub const fn is_zero_area(extent: vk::Extent2D) -> bool {
    extent.width == 0 || extent.height == 0
}

/// Select the surface format: 8-bit BGRA sRGB if offered, otherwise the first one.
pub fn select_surface_format(available: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    available
        .iter()
        .find(|format| {
            format.format == vk::Format::B8G8R8A8_SRGB
                && format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| available.first())
        .copied()
}

/// Select the present mode: mailbox if offered, otherwise FIFO.
pub fn select_present_mode(available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if available.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        // FIFO is the only mode every surface must support
        vk::PresentModeKHR::FIFO
    }
}

/// Calculate swapchain extent.
///
/// A current extent of `u32::MAX` means the surface size follows the
/// swapchain, so the framebuffer size is clamped into the supported range.
pub fn calculate_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    framebuffer: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: framebuffer.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: framebuffer.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One more image than the minimum, bounded by the maximum when it is nonzero.
pub const fn select_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 && count > capabilities.max_image_count {
        capabilities.max_image_count
    } else {
        count
    }
}

/// Swapchain handle plus the images and views of one generation.
pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a swapchain and one view per image.
    ///
    /// # Safety
    /// All handles must be valid and no other swapchain may target the surface.
    pub unsafe fn new(
        device: &ash::Device,
        swapchain_loader: &ash::khr::swapchain::Device,
        surface: vk::SurfaceKHR,
        plan: &SwapchainPlan,
        queue_families: QueueFamilies,
    ) -> Result<Self> {
        let family_indices = [queue_families.graphics, queue_families.present];
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(plan.image_count)
            .image_format(plan.surface_format.format)
            .image_color_space(plan.surface_format.color_space)
            .image_extent(plan.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(plan.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(plan.present_mode)
            .clipped(true);

        let create_info = if queue_families.is_shared() {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        } else {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices)
        };

        let swapchain = swapchain_loader
            .create_swapchain(&create_info, None)
            .map_err(|e| GpuError::SwapchainCreation(e.to_string()))?;

        let images = match swapchain_loader.get_swapchain_images(swapchain) {
            Ok(images) => images,
            Err(e) => {
                swapchain_loader.destroy_swapchain(swapchain, None);
                return Err(e.into());
            }
        };

        let mut image_views = Vec::with_capacity(images.len());
        for &image in &images {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(plan.surface_format.format)
                .components(vk::ComponentMapping::default())
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .level_count(1)
                        .layer_count(1),
                );

            match device.create_image_view(&view_info, None) {
                Ok(view) => image_views.push(view),
                Err(e) => {
                    for view in image_views {
                        device.destroy_image_view(view, None);
                    }
                    swapchain_loader.destroy_swapchain(swapchain, None);
                    return Err(e.into());
                }
            }
        }

        Ok(Self {
            swapchain,
            images,
            image_views,
            format: plan.surface_format.format,
            extent: plan.extent,
        })
    }

    /// Destroy the views and the swapchain.
    ///
    /// # Safety
    /// No submitted work or pending presentation may reference the images.
    pub unsafe fn destroy(
        &self,
        device: &ash::Device,
        swapchain_loader: &ash::khr::swapchain::Device,
    ) {
        for &view in &self.image_views {
            device.destroy_image_view(view, None);
        }
        swapchain_loader.destroy_swapchain(self.swapchain, None);
    }
}
