//! Vulkan implementation of the frame scheduler's backend.
//!
//! A [`SwapchainResourceSet`] bundles everything whose lifetime is one
//! swapchain generation: the swapchain and its views, the render pass and
//! pipeline built for its format and extent, one framebuffer per image and
//! the command buffers prerecorded against those framebuffers.

use std::time::Duration;

use ash::vk;
use tracing::debug;

use crate::command::{record_triangle_pass, submit_command_buffers, CommandPool};
use crate::context::GpuContext;
use crate::error::{GpuError, Result};
use crate::frame::{AcquireOutcome, PresentBackend, PresentOutcome, SwapchainResources, SyncDevice};
use crate::pipeline::{create_render_pass, ShaderSet, TrianglePipeline};
use crate::surface::SurfaceCapabilities;
use crate::swapchain::{Swapchain, SwapchainPlan};
use crate::sync;

/// Tunables for [`VulkanPresenter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresenterConfig {
    /// Upper bound on fence waits and image acquisition. `None` waits forever.
    pub fence_timeout: Option<Duration>,
}

/// One swapchain generation and everything built against it.
pub struct SwapchainResourceSet {
    swapchain: Swapchain,
    render_pass: vk::RenderPass,
    pipeline: TrianglePipeline,
    framebuffers: Vec<vk::Framebuffer>,
    command_buffers: Vec<vk::CommandBuffer>,
}

impl SwapchainResourceSet {
    fn command_buffer(&self, image_index: u32) -> Result<vk::CommandBuffer> {
        usize::try_from(image_index)
            .ok()
            .and_then(|i| self.command_buffers.get(i).copied())
            .ok_or_else(|| {
                GpuError::InvalidState(format!(
                    "image index {image_index} out of range for {} images",
                    self.command_buffers.len()
                ))
            })
    }
}

impl SwapchainResources for SwapchainResourceSet {
    fn image_count(&self) -> usize {
        self.swapchain.images.len()
    }

    fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent
    }
}

/// Presents the triangle to a window surface through a [`GpuContext`].
///
/// Owns the context, so it must outlive every generation and sync object it
/// hands out. Callers shut the frame scheduler down before dropping it.
pub struct VulkanPresenter {
    gpu: GpuContext,
    command_pool: CommandPool,
    shaders: ShaderSet,
    config: PresenterConfig,
}

impl VulkanPresenter {
    /// Create a presenter. No swapchain exists until the first rebuild.
    pub fn new(gpu: GpuContext, shaders: ShaderSet, config: PresenterConfig) -> Result<Self> {
        // SAFETY: the graphics family was selected on this device.
        let command_pool = unsafe {
            CommandPool::new(
                gpu.device(),
                gpu.queue_families().graphics,
                vk::CommandPoolCreateFlags::empty(),
            )
        }?;

        Ok(Self {
            gpu,
            command_pool,
            shaders,
            config,
        })
    }

    pub const fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    pub const fn config(&self) -> PresenterConfig {
        self.config
    }

    fn timeout_error(&self) -> GpuError {
        GpuError::Timeout(self.config.fence_timeout.unwrap_or(Duration::MAX))
    }

    /// Build the generation-scoped objects on top of a fresh swapchain.
    ///
    /// On error `set` holds whatever was created so far; null handles are
    /// skipped by [`Self::destroy_set`].
    unsafe fn populate(&self, set: &mut SwapchainResourceSet) -> Result<()> {
        let device = self.gpu.device();
        let extent = set.swapchain.extent;

        set.render_pass = create_render_pass(device, set.swapchain.format)?;
        set.pipeline = TrianglePipeline::new(device, set.render_pass, extent, &self.shaders)?;

        for &view in &set.swapchain.image_views {
            let attachments = [view];
            let framebuffer_info = vk::FramebufferCreateInfo::default()
                .render_pass(set.render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);
            set.framebuffers
                .push(device.create_framebuffer(&framebuffer_info, None)?);
        }

        let count = u32::try_from(set.framebuffers.len())
            .map_err(|_| GpuError::InvalidState("too many swapchain images".into()))?;
        set.command_buffers = self.command_pool.allocate_primary(device, count)?;

        for (&cmd, &framebuffer) in set.command_buffers.iter().zip(&set.framebuffers) {
            record_triangle_pass(device, cmd, set.render_pass, framebuffer, extent, &set.pipeline)?;
        }

        Ok(())
    }

    /// Destroy a generation in reverse creation order.
    unsafe fn destroy_set(&self, set: &SwapchainResourceSet) {
        let device = self.gpu.device();

        self.command_pool.free(device, &set.command_buffers);
        for &framebuffer in &set.framebuffers {
            device.destroy_framebuffer(framebuffer, None);
        }
        set.pipeline.destroy(device);
        device.destroy_render_pass(set.render_pass, None);
        set.swapchain.destroy(device, self.gpu.swapchain_loader());
    }
}

impl Drop for VulkanPresenter {
    fn drop(&mut self) {
        unsafe {
            let _ = self.gpu.wait_idle();
            self.command_pool.destroy(self.gpu.device());
        }
    }
}

impl SyncDevice for VulkanPresenter {
    type Semaphore = vk::Semaphore;
    type Fence = vk::Fence;

    fn create_semaphore(&mut self) -> Result<vk::Semaphore> {
        unsafe { sync::create_semaphore(self.gpu.device()) }
    }

    fn create_fence(&mut self, signaled: bool) -> Result<vk::Fence> {
        unsafe { sync::create_fence(self.gpu.device(), signaled) }
    }

    fn wait_for_fence(&mut self, fence: vk::Fence) -> Result<()> {
        unsafe { sync::wait_for_fences(self.gpu.device(), &[fence], self.config.fence_timeout) }
    }

    fn reset_fence(&mut self, fence: vk::Fence) -> Result<()> {
        unsafe { sync::reset_fence(self.gpu.device(), fence) }
    }

    fn destroy_semaphore(&mut self, semaphore: vk::Semaphore) {
        unsafe { self.gpu.device().destroy_semaphore(semaphore, None) }
    }

    fn destroy_fence(&mut self, fence: vk::Fence) {
        unsafe { self.gpu.device().destroy_fence(fence, None) }
    }
}

impl PresentBackend for VulkanPresenter {
    type Resources = SwapchainResourceSet;

    fn surface_capabilities(&mut self) -> Result<SurfaceCapabilities> {
        self.gpu.surface_capabilities()
    }

    fn create_resources(&mut self, plan: &SwapchainPlan) -> Result<SwapchainResourceSet> {
        // SAFETY: the previous generation, if any, was destroyed before this call.
        let swapchain = unsafe {
            Swapchain::new(
                self.gpu.device(),
                self.gpu.swapchain_loader(),
                self.gpu.surface().surface,
                plan,
                self.gpu.queue_families(),
            )
        }?;

        let mut set = SwapchainResourceSet {
            swapchain,
            render_pass: vk::RenderPass::null(),
            pipeline: TrianglePipeline::default(),
            framebuffers: Vec::new(),
            command_buffers: Vec::new(),
        };

        if let Err(e) = unsafe { self.populate(&mut set) } {
            unsafe { self.destroy_set(&set) };
            return Err(e);
        }

        debug!(
            "Recorded {} command buffers for {:?}",
            set.command_buffers.len(),
            set.swapchain.format
        );
        Ok(set)
    }

    fn destroy_resources(&mut self, resources: SwapchainResourceSet) {
        unsafe { self.destroy_set(&resources) }
    }

    fn acquire_next_image(
        &mut self,
        resources: &SwapchainResourceSet,
        signal: vk::Semaphore,
    ) -> Result<AcquireOutcome> {
        let acquired = unsafe {
            self.gpu.swapchain_loader().acquire_next_image(
                resources.swapchain.swapchain,
                sync::timeout_nanos(self.config.fence_timeout),
                signal,
                vk::Fence::null(),
            )
        };

        match acquired {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(vk::Result::TIMEOUT | vk::Result::NOT_READY) => Err(self.timeout_error()),
            Err(e) => Err(e.into()),
        }
    }

    fn submit(
        &mut self,
        resources: &SwapchainResourceSet,
        image_index: u32,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
        fence: vk::Fence,
    ) -> Result<()> {
        let cmd = resources.command_buffer(image_index)?;

        unsafe {
            submit_command_buffers(
                self.gpu.device(),
                self.gpu.graphics_queue(),
                &[cmd],
                &[wait],
                &[vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT],
                &[signal],
                fence,
            )
        }
    }

    fn present(
        &mut self,
        resources: &SwapchainResourceSet,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> Result<PresentOutcome> {
        let wait_semaphores = [wait];
        let swapchains = [resources.swapchain.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let presented = unsafe {
            self.gpu
                .swapchain_loader()
                .queue_present(self.gpu.present_queue(), &present_info)
        };

        match presented {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(e.into()),
        }
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.gpu.wait_idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_waits_forever() {
        let config = PresenterConfig::default();
        assert_eq!(config.fence_timeout, None);
        assert_eq!(sync::timeout_nanos(config.fence_timeout), u64::MAX);
    }
}
