//! Vulkan synchronization primitives.

use std::time::Duration;

use crate::error::{GpuError, Result};
use ash::vk;

/// Convert an optional wait bound into the nanosecond timeout Vulkan expects.
///
/// `None` means wait forever.
pub fn timeout_nanos(timeout: Option<Duration>) -> u64 {
    timeout.map_or(u64::MAX, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
}

/// Create a binary semaphore.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    let create_info = vk::SemaphoreCreateInfo::default();
    Ok(device.create_semaphore(&create_info, None)?)
}

/// Create a fence, optionally already signaled.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_fence(device: &ash::Device, signaled: bool) -> Result<vk::Fence> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };

    let create_info = vk::FenceCreateInfo::default().flags(flags);
    Ok(device.create_fence(&create_info, None)?)
}

/// Block until every fence is signaled.
///
/// A `Some` timeout that expires is reported as [`GpuError::Timeout`].
///
/// # Safety
/// The device and fences must be valid.
pub unsafe fn wait_for_fences(
    device: &ash::Device,
    fences: &[vk::Fence],
    timeout: Option<Duration>,
) -> Result<()> {
    if fences.is_empty() {
        return Ok(());
    }

    match device.wait_for_fences(fences, true, timeout_nanos(timeout)) {
        Ok(()) => Ok(()),
        Err(vk::Result::TIMEOUT) => Err(GpuError::Timeout(timeout.unwrap_or(Duration::MAX))),
        Err(e) => Err(e.into()),
    }
}

/// Reset a fence to the unsignaled state.
///
/// # Safety
/// The device and fence must be valid and the fence must not be pending.
pub unsafe fn reset_fence(device: &ash::Device, fence: vk::Fence) -> Result<()> {
    device.reset_fences(&[fence])?;
    Ok(())
}
