//! Validation-layer message forwarding into `tracing`.

use std::borrow::Cow;
use std::ffi::{c_void, CStr};

use crate::error::Result;
use ash::vk;

/// Routes validation messages of warning severity and above to the log.
pub struct DebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    handle: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    /// Install the messenger on an instance created with `VK_EXT_debug_utils`.
    ///
    /// # Safety
    /// The instance must outlive the messenger.
    pub unsafe fn new(entry: &ash::Entry, instance: &ash::Instance) -> Result<Self> {
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);
        let handle = loader.create_debug_utils_messenger(&messenger_create_info(), None)?;
        Ok(Self { loader, handle })
    }

    /// Remove the messenger.
    ///
    /// # Safety
    /// Must be called before the instance is destroyed.
    pub unsafe fn destroy(&self) {
        self.loader
            .destroy_debug_utils_messenger(self.handle, None);
    }
}

/// Messenger settings, also chained into instance creation so that
/// instance creation and destruction are validated too.
pub fn messenger_create_info() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback))
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    // SAFETY: the loader passes either null or a callback struct valid for this call.
    let message = unsafe {
        callback_data
            .as_ref()
            .filter(|data| !data.p_message.is_null())
            .map_or(Cow::Borrowed("<no message>"), |data| {
                CStr::from_ptr(data.p_message).to_string_lossy()
            })
    };

    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        tracing::error!(target: "vulkan", "[{message_type:?}] {message}");
    } else {
        tracing::warn!(target: "vulkan", "[{message_type:?}] {message}");
    }

    vk::FALSE
}
