//! Validation layer message routing
//!
//! The messenger callback carries a pointer to a boxed [`DebugSink`] as its
//! user data, so messages reach an object owned by the instance instead of
//! any process-wide state.

use ash::extensions::ext::DebugUtils;
use ash::{vk, Entry, Instance};
use std::ffi::{c_void, CStr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::context::{VulkanError, VulkanResult};

/// Name of the Khronos validation layer
pub const VALIDATION_LAYER: &CStr =
    unsafe { CStr::from_bytes_with_nul_unchecked(b"VK_LAYER_KHRONOS_validation\0") };

/// Severity of a validation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MessageSeverity {
    /// Diagnostic chatter
    Verbose,
    /// Informational
    Info,
    /// Likely a bug or a performance problem
    Warning,
    /// The API was used incorrectly
    Error,
}

impl MessageSeverity {
    /// Classify the most severe bit in a Vulkan severity mask
    pub fn from_vk(flags: vk::DebugUtilsMessageSeverityFlagsEXT) -> Self {
        if flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            Self::Error
        } else if flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            Self::Warning
        } else if flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            Self::Info
        } else {
            Self::Verbose
        }
    }
}

/// Receiver for validation layer messages
pub trait DebugSink: Send + Sync {
    /// Handle one message
    fn message(&self, severity: MessageSeverity, kind: vk::DebugUtilsMessageTypeFlagsEXT, text: &str);
}

/// Sink that forwards to the `log` facade and counts errors
#[derive(Debug, Default)]
pub struct LogSink {
    errors: AtomicUsize,
}

impl LogSink {
    /// Create a sink with a zero error count
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of error-severity messages received so far
    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }
}

impl DebugSink for LogSink {
    fn message(&self, severity: MessageSeverity, kind: vk::DebugUtilsMessageTypeFlagsEXT, text: &str) {
        match severity {
            MessageSeverity::Error => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                log::error!("[Vulkan] {:?} - {}", kind, text);
            }
            MessageSeverity::Warning => log::warn!("[Vulkan] {:?} - {}", kind, text),
            MessageSeverity::Info => log::debug!("[Vulkan] {:?} - {}", kind, text),
            MessageSeverity::Verbose => log::trace!("[Vulkan] {:?} - {}", kind, text),
        }
    }
}

/// Heap slot whose address is handed to the driver as callback user data
pub(crate) type SinkSlot = Box<Arc<dyn DebugSink>>;

/// Messenger create info routed to `sink`
///
/// Also chained into instance creation so instance create/destroy calls are covered.
pub(crate) fn messenger_create_info(sink: &SinkSlot) -> vk::DebugUtilsMessengerCreateInfoEXT {
    let user_data = &**sink as *const Arc<dyn DebugSink> as *mut c_void;

    vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback))
        .user_data(user_data)
        .build()
}

/// Whether the validation layer is installed
pub fn validation_layer_available(entry: &Entry) -> VulkanResult<bool> {
    let layers = entry.enumerate_instance_layer_properties().map_err(VulkanError::Api)?;
    Ok(layers.iter().any(|layer| {
        let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
        name == VALIDATION_LAYER
    }))
}

/// Registered debug messenger, destroyed on drop
///
/// Must be dropped before the instance it was created from.
pub struct DebugMessenger {
    loader: DebugUtils,
    messenger: vk::DebugUtilsMessengerEXT,
    // Referenced by the driver through the messenger's user data
    _sink: SinkSlot,
}

impl DebugMessenger {
    /// Register a messenger that routes messages into `sink`
    pub fn new(entry: &Entry, instance: &Instance, sink: SinkSlot) -> VulkanResult<Self> {
        let loader = DebugUtils::new(entry, instance);
        let create_info = messenger_create_info(&sink);

        let messenger = unsafe {
            loader
                .create_debug_utils_messenger(&create_info, None)
                .map_err(VulkanError::Api)?
        };
        log::debug!("Debug messenger registered");

        Ok(Self {
            loader,
            messenger,
            _sink: sink,
        })
    }
}

impl Drop for DebugMessenger {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_debug_utils_messenger(self.messenger, None);
        }
        log::debug!("Debug messenger destroyed");
    }
}

unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    user_data: *mut c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || user_data.is_null() {
        return vk::FALSE;
    }

    let p_message = (*callback_data).p_message;
    let message = if p_message.is_null() {
        std::borrow::Cow::Borrowed("<no message>")
    } else {
        CStr::from_ptr(p_message).to_string_lossy()
    };

    let sink = &*(user_data as *const Arc<dyn DebugSink>);
    sink.message(MessageSeverity::from_vk(message_severity), message_type, &message);

    vk::FALSE
}
