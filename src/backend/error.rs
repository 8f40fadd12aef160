// Fatal setup conditions
//
// API call failures carry their vk::Result through anyhow context; the
// variants here name the conditions the bootstrap itself detects.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    /// A required instance extension is not offered by the loader
    #[error("Required instance extension {0} is not available")]
    MissingInstanceExtension(String),

    /// The window handle belongs to a window system without a surface path
    #[error("Unsupported window system: {0}")]
    UnsupportedWindowSystem(String),

    #[error("No Vulkan-capable physical device found")]
    NoPhysicalDevice,

    #[error("No queue family supports both graphics and presentation")]
    NoQueueFamily,

    /// A required device extension is not offered by the selected GPU
    #[error("Required device extension {0} is not supported")]
    MissingDeviceExtension(String),

    #[error("Surface reports no formats")]
    NoSurfaceFormat,
}
