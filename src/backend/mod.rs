// Backend module - Vulkan bootstrap
//
// Stage helpers (device, swapchain, pipeline, commands, sync) talk to the
// driver only through `GraphicsApi`, so the whole bootstrap also runs
// against the recording mock in tests.

pub mod api;
pub mod bootstrap;
pub mod commands;
pub mod device;
pub mod error;
#[cfg(test)]
pub mod mock;
pub mod pipeline;
pub mod resources;
pub mod selection;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod vulkan;

pub use api::SurfaceTarget;
pub use bootstrap::{Bootstrap, BootstrapSettings, FrameStatus};
pub use shader::ShaderPaths;
pub use vulkan::AshApi;
