// Graphics API seam
//
// Every bootstrap stage talks to the driver through `GraphicsApi`. The
// production implementation wraps ash's loaded function tables; the tests
// drive the same stages through a recording mock.

use anyhow::Result;
use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

/// An owned graphics handle, tagged by kind so it can be destroyed later
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Instance(vk::Instance),
    DebugCallback(vk::DebugReportCallbackEXT),
    Surface(vk::SurfaceKHR),
    Device(vk::Device),
    Swapchain(vk::SwapchainKHR),
    ImageView(vk::ImageView),
    RenderPass(vk::RenderPass),
    ShaderModule(vk::ShaderModule),
    PipelineLayout(vk::PipelineLayout),
    Pipeline(vk::Pipeline),
    Framebuffer(vk::Framebuffer),
    /// Destroying the pool frees its command buffers
    CommandPool(vk::CommandPool),
    Semaphore(vk::Semaphore),
    Fence(vk::Fence),
}

/// The native window the swapchain presents to
#[derive(Debug, Clone, Copy)]
pub struct SurfaceTarget {
    pub display: RawDisplayHandle,
    pub window: RawWindowHandle,
    pub width: u32,
    pub height: u32,
}

impl SurfaceTarget {
    pub fn new(display: RawDisplayHandle, window: RawWindowHandle, width: u32, height: u32) -> Self {
        Self {
            display,
            window,
            width,
            height,
        }
    }

    /// Platform surface extension for this display. `None` for window
    /// systems `create_surface` cannot bind, so setup stops before the
    /// instance exists. AppKit and UiKit need a CAMetalLayer, which is not
    /// supported here.
    pub fn surface_extension(&self) -> Option<&'static str> {
        match self.display {
            RawDisplayHandle::Windows(_) => Some("VK_KHR_win32_surface"),
            RawDisplayHandle::Xlib(_) => Some("VK_KHR_xlib_surface"),
            RawDisplayHandle::Xcb(_) => Some("VK_KHR_xcb_surface"),
            RawDisplayHandle::Wayland(_) => Some("VK_KHR_wayland_surface"),
            _ => None,
        }
    }
}

/// Cached description of one physical device
#[derive(Debug, Clone)]
pub struct PhysicalDeviceInfo {
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub api_version: u32,
    /// (size in bytes, flags) per memory heap
    pub memory_heaps: Vec<(vk::DeviceSize, vk::MemoryHeapFlags)>,
}

#[derive(Debug, Clone)]
pub struct InstanceDesc {
    pub app_name: String,
    pub extensions: Vec<String>,
    pub layers: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DeviceDesc {
    pub queue_family: u32,
    pub extensions: Vec<String>,
    pub layers: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct SwapchainDesc {
    pub surface: vk::SurfaceKHR,
    pub image_count: u32,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineDesc {
    pub render_pass: vk::RenderPass,
    pub layout: vk::PipelineLayout,
    pub extent: vk::Extent2D,
    pub vertex_shader: vk::ShaderModule,
    pub fragment_shader: vk::ShaderModule,
}

/// Everything recorded into one static command buffer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandRecording {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
    pub clear_color: [f32; 4],
    /// Bound and drawn with `vertex_count` vertices when present
    pub pipeline: Option<vk::Pipeline>,
    pub vertex_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSubmit {
    pub command_buffer: vk::CommandBuffer,
    pub wait_semaphore: vk::Semaphore,
    pub wait_stage: vk::PipelineStageFlags,
    pub signal_semaphore: vk::Semaphore,
    pub fence: vk::Fence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePresent {
    pub swapchain: vk::SwapchainKHR,
    pub image_index: u32,
    pub wait_semaphore: vk::Semaphore,
}

/// Result of asking the swapchain for the next image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    Image { index: u32, suboptimal: bool },
    OutOfDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

/// Typed capability table for every call the bootstrap makes.
///
/// Instance- and device-level calls operate on the instance and device
/// created through this same object; handles are passed where the call
/// needs to name a specific object.
pub trait GraphicsApi {
    fn instance_extensions(&self) -> Result<Vec<String>>;
    fn instance_layers(&self) -> Result<Vec<String>>;
    fn create_instance(&mut self, desc: &InstanceDesc) -> Result<vk::Instance>;
    fn create_debug_callback(&mut self) -> Result<vk::DebugReportCallbackEXT>;
    fn create_surface(&mut self, target: &SurfaceTarget) -> Result<vk::SurfaceKHR>;

    fn enumerate_physical_devices(&self) -> Result<Vec<vk::PhysicalDevice>>;
    fn physical_device_info(&self, physical_device: vk::PhysicalDevice) -> Result<PhysicalDeviceInfo>;
    fn queue_families(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Vec<vk::QueueFamilyProperties>>;
    fn surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
        surface: vk::SurfaceKHR,
    ) -> Result<bool>;
    fn device_extensions(&self, physical_device: vk::PhysicalDevice) -> Result<Vec<String>>;
    fn create_device(
        &mut self,
        physical_device: vk::PhysicalDevice,
        desc: &DeviceDesc,
    ) -> Result<vk::Device>;
    fn device_queue(&self, queue_family: u32, index: u32) -> Result<vk::Queue>;

    fn surface_capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<vk::SurfaceCapabilitiesKHR>;
    fn surface_formats(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::SurfaceFormatKHR>>;
    fn surface_present_modes(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::PresentModeKHR>>;
    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> Result<vk::SwapchainKHR>;
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> Result<Vec<vk::Image>>;
    fn create_image_view(&mut self, image: vk::Image, format: vk::Format) -> Result<vk::ImageView>;

    fn create_render_pass(&mut self, format: vk::Format) -> Result<vk::RenderPass>;
    fn create_shader_module(&mut self, code: &[u32]) -> Result<vk::ShaderModule>;
    fn create_pipeline_layout(&mut self) -> Result<vk::PipelineLayout>;
    fn create_graphics_pipeline(&mut self, desc: &PipelineDesc) -> Result<vk::Pipeline>;
    fn create_framebuffer(
        &mut self,
        render_pass: vk::RenderPass,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer>;

    fn create_command_pool(&mut self, queue_family: u32) -> Result<vk::CommandPool>;
    fn allocate_command_buffers(
        &mut self,
        pool: vk::CommandPool,
        count: u32,
    ) -> Result<Vec<vk::CommandBuffer>>;
    fn record_command_buffer(
        &mut self,
        command_buffer: vk::CommandBuffer,
        recording: &CommandRecording,
    ) -> Result<()>;

    fn create_semaphore(&mut self) -> Result<vk::Semaphore>;
    fn create_fence(&mut self, signaled: bool) -> Result<vk::Fence>;
    fn wait_for_fence(&self, fence: vk::Fence, timeout: u64) -> Result<()>;
    fn reset_fence(&self, fence: vk::Fence) -> Result<()>;

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        semaphore: vk::Semaphore,
    ) -> Result<Acquire>;
    fn queue_submit(&self, queue: vk::Queue, submit: &FrameSubmit) -> Result<()>;
    fn queue_present(&self, queue: vk::Queue, present: &FramePresent) -> Result<PresentOutcome>;
    fn device_wait_idle(&self) -> Result<()>;

    /// Destroy one handle. Callers guarantee nothing still references it.
    fn destroy(&mut self, resource: Resource);
}
