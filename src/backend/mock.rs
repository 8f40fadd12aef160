// Recording mock of the graphics API (no GPU required)
//
// Hands out fake sequential handles and appends every call to a shared log,
// so tests can inspect what the bootstrap did even after it was dropped.

use anyhow::{bail, Result};
use ash::vk::{self, Handle};
use parking_lot::{Mutex, MutexGuard};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle, XlibDisplayHandle, XlibWindowHandle};
use std::collections::VecDeque;
use std::sync::Arc;

use super::api::*;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    InstanceExtensions,
    InstanceLayers,
    EnumeratePhysicalDevices,
    PhysicalDeviceInfo(vk::PhysicalDevice),
    QueueFamilies(vk::PhysicalDevice),
    SurfaceSupport(u32),
    DeviceExtensions(vk::PhysicalDevice),
    DeviceQueue(u32, u32),
    SurfaceCapabilities,
    SurfaceFormats,
    SurfacePresentModes,
    SwapchainImages(vk::SwapchainKHR),
    AllocateCommandBuffers(u32),
    Record(vk::CommandBuffer, CommandRecording),
    WaitForFence(vk::Fence),
    ResetFence(vk::Fence),
    Acquire(vk::Semaphore),
    Submit(FrameSubmit),
    Present(FramePresent),
    DeviceWaitIdle,
    Create(Resource),
    Destroy(Resource),
}

impl Call {
    /// Calls that need a logical device to exist
    pub fn is_device_level(&self) -> bool {
        match self {
            Call::DeviceQueue(..)
            | Call::SwapchainImages(_)
            | Call::AllocateCommandBuffers(_)
            | Call::Record(..)
            | Call::WaitForFence(_)
            | Call::ResetFence(_)
            | Call::Acquire(_)
            | Call::Submit(_)
            | Call::Present(_)
            | Call::DeviceWaitIdle => true,
            Call::Create(resource) => !matches!(
                resource,
                Resource::Instance(_) | Resource::DebugCallback(_) | Resource::Surface(_)
            ),
            _ => false,
        }
    }
}

/// Scripted driver behaviour plus everything recorded so far
pub struct MockState {
    pub calls: Vec<Call>,
    next_handle: u64,

    pub fail_create_instance: bool,
    pub fail_create_pipeline: bool,
    pub instance_extensions: Vec<String>,
    pub instance_layers: Vec<String>,
    pub physical_devices: Vec<PhysicalDeviceInfo>,
    pub queue_families: Vec<vk::QueueFamilyProperties>,
    pub present_support: bool,
    pub device_extensions: Vec<String>,
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
    /// Consumed before falling back to round-robin image indices
    pub acquire_script: VecDeque<Acquire>,
    pub present_script: VecDeque<PresentOutcome>,

    pub instance_desc: Option<InstanceDesc>,
    pub device_desc: Option<DeviceDesc>,
    pub swapchain_descs: Vec<SwapchainDesc>,
    next_image: u32,
}

impl MockState {
    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn create(&mut self, make: impl FnOnce(u64) -> Resource) -> Resource {
        let raw = self.handle();
        let resource = make(raw);
        self.calls.push(Call::Create(resource));
        resource
    }

    fn image_count(&self) -> u32 {
        self.swapchain_descs
            .last()
            .map(|desc| desc.image_count)
            .unwrap_or(0)
    }
}

#[derive(Clone)]
pub struct MockApi {
    state: Arc<Mutex<MockState>>,
}

impl MockApi {
    /// One discrete GPU whose family 0 does graphics and presentation,
    /// an Xlib-capable loader with debug-report and validation available
    pub fn new() -> Self {
        let state = MockState {
            calls: Vec::new(),
            next_handle: 0,
            fail_create_instance: false,
            fail_create_pipeline: false,
            instance_extensions: vec![
                "VK_KHR_surface".to_string(),
                "VK_KHR_xlib_surface".to_string(),
                "VK_EXT_debug_report".to_string(),
            ],
            instance_layers: vec!["VK_LAYER_KHRONOS_validation".to_string()],
            physical_devices: vec![PhysicalDeviceInfo {
                name: "Mock GPU".to_string(),
                device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
                api_version: vk::API_VERSION_1_0,
                memory_heaps: vec![(256 << 20, vk::MemoryHeapFlags::DEVICE_LOCAL)],
            }],
            queue_families: vec![vk::QueueFamilyProperties {
                queue_flags: vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER,
                queue_count: 1,
                ..Default::default()
            }],
            present_support: true,
            device_extensions: vec!["VK_KHR_swapchain".to_string()],
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 3,
                max_image_count: 4,
                current_extent: vk::Extent2D { width: 640, height: 480 },
                min_image_extent: vk::Extent2D { width: 1, height: 1 },
                max_image_extent: vk::Extent2D { width: 640, height: 480 },
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                ..Default::default()
            },
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO],
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            instance_desc: None,
            device_desc: None,
            swapchain_descs: Vec::new(),
            next_image: 0,
        };

        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn configure(self, f: impl FnOnce(&mut MockState)) -> Self {
        f(&mut self.state.lock());
        self
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn created(&self) -> Vec<Resource> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Create(resource) => Some(resource),
                _ => None,
            })
            .collect()
    }

    pub fn destroyed(&self) -> Vec<Resource> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Destroy(resource) => Some(resource),
                _ => None,
            })
            .collect()
    }

    pub fn submits(&self) -> Vec<FrameSubmit> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Submit(submit) => Some(submit),
                _ => None,
            })
            .collect()
    }

    pub fn recordings(&self) -> Vec<(vk::CommandBuffer, CommandRecording)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Record(buffer, recording) => Some((buffer, recording)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| predicate(call)).count()
    }

    fn record(&self, call: Call) {
        self.state.lock().calls.push(call);
    }
}

/// A window target the mock accepts; the handles are never dereferenced
pub fn xlib_target(width: u32, height: u32) -> SurfaceTarget {
    SurfaceTarget::new(
        RawDisplayHandle::Xlib(XlibDisplayHandle::new(None, 0)),
        RawWindowHandle::Xlib(XlibWindowHandle::new(1)),
        width,
        height,
    )
}

impl GraphicsApi for MockApi {
    fn instance_extensions(&self) -> Result<Vec<String>> {
        self.record(Call::InstanceExtensions);
        Ok(self.state.lock().instance_extensions.clone())
    }

    fn instance_layers(&self) -> Result<Vec<String>> {
        self.record(Call::InstanceLayers);
        Ok(self.state.lock().instance_layers.clone())
    }

    fn create_instance(&mut self, desc: &InstanceDesc) -> Result<vk::Instance> {
        let mut state = self.state.lock();
        state.instance_desc = Some(desc.clone());
        if state.fail_create_instance {
            bail!("vkCreateInstance failed: ERROR_INITIALIZATION_FAILED");
        }
        let raw = state.handle();
        let instance = vk::Instance::from_raw(raw);
        state.calls.push(Call::Create(Resource::Instance(instance)));
        Ok(instance)
    }

    fn create_debug_callback(&mut self) -> Result<vk::DebugReportCallbackEXT> {
        match self
            .state
            .lock()
            .create(|raw| Resource::DebugCallback(vk::DebugReportCallbackEXT::from_raw(raw)))
        {
            Resource::DebugCallback(callback) => Ok(callback),
            other => bail!("unexpected {:?}", other),
        }
    }

    fn create_surface(&mut self, _target: &SurfaceTarget) -> Result<vk::SurfaceKHR> {
        match self
            .state
            .lock()
            .create(|raw| Resource::Surface(vk::SurfaceKHR::from_raw(raw)))
        {
            Resource::Surface(surface) => Ok(surface),
            other => bail!("unexpected {:?}", other),
        }
    }

    fn enumerate_physical_devices(&self) -> Result<Vec<vk::PhysicalDevice>> {
        self.record(Call::EnumeratePhysicalDevices);
        let count = self.state.lock().physical_devices.len();
        Ok((0..count)
            .map(|i| vk::PhysicalDevice::from_raw(1000 + i as u64))
            .collect())
    }

    fn physical_device_info(&self, physical_device: vk::PhysicalDevice) -> Result<PhysicalDeviceInfo> {
        self.record(Call::PhysicalDeviceInfo(physical_device));
        let index = physical_device.as_raw().saturating_sub(1000) as usize;
        match self.state.lock().physical_devices.get(index) {
            Some(info) => Ok(info.clone()),
            None => bail!("unknown physical device {:?}", physical_device),
        }
    }

    fn queue_families(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Vec<vk::QueueFamilyProperties>> {
        self.record(Call::QueueFamilies(physical_device));
        Ok(self.state.lock().queue_families.clone())
    }

    fn surface_support(
        &self,
        _physical_device: vk::PhysicalDevice,
        queue_family: u32,
        _surface: vk::SurfaceKHR,
    ) -> Result<bool> {
        self.record(Call::SurfaceSupport(queue_family));
        Ok(self.state.lock().present_support)
    }

    fn device_extensions(&self, physical_device: vk::PhysicalDevice) -> Result<Vec<String>> {
        self.record(Call::DeviceExtensions(physical_device));
        Ok(self.state.lock().device_extensions.clone())
    }

    fn create_device(
        &mut self,
        _physical_device: vk::PhysicalDevice,
        desc: &DeviceDesc,
    ) -> Result<vk::Device> {
        let mut state = self.state.lock();
        state.device_desc = Some(desc.clone());
        match state.create(|raw| Resource::Device(vk::Device::from_raw(raw))) {
            Resource::Device(device) => Ok(device),
            other => bail!("unexpected {:?}", other),
        }
    }

    fn device_queue(&self, queue_family: u32, index: u32) -> Result<vk::Queue> {
        self.record(Call::DeviceQueue(queue_family, index));
        Ok(vk::Queue::from_raw(500 + u64::from(queue_family)))
    }

    fn surface_capabilities(
        &self,
        _physical_device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> Result<vk::SurfaceCapabilitiesKHR> {
        self.record(Call::SurfaceCapabilities);
        Ok(self.state.lock().capabilities)
    }

    fn surface_formats(
        &self,
        _physical_device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::SurfaceFormatKHR>> {
        self.record(Call::SurfaceFormats);
        Ok(self.state.lock().formats.clone())
    }

    fn surface_present_modes(
        &self,
        _physical_device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::PresentModeKHR>> {
        self.record(Call::SurfacePresentModes);
        Ok(self.state.lock().present_modes.clone())
    }

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> Result<vk::SwapchainKHR> {
        let mut state = self.state.lock();
        state.swapchain_descs.push(*desc);
        state.next_image = 0;
        match state.create(|raw| Resource::Swapchain(vk::SwapchainKHR::from_raw(raw))) {
            Resource::Swapchain(swapchain) => Ok(swapchain),
            other => bail!("unexpected {:?}", other),
        }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> Result<Vec<vk::Image>> {
        self.record(Call::SwapchainImages(swapchain));
        let mut state = self.state.lock();
        let count = state.image_count();
        Ok((0..count).map(|_| vk::Image::from_raw(state.handle())).collect())
    }

    fn create_image_view(&mut self, _image: vk::Image, _format: vk::Format) -> Result<vk::ImageView> {
        match self
            .state
            .lock()
            .create(|raw| Resource::ImageView(vk::ImageView::from_raw(raw)))
        {
            Resource::ImageView(view) => Ok(view),
            other => bail!("unexpected {:?}", other),
        }
    }

    fn create_render_pass(&mut self, _format: vk::Format) -> Result<vk::RenderPass> {
        match self
            .state
            .lock()
            .create(|raw| Resource::RenderPass(vk::RenderPass::from_raw(raw)))
        {
            Resource::RenderPass(pass) => Ok(pass),
            other => bail!("unexpected {:?}", other),
        }
    }

    fn create_shader_module(&mut self, code: &[u32]) -> Result<vk::ShaderModule> {
        if code.is_empty() {
            bail!("empty SPIR-V");
        }
        match self
            .state
            .lock()
            .create(|raw| Resource::ShaderModule(vk::ShaderModule::from_raw(raw)))
        {
            Resource::ShaderModule(module) => Ok(module),
            other => bail!("unexpected {:?}", other),
        }
    }

    fn create_pipeline_layout(&mut self) -> Result<vk::PipelineLayout> {
        match self
            .state
            .lock()
            .create(|raw| Resource::PipelineLayout(vk::PipelineLayout::from_raw(raw)))
        {
            Resource::PipelineLayout(layout) => Ok(layout),
            other => bail!("unexpected {:?}", other),
        }
    }

    fn create_graphics_pipeline(&mut self, _desc: &PipelineDesc) -> Result<vk::Pipeline> {
        let mut state = self.state.lock();
        if state.fail_create_pipeline {
            bail!("vkCreateGraphicsPipelines failed: ERROR_INVALID_SHADER_NV");
        }
        match state.create(|raw| Resource::Pipeline(vk::Pipeline::from_raw(raw))) {
            Resource::Pipeline(pipeline) => Ok(pipeline),
            other => bail!("unexpected {:?}", other),
        }
    }

    fn create_framebuffer(
        &mut self,
        _render_pass: vk::RenderPass,
        _view: vk::ImageView,
        _extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer> {
        match self
            .state
            .lock()
            .create(|raw| Resource::Framebuffer(vk::Framebuffer::from_raw(raw)))
        {
            Resource::Framebuffer(framebuffer) => Ok(framebuffer),
            other => bail!("unexpected {:?}", other),
        }
    }

    fn create_command_pool(&mut self, _queue_family: u32) -> Result<vk::CommandPool> {
        match self
            .state
            .lock()
            .create(|raw| Resource::CommandPool(vk::CommandPool::from_raw(raw)))
        {
            Resource::CommandPool(pool) => Ok(pool),
            other => bail!("unexpected {:?}", other),
        }
    }

    fn allocate_command_buffers(
        &mut self,
        _pool: vk::CommandPool,
        count: u32,
    ) -> Result<Vec<vk::CommandBuffer>> {
        let mut state = self.state.lock();
        state.calls.push(Call::AllocateCommandBuffers(count));
        Ok((0..count)
            .map(|_| vk::CommandBuffer::from_raw(state.handle()))
            .collect())
    }

    fn record_command_buffer(
        &mut self,
        command_buffer: vk::CommandBuffer,
        recording: &CommandRecording,
    ) -> Result<()> {
        self.record(Call::Record(command_buffer, *recording));
        Ok(())
    }

    fn create_semaphore(&mut self) -> Result<vk::Semaphore> {
        match self
            .state
            .lock()
            .create(|raw| Resource::Semaphore(vk::Semaphore::from_raw(raw)))
        {
            Resource::Semaphore(semaphore) => Ok(semaphore),
            other => bail!("unexpected {:?}", other),
        }
    }

    fn create_fence(&mut self, _signaled: bool) -> Result<vk::Fence> {
        match self
            .state
            .lock()
            .create(|raw| Resource::Fence(vk::Fence::from_raw(raw)))
        {
            Resource::Fence(fence) => Ok(fence),
            other => bail!("unexpected {:?}", other),
        }
    }

    fn wait_for_fence(&self, fence: vk::Fence, _timeout: u64) -> Result<()> {
        self.record(Call::WaitForFence(fence));
        Ok(())
    }

    fn reset_fence(&self, fence: vk::Fence) -> Result<()> {
        self.record(Call::ResetFence(fence));
        Ok(())
    }

    fn acquire_next_image(
        &self,
        _swapchain: vk::SwapchainKHR,
        _timeout: u64,
        semaphore: vk::Semaphore,
    ) -> Result<Acquire> {
        let mut state = self.state.lock();
        state.calls.push(Call::Acquire(semaphore));
        if let Some(scripted) = state.acquire_script.pop_front() {
            return Ok(scripted);
        }
        let count = state.image_count().max(1);
        let index = state.next_image % count;
        state.next_image += 1;
        Ok(Acquire::Image {
            index,
            suboptimal: false,
        })
    }

    fn queue_submit(&self, _queue: vk::Queue, submit: &FrameSubmit) -> Result<()> {
        self.record(Call::Submit(*submit));
        Ok(())
    }

    fn queue_present(&self, _queue: vk::Queue, present: &FramePresent) -> Result<PresentOutcome> {
        let mut state = self.state.lock();
        state.calls.push(Call::Present(*present));
        Ok(state
            .present_script
            .pop_front()
            .unwrap_or(PresentOutcome::Presented))
    }

    fn device_wait_idle(&self) -> Result<()> {
        self.record(Call::DeviceWaitIdle);
        Ok(())
    }

    fn destroy(&mut self, resource: Resource) {
        self.record(Call::Destroy(resource));
    }
}
