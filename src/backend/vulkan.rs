// Vulkan driver access through ash
//
// Owns the loader entry and the instance/device function tables. Handles
// created here are tracked by the caller's resource stack and come back
// through `destroy` in reverse order.

use anyhow::{Context, Result};
use ash::extensions::{ext, khr};
use ash::vk;
use ash::Entry;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::{c_char, c_void, CStr, CString};
use std::ptr;

use super::api::*;
use super::error::SetupError;

pub struct AshApi {
    entry: Entry,
    instance: Option<ash::Instance>,
    surface_loader: Option<khr::Surface>,
    debug_report: Option<ext::DebugReport>,
    device: Option<ash::Device>,
    swapchain_loader: Option<khr::Swapchain>,
}

impl AshApi {
    /// Load the Vulkan library
    pub fn load() -> Result<Self> {
        let entry = unsafe { Entry::load() }.context("Failed to load Vulkan library")?;

        Ok(Self {
            entry,
            instance: None,
            surface_loader: None,
            debug_report: None,
            device: None,
            swapchain_loader: None,
        })
    }

    fn instance(&self) -> Result<&ash::Instance> {
        self.instance.as_ref().context("Vulkan instance not created")
    }

    fn surface_loader(&self) -> Result<&khr::Surface> {
        self.surface_loader
            .as_ref()
            .context("Surface loader not initialized")
    }

    fn device(&self) -> Result<&ash::Device> {
        self.device.as_ref().context("Logical device not created")
    }

    fn swapchain_loader(&self) -> Result<&khr::Swapchain> {
        self.swapchain_loader
            .as_ref()
            .context("Swapchain loader not initialized")
    }
}

fn to_cstrings(names: &[String]) -> Result<Vec<CString>> {
    names
        .iter()
        .map(|name| CString::new(name.as_str()).context("Name contains a NUL byte"))
        .collect()
}

/// Driver-owned fixed-size name array to an owned String
fn name_to_string(name: &[c_char]) -> String {
    unsafe { CStr::from_ptr(name.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

impl GraphicsApi for AshApi {
    fn instance_extensions(&self) -> Result<Vec<String>> {
        let properties = self
            .entry
            .enumerate_instance_extension_properties(None)
            .context("Failed to enumerate instance extensions")?;
        Ok(properties
            .iter()
            .map(|p| name_to_string(&p.extension_name))
            .collect())
    }

    fn instance_layers(&self) -> Result<Vec<String>> {
        let properties = self
            .entry
            .enumerate_instance_layer_properties()
            .context("Failed to enumerate instance layers")?;
        Ok(properties
            .iter()
            .map(|p| name_to_string(&p.layer_name))
            .collect())
    }

    fn create_instance(&mut self, desc: &InstanceDesc) -> Result<vk::Instance> {
        let app_name = CString::new(desc.app_name.as_str())?;
        let engine_name = CString::new("vkboot")?;

        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let extensions = to_cstrings(&desc.extensions)?;
        let extension_ptrs: Vec<_> = extensions.iter().map(|e| e.as_ptr()).collect();
        let layers = to_cstrings(&desc.layers)?;
        let layer_ptrs: Vec<_> = layers.iter().map(|l| l.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs);

        let instance = unsafe { self.entry.create_instance(&create_info, None) }?;
        let handle = instance.handle();

        self.surface_loader = Some(khr::Surface::new(&self.entry, &instance));
        self.instance = Some(instance);

        Ok(handle)
    }

    fn create_debug_callback(&mut self) -> Result<vk::DebugReportCallbackEXT> {
        let loader = ext::DebugReport::new(&self.entry, self.instance()?);

        let create_info = vk::DebugReportCallbackCreateInfoEXT::builder()
            .flags(
                vk::DebugReportFlagsEXT::ERROR
                    | vk::DebugReportFlagsEXT::WARNING
                    | vk::DebugReportFlagsEXT::PERFORMANCE_WARNING
                    | vk::DebugReportFlagsEXT::INFORMATION
                    | vk::DebugReportFlagsEXT::DEBUG,
            )
            .pfn_callback(Some(debug_report_callback));

        let callback = unsafe { loader.create_debug_report_callback(&create_info, None) }?;
        self.debug_report = Some(loader);

        Ok(callback)
    }

    fn create_surface(&mut self, target: &SurfaceTarget) -> Result<vk::SurfaceKHR> {
        let instance = self.instance()?;

        let surface = match (target.display, target.window) {
            (RawDisplayHandle::Windows(_), RawWindowHandle::Win32(handle)) => {
                let hinstance =
                    handle.hinstance.map(|h| h.get()).unwrap_or(0) as *const c_void;
                let hwnd = handle.hwnd.get() as *const c_void;
                let create_info = vk::Win32SurfaceCreateInfoKHR::builder()
                    .hinstance(hinstance)
                    .hwnd(hwnd);
                let loader = khr::Win32Surface::new(&self.entry, instance);
                unsafe { loader.create_win32_surface(&create_info, None) }?
            }
            (RawDisplayHandle::Xlib(display), RawWindowHandle::Xlib(window)) => {
                let dpy = display
                    .display
                    .map(|d| d.as_ptr())
                    .unwrap_or(ptr::null_mut());
                let create_info = vk::XlibSurfaceCreateInfoKHR::builder()
                    .dpy(dpy.cast())
                    .window(window.window);
                let loader = khr::XlibSurface::new(&self.entry, instance);
                unsafe { loader.create_xlib_surface(&create_info, None) }?
            }
            (RawDisplayHandle::Xcb(display), RawWindowHandle::Xcb(window)) => {
                let connection = display
                    .connection
                    .map(|c| c.as_ptr())
                    .unwrap_or(ptr::null_mut());
                let create_info = vk::XcbSurfaceCreateInfoKHR::builder()
                    .connection(connection.cast())
                    .window(window.window.get());
                let loader = khr::XcbSurface::new(&self.entry, instance);
                unsafe { loader.create_xcb_surface(&create_info, None) }?
            }
            (RawDisplayHandle::Wayland(display), RawWindowHandle::Wayland(window)) => {
                let create_info = vk::WaylandSurfaceCreateInfoKHR::builder()
                    .display(display.display.as_ptr().cast())
                    .surface(window.surface.as_ptr().cast());
                let loader = khr::WaylandSurface::new(&self.entry, instance);
                unsafe { loader.create_wayland_surface(&create_info, None) }?
            }
            (display, _) => {
                return Err(SetupError::UnsupportedWindowSystem(format!("{:?}", display)).into())
            }
        };

        Ok(surface)
    }

    fn enumerate_physical_devices(&self) -> Result<Vec<vk::PhysicalDevice>> {
        let devices = unsafe { self.instance()?.enumerate_physical_devices() }
            .context("Failed to enumerate physical devices")?;
        Ok(devices)
    }

    fn physical_device_info(&self, physical_device: vk::PhysicalDevice) -> Result<PhysicalDeviceInfo> {
        let instance = self.instance()?;
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let memory = unsafe { instance.get_physical_device_memory_properties(physical_device) };

        let memory_heaps = memory.memory_heaps[..memory.memory_heap_count as usize]
            .iter()
            .map(|heap| (heap.size, heap.flags))
            .collect();

        Ok(PhysicalDeviceInfo {
            name: name_to_string(&properties.device_name),
            device_type: properties.device_type,
            api_version: properties.api_version,
            memory_heaps,
        })
    }

    fn queue_families(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Vec<vk::QueueFamilyProperties>> {
        let instance = self.instance()?;
        Ok(unsafe { instance.get_physical_device_queue_family_properties(physical_device) })
    }

    fn surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
        surface: vk::SurfaceKHR,
    ) -> Result<bool> {
        let supported = unsafe {
            self.surface_loader()?.get_physical_device_surface_support(
                physical_device,
                queue_family,
                surface,
            )
        }?;
        Ok(supported)
    }

    fn device_extensions(&self, physical_device: vk::PhysicalDevice) -> Result<Vec<String>> {
        let properties = unsafe {
            self.instance()?
                .enumerate_device_extension_properties(physical_device)
        }
        .context("Failed to enumerate device extensions")?;
        Ok(properties
            .iter()
            .map(|p| name_to_string(&p.extension_name))
            .collect())
    }

    fn create_device(
        &mut self,
        physical_device: vk::PhysicalDevice,
        desc: &DeviceDesc,
    ) -> Result<vk::Device> {
        let instance = self.instance()?;

        let queue_priorities = [1.0];
        let queue_create_info = vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(desc.queue_family)
            .queue_priorities(&queue_priorities)
            .build();
        let queue_create_infos = [queue_create_info];

        let extensions = to_cstrings(&desc.extensions)?;
        let extension_ptrs: Vec<_> = extensions.iter().map(|e| e.as_ptr()).collect();
        // Device layers are ignored by current loaders but older ones honor them
        let layers = to_cstrings(&desc.layers)?;
        let layer_ptrs: Vec<_> = layers.iter().map(|l| l.as_ptr()).collect();

        let features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs)
            .enabled_features(&features);

        let device = unsafe { instance.create_device(physical_device, &create_info, None) }?;
        let handle = device.handle();
        let swapchain_loader = khr::Swapchain::new(instance, &device);

        self.swapchain_loader = Some(swapchain_loader);
        self.device = Some(device);

        Ok(handle)
    }

    fn device_queue(&self, queue_family: u32, index: u32) -> Result<vk::Queue> {
        Ok(unsafe { self.device()?.get_device_queue(queue_family, index) })
    }

    fn surface_capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<vk::SurfaceCapabilitiesKHR> {
        let caps = unsafe {
            self.surface_loader()?
                .get_physical_device_surface_capabilities(physical_device, surface)
        }?;
        Ok(caps)
    }

    fn surface_formats(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::SurfaceFormatKHR>> {
        let formats = unsafe {
            self.surface_loader()?
                .get_physical_device_surface_formats(physical_device, surface)
        }?;
        Ok(formats)
    }

    fn surface_present_modes(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::PresentModeKHR>> {
        let modes = unsafe {
            self.surface_loader()?
                .get_physical_device_surface_present_modes(physical_device, surface)
        }?;
        Ok(modes)
    }

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> Result<vk::SwapchainKHR> {
        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(desc.surface)
            .min_image_count(desc.image_count)
            .image_format(desc.format.format)
            .image_color_space(desc.format.color_space)
            .image_extent(desc.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(desc.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(desc.present_mode)
            .clipped(true);

        let swapchain = unsafe { self.swapchain_loader()?.create_swapchain(&create_info, None) }?;
        Ok(swapchain)
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> Result<Vec<vk::Image>> {
        let images = unsafe { self.swapchain_loader()?.get_swapchain_images(swapchain) }?;
        Ok(images)
    }

    fn create_image_view(&mut self, image: vk::Image, format: vk::Format) -> Result<vk::ImageView> {
        let create_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        let view = unsafe { self.device()?.create_image_view(&create_info, None) }?;
        Ok(view)
    }

    fn create_render_pass(&mut self, format: vk::Format) -> Result<vk::RenderPass> {
        // Color attachment (the swapchain image)
        let color_attachment = vk::AttachmentDescription::builder()
            .format(format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .build();

        let color_attachment_ref = vk::AttachmentReference::builder()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .build();

        let color_attachments = &[color_attachment_ref];
        let subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(color_attachments)
            .build();

        // The image is only writable once the acquire semaphore has fired
        let dependency = vk::SubpassDependency::builder()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            )
            .build();

        let attachments = &[color_attachment];
        let subpasses = &[subpass];
        let dependencies = &[dependency];
        let render_pass_info = vk::RenderPassCreateInfo::builder()
            .attachments(attachments)
            .subpasses(subpasses)
            .dependencies(dependencies);

        let render_pass = unsafe { self.device()?.create_render_pass(&render_pass_info, None) }?;
        Ok(render_pass)
    }

    fn create_shader_module(&mut self, code: &[u32]) -> Result<vk::ShaderModule> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(code);
        let module = unsafe { self.device()?.create_shader_module(&create_info, None) }?;
        Ok(module)
    }

    fn create_pipeline_layout(&mut self) -> Result<vk::PipelineLayout> {
        let layout_info = vk::PipelineLayoutCreateInfo::builder();
        let layout = unsafe { self.device()?.create_pipeline_layout(&layout_info, None) }?;
        Ok(layout)
    }

    fn create_graphics_pipeline(&mut self, desc: &PipelineDesc) -> Result<vk::Pipeline> {
        let entry_point = c"main";

        let vert_stage = vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(desc.vertex_shader)
            .name(entry_point)
            .build();

        let frag_stage = vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(desc.fragment_shader)
            .name(entry_point)
            .build();

        let shader_stages = &[vert_stage, frag_stage];

        // Positions come from gl_VertexIndex, no vertex buffers
        let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::builder();

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewport = vk::Viewport::builder()
            .x(0.0)
            .y(0.0)
            .width(desc.extent.width as f32)
            .height(desc.extent.height as f32)
            .min_depth(0.0)
            .max_depth(1.0)
            .build();

        let scissor = vk::Rect2D::builder()
            .offset(vk::Offset2D { x: 0, y: 0 })
            .extent(desc.extent)
            .build();

        let viewports = &[viewport];
        let scissors = &[scissor];
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewports(viewports)
            .scissors(scissors);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        // Color blending (no blending, opaque)
        let color_blend_attachment = vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
            .build();

        let color_blend_attachments = &[color_blend_attachment];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(color_blend_attachments);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(shader_stages)
            .vertex_input_state(&vertex_input_info)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blending)
            .layout(desc.layout)
            .render_pass(desc.render_pass)
            .subpass(0)
            .build();

        let pipelines = unsafe {
            self.device()?
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
                .map_err(|(_, e)| e)
        }?;

        pipelines
            .into_iter()
            .next()
            .context("Driver returned no pipeline")
    }

    fn create_framebuffer(
        &mut self,
        render_pass: vk::RenderPass,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer> {
        let attachments = [view];
        let framebuffer_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe { self.device()?.create_framebuffer(&framebuffer_info, None) }?;
        Ok(framebuffer)
    }

    fn create_command_pool(&mut self, queue_family: u32) -> Result<vk::CommandPool> {
        // Buffers are recorded once, so no reset flag
        let pool_info = vk::CommandPoolCreateInfo::builder().queue_family_index(queue_family);
        let pool = unsafe { self.device()?.create_command_pool(&pool_info, None) }?;
        Ok(pool)
    }

    fn allocate_command_buffers(
        &mut self,
        pool: vk::CommandPool,
        count: u32,
    ) -> Result<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        let buffers = unsafe { self.device()?.allocate_command_buffers(&alloc_info) }?;
        Ok(buffers)
    }

    fn record_command_buffer(
        &mut self,
        command_buffer: vk::CommandBuffer,
        recording: &CommandRecording,
    ) -> Result<()> {
        let device = self.device()?;

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: recording.clear_color,
            },
        }];

        let render_pass_info = vk::RenderPassBeginInfo::builder()
            .render_pass(recording.render_pass)
            .framebuffer(recording.framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: recording.extent,
            })
            .clear_values(&clear_values);

        unsafe {
            let begin_info = vk::CommandBufferBeginInfo::builder();
            device.begin_command_buffer(command_buffer, &begin_info)?;

            device.cmd_begin_render_pass(
                command_buffer,
                &render_pass_info,
                vk::SubpassContents::INLINE,
            );

            if let Some(pipeline) = recording.pipeline {
                device.cmd_bind_pipeline(
                    command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    pipeline,
                );
                device.cmd_draw(command_buffer, recording.vertex_count, 1, 0, 0);
            }

            device.cmd_end_render_pass(command_buffer);
            device.end_command_buffer(command_buffer)?;
        }

        Ok(())
    }

    fn create_semaphore(&mut self) -> Result<vk::Semaphore> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let semaphore = unsafe { self.device()?.create_semaphore(&semaphore_info, None) }?;
        Ok(semaphore)
    }

    fn create_fence(&mut self, signaled: bool) -> Result<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let fence_info = vk::FenceCreateInfo::builder().flags(flags);
        let fence = unsafe { self.device()?.create_fence(&fence_info, None) }?;
        Ok(fence)
    }

    fn wait_for_fence(&self, fence: vk::Fence, timeout: u64) -> Result<()> {
        unsafe { self.device()?.wait_for_fences(&[fence], true, timeout) }?;
        Ok(())
    }

    fn reset_fence(&self, fence: vk::Fence) -> Result<()> {
        unsafe { self.device()?.reset_fences(&[fence]) }?;
        Ok(())
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        semaphore: vk::Semaphore,
    ) -> Result<Acquire> {
        let result = unsafe {
            self.swapchain_loader()?.acquire_next_image(
                swapchain,
                timeout,
                semaphore,
                vk::Fence::null(),
            )
        };

        match result {
            Ok((index, suboptimal)) => Ok(Acquire::Image { index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Acquire::OutOfDate),
            Err(e) => Err(e.into()),
        }
    }

    fn queue_submit(&self, queue: vk::Queue, submit: &FrameSubmit) -> Result<()> {
        let wait_semaphores = [submit.wait_semaphore];
        let wait_stages = [submit.wait_stage];
        let command_buffers = [submit.command_buffer];
        let signal_semaphores = [submit.signal_semaphore];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        unsafe {
            self.device()?
                .queue_submit(queue, &[submit_info], submit.fence)
        }?;
        Ok(())
    }

    fn queue_present(&self, queue: vk::Queue, present: &FramePresent) -> Result<PresentOutcome> {
        let wait_semaphores = [present.wait_semaphore];
        let swapchains = [present.swapchain];
        let image_indices = [present.image_index];

        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe { self.swapchain_loader()?.queue_present(queue, &present_info) };

        match result {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(e.into()),
        }
    }

    fn device_wait_idle(&self) -> Result<()> {
        unsafe { self.device()?.device_wait_idle() }?;
        Ok(())
    }

    fn destroy(&mut self, resource: Resource) {
        match resource {
            Resource::Instance(_) => {
                self.debug_report = None;
                self.surface_loader = None;
                if let Some(instance) = self.instance.take() {
                    unsafe { instance.destroy_instance(None) };
                }
            }
            Resource::DebugCallback(callback) => {
                if let Some(loader) = &self.debug_report {
                    unsafe { loader.destroy_debug_report_callback(callback, None) };
                }
            }
            Resource::Surface(surface) => {
                if let Some(loader) = &self.surface_loader {
                    unsafe { loader.destroy_surface(surface, None) };
                }
            }
            Resource::Device(_) => {
                self.swapchain_loader = None;
                if let Some(device) = self.device.take() {
                    unsafe { device.destroy_device(None) };
                }
            }
            Resource::Swapchain(swapchain) => {
                if let Some(loader) = &self.swapchain_loader {
                    unsafe { loader.destroy_swapchain(swapchain, None) };
                }
            }
            other => {
                let Some(device) = &self.device else {
                    log::warn!("Leaking {:?}: logical device already destroyed", other);
                    return;
                };
                unsafe {
                    match other {
                        Resource::ImageView(view) => device.destroy_image_view(view, None),
                        Resource::RenderPass(pass) => device.destroy_render_pass(pass, None),
                        Resource::ShaderModule(module) => {
                            device.destroy_shader_module(module, None)
                        }
                        Resource::PipelineLayout(layout) => {
                            device.destroy_pipeline_layout(layout, None)
                        }
                        Resource::Pipeline(pipeline) => device.destroy_pipeline(pipeline, None),
                        Resource::Framebuffer(framebuffer) => {
                            device.destroy_framebuffer(framebuffer, None)
                        }
                        Resource::CommandPool(pool) => device.destroy_command_pool(pool, None),
                        Resource::Semaphore(semaphore) => device.destroy_semaphore(semaphore, None),
                        Resource::Fence(fence) => device.destroy_fence(fence, None),
                        _ => {}
                    }
                }
            }
        }
    }
}

/// Whether a report with these flags should abort the offending call
fn halts_on(flags: vk::DebugReportFlagsEXT) -> bool {
    flags.contains(vk::DebugReportFlagsEXT::ERROR)
}

// Debug report callback for driver and validation layer messages
unsafe extern "system" fn debug_report_callback(
    flags: vk::DebugReportFlagsEXT,
    object_type: vk::DebugReportObjectTypeEXT,
    object: u64,
    _location: usize,
    message_code: i32,
    p_layer_prefix: *const c_char,
    p_message: *const c_char,
    _p_user_data: *mut c_void,
) -> vk::Bool32 {
    let prefix = if p_layer_prefix.is_null() {
        "".into()
    } else {
        CStr::from_ptr(p_layer_prefix).to_string_lossy()
    };
    let message = if p_message.is_null() {
        "".into()
    } else {
        CStr::from_ptr(p_message).to_string_lossy()
    };

    if flags.contains(vk::DebugReportFlagsEXT::ERROR) {
        log::error!("[{}] {:?} {:#x} ({}): {}", prefix, object_type, object, message_code, message);
    } else if flags.intersects(
        vk::DebugReportFlagsEXT::WARNING | vk::DebugReportFlagsEXT::PERFORMANCE_WARNING,
    ) {
        log::warn!("[{}] {:?} {:#x} ({}): {}", prefix, object_type, object, message_code, message);
    } else if flags.contains(vk::DebugReportFlagsEXT::INFORMATION) {
        log::info!("[{}] {}", prefix, message);
    } else {
        log::debug!("[{}] {}", prefix, message);
    }

    if halts_on(flags) {
        vk::TRUE
    } else {
        vk::FALSE
    }
}
