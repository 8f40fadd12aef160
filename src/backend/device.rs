// Vulkan Device - Core GPU interface
//
// Responsibilities:
// - Instance creation with surface extensions, debug report, validation
// - Debug report callback registration
// - Window surface creation
// - Physical device selection
// - Logical device + queue creation

use anyhow::{Context, Result};
use ash::vk;

use super::api::{DeviceDesc, GraphicsApi, InstanceDesc, Resource, SurfaceTarget};
use super::error::SetupError;
use super::resources::ResourceStack;
use super::selection;
use crate::config::SelectionPolicy;

pub const SURFACE_EXTENSION: &str = "VK_KHR_surface";
pub const DEBUG_REPORT_EXTENSION: &str = "VK_EXT_debug_report";
pub const SWAPCHAIN_EXTENSION: &str = "VK_KHR_swapchain";

/// Validation layers in order of preference (the LunarG one predates Khronos)
const VALIDATION_LAYERS: [&str; 2] = [
    "VK_LAYER_KHRONOS_validation",
    "VK_LAYER_LUNARG_standard_validation",
];

#[derive(Debug, Clone)]
pub struct DeviceOptions {
    pub app_name: String,
    pub validation: bool,
    pub debug_report: bool,
    pub selection: SelectionPolicy,
}

/// What later stages need from the instance and device stages. The
/// handles themselves are owned by the resource stack.
#[derive(Debug, Clone, Copy)]
pub struct DeviceContext {
    pub surface: vk::SurfaceKHR,
    pub physical_device: vk::PhysicalDevice,
    pub queue_family: u32,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
}

struct InstanceSetup {
    debug_report: bool,
    layers: Vec<String>,
}

impl DeviceContext {
    /// Run the instance and device stages in order. Every handle is pushed
    /// onto `resources` as soon as it exists; on error the caller releases.
    pub fn new<A: GraphicsApi>(
        api: &mut A,
        resources: &mut ResourceStack,
        options: &DeviceOptions,
        target: &SurfaceTarget,
    ) -> Result<Self> {
        log::info!("Creating Vulkan device: {}", options.app_name);

        // Step 1: Create instance
        let setup = create_instance(api, resources, options, target)?;

        // Step 2: Register debug report callback if the extension is on
        if setup.debug_report {
            let callback = api
                .create_debug_callback()
                .context("Failed to register debug report callback")?;
            resources.push(Resource::DebugCallback(callback));
        }

        // Step 3: Bind a surface to the native window
        let surface = api
            .create_surface(target)
            .context("Failed to create window surface")?;
        resources.push(Resource::Surface(surface));

        // Step 4: Pick physical device (GPU)
        let physical_device = pick_physical_device(api, options.selection)?;

        // Step 5: Create logical device
        let queue_family = create_logical_device(
            api,
            resources,
            physical_device,
            surface,
            options.selection,
            &setup.layers,
        )?;

        let graphics_queue = api.device_queue(queue_family, 0)?;
        // A single family does both, so presentation shares the queue
        let present_queue = api.device_queue(queue_family, 0)?;

        Ok(Self {
            surface,
            physical_device,
            queue_family,
            graphics_queue,
            present_queue,
        })
    }
}

fn create_instance<A: GraphicsApi>(
    api: &mut A,
    resources: &mut ResourceStack,
    options: &DeviceOptions,
    target: &SurfaceTarget,
) -> Result<InstanceSetup> {
    let available_extensions = api.instance_extensions()?;
    let available_layers = api.instance_layers()?;
    log::debug!("Instance extensions: {:?}", available_extensions);
    log::debug!("Instance layers: {:?}", available_layers);

    let platform_extension = target.surface_extension().ok_or_else(|| {
        SetupError::UnsupportedWindowSystem(format!("{:?}", target.display))
    })?;

    // Required extensions
    let mut extensions = Vec::new();
    for required in [SURFACE_EXTENSION, platform_extension] {
        if !available_extensions.iter().any(|ext| ext == required) {
            return Err(SetupError::MissingInstanceExtension(required.to_string()).into());
        }
        extensions.push(required.to_string());
    }

    let debug_report = options.debug_report
        && available_extensions
            .iter()
            .any(|ext| ext == DEBUG_REPORT_EXTENSION);
    if debug_report {
        extensions.push(DEBUG_REPORT_EXTENSION.to_string());
    } else if options.debug_report {
        log::warn!("{} not available, driver messages will not be logged", DEBUG_REPORT_EXTENSION);
    }

    // Validation layers
    let mut layers = Vec::new();
    if options.validation {
        match VALIDATION_LAYERS
            .iter()
            .find(|name| available_layers.iter().any(|layer| layer == *name))
        {
            Some(name) => {
                log::info!("Enabling validation layer {}", name);
                layers.push(name.to_string());
            }
            None => log::warn!("Validation requested but no validation layer is installed"),
        }
    }

    let desc = InstanceDesc {
        app_name: options.app_name.clone(),
        extensions,
        layers: layers.clone(),
    };
    let instance = api
        .create_instance(&desc)
        .context("Failed to create Vulkan instance")?;
    resources.push(Resource::Instance(instance));
    log::info!("Created instance with extensions {:?}", desc.extensions);

    Ok(InstanceSetup {
        debug_report,
        layers,
    })
}

fn pick_physical_device<A: GraphicsApi>(
    api: &A,
    policy: SelectionPolicy,
) -> Result<vk::PhysicalDevice> {
    let devices = api.enumerate_physical_devices()?;

    if devices.is_empty() {
        return Err(SetupError::NoPhysicalDevice.into());
    }

    let infos: Vec<_> = devices
        .iter()
        .map(|&device| api.physical_device_info(device))
        .collect::<Result<_>>()?;

    for (index, info) in infos.iter().enumerate() {
        log::info!(
            "GPU {}: {} ({:?}), API {}.{}.{}",
            index,
            info.name,
            info.device_type,
            vk::api_version_major(info.api_version),
            vk::api_version_minor(info.api_version),
            vk::api_version_patch(info.api_version)
        );
        for (heap, (size, flags)) in info.memory_heaps.iter().enumerate() {
            log::debug!("  heap {}: {} MiB {:?}", heap, size >> 20, flags);
        }
    }

    let index = selection::physical_device(policy, &infos).ok_or(SetupError::NoPhysicalDevice)?;
    log::info!("Selected GPU: {}", infos[index].name);

    Ok(devices[index])
}

fn create_logical_device<A: GraphicsApi>(
    api: &mut A,
    resources: &mut ResourceStack,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    policy: SelectionPolicy,
    layers: &[String],
) -> Result<u32> {
    let families = api.queue_families(physical_device)?;
    for (index, family) in families.iter().enumerate() {
        log::debug!(
            "Queue family {}: {} queue(s) {:?}",
            index,
            family.queue_count,
            family.queue_flags
        );
    }

    let queue_family = selection::queue_family(policy, &families, |index| {
        api.surface_support(physical_device, index, surface)
    })?
    .ok_or(SetupError::NoQueueFamily)?;

    // Required device extensions
    let extensions = api.device_extensions(physical_device)?;
    if !extensions.iter().any(|ext| ext == SWAPCHAIN_EXTENSION) {
        return Err(SetupError::MissingDeviceExtension(SWAPCHAIN_EXTENSION.to_string()).into());
    }

    let desc = DeviceDesc {
        queue_family,
        extensions: vec![SWAPCHAIN_EXTENSION.to_string()],
        layers: layers.to_vec(),
    };
    let device = api
        .create_device(physical_device, &desc)
        .context("Failed to create logical device")?;
    resources.push(Resource::Device(device));
    log::info!("Created logical device on queue family {}", queue_family);

    Ok(queue_family)
}
