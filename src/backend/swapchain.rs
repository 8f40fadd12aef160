// Swapchain - Window presentation
//
// Manages the chain of images we render to and present to the screen,
// plus one color view per image.

use anyhow::{Context, Result};
use ash::vk;

use super::api::{GraphicsApi, Resource, SwapchainDesc};
use super::device::DeviceContext;
use super::error::SetupError;
use super::resources::ResourceStack;
use super::selection;
use crate::config::SelectionPolicy;

#[derive(Debug, Clone)]
pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    /// Owned by the swapchain, never destroyed individually
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
}

/// Swapchain parameter preferences
#[derive(Debug, Clone, Copy)]
pub struct SwapchainOptions {
    pub selection: SelectionPolicy,
    pub present_mode: vk::PresentModeKHR,
}

impl Swapchain {
    /// Create the swapchain and its image views. Returns `None` when the
    /// surface currently has no area (minimized window).
    pub fn new<A: GraphicsApi>(
        api: &mut A,
        resources: &mut ResourceStack,
        context: &DeviceContext,
        options: SwapchainOptions,
        width: u32,
        height: u32,
    ) -> Result<Option<Self>> {
        // Query surface capabilities
        let caps = api.surface_capabilities(context.physical_device, context.surface)?;

        // Query supported formats
        let formats = api.surface_formats(context.physical_device, context.surface)?;

        // Query supported present modes
        let present_modes = api.surface_present_modes(context.physical_device, context.surface)?;

        let surface_format =
            selection::surface_format(options.selection, &formats).ok_or(SetupError::NoSurfaceFormat)?;
        let present_mode =
            selection::present_mode(options.selection, &present_modes, options.present_mode);
        let extent = selection::extent(options.selection, &caps, width, height);
        let image_count = selection::image_count(options.selection, &caps);

        if extent.width == 0 || extent.height == 0 {
            log::info!("Surface has zero extent, deferring swapchain creation");
            return Ok(None);
        }

        log::info!(
            "Creating swapchain: {}x{}, {} images, {:?} / {:?}",
            extent.width,
            extent.height,
            image_count,
            surface_format.format,
            present_mode
        );

        let desc = SwapchainDesc {
            surface: context.surface,
            image_count,
            format: surface_format,
            extent,
            present_mode,
            pre_transform: caps.current_transform,
        };
        let swapchain = api
            .create_swapchain(&desc)
            .context("Failed to create swapchain")?;
        resources.push(Resource::Swapchain(swapchain));

        // Get swapchain images
        let images = api.swapchain_images(swapchain)?;
        log::info!("Created swapchain with {} images", images.len());

        // Create image views
        let image_views = images
            .iter()
            .map(|&image| {
                let view = api
                    .create_image_view(image, surface_format.format)
                    .context("Failed to create image view")?;
                resources.push(Resource::ImageView(view));
                Ok(view)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Self {
            swapchain,
            images,
            image_views,
            format: surface_format.format,
            extent,
        }))
    }
}
