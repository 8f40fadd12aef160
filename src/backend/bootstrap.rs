// Graphics device bootstrap
//
// Builds every resource needed to present a frame, in dependency order,
// runs the per-frame acquire / submit / present protocol, and tears it all
// down in exact reverse order.
//
// STAGES:
//  1-5   instance, debug callback, surface, physical + logical device
//  6-7   swapchain + image views            ┐
//  8-10  render pass, pipeline, framebuffers│ rebuilt when the swapchain
//  11    command pool + static buffers      │ goes out of date
//  12    frame sync slots                   ┘

use anyhow::{bail, Context, Result};
use ash::vk;

use super::api::{Acquire, FramePresent, FrameSubmit, GraphicsApi, PresentOutcome, SurfaceTarget};
use super::commands::{self, ClearColors};
use super::device::{DeviceContext, DeviceOptions};
use super::pipeline;
use super::resources::{ResourceStack, StackMark};
use super::shader::ShaderPaths;
use super::swapchain::{Swapchain, SwapchainOptions};
use super::sync::{FrameSlots, FrameSync};
use crate::config::{Config, DrawVariant};

/// Everything the bootstrap needs to know, resolved from the config
#[derive(Debug, Clone)]
pub struct BootstrapSettings {
    pub device: DeviceOptions,
    pub swapchain: SwapchainOptions,
    pub variant: DrawVariant,
    pub shaders: ShaderPaths,
    pub frames_in_flight: usize,
    pub clear_colors: ClearColors,
}

impl BootstrapSettings {
    pub fn from_config(config: &Config, shaders: ShaderPaths) -> Self {
        Self {
            device: DeviceOptions {
                app_name: config.window.title.clone(),
                // Validation only in debug builds
                validation: cfg!(debug_assertions) && config.debug.validation_layers,
                debug_report: config.debug.debug_report,
                selection: config.graphics.selection,
            },
            swapchain: SwapchainOptions {
                selection: config.graphics.selection,
                present_mode: config.get_present_mode(),
            },
            variant: config.graphics.variant,
            shaders,
            frames_in_flight: config.graphics.max_frames_in_flight.max(1),
            clear_colors: ClearColors {
                first_image: config.graphics.first_image_clear,
                other_images: config.graphics.clear_color,
            },
        }
    }
}

/// Per-frame view of one swapchain generation. Render pass, pipeline and
/// framebuffers are baked into the command buffers and owned by the stack.
#[derive(Debug)]
pub struct SwapchainResources {
    pub swapchain: Swapchain,
    /// One per swapchain image, in image order
    pub command_buffers: Vec<vk::CommandBuffer>,
}

impl SwapchainResources {
    pub fn image_count(&self) -> usize {
        self.swapchain.images.len()
    }
}

/// What `draw_frame` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Presented { image_index: u32 },
    /// Nothing submitted: swapchain stale or window has no area
    Skipped,
}

pub struct Bootstrap<A: GraphicsApi> {
    api: A,
    resources: ResourceStack,
    /// Everything above this mark belongs to the current swapchain generation
    swapchain_mark: StackMark,
    context: DeviceContext,
    chain: Option<SwapchainResources>,
    frames: FrameSlots,
    settings: BootstrapSettings,
    target: SurfaceTarget,
    needs_rebuild: bool,
    torn_down: bool,
}

impl<A: GraphicsApi> Bootstrap<A> {
    /// Run every initialization stage. On failure, whatever was already
    /// created is destroyed in reverse order before the error is returned.
    pub fn new(mut api: A, settings: BootstrapSettings, target: SurfaceTarget) -> Result<Self> {
        log::info!("Initializing Vulkan...");

        let mut resources = ResourceStack::default();
        let context = match DeviceContext::new(&mut api, &mut resources, &settings.device, &target)
        {
            Ok(context) => context,
            Err(e) => {
                log::error!("Device setup failed, releasing {} resource(s)", resources.len());
                resources.release_all(&mut api);
                return Err(e);
            }
        };

        let mut bootstrap = Self {
            api,
            swapchain_mark: resources.mark(),
            resources,
            context,
            chain: None,
            frames: FrameSlots::default(),
            settings,
            target,
            needs_rebuild: false,
            torn_down: false,
        };

        // On error `bootstrap` drops here and Drop releases the stack
        bootstrap.build_swapchain_resources()?;

        log::info!("Vulkan initialized successfully!");
        Ok(bootstrap)
    }

    /// Stages 6-12. Leaves `chain` empty when the surface has no area.
    fn build_swapchain_resources(&mut self) -> Result<()> {
        let Some(swapchain) = Swapchain::new(
            &mut self.api,
            &mut self.resources,
            &self.context,
            self.settings.swapchain,
            self.target.width,
            self.target.height,
        )?
        else {
            self.needs_rebuild = true;
            return Ok(());
        };

        let render_pass =
            pipeline::create_render_pass(&mut self.api, &mut self.resources, swapchain.format)?;

        let triangle = match self.settings.variant {
            DrawVariant::Triangle => Some(pipeline::create_triangle_pipeline(
                &mut self.api,
                &mut self.resources,
                render_pass,
                swapchain.extent,
                &self.settings.shaders,
            )?),
            DrawVariant::Clear => None,
        };

        let framebuffers = pipeline::create_framebuffers(
            &mut self.api,
            &mut self.resources,
            &swapchain.image_views,
            render_pass,
            swapchain.extent,
        )?;

        let command_buffers = commands::record_command_buffers(
            &mut self.api,
            &mut self.resources,
            self.context.queue_family,
            &framebuffers,
            render_pass,
            swapchain.extent,
            triangle,
            self.settings.clear_colors,
        )?;

        let frames = FrameSlots::new(
            &mut self.api,
            &mut self.resources,
            self.settings.frames_in_flight,
            swapchain.images.len(),
        )?;

        self.chain = Some(SwapchainResources {
            swapchain,
            command_buffers,
        });
        self.frames = frames;
        self.needs_rebuild = false;

        Ok(())
    }

    /// Tear down the current swapchain generation and build a new one
    fn rebuild_swapchain(&mut self) -> Result<()> {
        log::info!(
            "Rebuilding swapchain for {}x{}",
            self.target.width,
            self.target.height
        );

        // Wait for GPU to finish all work before destroying resources
        self.api
            .device_wait_idle()
            .context("Failed to wait for device idle before swapchain rebuild")?;

        self.chain = None;
        self.frames = FrameSlots::default();
        self.resources.release_to(&mut self.api, self.swapchain_mark);

        self.build_swapchain_resources()
    }

    /// The window changed size; the swapchain is rebuilt on the next frame
    pub fn resize(&mut self, width: u32, height: u32) {
        if (width, height) != (self.target.width, self.target.height) {
            log::debug!("Window resized to {}x{}", width, height);
            self.target.width = width;
            self.target.height = height;
            self.needs_rebuild = true;
        }
    }

    /// Acquire, submit and present one frame.
    ///
    /// FRAME TIMELINE:
    ///   wait slot fence ─> acquire ─> reset fence ─> submit ─> present ─> next slot
    pub fn draw_frame(&mut self) -> Result<FrameStatus> {
        if self.torn_down {
            bail!("Frame requested after teardown");
        }
        if self.needs_rebuild {
            self.rebuild_swapchain()?;
        }

        let Some(chain) = self.chain.as_ref() else {
            return Ok(FrameStatus::Skipped);
        };
        let sync: FrameSync = self
            .frames
            .current()
            .context("Frame sync slots not initialized")?;

        // Wait until the slot's previous submission has retired
        self.api
            .wait_for_fence(sync.in_flight_fence, u64::MAX)
            .context("Failed to wait for in-flight fence")?;

        let image_index = match self
            .api
            .acquire_next_image(chain.swapchain.swapchain, u64::MAX, sync.image_available)
            .context("Failed to acquire swapchain image")?
        {
            Acquire::Image { index, suboptimal } => {
                if suboptimal {
                    self.needs_rebuild = true;
                }
                index
            }
            Acquire::OutOfDate => {
                log::debug!("Swapchain out of date on acquire");
                self.needs_rebuild = true;
                return Ok(FrameStatus::Skipped);
            }
        };

        let command_buffer = *chain
            .command_buffers
            .get(image_index as usize)
            .with_context(|| format!("Acquired image {} has no command buffer", image_index))?;

        // Another slot may still be rendering into this image
        if let Some(fence) = self
            .frames
            .claim_image(image_index as usize, sync.in_flight_fence)
        {
            self.api
                .wait_for_fence(fence, u64::MAX)
                .context("Failed to wait for image fence")?;
        }

        self.api
            .reset_fence(sync.in_flight_fence)
            .context("Failed to reset in-flight fence")?;

        self.api
            .queue_submit(
                self.context.graphics_queue,
                &FrameSubmit {
                    command_buffer,
                    wait_semaphore: sync.image_available,
                    wait_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                    signal_semaphore: sync.render_finished,
                    fence: sync.in_flight_fence,
                },
            )
            .context("Failed to submit command buffer")?;

        let outcome = self
            .api
            .queue_present(
                self.context.present_queue,
                &FramePresent {
                    swapchain: chain.swapchain.swapchain,
                    image_index,
                    wait_semaphore: sync.render_finished,
                },
            )
            .context("Failed to present swapchain image")?;

        if outcome != PresentOutcome::Presented {
            log::debug!("Present reported {:?}", outcome);
            self.needs_rebuild = true;
        }

        self.frames.advance();

        Ok(FrameStatus::Presented { image_index })
    }

    pub fn swapchain_resources(&self) -> Option<&SwapchainResources> {
        self.chain.as_ref()
    }

    pub fn frame_slots(&self) -> &FrameSlots {
        &self.frames
    }

    #[cfg(test)]
    pub fn needs_rebuild(&self) -> bool {
        self.needs_rebuild
    }

    /// Wait for the device to go idle, then destroy everything newest-first.
    /// Safe to call more than once.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        log::info!("Cleaning up Vulkan resources...");

        if self.resources.contains_device() {
            if let Err(e) = self.api.device_wait_idle() {
                log::warn!("Device wait idle failed during teardown: {:#}", e);
            }
        }

        self.chain = None;
        self.frames = FrameSlots::default();
        self.resources.release_all(&mut self.api);

        log::info!("Cleanup complete");
    }
}

impl<A: GraphicsApi> Drop for Bootstrap<A> {
    fn drop(&mut self) {
        self.teardown();
    }
}
