// Command pool and pre-recorded command buffers
//
// Content is static, so each buffer is recorded once against its own
// framebuffer and resubmitted every frame.

use anyhow::{Context, Result};
use ash::vk;

use super::api::{CommandRecording, GraphicsApi, Resource};
use super::resources::ResourceStack;

/// Vertices of the in-shader triangle
pub const TRIANGLE_VERTEX_COUNT: u32 = 3;

/// Clear colors: one for image 0, one for all the others, so a stuck
/// swapchain index is visible on screen
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearColors {
    pub first_image: [f32; 4],
    pub other_images: [f32; 4],
}

impl ClearColors {
    pub fn for_image(&self, index: usize) -> [f32; 4] {
        if index == 0 {
            self.first_image
        } else {
            self.other_images
        }
    }
}

/// Create the command pool and record one buffer per framebuffer. The
/// buffers are returned in image order and are freed with the pool.
#[allow(clippy::too_many_arguments)]
pub fn record_command_buffers<A: GraphicsApi>(
    api: &mut A,
    resources: &mut ResourceStack,
    queue_family: u32,
    framebuffers: &[vk::Framebuffer],
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
    pipeline: Option<vk::Pipeline>,
    colors: ClearColors,
) -> Result<Vec<vk::CommandBuffer>> {
    let pool = api
        .create_command_pool(queue_family)
        .context("Failed to create command pool")?;
    resources.push(Resource::CommandPool(pool));

    let buffers = api
        .allocate_command_buffers(pool, framebuffers.len() as u32)
        .context("Failed to allocate command buffers")?;

    for (index, (&buffer, &framebuffer)) in buffers.iter().zip(framebuffers).enumerate() {
        let recording = CommandRecording {
            render_pass,
            framebuffer,
            extent,
            clear_color: colors.for_image(index),
            pipeline,
            vertex_count: TRIANGLE_VERTEX_COUNT,
        };
        api.record_command_buffer(buffer, &recording)
            .with_context(|| format!("Failed to record command buffer {}", index))?;
    }

    log::info!("Created {} pre-recorded command buffers", buffers.len());

    Ok(buffers)
}
