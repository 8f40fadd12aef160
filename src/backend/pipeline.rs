// Render pass, graphics pipeline and framebuffers
//
// The render pass clears the swapchain image and hands it over for
// presentation. The triangle pipeline has no vertex input; positions come
// from gl_VertexIndex in the vertex shader.

use anyhow::{Context, Result};
use ash::vk;

use super::api::{GraphicsApi, PipelineDesc, Resource};
use super::resources::ResourceStack;
use super::shader::{self, ShaderPaths};

pub fn create_render_pass<A: GraphicsApi>(
    api: &mut A,
    resources: &mut ResourceStack,
    format: vk::Format,
) -> Result<vk::RenderPass> {
    let render_pass = api
        .create_render_pass(format)
        .context("Failed to create render pass")?;
    resources.push(Resource::RenderPass(render_pass));
    Ok(render_pass)
}

/// Create the triangle pipeline. Its shader modules and layout live on the
/// resource stack beneath it, so only the pipeline handle is returned.
pub fn create_triangle_pipeline<A: GraphicsApi>(
    api: &mut A,
    resources: &mut ResourceStack,
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
    shaders: &ShaderPaths,
) -> Result<vk::Pipeline> {
    let vertex_code = shader::load_spirv(&shaders.vertex)?;
    let fragment_code = shader::load_spirv(&shaders.fragment)?;

    let vertex_shader = api
        .create_shader_module(&vertex_code)
        .context("Failed to create vertex shader module")?;
    resources.push(Resource::ShaderModule(vertex_shader));
    let fragment_shader = api
        .create_shader_module(&fragment_code)
        .context("Failed to create fragment shader module")?;
    resources.push(Resource::ShaderModule(fragment_shader));

    let layout = api
        .create_pipeline_layout()
        .context("Failed to create pipeline layout")?;
    resources.push(Resource::PipelineLayout(layout));

    let pipeline = api
        .create_graphics_pipeline(&PipelineDesc {
            render_pass,
            layout,
            extent,
            vertex_shader,
            fragment_shader,
        })
        .context("Failed to create graphics pipeline")?;
    resources.push(Resource::Pipeline(pipeline));

    log::info!("Created triangle pipeline for {}x{}", extent.width, extent.height);

    Ok(pipeline)
}

/// Create framebuffers for each swapchain image view
pub fn create_framebuffers<A: GraphicsApi>(
    api: &mut A,
    resources: &mut ResourceStack,
    image_views: &[vk::ImageView],
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
) -> Result<Vec<vk::Framebuffer>> {
    image_views
        .iter()
        .map(|&view| {
            let framebuffer = api
                .create_framebuffer(render_pass, view, extent)
                .context("Failed to create framebuffer")?;
            resources.push(Resource::Framebuffer(framebuffer));
            Ok(framebuffer)
        })
        .collect()
}
