//! Render pass, graphics pipeline and shader loading for the triangle pass.

use std::fs::File;
use std::path::Path;

use crate::error::{GpuError, Result};
use ash::vk;

/// Precompiled SPIR-V for the two pipeline stages.
#[derive(Debug, Clone)]
pub struct ShaderSet {
    pub vertex: Vec<u32>,
    pub fragment: Vec<u32>,
}

impl ShaderSet {
    /// Read both stages from disk.
    pub fn load(vertex: &Path, fragment: &Path) -> Result<Self> {
        Ok(Self {
            vertex: load_spirv(vertex)?,
            fragment: load_spirv(fragment)?,
        })
    }
}

/// Read a SPIR-V blob as 32-bit words. The contents are not validated.
pub fn load_spirv(path: &Path) -> Result<Vec<u32>> {
    let shader_error = |source| GpuError::ShaderLoad {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(shader_error)?;
    ash::util::read_spv(&mut file).map_err(shader_error)
}

/// Single-subpass render pass that clears the swapchain image and leaves it
/// ready for presentation.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_render_pass(device: &ash::Device, format: vk::Format) -> Result<vk::RenderPass> {
    let color_attachment = vk::AttachmentDescription::default()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);

    let color_refs = [vk::AttachmentReference::default()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];

    let subpass = vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs);

    // The image only becomes available once the acquire semaphore, waited on at
    // this stage, is signaled.
    let dependency = vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE);

    let attachments = [color_attachment];
    let subpasses = [subpass];
    let dependencies = [dependency];
    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    device
        .create_render_pass(&create_info, None)
        .map_err(|e| GpuError::PipelineCreation(format!("Render pass: {e}")))
}

/// Graphics pipeline drawing a triangle whose vertices come from the vertex shader.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrianglePipeline {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
}

impl TrianglePipeline {
    /// Create the pipeline with a viewport and scissor fixed to `extent`.
    ///
    /// # Safety
    /// The device and render pass must be valid.
    pub unsafe fn new(
        device: &ash::Device,
        render_pass: vk::RenderPass,
        extent: vk::Extent2D,
        shaders: &ShaderSet,
    ) -> Result<Self> {
        let vert_info = vk::ShaderModuleCreateInfo::default().code(&shaders.vertex);
        let vert_module = device
            .create_shader_module(&vert_info, None)
            .map_err(|e| GpuError::PipelineCreation(format!("Vertex shader: {e}")))?;

        let frag_info = vk::ShaderModuleCreateInfo::default().code(&shaders.fragment);
        let frag_module = match device.create_shader_module(&frag_info, None) {
            Ok(module) => module,
            Err(e) => {
                device.destroy_shader_module(vert_module, None);
                return Err(GpuError::PipelineCreation(format!("Fragment shader: {e}")));
            }
        };

        let result = Self::build(device, render_pass, extent, vert_module, frag_module);

        // Modules are only needed during pipeline creation
        device.destroy_shader_module(vert_module, None);
        device.destroy_shader_module(frag_module, None);

        result
    }

    unsafe fn build(
        device: &ash::Device,
        render_pass: vk::RenderPass,
        extent: vk::Extent2D,
        vert_module: vk::ShaderModule,
        frag_module: vk::ShaderModule,
    ) -> Result<Self> {
        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vert_module)
                .name(c"main"),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(frag_module)
                .name(c"main"),
        ];

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default();
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        #[allow(clippy::cast_precision_loss)]
        let viewports = [vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }];
        let scissors = [vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        }];
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false)
            .line_width(1.0);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .sample_shading_enable(false)
            .min_sample_shading(1.0);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(true)
            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
            .alpha_blend_op(vk::BlendOp::ADD)
            .color_write_mask(vk::ColorComponentFlags::RGBA)];

        let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&color_blend_attachments);

        let layout = device
            .create_pipeline_layout(&vk::PipelineLayoutCreateInfo::default(), None)
            .map_err(|e| GpuError::PipelineCreation(e.to_string()))?;

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blending)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0);

        match device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None) {
            Ok(pipelines) => match pipelines.first() {
                Some(&pipeline) => Ok(Self { pipeline, layout }),
                None => {
                    device.destroy_pipeline_layout(layout, None);
                    Err(GpuError::PipelineCreation("no pipeline returned".into()))
                }
            },
            Err((_, e)) => {
                device.destroy_pipeline_layout(layout, None);
                Err(GpuError::PipelineCreation(e.to_string()))
            }
        }
    }

    /// Destroy the pipeline. Null handles are ignored by Vulkan.
    ///
    /// # Safety
    /// The device must be valid and the pipeline must not be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_pipeline(self.pipeline, None);
        device.destroy_pipeline_layout(self.layout, None);
    }
}
