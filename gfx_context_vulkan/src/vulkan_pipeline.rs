//! Programs, depth/stencil state and graphics pipelines
//!
//! A `VulkanProgram` pairs a vertex and a fragment module. Its descriptor set
//! layout (set 0) comes from SPIR-V reflection: uniform blocks become uniform
//! buffers (dynamic when the caller says so) and sampled images become
//! combined image samplers. Pipelines bake vertex input, topology, blending
//! and depth/stencil state; viewport, scissor and stencil reference stay
//! dynamic.

use ash::vk;
use gfx_context::gfx::device::{GpuProgram, PipelineDesc};
use gfx_context::gfx::types::{DepthStencilKey, ProgramId, StencilFaceState};
use gfx_context::gfx::{Error, Result};
use gfx_context::{gfx_bail, gfx_err};
use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_device::VulkanDevice;
use crate::vulkan_format::{attribute_format_to_vk, compare_op_to_vk, stencil_op_to_vk, topology_to_vk};

const LOG_SOURCE: &str = "gfx::vulkan";

// ============================================================================
// Reflection
// ============================================================================

/// Descriptor kinds a program may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BindingKind {
    UniformBuffer,
    CombinedImageSampler,
}

/// One descriptor found in a shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReflectedBinding {
    pub set: u32,
    pub binding: u32,
    pub kind: BindingKind,
    pub stage: vk::ShaderStageFlags,
}

/// One binding of the program's descriptor set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramBinding {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub stages: vk::ShaderStageFlags,
}

impl ProgramBinding {
    pub fn is_dynamic(&self) -> bool {
        self.descriptor_type == vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC
    }
}

fn reflect_stage(code: &[u32], stage: vk::ShaderStageFlags) -> Result<Vec<ReflectedBinding>> {
    use spirq::ty::DescriptorType;

    let entry_points = spirq::ReflectConfig::new()
        .spv(code)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| gfx_err!(LOG_SOURCE, "SPIR-V reflection failed: {:?}", e))?;

    let mut bindings = Vec::new();
    for entry_point in &entry_points {
        for var in entry_point.vars.iter() {
            if let spirq::var::Variable::Descriptor { name, desc_bind, desc_ty, .. } = var {
                let kind = match desc_ty {
                    DescriptorType::UniformBuffer() => BindingKind::UniformBuffer,
                    DescriptorType::CombinedImageSampler() => BindingKind::CombinedImageSampler,
                    other => gfx_bail!(
                        LOG_SOURCE,
                        "Unsupported descriptor {:?} ({:?}) at binding {}",
                        name,
                        other,
                        desc_bind.bind()
                    ),
                };
                bindings.push(ReflectedBinding {
                    set: desc_bind.set(),
                    binding: desc_bind.bind(),
                    kind,
                    stage,
                });
            }
        }
    }
    Ok(bindings)
}

/// Merge per-stage reflection into one sorted set-0 layout
pub(crate) fn merge_bindings(reflected: &[ReflectedBinding], dynamic_uniforms: &[u32]) -> Result<Vec<ProgramBinding>> {
    let mut merged: FxHashMap<u32, (ProgramBinding, BindingKind)> = FxHashMap::default();

    for item in reflected {
        if item.set != 0 {
            return Err(Error::InvalidResource(format!(
                "Descriptor set {} (binding {}) is not supported, only set 0",
                item.set, item.binding
            )));
        }

        match merged.get_mut(&item.binding) {
            Some((existing, kind)) => {
                if *kind != item.kind {
                    return Err(Error::InvalidResource(format!(
                        "Binding {} declared as {:?} and {:?}",
                        item.binding, kind, item.kind
                    )));
                }
                existing.stages |= item.stage;
            }
            None => {
                let descriptor_type = match item.kind {
                    BindingKind::UniformBuffer if dynamic_uniforms.contains(&item.binding) => {
                        vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC
                    }
                    BindingKind::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
                    BindingKind::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                };
                merged.insert(
                    item.binding,
                    (ProgramBinding { binding: item.binding, descriptor_type, stages: item.stage }, item.kind),
                );
            }
        }
    }

    let mut bindings: Vec<ProgramBinding> = merged.into_values().map(|(binding, _)| binding).collect();
    bindings.sort_by_key(|b| b.binding);
    Ok(bindings)
}

// ============================================================================
// VulkanProgram
// ============================================================================

/// SPIR-V sources of a program
#[derive(Debug, Clone, Copy)]
pub struct ProgramDesc<'a> {
    pub vertex_spirv: &'a [u32],
    pub fragment_spirv: &'a [u32],
    /// Uniform buffer bindings bound with a per-draw dynamic offset
    pub dynamic_uniform_bindings: &'a [u32],
}

pub struct VulkanProgram {
    ctx: Arc<GpuContext>,
    id: ProgramId,
    vertex_module: vk::ShaderModule,
    fragment_module: vk::ShaderModule,
    set_layout: Option<vk::DescriptorSetLayout>,
    pipeline_layout: vk::PipelineLayout,
    bindings: Vec<ProgramBinding>,
    /// Binding number -> index in `bindings`
    binding_index: FxHashMap<u32, usize>,
}

impl VulkanProgram {
    pub(crate) fn new(ctx: Arc<GpuContext>, id: ProgramId, desc: &ProgramDesc<'_>) -> Result<Self> {
        let mut reflected = reflect_stage(desc.vertex_spirv, vk::ShaderStageFlags::VERTEX)?;
        reflected.extend(reflect_stage(desc.fragment_spirv, vk::ShaderStageFlags::FRAGMENT)?);
        let bindings = merge_bindings(&reflected, desc.dynamic_uniform_bindings)?;
        let binding_index = bindings.iter().enumerate().map(|(index, b)| (b.binding, index)).collect();

        // Each handle is owned by `program` as soon as it exists, so an early
        // return releases whatever was already created
        let mut program = Self {
            ctx,
            id,
            vertex_module: vk::ShaderModule::null(),
            fragment_module: vk::ShaderModule::null(),
            set_layout: None,
            pipeline_layout: vk::PipelineLayout::null(),
            bindings,
            binding_index,
        };

        program.vertex_module = create_shader_module(&program.ctx, desc.vertex_spirv, "vertex")?;
        program.fragment_module = create_shader_module(&program.ctx, desc.fragment_spirv, "fragment")?;

        unsafe {
            if !program.bindings.is_empty() {
                let layout_bindings: Vec<vk::DescriptorSetLayoutBinding> = program
                    .bindings
                    .iter()
                    .map(|b| {
                        vk::DescriptorSetLayoutBinding::default()
                            .binding(b.binding)
                            .descriptor_type(b.descriptor_type)
                            .descriptor_count(1)
                            .stage_flags(b.stages)
                    })
                    .collect();
                let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&layout_bindings);
                let set_layout = program
                    .ctx
                    .device
                    .create_descriptor_set_layout(&layout_info, None)
                    .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to create descriptor set layout: {:?}", e))?;
                program.set_layout = Some(set_layout);
            }

            let set_layouts: Vec<vk::DescriptorSetLayout> = program.set_layout.into_iter().collect();
            let pipeline_layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
            program.pipeline_layout = program
                .ctx
                .device
                .create_pipeline_layout(&pipeline_layout_info, None)
                .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to create pipeline layout: {:?}", e))?;
        }

        Ok(program)
    }

    pub fn bindings(&self) -> &[ProgramBinding] {
        &self.bindings
    }

    pub(crate) fn binding(&self, binding: u32) -> Option<&ProgramBinding> {
        self.binding_index.get(&binding).map(|&index| &self.bindings[index])
    }

    pub(crate) fn set_layout(&self) -> Option<vk::DescriptorSetLayout> {
        self.set_layout
    }

    pub(crate) fn pipeline_layout(&self) -> vk::PipelineLayout {
        self.pipeline_layout
    }
}

impl GpuProgram for VulkanProgram {
    fn id(&self) -> ProgramId {
        self.id
    }
}

impl Drop for VulkanProgram {
    fn drop(&mut self) {
        unsafe {
            let device = &self.ctx.device;
            device.destroy_pipeline_layout(self.pipeline_layout, None);
            if let Some(set_layout) = self.set_layout.take() {
                device.destroy_descriptor_set_layout(set_layout, None);
            }
            device.destroy_shader_module(self.fragment_module, None);
            device.destroy_shader_module(self.vertex_module, None);
        }
    }
}

fn create_shader_module(ctx: &GpuContext, code: &[u32], stage: &str) -> Result<vk::ShaderModule> {
    if code.is_empty() {
        return Err(Error::InvalidResource(format!("Empty {} shader", stage)));
    }
    let create_info = vk::ShaderModuleCreateInfo::default().code(code);
    unsafe {
        ctx.device
            .create_shader_module(&create_info, None)
            .map_err(|e| gfx_err!(LOG_SOURCE, "Failed to create {} shader module: {:?}", stage, e))
    }
}

// ============================================================================
// Depth / stencil
// ============================================================================

/// Depth/stencil state baked into pipelines
#[derive(Debug, Clone, Copy)]
pub struct VulkanDepthStencilState {
    depth_test: bool,
    compare_op: vk::CompareOp,
    stencil_test: bool,
    front: vk::StencilOpState,
    back: vk::StencilOpState,
}

fn stencil_face(state: &StencilFaceState) -> vk::StencilOpState {
    vk::StencilOpState {
        fail_op: stencil_op_to_vk(state.stencil_fail),
        pass_op: stencil_op_to_vk(state.pass),
        depth_fail_op: stencil_op_to_vk(state.depth_fail),
        compare_op: compare_op_to_vk(state.function),
        compare_mask: 0xFF,
        write_mask: 0xFF,
        // Dynamic state
        reference: 0,
    }
}

impl VulkanDepthStencilState {
    pub fn new(key: &DepthStencilKey) -> Self {
        Self {
            depth_test: key.depth_enabled,
            compare_op: compare_op_to_vk(key.depth_function),
            stencil_test: key.stencil_enabled,
            front: stencil_face(&key.front),
            back: stencil_face(&key.back),
        }
    }

    /// Depth writes follow the depth test
    pub fn create_info(&self) -> vk::PipelineDepthStencilStateCreateInfo<'static> {
        vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(self.depth_test)
            .depth_write_enable(self.depth_test)
            .depth_compare_op(self.compare_op)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(self.stencil_test)
            .front(self.front)
            .back(self.back)
    }
}

// ============================================================================
// VulkanPipeline
// ============================================================================

pub struct VulkanPipeline {
    ctx: Arc<GpuContext>,
    pipeline: vk::Pipeline,
}

impl VulkanPipeline {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &PipelineDesc<'_, VulkanDevice>) -> Result<Self> {
        let key = desc.key;
        let program = desc.program;

        let vertex_bindings: Vec<vk::VertexInputBindingDescription> = key
            .bindings
            .iter()
            .map(|b| vk::VertexInputBindingDescription {
                binding: b.binding,
                stride: b.stride,
                input_rate: vk::VertexInputRate::VERTEX,
            })
            .collect();
        let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = key
            .bindings
            .iter()
            .flat_map(|b| {
                b.attributes.iter().map(move |a| vk::VertexInputAttributeDescription {
                    location: a.location,
                    binding: b.binding,
                    format: attribute_format_to_vk(a.format),
                    offset: a.offset,
                })
            })
            .collect();

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology_to_vk(key.topology))
            .primitive_restart_enable(false);

        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .line_width(1.0);

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = desc.depth_stencil.create_info();

        let blend_attachment = color_blend_attachment(key.blending_enabled);
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
            .attachments(std::slice::from_ref(&blend_attachment));

        let dynamic_states = [
            vk::DynamicState::VIEWPORT,
            vk::DynamicState::SCISSOR,
            vk::DynamicState::STENCIL_REFERENCE,
        ];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(program.vertex_module)
                .name(c"main"),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(program.fragment_module)
                .name(c"main"),
        ];

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(program.pipeline_layout)
            .render_pass(desc.render_pass.handle())
            .subpass(0);

        let pipeline = unsafe {
            ctx.device
                .create_graphics_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&create_info), None)
                .map_err(|(_, e)| gfx_err!(LOG_SOURCE, "Failed to create graphics pipeline: {:?}", e))?
                .into_iter()
                .next()
                .ok_or_else(|| gfx_err!(LOG_SOURCE, "Pipeline creation returned no pipeline"))?
        };

        Ok(Self { ctx, pipeline })
    }

    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }
}

impl Drop for VulkanPipeline {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline(self.pipeline, None);
        }
    }
}

/// Straight alpha blending when enabled
pub(crate) fn color_blend_attachment(enabled: bool) -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState::default()
        .blend_enable(enabled)
        .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
        .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
        .color_blend_op(vk::BlendOp::ADD)
        .src_alpha_blend_factor(vk::BlendFactor::ONE)
        .dst_alpha_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
        .alpha_blend_op(vk::BlendOp::ADD)
        .color_write_mask(vk::ColorComponentFlags::RGBA)
}

#[cfg(test)]
#[path = "vulkan_pipeline_tests.rs"]
mod tests;
