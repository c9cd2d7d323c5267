//! Render pipelines for renderable objects.
//!
//! A [`ShaderProgram`] is a compiled pipeline together with the bind group
//! layouts an object needs to draw with it. Every program is built for one
//! binding slot, the bind group index of the object group:
//!
//! - `slot`: object uniforms and the joint matrix storage buffer
//! - `slot + 1`: diffuse texture and shadow map (color pass only)
//! - `slot + 2`: per-primitive material uniform
//!
//! Group indices below `slot` (and `slot + 1` in the depth pass) hold empty groups.
//!
//! The [`unlit`] program is separate: one group, used by the skybox and the
//! light marker.

use crate::{
    context::FrameContext,
    data_structures::{
        instance::InstanceRaw,
        model::{SkinnedVertex, Vertex},
        texture::Texture,
    },
    resources::texture::diffuse_shadow_layout,
};

pub mod shadow;
pub mod skinned;
pub mod unlit;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassKind {
    Color,
    Depth,
}

#[derive(Debug)]
pub struct ShaderProgram {
    pub kind: PassKind,
    pub binding_slot: u32,
    pub pipeline: wgpu::RenderPipeline,
    pub object_layout: wgpu::BindGroupLayout,
    pub material_layout: wgpu::BindGroupLayout,
    /// Present for color programs only.
    pub texture_layout: Option<wgpu::BindGroupLayout>,
    empty_group: wgpu::BindGroup,
}

impl ShaderProgram {
    pub(crate) fn new(
        device: &wgpu::Device,
        kind: PassKind,
        binding_slot: u32,
        color_format: Option<wgpu::TextureFormat>,
        shader_source: &str,
        label: &str,
    ) -> Self {
        let object_layout = object_layout(device);
        let material_layout = material_layout(device);
        let texture_layout = match kind {
            PassKind::Color => Some(diffuse_shadow_layout(device)),
            PassKind::Depth => None,
        };
        let empty_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[],
            label: Some("empty_bind_group_layout"),
        });
        let empty_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &empty_layout,
            entries: &[],
            label: Some("empty_bind_group"),
        });

        let bind_group_layouts: Vec<&wgpu::BindGroupLayout> = (0..=binding_slot + 2)
            .map(|group| match group_role(binding_slot, kind, group) {
                GroupRole::Object => &object_layout,
                GroupRole::Texture => texture_layout.as_ref().unwrap_or(&empty_layout),
                GroupRole::Material => &material_layout,
                GroupRole::Empty => &empty_layout,
            })
            .collect();
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{} Pipeline Layout", label)),
            bind_group_layouts: &bind_group_layouts,
            push_constant_ranges: &[],
        });

        let source = resolve_groups(shader_source, binding_slot);
        let shader = wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        };
        let depth_bias = match kind {
            PassKind::Color => wgpu::DepthBiasState::default(),
            PassKind::Depth => wgpu::DepthBiasState {
                constant: 2,
                slope_scale: 2.0,
                clamp: 0.0,
            },
        };
        let pipeline = mk_render_pipeline(
            device,
            &layout,
            color_format,
            &[SkinnedVertex::desc(), InstanceRaw::desc()],
            depth_state(true, wgpu::CompareFunction::Less, depth_bias),
            Some(wgpu::Face::Back),
            shader,
            label,
        );

        Self {
            kind,
            binding_slot,
            pipeline,
            object_layout,
            material_layout,
            texture_layout,
            empty_group,
        }
    }

    pub fn texture_slot(&self) -> u32 {
        self.binding_slot + 1
    }

    pub fn material_slot(&self) -> u32 {
        self.binding_slot + 2
    }

    /// Set the pipeline and fill every padding group.
    pub fn bind(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        render_pass.set_pipeline(&self.pipeline);
        for group in 0..=self.binding_slot + 2 {
            if group_role(self.binding_slot, self.kind, group) == GroupRole::Empty {
                render_pass.set_bind_group(group, &self.empty_group, &[]);
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GroupRole {
    Object,
    Texture,
    Material,
    Empty,
}

fn group_role(binding_slot: u32, kind: PassKind, group: u32) -> GroupRole {
    match group {
        g if g == binding_slot => GroupRole::Object,
        g if g == binding_slot + 1 && kind == PassKind::Color => GroupRole::Texture,
        g if g == binding_slot + 2 => GroupRole::Material,
        _ => GroupRole::Empty,
    }
}

/// Substitute the group placeholders of a WGSL source for a binding slot.
pub fn resolve_groups(source: &str, binding_slot: u32) -> String {
    source
        .replace("OBJECT_GROUP", &binding_slot.to_string())
        .replace("TEXTURE_GROUP", &(binding_slot + 1).to_string())
        .replace("MATERIAL_GROUP", &(binding_slot + 2).to_string())
}

/// Object uniforms plus the joint matrices of the object's skin.
pub fn object_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
        label: Some("object_bind_group_layout"),
    })
}

pub fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("material_bind_group_layout"),
    })
}

/// Per-object uniform. The depth pass fills `view_proj` with the light's matrix
/// and leaves the lighting fields zeroed.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectUniform {
    view_proj: [[f32; 4]; 4],
    light_view_proj: [[f32; 4]; 4],
    light_position: [f32; 3],
    light_intensity: f32,
    shadows: u32,
    textured: u32,
    _padding: [u32; 2],
}

impl ObjectUniform {
    pub fn color(frame: &FrameContext, shadows: bool, textured: bool) -> Self {
        Self {
            view_proj: frame.view_proj.into(),
            light_view_proj: frame.light_view_proj.into(),
            light_position: frame.light_position.into(),
            light_intensity: frame.light_intensity,
            shadows: shadows as u32,
            textured: textured as u32,
            _padding: [0; 2],
        }
    }

    pub fn depth(light_view_proj: cgmath::Matrix4<f32>) -> Self {
        Self {
            view_proj: light_view_proj.into(),
            light_view_proj: light_view_proj.into(),
            light_position: [0.0; 3],
            light_intensity: 0.0,
            shadows: 0,
            textured: 0,
            _padding: [0; 2],
        }
    }
}

/// Depth test against the shared depth buffer format.
pub fn depth_state(
    write: bool,
    compare: wgpu::CompareFunction,
    bias: wgpu::DepthBiasState,
) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: Texture::DEPTH_FORMAT,
        depth_write_enabled: write,
        depth_compare: compare,
        stencil: wgpu::StencilState::default(),
        bias,
    }
}

#[allow(clippy::too_many_arguments)]
pub fn mk_render_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    color_format: Option<wgpu::TextureFormat>,
    vertex_layouts: &[wgpu::VertexBufferLayout],
    depth_stencil: wgpu::DepthStencilState,
    cull_mode: Option<wgpu::Face>,
    shader: wgpu::ShaderModuleDescriptor,
    label: &str,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(shader);
    let color_targets = [color_format.map(|format| wgpu::ColorTargetState {
        format,
        blend: Some(wgpu::BlendState {
            alpha: wgpu::BlendComponent::REPLACE,
            color: wgpu::BlendComponent::REPLACE,
        }),
        write_mask: wgpu::ColorWrites::ALL,
    })];

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: vertex_layouts,
            compilation_options: Default::default(),
        },
        // depth-only programs have no fragment stage
        fragment: color_format.map(|_| wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &color_targets,
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(depth_stencil),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_follow_binding_slot() {
        let source = "@group(OBJECT_GROUP) @group(TEXTURE_GROUP) @group(MATERIAL_GROUP)";
        assert_eq!(resolve_groups(source, 3), "@group(3) @group(4) @group(5)");
    }

    #[test]
    fn depth_pass_pads_texture_group() {
        assert_eq!(group_role(1, PassKind::Color, 0), GroupRole::Empty);
        assert_eq!(group_role(1, PassKind::Color, 1), GroupRole::Object);
        assert_eq!(group_role(1, PassKind::Color, 2), GroupRole::Texture);
        assert_eq!(group_role(1, PassKind::Depth, 2), GroupRole::Empty);
        assert_eq!(group_role(1, PassKind::Depth, 3), GroupRole::Material);
    }

    #[test]
    fn object_uniform_matches_wgsl_layout() {
        assert_eq!(std::mem::size_of::<ObjectUniform>(), 160);
        assert_eq!(
            std::mem::size_of::<crate::data_structures::model::PrimitiveUniform>(),
            96
        );
    }
}
