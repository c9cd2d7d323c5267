use cgmath::{Matrix4, Vector3};

use crate::{
    data_structures::{cube::CubeVertex, model::Vertex},
    pipelines::{depth_state, mk_render_pipeline},
};

/// How an unlit box takes part in depth testing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnlitDepth {
    /// Drawn first, never occludes: no depth writes, passes at equal depth.
    Background,
    /// Regular opaque geometry.
    Opaque,
}

impl UnlitDepth {
    fn state(self) -> wgpu::DepthStencilState {
        match self {
            UnlitDepth::Background => depth_state(
                false,
                wgpu::CompareFunction::LessEqual,
                wgpu::DepthBiasState::default(),
            ),
            UnlitDepth::Opaque => depth_state(
                true,
                wgpu::CompareFunction::Less,
                wgpu::DepthBiasState::default(),
            ),
        }
    }
}

/// Pipeline for the skybox and the light marker: no lighting, no skinning.
#[derive(Debug)]
pub struct UnlitProgram {
    pub pipeline: wgpu::RenderPipeline,
    pub layout: wgpu::BindGroupLayout,
}

impl UnlitProgram {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        depth: UnlitDepth,
        label: &str,
    ) -> Self {
        let layout = unlit_layout(device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{} Pipeline Layout", label)),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let shader = wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(include_str!("unlit.wgsl").into()),
        };
        let pipeline = mk_render_pipeline(
            device,
            &pipeline_layout,
            Some(color_format),
            &[CubeVertex::desc()],
            depth.state(),
            Some(wgpu::Face::Back),
            shader,
            label,
        );
        Self { pipeline, layout }
    }
}

/// Uniform, face texture array and its sampler.
pub fn unlit_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
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
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2Array,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
        label: Some("unlit_bind_group_layout"),
    })
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct UnlitUniform {
    mvp: [[f32; 4]; 4],
    textured: u32,
    _padding: [u32; 3],
}

impl UnlitUniform {
    /// `view_proj * translate(position) * scale(scale)`.
    pub fn new(
        view_proj: Matrix4<f32>,
        position: Vector3<f32>,
        scale: f32,
        textured: bool,
    ) -> Self {
        let model = Matrix4::from_translation(position) * Matrix4::from_scale(scale);
        Self {
            mvp: (view_proj * model).into(),
            textured: textured as u32,
            _padding: [0; 3],
        }
    }

    pub fn mvp(&self) -> Matrix4<f32> {
        self.mvp.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cgmath::{Point3, SquareMatrix, Transform};

    #[test]
    fn uniform_matches_wgsl_layout() {
        assert_eq!(std::mem::size_of::<UnlitUniform>(), 80);
    }

    #[test]
    fn corner_lands_at_scaled_offset() {
        let uniform = UnlitUniform::new(
            Matrix4::identity(),
            Vector3::new(0.0, 165.0, 0.0),
            2.0,
            false,
        );
        assert_relative_eq!(
            uniform.mvp().transform_point(Point3::new(1.0, -1.0, 1.0)),
            Point3::new(2.0, 163.0, 2.0)
        );
    }

    #[test]
    fn background_boxes_leave_depth_alone() {
        let background = UnlitDepth::Background.state();
        assert!(!background.depth_write_enabled);
        assert_eq!(background.depth_compare, wgpu::CompareFunction::LessEqual);
        assert!(UnlitDepth::Opaque.state().depth_write_enabled);
    }
}
