use crate::pipelines::{PassKind, ShaderProgram};

/// Color pass: skinning, instancing, one point light and shadow map lookup.
pub fn mk_skinned_program(
    device: &wgpu::Device,
    color_format: wgpu::TextureFormat,
    binding_slot: u32,
) -> ShaderProgram {
    ShaderProgram::new(
        device,
        PassKind::Color,
        binding_slot,
        Some(color_format),
        include_str!("skinned.wgsl"),
        "Skinned Shader",
    )
}
