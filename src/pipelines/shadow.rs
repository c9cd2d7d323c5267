use crate::pipelines::{PassKind, ShaderProgram};

/// Depth-only pass from the light's point of view, rendered into the shadow map.
pub fn mk_shadow_program(device: &wgpu::Device, binding_slot: u32) -> ShaderProgram {
    ShaderProgram::new(
        device,
        PassKind::Depth,
        binding_slot,
        None,
        include_str!("shadow.wgsl"),
        "Shadow Shader",
    )
}
