//! Unlit boxes drawn around the scene objects: the star skybox and the
//! marker cube at the light position.

use cgmath::{Matrix4, SquareMatrix, Vector3, Zero};
use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        cube::{FACE_COUNT, Winding, cube_indices, cube_vertices},
        texture::Texture,
    },
    pipelines::unlit::{UnlitDepth, UnlitProgram, UnlitUniform},
};

/// What the box is used for; decides winding and depth behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoxKind {
    /// Seen from inside, drawn behind everything else.
    Skybox,
    /// Seen from outside, colored per face.
    Marker,
}

impl BoxKind {
    fn winding(self) -> Winding {
        match self {
            BoxKind::Skybox => Winding::Inward,
            BoxKind::Marker => Winding::Outward,
        }
    }

    fn depth(self) -> UnlitDepth {
        match self {
            BoxKind::Skybox => UnlitDepth::Background,
            BoxKind::Marker => UnlitDepth::Opaque,
        }
    }
}

#[derive(Debug)]
pub struct UnlitBox {
    name: String,
    scale: f32,
    textured: bool,
    program: UnlitProgram,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    // kept alive for the bind group
    _faces: Texture,
}

impl UnlitBox {
    /// Upload a box of half size `scale`. With `faces` (front, back, right,
    /// left, down, up) every face shows its image, otherwise its vertex color.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        color_format: wgpu::TextureFormat,
        kind: BoxKind,
        scale: f32,
        faces: Option<&[image::RgbaImage]>,
        name: &str,
    ) -> anyhow::Result<Self> {
        let program = UnlitProgram::new(device, color_format, kind.depth(), name);
        let textured = faces.is_some();
        let faces = match faces {
            Some(faces) => Texture::from_layers(device, queue, faces, &format!("{} Faces", name))?,
            None => {
                let white = image::RgbaImage::from_pixel(1, 1, image::Rgba([255; 4]));
                let layers = vec![white; FACE_COUNT];
                Texture::from_layers(device, queue, &layers, &format!("{} White", name))?
            }
        };
        let Some(sampler) = &faces.sampler else {
            anyhow::bail!("{}: face texture has no sampler", name);
        };

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Vertex Buffer", name)),
            contents: bytemuck::cast_slice(&cube_vertices()),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let indices = cube_indices(kind.winding());
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Index Buffer", name)),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let uniform = UnlitUniform::new(Matrix4::identity(), Vector3::zero(), scale, textured);
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Uniform Buffer", name)),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &program.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&faces.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
            label: Some(&format!("{} Bind Group", name)),
        });
        log::debug!("{}: uploaded, textured: {}", name, textured);

        Ok(Self {
            name: name.to_string(),
            scale,
            textured,
            program,
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
            uniform_buffer,
            bind_group,
            _faces: faces,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_textured(&self) -> bool {
        self.textured
    }

    /// Draw centered at `position` into the color pass.
    pub fn render(
        &self,
        queue: &wgpu::Queue,
        render_pass: &mut wgpu::RenderPass<'_>,
        view_proj: Matrix4<f32>,
        position: Vector3<f32>,
    ) {
        let uniform = UnlitUniform::new(view_proj, position, self.scale, self.textured);
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniform]));

        render_pass.set_pipeline(&self.program.pipeline);
        render_pass.set_bind_group(0, &self.bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
        render_pass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

impl Drop for UnlitBox {
    fn drop(&mut self) {
        self.vertex_buffer.destroy();
        self.index_buffer.destroy();
        self.uniform_buffer.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skybox_is_seen_from_inside_behind_everything() {
        assert_eq!(BoxKind::Skybox.winding(), Winding::Inward);
        assert_eq!(BoxKind::Skybox.depth(), UnlitDepth::Background);
        assert_eq!(BoxKind::Marker.winding(), Winding::Outward);
        assert_eq!(BoxKind::Marker.depth(), UnlitDepth::Opaque);
    }
}
