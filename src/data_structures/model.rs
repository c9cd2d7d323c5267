//! Loaded asset data and the GPU-side meshes built from it.
//!
//! [`Asset`] is the CPU copy of a glTF file: the node graph, mesh primitives,
//! materials, skins and animation clips. [`Mesh`] is one primitive uploaded to
//! the device together with its material bind group.

use std::ops::Range;

use cgmath::{Matrix4, SquareMatrix};
use wgpu::util::DeviceExt;

use crate::data_structures::{animation::Animation, scene_graph::SceneGraph, skin::Skin};

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

/// Per-vertex data of a skinned mesh. Unskinned meshes carry zero weights.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SkinnedVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
    pub joints: [u32; 4],
    pub weights: [f32; 4],
}

impl Default for SkinnedVertex {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            normal: [0.0, 1.0, 0.0],
            tex_coords: [0.0; 2],
            joints: [0; 4],
            weights: [0.0; 4],
        }
    }
}

impl Vertex for SkinnedVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<SkinnedVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Uint32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 4,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

/// PBR factors of a material. Textures are supplied separately.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialInfo {
    pub name: Option<String>,
    pub base_color_factor: [f32; 4],
    pub metallic_factor: f32,
    pub roughness_factor: f32,
}

impl Default for MaterialInfo {
    /// glTF default material.
    fn default() -> Self {
        Self {
            name: None,
            base_color_factor: [1.0; 4],
            metallic_factor: 1.0,
            roughness_factor: 1.0,
        }
    }
}

impl From<gltf::Material<'_>> for MaterialInfo {
    fn from(material: gltf::Material<'_>) -> Self {
        let pbr = material.pbr_metallic_roughness();
        Self {
            name: material.name().map(str::to_string),
            base_color_factor: pbr.base_color_factor(),
            metallic_factor: pbr.metallic_factor(),
            roughness_factor: pbr.roughness_factor(),
        }
    }
}

/// One triangle list of a glTF mesh.
#[derive(Clone, Debug, Default)]
pub struct Primitive {
    pub vertices: Vec<SkinnedVertex>,
    pub indices: Vec<u32>,
    pub material: Option<usize>,
    /// Node that instantiates the mesh.
    pub node: usize,
    pub skinned: bool,
}

#[derive(Clone, Debug, Default)]
pub struct Asset {
    pub name: String,
    pub graph: SceneGraph,
    pub scene_roots: Vec<usize>,
    pub primitives: Vec<Primitive>,
    pub materials: Vec<MaterialInfo>,
    pub skins: Vec<Skin>,
    pub animations: Vec<Animation>,
}

impl Asset {
    /// Material of a primitive, or the default material.
    pub fn material_of(&self, primitive: &Primitive) -> MaterialInfo {
        primitive
            .material
            .and_then(|idx| self.materials.get(idx))
            .cloned()
            .unwrap_or_default()
    }

    /// Transform the shader applies on top of skinning: the owning node's
    /// rest pose for rigid meshes, the identity for skinned ones.
    pub fn primitive_transforms(&self) -> Vec<Matrix4<f32>> {
        let rest = self.graph.rest_pose();
        self.primitives
            .iter()
            .map(|primitive| {
                if primitive.skinned {
                    Matrix4::identity()
                } else {
                    rest.get(primitive.node)
                        .copied()
                        .unwrap_or_else(Matrix4::identity)
                }
            })
            .collect()
    }

    pub fn is_animated(&self) -> bool {
        !self.animations.is_empty()
    }
}

/// Per-primitive uniform: node transform and material factors.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PrimitiveUniform {
    node_transform: [[f32; 4]; 4],
    base_color: [f32; 4],
    metallic: f32,
    roughness: f32,
    skinned: u32,
    _padding: u32,
}

impl PrimitiveUniform {
    pub fn new(node_transform: Matrix4<f32>, material: &MaterialInfo, skinned: bool) -> Self {
        Self {
            node_transform: node_transform.into(),
            base_color: material.base_color_factor,
            metallic: material.metallic_factor,
            roughness: material.roughness_factor,
            skinned: skinned as u32,
            _padding: 0,
        }
    }
}

/// A primitive resident on the device.
#[derive(Debug)]
pub struct Mesh {
    pub name: String,
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
    pub material_buffer: wgpu::Buffer,
    pub material_bind_group: wgpu::BindGroup,
}

impl Mesh {
    pub fn new(
        device: &wgpu::Device,
        name: &str,
        primitive: &Primitive,
        uniform: PrimitiveUniform,
        material_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Vertex Buffer", name)),
            contents: bytemuck::cast_slice(&primitive.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Index Buffer", name)),
            contents: bytemuck::cast_slice(&primitive.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let material_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Material Buffer", name)),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let material_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: material_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: material_buffer.as_entire_binding(),
            }],
            label: Some(&format!("{:?} Material Bind Group", name)),
        });
        Self {
            name: name.to_string(),
            vertex_buffer,
            index_buffer,
            num_elements: primitive.indices.len() as u32,
            material_buffer,
            material_bind_group,
        }
    }
}

pub trait DrawMesh {
    /// Draw `instances` copies of `mesh`, binding its material at `material_slot`.
    /// The instance buffer must already be bound at vertex slot 1.
    fn draw_mesh_instanced(&mut self, mesh: &Mesh, material_slot: u32, instances: Range<u32>);
}

impl DrawMesh for wgpu::RenderPass<'_> {
    fn draw_mesh_instanced(&mut self, mesh: &Mesh, material_slot: u32, instances: Range<u32>) {
        self.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        self.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.set_bind_group(material_slot, &mesh.material_bind_group, &[]);
        self.draw_indexed(0..mesh.num_elements, 0, instances);
    }
}
