//! Unit box geometry shared by the skybox and the light marker.
//!
//! The box spans `-1..=1` on every axis and has four vertices per face, so
//! every face carries its own color, texture coordinates and face index.
//! Faces are ordered front, back, right, left, down, up, which is also the
//! layer order of the skybox texture array.

use cgmath::Vector3;

use crate::data_structures::model::Vertex;

pub const FACE_COUNT: usize = 6;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CubeVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
    pub tex_coords: [f32; 2],
    pub face: u32,
}

impl Vertex for CubeVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<CubeVertex>() as wgpu::BufferAddress,
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
                    format: wgpu::VertexFormat::Uint32,
                },
            ],
        }
    }
}

/// Which side of the faces is the front.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Winding {
    /// Counter-clockwise seen from outside, for boxes looked at.
    Outward,
    /// Counter-clockwise seen from inside, for boxes looked out of.
    Inward,
}

struct Face {
    normal: Vector3<f32>,
    // u x v == normal
    u: Vector3<f32>,
    v: Vector3<f32>,
    color: [f32; 3],
}

fn faces() -> [Face; FACE_COUNT] {
    let face = |normal: [f32; 3], u: [f32; 3], v: [f32; 3], color| Face {
        normal: normal.into(),
        u: u.into(),
        v: v.into(),
        color,
    };
    [
        // front: red
        face([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
        // back: yellow
        face([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]),
        // right: cyan
        face([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0], [0.0, 1.0, 1.0]),
        // left: green
        face([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0], [0.0, 1.0, 0.0]),
        // down: magenta
        face([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 1.0]),
        // up: blue
        face([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 0.0, 1.0]),
    ]
}

/// 24 vertices, four per face, corners counter-clockwise seen from outside.
///
/// Texture coordinates are mirrored so an image reads correctly from inside.
pub fn cube_vertices() -> Vec<CubeVertex> {
    const CORNERS: [(f32, f32); 4] = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
    const TEX_COORDS: [[f32; 2]; 4] = [[1.0, 1.0], [0.0, 1.0], [0.0, 0.0], [1.0, 0.0]];

    let faces = faces();
    faces
        .iter()
        .enumerate()
        .flat_map(|(index, face)| {
            CORNERS
                .iter()
                .zip(TEX_COORDS)
                .map(move |(&(su, sv), tex_coords)| CubeVertex {
                    position: (face.normal + face.u * su + face.v * sv).into(),
                    color: face.color,
                    tex_coords,
                    face: index as u32,
                })
        })
        .collect()
}

/// Two triangles per face for the given winding.
pub fn cube_indices(winding: Winding) -> Vec<u16> {
    let quad: [u16; 6] = match winding {
        Winding::Outward => [0, 1, 2, 0, 2, 3],
        Winding::Inward => [0, 2, 1, 0, 3, 2],
    };
    (0..FACE_COUNT as u16)
        .flat_map(|face| quad.iter().map(move |i| face * 4 + i))
        .collect()
}
