use gltf::{Semantic, mesh::Mode};

use crate::{
    data_structures::model::{Primitive, SkinnedVertex},
    resources::buffer_reader,
};

/**
 * Collects the triangle primitives of every mesh reachable from `roots`, depth first
 * (node, its primitives, then its children).
 *
 * Attributes other than POSITION, NORMAL, TEXCOORD_0, JOINTS_0 and WEIGHTS_0 are
 * ignored with a warning, missing ones fall back to the `SkinnedVertex` defaults.
 */
pub fn load_primitives(
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    roots: &[usize],
) -> Vec<Primitive> {
    let mut primitives = Vec::new();
    for node in roots.iter().filter_map(|&idx| document.nodes().nth(idx)) {
        visit(node, buffers, &mut primitives);
    }
    primitives
}

fn visit(node: gltf::Node<'_>, buffers: &[gltf::buffer::Data], out: &mut Vec<Primitive>) {
    if let Some(mesh) = node.mesh() {
        let has_skin = node.skin().is_some();
        for primitive in mesh.primitives() {
            if let Some(primitive) = load_primitive(&primitive, node.index(), has_skin, buffers) {
                out.push(primitive);
            }
        }
    }
    for child in node.children() {
        visit(child, buffers, out);
    }
}

fn load_primitive(
    primitive: &gltf::Primitive<'_>,
    node: usize,
    has_skin: bool,
    buffers: &[gltf::buffer::Data],
) -> Option<Primitive> {
    if primitive.mode() != Mode::Triangles {
        log::warn!(
            "Skipping primitive {} of node {}: {:?} is not supported, only triangle lists are",
            primitive.index(),
            node,
            primitive.mode()
        );
        return None;
    }
    for (semantic, _) in primitive.attributes() {
        match semantic {
            Semantic::Positions
            | Semantic::Normals
            | Semantic::TexCoords(0)
            | Semantic::Joints(0)
            | Semantic::Weights(0) => (),
            other => log::warn!("Ignoring vertex attribute {:?} of node {}", other, node),
        }
    }

    let reader = primitive.reader(buffer_reader(buffers));
    let Some(positions) = reader.read_positions() else {
        log::warn!("Primitive {} of node {} has no positions", primitive.index(), node);
        return None;
    };
    let mut vertices: Vec<SkinnedVertex> = positions
        .map(|position| SkinnedVertex {
            position,
            ..Default::default()
        })
        .collect();

    if let Some(normals) = reader.read_normals() {
        vertices
            .iter_mut()
            .zip(normals)
            .for_each(|(v, normal)| v.normal = normal);
    }
    if let Some(tex_coords) = reader.read_tex_coords(0) {
        vertices
            .iter_mut()
            .zip(tex_coords.into_f32())
            .for_each(|(v, uv)| v.tex_coords = uv);
    }
    let joints = reader.read_joints(0);
    let weights = reader.read_weights(0);
    let skinned = has_skin && joints.is_some() && weights.is_some();
    if let Some(joints) = joints {
        vertices
            .iter_mut()
            .zip(joints.into_u16())
            .for_each(|(v, joints)| v.joints = joints.map(u32::from));
    }
    if let Some(weights) = weights {
        vertices
            .iter_mut()
            .zip(weights.into_f32())
            .for_each(|(v, weights)| v.weights = weights);
    }

    let indices = reader
        .read_indices()
        .map(|indices| indices.into_u32().collect())
        .unwrap_or_else(|| (0..vertices.len() as u32).collect());

    Some(Primitive {
        vertices,
        indices,
        material: primitive.material().index(),
        node,
        skinned,
    })
}
