use cgmath::{Matrix4, SquareMatrix};

use crate::{
    data_structures::{scene_graph::SceneGraph, skin::Skin},
    error::LoadError,
    resources::buffer_reader,
};

/// Reads and prepares every skin of the document.
///
/// A skin without an inverse bind matrix accessor uses identity matrices.
pub fn load_skins(
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    graph: &SceneGraph,
) -> Result<Vec<Skin>, LoadError> {
    document
        .skins()
        .map(|skin| {
            let joints: Vec<usize> = skin.joints().map(|joint| joint.index()).collect();
            let inverse_bind_matrices = skin
                .reader(buffer_reader(buffers))
                .read_inverse_bind_matrices()
                .map(|matrices| matrices.map(Matrix4::from).collect())
                .unwrap_or_else(|| vec![Matrix4::identity(); joints.len()]);
            let mut prepared = Skin::new(skin.index(), joints, inverse_bind_matrices, graph)?;
            prepared.name = skin.name().map(str::to_string);
            prepared.prepare(graph);
            Ok(prepared)
        })
        .collect()
}
