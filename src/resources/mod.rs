//! glTF loading: scene graph, primitives, materials, skins and clips.

use std::path::Path;

use crate::{
    data_structures::{model::Asset, scene_graph::{Node, SceneGraph}},
    error::LoadError,
};

pub mod animation;
pub mod mesh;
pub mod skin;
pub mod texture;

pub async fn load_binary(path: &Path) -> Result<Vec<u8>, LoadError> {
    std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a `.gltf` (external or embedded buffers) or `.glb` file into an [`Asset`].
///
/// External buffers are resolved relative to the file's directory.
pub async fn load_asset(path: impl AsRef<Path>) -> Result<Asset, LoadError> {
    let path = path.as_ref();
    let bytes = load_binary(path).await?;
    let gltf::Gltf { document, blob } = gltf::Gltf::from_slice(&bytes)?;
    let buffers = gltf::import_buffers(&document, path.parent(), blob)?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let asset = parse_document(&name, &document, &buffers)?;
    log::info!(
        "Loaded {}: {} nodes, {} primitives, {} skins, {} animations",
        path.display(),
        asset.graph.len(),
        asset.primitives.len(),
        asset.skins.len(),
        asset.animations.len()
    );
    Ok(asset)
}

/// Build an [`Asset`] from an already parsed document and its buffer contents.
pub fn parse_document(
    name: &str,
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
) -> Result<Asset, LoadError> {
    if buffers.len() < document.buffers().count() {
        return Err(LoadError::MissingBufferData(buffers.len()));
    }
    let graph = load_graph(document)?;
    let scene_roots = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .map(|scene| scene.nodes().map(|node| node.index()).collect())
        .unwrap_or_else(|| graph.roots());
    let skins = skin::load_skins(document, buffers, &graph)?;
    let primitives = mesh::load_primitives(document, buffers, &scene_roots);
    let materials = document.materials().map(Into::into).collect();
    let animations = animation::load_animations(document, buffers);

    Ok(Asset {
        name: name.to_string(),
        graph,
        scene_roots,
        primitives,
        materials,
        skins,
        animations,
    })
}

fn load_graph(document: &gltf::Document) -> Result<SceneGraph, LoadError> {
    let nodes = document
        .nodes()
        .map(|node| Node {
            name: node.name().map(str::to_string),
            transform: node.transform().into(),
            children: node.children().map(|child| child.index()).collect(),
            mesh: node.mesh().map(|mesh| mesh.index()),
        })
        .collect();
    SceneGraph::new(nodes)
}

/// Reader callback shared by all accessor readers.
pub(crate) fn buffer_reader<'s>(
    buffers: &'s [gltf::buffer::Data],
) -> impl Clone + Fn(gltf::Buffer<'_>) -> Option<&'s [u8]> {
    move |buffer: gltf::Buffer<'_>| buffers.get(buffer.index()).map(|data| data.0.as_slice())
}
