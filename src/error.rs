//! Error types shared by the loaders and the renderable object.
//!
//! Loading follows a best-effort policy: callers usually log these errors and
//! keep the frame loop alive. The only error the core refuses to work around is
//! a structurally broken skin.

use std::path::PathBuf;

/// Anything that can go wrong while turning a glTF file into an [`Asset`](crate::data_structures::model::Asset).
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error while reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse glTF: {0}")]
    Gltf(#[from] gltf::Error),

    #[error("Buffer {0} referenced by an accessor was not loaded")]
    MissingBufferData(usize),

    #[error("Node {node} references child {child}, but the asset only has {count} nodes")]
    InvalidChild { node: usize, child: usize, count: usize },

    #[error("Node {0} is reachable from more than one parent or from itself")]
    NotATree(usize),

    #[error("Skin {skin} has {joints} joints but {matrices} inverse bind matrices")]
    JointCountMismatch {
        skin: usize,
        joints: usize,
        matrices: usize,
    },

    #[error("Skin {skin} references joint node {joint}, but the asset only has {count} nodes")]
    InvalidJoint { skin: usize, joint: usize, count: usize },

    #[error("Skin {0} has no joints")]
    EmptySkin(usize),
}

/// Raised when per-instance offsets are empty or don't line up with the instance count.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InstanceError {
    #[error("{count} instances requested but {what} has {len} entries")]
    LengthMismatch {
        count: usize,
        what: &'static str,
        len: usize,
    },

    #[error("instancing needs at least one instance")]
    Empty,
}

/// Misuse of the [`RenderableObject`](crate::data_structures::object::RenderableObject) lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    #[error("{0} is not allowed after init()")]
    AlreadyInitialized(&'static str),

    #[error("{0} was already configured")]
    AlreadySet(&'static str),

    #[error("init() requires set_placement() first")]
    MissingPlacement,

    #[error("Shader program built for binding slot {program} but the object uses slot {object}")]
    SlotMismatch { program: u32, object: u32 },

    #[error("{0} shader program has the wrong pass kind")]
    WrongPass(&'static str),

    #[error("Asset has no animation {0}")]
    UnknownAnimation(usize),

    #[error(transparent)]
    Instance(#[from] InstanceError),

    #[error(transparent)]
    Load(#[from] LoadError),
}
