//! dome-ngin
//!
//! A small wgpu viewer for skinned, animated and instanced glTF models. The
//! core is CPU-side and testable on its own: scene graph evaluation, linear
//! blend skinning, keyframe sampling and instance transform generation. The
//! [`RenderableObject`](data_structures::object::RenderableObject) ties them
//! to GPU buffers and draws them in a shadow pass and a color pass.
//!
//! High-level modules
//! - `camera`: fly camera, projection and the shadow-casting light
//! - `config`: viewer settings loaded from TOML
//! - `context`: GPU device, surface, shadow map and the shared shader programs
//! - `data_structures`: scene graph, skins, animation, instances, meshes, objects
//! - `error`: error types of the loaders and the object lifecycle
//! - `flow`: event loop and per-frame driver
//! - `pipelines`: the skinned color pipeline, the depth-only shadow pipeline
//!   and the unlit pipeline of the skybox and light marker
//! - `render`: shadow and color pass setup
//! - `resources`: glTF and texture loading
//! - `scene`: the dome scene shown by the `dome-viewer` binary

pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod error;
pub mod flow;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod scene;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath;
pub use wgpu;
