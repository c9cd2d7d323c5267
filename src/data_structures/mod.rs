//! Engine data structures: scene graph, skins, animation, instances, meshes
//! and the renderable object built from them.
//!
//! - `scene_graph` evaluates local and global node transforms
//! - `skin` turns global joint transforms into joint matrices
//! - `animation` samples keyframe tracks into node transforms
//! - `instance` holds placements and generates per-instance matrices
//! - `model` contains the loaded asset, vertex layout and GPU meshes
//! - `texture` contains the GPU texture wrapper and creation utilities
//! - `object` is the renderable object façade
//! - `cube` and `unlit_box` draw the skybox and the light marker

pub mod animation;
pub mod cube;
pub mod instance;
pub mod model;
pub mod object;
pub mod scene_graph;
pub mod skin;
pub mod texture;
pub mod unlit_box;
