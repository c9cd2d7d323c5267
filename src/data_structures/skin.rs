//! Linear blend skinning state.
//!
//! A [`Skin`] pairs joint nodes with their inverse bind matrices and keeps the
//! matrices the vertex shader consumes:
//!
//! `joint_matrices[i] = global(joints[i]) * inverse_bind_matrices[i]`
//!
//! Iteration is by joint index while the global transform is looked up by the
//! joint's node id, so every per-joint array here is joint-index aligned.

use cgmath::{Matrix4, SquareMatrix};

use crate::{data_structures::scene_graph::SceneGraph, error::LoadError};

#[derive(Clone, Debug)]
pub struct Skin {
    pub name: Option<String>,
    joints: Vec<usize>,
    inverse_bind_matrices: Vec<Matrix4<f32>>,
    global_joint_transforms: Vec<Matrix4<f32>>,
    joint_matrices: Vec<Matrix4<f32>>,
    // scratch buffer indexed by node id
    node_globals: Vec<Matrix4<f32>>,
}

impl Skin {
    /// Validate a skin definition against the graph it animates.
    ///
    /// A joint count that differs from the inverse bind matrix count is fatal:
    /// joint matrices can't be computed safely for such an asset.
    pub fn new(
        index: usize,
        joints: Vec<usize>,
        inverse_bind_matrices: Vec<Matrix4<f32>>,
        graph: &SceneGraph,
    ) -> Result<Self, LoadError> {
        if joints.is_empty() {
            return Err(LoadError::EmptySkin(index));
        }
        if joints.len() != inverse_bind_matrices.len() {
            return Err(LoadError::JointCountMismatch {
                skin: index,
                joints: joints.len(),
                matrices: inverse_bind_matrices.len(),
            });
        }
        if let Some(&joint) = joints.iter().find(|&&joint| joint >= graph.len()) {
            return Err(LoadError::InvalidJoint {
                skin: index,
                joint,
                count: graph.len(),
            });
        }
        let joint_count = joints.len();
        Ok(Self {
            name: None,
            joints,
            inverse_bind_matrices,
            global_joint_transforms: vec![Matrix4::identity(); joint_count],
            joint_matrices: vec![Matrix4::identity(); joint_count],
            node_globals: graph.identity_transforms(),
        })
    }

    /// Skin of a single identity joint, used when an asset has no skin so the
    /// shaders always find at least one matrix.
    pub fn identity() -> Self {
        Self {
            name: None,
            joints: vec![0],
            inverse_bind_matrices: vec![Matrix4::identity()],
            global_joint_transforms: vec![Matrix4::identity()],
            joint_matrices: vec![Matrix4::identity()],
            node_globals: vec![Matrix4::identity()],
        }
    }

    pub fn joints(&self) -> &[usize] {
        &self.joints
    }

    pub fn root_joint(&self) -> usize {
        self.joints[0]
    }

    pub fn inverse_bind_matrices(&self) -> &[Matrix4<f32>] {
        &self.inverse_bind_matrices
    }

    pub fn global_joint_transforms(&self) -> &[Matrix4<f32>] {
        &self.global_joint_transforms
    }

    pub fn joint_matrices(&self) -> &[Matrix4<f32>] {
        &self.joint_matrices
    }

    /// Bind-time evaluation: rest-pose locals of the joint subtree, globals
    /// seeded with the identity, then joint matrices.
    pub fn prepare(&mut self, graph: &SceneGraph) {
        let mut locals = graph.identity_transforms();
        graph.compute_local_transforms(self.root_joint(), &mut locals);
        self.update(graph, &locals);
    }

    /// Per-frame evaluation from already computed local node transforms.
    /// The inverse bind matrices are reused as loaded.
    pub fn update(&mut self, graph: &SceneGraph, node_transforms: &[Matrix4<f32>]) {
        if self.node_globals.len() != graph.len() {
            self.node_globals = graph.identity_transforms();
        }
        graph.compute_global_transforms(
            node_transforms,
            self.root_joint(),
            &Matrix4::identity(),
            &mut self.node_globals,
        );
        for (h, &node) in self.joints.iter().enumerate() {
            let global = self
                .node_globals
                .get(node)
                .copied()
                .unwrap_or_else(Matrix4::identity);
            self.global_joint_transforms[h] = global;
            self.joint_matrices[h] = global * self.inverse_bind_matrices[h];
        }
    }

    /// Joint matrices in the layout of a WGSL `array<mat4x4<f32>>`.
    pub fn to_raw(&self) -> Vec<[[f32; 4]; 4]> {
        self.joint_matrices.iter().map(|&m| m.into()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::scene_graph::{Node, NodeTransform};
    use cgmath::{Deg, Quaternion, Rotation3, Vector3};

    fn translated(x: f32, y: f32, z: f32, children: Vec<usize>) -> Node {
        Node::new(
            NodeTransform::Decomposed {
                translation: Some(Vector3::new(x, y, z)),
                rotation: None,
                scale: None,
            },
            children,
        )
    }

    fn two_bone_graph() -> SceneGraph {
        SceneGraph::new(vec![
            // mesh node, not part of the skeleton
            Node::default(),
            translated(0.0, 1.0, 0.0, vec![2]),
            Node::new(
                NodeTransform::Decomposed {
                    translation: Some(Vector3::new(0.0, 2.0, 0.0)),
                    rotation: Some(Quaternion::from_angle_z(Deg(45.0))),
                    scale: None,
                },
                vec![],
            ),
        ])
        .unwrap()
    }

    fn bind_pose_inverses(graph: &SceneGraph, joints: &[usize]) -> Vec<Matrix4<f32>> {
        let rest = graph.rest_pose();
        joints
            .iter()
            .map(|&j| rest[j].invert().unwrap())
            .collect()
    }

    #[test]
    fn rest_pose_yields_identity_joint_matrices() {
        let graph = two_bone_graph();
        let joints = vec![1, 2];
        let ibms = bind_pose_inverses(&graph, &joints);
        let mut skin = Skin::new(0, joints, ibms, &graph).unwrap();
        skin.prepare(&graph);

        for m in skin.joint_matrices() {
            approx::assert_relative_eq!(*m, Matrix4::identity(), epsilon = 1e-5);
        }
    }

    #[test]
    fn joint_matrix_is_global_times_inverse_bind() {
        let graph = two_bone_graph();
        let ibms = vec![
            Matrix4::from_translation(Vector3::new(0.0, -1.0, 0.0)),
            Matrix4::from_scale(2.0),
        ];
        // joint order deliberately differs from node order
        let mut skin = Skin::new(0, vec![1, 2], ibms.clone(), &graph).unwrap();
        skin.prepare(&graph);

        for (h, &node) in skin.joints().iter().enumerate() {
            let expected = graph.rest_pose()[node] * ibms[h];
            assert_eq!(skin.global_joint_transforms()[h], graph.rest_pose()[node]);
            approx::assert_relative_eq!(skin.joint_matrices()[h], expected, epsilon = 1e-6);
        }
    }

    #[test]
    fn update_is_idempotent() {
        let graph = two_bone_graph();
        let ibms = bind_pose_inverses(&graph, &[1, 2]);
        let mut skin = Skin::new(0, vec![1, 2], ibms, &graph).unwrap();
        let mut locals = graph.identity_transforms();
        locals[2] = Matrix4::from_angle_x(Deg(30.0));

        skin.update(&graph, &locals);
        let first = skin.joint_matrices().to_vec();
        skin.update(&graph, &locals);
        assert_eq!(first, skin.joint_matrices());
    }

    #[test]
    fn rejects_joint_count_mismatch() {
        let graph = two_bone_graph();
        let err = Skin::new(3, vec![1, 2], vec![Matrix4::identity()], &graph).unwrap_err();
        assert!(matches!(
            err,
            LoadError::JointCountMismatch {
                skin: 3,
                joints: 2,
                matrices: 1
            }
        ));
    }

    #[test]
    fn rejects_unknown_joint_nodes() {
        let graph = two_bone_graph();
        let err = Skin::new(0, vec![1, 9], vec![Matrix4::identity(); 2], &graph).unwrap_err();
        assert!(matches!(err, LoadError::InvalidJoint { joint: 9, .. }));
    }

    #[test]
    fn raw_layout_is_column_major() {
        let graph = two_bone_graph();
        let mut skin = Skin::new(0, vec![1], vec![Matrix4::identity()], &graph).unwrap();
        skin.prepare(&graph);
        let raw = skin.to_raw();
        assert_eq!(raw.len(), 1);
        // translation lives in the fourth column
        assert_eq!(raw[0][3], [0.0, 1.0, 0.0, 1.0]);
    }
}
