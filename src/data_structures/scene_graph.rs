//! Scene graph and hierarchical transform evaluation.
//!
//! Nodes live in an arena and refer to their children by index, exactly as the
//! glTF document lays them out. [`SceneGraph::new`] checks once that the indices
//! really form a forest, so the recursive walks below never need cycle
//! detection and never index out of bounds.

use cgmath::{Matrix4, One, Quaternion, SquareMatrix, Vector3};

use crate::error::LoadError;

/// Raw transform data of a node, kept as authored.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeTransform {
    Matrix(Matrix4<f32>),
    Decomposed {
        translation: Option<Vector3<f32>>,
        rotation: Option<Quaternion<f32>>,
        scale: Option<Vector3<f32>>,
    },
}

impl NodeTransform {
    /// Local matrix of the node.
    ///
    /// Separate components compose as nested operations on the identity:
    /// translate first, then rotate the result, then scale the result, which
    /// is `T * R * S`. Missing components are skipped, so a node without any
    /// transform data yields the identity.
    pub fn to_matrix(&self) -> Matrix4<f32> {
        match self {
            NodeTransform::Matrix(matrix) => *matrix,
            NodeTransform::Decomposed {
                translation,
                rotation,
                scale,
            } => {
                let mut transform = Matrix4::identity();
                if let Some(t) = translation {
                    transform = transform * Matrix4::from_translation(*t);
                }
                if let Some(r) = rotation {
                    transform = transform * Matrix4::from(*r);
                }
                if let Some(s) = scale {
                    transform = transform * Matrix4::from_nonuniform_scale(s.x, s.y, s.z);
                }
                transform
            }
        }
    }
}

impl Default for NodeTransform {
    fn default() -> Self {
        NodeTransform::Decomposed {
            translation: None,
            rotation: None,
            scale: None,
        }
    }
}

impl From<gltf::scene::Transform> for NodeTransform {
    fn from(transform: gltf::scene::Transform) -> Self {
        match transform {
            gltf::scene::Transform::Matrix { matrix } => NodeTransform::Matrix(matrix.into()),
            gltf::scene::Transform::Decomposed {
                translation,
                rotation: [x, y, z, w],
                scale,
            } => NodeTransform::Decomposed {
                translation: Some(translation.into()),
                rotation: Some(Quaternion::new(w, x, y, z)),
                scale: Some(scale.into()),
            },
        }
    }
}

/// One entry of the asset's node hierarchy.
#[derive(Clone, Debug, Default)]
pub struct Node {
    pub name: Option<String>,
    pub transform: NodeTransform,
    pub children: Vec<usize>,
    pub mesh: Option<usize>,
}

impl Node {
    pub fn new(transform: NodeTransform, children: Vec<usize>) -> Self {
        Self {
            name: None,
            transform,
            children,
            mesh: None,
        }
    }
}

/// Validated node forest.
#[derive(Clone, Debug, Default)]
pub struct SceneGraph {
    nodes: Vec<Node>,
}

impl SceneGraph {
    /// Build a graph and reject child indices that are out of range, nodes
    /// with two parents and cycles.
    pub fn new(nodes: Vec<Node>) -> Result<Self, LoadError> {
        let count = nodes.len();
        let mut has_parent = vec![false; count];
        for (idx, node) in nodes.iter().enumerate() {
            for &child in &node.children {
                if child >= count {
                    return Err(LoadError::InvalidChild {
                        node: idx,
                        child,
                        count,
                    });
                }
                if has_parent[child] {
                    return Err(LoadError::NotATree(child));
                }
                has_parent[child] = true;
            }
        }
        // With at most one parent each, a node that is unreachable from any
        // root sits on a cycle.
        let mut visited = vec![false; count];
        let mut stack: Vec<usize> = (0..count).filter(|&i| !has_parent[i]).collect();
        while let Some(idx) = stack.pop() {
            visited[idx] = true;
            stack.extend(nodes[idx].children.iter().copied());
        }
        if let Some(idx) = visited.iter().position(|seen| !seen) {
            return Err(LoadError::NotATree(idx));
        }
        Ok(Self { nodes })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: usize) -> Option<&Node> {
        self.nodes.get(idx)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Nodes without a parent, in index order.
    pub fn roots(&self) -> Vec<usize> {
        let mut has_parent = vec![false; self.nodes.len()];
        self.nodes
            .iter()
            .flat_map(|node| node.children.iter())
            .for_each(|&child| has_parent[child] = true);
        (0..self.nodes.len()).filter(|&i| !has_parent[i]).collect()
    }

    /// One identity matrix per node: the seed for animated local transforms.
    pub fn identity_transforms(&self) -> Vec<Matrix4<f32>> {
        vec![Matrix4::one(); self.nodes.len()]
    }

    /// Write the local transform of `root` and of every node below it into
    /// `locals`, which is indexed by node id.
    pub fn compute_local_transforms(&self, root: usize, locals: &mut [Matrix4<f32>]) {
        let Some(node) = self.nodes.get(root) else {
            log::warn!("local transform requested for unknown node {}", root);
            return;
        };
        if let Some(local) = locals.get_mut(root) {
            *local = node.transform.to_matrix();
        }
        for &child in &node.children {
            self.compute_local_transforms(child, locals);
        }
    }

    /// Propagate `parent * local` from `root` down the tree.
    ///
    /// `parent` seeds the walk: the identity for bind-time evaluation, or the
    /// placement of the subtree when it hangs below something else.
    pub fn compute_global_transforms(
        &self,
        locals: &[Matrix4<f32>],
        root: usize,
        parent: &Matrix4<f32>,
        globals: &mut [Matrix4<f32>],
    ) {
        let Some(node) = self.nodes.get(root) else {
            log::warn!("global transform requested for unknown node {}", root);
            return;
        };
        let local = locals.get(root).copied().unwrap_or_else(Matrix4::one);
        let global = parent * local;
        if let Some(slot) = globals.get_mut(root) {
            *slot = global;
        }
        for &child in &node.children {
            self.compute_global_transforms(locals, child, &global, globals);
        }
    }

    /// Rest-pose global transforms of every node reachable from a root.
    pub fn rest_pose(&self) -> Vec<Matrix4<f32>> {
        let mut locals = self.identity_transforms();
        let mut globals = self.identity_transforms();
        for root in self.roots() {
            self.compute_local_transforms(root, &mut locals);
            self.compute_global_transforms(&locals, root, &Matrix4::one(), &mut globals);
        }
        globals
    }
}
