//! Placement and per-instance transform generation for GPU instancing.
//!
//! An object has one base [`Placement`]. Instanced objects add one
//! [`InstanceOffset`] per copy; the offsets are relative to the base, so the
//! base placement is always required. Matrices are regenerated every frame
//! from the placement scaled by its [`PlacementModifier`], which leaves the
//! stored placement untouched.

use cgmath::{Deg, InnerSpace, Matrix, Matrix3, Matrix4, SquareMatrix, Vector3, Zero};

use crate::{data_structures::model, error::InstanceError};

/// Base position, scale and single-axis rotation (degrees) of an object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub position: Vector3<f32>,
    pub scale: Vector3<f32>,
    pub rotation_axis: Vector3<f32>,
    pub rotation_angle: f32,
}

impl Placement {
    pub fn new(
        position: Vector3<f32>,
        scale: Vector3<f32>,
        rotation_axis: Vector3<f32>,
        rotation_angle: f32,
    ) -> Self {
        Self {
            position,
            scale,
            rotation_axis,
            rotation_angle,
        }
    }

    /// Placement with position and scale multiplied by the modifier factors.
    pub fn modified(&self, modifier: PlacementModifier) -> Self {
        Self {
            position: self.position * modifier.position,
            scale: self.scale * modifier.scale,
            ..*self
        }
    }

    /// `translate(position + Δp) * scale(scale * s) * rotate(angle + Δa, axis)`.
    ///
    /// A zero rotation axis means "no rotation".
    pub fn instance_matrix(&self, offset: &InstanceOffset) -> Matrix4<f32> {
        let translation = Matrix4::from_translation(self.position + offset.position);
        let scale = self.scale * offset.scale;
        let scale = Matrix4::from_nonuniform_scale(scale.x, scale.y, scale.z);
        let rotation = if self.rotation_axis.is_zero() {
            Matrix4::identity()
        } else {
            Matrix4::from_axis_angle(
                self.rotation_axis.normalize(),
                Deg(self.rotation_angle + offset.angle),
            )
        };
        translation * scale * rotation
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        self.instance_matrix(&InstanceOffset::identity())
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            position: Vector3::zero(),
            scale: Vector3::new(1.0, 1.0, 1.0),
            rotation_axis: Vector3::zero(),
            rotation_angle: 0.0,
        }
    }
}

/// Multiplicative factors applied to position and scale right before the
/// instance matrices are generated. Used to shrink distant geometry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacementModifier {
    pub position: f32,
    pub scale: f32,
}

impl Default for PlacementModifier {
    fn default() -> Self {
        Self {
            position: 1.0,
            scale: 1.0,
        }
    }
}

/// Offset of one instance relative to the base placement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InstanceOffset {
    pub position: Vector3<f32>,
    /// Multiplier on the base scale.
    pub scale: f32,
    /// Degrees added to the base rotation angle.
    pub angle: f32,
}

impl InstanceOffset {
    pub fn new(position: Vector3<f32>, scale: f32, angle: f32) -> Self {
        Self {
            position,
            scale,
            angle,
        }
    }

    pub fn identity() -> Self {
        Self::new(Vector3::zero(), 1.0, 0.0)
    }
}

/// Validated, non-empty set of per-instance offsets.
#[derive(Clone, Debug, PartialEq)]
pub struct InstanceOffsets {
    offsets: Vec<InstanceOffset>,
}

impl InstanceOffsets {
    /// Zip the three offset arrays, refusing arrays whose length isn't `count`.
    /// A count of zero is refused as well: an instanced draw always has at
    /// least one instance buffer entry.
    pub fn new(
        count: usize,
        positions: Vec<Vector3<f32>>,
        scales: Vec<f32>,
        angles: Vec<f32>,
    ) -> Result<Self, InstanceError> {
        if count == 0 {
            return Err(InstanceError::Empty);
        }
        check_len(count, "positions", positions.len())?;
        check_len(count, "scales", scales.len())?;
        check_len(count, "angles", angles.len())?;
        let offsets = positions
            .into_iter()
            .zip(scales)
            .zip(angles)
            .map(|((position, scale), angle)| InstanceOffset::new(position, scale, angle))
            .collect();
        Ok(Self { offsets })
    }

    /// Same as [`new`](Self::new) with positions packed as `x, y, z` triples
    /// (`3 * count` floats).
    pub fn from_flat(
        count: usize,
        positions: &[f32],
        scales: &[f32],
        angles: &[f32],
    ) -> Result<Self, InstanceError> {
        check_len(3 * count, "flat positions", positions.len())?;
        let positions = positions
            .chunks_exact(3)
            .map(|p| Vector3::new(p[0], p[1], p[2]))
            .collect();
        Self::new(count, positions, scales.to_vec(), angles.to_vec())
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstanceOffset> {
        self.offsets.iter()
    }
}

impl TryFrom<Vec<InstanceOffset>> for InstanceOffsets {
    type Error = InstanceError;

    fn try_from(offsets: Vec<InstanceOffset>) -> Result<Self, Self::Error> {
        if offsets.is_empty() {
            return Err(InstanceError::Empty);
        }
        Ok(Self { offsets })
    }
}

fn check_len(count: usize, what: &'static str, len: usize) -> Result<(), InstanceError> {
    if count == len {
        Ok(())
    } else {
        Err(InstanceError::LengthMismatch { count, what, len })
    }
}

/// One model matrix per instance, or exactly one matrix from the placement
/// alone when the object isn't instanced.
pub fn generate_matrices(
    placement: &Placement,
    offsets: Option<&InstanceOffsets>,
) -> Vec<Matrix4<f32>> {
    match offsets {
        Some(offsets) => offsets
            .iter()
            .map(|offset| placement.instance_matrix(offset))
            .collect(),
        None => vec![placement.to_matrix()],
    }
}

/**
 * The raw instance is the actual data stored on the GPU
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    model: [[f32; 4]; 4],
    normal: [[f32; 3]; 3],
}

impl From<Matrix4<f32>> for InstanceRaw {
    fn from(model: Matrix4<f32>) -> Self {
        let linear = Matrix3::from_cols(model.x.truncate(), model.y.truncate(), model.z.truncate());
        // inverse transpose keeps normals perpendicular under non-uniform scale
        let normal = linear
            .invert()
            .map(|inverse| inverse.transpose())
            .unwrap_or(linear);
        Self {
            model: model.into(),
            normal: normal.into(),
        }
    }
}

/**
 * Per-instance layout: the model matrix as four vec4 (locations 5-8) followed by
 * the normal matrix as three vec3 (locations 9-11).
 */
impl model::Vertex for InstanceRaw {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            // advance once per instance instead of once per vertex
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 8,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 16]>() as wgpu::BufferAddress,
                    shader_location: 9,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 19]>() as wgpu::BufferAddress,
                    shader_location: 10,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 22]>() as wgpu::BufferAddress,
                    shader_location: 11,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cgmath::{Point3, Transform};

    #[test]
    fn offset_translates_and_scales() {
        let placement = Placement::default();
        let offsets = InstanceOffsets::new(
            1,
            vec![Vector3::new(5.0, 0.0, 0.0)],
            vec![2.0],
            vec![0.0],
        )
        .unwrap();
        let matrices = generate_matrices(&placement, Some(&offsets));
        assert_eq!(matrices.len(), 1);

        let m = matrices[0];
        assert_relative_eq!(m.transform_point(Point3::new(0.0, 0.0, 0.0)), Point3::new(5.0, 0.0, 0.0));
        assert_relative_eq!(m.transform_vector(Vector3::unit_x()), Vector3::new(2.0, 0.0, 0.0));
        assert_relative_eq!(m.transform_vector(Vector3::unit_y()), Vector3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn single_matrix_matches_identity_offset() {
        let placement = Placement::new(
            Vector3::new(1.0, 2.0, 3.0),
            Vector3::new(2.0, 2.0, 2.0),
            Vector3::new(0.0, 1.0, 0.0),
            30.0,
        );
        let single = generate_matrices(&placement, None);
        let offsets = InstanceOffsets::try_from(vec![InstanceOffset::identity()]).unwrap();
        let instanced = generate_matrices(&placement, Some(&offsets));
        assert_eq!(single.len(), 1);
        assert_eq!(single, instanced);
    }

    #[test]
    fn rotation_adds_instance_angle_around_normalized_axis() {
        let placement = Placement::new(
            Vector3::zero(),
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::new(0.0, 3.0, 0.0),
            45.0,
        );
        let m = placement.instance_matrix(&InstanceOffset::new(Vector3::zero(), 1.0, 45.0));
        assert_relative_eq!(
            m.transform_vector(Vector3::unit_x()),
            Vector3::new(0.0, 0.0, -1.0),
            epsilon = 1e-6
        );
    }

    #[test]
    fn zero_axis_skips_rotation() {
        let placement = Placement {
            rotation_angle: 90.0,
            ..Placement::default()
        };
        assert_eq!(placement.to_matrix(), Matrix4::identity());
    }

    #[test]
    fn modifier_scales_position_and_scale_only() {
        let placement = Placement::new(
            Vector3::new(10.0, 0.0, 0.0),
            Vector3::new(2.0, 2.0, 2.0),
            Vector3::unit_y(),
            15.0,
        );
        let modified = placement.modified(PlacementModifier {
            position: 0.5,
            scale: 0.25,
        });
        assert_eq!(modified.position, Vector3::new(5.0, 0.0, 0.0));
        assert_eq!(modified.scale, Vector3::new(0.5, 0.5, 0.5));
        assert_eq!(modified.rotation_angle, 15.0);
    }

    #[test]
    fn rejects_mismatched_offset_lengths() {
        let err = InstanceOffsets::new(2, vec![Vector3::zero(); 2], vec![1.0], vec![0.0; 2]);
        assert_eq!(
            err,
            Err(InstanceError::LengthMismatch {
                count: 2,
                what: "scales",
                len: 1
            })
        );
        assert!(InstanceOffsets::from_flat(2, &[0.0; 5], &[1.0; 2], &[0.0; 2]).is_err());
        let flat = InstanceOffsets::from_flat(2, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[1.0; 2], &[0.0; 2]);
        assert_eq!(flat.unwrap().iter().nth(1).unwrap().position, Vector3::new(4.0, 5.0, 6.0));
    }

    #[test]
    fn zero_instances_are_rejected() {
        assert_eq!(
            InstanceOffsets::new(0, vec![], vec![], vec![]),
            Err(InstanceError::Empty)
        );
        assert_eq!(
            InstanceOffsets::from_flat(0, &[], &[], &[]),
            Err(InstanceError::Empty)
        );
        assert_eq!(InstanceOffsets::try_from(Vec::new()), Err(InstanceError::Empty));
    }

    #[test]
    fn raw_normal_matrix_undoes_non_uniform_scale() {
        let raw = InstanceRaw::from(Matrix4::from_nonuniform_scale(2.0, 1.0, 1.0));
        assert_relative_eq!(raw.normal[0][0], 0.5);
        assert_relative_eq!(raw.model[0][0], 2.0);
    }
}
