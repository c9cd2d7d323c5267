//! The renderable object: one glTF asset with its placement, optional
//! instancing, shadows and animation.
//!
//! Lifecycle is `new()` → capability setters → `init` → per-frame
//! `update`/`depth_render`/`render`. Capabilities (`set_shadow`,
//! `set_animated`, `set_instanced`) can each be set once and only before
//! `init`. The placement and its modifier may change at any time; instance
//! matrices are regenerated on every draw call.

use std::{path::Path, sync::Arc};

use cgmath::{Matrix4, SquareMatrix, Vector3};
use wgpu::util::DeviceExt;

use crate::{
    context::FrameContext,
    data_structures::{
        instance::{InstanceOffsets, InstanceRaw, Placement, PlacementModifier, generate_matrices},
        model::{Asset, DrawMesh, Mesh, PrimitiveUniform},
        skin::Skin,
        texture::Texture,
    },
    error::ObjectError,
    pipelines::{ObjectUniform, PassKind, ShaderProgram},
    resources::{
        load_asset,
        texture::{diffuse_shadow_bind_group, load_texture},
    },
};

#[derive(Debug, Default)]
pub struct RenderableObject {
    name: String,
    placement: Option<Placement>,
    modifier: PlacementModifier,
    shadows: bool,
    animated: bool,
    offsets: Option<InstanceOffsets>,
    asset: Option<Asset>,
    active_animation: usize,
    // joint matrices of an asset without skins
    identity_skin: Option<Skin>,
    instance_matrices: Vec<Matrix4<f32>>,
    gpu: Option<GpuResources>,
    warned_uninitialized: bool,
}

/// Uniform buffer and object bind group of one pass.
#[derive(Debug)]
struct PassResources {
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

#[derive(Debug)]
struct GpuResources {
    color_program: Arc<ShaderProgram>,
    depth_program: Option<Arc<ShaderProgram>>,
    meshes: Vec<Mesh>,
    joint_buffer: wgpu::Buffer,
    instance_buffer: wgpu::Buffer,
    instance_count: u32,
    color: PassResources,
    depth: Option<PassResources>,
    diffuse: Texture,
    textured: bool,
    // sampled in place of the shadow map when none is supplied
    blank_shadow_map: Texture,
    // diffuse + shadow map group, keyed by the shadow texture it samples
    texture_group: KeyedCache<wgpu::Texture, wgpu::BindGroup>,
}

/// Holds the value built for the last key; a different key rebuilds it.
#[derive(Debug)]
struct KeyedCache<K, V> {
    entry: Option<(K, V)>,
}

impl<K, V> Default for KeyedCache<K, V> {
    fn default() -> Self {
        Self { entry: None }
    }
}

impl<K: PartialEq, V> KeyedCache<K, V> {
    fn get_or_try_insert_with<E>(
        &mut self,
        key: K,
        make: impl FnOnce() -> Result<V, E>,
    ) -> Result<&V, E> {
        let entry = match self.entry.take() {
            Some((cached, value)) if cached == key => (cached, value),
            _ => (key, make()?),
        };
        let (_, value) = self.entry.insert(entry);
        Ok(value)
    }
}

impl Drop for GpuResources {
    fn drop(&mut self) {
        self.joint_buffer.destroy();
        self.instance_buffer.destroy();
        self.color.uniform_buffer.destroy();
        if let Some(depth) = &self.depth {
            depth.uniform_buffer.destroy();
        }
        for mesh in &self.meshes {
            mesh.vertex_buffer.destroy();
            mesh.index_buffer.destroy();
            mesh.material_buffer.destroy();
        }
    }
}

impl RenderableObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_initialized(&self) -> bool {
        self.asset.is_some()
    }

    /// Whether GPU resources are currently held.
    pub fn is_uploaded(&self) -> bool {
        self.gpu.is_some()
    }

    fn check_capability(&self, what: &'static str, already: bool) -> Result<(), ObjectError> {
        if self.is_initialized() {
            return Err(ObjectError::AlreadyInitialized(what));
        }
        if already {
            return Err(ObjectError::AlreadySet(what));
        }
        Ok(())
    }

    /// Cast shadows into the shadow map and receive them in the color pass.
    pub fn set_shadow(&mut self) -> Result<(), ObjectError> {
        self.check_capability("set_shadow", self.shadows)?;
        self.shadows = true;
        Ok(())
    }

    /// Drive the skin from the active animation in [`update`](Self::update).
    pub fn set_animated(&mut self) -> Result<(), ObjectError> {
        self.check_capability("set_animated", self.animated)?;
        self.animated = true;
        Ok(())
    }

    /// Draw `count` copies, each offset from the base placement.
    /// Every offset list must hold exactly `count` entries.
    pub fn set_instanced(
        &mut self,
        count: usize,
        positions: Vec<Vector3<f32>>,
        scales: Vec<f32>,
        angles: Vec<f32>,
    ) -> Result<(), ObjectError> {
        self.check_capability("set_instanced", self.offsets.is_some())?;
        self.offsets = Some(InstanceOffsets::new(count, positions, scales, angles)?);
        Ok(())
    }

    /// Base placement; the rotation angle is in degrees.
    pub fn set_placement(
        &mut self,
        position: Vector3<f32>,
        scale: Vector3<f32>,
        rotation_axis: Vector3<f32>,
        rotation_angle: f32,
    ) {
        self.placement = Some(Placement::new(
            position,
            scale,
            rotation_axis,
            rotation_angle,
        ));
    }

    /// Factors applied to position and scale when matrices are generated.
    /// The stored placement is left untouched.
    pub fn set_placement_modifier(&mut self, position: f32, scale: f32) {
        self.modifier = PlacementModifier { position, scale };
    }

    pub fn placement(&self) -> Option<&Placement> {
        self.placement.as_ref()
    }

    pub fn placement_modifier(&self) -> PlacementModifier {
        self.modifier
    }

    pub fn has_shadow(&self) -> bool {
        self.shadows
    }

    pub fn is_animated(&self) -> bool {
        self.animated
    }

    pub fn instance_count(&self) -> usize {
        self.offsets.as_ref().map_or(1, InstanceOffsets::len)
    }

    pub fn asset(&self) -> Option<&Asset> {
        self.asset.as_ref()
    }

    /// Load the asset and its optional diffuse texture, then upload.
    ///
    /// A texture that fails to load is logged and replaced by plain white.
    #[allow(clippy::too_many_arguments)]
    pub async fn init(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        color_program: Arc<ShaderProgram>,
        depth_program: Option<Arc<ShaderProgram>>,
        binding_slot: u32,
        asset_path: impl AsRef<Path>,
        texture_path: Option<&Path>,
    ) -> Result<(), ObjectError> {
        self.check_init(&color_program, depth_program.as_deref(), binding_slot)?;
        let asset = load_asset(asset_path).await?;
        let texture = match texture_path {
            Some(path) => match load_texture(path, device, queue).await {
                Ok(texture) => Some(texture),
                Err(e) => {
                    log::warn!("{}: texture {} not loaded: {:#}", self.name, path.display(), e);
                    None
                }
            },
            None => None,
        };
        self.init_with_asset(
            device,
            queue,
            color_program,
            depth_program,
            binding_slot,
            asset,
            texture,
        )
    }

    /// Upload an already loaded asset. Skins are expected in the state
    /// [`load_asset`](crate::resources::load_asset) leaves them: prepared at
    /// their bind pose.
    #[allow(clippy::too_many_arguments)]
    pub fn init_with_asset(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        color_program: Arc<ShaderProgram>,
        depth_program: Option<Arc<ShaderProgram>>,
        binding_slot: u32,
        asset: Asset,
        texture: Option<Texture>,
    ) -> Result<(), ObjectError> {
        self.check_init(&color_program, depth_program.as_deref(), binding_slot)?;
        if self.shadows && depth_program.is_none() {
            log::warn!("{}: shadows enabled without a depth program", self.name);
        }
        self.attach(asset);
        let gpu = self.upload(device, queue, color_program, depth_program, texture);
        self.gpu = Some(gpu);
        log::info!(
            "{}: initialized with {} instance(s)",
            self.name,
            self.instance_count()
        );
        Ok(())
    }

    fn check_init(
        &self,
        color_program: &ShaderProgram,
        depth_program: Option<&ShaderProgram>,
        binding_slot: u32,
    ) -> Result<(), ObjectError> {
        if self.is_initialized() {
            return Err(ObjectError::AlreadyInitialized("init"));
        }
        if self.placement.is_none() {
            return Err(ObjectError::MissingPlacement);
        }
        if color_program.kind != PassKind::Color {
            return Err(ObjectError::WrongPass("color"));
        }
        for program in std::iter::once(color_program).chain(depth_program) {
            if program.binding_slot != binding_slot {
                return Err(ObjectError::SlotMismatch {
                    program: program.binding_slot,
                    object: binding_slot,
                });
            }
        }
        if depth_program.is_some_and(|program| program.kind != PassKind::Depth) {
            return Err(ObjectError::WrongPass("depth"));
        }
        Ok(())
    }

    /// CPU side of `init`: take the asset and compute the first matrices.
    fn attach(&mut self, asset: Asset) {
        if self.name.is_empty() {
            self.name = asset.name.clone();
        }
        self.identity_skin = asset.skins.is_empty().then(Skin::identity);
        self.asset = Some(asset);
        self.instance_matrices = self.generate_instance_matrices();
    }

    fn upload(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        color_program: Arc<ShaderProgram>,
        depth_program: Option<Arc<ShaderProgram>>,
        texture: Option<Texture>,
    ) -> GpuResources {
        let joints = self.joint_matrices_raw();
        let joint_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Joint Buffer", self.name)),
            contents: bytemuck::cast_slice(&joints),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });
        let instance_data: Vec<InstanceRaw> = self
            .instance_matrices
            .iter()
            .map(|&m| InstanceRaw::from(m))
            .collect();
        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Instance Buffer", self.name)),
            contents: bytemuck::cast_slice(&instance_data),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });

        let color = self.pass_resources(
            device,
            &color_program,
            &joint_buffer,
            ObjectUniform::color(&FrameContext::default(), false, false),
            "Color",
        );
        let depth = depth_program.as_ref().map(|program| {
            self.pass_resources(
                device,
                program,
                &joint_buffer,
                ObjectUniform::depth(Matrix4::identity()),
                "Depth",
            )
        });

        let meshes = match &self.asset {
            Some(asset) => asset
                .primitives
                .iter()
                .zip(asset.primitive_transforms())
                .enumerate()
                .map(|(i, (primitive, transform))| {
                    let uniform = PrimitiveUniform::new(
                        transform,
                        &asset.material_of(primitive),
                        primitive.skinned,
                    );
                    Mesh::new(
                        device,
                        &format!("{}[{}]", self.name, i),
                        primitive,
                        uniform,
                        &color_program.material_layout,
                    )
                })
                .collect(),
            None => Vec::new(),
        };

        let textured = texture.is_some();
        let diffuse = texture.unwrap_or_else(|| {
            Texture::create_solid(device, queue, [255; 4], &format!("{} White", self.name))
        });
        let blank_shadow_map = Texture::create_depth_texture(device, [1, 1], "blank_shadow_map");

        GpuResources {
            color_program,
            depth_program,
            meshes,
            joint_buffer,
            instance_buffer,
            instance_count: instance_data.len() as u32,
            color,
            depth,
            diffuse,
            textured,
            blank_shadow_map,
            texture_group: KeyedCache::default(),
        }
    }

    fn pass_resources(
        &self,
        device: &wgpu::Device,
        program: &ShaderProgram,
        joint_buffer: &wgpu::Buffer,
        uniform: ObjectUniform,
        pass: &str,
    ) -> PassResources {
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} {} Uniform Buffer", self.name, pass)),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &program.object_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: joint_buffer.as_entire_binding(),
                },
            ],
            label: Some(&format!("{} {} Bind Group", self.name, pass)),
        });
        PassResources {
            uniform_buffer,
            bind_group,
        }
    }

    /// Select which animation clip `update` plays.
    pub fn set_active_animation(&mut self, index: usize) -> Result<(), ObjectError> {
        if let Some(asset) = &self.asset {
            if index >= asset.animations.len() {
                return Err(ObjectError::UnknownAnimation(index));
            }
        }
        self.active_animation = index;
        Ok(())
    }

    /// Pose the skins at `time` seconds.
    ///
    /// Node transforms start from the identity every frame; nodes the clip
    /// doesn't target stay at the identity. No-op for objects that aren't
    /// animated or whose asset has no clip.
    pub fn update(&mut self, time: f32) {
        if !self.animated {
            return;
        }
        let Some(asset) = &mut self.asset else {
            return;
        };
        let Some(animation) = asset.animations.get(self.active_animation) else {
            return;
        };
        let mut node_transforms = asset.graph.identity_transforms();
        animation.apply(time, &mut node_transforms);
        for skin in &mut asset.skins {
            skin.update(&asset.graph, &node_transforms);
        }
    }

    /// Model matrices of the current placement, modifier and offsets.
    pub fn generate_instance_matrices(&self) -> Vec<Matrix4<f32>> {
        let placement = self.placement.unwrap_or_default().modified(self.modifier);
        generate_matrices(&placement, self.offsets.as_ref())
    }

    /// Matrices uploaded by the last draw call (or by `init`).
    pub fn instance_matrices(&self) -> &[Matrix4<f32>] {
        &self.instance_matrices
    }

    /// Joint matrices of the skin that drives the shaders.
    pub fn joint_matrices(&self) -> &[Matrix4<f32>] {
        self.asset
            .as_ref()
            .and_then(|asset| asset.skins.first())
            .or(self.identity_skin.as_ref())
            .map(Skin::joint_matrices)
            .unwrap_or_default()
    }

    fn joint_matrices_raw(&self) -> Vec<[[f32; 4]; 4]> {
        let raw: Vec<[[f32; 4]; 4]> = self.joint_matrices().iter().map(|&m| m.into()).collect();
        if raw.is_empty() {
            vec![Matrix4::identity().into()]
        } else {
            raw
        }
    }

    /// Regenerate instance matrices and upload them together with the joints.
    fn upload_frame_data(&mut self, queue: &wgpu::Queue) {
        self.instance_matrices = self.generate_instance_matrices();
        let Some(gpu) = &self.gpu else {
            return;
        };
        let instance_data: Vec<InstanceRaw> = self
            .instance_matrices
            .iter()
            .map(|&m| InstanceRaw::from(m))
            .collect();
        queue.write_buffer(&gpu.instance_buffer, 0, bytemuck::cast_slice(&instance_data));
        queue.write_buffer(
            &gpu.joint_buffer,
            0,
            bytemuck::cast_slice(&self.joint_matrices_raw()),
        );
    }

    fn warn_uninitialized(&mut self, call: &str) {
        if !self.warned_uninitialized {
            log::warn!("{}: {} called before init, skipping", self.name, call);
            self.warned_uninitialized = true;
        }
    }

    /// Draw into the color pass. `shadow_map` is the depth target of this
    /// frame's shadow pass; without it shadows are disabled for the draw.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        render_pass: &mut wgpu::RenderPass<'_>,
        frame: &FrameContext,
        shadow_map: Option<&Texture>,
    ) {
        if self.gpu.is_none() {
            self.warn_uninitialized("render");
            return;
        }
        self.upload_frame_data(queue);
        let Some(gpu) = &mut self.gpu else {
            return;
        };

        let receives_shadows = self.shadows && shadow_map.is_some();
        let uniform = ObjectUniform::color(frame, receives_shadows, gpu.textured);
        queue.write_buffer(&gpu.color.uniform_buffer, 0, bytemuck::cast_slice(&[uniform]));

        let program = &gpu.color_program;
        let Some(texture_layout) = &program.texture_layout else {
            log::error!("{}: color program has no texture layout", self.name);
            return;
        };
        let shadow_map = shadow_map.unwrap_or(&gpu.blank_shadow_map);
        let diffuse = &gpu.diffuse;
        let texture_group = match gpu
            .texture_group
            .get_or_try_insert_with(shadow_map.texture.clone(), || {
                diffuse_shadow_bind_group(device, texture_layout, diffuse, shadow_map)
            }) {
            Ok(group) => group,
            Err(e) => {
                log::error!("{}: {:#}", self.name, e);
                return;
            }
        };

        program.bind(render_pass);
        render_pass.set_bind_group(program.binding_slot, &gpu.color.bind_group, &[]);
        render_pass.set_bind_group(program.texture_slot(), texture_group, &[]);
        render_pass.set_vertex_buffer(1, gpu.instance_buffer.slice(..));
        for mesh in &gpu.meshes {
            render_pass.draw_mesh_instanced(mesh, program.material_slot(), 0..gpu.instance_count);
        }
    }

    /// Draw into the shadow map from the light. Only shadow casters draw.
    pub fn depth_render(
        &mut self,
        queue: &wgpu::Queue,
        render_pass: &mut wgpu::RenderPass<'_>,
        light_view_proj: Matrix4<f32>,
    ) {
        if !self.shadows {
            return;
        }
        if self.gpu.is_none() {
            self.warn_uninitialized("depth_render");
            return;
        }
        self.upload_frame_data(queue);
        let Some(gpu) = &self.gpu else {
            return;
        };
        let (Some(program), Some(depth)) = (&gpu.depth_program, &gpu.depth) else {
            return;
        };

        let uniform = ObjectUniform::depth(light_view_proj);
        queue.write_buffer(&depth.uniform_buffer, 0, bytemuck::cast_slice(&[uniform]));

        program.bind(render_pass);
        render_pass.set_bind_group(program.binding_slot, &depth.bind_group, &[]);
        render_pass.set_vertex_buffer(1, gpu.instance_buffer.slice(..));
        for mesh in &gpu.meshes {
            render_pass.draw_mesh_instanced(mesh, program.material_slot(), 0..gpu.instance_count);
        }
    }

    /// Release GPU resources. Safe to call more than once; the CPU state is
    /// kept, so the object can't be initialized again.
    pub fn cleanup(&mut self) {
        if self.gpu.take().is_some() {
            log::debug!("{}: GPU resources released", self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data_structures::{
            animation::{Animation, Channel, Interpolation, Keyframes, Property, Sampler},
            model::{MaterialInfo, Primitive, SkinnedVertex},
            scene_graph::{Node, NodeTransform, SceneGraph},
        },
        error::InstanceError,
    };
    use approx::assert_relative_eq;
    use cgmath::{Transform, Vector4, Zero};

    fn placed(name: &str) -> RenderableObject {
        let mut object = RenderableObject::new(name);
        object.set_placement(
            Vector3::new(1.0, 2.0, 3.0),
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::zero(),
            0.0,
        );
        object
    }

    /// Two-node arm: root at the origin, joint node one unit up. The clip
    /// moves the joint node from x=0 to x=2 over one second.
    fn animated_arm() -> Asset {
        let root = Node::new(NodeTransform::default(), vec![1]);
        let tip = Node::new(
            NodeTransform::Decomposed {
                translation: Some(Vector3::new(0.0, 1.0, 0.0)),
                rotation: None,
                scale: None,
            },
            vec![],
        );
        let graph = SceneGraph::new(vec![root, tip]).unwrap();
        let mut skin = Skin::new(
            0,
            vec![0, 1],
            vec![
                Matrix4::identity(),
                Matrix4::from_translation(Vector3::new(0.0, -1.0, 0.0)),
            ],
            &graph,
        )
        .unwrap();
        skin.prepare(&graph);
        let sampler = Sampler {
            input: vec![0.0, 1.0],
            output: Keyframes::Translation(vec![
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(2.0, 0.0, 0.0),
            ]),
            interpolation: Interpolation::Linear,
        };
        let animation = Animation {
            name: "slide".into(),
            channels: vec![Channel {
                target_node: 1,
                property: Property::Translation,
                sampler: 0,
            }],
            samplers: vec![sampler],
        };
        let primitive = Primitive {
            vertices: vec![SkinnedVertex::default(); 3],
            indices: vec![0, 1, 2],
            material: None,
            node: 0,
            skinned: true,
        };
        Asset {
            name: "arm".into(),
            graph,
            scene_roots: vec![0],
            primitives: vec![primitive],
            materials: vec![MaterialInfo::default()],
            skins: vec![skin],
            animations: vec![animation],
        }
    }

    #[test]
    fn capabilities_can_be_set_once() {
        let mut object = placed("tree");
        object.set_shadow().unwrap();
        assert!(matches!(
            object.set_shadow(),
            Err(ObjectError::AlreadySet("set_shadow"))
        ));
        object.set_animated().unwrap();
        assert!(object.set_animated().is_err());
        assert!(object.has_shadow() && object.is_animated());
    }

    #[test]
    fn capabilities_are_refused_after_init() {
        let mut object = placed("bot");
        object.attach(animated_arm());
        assert!(object.is_initialized());
        assert!(matches!(
            object.set_shadow(),
            Err(ObjectError::AlreadyInitialized("set_shadow"))
        ));
        assert!(matches!(
            object.set_instanced(1, vec![Vector3::zero()], vec![1.0], vec![0.0]),
            Err(ObjectError::AlreadyInitialized("set_instanced"))
        ));
    }

    #[test]
    fn mismatched_offsets_are_rejected() {
        let mut object = placed("grass");
        let err = object
            .set_instanced(3, vec![Vector3::zero(); 3], vec![1.0; 2], vec![0.0; 3])
            .unwrap_err();
        assert!(matches!(
            err,
            ObjectError::Instance(InstanceError::LengthMismatch {
                count: 3,
                what: "scales",
                len: 2
            })
        ));
        assert_eq!(object.instance_count(), 1);
    }

    #[test]
    fn zero_instances_are_refused() {
        let mut object = placed("grass");
        let err = object
            .set_instanced(0, vec![], vec![], vec![])
            .unwrap_err();
        assert!(matches!(err, ObjectError::Instance(InstanceError::Empty)));
        assert_eq!(object.instance_count(), 1);
        assert_eq!(object.generate_instance_matrices().len(), 1);
    }

    #[test]
    fn attach_keeps_the_skin_state_it_was_given() {
        let mut asset = animated_arm();
        let mut locals = asset.graph.identity_transforms();
        asset.animations[0].apply(0.5, &mut locals);
        asset.skins[0].update(&asset.graph, &locals);
        let posed = asset.skins[0].joint_matrices().to_vec();

        let mut object = placed("arm");
        object.attach(asset);
        assert_eq!(object.joint_matrices(), &posed[..]);
    }

    #[test]
    fn uninstanced_object_has_one_matrix_at_its_placement() {
        let mut object = placed("dome");
        object.attach(Asset::default());
        let matrices = object.instance_matrices();
        assert_eq!(matrices.len(), 1);
        let p = matrices[0].transform_point(cgmath::Point3::new(0.0, 0.0, 0.0));
        assert_relative_eq!(p, cgmath::Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn modifier_scales_generated_matrices_but_not_placement() {
        let mut object = placed("grass");
        object
            .set_instanced(
                2,
                vec![Vector3::zero(), Vector3::new(10.0, 0.0, 0.0)],
                vec![1.0, 2.0],
                vec![0.0, 0.0],
            )
            .unwrap();
        object.set_placement_modifier(1.0, 0.5);
        let matrices = object.generate_instance_matrices();
        assert_eq!(matrices.len(), 2);
        assert_relative_eq!(matrices[1].x.x, 1.0);
        assert_relative_eq!(matrices[1].w, Vector4::new(11.0, 2.0, 3.0, 1.0));
        assert_eq!(object.placement().unwrap().scale, Vector3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn update_moves_joint_matrices_along_the_clip() {
        let mut object = placed("arm");
        object.set_animated().unwrap();
        object.attach(animated_arm());
        // bind pose: joint matrices are the identity
        for m in object.joint_matrices() {
            assert_relative_eq!(*m, Matrix4::identity(), epsilon = 1e-6);
        }

        object.update(0.5);
        let joints = object.joint_matrices();
        assert_relative_eq!(joints[0], Matrix4::identity(), epsilon = 1e-6);
        // the seed is the identity, so the tip only carries the sampled offset
        let tip = joints[1].transform_point(cgmath::Point3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(tip, cgmath::Point3::new(1.0, 0.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn update_is_a_no_op_without_animated_flag() {
        let mut object = placed("arm");
        object.attach(animated_arm());
        let before = object.joint_matrices().to_vec();
        object.update(0.5);
        assert_eq!(object.joint_matrices(), &before[..]);
    }

    #[test]
    fn unknown_animation_index_is_rejected() {
        let mut object = placed("arm");
        object.attach(animated_arm());
        assert!(object.set_active_animation(0).is_ok());
        assert!(matches!(
            object.set_active_animation(3),
            Err(ObjectError::UnknownAnimation(3))
        ));
    }

    #[test]
    fn asset_without_skin_exposes_identity_joint() {
        let mut object = placed("rock");
        object.attach(Asset::default());
        assert_eq!(object.joint_matrices(), &[Matrix4::<f32>::identity()]);
        assert_eq!(object.joint_matrices_raw().len(), 1);
    }

    #[test]
    fn cleanup_is_idempotent_and_keeps_cpu_state() {
        let mut object = placed("arm");
        object.attach(animated_arm());
        object.cleanup();
        object.cleanup();
        assert!(!object.is_uploaded());
        assert!(object.is_initialized());
    }

    #[test]
    fn keyed_cache_rebuilds_only_for_a_new_key() {
        let mut cache = KeyedCache::default();
        let mut builds = 0;
        let mut build = |key: u32| {
            builds += 1;
            Ok::<_, String>(key * 10)
        };
        assert_eq!(cache.get_or_try_insert_with(1, || build(1)), Ok(&10));
        assert_eq!(cache.get_or_try_insert_with(1, || build(1)), Ok(&10));
        assert_eq!(cache.get_or_try_insert_with(2, || build(2)), Ok(&20));
        assert_eq!(cache.get_or_try_insert_with(2, || build(2)), Ok(&20));
        assert_eq!(builds, 2);
    }

    #[test]
    fn keyed_cache_retries_after_a_failed_build() {
        let mut cache: KeyedCache<u32, u32> = KeyedCache::default();
        assert!(cache.get_or_try_insert_with(1, || Err("lost")).is_err());
        assert_eq!(cache.get_or_try_insert_with(1, || Ok::<_, &str>(7)), Ok(&7));
    }

    #[test]
    fn asset_name_fills_in_missing_object_name() {
        let mut object = RenderableObject::default();
        object.set_placement(
            Vector3::zero(),
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::zero(),
            0.0,
        );
        object.attach(animated_arm());
        assert_eq!(object.name(), "arm");
    }
}
