//! The dome scene: a dome, an animated bot, three orbiting ships, instanced
//! vegetation and a door that slides open when the camera comes close. A star
//! skybox surrounds it and a small cube marks the light.
//!
//! Layout math lives in free functions so it can be checked without a GPU;
//! [`DomeScene`] only wires it to the renderable objects.

use std::path::PathBuf;

use cgmath::{Deg, InnerSpace, Matrix4, MetricSpace, Point3, Vector3, Zero};
use instant::Instant;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    config::ViewerConfig,
    context::{Context, FrameContext, InitContext, OBJECT_BINDING_SLOT},
    data_structures::{
        object::RenderableObject,
        unlit_box::{BoxKind, UnlitBox},
    },
    error::ObjectError,
    flow::GraphicsFlow,
    resources::texture::load_images,
};

pub const SHIP_NAMES: [&str; 3] = ["virgo", "gemini", "scorpio"];
pub const PLANT_NAMES: [&str; 7] = [
    "grass2", "grass3", "grass41", "grass42", "flower", "spruce", "oak",
];
/// Skybox texture suffixes in texture array layer order.
pub const SKYBOX_FACES: [&str; 6] = ["front", "back", "right", "left", "down", "up"];

/// Degrees per second of animation time.
const SHIP_ORBIT_SPEED: f32 = 10.0;
/// Vegetation never shrinks below this factor.
const VEGETATION_MIN_SCALE: f32 = 0.25;

/// Seconds for the door to fully open or close.
const DOOR_TRAVEL_TIME: f32 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Role {
    Dome,
    Bot,
    Ship(usize),
    Door,
    Vegetation,
}

/// Per-instance offsets of one vegetation kind.
#[derive(Clone, Debug, PartialEq)]
pub struct VegetationLayout {
    pub positions: Vec<Vector3<f32>>,
    pub scales: Vec<f32>,
    pub angles: Vec<f32>,
}

/// `count` random spots on the ground disc of `radius`, uniform over its area,
/// with a random size in [0.5, 1.5) and heading in degrees.
pub fn vegetation_layout(rng: &mut impl Rng, count: usize, radius: f32) -> VegetationLayout {
    let mut layout = VegetationLayout {
        positions: Vec::with_capacity(count),
        scales: Vec::with_capacity(count),
        angles: Vec::with_capacity(count),
    };
    for _ in 0..count {
        let r = radius * rng.random_range(0.0f32..1.0).sqrt();
        let theta = rng.random_range(0.0f32..std::f32::consts::TAU);
        layout
            .positions
            .push(Vector3::new(r * theta.cos(), 0.0, r * theta.sin()));
        layout.scales.push(rng.random_range(0.5..1.5));
        layout.angles.push(rng.random_range(0.0..360.0));
    }
    layout
}

/// Circular orbit shared by the ships, evenly spaced by index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShipOrbit {
    pub radius: f32,
    pub height: f32,
    pub ships: usize,
}

impl ShipOrbit {
    fn angle(&self, index: usize, time: f32) -> Deg<f32> {
        let spacing = 360.0 / self.ships.max(1) as f32;
        Deg(time * SHIP_ORBIT_SPEED + index as f32 * spacing)
    }

    pub fn position(&self, index: usize, time: f32) -> Vector3<f32> {
        let a = cgmath::Rad::from(self.angle(index, time)).0;
        Vector3::new(self.radius * a.cos(), self.height, self.radius * a.sin())
    }

    /// Rotation about +Y, in degrees, that turns a model facing +Z along the orbit.
    pub fn heading(&self, index: usize, time: f32) -> f32 {
        -self.angle(index, time).0
    }
}

/// A door sliding up by `lift` while the camera is within `trigger` of it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Door {
    pub closed_position: Vector3<f32>,
    pub lift: f32,
    pub trigger: f32,
    /// 0 closed, 1 fully open.
    pub open: f32,
}

impl Door {
    pub fn step(&mut self, camera: Point3<f32>, dt: f32) {
        let door = Point3::new(
            self.closed_position.x,
            self.closed_position.y,
            self.closed_position.z,
        );
        let direction = if camera.distance(door) < self.trigger {
            1.0
        } else {
            -1.0
        };
        self.open = (self.open + direction * dt / DOOR_TRAVEL_TIME).clamp(0.0, 1.0);
    }

    pub fn position(&self) -> Vector3<f32> {
        self.closed_position + Vector3::unit_y() * self.lift * self.open
    }
}

/// Vegetation scale factor for a camera at `distance` from the dome center:
/// full size inside `bound_in`, the minimum beyond `bound_out`, linear between.
pub fn vegetation_scale(distance: f32, bound_in: f32, bound_out: f32) -> f32 {
    if distance <= bound_in {
        1.0
    } else if distance >= bound_out {
        VEGETATION_MIN_SCALE
    } else {
        let t = (distance - bound_in) / (bound_out - bound_in);
        1.0 + t * (VEGETATION_MIN_SCALE - 1.0)
    }
}

/// A configured but not yet initialized object and the files it loads.
#[derive(Debug)]
pub struct ObjectPlan {
    pub role: Role,
    pub object: RenderableObject,
    pub asset: PathBuf,
}

fn placed(
    name: &str,
    position: Vector3<f32>,
    scale: f32,
    rotation_axis: Vector3<f32>,
    rotation_angle: f32,
) -> RenderableObject {
    let mut object = RenderableObject::new(name);
    object.set_placement(
        position,
        Vector3::new(scale, scale, scale),
        rotation_axis,
        rotation_angle,
    );
    object
}

pub fn ship_orbit(config: &ViewerConfig) -> ShipOrbit {
    ShipOrbit {
        radius: 1.5 * config.dome_radius(),
        height: 0.8 * config.dome_radius(),
        ships: SHIP_NAMES.len(),
    }
}

pub fn door(config: &ViewerConfig) -> Door {
    Door {
        closed_position: Vector3::new(config.dome_radius(), 0.0, 0.0),
        lift: 3.0 * config.world_scale,
        trigger: 5.0 * config.world_scale,
        open: 0.0,
    }
}

/// Configure every object of the scene, in draw order.
pub fn plan_objects(config: &ViewerConfig) -> Result<Vec<ObjectPlan>, ObjectError> {
    let mut plans = Vec::new();
    let up = Vector3::unit_y();

    let mut dome = placed("dome", Vector3::zero(), config.dome_radius(), up, 0.0);
    dome.set_shadow()?;
    plans.push(ObjectPlan {
        role: Role::Dome,
        object: dome,
        asset: config.asset("models/dome/dome.gltf"),
    });

    let mut bot = placed("bot", Vector3::zero(), 1.0, Vector3::zero(), 0.0);
    bot.set_shadow()?;
    bot.set_animated()?;
    plans.push(ObjectPlan {
        role: Role::Bot,
        object: bot,
        asset: config.asset("models/bot/bot.gltf"),
    });

    let orbit = ship_orbit(config);
    for (i, name) in SHIP_NAMES.iter().enumerate() {
        let ship = placed(
            name,
            orbit.position(i, 0.0),
            config.world_scale,
            up,
            orbit.heading(i, 0.0),
        );
        plans.push(ObjectPlan {
            role: Role::Ship(i),
            object: ship,
            asset: config.asset(&format!("models/ships/{name}.gltf")),
        });
    }

    let door = door(config);
    let mut door_object = placed("door", door.position(), config.world_scale, up, 0.0);
    door_object.set_shadow()?;
    plans.push(ObjectPlan {
        role: Role::Door,
        object: door_object,
        asset: config.asset("models/door/door.gltf"),
    });

    let count = config.vegetation_per_kind;
    if count == 0 {
        log::info!("vegetation_per_kind is 0, planting nothing");
        return Ok(plans);
    }
    let mut rng = StdRng::seed_from_u64(config.vegetation_seed);
    for name in PLANT_NAMES {
        let layout = vegetation_layout(&mut rng, count, 0.85 * config.dome_radius());
        let mut plant = placed(name, Vector3::zero(), config.world_scale, up, 0.0);
        plant.set_shadow()?;
        plant.set_instanced(count, layout.positions, layout.scales, layout.angles)?;
        plans.push(ObjectPlan {
            role: Role::Vegetation,
            object: plant,
            asset: config.asset(&format!("models/nature/{name}.gltf")),
        });
    }
    Ok(plans)
}

pub fn skybox_face_paths(config: &ViewerConfig) -> Vec<PathBuf> {
    SKYBOX_FACES
        .iter()
        .map(|face| config.asset(&format!("textures/starbox/starbox_{face}.png")))
        .collect()
}

/// Star skybox, or the face colors when its textures can't be used.
async fn skybox(init: &InitContext) -> anyhow::Result<UnlitBox> {
    let config = &init.config;
    let build = |faces: Option<&[image::RgbaImage]>| {
        UnlitBox::new(
            &init.device,
            &init.queue,
            init.color_format,
            BoxKind::Skybox,
            config.skybox_size(),
            faces,
            "skybox",
        )
    };
    let textured = match load_images(&skybox_face_paths(config)).await {
        Ok(faces) => build(Some(&faces)),
        Err(e) => Err(e),
    };
    textured.or_else(|e| {
        log::warn!("skybox: textures unavailable, using face colors: {:#}", e);
        build(None)
    })
}

/// Keep the placement's scale and axis, move it and turn it.
fn move_object(object: &mut RenderableObject, position: Vector3<f32>, angle: Option<f32>) {
    if let Some(placement) = object.placement().copied() {
        object.set_placement(
            position,
            placement.scale,
            placement.rotation_axis,
            angle.unwrap_or(placement.rotation_angle),
        );
    }
}

#[derive(Debug)]
pub struct DomeScene {
    objects: Vec<(Role, RenderableObject)>,
    skybox: UnlitBox,
    light_marker: UnlitBox,
    orbit: ShipOrbit,
    door: Door,
    bound_in: f32,
    bound_out: f32,
    last_update: Instant,
}

impl DomeScene {
    /// Load every object; missing or broken assets are logged and skipped.
    pub async fn new(init: InitContext) -> anyhow::Result<Self> {
        let config = &init.config;
        let init = &init;
        let loads = plan_objects(config)?.into_iter().map(|mut plan| async move {
            let result = plan
                .object
                .init(
                    &init.device,
                    &init.queue,
                    init.color_program.clone(),
                    Some(init.depth_program.clone()),
                    OBJECT_BINDING_SLOT,
                    &plan.asset,
                    None,
                )
                .await;
            match result {
                Ok(()) => Some((plan.role, plan.object)),
                Err(e) => {
                    log::warn!("{}: skipped: {}", plan.object.name(), e);
                    None
                }
            }
        });
        let objects: Vec<_> = futures::future::join_all(loads)
            .await
            .into_iter()
            .flatten()
            .collect();
        if objects.is_empty() {
            log::warn!(
                "No scene object could be loaded from {}",
                config.assets_dir.display()
            );
        }

        let skybox = skybox(init).await?;
        let light_marker = UnlitBox::new(
            &init.device,
            &init.queue,
            init.color_format,
            BoxKind::Marker,
            1.0,
            None,
            "light_marker",
        )?;

        Ok(Self {
            objects,
            skybox,
            light_marker,
            orbit: ship_orbit(config),
            door: door(config),
            bound_in: 0.9 * config.dome_radius(),
            bound_out: 1.1 * config.dome_radius(),
            last_update: Instant::now(),
        })
    }
}

impl GraphicsFlow for DomeScene {
    fn on_update(&mut self, _ctx: &Context, frame: &FrameContext) {
        let dt = self.last_update.elapsed().as_secs_f32();
        self.last_update = Instant::now();

        self.door.step(frame.camera_position, dt);
        let from_center = Vector3::new(frame.camera_position.x, 0.0, frame.camera_position.z);
        let vegetation = vegetation_scale(from_center.magnitude(), self.bound_in, self.bound_out);

        for (role, object) in &mut self.objects {
            match role {
                Role::Dome => {}
                Role::Bot => object.update(frame.time),
                Role::Ship(i) => move_object(
                    object,
                    self.orbit.position(*i, frame.time),
                    Some(self.orbit.heading(*i, frame.time)),
                ),
                Role::Door => move_object(object, self.door.position(), None),
                Role::Vegetation => object.set_placement_modifier(1.0, vegetation),
            }
        }
    }

    fn on_depth_render(
        &mut self,
        ctx: &Context,
        render_pass: &mut wgpu::RenderPass<'_>,
        light_view_proj: Matrix4<f32>,
    ) {
        for (_, object) in &mut self.objects {
            object.depth_render(&ctx.queue, render_pass, light_view_proj);
        }
    }

    fn on_render(
        &mut self,
        ctx: &Context,
        render_pass: &mut wgpu::RenderPass<'_>,
        frame: &FrameContext,
    ) {
        self.skybox
            .render(&ctx.queue, render_pass, frame.view_proj, Vector3::zero());
        self.light_marker
            .render(&ctx.queue, render_pass, frame.view_proj, frame.light_position);
        for (_, object) in &mut self.objects {
            object.render(
                &ctx.device,
                &ctx.queue,
                render_pass,
                frame,
                Some(&ctx.shadow_map),
            );
        }
    }
}

impl Drop for DomeScene {
    fn drop(&mut self) {
        for (_, object) in &mut self.objects {
            object.cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn vegetation_stays_inside_the_disc_and_is_reproducible() {
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        let first = vegetation_layout(&mut a, 50, 100.0);
        assert_eq!(first, vegetation_layout(&mut b, 50, 100.0));
        assert_eq!(first.positions.len(), 50);
        for (p, s) in first.positions.iter().zip(&first.scales) {
            assert!(p.magnitude() <= 100.0 + 1e-3);
            assert_eq!(p.y, 0.0);
            assert!((0.5..1.5).contains(s));
        }
    }

    #[test]
    fn ships_are_evenly_spaced_on_the_orbit() {
        let orbit = ShipOrbit {
            radius: 100.0,
            height: 50.0,
            ships: 3,
        };
        let p0 = orbit.position(0, 0.0);
        let p1 = orbit.position(1, 0.0);
        assert_relative_eq!(p0, Vector3::new(100.0, 50.0, 0.0), epsilon = 1e-4);
        assert_relative_eq!(
            Vector3::new(p1.x, 0.0, p1.z).magnitude(),
            100.0,
            epsilon = 1e-3
        );
        assert_relative_eq!(p0.dot(p1) - 2500.0, -5000.0, epsilon = 1e-2);
        // after 9 s a ship has moved 90 degrees
        assert_relative_eq!(orbit.position(0, 9.0), Vector3::new(0.0, 50.0, 100.0), epsilon = 1e-3);
    }

    #[test]
    fn ship_heading_follows_the_tangent() {
        let orbit = ShipOrbit {
            radius: 100.0,
            height: 0.0,
            ships: 3,
        };
        let forward = Matrix4::from_angle_y(Deg(orbit.heading(0, 0.0))) * Vector3::unit_z().extend(0.0);
        // at angle 0 the orbit moves towards +z
        assert_relative_eq!(forward.truncate(), Vector3::unit_z(), epsilon = 1e-5);
        let forward = Matrix4::from_angle_y(Deg(orbit.heading(0, 9.0))) * Vector3::unit_z().extend(0.0);
        assert_relative_eq!(forward.truncate(), -Vector3::unit_x(), epsilon = 1e-5);
    }

    #[test]
    fn door_opens_near_and_closes_away() {
        let mut door = Door {
            closed_position: Vector3::new(100.0, 0.0, 0.0),
            lift: 30.0,
            trigger: 50.0,
            open: 0.0,
        };
        door.step(Point3::new(80.0, 0.0, 0.0), 0.5);
        assert_relative_eq!(door.position().y, 15.0);
        door.step(Point3::new(80.0, 0.0, 0.0), 5.0);
        assert_eq!(door.open, 1.0);
        door.step(Point3::new(0.0, 0.0, 0.0), 0.25);
        assert_relative_eq!(door.open, 0.75);
    }

    #[test]
    fn vegetation_shrinks_outside_the_dome() {
        assert_eq!(vegetation_scale(10.0, 90.0, 110.0), 1.0);
        assert_relative_eq!(vegetation_scale(100.0, 90.0, 110.0), 0.625);
        assert_eq!(vegetation_scale(500.0, 90.0, 110.0), VEGETATION_MIN_SCALE);
    }

    #[test]
    fn plan_lists_every_scene_object() {
        let config = ViewerConfig {
            vegetation_per_kind: 5,
            ..ViewerConfig::default()
        };
        let plans = plan_objects(&config).unwrap();
        assert_eq!(plans.len(), 1 + 1 + SHIP_NAMES.len() + 1 + PLANT_NAMES.len());

        let bot = plans.iter().find(|p| p.role == Role::Bot).unwrap();
        assert!(bot.object.is_animated() && bot.object.has_shadow());
        assert!(bot.asset.ends_with("models/bot/bot.gltf"));

        let ships: Vec<_> = plans
            .iter()
            .filter(|p| matches!(p.role, Role::Ship(_)))
            .collect();
        assert_eq!(ships.len(), 3);
        assert!(ships.iter().all(|p| !p.object.has_shadow()));

        for plant in plans.iter().filter(|p| p.role == Role::Vegetation) {
            assert_eq!(plant.object.instance_count(), 5);
            assert_eq!(plant.object.generate_instance_matrices().len(), 5);
        }
    }

    #[test]
    fn no_vegetation_leaves_the_rest_of_the_scene() {
        let config = ViewerConfig {
            vegetation_per_kind: 0,
            ..ViewerConfig::default()
        };
        let plans = plan_objects(&config).unwrap();
        assert_eq!(plans.len(), 1 + 1 + SHIP_NAMES.len() + 1);
        assert!(plans.iter().all(|p| p.role != Role::Vegetation));
        assert!(plans.iter().any(|p| p.role == Role::Door));
    }

    #[test]
    fn skybox_faces_follow_layer_order() {
        let config = ViewerConfig {
            assets_dir: PathBuf::from("/srv/assets"),
            ..ViewerConfig::default()
        };
        let paths = skybox_face_paths(&config);
        assert_eq!(paths.len(), crate::data_structures::cube::FACE_COUNT);
        assert_eq!(
            paths[0],
            PathBuf::from("/srv/assets/textures/starbox/starbox_front.png")
        );
        assert_eq!(
            paths[5],
            PathBuf::from("/srv/assets/textures/starbox/starbox_up.png")
        );
    }

    #[test]
    fn moving_keeps_scale() {
        let mut object = placed("ship", Vector3::zero(), 10.0, Vector3::unit_y(), 0.0);
        move_object(&mut object, Vector3::new(1.0, 2.0, 3.0), Some(45.0));
        let placement = object.placement().unwrap();
        assert_eq!(placement.scale, Vector3::new(10.0, 10.0, 10.0));
        assert_eq!(placement.position, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(placement.rotation_angle, 45.0);
    }
}
