//! Keyboard fly camera and projection helpers.
//!
//! The camera is an eye point plus a look-at point. Moving translates both,
//! turning swings the look-at point around the eye. Movement stays in the
//! horizontal plane no matter where the camera looks.

use cgmath::{Deg, InnerSpace, Matrix4, Point3, Quaternion, Rotation, Rotation3, Vector3};
use winit::keyboard::KeyCode;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Looking closer than this to straight up or down is refused.
const PITCH_LIMIT: f32 = 0.996;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlyCamera {
    pub eye: Point3<f32>,
    pub lookat: Point3<f32>,
    pub up: Vector3<f32>,
    pub move_dist: f32,
    pub move_angle: Deg<f32>,
}

impl FlyCamera {
    pub fn new(eye: Point3<f32>, lookat: Point3<f32>, move_dist: f32, move_angle: Deg<f32>) -> Self {
        Self {
            eye,
            lookat,
            up: Vector3::unit_y(),
            move_dist,
            move_angle,
        }
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.eye, self.lookat, self.up)
    }

    fn view_dir(&self) -> Vector3<f32> {
        (self.lookat - self.eye).normalize()
    }

    fn forward(&self) -> Vector3<f32> {
        let v = self.view_dir();
        Vector3::new(v.x, 0.0, v.z).normalize()
    }

    fn side(&self) -> Vector3<f32> {
        let s = self.up.cross(self.view_dir());
        Vector3::new(s.x, 0.0, s.z).normalize()
    }

    fn translate(&mut self, offset: Vector3<f32>) {
        if offset.x.is_finite() && offset.z.is_finite() {
            self.eye += offset;
            self.lookat += offset;
        }
    }

    pub fn move_forward(&mut self, steps: f32) {
        let offset = self.forward() * self.move_dist * steps;
        self.translate(offset);
    }

    /// Positive steps move left.
    pub fn move_side(&mut self, steps: f32) {
        let offset = self.side() * self.move_dist * steps;
        self.translate(offset);
    }

    /// Positive steps turn left, around the up axis.
    pub fn turn(&mut self, steps: f32) {
        self.rotate_view(self.up, self.move_angle * steps);
    }

    /// Positive steps look up. Stops short of the poles.
    pub fn pitch(&mut self, steps: f32) {
        let v = self.view_dir();
        if (steps > 0.0 && v.y >= PITCH_LIMIT) || (steps < 0.0 && v.y <= -PITCH_LIMIT) {
            return;
        }
        let axis = v.cross(self.up).normalize();
        self.rotate_view(axis, self.move_angle * 0.75 * steps);
    }

    fn rotate_view(&mut self, axis: Vector3<f32>, angle: Deg<f32>) {
        let v = self.view_dir();
        let rotated = Quaternion::from_axis_angle(axis, angle).rotate_vector(v);
        self.lookat = self.eye + rotated;
    }

    /// Apply a movement key. Returns whether the key belongs to the camera.
    pub fn handle_key(&mut self, key: KeyCode) -> bool {
        match key {
            KeyCode::KeyW | KeyCode::KeyZ => self.move_forward(1.0),
            KeyCode::KeyS => self.move_forward(-1.0),
            KeyCode::KeyA | KeyCode::KeyQ => self.move_side(1.0),
            KeyCode::KeyD => self.move_side(-1.0),
            KeyCode::ArrowUp => self.pitch(1.0),
            KeyCode::ArrowDown => self.pitch(-1.0),
            KeyCode::ArrowLeft => self.turn(1.0),
            KeyCode::ArrowRight => self.turn(-1.0),
            _ => return false,
        }
        true
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    aspect: f32,
    fovy: Deg<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new(width: u32, height: u32, fovy: Deg<f32>, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy,
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * cgmath::perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

const MIN_LIGHT_DISTANCE2: f32 = 1e-12;

/// View-projection of a light at `position` looking at `target`.
pub fn light_view_proj(
    position: Point3<f32>,
    target: Point3<f32>,
    projection: &Projection,
) -> Matrix4<f32> {
    let offset = target - position;
    // a light sitting on its target keeps looking straight down
    if offset.magnitude2() < MIN_LIGHT_DISTANCE2 {
        let view = Matrix4::look_to_rh(position, -Vector3::unit_y(), Vector3::unit_z());
        return projection.calc_matrix() * view;
    }
    let dir = offset.normalize();
    // a light straight above its target needs a different up vector
    let up = if dir.cross(Vector3::unit_y()).magnitude2() < 1e-6 {
        Vector3::unit_z()
    } else {
        Vector3::unit_y()
    };
    projection.calc_matrix() * Matrix4::look_at_rh(position, target, up)
}

/// Point light that also renders the shadow map, always aimed at `target`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub intensity: f32,
    pub step: f32,
    pub projection: Projection,
}

impl PointLight {
    /// Move the light up by `steps` times its step size; negative moves down.
    pub fn raise(&mut self, steps: f32) {
        self.position.y += self.step * steps;
    }

    /// H raises the light, J lowers it.
    pub fn handle_key(&mut self, key: KeyCode) -> bool {
        match key {
            KeyCode::KeyH => self.raise(1.0),
            KeyCode::KeyJ => self.raise(-1.0),
            _ => return false,
        }
        true
    }

    pub fn view_proj(&self) -> Matrix4<f32> {
        light_view_proj(self.position, self.target, &self.projection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cgmath::{EuclideanSpace, Transform, Vector4};

    fn camera() -> FlyCamera {
        FlyCamera::new(Point3::new(0.0, 20.0, 0.0), Point3::new(100.0, 0.0, 0.0), 1.0, Deg(3.0))
    }

    #[test]
    fn forward_moves_horizontally_towards_target() {
        let mut camera = camera();
        camera.move_forward(1.0);
        assert_relative_eq!(camera.eye, Point3::new(1.0, 20.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(camera.lookat, Point3::new(101.0, 0.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn strafing_keeps_view_direction() {
        let mut camera = camera();
        let before = camera.lookat - camera.eye;
        assert!(camera.handle_key(KeyCode::KeyA));
        assert_relative_eq!(camera.lookat - camera.eye, before, epsilon = 1e-5);
        // looking down +x, left is -z
        assert_relative_eq!(camera.eye.z, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn turning_left_and_right_cancels() {
        let mut camera = camera();
        let start = camera.lookat;
        camera.turn(1.0);
        assert!(camera.lookat.z < 0.0);
        camera.turn(-1.0);
        assert_relative_eq!(camera.lookat, camera.eye + (start - camera.eye).normalize(), epsilon = 1e-5);
    }

    #[test]
    fn pitch_stops_before_straight_up() {
        let mut camera = camera();
        for _ in 0..200 {
            camera.pitch(1.0);
        }
        let v = (camera.lookat - camera.eye).normalize();
        assert!(v.y < 1.0);
        assert!(v.y.is_finite());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let mut camera = camera();
        assert!(!camera.handle_key(KeyCode::KeyP));
        assert_eq!(camera, self::camera());
    }

    #[test]
    fn light_keys_move_vertically() {
        let mut light = PointLight {
            position: Point3::new(0.0, 100.0, 0.0),
            target: Point3::origin(),
            intensity: 1.0,
            step: 5.0,
            projection: Projection::new(1, 1, Deg(120.0), 10.0, 3000.0),
        };
        assert!(light.handle_key(KeyCode::KeyH));
        assert!(light.handle_key(KeyCode::KeyH));
        assert!(light.handle_key(KeyCode::KeyJ));
        assert_eq!(light.position, Point3::new(0.0, 105.0, 0.0));
        assert!(!light.handle_key(KeyCode::KeyW));
    }

    #[test]
    fn light_lowered_onto_its_target_stays_finite() {
        let mut light = PointLight {
            position: Point3::new(0.0, 165.0, 0.0),
            target: Point3::origin(),
            intensity: 1.0,
            step: 5.0,
            projection: Projection::new(1, 1, Deg(120.0), 10.0, 3000.0),
        };
        for _ in 0..33 {
            light.handle_key(KeyCode::KeyJ);
        }
        assert_eq!(light.position, light.target);
        let m = light.view_proj();
        let columns: [[f32; 4]; 4] = m.into();
        assert!(columns.iter().flatten().all(|v| v.is_finite()));

        // one more step puts it below the target, still looking at it
        light.handle_key(KeyCode::KeyJ);
        let columns: [[f32; 4]; 4] = light.view_proj().into();
        assert!(columns.iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn light_straight_above_projects_target_to_center() {
        let projection = Projection::new(1, 1, Deg(90.0), 1.0, 100.0);
        let m = light_view_proj(Point3::new(0.0, 50.0, 0.0), Point3::origin(), &projection);
        let clip = m * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(clip.x / clip.w, 0.0, epsilon = 1e-6);
        assert_relative_eq!(clip.y / clip.w, 0.0, epsilon = 1e-6);
        let ndc_z = m.transform_point(Point3::origin()).z;
        assert!((0.0..=1.0).contains(&ndc_z));
    }
}
